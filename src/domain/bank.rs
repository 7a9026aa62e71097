use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One row of an imported bank statement.
///
/// Ephemeral: lives for the duration of a reconciliation run and is either
/// discarded or converted into an approved payment. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    #[serde(rename = "date")]
    pub transaction_date: NaiveDate,
    pub beneficiary: String,
    pub account: String,
    pub ref_code: String,
    #[serde(rename = "cash_in")]
    pub amount: Decimal,
}
