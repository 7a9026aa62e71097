use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

use crate::domain::ids::ApplicationId;
use crate::domain::payment::{PaymentMethod, PendingPayment};
use crate::error::{LedgerError, Result};

#[derive(Debug, Deserialize)]
struct PaymentRow {
    payer: String,
    reference: String,
    amount: Decimal,
    created: NaiveDate,
    #[serde(default)]
    method: Option<PaymentMethod>,
}

impl From<PaymentRow> for PendingPayment {
    fn from(row: PaymentRow) -> Self {
        PendingPayment::new(
            ApplicationId::new(),
            row.amount,
            row.reference,
            row.method.unwrap_or(PaymentMethod::BankTransfer),
            row.payer,
            row.created.and_time(NaiveTime::MIN).and_utc(),
        )
    }
}

/// Reads a pending-payments snapshot from CSV for an offline matching run.
///
/// Columns: `payer, reference, amount, created[, method]`. Loan and payment
/// ids are generated per row; scoring does not depend on them.
pub struct PaymentsReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> PaymentsReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn payments(self) -> impl Iterator<Item = Result<PendingPayment>> {
        self.reader
            .into_deserialize::<PaymentRow>()
            .map(|result| result.map(Into::into).map_err(LedgerError::from))
    }
}
