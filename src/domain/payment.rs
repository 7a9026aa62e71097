use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ids::{ApplicationId, PaymentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    Wallet,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

/// How a pending payment was resolved. Carried into the atomic
/// check-and-set so the losing caller of a race observes the conflict.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentResolution {
    Approved {
        notes: Option<String>,
        processed_at: DateTime<Utc>,
    },
    Rejected {
        reason: String,
        notes: Option<String>,
        processed_at: DateTime<Utc>,
    },
}

/// A payment awaiting approval, created by a borrower-initiated repayment,
/// a manual admin entry, or a matched bank-statement transaction.
///
/// Terminal once `Approved` or `Rejected`; no further mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPayment {
    pub id: PaymentId,
    pub loan_id: ApplicationId,
    /// Signed in the wire format; negative values were historically used
    /// for reversals and are rejected at allocation time.
    pub amount: Decimal,
    pub reference: String,
    pub method: PaymentMethod,
    /// Name the payer transfers under, scored against statement
    /// beneficiaries during reconciliation.
    pub payer_name: String,
    /// Amount before fee normalization, when the source reported one.
    pub original_amount: Option<Decimal>,
    pub status: PaymentStatus,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl PendingPayment {
    pub fn new(
        loan_id: ApplicationId,
        amount: Decimal,
        reference: impl Into<String>,
        method: PaymentMethod,
        payer_name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            loan_id,
            amount,
            reference: reference.into(),
            method,
            payer_name: payer_name.into(),
            original_amount: None,
            status: PaymentStatus::Pending,
            notes: None,
            rejection_reason: None,
            created_at,
            processed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }

    /// Applies a resolution in place. The caller is responsible for the
    /// pending check; stores do it atomically.
    pub fn resolve(&mut self, resolution: PaymentResolution) {
        match resolution {
            PaymentResolution::Approved {
                notes,
                processed_at,
            } => {
                self.status = PaymentStatus::Approved;
                self.notes = notes;
                self.processed_at = Some(processed_at);
            }
            PaymentResolution::Rejected {
                reason,
                notes,
                processed_at,
            } => {
                self.status = PaymentStatus::Rejected;
                self.rejection_reason = Some(reason);
                self.notes = notes;
                self.processed_at = Some(processed_at);
            }
        }
    }
}
