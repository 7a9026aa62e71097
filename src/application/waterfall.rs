use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::info;

use crate::domain::ids::RepaymentId;
use crate::domain::late_fee::FeeStatus;
use crate::domain::money::Amount;
use crate::domain::payment::PaymentMethod;
use crate::domain::ports::{LateFeeStoreRef, RepaymentStoreRef};
use crate::domain::repayment::PaymentBreakdown;
use crate::error::{LedgerError, Result};

/// Applies incoming funds to a repayment: outstanding late fees first, then
/// scheduled principal+interest, excess back to the caller.
///
/// The allocation itself is pure ([`LoanRepayment::apply_payment`]); this
/// service loads and persists the row and settles fee records once their
/// balance clears.
///
/// [`LoanRepayment::apply_payment`]: crate::domain::repayment::LoanRepayment::apply_payment
#[derive(Clone)]
pub struct PaymentWaterfall {
    repayments: RepaymentStoreRef,
    late_fees: LateFeeStoreRef,
}

impl PaymentWaterfall {
    pub fn new(repayments: RepaymentStoreRef, late_fees: LateFeeStoreRef) -> Self {
        Self {
            repayments,
            late_fees,
        }
    }

    pub async fn apply(
        &self,
        repayment_id: RepaymentId,
        amount: Decimal,
        paid_at: DateTime<Utc>,
        method: Option<PaymentMethod>,
    ) -> Result<PaymentBreakdown> {
        let amount = Amount::new(amount)?;
        let mut repayment = self
            .repayments
            .get(repayment_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("repayment", repayment_id))?;

        let breakdown = repayment.apply_payment(amount, paid_at, method);
        let fees_cleared =
            breakdown.fee_portion.is_positive() && repayment.outstanding_fees().is_zero();
        self.repayments.upsert(repayment).await?;

        if fees_cleared {
            self.settle_fee_records(repayment_id).await?;
        }

        info!(
            repayment_id = %repayment_id,
            paid = %amount.value(),
            fees = %breakdown.fee_portion,
            principal = %breakdown.principal_portion,
            excess = %breakdown.excess,
            total_due = %breakdown.total_due,
            "payment allocated"
        );
        Ok(breakdown)
    }

    async fn settle_fee_records(&self, repayment_id: RepaymentId) -> Result<()> {
        for record in self.late_fees.list_by_repayment(repayment_id).await? {
            if record.status == FeeStatus::Active {
                self.late_fees
                    .set_status(record.id, FeeStatus::Active, FeeStatus::Paid)
                    .await?;
            }
        }
        Ok(())
    }
}
