use chrono::Utc;
use tracing::{info, warn};

use super::waterfall::PaymentWaterfall;
use crate::domain::ids::PaymentId;
use crate::domain::money::Amount;
use crate::domain::payment::{PaymentResolution, PendingPayment};
use crate::domain::ports::{PaymentStoreRef, RepaymentStoreRef};
use crate::domain::repayment::{LoanRepayment, PaymentBreakdown};
use crate::error::{LedgerError, Result};

/// Result of approving a payment: the resolved payment plus how its amount
/// landed on the ledger. `breakdown.excess` is returned for external
/// handling (wallet credit) and is never silently dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalOutcome {
    pub payment: PendingPayment,
    pub breakdown: PaymentBreakdown,
}

/// PENDING -> APPROVED/REJECTED lifecycle for submitted payments.
///
/// Resolution is a compare-and-set in the store: of any number of
/// concurrent actors, exactly one wins; the rest observe
/// `AlreadyProcessed` and are expected to refresh their view. Under a
/// polling dashboard this conflict is routine, not exceptional.
#[derive(Clone)]
pub struct PaymentApprovalWorkflow {
    payments: PaymentStoreRef,
    repayments: RepaymentStoreRef,
    waterfall: PaymentWaterfall,
}

impl PaymentApprovalWorkflow {
    pub fn new(
        payments: PaymentStoreRef,
        repayments: RepaymentStoreRef,
        waterfall: PaymentWaterfall,
    ) -> Self {
        Self {
            payments,
            repayments,
            waterfall,
        }
    }

    pub async fn approve(
        &self,
        id: PaymentId,
        notes: Option<String>,
    ) -> Result<ApprovalOutcome> {
        let payment = self
            .payments
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("payment", id))?;
        if !payment.is_pending() {
            return Err(LedgerError::already_processed("payment", id));
        }

        // Validate before committing: a payment that cannot be allocated
        // must not end up APPROVED with no ledger effect.
        Amount::new(payment.amount)?;
        let target = self.earliest_open_installment(&payment).await?;

        let processed_at = Utc::now();
        let payment = self
            .payments
            .resolve(
                id,
                PaymentResolution::Approved {
                    notes,
                    processed_at,
                },
            )
            .await?;

        let breakdown = self
            .waterfall
            .apply(target.id, payment.amount, processed_at, Some(payment.method))
            .await?;

        info!(payment_id = %id, loan_id = %payment.loan_id,
            installment = target.installment_number, excess = %breakdown.excess,
            "payment approved");
        Ok(ApprovalOutcome { payment, breakdown })
    }

    pub async fn reject(
        &self,
        id: PaymentId,
        reason: impl Into<String>,
        notes: Option<String>,
    ) -> Result<PendingPayment> {
        let payment = self
            .payments
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("payment", id))?;
        if !payment.is_pending() {
            return Err(LedgerError::already_processed("payment", id));
        }

        let reason = reason.into();
        let payment = self
            .payments
            .resolve(
                id,
                PaymentResolution::Rejected {
                    reason: reason.clone(),
                    notes,
                    processed_at: Utc::now(),
                },
            )
            .await?;
        warn!(payment_id = %id, %reason, "payment rejected");
        Ok(payment)
    }

    /// Payments land on the oldest installment that still owes anything.
    async fn earliest_open_installment(
        &self,
        payment: &PendingPayment,
    ) -> Result<LoanRepayment> {
        self.repayments
            .list_by_loan(payment.loan_id)
            .await?
            .into_iter()
            .find(|r| !r.is_settled())
            .ok_or_else(|| {
                LedgerError::Allocation(format!(
                    "loan {} has no open installment to receive payment {}",
                    payment.loan_id, payment.id
                ))
            })
    }
}
