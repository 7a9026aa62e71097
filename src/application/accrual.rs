use chrono::NaiveDate;
use tracing::{info, warn};

use crate::domain::application::ApplicationStatus;
use crate::domain::ids::FeeRecordId;
use crate::domain::late_fee::{self, FeeStatus, LateFeeRecord, RunClaim};
use crate::domain::money::Balance;
use crate::domain::ports::{ApplicationStoreRef, LateFeeStoreRef, RepaymentStoreRef};
use crate::domain::repayment::{LoanRepayment, RepaymentStatus};
use crate::error::{LedgerError, Result};

/// What one accrual run did, for operator display and logs.
#[derive(Debug, Clone, PartialEq)]
pub struct AccrualRunSummary {
    pub run_date: NaiveDate,
    /// The date had already been processed; this run was a no-op.
    pub already_run: bool,
    /// Repayments that received a fee this run.
    pub assessed: usize,
    /// Settled repayments flipped to completed.
    pub marked_completed: usize,
    /// Overdue repayments inspected but not charged (already assessed
    /// today, inside a fixed-fee window, or no application to read terms
    /// from).
    pub skipped: usize,
    pub total_fees: Balance,
}

impl AccrualRunSummary {
    fn noop(run_date: NaiveDate) -> Self {
        Self {
            run_date,
            already_run: true,
            assessed: 0,
            marked_completed: 0,
            skipped: 0,
            total_fees: Balance::ZERO,
        }
    }
}

/// Assesses overdue fees across all open repayments as of a run date.
///
/// Runs on demand or on a daily schedule. A run date can be processed at
/// most once: a completed re-run is a no-op, a concurrent run loses the
/// claim with `DuplicateRun`, and per-repayment records make even a
/// partially repeated run charge nothing twice.
#[derive(Clone)]
pub struct FeeAccrualEngine {
    applications: ApplicationStoreRef,
    repayments: RepaymentStoreRef,
    late_fees: LateFeeStoreRef,
}

impl FeeAccrualEngine {
    pub fn new(
        applications: ApplicationStoreRef,
        repayments: RepaymentStoreRef,
        late_fees: LateFeeStoreRef,
    ) -> Self {
        Self {
            applications,
            repayments,
            late_fees,
        }
    }

    pub async fn run(&self, run_date: NaiveDate) -> Result<AccrualRunSummary> {
        match self.late_fees.begin_run(run_date).await? {
            RunClaim::Completed => {
                info!(%run_date, "accrual already processed for this date");
                return Ok(AccrualRunSummary::noop(run_date));
            }
            RunClaim::InProgress => return Err(LedgerError::DuplicateRun(run_date)),
            RunClaim::Started => {}
        }

        match self.run_claimed(run_date).await {
            Ok(summary) => {
                self.late_fees.finish_run(run_date).await?;
                info!(
                    %run_date,
                    assessed = summary.assessed,
                    completed = summary.marked_completed,
                    skipped = summary.skipped,
                    total_fees = %summary.total_fees,
                    "accrual run finished"
                );
                Ok(summary)
            }
            Err(err) => {
                self.late_fees.abort_run(run_date).await?;
                Err(err)
            }
        }
    }

    async fn run_claimed(&self, run_date: NaiveDate) -> Result<AccrualRunSummary> {
        let mut summary = AccrualRunSummary {
            run_date,
            already_run: false,
            assessed: 0,
            marked_completed: 0,
            skipped: 0,
            total_fees: Balance::ZERO,
        };

        for repayment in self.repayments.list_due_before(run_date).await? {
            match self.assess_one(&repayment, run_date).await? {
                Assessed::Charged(fee) => {
                    summary.assessed += 1;
                    summary.total_fees += fee;
                }
                Assessed::MarkedCompleted => summary.marked_completed += 1,
                Assessed::Skipped => summary.skipped += 1,
            }
        }

        Ok(summary)
    }

    async fn assess_one(
        &self,
        repayment: &LoanRepayment,
        run_date: NaiveDate,
    ) -> Result<Assessed> {
        let mut repayment = repayment.clone();

        // Settled rows left behind by out-of-band adjustments are closed
        // here rather than charged.
        if repayment.is_settled() {
            repayment.status = RepaymentStatus::Completed;
            self.repayments.upsert(repayment).await?;
            return Ok(Assessed::MarkedCompleted);
        }
        if repayment.outstanding_scheduled().is_zero() {
            // Only fees remain; there is no principal to accrue on.
            return Ok(Assessed::Skipped);
        }

        let Some(app) = self.applications.get(repayment.loan_id).await? else {
            warn!(repayment_id = %repayment.id, loan_id = %repayment.loan_id,
                "repayment references an unknown loan; skipping");
            return Ok(Assessed::Skipped);
        };
        if app.status != ApplicationStatus::Active {
            warn!(loan_id = %app.id, status = %app.status,
                "loan is not active; skipping fee assessment");
            return Ok(Assessed::Skipped);
        }

        let last_run = self.late_fees.last_calculation_date(repayment.id).await?;
        if last_run == Some(run_date) {
            return Ok(Assessed::Skipped);
        }

        let outstanding = repayment.outstanding_scheduled();
        let Some(assessment) = late_fee::assess(
            &app.late_fee,
            outstanding,
            repayment.due_date,
            run_date,
            last_run,
        ) else {
            return Ok(Assessed::Skipped);
        };

        if repayment.status == RepaymentStatus::Pending {
            repayment.status = RepaymentStatus::Overdue;
        }

        let fee = assessment.total();
        if fee.is_zero() {
            // Inside a fixed-fee window; nothing new owed, but the row is
            // still flagged overdue.
            self.repayments.upsert(repayment).await?;
            return Ok(Assessed::Skipped);
        }

        repayment.late_fee_amount += fee;
        let record = LateFeeRecord::new(
            repayment.id,
            run_date,
            outstanding,
            &app.late_fee,
            &assessment,
            repayment.late_fee_amount,
        );

        self.repayments.upsert(repayment.clone()).await?;
        self.late_fees.insert(record).await?;
        info!(repayment_id = %repayment.id, %run_date, fee = %fee,
            cumulative = %repayment.late_fee_amount, "late fee assessed");
        Ok(Assessed::Charged(fee))
    }

    /// Marks a fee record waived. The repayment's cumulative
    /// `late_fee_amount` is intentionally left untouched; reversals are an
    /// explicit compensating adjustment, not a rewrite of the audit trail.
    pub async fn waive(&self, id: FeeRecordId) -> Result<LateFeeRecord> {
        let record = self
            .late_fees
            .set_status(id, FeeStatus::Active, FeeStatus::Waived)
            .await?;
        info!(record_id = %id, repayment_id = %record.repayment_id, "late fee waived");
        Ok(record)
    }
}

enum Assessed {
    Charged(Balance),
    MarkedCompleted,
    Skipped,
}
