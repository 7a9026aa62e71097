use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

use super::application::{ApplicationHistory, LoanApplication};
use super::ids::{ApplicationId, FeeRecordId, PaymentId, RepaymentId};
use super::late_fee::{FeeStatus, LateFeeRecord, RunClaim};
use super::payment::{PaymentResolution, PaymentStatus, PendingPayment};
use super::repayment::{LoanRepayment, RepaymentStatus};
use crate::error::Result;

/// Storage port for applications and their append-only history.
///
/// Check-then-act sequences are single methods so adapters can make them
/// atomic: one critical section in memory, one transaction in a database.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Persists a new application together with its creation history row.
    async fn create(&self, app: LoanApplication, history: ApplicationHistory) -> Result<()>;
    async fn get(&self, id: ApplicationId) -> Result<Option<LoanApplication>>;
    /// Persists a status change plus its history row in one atomic unit.
    /// The stored status must still equal `history.previous_status`; a
    /// caller that lost the race gets `AlreadyProcessed`.
    async fn persist_transition(
        &self,
        app: LoanApplication,
        history: ApplicationHistory,
    ) -> Result<()>;
    /// Insertion-ordered history for one application.
    async fn history(&self, id: ApplicationId) -> Result<Vec<ApplicationHistory>>;
}

#[async_trait]
pub trait RepaymentStore: Send + Sync {
    async fn upsert(&self, repayment: LoanRepayment) -> Result<()>;
    async fn get(&self, id: RepaymentId) -> Result<Option<LoanRepayment>>;
    /// All installments of a loan, ascending by installment number.
    async fn list_by_loan(&self, loan_id: ApplicationId) -> Result<Vec<LoanRepayment>>;
    async fn list_by_status(&self, status: RepaymentStatus) -> Result<Vec<LoanRepayment>>;
    /// Not-completed repayments due strictly before `date`.
    async fn list_due_before(&self, date: NaiveDate) -> Result<Vec<LoanRepayment>>;
}

#[async_trait]
pub trait LateFeeStore: Send + Sync {
    async fn insert(&self, record: LateFeeRecord) -> Result<()>;
    async fn get(&self, id: FeeRecordId) -> Result<Option<LateFeeRecord>>;
    async fn list_by_repayment(&self, repayment_id: RepaymentId) -> Result<Vec<LateFeeRecord>>;
    /// Most recent calculation date for a repayment, if any.
    async fn last_calculation_date(&self, repayment_id: RepaymentId) -> Result<Option<NaiveDate>>;
    /// Atomically flips a record's status. Fails with `AlreadyProcessed`
    /// when the current status is not `expected`.
    async fn set_status(
        &self,
        id: FeeRecordId,
        expected: FeeStatus,
        status: FeeStatus,
    ) -> Result<LateFeeRecord>;
    /// Claims `run_date` for an accrual run. Concurrent runs for one date
    /// serialize through this claim.
    async fn begin_run(&self, run_date: NaiveDate) -> Result<RunClaim>;
    async fn finish_run(&self, run_date: NaiveDate) -> Result<()>;
    /// Releases a claim after a failed run so the date can be retried.
    async fn abort_run(&self, run_date: NaiveDate) -> Result<()>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, payment: PendingPayment) -> Result<()>;
    async fn get(&self, id: PaymentId) -> Result<Option<PendingPayment>>;
    async fn list_by_status(&self, status: PaymentStatus) -> Result<Vec<PendingPayment>>;
    /// Atomic pending-check-and-resolve. Exactly one of any set of
    /// concurrent callers wins; the rest get `AlreadyProcessed`.
    async fn resolve(
        &self,
        id: PaymentId,
        resolution: PaymentResolution,
    ) -> Result<PendingPayment>;
}

pub type ApplicationStoreRef = Arc<dyn ApplicationStore>;
pub type RepaymentStoreRef = Arc<dyn RepaymentStore>;
pub type LateFeeStoreRef = Arc<dyn LateFeeStore>;
pub type PaymentStoreRef = Arc<dyn PaymentStore>;
