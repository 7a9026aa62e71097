use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::application::{ApplicationHistory, LoanApplication};
use crate::domain::ids::{ApplicationId, FeeRecordId, PaymentId, RepaymentId};
use crate::domain::late_fee::{FeeStatus, LateFeeRecord, RunClaim};
use crate::domain::payment::{PaymentResolution, PaymentStatus, PendingPayment};
use crate::domain::ports::{ApplicationStore, LateFeeStore, PaymentStore, RepaymentStore};
use crate::domain::repayment::{LoanRepayment, RepaymentStatus};
use crate::error::{LedgerError, Result};

#[derive(Default)]
struct ApplicationState {
    applications: HashMap<ApplicationId, LoanApplication>,
    history: Vec<ApplicationHistory>,
}

/// In-memory application store.
///
/// One lock covers the application table and the history log, which is what
/// makes `persist_transition` atomic: status check, status write and history
/// append happen in a single critical section.
#[derive(Default, Clone)]
pub struct InMemoryApplicationStore {
    inner: Arc<RwLock<ApplicationState>>,
}

impl InMemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApplicationStore for InMemoryApplicationStore {
    async fn create(&self, app: LoanApplication, history: ApplicationHistory) -> Result<()> {
        let mut state = self.inner.write().await;
        if state.applications.contains_key(&app.id) {
            return Err(LedgerError::Internal(format!(
                "application {} already exists",
                app.id
            )));
        }
        state.applications.insert(app.id, app);
        state.history.push(history);
        Ok(())
    }

    async fn get(&self, id: ApplicationId) -> Result<Option<LoanApplication>> {
        let state = self.inner.read().await;
        Ok(state.applications.get(&id).cloned())
    }

    async fn persist_transition(
        &self,
        app: LoanApplication,
        history: ApplicationHistory,
    ) -> Result<()> {
        let mut state = self.inner.write().await;
        let stored = state
            .applications
            .get(&app.id)
            .ok_or_else(|| LedgerError::not_found("application", app.id))?;
        if Some(stored.status) != history.previous_status {
            return Err(LedgerError::already_processed("application", app.id));
        }
        state.applications.insert(app.id, app);
        state.history.push(history);
        Ok(())
    }

    async fn history(&self, id: ApplicationId) -> Result<Vec<ApplicationHistory>> {
        let state = self.inner.read().await;
        Ok(state
            .history
            .iter()
            .filter(|h| h.application_id == id)
            .cloned()
            .collect())
    }
}

/// In-memory repayment store.
#[derive(Default, Clone)]
pub struct InMemoryRepaymentStore {
    repayments: Arc<RwLock<HashMap<RepaymentId, LoanRepayment>>>,
}

impl InMemoryRepaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RepaymentStore for InMemoryRepaymentStore {
    async fn upsert(&self, repayment: LoanRepayment) -> Result<()> {
        let mut repayments = self.repayments.write().await;
        repayments.insert(repayment.id, repayment);
        Ok(())
    }

    async fn get(&self, id: RepaymentId) -> Result<Option<LoanRepayment>> {
        let repayments = self.repayments.read().await;
        Ok(repayments.get(&id).cloned())
    }

    async fn list_by_loan(&self, loan_id: ApplicationId) -> Result<Vec<LoanRepayment>> {
        let repayments = self.repayments.read().await;
        let mut rows: Vec<_> = repayments
            .values()
            .filter(|r| r.loan_id == loan_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.installment_number);
        Ok(rows)
    }

    async fn list_by_status(&self, status: RepaymentStatus) -> Result<Vec<LoanRepayment>> {
        let repayments = self.repayments.read().await;
        let mut rows: Vec<_> = repayments
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.due_date, r.installment_number));
        Ok(rows)
    }

    async fn list_due_before(&self, date: NaiveDate) -> Result<Vec<LoanRepayment>> {
        let repayments = self.repayments.read().await;
        let mut rows: Vec<_> = repayments
            .values()
            .filter(|r| r.status != RepaymentStatus::Completed && r.due_date < date)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.due_date, r.installment_number));
        Ok(rows)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum RunState {
    InProgress,
    Completed,
}

#[derive(Default)]
struct LateFeeState {
    records: HashMap<FeeRecordId, LateFeeRecord>,
    runs: HashMap<NaiveDate, RunState>,
}

/// In-memory late-fee store. Records are append-only apart from the status
/// flip; run claims live next to them so one lock serializes a run date.
#[derive(Default, Clone)]
pub struct InMemoryLateFeeStore {
    inner: Arc<RwLock<LateFeeState>>,
}

impl InMemoryLateFeeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LateFeeStore for InMemoryLateFeeStore {
    async fn insert(&self, record: LateFeeRecord) -> Result<()> {
        let mut state = self.inner.write().await;
        state.records.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: FeeRecordId) -> Result<Option<LateFeeRecord>> {
        let state = self.inner.read().await;
        Ok(state.records.get(&id).cloned())
    }

    async fn list_by_repayment(&self, repayment_id: RepaymentId) -> Result<Vec<LateFeeRecord>> {
        let state = self.inner.read().await;
        let mut rows: Vec<_> = state
            .records
            .values()
            .filter(|r| r.repayment_id == repayment_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.calculation_date);
        Ok(rows)
    }

    async fn last_calculation_date(&self, repayment_id: RepaymentId) -> Result<Option<NaiveDate>> {
        let state = self.inner.read().await;
        Ok(state
            .records
            .values()
            .filter(|r| r.repayment_id == repayment_id)
            .map(|r| r.calculation_date)
            .max())
    }

    async fn set_status(
        &self,
        id: FeeRecordId,
        expected: FeeStatus,
        status: FeeStatus,
    ) -> Result<LateFeeRecord> {
        let mut state = self.inner.write().await;
        let record = state
            .records
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("late fee record", id))?;
        if record.status != expected {
            return Err(LedgerError::already_processed("late fee record", id));
        }
        record.status = status;
        Ok(record.clone())
    }

    async fn begin_run(&self, run_date: NaiveDate) -> Result<RunClaim> {
        let mut state = self.inner.write().await;
        match state.runs.get(&run_date) {
            None => {
                state.runs.insert(run_date, RunState::InProgress);
                Ok(RunClaim::Started)
            }
            Some(RunState::InProgress) => Ok(RunClaim::InProgress),
            Some(RunState::Completed) => Ok(RunClaim::Completed),
        }
    }

    async fn finish_run(&self, run_date: NaiveDate) -> Result<()> {
        let mut state = self.inner.write().await;
        state.runs.insert(run_date, RunState::Completed);
        Ok(())
    }

    async fn abort_run(&self, run_date: NaiveDate) -> Result<()> {
        let mut state = self.inner.write().await;
        if state.runs.get(&run_date) == Some(&RunState::InProgress) {
            state.runs.remove(&run_date);
        }
        Ok(())
    }
}

/// In-memory payment store. `resolve` is the single-writer gate: status
/// check and terminal write share one critical section.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<PaymentId, PendingPayment>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: PendingPayment) -> Result<()> {
        let mut payments = self.payments.write().await;
        payments.insert(payment.id, payment);
        Ok(())
    }

    async fn get(&self, id: PaymentId) -> Result<Option<PendingPayment>> {
        let payments = self.payments.read().await;
        Ok(payments.get(&id).cloned())
    }

    async fn list_by_status(&self, status: PaymentStatus) -> Result<Vec<PendingPayment>> {
        let payments = self.payments.read().await;
        let mut rows: Vec<_> = payments
            .values()
            .filter(|p| p.status == status)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.created_at);
        Ok(rows)
    }

    async fn resolve(
        &self,
        id: PaymentId,
        resolution: PaymentResolution,
    ) -> Result<PendingPayment> {
        let mut payments = self.payments.write().await;
        let payment = payments
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("payment", id))?;
        if !payment.is_pending() {
            return Err(LedgerError::already_processed("payment", id));
        }
        payment.resolve(resolution);
        Ok(payment.clone())
    }
}
