use async_trait::async_trait;
use chrono::NaiveDate;
use rocksdb::{ColumnFamilyDescriptor, DB, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::application::{ApplicationHistory, LoanApplication};
use crate::domain::ids::{ApplicationId, FeeRecordId, PaymentId, RepaymentId};
use crate::domain::late_fee::{FeeStatus, LateFeeRecord, RunClaim};
use crate::domain::payment::{PaymentResolution, PaymentStatus, PendingPayment};
use crate::domain::ports::{ApplicationStore, LateFeeStore, PaymentStore, RepaymentStore};
use crate::domain::repayment::{LoanRepayment, RepaymentStatus};
use crate::error::{LedgerError, Result};

/// Column Family for application rows.
pub const CF_APPLICATIONS: &str = "applications";
/// Column Family for the append-only application history log.
pub const CF_HISTORY: &str = "application_history";
/// Column Family for repayment rows.
pub const CF_REPAYMENTS: &str = "repayments";
/// Column Family for the append-only late-fee record log.
pub const CF_LATE_FEES: &str = "late_fees";
/// Column Family for pending payments.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for accrual run claims, keyed by run date.
pub const CF_ACCRUAL_RUNS: &str = "accrual_runs";

const RUN_IN_PROGRESS: &[u8] = b"in_progress";
const RUN_COMPLETED: &[u8] = b"completed";

/// A persistent store implementation using RocksDB.
///
/// Entities are stored as JSON values in one Column Family per table.
/// RocksDB has no transactions in this API, so check-then-act methods
/// serialize through an internal mutex; multi-key writes go through a
/// `WriteBatch` so they land atomically. Single-process exclusion only.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// all required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [
            CF_APPLICATIONS,
            CF_HISTORY,
            CF_REPAYMENTS,
            CF_LATE_FEES,
            CF_PAYMENTS,
            CF_ACCRUAL_RUNS,
        ]
        .iter()
        .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
        .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cfs)
            .map_err(|e| LedgerError::Internal(format!("rocksdb open error: {e}")))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::Internal(format!("column family {name} not found")))
    }

    fn put_json<T: Serialize>(&self, cf: &str, key: &str, value: &T) -> Result<()> {
        let cf = self.cf(cf)?;
        let bytes = serde_json::to_vec(value)?;
        self.db
            .put_cf(cf, key.as_bytes(), bytes)
            .map_err(|e| LedgerError::Internal(format!("rocksdb write error: {e}")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: &str) -> Result<Option<T>> {
        let cf = self.cf(cf)?;
        let bytes = self
            .db
            .get_cf(cf, key.as_bytes())
            .map_err(|e| LedgerError::Internal(format!("rocksdb read error: {e}")))?;
        match bytes {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_json<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item
                .map_err(|e| LedgerError::Internal(format!("rocksdb iteration error: {e}")))?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }

    fn write_pair<A: Serialize, B: Serialize>(
        &self,
        (cf_a, key_a, a): (&str, &str, &A),
        (cf_b, key_b, b): (&str, &str, &B),
    ) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(cf_a)?, key_a.as_bytes(), serde_json::to_vec(a)?);
        batch.put_cf(self.cf(cf_b)?, key_b.as_bytes(), serde_json::to_vec(b)?);
        self.db
            .write(batch)
            .map_err(|e| LedgerError::Internal(format!("rocksdb batch write error: {e}")))
    }
}

fn history_key(history: &ApplicationHistory) -> String {
    // Prefix by application, order by timestamp; the id breaks ties.
    format!(
        "{}:{}:{}",
        history.application_id,
        history.created_at.timestamp_nanos_opt().unwrap_or_default(),
        history.id
    )
}

#[async_trait]
impl ApplicationStore for RocksDbStore {
    async fn create(&self, app: LoanApplication, history: ApplicationHistory) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self
            .get_json::<LoanApplication>(CF_APPLICATIONS, &app.id.to_string())?
            .is_some()
        {
            return Err(LedgerError::Internal(format!(
                "application {} already exists",
                app.id
            )));
        }
        self.write_pair(
            (CF_APPLICATIONS, &app.id.to_string(), &app),
            (CF_HISTORY, &history_key(&history), &history),
        )
    }

    async fn get(&self, id: ApplicationId) -> Result<Option<LoanApplication>> {
        self.get_json(CF_APPLICATIONS, &id.to_string())
    }

    async fn persist_transition(
        &self,
        app: LoanApplication,
        history: ApplicationHistory,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let stored: LoanApplication = self
            .get_json(CF_APPLICATIONS, &app.id.to_string())?
            .ok_or_else(|| LedgerError::not_found("application", app.id))?;
        if Some(stored.status) != history.previous_status {
            return Err(LedgerError::already_processed("application", app.id));
        }
        self.write_pair(
            (CF_APPLICATIONS, &app.id.to_string(), &app),
            (CF_HISTORY, &history_key(&history), &history),
        )
    }

    async fn history(&self, id: ApplicationId) -> Result<Vec<ApplicationHistory>> {
        let mut rows: Vec<ApplicationHistory> = self
            .scan_json(CF_HISTORY)?
            .into_iter()
            .filter(|h: &ApplicationHistory| h.application_id == id)
            .collect();
        rows.sort_by_key(|h| (h.created_at, h.id));
        Ok(rows)
    }
}

#[async_trait]
impl RepaymentStore for RocksDbStore {
    async fn upsert(&self, repayment: LoanRepayment) -> Result<()> {
        self.put_json(CF_REPAYMENTS, &repayment.id.to_string(), &repayment)
    }

    async fn get(&self, id: RepaymentId) -> Result<Option<LoanRepayment>> {
        self.get_json(CF_REPAYMENTS, &id.to_string())
    }

    async fn list_by_loan(&self, loan_id: ApplicationId) -> Result<Vec<LoanRepayment>> {
        let mut rows: Vec<LoanRepayment> = self
            .scan_json(CF_REPAYMENTS)?
            .into_iter()
            .filter(|r: &LoanRepayment| r.loan_id == loan_id)
            .collect();
        rows.sort_by_key(|r| r.installment_number);
        Ok(rows)
    }

    async fn list_by_status(&self, status: RepaymentStatus) -> Result<Vec<LoanRepayment>> {
        let mut rows: Vec<LoanRepayment> = self
            .scan_json(CF_REPAYMENTS)?
            .into_iter()
            .filter(|r: &LoanRepayment| r.status == status)
            .collect();
        rows.sort_by_key(|r| (r.due_date, r.installment_number));
        Ok(rows)
    }

    async fn list_due_before(&self, date: NaiveDate) -> Result<Vec<LoanRepayment>> {
        let mut rows: Vec<LoanRepayment> = self
            .scan_json(CF_REPAYMENTS)?
            .into_iter()
            .filter(|r: &LoanRepayment| {
                r.status != RepaymentStatus::Completed && r.due_date < date
            })
            .collect();
        rows.sort_by_key(|r| (r.due_date, r.installment_number));
        Ok(rows)
    }
}

#[async_trait]
impl LateFeeStore for RocksDbStore {
    async fn insert(&self, record: LateFeeRecord) -> Result<()> {
        self.put_json(CF_LATE_FEES, &record.id.to_string(), &record)
    }

    async fn get(&self, id: FeeRecordId) -> Result<Option<LateFeeRecord>> {
        self.get_json(CF_LATE_FEES, &id.to_string())
    }

    async fn list_by_repayment(&self, repayment_id: RepaymentId) -> Result<Vec<LateFeeRecord>> {
        let mut rows: Vec<LateFeeRecord> = self
            .scan_json(CF_LATE_FEES)?
            .into_iter()
            .filter(|r: &LateFeeRecord| r.repayment_id == repayment_id)
            .collect();
        rows.sort_by_key(|r| r.calculation_date);
        Ok(rows)
    }

    async fn last_calculation_date(&self, repayment_id: RepaymentId) -> Result<Option<NaiveDate>> {
        Ok(self
            .list_by_repayment(repayment_id)
            .await?
            .last()
            .map(|r| r.calculation_date))
    }

    async fn set_status(
        &self,
        id: FeeRecordId,
        expected: FeeStatus,
        status: FeeStatus,
    ) -> Result<LateFeeRecord> {
        let _guard = self.write_lock.lock().await;
        let mut record: LateFeeRecord = self
            .get_json(CF_LATE_FEES, &id.to_string())?
            .ok_or_else(|| LedgerError::not_found("late fee record", id))?;
        if record.status != expected {
            return Err(LedgerError::already_processed("late fee record", id));
        }
        record.status = status;
        self.put_json(CF_LATE_FEES, &id.to_string(), &record)?;
        Ok(record)
    }

    async fn begin_run(&self, run_date: NaiveDate) -> Result<RunClaim> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf(CF_ACCRUAL_RUNS)?;
        let key = run_date.to_string();
        let existing = self
            .db
            .get_cf(cf, key.as_bytes())
            .map_err(|e| LedgerError::Internal(format!("rocksdb read error: {e}")))?;
        match existing.as_deref() {
            None => {
                self.db
                    .put_cf(cf, key.as_bytes(), RUN_IN_PROGRESS)
                    .map_err(|e| LedgerError::Internal(format!("rocksdb write error: {e}")))?;
                Ok(RunClaim::Started)
            }
            Some(bytes) if bytes == RUN_COMPLETED => Ok(RunClaim::Completed),
            Some(_) => Ok(RunClaim::InProgress),
        }
    }

    async fn finish_run(&self, run_date: NaiveDate) -> Result<()> {
        let cf = self.cf(CF_ACCRUAL_RUNS)?;
        self.db
            .put_cf(cf, run_date.to_string().as_bytes(), RUN_COMPLETED)
            .map_err(|e| LedgerError::Internal(format!("rocksdb write error: {e}")))
    }

    async fn abort_run(&self, run_date: NaiveDate) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf(CF_ACCRUAL_RUNS)?;
        let key = run_date.to_string();
        let existing = self
            .db
            .get_cf(cf, key.as_bytes())
            .map_err(|e| LedgerError::Internal(format!("rocksdb read error: {e}")))?;
        if existing.as_deref() == Some(RUN_IN_PROGRESS) {
            self.db
                .delete_cf(cf, key.as_bytes())
                .map_err(|e| LedgerError::Internal(format!("rocksdb delete error: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for RocksDbStore {
    async fn insert(&self, payment: PendingPayment) -> Result<()> {
        self.put_json(CF_PAYMENTS, &payment.id.to_string(), &payment)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<PendingPayment>> {
        self.get_json(CF_PAYMENTS, &id.to_string())
    }

    async fn list_by_status(&self, status: PaymentStatus) -> Result<Vec<PendingPayment>> {
        let mut rows: Vec<PendingPayment> = self
            .scan_json(CF_PAYMENTS)?
            .into_iter()
            .filter(|p: &PendingPayment| p.status == status)
            .collect();
        rows.sort_by_key(|p| p.created_at);
        Ok(rows)
    }

    async fn resolve(
        &self,
        id: PaymentId,
        resolution: PaymentResolution,
    ) -> Result<PendingPayment> {
        let _guard = self.write_lock.lock().await;
        let mut payment: PendingPayment = self
            .get_json(CF_PAYMENTS, &id.to_string())?
            .ok_or_else(|| LedgerError::not_found("payment", id))?;
        if !payment.is_pending() {
            return Err(LedgerError::already_processed("payment", id));
        }
        payment.resolve(resolution);
        self.put_json(CF_PAYMENTS, &id.to_string(), &payment)?;
        Ok(payment)
    }
}
