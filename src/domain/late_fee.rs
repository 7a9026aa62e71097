use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ids::{FeeRecordId, RepaymentId};
use super::money::Balance;

/// How overdue fees are computed for a loan's installments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeType {
    /// Daily interest on the outstanding scheduled balance.
    Interest,
    /// A flat charge once per `frequency_days` overdue.
    Fixed,
    /// Both of the above.
    Combined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeStatus {
    Active,
    Paid,
    Waived,
}

/// Fee policy carried on the loan terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LateFeeConfig {
    pub fee_type: FeeType,
    /// Daily rate as a fraction, e.g. 0.001 for 0.1% per day.
    pub daily_rate: Decimal,
    pub fixed_fee: Balance,
    pub frequency_days: i64,
}

/// Output of one accrual run for one overdue repayment. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LateFeeRecord {
    pub id: FeeRecordId,
    pub repayment_id: RepaymentId,
    pub calculation_date: NaiveDate,
    pub days_overdue: i64,
    /// Scheduled balance still unpaid at calculation time.
    pub outstanding_principal: Balance,
    pub daily_rate: Decimal,
    /// Fee assessed in this run only.
    pub fee_amount: Balance,
    /// Running total after this run.
    pub cumulative_fees: Balance,
    pub fee_type: FeeType,
    pub fixed_fee_amount: Balance,
    pub frequency_days: i64,
    pub status: FeeStatus,
}

impl LateFeeRecord {
    pub fn new(
        repayment_id: RepaymentId,
        calculation_date: NaiveDate,
        outstanding_principal: Balance,
        config: &LateFeeConfig,
        assessment: &FeeAssessment,
        cumulative_fees: Balance,
    ) -> Self {
        Self {
            id: FeeRecordId::new(),
            repayment_id,
            calculation_date,
            days_overdue: assessment.days_overdue,
            outstanding_principal,
            daily_rate: config.daily_rate,
            fee_amount: assessment.total(),
            cumulative_fees,
            fee_type: config.fee_type,
            fixed_fee_amount: config.fixed_fee,
            frequency_days: config.frequency_days,
            status: FeeStatus::Active,
        }
    }
}

/// Result of claiming an accrual run date. A completed claim makes a re-run
/// a safe no-op; an in-progress claim means another run holds the date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunClaim {
    Started,
    InProgress,
    Completed,
}

/// One overdue repayment's fee for a single run date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeAssessment {
    pub days_overdue: i64,
    pub interest_portion: Balance,
    pub fixed_portion: Balance,
}

impl FeeAssessment {
    pub fn total(&self) -> Balance {
        self.interest_portion + self.fixed_portion
    }
}

/// Computes the fee owed for `run_date`, accruing only the delta since
/// `last_run` so repeated runs never double-charge.
///
/// Interest accrues over the days since the later of `last_run` and
/// `due_date`. Fixed charges are owed once per full `frequency_days` window
/// elapsed since `due_date`; windows already charged by `last_run` are
/// subtracted, so a catch-up run after a gap charges every window missed and
/// a daily cadence charges exactly on window boundaries.
///
/// Returns `None` when the repayment is not yet overdue.
pub fn assess(
    config: &LateFeeConfig,
    outstanding: Balance,
    due_date: NaiveDate,
    run_date: NaiveDate,
    last_run: Option<NaiveDate>,
) -> Option<FeeAssessment> {
    let days_overdue = (run_date - due_date).num_days();
    if days_overdue <= 0 {
        return None;
    }

    let wants_interest = matches!(config.fee_type, FeeType::Interest | FeeType::Combined);
    let wants_fixed = matches!(config.fee_type, FeeType::Fixed | FeeType::Combined);

    let interest_portion = if wants_interest {
        let window_start = match last_run {
            Some(d) if d > due_date => d,
            _ => due_date,
        };
        let window_days = (run_date - window_start).num_days();
        if window_days > 0 {
            Balance::new(outstanding.0 * config.daily_rate * Decimal::from(window_days))
                .round_cents()
        } else {
            Balance::ZERO
        }
    } else {
        Balance::ZERO
    };

    let fixed_portion = if wants_fixed && config.frequency_days > 0 {
        let charges_owed = days_overdue / config.frequency_days;
        let charges_made = last_run
            .map(|d| ((d - due_date).num_days().max(0)) / config.frequency_days)
            .unwrap_or(0);
        let new_charges = (charges_owed - charges_made).max(0);
        Balance::new(config.fixed_fee.0 * Decimal::from(new_charges))
    } else {
        Balance::ZERO
    };

    Some(FeeAssessment {
        days_overdue,
        interest_portion,
        fixed_portion,
    })
}
