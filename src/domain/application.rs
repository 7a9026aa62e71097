use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::ids::ApplicationId;
use super::late_fee::LateFeeConfig;
use super::money::Balance;

/// Lifecycle states of a loan application.
///
/// The ordered happy path runs `Incomplete` through `Active`; `Withdrawn` is
/// reachable from any pre-`Active` state. `Rejected`, `Withdrawn` and
/// `Active` are terminal for this machine (loan-level default/recovery is a
/// separate concern).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Incomplete,
    PendingAppFee,
    PendingKyc,
    PendingApproval,
    Approved,
    Rejected,
    PendingSignature,
    PendingDisbursement,
    Active,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Withdrawn | Self::Active)
    }

    /// Whether `next` is a legal edge in the transition graph.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ApplicationStatus::*;
        match (self, next) {
            (Incomplete, PendingAppFee)
            | (PendingAppFee, PendingKyc)
            | (PendingKyc, PendingApproval)
            | (PendingApproval, Approved)
            | (PendingApproval, Rejected)
            | (Approved, PendingSignature)
            | (PendingSignature, PendingDisbursement)
            | (PendingDisbursement, Active) => true,
            (from, Withdrawn) => !from.is_terminal(),
            _ => false,
        }
    }

    /// The single legal next state on the happy path, used by manual
    /// advancement. `None` on terminal states.
    pub fn next(self) -> Option<Self> {
        use ApplicationStatus::*;
        match self {
            Incomplete => Some(PendingAppFee),
            PendingAppFee => Some(PendingKyc),
            PendingKyc => Some(PendingApproval),
            PendingApproval => Some(Approved),
            Approved => Some(PendingSignature),
            PendingSignature => Some(PendingDisbursement),
            PendingDisbursement => Some(Active),
            Rejected | Withdrawn | Active => None,
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Incomplete => "INCOMPLETE",
            Self::PendingAppFee => "PENDING_APP_FEE",
            Self::PendingKyc => "PENDING_KYC",
            Self::PendingApproval => "PENDING_APPROVAL",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::PendingSignature => "PENDING_SIGNATURE",
            Self::PendingDisbursement => "PENDING_DISBURSEMENT",
            Self::Active => "ACTIVE",
            Self::Withdrawn => "WITHDRAWN",
        };
        f.write_str(s)
    }
}

/// The authenticated identity behind a mutating call, recorded in history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    System,
    User(String),
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("System"),
            Self::User(id) => f.write_str(id),
        }
    }
}

/// Upfront fees deducted from the disbursed amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub origination: Balance,
    pub legal: Balance,
    pub stamping: Balance,
    pub application: Balance,
}

impl FeeSchedule {
    pub fn total(&self) -> Balance {
        self.origination + self.legal + self.stamping + self.application
    }
}

/// A loan application as seen by the servicing ledger.
///
/// Owned by origination; the ledger only ever mutates `status` (through the
/// state machine) and the disbursement reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: ApplicationId,
    pub status: ApplicationStatus,
    pub borrower_name: String,
    pub amount: Balance,
    pub term_months: u32,
    /// Annual interest rate as a fraction, e.g. 0.24 for 24%.
    pub interest_rate: Decimal,
    pub fees: FeeSchedule,
    pub net_disbursement: Balance,
    pub bank_name: Option<String>,
    pub bank_account_number: Option<String>,
    pub disbursement_reference: Option<String>,
    pub late_fee: LateFeeConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanApplication {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        borrower_name: impl Into<String>,
        amount: Balance,
        term_months: u32,
        interest_rate: Decimal,
        fees: FeeSchedule,
        late_fee: LateFeeConfig,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApplicationId::new(),
            status: ApplicationStatus::Incomplete,
            borrower_name: borrower_name.into(),
            amount,
            term_months,
            interest_rate,
            fees,
            net_disbursement: amount.saturating_sub(fees.total()),
            bank_name: None,
            bank_account_number: None,
            disbursement_reference: None,
            late_fee,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn has_bank_details(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        filled(&self.bank_name) && filled(&self.bank_account_number)
    }
}

/// One append-only row per status transition. `previous_status` is `None`
/// only on the creation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationHistory {
    pub id: Uuid,
    pub application_id: ApplicationId,
    pub previous_status: Option<ApplicationStatus>,
    pub new_status: ApplicationStatus,
    pub changed_by: Actor,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ApplicationHistory {
    pub fn new(
        application_id: ApplicationId,
        previous_status: Option<ApplicationStatus>,
        new_status: ApplicationStatus,
        changed_by: Actor,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            application_id,
            previous_status,
            new_status,
            changed_by,
            notes,
            created_at,
        }
    }
}
