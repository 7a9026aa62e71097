//! Application layer containing the servicing engines.
//!
//! Each engine orchestrates one ledger concern over the domain ports: the
//! status state machine gates the rest, accrual and the waterfall move
//! money, approval and reconciliation feed the waterfall, disbursement
//! activates loans.

pub mod accrual;
pub mod approval;
pub mod disbursement;
pub mod reconciliation;
pub mod state_machine;
pub mod waterfall;
