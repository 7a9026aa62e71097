use tracing::{info, warn};
use uuid::Uuid;

use super::state_machine::StateMachine;
use crate::domain::application::{Actor, ApplicationStatus, LoanApplication};
use crate::domain::ids::ApplicationId;
use crate::domain::ports::ApplicationStoreRef;
use crate::error::{LedgerError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct DisbursementOutcome {
    pub application: LoanApplication,
    pub reference: String,
    /// True when a retry with the same reference found the disbursement
    /// already recorded; nothing was written.
    pub already_applied: bool,
}

/// Pays out an approved application and activates the loan.
///
/// The reference number is recorded in the same atomic write that moves the
/// application to ACTIVE, so a retry with the same `(application,
/// reference)` pair is a no-op instead of a second payout.
#[derive(Clone)]
pub struct DisbursementProcessor {
    applications: ApplicationStoreRef,
    state_machine: StateMachine,
}

impl DisbursementProcessor {
    pub fn new(applications: ApplicationStoreRef, state_machine: StateMachine) -> Self {
        Self {
            applications,
            state_machine,
        }
    }

    /// Missing bank details block by default; `override_missing_bank_details`
    /// is the explicit operator escape hatch.
    pub async fn disburse(
        &self,
        id: ApplicationId,
        reference: Option<String>,
        actor: Actor,
        notes: Option<String>,
        override_missing_bank_details: bool,
    ) -> Result<DisbursementOutcome> {
        let mut app = self
            .applications
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("application", id))?;

        if app.status == ApplicationStatus::Active {
            // Retry detection: same reference means the earlier call won.
            if reference.is_some() && app.disbursement_reference == reference {
                info!(application_id = %id, "disbursement already recorded; no-op");
                return Ok(DisbursementOutcome {
                    reference: app
                        .disbursement_reference
                        .clone()
                        .unwrap_or_default(),
                    application: app,
                    already_applied: true,
                });
            }
            return Err(LedgerError::already_processed("application", id));
        }
        if app.status != ApplicationStatus::PendingDisbursement {
            return Err(LedgerError::InvalidTransition {
                from: app.status,
                to: ApplicationStatus::Active,
            });
        }

        if !app.has_bank_details() {
            if !override_missing_bank_details {
                return Err(LedgerError::InsufficientData(format!(
                    "application {id} is missing bank name or account number"
                )));
            }
            warn!(application_id = %id, "disbursing without complete bank details (operator override)");
        }

        let reference =
            reference.unwrap_or_else(|| format!("DSB-{}", Uuid::new_v4().simple()));
        app.disbursement_reference = Some(reference.clone());

        let application = self
            .state_machine
            .apply_transition(app, ApplicationStatus::Active, actor, notes)
            .await?;
        info!(application_id = %id, %reference,
            net = %application.net_disbursement, "loan disbursed");
        Ok(DisbursementOutcome {
            application,
            reference,
            already_applied: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::application::FeeSchedule;
    use crate::domain::late_fee::{FeeType, LateFeeConfig};
    use crate::domain::money::Balance;
    use crate::infrastructure::in_memory::InMemoryApplicationStore;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct Fixture {
        processor: DisbursementProcessor,
        machine: StateMachine,
    }

    fn fixture() -> Fixture {
        let store: ApplicationStoreRef = Arc::new(InMemoryApplicationStore::new());
        let machine = StateMachine::new(store.clone());
        Fixture {
            processor: DisbursementProcessor::new(store, machine.clone()),
            machine,
        }
    }

    async fn app_pending_disbursement(fx: &Fixture, with_bank: bool) -> LoanApplication {
        let mut app = LoanApplication::new(
            "Jane Doe",
            Balance::new(dec!(10000)),
            12,
            dec!(0.24),
            FeeSchedule::default(),
            LateFeeConfig {
                fee_type: FeeType::Interest,
                daily_rate: dec!(0.001),
                fixed_fee: Balance::ZERO,
                frequency_days: 7,
            },
            Utc::now(),
        );
        if with_bank {
            app.bank_name = Some("First Bank".into());
            app.bank_account_number = Some("0123456789".into());
        }
        let mut app = fx.machine.register(app, Actor::System).await.unwrap();
        while app.status != ApplicationStatus::PendingDisbursement {
            app = fx.machine.advance(app.id, Actor::System).await.unwrap();
        }
        app
    }

    #[tokio::test]
    async fn test_disburse_activates_loan() {
        let fx = fixture();
        let app = app_pending_disbursement(&fx, true).await;

        let outcome = fx
            .processor
            .disburse(app.id, Some("DSB-001".into()), Actor::User("ops-1".into()), None, false)
            .await
            .unwrap();
        assert!(!outcome.already_applied);
        assert_eq!(outcome.application.status, ApplicationStatus::Active);
        assert_eq!(
            outcome.application.disbursement_reference.as_deref(),
            Some("DSB-001")
        );
    }

    #[tokio::test]
    async fn test_retry_same_reference_is_noop() {
        let fx = fixture();
        let app = app_pending_disbursement(&fx, true).await;

        fx.processor
            .disburse(app.id, Some("DSB-001".into()), Actor::System, None, false)
            .await
            .unwrap();
        let retry = fx
            .processor
            .disburse(app.id, Some("DSB-001".into()), Actor::System, None, false)
            .await
            .unwrap();
        assert!(retry.already_applied);

        // Exactly one ACTIVE history row despite two calls.
        let history = fx.machine.history(app.id).await.unwrap();
        let active_rows = history
            .iter()
            .filter(|h| h.new_status == ApplicationStatus::Active)
            .count();
        assert_eq!(active_rows, 1);
    }

    #[tokio::test]
    async fn test_retry_different_reference_conflicts() {
        let fx = fixture();
        let app = app_pending_disbursement(&fx, true).await;

        fx.processor
            .disburse(app.id, Some("DSB-001".into()), Actor::System, None, false)
            .await
            .unwrap();
        let err = fx
            .processor
            .disburse(app.id, Some("DSB-002".into()), Actor::System, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyProcessed { .. }));
    }

    #[tokio::test]
    async fn test_missing_bank_details_block_unless_overridden() {
        let fx = fixture();
        let app = app_pending_disbursement(&fx, false).await;

        let err = fx
            .processor
            .disburse(app.id, None, Actor::System, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientData(_)));

        let outcome = fx
            .processor
            .disburse(app.id, None, Actor::System, None, true)
            .await
            .unwrap();
        assert_eq!(outcome.application.status, ApplicationStatus::Active);
        assert!(outcome.reference.starts_with("DSB-"));
    }

    #[tokio::test]
    async fn test_wrong_state_rejected() {
        let fx = fixture();
        let app = LoanApplication::new(
            "Jane Doe",
            Balance::new(dec!(1000)),
            6,
            dec!(0.2),
            FeeSchedule::default(),
            LateFeeConfig {
                fee_type: FeeType::Interest,
                daily_rate: dec!(0.001),
                fixed_fee: Balance::ZERO,
                frequency_days: 7,
            },
            Utc::now(),
        );
        let app = fx.machine.register(app, Actor::System).await.unwrap();

        let err = fx
            .processor
            .disburse(app.id, None, Actor::System, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));
    }
}
