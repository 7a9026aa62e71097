use chrono::Utc;
use tracing::info;

use crate::domain::application::{Actor, ApplicationHistory, ApplicationStatus, LoanApplication};
use crate::domain::ids::ApplicationId;
use crate::domain::ports::ApplicationStoreRef;
use crate::error::{LedgerError, Result};

/// Validates and applies application-status transitions.
///
/// Every transition persists the status change together with one append-only
/// history row in a single atomic unit; the other engines gate on the states
/// this machine produces.
#[derive(Clone)]
pub struct StateMachine {
    applications: ApplicationStoreRef,
}

impl StateMachine {
    pub fn new(applications: ApplicationStoreRef) -> Self {
        Self { applications }
    }

    /// Registers a new application, writing its creation history row
    /// (`previous_status` = None).
    pub async fn register(&self, app: LoanApplication, actor: Actor) -> Result<LoanApplication> {
        let history = ApplicationHistory::new(
            app.id,
            None,
            app.status,
            actor,
            None,
            Utc::now(),
        );
        self.applications.create(app.clone(), history).await?;
        info!(application_id = %app.id, status = %app.status, "application registered");
        Ok(app)
    }

    /// Moves an application to `new_status` if the edge exists in the graph.
    pub async fn transition(
        &self,
        id: ApplicationId,
        new_status: ApplicationStatus,
        actor: Actor,
        notes: Option<String>,
    ) -> Result<LoanApplication> {
        let app = self
            .applications
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("application", id))?;
        self.apply_transition(app, new_status, actor, notes).await
    }

    /// Like [`transition`](Self::transition) but on an already-loaded (and
    /// possibly locally mutated) application, so callers can fold extra
    /// field updates into the same atomic write. The store still verifies
    /// the persisted status matches the expected previous status.
    pub async fn apply_transition(
        &self,
        mut app: LoanApplication,
        new_status: ApplicationStatus,
        actor: Actor,
        notes: Option<String>,
    ) -> Result<LoanApplication> {
        let previous = app.status;
        if !previous.can_transition_to(new_status) {
            return Err(LedgerError::InvalidTransition {
                from: previous,
                to: new_status,
            });
        }

        let now = Utc::now();
        app.status = new_status;
        app.updated_at = now;
        let history =
            ApplicationHistory::new(app.id, Some(previous), new_status, actor, notes, now);

        self.applications
            .persist_transition(app.clone(), history)
            .await?;
        info!(application_id = %app.id, from = %previous, to = %new_status, "application transitioned");
        Ok(app)
    }

    /// Advances to the single legal next status on the happy path.
    pub async fn advance(&self, id: ApplicationId, actor: Actor) -> Result<LoanApplication> {
        let app = self
            .applications
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("application", id))?;
        let next = app
            .status
            .next()
            .ok_or(LedgerError::NoNextState(app.status))?;
        self.apply_transition(app, next, actor, None).await
    }

    pub async fn history(&self, id: ApplicationId) -> Result<Vec<ApplicationHistory>> {
        self.applications.history(id).await
    }
}
