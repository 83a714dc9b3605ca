use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::engine::{
    ExpirationCheck, ExpirationOrchestrator, ExpirationOutcome, ExpirationQueries,
    NotificationService, SignalTransitions,
};
use crate::errors::AppError;
use crate::models::{PositionStatus, SignalStatus};

use super::Task;

/// Result of a single-signal expiration check. `handled` is set only
/// when the signal actually transitioned this run.
#[derive(Debug, Serialize)]
pub struct CheckSignalOutcome {
    pub check: ExpirationCheck,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handled: Option<ExpirationOutcome>,
}

/// Aggregate over a batch of signals; one bad signal never aborts the
/// rest.
#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
    pub processed_count: usize,
    pub closed_count: usize,
    pub error_count: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct WarningsOutcome {
    pub signals_checked: usize,
    pub notifications_sent: usize,
    pub errors: Vec<String>,
}

/// Executes named tasks against the engine. Invoked by the worker loop
/// and directly by tests.
pub struct TaskRunner {
    queries: Arc<ExpirationQueries>,
    transitions: Arc<SignalTransitions>,
    orchestrator: Arc<ExpirationOrchestrator>,
    notifications: Arc<NotificationService>,
    default_grace_period_minutes: i64,
}

impl TaskRunner {
    pub fn new(
        queries: Arc<ExpirationQueries>,
        transitions: Arc<SignalTransitions>,
        orchestrator: Arc<ExpirationOrchestrator>,
        notifications: Arc<NotificationService>,
        default_grace_period_minutes: i64,
    ) -> Self {
        Self {
            queries,
            transitions,
            orchestrator,
            notifications,
            default_grace_period_minutes,
        }
    }

    /// Dispatch one task to its handler, serializing the outcome for
    /// the job registry.
    pub async fn run(&self, task: &Task) -> Result<serde_json::Value, AppError> {
        let result = match task {
            Task::CheckSignalExpiration { signal_id } => {
                serde_json::to_value(self.check_signal_expiration(*signal_id).await?)
            }
            Task::CheckAllExpirations => serde_json::to_value(self.check_all_expirations().await?),
            Task::CheckGracePeriods => serde_json::to_value(self.check_grace_periods().await?),
            Task::SendExpirationWarnings { minutes_before } => {
                serde_json::to_value(self.send_expiration_warnings(*minutes_before).await?)
            }
            Task::HandleSignalCancellation { signal_id } => {
                serde_json::to_value(self.handle_signal_cancellation(*signal_id).await?)
            }
        };
        result.map_err(|e| AppError::Internal(e.into()))
    }

    /// Re-running on an already-EXPIRED signal is a no-op: the check's
    /// state predicate gates the transition.
    pub async fn check_signal_expiration(
        &self,
        signal_id: Uuid,
    ) -> Result<CheckSignalOutcome, AppError> {
        let check = self.queries.check_expiration(signal_id, Utc::now()).await?;

        if check.is_expired && !check.is_in_grace_period {
            // Only a still-ACTIVE signal may transition; an already
            // EXPIRED or CLOSED signal makes this a no-op.
            let signal = self.queries.get_signal(signal_id).await?;
            if signal.status == SignalStatus::Active {
                let signal = self
                    .transitions
                    .mark_expired(signal.id, self.default_grace_period_minutes)
                    .await?;
                let handled = self.orchestrator.handle_expiration(&signal).await?;
                return Ok(CheckSignalOutcome {
                    check,
                    handled: Some(handled),
                });
            }
        }

        Ok(CheckSignalOutcome {
            check,
            handled: None,
        })
    }

    pub async fn check_all_expirations(&self) -> Result<BatchOutcome, AppError> {
        tracing::info!("Starting batch expiration check");

        let expired = self.queries.find_expired(Utc::now()).await?;
        let mut outcome = BatchOutcome::default();

        for signal in &expired {
            let attempt: Result<ExpirationOutcome, AppError> = async {
                let signal = self
                    .transitions
                    .mark_expired(signal.id, self.default_grace_period_minutes)
                    .await?;
                self.orchestrator.handle_expiration(&signal).await
            }
            .await;

            match attempt {
                Ok(handled) => {
                    outcome.processed_count += 1;
                    outcome.closed_count += handled.positions_closed;
                    if !handled.errors.is_empty() {
                        outcome.error_count += handled.errors.len();
                        outcome.errors.extend(handled.errors);
                    }
                }
                Err(e) => {
                    outcome.error_count += 1;
                    outcome.errors.push(format!("Signal {}: {e}", signal.id));
                }
            }
        }

        tracing::info!(
            processed = outcome.processed_count,
            closed = outcome.closed_count,
            errors = outcome.error_count,
            "Batch expiration check completed"
        );

        Ok(outcome)
    }

    pub async fn check_grace_periods(&self) -> Result<BatchOutcome, AppError> {
        tracing::info!("Starting grace period check");

        let signals = self.queries.find_in_grace_period(Utc::now()).await?;
        let mut outcome = BatchOutcome::default();

        for signal in &signals {
            match self.orchestrator.handle_grace_period_end(signal).await {
                Ok(handled) => {
                    outcome.processed_count += 1;
                    outcome.closed_count += handled.positions_closed;
                    if !handled.errors.is_empty() {
                        outcome.error_count += handled.errors.len();
                        outcome.errors.extend(handled.errors);
                    }
                }
                Err(e) => {
                    outcome.error_count += 1;
                    outcome.errors.push(format!("Signal {}: {e}", signal.id));
                }
            }
        }

        tracing::info!(
            processed = outcome.processed_count,
            closed = outcome.closed_count,
            "Grace period check completed"
        );

        Ok(outcome)
    }

    /// Pure notification fan-out; mutates no signal or position state.
    pub async fn send_expiration_warnings(
        &self,
        minutes_before: i64,
    ) -> Result<WarningsOutcome, AppError> {
        tracing::info!(minutes_before, "Sending expiration warnings");

        let now = Utc::now();
        let signals = self.queries.find_approaching(minutes_before, now).await?;
        let mut outcome = WarningsOutcome {
            signals_checked: signals.len(),
            ..Default::default()
        };

        for signal in &signals {
            let positions = self.queries.open_positions_for_signal(signal.id).await?;
            for position in positions
                .iter()
                .filter(|p| p.status == PositionStatus::Open)
            {
                let minutes_until = (signal.expires_at - now).num_minutes().max(0);
                match self
                    .notifications
                    .warn_expiring(position.user_id, signal, position, minutes_until)
                    .await
                {
                    Ok(Some(_)) => outcome.notifications_sent += 1,
                    Ok(None) => {} // duplicate suppressed
                    Err(e) => outcome
                        .errors
                        .push(format!("Position {}: {e}", position.id)),
                }
            }
        }

        tracing::info!(
            sent = outcome.notifications_sent,
            signals = outcome.signals_checked,
            "Expiration warnings sent"
        );

        Ok(outcome)
    }

    pub async fn handle_signal_cancellation(
        &self,
        signal_id: Uuid,
    ) -> Result<ExpirationOutcome, AppError> {
        let signal = self.transitions.cancel(signal_id).await?;
        self.orchestrator.handle_cancellation(&signal).await
    }
}
