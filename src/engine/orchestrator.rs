use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    AutoCloseReason, CopiedPosition, PositionStatus, Signal, SignalOutcome,
    UserExpirationPreference,
};
use crate::store::ExpirationStore;

use super::notifications::NotificationService;
use super::policy::{plan_for, PolicyNotice};
use super::transitions::SignalTransitions;

/// Per-position entry in an [`ExpirationOutcome`].
#[derive(Debug, Clone, Serialize)]
pub struct PositionCloseResult {
    pub position_id: Uuid,
    pub user_id: Uuid,
    pub success: bool,
    pub reason: AutoCloseReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Uniform result of processing one signal's open positions. Partial
/// failures are recorded per unit, never raised.
#[derive(Debug, Clone, Serialize)]
pub struct ExpirationOutcome {
    pub signal_id: Uuid,
    pub processed_at: DateTime<Utc>,
    pub positions_processed: usize,
    pub positions_closed: usize,
    pub positions_notified: usize,
    pub errors: Vec<String>,
    pub results: Vec<PositionCloseResult>,
}

impl ExpirationOutcome {
    fn empty(signal_id: Uuid) -> Self {
        Self {
            signal_id,
            processed_at: Utc::now(),
            positions_processed: 0,
            positions_closed: 0,
            positions_notified: 0,
            errors: Vec::new(),
            results: Vec::new(),
        }
    }
}

/// The policy engine: enumerates affected open positions, resolves the
/// per-user preference, dispatches through the policy table, closes
/// positions, and drives notifications. One bad position never aborts
/// the batch.
pub struct ExpirationOrchestrator {
    store: Arc<dyn ExpirationStore>,
    transitions: Arc<SignalTransitions>,
    notifications: Arc<NotificationService>,
}

impl ExpirationOrchestrator {
    pub fn new(
        store: Arc<dyn ExpirationStore>,
        transitions: Arc<SignalTransitions>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            store,
            transitions,
            notifications,
        }
    }

    /// Dispatch every open position on an expired signal according to
    /// its owner's preference.
    pub async fn handle_expiration(&self, signal: &Signal) -> Result<ExpirationOutcome, AppError> {
        tracing::info!(signal_id = %signal.id, "Handling expiration");

        let positions = self.store.open_positions_for_signal(signal.id).await?;
        let mut outcome = ExpirationOutcome::empty(signal.id);
        outcome.positions_processed = positions.len();

        for position in &positions {
            match self.process_position_expiration(signal, position).await {
                Ok((result, closed, notified)) => {
                    if closed {
                        outcome.positions_closed += 1;
                    }
                    if notified {
                        outcome.positions_notified += 1;
                    }
                    outcome.results.push(result);
                }
                Err(e) => {
                    outcome
                        .errors
                        .push(format!("Position {}: {e}", position.id));
                    outcome.results.push(PositionCloseResult {
                        position_id: position.id,
                        user_id: position.user_id,
                        success: false,
                        reason: AutoCloseReason::SignalExpired,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Provider-initiated cancellation: close every open position
    /// unconditionally, ignoring per-user preferences.
    pub async fn handle_cancellation(
        &self,
        signal: &Signal,
    ) -> Result<ExpirationOutcome, AppError> {
        tracing::info!(signal_id = %signal.id, "Handling cancellation");

        let positions = self.store.open_positions_for_signal(signal.id).await?;
        let mut outcome = ExpirationOutcome::empty(signal.id);
        outcome.positions_processed = positions.len();

        for position in &positions {
            let attempt: Result<(), AppError> = async {
                self.close_position(position, AutoCloseReason::SignalCancelled)
                    .await?;
                self.notifications
                    .notify_cancelled(position.user_id, signal, position)
                    .await?;
                Ok(())
            }
            .await;

            match attempt {
                Ok(()) => {
                    outcome.positions_closed += 1;
                    outcome.positions_notified += 1;
                    outcome.results.push(PositionCloseResult {
                        position_id: position.id,
                        user_id: position.user_id,
                        success: true,
                        reason: AutoCloseReason::SignalCancelled,
                        error: None,
                    });
                }
                Err(e) => {
                    outcome
                        .errors
                        .push(format!("Position {}: {e}", position.id));
                    outcome.results.push(PositionCloseResult {
                        position_id: position.id,
                        user_id: position.user_id,
                        success: false,
                        reason: AutoCloseReason::SignalCancelled,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Grace window elapsed: force-close every still-open position,
    /// then drive the signal itself to CLOSED(EXPIRED) exactly once.
    pub async fn handle_grace_period_end(
        &self,
        signal: &Signal,
    ) -> Result<ExpirationOutcome, AppError> {
        tracing::info!(signal_id = %signal.id, "Handling grace period end");

        let positions = self.store.open_positions_for_signal(signal.id).await?;
        let mut outcome = ExpirationOutcome::empty(signal.id);
        outcome.positions_processed = positions.len();

        for position in &positions {
            let attempt: Result<(), AppError> = async {
                self.close_position(position, AutoCloseReason::GracePeriodEnded)
                    .await?;
                self.notifications
                    .notify_auto_closed(
                        position.user_id,
                        signal,
                        position,
                        AutoCloseReason::GracePeriodEnded,
                    )
                    .await?;
                Ok(())
            }
            .await;

            match attempt {
                Ok(()) => {
                    outcome.positions_closed += 1;
                    outcome.positions_notified += 1;
                    outcome.results.push(PositionCloseResult {
                        position_id: position.id,
                        user_id: position.user_id,
                        success: true,
                        reason: AutoCloseReason::GracePeriodEnded,
                        error: None,
                    });
                }
                Err(e) => {
                    outcome
                        .errors
                        .push(format!("Position {}: {e}", position.id));
                    outcome.results.push(PositionCloseResult {
                        position_id: position.id,
                        user_id: position.user_id,
                        success: false,
                        reason: AutoCloseReason::GracePeriodEnded,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        // Grace expiry is terminal for the signal as well. Position
        // failures above do not block this; they stay in errors[].
        self.transitions
            .mark_closed(signal.id, SignalOutcome::Expired)
            .await?;

        Ok(outcome)
    }

    async fn process_position_expiration(
        &self,
        signal: &Signal,
        position: &CopiedPosition,
    ) -> Result<(PositionCloseResult, bool, bool), AppError> {
        let preference = self.get_or_create_preference(position.user_id).await?;
        let plan = plan_for(preference.default_action);

        let mut closed = false;
        if let Some(reason) = plan.close_with {
            closed = self.close_position(position, reason).await?;
        }

        let mut notified = false;
        match plan.notice {
            Some(PolicyNotice::AutoClosed) => {
                if preference.notify_on_auto_close {
                    self.notifications
                        .notify_auto_closed(
                            position.user_id,
                            signal,
                            position,
                            AutoCloseReason::SignalExpired,
                        )
                        .await?;
                    notified = true;
                }
            }
            Some(PolicyNotice::SignalExpired) => {
                self.notifications
                    .notify_expired_no_action(position.user_id, signal, position)
                    .await?;
                notified = true;
            }
            Some(PolicyNotice::GracePeriodStarted) => {
                if preference.notify_on_grace_period_start {
                    self.notifications
                        .notify_grace_period_started(
                            position.user_id,
                            signal,
                            position,
                            preference.grace_period_minutes as i64,
                        )
                        .await?;
                    notified = true;
                }
            }
            None => {}
        }

        // USER_MANUAL is the sentinel for "no closure occurred".
        let reason = plan.close_with.unwrap_or(AutoCloseReason::UserManual);

        Ok((
            PositionCloseResult {
                position_id: position.id,
                user_id: position.user_id,
                success: true,
                reason,
                error: None,
            },
            closed,
            notified,
        ))
    }

    /// OPEN -> AUTO_CLOSED in a single update. No-ops on a position
    /// that already left OPEN, so re-processing is idempotent.
    pub async fn close_position(
        &self,
        position: &CopiedPosition,
        reason: AutoCloseReason,
    ) -> Result<bool, AppError> {
        if !position.is_open() {
            tracing::debug!(
                position_id = %position.id,
                status = ?position.status,
                "Position already terminal, skipping close"
            );
            return Ok(false);
        }

        let mut updated = position.clone();
        updated.status = PositionStatus::AutoClosed;
        updated.auto_close_reason = Some(reason);
        updated.closed_at = Some(Utc::now());

        self.store.update_position(&updated).await?;
        counter!("positions_auto_closed_total").increment(1);
        tracing::info!(
            position_id = %position.id,
            reason = %reason,
            "Position auto-closed"
        );

        Ok(true)
    }

    /// First-access materialization of the per-user policy record.
    pub async fn get_or_create_preference(
        &self,
        user_id: Uuid,
    ) -> Result<UserExpirationPreference, AppError> {
        if let Some(preference) = self.store.find_preference(user_id).await? {
            return Ok(preference);
        }

        let preference = UserExpirationPreference::defaults_for(user_id);
        Ok(self.store.save_preference(&preference).await?)
    }
}
