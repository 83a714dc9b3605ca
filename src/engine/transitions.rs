use std::sync::Arc;

use chrono::{Duration, Utc};
use metrics::counter;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Signal, SignalOutcome, SignalStatus};
use crate::store::ExpirationStore;

/// Owns the signal state machine. Each transition is a single record
/// update; callers must not re-invoke on an already-terminal signal.
pub struct SignalTransitions {
    store: Arc<dyn ExpirationStore>,
}

impl SignalTransitions {
    pub fn new(store: Arc<dyn ExpirationStore>) -> Self {
        Self { store }
    }

    async fn load(&self, signal_id: Uuid) -> Result<Signal, AppError> {
        self.store
            .get_signal(signal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Signal {signal_id} not found")))
    }

    /// ACTIVE -> EXPIRED. A positive grace period opens a window during
    /// which positions stay untouched; zero closes the signal's clock
    /// immediately (the position-level policy decision still runs once).
    pub async fn mark_expired(
        &self,
        signal_id: Uuid,
        grace_period_minutes: i64,
    ) -> Result<Signal, AppError> {
        let mut signal = self.load(signal_id).await?;
        let now = Utc::now();

        signal.status = SignalStatus::Expired;
        signal.outcome = Some(SignalOutcome::Expired);
        if grace_period_minutes > 0 {
            signal.grace_period_ends_at = Some(now + Duration::minutes(grace_period_minutes));
        } else {
            signal.closed_at = Some(now);
        }

        self.store.update_signal(&signal).await?;
        counter!("signals_expired_total").increment(1);
        tracing::info!(
            signal_id = %signal_id,
            grace_period_minutes,
            "Signal marked as expired"
        );

        Ok(signal)
    }

    /// EXPIRED (grace elapsed) -> CLOSED. Consumes the grace window for
    /// good; the signal never re-enters EXPIRED.
    pub async fn mark_closed(
        &self,
        signal_id: Uuid,
        outcome: SignalOutcome,
    ) -> Result<Signal, AppError> {
        let mut signal = self.load(signal_id).await?;

        signal.status = SignalStatus::Closed;
        signal.outcome = Some(outcome);
        signal.grace_period_ends_at = None;
        signal.closed_at = Some(Utc::now());

        self.store.update_signal(&signal).await?;
        tracing::info!(signal_id = %signal_id, outcome = %outcome, "Signal closed");

        Ok(signal)
    }

    /// ACTIVE -> CANCELLED, provider-initiated.
    pub async fn cancel(&self, signal_id: Uuid) -> Result<Signal, AppError> {
        let mut signal = self.load(signal_id).await?;

        signal.status = SignalStatus::Cancelled;
        signal.outcome = Some(SignalOutcome::Cancelled);
        signal.grace_period_ends_at = None;
        signal.closed_at = Some(Utc::now());

        self.store.update_signal(&signal).await?;
        counter!("signals_cancelled_total").increment(1);
        tracing::info!(signal_id = %signal_id, "Signal cancelled by provider");

        Ok(signal)
    }
}
