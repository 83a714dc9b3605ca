use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{CopiedPosition, Signal};
use crate::store::ExpirationStore;

/// Pure read-side check for one signal, computed from current
/// timestamps with no mutation.
#[derive(Debug, Clone, Serialize)]
pub struct ExpirationCheck {
    pub signal_id: Uuid,
    pub is_expired: bool,
    pub is_in_grace_period: bool,
    pub grace_period_ends_at: Option<DateTime<Utc>>,
    pub open_positions_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpirationSummary {
    pub checked_at: DateTime<Utc>,
    pub total_expired: usize,
    pub total_in_grace_period: usize,
    pub signals: Vec<ExpirationCheck>,
}

/// Read-only expiration queries. This is the only place time
/// comparisons happen; every method takes `now` explicitly so there is
/// a single source of truth for "is this expired".
pub struct ExpirationQueries {
    store: Arc<dyn ExpirationStore>,
}

impl ExpirationQueries {
    pub fn new(store: Arc<dyn ExpirationStore>) -> Self {
        Self { store }
    }

    pub async fn get_signal(&self, signal_id: Uuid) -> Result<Signal, AppError> {
        self.store
            .get_signal(signal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Signal {signal_id} not found")))
    }

    /// ACTIVE signals already past their expiry instant.
    pub async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<Signal>, AppError> {
        Ok(self.store.find_expired_signals(now).await?)
    }

    /// EXPIRED signals whose grace window has elapsed.
    pub async fn find_in_grace_period(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Signal>, AppError> {
        Ok(self.store.find_signals_in_grace_period(now).await?)
    }

    /// ACTIVE signals expiring within the next `minutes_before` minutes.
    pub async fn find_approaching(
        &self,
        minutes_before: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Signal>, AppError> {
        let until = now + Duration::minutes(minutes_before);
        Ok(self.store.find_signals_approaching(now, until).await?)
    }

    pub async fn open_positions_for_signal(
        &self,
        signal_id: Uuid,
    ) -> Result<Vec<CopiedPosition>, AppError> {
        Ok(self.store.open_positions_for_signal(signal_id).await?)
    }

    pub async fn open_positions_for_users(
        &self,
        user_ids: &[Uuid],
    ) -> Result<Vec<CopiedPosition>, AppError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.open_positions_for_users(user_ids).await?)
    }

    pub async fn check_expiration(
        &self,
        signal_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ExpirationCheck, AppError> {
        let signal = self
            .store
            .get_signal(signal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Signal {signal_id} not found")))?;

        let is_expired = signal.expires_at <= now;
        let is_in_grace_period =
            is_expired && signal.grace_period_ends_at.is_some_and(|g| g > now);
        let open_positions_count = self.store.count_open_positions(signal_id).await?;

        Ok(ExpirationCheck {
            signal_id: signal.id,
            is_expired,
            is_in_grace_period,
            grace_period_ends_at: signal.grace_period_ends_at,
            open_positions_count,
        })
    }

    /// Snapshot of everything currently expired or in grace, with the
    /// per-signal check result for each.
    pub async fn expiration_summary(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ExpirationSummary, AppError> {
        let expired = self.find_expired(now).await?;
        let in_grace = self.find_in_grace_period(now).await?;

        let mut signals = Vec::with_capacity(expired.len() + in_grace.len());
        for signal in expired.iter().chain(in_grace.iter()) {
            signals.push(self.check_expiration(signal.id, now).await?);
        }

        Ok(ExpirationSummary {
            checked_at: now,
            total_expired: expired.len(),
            total_in_grace_period: in_grace.len(),
            signals,
        })
    }
}
