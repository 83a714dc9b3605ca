use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    CopiedPosition, ExpirationNotification, NotificationStatus, PositionStatus, Signal,
    SignalOutcome, SignalStatus, UserExpirationPreference,
};

use super::ExpirationStore;

#[derive(Default)]
struct Inner {
    signals: HashMap<Uuid, Signal>,
    positions: HashMap<Uuid, CopiedPosition>,
    preferences: HashMap<Uuid, UserExpirationPreference>,
    notifications: Vec<ExpirationNotification>,
}

/// In-memory store used by integration tests and local experiments.
/// Mirrors the Postgres store's filter semantics exactly.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_signal(&self, signal: Signal) {
        self.inner.lock().unwrap().signals.insert(signal.id, signal);
    }

    pub fn insert_position(&self, position: CopiedPosition) {
        self.inner
            .lock()
            .unwrap()
            .positions
            .insert(position.id, position);
    }

    pub fn insert_preference(&self, preference: UserExpirationPreference) {
        self.inner
            .lock()
            .unwrap()
            .preferences
            .insert(preference.user_id, preference);
    }

    pub fn signal(&self, id: Uuid) -> Option<Signal> {
        self.inner.lock().unwrap().signals.get(&id).cloned()
    }

    pub fn position(&self, id: Uuid) -> Option<CopiedPosition> {
        self.inner.lock().unwrap().positions.get(&id).cloned()
    }

    pub fn all_notifications(&self) -> Vec<ExpirationNotification> {
        self.inner.lock().unwrap().notifications.clone()
    }
}

#[async_trait]
impl ExpirationStore for MemStore {
    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn get_signal(&self, id: Uuid) -> anyhow::Result<Option<Signal>> {
        Ok(self.inner.lock().unwrap().signals.get(&id).cloned())
    }

    async fn find_expired_signals(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Signal>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .signals
            .values()
            .filter(|s| s.status == SignalStatus::Active && s.expires_at <= now)
            .cloned()
            .collect())
    }

    async fn find_signals_in_grace_period(
        &self,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Signal>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .signals
            .values()
            .filter(|s| {
                s.status == SignalStatus::Expired
                    && s.outcome == Some(SignalOutcome::Expired)
                    && s.grace_period_ends_at.is_some_and(|g| g <= now)
            })
            .cloned()
            .collect())
    }

    async fn find_signals_approaching(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Signal>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .signals
            .values()
            .filter(|s| {
                s.status == SignalStatus::Active && s.expires_at > now && s.expires_at <= until
            })
            .cloned()
            .collect())
    }

    async fn update_signal(&self, signal: &Signal) -> anyhow::Result<()> {
        self.inner
            .lock()
            .unwrap()
            .signals
            .insert(signal.id, signal.clone());
        Ok(())
    }

    async fn open_positions_for_signal(
        &self,
        signal_id: Uuid,
    ) -> anyhow::Result<Vec<CopiedPosition>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .positions
            .values()
            .filter(|p| p.signal_id == signal_id && p.status == PositionStatus::Open)
            .cloned()
            .collect())
    }

    async fn open_positions_for_users(
        &self,
        user_ids: &[Uuid],
    ) -> anyhow::Result<Vec<CopiedPosition>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .positions
            .values()
            .filter(|p| p.status == PositionStatus::Open && user_ids.contains(&p.user_id))
            .cloned()
            .collect())
    }

    async fn count_open_positions(&self, signal_id: Uuid) -> anyhow::Result<i64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .positions
            .values()
            .filter(|p| p.signal_id == signal_id && p.status == PositionStatus::Open)
            .count() as i64)
    }

    async fn update_position(&self, position: &CopiedPosition) -> anyhow::Result<()> {
        self.inner
            .lock()
            .unwrap()
            .positions
            .insert(position.id, position.clone());
        Ok(())
    }

    async fn find_preference(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<Option<UserExpirationPreference>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .preferences
            .get(&user_id)
            .cloned())
    }

    async fn save_preference(
        &self,
        preference: &UserExpirationPreference,
    ) -> anyhow::Result<UserExpirationPreference> {
        self.inner
            .lock()
            .unwrap()
            .preferences
            .insert(preference.user_id, preference.clone());
        Ok(preference.clone())
    }

    async fn insert_notification(
        &self,
        notification: &ExpirationNotification,
    ) -> anyhow::Result<Option<ExpirationNotification>> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .notifications
            .iter()
            .any(|n| n.dedupe_key == notification.dedupe_key)
        {
            return Ok(None);
        }
        inner.notifications.push(notification.clone());
        Ok(Some(notification.clone()))
    }

    async fn update_notification(
        &self,
        notification: &ExpirationNotification,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(slot) = inner
            .notifications
            .iter_mut()
            .find(|n| n.id == notification.id)
        {
            *slot = notification.clone();
        }
        Ok(())
    }

    async fn get_notification(
        &self,
        id: Uuid,
    ) -> anyhow::Result<Option<ExpirationNotification>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .notifications
            .iter()
            .find(|n| n.id == id)
            .cloned())
    }

    async fn notifications_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<ExpirationNotification>> {
        let inner = self.inner.lock().unwrap();
        let mut all: Vec<_> = inner
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn unread_notifications(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<Vec<ExpirationNotification>> {
        let inner = self.inner.lock().unwrap();
        let mut all: Vec<_> = inner
            .notifications
            .iter()
            .filter(|n| {
                n.user_id == user_id
                    && n.status == NotificationStatus::Sent
                    && n.read_at.is_none()
            })
            .cloned()
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn mark_all_read(&self, user_id: Uuid, now: DateTime<Utc>) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let mut affected = 0u64;
        for n in inner
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && n.status == NotificationStatus::Sent)
        {
            n.status = NotificationStatus::Read;
            n.read_at = Some(now);
            affected += 1;
        }
        Ok(affected)
    }
}
