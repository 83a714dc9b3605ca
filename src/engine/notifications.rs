use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use metrics::counter;
use serde_json::json;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    AutoCloseReason, CopiedPosition, ExpirationNotification, NotificationChannel,
    NotificationKind, NotificationStatus, Signal,
};
use crate::store::ExpirationStore;

/// Delivery channel abstraction. Failures are reported back, recorded
/// as a terminal FAILED status, and never block the owning flow.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    fn channel(&self) -> NotificationChannel;

    async fn deliver(&self, notification: &ExpirationNotification) -> anyhow::Result<()>;
}

/// Record-only channel: the persisted notification row *is* the
/// in-app inbox entry, so delivery always succeeds.
pub struct InAppTransport;

#[async_trait]
impl NotificationTransport for InAppTransport {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::InApp
    }

    async fn deliver(&self, _notification: &ExpirationNotification) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Posts the notification JSON to a configured webhook endpoint.
pub struct WebhookTransport {
    http: reqwest::Client,
    url: String,
}

impl WebhookTransport {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl NotificationTransport for WebhookTransport {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Webhook
    }

    async fn deliver(&self, notification: &ExpirationNotification) -> anyhow::Result<()> {
        let resp = self.http.post(&self.url).json(notification).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("webhook returned {}", resp.status());
        }
        Ok(())
    }
}

/// Creates notification records for lifecycle events, attempts
/// delivery, and tracks delivery/read state.
pub struct NotificationService {
    store: Arc<dyn ExpirationStore>,
    transport: Arc<dyn NotificationTransport>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn ExpirationStore>, transport: Arc<dyn NotificationTransport>) -> Self {
        Self { store, transport }
    }

    /// Persist as PENDING, attempt delivery, then record SENT or
    /// FAILED. Returns None when the dedupe key suppressed a duplicate.
    async fn create_and_send(
        &self,
        notification: ExpirationNotification,
    ) -> Result<Option<ExpirationNotification>, AppError> {
        let Some(mut stored) = self.store.insert_notification(&notification).await? else {
            tracing::debug!(
                user_id = %notification.user_id,
                kind = %notification.kind,
                "Duplicate notification suppressed by dedupe key"
            );
            return Ok(None);
        };

        match self.transport.deliver(&stored).await {
            Ok(()) => {
                stored.status = NotificationStatus::Sent;
                stored.sent_at = Some(Utc::now());
                counter!("notifications_sent_total").increment(1);
            }
            Err(e) => {
                // Terminal within this engine; retry is the caller's business.
                stored.status = NotificationStatus::Failed;
                counter!("notifications_failed_total").increment(1);
                tracing::warn!(
                    error = %e,
                    notification_id = %stored.id,
                    "Notification delivery failed"
                );
            }
        }

        self.store.update_notification(&stored).await?;
        Ok(Some(stored))
    }

    pub async fn warn_expiring(
        &self,
        user_id: Uuid,
        signal: &Signal,
        position: &CopiedPosition,
        minutes_until_expiration: i64,
    ) -> Result<Option<ExpirationNotification>, AppError> {
        let notification = ExpirationNotification::new(
            user_id,
            Some(signal.id),
            Some(position.id),
            NotificationKind::ExpirationWarning,
            self.transport.channel(),
            "Signal Expiring Soon",
            format!(
                "Your position in {} will expire in {} minutes. Please review your position.",
                signal.pair(),
                minutes_until_expiration
            ),
            json!({
                "signalId": signal.id,
                "positionId": position.id,
                "baseAsset": signal.base_asset,
                "counterAsset": signal.counter_asset,
                "expiresAt": signal.expires_at,
                "minutesUntilExpiration": minutes_until_expiration,
            }),
        );
        self.create_and_send(notification).await
    }

    pub async fn notify_grace_period_started(
        &self,
        user_id: Uuid,
        signal: &Signal,
        position: &CopiedPosition,
        grace_period_minutes: i64,
    ) -> Result<Option<ExpirationNotification>, AppError> {
        let grace_period_ends_at = Utc::now() + Duration::minutes(grace_period_minutes);
        let notification = ExpirationNotification::new(
            user_id,
            Some(signal.id),
            Some(position.id),
            NotificationKind::GracePeriodStarted,
            self.transport.channel(),
            "Grace Period Started",
            format!(
                "The signal for {} has expired. Your position will remain open for {} more minutes.",
                signal.pair(),
                grace_period_minutes
            ),
            json!({
                "signalId": signal.id,
                "positionId": position.id,
                "baseAsset": signal.base_asset,
                "counterAsset": signal.counter_asset,
                "gracePeriodMinutes": grace_period_minutes,
                "gracePeriodEndsAt": grace_period_ends_at,
            }),
        );
        self.create_and_send(notification).await
    }

    pub async fn notify_auto_closed(
        &self,
        user_id: Uuid,
        signal: &Signal,
        position: &CopiedPosition,
        reason: AutoCloseReason,
    ) -> Result<Option<ExpirationNotification>, AppError> {
        let notification = ExpirationNotification::new(
            user_id,
            Some(signal.id),
            Some(position.id),
            NotificationKind::PositionAutoClosed,
            self.transport.channel(),
            "Position Auto-Closed",
            format!(
                "Your position in {} has been automatically closed due to {}.",
                signal.pair(),
                reason.describe()
            ),
            json!({
                "signalId": signal.id,
                "positionId": position.id,
                "baseAsset": signal.base_asset,
                "counterAsset": signal.counter_asset,
                "reason": reason,
                "closedAt": Utc::now(),
                "pnlPercentage": position.pnl_percentage,
                "pnlAbsolute": position.pnl_absolute,
            }),
        );
        self.create_and_send(notification).await
    }

    pub async fn notify_cancelled(
        &self,
        user_id: Uuid,
        signal: &Signal,
        position: &CopiedPosition,
    ) -> Result<Option<ExpirationNotification>, AppError> {
        let notification = ExpirationNotification::new(
            user_id,
            Some(signal.id),
            Some(position.id),
            NotificationKind::SignalCancelled,
            self.transport.channel(),
            "Signal Cancelled",
            format!(
                "The signal provider has cancelled the {} signal. Your position has been closed.",
                signal.pair()
            ),
            json!({
                "signalId": signal.id,
                "positionId": position.id,
                "baseAsset": signal.base_asset,
                "counterAsset": signal.counter_asset,
                "cancelledAt": Utc::now(),
            }),
        );
        self.create_and_send(notification).await
    }

    pub async fn notify_expired_no_action(
        &self,
        user_id: Uuid,
        signal: &Signal,
        position: &CopiedPosition,
    ) -> Result<Option<ExpirationNotification>, AppError> {
        let notification = ExpirationNotification::new(
            user_id,
            Some(signal.id),
            Some(position.id),
            NotificationKind::SignalExpired,
            self.transport.channel(),
            "Signal Expired",
            format!(
                "The {} signal has expired. Your position remains open - please decide what action to take.",
                signal.pair()
            ),
            json!({
                "signalId": signal.id,
                "positionId": position.id,
                "baseAsset": signal.base_asset,
                "counterAsset": signal.counter_asset,
                "expiredAt": Utc::now(),
            }),
        );
        self.create_and_send(notification).await
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ExpirationNotification>, AppError> {
        Ok(self
            .store
            .notifications_for_user(user_id, limit, offset)
            .await?)
    }

    pub async fn unread(&self, user_id: Uuid) -> Result<Vec<ExpirationNotification>, AppError> {
        Ok(self.store.unread_notifications(user_id).await?)
    }

    pub async fn mark_read(&self, id: Uuid) -> Result<ExpirationNotification, AppError> {
        let mut notification = self
            .store
            .get_notification(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Notification {id} not found")))?;

        notification.status = NotificationStatus::Read;
        notification.read_at = Some(Utc::now());
        self.store.update_notification(&notification).await?;

        Ok(notification)
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, AppError> {
        Ok(self.store.mark_all_read(user_id, Utc::now()).await?)
    }
}
