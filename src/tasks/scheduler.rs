use tokio::time::{interval, Duration, MissedTickBehavior};

use super::TaskQueue;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub expiration_check_interval_secs: u64,
    pub grace_period_check_interval_secs: u64,
    pub warning_interval_secs: u64,
    pub warning_lead_minutes: i64,
}

/// Enqueue the recurring batch tasks on their timers. Delivery is
/// at-least-once from the handlers' point of view; the dedupe key and
/// the state predicates make re-runs harmless.
pub async fn run_expiration_scheduler(queue: TaskQueue, config: SchedulerConfig) {
    let mut expiration_tick = interval(Duration::from_secs(config.expiration_check_interval_secs));
    let mut grace_tick = interval(Duration::from_secs(config.grace_period_check_interval_secs));
    let mut warning_tick = interval(Duration::from_secs(config.warning_interval_secs));
    expiration_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    grace_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    warning_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = expiration_tick.tick() => {
                if let Err(e) = queue.queue_batch_expiration_check().await {
                    tracing::error!(error = %e, "Failed to enqueue batch expiration check");
                }
            }
            _ = grace_tick.tick() => {
                if let Err(e) = queue.queue_grace_period_check().await {
                    tracing::error!(error = %e, "Failed to enqueue grace period check");
                }
            }
            _ = warning_tick.tick() => {
                if let Err(e) = queue.queue_expiration_warnings(config.warning_lead_minutes).await {
                    tracing::error!(error = %e, "Failed to enqueue expiration warnings");
                }
            }
        }
    }
}
