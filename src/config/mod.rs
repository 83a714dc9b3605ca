use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,

    // Scheduler
    pub scheduler_enabled: bool,
    pub expiration_check_interval_secs: u64,
    pub grace_period_check_interval_secs: u64,
    pub warning_interval_secs: u64,
    pub warning_lead_minutes: i64,

    // Expiration policy
    pub default_grace_period_minutes: i64,

    // Notifications
    pub notify_webhook_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,

            scheduler_enabled: env::var("SCHEDULER_ENABLED")
                .unwrap_or_else(|_| "true".into())
                .parse()
                .unwrap_or(true),
            expiration_check_interval_secs: env::var("EXPIRATION_CHECK_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .unwrap_or(60),
            grace_period_check_interval_secs: env::var("GRACE_PERIOD_CHECK_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .unwrap_or(60),
            warning_interval_secs: env::var("WARNING_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".into())
                .parse()
                .unwrap_or(300),
            warning_lead_minutes: env::var("WARNING_LEAD_MINUTES")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .unwrap_or(60),

            default_grace_period_minutes: env::var("DEFAULT_GRACE_PERIOD_MINUTES")
                .unwrap_or_else(|_| "30".into())
                .parse()
                .unwrap_or(30),

            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok(),
        })
    }
}
