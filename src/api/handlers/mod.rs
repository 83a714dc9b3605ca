pub mod expiration;
pub mod health;
pub mod jobs;
pub mod metrics;
pub mod notifications;
pub mod preferences;
