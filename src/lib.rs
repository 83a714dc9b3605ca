pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod store;
pub mod tasks;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::engine::{
    ExpirationOrchestrator, ExpirationQueries, NotificationService, SignalTransitions,
};
use crate::store::ExpirationStore;
use crate::tasks::TaskQueue;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ExpirationStore>,
    pub config: AppConfig,
    pub queries: Arc<ExpirationQueries>,
    pub transitions: Arc<SignalTransitions>,
    pub orchestrator: Arc<ExpirationOrchestrator>,
    pub notifications: Arc<NotificationService>,
    pub tasks: TaskQueue,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}
