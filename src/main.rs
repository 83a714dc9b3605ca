use std::sync::Arc;

use expirybot::api::router::create_router;
use expirybot::config::AppConfig;
use expirybot::db::{self, PgStore};
use expirybot::engine::{
    ExpirationOrchestrator, ExpirationQueries, InAppTransport, NotificationService,
    NotificationTransport, SignalTransitions, WebhookTransport,
};
use expirybot::store::ExpirationStore;
use expirybot::tasks::{
    run_expiration_scheduler, run_task_worker, SchedulerConfig, TaskQueue, TaskRunner,
};
use expirybot::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("Connecting to database...");
    let pool = db::init_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database connected");

    let metrics_handle = expirybot::metrics::init_metrics();

    let store: Arc<dyn ExpirationStore> = Arc::new(PgStore::new(pool));

    let transport: Arc<dyn NotificationTransport> = match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "Webhook notification transport enabled");
            Arc::new(WebhookTransport::new(url.clone()))
        }
        None => Arc::new(InAppTransport),
    };

    let queries = Arc::new(ExpirationQueries::new(store.clone()));
    let transitions = Arc::new(SignalTransitions::new(store.clone()));
    let notifications = Arc::new(NotificationService::new(store.clone(), transport));
    let orchestrator = Arc::new(ExpirationOrchestrator::new(
        store.clone(),
        transitions.clone(),
        notifications.clone(),
    ));

    // --- Task worker ---
    let (tasks, task_rx) = TaskQueue::new(256);
    let runner = Arc::new(TaskRunner::new(
        queries.clone(),
        transitions.clone(),
        orchestrator.clone(),
        notifications.clone(),
        config.default_grace_period_minutes,
    ));

    tokio::spawn(run_task_worker(task_rx, tasks.clone(), runner));

    // --- Scheduler ---
    if config.scheduler_enabled {
        let scheduler_config = SchedulerConfig {
            expiration_check_interval_secs: config.expiration_check_interval_secs,
            grace_period_check_interval_secs: config.grace_period_check_interval_secs,
            warning_interval_secs: config.warning_interval_secs,
            warning_lead_minutes: config.warning_lead_minutes,
        };
        tokio::spawn(run_expiration_scheduler(tasks.clone(), scheduler_config));
        tracing::info!(
            expiration_interval = config.expiration_check_interval_secs,
            grace_interval = config.grace_period_check_interval_secs,
            warning_interval = config.warning_interval_secs,
            "Expiration scheduler spawned"
        );
    } else {
        tracing::info!("Scheduler disabled (SCHEDULER_ENABLED=false)");
    }

    let state = AppState {
        store,
        config,
        queries,
        transitions,
        orchestrator,
        notifications,
        tasks,
        metrics_handle,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();
}
