use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // Pre-register counters so they appear even before the first increment.
    counter!("signals_expired_total").absolute(0);
    counter!("signals_cancelled_total").absolute(0);
    counter!("positions_auto_closed_total").absolute(0);
    counter!("notifications_sent_total").absolute(0);
    counter!("notifications_failed_total").absolute(0);
    counter!("tasks_processed_total").absolute(0);
    counter!("tasks_failed_total").absolute(0);

    handle
}
