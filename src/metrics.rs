use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    // Pre-register counters so they appear even before the first increment.
    counter!("trades_ingested_total").absolute(0);
    counter!("trades_updated_total").absolute(0);
    counter!("trade_upsert_errors_total").absolute(0);
    counter!("trades_flagged_total").absolute(0);
    counter!("escalations_created_total").absolute(0);
    counter!("trades_assigned_total").absolute(0);
    counter!("dispatch_conflicts_total").absolute(0);
    counter!("shifts_rotated_total").absolute(0);
    counter!("shift_force_closed_total").absolute(0);
    counter!("adapter_failures_total").absolute(0);

    gauge!("pending_trades").set(0.0);
    gauge!("available_operators").set(0.0);

    // Histogram is lazily created on first record; force creation.
    histogram!("ingestion_cycle_seconds").record(0.0);

    Ok(handle)
}
