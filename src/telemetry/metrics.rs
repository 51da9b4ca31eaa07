//! Prometheus metrics

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Completed reconciliation cycles
    Cycles,
    /// Orders cancelled and re-placed at the EMA
    Replacements,
    /// Per-order failures inside a cycle
    OrderErrors,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Records the loop still works on
    ActiveOrders,
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    let metric_name = match metric {
        CounterMetric::Cycles => "ematrail_cycles_total",
        CounterMetric::Replacements => "ematrail_order_replacements_total",
        CounterMetric::OrderErrors => "ematrail_order_errors_total",
    };
    ::metrics::counter!(metric_name).increment(1);
}

/// Count an order reaching a terminal status
pub fn record_finalized(status: &'static str) {
    ::metrics::counter!("ematrail_orders_finalized_total", "status" => status).increment(1);
}

/// Record how long one reconciliation cycle took
pub fn record_cycle_duration(duration: Duration) {
    ::metrics::histogram!("ematrail_cycle_duration_ms").record(duration.as_secs_f64() * 1000.0);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let metric_name = match metric {
        GaugeMetric::ActiveOrders => "ematrail_active_orders",
    };
    ::metrics::gauge!(metric_name).set(value);
}

/// Serve `/metrics` on all interfaces at `port`
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;

    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}
