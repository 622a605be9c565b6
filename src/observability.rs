use std::net::SocketAddr;

// ── Fetch metrics ───────────────────────────────────────────────

/// Counter: month fetches issued.
pub const FETCHES_TOTAL: &str = "slotcal_fetches_total";

/// Counter: month fetches that resolved to an error.
pub const FETCH_FAILURES_TOTAL: &str = "slotcal_fetch_failures_total";

/// Gauge: month fetches currently outstanding.
pub const FETCHES_IN_FLIGHT: &str = "slotcal_fetches_in_flight";

/// Histogram: month fetch latency in seconds.
pub const FETCH_DURATION_SECONDS: &str = "slotcal_fetch_duration_seconds";

// ── Engine metrics ──────────────────────────────────────────────

/// Counter: resolution passes. Labels: unit_type.
pub const RESOLUTION_PASSES_TOTAL: &str = "slotcal_resolution_passes_total";

/// Gauge: listings with a live coordinator.
pub const LISTINGS_ACTIVE: &str = "slotcal_listings_active";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
