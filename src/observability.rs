use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: bookings successfully created (including room moves).
pub const BOOKINGS_CREATED_TOTAL: &str = "atrium_bookings_created_total";

/// Counter: create/update attempts rejected with a slot conflict.
pub const BOOKING_CONFLICTS_TOTAL: &str = "atrium_booking_conflicts_total";

/// Counter: bookings cancelled.
pub const BOOKINGS_CANCELLED_TOTAL: &str = "atrium_bookings_cancelled_total";

/// Counter: available-room searches served.
pub const ROOM_SEARCHES_TOTAL: &str = "atrium_room_searches_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: rooms known to the engine.
pub const ROOMS: &str = "atrium_rooms";

/// Counter: time-driven status transitions applied by housekeeping.
pub const HOUSEKEEPING_TRANSITIONS_TOTAL: &str = "atrium_housekeeping_transitions_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "atrium_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "atrium_wal_flush_batch_size";

/// Install the Prometheus metrics exporter on the given port. No-op if port
/// is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
