use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use crate::protocol::Request;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total requests handled. Labels: op, status.
pub const REQUESTS_TOTAL: &str = "hrd_requests_total";

/// Histogram: request latency in seconds. Labels: op.
pub const REQUEST_DURATION_SECONDS: &str = "hrd_request_duration_seconds";

/// Counter: booking attempts. Labels: result.
pub const BOOKINGS_TOTAL: &str = "hrd_bookings_total";

/// Histogram: booking transaction latency in seconds, lock wait included.
pub const BOOKING_DURATION_SECONDS: &str = "hrd_booking_duration_seconds";

/// Counter: failed sign-ins.
pub const AUTH_FAILURES_TOTAL: &str = "hrd_auth_failures_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: live session tokens.
pub const SESSIONS_ACTIVE: &str = "hrd_sessions_active";

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "hrd_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "hrd_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "hrd_connections_rejected_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "hrd_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "hrd_wal_flush_batch_size";

/// Install the fmt subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a request to a short label for metrics.
pub fn op_label(request: &Request) -> &'static str {
    match request {
        Request::Ping => "ping",
        Request::SignUp { .. } => "sign_up",
        Request::SignIn { .. } => "sign_in",
        Request::Rooms => "rooms",
        Request::IsRoomAvailable { .. } => "is_room_available",
        Request::FreeWindows { .. } => "free_windows",
        Request::Reservation { .. } => "reservation",
        Request::MyReservations { .. } => "my_reservations",
        Request::ReserveRoom { .. } => "reserve_room",
        Request::UpdateReservation { .. } => "update_reservation",
        Request::DeleteReservation { .. } => "delete_reservation",
        Request::CreateRoom { .. } => "create_room",
        Request::DeleteRoom { .. } => "delete_room",
    }
}
