//! Structured logging setup.
//!
//! Initializes a `tracing` subscriber with `RUST_LOG` env-filter support,
//! INFO as the default level, and JSON output when `RUST_LOG_FORMAT=json`.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber.
///
/// Call once at program startup; subsequent calls are no-ops.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("audsum=info"));

    let is_json = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    if is_json {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}
