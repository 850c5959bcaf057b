use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Reads `QCAT_TRACE` (falling back to `RUST_LOG`, then `"info"`) the same
/// way the CLI reads `KNHK_TRACE`: a handful of named levels plus the
/// boolean spellings some deployment tooling emits.
pub fn init_tracing() {
    let level = std::env::var("QCAT_TRACE")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase();

    let filter = match level.as_str() {
        "error" => EnvFilter::new("error"),
        "warn" => EnvFilter::new("warn"),
        "info" => EnvFilter::new("info"),
        "debug" => EnvFilter::new("debug"),
        "trace" => EnvFilter::new("trace"),
        "1" | "true" | "yes" => EnvFilter::new("debug"),
        "0" | "false" | "no" => EnvFilter::new("error"),
        other => EnvFilter::try_new(other).unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(false));

    // Idempotent: re-running Start/Stop/Start in tests must not panic on a
    // second global subscriber install.
    let _ = registry.try_init();
}
