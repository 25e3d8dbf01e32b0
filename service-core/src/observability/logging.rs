use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the JSON tracing subscriber.
///
/// Idempotent: a second call (e.g. from another test in the same binary) is
/// a no-op rather than a panic.
pub fn init_tracing(service_name: &str, log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .json()
                .flatten_event(true),
        )
        .try_init();

    if result.is_ok() {
        tracing::info!(service = service_name, "Tracing initialized");
    }
}
