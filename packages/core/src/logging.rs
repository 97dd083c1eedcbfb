use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Default filter when `RUST_LOG` is unset: our own crate at `info`,
/// dependencies only when they warn.
const DEFAULT_FILTER: &str = "warn,myturn_notifier=info";

/// Initialize structured logging for the application.
///
/// This must be called once at startup (in main.rs). Logs go to stderr so
/// notification messages printed to stdout stay clean.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    info!("Logging initialized");
}
