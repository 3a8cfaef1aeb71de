use std::sync::Once;

use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "DOCVER_LOG";

const DEFAULT_FILTER: &str = "warn";

static INIT_ONCE: Once = Once::new();

/// Install a stderr `fmt` subscriber filtered by `DOCVER_LOG`.
///
/// Runs at most once per process. If the host already installed a global
/// subscriber, that one is kept.
pub fn init() {
    INIT_ONCE.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish()
            .try_init();
    });
}
