pub mod config;
pub mod diagnostic;
pub mod emr;
pub mod importer;
pub mod loader;
pub mod models;

use tracing_subscriber::EnvFilter;

/// Install the stderr tracing subscriber. Stdout stays free for progress.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
}
