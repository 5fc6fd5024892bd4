use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "fire_game=info";

/// Installs the global subscriber, writing to stderr.
///
/// `RUST_LOG` overrides the default `fire_game=info` filter. Calling this
/// more than once is harmless; later calls are ignored.
pub fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false),
        )
        .try_init();

    if result.is_ok() {
        tracing::debug!("logging initialized");
    }
}
