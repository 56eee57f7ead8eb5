//! Logging setup

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Used when `RUST_LOG` is unset or unparsable
pub const DEFAULT_FILTER: &str = "info,hyper=info,h2=info";

/// `RUST_LOG`, falling back to [`DEFAULT_FILTER`]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Formatting subscriber gated only by `filter`
pub fn subscriber(filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync + 'static {
    FmtSubscriber::builder().with_env_filter(filter).finish()
}

/// Install the global subscriber
pub fn init_logging() -> anyhow::Result<()> {
    tracing::subscriber::set_global_default(subscriber(env_filter()))?;
    Ok(())
}
