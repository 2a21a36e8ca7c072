// island_realm/server/src/operational/logging.rs
use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "island_realm_core=info,warn";

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging() -> Result<()> {
    init_logging_with(DEFAULT_LOG_FILTER, false)
}

pub fn init_logging_with(default_filter: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_thread_names(true))
            .try_init()
            .context("Failed to initialize tracing subscriber")?;
    } else {
        registry
            .with(fmt::layer().with_thread_names(true))
            .try_init()
            .context("Failed to initialize tracing subscriber")?;
    }
    Ok(())
}
