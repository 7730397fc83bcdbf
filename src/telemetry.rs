// 📡 Logging setup
//
// `RUST_LOG` wins over the configured level. JSON output for log shippers,
// plain text for terminals.

use crate::config::LogConfig;
use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_tracing(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry
            .with(fmt::layer().json().with_target(false))
            .try_init()
            .map_err(|e| anyhow!("failed to initialise tracing: {e}"))?;
    } else {
        registry
            .with(fmt::layer().with_target(false))
            .try_init()
            .map_err(|e| anyhow!("failed to initialise tracing: {e}"))?;
    }

    tracing::debug!(level = %config.level, json = config.json, "tracing initialised");
    Ok(())
}
