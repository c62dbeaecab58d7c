use crate::config::{DaemonConfig, LogFormat};
use anyhow::Context;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber. Everything goes to stderr: stdout carries
/// the response stream.
pub fn init_logging(config: &DaemonConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("invalid log filter: {}", config.log_level))?;
    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    match config.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .try_init()?,
    }
    Ok(())
}
