use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggerConfig;
use crate::formatter::RedactedFormatter;
use crate::redactor::PiiRedactor;

/// Installs the process-wide tracing subscriber. Call once, at startup.
pub fn init(config: &LoggerConfig) -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer().event_format(RedactedFormatter::new(
        if config.redaction_enabled {
            PiiRedactor::default()
        } else {
            PiiRedactor::passthrough()
        },
    ));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
