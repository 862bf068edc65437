//! tracing-subscriber initialisation

use teller_core::config::{LogFormat, LoggingConfig};
use teller_core::error::{TellerError, TellerResult};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(config: &LoggingConfig, verbose: bool) -> TellerResult<()> {
    let directive = if verbose {
        format!("{},teller_core=debug,teller=debug", config.level)
    } else {
        config.level.clone()
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directive))
        .map_err(|e| TellerError::config_with_context(e.to_string(), "logging.level"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| TellerError::config(format!("failed to install log subscriber: {}", e)))
}
