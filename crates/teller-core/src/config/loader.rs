//! Layered settings loading

use super::settings::Settings;
use crate::error::{TellerError, TellerResult};
use config::{Config, Environment, File};
use std::path::Path;
use tracing::debug;

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "teller.toml";

/// Prefix of environment overrides, e.g. `TELLER__CACHE__HIT_THRESHOLD=0.75`
pub const ENV_PREFIX: &str = "TELLER";

/// Load settings from defaults, an optional file and the environment.
///
/// An explicit `path` must exist. Without one, `teller.toml` in the working
/// directory is used when present. The file format follows the extension
/// (toml, yaml, json). A `.env` file is read first.
pub fn load_settings(path: Option<&Path>) -> TellerResult<Settings> {
    dotenv::dotenv().ok();

    let mut builder = Config::builder();

    match path {
        Some(path) => {
            if !path.exists() {
                return Err(TellerError::config_with_context(
                    "Configuration file not found",
                    path.display().to_string(),
                ));
            }
            debug!(path = %path.display(), "loading settings file");
            builder = builder.add_source(File::from(path).required(true));
        }
        None => {
            builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("fanout.compliance_agents"),
    );

    let settings: Settings = builder
        .build()
        .map_err(|e| TellerError::config_with_context(e.to_string(), "building settings"))?
        .try_deserialize()
        .map_err(|e| TellerError::config_with_context(e.to_string(), "deserializing settings"))?;

    settings.validate()?;
    Ok(settings)
}
