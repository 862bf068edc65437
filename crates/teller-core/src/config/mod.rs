//! Configuration for the Teller pipeline
//!
//! Settings are layered: built-in defaults, then an optional TOML/YAML/JSON
//! file, then `TELLER__SECTION__KEY` environment variables.

mod loader;
mod logging_config;
mod settings;
pub mod timeouts;

pub use loader::{DEFAULT_CONFIG_FILE, ENV_PREFIX, load_settings};
pub use logging_config::{LogFormat, LoggingConfig};
pub use settings::{
    CacheSettings, FanoutSettings, InferenceSettings, PromptSettings, ServerSettings,
    SessionSettings, Settings,
};
