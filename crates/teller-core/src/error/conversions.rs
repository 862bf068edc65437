//! From trait implementations for TellerError conversions

use super::types::TellerError;

impl From<std::io::Error> for TellerError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<serde_json::Error> for TellerError {
    fn from(error: serde_json::Error) -> Self {
        Self::json(error.to_string())
    }
}

impl From<serde_yaml::Error> for TellerError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::other(format!("YAML error: {}", error))
    }
}

impl From<config::ConfigError> for TellerError {
    fn from(error: config::ConfigError) -> Self {
        Self::config(error.to_string())
    }
}

impl From<reqwest::Error> for TellerError {
    fn from(error: reqwest::Error) -> Self {
        let status_code = error.status().map(|s| s.as_u16());
        let context = error.url().map(|u| u.to_string());
        Self::InferenceCallFailed {
            message: error.to_string(),
            status_code,
            context,
        }
    }
}

impl From<anyhow::Error> for TellerError {
    fn from(error: anyhow::Error) -> Self {
        Self::other(error.to_string())
    }
}
