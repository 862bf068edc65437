//! Settings sections and their defaults

use super::logging_config::LoggingConfig;
use super::timeouts;
use crate::error::{TellerError, TellerResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level settings for the Teller service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub inference: InferenceSettings,
    pub cache: CacheSettings,
    pub fanout: FanoutSettings,
    pub prompts: PromptSettings,
    pub server: ServerSettings,
    pub sessions: SessionSettings,
    pub logging: LoggingConfig,
}

/// OpenAI-compatible inference endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    /// Base URL including the API version segment, e.g. `http://localhost:8000/v1`
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/v1".to_string(),
            api_key: None,
            model: "Qwen/Qwen3-30B-A3B-Instruct-2507".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            call_timeout: timeouts::inference::call_timeout(),
            connect_timeout: timeouts::inference::connect_timeout(),
        }
    }
}

/// Latency-based cache inference
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// A sample is a hit when `ttft <= hit_threshold * baseline`
    pub hit_threshold: f64,
    /// Number of samples kept in the rolling window
    pub history_capacity: usize,
    /// Block size (in tokens) of the server's prefix cache
    pub chunk_size: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            hit_threshold: 0.8,
            history_capacity: 10_000,
            chunk_size: 256,
        }
    }
}

/// Fan-out coordination
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutSettings {
    /// Attempts per agent, including the first
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub overall_deadline: Duration,
    pub max_agents: usize,
    /// Agent used when routing yields nothing usable
    pub default_agent: String,
    /// Agents whose uncertainty triggers escalation
    pub compliance_agents: Vec<String>,
    /// Phrases treated as uncertainty signals (matched case-insensitively)
    pub uncertainty_markers: Vec<String>,
}

impl Default for FanoutSettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_backoff: timeouts::fanout::retry_backoff(),
            overall_deadline: timeouts::fanout::overall_deadline(),
            max_agents: 3,
            default_agent: "technical_specialist".to_string(),
            compliance_agents: vec!["compliance_auditor".to_string()],
            uncertainty_markers: default_uncertainty_markers(),
        }
    }
}

fn default_uncertainty_markers() -> Vec<String> {
    [
        "I'm not certain",
        "This may require verification",
        "Please consult",
        "unclear from the manual",
        "The manual does not explicitly address",
        "low confidence",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Prompt assets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Operations manual injected into every static zone
    pub manual_path: PathBuf,
    /// Optional directory of `*.md` templates overriding the embedded ones
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            manual_path: PathBuf::from("data/operations_manual.txt"),
            template_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Turns kept per session; older turns are dropped first
    pub max_turns: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { max_turns: 50 }
    }
}

impl Settings {
    /// Reject settings that would make the pipeline misbehave silently
    pub fn validate(&self) -> TellerResult<()> {
        let cache = &self.cache;
        if !(cache.hit_threshold > 0.0 && cache.hit_threshold <= 1.0) {
            return Err(TellerError::config_with_context(
                format!("hit_threshold must be in (0, 1], got {}", cache.hit_threshold),
                "cache.hit_threshold",
            ));
        }
        if cache.history_capacity == 0 {
            return Err(TellerError::config_with_context(
                "history_capacity must be at least 1",
                "cache.history_capacity",
            ));
        }
        if cache.chunk_size == 0 {
            return Err(TellerError::config_with_context(
                "chunk_size must be at least 1",
                "cache.chunk_size",
            ));
        }

        let fanout = &self.fanout;
        if fanout.max_attempts == 0 {
            return Err(TellerError::config_with_context(
                "max_attempts must be at least 1",
                "fanout.max_attempts",
            ));
        }
        if !(1..=3).contains(&fanout.max_agents) {
            return Err(TellerError::config_with_context(
                format!("max_agents must be between 1 and 3, got {}", fanout.max_agents),
                "fanout.max_agents",
            ));
        }
        if fanout.overall_deadline.is_zero() {
            return Err(TellerError::config_with_context(
                "overall_deadline must be non-zero",
                "fanout.overall_deadline",
            ));
        }

        let inference = &self.inference;
        if inference.base_url.trim().is_empty() {
            return Err(TellerError::config_with_context(
                "base_url must not be empty",
                "inference.base_url",
            ));
        }
        if inference.model.trim().is_empty() {
            return Err(TellerError::config_with_context(
                "model must not be empty",
                "inference.model",
            ));
        }
        if inference.call_timeout.is_zero() || inference.connect_timeout.is_zero() {
            return Err(TellerError::config_with_context(
                "inference timeouts must be non-zero",
                "inference",
            ));
        }

        Ok(())
    }

    /// Render the effective settings as TOML
    pub fn to_toml(&self) -> TellerResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| TellerError::config(format!("Failed to serialize settings: {}", e)))
    }
}
