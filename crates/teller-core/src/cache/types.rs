//! Sample and baseline types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of one latency sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheOutcome {
    /// The sample that established the cold baseline; never classified
    Baseline,
    Hit,
    Miss,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::Baseline => "baseline",
            CacheOutcome::Hit => "hit",
            CacheOutcome::Miss => "miss",
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, CacheOutcome::Hit)
    }
}

impl fmt::Display for CacheOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded inference call
#[derive(Debug, Clone, Serialize)]
pub struct LatencySample {
    pub agent_name: String,
    pub ttft_seconds: f64,
    pub timestamp: DateTime<Utc>,
    pub prefix_hash: String,
    pub outcome: CacheOutcome,
    /// `ttft / baseline`; `None` for the baseline sample itself
    pub ratio: Option<f64>,
}

/// Cold-cache reference latency
#[derive(Debug, Clone, Serialize)]
pub struct CacheBaseline {
    pub value_seconds: f64,
    pub established_at: DateTime<Utc>,
    pub sample_count_used: u32,
}

/// What [`super::CacheMetricsRegistry::record`] concluded about a sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheObservation {
    pub outcome: CacheOutcome,
    pub ratio: Option<f64>,
    pub baseline_seconds: f64,
    /// The sample's prefix hash differs from the first hash seen since reset
    pub prefix_mismatch: bool,
}
