//! Wire types of the HTTP API that are not pipeline types

use serde::{Deserialize, Serialize};
use teller_core::error::{TellerError, UnifiedError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub status: String,
}

/// Error body returned with every non-2xx status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<&TellerError> for ErrorResponse {
    fn from(err: &TellerError) -> Self {
        Self {
            error: err.to_string(),
            code: err.error_code().to_string(),
        }
    }
}

/// Subset of a query response the benchmark reads back
#[derive(Debug, Clone, Deserialize)]
pub struct BenchQueryResponse {
    pub session_id: String,
    pub agents_used: Vec<String>,
    pub ttft_seconds: f64,
    #[serde(default)]
    pub degraded: bool,
}

/// Subset of `/cache/stats` printed by the benchmark
#[derive(Debug, Clone, Deserialize)]
pub struct CacheStats {
    pub total_requests: u64,
    pub inferred_cache_hit_rate: Option<f64>,
    pub prefix_alignment_ok: bool,
    pub unique_prefix_hashes: usize,
    pub cold_cache_baseline_seconds: Option<f64>,
    pub avg_ttft_seconds: Option<f64>,
    pub grade: String,
    pub recommendation: String,
}
