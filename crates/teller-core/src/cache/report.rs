//! Cache efficiency report

use serde::{Serialize, Serializer};
use std::fmt;

/// Letter grade derived from the inferred hit rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheGrade {
    A,
    B,
    C,
    F,
    /// No classified samples yet
    NotApplicable,
}

impl CacheGrade {
    /// `>= 0.8` A, `>= 0.6` B, `>= 0.3` C, else F; no rate is N/A
    pub fn from_hit_rate(hit_rate: Option<f64>) -> Self {
        match hit_rate {
            None => CacheGrade::NotApplicable,
            Some(rate) if rate >= 0.8 => CacheGrade::A,
            Some(rate) if rate >= 0.6 => CacheGrade::B,
            Some(rate) if rate >= 0.3 => CacheGrade::C,
            Some(_) => CacheGrade::F,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheGrade::A => "A",
            CacheGrade::B => "B",
            CacheGrade::C => "C",
            CacheGrade::F => "F",
            CacheGrade::NotApplicable => "N/A",
        }
    }
}

impl fmt::Display for CacheGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CacheGrade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Point-in-time snapshot of cache efficiency since the last reset
#[derive(Debug, Clone, Serialize)]
pub struct CacheEfficiencyReport {
    /// Every recorded sample, baseline included
    pub total_requests: u64,
    /// Samples classified against the baseline (`total_requests - 1` once a baseline exists)
    pub classified_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// `cache_hits / classified_requests`; `None` when nothing is classified
    pub inferred_cache_hit_rate: Option<f64>,
    /// Exactly one distinct prefix hash has been observed
    pub prefix_alignment_ok: bool,
    pub unique_prefix_hashes: usize,
    pub cold_cache_baseline_seconds: Option<f64>,
    pub avg_ttft_seconds: Option<f64>,
    pub min_ttft_seconds: Option<f64>,
    pub max_ttft_seconds: Option<f64>,
    /// Mean over the most recent ten samples still in the window
    pub avg_ttft_last_10: Option<f64>,
    pub hit_threshold: f64,
    pub grade: CacheGrade,
    pub recommendation: String,
}

impl CacheEfficiencyReport {
    /// Speedup of the average warm request over the cold baseline
    pub fn speedup(&self) -> Option<f64> {
        match (self.cold_cache_baseline_seconds, self.avg_ttft_last_10) {
            (Some(baseline), Some(recent)) if recent > 0.0 => Some(baseline / recent),
            _ => None,
        }
    }
}

pub(super) fn recommendation(total: u64, unique_hashes: usize) -> String {
    if total == 0 {
        "No requests recorded yet. Send some queries first.".to_string()
    } else if unique_hashes == 1 {
        "Prefix is aligned; cache should be effective.".to_string()
    } else {
        format!(
            "Found {} different prefix hashes; the prefix cache is being invalidated. Check prompt normalization.",
            unique_hashes
        )
    }
}
