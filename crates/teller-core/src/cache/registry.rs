//! Cache metrics registry
//!
//! All state lives behind one mutex: establishing the baseline, classifying a
//! sample and updating the totals happen in a single critical section, and
//! reports copy a consistent snapshot under the same lock.

use super::report::{CacheEfficiencyReport, CacheGrade, recommendation};
use super::types::{CacheBaseline, CacheObservation, CacheOutcome, LatencySample};
use crate::config::CacheSettings;
use crate::error::{TellerError, TellerResult};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, info, warn};

const RECENT_WINDOW: usize = 10;

#[derive(Debug, Default)]
struct Totals {
    total: u64,
    hits: u64,
    misses: u64,
    ttft_sum: f64,
    ttft_min: Option<f64>,
    ttft_max: Option<f64>,
}

#[derive(Debug, Default)]
struct RegistryState {
    /// Rolling window, oldest first
    samples: VecDeque<LatencySample>,
    baseline: Option<CacheBaseline>,
    totals: Totals,
    /// Distinct prefix hashes since reset; survives window eviction
    prefix_hashes: BTreeSet<String>,
    first_prefix_hash: Option<String>,
}

#[derive(Debug)]
pub struct CacheMetricsRegistry {
    hit_threshold: f64,
    capacity: usize,
    state: Mutex<RegistryState>,
}

impl CacheMetricsRegistry {
    /// Create a registry with an explicit threshold and window capacity
    pub fn new(hit_threshold: f64, capacity: usize) -> TellerResult<Self> {
        if !(hit_threshold > 0.0 && hit_threshold <= 1.0) {
            return Err(TellerError::invalid_input_field(
                format!("hit threshold must be in (0, 1], got {}", hit_threshold),
                "hit_threshold",
            ));
        }
        if capacity == 0 {
            return Err(TellerError::invalid_input_field(
                "history capacity must be at least 1",
                "history_capacity",
            ));
        }
        Ok(Self {
            hit_threshold,
            capacity,
            state: Mutex::new(RegistryState::default()),
        })
    }

    /// Create a registry from settings; the registry starts without a baseline
    pub fn init(settings: &CacheSettings) -> TellerResult<Self> {
        let registry = Self::new(settings.hit_threshold, settings.history_capacity)?;
        info!(
            hit_threshold = settings.hit_threshold,
            capacity = settings.history_capacity,
            "cache metrics registry initialized"
        );
        Ok(registry)
    }

    pub fn hit_threshold(&self) -> f64 {
        self.hit_threshold
    }

    /// Record one call's time to first token.
    ///
    /// The first sample after init or reset becomes the baseline and is not
    /// classified. Later samples are a hit when `ttft <= hit_threshold * baseline`.
    /// Non-finite or non-positive values are rejected and nothing is recorded.
    pub fn record(
        &self,
        agent_name: &str,
        ttft_seconds: f64,
        prefix_hash: &str,
    ) -> TellerResult<CacheObservation> {
        if !ttft_seconds.is_finite() || ttft_seconds <= 0.0 {
            return Err(TellerError::invalid_input_field(
                format!("ttft must be a positive number of seconds, got {}", ttft_seconds),
                "ttft_seconds",
            ));
        }

        let now = Utc::now();
        let (observation, established) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            let first_hash = state
                .first_prefix_hash
                .get_or_insert_with(|| prefix_hash.to_string());
            let prefix_mismatch = first_hash.as_str() != prefix_hash;
            if !state.prefix_hashes.contains(prefix_hash) {
                state.prefix_hashes.insert(prefix_hash.to_string());
            }

            let (observation, established) = match state.baseline.as_ref().map(|b| b.value_seconds) {
                None => {
                    state.baseline = Some(CacheBaseline {
                        value_seconds: ttft_seconds,
                        established_at: now,
                        sample_count_used: 1,
                    });
                    let observation = CacheObservation {
                        outcome: CacheOutcome::Baseline,
                        ratio: None,
                        baseline_seconds: ttft_seconds,
                        prefix_mismatch,
                    };
                    (observation, true)
                }
                Some(baseline_seconds) => {
                    let outcome = if ttft_seconds <= self.hit_threshold * baseline_seconds {
                        CacheOutcome::Hit
                    } else {
                        CacheOutcome::Miss
                    };
                    let observation = CacheObservation {
                        outcome,
                        ratio: Some(ttft_seconds / baseline_seconds),
                        baseline_seconds,
                        prefix_mismatch,
                    };
                    (observation, false)
                }
            };

            let totals = &mut state.totals;
            totals.total += 1;
            match observation.outcome {
                CacheOutcome::Hit => totals.hits += 1,
                CacheOutcome::Miss => totals.misses += 1,
                CacheOutcome::Baseline => {}
            }
            totals.ttft_sum += ttft_seconds;
            totals.ttft_min = Some(totals.ttft_min.map_or(ttft_seconds, |m| m.min(ttft_seconds)));
            totals.ttft_max = Some(totals.ttft_max.map_or(ttft_seconds, |m| m.max(ttft_seconds)));

            if state.samples.len() == self.capacity {
                state.samples.pop_front();
            }
            state.samples.push_back(LatencySample {
                agent_name: agent_name.to_string(),
                ttft_seconds,
                timestamp: now,
                prefix_hash: prefix_hash.to_string(),
                outcome: observation.outcome,
                ratio: observation.ratio,
            });

            (observation, established)
        };

        if established {
            info!(
                agent = agent_name,
                baseline_seconds = ttft_seconds,
                prefix_hash,
                "cold cache baseline established"
            );
        } else {
            debug!(
                agent = agent_name,
                ttft_seconds,
                ratio = observation.ratio.unwrap_or_default(),
                outcome = %observation.outcome,
                "classified latency sample"
            );
        }
        if observation.prefix_mismatch {
            warn!(
                agent = agent_name,
                prefix_hash,
                "prefix hash differs from the first observed prefix; cache reuse is unlikely"
            );
        }

        Ok(observation)
    }

    /// Snapshot of all aggregate figures since the last reset
    pub fn report(&self) -> CacheEfficiencyReport {
        let state = self.state.lock();
        let totals = &state.totals;

        let classified = totals.hits + totals.misses;
        let hit_rate = if classified == 0 {
            None
        } else {
            Some(totals.hits as f64 / classified as f64)
        };
        let avg = (totals.total > 0).then(|| totals.ttft_sum / totals.total as f64);

        let recent: Vec<f64> = state
            .samples
            .iter()
            .rev()
            .take(RECENT_WINDOW)
            .map(|s| s.ttft_seconds)
            .collect();
        let avg_recent =
            (!recent.is_empty()).then(|| recent.iter().sum::<f64>() / recent.len() as f64);

        let unique = state.prefix_hashes.len();

        CacheEfficiencyReport {
            total_requests: totals.total,
            classified_requests: classified,
            cache_hits: totals.hits,
            cache_misses: totals.misses,
            inferred_cache_hit_rate: hit_rate,
            prefix_alignment_ok: unique == 1,
            unique_prefix_hashes: unique,
            cold_cache_baseline_seconds: state.baseline.as_ref().map(|b| b.value_seconds),
            avg_ttft_seconds: avg,
            min_ttft_seconds: totals.ttft_min,
            max_ttft_seconds: totals.ttft_max,
            avg_ttft_last_10: avg_recent,
            hit_threshold: self.hit_threshold,
            grade: CacheGrade::from_hit_rate(hit_rate),
            recommendation: recommendation(totals.total, unique),
        }
    }

    pub fn baseline(&self) -> Option<CacheBaseline> {
        self.state.lock().baseline.clone()
    }

    /// Copy of the rolling window, oldest first
    pub fn samples(&self) -> Vec<LatencySample> {
        self.state.lock().samples.iter().cloned().collect()
    }

    /// Clear samples, totals, prefix hashes and the baseline
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let dropped = state.totals.total;
        *state = RegistryState::default();
        drop(state);
        info!(dropped_samples = dropped, "cache metrics registry reset");
    }

    /// Final report, consuming the registry
    pub fn teardown(self) -> CacheEfficiencyReport {
        let report = self.report();
        info!(
            total_requests = report.total_requests,
            hit_rate = report.inferred_cache_hit_rate.unwrap_or_default(),
            grade = %report.grade,
            "cache metrics registry torn down"
        );
        report
    }
}
