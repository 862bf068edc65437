//! Pipeline metrics exposed at `/metrics`

use super::metrics::{Exposition, Gauge, LabeledCounter, LabeledHistogram};
use crate::cache::{CacheEfficiencyReport, CacheObservation, CacheOutcome};

/// TTFT histogram bucket bounds in seconds
pub const TTFT_BUCKETS: [f64; 10] = [0.5, 1.0, 2.0, 3.0, 5.0, 10.0, 15.0, 20.0, 30.0, 60.0];

#[derive(Debug)]
pub struct TellerMetrics {
    pub requests: LabeledCounter<2>,
    pub ttft: LabeledHistogram<1>,
    pub cache_hits: LabeledCounter<1>,
    pub cache_misses: LabeledCounter<1>,
    pub prefix_mismatches: LabeledCounter<1>,
    pub cold_baseline: Gauge,
    pub hit_rate: Gauge,
    pub prefix_tokens: Gauge,
}

impl Default for TellerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TellerMetrics {
    pub fn new() -> Self {
        Self {
            requests: LabeledCounter::new(
                "teller_requests_total",
                "Inference calls by agent and status",
                ["agent", "status"],
            ),
            ttft: LabeledHistogram::with_buckets(
                "teller_ttft_seconds",
                "Time to first token per agent call",
                ["agent"],
                &TTFT_BUCKETS,
            ),
            cache_hits: LabeledCounter::new(
                "teller_cache_hits_total",
                "Calls inferred to be served from the prefix cache",
                ["agent"],
            ),
            cache_misses: LabeledCounter::new(
                "teller_cache_misses_total",
                "Calls inferred to have recomputed the prefix",
                ["agent"],
            ),
            prefix_mismatches: LabeledCounter::new(
                "teller_prefix_mismatches_total",
                "Calls whose prefix hash differed from the first observed hash",
                ["agent"],
            ),
            cold_baseline: Gauge::new(
                "teller_cold_cache_baseline_seconds",
                "TTFT of the sample that established the cold baseline",
            ),
            hit_rate: Gauge::new(
                "teller_cache_hit_rate",
                "Inferred cache hit rate since the last reset",
            ),
            prefix_tokens: Gauge::new(
                "teller_prefix_tokens_estimated",
                "Estimated token length of the shared static prefix",
            ),
        }
    }

    /// Count one finished call (`status` is `success` or `error`)
    pub fn record_call(&self, agent: &str, status: &str) {
        self.requests.inc([agent, status]);
    }

    /// Account for one successful call and its cache classification
    pub fn record_latency(&self, agent: &str, ttft_seconds: f64, observation: &CacheObservation) {
        self.ttft.observe([agent], ttft_seconds);
        match observation.outcome {
            CacheOutcome::Hit => self.cache_hits.inc([agent]),
            CacheOutcome::Miss => self.cache_misses.inc([agent]),
            CacheOutcome::Baseline => self.cold_baseline.set(observation.baseline_seconds),
        }
        if observation.prefix_mismatch {
            self.prefix_mismatches.inc([agent]);
        }
    }

    /// Refresh the gauges derived from the registry
    pub fn sync_report(&self, report: &CacheEfficiencyReport) {
        self.cold_baseline
            .set(report.cold_cache_baseline_seconds.unwrap_or_default());
        self.hit_rate
            .set(report.inferred_cache_hit_rate.unwrap_or_default());
    }

    /// Clear the gauges that describe the registry after a reset
    pub fn reset_cache_gauges(&self) {
        self.cold_baseline.reset();
        self.hit_rate.reset();
    }

    /// Prometheus text exposition of every metric
    pub fn render(&self) -> String {
        let metrics: [&dyn Exposition; 8] = [
            &self.requests,
            &self.ttft,
            &self.cache_hits,
            &self.cache_misses,
            &self.prefix_mismatches,
            &self.cold_baseline,
            &self.hit_rate,
            &self.prefix_tokens,
        ];
        let mut out = String::new();
        for metric in metrics {
            metric.write_prometheus(&mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(outcome: CacheOutcome, mismatch: bool) -> CacheObservation {
        CacheObservation {
            outcome,
            ratio: None,
            baseline_seconds: 2.5,
            prefix_mismatch: mismatch,
        }
    }

    #[test]
    fn test_record_latency_updates_series() {
        let metrics = TellerMetrics::new();
        metrics.record_latency("router", 2.5, &observation(CacheOutcome::Baseline, false));
        metrics.record_latency("technical_specialist", 1.1, &observation(CacheOutcome::Hit, false));
        metrics.record_latency("support_concierge", 2.6, &observation(CacheOutcome::Miss, true));

        assert_eq!(metrics.cold_baseline.get(), 2.5);
        assert_eq!(metrics.cache_hits.get(["technical_specialist"]), 1);
        assert_eq!(metrics.cache_misses.get(["support_concierge"]), 1);
        assert_eq!(metrics.prefix_mismatches.total(), 1);
        assert_eq!(metrics.ttft.get_data(["router"]).count, 1);
    }

    #[test]
    fn test_render_contains_every_family() {
        let metrics = TellerMetrics::new();
        metrics.record_call("router", "success");
        let text = metrics.render();
        for name in [
            "teller_requests_total",
            "teller_ttft_seconds",
            "teller_cache_hits_total",
            "teller_cache_misses_total",
            "teller_prefix_mismatches_total",
            "teller_cold_cache_baseline_seconds",
            "teller_cache_hit_rate",
            "teller_prefix_tokens_estimated",
        ] {
            assert!(text.contains(&format!("# TYPE {} ", name)), "missing {}", name);
        }
        assert!(text.contains("teller_requests_total{agent=\"router\",status=\"success\"} 1"));
    }

    #[test]
    fn test_reset_cache_gauges() {
        let metrics = TellerMetrics::new();
        metrics.cold_baseline.set(3.0);
        metrics.hit_rate.set(0.9);
        metrics.reset_cache_gauges();
        assert_eq!(metrics.cold_baseline.get(), 0.0);
        assert_eq!(metrics.hit_rate.get(), 0.0);
    }
}
