//! Latency-based cache inference
//!
//! The inference server does not say whether a request reused its prefix cache,
//! so the registry infers it from time to first token. The first sample after
//! init or reset is the cold baseline; later samples are hits when they come in
//! at or under `hit_threshold * baseline`.

mod registry;
mod report;
mod types;

pub use registry::CacheMetricsRegistry;
pub use report::{CacheEfficiencyReport, CacheGrade};
pub use types::{CacheBaseline, CacheObservation, CacheOutcome, LatencySample};
