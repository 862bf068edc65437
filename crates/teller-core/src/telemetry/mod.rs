//! Telemetry: Prometheus metrics and per-call trace records

pub mod metrics;
mod pipeline_metrics;
mod trace;

pub use pipeline_metrics::{TTFT_BUCKETS, TellerMetrics};
pub use trace::{ChannelTraceSink, TraceRecord, TraceSink, TracingTraceSink};
