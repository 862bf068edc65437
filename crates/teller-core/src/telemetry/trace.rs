//! Per-call trace records
//!
//! Delivery is fire-and-forget: a sink never blocks or fails the request path.

use crate::cache::CacheOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Attributes of one observed inference call
#[derive(Debug, Clone, Serialize)]
pub struct TraceRecord {
    pub agent: String,
    pub session_id: String,
    pub ttft_seconds: f64,
    pub prefix_hash: String,
    pub cache_hit: bool,
    pub outcome: CacheOutcome,
    pub attempt: u32,
    pub at: DateTime<Utc>,
}

pub trait TraceSink: Send + Sync {
    fn emit(&self, record: TraceRecord);
}

/// Writes each record as a structured event on the `teller::trace` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTraceSink;

impl TraceSink for TracingTraceSink {
    fn emit(&self, record: TraceRecord) {
        info!(
            target: "teller::trace",
            agent = %record.agent,
            session_id = %record.session_id,
            ttft_seconds = record.ttft_seconds,
            prefix_hash = %record.prefix_hash,
            cache_hit = record.cache_hit,
            outcome = %record.outcome,
            attempt = record.attempt,
            "agent call traced"
        );
    }
}

/// Forwards records to a bounded channel; records are dropped when it is full
#[derive(Debug, Clone)]
pub struct ChannelTraceSink {
    sender: mpsc::Sender<TraceRecord>,
}

impl ChannelTraceSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TraceRecord>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl TraceSink for ChannelTraceSink {
    fn emit(&self, record: TraceRecord) {
        if let Err(e) = self.sender.try_send(record) {
            debug!(error = %e, "trace record dropped");
        }
    }
}
