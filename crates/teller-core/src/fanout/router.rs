//! Agent selection

use crate::cache::CacheMetricsRegistry;
use crate::config::FanoutSettings;
use crate::error::TellerError;
use crate::llm::InferenceBackend;
use crate::prompts::{PromptAssembler, PromptInputs, ROUTER_TEMPLATE};
use crate::session::Turn;
use crate::telemetry::{TellerMetrics, TraceRecord, TraceSink, TracingTraceSink};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Chooses which agents answer a query. Never fails; falls back to a default.
#[async_trait]
pub trait AgentRouter: Send + Sync {
    async fn select(&self, query: &str, history: &[Turn]) -> Vec<String>;

    /// Select on behalf of `session_id`, for routers that trace their own calls
    async fn select_in_session(
        &self,
        _session_id: &str,
        query: &str,
        history: &[Turn],
    ) -> Vec<String> {
        self.select(query, history).await
    }
}

/// Always selects the same agents
#[derive(Debug, Clone)]
pub struct StaticRouter {
    agents: Vec<String>,
}

impl StaticRouter {
    pub fn new(agents: Vec<String>) -> Self {
        Self { agents }
    }
}

#[async_trait]
impl AgentRouter for StaticRouter {
    async fn select(&self, _query: &str, _history: &[Turn]) -> Vec<String> {
        self.agents.clone()
    }
}

#[derive(Debug, Deserialize)]
struct RouterReply {
    agents: Vec<String>,
}

/// Asks the model to pick agents using the `router` template.
///
/// The router prompt shares the family's static zone, so its call also warms the
/// prefix cache and its TTFT is recorded like any other agent's.
pub struct LlmRouter {
    assembler: Arc<PromptAssembler>,
    backend: Arc<dyn InferenceBackend>,
    registry: Arc<CacheMetricsRegistry>,
    metrics: Arc<TellerMetrics>,
    trace: Arc<dyn TraceSink>,
    settings: FanoutSettings,
    call_timeout: Duration,
}

impl LlmRouter {
    pub fn new(
        assembler: Arc<PromptAssembler>,
        backend: Arc<dyn InferenceBackend>,
        registry: Arc<CacheMetricsRegistry>,
        metrics: Arc<TellerMetrics>,
        settings: FanoutSettings,
        call_timeout: Duration,
    ) -> Self {
        Self {
            assembler,
            backend,
            registry,
            metrics,
            trace: Arc::new(TracingTraceSink),
            settings,
            call_timeout,
        }
    }

    pub fn with_trace_sink(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = trace;
        self
    }

    fn fallback(&self) -> Vec<String> {
        vec![self.settings.default_agent.clone()]
    }

    fn known_agents(&self) -> Vec<String> {
        self.assembler
            .registry()
            .ids()
            .into_iter()
            .filter(|id| *id != ROUTER_TEMPLATE)
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl AgentRouter for LlmRouter {
    async fn select(&self, query: &str, history: &[Turn]) -> Vec<String> {
        self.route("", query, history).await
    }

    async fn select_in_session(
        &self,
        session_id: &str,
        query: &str,
        history: &[Turn],
    ) -> Vec<String> {
        self.route(session_id, query, history).await
    }
}

impl LlmRouter {
    #[instrument(skip_all, fields(session_id = %session_id))]
    async fn route(&self, session_id: &str, query: &str, history: &[Turn]) -> Vec<String> {
        let inputs = PromptInputs::new(query, history.to_vec());
        let prompt = match self.assembler.render(ROUTER_TEMPLATE, &inputs) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(error = %e, "router prompt could not be rendered; using default agent");
                return self.fallback();
            }
        };

        let call = self.backend.complete(&prompt.text);
        let completion = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(completion)) => completion,
            Ok(Err(e)) => {
                self.metrics.record_call(ROUTER_TEMPLATE, "error");
                warn!(error = %e, "router call failed; using default agent");
                return self.fallback();
            }
            Err(_) => {
                self.metrics.record_call(ROUTER_TEMPLATE, "timeout");
                let e = TellerError::inference_timeout(
                    ROUTER_TEMPLATE,
                    self.call_timeout.as_secs_f64(),
                );
                warn!(error = %e, "router call timed out; using default agent");
                return self.fallback();
            }
        };

        self.metrics.record_call(ROUTER_TEMPLATE, "success");
        let ttft_seconds = completion.ttft_seconds;
        match self
            .registry
            .record(ROUTER_TEMPLATE, ttft_seconds, &prompt.prefix_hash)
        {
            Ok(observation) => {
                self.metrics
                    .record_latency(ROUTER_TEMPLATE, ttft_seconds, &observation);
                self.trace.emit(TraceRecord {
                    agent: ROUTER_TEMPLATE.to_string(),
                    session_id: session_id.to_string(),
                    ttft_seconds,
                    prefix_hash: prompt.prefix_hash.clone(),
                    cache_hit: observation.outcome.is_hit(),
                    outcome: observation.outcome,
                    attempt: 1,
                    at: Utc::now(),
                });
            }
            Err(e) => warn!(error = %e, "router latency sample not recorded"),
        }

        let agents = parse_agent_selection(
            &completion.content,
            &self.known_agents(),
            &self.settings.default_agent,
            self.settings.max_agents,
        );
        info!(agents = ?agents, ttft_seconds, "router selected agents");
        agents
    }
}

/// Parse `{"agents": [...]}` out of a router reply.
///
/// Unknown names are dropped, duplicates removed (first occurrence wins) and the
/// list truncated to `max_agents`. Anything unusable yields `[default_agent]`.
pub fn parse_agent_selection(
    reply: &str,
    known: &[String],
    default_agent: &str,
    max_agents: usize,
) -> Vec<String> {
    let parsed = extract_json_object(reply)
        .and_then(|json| serde_json::from_str::<RouterReply>(json).ok());

    let Some(parsed) = parsed else {
        warn!("router reply is not valid JSON; using default agent");
        return vec![default_agent.to_string()];
    };

    let mut agents: Vec<String> = Vec::new();
    for agent in parsed.agents {
        let agent = agent.trim().to_string();
        if !known.contains(&agent) {
            warn!(agent = %agent, "router selected unknown agent; ignoring");
            continue;
        }
        if !agents.contains(&agent) {
            agents.push(agent);
        }
    }
    agents.truncate(max_agents.max(1));

    if agents.is_empty() {
        vec![default_agent.to_string()]
    } else {
        agents
    }
}

/// Outermost `{...}` span of `text`
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
