//! End-to-end query answering
//!
//! [`QueryService`] ties the pieces together: session history, routing, the
//! fan-out and aggregation. It is what the HTTP API and the `ask` command call.

use crate::cache::{CacheEfficiencyReport, CacheMetricsRegistry, CacheOutcome};
use crate::config::Settings;
use crate::error::{TellerError, TellerResult};
use crate::fanout::{
    AgentOutcome, AgentRouter, AgentStatus, FanoutCoordinator, FanoutRequest, LlmRouter,
    ResponseAggregator, SectionAggregator,
};
use crate::llm::{InferenceBackend, OpenAiCompatClient};
use crate::prompts::{PromptAssembler, PromptRegistry, load_manual};
use crate::session::{SessionStore, Turn};
use crate::telemetry::{TellerMetrics, TraceSink, TracingTraceSink};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Conversation key; a new session is started when empty
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            session_id: session_id.into(),
            user_id: None,
        }
    }
}

/// Per-agent diagnostics returned alongside the answer
#[derive(Debug, Clone, Serialize)]
pub struct AgentDiagnostic {
    pub agent: String,
    pub status: AgentStatus,
    pub attempts: u32,
    pub ttft_seconds: Option<f64>,
    pub prefix_hash: Option<String>,
    pub cache_outcome: Option<CacheOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&AgentOutcome> for AgentDiagnostic {
    fn from(outcome: &AgentOutcome) -> Self {
        Self {
            agent: outcome.agent.clone(),
            status: outcome.status,
            attempts: outcome.attempts,
            ttft_seconds: outcome.ttft_seconds,
            prefix_hash: outcome.prefix_hash.clone(),
            cache_outcome: outcome.cache_outcome,
            error: outcome.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub response: String,
    pub session_id: String,
    pub agents_selected: Vec<String>,
    pub agents_used: Vec<String>,
    pub failed_agents: Vec<String>,
    pub retry_count: u32,
    pub degraded: bool,
    pub escalation_required: bool,
    pub compliance_passed: bool,
    pub compliance_issues: Vec<String>,
    /// Mean TTFT over contributing agents
    pub ttft_seconds: f64,
    pub diagnostics: Vec<AgentDiagnostic>,
}

pub struct QueryService {
    assembler: Arc<PromptAssembler>,
    registry: Arc<CacheMetricsRegistry>,
    metrics: Arc<TellerMetrics>,
    sessions: Arc<SessionStore>,
    router: Arc<dyn AgentRouter>,
    coordinator: Arc<FanoutCoordinator>,
    aggregator: Arc<dyn ResponseAggregator>,
}

impl QueryService {
    /// Build the full pipeline from settings.
    ///
    /// Loads the manual and templates, verifies prefix sharing and connects the
    /// OpenAI-compatible client. Fails when the manual is missing.
    pub fn from_settings(settings: &Settings) -> TellerResult<Self> {
        let backend: Arc<dyn InferenceBackend> =
            Arc::new(OpenAiCompatClient::new(settings.inference.clone())?);
        Self::with_backend(settings, backend, Arc::new(TracingTraceSink))
    }

    /// Build the pipeline over an arbitrary backend and trace sink
    pub fn with_backend(
        settings: &Settings,
        backend: Arc<dyn InferenceBackend>,
        trace: Arc<dyn TraceSink>,
    ) -> TellerResult<Self> {
        let manual = load_manual(&settings.prompts.manual_path)?;
        let templates = match &settings.prompts.template_dir {
            Some(dir) => PromptRegistry::with_overrides(dir)?,
            None => PromptRegistry::with_embedded()?,
        };
        let assembler = Arc::new(PromptAssembler::new(
            Arc::new(templates),
            &manual,
            settings.cache.chunk_size,
        )?);

        let metrics = Arc::new(TellerMetrics::new());
        for family in assembler.family_prefixes() {
            info!(
                family = %family.family,
                prefix_hash = %family.prefix_hash,
                prefix_tokens = family.prefix_token_estimate,
                chunk_aligned = family.chunk_aligned,
                templates = ?family.templates,
                "static prefix ready"
            );
            metrics.prefix_tokens.set(family.prefix_token_estimate as f64);
        }

        let registry = Arc::new(CacheMetricsRegistry::init(&settings.cache)?);
        let router = Arc::new(LlmRouter::new(
            Arc::clone(&assembler),
            Arc::clone(&backend),
            Arc::clone(&registry),
            Arc::clone(&metrics),
            settings.fanout.clone(),
            settings.inference.call_timeout,
        )
        .with_trace_sink(Arc::clone(&trace)));
        let coordinator = FanoutCoordinator::new(
            Arc::clone(&assembler),
            backend,
            Arc::clone(&registry),
            settings.fanout.clone(),
            settings.inference.call_timeout,
        )
        .with_metrics(Arc::clone(&metrics))
        .with_trace_sink(trace);

        Ok(Self {
            assembler,
            registry,
            metrics,
            sessions: Arc::new(SessionStore::new(settings.sessions.max_turns)),
            router,
            coordinator: Arc::new(coordinator),
            aggregator: Arc::new(SectionAggregator),
        })
    }

    /// Replace the agent router, e.g. with a fixed selection
    pub fn with_router(mut self, router: Arc<dyn AgentRouter>) -> Self {
        self.router = router;
        self
    }

    pub fn with_aggregator(mut self, aggregator: Arc<dyn ResponseAggregator>) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn assembler(&self) -> &Arc<PromptAssembler> {
        &self.assembler
    }

    pub fn registry(&self) -> &Arc<CacheMetricsRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<TellerMetrics> {
        &self.metrics
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn coordinator(&self) -> &Arc<FanoutCoordinator> {
        &self.coordinator
    }

    /// Clear the cache registry and the gauges derived from it
    pub fn reset_cache_stats(&self) {
        self.registry.reset();
        self.metrics.reset_cache_gauges();
    }

    /// Cancel in-flight fan-outs and tear down the cache registry.
    ///
    /// Falls back to a plain snapshot when the registry is still shared elsewhere.
    pub fn shutdown(self) -> CacheEfficiencyReport {
        let Self {
            assembler,
            registry,
            metrics,
            sessions,
            router,
            coordinator,
            aggregator,
        } = self;
        coordinator.cancel_all();
        drop((assembler, metrics, sessions, router, coordinator, aggregator));

        match Arc::try_unwrap(registry) {
            Ok(registry) => registry.teardown(),
            Err(shared) => shared.report(),
        }
    }

    /// Answer one query.
    ///
    /// The conversation is extended with the user and assistant turns only when
    /// an answer was produced.
    #[instrument(skip_all, fields(session_id = %request.session_id))]
    pub async fn answer(&self, request: &QueryRequest) -> TellerResult<QueryResponse> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(TellerError::invalid_input_field("query must not be empty", "query"));
        }
        let session_id = if request.session_id.trim().is_empty() {
            Uuid::new_v4().to_string()
        } else {
            request.session_id.trim().to_string()
        };

        let history = self.sessions.history(&session_id);
        let selected = self
            .router
            .select_in_session(&session_id, query, &history)
            .await;
        info!(
            session_id = %session_id,
            user_id = request.user_id.as_deref().unwrap_or("anonymous"),
            history_turns = history.len(),
            agents = ?selected,
            "query routed"
        );

        let outcome = self
            .coordinator
            .execute(&FanoutRequest {
                query: query.to_string(),
                session_id: session_id.clone(),
                history,
                agents: selected,
            })
            .await?;

        let response = self
            .aggregator
            .synthesize(&outcome.contributions(), &outcome.compliance_issues);

        self.sessions.append(&session_id, Turn::user(query));
        self.sessions.append(&session_id, Turn::assistant(response.clone()));

        let diagnostics = outcome
            .selected
            .iter()
            .filter_map(|agent| outcome.outcomes.get(agent))
            .map(AgentDiagnostic::from)
            .collect();

        info!(
            session_id = %session_id,
            agents_used = ?outcome.agents_used(),
            retry_count = outcome.retry_count,
            degraded = outcome.degraded,
            escalation_required = outcome.escalation_required,
            "query answered"
        );

        Ok(QueryResponse {
            response,
            session_id,
            agents_used: outcome.agents_used(),
            failed_agents: outcome.failed_agents(),
            retry_count: outcome.retry_count,
            degraded: outcome.degraded,
            escalation_required: outcome.escalation_required,
            compliance_passed: outcome.compliance_issues.is_empty(),
            ttft_seconds: outcome.mean_ttft(),
            diagnostics,
            agents_selected: outcome.selected,
            compliance_issues: outcome.compliance_issues,
        })
    }
}
