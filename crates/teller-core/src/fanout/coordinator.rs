//! Concurrent per-agent execution with retry, deadlines and degradation

use super::escalation::EscalationPolicy;
use super::types::{AgentOutcome, AgentStatus, FanoutOutcome, FanoutRequest};
use crate::cache::CacheMetricsRegistry;
use crate::config::FanoutSettings;
use crate::error::{TellerError, TellerResult, UnifiedError};
use crate::llm::InferenceBackend;
use crate::prompts::{PromptAssembler, PromptInputs, ROUTER_TEMPLATE, RenderedPrompt};
use crate::telemetry::{TellerMetrics, TraceRecord, TraceSink, TracingTraceSink};
use chrono::Utc;
use futures::future::join_all;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep_until, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Runs one prompt per selected agent concurrently and joins the results
pub struct FanoutCoordinator {
    assembler: Arc<PromptAssembler>,
    backend: Arc<dyn InferenceBackend>,
    registry: Arc<CacheMetricsRegistry>,
    metrics: Arc<TellerMetrics>,
    trace: Arc<dyn TraceSink>,
    settings: FanoutSettings,
    call_timeout: Duration,
    escalation: EscalationPolicy,
    cancellation_token: CancellationToken,
}

impl FanoutCoordinator {
    pub fn new(
        assembler: Arc<PromptAssembler>,
        backend: Arc<dyn InferenceBackend>,
        registry: Arc<CacheMetricsRegistry>,
        settings: FanoutSettings,
        call_timeout: Duration,
    ) -> Self {
        let escalation = EscalationPolicy::from_settings(&settings);
        Self {
            assembler,
            backend,
            registry,
            metrics: Arc::new(TellerMetrics::new()),
            trace: Arc::new(TracingTraceSink),
            settings,
            call_timeout,
            escalation,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Share a metrics set with other components
    pub fn with_metrics(mut self, metrics: Arc<TellerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_trace_sink(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = trace;
        self
    }

    pub fn metrics(&self) -> &Arc<TellerMetrics> {
        &self.metrics
    }

    pub fn registry(&self) -> &Arc<CacheMetricsRegistry> {
        &self.registry
    }

    /// Abort every in-flight and future fan-out of this coordinator
    pub fn cancel_all(&self) {
        self.cancellation_token.cancel();
    }

    /// Execute `request` across its agents.
    ///
    /// Returns an outcome as long as one agent contributed; fails with
    /// `AllAgentsFailed` otherwise. Partial failure sets `degraded`.
    #[instrument(skip_all, fields(session_id = %request.session_id))]
    pub async fn execute(&self, request: &FanoutRequest) -> TellerResult<FanoutOutcome> {
        let selected = self.select_agents(&request.agents)?;
        let deadline = Instant::now() + self.settings.overall_deadline;
        let inputs = PromptInputs::new(request.query.clone(), request.history.clone());

        let mut outcomes: BTreeMap<String, AgentOutcome> = BTreeMap::new();
        let mut dispatched = Vec::with_capacity(selected.len());
        for agent in &selected {
            match self.assembler.render(agent, &inputs) {
                Ok(prompt) => {
                    let call = self.agent_call(agent, &request.session_id, prompt, deadline);
                    dispatched.push((agent.clone(), tokio::spawn(call.run())));
                }
                Err(e) => {
                    warn!(agent = %agent, error = %e, "prompt assembly failed; agent excluded");
                    outcomes.insert(agent.clone(), AgentOutcome::failed(agent.as_str(), 0, e));
                }
            }
        }

        let (agents, handles): (Vec<String>, Vec<_>) = dispatched.into_iter().unzip();
        for (agent, joined) in agents.into_iter().zip(join_all(handles).await) {
            let outcome = joined.unwrap_or_else(|e| {
                error!(agent = %agent, error = %e, "agent task aborted");
                AgentOutcome::failed(
                    agent.as_str(),
                    0,
                    TellerError::other(format!("agent task aborted: {}", e)),
                )
            });
            outcomes.insert(agent, outcome);
        }

        self.metrics.sync_report(&self.registry.report());

        let retry_count: u32 = outcomes.values().map(AgentOutcome::failed_attempts).sum();
        if !outcomes.values().any(AgentOutcome::is_success) {
            let failures: Vec<(String, String)> = selected
                .iter()
                .filter_map(|agent| {
                    outcomes
                        .get(agent)
                        .map(|o| (agent.clone(), o.error.clone().unwrap_or_default()))
                })
                .collect();
            error!(agents = ?selected, retry_count, "all agents failed");
            return Err(TellerError::AllAgentsFailed { failures });
        }

        let degraded = outcomes.values().any(|o| !o.is_success());
        let mut outcome = FanoutOutcome {
            selected,
            outcomes,
            retry_count,
            degraded,
            escalation_required: false,
            compliance_issues: Vec::new(),
        };
        if degraded {
            warn!(
                failed = ?outcome.failed_agents(),
                used = ?outcome.agents_used(),
                "fan-out degraded"
            );
        }

        let escalation = self.escalation.assess(&outcome.contributions());
        if escalation.required {
            info!(issues = ?escalation.issues, "escalation required");
        }
        outcome.escalation_required = escalation.required;
        outcome.compliance_issues = escalation.issues;

        Ok(outcome)
    }

    /// Validate, de-duplicate (first occurrence wins) and bound the agent list.
    /// The router template is never a specialist.
    fn select_agents(&self, requested: &[String]) -> TellerResult<Vec<String>> {
        let mut selected: Vec<String> = Vec::with_capacity(requested.len());
        for agent in requested {
            let agent = agent.trim();
            if agent == ROUTER_TEMPLATE {
                warn!("router is not an answering agent; ignoring");
                continue;
            }
            if !agent.is_empty() && !selected.iter().any(|a| a == agent) {
                selected.push(agent.to_string());
            }
        }
        if selected.is_empty() {
            return Err(TellerError::invalid_input_field(
                "at least one agent is required",
                "agents",
            ));
        }
        if selected.len() > self.settings.max_agents {
            warn!(
                requested = selected.len(),
                max_agents = self.settings.max_agents,
                dropped = ?&selected[self.settings.max_agents..],
                "too many agents selected; truncating"
            );
            selected.truncate(self.settings.max_agents);
        }
        Ok(selected)
    }

    fn agent_call(
        &self,
        agent: &str,
        session_id: &str,
        prompt: RenderedPrompt,
        deadline: Instant,
    ) -> AgentCall {
        AgentCall {
            agent: agent.to_string(),
            session_id: session_id.to_string(),
            prompt,
            backend: Arc::clone(&self.backend),
            registry: Arc::clone(&self.registry),
            metrics: Arc::clone(&self.metrics),
            trace: Arc::clone(&self.trace),
            max_attempts: self.settings.max_attempts.max(1),
            backoff: self.settings.retry_backoff,
            call_timeout: self.call_timeout,
            deadline,
            token: self.cancellation_token.child_token(),
        }
    }
}

/// Everything one spawned agent task owns
struct AgentCall {
    agent: String,
    session_id: String,
    prompt: RenderedPrompt,
    backend: Arc<dyn InferenceBackend>,
    registry: Arc<CacheMetricsRegistry>,
    metrics: Arc<TellerMetrics>,
    trace: Arc<dyn TraceSink>,
    max_attempts: u32,
    backoff: Duration,
    call_timeout: Duration,
    deadline: Instant,
    token: CancellationToken,
}

impl AgentCall {
    async fn run(self) -> AgentOutcome {
        let mut attempts = 0;
        loop {
            if self.token.is_cancelled() {
                return self.give_up(attempts, self.cancelled());
            }
            attempts += 1;
            let started = Instant::now();
            let call_deadline = (started + self.call_timeout).min(self.deadline);

            let result = tokio::select! {
                biased;
                _ = self.token.cancelled() => Err(self.cancelled()),
                result = timeout_at(call_deadline, self.backend.complete(&self.prompt.text)) => {
                    match result {
                        Ok(result) => result,
                        Err(_) => Err(TellerError::inference_timeout(
                            self.agent.as_str(),
                            started.elapsed().as_secs_f64(),
                        )),
                    }
                }
            };

            match result {
                Ok(completion) => {
                    self.metrics.record_call(&self.agent, "success");
                    return self.succeed(attempts, completion.content, completion.ttft_seconds);
                }
                Err(e) => {
                    let status = if matches!(e, TellerError::InferenceTimeout { .. }) {
                        "timeout"
                    } else {
                        "error"
                    };
                    self.metrics.record_call(&self.agent, status);

                    if !e.is_retryable() || attempts >= self.max_attempts {
                        return self.give_up(attempts, e);
                    }
                    let resume_at = Instant::now() + self.backoff_with_jitter();
                    if resume_at >= self.deadline {
                        return self.give_up(attempts, e);
                    }
                    warn!(
                        agent = %self.agent,
                        attempt = attempts,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "agent call failed; retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = self.token.cancelled() => {
                            return self.give_up(attempts, self.cancelled());
                        }
                        _ = sleep_until(resume_at) => {}
                    }
                }
            }
        }
    }

    fn succeed(&self, attempts: u32, content: String, ttft_seconds: f64) -> AgentOutcome {
        let prefix_hash = self.prompt.prefix_hash.clone();
        let cache_outcome = match self.registry.record(&self.agent, ttft_seconds, &prefix_hash) {
            Ok(observation) => {
                self.metrics
                    .record_latency(&self.agent, ttft_seconds, &observation);
                self.trace.emit(TraceRecord {
                    agent: self.agent.clone(),
                    session_id: self.session_id.clone(),
                    ttft_seconds,
                    prefix_hash: prefix_hash.clone(),
                    cache_hit: observation.outcome.is_hit(),
                    outcome: observation.outcome,
                    attempt: attempts,
                    at: Utc::now(),
                });
                Some(observation.outcome)
            }
            Err(e) => {
                warn!(agent = %self.agent, error = %e, "latency sample not recorded");
                None
            }
        };

        debug!(agent = %self.agent, attempts, ttft_seconds, "agent completed");
        AgentOutcome {
            agent: self.agent.clone(),
            status: AgentStatus::Succeeded,
            content: Some(content),
            attempts,
            ttft_seconds: Some(ttft_seconds),
            prefix_hash: Some(prefix_hash),
            cache_outcome,
            error: None,
            failure: None,
        }
    }

    fn cancelled(&self) -> TellerError {
        TellerError::other("fan-out cancelled").with_context(self.agent.clone())
    }

    /// Configured backoff plus up to half of it again at random
    fn backoff_with_jitter(&self) -> Duration {
        let base_ms = self.backoff.as_millis() as u64;
        let jitter_ms = {
            let mut rng = rand::thread_rng();
            rng.gen_range(0..=base_ms / 2)
        };
        Duration::from_millis(base_ms + jitter_ms)
    }

    fn give_up(&self, attempts: u32, e: TellerError) -> AgentOutcome {
        warn!(agent = %self.agent, attempts, error = %e, "agent failed");
        let mut outcome = AgentOutcome::failed(self.agent.as_str(), attempts, e);
        outcome.prefix_hash = Some(self.prompt.prefix_hash.clone());
        outcome
    }
}
