use super::*;
use crate::cache::{CacheMetricsRegistry, CacheOutcome};
use crate::config::FanoutSettings;
use crate::error::{TellerError, TellerResult};
use crate::llm::{Completion, InferenceBackend, MockInferenceBackend};
use crate::prompts::{PromptAssembler, PromptRegistry};
use crate::session::Turn;
use crate::telemetry::{ChannelTraceSink, TellerMetrics};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

const MANUAL: &str = "Section 1. Wire transfers above 10,000 require dual approval.\n\
Section 2. ACH cutoff is 17:00 local time.";

#[derive(Clone)]
enum Step {
    Reply(&'static str, f64),
    Fail,
    Fatal,
    Hang,
}

/// Replies per agent, identified by the `ROLE:` line of the prompt
#[derive(Default)]
struct ScriptedBackend {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn script(self, agent: &str, steps: &[Step]) -> Self {
        self.scripts
            .lock()
            .insert(agent.to_string(), steps.iter().cloned().collect());
        self
    }

    fn calls_for(&self, agent: &str) -> usize {
        self.calls.lock().iter().filter(|a| *a == agent).count()
    }
}

fn agent_of(prompt: &str) -> String {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix("ROLE: "))
        .map(|role| role.trim().to_lowercase().replace(' ', "_"))
        .unwrap_or_default()
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    async fn complete(&self, prompt: &str) -> TellerResult<Completion> {
        let agent = agent_of(prompt);
        self.calls.lock().push(agent.clone());
        let step = self
            .scripts
            .lock()
            .get_mut(&agent)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Step::Reply("default answer", 1.0));
        match step {
            Step::Reply(content, ttft) => Ok(Completion::new(content, ttft)),
            Step::Fail => Err(TellerError::inference_status("upstream unavailable", 503)),
            Step::Fatal => Err(TellerError::other("malformed request")),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Completion::new("too late", 30.0))
            }
        }
    }
}

fn settings() -> FanoutSettings {
    FanoutSettings {
        retry_backoff: Duration::from_millis(5),
        ..FanoutSettings::default()
    }
}

fn assembler() -> Arc<PromptAssembler> {
    let registry = PromptRegistry::with_embedded().unwrap();
    Arc::new(PromptAssembler::new(Arc::new(registry), MANUAL, 256).unwrap())
}

fn coordinator_with(
    backend: Arc<dyn InferenceBackend>,
    settings: FanoutSettings,
    call_timeout: Duration,
) -> FanoutCoordinator {
    let registry = Arc::new(CacheMetricsRegistry::new(0.8, 100).unwrap());
    FanoutCoordinator::new(assembler(), backend, registry, settings, call_timeout)
}

fn coordinator(backend: Arc<dyn InferenceBackend>) -> FanoutCoordinator {
    coordinator_with(backend, settings(), Duration::from_secs(5))
}

fn request(agents: &[&str]) -> FanoutRequest {
    FanoutRequest {
        query: "What is the ACH cutoff?".to_string(),
        session_id: "session-1".to_string(),
        history: vec![
            Turn::user("Hi"),
            Turn::assistant("Hello, how can I help?"),
        ],
        agents: agents.iter().map(|a| a.to_string()).collect(),
    }
}

const ALL_AGENTS: [&str; 3] = ["technical_specialist", "compliance_auditor", "support_concierge"];

#[tokio::test]
async fn test_all_agents_succeed() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .script("technical_specialist", &[Step::Reply("Cutoff is 17:00.", 2.0)])
            .script("compliance_auditor", &[Step::Reply("No approval needed.", 1.0)])
            .script("support_concierge", &[Step::Reply("It closes at 5pm.", 1.1)]),
    );
    let coordinator = coordinator(backend.clone());

    let outcome = coordinator.execute(&request(&ALL_AGENTS)).await.unwrap();

    assert_eq!(outcome.agents_used().len(), 3);
    assert_eq!(outcome.retry_count, 0);
    assert!(!outcome.degraded);
    assert!(!outcome.escalation_required);
    assert!(outcome.compliance_issues.is_empty());
    assert_eq!(outcome.selected, ALL_AGENTS.to_vec());
    for agent in ALL_AGENTS {
        assert_eq!(backend.calls_for(agent), 1);
        assert_eq!(outcome.outcomes[agent].attempts, 1);
    }

    let report = coordinator.registry().report();
    assert_eq!(report.total_requests, 3);
    assert_eq!(report.unique_prefix_hashes, 1);
    let baselines = outcome
        .outcomes
        .values()
        .filter(|o| o.cache_outcome == Some(CacheOutcome::Baseline))
        .count();
    assert_eq!(baselines, 1);
}

#[tokio::test]
async fn test_partial_failure_degrades() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .script("technical_specialist", &[Step::Reply("Cutoff is 17:00.", 2.0)])
            .script("compliance_auditor", &[Step::Fail, Step::Fail])
            .script("support_concierge", &[Step::Reply("It closes at 5pm.", 1.1)]),
    );
    let coordinator = coordinator(backend.clone());

    let outcome = coordinator.execute(&request(&ALL_AGENTS)).await.unwrap();

    assert_eq!(outcome.retry_count, 2);
    assert!(outcome.degraded);
    assert_eq!(outcome.agents_used(), vec!["technical_specialist", "support_concierge"]);
    assert_eq!(outcome.failed_agents(), vec!["compliance_auditor"]);
    assert_eq!(backend.calls_for("compliance_auditor"), 2);

    let failed = &outcome.outcomes["compliance_auditor"];
    assert_eq!(failed.status, AgentStatus::Failed);
    assert_eq!(failed.attempts, 2);
    assert!(failed.content.is_none());
    assert!(matches!(
        failed.failure(),
        Some(TellerError::InferenceCallFailed { .. })
    ));
    assert!(!outcome.contributions().contains_key("compliance_auditor"));
}

#[tokio::test]
async fn test_retry_then_success() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .script("technical_specialist", &[Step::Fail, Step::Reply("Cutoff is 17:00.", 1.5)]),
    );
    let coordinator = coordinator(backend.clone());

    let outcome = coordinator
        .execute(&request(&["technical_specialist"]))
        .await
        .unwrap();

    assert_eq!(outcome.retry_count, 1);
    assert!(!outcome.degraded);
    let agent = &outcome.outcomes["technical_specialist"];
    assert_eq!(agent.attempts, 2);
    assert_eq!(agent.content.as_deref(), Some("Cutoff is 17:00."));
    assert_eq!(agent.ttft_seconds, Some(1.5));
}

#[tokio::test]
async fn test_non_retryable_error_is_not_retried() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .script("technical_specialist", &[Step::Fatal])
            .script("support_concierge", &[Step::Reply("ok", 1.0)]),
    );
    let coordinator = coordinator(backend.clone());

    let outcome = coordinator
        .execute(&request(&["technical_specialist", "support_concierge"]))
        .await
        .unwrap();

    assert_eq!(backend.calls_for("technical_specialist"), 1);
    assert_eq!(outcome.outcomes["technical_specialist"].attempts, 1);
    assert_eq!(outcome.retry_count, 1);
    assert!(outcome.degraded);
}

#[tokio::test]
async fn test_all_agents_failed() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .script("technical_specialist", &[Step::Fail, Step::Fail])
            .script("compliance_auditor", &[Step::Fail, Step::Fail]),
    );
    let coordinator = coordinator(backend);

    let err = coordinator
        .execute(&request(&["technical_specialist", "compliance_auditor"]))
        .await
        .unwrap_err();

    match err {
        TellerError::AllAgentsFailed { failures } => {
            let agents: Vec<&str> = failures.iter().map(|(a, _)| a.as_str()).collect();
            assert_eq!(agents, vec!["technical_specialist", "compliance_auditor"]);
            assert!(failures[0].1.contains("upstream unavailable"));
        }
        other => panic!("expected AllAgentsFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_call_timeout_counts_as_failure() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .script("technical_specialist", &[Step::Hang, Step::Hang])
            .script("support_concierge", &[Step::Reply("ok", 1.0)]),
    );
    let coordinator = coordinator_with(backend.clone(), settings(), Duration::from_millis(50));

    let outcome = coordinator
        .execute(&request(&["technical_specialist", "support_concierge"]))
        .await
        .unwrap();

    assert!(outcome.degraded);
    assert_eq!(outcome.retry_count, 2);
    assert_eq!(backend.calls_for("technical_specialist"), 2);
    assert!(matches!(
        outcome.outcomes["technical_specialist"].failure(),
        Some(TellerError::InferenceTimeout { .. })
    ));
}

#[tokio::test]
async fn test_overall_deadline_bounds_fanout() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .script("technical_specialist", &[Step::Hang])
            .script("support_concierge", &[Step::Reply("ok", 1.0)]),
    );
    let settings = FanoutSettings {
        overall_deadline: Duration::from_millis(100),
        ..settings()
    };
    let coordinator = coordinator_with(backend.clone(), settings, Duration::from_secs(60));

    let started = std::time::Instant::now();
    let outcome = coordinator
        .execute(&request(&["technical_specialist", "support_concierge"]))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(outcome.agents_used(), vec!["support_concierge"]);
    // no time is left for a retry once the deadline fires
    assert_eq!(backend.calls_for("technical_specialist"), 1);
    assert_eq!(outcome.outcomes["support_concierge"].content.as_deref(), Some("ok"));
}

#[tokio::test]
async fn test_assembly_failure_excludes_agent() {
    let mut mock = MockInferenceBackend::new();
    mock.expect_complete()
        .times(1)
        .returning(|_| Ok(Completion::new("Cutoff is 17:00.", 1.0)));
    let coordinator = coordinator(Arc::new(mock));

    let outcome = coordinator
        .execute(&request(&["wealth_advisor", "technical_specialist"]))
        .await
        .unwrap();

    let excluded = &outcome.outcomes["wealth_advisor"];
    assert_eq!(excluded.attempts, 0);
    assert!(matches!(
        excluded.failure(),
        Some(TellerError::TemplateNotFound { .. })
    ));
    assert_eq!(outcome.retry_count, 0);
    assert!(outcome.degraded);
    assert_eq!(outcome.agents_used(), vec!["technical_specialist"]);
}

#[tokio::test]
async fn test_missing_query_excludes_every_agent() {
    let mut mock = MockInferenceBackend::new();
    mock.expect_complete().times(0);
    let coordinator = coordinator(Arc::new(mock));

    let mut req = request(&["technical_specialist"]);
    req.query = "   ".to_string();
    let err = coordinator.execute(&req).await.unwrap_err();
    assert!(matches!(err, TellerError::AllAgentsFailed { .. }));
}

#[tokio::test]
async fn test_escalation_for_compliance_agent() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .script("technical_specialist", &[Step::Reply("Cutoff is 17:00.", 2.0)])
            .script(
                "compliance_auditor",
                &[Step::Reply("PLEASE CONSULT the BSA officer. I'm not certain.", 1.0)],
            ),
    );
    let coordinator = coordinator(backend);

    let outcome = coordinator
        .execute(&request(&["technical_specialist", "compliance_auditor"]))
        .await
        .unwrap();

    assert!(outcome.escalation_required);
    assert_eq!(
        outcome.compliance_issues,
        vec!["compliance_auditor: Contains uncertainty - 'I'm not certain'".to_string()]
    );
}

#[tokio::test]
async fn test_uncertainty_outside_compliance_is_reported_only() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .script(
                "support_concierge",
                &[Step::Reply("Please consult your branch manager.", 1.0)],
            ),
    );
    let coordinator = coordinator(backend);

    let outcome = coordinator
        .execute(&request(&["support_concierge"]))
        .await
        .unwrap();

    assert!(!outcome.escalation_required);
    assert_eq!(outcome.compliance_issues.len(), 1);
    assert!(outcome.compliance_issues[0].starts_with("support_concierge:"));
}

#[tokio::test]
async fn test_empty_agent_list_rejected() {
    let coordinator = coordinator(Arc::new(ScriptedBackend::default()));
    let err = coordinator.execute(&request(&[])).await.unwrap_err();
    assert!(matches!(err, TellerError::InvalidInput { .. }));

    let err = coordinator.execute(&request(&["  "])).await.unwrap_err();
    assert!(matches!(err, TellerError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_duplicates_and_excess_agents_trimmed() {
    let backend = Arc::new(ScriptedBackend::default());
    let settings = FanoutSettings {
        max_agents: 2,
        ..settings()
    };
    let coordinator = coordinator_with(backend.clone(), settings, Duration::from_secs(5));

    let outcome = coordinator
        .execute(&request(&[
            "support_concierge",
            "support_concierge",
            "technical_specialist",
            "compliance_auditor",
        ]))
        .await
        .unwrap();

    assert_eq!(outcome.selected, vec!["support_concierge", "technical_specialist"]);
    assert_eq!(backend.calls_for("support_concierge"), 1);
    assert_eq!(backend.calls_for("compliance_auditor"), 0);
}

#[tokio::test]
async fn test_trace_and_metrics_recorded() {
    let backend = Arc::new(ScriptedBackend::default());
    let (sink, mut receiver) = ChannelTraceSink::new(8);
    let metrics = Arc::new(TellerMetrics::new());
    let coordinator = coordinator(backend)
        .with_metrics(Arc::clone(&metrics))
        .with_trace_sink(Arc::new(sink));

    coordinator
        .execute(&request(&["technical_specialist", "support_concierge"]))
        .await
        .unwrap();

    let mut traced = Vec::new();
    while let Ok(record) = receiver.try_recv() {
        assert_eq!(record.session_id, "session-1");
        assert_eq!(record.attempt, 1);
        traced.push(record.agent);
    }
    traced.sort();
    assert_eq!(traced, vec!["support_concierge", "technical_specialist"]);

    let exposition = metrics.render();
    assert!(exposition.contains(
        "teller_requests_total{agent=\"technical_specialist\",status=\"success\"} 1"
    ));
}

#[tokio::test]
async fn test_cancel_all_stops_fanout() {
    let backend =
        Arc::new(ScriptedBackend::default().script("technical_specialist", &[Step::Hang]));
    let coordinator = coordinator(backend);
    coordinator.cancel_all();

    let err = coordinator
        .execute(&request(&["technical_specialist"]))
        .await
        .unwrap_err();
    assert!(matches!(err, TellerError::AllAgentsFailed { .. }));
}

#[tokio::test]
async fn test_cancelled_coordinator_never_calls_backend() {
    let backend = Arc::new(
        ScriptedBackend::default().script("technical_specialist", &[Step::Reply("instant", 0.5)]),
    );
    let coordinator = coordinator(Arc::clone(&backend) as Arc<dyn InferenceBackend>);
    coordinator.cancel_all();

    let err = coordinator
        .execute(&request(&["technical_specialist"]))
        .await
        .unwrap_err();
    assert!(matches!(err, TellerError::AllAgentsFailed { .. }));
    assert_eq!(backend.calls_for("technical_specialist"), 0);
}

#[tokio::test]
async fn test_cancel_during_backoff_skips_retry() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .script("technical_specialist", &[Step::Fail, Step::Reply("recovered", 1.0)]),
    );
    let settings = FanoutSettings {
        retry_backoff: Duration::from_millis(200),
        ..FanoutSettings::default()
    };
    let coordinator = coordinator_with(
        Arc::clone(&backend) as Arc<dyn InferenceBackend>,
        settings,
        Duration::from_secs(5),
    );

    let req = request(&["technical_specialist"]);
    let started = std::time::Instant::now();
    let (result, ()) = tokio::join!(
        coordinator.execute(&req),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            coordinator.cancel_all();
        }
    );

    assert!(matches!(result.unwrap_err(), TellerError::AllAgentsFailed { .. }));
    assert_eq!(backend.calls_for("technical_specialist"), 1);
    assert!(started.elapsed() < Duration::from_millis(200));
}

#[tokio::test]
async fn test_unrecordable_latency_does_not_fail_agent() {
    // A zero TTFT is rejected by the registry
    let backend = Arc::new(
        ScriptedBackend::default().script("technical_specialist", &[Step::Reply("answer", 0.0)]),
    );
    let (sink, mut receiver) = ChannelTraceSink::new(4);
    let coordinator = coordinator(backend).with_trace_sink(Arc::new(sink));

    let outcome = coordinator
        .execute(&request(&["technical_specialist"]))
        .await
        .unwrap();

    let agent = &outcome.outcomes["technical_specialist"];
    assert_eq!(agent.status, AgentStatus::Succeeded);
    assert_eq!(agent.content.as_deref(), Some("answer"));
    assert!(agent.cache_outcome.is_none());
    assert!(!outcome.degraded);
    assert_eq!(outcome.retry_count, 0);
    assert_eq!(coordinator.registry().report().total_requests, 0);
    assert!(receiver.try_recv().is_err());
}

#[tokio::test]
async fn test_router_is_not_an_answering_agent() {
    let backend = Arc::new(ScriptedBackend::default());
    let coordinator = coordinator(Arc::clone(&backend) as Arc<dyn InferenceBackend>);

    let outcome = coordinator
        .execute(&request(&["router", "support_concierge"]))
        .await
        .unwrap();
    assert_eq!(outcome.selected, vec!["support_concierge"]);
    assert_eq!(backend.calls_for("router"), 0);

    let err = coordinator.execute(&request(&["router"])).await.unwrap_err();
    assert!(matches!(err, TellerError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_llm_router_traces_its_call() {
    let mut mock = MockInferenceBackend::new();
    mock.expect_complete()
        .times(1)
        .returning(|_| Ok(Completion::new("{\"agents\": [\"support_concierge\"]}", 2.5)));
    let (sink, mut receiver) = ChannelTraceSink::new(4);
    let router = LlmRouter::new(
        assembler(),
        Arc::new(mock),
        Arc::new(CacheMetricsRegistry::new(0.8, 100).unwrap()),
        Arc::new(TellerMetrics::new()),
        settings(),
        Duration::from_secs(5),
    )
    .with_trace_sink(Arc::new(sink));

    let agents = router
        .select_in_session("session-7", "Where is my card?", &[])
        .await;

    assert_eq!(agents, vec!["support_concierge"]);
    let record = receiver.try_recv().unwrap();
    assert_eq!(record.agent, "router");
    assert_eq!(record.session_id, "session-7");
    assert_eq!(record.ttft_seconds, 2.5);
    assert_eq!(record.outcome, CacheOutcome::Baseline);
    assert!(!record.cache_hit);
}

#[tokio::test]
async fn test_llm_router_records_latency_and_parses() {
    let mut mock = MockInferenceBackend::new();
    mock.expect_complete()
        .withf(|prompt| prompt.contains("ROLE: Router"))
        .times(1)
        .returning(|_| {
            Ok(Completion::new(
                "{\"agents\": [\"compliance_auditor\", \"router\"]}",
                3.0,
            ))
        });
    let registry = Arc::new(CacheMetricsRegistry::new(0.8, 100).unwrap());
    let router = LlmRouter::new(
        assembler(),
        Arc::new(mock),
        Arc::clone(&registry),
        Arc::new(TellerMetrics::new()),
        settings(),
        Duration::from_secs(5),
    );

    let agents = router.select("Do I need dual approval?", &[]).await;

    assert_eq!(agents, vec!["compliance_auditor"]);
    let baseline = registry.baseline().unwrap();
    assert_eq!(baseline.value_seconds, 3.0);
    assert_eq!(registry.samples()[0].agent_name, "router");
}

#[tokio::test]
async fn test_llm_router_falls_back_on_failure() {
    let mut mock = MockInferenceBackend::new();
    mock.expect_complete()
        .returning(|_| Err(TellerError::inference("connection refused")));
    let registry = Arc::new(CacheMetricsRegistry::new(0.8, 100).unwrap());
    let router = LlmRouter::new(
        assembler(),
        Arc::new(mock),
        Arc::clone(&registry),
        Arc::new(TellerMetrics::new()),
        settings(),
        Duration::from_secs(5),
    );

    assert_eq!(router.select("anything", &[]).await, vec!["technical_specialist"]);
    assert!(registry.baseline().is_none());
}
