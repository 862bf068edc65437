//! Fan-out request and outcome types

use crate::cache::CacheOutcome;
use crate::error::TellerError;
use crate::session::Turn;
use serde::Serialize;
use std::collections::BTreeMap;

/// One fan-out over a set of agents
#[derive(Debug, Clone)]
pub struct FanoutRequest {
    pub query: String,
    pub session_id: String,
    /// Prior turns, oldest first
    pub history: Vec<Turn>,
    /// Agents to run, in routing order
    pub agents: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Succeeded,
    Failed,
}

/// Terminal state of one agent
#[derive(Debug, Clone, Serialize)]
pub struct AgentOutcome {
    pub agent: String,
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Inference attempts made; 0 when the prompt could not be assembled
    pub attempts: u32,
    pub ttft_seconds: Option<f64>,
    pub prefix_hash: Option<String>,
    pub cache_outcome: Option<CacheOutcome>,
    pub error: Option<String>,
    #[serde(skip)]
    pub(crate) failure: Option<TellerError>,
}

impl AgentOutcome {
    pub(crate) fn failed(agent: impl Into<String>, attempts: u32, error: TellerError) -> Self {
        Self {
            agent: agent.into(),
            status: AgentStatus::Failed,
            content: None,
            attempts,
            ttft_seconds: None,
            prefix_hash: None,
            cache_outcome: None,
            error: Some(error.to_string()),
            failure: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AgentStatus::Succeeded
    }

    /// Attempts that ended in an error
    pub fn failed_attempts(&self) -> u32 {
        match self.status {
            AgentStatus::Succeeded => self.attempts.saturating_sub(1),
            AgentStatus::Failed => self.attempts,
        }
    }

    /// The error that ended this agent, if it failed
    pub fn failure(&self) -> Option<&TellerError> {
        self.failure.as_ref()
    }
}

/// Joined result of a fan-out with at least one successful agent
#[derive(Debug, Clone, Serialize)]
pub struct FanoutOutcome {
    /// Agents that were actually dispatched, after de-duplication and truncation
    pub selected: Vec<String>,
    pub outcomes: BTreeMap<String, AgentOutcome>,
    /// Failed inference attempts across all agents
    pub retry_count: u32,
    /// Some, but not all, agents failed
    pub degraded: bool,
    pub escalation_required: bool,
    pub compliance_issues: Vec<String>,
}

impl FanoutOutcome {
    /// Successful agents in routing order
    pub fn agents_used(&self) -> Vec<String> {
        self.selected
            .iter()
            .filter(|agent| self.outcomes.get(*agent).is_some_and(AgentOutcome::is_success))
            .cloned()
            .collect()
    }

    pub fn failed_agents(&self) -> Vec<String> {
        self.selected
            .iter()
            .filter(|agent| self.outcomes.get(*agent).is_some_and(|o| !o.is_success()))
            .cloned()
            .collect()
    }

    /// Agent name to content, for successful agents only
    pub fn contributions(&self) -> BTreeMap<String, String> {
        self.outcomes
            .values()
            .filter_map(|o| o.content.as_ref().map(|c| (o.agent.clone(), c.clone())))
            .collect()
    }

    /// Mean TTFT across successful agents
    pub fn mean_ttft(&self) -> f64 {
        let ttfts: Vec<f64> = self.outcomes.values().filter_map(|o| o.ttft_seconds).collect();
        if ttfts.is_empty() {
            0.0
        } else {
            ttfts.iter().sum::<f64>() / ttfts.len() as f64
        }
    }
}
