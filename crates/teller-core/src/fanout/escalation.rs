//! Uncertainty scanning and escalation

use crate::config::FanoutSettings;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Outcome of scanning agent contributions
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Escalation {
    /// One entry per agent whose answer contains an uncertainty marker
    pub issues: Vec<String>,
    /// A compliance-sensitive agent signalled uncertainty
    pub required: bool,
}

#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    /// `(original, lowercased)` marker pairs
    markers: Vec<(String, String)>,
    compliance_agents: Vec<String>,
}

impl EscalationPolicy {
    pub fn new(markers: &[String], compliance_agents: &[String]) -> Self {
        Self {
            markers: markers
                .iter()
                .filter(|m| !m.trim().is_empty())
                .map(|m| (m.clone(), m.to_lowercase()))
                .collect(),
            compliance_agents: compliance_agents.to_vec(),
        }
    }

    pub fn from_settings(settings: &FanoutSettings) -> Self {
        Self::new(&settings.uncertainty_markers, &settings.compliance_agents)
    }

    /// First marker found in `content`, matched case-insensitively
    pub fn find_marker(&self, content: &str) -> Option<&str> {
        let lowered = content.to_lowercase();
        self.markers
            .iter()
            .find(|(_, needle)| lowered.contains(needle.as_str()))
            .map(|(original, _)| original.as_str())
    }

    pub fn is_compliance_agent(&self, agent: &str) -> bool {
        self.compliance_agents.iter().any(|a| a == agent)
    }

    pub fn assess(&self, contributions: &BTreeMap<String, String>) -> Escalation {
        let mut escalation = Escalation::default();
        for (agent, content) in contributions {
            if let Some(marker) = self.find_marker(content) {
                escalation
                    .issues
                    .push(format!("{}: Contains uncertainty - '{}'", agent, marker));
                if self.is_compliance_agent(agent) {
                    escalation.required = true;
                }
            }
        }
        if escalation.required {
            info!(issues = escalation.issues.len(), "response escalated for human review");
        }
        escalation
    }
}
