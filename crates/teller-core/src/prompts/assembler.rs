//! Prompt assembly
//!
//! The assembler renders the static zone of each family once, at construction,
//! and reuses those exact bytes for every prompt. Only the dynamic zone is built
//! per call.

use super::normalize::{
    EMPTY_HISTORY, STATIC_ZONE_DELIMITER, TURN_BOUNDARY, estimate_tokens, normalize, prefix_hash,
};
use super::registry::PromptRegistry;
use super::template::PromptField;
use crate::error::{TellerError, TellerResult};
use crate::session::Turn;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Values available to a template's dynamic zone.
///
/// A `None` field is missing; rendering a template that needs it fails. An
/// empty history is a value and renders as "(No previous conversation)".
#[derive(Debug, Clone, Default)]
pub struct PromptInputs {
    pub query: Option<String>,
    pub history: Option<Vec<Turn>>,
    pub agent_role: Option<String>,
}

impl PromptInputs {
    pub fn new(query: impl Into<String>, history: Vec<Turn>) -> Self {
        Self {
            query: Some(query.into()),
            history: Some(history),
            agent_role: None,
        }
    }

    pub fn with_agent_role(mut self, role: impl Into<String>) -> Self {
        self.agent_role = Some(role.into());
        self
    }
}

/// Rendered static zone shared by one family
#[derive(Debug, Clone)]
struct StaticZone {
    text: Arc<str>,
    hash: String,
    token_estimate: usize,
}

/// A fully rendered prompt for one agent invocation
#[derive(Debug, Clone, Serialize)]
pub struct RenderedPrompt {
    pub template_id: String,
    pub text: String,
    /// SHA-256 (first 16 hex chars) of the normalized static zone
    pub prefix_hash: String,
    pub total_token_estimate: usize,
    pub prefix_token_estimate: usize,
    /// Whether the estimated prefix length is a multiple of the cache chunk size
    pub chunk_aligned: bool,
    #[serde(skip)]
    static_zone: Arc<str>,
}

impl RenderedPrompt {
    pub fn static_zone(&self) -> &str {
        &self.static_zone
    }

    /// The part after the delimiter line
    pub fn dynamic_zone(&self) -> &str {
        let start = self.static_zone.len() + 1 + STATIC_ZONE_DELIMITER.len() + 1;
        self.text.get(start..).unwrap_or_default()
    }
}

/// Prefix summary for one family, used for startup checks and diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct FamilyPrefix {
    pub family: String,
    pub prefix_hash: String,
    pub prefix_token_estimate: usize,
    pub chunk_aligned: bool,
    pub templates: Vec<String>,
}

#[derive(Debug)]
pub struct PromptAssembler {
    registry: Arc<PromptRegistry>,
    manual_hash: String,
    chunk_size: usize,
    static_zones: HashMap<String, StaticZone>,
}

impl PromptAssembler {
    /// Build an assembler over `registry` with `manual` injected into every static zone
    pub fn new(
        registry: Arc<PromptRegistry>,
        manual: &str,
        chunk_size: usize,
    ) -> TellerResult<Self> {
        let manual = normalize(manual);
        let chunk_size = chunk_size.max(1);
        let mut static_zones: HashMap<String, StaticZone> = HashMap::new();

        for template in registry.templates() {
            if static_zones.contains_key(&template.family) {
                continue;
            }
            let text = template.render_static(&manual)?;
            let zone = StaticZone {
                hash: prefix_hash(&text),
                token_estimate: estimate_tokens(&text),
                text: Arc::from(text),
            };
            if zone.token_estimate % chunk_size != 0 {
                debug!(
                    family = %template.family,
                    tokens = zone.token_estimate,
                    remainder = zone.token_estimate % chunk_size,
                    chunk_size,
                    "static zone is not chunk-aligned"
                );
            }
            static_zones.insert(template.family.clone(), zone);
        }

        Ok(Self {
            registry,
            manual_hash: prefix_hash(&manual),
            chunk_size,
            static_zones,
        })
    }

    pub fn registry(&self) -> &PromptRegistry {
        &self.registry
    }

    /// Hash of the normalized manual injected into every prompt
    pub fn manual_hash(&self) -> &str {
        &self.manual_hash
    }

    /// Render the prompt for `template_id`.
    ///
    /// Fails with `TemplateNotFound` for an unknown id and with a render error
    /// when a field the template needs is missing or the query is blank.
    #[instrument(skip(self, inputs), fields(template = %template_id))]
    pub fn render(&self, template_id: &str, inputs: &PromptInputs) -> TellerResult<RenderedPrompt> {
        let template = self.registry.get(template_id)?;
        let zone = self.static_zones.get(&template.family).ok_or_else(|| {
            TellerError::render(
                template_id,
                format!("no static zone for family '{}'", template.family),
            )
        })?;

        let dynamic = template.render_dynamic(&field_values(inputs))?;

        let capacity = zone.text.len() + STATIC_ZONE_DELIMITER.len() + dynamic.len() + 2;
        let mut text = String::with_capacity(capacity);
        text.push_str(&zone.text);
        text.push('\n');
        text.push_str(STATIC_ZONE_DELIMITER);
        text.push('\n');
        text.push_str(&dynamic);

        Ok(RenderedPrompt {
            template_id: template.id.clone(),
            total_token_estimate: estimate_tokens(&text),
            text,
            prefix_hash: zone.hash.clone(),
            prefix_token_estimate: zone.token_estimate,
            chunk_aligned: zone.token_estimate % self.chunk_size == 0,
            static_zone: Arc::clone(&zone.text),
        })
    }

    /// One entry per family with the static-zone hash every member shares
    pub fn family_prefixes(&self) -> Vec<FamilyPrefix> {
        let mut families: Vec<FamilyPrefix> = self
            .static_zones
            .iter()
            .map(|(family, zone)| FamilyPrefix {
                family: family.clone(),
                prefix_hash: zone.hash.clone(),
                prefix_token_estimate: zone.token_estimate,
                chunk_aligned: zone.token_estimate % self.chunk_size == 0,
                templates: self
                    .registry
                    .templates()
                    .filter(|t| &t.family == family)
                    .map(|t| t.id.clone())
                    .collect(),
            })
            .collect();
        families.sort_by(|a, b| a.family.cmp(&b.family));
        families
    }
}

/// Normalized substitution values; a blank query is treated as absent
fn field_values(inputs: &PromptInputs) -> HashMap<PromptField, String> {
    let mut values = HashMap::new();

    if let Some(query) = &inputs.query {
        let query = normalize(query.trim());
        if !query.is_empty() {
            values.insert(PromptField::Query, query);
        }
    }
    if let Some(history) = &inputs.history {
        values.insert(PromptField::History, format_history(history));
    }
    if let Some(role) = &inputs.agent_role {
        values.insert(PromptField::AgentRole, normalize(role.trim()));
    }

    values
}

/// `ROLE: content` per turn, joined by the turn boundary
pub fn format_history(history: &[Turn]) -> String {
    if history.is_empty() {
        return EMPTY_HISTORY.to_string();
    }
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), normalize(turn.content.trim())))
        .collect::<Vec<_>>()
        .join(TURN_BOUNDARY)
}
