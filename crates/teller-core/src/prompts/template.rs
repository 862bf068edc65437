//! Zoned prompt templates
//!
//! A template body is split by [`STATIC_ZONE_DELIMITER`] into a static zone,
//! shared byte-for-byte by every template of a family, and a dynamic zone
//! holding the agent role, history and query.

use super::normalize::{STATIC_ZONE_DELIMITER, normalize, prefix_hash};
use crate::error::{TellerError, TellerResult};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Fields a template may reference as `{{field}}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptField {
    ManualContent,
    History,
    Query,
    AgentRole,
}

/// Which side of the delimiter a field belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Static,
    Dynamic,
}

impl PromptField {
    pub const ALL: [PromptField; 4] = [
        PromptField::ManualContent,
        PromptField::History,
        PromptField::Query,
        PromptField::AgentRole,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PromptField::ManualContent => "manual_content",
            PromptField::History => "history",
            PromptField::Query => "query",
            PromptField::AgentRole => "agent_role",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    pub fn zone(&self) -> Zone {
        match self {
            PromptField::ManualContent => Zone::Static,
            _ => Zone::Dynamic,
        }
    }
}

impl fmt::Display for PromptField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn placeholder_regex() -> TellerResult<&'static Regex> {
    static PLACEHOLDER: OnceCell<Regex> = OnceCell::new();
    PLACEHOLDER.get_or_try_init(|| {
        Regex::new(r"\{\{(\w+)\}\}")
            .map_err(|e| TellerError::other(format!("invalid placeholder pattern: {}", e)))
    })
}

/// A parsed, validated template
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Template identifier; also the agent name it serves
    pub id: String,
    pub version: String,
    /// Templates of one family share a static zone
    pub family: String,
    pub description: String,
    static_source: String,
    dynamic_source: String,
    static_source_hash: String,
    required: Vec<PromptField>,
    dynamic_fields: Vec<PromptField>,
}

impl PromptTemplate {
    /// Build a template from a body containing exactly one delimiter.
    ///
    /// `declared_required` is merged with the fields the body references; every
    /// referenced field is required at render time.
    pub fn new(
        id: impl Into<String>,
        version: impl Into<String>,
        family: impl Into<String>,
        body: &str,
        declared_required: &[PromptField],
    ) -> TellerResult<Self> {
        let id = id.into();
        let mut parts = body.split(STATIC_ZONE_DELIMITER);
        let (static_part, dynamic_part) = match (parts.next(), parts.next(), parts.next()) {
            (Some(s), Some(d), None) => (s, d),
            (_, None, _) => {
                return Err(TellerError::render(
                    &id,
                    format!("missing delimiter '{}'", STATIC_ZONE_DELIMITER),
                ));
            }
            _ => {
                return Err(TellerError::render(
                    &id,
                    format!("delimiter '{}' appears more than once", STATIC_ZONE_DELIMITER),
                ));
            }
        };

        let static_source = normalize(static_part);
        let dynamic_source = normalize(dynamic_part.strip_prefix('\n').unwrap_or(dynamic_part));

        let static_fields = extract_fields(&id, &static_source)?;
        let dynamic_fields = extract_fields(&id, &dynamic_source)?;

        for field in &static_fields {
            if field.zone() != Zone::Static {
                return Err(TellerError::render(
                    &id,
                    format!("field '{}' is not allowed in the static zone", field),
                ));
            }
        }
        for field in &dynamic_fields {
            if field.zone() != Zone::Dynamic {
                return Err(TellerError::render(
                    &id,
                    format!("field '{}' is only allowed in the static zone", field),
                ));
            }
        }

        let mut required: Vec<PromptField> = declared_required
            .iter()
            .copied()
            .chain(static_fields.iter().copied())
            .chain(dynamic_fields.iter().copied())
            .collect();
        required.sort();
        required.dedup();

        Ok(Self {
            id,
            version: version.into(),
            family: family.into(),
            description: String::new(),
            static_source_hash: prefix_hash(&static_source),
            static_source,
            dynamic_source,
            required,
            dynamic_fields,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Normalized static zone before manual substitution
    pub fn static_source(&self) -> &str {
        &self.static_source
    }

    /// Hash of [`Self::static_source`], used for family drift checks
    pub fn static_source_hash(&self) -> &str {
        &self.static_source_hash
    }

    pub fn required_fields(&self) -> &[PromptField] {
        &self.required
    }

    /// Static zone with the manual substituted, normalized
    pub fn render_static(&self, manual: &str) -> TellerResult<String> {
        let pattern = placeholder_regex()?;
        let rendered = pattern.replace_all(&self.static_source, |caps: &regex::Captures| {
            match PromptField::from_name(&caps[1]) {
                Some(PromptField::ManualContent) => manual.to_string(),
                _ => caps[0].to_string(),
            }
        });
        Ok(normalize(&rendered))
    }

    /// Dynamic zone with every referenced field substituted in one pass.
    ///
    /// Values are inserted verbatim, so a query containing `{{history}}` is not
    /// expanded again.
    pub fn render_dynamic(&self, values: &HashMap<PromptField, String>) -> TellerResult<String> {
        for field in &self.required {
            if field.zone() == Zone::Dynamic && !values.contains_key(field) {
                return Err(TellerError::missing_field(&self.id, field.name()));
            }
        }

        let pattern = placeholder_regex()?;
        let rendered = pattern.replace_all(&self.dynamic_source, |caps: &regex::Captures| {
            PromptField::from_name(&caps[1])
                .and_then(|field| values.get(&field))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        });
        Ok(normalize(&rendered))
    }

    /// Dynamic fields referenced by the body
    pub fn dynamic_fields(&self) -> &[PromptField] {
        &self.dynamic_fields
    }
}

fn extract_fields(template: &str, source: &str) -> TellerResult<Vec<PromptField>> {
    let mut fields = Vec::new();
    for caps in placeholder_regex()?.captures_iter(source) {
        let name = &caps[1];
        let field = PromptField::from_name(name).ok_or_else(|| {
            TellerError::render(template, format!("unknown placeholder '{{{{{}}}}}'", name))
        })?;
        if !fields.contains(&field) {
            fields.push(field);
        }
    }
    Ok(fields)
}
