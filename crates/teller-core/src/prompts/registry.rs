//! Prompt template registry
//!
//! Holds every template by id and enforces that templates of one family share a
//! byte-identical static zone. A template that would break this is rejected at
//! registration, before any prompt is rendered.

use super::embedded::EMBEDDED_TEMPLATES;
use super::loader::{load_prompt_dir, parse_prompt_file};
use super::template::PromptTemplate;
use crate::error::{TellerError, TellerResult};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct PromptRegistry {
    templates: BTreeMap<String, Arc<PromptTemplate>>,
}

impl PromptRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the templates compiled into the binary
    pub fn with_embedded() -> TellerResult<Self> {
        let mut registry = Self::new();
        for (name, source) in EMBEDDED_TEMPLATES {
            registry.register(parse_prompt_file(source, name)?)?;
        }
        Ok(registry)
    }

    /// Embedded templates, overridden by any `*.md` files in `dir`
    pub fn with_overrides(dir: &Path) -> TellerResult<Self> {
        let mut registry = Self::with_embedded()?;
        for template in load_prompt_dir(dir)? {
            info!(template = %template.id, dir = %dir.display(), "overriding prompt template");
            registry.register(template)?;
        }
        Ok(registry)
    }

    /// Add or replace a template.
    ///
    /// Fails with [`TellerError::PrefixDrift`] when another template of the same
    /// family has a different static zone.
    pub fn register(&mut self, template: PromptTemplate) -> TellerResult<()> {
        let sibling = self
            .templates
            .values()
            .find(|t| t.family == template.family && t.id != template.id);

        if let Some(sibling) = sibling {
            if sibling.static_source_hash() != template.static_source_hash() {
                return Err(TellerError::PrefixDrift {
                    template: template.id.clone(),
                    family: template.family.clone(),
                    expected_hash: sibling.static_source_hash().to_string(),
                    actual_hash: template.static_source_hash().to_string(),
                });
            }
        }

        debug!(
            template = %template.id,
            family = %template.family,
            version = %template.version,
            "registered prompt template"
        );
        self.templates
            .insert(template.id.clone(), Arc::new(template));
        Ok(())
    }

    pub fn get(&self, id: &str) -> TellerResult<Arc<PromptTemplate>> {
        self.templates
            .get(id)
            .cloned()
            .ok_or_else(|| TellerError::template_not_found(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    /// Template ids in sorted order
    pub fn ids(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    pub fn templates(&self) -> impl Iterator<Item = &Arc<PromptTemplate>> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
