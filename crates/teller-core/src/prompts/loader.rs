//! Prompt file loader
//!
//! Templates are markdown files with YAML frontmatter:
//!
//! ```text
//! ---
//! name: compliance_auditor
//! version: 1.2.0
//! family: bank_ops
//! required: [history, query]
//! ---
//! ...static zone...
//! <<< END OF MANUAL >>>
//! ...dynamic zone...
//! ```

use super::template::{PromptField, PromptTemplate};
use crate::error::{TellerError, TellerResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Prompt file frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    /// Template identifier; falls back to the file stem
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_family")]
    pub family: String,
    /// Fields that must be supplied even if the body does not reference them
    #[serde(default)]
    pub required: Vec<PromptField>,
}

impl Default for PromptMetadata {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            version: default_version(),
            family: default_family(),
            required: Vec::new(),
        }
    }
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_family() -> String {
    "default".to_string()
}

/// Parse template source, using `fallback_name` when the frontmatter has none
pub fn parse_prompt_file(content: &str, fallback_name: &str) -> TellerResult<PromptTemplate> {
    let (metadata, body) = parse_frontmatter(content, fallback_name)?;
    let name = if metadata.name.is_empty() {
        fallback_name.to_string()
    } else {
        metadata.name
    };

    Ok(
        PromptTemplate::new(name, metadata.version, metadata.family, body, &metadata.required)?
            .with_description(metadata.description),
    )
}

fn parse_frontmatter<'a>(
    content: &'a str,
    source: &str,
) -> TellerResult<(PromptMetadata, &'a str)> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let trimmed = content.trim_start();

    let Some(rest) = trimmed.strip_prefix("---") else {
        return Ok((PromptMetadata::default(), content));
    };

    let end_pos = rest.find("\n---").ok_or_else(|| {
        TellerError::render(source, "invalid frontmatter: missing closing ---")
    })?;

    let frontmatter = rest[..end_pos].trim();
    let body = &rest[end_pos + 4..];
    let body = body.strip_prefix("\r\n").or_else(|| body.strip_prefix('\n')).unwrap_or(body);

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter).map_err(|e| {
        TellerError::render(source, format!("failed to parse frontmatter YAML: {}", e))
    })?;

    Ok((metadata, body))
}

/// Load a single template from disk
pub fn load_prompt_file(path: &Path) -> TellerResult<PromptTemplate> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        TellerError::io_with_path(
            format!("Failed to read prompt file: {}", e),
            path.display().to_string(),
        )
    })?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    parse_prompt_file(&content, stem)
}

/// Load every `*.md` template in `dir`, sorted by file name
pub fn load_prompt_dir(dir: &Path) -> TellerResult<Vec<PromptTemplate>> {
    if !dir.is_dir() {
        return Err(TellerError::io_with_path(
            "Prompt directory does not exist",
            dir.display().to_string(),
        ));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
        .collect();
    paths.sort();

    if paths.is_empty() {
        warn!(dir = %dir.display(), "no prompt templates found in directory");
    }

    let mut templates = Vec::with_capacity(paths.len());
    for path in paths {
        let template = load_prompt_file(&path)?;
        debug!(path = %path.display(), template = %template.id, "loaded prompt template");
        templates.push(template);
    }
    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const FILE: &str = "---\nname: support_concierge\nversion: 2.1.0\nfamily: bank_ops\nrequired: [history, query]\ndescription: Customer-facing answers\n---\n{{manual_content}}\n<<< END OF MANUAL >>>\nQ: {{query}}\n";

    #[test]
    fn test_parse_frontmatter_fields() {
        let t = parse_prompt_file(FILE, "fallback").unwrap();
        assert_eq!(t.id, "support_concierge");
        assert_eq!(t.version, "2.1.0");
        assert_eq!(t.family, "bank_ops");
        assert_eq!(t.description, "Customer-facing answers");
        assert!(t.required_fields().contains(&PromptField::History));
    }

    #[test]
    fn test_missing_frontmatter_uses_defaults() {
        let body = "{{manual_content}}\n<<< END OF MANUAL >>>\n{{query}}";
        let t = parse_prompt_file(body, "router").unwrap();
        assert_eq!(t.id, "router");
        assert_eq!(t.version, "1.0.0");
        assert_eq!(t.family, "default");
    }

    #[test]
    fn test_unclosed_frontmatter() {
        let err = parse_prompt_file("---\nname: x\n{{query}}", "x").unwrap_err();
        assert!(err.to_string().contains("closing"));
    }

    #[test]
    fn test_unknown_required_field_is_rejected() {
        let content = "---\nrequired: [account_number]\n---\n{{manual_content}}\n<<< END OF MANUAL >>>\n";
        assert!(parse_prompt_file(content, "x").is_err());
    }

    #[test]
    fn test_load_dir_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b_agent.md"), "{{manual_content}}\n<<< END OF MANUAL >>>\nB {{query}}").unwrap();
        fs::write(temp_dir.path().join("a_agent.md"), "{{manual_content}}\n<<< END OF MANUAL >>>\nA {{query}}").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let templates = load_prompt_dir(temp_dir.path()).unwrap();
        let ids: Vec<_> = templates.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a_agent", "b_agent"]);
    }

    #[test]
    fn test_load_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt_dir(&temp_dir.path().join("nope")).is_err());
    }
}
