//! `teller render`

use crate::console::CliConsole;
use std::sync::Arc;
use teller_core::config::Settings;
use teller_core::error::{TellerError, TellerResult};
use teller_core::prompts::{PromptAssembler, PromptInputs, PromptRegistry, load_manual};

/// Render one prompt offline and report on the shared prefix
pub fn run(settings: &Settings, agent: &str, query: &str, full: bool) -> TellerResult<()> {
    let console = CliConsole::new(false);
    let manual = load_manual(&settings.prompts.manual_path)?;
    let templates = match &settings.prompts.template_dir {
        Some(dir) => PromptRegistry::with_overrides(dir)?,
        None => PromptRegistry::with_embedded()?,
    };
    let assembler = PromptAssembler::new(Arc::new(templates), &manual, settings.cache.chunk_size)?;

    let prompt = assembler.render(agent, &PromptInputs::new(query, Vec::new()))?;

    console.print_header(&format!("Prompt: {}", prompt.template_id));
    console.print_field("prefix hash", &prompt.prefix_hash);
    console.print_field("prefix tokens (est.)", prompt.prefix_token_estimate);
    console.print_field("total tokens (est.)", prompt.total_token_estimate);
    console.print_field("manual hash", assembler.manual_hash());
    if prompt.chunk_aligned {
        console.success(&format!(
            "Prefix is aligned to {}-token chunks",
            settings.cache.chunk_size
        ));
    } else {
        console.warn(&format!(
            "Prefix is not aligned to {}-token chunks ({} tokens past the last boundary)",
            settings.cache.chunk_size,
            prompt.prefix_token_estimate % settings.cache.chunk_size.max(1)
        ));
    }

    console.print_header("Families");
    let families = assembler.family_prefixes();
    for family in &families {
        console.print_field(&family.family, &family.prefix_hash);
        console.print_field("  templates", family.templates.join(", "));
    }
    let family = families
        .iter()
        .find(|f| f.prefix_hash == prompt.prefix_hash)
        .ok_or_else(|| TellerError::other("rendered prefix matches no family"))?;
    if families.len() == 1 {
        console.success(&format!(
            "All {} templates share prefix {}",
            family.templates.len(),
            family.prefix_hash
        ));
    } else {
        console.warn(&format!(
            "{} prefix families loaded; only the {} templates of '{}' share this prefix",
            families.len(),
            family.templates.len(),
            family.family
        ));
    }

    if full {
        console.print_header("Rendered prompt");
        println!("{}", prompt.text);
    }
    Ok(())
}
