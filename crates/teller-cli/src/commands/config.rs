//! `teller config`

use crate::args::ConfigAction;
use crate::console::CliConsole;
use teller_core::config::Settings;
use teller_core::error::TellerResult;
use teller_core::prompts::{PromptAssembler, PromptRegistry, load_manual};

pub fn run(settings: &Settings, action: ConfigAction) -> TellerResult<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", settings.to_toml()?);
            Ok(())
        }
        ConfigAction::Validate => validate(settings),
    }
}

/// Settings are validated on load; this also checks the manual and templates
fn validate(settings: &Settings) -> TellerResult<()> {
    let console = CliConsole::new(false);
    console.success("Settings are valid");

    let manual = load_manual(&settings.prompts.manual_path)?;
    console.success(&format!(
        "Manual loaded from {} ({} chars)",
        settings.prompts.manual_path.display(),
        manual.chars().count()
    ));

    let templates = match &settings.prompts.template_dir {
        Some(dir) => PromptRegistry::with_overrides(dir)?,
        None => PromptRegistry::with_embedded()?,
    };
    let count = templates.len();
    let assembler = PromptAssembler::new(
        std::sync::Arc::new(templates),
        &manual,
        settings.cache.chunk_size,
    )?;
    console.success(&format!(
        "{} templates in {} prefix families",
        count,
        assembler.family_prefixes().len()
    ));
    Ok(())
}
