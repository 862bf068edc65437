//! Command routing logic for CLI

use crate::args::{Cli, Commands};
use crate::{commands, logging};
use teller_core::config::load_settings;
use teller_core::error::TellerResult;

/// Load settings, install logging and run the selected command
pub async fn route(cli: Cli) -> TellerResult<()> {
    let settings = load_settings(cli.config.as_deref())?;
    logging::init(&settings.logging, cli.verbose)?;

    match cli.command {
        Commands::Serve { host, port } => commands::serve::run(settings, host, port).await,
        Commands::Ask {
            query,
            session,
            agents,
            json,
        } => commands::ask::run(&settings, &query, session, agents, json, cli.verbose).await,
        Commands::Render { agent, query, full } => {
            commands::render::run(&settings, &agent, &query, full)
        }
        Commands::Bench {
            url,
            requests,
            query,
        } => commands::bench::run(&url, requests, &query).await,
        Commands::Config { action } => commands::config::run(&settings, action),
    }
}
