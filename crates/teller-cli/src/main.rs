//! Teller CLI application
//!
//! Serves the multi-agent answering API and offers tooling around it:
//! one-shot questions, offline prompt inspection and a cold/warm cache
//! benchmark against a running server.

mod api_types;
mod args;
mod commands;
mod console;
mod http_server;
mod logging;
mod router;

use clap::Parser;
use teller_core::error::TellerResult;

pub use args::{Cli, Commands, ConfigAction};

#[tokio::main]
async fn main() -> TellerResult<()> {
    let cli = Cli::parse();
    router::route(cli).await
}
