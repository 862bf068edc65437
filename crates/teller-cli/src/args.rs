//! CLI argument definitions using clap
//!
//! - teller serve                       # HTTP API
//! - teller ask "question"              # One-shot answer with cache diagnostics
//! - teller render --query "question"   # Inspect a rendered prompt, no network
//! - teller bench --url <base>          # Cold/warm latency benchmark
//! - teller config show                 # Effective settings

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "teller")]
#[command(about = "Teller - cache-aware multi-agent answers over a bank operations manual")]
#[command(version)]
pub struct Cli {
    /// Path to a settings file (defaults to ./teller.toml when present)
    #[arg(long, global = true, env = "TELLER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging for teller crates
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Bind address (overrides `server.host`)
        #[arg(long)]
        host: Option<String>,

        /// Port (overrides `server.port`)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Answer one question and print cache diagnostics
    Ask {
        /// The question to answer
        query: String,

        /// Session to continue
        #[arg(long)]
        session: Option<String>,

        /// Skip routing and use these agents (comma separated)
        #[arg(long, value_delimiter = ',')]
        agents: Vec<String>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a prompt and check prefix sharing without calling the model
    Render {
        /// Template to render
        #[arg(long, default_value = "technical_specialist")]
        agent: String,

        /// Question placed in the dynamic zone
        #[arg(long)]
        query: String,

        /// Also print the rendered prompt
        #[arg(long)]
        full: bool,
    },

    /// Measure cold versus warm latency against a running server
    Bench {
        /// Base URL of the server
        #[arg(long, default_value = "http://localhost:8000")]
        url: String,

        /// Warm requests sent after the cold one
        #[arg(long, default_value_t = 5)]
        requests: usize,

        /// Question sent on every request
        #[arg(long, default_value = "What is the cutoff time for outgoing domestic wires?")]
        query: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigAction {
    /// Print the effective settings as TOML
    Show,
    /// Check settings, the manual and the templates
    Validate,
}
