//! `teller ask`

use crate::console::CliConsole;
use colored::*;
use std::sync::Arc;
use teller_core::cache::CacheOutcome;
use teller_core::config::Settings;
use teller_core::error::{TellerError, TellerResult};
use teller_core::fanout::{AgentStatus, StaticRouter};
use teller_core::service::{QueryRequest, QueryResponse, QueryService};

pub async fn run(
    settings: &Settings,
    query: &str,
    session: Option<String>,
    agents: Vec<String>,
    json: bool,
    verbose: bool,
) -> TellerResult<()> {
    let mut service = QueryService::from_settings(settings)?;
    if !agents.is_empty() {
        service = service.with_router(Arc::new(StaticRouter::new(agents)));
    }

    let mut console = CliConsole::new(verbose);
    console.start_progress("Consulting agents...");
    let mut request = QueryRequest::new(query, session.unwrap_or_default());
    request.user_id = Some("cli".to_string());
    let result = service.answer(&request).await;
    console.finish_progress();

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            console.error(&e.to_string());
            return Err(e);
        }
    };

    if json {
        let text = serde_json::to_string_pretty(&response)
            .map_err(|e| TellerError::json(e.to_string()))?;
        println!("{}", text);
        return Ok(());
    }

    println!("{}", response.response);
    print_diagnostics(&console, &response);

    let report = service.registry().report();
    console.print_header("Cache");
    console.print_field("requests", report.total_requests);
    console.print_field("grade", report.grade);
    console.print_field("recommendation", &report.recommendation);
    Ok(())
}

fn print_diagnostics(console: &CliConsole, response: &QueryResponse) {
    console.print_header("Diagnostics");
    console.print_field("session", &response.session_id);
    console.print_field("agents", response.agents_used.join(", "));
    console.print_field("retries", response.retry_count);
    console.print_field("mean ttft", format!("{:.2}s", response.ttft_seconds));

    for diagnostic in &response.diagnostics {
        let status = match diagnostic.status {
            AgentStatus::Succeeded => "ok".green(),
            AgentStatus::Failed => "failed".red(),
        };
        let cache = match diagnostic.cache_outcome {
            Some(CacheOutcome::Hit) => "hit".green(),
            Some(CacheOutcome::Miss) => "miss".yellow(),
            Some(CacheOutcome::Baseline) => "baseline".blue(),
            None => "-".dimmed(),
        };
        let ttft = diagnostic
            .ttft_seconds
            .map(|t| format!("{:.2}s", t))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<22} {:<8} attempts={} ttft={:<7} cache={} prefix={}",
            diagnostic.agent,
            status,
            diagnostic.attempts,
            ttft,
            cache,
            diagnostic.prefix_hash.as_deref().unwrap_or("-").dimmed()
        );
        if let Some(error) = &diagnostic.error {
            console.print_debug(&format!("    {}", error));
        }
    }

    if response.degraded {
        console.warn(&format!(
            "Degraded answer: {} did not respond",
            response.failed_agents.join(", ")
        ));
    }
    if response.escalation_required {
        console.warn("Escalation required: a compliance review flagged uncertainty");
    }
    for issue in &response.compliance_issues {
        console.print_debug(&format!("  - {}", issue));
    }
}
