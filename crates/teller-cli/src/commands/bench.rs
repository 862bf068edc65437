//! `teller bench`
//!
//! Resets the server's cache statistics, sends one cold query and then warm
//! queries in fresh sessions (so only the static prefix is shared), and reports
//! the inferred speedup.

use crate::api_types::{BenchQueryResponse, CacheStats, ErrorResponse, ResetResponse};
use crate::console::CliConsole;
use colored::*;
use serde::de::DeserializeOwned;
use std::time::Instant;
use teller_core::error::{TellerError, TellerResult};
use uuid::Uuid;

struct Sample {
    wall_seconds: f64,
    ttft_seconds: f64,
}

pub async fn run(url: &str, requests: usize, query: &str) -> TellerResult<()> {
    let base = url.trim_end_matches('/');
    let client = reqwest::Client::new();
    let mut console = CliConsole::new(false);

    console.print_header("Teller cache benchmark");
    console.print_field("server", base);
    console.print_field("warm requests", requests);

    let reset: ResetResponse =
        read_json(client.post(format!("{}/cache/reset", base)).send().await?).await?;
    console.info(&format!("Cache statistics {}", reset.status));

    console.start_progress("Cold request...");
    let cold = send_query(&client, base, query).await;
    console.finish_progress();
    let cold = cold?;
    console.print_field("cold wall time", format!("{:.2}s", cold.wall_seconds));
    console.print_field("cold ttft", format!("{:.2}s", cold.ttft_seconds));

    let mut warm = Vec::with_capacity(requests);
    console.start_progress("Warm requests...");
    for i in 0..requests {
        console.update_progress(&format!("Warm request {}/{}", i + 1, requests));
        match send_query(&client, base, query).await {
            Ok(sample) => warm.push(sample),
            Err(e) => console.warn(&format!("request {} failed: {}", i + 1, e)),
        }
    }
    console.finish_progress();

    if !warm.is_empty() {
        let n = warm.len() as f64;
        let wall = warm.iter().map(|s| s.wall_seconds).sum::<f64>() / n;
        let ttft = warm.iter().map(|s| s.ttft_seconds).sum::<f64>() / n;
        console.print_field("warm mean wall time", format!("{:.2}s", wall));
        console.print_field("warm mean ttft", format!("{:.2}s", ttft));
        if ttft > 0.0 {
            console.print_field(
                "speedup",
                format!("{:.1}x", cold.ttft_seconds / ttft).bold(),
            );
        }
    }

    let stats: CacheStats =
        read_json(client.get(format!("{}/cache/stats", base)).send().await?).await?;
    print_stats(&console, &stats);
    Ok(())
}

async fn send_query(client: &reqwest::Client, base: &str, query: &str) -> TellerResult<Sample> {
    let started = Instant::now();
    let response = client
        .post(format!("{}/api/v1/query", base))
        .json(&serde_json::json!({
            "query": query,
            "session_id": format!("bench-{}", Uuid::new_v4()),
            "user_id": "bench",
        }))
        .send()
        .await?;
    let body: BenchQueryResponse = read_json(response).await?;
    if body.degraded {
        tracing::warn!(
            session_id = %body.session_id,
            agents = ?body.agents_used,
            "degraded response"
        );
    }
    Ok(Sample {
        wall_seconds: started.elapsed().as_secs_f64(),
        ttft_seconds: body.ttft_seconds,
    })
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> TellerResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let url = response.url().to_string();
    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => format!("server returned {}: {} ({})", status, body.error, body.code),
        Err(_) => format!("server returned {}", status),
    };
    Err(TellerError::io_with_path(message, url))
}

fn print_stats(console: &CliConsole, stats: &CacheStats) {
    console.print_header("Server cache stats");
    console.print_field("total requests", stats.total_requests);
    console.print_field(
        "hit rate",
        stats
            .inferred_cache_hit_rate
            .map(|r| format!("{:.1}%", r * 100.0))
            .unwrap_or_else(|| "n/a".to_string()),
    );
    console.print_field(
        "cold baseline",
        stats
            .cold_cache_baseline_seconds
            .map(|b| format!("{:.2}s", b))
            .unwrap_or_else(|| "n/a".to_string()),
    );
    console.print_field(
        "avg ttft",
        stats
            .avg_ttft_seconds
            .map(|b| format!("{:.2}s", b))
            .unwrap_or_else(|| "n/a".to_string()),
    );
    console.print_field("unique prefixes", stats.unique_prefix_hashes);
    console.print_field("grade", stats.grade.bold());
    if stats.prefix_alignment_ok {
        console.success(&stats.recommendation);
    } else {
        console.warn(&stats.recommendation);
    }
}
