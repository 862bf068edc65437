//! `teller serve`

use crate::http_server::TellerHttpServer;
use std::sync::Arc;
use teller_core::config::Settings;
use teller_core::error::TellerResult;
use teller_core::service::QueryService;
use tracing::{info, warn};

pub async fn run(settings: Settings, host: Option<String>, port: Option<u16>) -> TellerResult<()> {
    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    let service = Arc::new(QueryService::from_settings(&settings)?);
    info!(
        inference = %settings.inference.base_url,
        model = %settings.inference.model,
        hit_threshold = settings.cache.hit_threshold,
        "pipeline ready"
    );

    let server = TellerHttpServer::new(Arc::clone(&service));
    server.start(&host, port, shutdown_signal()).await?;
    drop(server);

    match Arc::try_unwrap(service) {
        Ok(service) => {
            let report = service.shutdown();
            info!(
                total_requests = report.total_requests,
                hit_rate = report.inferred_cache_hit_rate.unwrap_or_default(),
                grade = %report.grade,
                prefix_alignment_ok = report.prefix_alignment_ok,
                "final cache report"
            );
        }
        Err(_) => warn!("service still referenced at shutdown; skipping teardown"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
