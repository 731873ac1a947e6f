use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use agent::config::ConfigManager;
use agent::detect::{Detector, MysqlProber};
use agent::gm_client::HttpGmClient;
use agent::heartbeat::AgentHeartbeat;
use ha_common::hadb::types::module;
use ha_common::hadb::Registration;
use ha_common::logging::init_tracing;
use ha_common::{HaDbClient, ReportWorker, Reporter, StatusStore};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("agent")?;
    info!("Starting MySQL HA detection agent");

    let config_manager = ConfigManager::new("config".to_string()).await?;
    let config = config_manager.get_current_config();
    info!(
        "Loaded {} monitored instances for city {}",
        config.instances.len(),
        config.city_id
    );

    let store: Arc<dyn StatusStore> = Arc::new(HaDbClient::new(config.hadb.clone())?);
    store
        .register_component(&Registration {
            ip: config.ip.clone(),
            port: config.port,
            module: module::AGENT.to_string(),
            city_id: config.city_id,
            campus: config.campus.clone(),
            db_type: config.db_type.clone(),
        })
        .await
        .map_err(|e| anyhow!("Failed to register agent {}: {}", config.ip, e))?;
    info!("Registered agent {}", config.ip);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reporter = Reporter::new(store.clone(), &config.ip, module::AGENT, config.cloud_id);
    let report_worker = ReportWorker::new(
        reporter,
        Arc::new(AgentHeartbeat::new(store.clone(), config.clone())),
        Duration::from_secs(config.heartbeat_interval_seconds),
    );
    let report_handle = tokio::spawn(report_worker.run(shutdown_rx.clone()));

    let notifier = Arc::new(HttpGmClient::new(
        store.clone(),
        config.city_id,
        Duration::from_secs(config.freshness_seconds),
        Duration::from_secs(config.gm_timeout_seconds),
    )?);
    let detector = Detector::new(
        store.clone(),
        Arc::new(MysqlProber::new(&config.probe)),
        notifier,
        config.clone(),
    );
    let detect_handle = tokio::spawn(detector.run(shutdown_rx));

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
    let _ = shutdown_tx.send(true);

    if let Err(e) = detect_handle.await {
        error!("Detection loop task failed: {}", e);
    }
    if let Err(e) = report_handle.await {
        error!("Report worker task failed: {}", e);
    }

    info!("Agent stopped");
    Ok(())
}
