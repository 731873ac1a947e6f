use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use gm::config::ConfigManager;
use gm::health::SlaveHealthChecker;
use gm::heartbeat::GmHeartbeat;
use gm::lifecycle::Daemon;
use gm::mysql::{InstanceConnector, MysqlConnector};
use gm::spider::SpiderPrimaryElector;
use gm::switch::{MysqlSwitch, SpiderSwitch, SwitchExecutor, SwitchService};
use gm::web::{start_web_server, AppState};
use ha_common::hadb::types::module;
use ha_common::hadb::Registration;
use ha_common::logging::init_tracing;
use ha_common::{
    HaDbClient, Mailbox, OverflowPolicy, ReportWorker, Reporter, StatusStore, SwitchThrottle,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("gm")?;
    info!("Starting MySQL HA group manager");

    let config_manager = ConfigManager::new("config".to_string()).await?;
    let config = config_manager.get_current_config();

    let store: Arc<dyn StatusStore> = Arc::new(HaDbClient::new(config.hadb.clone())?);
    store
        .register_component(&Registration {
            ip: config.ip.clone(),
            port: config.port,
            module: module::GM.to_string(),
            city_id: config.city_id,
            campus: config.campus.clone(),
            db_type: config.db_type.clone(),
        })
        .await
        .map_err(|e| anyhow!("Failed to register gm {}:{}: {}", config.ip, config.port, e))?;
    info!("Registered gm {}:{}", config.ip, config.port);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reporter = Reporter::new(store.clone(), &config.ip, module::GM, config.cloud_id);
    let heartbeat = Arc::new(GmHeartbeat::new(
        store.clone(),
        &config.ip,
        config.report_interval_seconds,
    ));
    let report_worker = ReportWorker::new(
        reporter.clone(),
        heartbeat,
        Duration::from_secs(config.report_interval_seconds),
    );
    let report_handle = tokio::spawn(report_worker.run(shutdown_rx.clone()));

    let connector: Arc<dyn InstanceConnector> = Arc::new(MysqlConnector::new(&config.mysql));
    let mysql_switch = Arc::new(MysqlSwitch::new(
        SlaveHealthChecker::new(
            connector.clone(),
            store.clone(),
            reporter.clone(),
            config.gcm.clone(),
        ),
        SwitchExecutor::new(connector.clone(), reporter.clone()),
    ));
    let spider_switch = Arc::new(SpiderSwitch::new(
        connector.clone(),
        SpiderPrimaryElector::new(connector.clone(), reporter.clone()),
    ));
    let service = SwitchService::new(
        store.clone(),
        SwitchThrottle::new(store.clone(), config.throttle.clone()),
        reporter.clone(),
        mysql_switch.clone(),
        mysql_switch,
        spider_switch,
        &config.mysql,
        config.cloud_id,
    );

    let switch_queue = Mailbox::new(
        "switch_queue",
        config.switch_queue_capacity,
        OverflowPolicy::Block,
    );
    let loop_queue = switch_queue.clone();
    let switch_handle = tokio::spawn(async move { service.run(loop_queue).await });

    let web_shutdown = shutdown_rx.clone();
    let state = AppState::new(config.clone(), switch_queue.clone());
    let web_handle = tokio::spawn(async move { start_web_server(state, web_shutdown).await });

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    Daemon {
        switch_queue,
        switch_loop: switch_handle,
        web_server: web_handle,
        report_worker: report_handle,
        shutdown: shutdown_tx,
    }
    .shutdown()
    .await;

    info!("Group manager stopped");
    Ok(())
}
