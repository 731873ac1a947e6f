use super::GmConfig;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::fs;
use tracing::info;

pub struct ConfigManager {
    current_config: Arc<GmConfig>,
}

impl ConfigManager {
    pub async fn new(config_dir: String) -> Result<Self> {
        let config = Self::load_configuration(&config_dir).await?;
        Ok(Self {
            current_config: Arc::new(config),
        })
    }

    pub fn get_current_config(&self) -> Arc<GmConfig> {
        self.current_config.clone()
    }

    async fn load_configuration(config_dir: &str) -> Result<GmConfig> {
        let main_config_path = format!("{}/main.toml", config_dir);
        let main_config_content = fs::read_to_string(&main_config_path)
            .await
            .map_err(|e| anyhow!("Failed to read main config {}: {}", main_config_path, e))?;

        let config: GmConfig = toml::from_str(&main_config_content)
            .map_err(|e| anyhow!("Failed to parse main config: {}", e))?;

        Self::validate(&config)?;

        info!(
            "Loaded GM config: {}:{} city {} cloud {}",
            config.ip, config.port, config.city_id, config.cloud_id
        );

        Ok(config)
    }

    fn validate(config: &GmConfig) -> Result<()> {
        if config.hadb.url.is_empty() {
            return Err(anyhow!("hadb.url must not be empty"));
        }
        if config.mysql.user.is_empty() {
            return Err(anyhow!("mysql.user must not be empty"));
        }
        if config.gcm.slow_wait_loops == 0 {
            return Err(anyhow!("gcm.slow_wait_loops must be at least 1"));
        }
        if config.report_interval_seconds == 0 {
            return Err(anyhow!("report_interval_seconds must be at least 1"));
        }
        Ok(())
    }
}
