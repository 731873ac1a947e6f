use super::{AgentConfig, ClusterConfigFile};
use anyhow::{anyhow, Result};
use glob::glob;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

pub struct ConfigManager {
    current_config: Arc<AgentConfig>,
}

impl ConfigManager {
    pub async fn new(config_dir: String) -> Result<Self> {
        let config = Self::load_configuration(&config_dir).await?;
        Ok(Self {
            current_config: Arc::new(config),
        })
    }

    pub fn get_current_config(&self) -> Arc<AgentConfig> {
        self.current_config.clone()
    }

    async fn load_configuration(config_dir: &str) -> Result<AgentConfig> {
        let main_config_path = format!("{}/main.toml", config_dir);
        let main_config_content = fs::read_to_string(&main_config_path)
            .await
            .map_err(|e| anyhow!("Failed to read main config {}: {}", main_config_path, e))?;

        let mut config: AgentConfig = toml::from_str(&main_config_content)
            .map_err(|e| anyhow!("Failed to parse main config: {}", e))?;

        let pattern = format!("{}/*.toml", config_dir);
        let mut seen = HashSet::new();

        for entry in glob(&pattern).map_err(|e| anyhow!("Glob pattern error: {}", e))? {
            let path = entry.map_err(|e| anyhow!("Glob entry error: {}", e))?;
            let filename = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| anyhow!("Invalid filename"))?;

            if filename == "main.toml" {
                continue;
            }

            debug!("Loading cluster config: {}", path.display());

            let content = fs::read_to_string(&path)
                .await
                .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))?;

            let cluster_file: ClusterConfigFile = toml::from_str(&content)
                .map_err(|e| anyhow!("Failed to parse {}: {}", path.display(), e))?;

            for instance in cluster_file.instances {
                if !seen.insert(instance.addr()) {
                    return Err(anyhow!(
                        "Instance {} declared twice (last in {})",
                        instance.addr(),
                        path.display()
                    ));
                }
                config.instances.push(instance);
            }
        }

        Self::validate(&config)?;

        info!(
            "Loaded agent config: {} city {} db_type {}, {} monitored instances",
            config.ip,
            config.city_id,
            config.db_type,
            config.instances.len()
        );

        Ok(config)
    }

    fn validate(config: &AgentConfig) -> Result<()> {
        if config.ip.is_empty() {
            return Err(anyhow!("ip must not be empty"));
        }
        if config.hadb.url.is_empty() {
            return Err(anyhow!("hadb.url must not be empty"));
        }
        if config.double_check_times == 0 {
            return Err(anyhow!("double_check_times must be at least 1"));
        }
        if config.heartbeat_interval_seconds == 0 || config.detect_interval_seconds == 0 {
            return Err(anyhow!("heartbeat and detect intervals must be at least 1 second"));
        }
        Ok(())
    }
}
