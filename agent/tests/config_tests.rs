//! Loading of main.toml plus the per-cluster instance files

use agent::config::ConfigManager;
use ha_common::instance::InstanceRole;
use std::fs;
use tempfile::TempDir;
use test_case::test_case;

const MAIN: &str = r#"
ip = "10.0.9.1"
city_id = 3

[hadb]
url = "http://hadb.local"
token = "secret"

[probe]
user = "monitor"
password = "monitor-pw"
"#;

const PAYMENTS: &str = r#"
[[instances]]
app = "payments"
ip = "10.1.0.1"
port = 3306
db_type = "tendbha:backend"
role = "master"

[[instances.slaves]]
ip = "10.1.0.2"
port = 3306
is_standby = true
"#;

const ORDERS: &str = r#"
[[instances]]
app = "orders"
ip = "10.2.0.1"
port = 25000
db_type = "tendbcluster:proxy"
role = "spider"
"#;

fn write_dir(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for (name, content) in files {
        fs::write(temp_dir.path().join(name), content).unwrap();
    }
    temp_dir
}

async fn load(dir: &TempDir) -> anyhow::Result<ConfigManager> {
    ConfigManager::new(dir.path().display().to_string()).await
}

#[tokio::test]
async fn test_defaults_and_cluster_files_are_merged() {
    let dir = write_dir(&[
        ("main.toml", MAIN),
        ("payments.toml", PAYMENTS),
        ("orders.toml", ORDERS),
    ]);

    let config = load(&dir).await.unwrap().get_current_config();

    assert_eq!(config.db_type, "tendbha");
    assert_eq!(config.heartbeat_interval_seconds, 10);
    assert_eq!(config.double_check_times, 3);
    assert_eq!(config.probe.connect_timeout_seconds, 3);
    assert_eq!(config.instances.len(), 2);

    let payments = config
        .instances
        .iter()
        .find(|instance| instance.app == "payments")
        .unwrap();
    assert_eq!(payments.role, InstanceRole::Master);
    assert_eq!(payments.standby_slave().unwrap().ip, "10.1.0.2");
}

#[tokio::test]
async fn test_instance_declared_twice_is_rejected() {
    let dir = write_dir(&[
        ("main.toml", MAIN),
        ("payments.toml", PAYMENTS),
        ("payments-copy.toml", PAYMENTS),
    ]);

    let err = load(&dir).await.err().unwrap();

    assert!(err.to_string().contains("10.1.0.1:3306 declared twice"));
}

#[test_case("city_id = 3", "city_id = 3\ndouble_check_times = 0", "double_check_times" ; "zero double check times")]
#[test_case("city_id = 3", "city_id = 3\ndetect_interval_seconds = 0", "intervals" ; "zero detect interval")]
#[test_case("ip = \"10.0.9.1\"", "ip = \"\"", "ip must not be empty" ; "empty ip")]
#[test_case("url = \"http://hadb.local\"", "url = \"\"", "hadb.url" ; "empty store url")]
#[tokio::test]
async fn test_invalid_main_config_is_rejected(from: &str, to: &str, expected: &str) {
    let main = MAIN.replace(from, to);
    let dir = write_dir(&[("main.toml", &main)]);

    let err = load(&dir).await.err().unwrap();

    assert!(err.to_string().contains(expected), "{}", err);
}

#[tokio::test]
async fn test_missing_main_config_fails() {
    let dir = write_dir(&[("payments.toml", PAYMENTS)]);

    assert!(load(&dir).await.is_err());
}
