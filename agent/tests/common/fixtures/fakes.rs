use agent::detect::Prober;
use agent::gm_client::GmNotifier;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ha_common::{FailureReport, InstanceInfo};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Fails every probe of an address marked down
#[derive(Default)]
pub struct FakeProber {
    down: Mutex<HashSet<String>>,
    probed: Mutex<Vec<String>>,
}

impl FakeProber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_down(&self, addr: &str) {
        self.down.lock().unwrap().insert(addr.to_string());
    }

    pub fn set_up(&self, addr: &str) {
        self.down.lock().unwrap().remove(addr);
    }

    pub fn probed(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, instance: &InstanceInfo) -> Result<()> {
        let addr = instance.addr();
        self.probed.lock().unwrap().push(addr.clone());
        if self.down.lock().unwrap().contains(&addr) {
            return Err(anyhow!("probe {} failed: connection refused", addr));
        }
        Ok(())
    }
}

/// Records every report; answers with a fixed GM address
pub struct RecordingNotifier {
    reports: Mutex<Vec<FailureReport>>,
    accept: bool,
}

impl RecordingNotifier {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            reports: Mutex::new(vec![]),
            accept: true,
        })
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            reports: Mutex::new(vec![]),
            accept: false,
        })
    }

    pub fn reports(&self) -> Vec<FailureReport> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl GmNotifier for RecordingNotifier {
    async fn notify(&self, report: &FailureReport) -> Result<String> {
        self.reports.lock().unwrap().push(report.clone());
        if self.accept {
            Ok("10.0.8.1:8080".to_string())
        } else {
            Err(anyhow!("no gm accepted the failure report"))
        }
    }
}
