#![allow(dead_code)]

//! Shared test doubles for the coordinator and supervisor suites

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use zevermon::client::{ClientFactory, InverterClient};
use zevermon::config::InverterEntry;
use zevermon::error::{Result, ZevermonError};
use zevermon::telemetry::{CloudStatus, DeviceStatus, TelemetrySnapshot};

pub fn snapshot(serial: &str, power: u32) -> TelemetrySnapshot {
    TelemetrySnapshot {
        serial_number: serial.to_string(),
        power_watts: power,
        energy_today_kwh: 4.2,
        hardware_version: "M11".to_string(),
        software_version: "18625-797R".to_string(),
        status: DeviceStatus::Ok,
        cloud_status: CloudStatus::Connected,
        fetched_at: Utc::now(),
    }
}

pub fn entry(host: &str, serial: &str) -> InverterEntry {
    InverterEntry {
        host: host.to_string(),
        serial_number: serial.to_string(),
        ..Default::default()
    }
}

/// Next fetch result for a scripted mock
pub enum FetchOutcome {
    Power(u32),
    Fail(&'static str),
}

/// Scripted inverter client. Fetches pop outcomes from the script; once the
/// script runs dry every fetch succeeds with increasing power readings.
pub struct MockInverter {
    serial: String,
    calls: AtomicU32,
    script: Mutex<VecDeque<FetchOutcome>>,
    gate: Option<Arc<Notify>>,
    command_log: Mutex<Vec<&'static str>>,
}

impl MockInverter {
    pub fn new(serial: &str) -> Arc<Self> {
        Self::build(serial, Vec::new(), None)
    }

    pub fn scripted(serial: &str, script: Vec<FetchOutcome>) -> Arc<Self> {
        Self::build(serial, script, None)
    }

    /// Every fetch blocks on `gate` until the test notifies it
    pub fn gated(serial: &str, gate: Arc<Notify>) -> Arc<Self> {
        Self::build(serial, Vec::new(), Some(gate))
    }

    fn build(serial: &str, script: Vec<FetchOutcome>, gate: Option<Arc<Notify>>) -> Arc<Self> {
        Arc::new(Self {
            serial: serial.to_string(),
            calls: AtomicU32::new(0),
            script: Mutex::new(script.into()),
            gate,
            command_log: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn commands(&self) -> Vec<&'static str> {
        self.command_log.lock().await.clone()
    }
}

#[async_trait]
impl InverterClient for MockInverter {
    async fn device_id(&self) -> Result<String> {
        Ok(self.serial.clone())
    }

    async fn telemetry(&self) -> Result<TelemetrySnapshot> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.script.lock().await.pop_front() {
            Some(FetchOutcome::Fail(message)) => Err(ZevermonError::device(message)),
            Some(FetchOutcome::Power(power)) => Ok(snapshot(&self.serial, power)),
            None => Ok(snapshot(&self.serial, 100 + call)),
        }
    }

    async fn power_on(&self) -> Result<()> {
        self.command_log.lock().await.push("on");
        Ok(())
    }

    async fn power_off(&self) -> Result<()> {
        self.command_log.lock().await.push("off");
        Ok(())
    }
}

/// Factory handing out pre-registered mock clients by host
pub struct MockFactory {
    clients: Mutex<HashMap<String, Arc<MockInverter>>>,
    connect_error: Option<&'static str>,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            clients: Mutex::new(HashMap::new()),
            connect_error: None,
        })
    }

    /// Every connect attempt fails with a timeout carrying `message`
    pub fn failing(message: &'static str) -> Arc<Self> {
        Arc::new(Self {
            clients: Mutex::new(HashMap::new()),
            connect_error: Some(message),
        })
    }

    pub async fn add(&self, host: &str, client: Arc<MockInverter>) {
        self.clients.lock().await.insert(host.to_string(), client);
    }
}

#[async_trait]
impl ClientFactory for MockFactory {
    async fn connect(&self, host: &str, _timeout: Duration) -> Result<Arc<dyn InverterClient>> {
        if let Some(message) = self.connect_error {
            return Err(ZevermonError::timeout(message));
        }
        let clients = self.clients.lock().await;
        match clients.get(host) {
            Some(client) => Ok(Arc::clone(client) as Arc<dyn InverterClient>),
            None => Err(ZevermonError::device(format!("no inverter at {}", host))),
        }
    }
}

/// Supervisor wired to a config file inside a fresh temp dir
pub fn supervisor_with(
    config: zevermon::Config,
    factory: Arc<MockFactory>,
) -> (zevermon::Supervisor, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zevermon.yaml");
    config.save_to_file(&path).unwrap();
    let supervisor = zevermon::Supervisor::new(config, path, factory);
    (supervisor, dir)
}
