//! Entry lifecycle and the registration/options flows
//!
//! The supervisor owns the configured inverter entries and one
//! [`PollCoordinator`] runtime per started entry. Coordinators are handed to
//! readers (web handlers, sensors) directly from here; there is no global
//! registry to look them up in.

use crate::client::ClientFactory;
use crate::config::{Config, InverterEntry, validate_poll_interval};
use crate::coordinator::PollCoordinator;
use crate::error::{Result, ZevermonError};
use crate::logging::{StructuredLogger, get_logger};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Running state of one configured inverter
pub struct InverterRuntime {
    coordinator: Arc<PollCoordinator>,
    task: JoinHandle<()>,
}

impl InverterRuntime {
    /// Coordinator handle for this runtime
    pub fn coordinator(&self) -> &Arc<PollCoordinator> {
        &self.coordinator
    }

    async fn shutdown(self) {
        self.coordinator.shutdown();
        let _ = self.task.await;
    }
}

/// Owns configured entries, their runtimes, and the config file
pub struct Supervisor {
    config: Config,
    config_path: PathBuf,
    factory: Arc<dyn ClientFactory>,
    runtimes: HashMap<String, InverterRuntime>,
    logger: StructuredLogger,
}

impl Supervisor {
    pub fn new(config: Config, config_path: PathBuf, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            config,
            config_path,
            factory,
            runtimes: HashMap::new(),
            logger: get_logger("supervisor"),
        }
    }

    /// Current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Coordinator handle for one running entry, if it is running
    pub fn coordinator(&self, serial: &str) -> Option<Arc<PollCoordinator>> {
        self.runtimes.get(serial).map(|r| Arc::clone(&r.coordinator))
    }

    /// Number of running entries
    pub fn running_count(&self) -> usize {
        self.runtimes.len()
    }

    fn save_config(&self) -> Result<()> {
        self.config.save_to_file(&self.config_path)
    }

    /// Start one configured entry: connect, populate once, then poll.
    ///
    /// The first refresh gates readiness. If it fails, nothing is spawned,
    /// no runtime is kept, and the failure surfaces as `NotReady`.
    pub async fn start_entry(&mut self, serial: &str) -> Result<()> {
        if self.runtimes.contains_key(serial) {
            return Err(ZevermonError::config(format!(
                "inverter {} is already running",
                serial
            )));
        }
        let entry = self.config.entry(serial).cloned().ok_or_else(|| {
            ZevermonError::config(format!("unknown inverter {}", serial))
        })?;

        let client = self
            .factory
            .connect(&entry.host, self.config.device.timeout())
            .await?;
        let coordinator = Arc::new(PollCoordinator::new(
            client,
            entry.poll_interval(),
            serial,
        ));

        if let Err(e) = coordinator.refresh_now().await {
            return Err(ZevermonError::not_ready(format!(
                "initial refresh for inverter {} failed: {}",
                serial, e
            )));
        }

        let task = coordinator.spawn_poll_loop();
        self.runtimes
            .insert(serial.to_string(), InverterRuntime { coordinator, task });
        self.logger
            .info(&format!("Started inverter {} at {}", serial, entry.host));
        Ok(())
    }

    /// Stop one running entry and wait for its poll loop to exit
    pub async fn stop_entry(&mut self, serial: &str) -> Result<()> {
        let runtime = self.runtimes.remove(serial).ok_or_else(|| {
            ZevermonError::config(format!("inverter {} is not running", serial))
        })?;
        runtime.shutdown().await;
        self.logger.info(&format!("Stopped inverter {}", serial));
        Ok(())
    }

    /// Tear down and rebuild one entry, picking up changed options
    pub async fn reload_entry(&mut self, serial: &str) -> Result<()> {
        if self.runtimes.contains_key(serial) {
            self.stop_entry(serial).await?;
        }
        self.start_entry(serial).await
    }

    /// Start every configured entry.
    ///
    /// One inverter failing does not keep the others down; failures are
    /// logged and reflected in the returned count.
    pub async fn start_all(&mut self) -> usize {
        let serials: Vec<String> = self
            .config
            .inverters
            .iter()
            .map(|e| e.serial_number.clone())
            .collect();
        let mut started = 0;
        for serial in serials {
            match self.start_entry(&serial).await {
                Ok(()) => started += 1,
                Err(e) => self
                    .logger
                    .error(&format!("Failed to start inverter {}: {}", serial, e)),
            }
        }
        started
    }

    /// Stop all running entries
    pub async fn shutdown_all(&mut self) {
        let serials: Vec<String> = self.runtimes.keys().cloned().collect();
        for serial in serials {
            if let Some(runtime) = self.runtimes.remove(&serial) {
                runtime.shutdown().await;
            }
        }
        self.logger.info("All inverters stopped");
    }

    /// Registration flow: probe the device for its identity, reject
    /// duplicates, persist `{host, serial}` with default options.
    ///
    /// Does not start polling; callers that want the entry live follow up
    /// with [`Supervisor::start_entry`].
    pub async fn register_inverter(&mut self, host: &str) -> Result<InverterEntry> {
        let host = host.trim();
        if host.is_empty() {
            return Err(ZevermonError::validation(
                "host",
                "A host address is required",
            ));
        }

        let client = self
            .factory
            .connect(host, self.config.device.timeout())
            .await?;
        let serial = client.device_id().await?;

        if self.config.entry(&serial).is_some() {
            return Err(ZevermonError::duplicate(format!(
                "inverter {} is already configured",
                serial
            )));
        }

        let entry = InverterEntry {
            host: host.to_string(),
            serial_number: serial.clone(),
            ..Default::default()
        };
        self.config.inverters.push(entry.clone());
        if let Err(e) = self.save_config() {
            // A failed save must not leave an entry that exists only in memory
            self.config.inverters.pop();
            return Err(e);
        }
        self.logger
            .info(&format!("Registered inverter {} at {}", serial, host));
        Ok(entry)
    }

    /// Options flow: validate the poll interval, persist it, and apply it by
    /// rebuilding the entry's coordinator. The interval is constructor-time
    /// state of the coordinator, so applying means tear down and recreate.
    pub async fn apply_poll_interval(&mut self, serial: &str, value: Option<u64>) -> Result<()> {
        let secs = validate_poll_interval(value)?;
        let entry = self.config.entry_mut(serial).ok_or_else(|| {
            ZevermonError::config(format!("unknown inverter {}", serial))
        })?;
        let previous = entry.poll_interval_secs;
        entry.poll_interval_secs = secs;
        if let Err(e) = self.save_config() {
            // The stored interval stays authoritative when the save fails
            if let Some(entry) = self.config.entry_mut(serial) {
                entry.poll_interval_secs = previous;
            }
            return Err(e);
        }

        if self.runtimes.contains_key(serial) {
            self.reload_entry(serial).await?;
        }
        self.logger.info(&format!(
            "Poll interval for inverter {} set to {}s",
            serial, secs
        ));
        Ok(())
    }
}
