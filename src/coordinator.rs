//! Poll coordination for one inverter
//!
//! A [`PollCoordinator`] owns one device client, runs at most one fetch at a
//! time against it, and publishes the latest outcome through a watch channel.
//! Readers never block and never trigger I/O; they see either the last
//! successful snapshot or its absence. A failed fetch is recorded and retried
//! at the next tick, never sooner. There is no backoff: stale data between
//! successes is acceptable, torn-down state is not.

use crate::client::InverterClient;
use crate::error::{Result, ZevermonError};
use crate::logging::{LogContext, StructuredLogger};
use crate::telemetry::TelemetrySnapshot;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// Lifecycle of the fetch slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    /// No fetch in flight
    Idle,
    /// A fetch is running against the device
    Fetching,
    /// Teardown has completed; no further fetch will run
    Stopped,
}

/// Observable state of one coordinator.
///
/// Mutated only inside the coordinator's fetch slot; `generation` counts
/// completed fetches (successful or not) and is what overlapping refreshes
/// coalesce on.
#[derive(Debug, Clone)]
pub struct PollState {
    pub phase: PollPhase,
    pub snapshot: Option<Arc<TelemetrySnapshot>>,
    pub last_success: bool,
    pub last_error: Option<String>,
    pub generation: u64,
}

impl PollState {
    fn initial() -> Self {
        Self {
            phase: PollPhase::Idle,
            snapshot: None,
            last_success: false,
            last_error: None,
            generation: 0,
        }
    }
}

/// Fetch-cache-and-retry cycle for a single inverter
pub struct PollCoordinator {
    client: Arc<dyn InverterClient>,
    interval: Duration,
    serial: String,
    // Single mutually exclusive execution slot per device; scheduled and
    // on-demand refreshes both go through it.
    fetch_slot: Mutex<()>,
    state_tx: watch::Sender<PollState>,
    shutdown_tx: watch::Sender<bool>,
    logger: StructuredLogger,
}

impl PollCoordinator {
    /// Bind a coordinator to a device and a poll period.
    ///
    /// Constructor-time only; changing the interval means building a new
    /// coordinator.
    pub fn new(client: Arc<dyn InverterClient>, interval: Duration, serial: &str) -> Self {
        let (state_tx, _) = watch::channel(PollState::initial());
        let (shutdown_tx, _) = watch::channel(false);
        let logger =
            StructuredLogger::new(LogContext::new("coordinator").with_serial(serial));
        Self {
            client,
            interval,
            serial: serial.to_string(),
            fetch_slot: Mutex::new(()),
            state_tx,
            shutdown_tx,
            logger,
        }
    }

    /// The device client this coordinator owns.
    ///
    /// Button-style controls call the client directly through this accessor;
    /// control commands do not go through the fetch cycle.
    pub fn client(&self) -> &Arc<dyn InverterClient> {
        &self.client
    }

    /// Serial number of the polled inverter
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Configured poll period
    pub fn poll_interval(&self) -> Duration {
        self.interval
    }

    /// Non-blocking read of the last cached snapshot; never fetches
    pub fn current(&self) -> Option<Arc<TelemetrySnapshot>> {
        self.state_tx.borrow().snapshot.clone()
    }

    /// Whether the most recent completed fetch succeeded
    pub fn last_success(&self) -> bool {
        self.state_tx.borrow().last_success
    }

    /// Clone of the full observable state
    pub fn state(&self) -> PollState {
        self.state_tx.borrow().clone()
    }

    /// Watch receiver for state changes, for SSE streams and tests
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state_tx.subscribe()
    }

    /// Whether teardown has begun
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Perform one fetch now, bypassing the timer.
    ///
    /// On success the snapshot is stored and returned. On failure the
    /// previous snapshot stays untouched and the error folds into
    /// `UpdateFailed` with the cause. A call that arrives while another
    /// fetch is in flight waits for that result and returns it instead of
    /// issuing a second device call.
    ///
    /// Once teardown has begun the call is refused, and a device call
    /// already in flight when teardown begins has its result discarded
    /// unpublished.
    pub async fn refresh_now(&self) -> Result<Arc<TelemetrySnapshot>> {
        if self.is_shut_down() {
            return Err(ZevermonError::update_failed("coordinator is shut down"));
        }

        let entered = self.state_tx.borrow().generation;
        let _slot = self.fetch_slot.lock().await;

        if self.is_shut_down() {
            return Err(ZevermonError::update_failed("coordinator is shut down"));
        }

        // A fetch completed while this call waited for the slot; its outcome
        // answers this call too.
        {
            let state = self.state_tx.borrow();
            if state.generation != entered {
                return match &state.snapshot {
                    Some(snapshot) if state.last_success => Ok(Arc::clone(snapshot)),
                    _ => Err(ZevermonError::update_failed(
                        state
                            .last_error
                            .clone()
                            .unwrap_or_else(|| "inverter fetch failed".to_string()),
                    )),
                };
            }
        }

        self.state_tx
            .send_modify(|state| state.phase = PollPhase::Fetching);

        let outcome = self.client.telemetry().await;

        // Teardown may have begun while the device call was in flight; its
        // result is discarded unpublished.
        if self.is_shut_down() {
            return Err(ZevermonError::update_failed("coordinator is shut down"));
        }

        match outcome {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.state_tx.send_modify(|state| {
                    state.phase = PollPhase::Idle;
                    state.snapshot = Some(Arc::clone(&snapshot));
                    state.last_success = true;
                    state.last_error = None;
                    state.generation += 1;
                });
                self.logger.debug(&format!(
                    "Refreshed: {} W, {} kWh today",
                    snapshot.power_watts, snapshot.energy_today_kwh
                ));
                Ok(snapshot)
            }
            Err(e) => {
                let cause = e.to_string();
                self.state_tx.send_modify(|state| {
                    state.phase = PollPhase::Idle;
                    state.last_success = false;
                    state.last_error = Some(cause.clone());
                    state.generation += 1;
                });
                Err(ZevermonError::update_failed(cause))
            }
        }
    }

    /// Spawn the scheduled loop.
    ///
    /// The caller starts this only after the first successful `refresh_now`;
    /// the first tick therefore lands one full interval from now.
    pub fn spawn_poll_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_poll_loop().await })
    }

    async fn run_poll_loop(&self) {
        self.logger
            .info(&format!("Starting poll loop, interval {:?}", self.interval));

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        // Teardown first: a pending tick must not publish once
                        // shutdown has begun, and dropping the refresh future
                        // abandons an in-flight fetch without publishing.
                        biased;
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                break;
                            }
                        }
                        res = self.refresh_now() => {
                            if let Err(e) = res {
                                self.logger.warn(&format!("Scheduled refresh failed: {}", e));
                            }
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        self.state_tx
            .send_modify(|state| state.phase = PollPhase::Stopped);
        self.logger.info("Poll loop stopped");
    }

    /// Begin teardown: the scheduled loop exits at the next suspension point
    /// and any later `refresh_now` is refused without touching state.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }
}
