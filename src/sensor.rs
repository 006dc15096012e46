//! Sensor projections over the latest telemetry snapshot
//!
//! The exposed fields are a fixed enumerated set with a direct mapping per
//! field; there is no string-keyed lookup table between a snapshot and its
//! sensor values.

use crate::coordinator::PollCoordinator;
use crate::error::{Result, ZevermonError};
use crate::telemetry::TelemetrySnapshot;
use serde_json::Value;

/// The fixed set of telemetry fields exposed as sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    /// Instantaneous AC output power
    CurrentPower,
    /// Energy produced today
    DailyEnergy,
    /// Coarse device status
    Status,
    /// Connectivity to the vendor cloud
    CloudStatus,
}

impl SensorKind {
    pub const ALL: [SensorKind; 4] = [
        Self::CurrentPower,
        Self::DailyEnergy,
        Self::Status,
        Self::CloudStatus,
    ];

    /// Stable key used in unique ids and API payloads
    pub fn key(&self) -> &'static str {
        match self {
            Self::CurrentPower => "current_power",
            Self::DailyEnergy => "daily_energy",
            Self::Status => "status",
            Self::CloudStatus => "cloud_status",
        }
    }

    /// Unit of measurement, if any
    pub fn unit(&self) -> Option<&'static str> {
        match self {
            Self::CurrentPower => Some("W"),
            Self::DailyEnergy => Some("kWh"),
            Self::Status | Self::CloudStatus => None,
        }
    }

    /// Direct projection of one snapshot field
    pub fn project(&self, snapshot: &TelemetrySnapshot) -> Value {
        match self {
            Self::CurrentPower => Value::from(snapshot.power_watts),
            Self::DailyEnergy => Value::from(snapshot.energy_today_kwh),
            Self::Status => Value::from(snapshot.status.as_str()),
            Self::CloudStatus => Value::from(snapshot.cloud_status.as_str()),
        }
    }

    /// Read through a coordinator.
    ///
    /// Absent data means "not yet ready", never a stale or fabricated value.
    pub fn read(&self, coordinator: &PollCoordinator) -> Result<Value> {
        match coordinator.current() {
            Some(snapshot) => Ok(self.project(&snapshot)),
            None => Err(ZevermonError::not_ready(format!(
                "no data yet for sensor {}",
                self.key()
            ))),
        }
    }

    /// Unique id, stable across restarts
    pub fn unique_id(&self, serial: &str) -> String {
        format!("zevermon_{}_{}", serial, self.key())
    }
}

/// All sensors of one snapshot, keyed for the API status payload
pub fn project_all(snapshot: &TelemetrySnapshot) -> serde_json::Map<String, Value> {
    let mut values = serde_json::Map::new();
    for kind in SensorKind::ALL {
        values.insert(kind.key().to_string(), kind.project(snapshot));
    }
    values
}

/// Manufacturer reported for every supported inverter
pub const MANUFACTURER: &str = "ZeverSolar";

/// The local API does not distinguish models
pub const MODEL: &str = "Universal Inverter Device";

/// Display name for one inverter
pub fn device_name(serial: &str) -> String {
    format!("ZeverSolar inverter '{}'", serial)
}
