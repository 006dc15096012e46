//! Telemetry data model for Zeversolar inverters

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Coarse operating status reported by the inverter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Ok,
    Error,
    Unknown,
}

impl DeviceStatus {
    /// Parse the status token from the device's status page
    pub fn from_token(token: &str) -> Self {
        match token {
            "OK" => Self::Ok,
            "Error" => Self::Error,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

/// Connectivity between the inverter and the vendor cloud.
///
/// Purely informational; the daemon never talks to the cloud itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudStatus {
    Connected,
    Disconnected,
    Unknown,
}

impl CloudStatus {
    /// Parse the cloud status token from the device's status page
    pub fn from_token(token: &str) -> Self {
        match token {
            "OK" => Self::Connected,
            "Error" => Self::Disconnected,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Unknown => "unknown",
        }
    }
}

/// One immutable telemetry reading from an inverter.
///
/// Replaced wholesale on every successful poll and shared as
/// `Arc<TelemetrySnapshot>`; nothing ever mutates a published snapshot.
///
/// `energy_today_kwh` is cumulative for the current day as counted by the
/// device. Whether the counter resets at local midnight or on a firmware
/// reboot is device-owned behavior; the daemon stores the value verbatim and
/// never infers day boundaries from it.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySnapshot {
    /// Serial number of the reporting inverter
    pub serial_number: String,

    /// Instantaneous AC output power in watts
    pub power_watts: u32,

    /// Energy produced today in kWh
    pub energy_today_kwh: f64,

    /// Hardware revision string
    pub hardware_version: String,

    /// Firmware version string
    pub software_version: String,

    /// Coarse device status
    pub status: DeviceStatus,

    /// Connectivity to the vendor cloud
    pub cloud_status: CloudStatus,

    /// When this snapshot was fetched
    pub fetched_at: DateTime<Utc>,
}
