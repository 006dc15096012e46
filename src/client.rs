//! Local HTTP client for Zeversolar inverters
//!
//! Zeversolar inverters expose a tiny unauthenticated web interface on the
//! LAN: `home.cgi` dumps a whitespace-separated ASCII status page and
//! `inverter_ctrl.cgi` accepts power on/off commands. This module wraps both
//! behind the [`InverterClient`] trait so the rest of the daemon (and the
//! tests) never care about the transport.

use crate::error::{Result, ZevermonError};
use crate::logging::{StructuredLogger, get_logger};
use crate::telemetry::{CloudStatus, DeviceStatus, TelemetrySnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Operations the daemon needs from one inverter
#[async_trait]
pub trait InverterClient: Send + Sync {
    /// Stable device identifier (the serial number)
    async fn device_id(&self) -> Result<String>;

    /// Fetch a fresh telemetry snapshot from the device
    async fn telemetry(&self) -> Result<TelemetrySnapshot>;

    /// Switch the inverter on; fire-and-forget
    async fn power_on(&self) -> Result<()>;

    /// Switch the inverter off; fire-and-forget
    async fn power_off(&self) -> Result<()>;
}

/// Builds connected clients.
///
/// The supervisor receives a factory instead of constructing [`ZeverClient`]
/// itself, so tests can hand in mock devices.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self, host: &str, timeout: Duration) -> Result<Arc<dyn InverterClient>>;
}

/// Identity fields resolved once at connect time
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    /// Serial number; the registry key for configured entries
    pub serial_number: String,

    /// MAC-derived registry id the device uses towards the vendor cloud
    pub registry_id: String,

    /// Hardware revision string
    pub hardware_version: String,

    /// Firmware version string
    pub software_version: String,
}

// Positional indexes into the whitespace-split status page. The page has no
// keys, only order: wifi flag, unknown flag, registry id, registry key,
// hardware version, software version, time, date, cloud status, inverter
// count, serial, power, daily energy, device status.
const IDX_REGISTRY_ID: usize = 2;
const IDX_REGISTRY_KEY: usize = 3;
const IDX_HARDWARE_VERSION: usize = 4;
const IDX_SOFTWARE_VERSION: usize = 5;
const IDX_CLOUD_STATUS: usize = 8;
const IDX_SERIAL: usize = 10;
const IDX_POWER: usize = 11;
const IDX_ENERGY: usize = 12;
const IDX_STATUS: usize = 13;
const MIN_FIELDS: usize = 14;

/// Raw fields parsed out of one `home.cgi` response
#[derive(Debug, Clone, PartialEq)]
pub struct StatusPage {
    pub registry_id: String,
    pub registry_key: String,
    pub hardware_version: String,
    pub software_version: String,
    pub cloud_status: CloudStatus,
    pub serial_number: String,
    pub power_watts: u32,
    pub energy_today_kwh: f64,
    pub status: DeviceStatus,
}

impl StatusPage {
    /// Combine the parsed page with a fetch timestamp
    pub fn into_snapshot(self, fetched_at: DateTime<Utc>) -> TelemetrySnapshot {
        TelemetrySnapshot {
            serial_number: self.serial_number,
            power_watts: self.power_watts,
            energy_today_kwh: self.energy_today_kwh,
            hardware_version: self.hardware_version,
            software_version: self.software_version,
            status: self.status,
            cloud_status: self.cloud_status,
            fetched_at,
        }
    }
}

/// Parse the raw `home.cgi` body into a [`StatusPage`].
///
/// Anything that does not look like the expected positional layout is a
/// protocol error; an inverter that answers garbage must never yield a
/// half-filled snapshot.
pub fn parse_status_page(body: &str) -> Result<StatusPage> {
    let fields: Vec<&str> = body.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return Err(ZevermonError::protocol(format!(
            "status page has {} fields, expected at least {}",
            fields.len(),
            MIN_FIELDS
        )));
    }

    let power_watts = fields[IDX_POWER].parse::<u32>().map_err(|_| {
        ZevermonError::protocol(format!("invalid power value '{}'", fields[IDX_POWER]))
    })?;

    let energy_today_kwh = fields[IDX_ENERGY].parse::<f64>().map_err(|_| {
        ZevermonError::protocol(format!("invalid energy value '{}'", fields[IDX_ENERGY]))
    })?;
    if !energy_today_kwh.is_finite() || energy_today_kwh < 0.0 {
        return Err(ZevermonError::protocol(format!(
            "invalid energy value '{}'",
            fields[IDX_ENERGY]
        )));
    }

    Ok(StatusPage {
        registry_id: fields[IDX_REGISTRY_ID].to_string(),
        registry_key: fields[IDX_REGISTRY_KEY].to_string(),
        hardware_version: fields[IDX_HARDWARE_VERSION].to_string(),
        software_version: fields[IDX_SOFTWARE_VERSION].to_string(),
        cloud_status: CloudStatus::from_token(fields[IDX_CLOUD_STATUS]),
        serial_number: fields[IDX_SERIAL].to_string(),
        power_watts,
        energy_today_kwh,
        status: DeviceStatus::from_token(fields[IDX_STATUS]),
    })
}

fn status_url(host: &str) -> String {
    format!("http://{}/home.cgi", host)
}

fn control_url(host: &str) -> String {
    format!("http://{}/inverter_ctrl.cgi", host)
}

async fn fetch_status_page(http: &reqwest::Client, host: &str) -> Result<String> {
    let response = http.get(status_url(host)).send().await?;
    if !response.status().is_success() {
        return Err(ZevermonError::protocol(format!(
            "status request returned HTTP {}",
            response.status()
        )));
    }
    Ok(response.text().await?)
}

/// HTTP client for one inverter's local web interface
#[derive(Debug)]
pub struct ZeverClient {
    host: String,
    http: reqwest::Client,
    identity: DeviceIdentity,
    logger: StructuredLogger,
}

impl ZeverClient {
    /// Connect to an inverter and resolve its identity.
    ///
    /// Performs one status-page fetch so a bad host fails here, with a
    /// timeout or protocol error, rather than on the first poll.
    pub async fn connect(host: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let body = fetch_status_page(&http, host).await?;
        let page = parse_status_page(&body)?;

        let logger = get_logger("client");
        logger.debug(&format!(
            "Connected to inverter {} at {}",
            page.serial_number, host
        ));

        Ok(Self {
            host: host.to_string(),
            http,
            identity: DeviceIdentity {
                serial_number: page.serial_number,
                registry_id: page.registry_id,
                hardware_version: page.hardware_version,
                software_version: page.software_version,
            },
            logger,
        })
    }

    /// Identity resolved at connect time
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Host this client talks to
    pub fn host(&self) -> &str {
        &self.host
    }

    async fn send_power_command(&self, on: bool) -> Result<()> {
        let mode = if on { "1" } else { "0" };
        let response = self
            .http
            .post(control_url(&self.host))
            .form(&[
                ("sn", self.identity.serial_number.as_str()),
                ("mode", mode),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ZevermonError::protocol(format!(
                "control request returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl InverterClient for ZeverClient {
    async fn device_id(&self) -> Result<String> {
        Ok(self.identity.serial_number.clone())
    }

    async fn telemetry(&self) -> Result<TelemetrySnapshot> {
        let body = fetch_status_page(&self.http, &self.host).await?;
        let page = parse_status_page(&body)?;
        Ok(page.into_snapshot(Utc::now()))
    }

    async fn power_on(&self) -> Result<()> {
        self.logger
            .info(&format!("Powering on inverter {}", self.identity.serial_number));
        self.send_power_command(true).await
    }

    async fn power_off(&self) -> Result<()> {
        self.logger
            .info(&format!("Powering off inverter {}", self.identity.serial_number));
        self.send_power_command(false).await
    }
}

/// Production factory backed by [`ZeverClient`]
pub struct ZeverClientFactory;

#[async_trait]
impl ClientFactory for ZeverClientFactory {
    async fn connect(&self, host: &str, timeout: Duration) -> Result<Arc<dyn InverterClient>> {
        Ok(Arc::new(ZeverClient::connect(host, timeout).await?))
    }
}
