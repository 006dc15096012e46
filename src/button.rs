//! Power controls for one inverter
//!
//! Buttons talk to the device client directly; they do not go through the
//! poll cycle and cache nothing. Whether a given inverter accepts these at
//! all is decided by its `allow_power_control` config flag at the API
//! boundary.

use crate::client::InverterClient;
use crate::error::Result;

/// The two control actions an inverter offers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    PowerOn,
    PowerOff,
}

impl ButtonKind {
    pub const ALL: [ButtonKind; 2] = [Self::PowerOn, Self::PowerOff];

    /// Stable key used in unique ids and API payloads
    pub fn key(&self) -> &'static str {
        match self {
            Self::PowerOn => "power_on",
            Self::PowerOff => "power_off",
        }
    }

    /// Unique id, stable across restarts
    pub fn unique_id(&self, serial: &str) -> String {
        format!("zevermon_{}_{}", serial, self.key())
    }

    /// Fire the command straight at the device
    pub async fn press(&self, client: &dyn InverterClient) -> Result<()> {
        match self {
            Self::PowerOn => client.power_on().await,
            Self::PowerOff => client.power_off().await,
        }
    }
}
