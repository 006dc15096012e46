//! # Zevermon - Local Monitoring for Zeversolar PV Inverters
//!
//! A Rust daemon that polls Zeversolar inverters over their LAN web
//! interface, caches the latest telemetry snapshot per device, and exposes
//! sensors and power controls through a small REST API.
//!
//! ## Features
//!
//! - **Async-first**: Tokio runtime with one poll loop per inverter
//! - **Cached reads**: telemetry consumers never wait on the device
//! - **Fixed-interval retry**: unreachable inverters are retried on the
//!   regular schedule, keeping the last good snapshot available
//! - **Registration by probe**: inverters are added by host address and
//!   identified by their reported serial number
//! - **Web Interface**: REST API with per-inverter server-sent events
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! The application follows a modular architecture with clear separation of concerns:
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `client`: HTTP client for the inverter's local protocol
//! - `telemetry`: Snapshot and status types shared across modules
//! - `coordinator`: Per-inverter fetch-cache-retry loop
//! - `sensor`: Read-only projections of the cached snapshot
//! - `button`: Power on/off controls
//! - `supervisor`: Entry lifecycle, registration, and options flows
//! - `web`: HTTP server and REST API
//! - `cli`: Command line parsing

pub mod button;
pub mod cli;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod sensor;
pub mod supervisor;
pub mod telemetry;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::PollCoordinator;
pub use error::{Result, ZevermonError};
pub use supervisor::Supervisor;
pub use telemetry::TelemetrySnapshot;
