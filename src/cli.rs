//! Command line interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Zevermon - local monitoring and control daemon for Zeversolar PV inverters
#[derive(Debug, Parser)]
#[command(author, version = env!("APP_VERSION"), about)]
pub struct Cli {
    /// Config file to read and to persist registrations to
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the polling daemon and web API (the default)
    Run,

    /// Register an inverter by probing its serial number, then exit
    Setup {
        /// Host address of the inverter's local web interface
        #[arg(long)]
        host: String,

        /// Poll interval in seconds, inclusive range [10, 3600]
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Change the poll interval of a configured inverter, then exit
    SetInterval {
        /// Serial number of the configured inverter
        #[arg(long)]
        serial: String,

        /// New poll interval in seconds
        #[arg(long)]
        seconds: Option<u64>,
    },
}
