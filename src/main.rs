use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
use zevermon::cli::{Cli, Command};
use zevermon::client::ZeverClientFactory;
use zevermon::config::Config;
use zevermon::supervisor::Supervisor;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_path) = match &cli.config {
        Some(path) => (Config::from_file(path)?, path.clone()),
        None => (Config::load()?, Config::resolve_path()),
    };

    zevermon::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let factory = Arc::new(ZeverClientFactory);
    let supervisor = Supervisor::new(config, config_path, factory);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(supervisor).await,
        Command::Setup { host, interval } => setup(supervisor, &host, interval).await,
        Command::SetInterval { serial, seconds } => {
            set_interval(supervisor, &serial, seconds).await
        }
    }
}

async fn run(mut supervisor: Supervisor) -> Result<()> {
    info!("Zevermon {} starting up", env!("APP_VERSION"));

    let configured = supervisor.config().inverters.len();
    let started = supervisor.start_all().await;
    info!("Started {}/{} configured inverters", started, configured);

    let web_config = supervisor.config().web.clone();
    let supervisor = Arc::new(Mutex::new(supervisor));

    let web_supervisor = Arc::clone(&supervisor);
    let web_task = tokio::spawn(async move {
        if let Err(e) =
            zevermon::web::serve(web_supervisor, &web_config.host, web_config.port).await
        {
            error!("Web server error: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    supervisor.lock().await.shutdown_all().await;
    web_task.abort();
    info!("Shutdown complete");
    Ok(())
}

async fn setup(mut supervisor: Supervisor, host: &str, interval: Option<u64>) -> Result<()> {
    let entry = supervisor
        .register_inverter(host)
        .await
        .map_err(|e| anyhow::anyhow!("Setup failed: {}", e))?;
    if interval.is_some() {
        supervisor
            .apply_poll_interval(&entry.serial_number, interval)
            .await
            .map_err(|e| anyhow::anyhow!("Setup failed: {}", e))?;
    }

    let secs = supervisor
        .config()
        .entry(&entry.serial_number)
        .map(|e| e.poll_interval_secs)
        .unwrap_or(entry.poll_interval_secs);
    println!(
        "Registered inverter {} at {} (poll interval {}s)",
        entry.serial_number, entry.host, secs
    );
    Ok(())
}

async fn set_interval(
    mut supervisor: Supervisor,
    serial: &str,
    seconds: Option<u64>,
) -> Result<()> {
    supervisor
        .apply_poll_interval(serial, seconds)
        .await
        .map_err(|e| anyhow::anyhow!("Set interval failed: {}", e))?;

    let secs = supervisor
        .config()
        .entry(serial)
        .map(|e| e.poll_interval_secs)
        .unwrap_or_default();
    println!("Poll interval for inverter {} set to {}s", serial, secs);
    Ok(())
}
