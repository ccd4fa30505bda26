//! stationctl - telemetry and DOCSIS diagnostics for cable-modem routers.
//!
//! Talks to the device's web management interface: derives the encrypted
//! login credential from the served login page, reads telemetry out of the
//! embedded script state, and classifies DOCSIS channel health.

mod config;
mod crypto;
mod diagnostics;
mod discovery;
mod error;
mod http;
mod models;
mod modem;
mod parser;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::Config;
use modem::{modem_factory, Modem};

const PASSWORD_ENV: &str = "STATION_PASSWORD";

#[derive(Parser, Debug)]
#[command(name = "stationctl")]
#[command(about = "Cable modem telemetry and DOCSIS diagnostics", long_about = None)]
struct Cli {
    /// Modem password
    #[arg(short, long, global = true)]
    password: Option<String>,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Device identity and uptime as JSON
    Status,
    /// Gateway state and attached devices as JSON
    Overview,
    /// Current DOCSIS channel tables as JSON
    Docsis {
        /// Write a report file under ./reports/ instead of printing
        #[arg(short, long)]
        file: bool,
    },
    /// Classify DOCSIS channel quality against known-good thresholds
    Diagnose,
    /// Restart the modem
    Restart,
    /// Report the device temperature, where the hardware exposes one
    Temperature,
    /// Poll telemetry continuously
    Daemon {
        /// Seconds between polling cycles
        #[arg(short, long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.level)),
        )
        .init();

    let password = resolve_password(&cli, &cfg)?;

    match cli.command {
        Command::Daemon { interval } => run_daemon(&cfg, &password, interval).await,
        command => run_once(&cfg, &password, command).await,
    }
}

/// Flag takes precedence over the environment, which takes precedence over
/// the config file. No password at all is its own failure mode, distinct
/// from rejected credentials or an unreachable device.
fn resolve_password(cli: &Cli, cfg: &Config) -> Result<String> {
    cli.password
        .clone()
        .or_else(|| std::env::var(PASSWORD_ENV).ok())
        .or_else(|| cfg.device.password.clone())
        .filter(|p| !p.is_empty())
        .with_context(|| {
            format!("no password supplied; use --password, {PASSWORD_ENV}, or the config file")
        })
}

/// Discover the device, select its driver, and log in.
async fn open_session(cfg: &Config, password: &str) -> Result<Box<dyn Modem>> {
    let device = discovery::discover(cfg).await?;
    tracing::info!(
        address = %device.address,
        kind = ?device.kind,
        firmware = %device.firmware_version,
        "modem discovered"
    );
    let mut modem = modem_factory(&device, cfg)?;
    modem.login(password).await?;
    tracing::debug!(driver = modem.name(), address = %modem.address(), "session established");
    Ok(modem)
}

/// One discover/login/operate/logout cycle. Logout runs on every exit path.
async fn run_once(cfg: &Config, password: &str, command: Command) -> Result<()> {
    let mut modem = open_session(cfg, password).await?;
    let result = run_command(modem.as_mut(), &command).await;
    if let Err(err) = modem.logout().await {
        tracing::warn!(%err, "logout failed");
    }
    result
}

async fn run_command(modem: &mut dyn Modem, command: &Command) -> Result<()> {
    match command {
        Command::Status => {
            let status = modem.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Overview => {
            let overview = modem.overview().await?;
            println!("{}", serde_json::to_string_pretty(&overview)?);
        }
        Command::Docsis { file } => {
            let docsis = modem.docsis().await?;
            let json = serde_json::to_string_pretty(&docsis)?;
            if *file {
                write_report(&json)?;
            } else {
                println!("{json}");
            }
        }
        Command::Diagnose => {
            let docsis = modem.docsis().await?;
            let diagnosed = diagnostics::diagnose(&docsis);
            println!("{}", serde_json::to_string_pretty(&diagnosed)?);
            if diagnosed.has_deviations() {
                tracing::warn!("docsis connection quality deviation found");
                for line in diagnosed.deviation_report() {
                    println!("{line}");
                }
            } else {
                tracing::info!("all channels green");
            }
        }
        Command::Restart => {
            modem.restart().await?;
            tracing::info!("restart requested");
        }
        Command::Temperature => {
            let celsius = modem.temperature().await?;
            println!("{celsius} °C");
        }
        // handled in main before run_once
        Command::Daemon { .. } => {}
    }
    Ok(())
}

fn write_report(json: &str) -> Result<()> {
    std::fs::create_dir_all("reports").context("failed to create reports directory")?;
    let path = format!(
        "reports/{}_docsis_status.json",
        chrono::Utc::now().timestamp_millis()
    );
    std::fs::write(&path, json).with_context(|| format!("failed to write {path}"))?;
    tracing::info!(%path, "docsis report written");
    Ok(())
}

/// Continuous polling. Cycles are independent and never overlap; a failed
/// cycle is logged and the next one starts fresh after the interval.
async fn run_daemon(cfg: &Config, password: &str, interval: Option<u64>) -> Result<()> {
    let interval = Duration::from_secs(interval.unwrap_or(cfg.daemon.poll_interval));
    tracing::info!(?interval, "starting polling daemon");

    let mut consecutive_failures = 0u32;
    const MAX_CONSECUTIVE_FAILURES: u32 = 3;

    loop {
        match run_cycle(cfg, password).await {
            Ok(()) => {
                consecutive_failures = 0;
            }
            Err(err) => {
                consecutive_failures += 1;
                tracing::error!(
                    "polling cycle failed ({}/{}): {:#}",
                    consecutive_failures,
                    MAX_CONSECUTIVE_FAILURES,
                    err
                );
                if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    tracing::error!("too many failed cycles, backing off");
                    tokio::time::sleep(Duration::from_secs(cfg.daemon.failure_backoff)).await;
                    consecutive_failures = 0;
                }
            }
        }
        tokio::time::sleep(interval).await;
    }
}

async fn run_cycle(cfg: &Config, password: &str) -> Result<()> {
    let mut modem = open_session(cfg, password).await?;
    let result = poll_telemetry(modem.as_mut()).await;
    if let Err(err) = modem.logout().await {
        tracing::warn!(%err, "logout failed after cycle");
    }
    result
}

async fn poll_telemetry(modem: &mut dyn Modem) -> Result<()> {
    let status = modem.status().await?;
    tracing::info!(
        firmware = %status.firmware_version,
        uptime = %status.uptime_since_reboot,
        "device status"
    );

    let docsis = modem.docsis().await?;
    let diagnosed = diagnostics::diagnose(&docsis);
    if diagnosed.has_deviations() {
        tracing::warn!("docsis connection quality deviation found");
        for line in diagnosed.deviation_report() {
            tracing::warn!("{line}");
        }
    } else {
        tracing::info!(
            downstream = docsis.downstream.len() + docsis.downstream_ofdm.len(),
            upstream = docsis.upstream.len() + docsis.upstream_ofdma.len(),
            "all channels green"
        );
    }
    Ok(())
}
