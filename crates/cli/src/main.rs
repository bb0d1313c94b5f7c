//! DeviceHub CLI - inspect local printers and scales and check backend access

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::collections::HashSet;
use std::path::PathBuf;
use tabled::{Table, Tabled};

use devicehub_core::application::{read_weight, screens};
use devicehub_core::port::{HidEnumerator, PdfRenderer, RemoteSession, SessionConnector};
use devicehub_core::DeviceHubConfig;
use devicehub_daemon::settings;
use devicehub_infra_backend::{Endpoint, ScreenConnector};
use devicehub_infra_system::{CupsSpooler, PlatformHidEnumerator};

#[derive(Parser)]
#[command(name = "devicehub-cli")]
#[command(about = "DeviceHub agent CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, env = settings::CONFIG_ENV)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List attached HID devices
    Scales {
        /// Include devices that do not report the scale usage page
        #[arg(long)]
        all: bool,
    },

    /// List local print destinations and their media options
    Printers,

    /// Read one weight from the configured scale
    Weigh,

    /// Validate the configuration, log in and verify the print queues
    Check,
}

#[derive(Tabled)]
struct DeviceRow {
    device: String,
    path: String,
    manufacturer: String,
    product: String,
    scale: String,
}

#[derive(Tabled)]
struct PrinterRow {
    printer: String,
    paper_sizes: String,
    paper_sources: String,
}

#[derive(Tabled)]
struct QueueRow {
    queue: String,
    printer: String,
    mode: String,
    backend: String,
    local: String,
}

fn mark(present: bool) -> String {
    if present {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}

fn load_config(arg: Option<String>) -> Result<DeviceHubConfig> {
    let path = settings::config_path(arg);
    println!("  {} {}", "Config:".bold(), path.display());
    settings::load(&path)
}

async fn list_scales(all: bool) -> Result<()> {
    let devices = PlatformHidEnumerator::default()
        .enumerate()
        .await
        .context("Failed to enumerate HID devices")?;

    let rows: Vec<DeviceRow> = devices
        .into_iter()
        .filter(|d| all || d.is_scale)
        .map(|d| DeviceRow {
            device: d.identity.to_string(),
            path: d.path,
            manufacturer: d.manufacturer,
            product: d.product,
            scale: mark(d.is_scale),
        })
        .collect();

    if rows.is_empty() {
        println!("{}", "No scales found".yellow());
    } else {
        println!("{}", Table::new(rows));
    }
    Ok(())
}

async fn list_printers() -> Result<()> {
    let spooler = CupsSpooler::default();
    let printers = spooler
        .list_printers()
        .await
        .context("Failed to list print destinations")?;

    if printers.is_empty() {
        println!("{}", "No printers configured".yellow());
        return Ok(());
    }

    let mut rows = Vec::with_capacity(printers.len());
    for printer in printers {
        let (paper_sizes, paper_sources) = match spooler.capabilities(&printer).await {
            Ok(caps) => (
                caps.paper_sizes
                    .iter()
                    .map(|m| m.id.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
                caps.paper_sources
                    .iter()
                    .map(|m| m.id.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            Err(e) => (format!("{}", e).red().to_string(), String::new()),
        };
        rows.push(PrinterRow {
            printer,
            paper_sizes,
            paper_sources,
        });
    }
    println!("{}", Table::new(rows));
    Ok(())
}

async fn weigh(config: Option<String>) -> Result<()> {
    let config = load_config(config)?;
    let scale = config.scale.context("No scale is configured")?;

    let Some(mut device) = PlatformHidEnumerator::default()
        .find(scale.device())
        .await?
    else {
        anyhow::bail!("Scale {} is not attached", scale.device());
    };
    let reading = read_weight(device.as_mut()).await;
    device.close().await;

    match reading? {
        Some(reading) => println!(
            "  {} {} ({})",
            "Weight:".bold(),
            reading.to_string().green(),
            reading.status
        ),
        None => println!("  {} {}", "Weight:".bold(), "no stable reading".yellow()),
    }
    Ok(())
}

async fn check(config: Option<String>) -> Result<()> {
    let config = load_config(config)?;
    println!("  {} {}", "Configuration:".bold(), "valid".green());

    let connector = ScreenConnector::new(Endpoint::new(&config.backend));
    println!("  {} {}", "Backend:".bold(), connector.endpoint());
    let session = connector
        .login()
        .await
        .context("Failed to log in to the backend")?;
    println!("  {} {}", "Login:".bold(), "OK".green());

    let exported = session
        .export(
            screens::PRINT_QUEUES_SCREEN,
            &screens::queue_export_commands(),
        )
        .await;
    if let Err(e) = session.logout().await {
        println!("  {} {}", "Logout failed:".yellow(), e);
    }
    let remote: HashSet<String> = exported
        .context("Failed to read print queues")?
        .into_iter()
        .filter_map(|row| row.into_iter().next())
        .collect();

    let local: HashSet<String> = match CupsSpooler::default().list_printers().await {
        Ok(printers) => printers.into_iter().collect(),
        Err(e) => {
            println!("  {} {}", "Spooler:".bold(), e.to_string().red());
            HashSet::new()
        }
    };

    let table = config.queue_table();
    let rows: Vec<QueueRow> = table
        .names()
        .iter()
        .filter_map(|name| table.get(name))
        .map(|queue| QueueRow {
            queue: queue.name.clone(),
            printer: queue.printer_name.clone(),
            mode: if queue.raw_mode { "raw" } else { "pdf" }.to_string(),
            backend: mark(remote.contains(&queue.name)),
            local: mark(local.contains(&queue.printer_name)),
        })
        .collect();

    println!();
    if rows.is_empty() {
        println!("{}", "No print queues configured".yellow());
    } else {
        println!("{}", Table::new(rows));
    }

    let missing = table
        .names()
        .iter()
        .filter(|name| !remote.contains(*name))
        .count();
    if missing > 0 {
        anyhow::bail!("{} print queue(s) missing in the backend", missing);
    }
    println!("{}", "✓ Backend access verified".green().bold());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scales { all } => list_scales(all).await?,
        Commands::Printers => list_printers().await?,
        Commands::Weigh => weigh(cli.config).await?,
        Commands::Check => {
            println!("{}", "DeviceHub check".cyan().bold());
            println!();
            check(cli.config).await?;
        }
    }

    Ok(())
}
