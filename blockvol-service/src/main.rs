// SPDX-License-Identifier: GPL-3.0-only

//! blockvolctl - inspect and grow cloud block volumes on this node
//!
//! Results go to stdout as JSON; logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use blockvol_contracts::HostDevices;
use blockvol_service::{DeviceResolver, DriverConfig, PartitionAdapter, PartitionExpander};
use blockvol_sys::Sfdisk;
use blockvol_types::make_device_path;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "blockvolctl")]
#[command(about = "Inspect and grow cloud block volumes on this node", long_about = None)]
struct Cli {
    /// TOML driver configuration, overridden by environment variables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the local device of an attached disk
    Resolve {
        /// Cloud disk id, e.g. d-wz9cu3ctp6aj1iagco4h
        disk_id: String,
    },
    /// Show which device carries the filesystem of a disk
    Adapt {
        /// Root or partition device, as a path or a bare name like vdb
        device: String,
    },
    /// List candidate disk devices
    Inventory,
    /// Grow a partition to the end of its disk
    Expand {
        /// Raw disk device, e.g. /dev/vdb
        disk: String,
        /// Partition number on that disk
        partition: u32,
    },
}

#[derive(Debug, Serialize)]
struct DeviceOutput<'a> {
    input: &'a str,
    device: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("blockvol=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = DriverConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let host: Arc<dyn HostDevices> = Arc::new(config.paths.host());
    let adapter = PartitionAdapter::new(config.disk_partition, Arc::clone(&host));

    match cli.command {
        Commands::Resolve { disk_id } => {
            let resolver = DeviceResolver::standard(host, adapter);
            let device = resolver.resolve(&disk_id)?;
            print_json(&DeviceOutput {
                input: &disk_id,
                device,
            })?;
        }
        Commands::Adapt { device: input } => {
            let device = adapter.adapt(&make_device_path(&input))?;
            print_json(&DeviceOutput {
                input: &input,
                device,
            })?;
        }
        Commands::Inventory => {
            print_json(&host.inventory())?;
        }
        Commands::Expand { disk, partition } => {
            if unsafe { libc::geteuid() } != 0 {
                tracing::error!("expand must run as root");
                anyhow::bail!("expanding a partition requires root privileges");
            }

            let expander = PartitionExpander::new(Arc::new(Sfdisk::new()?));
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupted, cancelling before resize");
                    on_interrupt.cancel();
                }
            });

            expander.expand(&cancel, &disk, partition).await?;
            tracing::info!("Expanded partition {} on {}", partition, disk);
        }
    }

    Ok(())
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
