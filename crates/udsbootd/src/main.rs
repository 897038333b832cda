//! UDS bootloader daemon
//!
//! Serves the bootloader protocol to a tester over TCP or a serial port.
//!
//! # Usage
//!
//! TCP on the default address, programming an in-memory image:
//! ```bash
//! ./udsbootd
//! ```
//!
//! Serial port, programming a file:
//! ```bash
//! ./udsbootd --serial /dev/ttyUSB0 --baud-rate 115200 --image app.bin
//! ```
//!
//! With config file:
//! ```bash
//! ./udsbootd --config config/udsbootd.toml
//! ```

use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinHandle;
use tracing::{error, info};
use udsboot_core::{FlashDriver, MemoryFlash};
use udsbootd::{DaemonConfig, FileFlash, FlashBackend, TransportConfig};

#[derive(Parser, Debug)]
#[command(name = "udsbootd")]
#[command(about = "UDS bootloader daemon", version)]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// TCP listen address (overrides the configured transport)
    #[arg(short, long, conflicts_with = "serial")]
    listen: Option<String>,

    /// Serial port (overrides the configured transport)
    #[arg(short, long)]
    serial: Option<String>,

    /// Serial baud rate
    #[arg(short, long, requires = "serial")]
    baud_rate: Option<u32>,

    /// Program firmware into this file instead of memory
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        "udsbootd=debug,udsboot_core=debug"
    } else {
        "udsbootd=info,udsboot_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .init();

    let config = load_config(&args)?;
    let region = config.bootloader.application;

    info!(
        version = udsboot_core::VERSION,
        base_address = format!("0x{:08X}", region.base_address),
        size = format!("0x{:08X}", region.size),
        max_block_length = config.bootloader.transfer.max_block_length,
        "Starting UDS bootloader"
    );

    let mut flash: Box<dyn FlashDriver + Send> = match &config.flash {
        FlashBackend::Memory => {
            info!("Programming in-memory image");
            Box::new(MemoryFlash::new(region))
        }
        FlashBackend::File { path } => {
            info!(path = %path.display(), "Programming image file");
            Box::new(
                FileFlash::open(path, region)
                    .with_context(|| format!("Failed to open image {}", path.display()))?,
            )
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let bootloader = config.bootloader.clone();

    let mut server: JoinHandle<Result<()>> = match config.transport.clone() {
        TransportConfig::Tcp { listen } => {
            let listener = TcpListener::bind(&listen)
                .with_context(|| format!("Failed to bind {}", listen))?;
            let running = running.clone();
            tokio::task::spawn_blocking(move || {
                udsbootd::serve_tcp(listener, &mut *flash, &bootloader, running)?;
                Ok(())
            })
        }
        TransportConfig::Serial { port, baud_rate } => {
            let running = running.clone();
            tokio::task::spawn_blocking(move || {
                udsbootd::serve_serial(&port, baud_rate, &mut *flash, &bootloader, running)
                    .with_context(|| format!("Serial transport on {} failed", port))
            })
        }
    };

    info!("Press Ctrl+C to stop");

    let interrupted = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            true
        }
        result = &mut server => {
            match result {
                Ok(Ok(())) => false,
                Ok(Err(e)) => {
                    error!(error = %e, "Transport failed");
                    return Err(e);
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    if interrupted {
        info!("Shutting down...");
        running.store(false, Ordering::SeqCst);
        let _ = tokio::time::timeout(Duration::from_secs(2), server).await;
    }

    info!("UDS bootloader stopped");
    Ok(())
}

fn load_config(args: &Args) -> Result<DaemonConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "Loading config");
            DaemonConfig::load(path).context("Failed to load config")?
        }
        None => DaemonConfig::default(),
    };

    if let Some(listen) = &args.listen {
        config.transport = TransportConfig::Tcp {
            listen: listen.clone(),
        };
    }
    if let Some(port) = &args.serial {
        config.transport = TransportConfig::serial(port.clone(), args.baud_rate);
    }
    if let Some(path) = &args.image {
        config.flash = FlashBackend::File { path: path.clone() };
    }

    config.validate()?;
    Ok(config)
}
