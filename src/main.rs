//! # Range Fusion
//!
//! Fuse mouse odometry and serial ranging data into a UDP telemetry stream.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration and set up logging
//!    - Find the ranging sensor among the candidate serial devices
//!    - Scan the local /24 subnet for the telemetry sink
//!    - Open the pointer device
//!
//! 2. **Main Loop**
//!    - Pointer and ranging producers run concurrently until Ctrl+C
//!
//! 3. **Graceful Shutdown**
//!    - Stop both producers
//!    - Log frame counters
//!
//! # Examples
//!
//! ```bash
//! sudo range-fusion config/default.toml
//! ```
//!
//! Expected output:
//! ```text
//! INFO range_fusion: Range Fusion v0.1.0 starting...
//! INFO range_fusion::serial: Serial device found at /dev/ttyACM0
//! INFO range_fusion::discovery: Telemetry sink found: 192.168.1.17:1234
//! INFO range_fusion::telemetry::publisher: 0,0,0,0.003125,-0.00625
//! ```

use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use range_fusion::config::{Config, LoggingConfig};
use range_fusion::discovery::{discover_peer, NmapProbe};
use range_fusion::error::FusionError;
use range_fusion::pipeline::Pipeline;
use range_fusion::producer::PointerDevice;
use range_fusion::serial::{resolve_serial, TokioSerialOpener};
use range_fusion::telemetry::{connect_udp, TelemetryPublisher};

/// Config file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Log file name prefix inside `logging.log_dir`
const LOG_FILE_PREFIX: &str = "range-fusion.log";

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config(std::env::args().nth(1))?;
    let _log_guard = init_logging(&config.logging);

    info!("Range Fusion v{} starting...", env!("CARGO_PKG_VERSION"));

    let profile = config.pointer_profile()?;

    let serial = resolve_serial(
        &TokioSerialOpener::new(config.serial.baud_rate),
        &config.serial.candidates,
    );

    let probe = NmapProbe::new(config.discovery.nmap_path.clone());
    let peer = discover_peer(
        &probe,
        config.discovery.local_address,
        config.discovery.include_broadcast,
        config.discovery.port,
    )
    .await;

    let publisher = match peer {
        Some(peer) => match connect_udp(&peer).await {
            Ok(socket) => {
                info!("UDP telemetry connected to {}", peer);
                TelemetryPublisher::connected(socket)
            }
            Err(e) => {
                warn!("Could not connect to {}: {}", peer, e);
                TelemetryPublisher::disconnected()
            }
        },
        None => TelemetryPublisher::disconnected(),
    };

    let pointer_path = config.pointer_path()?;
    let pointer = match PointerDevice::open(&pointer_path) {
        Ok(file) => {
            info!("Pointer device opened at {}", pointer_path);
            Some(file)
        }
        Err(source) if config.pointer.required => {
            return Err(FusionError::PointerDevice {
                path: pointer_path,
                source,
            })
            .context("pointer device is required (set pointer.required = false to run without it)");
        }
        Err(e) => {
            warn!("Could not open pointer device {}: {}", pointer_path, e);
            None
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down...");
            let _ = shutdown_tx.send(true);
        }
    });
    info!("Press Ctrl+C to exit");

    let ranging = serial.map(|handle| BufReader::new(handle.into_port()));
    let report = Pipeline::new(profile, publisher)
        .run(pointer, ranging, shutdown_rx)
        .await;

    info!(
        "Pointer: {:?}, ranging: {:?}",
        report.pointer, report.ranging
    );
    info!(
        "Frames sent: {}, dropped: {}, failed: {}",
        report.stats.sent, report.stats.dropped, report.stats.failed
    );

    Ok(())
}

/// Loads the config from `arg`, else the default file if present, else defaults.
fn load_config(arg: Option<String>) -> Result<Config> {
    match arg {
        Some(path) => {
            Config::load(&path).with_context(|| format!("failed to load config {}", path))
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("failed to load config {}", DEFAULT_CONFIG_PATH)),
        None => Ok(Config::default()),
    }
}

/// Stdout logging, plus a daily-rolling file when `log_dir` is set.
///
/// `RUST_LOG` overrides the configured level. The returned guard flushes the
/// file writer on drop.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}
