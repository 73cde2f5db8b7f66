//! Bridge CLI - Command-line interface for Meridian Bridge
//!
//! Commands:
//! - scan: Discover nearby devices and print them
//! - session: Connect devices, stream readings, and print a summary
//! - doctor: Diagnose platform capabilities and persisted state

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use meridian_bridge::capabilities::HostProbe;
use meridian_bridge::scanner::sort_by_signal_strength;
use meridian_bridge::storage::FileStore;
use meridian_bridge::transport::{SimulatedEndpoint, SimulatedTransport};
use meridian_bridge::{IntegrationManager, BRIDGE_VERSION};

/// Bridge - device-integration pipeline for multi-source health data
#[derive(Parser)]
#[command(name = "bridge")]
#[command(version = BRIDGE_VERSION)]
#[command(about = "Discover, connect, and sync health devices", long_about = None)]
struct Cli {
    /// Directory for persisted configuration and the sync queue
    #[arg(long, default_value = ".bridge")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover nearby devices and print them
    Scan {
        /// Scan duration in milliseconds (configured default when omitted)
        #[arg(long)]
        duration_ms: Option<u64>,

        /// Output the device list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Connect devices, stream readings for a while, then summarize
    Session {
        /// Device IDs to connect
        #[arg(required = true)]
        devices: Vec<String>,

        /// Session length in seconds
        #[arg(long, default_value = "30")]
        seconds: u64,

        /// Output the health summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose platform capabilities and persisted state
    Doctor,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let manager = match IntegrationManager::bootstrap(
        Arc::new(SimulatedTransport::new()),
        Arc::new(SimulatedEndpoint::new()),
        Arc::new(FileStore::new(&cli.data_dir)),
        Box::new(HostProbe),
    )
    .await
    {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("error: failed to start: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Scan { duration_ms, json } => cmd_scan(&manager, duration_ms, json).await,
        Commands::Session {
            devices,
            seconds,
            json,
        } => cmd_session(&manager, &devices, seconds, json).await,
        Commands::Doctor => cmd_doctor(&manager).await,
    };

    manager.cleanup().await;
    result
}

async fn cmd_scan(
    manager: &Arc<IntegrationManager>,
    duration_ms: Option<u64>,
    json: bool,
) -> ExitCode {
    let response = manager.scan_for_devices(duration_ms).await;
    let Some(devices) = response.data else {
        eprintln!(
            "error: scan failed: {}",
            response.error.unwrap_or_default()
        );
        return ExitCode::FAILURE;
    };

    let devices = sort_by_signal_strength(&devices);
    if json {
        match serde_json::to_string_pretty(&devices) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    println!("Discovered {} device(s):", devices.len());
    for device in devices {
        let rssi = device
            .rssi
            .map(|r| format!("{r} dBm"))
            .unwrap_or_else(|| "n/a".to_string());
        let services: Vec<&str> = device.services.iter().map(|s| s.as_str()).collect();
        println!(
            "  {:<22} {:<24} rssi {:<8} services [{}]",
            device.id,
            device.name,
            rssi,
            services.join(", ")
        );
    }
    ExitCode::SUCCESS
}

async fn cmd_session(
    manager: &Arc<IntegrationManager>,
    devices: &[String],
    seconds: u64,
    json: bool,
) -> ExitCode {
    manager.initialize().await;

    let mut connected = 0;
    for device_id in devices {
        let response = manager.connect_device(device_id).await;
        match response.data {
            Some(device) => {
                println!("connected: {} ({})", device.id, device.name);
                connected += 1;
            }
            None => {
                eprintln!(
                    "warning: could not connect {device_id}: {}",
                    response.error.unwrap_or_default()
                );
            }
        }
    }
    if connected == 0 {
        eprintln!("error: no devices connected");
        return ExitCode::FAILURE;
    }

    println!("streaming for {seconds}s...");
    tokio::time::sleep(Duration::from_secs(seconds)).await;

    let summary = manager.health_summary();
    if json {
        match serde_json::to_string_pretty(&summary) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("data points: {}", summary.data_point_count);
        if let Some(hr) = &summary.heart_rate {
            println!(
                "heart rate: avg {:.1} bpm, trend {}",
                hr.average_bpm,
                hr.trend.as_str()
            );
        }
        if let Some(steps) = &summary.steps {
            println!(
                "steps: {:.0}/day against a goal of {}",
                steps.daily_average, steps.daily_goal
            );
        }
        println!(
            "constitution: {:?}, qi score {}",
            summary.tcm.constitution, summary.tcm.qi_score
        );
        println!("advice: {}", summary.tcm.seasonal_advice);
    }

    let report = manager.sync_now().await;
    if let Some(report) = report.data {
        println!(
            "sync: {} item(s) delivered{}",
            report.synced_count,
            report
                .error
                .map(|e| format!(" ({e})"))
                .unwrap_or_default()
        );
    }
    ExitCode::SUCCESS
}

async fn cmd_doctor(manager: &Arc<IntegrationManager>) -> ExitCode {
    let response = manager.initialize().await;
    let Some(capabilities) = response.data else {
        eprintln!(
            "error: capability probe failed: {}",
            response.error.unwrap_or_default()
        );
        return ExitCode::FAILURE;
    };

    println!("bridge {BRIDGE_VERSION}");
    println!("platform: {:?}", capabilities.platform);
    println!("health store: {}", capabilities.health_store_available);
    println!("bluetooth: {}", capabilities.bluetooth_available);
    println!("nfc: {}", capabilities.nfc_available);
    for (sensor, available) in &capabilities.sensors {
        println!("sensor {sensor:?}: {available}");
    }
    for (permission, status) in &capabilities.permissions {
        println!("permission {permission}: {status:?}");
    }

    let config = manager.configuration();
    println!(
        "config: sync every {} min, batch {}, retries {}, offline {}",
        config.sync_interval_minutes,
        config.sync_batch_size,
        config.max_retry_attempts,
        config.offline_mode
    );

    let status = manager.sync_status();
    println!(
        "queue: {} item(s), online: {}",
        status.queue.size, status.online
    );
    ExitCode::SUCCESS
}
