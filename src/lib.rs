//! Meridian Bridge - Device-integration pipeline for multi-source health data
//!
//! Bridges external health devices (wearables, cuffs, scales, platform health
//! stores) into one analysis and synchronization pipeline: capability
//! detection → discovery → connection → per-point analysis → offline-first
//! batched sync.
//!
//! ## Modules
//!
//! - **Capabilities**: probe what the host platform can do
//! - **Scanner / Connector**: discover devices and own their connection lifecycle
//! - **Analysis**: classify measurements, compute trends, derive the TCM assessment
//! - **Sync**: durable outbound queue with batched delivery, retry, and backoff
//! - **Manager**: the facade composing all of the above

pub mod analysis;
pub mod capabilities;
pub mod config;
pub mod connector;
pub mod error;
pub mod manager;
pub mod scanner;
pub mod scheduler;
pub mod storage;
pub mod sync;
pub mod transport;
pub mod types;

pub use config::{ConfigManager, ConfigUpdate, DeviceIntegrationConfig};
pub use connector::{ConnectOutcome, DeviceConnector};
pub use error::IntegrationError;
pub use manager::IntegrationManager;
pub use scanner::DeviceScanner;
pub use sync::DataSynchronizer;

// Core type exports
pub use types::{
    ApiResponse, Device, DeviceCapabilities, HealthDataPoint, HealthSummary, MeasurementType,
    MeasurementValue, SyncReport, SyncStatus,
};

/// Bridge version embedded in diagnostics output
pub const BRIDGE_VERSION: &str = env!("CARGO_PKG_VERSION");
