//! Error types for Meridian Bridge
//!
//! Expected/soft conditions (already connected, empty queue, offline) are
//! represented as result values by their owning components, not as variants
//! here. These errors cover validation failures, transport faults, and
//! storage faults.

use thiserror::Error;

/// Errors raised by pipeline components
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("Invalid configuration field `{field}`: {reason}")]
    Config { field: &'static str, reason: String },

    #[error("A scan is already in progress")]
    ScanInProgress,

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Transport failure for device {device_id}: {reason}")]
    Transport { device_id: String, reason: String },

    #[error("Sync failure: {reason}")]
    Sync { reason: String },

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Capability probe `{probe}` failed: {reason}")]
    Probe { probe: &'static str, reason: String },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
