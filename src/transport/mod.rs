//! Device and endpoint access seams
//!
//! All orchestration code is written against these traits. Real platform
//! adapters (native health store, OS Bluetooth stack, HTTPS sync endpoint)
//! implement them; the simulated adapters stand in for development and
//! tests.

mod endpoint;
mod simulated;

pub use endpoint::{BatchItem, SimulatedEndpoint, SyncAck, SyncBatch, SyncEndpoint};
pub use simulated::SimulatedTransport;

use crate::error::IntegrationError;
use crate::types::{Device, HealthDataPoint, MeasurementType};
use async_trait::async_trait;
use std::time::Duration;

/// Capability set a device platform adapter must provide
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Discover nearby devices advertising health services. Runs for
    /// `duration` and returns the accumulated set.
    async fn scan(&self, duration: Duration) -> Result<Vec<Device>, IntegrationError>;

    /// Perform the connection handshake with a device
    async fn connect(&self, device_id: &str) -> Result<Device, IntegrationError>;

    /// Tear down the link to a device
    async fn disconnect(&self, device_id: &str) -> Result<(), IntegrationError>;

    /// Sample one reading for an advertised service
    async fn read(
        &self,
        device_id: &str,
        service: MeasurementType,
    ) -> Result<HealthDataPoint, IntegrationError>;
}
