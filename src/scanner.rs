//! Device discovery
//!
//! Runs duration-bounded scans through the device transport with
//! single-flight discipline: only one scan may be active at a time. Also
//! provides pure filtering and sorting helpers over discovered device
//! lists; the discovered list is a transient snapshot with no ownership
//! implications.

use crate::error::IntegrationError;
use crate::transport::DeviceTransport;
use crate::types::{Device, DeviceKind, MeasurementType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info};

/// Device scanner with single-flight discipline
pub struct DeviceScanner {
    transport: Arc<dyn DeviceTransport>,
    scanning: AtomicBool,
    cancel: Notify,
}

impl DeviceScanner {
    pub fn new(transport: Arc<dyn DeviceTransport>) -> Self {
        Self {
            transport,
            scanning: AtomicBool::new(false),
            cancel: Notify::new(),
        }
    }

    /// Scan for the given duration and return the accumulated set of
    /// discovered devices. Fails fast with [`IntegrationError::ScanInProgress`]
    /// if a scan is already active.
    pub async fn scan(&self, duration: Duration) -> Result<Vec<Device>, IntegrationError> {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(IntegrationError::ScanInProgress);
        }

        info!(duration_ms = duration.as_millis() as u64, "scan started");
        let result = tokio::select! {
            devices = self.transport.scan(duration) => devices,
            _ = self.cancel.notified() => {
                debug!("scan cancelled");
                Ok(Vec::new())
            }
        };

        self.scanning.store(false, Ordering::SeqCst);
        result
    }

    /// Cancel any in-flight scan and reset to idle. Safe to call when no
    /// scan is running (no-op).
    pub fn stop_scan(&self) {
        self.cancel.notify_waiters();
        self.scanning.store(false, Ordering::SeqCst);
    }

    /// Whether a scan is currently active
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }
}

/// Filter a device list by category. Does not mutate the input.
pub fn filter_by_kind(devices: &[Device], kind: DeviceKind) -> Vec<Device> {
    devices.iter().filter(|d| d.kind == kind).cloned().collect()
}

/// Filter a device list by case-insensitive manufacturer substring.
/// Does not mutate the input.
pub fn filter_by_manufacturer(devices: &[Device], fragment: &str) -> Vec<Device> {
    let fragment = fragment.to_lowercase();
    devices
        .iter()
        .filter(|d| {
            d.manufacturer
                .as_deref()
                .is_some_and(|m| m.to_lowercase().contains(&fragment))
        })
        .cloned()
        .collect()
}

/// Filter a device list by advertised service. Does not mutate the input.
pub fn filter_by_service(devices: &[Device], service: MeasurementType) -> Vec<Device> {
    devices
        .iter()
        .filter(|d| d.advertises(service))
        .cloned()
        .collect()
}

/// Sort a device list descending by signal strength; devices without a
/// reading sort as the weakest. Does not mutate the input.
pub fn sort_by_signal_strength(devices: &[Device]) -> Vec<Device> {
    let mut sorted = devices.to_vec();
    sorted.sort_by_key(|d| std::cmp::Reverse(d.rssi.unwrap_or(i32::MIN)));
    sorted
}
