//! Platform capability detection
//!
//! Produces a snapshot of what the host exposes: native health store,
//! Bluetooth, NFC, onboard sensors, and permission state. Individual probe
//! failures degrade to "unavailable" rather than failing the snapshot; the
//! detector logs and continues.

use crate::error::IntegrationError;
use crate::storage::{StorageBackend, CAPABILITIES_KEY};
use crate::types::{DeviceCapabilities, PermissionStatus, PlatformKind, SensorKind};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Hardware/OS probe seam
///
/// One concrete adapter per platform API; the detector is written against
/// this trait only.
pub trait PlatformProbe: Send + Sync {
    fn platform(&self) -> PlatformKind;
    fn probe_health_store(&self) -> Result<bool, IntegrationError>;
    fn probe_bluetooth(&self) -> Result<bool, IntegrationError>;
    fn probe_nfc(&self) -> Result<bool, IntegrationError>;
    fn probe_sensor(&self, sensor: SensorKind) -> Result<bool, IntegrationError>;
    fn probe_permissions(&self) -> Result<HashMap<String, PermissionStatus>, IntegrationError>;
}

/// Conservative probe for the host process
///
/// Reports the compile-target platform and assumes no health store, no NFC,
/// and no onboard motion sensors; Bluetooth is reported present since every
/// supported host ships a stack for it. Real mobile adapters replace this.
pub struct HostProbe;

impl PlatformProbe for HostProbe {
    fn platform(&self) -> PlatformKind {
        match std::env::consts::OS {
            "ios" => PlatformKind::Ios,
            "android" => PlatformKind::Android,
            "macos" => PlatformKind::Macos,
            "linux" => PlatformKind::Linux,
            "windows" => PlatformKind::Windows,
            _ => PlatformKind::Unknown,
        }
    }

    fn probe_health_store(&self) -> Result<bool, IntegrationError> {
        Ok(matches!(
            self.platform(),
            PlatformKind::Ios | PlatformKind::Android
        ))
    }

    fn probe_bluetooth(&self) -> Result<bool, IntegrationError> {
        Ok(true)
    }

    fn probe_nfc(&self) -> Result<bool, IntegrationError> {
        Ok(false)
    }

    fn probe_sensor(&self, _sensor: SensorKind) -> Result<bool, IntegrationError> {
        Ok(false)
    }

    fn probe_permissions(&self) -> Result<HashMap<String, PermissionStatus>, IntegrationError> {
        Ok([
            ("health_data".to_string(), PermissionStatus::Undetermined),
            ("bluetooth".to_string(), PermissionStatus::Undetermined),
            ("location".to_string(), PermissionStatus::Undetermined),
        ]
        .into_iter()
        .collect())
    }
}

/// Capability detector with an in-memory and persisted snapshot cache
pub struct CapabilityDetector {
    probe: Box<dyn PlatformProbe>,
    storage: Arc<dyn StorageBackend>,
    cached: Mutex<Option<DeviceCapabilities>>,
}

impl CapabilityDetector {
    pub fn new(probe: Box<dyn PlatformProbe>, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            probe,
            storage,
            cached: Mutex::new(None),
        }
    }

    /// Detect host capabilities. Idempotent per process: after the first
    /// call the cached snapshot is returned until [`invalidate`] is called.
    ///
    /// [`invalidate`]: CapabilityDetector::invalidate
    pub async fn detect(&self) -> Result<DeviceCapabilities, IntegrationError> {
        if let Some(snapshot) = self.snapshot() {
            return Ok(snapshot);
        }

        let capabilities = self.probe_all();
        let doc = serde_json::to_string_pretty(&capabilities)?;
        self.storage.write(CAPABILITIES_KEY, &doc).await?;

        if let Ok(mut cached) = self.cached.lock() {
            *cached = Some(capabilities.clone());
        }
        debug!(platform = ?capabilities.platform, "capability snapshot cached");
        Ok(capabilities)
    }

    /// Read the cached snapshot without re-probing hardware
    pub fn snapshot(&self) -> Option<DeviceCapabilities> {
        self.cached.lock().ok().and_then(|c| c.clone())
    }

    /// Whether a sensor was available in the cached snapshot. Returns
    /// `false` when no snapshot has been taken yet.
    pub fn is_sensor_available(&self, sensor: SensorKind) -> bool {
        self.snapshot()
            .map(|s| s.sensors.get(&sensor).copied().unwrap_or(false))
            .unwrap_or(false)
    }

    /// Record a permission grant/denial in the cached snapshot and persist
    /// it, without re-probing hardware.
    pub async fn update_permission_status(
        &self,
        permission: &str,
        granted: bool,
    ) -> Result<(), IntegrationError> {
        let updated = {
            let mut cached = self
                .cached
                .lock()
                .map_err(|_| IntegrationError::Storage("capability cache poisoned".to_string()))?;
            let snapshot = match cached.as_mut() {
                Some(snapshot) => snapshot,
                None => return Ok(()),
            };
            let status = if granted {
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied
            };
            snapshot.permissions.insert(permission.to_string(), status);
            snapshot.clone()
        };

        let doc = serde_json::to_string_pretty(&updated)?;
        self.storage.write(CAPABILITIES_KEY, &doc).await
    }

    /// Drop the cached snapshot so the next `detect` re-probes hardware
    pub fn invalidate(&self) {
        if let Ok(mut cached) = self.cached.lock() {
            *cached = None;
        }
    }

    fn probe_all(&self) -> DeviceCapabilities {
        let health_store_available = degrade("health_store", self.probe.probe_health_store());
        let bluetooth_available = degrade("bluetooth", self.probe.probe_bluetooth());
        let nfc_available = degrade("nfc", self.probe.probe_nfc());

        let sensors = SensorKind::all()
            .iter()
            .map(|&sensor| (sensor, degrade("sensor", self.probe.probe_sensor(sensor))))
            .collect();

        let permissions = match self.probe.probe_permissions() {
            Ok(permissions) => permissions,
            Err(e) => {
                warn!(error = %e, "permission probe failed, reporting none");
                HashMap::new()
            }
        };

        DeviceCapabilities {
            platform: self.probe.platform(),
            health_store_available,
            bluetooth_available,
            nfc_available,
            sensors,
            permissions,
            detected_at: Utc::now(),
        }
    }
}

/// A failed probe degrades to "unavailable" instead of propagating
fn degrade(probe: &'static str, result: Result<bool, IntegrationError>) -> bool {
    match result {
        Ok(available) => available,
        Err(e) => {
            warn!(probe, error = %e, "capability probe failed, degrading to unavailable");
            false
        }
    }
}
