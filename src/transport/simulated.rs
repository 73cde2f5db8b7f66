//! Simulated device transport
//!
//! Stands in for the native health store and Bluetooth stack: a small
//! catalog of plausible devices, a handshake delay on connect, and
//! randomized in-range readings per advertised service.

use crate::error::IntegrationError;
use crate::transport::DeviceTransport;
use crate::types::{
    ConnectionStatus, Device, DeviceKind, HealthDataPoint, MeasurementType, MeasurementValue,
    QualityTag, SleepQualityTag,
};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Handshake delay applied by `connect`
const HANDSHAKE_DELAY: Duration = Duration::from_millis(50);

/// Simulated transport over a fixed device catalog
pub struct SimulatedTransport {
    catalog: Vec<Device>,
    failing_devices: Mutex<HashSet<String>>,
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self {
            catalog: default_catalog(),
            failing_devices: Mutex::new(HashSet::new()),
        }
    }

    /// Make the handshake for a device fail, to exercise connection error
    /// paths
    pub fn fail_handshake(&self, device_id: &str) {
        if let Ok(mut failing) = self.failing_devices.lock() {
            failing.insert(device_id.to_string());
        }
    }

    fn find(&self, device_id: &str) -> Option<&Device> {
        self.catalog.iter().find(|d| d.id == device_id)
    }
}

#[async_trait]
impl DeviceTransport for SimulatedTransport {
    async fn scan(&self, duration: Duration) -> Result<Vec<Device>, IntegrationError> {
        tokio::time::sleep(duration).await;

        let mut rng = rand::thread_rng();
        let discovered = self
            .catalog
            .iter()
            .map(|device| {
                let mut device = device.clone();
                device.rssi = Some(rng.gen_range(-90..=-40));
                device
            })
            .collect::<Vec<_>>();

        debug!(count = discovered.len(), "simulated scan complete");
        Ok(discovered)
    }

    async fn connect(&self, device_id: &str) -> Result<Device, IntegrationError> {
        let device = self
            .find(device_id)
            .ok_or_else(|| IntegrationError::UnknownDevice(device_id.to_string()))?
            .clone();

        if !device.connectable {
            return Err(IntegrationError::Transport {
                device_id: device_id.to_string(),
                reason: "device does not accept connections".to_string(),
            });
        }

        tokio::time::sleep(HANDSHAKE_DELAY).await;

        let failing = self
            .failing_devices
            .lock()
            .map(|f| f.contains(device_id))
            .unwrap_or(false);
        if failing {
            return Err(IntegrationError::Transport {
                device_id: device_id.to_string(),
                reason: "handshake rejected".to_string(),
            });
        }

        Ok(device)
    }

    async fn disconnect(&self, _device_id: &str) -> Result<(), IntegrationError> {
        Ok(())
    }

    async fn read(
        &self,
        device_id: &str,
        service: MeasurementType,
    ) -> Result<HealthDataPoint, IntegrationError> {
        if self.find(device_id).is_none() {
            return Err(IntegrationError::UnknownDevice(device_id.to_string()));
        }

        let value = simulate_reading(service);
        let quality = simulate_quality();
        Ok(HealthDataPoint::new(
            Some(device_id.to_string()),
            value,
            quality,
        ))
    }
}

/// Generate an in-range reading for a service
fn simulate_reading(service: MeasurementType) -> MeasurementValue {
    let mut rng = rand::thread_rng();
    match service {
        MeasurementType::HeartRate => MeasurementValue::HeartRate {
            bpm: rng.gen_range(62.0..=95.0),
        },
        MeasurementType::Steps => MeasurementValue::Steps {
            count: rng.gen_range(50..=500),
        },
        MeasurementType::SleepDuration => MeasurementValue::SleepDuration {
            hours: rng.gen_range(5.5..=9.0),
            quality: Some(match rng.gen_range(0..3) {
                0 => SleepQualityTag::Poor,
                1 => SleepQualityTag::Fair,
                _ => SleepQualityTag::Good,
            }),
        },
        MeasurementType::Weight => MeasurementValue::Weight {
            kg: rng.gen_range(55.0..=85.0),
        },
        MeasurementType::BloodPressure => MeasurementValue::BloodPressure {
            systolic: rng.gen_range(105.0..=145.0),
            diastolic: rng.gen_range(65.0..=92.0),
        },
        MeasurementType::Temperature => MeasurementValue::Temperature {
            celsius: rng.gen_range(36.1..=37.3),
        },
        MeasurementType::BloodOxygen => MeasurementValue::BloodOxygen {
            percentage: rng.gen_range(94.0..=99.5),
        },
    }
}

fn simulate_quality() -> QualityTag {
    match rand::thread_rng().gen_range(0..10) {
        0 => QualityTag::Fair,
        1..=4 => QualityTag::Good,
        _ => QualityTag::Excellent,
    }
}

/// Catalog of devices the simulated transport can discover
fn default_catalog() -> Vec<Device> {
    let base = |id: &str,
                name: &str,
                kind: DeviceKind,
                manufacturer: &str,
                model: &str,
                services: Vec<MeasurementType>| Device {
        id: id.to_string(),
        name: name.to_string(),
        kind,
        manufacturer: Some(manufacturer.to_string()),
        model: Some(model.to_string()),
        services,
        rssi: None,
        connectable: true,
        status: ConnectionStatus::Disconnected,
        battery_level: Some(85),
        last_sync: Some(Utc::now() - chrono::Duration::hours(2)),
        connected_at: None,
    };

    let mut catalog = vec![
        base(
            "fitbit_001",
            "Fitbit Charge 6",
            DeviceKind::FitnessTracker,
            "Fitbit",
            "Charge 6",
            vec![MeasurementType::HeartRate, MeasurementType::Steps],
        ),
        base(
            "apple_watch_001",
            "Apple Watch Series 9",
            DeviceKind::Smartwatch,
            "Apple",
            "Watch Series 9",
            vec![
                MeasurementType::HeartRate,
                MeasurementType::Steps,
                MeasurementType::SleepDuration,
                MeasurementType::BloodOxygen,
            ],
        ),
        base(
            "omron_bp_001",
            "Omron Evolv",
            DeviceKind::GenericSensor,
            "Omron",
            "Evolv",
            vec![MeasurementType::BloodPressure],
        ),
        base(
            "withings_scale_001",
            "Withings Body+",
            DeviceKind::GenericSensor,
            "Withings",
            "Body+",
            vec![MeasurementType::Weight],
        ),
        base(
            "health_bridge_001",
            "Host Health Store",
            DeviceKind::HealthAppBridge,
            "Meridian",
            "Bridge",
            vec![
                MeasurementType::Steps,
                MeasurementType::SleepDuration,
                MeasurementType::Temperature,
            ],
        ),
    ];

    // One advertising-only beacon that refuses connections
    let mut beacon = base(
        "beacon_001",
        "Unknown Beacon",
        DeviceKind::GenericSensor,
        "Unknown",
        "Beacon",
        vec![],
    );
    beacon.connectable = false;
    beacon.battery_level = None;
    catalog.push(beacon);

    catalog
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_scan_returns_catalog_with_rssi() {
        let transport = SimulatedTransport::new();
        let devices = transport.scan(Duration::from_millis(100)).await.unwrap();

        assert!(devices.iter().any(|d| d.id == "fitbit_001"));
        assert!(devices.iter().all(|d| d.rssi.is_some()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_unknown_device() {
        let transport = SimulatedTransport::new();
        let result = transport.connect("ghost_999").await;

        assert!(matches!(result, Err(IntegrationError::UnknownDevice(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_handshake() {
        let transport = SimulatedTransport::new();
        transport.fail_handshake("fitbit_001");

        let result = transport.connect("fitbit_001").await;
        assert!(matches!(result, Err(IntegrationError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_readings_are_in_range() {
        let transport = SimulatedTransport::new();

        for _ in 0..20 {
            let point = transport
                .read("fitbit_001", MeasurementType::HeartRate)
                .await
                .unwrap();
            match point.value {
                MeasurementValue::HeartRate { bpm } => {
                    assert!((62.0..=95.0).contains(&bpm));
                }
                ref other => panic!("unexpected value: {other:?}"),
            }
            assert_eq!(point.device_id.as_deref(), Some("fitbit_001"));
        }
    }

    #[tokio::test]
    async fn test_beacon_refuses_connections() {
        let catalog = default_catalog();
        let beacon = catalog.iter().find(|d| d.id == "beacon_001").unwrap();
        assert!(!beacon.connectable);
        assert!(beacon.services.is_empty());

        let transport = SimulatedTransport::new();
        let result = transport.connect("beacon_001").await;
        assert!(matches!(result, Err(IntegrationError::Transport { .. })));
    }
}
