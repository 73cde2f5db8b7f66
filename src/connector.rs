//! Device connection lifecycle
//!
//! Owns the authoritative connected-device registry. Each connected device
//! gets a periodic emission task that samples the transport for every
//! service the device advertises and pushes the resulting data points, in
//! emission order, to the registered callback. No ordering is guaranteed
//! across different devices' streams.

use crate::error::IntegrationError;
use crate::scheduler::Scheduler;
use crate::transport::DeviceTransport;
use crate::types::{ConnectionStatus, Device, HealthDataPoint};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default cadence of the per-device emission loop
pub const DEFAULT_EMISSION_INTERVAL: Duration = Duration::from_secs(5);

/// Callback receiving data points as a device emits them
pub type DataCallback = Arc<dyn Fn(HealthDataPoint) + Send + Sync>;

/// Outcome of a connect call
///
/// `AlreadyConnected` is a recoverable, expected condition, not an error;
/// genuine connection failures surface as [`IntegrationError`].
#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    Connected(Device),
    AlreadyConnected,
}

impl ConnectOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectOutcome::Connected(_))
    }
}

/// Connection manager for external devices
pub struct DeviceConnector {
    transport: Arc<dyn DeviceTransport>,
    registry: Arc<Mutex<HashMap<String, Device>>>,
    callbacks: Arc<Mutex<HashMap<String, DataCallback>>>,
    emitters: Mutex<HashMap<String, Scheduler>>,
    emission_interval: Duration,
}

impl DeviceConnector {
    pub fn new(transport: Arc<dyn DeviceTransport>) -> Self {
        Self::with_emission_interval(transport, DEFAULT_EMISSION_INTERVAL)
    }

    /// Create a connector with a specific emission cadence
    pub fn with_emission_interval(
        transport: Arc<dyn DeviceTransport>,
        emission_interval: Duration,
    ) -> Self {
        Self {
            transport,
            registry: Arc::new(Mutex::new(HashMap::new())),
            callbacks: Arc::new(Mutex::new(HashMap::new())),
            emitters: Mutex::new(HashMap::new()),
            emission_interval,
        }
    }

    /// Connect to a device and start its emission loop.
    ///
    /// Returns [`ConnectOutcome::AlreadyConnected`] when the device is
    /// already in the registry. Unknown devices and handshake failures
    /// surface as errors, and leave no registry entry behind.
    pub async fn connect(&self, device_id: &str) -> Result<ConnectOutcome, IntegrationError> {
        // Claim the registry slot before the handshake so a concurrent
        // connect for the same id sees AlreadyConnected instead of racing.
        {
            let mut registry = lock_registry(&self.registry)?;
            if registry.contains_key(device_id) {
                return Ok(ConnectOutcome::AlreadyConnected);
            }
            let placeholder = Device {
                id: device_id.to_string(),
                name: device_id.to_string(),
                kind: crate::types::DeviceKind::GenericSensor,
                manufacturer: None,
                model: None,
                services: Vec::new(),
                rssi: None,
                connectable: true,
                status: ConnectionStatus::Connecting,
                battery_level: None,
                last_sync: None,
                connected_at: None,
            };
            registry.insert(device_id.to_string(), placeholder);
        }

        let mut device = match self.transport.connect(device_id).await {
            Ok(device) => device,
            Err(e) => {
                // Failed handshake must not leave an orphaned entry
                if let Ok(mut registry) = self.registry.lock() {
                    registry.remove(device_id);
                }
                return Err(e);
            }
        };

        device.status = ConnectionStatus::Connected;
        device.connected_at = Some(Utc::now());
        device.rssi = None;

        {
            let mut registry = lock_registry(&self.registry)?;
            registry.insert(device_id.to_string(), device.clone());
        }

        self.start_emission(&device);
        info!(device_id, services = device.services.len(), "device connected");
        Ok(ConnectOutcome::Connected(device))
    }

    /// Disconnect a device, stopping its emission loop and removing it from
    /// the registry. Returns `false` (not an error) if the device was not
    /// connected.
    pub async fn disconnect(&self, device_id: &str) -> bool {
        let removed = self
            .registry
            .lock()
            .map(|mut r| r.remove(device_id).is_some())
            .unwrap_or(false);
        if !removed {
            return false;
        }

        if let Ok(mut emitters) = self.emitters.lock() {
            if let Some(emitter) = emitters.remove(device_id) {
                emitter.stop();
            }
        }
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.remove(device_id);
        }

        if let Err(e) = self.transport.disconnect(device_id).await {
            warn!(device_id, error = %e, "transport disconnect failed");
        }
        info!(device_id, "device disconnected");
        true
    }

    /// Whether the device is in the connected registry
    pub fn is_connected(&self, device_id: &str) -> bool {
        self.registry
            .lock()
            .map(|r| {
                r.get(device_id)
                    .is_some_and(|d| d.status == ConnectionStatus::Connected)
            })
            .unwrap_or(false)
    }

    /// Defensive copies of all connected devices
    pub fn connected_devices(&self) -> Vec<Device> {
        self.registry
            .lock()
            .map(|r| {
                r.values()
                    .filter(|d| d.status == ConnectionStatus::Connected)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Register the callback that receives the device's data points
    pub fn set_data_callback(&self, device_id: &str, callback: DataCallback) {
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.insert(device_id.to_string(), callback);
        }
    }

    /// Drop the registered callback for a device, if any. Callers that
    /// register a callback ahead of `connect` use this to back out when the
    /// connect fails.
    pub fn clear_data_callback(&self, device_id: &str) {
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.remove(device_id);
        }
    }

    #[cfg(test)]
    pub(crate) fn has_data_callback(&self, device_id: &str) -> bool {
        self.callbacks
            .lock()
            .map(|c| c.contains_key(device_id))
            .unwrap_or(false)
    }

    /// Disconnect every connected device and clear all internal state.
    /// Must be called on session teardown so no emission timer leaks.
    pub async fn cleanup(&self) {
        let ids: Vec<String> = self
            .registry
            .lock()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        for id in ids {
            self.disconnect(&id).await;
        }
        debug!("connector state cleared");
    }

    fn start_emission(&self, device: &Device) {
        let scheduler = Scheduler::new();
        let transport = self.transport.clone();
        let callbacks = self.callbacks.clone();
        let device_id = device.id.clone();
        let services = device.services.clone();

        scheduler.start(self.emission_interval, move || {
            let transport = transport.clone();
            let callbacks = callbacks.clone();
            let device_id = device_id.clone();
            let services = services.clone();
            async move {
                for service in services {
                    match transport.read(&device_id, service).await {
                        Ok(point) => {
                            let callback = callbacks
                                .lock()
                                .ok()
                                .and_then(|c| c.get(&device_id).cloned());
                            if let Some(callback) = callback {
                                callback(point);
                            }
                        }
                        Err(e) => {
                            warn!(device_id, service = service.as_str(), error = %e,
                                "emission read failed");
                        }
                    }
                }
            }
        });

        if let Ok(mut emitters) = self.emitters.lock() {
            if let Some(old) = emitters.insert(device.id.clone(), scheduler) {
                old.stop();
            }
        }
    }
}

fn lock_registry<'a>(
    registry: &'a Arc<Mutex<HashMap<String, Device>>>,
) -> Result<std::sync::MutexGuard<'a, HashMap<String, Device>>, IntegrationError> {
    registry
        .lock()
        .map_err(|_| IntegrationError::Storage("device registry poisoned".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SimulatedTransport;
    use crate::types::MeasurementType;

    fn make_connector(interval: Duration) -> (Arc<SimulatedTransport>, DeviceConnector) {
        let transport = Arc::new(SimulatedTransport::new());
        let connector = DeviceConnector::with_emission_interval(transport.clone(), interval);
        (transport, connector)
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_then_reconnect_is_soft() {
        let (_, connector) = make_connector(Duration::from_secs(60));

        let first = connector.connect("fitbit_001").await.unwrap();
        assert!(first.is_connected());

        let second = connector.connect("fitbit_001").await.unwrap();
        assert!(matches!(second, ConnectOutcome::AlreadyConnected));
        assert_eq!(connector.connected_devices().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_unknown_returns_false() {
        let (_, connector) = make_connector(Duration::from_secs(60));
        assert!(!connector.disconnect("never_connected").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_device_is_an_error() {
        let (_, connector) = make_connector(Duration::from_secs(60));
        let result = connector.connect("ghost_999").await;

        assert!(matches!(result, Err(IntegrationError::UnknownDevice(_))));
        assert!(connector.connected_devices().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_handshake_leaves_no_registry_entry() {
        let (transport, connector) = make_connector(Duration::from_secs(60));
        transport.fail_handshake("fitbit_001");

        let result = connector.connect("fitbit_001").await;
        assert!(result.is_err());
        assert!(!connector.is_connected("fitbit_001"));
        assert!(connector.connected_devices().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_emission_pushes_points_for_each_service() {
        let (_, connector) = make_connector(Duration::from_millis(10));
        let received: Arc<Mutex<Vec<HealthDataPoint>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        connector.set_data_callback(
            "fitbit_001",
            Arc::new(move |point| {
                sink.lock().unwrap().push(point);
            }),
        );
        connector.connect("fitbit_001").await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        let points = received.lock().unwrap().clone();
        let heart_rate = points
            .iter()
            .filter(|p| p.measurement_type() == MeasurementType::HeartRate)
            .count();
        let steps = points
            .iter()
            .filter(|p| p.measurement_type() == MeasurementType::Steps)
            .count();
        assert!(heart_rate >= 2, "expected >= 2 heart rate points, got {heart_rate}");
        assert!(steps >= 2, "expected >= 2 step points, got {steps}");

        // Per-device delivery follows emission order
        for pair in points.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_stops_emission() {
        let (_, connector) = make_connector(Duration::from_millis(10));
        let received: Arc<Mutex<Vec<HealthDataPoint>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        connector.set_data_callback(
            "fitbit_001",
            Arc::new(move |point| {
                sink.lock().unwrap().push(point);
            }),
        );
        connector.connect("fitbit_001").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(connector.disconnect("fitbit_001").await);
        let count_after_disconnect = received.lock().unwrap().len();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(received.lock().unwrap().len(), count_after_disconnect);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_disconnects_everything() {
        let (_, connector) = make_connector(Duration::from_millis(10));

        connector.connect("fitbit_001").await.unwrap();
        connector.connect("apple_watch_001").await.unwrap();
        assert_eq!(connector.connected_devices().len(), 2);

        connector.cleanup().await;
        assert!(connector.connected_devices().is_empty());
        assert!(!connector.is_connected("fitbit_001"));
    }
}
