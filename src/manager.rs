//! Integration facade
//!
//! Composes the capability detector, scanner, connector, analyzer,
//! synchronizer, and configuration manager behind one stateful entry point.
//! All components arrive as constructor arguments; nothing here reaches for
//! globals, and every public call answers with an [`ApiResponse`] envelope
//! instead of panicking across the boundary.

use crate::analysis::HealthAnalyzer;
use crate::capabilities::{CapabilityDetector, PlatformProbe};
use crate::config::{ConfigManager, ConfigUpdate, DeviceIntegrationConfig};
use crate::connector::{ConnectOutcome, DeviceConnector};
use crate::scanner::DeviceScanner;
use crate::storage::StorageBackend;
use crate::sync::DataSynchronizer;
use crate::transport::{DeviceTransport, SyncEndpoint};
use crate::types::{
    ApiResponse, Device, DeviceCapabilities, HealthSummary, SyncReport, SyncStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Stateful facade over the whole device integration pipeline
pub struct IntegrationManager {
    capabilities: CapabilityDetector,
    scanner: DeviceScanner,
    connector: DeviceConnector,
    analyzer: Arc<HealthAnalyzer>,
    synchronizer: Arc<DataSynchronizer>,
    config: Arc<ConfigManager>,
}

impl IntegrationManager {
    /// Assemble the pipeline from its seams.
    ///
    /// Restores persisted configuration and the persisted sync queue; the
    /// analyzer window and step goal are sized from the restored
    /// configuration.
    pub async fn bootstrap(
        transport: Arc<dyn DeviceTransport>,
        endpoint: Arc<dyn SyncEndpoint>,
        storage: Arc<dyn StorageBackend>,
        probe: Box<dyn PlatformProbe>,
    ) -> Result<Arc<Self>, crate::error::IntegrationError> {
        let config = Arc::new(ConfigManager::load(storage.clone()).await?);
        let settings = config.configuration();

        let analyzer = Arc::new(HealthAnalyzer::new(
            settings.max_cache_size as usize,
            settings.data_retention_days,
            settings.daily_step_goal,
        ));
        let synchronizer = Arc::new(
            DataSynchronizer::load(endpoint, storage.clone(), config.clone()).await,
        );

        Ok(Arc::new(Self {
            capabilities: CapabilityDetector::new(probe, storage),
            scanner: DeviceScanner::new(transport.clone()),
            connector: DeviceConnector::new(transport),
            analyzer,
            synchronizer,
            config,
        }))
    }

    /// Probe platform capabilities and start the periodic sync timer
    pub async fn initialize(&self) -> ApiResponse<DeviceCapabilities> {
        let capabilities = match self.capabilities.detect().await {
            Ok(capabilities) => capabilities,
            Err(e) => return ApiResponse::err(e.to_string()),
        };

        let interval = self.config.configuration().sync_interval_minutes;
        self.synchronizer.start_periodic_sync(interval);

        info!(platform = ?capabilities.platform, "integration manager initialized");
        ApiResponse::ok(capabilities)
    }

    /// Scan for nearby devices. `duration_ms` overrides the configured
    /// default when present.
    pub async fn scan_for_devices(&self, duration_ms: Option<u64>) -> ApiResponse<Vec<Device>> {
        let duration = Duration::from_millis(
            duration_ms.unwrap_or_else(|| self.config.configuration().bluetooth_scan_duration_ms),
        );
        match self.scanner.scan(duration).await {
            Ok(devices) => ApiResponse::ok(devices),
            Err(e) => ApiResponse::err(e.to_string()),
        }
    }

    /// Cancel an in-flight scan. Safe when idle.
    pub fn stop_scan(&self) {
        self.scanner.stop_scan();
    }

    /// Connect to a device and wire its data stream into the pipeline.
    ///
    /// Connecting a device that is already connected answers with
    /// `success: false` and leaves the registry (and the existing data
    /// callback) untouched.
    pub async fn connect_device(&self, device_id: &str) -> ApiResponse<Device> {
        self.connector
            .set_data_callback(device_id, self.make_ingest_callback());

        match self.connector.connect(device_id).await {
            Ok(ConnectOutcome::Connected(device)) => ApiResponse::ok(device),
            Ok(ConnectOutcome::AlreadyConnected) => {
                ApiResponse::err(format!("device {device_id} is already connected"))
            }
            Err(e) => {
                // A failed connect must not strand a callback entry
                self.connector.clear_data_callback(device_id);
                ApiResponse::err(e.to_string())
            }
        }
    }

    /// Disconnect a device. Disconnecting an unknown device reports
    /// `false`, never an error.
    pub async fn disconnect_device(&self, device_id: &str) -> ApiResponse<bool> {
        ApiResponse::ok(self.connector.disconnect(device_id).await)
    }

    pub fn connected_devices(&self) -> Vec<Device> {
        self.connector.connected_devices()
    }

    /// Summary over everything recorded so far
    pub fn health_summary(&self) -> HealthSummary {
        self.analyzer.generate_summary()
    }

    /// Force a queue drain now
    pub async fn sync_now(&self) -> ApiResponse<SyncReport> {
        ApiResponse::ok(self.synchronizer.sync_now().await)
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.synchronizer.status()
    }

    /// Report a connectivity change to the synchronizer
    pub async fn set_connectivity(&self, online: bool) {
        self.synchronizer.set_connectivity(online).await;
    }

    pub fn configuration(&self) -> DeviceIntegrationConfig {
        self.config.configuration()
    }

    /// Apply a validated configuration update. A changed sync interval
    /// retimes the periodic drain in place.
    pub async fn update_configuration(
        &self,
        update: ConfigUpdate,
    ) -> ApiResponse<DeviceIntegrationConfig> {
        let retimed = update.sync_interval_minutes;
        if let Err(e) = self.config.update(update).await {
            return ApiResponse::err(e.to_string());
        }

        if let Some(minutes) = retimed {
            if self.sync_status().periodic_sync_active {
                self.synchronizer.start_periodic_sync(minutes);
            }
        }
        ApiResponse::ok(self.config.configuration())
    }

    pub fn detected_capabilities(&self) -> Option<DeviceCapabilities> {
        self.capabilities.snapshot()
    }

    /// Tear the session down: stop timers, disconnect every device, and
    /// flush the sync queue. Safe to call more than once.
    pub async fn cleanup(&self) {
        self.scanner.stop_scan();
        self.connector.cleanup().await;
        self.synchronizer.shutdown().await;
        info!("integration manager cleaned up");
    }

    /// Ingest fan-out applied to every emitted data point: filter by the
    /// live enabled-sensor set, buffer for analysis, enqueue for sync.
    fn make_ingest_callback(&self) -> crate::connector::DataCallback {
        // Capture components, not the manager itself; the connector stores
        // this callback and must not keep the whole facade alive.
        let config = Arc::clone(&self.config);
        let analyzer = Arc::clone(&self.analyzer);
        let synchronizer = Arc::clone(&self.synchronizer);

        Arc::new(move |point| {
            let enabled = config.configuration().enabled_sensors;
            if !enabled.contains(&point.measurement_type()) {
                return;
            }

            analyzer.record(point.clone());

            let synchronizer = Arc::clone(&synchronizer);
            tokio::spawn(async move {
                if let Err(e) = synchronizer.enqueue_data_point(&point).await {
                    warn!(error = %e, "failed to enqueue data point for sync");
                }
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::HostProbe;
    use crate::storage::MemoryStore;
    use crate::transport::{SimulatedEndpoint, SimulatedTransport};
    use crate::types::TrendDirection;

    async fn make_manager() -> (Arc<SimulatedEndpoint>, Arc<IntegrationManager>) {
        let endpoint = Arc::new(SimulatedEndpoint::new());
        let manager = IntegrationManager::bootstrap(
            Arc::new(SimulatedTransport::new()),
            endpoint.clone(),
            Arc::new(MemoryStore::new()),
            Box::new(HostProbe),
        )
        .await
        .unwrap();
        (endpoint, manager)
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_reports_capabilities() {
        let (_, manager) = make_manager().await;
        let response = manager.initialize().await;

        assert!(response.success);
        assert!(response.data.is_some());
        assert!(manager.sync_status().periodic_sync_active);

        manager.cleanup().await;
        assert!(!manager.sync_status().periodic_sync_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_uses_configured_duration_fallback() {
        let (_, manager) = make_manager().await;
        let response = manager.scan_for_devices(Some(50)).await;

        assert!(response.success);
        let devices = response.data.unwrap();
        assert!(devices.iter().any(|d| d.id == "fitbit_001"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_unknown_device_is_soft_at_boundary() {
        let (_, manager) = make_manager().await;
        let response = manager.connect_device("ghost_999").await;

        assert!(!response.success);
        assert!(response.error.unwrap().contains("ghost_999"));
        assert!(manager.connected_devices().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_connect_rejected_without_registry_change() {
        let (_, manager) = make_manager().await;

        let first = manager.connect_device("fitbit_001").await;
        assert!(first.success);

        let second = manager.connect_device("fitbit_001").await;
        assert!(!second.success);
        assert!(second.error.unwrap().contains("already connected"));
        assert_eq!(manager.connected_devices().len(), 1);
        // The device stays connected and keeps its data callback
        assert!(manager.connector.has_data_callback("fitbit_001"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_connect_leaves_no_callback_entry() {
        let (_, manager) = make_manager().await;

        let response = manager.connect_device("ghost_999").await;
        assert!(!response.success);
        assert!(!manager.connector.has_data_callback("ghost_999"));

        manager.connect_device("fitbit_001").await;
        assert!(manager.connector.has_data_callback("fitbit_001"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_emission_to_summary_and_sync() {
        let (endpoint, manager) = make_manager().await;
        manager.connect_device("fitbit_001").await;

        // Default emission cadence is 5s; let several cycles run
        tokio::time::sleep(Duration::from_secs(16)).await;

        let summary = manager.health_summary();
        let heart_rate = summary.heart_rate.expect("heart rate summary");
        assert!((60.0..=100.0).contains(&heart_rate.average_bpm));
        assert!(matches!(
            heart_rate.trend,
            TrendDirection::Increasing
                | TrendDirection::Decreasing
                | TrendDirection::Stable
                | TrendDirection::InsufficientData
        ));
        let steps = summary.steps.expect("steps summary");
        assert!(steps.daily_average >= 0.0);

        // Emitted points flowed through the synchronizer while online
        assert!(endpoint.acknowledged_items() >= 2);

        manager.cleanup().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_sensor_is_filtered_from_ingest() {
        let (_, manager) = make_manager().await;
        // Heart rate only; step emissions must be dropped
        let response = manager
            .update_configuration(ConfigUpdate {
                enabled_sensors: Some(vec!["heart_rate".to_string()]),
                ..ConfigUpdate::default()
            })
            .await;
        assert!(response.success);

        manager.connect_device("fitbit_001").await;
        tokio::time::sleep(Duration::from_secs(11)).await;

        let summary = manager.health_summary();
        assert!(summary.heart_rate.is_some());
        assert!(summary.steps.is_none());

        manager.cleanup().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_update_rejected_at_boundary() {
        let (_, manager) = make_manager().await;
        let response = manager
            .update_configuration(ConfigUpdate {
                sync_interval_minutes: Some(5000),
                ..ConfigUpdate::default()
            })
            .await;

        assert!(!response.success);
        assert_eq!(manager.configuration().sync_interval_minutes, 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_queue_drains_on_reconnect() {
        let (endpoint, manager) = make_manager().await;
        manager.set_connectivity(false).await;

        manager.connect_device("fitbit_001").await;
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(endpoint.acknowledged_items(), 0);
        assert!(manager.sync_status().queue.size > 0);

        manager.set_connectivity(true).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(endpoint.acknowledged_items() > 0);
        assert_eq!(manager.sync_status().queue.size, 0);

        manager.cleanup().await;
    }
}
