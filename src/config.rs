//! Configuration management
//!
//! Process-wide tunables consumed by every pipeline component. Updates are
//! validated field by field and applied atomically: one out-of-range field
//! rejects the entire update. Valid updates are persisted before the call
//! returns.

use crate::error::IntegrationError;
use crate::storage::{StorageBackend, CONFIG_KEY};
use crate::types::MeasurementType;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Valid range for the periodic sync interval (minutes)
pub const SYNC_INTERVAL_RANGE: RangeInclusive<u32> = 1..=1440;
/// Valid range for the analysis/queue cache ceiling (items)
pub const CACHE_SIZE_RANGE: RangeInclusive<u32> = 100..=10_000;
/// Valid range for the Bluetooth scan duration (milliseconds)
pub const SCAN_DURATION_RANGE: RangeInclusive<u64> = 1000..=60_000;
/// Valid range for batch retry attempts
pub const RETRY_ATTEMPTS_RANGE: RangeInclusive<u32> = 1..=10;
/// Valid range for the data retention window (days)
pub const RETENTION_DAYS_RANGE: RangeInclusive<u32> = 1..=365;
/// Valid range for the sync batch size (items per batch)
pub const BATCH_SIZE_RANGE: RangeInclusive<u32> = 1..=100;
/// Valid range for the daily step goal
pub const STEP_GOAL_RANGE: RangeInclusive<u32> = 1000..=50_000;

/// Process-wide tunable state
///
/// Thresholds and cadences here are configurable defaults, not clinical
/// truth; callers adjust them through the validated update path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceIntegrationConfig {
    /// Sensors the pipeline is allowed to ingest
    pub enabled_sensors: Vec<MeasurementType>,
    /// Periodic sync cadence (minutes)
    pub sync_interval_minutes: u32,
    /// Ceiling for the analysis window and sync queue (items)
    pub max_cache_size: u32,
    /// How long ingested data is retained (days)
    pub data_retention_days: u32,
    /// Default Bluetooth scan duration (milliseconds)
    pub bluetooth_scan_duration_ms: u64,
    /// Retry ceiling for a failed sync batch
    pub max_retry_attempts: u32,
    /// Items submitted to the remote endpoint per batch
    pub sync_batch_size: u32,
    /// Daily step goal used by the analyzer
    pub daily_step_goal: u32,
    /// When set, sync attempts report the offline soft failure
    pub offline_mode: bool,
}

impl Default for DeviceIntegrationConfig {
    fn default() -> Self {
        Self {
            enabled_sensors: vec![
                MeasurementType::HeartRate,
                MeasurementType::Steps,
                MeasurementType::SleepDuration,
                MeasurementType::BloodPressure,
                MeasurementType::BloodOxygen,
            ],
            sync_interval_minutes: 15,
            max_cache_size: 1000,
            data_retention_days: 30,
            bluetooth_scan_duration_ms: 10_000,
            max_retry_attempts: 3,
            sync_batch_size: 10,
            daily_step_goal: 10_000,
            offline_mode: false,
        }
    }
}

/// Partial update applied through the validated path
///
/// Sensor names arrive as strings from the settings surface and are
/// validated against the known measurement types.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub enabled_sensors: Option<Vec<String>>,
    pub sync_interval_minutes: Option<u32>,
    pub max_cache_size: Option<u32>,
    pub data_retention_days: Option<u32>,
    pub bluetooth_scan_duration_ms: Option<u64>,
    pub max_retry_attempts: Option<u32>,
    pub sync_batch_size: Option<u32>,
    pub daily_step_goal: Option<u32>,
    pub offline_mode: Option<bool>,
}

/// Owner of the live configuration object
///
/// All cross-component reads go through [`ConfigManager::configuration`],
/// which returns a defensive copy.
pub struct ConfigManager {
    config: Mutex<DeviceIntegrationConfig>,
    storage: Arc<dyn StorageBackend>,
}

impl ConfigManager {
    /// Load persisted configuration, falling back to defaults on first run
    /// or on an unreadable document.
    pub async fn load(storage: Arc<dyn StorageBackend>) -> Result<Self, IntegrationError> {
        let config = match storage.read(CONFIG_KEY).await? {
            Some(doc) => match serde_json::from_str(&doc) {
                Ok(config) => config,
                Err(e) => {
                    warn!(error = %e, "persisted configuration unreadable, using defaults");
                    DeviceIntegrationConfig::default()
                }
            },
            None => DeviceIntegrationConfig::default(),
        };

        Ok(Self {
            config: Mutex::new(config),
            storage,
        })
    }

    /// Current configuration (defensive copy, never the live object)
    pub fn configuration(&self) -> DeviceIntegrationConfig {
        self.config
            .lock()
            .map(|c| c.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    /// Validate and apply a partial update atomically, persisting before
    /// returning. A single invalid field rejects the whole call and leaves
    /// the configuration unchanged.
    pub async fn update(&self, update: ConfigUpdate) -> Result<(), IntegrationError> {
        let candidate = {
            let current = self.configuration();
            merge_validated(current, update)?
        };

        let doc = serde_json::to_string_pretty(&candidate)?;
        self.storage.write(CONFIG_KEY, &doc).await?;

        if let Ok(mut config) = self.config.lock() {
            *config = candidate;
        }
        debug!("configuration updated");
        Ok(())
    }

    /// Replace the enabled sensor set (delegates to the validated path)
    pub async fn set_enabled_sensors(&self, sensors: Vec<String>) -> Result<(), IntegrationError> {
        self.update(ConfigUpdate {
            enabled_sensors: Some(sensors),
            ..ConfigUpdate::default()
        })
        .await
    }

    /// Change the periodic sync cadence (delegates to the validated path)
    pub async fn set_sync_interval(&self, minutes: u32) -> Result<(), IntegrationError> {
        self.update(ConfigUpdate {
            sync_interval_minutes: Some(minutes),
            ..ConfigUpdate::default()
        })
        .await
    }

    /// Toggle offline mode (delegates to the validated path)
    pub async fn set_offline_mode(&self, offline: bool) -> Result<(), IntegrationError> {
        self.update(ConfigUpdate {
            offline_mode: Some(offline),
            ..ConfigUpdate::default()
        })
        .await
    }

    /// Project the subset of fields relevant to a named consumer, so
    /// consumers do not couple to the full schema.
    pub fn component_configuration(
        &self,
        component: &str,
    ) -> Result<serde_json::Value, IntegrationError> {
        let config = self.configuration();
        match component {
            "scanner" => Ok(json!({
                "bluetooth_scan_duration_ms": config.bluetooth_scan_duration_ms,
            })),
            "connector" => Ok(json!({
                "enabled_sensors": config.enabled_sensors,
            })),
            "synchronizer" => Ok(json!({
                "sync_interval_minutes": config.sync_interval_minutes,
                "max_queue_size": config.max_cache_size,
                "max_retry_attempts": config.max_retry_attempts,
                "sync_batch_size": config.sync_batch_size,
                "offline_mode": config.offline_mode,
            })),
            "analyzer" => Ok(json!({
                "max_cache_size": config.max_cache_size,
                "data_retention_days": config.data_retention_days,
                "daily_step_goal": config.daily_step_goal,
            })),
            other => Err(IntegrationError::Config {
                field: "component",
                reason: format!("unknown component: {other}"),
            }),
        }
    }
}

/// Merge a partial update into the current configuration, validating every
/// provided field before any of them is applied.
fn merge_validated(
    mut config: DeviceIntegrationConfig,
    update: ConfigUpdate,
) -> Result<DeviceIntegrationConfig, IntegrationError> {
    if let Some(names) = update.enabled_sensors {
        let mut sensors = Vec::with_capacity(names.len());
        for name in &names {
            match MeasurementType::parse(name) {
                Some(sensor) => sensors.push(sensor),
                None => {
                    return Err(IntegrationError::Config {
                        field: "enabled_sensors",
                        reason: format!("unknown sensor: {name}"),
                    })
                }
            }
        }
        config.enabled_sensors = sensors;
    }

    if let Some(minutes) = update.sync_interval_minutes {
        check_range("sync_interval_minutes", minutes, &SYNC_INTERVAL_RANGE)?;
        config.sync_interval_minutes = minutes;
    }

    if let Some(size) = update.max_cache_size {
        check_range("max_cache_size", size, &CACHE_SIZE_RANGE)?;
        config.max_cache_size = size;
    }

    if let Some(days) = update.data_retention_days {
        check_range("data_retention_days", days, &RETENTION_DAYS_RANGE)?;
        config.data_retention_days = days;
    }

    if let Some(ms) = update.bluetooth_scan_duration_ms {
        check_range("bluetooth_scan_duration_ms", ms, &SCAN_DURATION_RANGE)?;
        config.bluetooth_scan_duration_ms = ms;
    }

    if let Some(attempts) = update.max_retry_attempts {
        check_range("max_retry_attempts", attempts, &RETRY_ATTEMPTS_RANGE)?;
        config.max_retry_attempts = attempts;
    }

    if let Some(batch) = update.sync_batch_size {
        check_range("sync_batch_size", batch, &BATCH_SIZE_RANGE)?;
        config.sync_batch_size = batch;
    }

    if let Some(goal) = update.daily_step_goal {
        check_range("daily_step_goal", goal, &STEP_GOAL_RANGE)?;
        config.daily_step_goal = goal;
    }

    if let Some(offline) = update.offline_mode {
        config.offline_mode = offline;
    }

    Ok(config)
}

fn check_range<T: PartialOrd + Copy + std::fmt::Display>(
    field: &'static str,
    value: T,
    range: &RangeInclusive<T>,
) -> Result<(), IntegrationError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(IntegrationError::Config {
            field,
            reason: format!(
                "{value} is outside the valid range {}..={}",
                range.start(),
                range.end()
            ),
        })
    }
}
