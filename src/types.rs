//! Core types for the Meridian Bridge pipeline
//!
//! This module defines the data structures that flow through the pipeline:
//! devices, measurements, derived summaries, sync queue items, and platform
//! capability snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Device category for discovered and connected data sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    FitnessTracker,
    Smartwatch,
    HealthAppBridge,
    GenericSensor,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::FitnessTracker => "fitness_tracker",
            DeviceKind::Smartwatch => "smartwatch",
            DeviceKind::HealthAppBridge => "health_app_bridge",
            DeviceKind::GenericSensor => "generic_sensor",
        }
    }
}

/// Connection lifecycle state of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Measurement type doubles as the service identifier a device advertises:
/// a device emits data points only for the services it lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementType {
    HeartRate,
    Steps,
    SleepDuration,
    Weight,
    BloodPressure,
    Temperature,
    BloodOxygen,
}

impl MeasurementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementType::HeartRate => "heart_rate",
            MeasurementType::Steps => "steps",
            MeasurementType::SleepDuration => "sleep_duration",
            MeasurementType::Weight => "weight",
            MeasurementType::BloodPressure => "blood_pressure",
            MeasurementType::Temperature => "temperature",
            MeasurementType::BloodOxygen => "blood_oxygen",
        }
    }

    /// Parse a measurement type from its wire name
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "heart_rate" => Some(MeasurementType::HeartRate),
            "steps" => Some(MeasurementType::Steps),
            "sleep_duration" => Some(MeasurementType::SleepDuration),
            "weight" => Some(MeasurementType::Weight),
            "blood_pressure" => Some(MeasurementType::BloodPressure),
            "temperature" => Some(MeasurementType::Temperature),
            "blood_oxygen" => Some(MeasurementType::BloodOxygen),
            _ => None,
        }
    }

    /// All known measurement types
    pub fn all() -> &'static [MeasurementType] {
        &[
            MeasurementType::HeartRate,
            MeasurementType::Steps,
            MeasurementType::SleepDuration,
            MeasurementType::Weight,
            MeasurementType::BloodPressure,
            MeasurementType::Temperature,
            MeasurementType::BloodOxygen,
        ]
    }
}

/// A discovered or connected external data source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Unique device identifier
    pub id: String,
    /// Human-readable display name
    pub name: String,
    /// Device category
    pub kind: DeviceKind,
    /// Manufacturer name
    pub manufacturer: Option<String>,
    /// Model identifier
    pub model: Option<String>,
    /// Services the device advertises
    pub services: Vec<MeasurementType>,
    /// Signal strength in dBm, present while scanning
    pub rssi: Option<i32>,
    /// Whether the device accepts connections
    pub connectable: bool,
    /// Current connection status
    pub status: ConnectionStatus,
    /// Battery level percentage (0-100)
    pub battery_level: Option<u8>,
    /// When the device was last synced
    pub last_sync: Option<DateTime<Utc>>,
    /// When the current connection was established
    pub connected_at: Option<DateTime<Utc>>,
}

impl Device {
    /// Whether the device advertises the given service
    pub fn advertises(&self, service: MeasurementType) -> bool {
        self.services.contains(&service)
    }
}

/// Signal quality of a single measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTag {
    Poor,
    Fair,
    Good,
    Excellent,
}

/// Qualitative sleep rating reported alongside a sleep measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepQualityTag {
    Poor,
    Fair,
    Good,
}

impl SleepQualityTag {
    /// Numeric score used for aggregate sleep classification
    /// (good=3, fair=2, poor=1; a missing tag scores 0)
    pub fn score(&self) -> f64 {
        match self {
            SleepQualityTag::Good => 3.0,
            SleepQualityTag::Fair => 2.0,
            SleepQualityTag::Poor => 1.0,
        }
    }
}

/// Measurement value, discriminated by measurement type
///
/// Each variant carries its own strongly-typed value shape so that
/// structured readings (blood pressure) and scalar readings travel through
/// the same pipeline without loss of type safety.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeasurementValue {
    HeartRate {
        bpm: f64,
    },
    Steps {
        count: u32,
    },
    SleepDuration {
        hours: f64,
        quality: Option<SleepQualityTag>,
    },
    Weight {
        kg: f64,
    },
    BloodPressure {
        systolic: f64,
        diastolic: f64,
    },
    Temperature {
        celsius: f64,
    },
    BloodOxygen {
        percentage: f64,
    },
}

impl MeasurementValue {
    /// Discriminant of this value
    pub fn measurement_type(&self) -> MeasurementType {
        match self {
            MeasurementValue::HeartRate { .. } => MeasurementType::HeartRate,
            MeasurementValue::Steps { .. } => MeasurementType::Steps,
            MeasurementValue::SleepDuration { .. } => MeasurementType::SleepDuration,
            MeasurementValue::Weight { .. } => MeasurementType::Weight,
            MeasurementValue::BloodPressure { .. } => MeasurementType::BloodPressure,
            MeasurementValue::Temperature { .. } => MeasurementType::Temperature,
            MeasurementValue::BloodOxygen { .. } => MeasurementType::BloodOxygen,
        }
    }

    /// Unit string for this value
    pub fn unit(&self) -> &'static str {
        match self {
            MeasurementValue::HeartRate { .. } => "bpm",
            MeasurementValue::Steps { .. } => "steps",
            MeasurementValue::SleepDuration { .. } => "hours",
            MeasurementValue::Weight { .. } => "kg",
            MeasurementValue::BloodPressure { .. } => "mmHg",
            MeasurementValue::Temperature { .. } => "celsius",
            MeasurementValue::BloodOxygen { .. } => "percent",
        }
    }

    /// Scalar projection used for averaging and trend analysis.
    ///
    /// Blood pressure has no single scalar and returns `None`; it is
    /// aggregated separately as a systolic/diastolic pair.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MeasurementValue::HeartRate { bpm } => Some(*bpm),
            MeasurementValue::Steps { count } => Some(f64::from(*count)),
            MeasurementValue::SleepDuration { hours, .. } => Some(*hours),
            MeasurementValue::Weight { kg } => Some(*kg),
            MeasurementValue::BloodPressure { .. } => None,
            MeasurementValue::Temperature { celsius } => Some(*celsius),
            MeasurementValue::BloodOxygen { percentage } => Some(*percentage),
        }
    }
}

/// One discrete health measurement
///
/// Immutable after creation: data points are enqueued for sync and buffered
/// for analysis but never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDataPoint {
    /// Unique identifier
    pub id: String,
    /// Originating device, if the point came from an external device rather
    /// than a host health store
    pub device_id: Option<String>,
    /// The measurement itself
    pub value: MeasurementValue,
    /// Unit string (derived from the value shape)
    pub unit: String,
    /// Capture timestamp
    pub timestamp: DateTime<Utc>,
    /// Signal quality
    pub quality: QualityTag,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl HealthDataPoint {
    /// Create a data point stamped with a fresh id and the current time
    pub fn new(device_id: Option<String>, value: MeasurementValue, quality: QualityTag) -> Self {
        let unit = value.unit().to_string();
        Self {
            id: Uuid::new_v4().to_string(),
            device_id,
            value,
            unit,
            timestamp: Utc::now(),
            quality,
            metadata: HashMap::new(),
        }
    }

    pub fn measurement_type(&self) -> MeasurementType {
        self.value.measurement_type()
    }
}

/// Directional classification of a metric over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    /// Fewer than two samples were available
    InsufficientData,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
            TrendDirection::InsufficientData => "insufficient_data",
        }
    }
}

/// Aggregate sleep quality classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepQualityClass {
    Good,
    Fair,
    Poor,
    Unknown,
}

/// Activity-level bucket derived from average daily steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    LightlyActive,
    Active,
    VeryActive,
}

/// Blood pressure category
///
/// Bands follow the common clinical staging: elevated from 130/80, high
/// from 140/90, crisis above 180/120.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BloodPressureCategory {
    Normal,
    Elevated,
    High,
    Crisis,
}

impl BloodPressureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BloodPressureCategory::Normal => "normal",
            BloodPressureCategory::Elevated => "elevated",
            BloodPressureCategory::High => "high",
            BloodPressureCategory::Crisis => "crisis",
        }
    }
}

/// Coarse TCM constitution tendency derived from aggregate metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstitutionTendency {
    Balanced,
    QiDeficiency,
    YangDeficiency,
    YinDeficiency,
}

/// Qi level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QiLevel {
    Abundant,
    Moderate,
    Deficient,
}

/// Severity of a single-point classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Normal,
    Attention,
    Warning,
}

/// Result of analyzing a single data point
///
/// The plain-language recommendation and the TCM interpretation are two
/// deliberately distinct voices and are never merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub measurement_type: MeasurementType,
    /// Classification label, e.g. "bradycardia", "high", "good"
    pub classification: String,
    pub severity: Severity,
    /// Evidence-based, plain-language recommendation
    pub recommendation: String,
    /// Traditional interpretation in TCM terms
    pub tcm_interpretation: String,
}

/// Heart rate rollup within a summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartRateSummary {
    pub average_bpm: f64,
    pub latest_bpm: f64,
    pub trend: TrendDirection,
}

/// Step count rollup within a summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepsSummary {
    pub daily_average: f64,
    pub daily_goal: u32,
    pub trend: TrendDirection,
}

/// Sleep rollup within a summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepSummary {
    pub average_hours: f64,
    pub quality: SleepQualityClass,
    pub trend: TrendDirection,
}

/// Weight rollup within a summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightSummary {
    pub latest_kg: f64,
    pub trend: TrendDirection,
}

/// Blood pressure rollup within a summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloodPressureSummary {
    pub average_systolic: f64,
    pub average_diastolic: f64,
    pub category: BloodPressureCategory,
}

/// TCM interpretation block of a summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcmAssessment {
    pub constitution: ConstitutionTendency,
    /// Qi level score (0-100)
    pub qi_score: u8,
    pub qi_level: QiLevel,
    pub recommendations: Vec<String>,
    pub seasonal_advice: String,
}

/// Point-in-time rollup across the buffered measurement window
///
/// Always freshly derived from buffered data points; never persisted as a
/// source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSummary {
    pub generated_at: DateTime<Utc>,
    pub data_point_count: usize,
    pub heart_rate: Option<HeartRateSummary>,
    pub steps: Option<StepsSummary>,
    pub sleep: Option<SleepSummary>,
    pub weight: Option<WeightSummary>,
    pub blood_pressure: Option<BloodPressureSummary>,
    pub activity_level: Option<ActivityLevel>,
    pub tcm: TcmAssessment,
}

/// An outbound unit of work owned by the synchronizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncQueueItem {
    pub id: String,
    /// Item type discriminator, e.g. "health_data_point"
    pub item_type: String,
    /// Opaque payload, typically a serialized `HealthDataPoint`
    pub payload: serde_json::Value,
    pub device_id: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

impl SyncQueueItem {
    /// Wrap a health data point for sync
    pub fn from_data_point(point: &HealthDataPoint) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: point.id.clone(),
            item_type: "health_data_point".to_string(),
            payload: serde_json::to_value(point)?,
            device_id: point.device_id.clone(),
            enqueued_at: point.timestamp,
        })
    }
}

/// Outcome of a sync attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    pub synced_count: usize,
    pub error: Option<String>,
}

impl SyncReport {
    pub fn synced(count: usize) -> Self {
        Self {
            success: true,
            synced_count: count,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            synced_count: 0,
            error: Some(error.into()),
        }
    }
}

/// Queue introspection snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub size: usize,
    pub counts_by_type: HashMap<String, usize>,
    pub oldest_enqueued_at: Option<DateTime<Utc>>,
    pub newest_enqueued_at: Option<DateTime<Utc>>,
}

/// Synchronizer status exposed through the integration facade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    pub online: bool,
    pub periodic_sync_active: bool,
    pub queue: QueueStats,
}

/// Host platform kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformKind {
    Ios,
    Android,
    Macos,
    Linux,
    Windows,
    Unknown,
}

/// Onboard sensor kind probed by the capability detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
    Magnetometer,
    Barometer,
}

impl SensorKind {
    pub fn all() -> &'static [SensorKind] {
        &[
            SensorKind::Accelerometer,
            SensorKind::Gyroscope,
            SensorKind::Magnetometer,
            SensorKind::Barometer,
        ]
    }
}

/// Permission grant state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// Snapshot of what the host platform exposes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub platform: PlatformKind,
    pub health_store_available: bool,
    pub bluetooth_available: bool,
    pub nfc_available: bool,
    pub sensors: HashMap<SensorKind, bool>,
    pub permissions: HashMap<String, PermissionStatus>,
    pub detected_at: DateTime<Utc>,
}

/// Result shape crossing the upstream (UI) boundary
///
/// Expected failure modes (already connected, offline, validation errors)
/// travel as `success: false` values; this shape never wraps a panic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_measurement_value_wire_shape() {
        let value = MeasurementValue::HeartRate { bpm: 72.0 };
        let wire = serde_json::to_value(&value).unwrap();
        assert_eq!(wire["type"], "heart_rate");
        assert_eq!(wire["bpm"], 72.0);

        let value = MeasurementValue::BloodPressure {
            systolic: 120.0,
            diastolic: 80.0,
        };
        let wire = serde_json::to_value(&value).unwrap();
        assert_eq!(wire["type"], "blood_pressure");
        assert_eq!(wire["systolic"], 120.0);
    }

    #[test]
    fn test_blood_pressure_has_no_scalar_projection() {
        let value = MeasurementValue::BloodPressure {
            systolic: 120.0,
            diastolic: 80.0,
        };
        assert!(value.as_scalar().is_none());
        assert_eq!(
            MeasurementValue::Steps { count: 4000 }.as_scalar(),
            Some(4000.0)
        );
    }

    #[test]
    fn test_data_point_stamps_id_unit_and_time() {
        let point = HealthDataPoint::new(
            Some("fitbit_001".to_string()),
            MeasurementValue::Weight { kg: 70.5 },
            QualityTag::Good,
        );

        assert!(!point.id.is_empty());
        assert_eq!(point.unit, "kg");
        assert_eq!(point.measurement_type(), MeasurementType::Weight);
    }

    #[test]
    fn test_measurement_type_name_round_trip() {
        for &kind in MeasurementType::all() {
            assert_eq!(MeasurementType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MeasurementType::parse("aura_field"), None);
    }
}
