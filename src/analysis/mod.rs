//! Health data analysis
//!
//! Turns raw data points into categorized interpretations and aggregate
//! summaries. Clinical classification, trend computation, and the TCM
//! assessment are separate, independently testable functions; the summary
//! builder composes them over the buffered measurement window.

mod classify;
mod trends;

pub use classify::{blood_pressure_category, classify};
pub use trends::{
    compute_trend, HEART_RATE_DELTA, RECENT_WINDOW, SLEEP_DELTA, STEPS_DELTA, WEIGHT_DELTA,
};

use crate::types::{
    ActivityLevel, AnalysisResult, BloodPressureSummary, ConstitutionTendency, HealthDataPoint,
    HealthSummary, HeartRateSummary, MeasurementValue, QiLevel, SleepQualityClass, SleepSummary,
    StepsSummary, TcmAssessment, TrendDirection, WeightSummary,
};
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// How long a generated summary is served from cache
const SUMMARY_TTL: Duration = Duration::from_secs(30);

/// Analyzer over a bounded window of buffered data points
pub struct HealthAnalyzer {
    window: Mutex<VecDeque<HealthDataPoint>>,
    cached: Mutex<Option<(Instant, HealthSummary)>>,
    max_window: usize,
    retention_days: u32,
    daily_step_goal: u32,
}

impl HealthAnalyzer {
    pub fn new(max_window: usize, retention_days: u32, daily_step_goal: u32) -> Self {
        Self {
            window: Mutex::new(VecDeque::with_capacity(max_window.min(1024))),
            cached: Mutex::new(None),
            max_window,
            retention_days,
            daily_step_goal,
        }
    }

    /// Buffer a data point for summary generation.
    ///
    /// Enforces the window ceiling (oldest points evicted first), drops
    /// points past the retention horizon, and invalidates the cached
    /// summary.
    pub fn record(&self, point: HealthDataPoint) {
        let horizon = Utc::now() - ChronoDuration::days(i64::from(self.retention_days));
        if let Ok(mut window) = self.window.lock() {
            window.push_back(point);
            while window
                .front()
                .is_some_and(|p| p.timestamp < horizon)
            {
                window.pop_front();
            }
            while window.len() > self.max_window {
                window.pop_front();
            }
        }
        if let Ok(mut cached) = self.cached.lock() {
            *cached = None;
        }
    }

    /// Number of points currently buffered
    pub fn window_size(&self) -> usize {
        self.window.lock().map(|w| w.len()).unwrap_or(0)
    }

    /// Classify a single data point (live, per-point feedback)
    pub fn analyze(&self, point: &HealthDataPoint) -> AnalysisResult {
        classify(&point.value, self.daily_step_goal)
    }

    /// Generate a summary over the buffered window.
    ///
    /// Recomputed on demand and cached for a short TTL; the cache is only a
    /// UI-responsiveness measure, never a source of truth.
    pub fn generate_summary(&self) -> HealthSummary {
        if let Ok(cached) = self.cached.lock() {
            if let Some((at, summary)) = cached.as_ref() {
                if at.elapsed() < SUMMARY_TTL {
                    return summary.clone();
                }
            }
        }

        let points: Vec<HealthDataPoint> = self
            .window
            .lock()
            .map(|w| {
                let mut points: Vec<_> = w.iter().cloned().collect();
                // The window accepts out-of-order arrivals
                points.sort_by_key(|p| p.timestamp);
                points
            })
            .unwrap_or_default();

        let summary = build_summary(&points, self.daily_step_goal);
        debug!(points = points.len(), "health summary generated");

        if let Ok(mut cached) = self.cached.lock() {
            *cached = Some((Instant::now(), summary.clone()));
        }
        summary
    }
}

/// Build a summary from a chronologically sorted window
fn build_summary(points: &[HealthDataPoint], daily_step_goal: u32) -> HealthSummary {
    let heart_rate = summarize_heart_rate(points);
    let steps = summarize_steps(points, daily_step_goal);
    let sleep = summarize_sleep(points);
    let weight = summarize_weight(points);
    let blood_pressure = summarize_blood_pressure(points);

    let activity_level = steps
        .as_ref()
        .map(|s| activity_level_for(s.daily_average));

    // Derived purely from the already-computed summary fields
    let tcm = assess_tcm(
        heart_rate.as_ref(),
        sleep.as_ref(),
        blood_pressure.as_ref(),
        activity_level,
        Utc::now().month(),
    );

    HealthSummary {
        generated_at: Utc::now(),
        data_point_count: points.len(),
        heart_rate,
        steps,
        sleep,
        weight,
        blood_pressure,
        activity_level,
        tcm,
    }
}

fn summarize_heart_rate(points: &[HealthDataPoint]) -> Option<HeartRateSummary> {
    let values: Vec<f64> = points
        .iter()
        .filter_map(|p| match p.value {
            MeasurementValue::HeartRate { bpm } => Some(bpm),
            _ => None,
        })
        .collect();
    let latest = *values.last()?;

    Some(HeartRateSummary {
        average_bpm: values.iter().sum::<f64>() / values.len() as f64,
        latest_bpm: latest,
        trend: compute_trend(&values, HEART_RATE_DELTA),
    })
}

fn summarize_steps(points: &[HealthDataPoint], daily_step_goal: u32) -> Option<StepsSummary> {
    // Steps aggregate per calendar day before averaging and trending
    let mut daily: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for point in points {
        if let MeasurementValue::Steps { count } = point.value {
            *daily.entry(point.timestamp.date_naive()).or_insert(0.0) += f64::from(count);
        }
    }
    if daily.is_empty() {
        return None;
    }

    let totals: Vec<f64> = daily.values().copied().collect();
    Some(StepsSummary {
        daily_average: totals.iter().sum::<f64>() / totals.len() as f64,
        daily_goal: daily_step_goal,
        trend: compute_trend(&totals, STEPS_DELTA),
    })
}

fn summarize_sleep(points: &[HealthDataPoint]) -> Option<SleepSummary> {
    let mut hours = Vec::new();
    let mut scores = Vec::new();
    for point in points {
        if let MeasurementValue::SleepDuration {
            hours: h,
            quality,
        } = &point.value
        {
            hours.push(*h);
            scores.push(quality.map(|q| q.score()).unwrap_or(0.0));
        }
    }
    if hours.is_empty() {
        return None;
    }

    let average_score = scores.iter().sum::<f64>() / scores.len() as f64;
    let quality = if average_score >= 2.5 {
        SleepQualityClass::Good
    } else if average_score >= 1.5 {
        SleepQualityClass::Fair
    } else if average_score > 0.0 {
        SleepQualityClass::Poor
    } else {
        SleepQualityClass::Unknown
    };

    Some(SleepSummary {
        average_hours: hours.iter().sum::<f64>() / hours.len() as f64,
        quality,
        trend: compute_trend(&hours, SLEEP_DELTA),
    })
}

fn summarize_weight(points: &[HealthDataPoint]) -> Option<WeightSummary> {
    let values: Vec<f64> = points
        .iter()
        .filter_map(|p| match p.value {
            MeasurementValue::Weight { kg } => Some(kg),
            _ => None,
        })
        .collect();
    let latest = *values.last()?;

    Some(WeightSummary {
        latest_kg: latest,
        trend: compute_trend(&values, WEIGHT_DELTA),
    })
}

fn summarize_blood_pressure(points: &[HealthDataPoint]) -> Option<BloodPressureSummary> {
    let readings: Vec<(f64, f64)> = points
        .iter()
        .filter_map(|p| match p.value {
            MeasurementValue::BloodPressure {
                systolic,
                diastolic,
            } => Some((systolic, diastolic)),
            _ => None,
        })
        .collect();
    if readings.is_empty() {
        return None;
    }

    let n = readings.len() as f64;
    let average_systolic = readings.iter().map(|(s, _)| s).sum::<f64>() / n;
    let average_diastolic = readings.iter().map(|(_, d)| d).sum::<f64>() / n;

    Some(BloodPressureSummary {
        average_systolic,
        average_diastolic,
        category: blood_pressure_category(average_systolic, average_diastolic),
    })
}

fn activity_level_for(daily_average_steps: f64) -> ActivityLevel {
    if daily_average_steps < 5000.0 {
        ActivityLevel::Sedentary
    } else if daily_average_steps < 7500.0 {
        ActivityLevel::LightlyActive
    } else if daily_average_steps < 10_000.0 {
        ActivityLevel::Active
    } else {
        ActivityLevel::VeryActive
    }
}

/// Derive the TCM assessment from already-computed summary fields.
/// Never re-reads raw data points.
fn assess_tcm(
    heart_rate: Option<&HeartRateSummary>,
    sleep: Option<&SleepSummary>,
    blood_pressure: Option<&BloodPressureSummary>,
    activity_level: Option<ActivityLevel>,
    month: u32,
) -> TcmAssessment {
    let mut score: i32 = 70;

    if let Some(sleep) = sleep {
        score += match sleep.quality {
            SleepQualityClass::Good => 10,
            SleepQualityClass::Fair | SleepQualityClass::Unknown => 0,
            SleepQualityClass::Poor => -15,
        };
    }
    match activity_level {
        Some(ActivityLevel::Sedentary) => score -= 10,
        Some(ActivityLevel::Active | ActivityLevel::VeryActive) => score += 10,
        _ => {}
    }
    if let Some(hr) = heart_rate {
        if !(60.0..=100.0).contains(&hr.average_bpm) {
            score -= 10;
        }
    }
    if let Some(bp) = blood_pressure {
        if matches!(
            bp.category,
            crate::types::BloodPressureCategory::High
                | crate::types::BloodPressureCategory::Crisis
        ) {
            score -= 10;
        }
    }
    let qi_score = score.clamp(0, 100) as u8;

    let qi_level = if qi_score >= 75 {
        QiLevel::Abundant
    } else if qi_score >= 50 {
        QiLevel::Moderate
    } else {
        QiLevel::Deficient
    };

    let slow_pulse = heart_rate.is_some_and(|hr| hr.average_bpm < 60.0);
    let rapid_pulse = heart_rate.is_some_and(|hr| hr.average_bpm > 100.0);
    let poor_sleep = sleep.is_some_and(|s| s.quality == SleepQualityClass::Poor);
    let sedentary = activity_level == Some(ActivityLevel::Sedentary);

    let constitution = if qi_score < 50 {
        ConstitutionTendency::QiDeficiency
    } else if slow_pulse && sedentary {
        ConstitutionTendency::YangDeficiency
    } else if rapid_pulse || poor_sleep {
        ConstitutionTendency::YinDeficiency
    } else {
        ConstitutionTendency::Balanced
    };

    let mut recommendations = Vec::new();
    if sedentary {
        recommendations.push(
            "Add gentle daily movement such as walking or tai chi to keep qi flowing.".to_string(),
        );
    }
    if poor_sleep {
        recommendations.push(
            "Wind down earlier in the evening and keep a regular bedtime to settle the shen."
                .to_string(),
        );
    }
    if blood_pressure.is_some_and(|bp| {
        matches!(
            bp.category,
            crate::types::BloodPressureCategory::High
                | crate::types::BloodPressureCategory::Crisis
        )
    }) {
        recommendations
            .push("Reduce salty and rich foods, and make time for unhurried meals.".to_string());
    }
    if recommendations.is_empty() {
        recommendations.push(
            "Maintain your current routines; balance is best preserved, not chased.".to_string(),
        );
    }

    TcmAssessment {
        constitution,
        qi_score,
        qi_level,
        recommendations,
        seasonal_advice: seasonal_advice(month).to_string(),
    }
}

/// Static seasonal guidance keyed off the calendar month
fn seasonal_advice(month: u32) -> &'static str {
    match month {
        3..=5 => {
            "Spring favors the liver: rise earlier, stretch, and let plans \
             unfold without force."
        }
        6..=8 => {
            "Summer favors the heart: stay hydrated, rest at midday, and \
             avoid excessive cold foods despite the heat."
        }
        9..=11 => {
            "Autumn favors the lungs: keep the neck warm, moisten dryness \
             with pears and soups, and begin sleeping earlier."
        }
        _ => {
            "Winter favors the kidneys: conserve energy, sleep longer, and \
             favor warm, slow-cooked nourishment."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{QualityTag, SleepQualityTag};
    use pretty_assertions::assert_eq;

    fn make_point(value: MeasurementValue) -> HealthDataPoint {
        HealthDataPoint::new(Some("fitbit_001".to_string()), value, QualityTag::Good)
    }

    fn make_analyzer() -> HealthAnalyzer {
        HealthAnalyzer::new(1000, 30, 10_000)
    }

    #[test]
    fn test_empty_window_summary() {
        let analyzer = make_analyzer();
        let summary = analyzer.generate_summary();

        assert_eq!(summary.data_point_count, 0);
        assert!(summary.heart_rate.is_none());
        assert!(summary.steps.is_none());
        assert!(!summary.tcm.seasonal_advice.is_empty());
        assert!(!summary.tcm.recommendations.is_empty());
    }

    #[test]
    fn test_summary_after_device_emissions() {
        let analyzer = make_analyzer();
        for bpm in [68.0, 72.0, 75.0] {
            analyzer.record(make_point(MeasurementValue::HeartRate { bpm }));
        }
        for count in [400, 350] {
            analyzer.record(make_point(MeasurementValue::Steps { count }));
        }

        let summary = analyzer.generate_summary();
        let heart_rate = summary.heart_rate.unwrap();
        assert!((60.0..=100.0).contains(&heart_rate.average_bpm));
        assert_eq!(heart_rate.latest_bpm, 75.0);
        // prior [68], recent [72, 75]: +5.5 bpm exceeds the 5 bpm delta
        assert_eq!(heart_rate.trend, TrendDirection::Increasing);

        let steps = summary.steps.unwrap();
        assert!(steps.daily_average >= 0.0);
        assert_eq!(steps.daily_goal, 10_000);
    }

    #[test]
    fn test_single_point_trend_is_insufficient() {
        let analyzer = make_analyzer();
        analyzer.record(make_point(MeasurementValue::HeartRate { bpm: 72.0 }));
        analyzer.record(make_point(MeasurementValue::Steps { count: 4000 }));

        let summary = analyzer.generate_summary();
        assert_eq!(
            summary.heart_rate.unwrap().trend,
            TrendDirection::InsufficientData
        );
        // A single day of steps cannot trend either
        assert_eq!(
            summary.steps.unwrap().trend,
            TrendDirection::InsufficientData
        );
    }

    #[test]
    fn test_sleep_quality_scoring() {
        let analyzer = make_analyzer();
        for quality in [
            Some(SleepQualityTag::Good),
            Some(SleepQualityTag::Good),
            Some(SleepQualityTag::Fair),
        ] {
            analyzer.record(make_point(MeasurementValue::SleepDuration {
                hours: 7.5,
                quality,
            }));
        }

        let sleep = analyzer.generate_summary().sleep.unwrap();
        // (3 + 3 + 2) / 3 = 2.67 classifies as good
        assert_eq!(sleep.quality, SleepQualityClass::Good);
        assert!((sleep.average_hours - 7.5).abs() < 0.001);
    }

    #[test]
    fn test_untagged_sleep_is_unknown() {
        let analyzer = make_analyzer();
        analyzer.record(make_point(MeasurementValue::SleepDuration {
            hours: 8.0,
            quality: None,
        }));

        let sleep = analyzer.generate_summary().sleep.unwrap();
        assert_eq!(sleep.quality, SleepQualityClass::Unknown);
    }

    #[test]
    fn test_blood_pressure_average_category() {
        let analyzer = make_analyzer();
        analyzer.record(make_point(MeasurementValue::BloodPressure {
            systolic: 145.0,
            diastolic: 92.0,
        }));
        analyzer.record(make_point(MeasurementValue::BloodPressure {
            systolic: 150.0,
            diastolic: 94.0,
        }));

        let bp = analyzer.generate_summary().blood_pressure.unwrap();
        assert_eq!(bp.category.as_str(), "high");
    }

    #[test]
    fn test_window_eviction() {
        let analyzer = HealthAnalyzer::new(5, 30, 10_000);
        for bpm in 0..10 {
            analyzer.record(make_point(MeasurementValue::HeartRate {
                bpm: 70.0 + f64::from(bpm),
            }));
        }
        assert_eq!(analyzer.window_size(), 5);
    }

    #[test]
    fn test_cache_invalidated_by_new_data() {
        let analyzer = make_analyzer();
        analyzer.record(make_point(MeasurementValue::HeartRate { bpm: 70.0 }));
        let first = analyzer.generate_summary();

        analyzer.record(make_point(MeasurementValue::HeartRate { bpm: 90.0 }));
        let second = analyzer.generate_summary();

        assert_eq!(first.data_point_count, 1);
        assert_eq!(second.data_point_count, 2);
    }

    #[test]
    fn test_depleted_metrics_classify_qi_deficiency() {
        let tcm = assess_tcm(
            Some(&HeartRateSummary {
                average_bpm: 105.0,
                latest_bpm: 104.0,
                trend: TrendDirection::Stable,
            }),
            Some(&SleepSummary {
                average_hours: 5.0,
                quality: SleepQualityClass::Poor,
                trend: TrendDirection::Stable,
            }),
            None,
            Some(ActivityLevel::Sedentary),
            6,
        );

        // 70 - 15 - 10 - 10 = 35
        assert_eq!(tcm.qi_score, 35);
        assert_eq!(tcm.qi_level, QiLevel::Deficient);
        assert_eq!(tcm.constitution, ConstitutionTendency::QiDeficiency);
        assert!(tcm.recommendations.len() >= 2);
    }

    #[test]
    fn test_balanced_metrics_classify_balanced() {
        let tcm = assess_tcm(
            Some(&HeartRateSummary {
                average_bpm: 72.0,
                latest_bpm: 70.0,
                trend: TrendDirection::Stable,
            }),
            Some(&SleepSummary {
                average_hours: 8.0,
                quality: SleepQualityClass::Good,
                trend: TrendDirection::Stable,
            }),
            None,
            Some(ActivityLevel::Active),
            1,
        );

        assert_eq!(tcm.qi_score, 90);
        assert_eq!(tcm.qi_level, QiLevel::Abundant);
        assert_eq!(tcm.constitution, ConstitutionTendency::Balanced);
        assert!(tcm.seasonal_advice.contains("Winter"));
    }

    #[test]
    fn test_seasonal_advice_covers_all_months() {
        for month in 1..=12 {
            assert!(!seasonal_advice(month).is_empty());
        }
        assert!(seasonal_advice(4).contains("Spring"));
        assert!(seasonal_advice(7).contains("Summer"));
        assert!(seasonal_advice(10).contains("Autumn"));
    }
}
