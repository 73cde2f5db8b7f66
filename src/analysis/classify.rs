//! Single-point clinical classification
//!
//! Applies fixed clinical-style thresholds to one measurement and pairs the
//! classification with two deliberately distinct voices: an evidence-based
//! plain-language recommendation and a TCM interpretation. The two are
//! never merged.
//!
//! Thresholds here are screening defaults, not clinically validated
//! cutoffs.

use crate::types::{
    AnalysisResult, BloodPressureCategory, MeasurementType, MeasurementValue, Severity,
};

/// Resting heart rate below this is classified as bradycardia (bpm)
pub const BRADYCARDIA_BPM: f64 = 60.0;
/// Resting heart rate above this is classified as tachycardia (bpm)
pub const TACHYCARDIA_BPM: f64 = 100.0;
/// Sleep duration band classified as good (hours)
pub const GOOD_SLEEP_HOURS: std::ops::RangeInclusive<f64> = 7.0..=9.0;
/// Blood oxygen below this is classified as low (percent)
pub const LOW_SPO2_PCT: f64 = 90.0;
/// Body temperature band classified as normal (celsius)
pub const NORMAL_TEMP_C: std::ops::RangeInclusive<f64> = 36.1..=37.2;

/// Classify a single measurement value
pub fn classify(value: &MeasurementValue, daily_step_goal: u32) -> AnalysisResult {
    match value {
        MeasurementValue::HeartRate { bpm } => classify_heart_rate(*bpm),
        MeasurementValue::Steps { count } => classify_steps(*count, daily_step_goal),
        MeasurementValue::SleepDuration { hours, .. } => classify_sleep(*hours),
        MeasurementValue::Weight { .. } => classify_weight(),
        MeasurementValue::BloodPressure {
            systolic,
            diastolic,
        } => classify_blood_pressure(*systolic, *diastolic),
        MeasurementValue::Temperature { celsius } => classify_temperature(*celsius),
        MeasurementValue::BloodOxygen { percentage } => classify_blood_oxygen(*percentage),
    }
}

/// Stage a blood pressure reading into its clinical category
pub fn blood_pressure_category(systolic: f64, diastolic: f64) -> BloodPressureCategory {
    if systolic > 180.0 || diastolic > 120.0 {
        BloodPressureCategory::Crisis
    } else if systolic >= 140.0 || diastolic >= 90.0 {
        BloodPressureCategory::High
    } else if systolic >= 130.0 || diastolic >= 80.0 {
        BloodPressureCategory::Elevated
    } else {
        BloodPressureCategory::Normal
    }
}

fn classify_heart_rate(bpm: f64) -> AnalysisResult {
    let (label, severity, recommendation, tcm) = if bpm < BRADYCARDIA_BPM {
        (
            "bradycardia",
            Severity::Attention,
            "Resting heart rate is below 60 bpm. If you are not an endurance \
             athlete, consider discussing this with a clinician.",
            "A slow, deep pulse suggests heart yang may be insufficient to \
             propel the blood; warming and tonifying approaches apply.",
        )
    } else if bpm > TACHYCARDIA_BPM {
        (
            "tachycardia",
            Severity::Warning,
            "Resting heart rate is above 100 bpm. Reduce stimulants, rest, \
             and seek medical advice if it persists.",
            "A rapid pulse points to heat agitating the heart, often from \
             yin deficiency allowing internal fire to rise.",
        )
    } else {
        (
            "normal",
            Severity::Normal,
            "Resting heart rate is within the typical 60-100 bpm range.",
            "The pulse is even and moderate, a sign that heart qi and blood \
             are circulating in harmony.",
        )
    };

    make_result(MeasurementType::HeartRate, label, severity, recommendation, tcm)
}

fn classify_steps(count: u32, daily_step_goal: u32) -> AnalysisResult {
    let goal = f64::from(daily_step_goal);
    let progress = f64::from(count) / goal;

    let (label, severity, recommendation, tcm) = if progress >= 1.0 {
        (
            "goal_met",
            Severity::Normal,
            "Daily step goal reached. Keep the routine going.",
            "Regular movement keeps qi and blood flowing freely through the \
             channels; stagnation finds no foothold.",
        )
    } else if progress >= 0.5 {
        (
            "on_track",
            Severity::Normal,
            "More than half of the daily step goal is done; a short walk \
             would close the gap.",
            "Moderate activity supports spleen qi in transforming and \
             transporting; continue at an unforced pace.",
        )
    } else {
        (
            "low_activity",
            Severity::Attention,
            "Step count is well below the daily goal. Try adding short \
             walks through the day.",
            "Prolonged stillness lets qi stagnate and dampness settle; \
             gentle, frequent movement restores flow.",
        )
    };

    make_result(MeasurementType::Steps, label, severity, recommendation, tcm)
}

fn classify_sleep(hours: f64) -> AnalysisResult {
    let (label, severity, recommendation, tcm) = if GOOD_SLEEP_HOURS.contains(&hours) {
        (
            "good",
            Severity::Normal,
            "Sleep duration is within the recommended 7-9 hour range.",
            "Restful night sleep anchors the shen in the heart and allows \
             the blood to return to the liver for renewal.",
        )
    } else if hours < *GOOD_SLEEP_HOURS.start() {
        (
            "short",
            Severity::Attention,
            "Sleep duration is under 7 hours. Aim for an earlier, regular \
             bedtime.",
            "Short or broken sleep suggests heart blood is too scant to \
             house the shen; nourishment and quiet evenings help.",
        )
    } else {
        (
            "long",
            Severity::Attention,
            "Sleep duration is over 9 hours. Very long sleep with daytime \
             fatigue is worth mentioning to a clinician.",
            "Excessive sleep with heaviness can indicate dampness \
             encumbering the spleen and muffling clear yang.",
        )
    };

    make_result(MeasurementType::SleepDuration, label, severity, recommendation, tcm)
}

fn classify_weight() -> AnalysisResult {
    make_result(
        MeasurementType::Weight,
        "recorded",
        Severity::Normal,
        "Weight recorded. Interpret changes as a trend over weeks rather \
         than single readings.",
        "Body weight reflects the spleen's transformation of food essence; \
         steady readings suggest balanced digestion.",
    )
}

fn classify_blood_pressure(systolic: f64, diastolic: f64) -> AnalysisResult {
    let category = blood_pressure_category(systolic, diastolic);
    let (severity, recommendation, tcm) = match category {
        BloodPressureCategory::Crisis => (
            Severity::Warning,
            "Blood pressure is in the crisis range. Seek medical attention \
             immediately.",
            "Liver yang has risen violently, carrying wind and fire upward; \
             this requires urgent attention alongside any medical care.",
        ),
        BloodPressureCategory::High => (
            Severity::Warning,
            "Blood pressure is 140/90 or above. Reduce salt intake and \
             arrange a clinical review.",
            "Ascendant liver yang with underlying yin deficiency drives \
             pressure upward; calming the liver and nourishing yin is the \
             traditional approach.",
        ),
        BloodPressureCategory::Elevated => (
            Severity::Attention,
            "Blood pressure is mildly elevated (130/80 or above). Watch the \
             trend and favor lifestyle measures.",
            "Early stirring of liver yang, often from strain or constrained \
             emotion; soothing the liver and easing tension is advised.",
        ),
        BloodPressureCategory::Normal => (
            Severity::Normal,
            "Blood pressure is within the normal range.",
            "Yin and yang are holding each other in balance; the vessels \
             are neither taut nor slack.",
        ),
    };

    make_result(
        MeasurementType::BloodPressure,
        category.as_str(),
        severity,
        recommendation,
        tcm,
    )
}

fn classify_temperature(celsius: f64) -> AnalysisResult {
    let (label, severity, recommendation, tcm) = if celsius > *NORMAL_TEMP_C.end() {
        (
            "elevated",
            Severity::Attention,
            "Body temperature is above the normal range. Rest, hydrate, and \
             monitor for fever.",
            "Heat in the exterior or interior is contending with the \
             body's upright qi; cooling and rest support the defense.",
        )
    } else if celsius < *NORMAL_TEMP_C.start() {
        (
            "low",
            Severity::Attention,
            "Body temperature is below the normal range. Warm up and \
             re-measure.",
            "Coolness of the body hints at yang qi too weak to warm the \
             surface; protect against cold and favor warm foods.",
        )
    } else {
        (
            "normal",
            Severity::Normal,
            "Body temperature is within the normal range.",
            "Warmth is evenly distributed, showing yang qi steaming and \
             spreading as it should.",
        )
    };

    make_result(MeasurementType::Temperature, label, severity, recommendation, tcm)
}

fn classify_blood_oxygen(percentage: f64) -> AnalysisResult {
    let (label, severity, recommendation, tcm) = if percentage < LOW_SPO2_PCT {
        (
            "low",
            Severity::Warning,
            "Blood oxygen saturation is below 90%. Seek medical advice \
             promptly.",
            "Lung qi is failing to govern the breath and grasp the clear; \
             the zong qi gathering in the chest is depleted.",
        )
    } else if percentage < 95.0 {
        (
            "borderline",
            Severity::Attention,
            "Blood oxygen saturation is slightly reduced. Re-measure at \
             rest; consult a clinician if it stays low.",
            "The lung's diffusing function is mildly constrained; breathing \
             exercises that lengthen the exhale can help.",
        )
    } else {
        (
            "normal",
            Severity::Normal,
            "Blood oxygen saturation is within the normal range.",
            "Lung qi descends and disperses freely, and the breath nourishes \
             all the zang organs.",
        )
    };

    make_result(MeasurementType::BloodOxygen, label, severity, recommendation, tcm)
}

fn make_result(
    measurement_type: MeasurementType,
    label: &str,
    severity: Severity,
    recommendation: &str,
    tcm: &str,
) -> AnalysisResult {
    AnalysisResult {
        measurement_type,
        classification: label.to_string(),
        severity,
        recommendation: recommendation.to_string(),
        tcm_interpretation: tcm.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heart_rate_thresholds() {
        let low = classify(&MeasurementValue::HeartRate { bpm: 52.0 }, 10_000);
        assert_eq!(low.classification, "bradycardia");

        let high = classify(&MeasurementValue::HeartRate { bpm: 112.0 }, 10_000);
        assert_eq!(high.classification, "tachycardia");
        assert_eq!(high.severity, Severity::Warning);

        let normal = classify(&MeasurementValue::HeartRate { bpm: 72.0 }, 10_000);
        assert_eq!(normal.classification, "normal");
        assert_eq!(normal.severity, Severity::Normal);
    }

    #[test]
    fn test_blood_pressure_staging() {
        assert_eq!(
            blood_pressure_category(118.0, 76.0),
            BloodPressureCategory::Normal
        );
        assert_eq!(
            blood_pressure_category(132.0, 78.0),
            BloodPressureCategory::Elevated
        );
        assert_eq!(
            blood_pressure_category(126.0, 84.0),
            BloodPressureCategory::Elevated
        );
        assert_eq!(
            blood_pressure_category(145.0, 92.0),
            BloodPressureCategory::High
        );
        assert_eq!(
            blood_pressure_category(190.0, 95.0),
            BloodPressureCategory::Crisis
        );
    }

    #[test]
    fn test_high_blood_pressure_has_two_distinct_voices() {
        let result = classify(
            &MeasurementValue::BloodPressure {
                systolic: 145.0,
                diastolic: 92.0,
            },
            10_000,
        );

        assert_eq!(result.classification, "high");
        assert!(!result.tcm_interpretation.is_empty());
        assert!(!result.recommendation.is_empty());
        assert_ne!(result.tcm_interpretation, result.recommendation);
    }

    #[test]
    fn test_sleep_bands() {
        assert_eq!(
            classify(
                &MeasurementValue::SleepDuration {
                    hours: 7.5,
                    quality: None
                },
                10_000
            )
            .classification,
            "good"
        );
        assert_eq!(
            classify(
                &MeasurementValue::SleepDuration {
                    hours: 5.0,
                    quality: None
                },
                10_000
            )
            .classification,
            "short"
        );
        assert_eq!(
            classify(
                &MeasurementValue::SleepDuration {
                    hours: 10.5,
                    quality: None
                },
                10_000
            )
            .classification,
            "long"
        );
    }

    #[test]
    fn test_steps_against_goal() {
        let met = classify(&MeasurementValue::Steps { count: 12_000 }, 10_000);
        assert_eq!(met.classification, "goal_met");

        let low = classify(&MeasurementValue::Steps { count: 1_800 }, 10_000);
        assert_eq!(low.classification, "low_activity");
        assert_eq!(low.severity, Severity::Attention);
    }

    #[test]
    fn test_blood_oxygen_low_is_warning() {
        let result = classify(&MeasurementValue::BloodOxygen { percentage: 88.0 }, 10_000);
        assert_eq!(result.classification, "low");
        assert_eq!(result.severity, Severity::Warning);
    }
}
