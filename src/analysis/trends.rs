//! Trend computation
//!
//! Compares the mean of the most recent samples against the mean of the
//! preceding samples. A change larger than a fixed absolute delta in either
//! direction classifies as increasing/decreasing; otherwise stable. Fewer
//! than two samples yields the `insufficient_data` sentinel, never an error.

use crate::types::TrendDirection;

/// Number of most-recent samples in the comparison window
pub const RECENT_WINDOW: usize = 7;

/// Absolute delta (bpm) before a heart-rate trend counts as directional
pub const HEART_RATE_DELTA: f64 = 5.0;
/// Absolute delta (steps/day) before a step trend counts as directional
pub const STEPS_DELTA: f64 = 500.0;
/// Absolute delta (hours) before a sleep trend counts as directional
pub const SLEEP_DELTA: f64 = 0.5;
/// Absolute delta (kg) before a weight trend counts as directional
pub const WEIGHT_DELTA: f64 = 0.5;

/// Classify the direction of a chronologically ordered series.
///
/// The series splits into the most recent [`RECENT_WINDOW`] samples and
/// everything before them; for short series the split still leaves at least
/// one sample on each side.
pub fn compute_trend(values: &[f64], delta: f64) -> TrendDirection {
    if values.len() < 2 {
        return TrendDirection::InsufficientData;
    }

    let split = values.len().saturating_sub(RECENT_WINDOW).max(1);
    let prior_mean = mean(&values[..split]);
    let recent_mean = mean(&values[split..]);

    let change = recent_mean - prior_mean;
    if change > delta {
        TrendDirection::Increasing
    } else if change < -delta {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
