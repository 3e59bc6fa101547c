//! Descriptive statistics over a measurement set.
//!
//! Pure and deterministic: the same input always yields the same
//! [`Statistics`], whatever the iteration order of timestamps.

use chrono::{DateTime, Utc};

use crate::models::{Measurement, Reading, Statistics};

// ---

/// Band half-width, in standard deviations.
pub const THRESHOLD_SIGMAS: f64 = 2.0;

/// A timestamped numeric value the engine can summarize or classify.
pub trait Sample {
    fn created_at(&self) -> DateTime<Utc>;
    fn value(&self) -> f64;
}

impl Sample for Measurement {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn value(&self) -> f64 {
        self.value
    }
}

impl Sample for Reading {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn value(&self) -> f64 {
        self.value
    }
}

/// Compute mean, population variance, ±2σ thresholds and the observed time
/// span. The empty set yields all-zero statistics with no dates.
///
/// Sums run over values scaled by a power of two, so finite input never
/// overflows mid-computation and ordinary input gives bit-identical results.
/// A variance or threshold beyond `f64` range saturates at `±f64::MAX`.
pub fn compute<S: Sample>(samples: &[S]) -> Statistics {
    // ---
    if samples.is_empty() {
        return Statistics::default();
    }

    let n = samples.len() as f64;
    let scale = power_of_two_scale(samples);

    let scaled_mean = samples.iter().map(|s| s.value() / scale).sum::<f64>() / n;
    let scaled_variance = samples
        .iter()
        .map(|s| (s.value() / scale - scaled_mean).powi(2))
        .sum::<f64>()
        / n;

    let mean = scaled_mean * scale;
    let variance = saturate(scaled_variance * scale * scale);
    let std_dev = scaled_variance.sqrt() * scale;

    let start_date = samples.iter().map(Sample::created_at).min();
    let end_date = samples.iter().map(Sample::created_at).max();

    Statistics {
        start_date,
        end_date,
        mean,
        variance,
        upper_threshold: saturate(mean + THRESHOLD_SIGMAS * std_dev),
        lower_threshold: saturate(mean - THRESHOLD_SIGMAS * std_dev),
    }
}

/// Smallest power of two at or above the largest magnitude, capped to the
/// representable range. Dividing by it is exact.
fn power_of_two_scale<S: Sample>(samples: &[S]) -> f64 {
    let max_abs = samples
        .iter()
        .map(|s| s.value().abs())
        .fold(0.0_f64, f64::max);
    if max_abs == 0.0 {
        return 1.0;
    }
    max_abs.log2().ceil().clamp(-1074.0, 1023.0).exp2()
}

fn saturate(x: f64) -> f64 {
    x.clamp(f64::MIN, f64::MAX)
}
