//! Outlier classification against a reference [`Statistics`] value.
//!
//! The reference statistics may come from a different set than the one being
//! classified; choosing the baseline is the caller's job.

use crate::models::{Measurement, Statistics};

// ---

/// Strictly outside the threshold band. A value on a threshold is not an outlier.
pub fn is_outlier(value: f64, stats: &Statistics) -> bool {
    value > stats.upper_threshold || value < stats.lower_threshold
}

/// Every measurement, with `is_outlier` recomputed against `stats`.
pub fn classify(measurements: Vec<Measurement>, stats: &Statistics) -> Vec<Measurement> {
    measurements
        .into_iter()
        .map(|m| Measurement {
            is_outlier: is_outlier(m.value, stats),
            ..m
        })
        .collect()
}

/// Only the measurements outside the band, in input order.
pub fn filter_outliers(measurements: Vec<Measurement>, stats: &Statistics) -> Vec<Measurement> {
    measurements
        .into_iter()
        .filter(|m| is_outlier(m.value, stats))
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::engine::statistics::compute;
    use chrono::{TimeZone, Utc};

    fn series(values: &[f64]) -> Vec<Measurement> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Measurement {
                created_at: Utc.with_ymd_and_hms(2025, 5, 1, 9, i as u32, 0).unwrap(),
                value: *v,
                is_outlier: false,
            })
            .collect()
    }

    fn band(lower: f64, upper: f64) -> Statistics {
        Statistics {
            lower_threshold: lower,
            upper_threshold: upper,
            ..Statistics::default()
        }
    }

    #[test]
    fn test_threshold_boundaries_are_exclusive() {
        // ---
        let stats = band(10.0, 20.0);
        assert!(!is_outlier(10.0, &stats));
        assert!(!is_outlier(20.0, &stats));
        assert!(is_outlier(20.000001, &stats));
        assert!(is_outlier(9.999999, &stats));
    }

    #[test]
    fn test_classify_keeps_every_measurement() {
        // ---
        let stats = band(10.0, 20.0);
        let mut input = series(&[5.0, 15.0, 25.0]);
        input[1].is_outlier = true; // stale flag gets overwritten

        let classified = classify(input, &stats);
        let flags: Vec<bool> = classified.iter().map(|m| m.is_outlier).collect();
        assert_eq!(flags, vec![true, false, true]);
    }

    #[test]
    fn test_filter_returns_subset_in_order() {
        // ---
        let stats = band(10.0, 20.0);
        let outliers = filter_outliers(series(&[25.0, 15.0, 5.0]), &stats);
        let values: Vec<f64> = outliers.iter().map(|m| m.value).collect();
        assert_eq!(values, vec![25.0, 5.0]);
    }

    #[test]
    fn test_three_point_set_has_no_outliers() {
        // ---
        let data = series(&[20.0, 25.0, 30.0]);
        let stats = compute(&data);
        assert!(classify(data.clone(), &stats).iter().all(|m| !m.is_outlier));
        assert!(filter_outliers(data, &stats).is_empty());
    }

    #[test]
    fn test_spike_among_stable_readings() {
        // ---
        let data = series(&[20.0, 21.0, 22.0, 23.0, 20.0, 21.0, 22.0, 23.0, 1000.0]);
        let stats = compute(&data);

        let outliers = filter_outliers(data.clone(), &stats);
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].value, 1000.0);

        let classified = classify(data, &stats);
        assert_eq!(classified.iter().filter(|m| m.is_outlier).count(), 1);
    }

    #[test]
    fn test_five_point_spike_sits_just_inside_band() {
        // ---
        // With N = 5 a single extreme value is at most 4/sqrt(5) sigma away
        // from the mean, so it cannot cross a 2 sigma band.
        let data = series(&[20.0, 21.0, 22.0, 23.0, 1000.0]);
        let stats = compute(&data);
        assert!((stats.mean - 217.2).abs() < 1e-9);
        assert!(stats.upper_threshold > 1000.0);
        assert!(filter_outliers(data, &stats).is_empty());
    }

    #[test]
    fn test_classify_is_idempotent() {
        // ---
        let data = series(&[1.0, 2.0, 3.0, 50.0, 2.0, 1.0, 3.0, 2.0]);
        let stats = compute(&data);
        let once = classify(data, &stats);
        let twice = classify(once.clone(), &stats);
        assert_eq!(once, twice);
    }
}
