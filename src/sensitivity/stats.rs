//! Descriptive statistics over Monte Carlo outcomes.

use serde::{Deserialize, Serialize};

/// Nearest-rank percentile (0..=100, clamped) of ascending `sorted_values`.
pub fn value_sorted<T: Copy>(sorted_values: &[T], percentile: f64) -> Option<T> {
    let last = sorted_values.len().checked_sub(1)?;
    let rank = (percentile.clamp(0.0, 100.0) / 100.0 * last as f64).round() as usize;
    sorted_values.get(rank.min(last)).copied()
}

/// Returns a sorted copy of `values`.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; zero for fewer than two values.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() as f64 - 1.0)).sqrt()
}

/// Shape of one outcome across trials.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub p5: f64,
    pub p50: f64,
    pub p95: f64,
    pub max: f64,
    /// `std_dev / sqrt(n)`; shrinks as the trial count grows.
    pub standard_error: f64,
}

impl DistributionSummary {
    /// Summarizes `values`, or `None` when empty.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let s = sorted(values);
        let std_dev = std_dev(&s);
        Some(Self {
            mean: mean(&s),
            std_dev,
            min: *s.first()?,
            p5: value_sorted(&s, 5.0)?,
            p50: value_sorted(&s, 50.0)?,
            p95: value_sorted(&s, 95.0)?,
            max: *s.last()?,
            standard_error: std_dev / (s.len() as f64).sqrt(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_sorted_handles_edges() {
        let values: [f64; 0] = [];
        assert_eq!(value_sorted(&values, 50.0), None);

        let values = [10, 20, 30];
        assert_eq!(value_sorted(&values, -1.0), Some(10));
        assert_eq!(value_sorted(&values, 100.0), Some(30));
        assert_eq!(value_sorted(&values, 1000.0), Some(30));
    }

    #[test]
    fn value_sorted_uses_rounded_position() {
        // len=5 => position = p/100 * 4
        let values = [0, 1, 2, 3, 4];
        assert_eq!(value_sorted(&values, 25.0), Some(1));
        assert_eq!(value_sorted(&values, 50.0), Some(2));
        assert_eq!(value_sorted(&values, 2.5), Some(0));
        assert_eq!(value_sorted(&values, 97.5), Some(4));
    }

    #[test]
    fn summary_of_known_values() {
        let s = DistributionSummary::from_values(&[4.0, 2.0, 8.0, 6.0]).unwrap();
        assert_eq!(s.mean, 5.0);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 8.0);
        let sd = (20.0_f64 / 3.0).sqrt();
        assert!((s.std_dev - sd).abs() < 1e-12);
        assert!((s.standard_error - sd / 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_and_single_values() {
        assert_eq!(DistributionSummary::from_values(&[]), None);
        let s = DistributionSummary::from_values(&[3.0]).unwrap();
        assert_eq!(s.std_dev, 0.0);
        assert_eq!(s.p5, 3.0);
        assert_eq!(s.p95, 3.0);
    }
}
