//! Statistics Calculator Module
//! Descriptive statistics and histogram binning over daily values.

use serde::Serialize;

/// Descriptive statistics for a set of values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
    pub p95: f64,
    pub p05: f64,
}

impl Default for SummaryStats {
    fn default() -> Self {
        Self {
            count: 0,
            mean: f64::NAN,
            median: f64::NAN,
            std: f64::NAN,
            variance: f64::NAN,
            min: f64::NAN,
            max: f64::NAN,
            p95: f64::NAN,
            p05: f64::NAN,
        }
    }
}

/// One histogram bucket, `[lower, upper)` except the last which is closed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Handles statistical calculations.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Descriptive statistics over the finite values of a slice.
    pub fn compute_descriptive_stats(values: &[f64]) -> SummaryStats {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return SummaryStats::default();
        }
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let variance = match count {
            1 => 0.0,
            _ => sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (count - 1) as f64,
        };

        SummaryStats {
            count,
            mean,
            median: Self::quantile(&sorted, 0.5),
            std: variance.sqrt(),
            variance,
            min: sorted[0],
            max: sorted[count - 1],
            p95: Self::quantile(&sorted, 0.95),
            p05: Self::quantile(&sorted, 0.05),
        }
    }

    /// Descriptive statistics over the defined cells of an optional column.
    pub fn describe_defined(values: &[Option<i64>]) -> SummaryStats {
        let defined: Vec<f64> = values.iter().flatten().map(|&v| v as f64).collect();
        Self::compute_descriptive_stats(&defined)
    }

    /// Linear-interpolated quantile of a sorted, non-empty slice (NumPy's default).
    fn quantile(sorted: &[f64], q: f64) -> f64 {
        let pos = q * (sorted.len() - 1) as f64;
        let below = pos.floor() as usize;
        let above = pos.ceil() as usize;
        sorted[below] + (sorted[above] - sorted[below]) * (pos - below as f64)
    }

    /// Equal-width histogram over `[min, max]` with `bins` buckets.
    pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() || bins == 0 {
            return Vec::new();
        }

        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        // All-equal input collapses to one unit-wide bucket.
        if max == min {
            return vec![HistogramBin {
                lower: min - 0.5,
                upper: max + 0.5,
                count: finite.len(),
            }];
        }

        let width = (max - min) / bins as f64;
        let mut out: Vec<HistogramBin> = (0..bins)
            .map(|i| HistogramBin {
                lower: min + i as f64 * width,
                upper: if i + 1 == bins {
                    max
                } else {
                    min + (i + 1) as f64 * width
                },
                count: 0,
            })
            .collect();

        for v in finite {
            let idx = (((v - min) / width) as usize).min(bins - 1);
            out[idx].count += 1;
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_descriptive_stats() {
        let stats = StatsCalculator::compute_descriptive_stats(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(stats.count, 4);
        assert_relative_eq!(stats.mean, 2.5);
        assert_relative_eq!(stats.median, 2.5);
        assert_relative_eq!(stats.variance, 5.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(stats.min, 1.0);
        assert_relative_eq!(stats.max, 4.0);
        // NumPy: np.percentile([1, 2, 3, 4], 95) == 3.85
        assert_relative_eq!(stats.p95, 3.85, epsilon = 1e-12);
        assert_relative_eq!(stats.p05, 1.15, epsilon = 1e-12);
    }

    #[test]
    fn test_descriptive_stats_skip_non_finite() {
        let stats = StatsCalculator::compute_descriptive_stats(&[5.0, f64::NAN, 1.0, 3.0]);
        assert_eq!(stats.count, 3);
        assert_relative_eq!(stats.median, 3.0);
        assert_relative_eq!(stats.min, 1.0);
        assert_relative_eq!(stats.max, 5.0);
    }

    #[test]
    fn test_empty_stats_are_nan() {
        let stats = StatsCalculator::compute_descriptive_stats(&[]);
        assert_eq!(stats.count, 0);
        assert!(stats.mean.is_nan());
    }

    #[test]
    fn test_describe_defined_skips_missing() {
        let stats = StatsCalculator::describe_defined(&[None, Some(2), Some(4), None]);
        assert_eq!(stats.count, 2);
        assert_relative_eq!(stats.mean, 3.0);
    }

    #[test]
    fn test_histogram_counts_every_value() {
        let values = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 10.0];
        let bins = StatsCalculator::histogram(&values, 5);
        assert_eq!(bins.len(), 5);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), values.len());
        assert_relative_eq!(bins[0].lower, 0.0);
        assert_relative_eq!(bins[4].upper, 10.0);
        // max lands in the last (closed) bucket
        assert_eq!(bins[4].count, 2);
    }

    #[test]
    fn test_histogram_constant_values() {
        let bins = StatsCalculator::histogram(&[3.0, 3.0, 3.0], 4);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].count, 3);
    }
}
