//! Regression Module
//! Ordinary least squares of cumulative deaths on cumulative cases.

use crate::data::RegionalSeries;
use crate::error::{PipelineError, Result};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::fmt;
use tracing::info;

/// Significance threshold used when flagging coefficients in the summary.
pub const SIGNIFICANCE_THRESHOLD: f64 = 0.05;

/// A fitted coefficient with its sampling statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coefficient {
    pub estimate: f64,
    pub std_error: f64,
    pub t_statistic: f64,
    /// Two-sided, under the usual normal-error assumption (not validated).
    pub p_value: f64,
}

impl Coefficient {
    pub fn is_significant(&self) -> bool {
        self.p_value <= SIGNIFICANCE_THRESHOLD
    }
}

/// Result of a single-predictor OLS fit. Computed once; never refit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionResult {
    pub n: usize,
    pub df_residual: usize,
    pub intercept: Coefficient,
    pub slope: Coefficient,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub residual_std_error: f64,
}

impl RegressionResult {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept.estimate + self.slope.estimate * x
    }
}

impl fmt::Display for RegressionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "OLS: cumulative_deaths ~ cumulative_cases")?;
        writeln!(f, "{}", "=".repeat(72))?;
        writeln!(
            f,
            "{:<12}{:>16}{:>16}{:>12}{:>14}",
            "", "coef", "std err", "t", "P>|t|"
        )?;
        writeln!(f, "{}", "-".repeat(72))?;
        for (name, c) in [("intercept", &self.intercept), ("cases", &self.slope)] {
            writeln!(
                f,
                "{:<12}{:>16.6e}{:>16.6e}{:>12.3}{:>14.4e}{}",
                name,
                c.estimate,
                c.std_error,
                c.t_statistic,
                c.p_value,
                if c.is_significant() { " *" } else { "" }
            )?;
        }
        writeln!(f, "{}", "-".repeat(72))?;
        writeln!(
            f,
            "No. observations: {:<8} Df residuals: {}",
            self.n, self.df_residual
        )?;
        writeln!(
            f,
            "R-squared: {:.6}   Adj. R-squared: {:.6}",
            self.r_squared, self.adj_r_squared
        )?;
        write!(f, "Residual std. error: {:.6e}", self.residual_std_error)
    }
}

/// Closed-form OLS on centered data.
pub struct Regressor;

impl Regressor {
    /// Fit deaths ≈ intercept + slope × cases over the whole series.
    pub fn fit(series: &RegionalSeries) -> Result<RegressionResult> {
        let x: Vec<f64> = series
            .cumulative_cases()
            .into_iter()
            .map(|v| v as f64)
            .collect();
        let y: Vec<f64> = series
            .cumulative_deaths()
            .into_iter()
            .map(|v| v as f64)
            .collect();

        let result = Self::fit_xy(&x, &y)?;
        info!(
            region = series.region(),
            n = result.n,
            slope = result.slope.estimate,
            intercept = result.intercept.estimate,
            r_squared = result.r_squared,
            "fitted deaths-on-cases regression"
        );
        Ok(result)
    }

    /// Fit `y ≈ a + b·x`. Pairs with a non-finite member are skipped.
    pub fn fit_xy(x: &[f64], y: &[f64]) -> Result<RegressionResult> {
        if x.len() != y.len() {
            return Err(PipelineError::InsufficientData {
                reason: format!("predictor has {} rows, response has {}", x.len(), y.len()),
            });
        }

        let (xs, ys): (Vec<f64>, Vec<f64>) = x
            .iter()
            .zip(y)
            .filter(|(a, b)| a.is_finite() && b.is_finite())
            .map(|(&a, &b)| (a, b))
            .unzip();

        let n = xs.len();
        if n < 3 {
            return Err(PipelineError::InsufficientData {
                reason: format!("{n} usable rows, need at least 3"),
            });
        }
        if xs.iter().all(|&v| v == xs[0]) {
            return Err(PipelineError::InsufficientData {
                reason: "predictor is constant; slope undefined".to_string(),
            });
        }

        let nf = n as f64;
        let x_mean = xs.iter().sum::<f64>() / nf;
        let y_mean = ys.iter().sum::<f64>() / nf;

        // Centered sums; cases span several orders of magnitude.
        let mut sxx = 0.0;
        let mut sxy = 0.0;
        let mut syy = 0.0;
        for (&a, &b) in xs.iter().zip(&ys) {
            let dx = a - x_mean;
            let dy = b - y_mean;
            sxx += dx * dx;
            sxy += dx * dy;
            syy += dy * dy;
        }

        let slope = sxy / sxx;
        let intercept = y_mean - slope * x_mean;

        let sse: f64 = xs
            .iter()
            .zip(&ys)
            .map(|(&a, &b)| (b - (intercept + slope * a)).powi(2))
            .sum();

        let df_residual = n - 2;
        let dof = df_residual as f64;
        let sigma2 = sse / dof;

        let r_squared = if syy == 0.0 { 1.0 } else { 1.0 - sse / syy };
        let adj_r_squared = 1.0 - (1.0 - r_squared) * (nf - 1.0) / dof;

        let se_slope = (sigma2 / sxx).sqrt();
        let se_intercept = (sigma2 * (1.0 / nf + x_mean * x_mean / sxx)).sqrt();

        Ok(RegressionResult {
            n,
            df_residual,
            intercept: Self::coefficient(intercept, se_intercept, dof),
            slope: Self::coefficient(slope, se_slope, dof),
            r_squared,
            adj_r_squared,
            residual_std_error: sigma2.sqrt(),
        })
    }

    fn coefficient(estimate: f64, std_error: f64, dof: f64) -> Coefficient {
        let t_statistic = if std_error == 0.0 {
            if estimate == 0.0 {
                f64::NAN
            } else {
                f64::INFINITY.copysign(estimate)
            }
        } else {
            estimate / std_error
        };

        Coefficient {
            estimate,
            std_error,
            t_statistic,
            p_value: Self::two_sided_p_value(t_statistic, dof),
        }
    }

    fn two_sided_p_value(t: f64, dof: f64) -> f64 {
        if t.is_nan() {
            return f64::NAN;
        }
        if t.is_infinite() {
            return 0.0;
        }
        match StudentsT::new(0.0, 1.0, dof) {
            Ok(dist) => (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0),
            Err(_) => f64::NAN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_perfect_linear_fit() {
        let cases: Vec<f64> = vec![
            0.0, 12.0, 150.0, 3_400.0, 51_000.0, 790_000.0, 2_600_000.0, 8_100_000.0,
        ];
        let deaths: Vec<f64> = cases.iter().map(|c| 2.0 + 0.01 * c).collect();

        let fit = Regressor::fit_xy(&cases, &deaths).unwrap();
        assert_eq!(fit.n, 8);
        assert_eq!(fit.df_residual, 6);
        assert_relative_eq!(fit.slope.estimate, 0.01, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.intercept.estimate, 2.0, epsilon = 1e-6);
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.predict(1000.0), 12.0, epsilon = 1e-6);
    }

    #[test]
    fn test_noisy_fit_matches_reference() {
        // y = 1 + 2x with residuals [0.5, -0.5, -0.5, 0.5]
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [3.5, 4.5, 6.5, 9.5];

        let fit = Regressor::fit_xy(&x, &y).unwrap();
        // SSE = 1, Sxx = 5, SST = 21
        assert_relative_eq!(fit.slope.estimate, 2.0, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept.estimate, 1.0, epsilon = 1e-12);
        assert_relative_eq!(fit.residual_std_error, 0.5f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(fit.slope.std_error, 0.1f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(fit.r_squared, 0.952_380_952_380_952_4, epsilon = 1e-12);
        assert!(fit.slope.p_value > 0.0 && fit.slope.p_value < 0.05);
        assert!(fit.slope.is_significant());
    }

    #[test]
    fn test_too_few_rows() {
        let err = Regressor::fit_xy(&[1.0, 2.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData { .. }));
    }

    #[test]
    fn test_constant_predictor() {
        let err = Regressor::fit_xy(&[5.0, 5.0, 5.0, 5.0], &[1.0, 2.0, 3.0, 4.0]).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData { .. }));
    }

    #[test]
    fn test_non_finite_rows_excluded() {
        let x = [1.0, f64::NAN, 2.0, 3.0];
        let y = [2.0, 4.0, 4.0, 6.0];
        let fit = Regressor::fit_xy(&x, &y).unwrap();
        assert_eq!(fit.n, 3);
        assert_relative_eq!(fit.slope.estimate, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_summary_mentions_coefficients() {
        let fit = Regressor::fit_xy(&[1.0, 2.0, 3.0, 4.0], &[3.5, 4.5, 6.5, 9.5]).unwrap();
        let text = fit.to_string();
        assert!(text.contains("intercept"));
        assert!(text.contains("R-squared"));
    }
}
