use serde::Serialize;

/// Out-of-sample error of a regressor on the test split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub rmse: f64,
    /// Coefficient of determination; 0.0 when the targets have no variance
    pub r2: f64,
    pub samples: usize,
}

impl RegressionMetrics {
    /// Returns `None` for empty or mismatched inputs.
    pub fn compute(predictions: &[f64], actuals: &[f64]) -> Option<Self> {
        if predictions.is_empty() || predictions.len() != actuals.len() {
            return None;
        }

        let n = predictions.len() as f64;
        let sq_err: f64 = predictions
            .iter()
            .zip(actuals)
            .map(|(p, t)| (p - t).powi(2))
            .sum();
        let abs_err: f64 = predictions
            .iter()
            .zip(actuals)
            .map(|(p, t)| (p - t).abs())
            .sum();

        let mean_y = actuals.iter().sum::<f64>() / n;
        let var_y = actuals.iter().map(|t| (t - mean_y).powi(2)).sum::<f64>() / n;
        let mse = sq_err / n;
        let r2 = if var_y > 0.0 { 1.0 - mse / var_y } else { 0.0 };

        Some(Self {
            mae: abs_err / n,
            rmse: mse.sqrt(),
            r2,
            samples: predictions.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let y = vec![1.0, 2.0, 3.0];
        let m = RegressionMetrics::compute(&y, &y).unwrap();
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert!((m.r2 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_known_errors() {
        let pred = vec![2.0, 2.0, 2.0, 2.0];
        let actual = vec![1.0, 3.0, 1.0, 3.0];
        let m = RegressionMetrics::compute(&pred, &actual).unwrap();
        assert!((m.mae - 1.0).abs() < 1e-12);
        assert!((m.rmse - 1.0).abs() < 1e-12);
        // Predicting the mean explains nothing
        assert!(m.r2.abs() < 1e-12);
        assert_eq!(m.samples, 4);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(RegressionMetrics::compute(&[], &[]).is_none());
        assert!(RegressionMetrics::compute(&[1.0], &[1.0, 2.0]).is_none());
    }
}
