//! Median imputation followed by standardization.

use serde::{Deserialize, Serialize};

/// Frozen statistics for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    pub name: String,
    /// Fill value for missing entries.
    pub median: f64,
    /// Mean of the imputed column.
    pub mean: f64,
    /// Population standard deviation of the imputed column, 1.0 when zero.
    pub scale: f64,
}

impl NumericColumn {
    /// Fit on the observed values of one column.
    ///
    /// Statistics are computed on sorted values so the result does not depend
    /// on row order. A column with no observed value imputes 0.0.
    pub fn fit(name: &str, values: &[Option<f64>]) -> Self {
        let mut observed: Vec<f64> = values.iter().flatten().copied().collect();
        observed.sort_by(f64::total_cmp);
        let median = median_of_sorted(&observed).unwrap_or(0.0);

        let missing = values.len() - observed.len();
        let mut imputed = observed;
        imputed.extend(std::iter::repeat_n(median, missing));
        imputed.sort_by(f64::total_cmp);

        let (mean, std) = mean_and_std(&imputed);
        let scale = if std > 0.0 && std.is_finite() { std } else { 1.0 };

        Self {
            name: name.to_string(),
            median,
            mean,
            scale,
        }
    }

    /// Impute then standardize a single value.
    pub fn apply(&self, value: Option<f64>) -> f64 {
        (value.unwrap_or(self.median) - self.mean) / self.scale
    }
}

fn median_of_sorted(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let mid = n / 2;
    Some(if n % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median_of_sorted(&[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(median_of_sorted(&[1.0, 2.0, 3.0, 10.0]), Some(2.5));
        assert_eq!(median_of_sorted(&[]), None);
    }

    #[test]
    fn fit_imputes_median_then_scales() {
        let col = NumericColumn::fit("edad", &[Some(20.0), None, Some(30.0), Some(25.0)]);
        assert_eq!(col.median, 25.0);
        // imputed column: 20, 25, 25, 30
        assert!((col.mean - 25.0).abs() < 1e-12);
        let expected_std = (50.0_f64 / 4.0).sqrt();
        assert!((col.scale - expected_std).abs() < 1e-12);

        assert!((col.apply(None) - 0.0).abs() < 1e-12);
        assert!((col.apply(Some(30.0)) - 5.0 / expected_std).abs() < 1e-12);
    }

    #[test]
    fn constant_column_scales_by_one() {
        let col = NumericColumn::fit("entrena", &[Some(1.0), Some(1.0), None]);
        assert_eq!(col.scale, 1.0);
        assert_eq!(col.apply(Some(3.0)), 2.0);
    }

    #[test]
    fn empty_column_imputes_zero() {
        let col = NumericColumn::fit("posicion", &[None, None]);
        assert_eq!(col.median, 0.0);
        assert_eq!(col.mean, 0.0);
        assert_eq!(col.scale, 1.0);
        assert_eq!(col.apply(None), 0.0);
    }

    #[test]
    fn fit_is_order_independent() {
        let a = NumericColumn::fit("peso", &[Some(0.1), Some(70.3), None, Some(1e6), Some(3.3)]);
        let b = NumericColumn::fit("peso", &[Some(3.3), None, Some(1e6), Some(70.3), Some(0.1)]);
        assert_eq!(a, b);
    }
}
