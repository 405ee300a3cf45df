//! The column transform applied to every feature vector before classification.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use injuryclass_features::{
    CATEGORICAL_COUNT, CATEGORICAL_FIELDS, FeatureVector, NUMERIC_COUNT, NUMERIC_FIELDS,
};
use injuryclass_shared::{InjuryClassError, Result};

use crate::categorical::CategoricalColumn;
use crate::numeric::NumericColumn;

/// Fitted preprocessing: one numeric block followed by one one-hot block per
/// categorical column. Immutable after [`fit`](Self::fit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTransform {
    numeric: Vec<NumericColumn>,
    categorical: Vec<CategoricalColumn>,
}

impl FittedTransform {
    /// Capture imputation, scaling and vocabulary statistics from `samples`.
    #[instrument(skip_all, fields(samples = samples.len()))]
    pub fn fit(samples: &[&FeatureVector]) -> Result<Self> {
        if samples.is_empty() {
            return Err(InjuryClassError::validation(
                "cannot fit preprocessing on an empty sample set",
            ));
        }

        let numeric = NUMERIC_FIELDS
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let column: Vec<Option<f64>> = samples.iter().map(|s| s.numeric()[i]).collect();
                NumericColumn::fit(name, &column)
            })
            .collect();

        let categorical = CATEGORICAL_FIELDS
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let column: Vec<Option<String>> =
                    samples.iter().map(|s| s.categorical()[i].clone()).collect();
                CategoricalColumn::fit(name, &column)
            })
            .collect();

        let fitted = Self {
            numeric,
            categorical,
        };
        debug!(width = fitted.output_width(), "preprocessing fitted");
        Ok(fitted)
    }

    /// Number of values [`transform`](Self::transform) produces.
    pub fn output_width(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(CategoricalColumn::width).sum::<usize>()
    }

    pub fn numeric_columns(&self) -> &[NumericColumn] {
        &self.numeric
    }

    pub fn categorical_columns(&self) -> &[CategoricalColumn] {
        &self.categorical
    }

    /// Input field names in the order the transform consumes them.
    pub fn input_names(&self) -> Vec<&str> {
        self.numeric
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.categorical.iter().map(|c| c.name.as_str()))
            .collect()
    }

    /// Names of the output columns, e.g. `edad` or `superficie=césped`.
    pub fn output_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|c| c.name.clone()).collect();
        for column in &self.categorical {
            names.extend(column.vocabulary.iter().map(|v| format!("{}={v}", column.name)));
        }
        names
    }

    /// Check that the column layout matches the feature contract. Guards
    /// against artifacts fitted on a different schema.
    pub fn check_layout(&self) -> Result<()> {
        let names = self.input_names();
        let expected: Vec<&str> = NUMERIC_FIELDS
            .iter()
            .chain(CATEGORICAL_FIELDS.iter())
            .copied()
            .collect();
        if self.numeric.len() != NUMERIC_COUNT
            || self.categorical.len() != CATEGORICAL_COUNT
            || names != expected
        {
            return Err(InjuryClassError::validation(format!(
                "transform columns {names:?} do not match the feature contract"
            )));
        }
        if self.numeric.iter().any(|c| !(c.scale > 0.0 && c.scale.is_finite())) {
            return Err(InjuryClassError::validation(
                "transform contains a non-positive scale",
            ));
        }
        Ok(())
    }

    /// Map one feature vector to the classifier input using the frozen statistics.
    pub fn transform(&self, features: &FeatureVector) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.output_width());
        for (column, value) in self.numeric.iter().zip(features.numeric()) {
            out.push(column.apply(*value));
        }
        for (column, value) in self.categorical.iter().zip(features.categorical()) {
            column.apply_into(value.as_deref(), &mut out);
        }
        out
    }

    /// [`transform`](Self::transform) over a batch, preserving order.
    pub fn transform_batch(&self, samples: &[&FeatureVector]) -> Vec<Vec<f64>> {
        samples.iter().map(|s| self.transform(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use injuryclass_features::{RawRecord, RawValue};

    fn record(edad: f64, superficie: &str, nivel: Option<&str>) -> FeatureVector {
        let mut raw = RawRecord::new()
            .with("edad", RawValue::Number(edad))
            .with("superficie", RawValue::Text(superficie.into()));
        if let Some(nivel) = nivel {
            raw.insert("nivel", RawValue::Text(nivel.into()));
        }
        FeatureVector::from_record(&raw)
    }

    fn corpus() -> Vec<FeatureVector> {
        vec![
            record(20.0, "Césped", Some("Amateur")),
            record(30.0, "sintético", Some("amateur")),
            record(40.0, "CÉSPED", Some("Pro")),
        ]
    }

    #[test]
    fn width_counts_numeric_and_vocabulary() {
        let data = corpus();
        let refs: Vec<&FeatureVector> = data.iter().collect();
        let fitted = FittedTransform::fit(&refs).unwrap();

        // 15 numeric + nivel{amateur,pro} + superficie{césped,sintético} + clima{}
        assert_eq!(fitted.output_width(), 15 + 2 + 2);
        assert_eq!(fitted.transform(&data[0]).len(), fitted.output_width());
        assert!(fitted.check_layout().is_ok());
        assert_eq!(fitted.output_names()[15], "nivel=amateur");
    }

    #[test]
    fn equivalent_categories_encode_identically() {
        let data = corpus();
        let refs: Vec<&FeatureVector> = data.iter().collect();
        let fitted = FittedTransform::fit(&refs).unwrap();

        let a = fitted.transform(&record(25.0, "Césped", None));
        let b = fitted.transform(&record(25.0, " césped ", None));
        let c = fitted.transform(&record(25.0, "CÉSPED", None));
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn unseen_category_is_all_zero() {
        let data = corpus();
        let refs: Vec<&FeatureVector> = data.iter().collect();
        let fitted = FittedTransform::fit(&refs).unwrap();

        let out = fitted.transform(&record(25.0, "tierra", Some("amateur")));
        let superficie_block = &out[17..19];
        assert_eq!(superficie_block, &[0.0, 0.0]);
    }

    #[test]
    fn missing_values_use_fitted_fills() {
        let data = corpus();
        let refs: Vec<&FeatureVector> = data.iter().collect();
        let fitted = FittedTransform::fit(&refs).unwrap();

        let empty = FeatureVector::from_record(&RawRecord::new());
        let out = fitted.transform(&empty);
        // edad imputed to the median 30, which is also the mean
        assert!(out[0].abs() < 1e-12);
        // nivel imputed to "amateur"
        assert_eq!(&out[15..17], &[1.0, 0.0]);
    }

    #[test]
    fn fit_is_order_independent() {
        let data = corpus();
        let forward: Vec<&FeatureVector> = data.iter().collect();
        let backward: Vec<&FeatureVector> = data.iter().rev().collect();
        assert_eq!(
            FittedTransform::fit(&forward).unwrap(),
            FittedTransform::fit(&backward).unwrap()
        );
    }

    #[test]
    fn empty_fit_is_rejected() {
        assert!(FittedTransform::fit(&[]).is_err());
    }

    #[test]
    fn survives_serialization() {
        let data = corpus();
        let refs: Vec<&FeatureVector> = data.iter().collect();
        let fitted = FittedTransform::fit(&refs).unwrap();

        let json = serde_json::to_string(&fitted).unwrap();
        let restored: FittedTransform = serde_json::from_str(&json).unwrap();
        assert_eq!(
            restored.transform(&data[1]),
            fitted.transform(&data[1])
        );
    }
}
