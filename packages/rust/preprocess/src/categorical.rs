//! Most-frequent imputation followed by one-hot encoding.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Frozen vocabulary for one categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub name: String,
    /// Fill value for missing entries; `None` if the column was never observed.
    pub most_frequent: Option<String>,
    /// Sorted categories seen during fit; one output slot each.
    pub vocabulary: Vec<String>,
}

impl CategoricalColumn {
    /// Fit on the observed categories of one column. Ties for the most
    /// frequent category go to the lexicographically smallest one.
    pub fn fit(name: &str, values: &[Option<String>]) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for value in values.iter().flatten() {
            *counts.entry(value.as_str()).or_default() += 1;
        }

        let mut most_frequent: Option<(&str, usize)> = None;
        for (&category, &count) in &counts {
            if most_frequent.is_none_or(|(_, best)| count > best) {
                most_frequent = Some((category, count));
            }
        }

        Self {
            name: name.to_string(),
            most_frequent: most_frequent.map(|(c, _)| c.to_string()),
            vocabulary: counts.keys().map(|c| c.to_string()).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.vocabulary.len()
    }

    /// Append the one-hot encoding of `value` to `out`. Unseen categories
    /// encode as all zeros.
    pub fn apply_into(&self, value: Option<&str>, out: &mut Vec<f64>) {
        let start = out.len();
        out.resize(start + self.width(), 0.0);

        let Some(category) = value.or(self.most_frequent.as_deref()) else {
            return;
        };
        if let Some(pos) = self.vocabulary.iter().position(|c| c == category) {
            out[start + pos] = 1.0;
        }
    }
}
