//! Forest hyperparameters.

use injuryclass_shared::{ClassWeight, ForestConfig};

/// Runtime forest parameters, derived from the `[forest]` config section.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    /// Number of trees.
    pub n_estimators: usize,
    /// Seed from which every tree's own seed is drawn.
    pub seed: u64,
    /// Depth limit; `None` grows trees until leaves are pure.
    pub max_depth: Option<usize>,
    /// Nodes with fewer distinct samples become leaves.
    pub min_samples_split: usize,
    /// Per-class sample weighting.
    pub class_weight: ClassWeight,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self::from(&ForestConfig::default())
    }
}

impl From<&ForestConfig> for ForestParams {
    fn from(config: &ForestConfig) -> Self {
        Self {
            n_estimators: config.n_estimators,
            seed: config.seed,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            class_weight: config.class_weight,
        }
    }
}

/// Features examined per split: `floor(sqrt(n_features))`, at least one.
pub(crate) fn max_features(n_features: usize) -> usize {
    ((n_features as f64).sqrt() as usize).max(1)
}

/// Per-class weights. Balanced weighting gives `n / (k * n_c)` where `k` is
/// the number of classes actually present in `y`.
pub(crate) fn class_weights(y: &[usize], n_classes: usize, mode: ClassWeight) -> Vec<f64> {
    match mode {
        ClassWeight::Uniform => vec![1.0; n_classes],
        ClassWeight::Balanced => {
            let mut counts = vec![0usize; n_classes];
            for &label in y {
                counts[label] += 1;
            }
            let present = counts.iter().filter(|&&c| c > 0).count().max(1);
            let n = y.len() as f64;
            counts
                .iter()
                .map(|&c| {
                    if c == 0 {
                        0.0
                    } else {
                        n / (present as f64 * c as f64)
                    }
                })
                .collect()
        }
    }
}
