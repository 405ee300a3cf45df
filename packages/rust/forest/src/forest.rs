//! Bagged ensemble of CART trees.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use injuryclass_shared::{InjuryClassError, Result};

use crate::params::{ForestParams, class_weights, max_features};
use crate::tree::{DecisionTree, TreeLimits};

/// A fitted random forest. Immutable after [`fit`](Self::fit); safe to share
/// across threads for concurrent prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    n_classes: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit a forest on `x` (one row per sample) and class indices `y`.
    pub fn fit(x: &[Vec<f64>], y: &[usize], n_classes: usize, params: &ForestParams) -> Result<Self> {
        Self::fit_with_progress(x, y, n_classes, params, |_, _| {})
    }

    /// [`fit`](Self::fit), calling `on_tree(built, total)` as each tree finishes.
    /// Trees are grown in parallel, so calls may come from any thread.
    #[instrument(skip_all, fields(samples = x.len(), trees = params.n_estimators))]
    pub fn fit_with_progress<F>(
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        params: &ForestParams,
        on_tree: F,
    ) -> Result<Self>
    where
        F: Fn(usize, usize) + Sync,
    {
        let n_features = validate_training_data(x, y, n_classes)?;
        if params.n_estimators == 0 {
            return Err(InjuryClassError::validation("n_estimators must be at least 1"));
        }

        let limits = TreeLimits {
            max_features: max_features(n_features),
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split.max(2),
        };
        let class_weight = class_weights(y, n_classes, params.class_weight);

        // Seeds are drawn up front so the result does not depend on thread scheduling.
        let mut master = StdRng::seed_from_u64(params.seed);
        let seeds: Vec<u64> = (0..params.n_estimators).map(|_| master.next_u64()).collect();

        let total = seeds.len();
        let built = AtomicUsize::new(0);

        let trees: Vec<DecisionTree> = seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let weights = bootstrap_weights(y, &class_weight, &mut rng);
                let tree = DecisionTree::grow(x, y, &weights, n_classes, limits, &mut rng);
                let done = built.fetch_add(1, Ordering::Relaxed) + 1;
                on_tree(done, total);
                tree
            })
            .collect();

        let nodes: usize = trees.iter().map(DecisionTree::node_count).sum();
        info!(
            trees = trees.len(),
            features = n_features,
            max_features = limits.max_features,
            nodes,
            "random forest fitted"
        );

        Ok(Self {
            n_features,
            n_classes,
            trees,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean of the per-tree leaf distributions for one row.
    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.n_features {
            return Err(InjuryClassError::Prediction(format!(
                "expected {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(InjuryClassError::Prediction(
                "feature vector contains a non-finite value".into(),
            ));
        }

        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in proba.iter_mut().zip(tree.leaf_distribution(row)) {
                *acc += p;
            }
        }
        let n = self.trees.len().max(1) as f64;
        for p in &mut proba {
            *p /= n;
        }
        Ok(proba)
    }

    /// Index of the most probable class. Ties go to the lowest index.
    pub fn predict(&self, row: &[f64]) -> Result<usize> {
        let proba = self.predict_proba(row)?;
        Ok(argmax(&proba))
    }

    /// [`predict`](Self::predict) for many rows, in input order.
    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<usize>> {
        rows.par_iter().map(|row| self.predict(row)).collect()
    }

    /// Structural validation for a forest read back from disk.
    pub fn check(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(InjuryClassError::artifact("forest has no trees"));
        }
        if self.n_features == 0 || self.n_classes == 0 {
            return Err(InjuryClassError::artifact("forest has an empty shape"));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.check(self.n_features, self.n_classes)
                .map_err(|e| InjuryClassError::artifact(format!("tree {i}: {e}")))?;
        }
        debug!(trees = self.trees.len(), "forest structure verified");
        Ok(())
    }
}

fn validate_training_data(x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Result<usize> {
    if x.is_empty() {
        return Err(InjuryClassError::validation("cannot fit a forest on zero samples"));
    }
    if x.len() != y.len() {
        return Err(InjuryClassError::validation(format!(
            "{} feature rows but {} labels",
            x.len(),
            y.len()
        )));
    }
    let n_features = x[0].len();
    if n_features == 0 {
        return Err(InjuryClassError::validation("feature rows are empty"));
    }
    for (i, row) in x.iter().enumerate() {
        if row.len() != n_features {
            return Err(InjuryClassError::validation(format!(
                "row {i} has {} features, expected {n_features}",
                row.len()
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(InjuryClassError::validation(format!(
                "row {i} contains a non-finite value"
            )));
        }
    }
    if let Some(label) = y.iter().find(|&&label| label >= n_classes) {
        return Err(InjuryClassError::validation(format!(
            "label {label} out of range for {n_classes} classes"
        )));
    }
    Ok(n_features)
}

/// Draw `n` rows with replacement; each row's weight is its draw count times
/// its class weight.
fn bootstrap_weights(y: &[usize], class_weight: &[f64], rng: &mut StdRng) -> Vec<f64> {
    let n = y.len();
    let mut counts = vec![0u32; n];
    for _ in 0..n {
        counts[rng.gen_range(0..n)] += 1;
    }
    counts
        .iter()
        .zip(y)
        .map(|(&c, &label)| c as f64 * class_weight[label])
        .collect()
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..30 {
            let class = i % 3;
            let centre = class as f64 * 10.0;
            x.push(vec![centre + (i as f64 * 0.1), centre - (i as f64 * 0.05)]);
            y.push(class);
        }
        (x, y)
    }

    fn params(trees: usize) -> ForestParams {
        ForestParams {
            n_estimators: trees,
            ..ForestParams::default()
        }
    }

    #[test]
    fn predicts_training_points_on_separable_data() {
        let (x, y) = toy();
        let forest = RandomForest::fit(&x, &y, 3, &params(25)).unwrap();
        let predicted = forest.predict_batch(&x).unwrap();
        assert_eq!(predicted, y);
    }

    #[test]
    fn same_seed_same_forest() {
        let (x, y) = toy();
        let a = RandomForest::fit(&x, &y, 3, &params(10)).unwrap();
        let b = RandomForest::fit(&x, &y, 3, &params(10)).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn probabilities_sum_to_one() {
        let (x, y) = toy();
        let forest = RandomForest::fit(&x, &y, 3, &params(10)).unwrap();
        let proba = forest.predict_proba(&[5.0, 5.0]).unwrap();
        let total: f64 = proba.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn progress_reports_every_tree() {
        let (x, y) = toy();
        let calls = AtomicUsize::new(0);
        RandomForest::fit_with_progress(&x, &y, 3, &params(7), |_, total| {
            assert_eq!(total, 7);
            calls.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 7);
    }

    #[test]
    fn wrong_width_is_a_prediction_error() {
        let (x, y) = toy();
        let forest = RandomForest::fit(&x, &y, 3, &params(3)).unwrap();
        let err = forest.predict(&[1.0]).unwrap_err();
        assert!(matches!(err, InjuryClassError::Prediction(_)));
    }

    #[test]
    fn rejects_bad_training_input() {
        assert!(RandomForest::fit(&[], &[], 2, &params(3)).is_err());
        assert!(RandomForest::fit(&[vec![1.0]], &[0, 1], 2, &params(3)).is_err());
        assert!(RandomForest::fit(&[vec![1.0]], &[5], 2, &params(3)).is_err());
        assert!(RandomForest::fit(&[vec![f64::NAN]], &[0], 2, &params(3)).is_err());
        assert!(RandomForest::fit(&[vec![1.0]], &[0], 2, &params(0)).is_err());
    }

    #[test]
    fn single_class_always_predicts_it() {
        let x = vec![vec![1.0], vec![2.0], vec![3.0]];
        let y = vec![1, 1, 1];
        let forest = RandomForest::fit(&x, &y, 3, &params(5)).unwrap();
        assert_eq!(forest.predict(&[100.0]).unwrap(), 1);
    }

    #[test]
    fn argmax_prefers_lowest_index_on_ties() {
        assert_eq!(argmax(&[0.4, 0.4, 0.2]), 0);
        assert_eq!(argmax(&[0.1, 0.45, 0.45]), 1);
    }

    #[test]
    fn restored_forest_passes_check() {
        let (x, y) = toy();
        let forest = RandomForest::fit(&x, &y, 3, &params(4)).unwrap();
        let json = serde_json::to_string(&forest).unwrap();
        let restored: RandomForest = serde_json::from_str(&json).unwrap();
        assert!(restored.check().is_ok());
        assert_eq!(restored, forest);
    }
}
