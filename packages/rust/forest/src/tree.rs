//! CART decision tree with weighted Gini impurity.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// One node of a fitted tree. Children are indices into the tree's node list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        /// Weighted class fractions of the training samples that reached the leaf.
        distribution: Vec<f64>,
    },
}

/// A fitted tree. Node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeLimits {
    pub max_features: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

struct Task {
    node: usize,
    samples: Vec<usize>,
    depth: usize,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl DecisionTree {
    /// Grow a tree on the samples with positive weight.
    ///
    /// `weights[i]` is the bootstrap count of row `i` times its class weight.
    pub(crate) fn grow(
        x: &[Vec<f64>],
        y: &[usize],
        weights: &[f64],
        n_classes: usize,
        limits: TreeLimits,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let mut nodes = vec![placeholder()];
        let mut stack = vec![Task {
            node: 0,
            samples: (0..x.len()).filter(|&i| weights[i] > 0.0).collect(),
            depth: 0,
        }];

        while let Some(task) = stack.pop() {
            let counts = weighted_counts(&task.samples, y, weights, n_classes);

            let may_split = task.samples.len() >= limits.min_samples_split
                && limits.max_depth.is_none_or(|d| task.depth < d)
                && counts.iter().filter(|&&c| c > 0.0).count() > 1;

            let candidate = if may_split {
                best_split(x, y, weights, &task.samples, &counts, n_features, limits, rng)
            } else {
                None
            };

            match candidate {
                Some(split) => {
                    let (left, right): (Vec<usize>, Vec<usize>) = task
                        .samples
                        .iter()
                        .partition(|&&i| x[i][split.feature] <= split.threshold);

                    let left_node = nodes.len();
                    nodes.push(placeholder());
                    let right_node = nodes.len();
                    nodes.push(placeholder());

                    nodes[task.node] = Node::Split {
                        feature: split.feature,
                        threshold: split.threshold,
                        left: left_node,
                        right: right_node,
                    };
                    stack.push(Task {
                        node: right_node,
                        samples: right,
                        depth: task.depth + 1,
                    });
                    stack.push(Task {
                        node: left_node,
                        samples: left,
                        depth: task.depth + 1,
                    });
                }
                None => nodes[task.node] = leaf(&counts),
            }
        }

        Self { nodes }
    }

    /// Class distribution of the leaf `row` falls into.
    ///
    /// The caller guarantees `row` has the width the tree was grown on and
    /// that the tree passed [`check`](Self::check).
    pub fn leaf_distribution(&self, row: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let Some(Node::Split { left, right, .. }) = self.nodes.get(idx) {
                stack.push((*left, depth + 1));
                stack.push((*right, depth + 1));
            }
        }
        deepest
    }

    /// Structural validation for trees read back from disk: children point
    /// strictly forward (so traversal terminates), features are in range and
    /// leaves have one entry per class.
    pub fn check(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!("node {idx} splits on feature {feature}"));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {idx} has a NaN threshold"));
                    }
                    for child in [left, right] {
                        if *child <= idx || *child >= self.nodes.len() {
                            return Err(format!("node {idx} has invalid child {child}"));
                        }
                    }
                }
                Node::Leaf { distribution } => {
                    if distribution.len() != n_classes {
                        return Err(format!(
                            "leaf {idx} has {} classes, expected {n_classes}",
                            distribution.len()
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn placeholder() -> Node {
    Node::Leaf {
        distribution: Vec::new(),
    }
}

fn leaf(counts: &[f64]) -> Node {
    let total: f64 = counts.iter().sum();
    let distribution = if total > 0.0 {
        counts.iter().map(|c| c / total).collect()
    } else {
        vec![0.0; counts.len()]
    };
    Node::Leaf { distribution }
}

fn weighted_counts(samples: &[usize], y: &[usize], weights: &[f64], n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0.0; n_classes];
    for &i in samples {
        counts[y[i]] += weights[i];
    }
    counts
}

/// Gini impurity scaled by the node weight: `W * (1 - Σ p²)`.
fn weighted_gini(counts: &[f64]) -> f64 {
    let total: f64 = counts.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let sum_sq: f64 = counts.iter().map(|c| c * c).sum();
    total - sum_sq / total
}

/// Search a random subset of features for the split with the lowest summed
/// child impurity. Constant features are skipped without using up the
/// feature budget.
#[allow(clippy::too_many_arguments)]
fn best_split(
    x: &[Vec<f64>],
    y: &[usize],
    weights: &[f64],
    samples: &[usize],
    parent_counts: &[f64],
    n_features: usize,
    limits: TreeLimits,
    rng: &mut StdRng,
) -> Option<Candidate> {
    let mut features: Vec<usize> = (0..n_features).collect();
    features.shuffle(rng);

    let mut best: Option<Candidate> = None;
    let mut visited = 0;
    let mut ordered: Vec<(f64, usize)> = Vec::with_capacity(samples.len());

    for feature in features {
        if visited >= limits.max_features {
            break;
        }

        ordered.clear();
        ordered.extend(samples.iter().map(|&i| (x[i][feature], i)));
        ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

        let (lo, hi) = (ordered[0].0, ordered[ordered.len() - 1].0);
        if lo == hi {
            continue;
        }
        visited += 1;

        let mut left = vec![0.0; parent_counts.len()];
        let mut right = parent_counts.to_vec();

        for pos in 0..ordered.len() - 1 {
            let (value, i) = ordered[pos];
            left[y[i]] += weights[i];
            right[y[i]] -= weights[i];

            let next = ordered[pos + 1].0;
            if value == next {
                continue;
            }

            let impurity = weighted_gini(&left) + weighted_gini(&right);
            let better = best.as_ref().is_none_or(|b| impurity < b.impurity);
            if better {
                let mut threshold = value + (next - value) / 2.0;
                if threshold >= next || !threshold.is_finite() {
                    threshold = value;
                }
                best = Some(Candidate {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
    }

    best
}
