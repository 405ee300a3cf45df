//! Random forest classifier, stratified splitting and evaluation reports.
//!
//! Training is deterministic for a given seed: per-tree seeds are drawn
//! sequentially before trees are grown in parallel with rayon.

mod forest;
mod params;
mod report;
mod split;
mod tree;

pub use forest::RandomForest;
pub use params::ForestParams;
pub use report::{Averages, ClassMetrics, ClassificationReport};
pub use split::{SplitIndices, stratified_split};
pub use tree::{DecisionTree, Node};
