//! Feature preprocessing: per-column imputation, scaling and one-hot encoding.
//!
//! The transform is fitted once on the full training corpus and frozen into
//! the model artifact. Inference only ever applies the frozen statistics.

mod categorical;
mod numeric;
mod transform;

pub use categorical::CategoricalColumn;
pub use numeric::NumericColumn;
pub use transform::FittedTransform;
