//! Feature contract shared by training and inference.
//!
//! Both halves of the system build their inputs exclusively through
//! [`FeatureVector::from_record`], so field order, derived fields and
//! category normalization cannot drift between them.

mod contract;
mod record;

pub use contract::{
    CATEGORICAL_COUNT, CATEGORICAL_FIELDS, FEATURE_NAMES, FeatureVector, NUMERIC_COUNT,
    NUMERIC_FIELDS, body_mass_index, categorical, normalize_category, numeric, session_load,
};
pub use record::{RawRecord, RawValue};
