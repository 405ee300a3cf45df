//! Labeled dataset loading and training corpus assembly.
//!
//! A corpus is built from one mandatory base CSV plus any number of optional
//! supplementary CSVs (e.g. newly collected field data). Every row passes
//! through the shared feature contract; rows whose label is missing or not
//! one of the five injury classes never reach training.

mod combine;
mod corpus;
mod source;

pub use combine::{CombineResult, combine_csv};
pub use corpus::{
    AssembleStats, Assembled, LabeledSample, TrainingCorpus, assemble, assemble_tables,
};
pub use source::{LABEL_COLUMN, SourceRow, SourceTable, read_source};
