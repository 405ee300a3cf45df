//! Training pipeline, model artifact and inference service.

pub mod artifact;
pub mod inference;
pub mod train;

pub use artifact::{ModelArtifact, ModelPayload, read_header};
pub use inference::{Classification, InferenceService, PredictionResult};
pub use train::{ProgressReporter, SilentProgress, TrainConfig, TrainResult, train_model};
