//! Fail-soft inference over a loaded model artifact.
//!
//! An [`InferenceService`] is built once and never mutated afterwards, so a
//! single instance can be shared behind an `Arc` by any number of callers.
//! Every outcome other than a successful prediction collapses to the default
//! label at the [`classify`](InferenceService::classify) boundary.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use injuryclass_features::{FeatureVector, RawRecord};
use injuryclass_forest::RandomForest;
use injuryclass_preprocess::FittedTransform;
use injuryclass_shared::{InjuryLabel, ModelId, Result};

use crate::artifact::ModelArtifact;

/// A successful prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    /// Raw class index from the classifier.
    pub index: usize,
    /// Mapped label; unmapped indices resolve to [`InjuryLabel::DEFAULT`].
    pub label: InjuryLabel,
}

/// Outcome of one inference call.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Success(PredictionResult),
    /// No usable model was loaded.
    ModelUnavailable,
    /// The payload could not be read as a record.
    InputInvalid { reason: String },
    /// The record was valid but classification failed.
    PredictionFailed { reason: String },
}

impl Classification {
    /// Final user-facing label. Anything but success yields the default label.
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Success(result) => result.label.display_name(),
            _ => InjuryLabel::DEFAULT.display_name(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Classification::Success(_))
    }

    /// Short name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Classification::Success(_) => "success",
            Classification::ModelUnavailable => "model_unavailable",
            Classification::InputInvalid { .. } => "input_invalid",
            Classification::PredictionFailed { .. } => "prediction_failed",
        }
    }
}

#[derive(Debug)]
struct LoadedModel {
    model_id: ModelId,
    transform: FittedTransform,
    classifier: RandomForest,
}

#[derive(Debug)]
enum ModelState {
    Ready(Box<LoadedModel>),
    Unavailable { reason: String },
}

/// Immutable inference handle.
#[derive(Debug)]
pub struct InferenceService {
    state: ModelState,
}

impl InferenceService {
    /// Load the artifact at `path`. Never fails: a load error is kept and
    /// every later call reports [`Classification::ModelUnavailable`].
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Self {
        match ModelArtifact::load(path) {
            Ok(artifact) => {
                info!(model_id = %artifact.model_id, "model loaded");
                Self::from_artifact(artifact)
            }
            Err(e) => {
                warn!(error = %e, "model unavailable, every prediction will use the default label");
                Self::unavailable(e.to_string())
            }
        }
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Self {
        Self {
            state: ModelState::Ready(Box::new(LoadedModel {
                model_id: artifact.model_id,
                transform: artifact.payload.transform,
                classifier: artifact.payload.classifier,
            })),
        }
    }

    /// A service with no model.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: ModelState::Unavailable {
                reason: reason.into(),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ModelState::Ready(_))
    }

    pub fn model_id(&self) -> Option<&ModelId> {
        match &self.state {
            ModelState::Ready(model) => Some(&model.model_id),
            ModelState::Unavailable { .. } => None,
        }
    }

    /// Why the model could not be loaded, if it could not.
    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.state {
            ModelState::Ready(_) => None,
            ModelState::Unavailable { reason } => Some(reason),
        }
    }

    /// Classify one JSON object payload.
    pub fn evaluate(&self, payload: &str) -> Classification {
        let ModelState::Ready(model) = &self.state else {
            return Classification::ModelUnavailable;
        };
        match RawRecord::from_json_str(payload) {
            Ok(record) => Self::predict_guarded(model, &record),
            Err(e) => Classification::InputInvalid {
                reason: e.to_string(),
            },
        }
    }

    /// Classify an already-parsed record.
    pub fn evaluate_record(&self, record: &RawRecord) -> Classification {
        match &self.state {
            ModelState::Ready(model) => Self::predict_guarded(model, record),
            ModelState::Unavailable { .. } => Classification::ModelUnavailable,
        }
    }

    /// [`evaluate`](Self::evaluate) collapsed to a label. Never fails.
    pub fn classify(&self, payload: &str) -> &'static str {
        let outcome = self.evaluate(payload);
        match &outcome {
            Classification::Success(result) => {
                debug!(index = result.index, label = %result.label, "classified");
            }
            Classification::ModelUnavailable => {
                debug!("no model loaded, returning default label");
            }
            Classification::InputInvalid { reason } | Classification::PredictionFailed { reason } => {
                warn!(kind = outcome.kind(), reason = %reason, "returning default label");
            }
        }
        outcome.label()
    }

    fn predict_guarded(model: &LoadedModel, record: &RawRecord) -> Classification {
        let attempt = catch_unwind(AssertUnwindSafe(|| Self::predict(model, record)));
        match attempt {
            Ok(Ok(result)) => Classification::Success(result),
            Ok(Err(e)) => Classification::PredictionFailed {
                reason: e.to_string(),
            },
            Err(_) => Classification::PredictionFailed {
                reason: "classifier panicked".to_string(),
            },
        }
    }

    fn predict(model: &LoadedModel, record: &RawRecord) -> Result<PredictionResult> {
        let features = FeatureVector::from_record(record);
        let row = model.transform.transform(&features);
        let index = model.classifier.predict(&row)?;
        Ok(PredictionResult {
            index,
            label: InjuryLabel::from_index(index).unwrap_or(InjuryLabel::DEFAULT),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::train::fixtures::{temp_dir, train_config};
    use crate::train::{SilentProgress, train_model};
    use std::sync::Arc;

    const EXAMPLE: &str = r#"{"edad":22,"peso":72,"estatura_m":1.75,"frecuencia_juego_semana":3,"duracion_partido_min":90,"nivel":"Amateur"}"#;

    fn trained_service(tag: &str) -> (InferenceService, std::path::PathBuf) {
        let dir = temp_dir(tag);
        let config = train_config(&dir, 15);
        train_model(&config, &SilentProgress).unwrap();
        (InferenceService::load(&config.model_path), dir)
    }

    #[test]
    fn service_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<InferenceService>();
    }

    #[test]
    fn example_record_gets_a_known_label() {
        let (service, dir) = trained_service("infer-example");
        assert!(service.is_ready());

        let outcome = service.evaluate(EXAMPLE);
        assert!(outcome.is_success(), "{outcome:?}");
        let label = service.classify(EXAMPLE);
        assert!(InjuryLabel::ALL.iter().any(|l| l.display_name() == label));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn learned_pattern_is_recovered() {
        let (service, dir) = trained_service("infer-pattern");
        let payload = r#"{"edad":35,"superficie":"Tierra","nivel":"amateur","clima":"seco"}"#;
        assert_eq!(service.classify(payload), "Fractura");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn success_exposes_only_index_and_label() {
        let (service, dir) = trained_service("infer-result");
        let Classification::Success(result) = service.evaluate(EXAMPLE) else {
            panic!("expected a prediction");
        };
        let PredictionResult { index, label } = result;
        assert_eq!(InjuryLabel::from_index(index), Some(label));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn classification_is_deterministic() {
        let (service, dir) = trained_service("infer-determinism");
        let first = service.evaluate(EXAMPLE);
        for _ in 0..5 {
            assert_eq!(service.evaluate(EXAMPLE), first);
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_payload_uses_default_label() {
        let (service, dir) = trained_service("infer-malformed");
        assert!(matches!(
            service.evaluate("not valid json"),
            Classification::InputInvalid { .. }
        ));
        assert_eq!(service.classify("not valid json"), "Otra lesión");
        assert_eq!(service.classify("[1, 2, 3]"), "Otra lesión");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_object_still_classifies() {
        let (service, dir) = trained_service("infer-empty");
        assert!(service.evaluate("{}").is_success());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_artifact_always_defaults() {
        let service = InferenceService::load(Path::new("/nonexistent/injuryclass/modelo.json"));
        assert!(!service.is_ready());
        assert!(service.unavailable_reason().is_some());
        assert_eq!(service.evaluate(EXAMPLE), Classification::ModelUnavailable);
        assert_eq!(service.classify(EXAMPLE), "Otra lesión");
        assert_eq!(service.classify("not valid json"), "Otra lesión");
    }

    #[test]
    fn corrupt_artifact_always_defaults() {
        let dir = temp_dir("infer-corrupt");
        let path = dir.join("modelo.json");
        std::fs::write(&path, "{\"format\":\"something-else\"}\n{}").unwrap();

        let service = InferenceService::load(&path);
        assert!(!service.is_ready());
        assert_eq!(service.classify(EXAMPLE), "Otra lesión");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn shared_service_answers_concurrently() {
        let (service, dir) = trained_service("infer-shared");
        let service = Arc::new(service);
        let expected = service.classify(EXAMPLE);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::task::spawn_blocking(move || service.classify(EXAMPLE))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), expected);
        }

        let _ = std::fs::remove_dir_all(&dir);
    }
}
