//! End-to-end training pipeline: datasets → corpus → transform → forest → artifact.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, instrument, warn};

use injuryclass_dataset::{AssembleStats, assemble};
use injuryclass_forest::{ClassificationReport, ForestParams, RandomForest, stratified_split};
use injuryclass_preprocess::FittedTransform;
use injuryclass_shared::{AppConfig, ArtifactHeader, InjuryLabel, ModelId, Result};

use crate::artifact::{ModelArtifact, ModelPayload};

/// Configuration for [`train_model`].
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Mandatory labeled dataset.
    pub base_dataset: PathBuf,
    /// Optional extra datasets; missing files are skipped.
    pub supplementary: Vec<PathBuf>,
    /// Where the artifact is written.
    pub model_path: PathBuf,
    pub forest: ForestParams,
    /// Fraction of each class held out for the report.
    pub test_fraction: f64,
    /// Seed for the held-out split.
    pub split_seed: u64,
}

impl From<&AppConfig> for TrainConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_dataset: config.paths.base_dataset.clone(),
            supplementary: config.paths.supplementary.clone(),
            model_path: config.paths.model.clone(),
            forest: ForestParams::from(&config.forest),
            test_fraction: config.evaluation.test_fraction,
            split_seed: config.evaluation.seed,
        }
    }
}

/// Result of a successful training run.
#[derive(Debug)]
pub struct TrainResult {
    pub model_id: ModelId,
    pub model_path: PathBuf,
    pub header: ArtifactHeader,
    /// Metrics on the held-out partition. Diagnostic only.
    pub report: ClassificationReport,
    pub stats: AssembleStats,
    pub train_samples: usize,
    pub test_samples: usize,
    pub elapsed: std::time::Duration,
}

impl TrainResult {
    /// The held-out report as a table with display labels.
    pub fn render_report(&self) -> String {
        let names: Vec<&str> = InjuryLabel::ALL.iter().map(|l| l.display_name()).collect();
        self.report.render(&names)
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each tree finishes. May be called from worker threads.
    fn tree_built(&self, built: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &TrainResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn tree_built(&self, _built: usize, _total: usize) {}
    fn done(&self, _result: &TrainResult) {}
}

/// Run the full training pipeline.
///
/// 1. Assemble the corpus from the base and supplementary datasets
/// 2. Fit the preprocessing transform on the full corpus
/// 3. Stratified split into train and held-out partitions
/// 4. Fit the forest on the train partition
/// 5. Evaluate on the held-out partition
/// 6. Write the artifact atomically
///
/// Any failure before step 6 leaves the existing artifact untouched.
#[instrument(skip_all, fields(base = %config.base_dataset.display(), model = %config.model_path.display()))]
pub fn train_model(config: &TrainConfig, progress: &dyn ProgressReporter) -> Result<TrainResult> {
    let start = Instant::now();

    // --- Phase 1: Corpus ---
    progress.phase("Loading datasets");
    let assembled = assemble(&config.base_dataset, &config.supplementary)?;
    let corpus = assembled.corpus;
    let features = corpus.features();
    let labels = corpus.class_indices();

    // --- Phase 2: Preprocessing ---
    progress.phase("Fitting preprocessing");
    let transform = FittedTransform::fit(&features)?;
    let matrix = transform.transform_batch(&features);

    // --- Phase 3: Split ---
    let split = stratified_split(
        &labels,
        InjuryLabel::COUNT,
        config.test_fraction,
        config.split_seed,
    )?;
    info!(
        train = split.train.len(),
        test = split.test.len(),
        "stratified split"
    );

    let x_train: Vec<Vec<f64>> = split.train.iter().map(|&i| matrix[i].clone()).collect();
    let y_train: Vec<usize> = split.train.iter().map(|&i| labels[i]).collect();
    let x_test: Vec<Vec<f64>> = split.test.iter().map(|&i| matrix[i].clone()).collect();
    let y_test: Vec<usize> = split.test.iter().map(|&i| labels[i]).collect();

    // --- Phase 4: Forest ---
    progress.phase("Training random forest");
    let classifier = RandomForest::fit_with_progress(
        &x_train,
        &y_train,
        InjuryLabel::COUNT,
        &config.forest,
        |built, total| progress.tree_built(built, total),
    )?;

    // --- Phase 5: Evaluation ---
    progress.phase("Evaluating");
    if x_test.is_empty() {
        warn!("held-out partition is empty, report will be blank");
    }
    let y_pred = classifier.predict_batch(&x_test)?;
    let report = ClassificationReport::compute(&y_test, &y_pred, InjuryLabel::COUNT);
    info!(accuracy = report.accuracy, support = report.total, "held-out evaluation");

    // --- Phase 6: Artifact ---
    progress.phase("Writing model artifact");
    let artifact = ModelArtifact::new(ModelPayload::new(transform, classifier), y_train.len());
    let header = artifact.save(&config.model_path)?;

    let result = TrainResult {
        model_id: artifact.model_id,
        model_path: config.model_path.clone(),
        header,
        report,
        stats: assembled.stats,
        train_samples: y_train.len(),
        test_samples: y_test.len(),
        elapsed: start.elapsed(),
    };

    info!(
        model_id = %result.model_id,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "training complete"
    );
    progress.done(&result);
    Ok(result)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::{Path, PathBuf};

    /// Fresh scratch directory under the system temp dir.
    pub fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("injuryclass-{tag}-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// A small CSV where the injury type is driven by `superficie` and `edad`,
    /// so a forest can learn it.
    pub fn write_dataset(path: &Path, rows_per_class: usize) {
        let mut csv = String::from(
            "edad,peso,estatura_m,frecuencia_juego_semana,duracion_partido_min,nivel,superficie,clima,tipo_lesion\n",
        );
        let classes = [
            ("Esguince", 18.0, "césped"),
            ("Desgarre", 26.0, "sintético"),
            ("Fractura", 34.0, "tierra"),
            ("Luxación", 42.0, "cemento"),
            ("Otra lesión", 50.0, "arena"),
        ];
        for (label, edad, superficie) in classes {
            for i in 0..rows_per_class {
                csv.push_str(&format!(
                    "{},{},{},{},{},Amateur,{},seco,{}\n",
                    edad + (i % 4) as f64,
                    65 + i,
                    1.70 + (i % 3) as f64 * 0.05,
                    2 + i % 3,
                    90,
                    superficie,
                    label
                ));
            }
        }
        std::fs::write(path, csv).unwrap();
    }

    pub fn train_config(dir: &Path, trees: usize) -> super::TrainConfig {
        let base = dir.join("dataset.csv");
        write_dataset(&base, 12);
        super::TrainConfig {
            base_dataset: base,
            supplementary: vec![dir.join("missing_extra.csv")],
            model_path: dir.join("model").join("modelo.json"),
            forest: super::ForestParams {
                n_estimators: trees,
                ..super::ForestParams::default()
            },
            test_fraction: 0.2,
            split_seed: 42,
        }
    }
}
