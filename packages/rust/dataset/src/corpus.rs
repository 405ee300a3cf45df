//! Assembling the training corpus from a base source plus supplementary sources.

use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use injuryclass_features::FeatureVector;
use injuryclass_shared::{InjuryClassError, InjuryLabel, Result};

use crate::source::{SourceRow, SourceTable, read_source};

/// A feature vector with its target class.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    pub features: FeatureVector,
    pub label: InjuryLabel,
}

/// Ordered labeled samples; every label is a known class.
#[derive(Debug, Clone, Default)]
pub struct TrainingCorpus {
    samples: Vec<LabeledSample>,
}

impl TrainingCorpus {
    pub fn new(samples: Vec<LabeledSample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[LabeledSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Feature vectors in corpus order.
    pub fn features(&self) -> Vec<&FeatureVector> {
        self.samples.iter().map(|s| &s.features).collect()
    }

    /// Class indices in corpus order.
    pub fn class_indices(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.label.index()).collect()
    }

    /// Number of samples per class, indexed by class index.
    pub fn class_counts(&self) -> [usize; InjuryLabel::COUNT] {
        let mut counts = [0; InjuryLabel::COUNT];
        for sample in &self.samples {
            counts[sample.label.index()] += 1;
        }
        counts
    }
}

/// Row accounting for one assembly run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembleStats {
    /// Rows read from the base source.
    pub base_rows: usize,
    /// Labeled supplementary rows appended after the base.
    pub supplementary_rows: usize,
    /// Supplementary rows dropped for lacking a label.
    pub dropped_unlabeled: usize,
    /// Rows dropped because their label is outside the vocabulary.
    pub dropped_unmappable: usize,
}

/// Result of [`assemble`].
#[derive(Debug, Clone)]
pub struct Assembled {
    pub corpus: TrainingCorpus,
    pub stats: AssembleStats,
}

/// Read the base source and every existing supplementary source, then build
/// the corpus.
///
/// The base source is mandatory. A supplementary path that does not exist is
/// skipped.
#[instrument(skip_all, fields(base = %base.display(), supplementary = supplementary.len()))]
pub fn assemble(base: &Path, supplementary: &[PathBuf]) -> Result<Assembled> {
    if !base.exists() {
        return Err(InjuryClassError::dataset(format!(
            "base dataset not found: {}",
            base.display()
        )));
    }

    info!(path = %base.display(), "loading base dataset");
    let base_table = read_source(base)?;
    if !base_table.has_label_column && !base_table.rows.is_empty() {
        return Err(InjuryClassError::dataset(format!(
            "base dataset {} has no '{}' column",
            base.display(),
            crate::LABEL_COLUMN
        )));
    }

    let mut extra = Vec::with_capacity(supplementary.len());
    for path in supplementary {
        if !path.exists() {
            info!(path = %path.display(), "supplementary dataset not found, skipping");
            continue;
        }
        info!(path = %path.display(), "loading supplementary dataset");
        let table = read_source(path)?;
        if !table.has_label_column && !table.rows.is_empty() {
            warn!(
                path = %path.display(),
                rows = table.rows.len(),
                "supplementary dataset has no label column, all rows dropped"
            );
        }
        extra.push(table);
    }

    assemble_tables(base_table, extra)
}

/// Build the corpus from already-read tables. Base rows come first, then each
/// supplementary table in order; row order within a table is preserved and
/// duplicates are kept.
pub fn assemble_tables(base: SourceTable, supplementary: Vec<SourceTable>) -> Result<Assembled> {
    let mut stats = AssembleStats {
        base_rows: base.rows.len(),
        ..AssembleStats::default()
    };

    let mut rows: Vec<SourceRow> = base.rows;
    for table in supplementary {
        let before = table.rows.len();
        let labeled: Vec<SourceRow> = table
            .rows
            .into_iter()
            .filter(|row| row.label.is_some())
            .collect();

        stats.dropped_unlabeled += before - labeled.len();
        if labeled.is_empty() {
            info!("supplementary dataset is empty or unlabeled, not appended");
            continue;
        }
        info!(rows = labeled.len(), "appending supplementary rows");
        stats.supplementary_rows += labeled.len();
        rows.extend(labeled);
    }

    let mut samples = Vec::with_capacity(rows.len());
    for row in rows {
        match row.label.as_deref().and_then(InjuryLabel::from_raw) {
            Some(label) => samples.push(LabeledSample {
                features: FeatureVector::from_record(&row.record),
                label,
            }),
            None => stats.dropped_unmappable += 1,
        }
    }

    if stats.dropped_unmappable > 0 {
        warn!(
            dropped = stats.dropped_unmappable,
            "rows with missing or unknown injury type discarded"
        );
    }

    if samples.is_empty() {
        return Err(InjuryClassError::dataset(
            "no labeled rows left after cleaning; nothing to train on",
        ));
    }

    let corpus = TrainingCorpus::new(samples);
    info!(total = corpus.len(), counts = ?corpus.class_counts(), "training corpus assembled");

    Ok(Assembled { corpus, stats })
}
