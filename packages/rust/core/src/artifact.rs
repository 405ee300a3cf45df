//! Versioned, checksummed model artifact.
//!
//! Layout on disk:
//! ```text
//! {"format":"injuryclass-model","schema_version":1,...,"payload_sha256":"…"}\n
//! {"feature_names":[…],"labels":{…},"transform":{…},"classifier":{…}}
//! ```
//! The first line is the [`ArtifactHeader`]; everything after the newline is
//! the payload it describes.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use injuryclass_features::FEATURE_NAMES;
use injuryclass_forest::RandomForest;
use injuryclass_preprocess::FittedTransform;
use injuryclass_shared::{
    ARTIFACT_FORMAT, ArtifactHeader, CURRENT_SCHEMA_VERSION, InjuryClassError, InjuryLabel,
    ModelId, Result,
};

/// Everything inference needs, frozen at training time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPayload {
    /// Input feature names in contract order.
    pub feature_names: Vec<String>,
    /// Class index → display label.
    pub labels: BTreeMap<usize, String>,
    pub transform: FittedTransform,
    pub classifier: RandomForest,
}

impl ModelPayload {
    /// Bundle a fitted transform and classifier with the current feature
    /// contract and label vocabulary.
    pub fn new(transform: FittedTransform, classifier: RandomForest) -> Self {
        Self {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            labels: InjuryLabel::ALL
                .iter()
                .map(|l| (l.index(), l.display_name().to_string()))
                .collect(),
            transform,
            classifier,
        }
    }

    /// Consistency checks run on every load.
    pub fn validate(&self) -> Result<()> {
        if self.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES.iter().copied()) {
            return Err(InjuryClassError::artifact(format!(
                "feature names {:?} do not match the feature contract",
                self.feature_names
            )));
        }

        for label in InjuryLabel::ALL {
            match self.labels.get(&label.index()) {
                Some(name) if name == label.display_name() => {}
                Some(name) => {
                    return Err(InjuryClassError::artifact(format!(
                        "label {} maps to '{name}', expected '{}'",
                        label.index(),
                        label.display_name()
                    )));
                }
                None => {
                    return Err(InjuryClassError::artifact(format!(
                        "label map has no entry for index {}",
                        label.index()
                    )));
                }
            }
        }

        self.transform
            .check_layout()
            .map_err(|e| InjuryClassError::artifact(e.to_string()))?;
        self.classifier.check()?;

        if self.transform.output_width() != self.classifier.n_features() {
            return Err(InjuryClassError::artifact(format!(
                "transform produces {} columns but the classifier expects {}",
                self.transform.output_width(),
                self.classifier.n_features()
            )));
        }
        if self.classifier.n_classes() != InjuryLabel::COUNT {
            return Err(InjuryClassError::artifact(format!(
                "classifier has {} classes, expected {}",
                self.classifier.n_classes(),
                InjuryLabel::COUNT
            )));
        }
        Ok(())
    }
}

/// A trained model plus the metadata written to its header.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub model_id: ModelId,
    pub created_at: DateTime<Utc>,
    pub tool_version: String,
    /// Number of samples the classifier was fit on.
    pub train_samples: usize,
    pub payload: ModelPayload,
}

impl ModelArtifact {
    pub fn new(payload: ModelPayload, train_samples: usize) -> Self {
        Self {
            model_id: ModelId::new(),
            created_at: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            train_samples,
            payload,
        }
    }

    /// Write the artifact atomically: the bytes go to `.{name}.{model_id}.tmp` in the
    /// target directory, are flushed, then renamed over `path`.
    #[instrument(skip_all, fields(path = %path.display(), model_id = %self.model_id))]
    pub fn save(&self, path: &Path) -> Result<ArtifactHeader> {
        self.payload.validate()?;

        let payload = serde_json::to_vec(&self.payload)
            .map_err(|e| InjuryClassError::artifact(format!("serialize payload: {e}")))?;

        let header = ArtifactHeader {
            format: ARTIFACT_FORMAT.to_string(),
            schema_version: CURRENT_SCHEMA_VERSION,
            model_id: self.model_id.clone(),
            tool_version: self.tool_version.clone(),
            created_at: self.created_at,
            train_samples: self.train_samples,
            payload_len: payload.len(),
            payload_sha256: sha256_hex(&payload),
        };
        let header_line = serde_json::to_vec(&header)
            .map_err(|e| InjuryClassError::artifact(format!("serialize header: {e}")))?;

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| InjuryClassError::io(dir, e))?;

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| InjuryClassError::artifact(format!("invalid artifact path: {}", path.display())))?;
        let temp = dir.join(format!(".{filename}.{}.tmp", self.model_id));

        let write = || -> std::io::Result<()> {
            let mut file = std::fs::File::create(&temp)?;
            file.write_all(&header_line)?;
            file.write_all(b"\n")?;
            file.write_all(&payload)?;
            file.sync_all()
        };
        if let Err(e) = write() {
            let _ = std::fs::remove_file(&temp);
            return Err(InjuryClassError::io(&temp, e));
        }

        // Atomic rename
        std::fs::rename(&temp, path).map_err(|e| {
            let _ = std::fs::remove_file(&temp);
            InjuryClassError::io(path, e)
        })?;

        info!(
            bytes = header_line.len() + 1 + payload.len(),
            sha256 = %header.payload_sha256,
            "model artifact written"
        );
        Ok(header)
    }

    /// Read and fully verify an artifact.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| InjuryClassError::io(path, e))?;
        let (header, payload) = split_header(&bytes)?;
        verify_header(&header, payload)?;

        let payload: ModelPayload = serde_json::from_slice(payload)
            .map_err(|e| InjuryClassError::artifact(format!("invalid payload: {e}")))?;
        payload.validate()?;

        debug!(
            model_id = %header.model_id,
            trees = payload.classifier.n_trees(),
            width = payload.transform.output_width(),
            "model artifact verified"
        );

        Ok(Self {
            model_id: header.model_id,
            created_at: header.created_at,
            tool_version: header.tool_version,
            train_samples: header.train_samples,
            payload,
        })
    }
}

/// Read only the header line of an artifact, without verifying the payload.
pub fn read_header(path: &Path) -> Result<ArtifactHeader> {
    let bytes = std::fs::read(path).map_err(|e| InjuryClassError::io(path, e))?;
    split_header(&bytes).map(|(header, _)| header)
}

fn split_header(bytes: &[u8]) -> Result<(ArtifactHeader, &[u8])> {
    let newline = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| InjuryClassError::artifact("missing header line"))?;
    let header: ArtifactHeader = serde_json::from_slice(&bytes[..newline])
        .map_err(|e| InjuryClassError::artifact(format!("invalid header: {e}")))?;
    Ok((header, &bytes[newline + 1..]))
}

fn verify_header(header: &ArtifactHeader, payload: &[u8]) -> Result<()> {
    if header.format != ARTIFACT_FORMAT {
        return Err(InjuryClassError::artifact(format!(
            "unexpected format '{}' (expected '{ARTIFACT_FORMAT}')",
            header.format
        )));
    }
    if header.schema_version != CURRENT_SCHEMA_VERSION {
        return Err(InjuryClassError::artifact(format!(
            "unsupported schema_version: {} (expected {})",
            header.schema_version, CURRENT_SCHEMA_VERSION
        )));
    }
    if payload.len() != header.payload_len {
        return Err(InjuryClassError::artifact(format!(
            "payload is {} bytes, header says {}",
            payload.len(),
            header.payload_len
        )));
    }
    let actual = sha256_hex(payload);
    if actual != header.payload_sha256 {
        return Err(InjuryClassError::artifact(format!(
            "checksum mismatch: expected {}, got {actual}",
            header.payload_sha256
        )));
    }
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
