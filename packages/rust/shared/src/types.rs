//! Core domain types: the label vocabulary and model artifact metadata.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current schema version for the model artifact format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Format tag written at the start of every artifact header.
pub const ARTIFACT_FORMAT: &str = "injuryclass-model";

// ---------------------------------------------------------------------------
// InjuryLabel
// ---------------------------------------------------------------------------

/// The five injury classes. Discriminants are the stable class indices and
/// must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjuryLabel {
    Sprain = 0,
    Strain = 1,
    Fracture = 2,
    Dislocation = 3,
    Other = 4,
}

impl InjuryLabel {
    /// All classes in index order.
    pub const ALL: [InjuryLabel; 5] = [
        InjuryLabel::Sprain,
        InjuryLabel::Strain,
        InjuryLabel::Fracture,
        InjuryLabel::Dislocation,
        InjuryLabel::Other,
    ];

    /// Number of classes.
    pub const COUNT: usize = Self::ALL.len();

    /// The designated "unknown/other" class, also the universal fallback.
    pub const DEFAULT: InjuryLabel = InjuryLabel::Other;

    /// Stable class index (0–4).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look up a class by index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The human-readable label printed by the inference entrypoint.
    pub fn display_name(self) -> &'static str {
        match self {
            InjuryLabel::Sprain => "Esguince",
            InjuryLabel::Strain => "Desgarre",
            InjuryLabel::Fracture => "Fractura",
            InjuryLabel::Dislocation => "Luxación",
            InjuryLabel::Other => "Otra lesión",
        }
    }

    /// English class name, used in diagnostics.
    pub fn english_name(self) -> &'static str {
        match self {
            InjuryLabel::Sprain => "sprain",
            InjuryLabel::Strain => "strain",
            InjuryLabel::Fracture => "fracture",
            InjuryLabel::Dislocation => "dislocation",
            InjuryLabel::Other => "other",
        }
    }

    /// Map a raw dataset label to a class.
    ///
    /// Case, surrounding whitespace, inner whitespace runs and accents are
    /// ignored, so `" Luxación "` and `"LUXACION"` are the same class.
    /// Returns `None` for anything outside the vocabulary.
    pub fn from_raw(raw: &str) -> Option<Self> {
        static WHITESPACE_RUN: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

        let lowered = raw.trim().to_lowercase();
        let collapsed = WHITESPACE_RUN.replace_all(&lowered, " ");
        let folded = fold_diacritics(&collapsed);

        match folded.as_str() {
            "esguince" | "sprain" => Some(InjuryLabel::Sprain),
            "desgarre" | "strain" => Some(InjuryLabel::Strain),
            "fractura" | "fracture" => Some(InjuryLabel::Fracture),
            "luxacion" | "dislocation" => Some(InjuryLabel::Dislocation),
            "otra" | "otra lesion" | "other" | "other injury" => Some(InjuryLabel::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for InjuryLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Replace accented Latin vowels (and `ñ`) with their base letter.
fn fold_diacritics(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// ModelId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one trained model (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(pub Uuid);

impl ModelId {
    /// Generate a new time-sortable model identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ModelId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ModelId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// ArtifactHeader
// ---------------------------------------------------------------------------

/// First line of a model artifact file. Describes and checksums the payload
/// that follows it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Always [`ARTIFACT_FORMAT`].
    pub format: String,
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Unique identifier for this model.
    pub model_id: ModelId,
    /// Tool version that trained the model.
    pub tool_version: String,
    /// When training finished.
    pub created_at: DateTime<Utc>,
    /// Number of samples the classifier was fit on.
    pub train_samples: usize,
    /// Payload size in bytes.
    pub payload_len: usize,
    /// Lowercase hex SHA-256 of the payload bytes.
    pub payload_sha256: String,
}
