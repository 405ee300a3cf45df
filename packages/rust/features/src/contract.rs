//! The fixed 18-field feature layout and its derivation rules.

use crate::record::RawRecord;

/// Number of numeric features.
pub const NUMERIC_COUNT: usize = 15;

/// Number of categorical features.
pub const CATEGORICAL_COUNT: usize = 3;

/// Numeric features in contract order. `imc` and `carga_total_min` are derived.
pub const NUMERIC_FIELDS: [&str; NUMERIC_COUNT] = [
    "edad",
    "peso",
    "estatura_m",
    "imc",
    "frecuencia_juego_semana",
    "duracion_partido_min",
    "carga_total_min",
    "entrena",
    "calienta",
    "calentamiento_min",
    "horas_sueno",
    "hidratacion_ok",
    "lesiones_ultimo_anno",
    "recuperacion_sem",
    "posicion",
];

/// Categorical features in contract order.
pub const CATEGORICAL_FIELDS: [&str; CATEGORICAL_COUNT] = ["nivel", "superficie", "clima"];

/// All 18 features: numeric first, then categorical.
pub const FEATURE_NAMES: [&str; NUMERIC_COUNT + CATEGORICAL_COUNT] = [
    "edad",
    "peso",
    "estatura_m",
    "imc",
    "frecuencia_juego_semana",
    "duracion_partido_min",
    "carga_total_min",
    "entrena",
    "calienta",
    "calentamiento_min",
    "horas_sueno",
    "hidratacion_ok",
    "lesiones_ultimo_anno",
    "recuperacion_sem",
    "posicion",
    "nivel",
    "superficie",
    "clima",
];

/// Positions of the numeric fields the contract reads or derives.
pub mod numeric {
    pub const PESO: usize = 1;
    pub const ESTATURA_M: usize = 2;
    pub const IMC: usize = 3;
    pub const FRECUENCIA_JUEGO_SEMANA: usize = 4;
    pub const DURACION_PARTIDO_MIN: usize = 5;
    pub const CARGA_TOTAL_MIN: usize = 6;
}

/// Positions of the categorical fields.
pub mod categorical {
    pub const NIVEL: usize = 0;
    pub const SUPERFICIE: usize = 1;
    pub const CLIMA: usize = 2;
}

/// One record mapped onto the feature layout. `None` marks a missing value
/// left for imputation.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    numeric: [Option<f64>; NUMERIC_COUNT],
    categorical: [Option<String>; CATEGORICAL_COUNT],
}

impl FeatureVector {
    /// Apply the contract to a raw record. Never fails: anything unusable
    /// becomes a missing value.
    pub fn from_record(record: &RawRecord) -> Self {
        let mut values: [Option<f64>; NUMERIC_COUNT] = [None; NUMERIC_COUNT];
        for (slot, name) in values.iter_mut().zip(NUMERIC_FIELDS) {
            *slot = record.get(name).and_then(|v| v.as_f64());
        }

        values[numeric::IMC] = body_mass_index(values[numeric::PESO], values[numeric::ESTATURA_M]);
        values[numeric::CARGA_TOTAL_MIN] = session_load(
            values[numeric::DURACION_PARTIDO_MIN],
            values[numeric::FRECUENCIA_JUEGO_SEMANA],
        );

        let categorical = CATEGORICAL_FIELDS
            .map(|name| record.get(name).and_then(|v| normalize_category(&v.as_text())));

        Self {
            numeric: values,
            categorical,
        }
    }

    /// Assemble a vector from already-normalized parts.
    pub fn from_parts(
        numeric: [Option<f64>; NUMERIC_COUNT],
        categorical: [Option<String>; CATEGORICAL_COUNT],
    ) -> Self {
        Self {
            numeric,
            categorical,
        }
    }

    pub fn numeric(&self) -> &[Option<f64>; NUMERIC_COUNT] {
        &self.numeric
    }

    pub fn categorical(&self) -> &[Option<String>; CATEGORICAL_COUNT] {
        &self.categorical
    }

    pub fn imc(&self) -> Option<f64> {
        self.numeric[numeric::IMC]
    }

    pub fn carga_total_min(&self) -> Option<f64> {
        self.numeric[numeric::CARGA_TOTAL_MIN]
    }

    /// Count of missing fields, for debug logging.
    pub fn missing_count(&self) -> usize {
        self.numeric.iter().filter(|v| v.is_none()).count()
            + self.categorical.iter().filter(|v| v.is_none()).count()
    }
}

/// `peso / estatura_m²`, defined only for a strictly positive height.
pub fn body_mass_index(weight: Option<f64>, height: Option<f64>) -> Option<f64> {
    let height = height.filter(|h| *h > 0.0)?;
    let bmi = weight? / (height * height);
    bmi.is_finite().then_some(bmi)
}

/// `duracion_partido_min × frecuencia_juego_semana`.
pub fn session_load(duration: Option<f64>, frequency: Option<f64>) -> Option<f64> {
    let load = duration? * frequency?;
    load.is_finite().then_some(load)
}

/// Trim and lower-case a category; empty after trimming means missing.
pub fn normalize_category(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}
