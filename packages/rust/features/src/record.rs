//! Raw input records as received from a JSON payload or a CSV row.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use injuryclass_shared::{InjuryClassError, Result};

/// One scalar field value. Absent fields are simply not present in the record.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl RawValue {
    /// Numeric view: numbers as-is, text parsed after trimming, booleans as 1/0.
    /// Non-finite results count as missing.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            RawValue::Number(n) => *n,
            RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
            RawValue::Bool(b) => f64::from(u8::from(*b)),
        };
        value.is_finite().then_some(value)
    }

    /// String view used for categorical fields.
    pub fn as_text(&self) -> String {
        match self {
            RawValue::Number(n) => n.to_string(),
            RawValue::Text(s) => s.clone(),
            RawValue::Bool(b) => b.to_string(),
        }
    }
}

/// Field name → scalar mapping for a single record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: RawValue) {
        self.fields.insert(name.into(), value);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: RawValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse a serialized JSON object.
    ///
    /// Fails only when the payload is not JSON or not an object; individual
    /// fields of unexpected type are dropped and later treated as missing.
    pub fn from_json_str(payload: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| InjuryClassError::input(format!("payload is not valid JSON: {e}")))?;
        Self::from_json_value(value)
    }

    /// Convert an already parsed JSON value.
    pub fn from_json_value(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(InjuryClassError::input("payload must be a JSON object"));
        };

        let mut record = Self::new();
        for (name, value) in map {
            match value {
                Value::Null => {}
                Value::Bool(b) => record.insert(name, RawValue::Bool(b)),
                Value::Number(n) => {
                    if let Some(f) = n.as_f64() {
                        record.insert(name, RawValue::Number(f));
                    }
                }
                Value::String(s) => record.insert(name, RawValue::Text(s)),
                Value::Array(_) | Value::Object(_) => {
                    debug!(field = %name, "ignoring non-scalar field");
                }
            }
        }
        Ok(record)
    }

    /// Build a record from `(column, cell)` pairs of a tabular row.
    /// Empty cells are absent, matching how missing values appear in CSV.
    pub fn from_text_cells<'a, I>(cells: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut record = Self::new();
        for (name, cell) in cells {
            if !cell.trim().is_empty() {
                record.insert(name, RawValue::Text(cell.to_string()));
            }
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_coercion() {
        assert_eq!(RawValue::Number(72.0).as_f64(), Some(72.0));
        assert_eq!(RawValue::Text(" 1.75 ".into()).as_f64(), Some(1.75));
        assert_eq!(RawValue::Bool(true).as_f64(), Some(1.0));
        assert_eq!(RawValue::Bool(false).as_f64(), Some(0.0));
        assert_eq!(RawValue::Text("".into()).as_f64(), None);
        assert_eq!(RawValue::Text("alto".into()).as_f64(), None);
        assert_eq!(RawValue::Text("NaN".into()).as_f64(), None);
        assert_eq!(RawValue::Text("inf".into()).as_f64(), None);
    }

    #[test]
    fn json_object_parses() {
        let record = RawRecord::from_json_str(
            r#"{"edad":22,"nivel":"Amateur","entrena":true,"clima":null,"tags":[1,2]}"#,
        )
        .expect("parse");
        assert_eq!(record.get("edad"), Some(&RawValue::Number(22.0)));
        assert_eq!(record.get("nivel"), Some(&RawValue::Text("Amateur".into())));
        assert_eq!(record.get("entrena"), Some(&RawValue::Bool(true)));
        assert!(record.get("clima").is_none());
        assert!(record.get("tags").is_none());
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn malformed_payloads_are_input_errors() {
        let err = RawRecord::from_json_str("not valid json").unwrap_err();
        assert!(matches!(err, InjuryClassError::Input { .. }));

        let err = RawRecord::from_json_str("[1, 2, 3]").unwrap_err();
        assert!(err.to_string().contains("JSON object"));

        assert!(RawRecord::from_json_str("").is_err());
    }

    #[test]
    fn text_cells_skip_empty() {
        let record = RawRecord::from_text_cells([("edad", "25"), ("peso", ""), ("clima", "  ")]);
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("edad"), Some(&RawValue::Text("25".into())));
    }
}
