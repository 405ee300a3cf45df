//! Reading labeled CSV sources.

use std::path::Path;

use tracing::debug;

use injuryclass_features::RawRecord;
use injuryclass_shared::{InjuryClassError, Result};

/// Column holding the injury type in every labeled source.
pub const LABEL_COLUMN: &str = "tipo_lesion";

/// One row of a labeled source, before label mapping.
#[derive(Debug, Clone)]
pub struct SourceRow {
    /// Every non-empty cell of the row, label column included.
    pub record: RawRecord,
    /// Raw label cell, `None` when empty or the column is absent.
    pub label: Option<String>,
}

impl SourceRow {
    pub fn new(record: RawRecord, label: Option<String>) -> Self {
        Self { record, label }
    }
}

/// Rows of one source plus whether it carried a label column at all.
#[derive(Debug, Clone, Default)]
pub struct SourceTable {
    pub rows: Vec<SourceRow>,
    pub has_label_column: bool,
}

/// Read a CSV file with a header row into [`SourceRow`]s, in file order.
pub fn read_source(path: &Path) -> Result<SourceTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(path, e))?
        .iter()
        .map(str::to_string)
        .collect();
    let label_idx = headers.iter().position(|h| h == LABEL_COLUMN);

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| csv_error(path, e))?;

        let label = label_idx
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let raw = RawRecord::from_text_cells(
            headers.iter().map(String::as_str).zip(record.iter()),
        );
        rows.push(SourceRow::new(raw, label));
    }

    debug!(path = %path.display(), rows = rows.len(), columns = headers.len(), "read source");

    Ok(SourceTable {
        rows,
        has_label_column: label_idx.is_some(),
    })
}

pub(crate) fn csv_error(path: &Path, e: csv::Error) -> InjuryClassError {
    let message = e.to_string();
    match e.into_kind() {
        csv::ErrorKind::Io(source) => InjuryClassError::io(path, source),
        _ => InjuryClassError::Csv(format!("{}: {message}", path.display())),
    }
}
