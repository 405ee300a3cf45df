//! Concatenating raw CSV collections into a single dataset file.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};
use uuid::Uuid;

use injuryclass_shared::{InjuryClassError, Result};

use crate::source::csv_error;

/// Summary of a [`combine_csv`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineResult {
    /// File that was written.
    pub output: PathBuf,
    /// Data rows written (header excluded).
    pub rows: usize,
    /// Columns in the combined header.
    pub columns: usize,
}

/// Concatenate `sources` into `out`.
///
/// The output header is the union of the input headers, columns ordered by
/// first appearance. Cells for columns a source lacks are left empty. Rows
/// keep their source order. The file is written to a temp path and renamed
/// into place.
#[instrument(skip_all, fields(sources = sources.len(), out = %out.display()))]
pub fn combine_csv(sources: &[PathBuf], out: &Path) -> Result<CombineResult> {
    if sources.is_empty() {
        return Err(InjuryClassError::validation("no input datasets given"));
    }

    let mut columns: Vec<String> = Vec::new();
    let mut tables: Vec<(Vec<usize>, Vec<csv::StringRecord>)> = Vec::with_capacity(sources.len());

    for path in sources {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_path(path)
            .map_err(|e| csv_error(path, e))?;

        let headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();
        let positions: Vec<usize> = headers
            .iter()
            .map(|name| match columns.iter().position(|c| c == name) {
                Some(pos) => pos,
                None => {
                    columns.push(name.to_string());
                    columns.len() - 1
                }
            })
            .collect();

        let records = reader
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| csv_error(path, e))?;

        debug!(path = %path.display(), rows = records.len(), "read input dataset");
        tables.push((positions, records));
    }

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| InjuryClassError::io(parent, e))?;
    }

    let temp = temp_path(out);
    let rows = match write_combined(&temp, &columns, &tables) {
        Ok(rows) => rows,
        Err(e) => {
            let _ = std::fs::remove_file(&temp);
            return Err(e);
        }
    };

    std::fs::rename(&temp, out).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        InjuryClassError::io(out, e)
    })?;

    info!(rows, columns = columns.len(), path = %out.display(), "combined dataset written");

    Ok(CombineResult {
        output: out.to_path_buf(),
        rows,
        columns: columns.len(),
    })
}

fn write_combined(
    temp: &Path,
    columns: &[String],
    tables: &[(Vec<usize>, Vec<csv::StringRecord>)],
) -> Result<usize> {
    let mut writer = csv::Writer::from_path(temp).map_err(|e| csv_error(temp, e))?;
    writer.write_record(columns).map_err(|e| csv_error(temp, e))?;

    let mut rows = 0;
    for (positions, records) in tables {
        for record in records {
            let mut line = vec![""; columns.len()];
            for (cell, &pos) in record.iter().zip(positions) {
                line[pos] = cell;
            }
            writer.write_record(&line).map_err(|e| csv_error(temp, e))?;
            rows += 1;
        }
    }
    writer.flush().map_err(|e| InjuryClassError::io(temp, e))?;
    Ok(rows)
}

/// Hidden sibling of `target`, unique per call so concurrent runs never share it.
fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "dataset.csv".into());
    target.with_file_name(format!(".{name}.{}.tmp", Uuid::now_v7()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "ic-combine-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn assert_no_hidden_files(dir: &Path) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.starts_with('.'), "temp file left behind: {name}");
        }
    }

    #[test]
    fn combines_with_header_union() {
        let dir = temp_dir();
        let a = dir.join("dataset_soccerprev.csv");
        let b = dir.join("dataset_transfermark.csv");
        std::fs::write(&a, "edad,peso,tipo_lesion\n22,72,Esguince\n").unwrap();
        std::fs::write(&b, "edad,tipo_lesion,clima\n30,Fractura,Lluvia\n31,Otra,Seco\n").unwrap();

        let out = dir.join("dataset.csv");
        let result = combine_csv(&[a, b], &out).unwrap();
        assert_eq!(result.rows, 3);
        assert_eq!(result.columns, 4);

        let content = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "edad,peso,tipo_lesion,clima");
        assert_eq!(lines[1], "22,72,Esguince,");
        assert_eq!(lines[2], "30,,Fractura,Lluvia");
        assert_eq!(lines[3], "31,,Otra,Seco");

        assert_no_hidden_files(&dir);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn combined_output_feeds_the_assembler() {
        let dir = temp_dir();
        let a = dir.join("a.csv");
        let b = dir.join("b.csv");
        std::fs::write(&a, "edad,tipo_lesion\n22,Esguince\n").unwrap();
        std::fs::write(&b, "tipo_lesion,edad\nDesgarre,28\n").unwrap();

        let out = dir.join("dataset.csv");
        combine_csv(&[a, b], &out).unwrap();

        let assembled = crate::assemble(&out, &[]).unwrap();
        assert_eq!(assembled.corpus.class_indices(), vec![0, 1]);
        assert_eq!(assembled.corpus.samples()[1].features.numeric()[0], Some(28.0));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_input_fails_without_output() {
        let dir = temp_dir();
        let out = dir.join("dataset.csv");
        let err = combine_csv(&[dir.join("missing.csv")], &out).unwrap_err();
        assert!(matches!(err, InjuryClassError::Io { .. }));
        assert!(!out.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let dir = temp_dir();
        let a = dir.join("a.csv");
        std::fs::write(&a, "edad,tipo_lesion\n22,Esguince\n").unwrap();

        // a non-empty directory at the target makes the final rename fail
        let out = dir.join("dataset.csv");
        std::fs::create_dir_all(out.join("occupied")).unwrap();

        assert!(combine_csv(&[a], &out).is_err());
        assert_no_hidden_files(&dir);
        assert!(out.is_dir());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn temp_paths_are_unique_per_call() {
        let target = Path::new("/data/dataset.csv");
        let first = temp_path(target);
        let second = temp_path(target);
        assert_ne!(first, second);
        assert_eq!(first.parent(), target.parent());
        let name = first.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(".dataset.csv.") && name.ends_with(".tmp"));
    }

    #[test]
    fn no_inputs_is_rejected() {
        let dir = temp_dir();
        assert!(combine_csv(&[], &dir.join("dataset.csv")).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
