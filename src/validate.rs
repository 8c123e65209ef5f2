use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::ntriples::Graph;
use crate::store::{read_records, same_file, RecordSink, RecordStore};

pub const VALID_FILE_NAME: &str = "validTriples.csv";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Distinct triples across every accepted block.
    pub graph_size: usize,
    pub valid: usize,
    pub invalid: usize,
}

/// Default location of the filtered store: next to the input.
pub fn default_output(input: &Path) -> std::path::PathBuf {
    input
        .parent()
        .map(|dir| dir.join(VALID_FILE_NAME))
        .unwrap_or_else(|| VALID_FILE_NAME.into())
}

/// Parse the statements of every record in `input` and copy the records
/// whose block parses into a new store at `output`.
///
/// The whole input is scanned. `output` is only created once a valid
/// record turns up; a file left at `output` by an earlier run is removed
/// when none does. `output` may not name the input, however it is spelled.
pub fn classify(input: &Path, output: &Path) -> Result<ValidationReport, StoreError> {
    let rows = read_records(input)?;
    if same_file(input, output) {
        return Err(StoreError::SameFile {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        });
    }

    let mut graph = Graph::new();
    let mut report = ValidationReport::default();
    let mut valid_store: Option<RecordStore> = None;

    for (index, row) in rows.enumerate() {
        let record = match row {
            Ok(record) => record,
            Err(StoreError::Csv { source, .. }) if !source.is_io_error() => {
                warn!(index, "Unreadable row {}: {}", index, source);
                report.invalid += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        match graph.parse_block(&record.statements) {
            Ok(added) => {
                report.valid += 1;
                if valid_store.is_none() {
                    valid_store = Some(RecordStore::create(output)?);
                }
                if let Some(store) = valid_store.as_mut() {
                    store.append(&record)?;
                }
                debug!(index, added, "valid block");
            }
            Err(e) => {
                warn!(index, title = %record.title, "Invalid statements in row {}: {}", index, e);
                report.invalid += 1;
            }
        }
    }

    report.graph_size = graph.len();
    match &valid_store {
        Some(store) => info!("Wrote {} valid rows to {:?}", store.appended(), store.path()),
        None if output.exists() => {
            std::fs::remove_file(output).map_err(|source| StoreError::Write {
                path: output.to_path_buf(),
                source,
            })?;
            info!("No valid rows; removed {:?} from an earlier run", output);
        }
        None => info!("No valid rows; {:?} not written", output),
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Record;
    use tempfile::TempDir;

    fn record(n: usize, statements: &str) -> Record {
        Record {
            title: format!("Title {n}"),
            page_contents: format!("Contents {n}"),
            statements: statements.to_string(),
        }
    }

    fn write_store(path: &Path, records: &[Record]) {
        let mut store = RecordStore::create(path).unwrap();
        for r in records {
            store.append(r).unwrap();
        }
    }

    fn good(n: usize) -> String {
        format!("<http://ex/s{n}> <http://ex/p> <http://ex/o> .\n<http://ex/s{n}> <http://ex/q> \"lit {n}\"@en .")
    }

    #[test]
    fn keeps_valid_rows_in_order() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("data.csv");
        let output = dir.path().join("valid.csv");
        let records = vec![
            record(1, &good(1)),
            record(2, "<http://ex/a> <http://ex/b> \"unterminated ."),
            record(3, &good(3)),
            record(4, "<http://ex/a> not-an-iri <http://ex/c> ."),
            record(5, &good(5)),
        ];
        write_store(&input, &records);

        let report = classify(&input, &output).unwrap();

        assert_eq!(report, ValidationReport { graph_size: 6, valid: 3, invalid: 2 });
        let kept: Vec<Record> = read_records(&output)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(kept, vec![records[0].clone(), records[2].clone(), records[4].clone()]);
    }

    #[test]
    fn no_output_without_valid_rows() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("data.csv");
        let output = dir.path().join("valid.csv");
        write_store(&input, &[record(1, ""), record(2, "<http://ex/a> .")]);

        let report = classify(&input, &output).unwrap();

        assert_eq!(report, ValidationReport { graph_size: 0, valid: 0, invalid: 2 });
        assert!(!output.exists());
    }

    #[test]
    fn stale_output_is_removed_without_valid_rows() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("data.csv");
        let output = dir.path().join("valid.csv");
        write_store(&output, &[record(9, &good(9))]);
        write_store(&input, &[record(1, "<http://ex/a> .")]);

        let report = classify(&input, &output).unwrap();

        assert_eq!(report.valid, 0);
        assert!(!output.exists());
    }

    #[test]
    fn refuses_an_output_that_aliases_the_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("data.csv");
        let records = vec![
            record(1, &good(1)),
            record(2, "<http://ex/a> ."),
            record(3, "<http://ex/a> <http://ex/b> ."),
        ];
        write_store(&input, &records);
        let before = std::fs::read_to_string(&input).unwrap();

        for alias in [dir.path().join("x/../data.csv"), dir.path().join("./data.csv")] {
            let err = classify(&input, &alias).unwrap_err();
            assert!(matches!(err, StoreError::SameFile { .. }), "{alias:?}: {err}");
        }

        assert_eq!(std::fs::read_to_string(&input).unwrap(), before);
        let kept: Vec<Record> = read_records(&input)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(kept, records);
    }

    #[test]
    fn empty_store_reports_zero() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("data.csv");
        write_store(&input, &[]);

        let report = classify(&input, &dir.path().join("valid.csv")).unwrap();
        assert_eq!(report, ValidationReport::default());
    }

    #[test]
    fn missing_input_is_a_store_error() {
        let dir = TempDir::new().unwrap();
        let err = classify(&dir.path().join("nope.csv"), &dir.path().join("v.csv")).unwrap_err();
        assert!(matches!(err, StoreError::Csv { .. }));
    }

    #[test]
    fn default_output_sits_next_to_input() {
        assert_eq!(
            default_output(Path::new("outputData/wikidata.csv")),
            Path::new("outputData/validTriples.csv")
        );
    }
}
