use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::StoreError;
use crate::store::{column_count, read_records, Record, RecordSink, RecordStore, SCHEMA};

/// Shape of a store, as printed by `stats`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSummary {
    pub rows: usize,
    /// Header width, including columns outside the schema.
    pub columns: usize,
    /// Empty-field count per column, in [`SCHEMA`] order.
    pub missing: [(&'static str, usize); 3],
    pub duplicates: usize,
    pub preview: Vec<Record>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanReport {
    pub before: usize,
    pub dropped_incomplete: usize,
    pub dropped_duplicates: usize,
    pub after: usize,
}

fn is_incomplete(record: &Record) -> bool {
    [&record.title, &record.page_contents, &record.statements]
        .iter()
        .any(|f| f.trim().is_empty())
}

/// Count rows, empty fields and exact duplicates; keep the first `preview` rows.
///
/// Duplicate detection holds every distinct row in memory.
pub fn summarize(path: &Path, preview: usize) -> Result<StoreSummary, StoreError> {
    let mut summary = StoreSummary {
        rows: 0,
        columns: column_count(path)?,
        missing: [(SCHEMA[0], 0), (SCHEMA[1], 0), (SCHEMA[2], 0)],
        duplicates: 0,
        preview: Vec::with_capacity(preview),
    };
    let mut seen = HashSet::new();

    for row in read_records(path)? {
        let record = row?;
        summary.rows += 1;

        let fields = [&record.title, &record.page_contents, &record.statements];
        for (slot, field) in summary.missing.iter_mut().zip(fields) {
            if field.trim().is_empty() {
                slot.1 += 1;
            }
        }

        if summary.preview.len() < preview {
            summary.preview.push(record.clone());
        }
        if !seen.insert(record) {
            summary.duplicates += 1;
        }
    }
    Ok(summary)
}

/// Drop rows with an empty field, then exact duplicates (first one wins),
/// and replace the store with the result.
pub fn clean(path: &Path) -> Result<CleanReport, StoreError> {
    let rows = read_records(path)?;
    let tmp = temp_sibling(path);

    let report = write_clean_rows(rows, &tmp).and_then(|report| {
        std::fs::rename(&tmp, path)
            .map(|()| report)
            .map_err(|source| StoreError::Write { path: path.to_path_buf(), source })
    });
    let report = match report {
        Ok(report) => report,
        Err(e) => {
            if tmp.exists() {
                if let Err(rm) = std::fs::remove_file(&tmp) {
                    warn!("Cannot remove {:?}: {}", tmp, rm);
                }
            }
            return Err(e);
        }
    };

    info!(
        "Cleaned {:?}: {} -> {} rows ({} incomplete, {} duplicates)",
        path, report.before, report.after, report.dropped_incomplete, report.dropped_duplicates
    );
    Ok(report)
}

fn write_clean_rows(
    rows: impl Iterator<Item = Result<Record, StoreError>>,
    tmp: &Path,
) -> Result<CleanReport, StoreError> {
    let mut report = CleanReport::default();
    let mut seen = HashSet::new();
    let mut out = RecordStore::create(tmp)?;

    for row in rows {
        let record = row?;
        report.before += 1;
        if is_incomplete(&record) {
            report.dropped_incomplete += 1;
            continue;
        }
        if seen.contains(&record) {
            report.dropped_duplicates += 1;
            continue;
        }
        out.append(&record)?;
        seen.insert(record);
    }
    report.after = out.appended();
    Ok(report)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
