use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StoreError;

pub const TITLE: &str = "Title";
pub const PAGE_CONTENTS: &str = "PageContents";
pub const STATEMENTS: &str = "dbpediaTriples";
pub const STATEMENTS_ALIAS: &str = "Statements";

/// Column order written to a freshly created store.
pub const SCHEMA: [&str; 3] = [TITLE, PAGE_CONTENTS, STATEMENTS];

/// One fetched page plus the statements found for its subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "PageContents")]
    pub page_contents: String,
    #[serde(rename = "dbpediaTriples", alias = "Statements")]
    pub statements: String,
}

impl Record {
    fn field(&self, column: Column) -> &str {
        match column {
            Column::Title => &self.title,
            Column::PageContents => &self.page_contents,
            Column::Statements => &self.statements,
            Column::Extra => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Title,
    PageContents,
    Statements,
    Extra,
}

/// Where records go. The collect loop only needs this much of a store.
pub trait RecordSink {
    fn append(&mut self, record: &Record) -> Result<(), StoreError>;
}

/// Append-only CSV file bound to the column order found in (or written to)
/// its header. Holds no rows in memory.
pub struct RecordStore {
    path: PathBuf,
    columns: Vec<Column>,
    writer: csv::Writer<File>,
    appended: usize,
}

impl RecordStore {
    /// Open an existing store for appending, or create it with the default header.
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let existing = path
            .metadata()
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false);

        if !existing {
            return Self::create(path);
        }

        let columns = read_header(path)?;
        let complete = complete_len(path)?;
        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|source| StoreError::Open { path: path.to_path_buf(), source })?;
        let write_err = |source| StoreError::Write { path: path.to_path_buf(), source };
        let len = file.metadata().map_err(write_err)?.len();

        if complete == 0 {
            // Header line without its terminator.
            file.write_all(b"\n").map_err(write_err)?;
            file.sync_data().map_err(write_err)?;
        } else if complete < len {
            warn!(
                "Dropping {} trailing bytes of an interrupted row in {:?}",
                len - complete,
                path
            );
            file.set_len(complete).map_err(write_err)?;
            file.sync_data().map_err(write_err)?;
        }

        info!("Appending to existing store {:?}", path);
        Ok(Self::from_file(path, columns, file))
    }

    /// Create (or truncate) a store and write the header row.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|source| StoreError::Open { path: path.to_path_buf(), source })?;
        }
        let file = File::create(path)
            .map_err(|source| StoreError::Open { path: path.to_path_buf(), source })?;

        let mut store = Self::from_file(
            path,
            vec![Column::Title, Column::PageContents, Column::Statements],
            file,
        );
        store
            .writer
            .write_record(SCHEMA)
            .map_err(|source| store.csv_error(source))?;
        store.sync()?;
        info!("Created store {:?}", path);
        Ok(store)
    }

    fn from_file(path: &Path, columns: Vec<Column>, file: File) -> Self {
        let writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        RecordStore {
            path: path.to_path_buf(),
            columns,
            writer,
            appended: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written through this handle.
    pub fn appended(&self) -> usize {
        self.appended
    }

    fn sync(&mut self) -> Result<(), StoreError> {
        self.writer.flush().map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        self.writer.get_ref().sync_data().map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn csv_error(&self, source: csv::Error) -> StoreError {
        StoreError::Csv { path: self.path.clone(), source }
    }
}

impl RecordSink for RecordStore {
    /// Write one row and flush it to disk before returning.
    fn append(&mut self, record: &Record) -> Result<(), StoreError> {
        let row: Vec<&str> = self.columns.iter().map(|c| record.field(*c)).collect();
        self.writer
            .write_record(&row)
            .map_err(|source| StoreError::Csv { path: self.path.clone(), source })?;
        self.sync()?;
        self.appended += 1;
        debug!(title = %record.title, "appended record {}", self.appended);
        Ok(())
    }
}

fn read_header(path: &Path) -> Result<Vec<Column>, StoreError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|source| StoreError::Csv { path: path.to_path_buf(), source })?;
    let headers = reader
        .headers()
        .map_err(|source| StoreError::Csv { path: path.to_path_buf(), source })?;

    let find = |names: &[&str], column: &'static str| -> Result<usize, StoreError> {
        headers
            .iter()
            .position(|h| names.contains(&h.trim()))
            .ok_or(StoreError::Schema { path: path.to_path_buf(), column })
    };
    let title = find(&[TITLE], TITLE)?;
    let contents = find(&[PAGE_CONTENTS], PAGE_CONTENTS)?;
    let statements = find(&[STATEMENTS, STATEMENTS_ALIAS], STATEMENTS)?;

    // Extra columns (e.g. a leftover index column) are written back empty.
    let columns = (0..headers.len())
        .map(|i| {
            if i == title {
                Column::Title
            } else if i == contents {
                Column::PageContents
            } else if i == statements {
                Column::Statements
            } else {
                Column::Extra
            }
        })
        .collect();
    Ok(columns)
}

/// Length of the prefix of `path` made of whole rows: up to and including
/// the last line terminator outside a quoted field.
fn complete_len(path: &Path) -> Result<u64, StoreError> {
    let file = File::open(path)
        .map_err(|source| StoreError::Open { path: path.to_path_buf(), source })?;
    let mut in_quotes = false;
    let mut end = 0;
    for (offset, byte) in BufReader::new(file).bytes().enumerate() {
        let byte = byte.map_err(|source| StoreError::Open { path: path.to_path_buf(), source })?;
        match byte {
            // A doubled quote inside a field toggles twice.
            b'"' => in_quotes = !in_quotes,
            b'\n' if !in_quotes => end = offset as u64 + 1,
            _ => {}
        }
    }
    Ok(end)
}

/// Number of columns in the header of `path`, extra columns included.
pub fn column_count(path: impl AsRef<Path>) -> Result<usize, StoreError> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .map_err(|source| StoreError::Csv { path: path.to_path_buf(), source })?;
    let headers = reader
        .headers()
        .map_err(|source| StoreError::Csv { path: path.to_path_buf(), source })?;
    Ok(headers.len())
}

/// Whether `a` and `b` name the same file once `.`, `..` and symlinks are
/// resolved. `b` does not have to exist yet.
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (resolve(a), resolve(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn resolve(path: &Path) -> Option<PathBuf> {
    if let Ok(real) = path.canonicalize() {
        return Some(real);
    }
    // Missing directories on the way get created later, so `..` can be
    // folded lexically once the path is absolute.
    let mut folded = PathBuf::new();
    for component in std::path::absolute(path).ok()?.components() {
        match component {
            Component::ParentDir => {
                folded.pop();
            }
            Component::CurDir => {}
            other => folded.push(other),
        }
    }
    if let Ok(real) = folded.canonicalize() {
        return Some(real);
    }
    let name = folded.file_name()?.to_os_string();
    match folded.parent().map(Path::canonicalize) {
        Some(Ok(dir)) => Some(dir.join(name)),
        _ => Some(folded),
    }
}

/// Stream the records of a store in file order, mapping columns by header name.
pub fn read_records(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Record, StoreError>>, StoreError> {
    let path = path.as_ref().to_path_buf();
    let reader = csv::Reader::from_path(&path)
        .map_err(|source| StoreError::Csv { path: path.clone(), source })?;
    Ok(reader
        .into_deserialize::<Record>()
        .map(move |row| row.map_err(|source| StoreError::Csv { path: path.clone(), source })))
}
