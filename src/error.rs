use std::path::PathBuf;

use thiserror::Error;

/// Fetching the random document failed (network, timeout or non-2xx status).
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// The fetched document did not have the expected shape.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no title element in document from {0}")]
    MissingTitle(String),

    #[error("no body content in document from {0}")]
    MissingBody(String),
}

/// Knowledge-base query failure.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("query for {subject} failed: {source}")]
    Request {
        subject: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("endpoint returned HTTP {status} for {subject}")]
    Status { subject: String, status: u16 },

    #[error("malformed results for {subject}: {reason}")]
    Malformed { subject: String, reason: String },
}

/// Malformed statement block. `offset` is a byte offset into the
/// pre-sanitized block.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GrammarError {
    #[error("empty block")]
    Empty,

    #[error("expected {expected} at offset {offset}")]
    Expected { expected: &'static str, offset: usize },

    #[error("unterminated IRI starting at offset {0}")]
    UnterminatedIri(usize),

    #[error("invalid character {ch:?} in IRI at offset {offset}")]
    InvalidIriChar { ch: char, offset: usize },

    #[error("unterminated literal starting at offset {0}")]
    UnterminatedLiteral(usize),

    #[error("invalid escape sequence at offset {0}")]
    InvalidEscape(usize),

    #[error("invalid language tag at offset {0}")]
    InvalidLangTag(usize),
}

/// I/O or format failure on the persisted CSV store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cannot open store {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store {path:?} has an incompatible header: missing column {column}")]
    Schema { path: PathBuf, column: &'static str },

    #[error("csv error in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("write to {path:?} failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("output {output:?} is the input store {input:?}")]
    SameFile { input: PathBuf, output: PathBuf },
}

/// Any of the skippable per-iteration failures in the collect loop.
#[derive(Error, Debug)]
pub enum IterationError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}
