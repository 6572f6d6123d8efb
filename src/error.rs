use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the extraction pipeline.
#[derive(Error, Debug)]
pub enum EtdError {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write output: {0}")]
    Output(#[source] std::io::Error),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("CSV error in {path:?}: {source}")]
    CsvFile {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML document has no root element")]
    EmptyDocument,

    #[error("Unbalanced XML: {0}")]
    Unbalanced(String),

    #[error("Invalid JSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EtdError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EtdError::Io { path: path.into(), source }
    }

    pub fn csv_file(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        EtdError::CsvFile { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, EtdError>;
