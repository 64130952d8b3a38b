use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ConvertError {
    #[error("invalid hum id: {0}")]
    InvalidHumId(String),

    #[error("invalid dataset identifier: {0}")]
    InvalidDatasetId(String),

    #[error("invalid language tag: {0}")]
    InvalidLang(String),

    #[error("missing config file humdb-conv.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("DDBJ search request failed: {0}")]
    DdbjHttp(String),

    #[error("DDBJ search returned status {status}: {message}")]
    DdbjStatus { status: u16, message: String },

    #[error("failed to parse normalized snapshot {path}: {message}")]
    SnapshotParse { path: String, message: String },

    #[error("no normalized snapshots found for {0}")]
    NoSnapshots(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
