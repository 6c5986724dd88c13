//! Error types for the engine.
//!
//! Only I/O failures that would make a result wrong are errors. Malformed
//! package content is never an error; it is reported as a
//! [`Degradation`](crate::types::Degradation) and the scan continues.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to enumerate a package directory.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("package root does not exist: {0}")]
    MissingRoot(PathBuf),

    #[error("package root is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to stat package root {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to fingerprint one package. Fatal for that package only.
#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("cannot list {path}: {reason}")]
    Unlistable { path: PathBuf, reason: String },

    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to load a fingerprint corpus file.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("corpus file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read corpus {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("corpus {path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: &'static str },
}

/// Failure to read or write tabular output.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{path} has header {found:?}, expected {expected:?}")]
    HeaderMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// Failure to start feature extraction for a package. Problems with
/// individual files are degradations, not errors.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("JavaScript grammar could not be loaded: {0}")]
    Language(#[from] tree_sitter::LanguageError),
}

/// Failure of a batch run as a whole. Per-package failures are reported in
/// the outcomes instead.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Output(#[from] OutputError),
}
