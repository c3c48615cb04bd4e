//! Error types for the simulation data layer.

use std::path::{Path, PathBuf};

use thiserror::Error;

use gsim_store::StoreError;

/// Result type for data-layer operations.
pub type DataResult<T> = Result<T, DataError>;

/// Errors raised by the data layer. Everything propagates straight to the
/// caller; corrupt files and absent backends are not transient, so there
/// are no retries anywhere in this crate.
#[derive(Debug, Error)]
pub enum DataError {
    /// A required lookup found nothing.
    #[error("{stem}{suffixes:?} not found in {root}")]
    NotFound {
        stem: String,
        suffixes: Vec<String>,
        root: PathBuf,
    },

    /// An on-disk array disagrees with the grid-size contract or the
    /// expected species count.
    #[error("shape mismatch for {name} in {path}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        name: String,
        path: PathBuf,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Time(#[from] gsim_common::TimeParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    pub(crate) fn not_found(stem: &str, suffixes: &[&str], root: &Path) -> Self {
        Self::NotFound {
            stem: stem.to_string(),
            suffixes: suffixes.iter().map(|s| s.to_string()).collect(),
            root: root.to_path_buf(),
        }
    }

    pub(crate) fn shape_mismatch(name: &str, path: &Path, expected: &[usize], found: &[usize]) -> Self {
        Self::ShapeMismatch {
            name: name.to_string(),
            path: path.to_path_buf(),
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}
