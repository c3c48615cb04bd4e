//! Error types for container-backend operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the per-encoding backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Expected dataset/variable absent from an opened container
    #[error("missing key {key:?} in {path}")]
    MissingKey { key: String, path: PathBuf },

    /// File suffix or format tag not one of the known encodings, or the
    /// requested operation is not defined for it
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// The backend for this encoding was compiled out
    #[error("{0} backend not available in this build")]
    UnavailableBackend(&'static str),

    /// Malformed or truncated container contents
    #[error("invalid data in {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },

    #[cfg(feature = "hdf5")]
    #[error("HDF5: {0}")]
    Hdf5(#[from] hdf5_metno::Error),

    #[cfg(feature = "netcdf")]
    #[error("NetCDF: {0}")]
    NetCdf(#[from] netcdf::Error),
}

impl StoreError {
    pub(crate) fn invalid(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(path: &std::path::Path, key: &str) -> Self {
        Self::MissingKey {
            key: key.to_string(),
            path: path.to_path_buf(),
        }
    }
}
