//! Per-encoding container backends for simulation state on disk.
//!
//! Three interchangeable encodings are supported: HDF5 (`.h5`, the
//! preferred hierarchical container), NetCDF-4 (`.nc`) and the legacy raw
//! flat-binary stream (`.dat`, read-only). The self-describing containers
//! sit behind the [`ArraySource`]/[`ArraySink`] traits and are selected
//! once per file via [`FileFormat::from_path`]; the raw encoding needs
//! layout context and lives in [`raw`].
//!
//! On-disk arrays keep the Fortran producer's dimension order. Backends do
//! not reorder anything on their own; axis bookkeeping belongs to the I/O
//! layer above.

pub mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5;
#[cfg(feature = "netcdf")]
pub mod netcdf;
pub mod raw;

use std::path::Path;

use ndarray::{ArrayD, ArrayViewD};

pub use error::{StoreError, StoreResult};

/// Read access to a named-array container.
///
/// One implementation per encoding. All reads convert to `f64`/`i64` in
/// memory regardless of the stored precision.
pub trait ArraySource {
    fn path(&self) -> &Path;

    /// Top-level dataset/variable names.
    fn keys(&self) -> StoreResult<Vec<String>>;

    fn contains(&self, name: &str) -> bool;

    /// Read a whole array in the container's storage order.
    fn array(&self, name: &str) -> StoreResult<ArrayD<f64>>;

    /// Read a scalar (or single-element) float dataset.
    fn scalar(&self, name: &str) -> StoreResult<f64>;

    /// Read a scalar (or single-element) integer dataset.
    fn int(&self, name: &str) -> StoreResult<i64>;

    /// Read a rank-1 integer dataset, accepting scalar encodings.
    fn int_vec(&self, name: &str) -> StoreResult<Vec<i64>>;
}

/// Write access to a named-array container.
pub trait ArraySink {
    fn path(&self) -> &Path;

    /// Write an array at 32-bit float precision, compressed where the
    /// backend supports it (rank >= 2 only).
    fn put_f32(&mut self, name: &str, data: ArrayViewD<'_, f64>) -> StoreResult<()>;

    /// Write an array at full 64-bit precision, uncompressed.
    fn put_f64(&mut self, name: &str, data: ArrayViewD<'_, f64>) -> StoreResult<()>;

    fn put_int(&mut self, name: &str, value: i64) -> StoreResult<()>;

    fn put_int_slice(&mut self, name: &str, values: &[i64]) -> StoreResult<()>;

    fn put_scalar(&mut self, name: &str, value: f64) -> StoreResult<()>;
}

/// The three supported on-disk encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Hdf5,
    NetCdf,
    Raw,
}

impl FileFormat {
    /// Container formats in lookup-preference order.
    pub const PREFERRED: [FileFormat; 2] = [FileFormat::Hdf5, FileFormat::NetCdf];

    /// Map a file suffix (with or without leading dot) to a format.
    pub fn from_suffix(suffix: &str) -> StoreResult<Self> {
        match suffix.trim_start_matches('.') {
            "h5" => Ok(Self::Hdf5),
            "nc" => Ok(Self::NetCdf),
            "dat" => Ok(Self::Raw),
            other => Err(StoreError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn from_path(path: &Path) -> StoreResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| StoreError::UnsupportedFormat(path.display().to_string()))?;
        Self::from_suffix(ext)
    }

    /// Suffix without the leading dot.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Hdf5 => "h5",
            Self::NetCdf => "nc",
            Self::Raw => "dat",
        }
    }

    /// Suffix with the leading dot, as it appears in filenames.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Hdf5 => ".h5",
            Self::NetCdf => ".nc",
            Self::Raw => ".dat",
        }
    }

    /// Was the backend for this encoding compiled in?
    pub fn available(&self) -> bool {
        match self {
            Self::Hdf5 => cfg!(feature = "hdf5"),
            Self::NetCdf => cfg!(feature = "netcdf"),
            Self::Raw => true,
        }
    }

    pub fn ensure_available(&self) -> StoreResult<()> {
        if self.available() {
            Ok(())
        } else {
            Err(StoreError::UnavailableBackend(match self {
                Self::Hdf5 => "HDF5",
                Self::NetCdf => "NetCDF",
                Self::Raw => "raw",
            }))
        }
    }
}

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose error messages to stderr even when
/// errors are handled gracefully by the Rust code (e.g. when probing for
/// optional datasets that don't exist). This disables that output by
/// calling `H5Eset_auto2` with null handlers; it only needs to happen once
/// per process but is safe to call repeatedly.
#[cfg(any(feature = "hdf5", feature = "netcdf"))]
pub fn silence_hdf5_errors() {
    use std::sync::Once;

    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and null handlers are a
        // documented way to disable error reporting.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

#[cfg(not(any(feature = "hdf5", feature = "netcdf")))]
pub fn silence_hdf5_errors() {}

/// Open a self-describing container for reading, dispatching on suffix.
///
/// Raw files need a record layout and a grid size; open those through
/// [`raw`] instead.
pub fn open(path: &Path) -> StoreResult<Box<dyn ArraySource>> {
    let format = FileFormat::from_path(path)?;
    format.ensure_available()?;
    match format {
        #[cfg(feature = "hdf5")]
        FileFormat::Hdf5 => Ok(Box::new(hdf5::Hdf5Source::open(path)?)),
        #[cfg(feature = "netcdf")]
        FileFormat::NetCdf => Ok(Box::new(netcdf::NetCdfSource::open(path)?)),
        FileFormat::Raw => Err(StoreError::UnsupportedFormat(
            "raw files need a record layout; use gsim_store::raw".to_string(),
        )),
        #[allow(unreachable_patterns)]
        _ => unreachable!("ensure_available rejected a disabled backend"),
    }
}

/// Create (truncate) a container for writing, dispatching on suffix.
///
/// The raw encoding is read-only legacy; asking for a raw sink is an
/// [`StoreError::UnsupportedFormat`].
pub fn create(path: &Path) -> StoreResult<Box<dyn ArraySink>> {
    let format = FileFormat::from_path(path)?;
    format.ensure_available()?;
    match format {
        #[cfg(feature = "hdf5")]
        FileFormat::Hdf5 => Ok(Box::new(hdf5::Hdf5Sink::create(path)?)),
        #[cfg(feature = "netcdf")]
        FileFormat::NetCdf => Ok(Box::new(netcdf::NetCdfSink::create(path)?)),
        FileFormat::Raw => Err(StoreError::UnsupportedFormat(
            "raw output is not written; convert to .h5 or .nc".to_string(),
        )),
        #[allow(unreachable_patterns)]
        _ => unreachable!("ensure_available rejected a disabled backend"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_dispatch() {
        assert_eq!(FileFormat::from_suffix("h5").unwrap(), FileFormat::Hdf5);
        assert_eq!(FileFormat::from_suffix(".nc").unwrap(), FileFormat::NetCdf);
        assert_eq!(FileFormat::from_suffix("dat").unwrap(), FileFormat::Raw);
        assert!(FileFormat::from_suffix("mat").is_err());
    }

    #[test]
    fn preference_order_is_hierarchical_first() {
        assert_eq!(FileFormat::PREFERRED[0], FileFormat::Hdf5);
        assert_eq!(FileFormat::PREFERRED[1], FileFormat::NetCdf);
    }
}
