//! Cross-checking simulation outputs against a reference run.
//!
//! Tolerance misses are counted and logged, not raised; the caller turns
//! the count into an exit code. Structural disagreements (shapes, missing
//! artifacts) are hard errors because nothing downstream of them is
//! meaningful.

use std::path::{Path, PathBuf};

use ndarray::ArrayD;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use gsim_io::DataError;

#[derive(Debug, Error)]
pub enum CompareError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error("failed to read tolerance file {path}: {source}")]
    TolFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse tolerance file {path}: {source}")]
    TolParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Relative/absolute tolerance pair for array comparison.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Tolerance {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            rtol: 1e-5,
            atol: 1e-8,
        }
    }
}

impl Tolerance {
    /// Load a tolerance pair from a JSON file, e.g. `{"rtol": 1e-4}`.
    /// Omitted keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, CompareError> {
        let text = std::fs::read_to_string(path).map_err(|source| CompareError::TolFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| CompareError::TolParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Elementwise `|a - b| <= atol + rtol * |b|`. NaN anywhere fails.
pub fn allclose(a: &ArrayD<f64>, b: &ArrayD<f64>, tol: &Tolerance) -> bool {
    if a.shape() != b.shape() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .all(|(&x, &y)| (x - y).abs() <= tol.atol + tol.rtol * y.abs())
}

/// Worst-case deviation as a percentage of the reference magnitude.
pub fn err_pct(a: &ArrayD<f64>, b: &ArrayD<f64>) -> f64 {
    let diff = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y).abs())
        .fold(0.0f64, f64::max);
    let scale = b.iter().map(|&y| y.abs()).fold(0.0f64, f64::max);
    if scale > 0.0 {
        100.0 * diff / scale
    } else {
        100.0 * diff
    }
}

/// Compare the grid in `new_dir` against the reference in `ref_dir`.
///
/// The reference defines the field contract: every field it stores must
/// exist in the new grid with the same shape and agree within `tol`.
/// Returns the number of disagreeing fields.
pub fn compare_grids(new_dir: &Path, ref_dir: &Path, tol: &Tolerance) -> Result<usize, CompareError> {
    let new = gsim_io::read_grid(new_dir)?;
    let reference = gsim_io::read_grid(ref_dir)?;

    if new.lx != reference.lx {
        return Err(CompareError::Data(DataError::ShapeMismatch {
            name: "lx".to_string(),
            path: new_dir.to_path_buf(),
            expected: reference.lx.as_array().to_vec(),
            found: new.lx.as_array().to_vec(),
        }));
    }

    let mut errs = 0usize;
    for (name, ref_arr) in &reference.fields {
        let Some(new_arr) = new.get(name) else {
            error!(field = %name, "missing from new grid");
            errs += 1;
            continue;
        };
        if new_arr.shape() != ref_arr.shape() {
            return Err(CompareError::Data(DataError::ShapeMismatch {
                name: name.clone(),
                path: new_dir.to_path_buf(),
                expected: ref_arr.shape().to_vec(),
                found: new_arr.shape().to_vec(),
            }));
        }
        if !allclose(new_arr, ref_arr, tol) {
            error!(
                field = %name,
                err_pct = err_pct(new_arr, ref_arr),
                "grid field mismatch"
            );
            errs += 1;
        }
    }

    if errs == 0 {
        info!(fields = reference.fields.len(), "grids agree");
    }
    Ok(errs)
}
