//! Locating simulation artifacts on disk.
//!
//! Output trees mix several naming and layout conventions: artifacts may
//! sit in the directory itself or its `inputs/` subdirectory, under any of
//! the container suffixes, and frame files are keyed by an embedded
//! timestamp whose seconds field was produced from 32-bit ticks and can be
//! off by a fraction of a second.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};

use gsim_common::time::{frame_stem, parse_frame_stem};
use gsim_store::FileFormat;

use crate::error::{DataError, DataResult};

/// Container suffixes in lookup-preference order (hierarchical first).
pub const FILE_SUFFIXES: [&str; 2] = [".h5", ".nc"];

/// How far an on-disk frame timestamp may drift from the requested time
/// before the fallback search rejects it. The drift comes from an upstream
/// producer storing time as real32 ticks; the tolerance is configurable
/// because that producer is expected to fix itself eventually.
pub fn default_max_offset() -> Duration {
    Duration::seconds(1)
}

/// Find a file whose name contains `stem`, under any of `suffixes`.
///
/// * a file path whose name already contains the stem is returned as-is;
/// * a file path that does not match restarts the search in its parent
///   directory, constrained to that file's suffix;
/// * a directory is searched directly and through its `inputs/`
///   subdirectory, trying each suffix in order.
///
/// With `required`, an unsuccessful search is a [`DataError::NotFound`];
/// otherwise it is a quiet `None`.
pub fn find_stem(
    path: &Path,
    stem: &str,
    suffixes: &[&str],
    required: bool,
) -> DataResult<Option<PathBuf>> {
    if path.is_file() {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.contains(stem) {
            return Ok(Some(path.to_path_buf()));
        }
        // Same directory, same encoding as the file we were pointed at.
        let parent = path.parent().unwrap_or(Path::new("."));
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"));
        let narrowed: Vec<&str> = ext.as_deref().into_iter().collect();
        let found = find_stem(parent, stem, &narrowed, false)?;
        if found.is_none() && required {
            return Err(DataError::not_found(stem, &narrowed, parent));
        }
        return Ok(found);
    }

    let suffixes: &[&str] = if suffixes.is_empty() {
        &FILE_SUFFIXES
    } else {
        suffixes
    };

    if path.is_dir() {
        for dir in [path.to_path_buf(), path.join("inputs")] {
            for suffix in suffixes {
                let candidate = dir.join(format!("{stem}{suffix}"));
                if candidate.is_file() {
                    return Ok(Some(candidate));
                }
            }
        }
    }

    if required {
        return Err(DataError::not_found(stem, suffixes, path));
    }
    Ok(None)
}

/// Path to the grid file for a simulation directory (or a direct path).
///
/// The default suffix list is deliberately not narrowed by any requested
/// output format, so outputs from a prior run in a different encoding can
/// seed a new one.
pub fn grid_file(path: &Path, required: bool) -> DataResult<Option<PathBuf>> {
    find_stem(path, "simgrid", &[], required)
}

/// Path to the size-descriptor file.
pub fn simsize_file(path: &Path, required: bool) -> DataResult<Option<PathBuf>> {
    find_stem(path, "simsize", &[], required)
}

/// Path to the configuration file supplied by the solver tooling.
pub fn config_file(path: &Path, required: bool) -> DataResult<Option<PathBuf>> {
    find_stem(path, "config", &[".nml"], required)
}

/// Find the frame file for `time` in `simdir`.
///
/// The exact expected filename is tried first for each suffix. Failing
/// that, every file sharing the date portion of the stem is examined and
/// the one whose embedded time-of-day lies closest to the request wins,
/// provided it is within `max_offset`.
pub fn frame_file(
    simdir: &Path,
    time: &DateTime<Utc>,
    format: Option<FileFormat>,
    max_offset: Duration,
    required: bool,
) -> DataResult<Option<PathBuf>> {
    let stem = frame_stem(time);
    let ext_owned;
    let suffixes: &[&str] = match format {
        Some(f) => {
            ext_owned = [f.extension()];
            &ext_owned
        }
        None => &FILE_SUFFIXES,
    };

    for suffix in suffixes {
        let exact = simdir.join(format!("{stem}{suffix}"));
        if exact.is_file() {
            return Ok(Some(exact));
        }
    }

    // Fallback for drifted timestamps: match on the date, then pick the
    // closest time-of-day inside the tolerance window.
    let date_prefix = format!("{}_", time.format("%Y%m%d"));
    for suffix in suffixes {
        let mut best: Option<(Duration, PathBuf)> = None;
        for entry in simdir.read_dir().into_iter().flatten().flatten() {
            let name = entry.file_name();
            let name = match name.to_str() {
                Some(n) => n,
                None => continue,
            };
            if !name.starts_with(&date_prefix) || !name.ends_with(suffix) {
                continue;
            }
            let candidate_time = match parse_frame_stem(name) {
                Ok(t) => t,
                Err(_) => continue,
            };
            let offset = (candidate_time - *time).abs();
            if best.as_ref().is_none_or(|(d, _)| offset < *d) {
                best = Some((offset, entry.path()));
            }
        }
        if let Some((offset, path)) = best {
            if offset <= max_offset {
                return Ok(Some(path));
            }
        }
    }

    if required {
        return Err(DataError::not_found(&stem, suffixes, simdir));
    }
    Ok(None)
}
