//! Electric-field boundary and precipitation forcing I/O.
//!
//! Each series lives in its own directory: a `simsize`/`simgrid`
//! companion pair describing the horizontal (mlon, mlat) footprint, then
//! one file per timestamp named by the frame-stem convention. Interior
//! 2-D fields are stored transposed, like every other rank >= 2 array.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2, ArrayD, Ix1, Ix2};
use tracing::{debug, info};

use gsim_common::time::{frame_stem, parse_frame_stem};
use gsim_common::{EfieldFrame, EfieldSeries, PrecipFrame, PrecipSeries};
use gsim_store::{ArraySink, ArraySource, FileFormat};

use crate::error::{DataError, DataResult};
use crate::find::simsize_file;
use crate::frame::read_time;

fn to_2d(name: &str, path: &Path, arr: ArrayD<f64>, llon: usize, llat: usize) -> DataResult<Array2<f64>> {
    if arr.shape() != [llon, llat] {
        return Err(DataError::shape_mismatch(name, path, &[llon, llat], arr.shape()));
    }
    arr.into_dimensionality::<Ix2>()
        .map_err(|_| DataError::shape_mismatch(name, path, &[llon, llat], &[]))
}

fn to_1d(name: &str, path: &Path, arr: ArrayD<f64>, len: usize) -> DataResult<Array1<f64>> {
    if arr.shape() != [len] {
        return Err(DataError::shape_mismatch(name, path, &[len], arr.shape()));
    }
    arr.into_dimensionality::<Ix1>()
        .map_err(|_| DataError::shape_mismatch(name, path, &[len], &[]))
}

/// Read the companion footprint pair: cell counts from `simsize`, the
/// magnetic coordinate axes from `simgrid`. Returns the axes plus the
/// suffix the series was written with.
fn read_footprint(dir: &Path) -> DataResult<(Array1<f64>, Array1<f64>, &'static str)> {
    let size_path = simsize_file(dir, true)?.expect("required find returns Some");
    let format = FileFormat::from_path(&size_path)?;
    let size = gsim_store::open(&size_path)?;
    let llon = size.int("llon")? as usize;
    let llat = size.int("llat")? as usize;

    let grid_path = size_path.with_file_name(format!("simgrid{}", format.extension()));
    let grid = gsim_store::open(&grid_path)?;
    let mlon = to_1d("mlon", &grid_path, grid.array("mlon")?, llon)?;
    let mlat = to_1d("mlat", &grid_path, grid.array("mlat")?, llat)?;
    Ok((mlon, mlat, format.extension()))
}

/// Per-timestamp files in the series directory, in time order.
fn series_files(dir: &Path, suffix: &str) -> DataResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in dir.read_dir()? {
        let entry = entry?;
        let name = entry.file_name();
        let name = match name.to_str() {
            Some(n) => n,
            None => continue,
        };
        if name.ends_with(suffix) && parse_frame_stem(name).is_ok() {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}

fn write_footprint(
    dir: &Path,
    mlon: &Array1<f64>,
    mlat: &Array1<f64>,
    format: FileFormat,
) -> DataResult<()> {
    let mut size = gsim_store::create(&dir.join(format!("simsize{}", format.extension())))?;
    size.put_int("llon", mlon.len() as i64)?;
    size.put_int("llat", mlat.len() as i64)?;

    let mut grid = gsim_store::create(&dir.join(format!("simgrid{}", format.extension())))?;
    grid.put_f32("mlon", mlon.view().into_dyn())?;
    grid.put_f32("mlat", mlat.view().into_dyn())?;
    Ok(())
}

/// Read an electric-field boundary series directory.
pub fn read_efield(dir: &Path) -> DataResult<EfieldSeries> {
    let (mlon, mlat, suffix) = read_footprint(dir)?;
    let (llon, llat) = (mlon.len(), mlat.len());

    let mut frames = Vec::new();
    for path in series_files(dir, suffix)? {
        debug!(path = %path.display(), "reading Efield frame");
        let src = gsim_store::open(&path)?;
        // Stored transposed; undo on the way in.
        let plane = |name: &str| -> DataResult<Array2<f64>> {
            to_2d(name, &path, src.array(name)?.reversed_axes(), llon, llat)
        };
        frames.push(EfieldFrame {
            time: read_time(src.as_ref())?,
            flagdirich: src.int("flagdirich")?,
            ex: plane("Exit")?,
            ey: plane("Eyit")?,
            vmin_x1: plane("Vminx1it")?,
            vmax_x1: plane("Vmaxx1it")?,
            vmin_x2: to_1d("Vminx2ist", &path, src.array("Vminx2ist")?, llat)?,
            vmax_x2: to_1d("Vmaxx2ist", &path, src.array("Vmaxx2ist")?, llat)?,
            vmin_x3: to_1d("Vminx3ist", &path, src.array("Vminx3ist")?, llon)?,
            vmax_x3: to_1d("Vmaxx3ist", &path, src.array("Vmaxx3ist")?, llon)?,
        });
    }
    Ok(EfieldSeries { mlon, mlat, frames })
}

/// Write an electric-field boundary series directory.
pub fn write_efield(dir: &Path, series: &EfieldSeries, format: FileFormat) -> DataResult<()> {
    format.ensure_available()?;
    fs::create_dir_all(dir)?;
    info!(path = %dir.display(), frames = series.frames.len(), "writing Efield series");
    write_footprint(dir, &series.mlon, &series.mlat, format)?;

    for frame in &series.frames {
        let path = dir.join(format!("{}{}", frame_stem(&frame.time), format.extension()));
        let mut sink = gsim_store::create(&path)?;
        sink.put_int("flagdirich", frame.flagdirich)?;
        crate::frame::write_time(sink.as_mut(), &frame.time)?;
        for (name, arr) in [
            ("Exit", &frame.ex),
            ("Eyit", &frame.ey),
            ("Vminx1it", &frame.vmin_x1),
            ("Vmaxx1it", &frame.vmax_x1),
        ] {
            sink.put_f32(name, arr.view().reversed_axes().into_dyn())?;
        }
        for (name, arr) in [
            ("Vminx2ist", &frame.vmin_x2),
            ("Vmaxx2ist", &frame.vmax_x2),
            ("Vminx3ist", &frame.vmin_x3),
            ("Vmaxx3ist", &frame.vmax_x3),
        ] {
            sink.put_f32(name, arr.view().into_dyn())?;
        }
    }
    Ok(())
}

/// Read a precipitation forcing series directory.
pub fn read_precip(dir: &Path) -> DataResult<PrecipSeries> {
    let (mlon, mlat, suffix) = read_footprint(dir)?;
    let (llon, llat) = (mlon.len(), mlat.len());

    let mut frames = Vec::new();
    for path in series_files(dir, suffix)? {
        debug!(path = %path.display(), "reading precipitation frame");
        let src = gsim_store::open(&path)?;
        frames.push(PrecipFrame {
            time: read_time(src.as_ref())?,
            q: to_2d("Qp", &path, src.array("Qp")?.reversed_axes(), llon, llat)?,
            e0: to_2d("E0p", &path, src.array("E0p")?.reversed_axes(), llon, llat)?,
        });
    }
    Ok(PrecipSeries { mlon, mlat, frames })
}

/// Write a precipitation forcing series directory.
pub fn write_precip(dir: &Path, series: &PrecipSeries, format: FileFormat) -> DataResult<()> {
    format.ensure_available()?;
    fs::create_dir_all(dir)?;
    info!(path = %dir.display(), frames = series.frames.len(), "writing precipitation series");
    write_footprint(dir, &series.mlon, &series.mlat, format)?;

    for frame in &series.frames {
        let path = dir.join(format!("{}{}", frame_stem(&frame.time), format.extension()));
        let mut sink = gsim_store::create(&path)?;
        crate::frame::write_time(sink.as_mut(), &frame.time)?;
        sink.put_f32("Qp", frame.q.view().reversed_axes().into_dyn())?;
        sink.put_f32("E0p", frame.e0.view().reversed_axes().into_dyn())?;
    }
    Ok(())
}
