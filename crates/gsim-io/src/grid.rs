//! Grid geometry reading and writing.
//!
//! On disk the geometry keeps the Fortran producer's dimension order, so
//! every rank >= 2 array is fully reversed on import and export. The raw
//! legacy encoding already returns arrays in the in-memory convention and
//! needs no axis work here.

use std::path::Path;

use ndarray::ArrayD;
use tracing::{debug, info};

use gsim_common::{Grid, GridSize};
use gsim_store::{ArraySink, ArraySource, FileFormat};

use crate::error::DataResult;
use crate::find::{grid_file, simsize_file};
use crate::simsize::read_simsize;

/// Every geometry field the producer may emit, in on-disk record order.
/// The raw record table in the store layer follows the same order.
fn field_order() -> Vec<String> {
    let mut names = Vec::new();
    for i in 1..=3 {
        names.push(format!("x{i}"));
        names.push(format!("x{i}i"));
        names.push(format!("dx{i}b"));
        names.push(format!("dx{i}h"));
        names.push(format!("h{i}"));
        names.push(format!("h{i}x1i"));
        names.push(format!("h{i}x2i"));
        names.push(format!("h{i}x3i"));
        names.push(format!("gx{i}"));
        names.push(format!("e{i}"));
    }
    for name in [
        "alt", "glat", "glon", "Bmag", "I", "nullpts", "er", "etheta", "ephi", "r", "theta", "phi",
        "x", "y", "z",
    ] {
        names.push(name.to_string());
    }
    names
}

/// Read the grid geometry from a simulation directory or a direct path.
///
/// The cell counts come from the companion size descriptor when one
/// exists; otherwise from the lengths of the stored `x1`/`x2`/`x3` axes.
pub fn read_grid(path: &Path) -> DataResult<Grid> {
    let file = grid_file(path, true)?.expect("required find returns Some");
    debug!(path = %file.display(), "reading grid");

    if FileFormat::from_path(&file)? == FileFormat::Raw {
        // Raw grids cannot infer their own shape; the descriptor is
        // mandatory and shares the directory and suffix.
        let size = read_simsize(&file)?;
        let src = gsim_store::raw::open_grid(&file, size)?;
        let mut grid = Grid::new(size);
        for key in src.keys()? {
            let arr = src.array(&key)?;
            grid.insert(key, arr);
        }
        return Ok(grid);
    }

    let src = gsim_store::open(&file)?;
    let lx = match simsize_file(&file, false)? {
        Some(_) => read_simsize(&file)?,
        None => derive_size(src.as_ref())?,
    };

    let mut grid = Grid::new(lx);
    for key in src.keys()? {
        let arr = src.array(&key)?;
        grid.insert(key, orient(arr));
    }
    Ok(grid)
}

/// Reverse the axis order of a stored array; rank <= 1 is unchanged.
fn orient(arr: ArrayD<f64>) -> ArrayD<f64> {
    if arr.ndim() >= 2 {
        arr.reversed_axes()
    } else {
        arr
    }
}

/// Cell counts from the stored axis arrays, for grids written without a
/// companion descriptor.
fn derive_size(src: &dyn gsim_store::ArraySource) -> DataResult<GridSize> {
    let mut lens = [0usize; 3];
    for (i, key) in ["x1", "x2", "x3"].iter().enumerate() {
        lens[i] = src.array(key)?.len();
    }
    Ok(GridSize::new(lens[0], lens[1], lens[2]))
}

/// Write the size descriptor and grid geometry.
///
/// Fields go out in the canonical record order; recognized fields absent
/// from `grid` are skipped with a debug note, everything present is cast
/// to f32 with rank >= 2 arrays reversed into the on-disk order.
pub fn write_grid(size_path: &Path, grid_path: &Path, grid: &Grid) -> DataResult<()> {
    info!(path = %grid_path.display(), size = %grid.lx, "writing grid");

    let mut size = gsim_store::create(size_path)?;
    let lx: Vec<i64> = grid.lx.as_array().iter().map(|&v| v as i64).collect();
    size.put_int_slice("lx", &lx)?;

    let mut sink = gsim_store::create(grid_path)?;
    for name in field_order() {
        match grid.get(&name) {
            Some(arr) if arr.ndim() >= 2 => sink.put_f32(&name, arr.view().reversed_axes())?,
            Some(arr) => sink.put_f32(&name, arr.view())?,
            None => debug!(field = %name, "grid field absent, skipping"),
        }
    }
    Ok(())
}
