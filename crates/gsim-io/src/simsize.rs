//! Grid-size descriptor reading.

use std::path::Path;

use tracing::debug;

use gsim_common::GridSize;
use gsim_store::{FileFormat, StoreError};

use crate::error::{DataError, DataResult};
use crate::find::simsize_file;

/// Dataset names that may hold the cell-count tuple, in lookup order.
/// Different producer generations used different names, and the oldest
/// wrote three separate scalars.
const SIZE_KEYS: [&str; 2] = ["lxs", "lx"];

/// Read the grid size from a simulation directory or a direct path to a
/// size descriptor.
pub fn read_simsize(path: &Path) -> DataResult<GridSize> {
    let file = simsize_file(path, true)?.expect("required find returns Some");
    debug!(path = %file.display(), "reading grid size");

    let lx = match FileFormat::from_path(&file)? {
        FileFormat::Raw => gsim_store::raw::read_simsize(&file)?,
        _ => {
            let src = gsim_store::open(&file)?;
            read_container_size(src.as_ref())?
        }
    };

    if lx.len() != 3 || lx.iter().any(|&v| v < 1) {
        return Err(DataError::Store(StoreError::Invalid {
            path: file,
            reason: format!("bad cell counts {lx:?}"),
        }));
    }
    Ok(GridSize::new(lx[0] as usize, lx[1] as usize, lx[2] as usize))
}

fn read_container_size(src: &dyn gsim_store::ArraySource) -> DataResult<Vec<i64>> {
    for key in SIZE_KEYS {
        if src.contains(key) {
            let mut lx = src.int_vec(key)?;
            if lx.len() == 2 {
                // Historical 2-D descriptors omit the singleton axis.
                lx.push(1);
            }
            return Ok(lx);
        }
    }
    // Oldest layout: one scalar (or singleton) per axis.
    let mut lx = Vec::with_capacity(3);
    for key in ["lx1", "lx2", "lx3"] {
        lx.push(src.int(key)?);
    }
    Ok(lx)
}
