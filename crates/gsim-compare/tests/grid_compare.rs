//! Integration test: grid comparison between two run directories.
//!
//! 1. Write the same grid to a reference and a test directory
//! 2. Expect zero errors
//! 3. Perturb one field beyond tolerance: expect one counted error
//! 4. Disagreeing cell counts: expect a hard failure

use std::path::Path;

use ndarray::{ArrayD, IxDyn};

use gsim_common::{Grid, GridSize};
use gsim_compare::{compare_grids, CompareError, Tolerance};
use gsim_io::DataError;

fn test_grid(lx: GridSize) -> Grid {
    let mut grid = Grid::new(lx);
    for (i, len) in [lx.lx1, lx.lx2, lx.lx3].into_iter().enumerate() {
        grid.insert(
            format!("x{}", i + 1),
            ArrayD::from_shape_fn(IxDyn(&[len]), |ix| ix[0] as f64),
        );
    }
    grid.insert(
        "alt",
        ArrayD::from_shape_fn(IxDyn(&[lx.lx1, lx.lx2, lx.lx3]), |ix| {
            100_000.0 + (ix[0] * 100 + ix[1] * 10 + ix[2]) as f64
        }),
    );
    grid
}

fn write(dir: &Path, grid: &Grid) {
    gsim_io::write_grid(
        &dir.join("simsize.h5"),
        &dir.join("simgrid.h5"),
        grid,
    )
    .unwrap();
}

#[test]
fn identical_grids_agree() {
    let new = tempfile::tempdir().unwrap();
    let reference = tempfile::tempdir().unwrap();
    let grid = test_grid(GridSize::new(2, 3, 4));
    write(new.path(), &grid);
    write(reference.path(), &grid);

    let errs = compare_grids(new.path(), reference.path(), &Tolerance::default()).unwrap();
    assert_eq!(errs, 0);
}

#[test]
fn perturbed_field_is_counted() {
    let new = tempfile::tempdir().unwrap();
    let reference = tempfile::tempdir().unwrap();
    let grid = test_grid(GridSize::new(2, 3, 4));
    write(reference.path(), &grid);

    let mut bad = grid.clone();
    let alt = bad.fields.get_mut("alt").unwrap();
    *alt *= 1.01;
    write(new.path(), &bad);

    let errs = compare_grids(new.path(), reference.path(), &Tolerance::default()).unwrap();
    assert_eq!(errs, 1);

    // A loose enough tolerance passes the same pair.
    let loose = Tolerance {
        rtol: 0.1,
        atol: 1e-8,
    };
    let errs = compare_grids(new.path(), reference.path(), &loose).unwrap();
    assert_eq!(errs, 0);
}

#[test]
fn disagreeing_cell_counts_are_fatal() {
    let new = tempfile::tempdir().unwrap();
    let reference = tempfile::tempdir().unwrap();
    write(reference.path(), &test_grid(GridSize::new(2, 3, 4)));
    write(new.path(), &test_grid(GridSize::new(2, 3, 5)));

    match compare_grids(new.path(), reference.path(), &Tolerance::default()) {
        Err(CompareError::Data(DataError::ShapeMismatch { name, .. })) => {
            assert_eq!(name, "lx");
        }
        other => panic!("expected ShapeMismatch, got {other:?}"),
    }
}
