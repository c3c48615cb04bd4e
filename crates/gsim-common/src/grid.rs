//! Simulation grid size and geometry containers.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

/// Cell counts along the three curvilinear axes, excluding ghost cells.
///
/// A degenerate axis has length 1: `lx3 == 1` is an east-west (2-D) run,
/// `lx2 == 1` a north-south run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSize {
    pub lx1: usize,
    pub lx2: usize,
    pub lx3: usize,
}

impl GridSize {
    pub fn new(lx1: usize, lx2: usize, lx3: usize) -> Self {
        Self { lx1, lx2, lx3 }
    }

    /// The three counts in axis order.
    pub fn as_array(&self) -> [usize; 3] {
        [self.lx1, self.lx2, self.lx3]
    }

    /// Total cell count.
    pub fn cells(&self) -> usize {
        self.lx1 * self.lx2 * self.lx3
    }

    /// East-west degenerate grid (single cell along x3)?
    pub fn is_east_west(&self) -> bool {
        self.lx3 == 1
    }

    /// Do the given spatial dimensions match this size exactly?
    pub fn matches(&self, shape: &[usize]) -> bool {
        shape == self.as_array()
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.lx1, self.lx2, self.lx3)
    }
}

/// Full curvilinear grid geometry: named numeric fields plus the cell counts.
///
/// Fields are either per-axis rank-1 arrays (`x1`, `dx2h`, ...) or volumetric
/// rank >= 2 arrays (`alt`, `Bmag`, unit vectors, ...). Volumetric shapes
/// equal the grid size up to axis order; the I/O layer keeps everything in
/// the in-memory (x1, x2, x3) convention.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub lx: GridSize,
    pub fields: BTreeMap<String, ArrayD<f64>>,
}

impl Grid {
    pub fn new(lx: GridSize) -> Self {
        Self {
            lx,
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ArrayD<f64>> {
        self.fields.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, data: ArrayD<f64>) {
        self.fields.insert(name.into(), data);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
