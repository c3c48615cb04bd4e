//! Simulation data layer: locate, read and write grid geometry, state
//! frames and boundary forcing across the supported on-disk encodings.
//!
//! The container backends live in `gsim-store`; this crate owns the path
//! conventions, axis-order bookkeeping and derived-moment reconstruction
//! that make the three encodings interchangeable to callers.

pub mod boundary;
pub mod error;
pub mod find;
pub mod frame;
pub mod grid;
pub mod simsize;

pub use boundary::{read_efield, read_precip, write_efield, write_precip};
pub use error::{DataError, DataResult};
pub use find::{
    config_file, default_max_offset, find_stem, frame_file, grid_file, simsize_file, FILE_SUFFIXES,
};
pub use frame::{read_frame, read_frame_file, write_frame, write_state, SimulationConfig};
pub use grid::{read_grid, write_grid};
pub use simsize::read_simsize;
