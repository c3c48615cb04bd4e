//! Common types shared across the gsim data-layer crates.

pub mod boundary;
pub mod frame;
pub mod grid;
pub mod time;

pub use boundary::{EfieldFrame, EfieldSeries, PrecipFrame, PrecipSeries};
pub use frame::{FlagOutput, Frame, LSP, LSP_ION, WAVELENGTHS};
pub use grid::{Grid, GridSize};
pub use time::{frame_stem, parse_frame_stem, TimeParseError};
