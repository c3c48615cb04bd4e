//! One simulation time-slice and the output-mode tag that shapes it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

/// Number of plasma species carried by the solver. The first [`LSP_ION`]
/// are ions, the last is electrons.
pub const LSP: usize = 7;

/// Ion species count used for bulk-moment reconstruction.
pub const LSP_ION: usize = 6;

/// Auroral emission wavelength channels, in the fixed on-disk order
/// (angstroms, plus the LBH band).
pub const WAVELENGTHS: [&str; 15] = [
    "3371", "4278", "5200", "5577", "6300", "7320", "10400", "3466", "7774", "8446", "3726", "LBH",
    "1356", "1493", "1304",
];

/// Which physical record layout a frame file uses.
///
/// The integer values match the solver's `flagoutput` configuration knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagOutput {
    /// Only the species-resolved density is on disk; readers return the
    /// electron density slice.
    DensityOnly,
    /// Species-resolved density, parallel velocity and temperature plus
    /// current density, drift velocity and top-boundary potential.
    Curvilinear,
    /// Pre-reduced bulk fields only.
    CurvilinearAveraged,
}

impl FlagOutput {
    /// Map the solver's integer flag; anything outside 0/1/2 is unknown.
    pub fn from_flag(flag: i64) -> Option<Self> {
        match flag {
            0 => Some(Self::DensityOnly),
            1 => Some(Self::Curvilinear),
            2 => Some(Self::CurvilinearAveraged),
            _ => None,
        }
    }

    pub fn flag(self) -> i64 {
        match self {
            Self::DensityOnly => 0,
            Self::Curvilinear => 1,
            Self::CurvilinearAveraged => 2,
        }
    }
}

/// One simulation time-slice.
///
/// Spatial arrays are in (x1, x2, x3) order; species-resolved arrays carry a
/// leading species axis of length [`LSP`]. Identity is (simulation directory,
/// timestamp); frames are never mutated after being read or written.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub time: DateTime<Utc>,
    pub fields: BTreeMap<String, ArrayD<f64>>,
    /// Present when a companion auroral-emission file was found.
    pub wavelengths: Option<Vec<String>>,
}

impl Frame {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time,
            fields: BTreeMap::new(),
            wavelengths: None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&ArrayD<f64>> {
        self.fields.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, data: ArrayD<f64>) {
        self.fields.insert(name.into(), data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_round_trip() {
        for mode in [
            FlagOutput::DensityOnly,
            FlagOutput::Curvilinear,
            FlagOutput::CurvilinearAveraged,
        ] {
            assert_eq!(FlagOutput::from_flag(mode.flag()), Some(mode));
        }
        assert_eq!(FlagOutput::from_flag(3), None);
        assert_eq!(FlagOutput::from_flag(-1), None);
    }
}
