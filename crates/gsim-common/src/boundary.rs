//! Boundary-condition and precipitation forcing types.
//!
//! Both families live in their own directory with a companion size/grid
//! pair describing the horizontal (mlon, mlat) footprint, plus one file per
//! timestamp named by the frame-stem convention.

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};

/// Electric-field boundary condition for one timestamp.
///
/// Interior fields are (mlon, mlat) planes; the x2/x3 profiles are the
/// potential (or its normal derivative) on the remaining edges.
#[derive(Debug, Clone, PartialEq)]
pub struct EfieldFrame {
    pub time: DateTime<Utc>,
    /// Boundary-condition type: 1 = Dirichlet top potential, 0 = Neumann.
    pub flagdirich: i64,
    pub ex: Array2<f64>,
    pub ey: Array2<f64>,
    pub vmin_x1: Array2<f64>,
    pub vmax_x1: Array2<f64>,
    pub vmin_x2: Array1<f64>,
    pub vmax_x2: Array1<f64>,
    pub vmin_x3: Array1<f64>,
    pub vmax_x3: Array1<f64>,
}

/// Electric-field boundary forcing time series.
#[derive(Debug, Clone, PartialEq)]
pub struct EfieldSeries {
    pub mlon: Array1<f64>,
    pub mlat: Array1<f64>,
    pub frames: Vec<EfieldFrame>,
}

impl EfieldSeries {
    pub fn llon(&self) -> usize {
        self.mlon.len()
    }

    pub fn llat(&self) -> usize {
        self.mlat.len()
    }
}

/// Particle precipitation map for one timestamp: energy flux and
/// characteristic energy on the (mlon, mlat) footprint.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecipFrame {
    pub time: DateTime<Utc>,
    pub q: Array2<f64>,
    pub e0: Array2<f64>,
}

/// Precipitation forcing time series.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecipSeries {
    pub mlon: Array1<f64>,
    pub mlat: Array1<f64>,
    pub frames: Vec<PrecipFrame>,
}

impl PrecipSeries {
    pub fn llon(&self) -> usize {
        self.mlon.len()
    }

    pub fn llat(&self) -> usize {
        self.mlat.len()
    }
}
