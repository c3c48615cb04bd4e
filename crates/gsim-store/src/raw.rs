//! Legacy raw flat-binary backend (`.dat`), read-only.
//!
//! Raw files are bare streams of little-endian values in Fortran storage
//! order with no self-description, so every open needs the record layout
//! for the artifact kind plus the grid size. Arrays come back already in
//! the in-memory (x1, x2, x3) convention with species leading; the layer
//! above does no further axis work for this encoding.
//!
//! A stream may end cleanly at any record boundary; trailing records are
//! then simply absent, mirroring how optional fields behave in the
//! self-describing containers. Ending mid-record is an error.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, IxDyn, ShapeBuilder};

use gsim_common::{FlagOutput, GridSize, LSP, WAVELENGTHS};

use crate::error::{StoreError, StoreResult};
use crate::ArraySource;

/// A fully-parsed raw file exposed through the common source interface.
pub struct RawSource {
    path: PathBuf,
    arrays: BTreeMap<String, ArrayD<f64>>,
}

impl ArraySource for RawSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.arrays.keys().cloned().collect())
    }

    fn contains(&self, name: &str) -> bool {
        self.arrays.contains_key(name)
    }

    fn array(&self, name: &str) -> StoreResult<ArrayD<f64>> {
        self.arrays
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::missing(&self.path, name))
    }

    fn scalar(&self, name: &str) -> StoreResult<f64> {
        let arr = self
            .arrays
            .get(name)
            .ok_or_else(|| StoreError::missing(&self.path, name))?;
        arr.iter()
            .next()
            .copied()
            .ok_or_else(|| StoreError::invalid(&self.path, format!("{name} is empty")))
    }

    fn int(&self, name: &str) -> StoreResult<i64> {
        Ok(self.scalar(name)? as i64)
    }

    fn int_vec(&self, name: &str) -> StoreResult<Vec<i64>> {
        let arr = self
            .arrays
            .get(name)
            .ok_or_else(|| StoreError::missing(&self.path, name))?;
        Ok(arr.iter().map(|&v| v as i64).collect())
    }
}

/// Sequential f64 record stream over one raw file.
struct Records {
    path: PathBuf,
    data: Vec<f64>,
    pos: usize,
}

impl Records {
    fn open(path: &Path) -> StoreResult<Self> {
        let bytes = fs::read(path)?;
        if bytes.len() % 8 != 0 {
            return Err(StoreError::invalid(
                path,
                format!("length {} is not a multiple of 8", bytes.len()),
            ));
        }
        Ok(Self {
            path: path.to_path_buf(),
            data: bytemuck::pod_collect_to_vec(&bytes),
            pos: 0,
        })
    }

    fn exhausted(&self) -> bool {
        self.pos == self.data.len()
    }

    fn take(&mut self, name: &str, count: usize) -> StoreResult<Vec<f64>> {
        let end = self.pos + count;
        if end > self.data.len() {
            return Err(StoreError::invalid(
                &self.path,
                format!(
                    "truncated record {name}: wanted {count} values, {} left",
                    self.data.len() - self.pos
                ),
            ));
        }
        let out = self.data[self.pos..end].to_vec();
        self.pos = end;
        Ok(out)
    }

    /// Read a record of logical Fortran-order dimensions `dims`.
    fn record(&mut self, name: &str, dims: &[usize]) -> StoreResult<ArrayD<f64>> {
        let count = dims.iter().product();
        let values = self.take(name, count)?;
        ArrayD::from_shape_vec(IxDyn(dims).f(), values)
            .map_err(|e| StoreError::invalid(&self.path, format!("{name}: {e}")))
    }
}

/// Read the grid dimension tuple from a raw size descriptor.
///
/// The file holds little-endian i32 cell counts; historical 2-D runs wrote
/// only two, with the third axis implicitly singleton.
pub fn read_simsize(path: &Path) -> StoreResult<Vec<i64>> {
    let bytes = fs::read(path)?;
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(StoreError::invalid(
            path,
            format!("length {} is not a multiple of 4", bytes.len()),
        ));
    }
    let ints: Vec<i32> = bytemuck::pod_collect_to_vec(&bytes);
    let mut lx: Vec<i64> = ints.iter().take(3).map(|&v| v as i64).collect();
    match lx.len() {
        3 => Ok(lx),
        2 => {
            lx.push(1);
            Ok(lx)
        }
        _ => Err(StoreError::invalid(path, "expected 2 or 3 cell counts")),
    }
}

/// Open a raw grid file. Needs the grid size from the companion descriptor;
/// raw grids cannot infer their own shape.
pub fn open_grid(path: &Path, lx: GridSize) -> StoreResult<RawSource> {
    let [l1, l2, l3] = lx.as_array();
    let volume = [l1, l2, l3];

    let mut layout: Vec<(String, Vec<usize>)> = Vec::new();
    for (i, li) in [(1usize, l1), (2, l2), (3, l3)] {
        layout.push((format!("x{i}"), vec![li]));
        layout.push((format!("x{i}i"), vec![li + 1]));
        layout.push((format!("dx{i}b"), vec![li]));
        layout.push((format!("dx{i}h"), vec![li]));
        layout.push((format!("h{i}"), volume.to_vec()));
        layout.push((format!("h{i}x1i"), vec![l1 + 1, l2, l3]));
        layout.push((format!("h{i}x2i"), vec![l1, l2 + 1, l3]));
        layout.push((format!("h{i}x3i"), vec![l1, l2, l3 + 1]));
        layout.push((format!("gx{i}"), volume.to_vec()));
        layout.push((format!("e{i}"), vec![l1, l2, l3, 3]));
    }
    for name in ["alt", "glat", "glon", "Bmag"] {
        layout.push((name.to_string(), volume.to_vec()));
    }
    layout.push(("I".to_string(), vec![l2, l3]));
    layout.push(("nullpts".to_string(), volume.to_vec()));
    for name in ["er", "etheta", "ephi"] {
        layout.push((name.to_string(), vec![l1, l2, l3, 3]));
    }
    for name in ["r", "theta", "phi", "x", "y", "z"] {
        layout.push((name.to_string(), volume.to_vec()));
    }

    let mut records = Records::open(path)?;
    let mut arrays = BTreeMap::new();
    for (name, dims) in layout {
        if records.exhausted() {
            // Older producers stop after the magnetic-field block.
            tracing::debug!(path = %path.display(), next = %name, "grid stream ended early");
            break;
        }
        arrays.insert(name.clone(), records.record(&name, &dims)?);
    }

    Ok(RawSource {
        path: path.to_path_buf(),
        arrays,
    })
}

/// Open a raw frame file for the given output mode.
///
/// Field names and axis order match the in-memory convention: `ns`, `vs1`,
/// `Ts` come back as (species, x1, x2, x3); vector and bulk fields as
/// (x1, x2, x3); `Phitop` as (x2, x3). The timestamp appears under
/// `time/ymd` and `time/UThour`.
pub fn open_frame(path: &Path, flag: FlagOutput, lx: GridSize) -> StoreResult<RawSource> {
    let [l1, l2, l3] = lx.as_array();
    let volume = [l1, l2, l3];

    let mut records = Records::open(path)?;
    let mut arrays = BTreeMap::new();

    // Timestamp header: year, month, day, decimal hour UT.
    let header = records.take("time", 4)?;
    arrays.insert(
        "time/ymd".to_string(),
        ArrayD::from_shape_vec(IxDyn(&[3]), header[..3].to_vec())
            .expect("3 values fill a length-3 array"),
    );
    arrays.insert("time/UThour".to_string(), ndarray::arr0(header[3]).into_dyn());

    let species_first = |arr: ArrayD<f64>| arr.permuted_axes(IxDyn(&[3, 0, 1, 2]));

    match flag {
        FlagOutput::DensityOnly => {
            let ns = records.record("ns", &[l1, l2, l3, LSP])?;
            arrays.insert("ns".to_string(), species_first(ns));
        }
        FlagOutput::Curvilinear => {
            for name in ["ns", "vs1", "Ts"] {
                let arr = records.record(name, &[l1, l2, l3, LSP])?;
                arrays.insert(name.to_string(), species_first(arr));
            }
            for name in ["J1", "J2", "J3", "v2", "v3"] {
                arrays.insert(name.to_string(), records.record(name, &volume)?);
            }
            arrays.insert("Phitop".to_string(), records.record("Phitop", &[l2, l3])?);
        }
        FlagOutput::CurvilinearAveraged => {
            for name in ["ne", "v1", "Ti", "Te", "J1", "J2", "J3", "v2", "v3"] {
                arrays.insert(name.to_string(), records.record(name, &volume)?);
            }
            arrays.insert("Phitop".to_string(), records.record("Phitop", &[l2, l3])?);
        }
    }

    Ok(RawSource {
        path: path.to_path_buf(),
        arrays,
    })
}

/// Open a raw auroral-emission file: one (mlon, mlat, wavelength) volume,
/// returned as (wavelength, x2, x3) under `rayleighs`.
pub fn open_aurora(path: &Path, lx: GridSize) -> StoreResult<RawSource> {
    let [_, l2, l3] = lx.as_array();
    let mut records = Records::open(path)?;
    let arr = records.record("rayleighs", &[l2, l3, WAVELENGTHS.len()])?;
    let mut arrays = BTreeMap::new();
    arrays.insert("rayleighs".to_string(), arr.permuted_axes(IxDyn(&[2, 0, 1])));

    Ok(RawSource {
        path: path.to_path_buf(),
        arrays,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArraySource;

    fn write_f64(path: &Path, values: &[f64]) {
        fs::write(path, bytemuck::cast_slice::<f64, u8>(values)).unwrap();
    }

    #[test]
    fn simsize_pads_third_axis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("simsize.dat");
        fs::write(&path, bytemuck::cast_slice::<i32, u8>(&[48, 40])).unwrap();
        assert_eq!(read_simsize(&path).unwrap(), vec![48, 40, 1]);

        fs::write(&path, bytemuck::cast_slice::<i32, u8>(&[8, 6, 4])).unwrap();
        assert_eq!(read_simsize(&path).unwrap(), vec![8, 6, 4]);
    }

    #[test]
    fn simsize_rejects_single_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("simsize.dat");
        fs::write(&path, bytemuck::cast_slice::<i32, u8>(&[48])).unwrap();
        assert!(matches!(
            read_simsize(&path),
            Err(StoreError::Invalid { .. })
        ));
    }

    #[test]
    fn averaged_frame_records_in_fortran_order() {
        let lx = GridSize::new(2, 3, 1);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("20130220_18000.000000.dat");

        let mut values = vec![2013.0, 2.0, 20.0, 5.0];
        // Nine bulk volumes then the potential plane, all Fortran order.
        for record in 0..9 {
            values.extend((0..6).map(|i| (record * 10 + i) as f64));
        }
        values.extend([101.0, 102.0, 103.0]);
        write_f64(&path, &values);

        let src = open_frame(&path, FlagOutput::CurvilinearAveraged, lx).unwrap();
        assert_eq!(src.int_vec("time/ymd").unwrap(), vec![2013, 2, 20]);
        assert_eq!(src.scalar("time/UThour").unwrap(), 5.0);

        let ne = src.array("ne").unwrap();
        assert_eq!(ne.shape(), &[2, 3, 1]);
        // Fortran order: x1 varies fastest.
        assert_eq!(ne[[0, 0, 0]], 0.0);
        assert_eq!(ne[[1, 0, 0]], 1.0);
        assert_eq!(ne[[0, 1, 0]], 2.0);

        let phi = src.array("Phitop").unwrap();
        assert_eq!(phi.shape(), &[3, 1]);
        assert_eq!(phi[[2, 0]], 103.0);
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let lx = GridSize::new(2, 2, 2);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("20130220_18000.000000.dat");
        write_f64(&path, &[2013.0, 2.0, 20.0, 5.0, 1.0, 2.0]);

        assert!(matches!(
            open_frame(&path, FlagOutput::CurvilinearAveraged, lx),
            Err(StoreError::Invalid { .. })
        ));
    }

    #[test]
    fn species_axis_leads_after_import() {
        let lx = GridSize::new(2, 1, 1);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("20130220_18000.000000.dat");

        let mut values = vec![2013.0, 2.0, 20.0, 5.0];
        // ns logical dims (2, 1, 1, 7), Fortran order: species slowest.
        values.extend((0..14).map(|i| i as f64));
        write_f64(&path, &values);

        let src = open_frame(&path, FlagOutput::DensityOnly, lx).unwrap();
        let ns = src.array("ns").unwrap();
        assert_eq!(ns.shape(), &[7, 2, 1, 1]);
        assert_eq!(ns[[0, 0, 0, 0]], 0.0);
        assert_eq!(ns[[0, 1, 0, 0]], 1.0);
        assert_eq!(ns[[6, 0, 0, 0]], 12.0);
        assert_eq!(ns[[6, 1, 0, 0]], 13.0);
    }
}
