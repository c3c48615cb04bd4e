//! NetCDF-4 backend, the network-transparent array container.
//!
//! NetCDF variables are flat-named, so nested dataset names like
//! `time/ymd` map to their final path component. Each variable gets its
//! own private dimensions (`{name}_d{i}`); the files carry data between
//! one producer and one consumer, nothing shares coordinate axes.

use std::path::{Path, PathBuf};

use ndarray::{ArrayD, ArrayViewD, IxDyn};

use crate::error::{StoreError, StoreResult};
use crate::{ArraySink, ArraySource};

/// NetCDF has no groups in these files; nested names flatten to the leaf.
fn leaf_name(name: &str) -> &str {
    name.rsplit_once('/').map_or(name, |(_, leaf)| leaf)
}

pub struct NetCdfSource {
    path: PathBuf,
    file: netcdf::File,
}

impl NetCdfSource {
    pub fn open(path: &Path) -> StoreResult<Self> {
        crate::silence_hdf5_errors();
        Ok(Self {
            path: path.to_path_buf(),
            file: netcdf::open(path)?,
        })
    }

    fn variable(&self, name: &str) -> StoreResult<netcdf::Variable<'_>> {
        self.file
            .variable(leaf_name(name))
            .ok_or_else(|| StoreError::missing(&self.path, name))
    }
}

impl ArraySource for NetCdfSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.file.variables().map(|v| v.name()).collect())
    }

    fn contains(&self, name: &str) -> bool {
        self.file.variable(leaf_name(name)).is_some()
    }

    fn array(&self, name: &str) -> StoreResult<ArrayD<f64>> {
        let var = self.variable(name)?;
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let values: Vec<f64> = var.get_values(..)?;
        ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| StoreError::invalid(&self.path, format!("{name}: {e}")))
    }

    fn scalar(&self, name: &str) -> StoreResult<f64> {
        let values: Vec<f64> = self.variable(name)?.get_values(..)?;
        values
            .first()
            .copied()
            .ok_or_else(|| StoreError::invalid(&self.path, format!("{name} is empty")))
    }

    fn int(&self, name: &str) -> StoreResult<i64> {
        let values: Vec<i64> = self.variable(name)?.get_values(..)?;
        values
            .first()
            .copied()
            .ok_or_else(|| StoreError::invalid(&self.path, format!("{name} is empty")))
    }

    fn int_vec(&self, name: &str) -> StoreResult<Vec<i64>> {
        Ok(self.variable(name)?.get_values(..)?)
    }
}

pub struct NetCdfSink {
    path: PathBuf,
    file: netcdf::FileMut,
}

impl NetCdfSink {
    pub fn create(path: &Path) -> StoreResult<Self> {
        crate::silence_hdf5_errors();
        Ok(Self {
            path: path.to_path_buf(),
            file: netcdf::create(path)?,
        })
    }

    /// Register the private dimensions for one variable.
    fn add_dims(&mut self, leaf: &str, shape: &[usize]) -> StoreResult<Vec<String>> {
        let mut names = Vec::with_capacity(shape.len());
        for (i, &len) in shape.iter().enumerate() {
            let dim = format!("{leaf}_d{i}");
            self.file.add_dimension(&dim, len)?;
            names.push(dim);
        }
        Ok(names)
    }

    fn put_float<T: netcdf::NcTypeDescriptor>(
        &mut self,
        name: &str,
        shape: &[usize],
        values: &[T],
        compress: bool,
    ) -> StoreResult<()> {
        let leaf = leaf_name(name).to_string();
        let dims = self.add_dims(&leaf, shape)?;
        let dim_refs: Vec<&str> = dims.iter().map(String::as_str).collect();
        let mut var = self.file.add_variable::<T>(&leaf, &dim_refs)?;
        if compress {
            var.set_compression(1, true)?;
        }
        var.put_values(values, ..)?;
        Ok(())
    }
}

impl ArraySink for NetCdfSink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn put_f32(&mut self, name: &str, data: ArrayViewD<'_, f64>) -> StoreResult<()> {
        // Callers hand in permuted views; the raw buffer must be in C
        // order for the dims declared to the library.
        let cast: ArrayD<f32> = data.mapv(|v| v as f32).as_standard_layout().into_owned();
        let shape = cast.shape().to_vec();
        let values = cast.into_raw_vec_and_offset().0;
        self.put_float(name, &shape, &values, shape.len() >= 2)
    }

    fn put_f64(&mut self, name: &str, data: ArrayViewD<'_, f64>) -> StoreResult<()> {
        let owned = data.as_standard_layout().into_owned();
        let shape = owned.shape().to_vec();
        let values = owned.into_raw_vec_and_offset().0;
        self.put_float(name, &shape, &values, false)
    }

    fn put_int(&mut self, name: &str, value: i64) -> StoreResult<()> {
        self.put_int_slice(name, std::slice::from_ref(&value))
    }

    fn put_int_slice(&mut self, name: &str, values: &[i64]) -> StoreResult<()> {
        let leaf = leaf_name(name).to_string();
        let dims = self.add_dims(&leaf, &[values.len()])?;
        let dim_refs: Vec<&str> = dims.iter().map(String::as_str).collect();
        let mut var = self.file.add_variable::<i64>(&leaf, &dim_refs)?;
        var.put_values(values, ..)?;
        Ok(())
    }

    fn put_scalar(&mut self, name: &str, value: f64) -> StoreResult<()> {
        let leaf = leaf_name(name).to_string();
        let mut var = self.file.add_variable::<f64>(&leaf, &[])?;
        var.put_values(std::slice::from_ref(&value), ..)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ArrayD;

    #[test]
    fn permuted_views_are_stored_in_declared_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perm.nc");
        let arr = ArrayD::from_shape_fn(IxDyn(&[2, 3]), |ix| (ix[0] * 10 + ix[1]) as f64);

        {
            let mut sink = NetCdfSink::create(&path).unwrap();
            sink.put_f32("a32", arr.view().reversed_axes().into_dyn())
                .unwrap();
            sink.put_f64("a64", arr.view().reversed_axes().into_dyn())
                .unwrap();
        }

        let src = NetCdfSource::open(&path).unwrap();
        for name in ["a32", "a64"] {
            let back = src.array(name).unwrap();
            assert_eq!(back.shape(), &[3, 2]);
            assert_eq!(back[[0, 0]], 0.0);
            assert_eq!(back[[0, 1]], 10.0);
            assert_eq!(back[[2, 1]], 12.0);
        }
    }
}
