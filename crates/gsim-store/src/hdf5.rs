//! HDF5 backend, the preferred hierarchical container.
//!
//! Datasets are stored however the producer wrote them (Fortran dimension
//! order, mostly f32); reads convert to f64 and leave the order alone.
//! Volumetric writes apply shuffle + deflate(1) + fletcher32, matching the
//! solver's own output filters.

use std::path::{Path, PathBuf};

use hdf5_metno as hdf5;
use ndarray::{ArrayD, ArrayViewD, IxDyn};

use crate::error::{StoreError, StoreResult};
use crate::{ArraySink, ArraySource};

pub struct Hdf5Source {
    path: PathBuf,
    file: hdf5::File,
}

impl Hdf5Source {
    pub fn open(path: &Path) -> StoreResult<Self> {
        crate::silence_hdf5_errors();
        Ok(Self {
            path: path.to_path_buf(),
            file: hdf5::File::open(path)?,
        })
    }

    fn dataset(&self, name: &str) -> StoreResult<hdf5::Dataset> {
        self.file
            .dataset(name)
            .map_err(|_| StoreError::missing(&self.path, name))
    }
}

impl ArraySource for Hdf5Source {
    fn path(&self) -> &Path {
        &self.path
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.file.member_names()?)
    }

    fn contains(&self, name: &str) -> bool {
        self.file.dataset(name).is_ok()
    }

    fn array(&self, name: &str) -> StoreResult<ArrayD<f64>> {
        let ds = self.dataset(name)?;
        let shape = ds.shape();
        let data = ds.read_raw::<f64>()?;
        ArrayD::from_shape_vec(IxDyn(&shape), data)
            .map_err(|e| StoreError::invalid(&self.path, format!("{name}: {e}")))
    }

    fn scalar(&self, name: &str) -> StoreResult<f64> {
        let values = self.dataset(name)?.read_raw::<f64>()?;
        values
            .first()
            .copied()
            .ok_or_else(|| StoreError::invalid(&self.path, format!("{name} is empty")))
    }

    fn int(&self, name: &str) -> StoreResult<i64> {
        let values = self.dataset(name)?.read_raw::<i64>()?;
        values
            .first()
            .copied()
            .ok_or_else(|| StoreError::invalid(&self.path, format!("{name} is empty")))
    }

    fn int_vec(&self, name: &str) -> StoreResult<Vec<i64>> {
        Ok(self.dataset(name)?.read_raw::<i64>()?)
    }
}

pub struct Hdf5Sink {
    path: PathBuf,
    file: hdf5::File,
}

impl Hdf5Sink {
    pub fn create(path: &Path) -> StoreResult<Self> {
        crate::silence_hdf5_errors();
        Ok(Self {
            path: path.to_path_buf(),
            file: hdf5::File::create(path)?,
        })
    }

    /// Create intermediate groups for nested dataset names like `time/ymd`.
    fn ensure_parent(&self, name: &str) -> StoreResult<()> {
        if let Some((parent, _)) = name.rsplit_once('/') {
            if self.file.group(parent).is_err() {
                self.file.create_group(parent)?;
            }
        }
        Ok(())
    }
}

impl ArraySink for Hdf5Sink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn put_f32(&mut self, name: &str, data: ArrayViewD<'_, f64>) -> StoreResult<()> {
        self.ensure_parent(name)?;
        // Callers hand in permuted views; the buffer must be rewritten in
        // C order for the declared shape before it reaches the library.
        let cast: ArrayD<f32> = data.mapv(|v| v as f32).as_standard_layout().into_owned();
        let builder = self.file.new_dataset_builder().with_data(&cast);
        let builder = if cast.ndim() >= 2 {
            builder.shuffle().deflate(1).fletcher32()
        } else {
            builder
        };
        builder.create(name)?;
        Ok(())
    }

    fn put_f64(&mut self, name: &str, data: ArrayViewD<'_, f64>) -> StoreResult<()> {
        self.ensure_parent(name)?;
        let owned = data.as_standard_layout().into_owned();
        self.file
            .new_dataset_builder()
            .with_data(&owned)
            .create(name)?;
        Ok(())
    }

    fn put_int(&mut self, name: &str, value: i64) -> StoreResult<()> {
        self.put_int_slice(name, &[value])
    }

    fn put_int_slice(&mut self, name: &str, values: &[i64]) -> StoreResult<()> {
        self.ensure_parent(name)?;
        self.file
            .new_dataset_builder()
            .with_data(values)
            .create(name)?;
        Ok(())
    }

    fn put_scalar(&mut self, name: &str, value: f64) -> StoreResult<()> {
        self.ensure_parent(name)?;
        self.file
            .new_dataset_builder()
            .with_data(&ndarray::arr0(value))
            .create(name)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    #[test]
    fn permuted_views_are_stored_in_declared_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perm.h5");
        let arr = ArrayD::from_shape_fn(IxDyn(&[2, 3]), |ix| (ix[0] * 10 + ix[1]) as f64);

        {
            let mut sink = Hdf5Sink::create(&path).unwrap();
            sink.put_f32("a32", arr.view().reversed_axes().into_dyn())
                .unwrap();
            sink.put_f64("a64", arr.view().reversed_axes().into_dyn())
                .unwrap();
        }

        let src = Hdf5Source::open(&path).unwrap();
        for name in ["a32", "a64"] {
            let back = src.array(name).unwrap();
            assert_eq!(back.shape(), &[3, 2]);
            assert_eq!(back[[0, 0]], 0.0);
            assert_eq!(back[[0, 1]], 10.0);
            assert_eq!(back[[2, 1]], 12.0);
        }
    }
}
