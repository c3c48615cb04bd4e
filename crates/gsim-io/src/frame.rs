//! Frame (time-slice) reading and writing.
//!
//! Frame files keep the Fortran producer's dimension order and one of
//! three record layouts selected by the solver's `flagoutput` knob. The
//! reader resolves the layout, reorients every array into the in-memory
//! (species, x1, x2, x3) convention and reconstructs the bulk moments
//! from species-resolved data where they are not stored directly.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ndarray::{ArrayD, Axis, IxDyn, Slice};
use tracing::{debug, info};

use gsim_common::time::{frame_stem, from_ymd_utsec, to_ymd_utsec};
use gsim_common::{FlagOutput, Frame, GridSize, LSP, LSP_ION, WAVELENGTHS};
use gsim_store::{ArraySink, ArraySource, FileFormat, StoreError};

use crate::error::{DataError, DataResult};
use crate::find::{default_max_offset, frame_file};
use crate::simsize::read_simsize;

/// The slice of the external solver configuration this layer consumes.
/// Full configuration parsing belongs to the solver tooling.
#[derive(Debug, Clone, Default)]
pub struct SimulationConfig {
    pub root: PathBuf,
    pub flagoutput: Option<FlagOutput>,
}

impl SimulationConfig {
    /// Read the frame closest to `time` for this run.
    pub fn frame(&self, time: &DateTime<Utc>) -> DataResult<Frame> {
        read_frame(&self.root, time, self.flagoutput)
    }
}

/// Read the frame closest to `time` in `simdir`.
///
/// Uses the default filename-timestamp tolerance; callers needing a wider
/// window locate the file with [`frame_file`] and use [`read_frame_file`].
pub fn read_frame(
    simdir: &Path,
    time: &DateTime<Utc>,
    flag: Option<FlagOutput>,
) -> DataResult<Frame> {
    let file = frame_file(simdir, time, None, default_max_offset(), true)?
        .expect("required find returns Some");
    read_frame_file(&file, flag)
}

/// Read one frame file. The grid size comes from the companion descriptor
/// in the same directory tree.
pub fn read_frame_file(file: &Path, flag: Option<FlagOutput>) -> DataResult<Frame> {
    let lx = read_simsize(file)?;
    debug!(path = %file.display(), size = %lx, "reading frame");

    let frame = match FileFormat::from_path(file)? {
        FileFormat::Raw => {
            // Raw streams carry no layout marker at all.
            let flag = flag.ok_or_else(|| {
                DataError::Store(StoreError::Invalid {
                    path: file.to_path_buf(),
                    reason: "raw frames need an output mode from the configuration".to_string(),
                })
            })?;
            let src = gsim_store::raw::open_frame(file, flag, lx)?;
            read_raw_frame(&src, flag)?
        }
        _ => {
            let src = gsim_store::open(file)?;
            let flag = resolve_flag(src.as_ref(), flag)?;
            read_container_frame(src.as_ref(), file, lx, flag)?
        }
    };

    attach_aurora(file, lx, frame)
}

/// Which record layout does this file use? File marker wins, then the
/// caller's configuration, then key-presence inference.
fn resolve_flag(src: &dyn ArraySource, hint: Option<FlagOutput>) -> DataResult<FlagOutput> {
    if src.contains("flagoutput") {
        let raw = src.int("flagoutput")?;
        return FlagOutput::from_flag(raw).ok_or_else(|| {
            DataError::Store(StoreError::Invalid {
                path: src.path().to_path_buf(),
                reason: format!("unknown flagoutput {raw}"),
            })
        });
    }
    if let Some(flag) = hint {
        return Ok(flag);
    }
    let flag = if src.contains("nsall") {
        Some(FlagOutput::Curvilinear)
    } else if src.contains("neall") {
        Some(FlagOutput::CurvilinearAveraged)
    } else if src.contains("ne") {
        Some(FlagOutput::DensityOnly)
    } else {
        None
    };
    flag.ok_or_else(|| {
        DataError::Store(StoreError::MissingKey {
            path: src.path().to_path_buf(),
            key: "flagoutput".to_string(),
        })
    })
}

/// Timestamp from `time/ymd` plus seconds-of-day, accepting the legacy
/// decimal-hours encoding.
pub(crate) fn read_time(src: &dyn ArraySource) -> DataResult<DateTime<Utc>> {
    let ymd = src.int_vec("time/ymd")?;
    if ymd.len() < 3 {
        return Err(DataError::Store(StoreError::Invalid {
            path: src.path().to_path_buf(),
            reason: format!("time/ymd has {} elements, expected 3", ymd.len()),
        }));
    }
    let utsec = if src.contains("time/UTsec") {
        src.scalar("time/UTsec")?
    } else {
        src.scalar("time/UThour")? * 3600.0
    };
    Ok(from_ymd_utsec([ymd[0], ymd[1], ymd[2]], utsec)?)
}

/// Read a stored array, permute it into memory order and validate the
/// resulting shape.
fn import(
    src: &dyn ArraySource,
    file: &Path,
    disk: &str,
    name: &str,
    perm: &[usize],
    expected: &[usize],
) -> DataResult<ArrayD<f64>> {
    let arr = src.array(disk)?;
    if arr.ndim() != perm.len() {
        return Err(DataError::shape_mismatch(name, file, expected, arr.shape()));
    }
    let arr = arr.permuted_axes(IxDyn(perm));
    if arr.shape() != expected {
        return Err(DataError::shape_mismatch(name, file, expected, arr.shape()));
    }
    Ok(arr)
}

fn read_container_frame(
    src: &dyn ArraySource,
    file: &Path,
    lx: GridSize,
    flag: FlagOutput,
) -> DataResult<Frame> {
    let mut frame = Frame::new(read_time(src)?);
    let [l1, l2, l3] = lx.as_array();
    let volume = [l1, l2, l3];
    let species = [LSP, l1, l2, l3];

    match flag {
        FlagOutput::DensityOnly => {
            let ne = if src.contains("nsall") {
                let p4: [usize; 4] = if lx.is_east_west() {
                    [0, 3, 1, 2]
                } else {
                    [0, 3, 2, 1]
                };
                let ns = import(src, file, "nsall", "ns", &p4, &species)?;
                ns.index_axis(Axis(0), LSP - 1).to_owned()
            } else {
                import(src, file, "ne", "ne", &[2, 1, 0], &volume)?
            };
            frame.insert("ne", ne);
        }
        FlagOutput::Curvilinear => {
            let (p4, p3): ([usize; 4], [usize; 3]) = if lx.is_east_west() {
                ([0, 3, 1, 2], [2, 0, 1])
            } else {
                ([0, 3, 2, 1], [2, 1, 0])
            };
            for (disk, name) in [("nsall", "ns"), ("vs1all", "vs1"), ("Tsall", "Ts")] {
                frame.insert(name, import(src, file, disk, name, &p4, &species)?);
            }
            derive_bulk(&mut frame);
            for (disk, name) in [
                ("J1all", "J1"),
                ("J2all", "J2"),
                ("J3all", "J3"),
                ("v2avgall", "v2"),
                ("v3avgall", "v3"),
            ] {
                frame.insert(name, import(src, file, disk, name, &p3, &volume)?);
            }
            frame.insert("Phitop", src.array("Phiall")?.reversed_axes());
        }
        FlagOutput::CurvilinearAveraged => {
            let p3 = [2usize, 0, 1];
            for (disk, name) in [
                ("neall", "ne"),
                ("v1avgall", "v1"),
                ("Tavgall", "Ti"),
                ("TEall", "Te"),
                ("J1all", "J1"),
                ("J2all", "J2"),
                ("J3all", "J3"),
                ("v2avgall", "v2"),
                ("v3avgall", "v3"),
            ] {
                frame.insert(name, import(src, file, disk, name, &p3, &volume)?);
            }
            frame.insert("Phitop", src.array("Phiall")?);
        }
    }
    Ok(frame)
}

/// Raw sources already come back in memory order; only the bulk moments
/// and the density-only reduction remain to be done.
fn read_raw_frame(src: &dyn ArraySource, flag: FlagOutput) -> DataResult<Frame> {
    let mut frame = Frame::new(read_time(src)?);
    match flag {
        FlagOutput::DensityOnly => {
            let ns = src.array("ns")?;
            frame.insert("ne", ns.index_axis(Axis(0), LSP - 1).to_owned());
        }
        FlagOutput::Curvilinear => {
            for name in ["ns", "vs1", "Ts", "J1", "J2", "J3", "v2", "v3", "Phitop"] {
                if src.contains(name) {
                    frame.insert(name, src.array(name)?);
                }
            }
            derive_bulk(&mut frame);
        }
        FlagOutput::CurvilinearAveraged => {
            for name in ["ne", "v1", "Ti", "Te", "J1", "J2", "J3", "v2", "v3", "Phitop"] {
                if src.contains(name) {
                    frame.insert(name, src.array(name)?);
                }
            }
        }
    }
    Ok(frame)
}

/// Reconstruct the bulk moments from species-resolved fields: electron
/// density and temperature from the last species, ion drift and
/// temperature as density-weighted averages over the ion species.
fn derive_bulk(frame: &mut Frame) {
    let (Some(ns), Some(vs1), Some(ts)) = (frame.get("ns"), frame.get("vs1"), frame.get("Ts"))
    else {
        return;
    };
    let ne = ns.index_axis(Axis(0), LSP - 1).to_owned();
    let ions = Slice::from(..LSP_ION);
    let n_ions = ns.slice_axis(Axis(0), ions);
    let v1 = (&n_ions * &vs1.slice_axis(Axis(0), ions)).sum_axis(Axis(0)) / &ne;
    let ti = (&n_ions * &ts.slice_axis(Axis(0), ions)).sum_axis(Axis(0)) / &ne;
    let te = ts.index_axis(Axis(0), LSP - 1).to_owned();

    frame.insert("v1", v1);
    frame.insert("Ti", ti);
    frame.insert("Te", te);
    frame.insert("ne", ne);
}

/// Pull in the companion auroral-emission file when one exists, named
/// like the frame under the `aurmaps/` sibling directory.
fn attach_aurora(file: &Path, lx: GridSize, mut frame: Frame) -> DataResult<Frame> {
    let parent = file.parent().unwrap_or(Path::new("."));
    let name = match file.file_name() {
        Some(n) => n,
        None => return Ok(frame),
    };
    let sibling = parent.join("aurmaps").join(name);
    if !sibling.is_file() {
        return Ok(frame);
    }
    debug!(path = %sibling.display(), "attaching auroral emissions");

    let [_, l2, l3] = lx.as_array();
    let expected = [WAVELENGTHS.len(), l2, l3];
    let arr = match FileFormat::from_path(&sibling)? {
        FileFormat::Raw => gsim_store::raw::open_aurora(&sibling, lx)?.array("rayleighs")?,
        _ => {
            let src = gsim_store::open(&sibling)?;
            import(
                src.as_ref(),
                &sibling,
                "aurora/iverout",
                "rayleighs",
                &[0, 2, 1],
                &expected,
            )?
        }
    };
    frame.insert("rayleighs", arr);
    frame.wavelengths = Some(WAVELENGTHS.iter().map(|s| s.to_string()).collect());
    Ok(frame)
}

pub(crate) fn write_time(sink: &mut dyn ArraySink, time: &DateTime<Utc>) -> DataResult<()> {
    let (ymd, utsec) = to_ymd_utsec(time);
    sink.put_int_slice("time/ymd", &ymd)?;
    sink.put_scalar("time/UTsec", utsec)?;
    Ok(())
}

/// Write an initial-state file: species-resolved density, parallel drift
/// and temperature, ghost cells already trimmed. Electrodynamic fields
/// are never part of the initial state.
pub fn write_state(
    path: &Path,
    time: &DateTime<Utc>,
    ns: &ArrayD<f64>,
    vs1: &ArrayD<f64>,
    ts: &ArrayD<f64>,
) -> DataResult<()> {
    info!(path = %path.display(), "writing initial state");
    let mut sink = gsim_store::create(path)?;
    write_time(sink.as_mut(), time)?;
    for (name, arr) in [("nsall", ns), ("vs1all", vs1), ("Tsall", ts)] {
        if arr.ndim() != 4 || arr.shape()[0] != LSP {
            let mut expected = vec![LSP];
            expected.extend(arr.shape().iter().skip(1).copied());
            return Err(DataError::shape_mismatch(name, path, &expected, arr.shape()));
        }
        // Species last in the on-disk Fortran view.
        sink.put_f32(name, arr.view().permuted_axes(IxDyn(&[0, 3, 2, 1])))?;
    }
    Ok(())
}

/// Write a frame in the averaged layout, the conversion output format.
/// Returns the path written.
pub fn write_frame(simdir: &Path, frame: &Frame, format: FileFormat) -> DataResult<PathBuf> {
    format.ensure_available()?;
    let path = simdir.join(format!("{}{}", frame_stem(&frame.time), format.extension()));
    info!(path = %path.display(), "writing frame");

    let mut sink = gsim_store::create(&path)?;
    // Mark the layout so the file resolves its own mode when read back.
    sink.put_int("flagoutput", FlagOutput::CurvilinearAveraged.flag())?;
    write_time(sink.as_mut(), &frame.time)?;

    // Inverse of the averaged import permutation.
    let inv = [1usize, 2, 0];
    for (name, disk) in [
        ("ne", "neall"),
        ("v1", "v1avgall"),
        ("Ti", "Tavgall"),
        ("Te", "TEall"),
        ("J1", "J1all"),
        ("J2", "J2all"),
        ("J3", "J3all"),
        ("v2", "v2avgall"),
        ("v3", "v3avgall"),
    ] {
        match frame.get(name) {
            Some(arr) if arr.ndim() == 3 => {
                sink.put_f32(disk, arr.view().permuted_axes(IxDyn(&inv)))?
            }
            Some(arr) => {
                return Err(DataError::Store(StoreError::Invalid {
                    path: path.clone(),
                    reason: format!("{name} must be rank 3, got shape {:?}", arr.shape()),
                }))
            }
            None => debug!(field = name, "frame field absent, skipping"),
        }
    }
    if let Some(phi) = frame.get("Phitop") {
        sink.put_f32("Phiall", phi.view())?;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ndarray::ArrayD;

    #[test]
    fn bulk_moments_from_species() {
        let mut frame = Frame::new(Utc.with_ymd_and_hms(2013, 2, 20, 5, 0, 0).unwrap());
        // One cell, seven species: ions 1..=6, electrons = 21 (quasi-neutral).
        let mut ns = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let electrons: f64 = ns.iter().sum();
        ns.push(electrons);
        let vs1: Vec<f64> = (0..7).map(|i| (i + 1) as f64 * 10.0).collect();
        let ts: Vec<f64> = (0..7).map(|i| 100.0 + i as f64).collect();
        let shape = IxDyn(&[7, 1, 1, 1]);
        frame.insert("ns", ArrayD::from_shape_vec(shape.clone(), ns).unwrap());
        frame.insert("vs1", ArrayD::from_shape_vec(shape.clone(), vs1).unwrap());
        frame.insert("Ts", ArrayD::from_shape_vec(shape, ts).unwrap());

        derive_bulk(&mut frame);

        let at = [0usize, 0, 0];
        assert_eq!(frame.get("ne").unwrap()[&at[..]], 21.0);
        assert_eq!(frame.get("Te").unwrap()[&at[..]], 106.0);
        // v1 = sum(n_i * v_i) / ne = (10 + 40 + 90 + 160 + 250 + 360) / 21
        let v1 = frame.get("v1").unwrap()[&at[..]];
        assert!((v1 - 910.0 / 21.0).abs() < 1e-12);
        let ti = frame.get("Ti").unwrap()[&at[..]];
        let want = (100.0 + 2.0 * 101.0 + 3.0 * 102.0 + 4.0 * 103.0 + 5.0 * 104.0 + 6.0 * 105.0)
            / 21.0;
        assert!((ti - want).abs() < 1e-12);
    }

    #[test]
    fn density_only_raw_reduces_to_electrons() {
        let mut arrays = Frame::new(Utc.with_ymd_and_hms(2013, 2, 20, 5, 0, 0).unwrap());
        let ns: Vec<f64> = (0..7).map(|i| i as f64).collect();
        arrays.insert(
            "ns",
            ArrayD::from_shape_vec(IxDyn(&[7, 1, 1, 1]), ns).unwrap(),
        );
        let ns = arrays.get("ns").unwrap();
        let ne = ns.index_axis(Axis(0), LSP - 1);
        assert_eq!(ne[[0, 0, 0]], 6.0);
    }
}
