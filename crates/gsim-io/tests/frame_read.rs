//! Integration test: frame files through the hierarchical container.
//!
//! 1. Write frame files in the on-disk (Fortran) dimension order
//! 2. Read them back through the directory + timestamp lookup
//! 3. Verify the axis reordering, shape validation, reconstructed bulk
//!    moments, companion emission maps and the written-frame/state layouts

use chrono::{DateTime, TimeZone, Utc};
use ndarray::{ArrayD, Axis, IxDyn};

use gsim_common::{Frame, GridSize, LSP, LSP_ION};
use gsim_io::DataError;
use gsim_store::{ArraySink, ArraySource, FileFormat};

const LX: GridSize = GridSize {
    lx1: 2,
    lx2: 3,
    lx3: 4,
};

fn frame_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2013, 2, 20, 5, 0, 0).unwrap()
}

/// Species-resolved field with value `s*1000 + x1*100 + x2*10 + x3`.
fn species_field(offset: f64) -> ArrayD<f64> {
    ArrayD::from_shape_fn(IxDyn(&[LSP, LX.lx1, LX.lx2, LX.lx3]), |ix| {
        offset + (ix[0] * 1000 + ix[1] * 100 + ix[2] * 10 + ix[3]) as f64
    })
}

/// Volumetric field with value `offset + x1*100 + x2*10 + x3`.
fn volume_field(offset: f64) -> ArrayD<f64> {
    ArrayD::from_shape_fn(IxDyn(&[LX.lx1, LX.lx2, LX.lx3]), |ix| {
        offset + (ix[0] * 100 + ix[1] * 10 + ix[2]) as f64
    })
}

fn write_simsize(dir: &std::path::Path) {
    let mut sink = gsim_store::create(&dir.join("simsize.h5")).unwrap();
    sink.put_int_slice("lxs", &[LX.lx1 as i64, LX.lx2 as i64, LX.lx3 as i64])
        .unwrap();
}

/// Write a curvilinear frame the way the Fortran producer stores it:
/// species arrays as (lsp, x3, x2, x1), vectors as (x3, x2, x1), the top
/// potential as (x3, x2).
fn write_curv_frame(dir: &std::path::Path, ns: &ArrayD<f64>, vs1: &ArrayD<f64>, ts: &ArrayD<f64>) {
    let path = dir.join("20130220_18000.000000.h5");
    let mut sink = gsim_store::create(&path).unwrap();
    sink.put_int("flagoutput", 1).unwrap();
    sink.put_int_slice("time/ymd", &[2013, 2, 20]).unwrap();
    sink.put_scalar("time/UTsec", 18000.0).unwrap();

    for (name, arr) in [("nsall", ns), ("vs1all", vs1), ("Tsall", ts)] {
        sink.put_f32(name, arr.view().permuted_axes(IxDyn(&[0, 3, 2, 1])))
            .unwrap();
    }
    for (name, offset) in [
        ("J1all", 10.0),
        ("J2all", 20.0),
        ("J3all", 30.0),
        ("v2avgall", 40.0),
        ("v3avgall", 50.0),
    ] {
        let arr = volume_field(offset);
        sink.put_f32(name, arr.view().permuted_axes(IxDyn(&[2, 1, 0])))
            .unwrap();
    }
    let phitop = ArrayD::from_shape_fn(IxDyn(&[LX.lx2, LX.lx3]), |ix| (ix[0] * 10 + ix[1]) as f64);
    sink.put_f32("Phiall", phitop.view().reversed_axes().into_dyn())
        .unwrap();
}

#[test]
fn curvilinear_frame_reorders_and_derives_moments() {
    let dir = tempfile::tempdir().unwrap();
    write_simsize(dir.path());

    let ns = species_field(1.0);
    let vs1 = species_field(0.0);
    let ts = species_field(100.0);
    write_curv_frame(dir.path(), &ns, &vs1, &ts);

    let frame = gsim_io::read_frame(dir.path(), &frame_time(), None).unwrap();
    assert_eq!(frame.time, frame_time());

    let got_ns = frame.get("ns").unwrap();
    assert_eq!(got_ns.shape(), &[LSP, LX.lx1, LX.lx2, LX.lx3]);
    assert_eq!(got_ns, &ns);

    // Vectors land back in (x1, x2, x3) order.
    let j2 = frame.get("J2").unwrap();
    assert_eq!(j2.shape(), &[LX.lx1, LX.lx2, LX.lx3]);
    assert_eq!(j2[[1, 2, 3]], 20.0 + 123.0);

    let phi = frame.get("Phitop").unwrap();
    assert_eq!(phi.shape(), &[LX.lx2, LX.lx3]);
    assert_eq!(phi[[2, 3]], 23.0);

    // Electron density and temperature are the last species.
    let ne = frame.get("ne").unwrap();
    assert_eq!(ne, &ns.index_axis(Axis(0), LSP - 1).to_owned());
    let te = frame.get("Te").unwrap();
    assert_eq!(te[[0, 0, 0]], 100.0 + 6000.0);

    // Ion moments are density-weighted over the first six species.
    let at = [1usize, 2, 3];
    let mut weighted = 0.0;
    for s in 0..LSP_ION {
        weighted += ns[[s, 1, 2, 3]] * vs1[[s, 1, 2, 3]];
    }
    let v1 = frame.get("v1").unwrap();
    assert!((v1[&at[..]] - weighted / ne[&at[..]]).abs() < 1e-9 * weighted.abs());
}

/// Write a density-only frame the way the Fortran producer stores it:
/// `ne` as (x3, x2, x1).
fn write_density_only_frame(dir: &std::path::Path, ne: &ArrayD<f64>) {
    let path = dir.join("20130220_18000.000000.h5");
    let mut sink = gsim_store::create(&path).unwrap();
    sink.put_int("flagoutput", 0).unwrap();
    sink.put_int_slice("time/ymd", &[2013, 2, 20]).unwrap();
    sink.put_scalar("time/UTsec", 18000.0).unwrap();
    sink.put_f32("ne", ne.view().permuted_axes(IxDyn(&[2, 1, 0])))
        .unwrap();
}

#[test]
fn density_only_frame_is_reoriented() {
    // The electron density record gets the same full axis reversal as the
    // legacy flat-binary reader, so lx2 != lx3 here catches any swap.
    let dir = tempfile::tempdir().unwrap();
    write_simsize(dir.path());

    let ne = volume_field(0.0);
    write_density_only_frame(dir.path(), &ne);

    let frame = gsim_io::read_frame(dir.path(), &frame_time(), None).unwrap();
    let got = frame.get("ne").unwrap();
    assert_eq!(got.shape(), &[LX.lx1, LX.lx2, LX.lx3]);
    assert_eq!(got, &ne);
    assert!(frame.get("v1").is_none());
}

#[test]
fn aurora_sibling_attaches_with_wavelength_leading() {
    let dir = tempfile::tempdir().unwrap();
    write_simsize(dir.path());
    write_density_only_frame(dir.path(), &volume_field(0.0));

    // Companion emission map stored as (wavelength, x3, x2).
    let mem = ArrayD::from_shape_fn(IxDyn(&[15, LX.lx2, LX.lx3]), |ix| {
        (ix[0] * 100 + ix[1] * 10 + ix[2]) as f64
    });
    let aur_dir = dir.path().join("aurmaps");
    std::fs::create_dir(&aur_dir).unwrap();
    let mut sink = gsim_store::create(&aur_dir.join("20130220_18000.000000.h5")).unwrap();
    sink.put_f32("aurora/iverout", mem.view().permuted_axes(IxDyn(&[0, 2, 1])))
        .unwrap();
    drop(sink);

    let frame = gsim_io::read_frame(dir.path(), &frame_time(), None).unwrap();
    let got = frame.get("rayleighs").unwrap();
    assert_eq!(got.shape(), &[15, LX.lx2, LX.lx3]);
    assert_eq!(got, &mem);

    let labels = frame.wavelengths.as_ref().unwrap();
    assert_eq!(labels.len(), 15);
    assert_eq!(labels[11], "LBH");
}

#[test]
fn averaged_frame_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    write_simsize(dir.path());

    let mut frame = Frame::new(frame_time());
    for (i, name) in ["ne", "v1", "Ti", "Te", "J1", "J2", "J3", "v2", "v3"]
        .iter()
        .enumerate()
    {
        frame.insert(*name, volume_field((i * 1000) as f64));
    }
    frame.insert(
        "Phitop",
        ArrayD::from_shape_fn(IxDyn(&[LX.lx2, LX.lx3]), |ix| (ix[0] * 10 + ix[1]) as f64),
    );

    let path = gsim_io::write_frame(dir.path(), &frame, FileFormat::Hdf5).unwrap();
    // The written file carries its own layout marker; no hint needed.
    let back = gsim_io::read_frame_file(&path, None).unwrap();

    assert_eq!(back.time, frame.time);
    for name in ["ne", "v1", "Ti", "Te", "J1", "J2", "J3", "v2", "v3", "Phitop"] {
        assert_eq!(back.get(name).unwrap(), frame.get(name).unwrap(), "{name}");
    }
}

#[test]
fn state_file_stores_species_last() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("initial_conditions.h5");

    let ns = species_field(1.0);
    let vs1 = species_field(0.0);
    let ts = species_field(100.0);
    gsim_io::write_state(&path, &frame_time(), &ns, &vs1, &ts).unwrap();

    let src = gsim_store::open(&path).unwrap();
    assert_eq!(src.int_vec("time/ymd").unwrap(), vec![2013, 2, 20]);
    assert_eq!(src.scalar("time/UTsec").unwrap(), 18000.0);

    // Species axis stays first; the spatial axes are reversed on disk.
    let disk = src.array("nsall").unwrap();
    assert_eq!(disk.shape(), &[LSP, LX.lx3, LX.lx2, LX.lx1]);
    assert_eq!(disk[[2, 3, 1, 0]], ns[[2, 0, 1, 3]]);
    assert_eq!(disk[[6, 0, 2, 1]], ns[[6, 1, 2, 0]]);

    // A wrong species count never reaches the disk.
    let bad = ArrayD::<f64>::zeros(IxDyn(&[LSP - 1, LX.lx1, LX.lx2, LX.lx3]));
    match gsim_io::write_state(&dir.path().join("bad.h5"), &frame_time(), &bad, &bad, &bad) {
        Err(DataError::ShapeMismatch { name, .. }) => assert_eq!(name, "nsall"),
        other => panic!("expected ShapeMismatch, got {other:?}"),
    }
}

#[test]
fn disagreeing_species_shape_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_simsize(dir.path());

    let path = dir.path().join("20130220_18000.000000.h5");
    let mut sink = gsim_store::create(&path).unwrap();
    sink.put_int("flagoutput", 1).unwrap();
    sink.put_int_slice("time/ymd", &[2013, 2, 20]).unwrap();
    sink.put_scalar("time/UTsec", 18000.0).unwrap();
    // Wrong spatial extent: x1 plane dropped.
    let bad = ArrayD::<f64>::zeros(IxDyn(&[LSP, LX.lx3, LX.lx2, 1]));
    sink.put_f32("nsall", bad.view()).unwrap();
    drop(sink);

    match gsim_io::read_frame_file(&path, None) {
        Err(DataError::ShapeMismatch { name, .. }) => assert_eq!(name, "ns"),
        other => panic!("expected ShapeMismatch, got {other:?}"),
    }
}
