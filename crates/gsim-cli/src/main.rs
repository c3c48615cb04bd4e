//! Command-line front end for the simulation data layer:
//! - convert grid geometry and output frames between encodings
//! - cross-check a run's grid against a reference run

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use gsim_compare::Tolerance;
use gsim_store::FileFormat;

#[derive(Parser, Debug)]
#[command(name = "gsim")]
#[command(about = "Simulation data conversion and validation")]
struct Args {
    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutFormat {
    H5,
    Nc,
}

impl From<OutFormat> for FileFormat {
    fn from(f: OutFormat) -> Self {
        match f {
            OutFormat::H5 => FileFormat::Hdf5,
            OutFormat::Nc => FileFormat::NetCdf,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a grid (any encoding) to the requested container format
    ConvertGrid {
        /// Simulation directory or grid file
        input: PathBuf,

        /// Output encoding
        #[arg(long, value_enum)]
        format: OutFormat,

        /// Output directory (defaults to the input directory)
        #[arg(long)]
        outdir: Option<PathBuf>,
    },

    /// Convert one output frame to the requested container format
    ConvertFrame {
        /// Simulation directory
        simdir: PathBuf,

        /// Frame timestamp, RFC 3339 (e.g. 2013-02-20T05:00:00Z)
        #[arg(long)]
        time: String,

        /// Output encoding
        #[arg(long, value_enum)]
        format: OutFormat,

        /// Output directory (defaults to the simulation directory)
        #[arg(long)]
        outdir: Option<PathBuf>,
    },

    /// Compare a run's grid against a reference run
    CompareGrid {
        /// Directory of the run under test
        new_dir: PathBuf,

        /// Directory of the reference run
        ref_dir: PathBuf,

        /// Relative tolerance
        #[arg(long, default_value = "1e-5")]
        rtol: f64,

        /// Absolute tolerance
        #[arg(long, default_value = "1e-8")]
        atol: f64,

        /// JSON tolerance file, overrides --rtol/--atol
        #[arg(long)]
        tol_file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::ConvertGrid {
            input,
            format,
            outdir,
        } => convert_grid(&input, format.into(), outdir.as_deref()),
        Command::ConvertFrame {
            simdir,
            time,
            format,
            outdir,
        } => convert_frame(&simdir, &time, format.into(), outdir.as_deref()),
        Command::CompareGrid {
            new_dir,
            ref_dir,
            rtol,
            atol,
            tol_file,
        } => compare_grid(&new_dir, &ref_dir, rtol, atol, tol_file.as_deref()),
    }
}

/// Output directory: explicit flag, else alongside the input.
fn resolve_outdir(input: &Path, outdir: Option<&Path>) -> PathBuf {
    match outdir {
        Some(dir) => dir.to_path_buf(),
        None if input.is_file() => input
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf(),
        None => input.to_path_buf(),
    }
}

fn convert_grid(input: &Path, format: FileFormat, outdir: Option<&Path>) -> Result<()> {
    let grid = gsim_io::read_grid(input)
        .with_context(|| format!("reading grid from {}", input.display()))?;

    let outdir = resolve_outdir(input, outdir);
    std::fs::create_dir_all(&outdir)?;
    let size_path = outdir.join(format!("simsize{}", format.extension()));
    let grid_path = outdir.join(format!("simgrid{}", format.extension()));
    gsim_io::write_grid(&size_path, &grid_path, &grid)
        .with_context(|| format!("writing grid to {}", grid_path.display()))?;

    info!(path = %grid_path.display(), "grid converted");
    Ok(())
}

fn convert_frame(simdir: &Path, time: &str, format: FileFormat, outdir: Option<&Path>) -> Result<()> {
    let time: DateTime<Utc> = DateTime::parse_from_rfc3339(time)
        .with_context(|| format!("parsing timestamp {time:?}"))?
        .with_timezone(&Utc);

    let frame = gsim_io::read_frame(simdir, &time, None)
        .with_context(|| format!("reading frame {time} from {}", simdir.display()))?;

    let outdir = resolve_outdir(simdir, outdir);
    std::fs::create_dir_all(&outdir)?;
    let path = gsim_io::write_frame(&outdir, &frame, format)?;

    info!(path = %path.display(), "frame converted");
    Ok(())
}

fn compare_grid(
    new_dir: &Path,
    ref_dir: &Path,
    rtol: f64,
    atol: f64,
    tol_file: Option<&Path>,
) -> Result<()> {
    let tol = match tol_file {
        Some(path) => Tolerance::from_file(path)?,
        None => Tolerance { rtol, atol },
    };

    let errs = gsim_compare::compare_grids(new_dir, ref_dir, &tol)?;
    if errs > 0 {
        error!(errors = errs, "grid comparison failed");
        // Exit code carries the failure count for scripting.
        std::process::exit(errs.min(125) as i32);
    }
    info!("grid comparison passed");
    Ok(())
}
