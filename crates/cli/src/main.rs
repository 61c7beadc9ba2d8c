//! fragscape CLI - landscape fragmentation from binary cover rasters

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use fragscape_algorithms::landscape::{
    fragmentation, FragmentationClass, FragmentationParams, UndeterminedPolicy,
};
use fragscape_core::io::{read_geotiff, write_geotiff};
use fragscape_core::Raster;
use fragscape_parallel::{binarize, ProcessingMode};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "fragscape")]
#[command(author, version, about = "Landscape fragmentation analysis", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Number of worker threads (default: all cores)
    #[arg(short = 'j', long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Cover density, connectivity and fragmentation class
    Fragmentation {
        /// Binary cover raster (1 = cover, 0 = no cover, nodata = missing)
        input: PathBuf,
        /// Output file for class codes (0-6)
        #[arg(long)]
        class: Option<PathBuf>,
        /// Output file for cover density
        #[arg(long)]
        density: Option<PathBuf>,
        /// Output file for cover connectivity
        #[arg(long)]
        connectivity: Option<PathBuf>,
        /// Window side length in cells (odd, >= 3)
        #[arg(short, long, default_value = "3")]
        size: usize,
        /// Pad the raster by (size - 1) / 2 cells before computing
        #[arg(long)]
        pad: bool,
        /// Value of padding cells: a number, or "nan" for missing
        #[arg(long, default_value = "nan")]
        pad_value: f64,
        /// Count missing cells as unoccupied area
        #[arg(long)]
        missing_as_eligible: bool,
        /// Tie handling when density equals connectivity: undetermined, perforated, edge, random
        #[arg(short, long, default_value = "undetermined")]
        undetermined: String,
        /// Seed for the random tie policy
        #[arg(long, default_value = "0")]
        seed: u64,
    },
    /// Threshold a cover raster into 0/1
    Binarize {
        /// Input raster
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Cells >= threshold become 1
        #[arg(short, long)]
        threshold: f64,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set up logging")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster = read_geotiff(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn write_raster(raster: &Raster<f64>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path) {
    println!("{} saved to: {}", name, path.display());
}

/// Output flags for the requested files; the class raster always brings its inputs
fn output_params(class: bool, density: bool, connectivity: bool) -> FragmentationParams {
    FragmentationParams {
        class,
        density: density || class,
        connectivity: connectivity || class,
        ..FragmentationParams::default()
    }
}

/// Count cells per class code, in code order, plus missing cells
fn class_histogram(class: &Raster<f64>) -> ([usize; 7], usize) {
    let mut counts = [0usize; 7];
    let mut missing = 0usize;
    for &v in class.data().iter() {
        match (!v.is_nan()).then(|| FragmentationClass::from_code(v as u8)).flatten() {
            Some(c) => counts[c.code() as usize] += 1,
            None => missing += 1,
        }
    }
    (counts, missing)
}

fn print_info(path: &Path, raster: &Raster<f64>) {
    let (rows, cols) = raster.shape();
    let (min_x, min_y, max_x, max_y) = raster.bounds();
    let stats = raster.statistics();

    println!("File: {}", path.display());
    println!("  Size: {} x {} ({} cells)", cols, rows, raster.len());
    println!("  Cell size: {}", raster.transform().cell_size());
    println!("  Bounds: ({:.3}, {:.3}) - ({:.3}, {:.3})", min_x, min_y, max_x, max_y);
    match raster.crs() {
        Some(crs) => println!("  CRS: {}", crs),
        None => println!("  CRS: unknown"),
    }
    match raster.nodata() {
        Some(nd) => println!("  NoData: {}", nd),
        None => println!("  NoData: none"),
    }
    if let (Some(min), Some(max), Some(mean)) = (stats.min, stats.max, stats.mean) {
        println!("  Min: {:.4}  Max: {:.4}  Mean: {:.4}", min, max, mean);
    }
    println!("  Valid: {}  Missing: {}", stats.valid_count, stats.nodata_count);

    let binary = raster
        .data()
        .iter()
        .all(|&v| raster.is_nodata(v) || v == 0.0 || v == 1.0);
    if !binary {
        println!("  Note: values other than 0/1 count as cover in `fragmentation`");
    }
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    if let Some(threads) = cli.threads {
        anyhow::ensure!(threads > 0, "--threads must be at least 1");
        if fragscape_parallel::strategy::set_num_threads(threads) {
            info!("Using {} threads", threads);
        } else {
            warn!("Thread pool already initialized; ignoring --threads {}", threads);
        }
    }

    match cli.command {
        Commands::Info { input } => {
            let raster = read_raster(&input)?;
            print_info(&input, &raster);
        }

        Commands::Fragmentation {
            input,
            class,
            density,
            connectivity,
            size,
            pad,
            pad_value,
            missing_as_eligible,
            undetermined,
            seed,
        } => {
            anyhow::ensure!(
                class.is_some() || density.is_some() || connectivity.is_some(),
                "Nothing to do: give at least one of --class, --density, --connectivity"
            );
            let undetermined: UndeterminedPolicy = undetermined
                .parse()
                .context("Invalid --undetermined")?;

            let params = FragmentationParams {
                size,
                pad,
                pad_value,
                missing_as_eligible,
                undetermined,
                seed,
                ..output_params(class.is_some(), density.is_some(), connectivity.is_some())
            };

            let raster = read_raster(&input)?;
            let start = Instant::now();
            let pb = spinner("Classifying fragmentation...");
            let output = fragmentation(&raster, params).context("Failed to compute fragmentation")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            // Density and connectivity computed for the class raster are only
            // written when the user asked for them.
            if let (Some(path), Some(layer)) = (&class, &output.class) {
                write_raster(layer, path)?;
                done("Class", path);

                let (counts, missing) = class_histogram(layer);
                for (code, count) in counts.iter().enumerate() {
                    if let Some(c) = FragmentationClass::from_code(code as u8) {
                        info!("  {:>12}: {}", c.name(), count);
                    }
                }
                info!("  {:>12}: {}", "missing", missing);
            }
            if let (Some(path), Some(layer)) = (&density, &output.density) {
                write_raster(layer, path)?;
                done("Density", path);
            }
            if let (Some(path), Some(layer)) = (&connectivity, &output.connectivity) {
                write_raster(layer, path)?;
                done("Connectivity", path);
            }
            println!("  Processing time: {:.2?}", elapsed);
        }

        Commands::Binarize {
            input,
            output,
            threshold,
        } => {
            let raster = read_raster(&input)?;
            let start = Instant::now();
            let result = binarize(&raster, threshold, ProcessingMode::Parallel).context("Failed to binarize")?;
            let elapsed = start.elapsed();
            write_raster(&result, &output)?;
            done("Binary cover", &output);
            println!("  Processing time: {:.2?}", elapsed);
        }
    }

    Ok(())
}
