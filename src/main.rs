use std::path::{Path, PathBuf};

use airfoil_resample::batch::{self, BatchOptions};
use airfoil_resample::{io, ResampleConfig};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "airfoil-resample",
    about = "Curvature-weighted B-spline resampling of airfoil coordinates",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resample every coordinate file of a database directory
    Uniformize {
        /// Where to read the coordinate files from
        #[arg(long)]
        database: PathBuf,

        /// Where to write the resampled files (created if missing)
        #[arg(long)]
        output: PathBuf,

        /// Only process files with this extension ("" = all files)
        #[arg(long, default_value = ".dat")]
        extension: String,

        /// Overwrite existing output files
        #[arg(long)]
        force: bool,

        /// Exit with an error if any file could not be resampled
        #[arg(long)]
        strict: bool,

        #[command(flatten)]
        tuning: Tuning,
    },

    /// Resample a single coordinate file
    Resample {
        /// Input coordinate file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (overwritten)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        tuning: Tuning,
    },
}

/// Pipeline parameters. Unset flags fall back to the preset, then to defaults.
#[derive(Args)]
struct Tuning {
    /// TOML preset with any of: npoints, degree, smoothing, smoother, grid_size
    #[arg(long)]
    preset: Option<PathBuf>,

    /// Number of output points [default: 200]
    #[arg(short = 'n', long = "num-points")]
    npoints: Option<usize>,

    /// B-spline degree, 1-5 [default: 3]
    #[arg(short = 'k', long)]
    degree: Option<usize>,

    /// Smoothing budget for the spline fit (sum of squared residuals) [default: 1e-6]
    #[arg(short = 's', long)]
    smoothing: Option<f64>,

    /// Curvature bias; larger = more even spacing [default: 10]
    #[arg(long, visible_alias = "unsmoother")]
    smoother: Option<f64>,

    /// Resolution of the curvature integration grid [default: 1000]
    #[arg(long)]
    grid_size: Option<usize>,
}

impl Tuning {
    fn resolve(&self) -> Result<ResampleConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.preset {
            Some(path) => ResampleConfig::load_preset(path)?,
            None => ResampleConfig::default(),
        };
        if let Some(n) = self.npoints {
            config.npoints = n;
        }
        if let Some(k) = self.degree {
            config.degree = k;
        }
        if let Some(s) = self.smoothing {
            config.smoothing = s;
        }
        if let Some(b) = self.smoother {
            config.smoother = b;
        }
        if let Some(g) = self.grid_size {
            config.grid_size = g;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Uniformize {
            database,
            output,
            extension,
            force,
            strict,
            tuning,
        } => {
            let config = tuning.resolve()?;
            print_header(&database, &config);
            let options = BatchOptions { extension, force };
            let report = batch::uniformize(&database, &output, &config, &options)?;

            eprintln!();
            for (input, err) in report.failures() {
                eprintln!("  \u{2717} {}  {}", input.display(), err);
            }
            eprintln!("  {}", report);
            eprintln!();

            if strict && report.failed() > 0 {
                return Err(format!("{} files could not be resampled", report.failed()).into());
            }
        }
        Command::Resample {
            input,
            output,
            tuning,
        } => {
            let config = tuning.resolve()?;
            print_header(&input, &config);
            let raw = io::read_points(&input)?;
            let points = airfoil_resample::resample(&raw, &config)?;
            io::write_points(&output, &points)?;
            eprintln!(
                "  \u{2713} {} points \u{2192} {} points  {}",
                raw.len(),
                points.len(),
                output.display()
            );
            eprintln!();
        }
    }

    Ok(())
}

fn print_header(source: &Path, config: &ResampleConfig) {
    eprintln!();
    eprintln!("  airfoil-resample \u{00b7} {}", source.display());
    eprintln!(
        "  n={} k={} s={:e} smoother={} grid={}",
        config.npoints, config.degree, config.smoothing, config.smoother, config.grid_size
    );
    eprintln!();
}
