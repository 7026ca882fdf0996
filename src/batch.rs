//! Resample every coordinate file of a database directory.
//!
//! Files are independent, so they are processed in parallel with rayon.
//! A file that fails is reported and skipped; the rest of the batch runs.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::ResampleConfig;
use crate::error::ResampleError;
use crate::io;

/// How a batch run selects and overwrites files.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Only files ending in this are processed. Empty = all files.
    pub extension: String,
    /// Overwrite outputs that already exist.
    pub force: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            extension: ".dat".to_string(),
            force: false,
        }
    }
}

/// What happened to one input file.
#[derive(Debug)]
pub enum ItemOutcome {
    /// Resampled points were written to this path.
    Written(PathBuf),
    /// The output already existed and `force` was off.
    Skipped(PathBuf),
    /// Reading, fitting or writing failed; nothing was written.
    Failed(ResampleError),
}

/// One input file and its outcome.
#[derive(Debug)]
pub struct ItemReport {
    pub input: PathBuf,
    pub outcome: ItemOutcome,
}

/// Outcomes of a batch run, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Written(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Failed(_)))
    }

    /// Inputs that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &ResampleError)> {
        self.items.iter().filter_map(|item| match &item.outcome {
            ItemOutcome::Failed(err) => Some((item.input.as_path(), err)),
            _ => None,
        })
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|item| pred(&item.outcome)).count()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files \u{00b7} {} written \u{00b7} {} skipped \u{00b7} {} failed",
            self.items.len(),
            self.written(),
            self.skipped(),
            self.failed()
        )
    }
}

/// Resample one file into `output_dir`.
///
/// An existing output is left alone unless `force` is set.
pub fn convert_file(
    input: &Path,
    output_dir: &Path,
    config: &ResampleConfig,
    force: bool,
) -> ItemOutcome {
    let output = io::output_path(output_dir, input);
    if output.is_file() && !force {
        debug!("{} exists, skipping", output.display());
        return ItemOutcome::Skipped(output);
    }
    let result = io::read_points(input)
        .and_then(|raw| crate::resample(&raw, config))
        .and_then(|points| io::write_points(&output, &points));
    match result {
        Ok(()) => {
            debug!("{} \u{2192} {}", input.display(), output.display());
            ItemOutcome::Written(output)
        }
        Err(err) => {
            warn!("skipping {}: {}", input.display(), err);
            ItemOutcome::Failed(err)
        }
    }
}

/// Resample every matching file of `database` into `output_dir`.
///
/// Only setup problems (bad config, unreadable directories) are returned as
/// errors. Per-file failures end up in the report.
pub fn uniformize(
    database: &Path,
    output_dir: &Path,
    config: &ResampleConfig,
    options: &BatchOptions,
) -> Result<BatchReport, ResampleError> {
    config.validate()?;
    let files = io::list_files(database, &options.extension)?;
    fs::create_dir_all(output_dir).map_err(|e| ResampleError::io(output_dir, e))?;
    info!(
        "resampling {} files from {} into {}",
        files.len(),
        database.display(),
        output_dir.display()
    );

    let items: Vec<ItemReport> = files
        .par_iter()
        .map(|input| ItemReport {
            input: input.clone(),
            outcome: convert_file(input, output_dir, config, options.force),
        })
        .collect();

    let report = BatchReport { items };
    info!("{}", report);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;
    use std::f64::consts::PI;

    fn write_arc(dir: &Path, name: &str) {
        let points: Vec<Point> = (0..30)
            .map(|i| {
                let t = PI * i as f64 / 29.0;
                Point::new(t.cos(), 0.1 * t.sin())
            })
            .collect();
        io::write_points(&dir.join(name), &points).unwrap();
    }

    fn small_config() -> ResampleConfig {
        ResampleConfig {
            npoints: 25,
            grid_size: 200,
            ..ResampleConfig::default()
        }
    }

    #[test]
    fn failing_files_do_not_stop_the_batch() {
        let db = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_arc(db.path(), "a.dat");
        write_arc(db.path(), "c.dat");
        fs::write(db.path().join("b.dat"), "0 0\n0 0\n0 0\n0 0\n0 0\n").unwrap();
        fs::write(db.path().join("readme.txt"), "ignored").unwrap();

        let report = uniformize(db.path(), out.path(), &small_config(), &BatchOptions::default())
            .unwrap();
        assert_eq!(report.items.len(), 3);
        assert_eq!(report.written(), 2);
        assert_eq!(report.failed(), 1);

        let failures: Vec<_> = report.failures().collect();
        assert!(failures[0].0.ends_with("b.dat"));
        assert!(matches!(failures[0].1, ResampleError::Fit(_)));

        assert_eq!(io::read_points(&out.path().join("uniform_a.dat")).unwrap().len(), 25);
        assert!(!out.path().join("uniform_b.dat").exists());
    }

    #[test]
    fn existing_outputs_are_skipped_unless_forced() {
        let db = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_arc(db.path(), "a.dat");
        let target = out.path().join("uniform_a.dat");
        fs::write(&target, "stale\n").unwrap();

        let report = uniformize(db.path(), out.path(), &small_config(), &BatchOptions::default())
            .unwrap();
        assert_eq!(report.skipped(), 1);
        assert_eq!(fs::read_to_string(&target).unwrap(), "stale\n");

        let forced = BatchOptions {
            force: true,
            ..BatchOptions::default()
        };
        let report = uniformize(db.path(), out.path(), &small_config(), &forced).unwrap();
        assert_eq!(report.written(), 1);
        assert_eq!(io::read_points(&target).unwrap().len(), 25);
    }

    #[test]
    fn output_directory_is_created() {
        let db = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let nested = out.path().join("deep").join("er");
        write_arc(db.path(), "a.dat");
        let report = uniformize(db.path(), &nested, &small_config(), &BatchOptions::default())
            .unwrap();
        assert_eq!(report.written(), 1);
        assert!(nested.join("uniform_a.dat").is_file());
    }

    #[test]
    fn report_summary_reads_naturally() {
        let report = BatchReport {
            items: vec![ItemReport {
                input: PathBuf::from("a.dat"),
                outcome: ItemOutcome::Skipped(PathBuf::from("uniform_a.dat")),
            }],
        };
        assert_eq!(
            report.to_string(),
            "1 files \u{00b7} 0 written \u{00b7} 1 skipped \u{00b7} 0 failed"
        );
    }
}
