//! Airfoil coordinate files: reading, writing, listing.
//!
//! Input follows the Selig layout: an optional title line followed by one
//! `x y` row per point. Any line that is not exactly two numbers is skipped.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use kurbo::Point;

use crate::error::ResampleError;

/// Prefix given to resampled files in the output directory.
pub const OUTPUT_PREFIX: &str = "uniform_";

/// Extract coordinate rows from the text of a coordinate file.
pub fn parse_points(text: &str) -> Vec<Point> {
    text.lines().filter_map(parse_row).collect()
}

fn parse_row(line: &str) -> Option<Point> {
    let mut fields = line.split_whitespace();
    let x = fields.next()?.parse::<f64>().ok()?;
    let y = fields.next()?.parse::<f64>().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(Point::new(x, y))
}

/// Read a coordinate file. Fails if it holds no coordinate rows.
pub fn read_points(path: &Path) -> Result<Vec<Point>, ResampleError> {
    let text = fs::read_to_string(path).map_err(|e| ResampleError::io(path, e))?;
    let points = parse_points(&text);
    if points.is_empty() {
        return Err(ResampleError::NoCoordinates {
            path: path.to_path_buf(),
        });
    }
    Ok(points)
}

/// Format points as one `x y` row each, in scientific notation.
pub fn format_points(points: &[Point]) -> String {
    let mut out = String::with_capacity(points.len() * 52);
    for p in points {
        // Writing into a String cannot fail.
        let _ = writeln!(out, "{:.18e} {:.18e}", p.x, p.y);
    }
    out
}

/// Write points to `path`, replacing any existing file.
pub fn write_points(path: &Path, points: &[Point]) -> Result<(), ResampleError> {
    fs::write(path, format_points(points)).map_err(|e| ResampleError::io(path, e))
}

/// Files in `directory` ending in `extension`, sorted by path.
///
/// An empty extension lists every regular file.
pub fn list_files(directory: &Path, extension: &str) -> Result<Vec<PathBuf>, ResampleError> {
    if !directory.is_dir() {
        return Err(ResampleError::NotADirectory(directory.to_path_buf()));
    }
    let entries = fs::read_dir(directory).map_err(|e| ResampleError::io(directory, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ResampleError::io(directory, e))?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(extension));
        if matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Where the resampled version of `input` goes inside `output_dir`.
pub fn output_path(output_dir: &Path, input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(format!("{OUTPUT_PREFIX}{name}"))
}
