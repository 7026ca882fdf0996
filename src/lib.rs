//! airfoil-resample: raw airfoil outline → curvature-weighted resampling.
//!
//! Fits a smoothing B-spline through sparse, unevenly spaced coordinates
//! and redistributes a fixed number of points along it, denser where the
//! outline bends (leading edge) and sparser along flat stretches.
//!
//! # Example
//!
//! ```
//! use airfoil_resample::{resample, ResampleConfig};
//! use airfoil_resample::kurbo::Point;
//!
//! let raw: Vec<Point> = (0..32)
//!     .map(|i| {
//!         let t = std::f64::consts::PI * i as f64 / 31.0;
//!         Point::new(t.cos(), 0.2 * t.sin())
//!     })
//!     .collect();
//! let config = ResampleConfig { npoints: 64, ..ResampleConfig::default() };
//! let points = resample(&raw, &config)?;
//! assert_eq!(points.len(), 64);
//! # Ok::<(), airfoil_resample::ResampleError>(())
//! ```

#![forbid(unsafe_code)]

mod config;

pub mod batch;
pub mod curvature;
pub mod error;
pub mod io;
pub mod resample;
pub mod spline;

// Re-export kurbo so callers build inputs with the same Point type.
pub use kurbo;

pub use config::ResampleConfig;
pub use error::{FitError, ResampleError};
pub use spline::{BSpline, FittedCurve};

use kurbo::Point;
use log::debug;

/// Intermediate products of one resampling run.
#[derive(Debug, Clone)]
pub struct Resampling {
    /// The smoothing spline fitted to the raw samples.
    pub fitted: FittedCurve,
    /// Dense parameter grid the curvature was integrated over.
    pub grid: Vec<f64>,
    /// Curvature plus bias at each grid parameter.
    pub curvature: Vec<f64>,
    /// Running integral of `curvature`, starting at 0.
    pub cumulative: Vec<f64>,
    /// Parameters of the output points.
    pub params: Vec<f64>,
    /// The resampled outline.
    pub points: Vec<Point>,
}

/// Full pipeline: raw samples → `config.npoints` curvature-weighted points.
pub fn resample(points: &[Point], config: &ResampleConfig) -> Result<Vec<Point>, ResampleError> {
    Ok(resample_detailed(points, config)?.points)
}

/// Like [`resample`], keeping every intermediate array.
///
/// Pipeline: spline fit, curvature on a dense grid, trapezoidal integral,
/// inversion at evenly spaced integral values, spline evaluation.
pub fn resample_detailed(
    points: &[Point],
    config: &ResampleConfig,
) -> Result<Resampling, ResampleError> {
    config.validate()?;

    let fitted = spline::fit(points, config.degree, config.smoothing)?;
    debug!(
        "resample: {} samples → {} control points, residual {:.3e}",
        points.len(),
        fitted.spline.control_points().len(),
        fitted.residual
    );

    let grid = curvature::parameter_grid(&fitted.spline, config.grid_size);
    let curvature = curvature::curvature_field(&fitted.spline, &grid, config.smoother);
    let cumulative = curvature::cumulative_trapezoid(&grid, &curvature);
    let params = resample::resample_parameters(&cumulative, &grid, config.npoints);
    let points = resample::evaluate(&fitted.spline, &params);

    Ok(Resampling {
        fitted,
        grid,
        curvature,
        cumulative,
        params,
        points,
    })
}
