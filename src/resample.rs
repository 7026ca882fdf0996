//! Inverting the cumulative curvature integral and evaluating the spline there.

use kurbo::Point;

use crate::curvature::linspace;
use crate::spline::BSpline;

/// `npoints` parameters evenly spaced in cumulative-integral space.
///
/// `cumulative` must be non-decreasing and parallel to `grid`; with a
/// positive curvature bias it is strictly increasing and the inversion is
/// exact up to linear interpolation between grid nodes.
pub fn resample_parameters(cumulative: &[f64], grid: &[f64], npoints: usize) -> Vec<f64> {
    debug_assert_eq!(cumulative.len(), grid.len());
    debug_assert!(cumulative.windows(2).all(|w| w[0] <= w[1]));
    let Some(&total) = cumulative.last() else {
        return Vec::new();
    };
    linspace(0.0, total, npoints)
        .into_iter()
        .map(|target| invert(cumulative, grid, target))
        .collect()
}

/// Piecewise-linear inverse of `cumulative` at `target`.
fn invert(cumulative: &[f64], grid: &[f64], target: f64) -> f64 {
    let last = grid.len() - 1;
    let i = cumulative.partition_point(|&c| c < target);
    if i == 0 {
        return grid[0];
    }
    if i > last {
        return grid[last];
    }
    let (c0, c1) = (cumulative[i - 1], cumulative[i]);
    let (u0, u1) = (grid[i - 1], grid[i]);
    let width = c1 - c0;
    if width <= 0.0 {
        return u1;
    }
    let t = (target - c0) / width;
    (u0 + t * (u1 - u0)).clamp(grid[0], grid[last])
}

/// Forward piecewise-linear interpolation of `values` (parallel to `grid`) at `u`.
pub fn interpolate(grid: &[f64], values: &[f64], u: f64) -> f64 {
    let last = grid.len() - 1;
    let i = grid.partition_point(|&g| g < u);
    if i == 0 {
        return values[0];
    }
    if i > last {
        return values[last];
    }
    let t = (u - grid[i - 1]) / (grid[i] - grid[i - 1]);
    values[i - 1] + t * (values[i] - values[i - 1])
}

/// Positions of the spline at each parameter, in order.
pub fn evaluate(spline: &BSpline, params: &[f64]) -> Vec<Point> {
    params.iter().map(|&u| spline.eval(u)).collect()
}
