//! Curvature along a fitted spline and its running integral.

use crate::spline::BSpline;

/// Floor for the squared speed `x'² + y'²` in the curvature denominator.
///
/// Keeps curvature finite where the parametrization momentarily stops.
pub const SPEED_SQUARED_FLOOR: f64 = 1e-12;

/// `n` evenly spaced values from `start` to `end`, both included.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            let mut values: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            values[n - 1] = end;
            values
        }
    }
}

/// Dense uniform grid over the spline's parameter domain.
pub fn parameter_grid(spline: &BSpline, size: usize) -> Vec<f64> {
    let (u_min, u_max) = spline.domain();
    linspace(u_min, u_max, size)
}

/// Unsigned curvature at `u`.
pub fn curvature_at(spline: &BSpline, u: f64) -> f64 {
    let ders = spline.derivatives(u, 2);
    let (d1, d2) = (ders[1], ders[2]);
    let speed_sq = d1.hypot2().max(SPEED_SQUARED_FLOOR);
    d2.cross(d1).abs() / speed_sq.powf(1.5)
}

/// Curvature at every grid parameter plus the `smoother` bias.
///
/// The bias sets a floor on sample density along flat stretches.
pub fn curvature_field(spline: &BSpline, grid: &[f64], smoother: f64) -> Vec<f64> {
    grid.iter()
        .map(|&u| curvature_at(spline, u) + smoother)
        .collect()
}

/// Running trapezoidal integral of `values` over `grid`, starting at 0.
pub fn cumulative_trapezoid(grid: &[f64], values: &[f64]) -> Vec<f64> {
    debug_assert_eq!(grid.len(), values.len());
    let mut out = Vec::with_capacity(grid.len());
    if grid.is_empty() {
        return out;
    }
    let mut total = 0.0;
    out.push(total);
    for i in 1..grid.len() {
        total += 0.5 * (values[i] + values[i - 1]) * (grid[i] - grid[i - 1]);
        out.push(total);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spline;
    use approx::assert_relative_eq;
    use kurbo::Point;
    use std::f64::consts::PI;

    #[test]
    fn linspace_includes_both_ends() {
        let v = linspace(0.0, 1.0, 5);
        assert_eq!(v, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(2.0, 3.0, 1), vec![2.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn circle_curvature_is_inverse_radius() {
        let radius = 2.5;
        let points: Vec<Point> = (0..48)
            .map(|i| {
                let t = 1.5 * PI * i as f64 / 47.0;
                Point::new(radius * t.cos(), radius * t.sin())
            })
            .collect();
        let fitted = spline::fit(&points, 3, 1e-9).unwrap();
        for &u in &[0.2, 0.4, 0.5, 0.7] {
            assert_relative_eq!(curvature_at(&fitted.spline, u), 1.0 / radius, max_relative = 1e-2);
        }
        let field = curvature_field(&fitted.spline, &[0.5], 10.0);
        assert_relative_eq!(field[0], 10.0 + 1.0 / radius, max_relative = 1e-3);
    }

    #[test]
    fn straight_segment_has_only_the_bias() {
        let points: Vec<Point> = (0..8).map(|i| Point::new(i as f64, 1.0)).collect();
        let fitted = spline::fit(&points, 3, 1e-6).unwrap();
        let grid = parameter_grid(&fitted.spline, 11);
        for value in curvature_field(&fitted.spline, &grid, 3.0) {
            assert_relative_eq!(value, 3.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn stalled_parametrization_stays_finite() {
        // Doubled first control point: zero velocity at u = 0.
        let spline = BSpline::new(
            2,
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            vec![Point::new(0.0, 0.0), Point::new(0.0, 0.0), Point::new(1.0, 1.0)],
        );
        assert_eq!(spline.derivative(0.0, 1).hypot2(), 0.0);
        let field = curvature_field(&spline, &linspace(0.0, 1.0, 11), 1.0);
        assert!(field.iter().all(|k| k.is_finite() && *k >= 1.0));
    }

    #[test]
    fn trapezoid_is_exact_for_linear_integrands() {
        let grid = linspace(0.0, 2.0, 9);
        let values: Vec<f64> = grid.iter().map(|x| 3.0 * x + 1.0).collect();
        let cumulative = cumulative_trapezoid(&grid, &values);
        assert_eq!(cumulative[0], 0.0);
        for (x, c) in grid.iter().zip(&cumulative) {
            assert_relative_eq!(*c, 1.5 * x * x + x, epsilon = 1e-12);
        }
    }

    #[test]
    fn positive_integrand_gives_strictly_increasing_integral() {
        let grid = linspace(0.0, 1.0, 2);
        let cumulative = cumulative_trapezoid(&grid, &[0.1, 0.1]);
        assert!(cumulative[1] > cumulative[0]);
    }
}
