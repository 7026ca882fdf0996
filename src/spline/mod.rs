//! Parametric B-spline curves in the plane.
//!
//! A [`BSpline`] is built once per sample set by [`fit`] and then only read:
//! positions and derivatives can be evaluated at any parameter in its domain.

mod basis;
mod fit;

pub use fit::{fit, FittedCurve};

use kurbo::{Point, Vec2};

/// A clamped planar B-spline `u ↦ (x(u), y(u))`.
#[derive(Debug, Clone, PartialEq)]
pub struct BSpline {
    degree: usize,
    knots: Vec<f64>,
    control_points: Vec<Point>,
}

impl BSpline {
    /// Build from a clamped knot vector with `control_points.len() + degree + 1` entries.
    pub(crate) fn new(degree: usize, knots: Vec<f64>, control_points: Vec<Point>) -> Self {
        debug_assert_eq!(knots.len(), control_points.len() + degree + 1);
        debug_assert!(knots.windows(2).all(|w| w[0] <= w[1]));
        Self {
            degree,
            knots,
            control_points,
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn control_points(&self) -> &[Point] {
        &self.control_points
    }

    /// Parameter domain `(u_min, u_max)`.
    pub fn domain(&self) -> (f64, f64) {
        (
            self.knots[self.degree],
            self.knots[self.control_points.len()],
        )
    }

    /// Position at `u`. Parameters outside the domain are clamped to it.
    pub fn eval(&self, u: f64) -> Point {
        self.derivatives(u, 0)[0].to_point()
    }

    /// The `order`-th derivative of position at `u`.
    ///
    /// Order 0 is the position as a vector from the origin. Orders above the
    /// degree are zero.
    pub fn derivative(&self, u: f64, order: usize) -> Vec2 {
        self.derivatives(u, order)[order]
    }

    /// Position and all derivatives up to `order` at `u`, in one basis evaluation.
    pub fn derivatives(&self, u: f64, order: usize) -> Vec<Vec2> {
        let (u_min, u_max) = self.domain();
        let u = u.clamp(u_min, u_max);
        let n = self.control_points.len();
        let span = basis::find_span(&self.knots, self.degree, n, u);
        let ders = basis::basis_derivatives(&self.knots, span, u, self.degree, order);

        let first = span - self.degree;
        ders.iter()
            .map(|row| {
                row.iter()
                    .zip(&self.control_points[first..=span])
                    .fold(Vec2::ZERO, |acc, (&w, p)| acc + p.to_vec2() * w)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn quarter_arc() -> BSpline {
        // Quadratic through three control points, clamped.
        BSpline::new(
            2,
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            vec![
                Point::new(1.0, 0.0),
                Point::new(1.0, 1.0),
                Point::new(0.0, 1.0),
            ],
        )
    }

    #[test]
    fn clamped_ends_hit_control_polygon_ends() {
        let spline = quarter_arc();
        assert_eq!(spline.domain(), (0.0, 1.0));
        let start = spline.eval(0.0);
        let end = spline.eval(1.0);
        assert_abs_diff_eq!(start.x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(start.y, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(end.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(end.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn matches_bernstein_form() {
        let spline = quarter_arc();
        let u: f64 = 0.3;
        let b0 = (1.0 - u).powi(2);
        let b1 = 2.0 * u * (1.0 - u);
        let b2 = u * u;
        let p = spline.eval(u);
        assert_abs_diff_eq!(p.x, b0 + b1, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, b1 + b2, epsilon = 1e-12);

        // B'(u) = 2[(P1 - P0)(1 - u) + (P2 - P1)u]
        let d1 = spline.derivative(u, 1);
        assert_abs_diff_eq!(d1.x, 2.0 * (-u), epsilon = 1e-12);
        assert_abs_diff_eq!(d1.y, 2.0 * (1.0 - u), epsilon = 1e-12);

        // B''(u) = 2(P2 - 2P1 + P0)
        let d2 = spline.derivative(u, 2);
        assert_abs_diff_eq!(d2.x, -2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d2.y, -2.0, epsilon = 1e-12);

        assert_eq!(spline.derivative(u, 3), Vec2::ZERO);
    }

    fn wave() -> Vec<Point> {
        (0..30)
            .map(|i| {
                let t = std::f64::consts::PI * i as f64 / 29.0;
                Point::new(t, (3.0 * t).sin())
            })
            .collect()
    }

    #[test]
    fn fitted_knots_are_clamped() {
        let spline = fit(&wave(), 3, 1e-6).unwrap().spline;
        let (degree, knots) = (spline.degree(), spline.knots());
        assert_eq!(degree, 3);
        assert_eq!(knots.len(), spline.control_points().len() + degree + 1);
        assert!(knots[..=degree].iter().all(|&t| t == 0.0));
        assert!(knots[knots.len() - degree - 1..].iter().all(|&t| t == 1.0));
        assert!(knots[degree..=knots.len() - degree - 1].windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let spline = fit(&wave(), 3, 1e-6).unwrap().spline;
        assert!(spline.control_points().len() > 4, "expected interior knots");
        let h = 1e-6;
        for &u in &[0.1137, 0.3271, 0.5509, 0.7713, 0.9042] {
            let d1 = spline.derivative(u, 1);
            let d2 = spline.derivative(u, 2);
            let fd1 = (spline.eval(u + h) - spline.eval(u - h)) / (2.0 * h);
            let fd2 = (spline.derivative(u + h, 1) - spline.derivative(u - h, 1)) / (2.0 * h);
            assert_abs_diff_eq!(fd1.x, d1.x, epsilon = 1e-5 * d1.hypot());
            assert_abs_diff_eq!(fd1.y, d1.y, epsilon = 1e-5 * d1.hypot());
            assert_abs_diff_eq!(fd2.x, d2.x, epsilon = 1e-4 * d2.hypot().max(1.0));
            assert_abs_diff_eq!(fd2.y, d2.y, epsilon = 1e-4 * d2.hypot().max(1.0));
        }
    }

    #[test]
    fn out_of_domain_parameters_are_clamped() {
        let spline = quarter_arc();
        assert_eq!(spline.eval(-0.5), spline.eval(0.0));
        assert_eq!(spline.eval(1.5), spline.eval(1.0));
    }
}
