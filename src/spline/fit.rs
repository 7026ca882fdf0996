//! Smoothing spline fitting: ordered samples → clamped B-spline.
//!
//! 1. Chord-length parametrization on [0, 1]
//! 2. Least-squares fit on a knot vector with no interior knots
//! 3. While the residual exceeds the smoothing budget, add knots in the
//!    spans carrying the largest residual
//! 4. Interpolating knot vector once no span can be split
//! 5. On the final knots, trade the spare residual budget for smoothness by
//!    penalizing jumps of the highest derivative at the interior knots, with
//!    the penalty weight found by rational root finding (FITPACK `fpcurf`)

use kurbo::Point;
use log::debug;
use nalgebra::DMatrix;

use super::{basis, BSpline};
use crate::error::FitError;

const MAX_DEGREE: usize = 5;

/// Pivots this far below the largest one mark the system as rank deficient.
const RANK_TOLERANCE: f64 = 1e-12;

/// Relative tolerance on the final residual: it ends up in `(s - tol·s, s]`.
const SMOOTHING_TOLERANCE: f64 = 1e-3;

const MAX_SMOOTHING_ITERATIONS: usize = 20;

/// A fitted spline together with the parameter assigned to each sample.
#[derive(Debug, Clone)]
pub struct FittedCurve {
    pub spline: BSpline,
    /// Per-sample parameters, strictly increasing, from 0 to 1.
    pub params: Vec<f64>,
    /// Sum of squared distances between samples and the spline.
    pub residual: f64,
}

/// Fit a smoothing B-spline of `degree` whose squared residual sum stays within `smoothing`.
///
/// When knots are needed, the residual is driven close to the budget rather
/// than far below it, so a larger `smoothing` gives a visibly smoother curve.
pub fn fit(points: &[Point], degree: usize, smoothing: f64) -> Result<FittedCurve, FitError> {
    if !(1..=MAX_DEGREE).contains(&degree) {
        return Err(FitError::InvalidDegree(degree));
    }
    if !smoothing.is_finite() || smoothing < 0.0 {
        return Err(FitError::InvalidSmoothing(smoothing));
    }
    let m = points.len();
    if m <= degree {
        return Err(FitError::TooFewPoints {
            degree,
            required: degree + 1,
            found: m,
        });
    }
    if let Some(index) = points.iter().position(|p| !p.is_finite()) {
        return Err(FitError::NonFinite { index });
    }

    let params = chord_length_params(points)?;
    let max_interior = m - degree - 1;
    let tolerance = SMOOTHING_TOLERANCE * smoothing;

    let mut interior: Vec<f64> = Vec::new();
    let mut nplus = 1usize;
    let mut fp_old: Option<f64> = None;
    let mut fp_polynomial: Option<f64> = None;

    let (spline, fp) = loop {
        let (spline, residuals) = match least_squares(points, &params, &interior, degree) {
            Ok(solution) => solution,
            Err(FitError::Singular { .. }) if !interior.is_empty() => {
                debug!("fit: {} interior knots give a singular system, interpolating", interior.len());
                break interpolate(points, &params, degree)?;
            }
            Err(err) => return Err(err),
        };
        let fp: f64 = residuals.iter().sum();
        if fp_polynomial.is_none() {
            fp_polynomial = Some(fp);
        }
        debug!(
            "fit: degree {} with {} interior knots, residual {:.3e} (budget {:.3e})",
            degree,
            interior.len(),
            fp,
            smoothing
        );
        if fp <= smoothing || max_interior == 0 {
            break (spline, fp);
        }

        if let Some(old) = fp_old {
            let gain = old - fp;
            let estimate = if gain > tolerance {
                (nplus as f64 * (fp - smoothing) / gain) as usize
            } else {
                nplus * 2
            };
            nplus = (nplus * 2).min(estimate.max(nplus / 2).max(1));
        }
        fp_old = Some(fp);

        // Reaching the maximum knot count means interpolation; use the
        // interpolating knot layout instead of the residual-driven one.
        let budget = nplus.min(max_interior - interior.len());
        if interior.len() + budget >= max_interior
            || !add_knots(&mut interior, &params, &residuals, degree, budget)
        {
            debug!("fit: knot budget exhausted, interpolating");
            break interpolate(points, &params, degree)?;
        }
    };

    let has_interior = spline.knots().len() > 2 * (degree + 1);
    if !has_interior || smoothing == 0.0 || fp > smoothing - tolerance {
        return Ok(FittedCurve {
            spline,
            params,
            residual: fp,
        });
    }
    let fp_polynomial = fp_polynomial.unwrap_or(fp);
    let (spline, residual) = smooth(points, &params, spline, fp, fp_polynomial, smoothing)?;
    Ok(FittedCurve {
        spline,
        params,
        residual,
    })
}

/// Normalized cumulative chord length. Fails on coincident neighbours.
fn chord_length_params(points: &[Point]) -> Result<Vec<f64>, FitError> {
    let mut params = Vec::with_capacity(points.len());
    let mut total = 0.0;
    params.push(0.0);
    for (index, pair) in points.windows(2).enumerate() {
        let chord = pair[0].distance(pair[1]);
        if chord <= 0.0 {
            return Err(FitError::CoincidentPoints { index });
        }
        total += chord;
        params.push(total);
    }
    for u in params.iter_mut() {
        *u /= total;
    }
    if let Some(last) = params.last_mut() {
        *last = 1.0;
    }
    if let Some(index) = params.windows(2).position(|w| w[1] <= w[0]) {
        return Err(FitError::CoincidentPoints { index });
    }
    Ok(params)
}

/// Clamped knot vector on [0, 1] around the given interior knots.
fn clamped_knots(interior: &[f64], degree: usize) -> Vec<f64> {
    let mut knots = Vec::with_capacity(interior.len() + 2 * (degree + 1));
    knots.extend(std::iter::repeat(0.0).take(degree + 1));
    knots.extend_from_slice(interior);
    knots.extend(std::iter::repeat(1.0).take(degree + 1));
    knots
}

/// Interior knots that make the fit interpolate every sample.
///
/// Odd degrees put knots on data parameters, even degrees between them.
fn interpolation_knots(params: &[f64], degree: usize) -> Vec<f64> {
    let count = params.len() - degree - 1;
    let offset = degree / 2 + 1;
    (0..count)
        .map(|l| {
            if degree % 2 == 1 {
                params[offset + l]
            } else {
                0.5 * (params[offset + l] + params[offset + l - 1])
            }
        })
        .collect()
}

/// Least-squares fit on the interpolating knots, with its residual sum.
fn interpolate(points: &[Point], params: &[f64], degree: usize) -> Result<(BSpline, f64), FitError> {
    let interior = interpolation_knots(params, degree);
    let (spline, residuals) = least_squares(points, params, &interior, degree)?;
    Ok((spline, residuals.iter().sum()))
}

/// Whether every basis function on `knots` can claim a sample of its own
/// where it is non-zero (Schoenberg–Whitney).
///
/// Without this the least-squares system loses rank. Supports are ordered at
/// both ends, so taking the earliest free sample for each basis in turn is
/// enough.
fn samples_pin_every_basis(knots: &[f64], params: &[f64], degree: usize) -> bool {
    let n = knots.len() - degree - 1;
    let mut next = 0;
    for j in 0..n {
        let (lo, hi) = (knots[j], knots[j + degree + 1]);
        // The clamped end functions are 1 at the domain ends themselves.
        while j > 0 && next < params.len() && params[next] <= lo {
            next += 1;
        }
        let Some(&u) = params.get(next) else {
            return false;
        };
        if u >= hi && j + 1 < n {
            return false;
        }
        next += 1;
    }
    true
}

/// Collocation matrix of the basis at every sample, and the sample coordinates.
fn collocation(
    points: &[Point],
    params: &[f64],
    knots: &[f64],
    degree: usize,
) -> (DMatrix<f64>, DMatrix<f64>) {
    let m = points.len();
    let n = knots.len() - degree - 1;
    let mut a = DMatrix::<f64>::zeros(m, n);
    let mut b = DMatrix::<f64>::zeros(m, 2);
    for (i, (&u, p)) in params.iter().zip(points).enumerate() {
        let span = basis::find_span(knots, degree, n, u);
        let values = basis::basis_derivatives(knots, span, u, degree, 0);
        for (j, &value) in values[0].iter().enumerate() {
            a[(i, span - degree + j)] = value;
        }
        b[(i, 0)] = p.x;
        b[(i, 1)] = p.y;
    }
    (a, b)
}

/// Solve `a · c ≈ b` by QR, refusing rank-deficient systems.
fn solve(a: DMatrix<f64>, b: DMatrix<f64>, samples: usize) -> Result<Vec<Point>, FitError> {
    let controls = a.ncols();
    let singular = FitError::Singular { controls, samples };

    let qr = a.qr();
    let r = qr.r();
    let diagonal = r.diagonal();
    let largest = diagonal.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    if largest == 0.0 || diagonal.iter().any(|v| v.abs() <= RANK_TOLERANCE * largest) {
        return Err(singular);
    }
    let qtb = qr.q().transpose() * b;
    let coefficients = r.solve_upper_triangular(&qtb).ok_or(singular.clone())?;

    let control_points: Vec<Point> = (0..controls)
        .map(|j| Point::new(coefficients[(j, 0)], coefficients[(j, 1)]))
        .collect();
    if control_points.iter().any(|p| !p.is_finite()) {
        return Err(singular);
    }
    Ok(control_points)
}

/// Squared distance from every sample to the spline at its parameter.
fn residuals(spline: &BSpline, points: &[Point], params: &[f64]) -> Vec<f64> {
    params
        .iter()
        .zip(points)
        .map(|(&u, p)| (spline.eval(u) - *p).hypot2())
        .collect()
}

/// Solve for control points in the least-squares sense.
///
/// Returns the spline and the squared residual of every sample.
fn least_squares(
    points: &[Point],
    params: &[f64],
    interior: &[f64],
    degree: usize,
) -> Result<(BSpline, Vec<f64>), FitError> {
    let knots = clamped_knots(interior, degree);
    let (a, b) = collocation(points, params, &knots, degree);
    let control_points = solve(a, b, points.len())?;
    let spline = BSpline::new(degree, knots, control_points);
    let residuals = residuals(&spline, points, params);
    Ok((spline, residuals))
}

/// A knot span with its residual share and the samples strictly inside it.
struct Span {
    start: f64,
    end: f64,
    residual: f64,
    inner: Vec<usize>,
}

/// Insert up to `budget` knots into the spans with the largest residual.
///
/// Each knot lands on the middle sample strictly inside its span. A split that
/// would leave some basis function without a sample is refused and the span
/// is not tried again. Returns false when no knot could be added.
fn add_knots(
    interior: &mut Vec<f64>,
    params: &[f64],
    residuals: &[f64],
    degree: usize,
    budget: usize,
) -> bool {
    let mut breaks = Vec::with_capacity(interior.len() + 2);
    breaks.push(0.0);
    breaks.extend_from_slice(interior);
    breaks.push(1.0);

    let mut spans: Vec<Span> = breaks
        .windows(2)
        .map(|w| Span {
            start: w[0],
            end: w[1],
            residual: 0.0,
            inner: Vec::new(),
        })
        .collect();
    let last = spans.len() - 1;

    for (i, (&u, &res)) in params.iter().zip(residuals).enumerate() {
        let j = (breaks.partition_point(|&t| t <= u) - 1).min(last);
        if u == spans[j].start && j > 0 {
            // Samples sitting on a knot count half to each neighbour.
            spans[j - 1].residual += 0.5 * res;
            spans[j].residual += 0.5 * res;
        } else if u > spans[j].start && u < spans[j].end {
            spans[j].residual += res;
            spans[j].inner.push(i);
        } else {
            spans[j].residual += res;
        }
    }

    let mut added = 0;
    while added < budget {
        let candidate = spans
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.inner.is_empty())
            .max_by(|(_, a), (_, b)| a.residual.total_cmp(&b.residual))
            .map(|(j, _)| j);
        let Some(j) = candidate else { break };

        let count = spans[j].inner.len();
        let mid = count / 2;
        let knot = params[spans[j].inner[mid]];

        let mut trial: Vec<f64> = spans.iter().skip(1).map(|s| s.start).collect();
        trial.insert(j, knot);
        if !samples_pin_every_basis(&clamped_knots(&trial, degree), params, degree) {
            spans[j].inner.clear();
            continue;
        }

        let span = spans.remove(j);
        let left_share = (mid + 1) as f64 / (count + 1) as f64;
        let left = Span {
            start: span.start,
            end: knot,
            residual: span.residual * left_share,
            inner: span.inner[..mid].to_vec(),
        };
        let right = Span {
            start: knot,
            end: span.end,
            residual: span.residual * (1.0 - left_share),
            inner: span.inner[mid + 1..].to_vec(),
        };
        spans.insert(j, right);
        spans.insert(j, left);
        added += 1;
    }

    if added == 0 {
        return false;
    }
    interior.clear();
    interior.extend(spans.iter().skip(1).map(|s| s.start));
    true
}

/// Jumps of the `degree`-th derivative of each basis function across every
/// interior knot, one row per knot.
///
/// Rows are scaled by `h^degree / degree!` for the mean knot spacing `h`, which
/// keeps them comparable in size to the collocation rows.
fn derivative_jumps(knots: &[f64], degree: usize) -> DMatrix<f64> {
    let n = knots.len() - degree - 1;
    let interior = n - degree - 1;
    let spacing = (knots[n] - knots[degree]) / (interior + 1) as f64;
    let factorial: f64 = (1..=degree).map(|i| i as f64).product();
    let scale = spacing.powi(degree as i32) / factorial;

    let mut jumps = DMatrix::<f64>::zeros(interior, n);
    for row in 0..interior {
        let s = degree + 1 + row;
        let before_u = 0.5 * (knots[s - 1] + knots[s]);
        let after_u = 0.5 * (knots[s] + knots[s + 1]);
        let before = basis::basis_derivatives(knots, s - 1, before_u, degree, degree);
        let after = basis::basis_derivatives(knots, s, after_u, degree, degree);
        for (j, value) in before[degree].iter().enumerate() {
            jumps[(row, s - 1 - degree + j)] -= value * scale;
        }
        for (j, value) in after[degree].iter().enumerate() {
            jumps[(row, s - degree + j)] += value * scale;
        }
    }
    jumps
}

/// Weights bracketing the root of `f(p) = residual(p) - target`, with
/// `f(low) > 0 > f(high)`. A missing `high` stands for `p = ∞`.
struct Bracket {
    low: f64,
    f_low: f64,
    high: Option<f64>,
    f_high: f64,
}

impl Bracket {
    /// Root of the rational interpolant `(u·p + v) / (p + w)` through the bracket
    /// ends and `(p, f)`, after which `(p, f)` replaces the end on its side.
    fn rational_step(&mut self, p: f64, f: f64) -> f64 {
        let (p1, f1, f3) = (self.low, self.f_low, self.f_high);
        let next = match self.high {
            None => (p1 * (f1 - f3) * f - p * (f - f3) * f1) / ((f1 - f) * f3),
            Some(p3) => {
                let h1 = f1 * (f - f3);
                let h2 = f * (f3 - f1);
                let h3 = f3 * (f1 - f);
                -(p1 * p * h3 + p * p3 * h1 + p3 * p1 * h2) / (p1 * h1 + p * h2 + p3 * h3)
            }
        };
        if f < 0.0 {
            self.high = Some(p);
            self.f_high = f;
        } else {
            self.low = p;
            self.f_low = f;
        }
        next
    }
}

/// Refit on the final knots with a penalty on the derivative jumps, so the
/// residual lands just under `smoothing`.
///
/// The objective is `Σ residual² + Σ (jump / p)²`. As `p → ∞` it becomes the
/// plain least-squares fit (`exact_fp`, under budget); as `p → 0` the jumps
/// vanish and only a single polynomial is left (`polynomial_fp`, over
/// budget). The residual falls monotonically in `p`, so `p` is bracketed and
/// refined by rational interpolation. When the iteration stalls, the loosest
/// fit seen that is still within budget is kept.
fn smooth(
    points: &[Point],
    params: &[f64],
    exact: BSpline,
    exact_fp: f64,
    polynomial_fp: f64,
    smoothing: f64,
) -> Result<(BSpline, f64), FitError> {
    let degree = exact.degree();
    let knots = exact.knots().to_vec();
    let (a, b) = collocation(points, params, &knots, degree);
    let jumps = derivative_jumps(&knots, degree);
    let (rows, cols) = a.shape();
    let penalties = jumps.nrows();

    let tolerance = 0.5 * SMOOTHING_TOLERANCE * smoothing;
    let target = smoothing - tolerance;
    let mut bracket = Bracket {
        low: 0.0,
        f_low: polynomial_fp - target,
        high: None,
        f_high: exact_fp - target,
    };
    let (mut low_settled, mut high_settled) = (false, false);
    let mut best = (exact, exact_fp);

    let pivots: f64 = a.clone().qr().r().diagonal().iter().map(|v| v.abs()).sum();
    let mut p = cols as f64 / pivots;

    for _ in 0..MAX_SMOOTHING_ITERATIONS {
        let weight = 1.0 / p;
        let system = DMatrix::from_fn(rows + penalties, cols, |i, j| {
            if i < rows {
                a[(i, j)]
            } else {
                weight * jumps[(i - rows, j)]
            }
        });
        let rhs = DMatrix::from_fn(rows + penalties, 2, |i, j| if i < rows { b[(i, j)] } else { 0.0 });
        let Ok(control_points) = solve(system, rhs, rows) else {
            debug!("fit: penalized system singular at weight {:.3e}", p);
            break;
        };
        let spline = BSpline::new(degree, knots.clone(), control_points);
        let fp: f64 = residuals(&spline, points, params).iter().sum();
        debug!("fit: smoothing weight {:.3e}, residual {:.3e}", p, fp);

        let f = fp - target;
        if f.abs() < tolerance {
            return Ok((spline, fp));
        }
        if fp <= smoothing && fp > best.1 {
            best = (spline, fp);
        }

        if !high_settled {
            if f - bracket.f_high <= tolerance {
                // Still as tight as plain least squares: p is too large.
                bracket.high = Some(p);
                bracket.f_high = f;
                let previous = p;
                p *= 0.04;
                if p <= bracket.low {
                    p = 0.9 * bracket.low + 0.1 * previous;
                }
                continue;
            }
            high_settled = f < 0.0;
        }
        if !low_settled {
            if bracket.f_low - f <= tolerance {
                // Still as loose as the polynomial: p is too small.
                bracket.low = p;
                bracket.f_low = f;
                let previous = p;
                p /= 0.04;
                if let Some(high) = bracket.high {
                    if p >= high {
                        p = 0.1 * previous + 0.9 * high;
                    }
                }
                continue;
            }
            low_settled = f > 0.0;
        }
        if f >= bracket.f_low || f <= bracket.f_high {
            debug!("fit: smoothing weight iteration left its bracket");
            break;
        }
        p = bracket.rational_step(p, f);
        if !(p.is_finite() && p > 0.0) {
            break;
        }
    }
    Ok(best)
}
