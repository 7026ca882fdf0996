//! B-spline basis functions and their derivatives (Cox–de Boor).

/// Index `i` of the knot span `[knots[i], knots[i + 1])` containing `u`.
///
/// `knots` must be clamped with `n_controls + degree + 1` entries. Values at
/// or past the upper end map to the last non-empty span.
pub fn find_span(knots: &[f64], degree: usize, n_controls: usize, u: f64) -> usize {
    if u >= knots[n_controls] {
        return n_controls - 1;
    }
    if u <= knots[degree] {
        return degree;
    }
    let mut low = degree;
    let mut high = n_controls;
    let mut mid = (low + high) / 2;
    while u < knots[mid] || u >= knots[mid + 1] {
        if u < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// Non-zero basis functions on `span` and their derivatives up to `order`.
///
/// Row `d` of the result holds the `d`-th derivatives of
/// `N[span - degree] ..= N[span]` at `u`. Rows above `degree` are zero.
pub fn basis_derivatives(
    knots: &[f64],
    span: usize,
    u: f64,
    degree: usize,
    order: usize,
) -> Vec<Vec<f64>> {
    let p = degree;
    let mut ndu = vec![vec![0.0; p + 1]; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    ndu[0][0] = 1.0;

    for j in 1..=p {
        left[j] = u - knots[span + 1 - j];
        right[j] = knots[span + j] - u;
        let mut saved = 0.0;
        for r in 0..j {
            // Knot differences below the diagonal, basis values above it.
            ndu[j][r] = right[r + 1] + left[j - r];
            let temp = ndu[r][j - 1] / ndu[j][r];
            ndu[r][j] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        ndu[j][j] = saved;
    }

    let mut ders = vec![vec![0.0; p + 1]; order + 1];
    for (j, value) in ders[0].iter_mut().enumerate() {
        *value = ndu[j][p];
    }

    let top = order.min(p);
    let mut a = [vec![0.0; p + 1], vec![0.0; p + 1]];
    for r in 0..=p {
        let (mut s1, mut s2) = (0, 1);
        a[0][0] = 1.0;
        for k in 1..=top {
            let mut d = 0.0;
            let pk = p - k;
            if r >= k {
                let rk = r - k;
                a[s2][0] = a[s1][0] / ndu[pk + 1][rk];
                d = a[s2][0] * ndu[rk][pk];
            }
            // Column range of the coefficient recurrence, clipped to the triangle.
            let j1 = if r >= k { 1 } else { k - r };
            let j2 = if r <= pk + 1 { k - 1 } else { p - r };
            for j in j1..=j2 {
                let idx = r + j - k;
                a[s2][j] = (a[s1][j] - a[s1][j - 1]) / ndu[pk + 1][idx];
                d += a[s2][j] * ndu[idx][pk];
            }
            if r <= pk {
                a[s2][k] = -a[s1][k - 1] / ndu[pk + 1][r];
                d += a[s2][k] * ndu[r][pk];
            }
            ders[k][r] = d;
            std::mem::swap(&mut s1, &mut s2);
        }
    }

    let mut factor = p as f64;
    for (k, row) in ders.iter_mut().enumerate().take(top + 1).skip(1) {
        for value in row.iter_mut() {
            *value *= factor;
        }
        factor *= (p - k) as f64;
    }
    ders
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn cubic_knots() -> Vec<f64> {
        vec![0.0, 0.0, 0.0, 0.0, 0.25, 0.5, 0.75, 1.0, 1.0, 1.0, 1.0]
    }

    #[test]
    fn span_lookup_handles_domain_ends() {
        let knots = cubic_knots();
        assert_eq!(find_span(&knots, 3, 7, 0.0), 3);
        assert_eq!(find_span(&knots, 3, 7, 0.1), 3);
        assert_eq!(find_span(&knots, 3, 7, 0.25), 4);
        assert_eq!(find_span(&knots, 3, 7, 0.6), 5);
        assert_eq!(find_span(&knots, 3, 7, 1.0), 6);
    }

    #[test]
    fn basis_is_a_partition_of_unity() {
        let knots = cubic_knots();
        for i in 0..=20 {
            let u = i as f64 / 20.0;
            let span = find_span(&knots, 3, 7, u);
            let ders = basis_derivatives(&knots, span, u, 3, 2);
            let sum: f64 = ders[0].iter().sum();
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-12);
            // Derivatives of a constant sum vanish.
            assert_abs_diff_eq!(ders[1].iter().sum::<f64>(), 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(ders[2].iter().sum::<f64>(), 0.0, epsilon = 1e-7);
        }
    }

    #[test]
    fn linear_basis_matches_hat_functions() {
        let knots = vec![0.0, 0.0, 0.5, 1.0, 1.0];
        let span = find_span(&knots, 1, 3, 0.25);
        assert_eq!(span, 1);
        let ders = basis_derivatives(&knots, span, 0.25, 1, 2);
        assert_abs_diff_eq!(ders[0][0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(ders[0][1], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(ders[1][0], -2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ders[1][1], 2.0, epsilon = 1e-12);
        assert_eq!(ders[2], vec![0.0, 0.0]);
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let knots = cubic_knots();
        let h = 1e-6;
        for &u in &[0.1, 0.3, 0.62, 0.9] {
            let span = find_span(&knots, 3, 7, u);
            let ders = basis_derivatives(&knots, span, u, 3, 1);
            let lo = basis_derivatives(&knots, span, u - h, 3, 0);
            let hi = basis_derivatives(&knots, span, u + h, 3, 0);
            for j in 0..4 {
                let fd = (hi[0][j] - lo[0][j]) / (2.0 * h);
                assert_abs_diff_eq!(ders[1][j], fd, epsilon = 1e-5);
            }
        }
    }
}
