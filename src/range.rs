//! Deciding whether a curve can cross an interval.
//!
//! Both algorithms here look at a univariate polynomial (the curve's
//! polynomial with one coordinate fixed) over an interval, and report whether
//! it can change sign there. They bound the polynomial's value using its
//! derivatives: starting from a high-order derivative, each step produces an
//! enclosure of the next lower derivative. Whenever an enclosure doesn't
//! contain zero, the derivative below it is monotone, and so it's enclosed
//! by its values at the endpoints.
//!
//! Every enclosure is widened to account for the error radii of the
//! polynomial's coefficients and for the rounding in computing it, so the
//! answers are one-sided: "no crossing" is reliable, but "crossing" only
//! means that one couldn't be ruled out.

use crate::num::{gamma, Sign};
use crate::poly::UnivariatePoly;
use crate::{Axis, BankView, DerivativeTable, Error};

/// What the caller wants out of a range query.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum QueryKind {
    /// Stop as soon as the endpoint signs show a possible crossing.
    #[default]
    Crossing,
    /// Always compute the enclosure, even if the endpoints already decide it.
    Enclosure,
    /// Like [`QueryKind::Enclosure`], but also find out whether the first
    /// derivative can vanish on the interval. The endpoint short-circuit is
    /// applied only after that's known.
    FirstDerivative,
}

/// The result of a range query.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RangeOutcome {
    /// The polynomial can change sign on the interval.
    pub crossing: bool,
    /// An endpoint value, or a bound of the final enclosure, was exactly zero.
    pub zero_bounds: bool,
    /// The enclosure of the first derivative contains zero.
    ///
    /// Only computed for [`QueryKind::FirstDerivative`]; otherwise it's false.
    pub first_derivative_straddles: bool,
}

impl RangeOutcome {
    /// Can the curve touch the interval at all, including at an endpoint or tangentially?
    pub fn may_cross(&self) -> bool {
        self.crossing || self.zero_bounds
    }
}

// An enclosure `[low, up]` of some function's values on the interval.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Enclosure {
    low: f64,
    up: f64,
}

impl Enclosure {
    const UNBOUNDED: Enclosure = Enclosure {
        low: f64::NEG_INFINITY,
        up: f64::INFINITY,
    };

    // A value known up to an error bound, as returned by `eval_with_bound`.
    fn around((val, err): (f64, f64)) -> Self {
        Enclosure {
            low: val - err,
            up: val + err,
        }
    }

    // The smallest enclosure containing both.
    fn hull(a: (f64, f64), b: (f64, f64)) -> Self {
        let (a, b) = (Enclosure::around(a), Enclosure::around(b));
        if [a.low, a.up, b.low, b.up].iter().any(|v| v.is_nan()) {
            return Enclosure::UNBOUNDED;
        }
        Enclosure {
            low: a.low.min(b.low),
            up: a.up.max(b.up),
        }
    }

    // Can the function vanish? NaN bounds count as a yes.
    fn contains_zero(&self) -> bool {
        !(self.low > 0.0 || self.up < 0.0)
    }

    // Can the function take both signs? NaN bounds count as a yes.
    fn straddles(&self) -> bool {
        !(self.low >= 0.0 || self.up <= 0.0)
    }
}

// The interval prepared for a range query, with the endpoint signs already known.
struct Prepared<'a> {
    table: &'a DerivativeTable,
    // Real endpoints.
    l: f64,
    r: f64,
    // Midpoint and half-width. The half-width is rounded up, so that
    // `[x0 - x1, x0 + x1]` contains `[l, r]`.
    x0: f64,
    x1: f64,
    left: Sign,
    right: Sign,
}

impl Prepared<'_> {
    fn new(table: &DerivativeTable, l: f64, r: f64, left: Sign, right: Sign) -> Prepared<'_> {
        let x0 = (l + r) / 2.0;
        let x1 = (r - x0).max(x0 - l) * (1.0 + 4.0 * f64::EPSILON) + f64::MIN_POSITIVE;
        Prepared {
            table,
            l,
            r,
            x0,
            x1,
            left,
            right,
        }
    }

    fn sign_change(&self) -> bool {
        self.left.opposes(self.right)
    }

    fn zero_bounds(&self) -> bool {
        self.left.is_zero() || self.right.is_zero()
    }

    fn early(&self, first_derivative_straddles: bool) -> RangeOutcome {
        RangeOutcome {
            crossing: true,
            zero_bounds: self.zero_bounds(),
            first_derivative_straddles,
        }
    }

    // The outcome from the endpoint signs alone, valid when the polynomial is
    // monotone on the interval.
    fn monotone(&self, first_derivative_straddles: bool) -> RangeOutcome {
        RangeOutcome {
            crossing: self.sign_change(),
            zero_bounds: self.zero_bounds(),
            first_derivative_straddles,
        }
    }

    // The outcome from an enclosure of the polynomial itself.
    fn enclosed(&self, e: Enclosure, first_derivative_straddles: bool) -> RangeOutcome {
        RangeOutcome {
            crossing: e.straddles() || self.sign_change(),
            zero_bounds: e.low == 0.0 || e.up == 0.0 || self.zero_bounds(),
            first_derivative_straddles,
        }
    }

    // Encloses a derivative that is known to be monotone on the interval.
    fn endpoints(&self, derivative: &UnivariatePoly) -> Enclosure {
        Enclosure::hull(
            derivative.eval_with_bound(self.l),
            derivative.eval_with_bound(self.r),
        )
    }
}

/// A quadratic affine form for `poly` over `[x0 - x1, x0 + x1]`.
///
/// Writing `x = x0 + x1 t`, Horner's scheme is run on the form
/// `y0 + y1 t + z1 t^2 + e1 [-1, 1]`, pushing the cubic terms into `e1`.
fn quadratic_form(poly: &UnivariatePoly, x0: f64, x1: f64) -> Enclosure {
    let (x0_abs, x1_abs) = (x0.abs(), x1.abs());
    let reach = x0_abs + x1_abs;
    let (mut y0, mut y1, mut z1, mut e1) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
    // Horner sums of |c| + r and of r at the largest |x| on the interval. The
    // first bounds the magnitude of every term of the form.
    let (mut abs_sum, mut radius_sum) = (0.0f64, 0.0f64);
    for (c, r) in poly.coeffs().iter().zip(poly.radii()).rev() {
        e1 = x0_abs * e1 + x1_abs * e1 + (x1 * z1).abs();
        z1 = x0 * z1 + x1 * y1;
        y1 = y1 * x0 + x1 * y0;
        y0 = x0 * y0 + c;
        abs_sum = abs_sum * reach + c.abs() + r;
        radius_sum = radius_sum * reach + r;
    }
    let n = poly.len();
    let err =
        2.0 * (radius_sum + 4.0 * gamma(3 * n + 4) * abs_sum) + f64::MIN_POSITIVE * n as f64;
    let spread = y1.abs() + e1 + err;
    let (mut low, mut up) = (spread, spread);
    if z1 > 0.0 {
        up += z1;
    } else {
        low -= z1;
    }
    Enclosure {
        low: y0 - low,
        up: y0 + up,
    }
}

/// Encloses `f^(d) / d!` over `[x0 - x1, x0 + x1]`.
///
/// `taylor[k]` is `f^(k)(x0) / k!` with an error bound, and `hpow[m]` is
/// `x1^m`. The expansion is
/// `f^(d)(x0 + x1 t) / d! = sum_m C(d + m, m) taylor[d + m] x1^m t^m`.
fn taylor_form(d: usize, taylor: &[(f64, f64)], hpow: &[f64]) -> Enclosure {
    let (val, val_err) = taylor[d];
    let (mut low, mut up) = (val - val_err, val + val_err);
    let mut mag = val.abs() + val_err;
    // Binomial coefficients are integers, and exact in this range.
    let mut binom = 1.0;
    for m in 1..taylor.len() - d {
        binom = binom * (d + m) as f64 / m as f64;
        let (t, t_err) = taylor[d + m];
        let scale = binom * hpow[m];
        let (v, v_err) = (scale * t, scale * t_err);
        mag += v.abs() + v_err;
        if m % 2 == 1 {
            low -= v.abs() + v_err;
            up += v.abs() + v_err;
        } else {
            // t^m is in [0, 1].
            low += (v - v_err).min(0.0);
            up += (v + v_err).max(0.0);
        }
    }
    let err = 2.0 * gamma(2 * taylor.len() + 6) * mag + f64::MIN_POSITIVE;
    Enclosure {
        low: low - err,
        up: up + err,
    }
}

impl BankView<'_> {
    // The shared beginning of both algorithms: the special cases, the endpoint
    // signs, and the real interval. Returns `Err(outcome)` if the answer is
    // already known.
    fn prepare(
        &mut self,
        axis: Axis,
        lower: f64,
        upper: f64,
        key: f64,
        poly: &UnivariatePoly,
    ) -> Result<Result<Prepared<'_>, RangeOutcome>, Error> {
        // Only a polynomial whose higher coefficients are exactly zero is constant.
        let constant = poly.coeffs()[1..]
            .iter()
            .chain(&poly.radii()[1..])
            .all(|&c| c == 0.0);
        if constant {
            return Ok(Err(RangeOutcome {
                crossing: poly.coeffs()[0].abs() <= poly.radii()[0],
                ..RangeOutcome::default()
            }));
        }
        if lower == upper {
            return Ok(Err(RangeOutcome::default()));
        }
        let expected = self.bank.curve()?.derivatives(axis).degree() + 1;
        if poly.len() != expected {
            return Err(Error::DegreeMismatch {
                expected,
                actual: poly.len(),
            });
        }
        let (lower, upper) = if lower > upper {
            (upper, lower)
        } else {
            (lower, upper)
        };

        let left = self.evaluate_generic(axis, lower, key, poly)?;
        let right = self.evaluate_generic(axis, upper, key, poly)?;

        let l = self.scale.to_real(axis, lower);
        let r = self.scale.to_real(axis, upper);
        let table = self.bank.curve()?.derivatives(axis);
        Ok(Ok(Prepared::new(table, l, r, left, right)))
    }

    /// Can `poly` change sign between `lower` and `upper` along `axis`, using
    /// quadratic affine forms?
    ///
    /// `poly` is the polynomial returned by [`BankView::precached_poly`] for
    /// `axis` and `key`; `lower` and `upper` are pixel-relative and may be
    /// given in either order.
    pub fn range_qf(
        &mut self,
        axis: Axis,
        lower: f64,
        upper: f64,
        key: f64,
        poly: &UnivariatePoly,
        kind: QueryKind,
    ) -> Result<RangeOutcome, Error> {
        let max = self.config.max_recursive_derivative;
        let p = match self.prepare(axis, lower, upper, key, poly)? {
            Ok(p) => p,
            Err(outcome) => return Ok(outcome),
        };
        if kind == QueryKind::Crossing && (p.sign_change() || p.zero_bounds()) {
            return Ok(p.early(false));
        }

        let n = p.table.degree();
        let (top, mut enc) = if n <= max {
            let lead = p.table.derivative(n, poly);
            (n, Enclosure::around(lead.eval_with_bound(p.x0)))
        } else {
            (max + 1, Enclosure::UNBOUNDED)
        };

        let mut first_derivative_straddles = false;
        for k in (1..top).rev() {
            let derivative = p.table.derivative(k, poly);
            enc = if enc.contains_zero() {
                quadratic_form(&derivative, p.x0, p.x1)
            } else {
                p.endpoints(&derivative)
            };

            if k == 1 && kind == QueryKind::FirstDerivative {
                first_derivative_straddles = enc.contains_zero();
                if p.sign_change() || p.zero_bounds() {
                    return Ok(p.early(first_derivative_straddles));
                }
            }
        }

        if enc.contains_zero() {
            let enc = quadratic_form(poly, p.x0, p.x1);
            Ok(p.enclosed(enc, first_derivative_straddles))
        } else {
            Ok(p.monotone(first_derivative_straddles))
        }
    }

    /// Can `poly` change sign between `lower` and `upper` along `axis`, using
    /// modified affine arithmetic?
    ///
    /// This takes the same arguments as [`BankView::range_qf`]. It keeps the
    /// whole Taylor expansion around the midpoint of the interval, which gives
    /// tighter enclosures at a somewhat higher cost.
    pub fn range_maa(
        &mut self,
        axis: Axis,
        lower: f64,
        upper: f64,
        key: f64,
        poly: &UnivariatePoly,
        kind: QueryKind,
    ) -> Result<RangeOutcome, Error> {
        let max = self.config.max_recursive_derivative;
        let p = match self.prepare(axis, lower, upper, key, poly)? {
            Ok(p) => p,
            Err(outcome) => return Ok(outcome),
        };
        if kind == QueryKind::Crossing && (p.sign_change() || p.zero_bounds()) {
            return Ok(p.early(false));
        }

        let n = p.table.degree();
        let mut taylor = Vec::with_capacity(n + 1);
        taylor.push(poly.eval_with_bound(p.x0));
        taylor.extend((1..=n).map(|k| {
            // The table's derivatives are divided by (k - 1)!.
            let (val, err) = p.table.derivative(k, poly).eval_with_bound(p.x0);
            let val = val / k as f64;
            (val, err / k as f64 + f64::EPSILON * val.abs())
        }));
        let hpow: Vec<f64> = std::iter::successors(Some(1.0), |h| Some(h * p.x1))
            .take(n + 1)
            .collect();

        let mut enc = if n <= max {
            Enclosure::around(taylor[n])
        } else {
            Enclosure::UNBOUNDED
        };

        let mut first_derivative_straddles = false;
        for d in (0..=n).rev() {
            if enc.contains_zero() {
                enc = taylor_form(d, &taylor, &hpow);
            } else if d > 0 {
                enc = p.endpoints(&p.table.derivative(d, poly));
            } else {
                return Ok(p.monotone(first_derivative_straddles));
            }

            if d == 1 && kind == QueryKind::FirstDerivative {
                first_derivative_straddles = enc.contains_zero();
                if p.sign_change() || p.zero_bounds() {
                    return Ok(p.early(first_derivative_straddles));
                }
            }
        }
        Ok(p.enclosed(enc, first_derivative_straddles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poly::horner;
    use crate::{Bank, EngineConfig, PixelScale, Polynomial2, Rational};
    use kurbo::Rect;
    use proptest::prelude::*;

    // A window where pixel coordinates are real coordinates plus 2, times 16.
    fn scale() -> PixelScale {
        PixelScale::new(Rect::new(-2.0, -2.0, 2.0, 2.0), 64, 64, 5..=1024).unwrap()
    }

    fn circle() -> Polynomial2<i64> {
        Polynomial2::from_terms([(2, 0, 1), (0, 2, 1), (0, 0, -1)])
    }

    #[derive(Clone, Copy, Debug)]
    enum Algorithm {
        Qf,
        Maa,
    }

    const ALGORITHMS: [Algorithm; 2] = [Algorithm::Qf, Algorithm::Maa];

    fn run(
        view: &mut BankView<'_>,
        algorithm: Algorithm,
        axis: Axis,
        (lower, upper): (f64, f64),
        key: f64,
        uni: &UnivariatePoly,
        kind: QueryKind,
    ) -> RangeOutcome {
        let out = match algorithm {
            Algorithm::Qf => view.range_qf(axis, lower, upper, key, uni, kind),
            Algorithm::Maa => view.range_maa(axis, lower, upper, key, uni, kind),
        };
        out.unwrap()
    }

    // Runs both algorithms on the interval `lower..upper` at `key`.
    fn query<C: crate::Coefficient>(
        poly: &Polynomial2<C>,
        config: &EngineConfig,
        axis: Axis,
        interval: (f64, f64),
        key: f64,
        kind: QueryKind,
    ) -> [RangeOutcome; 2] {
        let scale = scale();
        let mut bank = Bank::new(config);
        bank.precompute(poly, config).unwrap();
        let mut view = BankView::new(&scale, &mut bank, config);
        let uni = view.precached_poly(axis, key, 0).unwrap();
        ALGORITHMS.map(|alg| run(&mut view, alg, axis, interval, key, &uni, kind))
    }

    // Both algorithms on the unit circle, with the default configuration.
    fn on_circle(axis: Axis, interval: (f64, f64), key: f64, kind: QueryKind) -> [RangeOutcome; 2] {
        query(&circle(), &EngineConfig::default(), axis, interval, key, kind)
    }

    #[test]
    fn quadratic_form_encloses() {
        // x^2 - 1 on [-0.5, 1.5]: the true range is [-1, 1.25].
        let e = quadratic_form(&UnivariatePoly::new(vec![-1.0, 0.0, 1.0]), 0.5, 1.0);
        assert!(e.low <= -1.0 && e.up >= 1.25, "{e:?}");
    }

    #[test]
    fn quadratic_form_uses_radii() {
        // 1 + x^2 on [-0.5, 0.5] is positive, unless the constant can be off by 2.
        let exact = UnivariatePoly::new(vec![1.0, 0.0, 1.0]);
        assert!(!quadratic_form(&exact, 0.0, 0.5).contains_zero());
        let fuzzy = UnivariatePoly::with_radii(vec![1.0, 0.0, 1.0], vec![2.0, 0.0, 0.0]);
        assert!(quadratic_form(&fuzzy, 0.0, 0.5).straddles());
    }

    #[test]
    fn taylor_form_encloses() {
        // f = x^2 - 1 around x0 = 0.5 with half-width 1: f(x0) = -0.75,
        // f'(x0) = 1, f''(x0) / 2 = 1.
        let taylor = [(-0.75, 0.0), (1.0, 0.0), (1.0, 0.0)];
        let hpow = [1.0, 1.0, 1.0];
        let e = taylor_form(0, &taylor, &hpow);
        assert!(e.low <= -1.0 && e.up >= 1.25, "{e:?}");
        // f' / 1! = 2x on [-0.5, 1.5].
        let e = taylor_form(1, &taylor, &hpow);
        assert!(e.low <= -1.0 && e.up >= 3.0, "{e:?}");
    }

    #[test]
    fn constants() {
        let config = EngineConfig::default();
        let five = Polynomial2::from_rows(vec![vec![5i64]]);
        for out in query(&five, &config, Axis::X, (1.0, 30.0), 3.0, QueryKind::Crossing) {
            assert_eq!(out, RangeOutcome::default());
        }
        let zero = Polynomial2::from_rows(vec![vec![0i64]]);
        for out in query(&zero, &config, Axis::Y, (1.0, 30.0), 3.0, QueryKind::Crossing) {
            assert!(out.crossing);
        }
    }

    #[test]
    fn degenerate_interval() {
        for out in on_circle(Axis::X, (16.0, 16.0), 32.0, QueryKind::Enclosure) {
            assert_eq!(out, RangeOutcome::default());
        }
    }

    #[test]
    fn circle_rows() {
        // The row y = 0 crosses the circle at x = -1 (pixel 16) and x = 1 (pixel 48).
        for out in on_circle(Axis::X, (10.0, 20.0), 32.0, QueryKind::Crossing) {
            assert!(out.crossing);
        }
        for kind in [QueryKind::Enclosure, QueryKind::FirstDerivative] {
            for out in on_circle(Axis::X, (44.0, 52.0), 32.0, kind) {
                assert!(out.crossing);
                assert!(!out.zero_bounds);
            }
        }
        // Both crossings are inside, so the endpoints have the same sign.
        for out in on_circle(Axis::X, (8.0, 56.0), 32.0, QueryKind::Crossing) {
            assert!(out.crossing);
        }
        // The row y = 1.5 misses it.
        for out in on_circle(Axis::X, (0.0, 64.0), 56.0, QueryKind::Enclosure) {
            assert!(!out.crossing);
        }
        // Reversed endpoints mean the same thing.
        for out in on_circle(Axis::Y, (20.0, 10.0), 32.0, QueryKind::Crossing) {
            assert!(out.crossing);
        }
    }

    #[test]
    fn endpoint_on_the_curve() {
        for out in on_circle(Axis::X, (48.0, 56.0), 32.0, QueryKind::Enclosure) {
            assert!(out.zero_bounds);
            assert!(out.may_cross());
        }
    }

    #[test]
    fn first_derivative() {
        // Along y = 0, f = x^2 - 1 has its minimum at x = 0 (pixel 32).
        for out in on_circle(Axis::X, (24.0, 40.0), 32.0, QueryKind::FirstDerivative) {
            assert!(out.first_derivative_straddles);
            assert!(!out.crossing);
        }
        for out in on_circle(Axis::X, (36.0, 40.0), 32.0, QueryKind::FirstDerivative) {
            assert!(!out.first_derivative_straddles);
        }
        for out in on_circle(Axis::X, (24.0, 40.0), 32.0, QueryKind::Enclosure) {
            assert!(!out.first_derivative_straddles);
        }
    }

    #[test]
    fn degree_mismatch() {
        let config = EngineConfig::default();
        let scale = scale();
        let mut bank = Bank::new(&config);
        bank.precompute(&circle(), &config).unwrap();
        let mut view = BankView::new(&scale, &mut bank, &config);
        let uni = UnivariatePoly::new(vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(
            view.range_qf(Axis::X, 0.0, 1.0, 0.0, &uni, QueryKind::Crossing),
            Err(Error::DegreeMismatch {
                expected: 3,
                actual: 4
            })
        );
    }

    #[test]
    fn high_degree_without_recursion() {
        // (x^2 - 1/4)^4 + 1/16, which has degree 8 in x but is always positive.
        let poly = Polynomial2::from_terms([
            (8, 0, 1.0),
            (6, 0, -1.0),
            (4, 0, 0.375),
            (2, 0, -0.0625),
            (0, 0, 0.06640625),
        ]);
        for max in [0, 3, 7, 9] {
            let config = EngineConfig {
                max_recursive_derivative: max,
                ..EngineConfig::default()
            };
            for out in query(&poly, &config, Axis::X, (28.0, 36.0), 0.0, QueryKind::Enclosure) {
                assert!(!out.crossing);
                assert!(!out.zero_bounds);
            }
        }
    }

    #[test]
    fn near_tangent_cells() {
        // (x - a)^2 - delta dips below zero on a tiny cell around x = a, by
        // much less than the rounding error in its float coefficients. The
        // endpoints are both positive.
        let config = EngineConfig::default();
        let step = 1.0 / 4096.0;
        for (num, den) in [(1, 3), (1, 7), (2, 9), (5, 11), (3, 13), (1, 10)] {
            let a = Rational::from(num) / Rational::from(den);
            let a_px = (num as f64 / den as f64 + 2.0) * 16.0;
            let interval = (a_px - step / 2.0, a_px + step / 2.0);
            for k in 1..=40 {
                let delta = Rational::try_from(k as f64 * 1e-18).unwrap();
                let poly = Polynomial2::from_terms([
                    (2, 0, Rational::from(1)),
                    (1, 0, Rational::from(-2) * &a),
                    (0, 0, &a * &a - delta),
                ]);
                for kind in [QueryKind::Enclosure, QueryKind::FirstDerivative] {
                    for out in query(&poly, &config, Axis::X, interval, 20.0, kind) {
                        assert!(out.crossing, "a = {num}/{den}, delta = {k}e-18");
                    }
                }
            }
        }
    }

    // Exact signs at `samples + 1` evenly spaced points of the real interval
    // `[l, r]`, for a polynomial whose exact coefficients are `coeffs`.
    fn sampled_signs(coeffs: &[Rational], (l, r): (f64, f64), samples: u32) -> Vec<Sign> {
        let l = Rational::try_from(l).unwrap();
        let r = Rational::try_from(r).unwrap();
        let step = (&r - &l) / Rational::from(samples);
        (0..=samples)
            .map(|i| Sign::of_exact(&horner(coeffs, &(&l + &step * Rational::from(i)))))
            .collect()
    }

    fn changes_sign(signs: &[Sign]) -> bool {
        signs.contains(&Sign::Positive) && signs.contains(&Sign::Negative)
    }

    // The exact univariate polynomial along `axis` at the pixel-relative `key`.
    fn exact_row<C: crate::Coefficient>(
        poly: &Polynomial2<C>,
        axis: Axis,
        key: f64,
    ) -> Vec<Rational> {
        let key = Rational::try_from(scale().to_real(axis.flip(), key)).unwrap();
        let dense = poly.to_exact().unwrap();
        // `dense` has y as its outer variable.
        let varying_outer = match axis {
            Axis::X => dense.transpose(),
            Axis::Y => dense,
        };
        varying_outer
            .rows()
            .iter()
            .map(|row| horner(row, &key))
            .collect()
    }

    proptest! {
        #[test]
        fn no_crossing_is_sound(
            rows in prop::collection::vec(prop::collection::vec(-8i64..8, 1..5), 1..5),
            lower in 0u32..256,
            len in 1u32..128,
            key in 0u32..256,
            vertical: bool,
            kind_idx in 0usize..3,
        ) {
            let kinds = [QueryKind::Crossing, QueryKind::Enclosure, QueryKind::FirstDerivative];
            let kind = kinds[kind_idx];
            let axis = if vertical { Axis::Y } else { Axis::X };
            let poly = Polynomial2::from_rows(rows);
            let (lower, upper) = (lower as f64 / 4.0, (lower + len) as f64 / 4.0);
            let key = key as f64 / 4.0;
            let config = EngineConfig::default();
            let scale = scale();
            let mut bank = Bank::new(&config);
            bank.precompute(&poly, &config).unwrap();
            let mut view = BankView::new(&scale, &mut bank, &config);
            let uni = view.precached_poly(axis, key, 0).unwrap();

            let interval = (scale.to_real(axis, lower), scale.to_real(axis, upper));
            let signs = sampled_signs(&exact_row(&poly, axis, key), interval, 500);

            for alg in ALGORITHMS {
                let out = run(&mut view, alg, axis, (lower, upper), key, &uni, kind);
                if changes_sign(&signs) {
                    prop_assert!(out.crossing, "{:?} missed a crossing", alg);
                }
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        // Cells down to 2^-20 of a pixel, with float coefficients. The
        // polynomial is shifted so that the curve passes through the middle
        // of the cell, and (with `tangent`) so that it's nearly tangent there.
        #[test]
        fn deep_cells_are_sound(
            grid in prop::collection::vec(prop::collection::vec(-1.0f64..1.0, 1..4), 2..5),
            pixel in 0u32..64,
            offset in 0u32..(1 << 20),
            level in 0u32..=20,
            key in 0u32..(64 << 4),
            vertical: bool,
            shift in 0usize..3,
        ) {
            let axis = if vertical { Axis::Y } else { Axis::X };
            let cell = 1.0 / (1u32 << level) as f64;
            let lower = pixel as f64 + (offset >> (20 - level)) as f64 * cell;
            let upper = lower + cell;
            let key = key as f64 / 16.0;
            let scale = scale();
            let (l, r) = (scale.to_real(axis, lower), scale.to_real(axis, upper));

            // grid[v][f] multiplies (varying)^v (fixed)^f.
            let mut grid = grid;
            let fixed = scale.to_real(axis.flip(), key);
            let row: Vec<f64> = grid
                .iter()
                .map(|g| g.iter().rev().fold(0.0, |acc, c| acc * fixed + c))
                .collect();
            let mid = (l + r) / 2.0;
            let value = row.iter().rev().fold(0.0, |acc, c| acc * mid + c);
            let slope = row
                .iter()
                .enumerate()
                .skip(1)
                .rev()
                .fold(0.0, |acc, (v, c)| acc * mid + v as f64 * c);
            match shift {
                1 => grid[0][0] -= value,
                2 => {
                    grid[0][0] -= value - slope * mid;
                    grid[1][0] -= slope;
                }
                _ => {}
            }
            let terms = grid.iter().enumerate().flat_map(|(v, g)| {
                g.iter().enumerate().map(move |(f, &c)| match axis {
                    Axis::X => (v, f, c),
                    Axis::Y => (f, v, c),
                })
            });
            let poly = Polynomial2::from_terms(terms);

            let config = EngineConfig::default();
            let mut bank = Bank::new(&config);
            bank.precompute(&poly, &config).unwrap();
            let mut view = BankView::new(&scale, &mut bank, &config);
            let uni = view.precached_poly(axis, key, 0).unwrap();
            let signs = sampled_signs(&exact_row(&poly, axis, key), (l, r), 10_000);

            let kind = QueryKind::Enclosure;
            for alg in ALGORITHMS {
                let out = run(&mut view, alg, axis, (lower, upper), key, &uni, kind);
                if changes_sign(&signs) {
                    prop_assert!(out.crossing, "{:?} missed a crossing", alg);
                }
            }
        }
    }
}
