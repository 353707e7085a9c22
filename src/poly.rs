//! Bivariate and univariate polynomials, in the representations the engine needs.
//!
//! There are three coefficient domains in play: exact rationals (the ground
//! truth), residues modulo a prime (a cheap zero test), and `f64` (the hot
//! path). A bivariate polynomial is stored densely as a sequence of "rows",
//! where row `i` holds the coefficients of the inner variable that multiply
//! the `i`th power of the outer variable. Which variable is outer is a property
//! of the particular copy: the engine keeps both orientations around.

use malachite::num::basic::traits::Zero;
use malachite::Rational;

use crate::num::{abs_exact, gamma, to_f64, Coefficient, ModP};
use crate::Error;

/// A bivariate polynomial, as supplied by the caller.
///
/// This is a sparse collection of terms `c * x^i * y^j`. Repeated monomials
/// are summed when the polynomial is precomputed.
#[derive(Clone, Debug, PartialEq)]
pub struct Polynomial2<C> {
    terms: Vec<(usize, usize, C)>,
}

impl<C: Coefficient> Polynomial2<C> {
    /// Builds a polynomial from `(i, j, c)` triples, each meaning `c * x^i * y^j`.
    pub fn from_terms(terms: impl IntoIterator<Item = (usize, usize, C)>) -> Self {
        Polynomial2 {
            terms: terms.into_iter().collect(),
        }
    }

    /// Builds a polynomial from rows in "y-outer" order.
    ///
    /// `rows[j][i]` is the coefficient of `x^i * y^j`. The rows don't need to
    /// have the same length.
    pub fn from_rows(rows: Vec<Vec<C>>) -> Self {
        Polynomial2 {
            terms: rows
                .into_iter()
                .enumerate()
                .flat_map(|(j, row)| row.into_iter().enumerate().map(move |(i, c)| (i, j, c)))
                .collect(),
        }
    }

    /// Iterates over the `(i, j, c)` terms, in the order they were given.
    pub fn terms(&self) -> impl Iterator<Item = &(usize, usize, C)> + '_ {
        self.terms.iter()
    }

    /// The exact image of this polynomial, with `y` as the outer variable.
    pub(crate) fn to_exact(&self) -> Result<Dense2<Rational>, Error> {
        let deg_x = self.terms.iter().map(|t| t.0).max().unwrap_or(0);
        let deg_y = self.terms.iter().map(|t| t.1).max().unwrap_or(0);
        let mut rows = vec![vec![Rational::ZERO; deg_x + 1]; deg_y + 1];
        for (i, j, c) in &self.terms {
            rows[*j][*i] += c.to_exact().ok_or(Error::NonFiniteCoefficient)?;
        }
        Ok(Dense2::new(rows).trimmed())
    }

    /// Evaluates this polynomial exactly at `(x, y)`.
    ///
    /// Returns `None` if some coefficient isn't finite.
    pub fn eval_exact(&self, x: &Rational, y: &Rational) -> Option<Rational> {
        let dense = self.to_exact().ok()?;
        Some(dense.eval(y, x))
    }
}

/// Just enough of a ring to run Horner's scheme.
pub(crate) trait Ring: Clone {
    fn zero() -> Self;
    fn mul_add(&self, x: &Self, c: &Self) -> Self;
}

impl Ring for Rational {
    fn zero() -> Self {
        Rational::ZERO
    }

    fn mul_add(&self, x: &Self, c: &Self) -> Self {
        self * x + c
    }
}

impl Ring for ModP {
    fn zero() -> Self {
        ModP::ZERO
    }

    fn mul_add(&self, x: &Self, c: &Self) -> Self {
        self.mul(*x).add(*c)
    }
}

/// Evaluates `coeffs` (lowest degree first) at `x`.
pub(crate) fn horner<R: Ring>(coeffs: &[R], x: &R) -> R {
    coeffs
        .iter()
        .rev()
        .fold(R::zero(), |acc, c| acc.mul_add(x, c))
}

/// A dense bivariate polynomial.
///
/// All rows have the same length, and there is always at least one row with
/// at least one entry.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Dense2<T> {
    rows: Vec<Vec<T>>,
}

impl<T: Clone> Dense2<T> {
    pub(crate) fn new(rows: Vec<Vec<T>>) -> Self {
        debug_assert!(!rows.is_empty());
        debug_assert!(rows.iter().all(|r| r.len() == rows[0].len() && !r.is_empty()));
        Dense2 { rows }
    }

    pub(crate) fn rows(&self) -> &[Vec<T>] {
        &self.rows
    }

    /// The degree in the outer variable.
    pub(crate) fn outer_degree(&self) -> usize {
        self.rows.len() - 1
    }

    /// The degree in the inner variable.
    pub(crate) fn inner_degree(&self) -> usize {
        self.rows[0].len() - 1
    }

    /// Exchanges the roles of the two variables.
    ///
    /// The coefficient of `outer^i inner^j` becomes the coefficient of
    /// `inner^i outer^j` in the result, so the polynomial's value is preserved
    /// once the arguments are swapped too.
    pub(crate) fn transpose(&self) -> Self {
        let rows = (0..self.rows[0].len())
            .map(|j| self.rows.iter().map(|row| row[j].clone()).collect())
            .collect();
        Dense2 { rows }
    }

    pub(crate) fn map<S>(&self, mut f: impl FnMut(&T) -> S) -> Dense2<S> {
        Dense2 {
            rows: self
                .rows
                .iter()
                .map(|row| row.iter().map(&mut f).collect())
                .collect(),
        }
    }

    pub(crate) fn try_map<S>(&self, mut f: impl FnMut(&T) -> Option<S>) -> Option<Dense2<S>> {
        let rows = self
            .rows
            .iter()
            .map(|row| row.iter().map(&mut f).collect::<Option<Vec<_>>>())
            .collect::<Option<Vec<_>>>()?;
        Some(Dense2 { rows })
    }
}

impl<R: Ring> Dense2<R> {
    /// Evaluates at a point, with `outer` and `inner` being the values of the
    /// outer and inner variables.
    pub(crate) fn eval(&self, outer: &R, inner: &R) -> R {
        let inner_vals: Vec<R> = self.rows.iter().map(|row| horner(row, inner)).collect();
        horner(&inner_vals, outer)
    }
}

impl Dense2<Rational> {
    /// Drops high-degree rows and columns that are entirely zero.
    fn trimmed(mut self) -> Self {
        while self.rows.len() > 1 && self.rows.last().is_some_and(|r| r.iter().all(is_zero)) {
            self.rows.pop();
        }
        while self.rows[0].len() > 1
            && self
                .rows
                .iter()
                .all(|r| r.last().is_some_and(is_zero))
        {
            for row in &mut self.rows {
                row.pop();
            }
        }
        self
    }

    /// The largest coefficient magnitude, or zero for the zero polynomial.
    pub(crate) fn max_abs_coeff(&self) -> Rational {
        self.rows
            .iter()
            .flatten()
            .map(abs_exact)
            .max()
            .unwrap_or(Rational::ZERO)
    }

    /// The partial derivative with respect to the inner variable.
    pub(crate) fn inner_derivative(&self) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut d: Vec<Rational> = row
                    .iter()
                    .enumerate()
                    .skip(1)
                    .map(|(i, c)| c * Rational::from(i as u64))
                    .collect();
                if d.is_empty() {
                    d.push(Rational::ZERO);
                }
                d
            })
            .collect();
        Dense2 { rows }
    }

    /// The partial derivative with respect to the outer variable.
    pub(crate) fn outer_derivative(&self) -> Self {
        self.transpose().inner_derivative().transpose()
    }
}

fn is_zero(x: &Rational) -> bool {
    *x == Rational::ZERO
}

/// A univariate polynomial with `f64` coefficients.
///
/// This is what you get by fixing one coordinate of the curve's polynomial.
/// Because the coefficients were computed in floating point, each one carries
/// an absolute error radius: the exact coefficient is within `radius[i]` of
/// `coeffs[i]`. The radii are what allow [`UnivariatePoly::eval_with_bound`]
/// to decide when a floating-point sign can be trusted.
#[derive(Clone, Debug, PartialEq)]
pub struct UnivariatePoly {
    coeffs: Vec<f64>,
    radii: Vec<f64>,
}

impl UnivariatePoly {
    /// A polynomial with exactly known coefficients (lowest degree first).
    ///
    /// # Panics
    ///
    /// Panics if `coeffs` is empty.
    pub fn new(coeffs: Vec<f64>) -> Self {
        assert!(!coeffs.is_empty());
        let radii = vec![0.0; coeffs.len()];
        UnivariatePoly { coeffs, radii }
    }

    /// A polynomial whose exact coefficient `i` is within `radii[i]` of `coeffs[i]`.
    ///
    /// # Panics
    ///
    /// Panics if `coeffs` is empty, or if the lengths differ.
    pub fn with_radii(coeffs: Vec<f64>, radii: Vec<f64>) -> Self {
        assert!(!coeffs.is_empty());
        assert_eq!(coeffs.len(), radii.len());
        UnivariatePoly { coeffs, radii }
    }

    /// Fixes the inner variable of each row of `rows` at `key`.
    ///
    /// The result is a polynomial in the outer variable.
    pub(crate) fn substitute(rows: &Dense2<f64>, key: f64) -> Self {
        // One extra rounding for the conversion from rationals to floats.
        let g = gamma(2 * rows.inner_degree() + 2);
        let abs_key = key.abs();
        let (coeffs, radii) = rows
            .rows()
            .iter()
            .map(|row| {
                let mut val = 0.0;
                let mut abs_sum = 0.0;
                for c in row.iter().rev() {
                    val = val * key + c;
                    abs_sum = abs_sum * abs_key + c.abs();
                }
                (val, 2.0 * g * abs_sum)
            })
            .unzip();
        UnivariatePoly { coeffs, radii }
    }

    /// The coefficients, lowest degree first.
    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    /// The error radii of the coefficients.
    pub fn radii(&self) -> &[f64] {
        &self.radii
    }

    /// The number of coefficients, including any zeros at the top.
    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    /// Always false: there's at least a constant term.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The degree, not counting coefficients that are exactly zero.
    pub fn degree(&self) -> usize {
        self.coeffs.iter().rposition(|&c| c != 0.0).unwrap_or(0)
    }

    /// Evaluates at `x` using Horner's scheme.
    pub fn eval(&self, x: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
    }

    /// Evaluates at `x`, and returns a bound on the absolute error.
    ///
    /// The bound covers both the radii of the coefficients and the rounding
    /// in the evaluation itself; it's doubled to absorb the rounding in
    /// computing the bound. If the returned value has larger magnitude than
    /// the bound, its sign is the sign of the exact polynomial.
    pub fn eval_with_bound(&self, x: f64) -> (f64, f64) {
        let g = gamma(2 * self.coeffs.len());
        let abs_x = x.abs();
        let mut val = 0.0;
        let mut abs_sum = 0.0;
        let mut radius_sum = 0.0;
        for (c, r) in self.coeffs.iter().zip(&self.radii).rev() {
            val = val * x + c;
            abs_sum = abs_sum * abs_x + c.abs() + r;
            radius_sum = radius_sum * abs_x + r;
        }
        // The last term guards against underflow, where relative bounds mean nothing.
        let bound = 2.0 * (radius_sum + g * abs_sum) + f64::MIN_POSITIVE * self.coeffs.len() as f64;
        (val, bound)
    }
}

/// Converts the exact polynomial to floats, to the nearest representable value.
pub(crate) fn to_float(rows: &Dense2<Rational>) -> Dense2<f64> {
    rows.map(to_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn circle() -> Polynomial2<i64> {
        Polynomial2::from_terms([(2, 0, 1), (0, 2, 1), (0, 0, -1)])
    }

    #[test]
    fn dense_layout() {
        let p = circle().to_exact().unwrap();
        assert_eq!(p.outer_degree(), 2);
        assert_eq!(p.inner_degree(), 2);
        assert_eq!(p.rows()[0][2], Rational::from(1));
        assert_eq!(p.rows()[2][0], Rational::from(1));
        assert_eq!(p.rows()[1][1], Rational::ZERO);
    }

    #[test]
    fn trimming() {
        let p = Polynomial2::from_rows(vec![vec![1i64, 2, 0], vec![0, 0, 0]])
            .to_exact()
            .unwrap();
        assert_eq!(p.outer_degree(), 0);
        assert_eq!(p.inner_degree(), 1);
    }

    #[test]
    fn non_finite() {
        let p = Polynomial2::from_terms([(1, 0, f64::NAN)]);
        assert_eq!(p.to_exact(), Err(Error::NonFiniteCoefficient));
    }

    #[test]
    fn partials() {
        // x^2 y + 3 x y^2
        let p = Polynomial2::from_terms([(2, 1, 1i64), (1, 2, 3)])
            .to_exact()
            .unwrap();
        let x = Rational::from(2);
        let y = Rational::from(5);
        // df/dx = 2 x y + 3 y^2
        assert_eq!(p.inner_derivative().eval(&y, &x), Rational::from(95));
        // df/dy = x^2 + 6 x y
        assert_eq!(p.outer_derivative().eval(&y, &x), Rational::from(64));
    }

    #[test]
    fn substitution_matches_direct_evaluation() {
        let p = to_float(&circle().to_exact().unwrap());
        // Fixing x = 0.5 leaves y^2 - 0.75.
        let q = UnivariatePoly::substitute(&p, 0.5);
        assert_eq!(q.coeffs(), &[-0.75, 0.0, 1.0]);
        assert_eq!(q.eval(0.5), -0.5);
        assert!(q.radii().iter().all(|&r| r >= 0.0 && r < 1e-14));
    }

    #[test]
    fn effective_degree() {
        assert_eq!(UnivariatePoly::new(vec![5.0, 0.0, 0.0]).degree(), 0);
        assert_eq!(UnivariatePoly::new(vec![5.0, 1.0, 0.0]).degree(), 1);
    }

    proptest! {
        #[test]
        fn transpose_preserves_value(
            rows in prop::collection::vec(prop::collection::vec(-100i64..100, 1..4), 1..4),
            x in -50i64..50,
            y in -50i64..50,
        ) {
            let p = Polynomial2::from_rows(rows).to_exact().unwrap();
            let (x, y) = (Rational::from(x), Rational::from(y));
            prop_assert_eq!(p.eval(&y, &x), p.transpose().eval(&x, &y));
        }

        #[test]
        fn float_bound_is_sound(
            coeffs in prop::collection::vec(-1.0f64..1.0, 1..8),
            x in -4.0f64..4.0,
        ) {
            let p = UnivariatePoly::new(coeffs.clone());
            let (val, bound) = p.eval_with_bound(x);
            let exact_coeffs: Vec<Rational> =
                coeffs.iter().map(|c| Rational::try_from(*c).unwrap()).collect();
            let exact = horner(&exact_coeffs, &Rational::try_from(x).unwrap());
            let err = abs_exact(&(exact - Rational::try_from(val).unwrap()));
            prop_assert!(err <= Rational::try_from(bound).unwrap());
        }
    }
}
