//! Precomputed multipliers for evaluating derivatives of univariate polynomials.

use crate::num::gamma;
use crate::poly::UnivariatePoly;

/// Multipliers that turn the coefficients of a degree-`n` polynomial into
/// the coefficients of its derivatives.
///
/// Entry `k - 1` is for the derivative of order `k`, and has `n - k + 1`
/// elements. They're normalized: the derivative of order `k` is represented
/// as `f^(k) / (k - 1)!`, which keeps the multipliers small (and, for any
/// reasonable degree, exactly representable). Since the normalizing factor
/// is positive, it never changes a sign.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DerivativeTable {
    orders: Vec<Vec<f64>>,
}

impl DerivativeTable {
    /// Builds the table for polynomials of degree `degree`.
    pub fn new(degree: usize) -> Self {
        let mut orders: Vec<Vec<f64>> = Vec::with_capacity(degree);
        for i in 0..degree {
            let row: Vec<f64> = match orders.last() {
                None => (1..=degree).map(|j| j as f64).collect(),
                Some(prev) => {
                    // Divide by the previous constant multiplier, which is (i)!/(i-1)! = i.
                    let det = prev[0];
                    (1..=degree - i).map(|j| prev[j] * j as f64 / det).collect()
                }
            };
            orders.push(row);
        }
        DerivativeTable { orders }
    }

    /// The degree of the polynomials this table is for.
    pub fn degree(&self) -> usize {
        self.orders.len()
    }

    /// The multipliers for the derivative of order `k`.
    ///
    /// # Panics
    ///
    /// Panics if `k` is zero or larger than [`DerivativeTable::degree`].
    pub fn multipliers(&self, k: usize) -> &[f64] {
        assert!(
            (1..=self.degree()).contains(&k),
            "no derivative of order {k} in a table of degree {}",
            self.degree()
        );
        &self.orders[k - 1]
    }

    /// The normalized derivative of order `k` of `poly`.
    ///
    /// The result's error radii cover both the radii of `poly` and the
    /// rounding in multiplying out the coefficients.
    ///
    /// # Panics
    ///
    /// Panics if `k` is zero or larger than [`DerivativeTable::degree`], or if
    /// `poly` has fewer than `k + 1` coefficients.
    pub fn derivative(&self, k: usize, poly: &UnivariatePoly) -> UnivariatePoly {
        let g = gamma(2);
        let (coeffs, radii) = self
            .multipliers(k)
            .iter()
            .zip(&poly.coeffs()[k..])
            .zip(&poly.radii()[k..])
            .map(|((m, c), r)| {
                let d = m * c;
                (d, m * r + g * (d.abs() + m * r))
            })
            .unzip();
        UnivariatePoly::with_radii(coeffs, radii)
    }
}
