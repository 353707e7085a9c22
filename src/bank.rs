//! Per-curve state: the precomputed polynomial copies and their caches.

use malachite::num::basic::traits::Zero;
use malachite::Rational;

use crate::backend::{EvalPoint, RationalBackend, Residue, SignResolver};
use crate::derivative::DerivativeTable;
use crate::lru::LruCache;
use crate::num::{CheapOrderedFloat, Coefficient, ModP, Sign};
use crate::poly::{to_float, Dense2, Polynomial2, UnivariatePoly};
use crate::{Axis, EngineConfig, Error, PixelScale};

/// Everything derived from one input polynomial.
///
/// The `_x` copies have `x` as the outer variable (so fixing `y` gives a
/// polynomial in `x`) and the `_y` copies have `y` as the outer variable.
#[derive(Clone, Debug)]
pub(crate) struct Curve {
    pub(crate) coeffs_x: Dense2<f64>,
    pub(crate) coeffs_y: Dense2<f64>,
    pub(crate) der_x: DerivativeTable,
    pub(crate) der_y: DerivativeTable,
    pub(crate) rational_x: Dense2<Rational>,
    pub(crate) rational_y: Dense2<Rational>,
    // Partial derivatives, both with y as the outer variable.
    pub(crate) rational_fx: Dense2<Rational>,
    pub(crate) rational_fy: Dense2<Rational>,
    pub(crate) modular_x: Option<Dense2<ModP>>,
    pub(crate) modular_y: Option<Dense2<ModP>>,
}

impl Curve {
    fn new<C: Coefficient>(poly: &Polynomial2<C>, modular: bool) -> Result<Curve, Error> {
        let exact = poly.to_exact()?;

        // Scale so that the largest coefficient has magnitude one. This doesn't
        // change any signs, but it keeps the float copies well away from overflow.
        let max = exact.max_abs_coeff();
        let rational_y = if max == Rational::ZERO {
            exact
        } else {
            exact.map(|c| c / &max)
        };
        let rational_x = rational_y.transpose();
        let rational_fx = rational_y.inner_derivative();
        let rational_fy = rational_y.outer_derivative();

        let modular_y = if modular {
            let m = rational_y.try_map(ModP::from_rational);
            if m.is_none() {
                log::debug!("no modular image for this polynomial; skipping the modular test");
            }
            m
        } else {
            None
        };
        let modular_x = modular_y.as_ref().map(Dense2::transpose);

        let coeffs_y = to_float(&rational_y);
        let coeffs_x = coeffs_y.transpose();
        let der_x = DerivativeTable::new(coeffs_x.outer_degree());
        let der_y = DerivativeTable::new(coeffs_y.outer_degree());

        Ok(Curve {
            coeffs_x,
            coeffs_y,
            der_x,
            der_y,
            rational_x,
            rational_y,
            rational_fx,
            rational_fy,
            modular_x,
            modular_y,
        })
    }

    pub(crate) fn orientation(&self, axis: Axis) -> &Dense2<f64> {
        match axis {
            Axis::X => &self.coeffs_x,
            Axis::Y => &self.coeffs_y,
        }
    }

    pub(crate) fn derivatives(&self, axis: Axis) -> &DerivativeTable {
        match axis {
            Axis::X => &self.der_x,
            Axis::Y => &self.der_y,
        }
    }
}

/// One complete, independently switchable copy of all curve-specific state.
///
/// A bank holds the precomputed copies of one curve's polynomial, plus the
/// caches of fixed-coordinate polynomials and of point signs that go with it.
/// Nothing is shared between banks, so several curves can be processed in an
/// interleaved fashion without invalidating each other's caches.
#[derive(Clone, Debug)]
pub struct Bank {
    curve: Option<Curve>,
    cached_x: LruCache<CheapOrderedFloat, UnivariatePoly>,
    cached_y: LruCache<CheapOrderedFloat, UnivariatePoly>,
    eval_cached: LruCache<(CheapOrderedFloat, CheapOrderedFloat), Sign>,
}

impl Bank {
    /// An empty bank, with cache sizes taken from `config`.
    pub fn new(config: &EngineConfig) -> Bank {
        Bank {
            curve: None,
            cached_x: LruCache::new(config.poly_cache_capacity),
            cached_y: LruCache::new(config.poly_cache_capacity),
            eval_cached: LruCache::new(config.eval_cache_capacity),
        }
    }

    /// Replaces this bank's curve by `poly`.
    ///
    /// All cached entries refer to the previous curve, so they are dropped.
    /// If `poly` is rejected, the bank is left as it was.
    pub fn precompute<C: Coefficient>(
        &mut self,
        poly: &Polynomial2<C>,
        config: &EngineConfig,
    ) -> Result<(), Error> {
        let curve = Curve::new(poly, config.modular_enabled)?;
        log::debug!(
            "precomputed a curve of degree {} in x and {} in y",
            curve.der_x.degree(),
            curve.der_y.degree()
        );
        self.clear_caches();
        self.curve = Some(curve);
        Ok(())
    }

    /// Empties the caches and forgets the curve.
    pub fn clear(&mut self) {
        self.clear_caches();
        self.curve = None;
    }

    fn clear_caches(&mut self) {
        self.cached_x.clear();
        self.cached_y.clear();
        self.eval_cached.clear();
    }

    /// Has a polynomial been precomputed?
    pub fn has_polynomial(&self) -> bool {
        self.curve.is_some()
    }

    /// The degree of the curve in the variable along `axis`.
    pub fn degree(&self, axis: Axis) -> Option<usize> {
        Some(self.curve.as_ref()?.derivatives(axis).degree())
    }

    /// The derivative table for polynomials varying along `axis`.
    pub fn derivatives(&self, axis: Axis) -> Option<&DerivativeTable> {
        Some(self.curve.as_ref()?.derivatives(axis))
    }

    /// The cache of fixed-coordinate polynomials varying along `axis`.
    pub fn poly_cache(&self, axis: Axis) -> &LruCache<CheapOrderedFloat, UnivariatePoly> {
        match axis {
            Axis::X => &self.cached_x,
            Axis::Y => &self.cached_y,
        }
    }

    /// The cache of point signs.
    pub fn eval_cache(&self) -> &LruCache<(CheapOrderedFloat, CheapOrderedFloat), Sign> {
        &self.eval_cached
    }

    pub(crate) fn curve(&self) -> Result<&Curve, Error> {
        self.curve.as_ref().ok_or(Error::NoPolynomial)
    }
}

/// A bank, together with the drawing window it's rendered into.
///
/// This is the handle through which all the per-curve operations run. The
/// bank is borrowed mutably because lookups update the caches.
///
/// Coordinates are pixel-relative: a coordinate `c` along `axis` refers to
/// the real coordinate `min + c * pixel_size`. A `key` is a coordinate along
/// the other axis.
#[derive(Debug)]
pub struct BankView<'a> {
    pub(crate) scale: &'a PixelScale,
    pub(crate) bank: &'a mut Bank,
    pub(crate) config: &'a EngineConfig,
    resolver: SignResolver,
    level: u32,
}

impl<'a> BankView<'a> {
    /// Wraps a bank, at subdivision level zero.
    pub fn new(scale: &'a PixelScale, bank: &'a mut Bank, config: &'a EngineConfig) -> Self {
        BankView {
            scale,
            bank,
            config,
            resolver: SignResolver::new(config),
            level: 0,
        }
    }

    /// Sets the subdivision level used to decide whether point signs are cached.
    pub fn at_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// The drawing window.
    pub fn scale(&self) -> &PixelScale {
        self.scale
    }

    /// The bank.
    pub fn bank(&self) -> &Bank {
        self.bank
    }

    /// Fixes the coordinate across `axis` at `key`, returning a polynomial
    /// that varies along `axis`.
    ///
    /// The result is cached, unless `level` is too deep for caching to pay
    /// off. Cache hits return exactly the polynomial that a fresh
    /// substitution would.
    pub fn precached_poly(
        &mut self,
        axis: Axis,
        key: f64,
        level: u32,
    ) -> Result<UnivariatePoly, Error> {
        let real_key = self.scale.to_real(axis.flip(), key);
        let rows = self.bank.curve.as_ref().ok_or(Error::NoPolynomial)?.orientation(axis);
        if level >= self.config.max_poly_cache_level {
            return Ok(UnivariatePoly::substitute(rows, real_key));
        }
        let cache = match axis {
            Axis::X => &mut self.bank.cached_x,
            Axis::Y => &mut self.bank.cached_y,
        };
        Ok(cache.get_or_insert_with(real_key.into(), || {
            UnivariatePoly::substitute(rows, real_key)
        }))
    }

    /// The sign of the curve's polynomial at `coord` along `axis` and `key`
    /// across it.
    ///
    /// `poly` must be the polynomial returned by [`BankView::precached_poly`]
    /// for the same `axis` and `key`; it's used for the fast floating-point
    /// attempt. If that attempt can't be trusted, the sign is decided by the
    /// modular zero test and exact rational arithmetic. Either way the result
    /// is exact.
    pub fn evaluate_generic(
        &mut self,
        axis: Axis,
        coord: f64,
        key: f64,
        poly: &UnivariatePoly,
    ) -> Result<Sign, Error> {
        let (x, y) = self.scale.real_point(axis, coord, key);
        let curve = self.bank.curve.as_ref().ok_or(Error::NoPolynomial)?;
        let point = EvalPoint {
            axis,
            x,
            y,
            poly: Some(poly),
            curve,
        };
        let resolver = self.resolver;
        if self.level >= self.config.max_eval_cache_level {
            return resolver.resolve(&point);
        }
        self.bank
            .eval_cached
            .try_get_or_insert_with((x.into(), y.into()), || resolver.resolve(&point))
    }

    /// The modular image of the curve's polynomial at a point.
    ///
    /// Returns `None` if there is no modular image (for example, because the
    /// modular test is disabled).
    pub fn evaluate_modular(
        &self,
        axis: Axis,
        coord: f64,
        key: f64,
    ) -> Result<Option<Residue>, Error> {
        let (x, y) = self.scale.real_point(axis, coord, key);
        let point = EvalPoint {
            axis,
            x,
            y,
            poly: None,
            curve: self.bank.curve()?,
        };
        Ok(crate::backend::ModularBackend::default().residue(&point))
    }

    /// The sign of the curve's polynomial at a point, by exact evaluation.
    pub fn evaluate_rational(&self, axis: Axis, coord: f64, key: f64) -> Result<Sign, Error> {
        let (x, y) = self.scale.real_point(axis, coord, key);
        let point = EvalPoint {
            axis,
            x,
            y,
            poly: None,
            curve: self.bank.curve()?,
        };
        Ok(Sign::of_exact(&RationalBackend.value(&point)?))
    }

    /// The exact sign of the partial derivative with respect to `wrt` at the
    /// pixel-relative point `(px, py)`.
    pub fn partial_derivative_sign(&self, wrt: Axis, px: f64, py: f64) -> Result<Sign, Error> {
        let x = self.scale.to_real(Axis::X, px);
        let y = self.scale.to_real(Axis::Y, py);
        let insufficient = || Error::InsufficientPrecision { x, y };
        let xr = Rational::try_from(x).map_err(|_| insufficient())?;
        let yr = Rational::try_from(y).map_err(|_| insufficient())?;
        let curve = self.bank.curve()?;
        let partial = match wrt {
            Axis::X => &curve.rational_fx,
            Axis::Y => &curve.rational_fy,
        };
        Ok(Sign::of_exact(&partial.eval(&yr, &xr)))
    }
}
