//! Numeric backends for deciding the sign of a polynomial at a point.
//!
//! A backend either returns a sign it can vouch for, or declines. The
//! [`SignResolver`] tries a list of backends in order (fast floats, then
//! modular arithmetic, then exact rationals) and takes the first answer.

use arrayvec::ArrayVec;
use malachite::Rational;

use crate::bank::Curve;
use crate::num::{ModP, Sign};
use crate::poly::UnivariatePoly;
use crate::{Axis, EngineConfig, Error};

/// A point at which to decide the sign of the active curve's polynomial.
#[derive(Clone, Copy, Debug)]
pub struct EvalPoint<'a> {
    /// The axis along which `poly` varies.
    pub axis: Axis,
    /// The horizontal coordinate, in the real plane.
    pub x: f64,
    /// The vertical coordinate, in the real plane.
    pub y: f64,
    /// The curve's polynomial with the coordinate across `axis` already fixed,
    /// if the caller has it. Only the float backend needs it.
    pub poly: Option<&'a UnivariatePoly>,
    pub(crate) curve: &'a Curve,
}

impl EvalPoint<'_> {
    /// The coordinate along `axis`.
    pub fn along(&self) -> f64 {
        match self.axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }

    fn exact_coords(&self) -> Option<(Rational, Rational)> {
        Some((Rational::try_from(self.x).ok()?, Rational::try_from(self.y).ok()?))
    }
}

/// One way of computing a sign.
pub trait NumericBackend {
    /// A short name, for logging.
    fn name(&self) -> &'static str;

    /// The sign of the polynomial at `point`, or `None` if this backend
    /// can't be sure of it.
    fn sign(&self, point: &EvalPoint<'_>) -> Result<Option<Sign>, Error>;
}

/// Floating-point evaluation with a running error bound.
#[derive(Clone, Copy, Debug, Default)]
pub struct FloatBackend;

impl NumericBackend for FloatBackend {
    fn name(&self) -> &'static str {
        "float"
    }

    fn sign(&self, point: &EvalPoint<'_>) -> Result<Option<Sign>, Error> {
        let Some(poly) = point.poly else {
            return Ok(None);
        };
        let (val, bound) = poly.eval_with_bound(point.along());
        let reliable = val.is_finite() && bound.is_finite() && val.abs() > bound;
        Ok(reliable.then(|| Sign::of(val)))
    }
}

/// The image of a polynomial value modulo a prime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Residue {
    /// The residue vanishes; the value is very probably zero.
    Zero,
    /// The residue doesn't vanish, so the value is certainly not zero.
    NonZero,
}

/// Evaluation modulo a large prime.
///
/// This is a zero test: a non-zero residue proves that the value is non-zero
/// (but says nothing about its sign). A zero residue is only trusted as a
/// zero sign if `trust_zero` is set.
#[derive(Clone, Copy, Debug, Default)]
pub struct ModularBackend {
    /// Accept a vanishing residue as an exact zero.
    pub trust_zero: bool,
}

impl ModularBackend {
    /// The residue of the polynomial at `point`, if the modular images exist.
    pub fn residue(&self, point: &EvalPoint<'_>) -> Option<Residue> {
        let (x, y) = point.exact_coords()?;
        let (x, y) = (ModP::from_rational(&x)?, ModP::from_rational(&y)?);
        let res = match point.axis {
            Axis::X => point.curve.modular_x.as_ref()?.eval(&x, &y),
            Axis::Y => point.curve.modular_y.as_ref()?.eval(&y, &x),
        };
        Some(if res.is_zero() {
            Residue::Zero
        } else {
            Residue::NonZero
        })
    }
}

impl NumericBackend for ModularBackend {
    fn name(&self) -> &'static str {
        "modular"
    }

    fn sign(&self, point: &EvalPoint<'_>) -> Result<Option<Sign>, Error> {
        Ok(match self.residue(point) {
            Some(Residue::Zero) if self.trust_zero => Some(Sign::Zero),
            _ => None,
        })
    }
}

/// Exact evaluation with rational arithmetic. Always decisive.
#[derive(Clone, Copy, Debug, Default)]
pub struct RationalBackend;

impl RationalBackend {
    /// The exact value of the polynomial at `point`.
    pub fn value(&self, point: &EvalPoint<'_>) -> Result<Rational, Error> {
        let (x, y) = point.exact_coords().ok_or(Error::InsufficientPrecision {
            x: point.x,
            y: point.y,
        })?;
        Ok(match point.axis {
            Axis::X => point.curve.rational_x.eval(&x, &y),
            Axis::Y => point.curve.rational_y.eval(&y, &x),
        })
    }
}

impl NumericBackend for RationalBackend {
    fn name(&self) -> &'static str {
        "rational"
    }

    fn sign(&self, point: &EvalPoint<'_>) -> Result<Option<Sign>, Error> {
        Ok(Some(Sign::of_exact(&self.value(point)?)))
    }
}

/// Runs a chain of backends until one of them is sure.
#[derive(Clone, Copy, Debug)]
pub struct SignResolver {
    float: FloatBackend,
    modular: Option<ModularBackend>,
    rational: RationalBackend,
}

impl SignResolver {
    /// The chain described by `config`.
    pub fn new(config: &EngineConfig) -> Self {
        SignResolver {
            float: FloatBackend,
            modular: config.modular_enabled.then_some(ModularBackend {
                trust_zero: config.trust_modular_zero,
            }),
            rational: RationalBackend,
        }
    }

    /// The backends, in the order they're tried.
    pub fn chain(&self) -> ArrayVec<&dyn NumericBackend, 3> {
        let mut ret = ArrayVec::<&dyn NumericBackend, 3>::new();
        ret.push(&self.float);
        if let Some(m) = &self.modular {
            ret.push(m);
        }
        ret.push(&self.rational);
        ret
    }

    /// The sign at `point`, from the first backend that is sure of it.
    pub fn resolve(&self, point: &EvalPoint<'_>) -> Result<Sign, Error> {
        for backend in self.chain() {
            if let Some(sign) = backend.sign(point)? {
                return Ok(sign);
            }
            log::trace!(
                "{} evaluation at ({}, {}) was inconclusive",
                backend.name(),
                point.x,
                point.y
            );
        }
        Err(Error::InsufficientPrecision {
            x: point.x,
            y: point.y,
        })
    }
}
