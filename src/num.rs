//! A thin abstraction over the different numerical types we support.

use std::hash::Hash;

use malachite::num::arithmetic::traits::Abs;
use malachite::num::basic::traits::Zero;
use malachite::num::conversion::traits::RoundingFrom;
use malachite::rounding_modes::RoundingMode;
use malachite::{Natural, Rational};

/// A wrapper for `f64` that implements `Ord` and `Hash`, for use as a cache key.
///
/// Unlike the more principled wrappers in the `ordered_float` crate, this
/// one doesn't order NaNs, nor does it guard against them on construction.
/// The engine never produces NaN keys (the drawing window is validated), and
/// skipping the checks keeps cache lookups cheap.
///
/// Negative zero is folded into positive zero on construction, so that the
/// bitwise hash agrees with equality.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CheapOrderedFloat(f64);

impl Hash for CheapOrderedFloat {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state)
    }
}

impl CheapOrderedFloat {
    /// Retrieve the inner `f64`.
    pub fn into_inner(self) -> f64 {
        self.0
    }
}

// Now comes the fishy stuff.
impl Eq for CheapOrderedFloat {}

impl PartialOrd for CheapOrderedFloat {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CheapOrderedFloat {
    #[inline(always)]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        if self.0 < other.0 {
            std::cmp::Ordering::Less
        } else if self.0 > other.0 {
            std::cmp::Ordering::Greater
        } else {
            std::cmp::Ordering::Equal
        }
    }
}

impl From<f64> for CheapOrderedFloat {
    fn from(value: f64) -> Self {
        // -0.0 + 0.0 == +0.0
        CheapOrderedFloat(value + 0.0)
    }
}

/// The sign of a polynomial value.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum Sign {
    /// Strictly less than zero.
    Negative,
    /// Exactly zero.
    Zero,
    /// Strictly greater than zero.
    Positive,
}

impl Sign {
    /// The sign of a float.
    ///
    /// NaN is reported as `Zero`, which callers treat as "might be on the curve".
    pub fn of(x: f64) -> Sign {
        if x > 0.0 {
            Sign::Positive
        } else if x < 0.0 {
            Sign::Negative
        } else {
            Sign::Zero
        }
    }

    /// The sign of an exact rational.
    pub fn of_exact(x: &Rational) -> Sign {
        x.cmp(&Rational::ZERO).into()
    }

    /// As `-1`, `0` or `1`.
    pub fn to_i32(self) -> i32 {
        match self {
            Sign::Negative => -1,
            Sign::Zero => 0,
            Sign::Positive => 1,
        }
    }

    /// Do these two signs differ strictly, i.e. is their product negative?
    pub fn opposes(self, other: Sign) -> bool {
        self.to_i32() * other.to_i32() < 0
    }

    /// Is this `Sign::Zero`?
    pub fn is_zero(self) -> bool {
        self == Sign::Zero
    }
}

impl From<std::cmp::Ordering> for Sign {
    fn from(ord: std::cmp::Ordering) -> Self {
        match ord {
            std::cmp::Ordering::Less => Sign::Negative,
            std::cmp::Ordering::Equal => Sign::Zero,
            std::cmp::Ordering::Greater => Sign::Positive,
        }
    }
}

/// A trait for the coefficient types that we accept in input polynomials.
///
/// The only thing we need is an exact rational image; everything else
/// (floating shadows, modular images) is derived from that.
pub trait Coefficient: Clone + std::fmt::Debug {
    /// Convert this number to a rational, for exact computation.
    ///
    /// Returns `None` if the number has no rational value (infinities and NaN).
    fn to_exact(&self) -> Option<Rational>;
}

impl Coefficient for Rational {
    fn to_exact(&self) -> Option<Rational> {
        Some(self.clone())
    }
}

impl Coefficient for f64 {
    fn to_exact(&self) -> Option<Rational> {
        Rational::try_from(*self).ok()
    }
}

impl Coefficient for f32 {
    fn to_exact(&self) -> Option<Rational> {
        Rational::try_from(*self).ok()
    }
}

impl Coefficient for i64 {
    fn to_exact(&self) -> Option<Rational> {
        Some(Rational::from(*self))
    }
}

impl Coefficient for i32 {
    fn to_exact(&self) -> Option<Rational> {
        Some(Rational::from(*self))
    }
}

/// The closest `f64` to a rational.
pub(crate) fn to_f64(x: &Rational) -> f64 {
    f64::rounding_from(x, RoundingMode::Nearest).0
}

pub(crate) fn abs_exact(x: &Rational) -> Rational {
    x.clone().abs()
}

/// The unit roundoff of `f64`.
const UNIT_ROUNDOFF: f64 = f64::EPSILON / 2.0;

/// Higham's `gamma_k = k u / (1 - k u)`: the relative error bound for `k`
/// consecutive rounded operations.
pub(crate) fn gamma(k: usize) -> f64 {
    let ku = k as f64 * UNIT_ROUNDOFF;
    ku / (1.0 - ku)
}

/// The Mersenne prime `2^61 - 1`.
pub(crate) const MODULUS: u64 = (1 << 61) - 1;

/// An element of the prime field of size [`MODULUS`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ModP(u64);

impl ModP {
    pub(crate) const ZERO: ModP = ModP(0);

    pub(crate) fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub(crate) fn add(self, other: ModP) -> ModP {
        // Both are less than 2^61, so this doesn't overflow.
        let sum = self.0 + other.0;
        ModP(if sum >= MODULUS { sum - MODULUS } else { sum })
    }

    pub(crate) fn mul(self, other: ModP) -> ModP {
        ModP(((self.0 as u128 * other.0 as u128) % MODULUS as u128) as u64)
    }

    pub(crate) fn neg(self) -> ModP {
        if self.0 == 0 {
            self
        } else {
            ModP(MODULUS - self.0)
        }
    }

    fn pow(self, mut exp: u64) -> ModP {
        let mut base = self;
        let mut acc = ModP(1);
        while exp > 0 {
            if exp & 1 == 1 {
                acc = acc.mul(base);
            }
            base = base.mul(base);
            exp >>= 1;
        }
        acc
    }

    pub(crate) fn inv(self) -> Option<ModP> {
        (!self.is_zero()).then(|| self.pow(MODULUS - 2))
    }

    /// The modular image of a rational.
    ///
    /// Returns `None` if the denominator is divisible by the modulus, in which
    /// case the image doesn't exist.
    pub(crate) fn from_rational(x: &Rational) -> Option<ModP> {
        let m = Natural::from(MODULUS);
        let num = u64::try_from(&(x.numerator_ref() % &m)).ok()?;
        let den = u64::try_from(&(x.denominator_ref() % &m)).ok()?;
        let val = ModP(num).mul(ModP(den).inv()?);
        Some(if *x < Rational::ZERO { val.neg() } else { val })
    }
}
