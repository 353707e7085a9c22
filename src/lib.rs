#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

#[cfg(any(test, feature = "arbitrary"))]
pub mod arbitrary;
pub mod backend;
mod bank;
mod config;
mod derivative;
mod engine;
pub mod lru;
mod num;
pub mod poly;
pub mod range;
mod scale;

pub use bank::{Bank, BankView};
pub use config::EngineConfig;
pub use derivative::DerivativeTable;
pub use engine::Engine;
pub use num::{CheapOrderedFloat, Coefficient, Sign};
pub use poly::{Polynomial2, UnivariatePoly};
pub use range::{QueryKind, RangeOutcome};
pub use scale::{PixelScale, SetupError};

/// Re-exported so that callers can build exact coefficients without naming `malachite`.
pub use malachite::Rational;

/// The direction along which a univariate polynomial varies.
///
/// A polynomial "in the `X` range" is what you get by fixing `y` and letting
/// `x` vary; it's the one you need for checking a horizontal pixel edge.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Axis {
    /// `y` is fixed, `x` varies.
    X,
    /// `x` is fixed, `y` varies.
    Y,
}

impl Axis {
    /// The other axis.
    pub fn flip(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }
}

/// Things that can go wrong after a successful setup.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// The drawing window has not been set up yet.
    #[error("the drawing window has not been set up")]
    NoSetup,
    /// The active bank has no precomputed polynomial.
    #[error("no polynomial has been precomputed for this bank")]
    NoPolynomial,
    /// There is no bank with this index.
    #[error("bank {index} does not exist (there are {count} banks)")]
    BankOutOfRange {
        /// The requested bank.
        index: usize,
        /// The number of banks in the engine.
        count: usize,
    },
    /// One of the input coefficients was infinite or NaN.
    #[error("the input polynomial has a non-finite coefficient")]
    NonFiniteCoefficient,
    /// The univariate polynomial doesn't match the derivative table of the active bank.
    #[error("expected a polynomial with {expected} coefficients, got {actual}")]
    DegreeMismatch {
        /// The number of coefficients in the bank's orientation.
        expected: usize,
        /// The number of coefficients we were given.
        actual: usize,
    },
    /// None of the numeric backends could decide a sign.
    ///
    /// This happens only when even exact evaluation is impossible, for example
    /// because a coordinate isn't finite. Callers should abort or re-subdivide;
    /// the sign is never guessed.
    #[error("insufficient precision to determine the sign at ({x}, {y})")]
    InsufficientPrecision {
        /// The horizontal coordinate of the failed evaluation.
        x: f64,
        /// The vertical coordinate of the failed evaluation.
        y: f64,
    },
}
