//! Utilities for fuzz and/or property testing using `arbitrary`.
//!
//! Besides the generators, this module has a couple of self-checking test
//! bodies that are shared between the unit tests (driven by `arbtest`) and
//! the fuzz targets.

use arbitrary::Unstructured;
use kurbo::Rect;

use crate::{
    Axis, Bank, BankView, EngineConfig, PixelScale, Polynomial2, QueryKind, Rational, Sign,
};

/// Generate an arbitrary float in some range.
pub fn float_in_range(
    start: f64,
    end: f64,
    u: &mut Unstructured<'_>,
) -> Result<f64, arbitrary::Error> {
    let num: u32 = u.arbitrary()?;
    let t = num as f64 / u32::MAX as f64;
    Ok((1.0 - t) * start + t * end)
}

/// The deepest subdivision level that the generators produce.
pub const MAX_DEPTH: u32 = 20;

/// Generate a pixel-relative coordinate in `0..=res`, biased towards
/// coordinates that the rasterizer actually produces (halves, quarters and
/// so on of a pixel).
pub fn pixel_coordinate(res: u32, u: &mut Unstructured<'_>) -> Result<f64, arbitrary::Error> {
    let dyadic: bool = u.arbitrary()?;
    if dyadic {
        let depth: u32 = u.int_in_range(0..=MAX_DEPTH)?;
        let steps = res << depth;
        let i: u32 = u.int_in_range(0..=steps)?;
        Ok(i as f64 / (1u32 << depth) as f64)
    } else {
        float_in_range(0.0, res as f64, u)
    }
}

// Multiplies two dense polynomials in "y-outer" layout.
fn mul_rows(a: &[Vec<i64>], b: &[Vec<i64>]) -> Vec<Vec<i64>> {
    let width = a[0].len() + b[0].len() - 1;
    let mut ret = vec![vec![0i64; width]; a.len() + b.len() - 1];
    for (j1, row1) in a.iter().enumerate() {
        for (j2, row2) in b.iter().enumerate() {
            for (i1, c1) in row1.iter().enumerate() {
                for (i2, c2) in row2.iter().enumerate() {
                    ret[j1 + j2][i1 + i2] += c1 * c2;
                }
            }
        }
    }
    ret
}

// A small polynomial of total degree at most 2: a line, or a conic.
fn factor(u: &mut Unstructured<'_>) -> Result<Vec<Vec<i64>>, arbitrary::Error> {
    let conic: bool = u.arbitrary()?;
    let mut c = || u.int_in_range(-4i64..=4);
    if conic {
        let (c00, c10, c20, c01, c11, c02) = (c()?, c()?, c()?, c()?, c()?, c()?);
        Ok(vec![vec![c00, c10, c20], vec![c01, c11, 0], vec![c02, 0, 0]])
    } else {
        let (c00, c10, c01) = (c()?, c()?, c()?);
        Ok(vec![vec![c00, c10], vec![c01, 0]])
    }
}

/// Generate an arbitrary bivariate polynomial.
///
/// Half the time, the polynomial is a product of lines and conics (possibly
/// repeated), which makes for lots of singular points and tangencies. The
/// coefficients start out as small integers; half the time, each one is then
/// scaled by a float that usually isn't a power of two.
pub fn polynomial(u: &mut Unstructured<'_>) -> Result<Polynomial2<f64>, arbitrary::Error> {
    let factored: bool = u.arbitrary()?;
    let rows = if factored {
        let mut rows = factor(u)?;
        for _ in 0..u.int_in_range(0..=2)? {
            let repeat: bool = u.arbitrary()?;
            let f = if repeat { rows.clone() } else { factor(u)? };
            rows = mul_rows(&rows, &f);
            if rows.len() > 5 {
                break;
            }
        }
        rows
    } else {
        let deg_x = u.int_in_range(0..=5)?;
        let deg_y = u.int_in_range(0..=5)?;
        (0..=deg_y)
            .map(|_| {
                (0..=deg_x)
                    .map(|_| u.int_in_range(-16i64..=16))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?
    };
    let scaled: bool = u.arbitrary()?;
    let rows = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|c| {
                    let s = if scaled {
                        float_in_range(0.5, 2.0, u)?
                    } else {
                        1.0
                    };
                    Ok(c as f64 * s)
                })
                .collect::<Result<Vec<_>, arbitrary::Error>>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Polynomial2::from_rows(rows))
}

/// Generate a drawing window around the origin, of moderate size.
pub fn window(u: &mut Unstructured<'_>) -> Result<Rect, arbitrary::Error> {
    let x0 = float_in_range(-4.0, 0.0, u)?;
    let y0 = float_in_range(-4.0, 0.0, u)?;
    let w = float_in_range(0.01, 8.0, u)?;
    let h = float_in_range(0.01, 8.0, u)?;
    Ok(Rect::new(x0, y0, x0 + w, y0 + h))
}

/// A range query: an interval along some axis, at a fixed key.
#[derive(Clone, Copy, Debug)]
pub struct RangeQuery {
    /// The axis along which the interval lies.
    pub axis: Axis,
    /// One end of the interval, pixel-relative.
    pub lower: f64,
    /// The other end of the interval, pixel-relative.
    pub upper: f64,
    /// The pixel-relative coordinate across the axis.
    pub key: f64,
    /// The kind of query.
    pub kind: QueryKind,
}

/// Generate a range query on a window with `res` pixels in each direction.
///
/// Half the time the interval is a single cell at some subdivision level,
/// like the ones a rasterizer checks.
pub fn range_query(res: u32, u: &mut Unstructured<'_>) -> Result<RangeQuery, arbitrary::Error> {
    let axis = if u.arbitrary()? { Axis::X } else { Axis::Y };
    let kind = *u.choose(&[
        QueryKind::Crossing,
        QueryKind::Enclosure,
        QueryKind::FirstDerivative,
    ])?;
    let lower = pixel_coordinate(res, u)?;
    let upper = if u.arbitrary()? {
        pixel_coordinate(res, u)?
    } else {
        let depth: u32 = u.int_in_range(0..=MAX_DEPTH)?;
        (lower + 1.0 / (1u32 << depth) as f64).min(res as f64)
    };
    Ok(RangeQuery {
        axis,
        lower,
        upper,
        key: pixel_coordinate(res, u)?,
        kind,
    })
}

fn exact(x: f64) -> Rational {
    // unwrap: all of our coordinates are finite.
    Rational::try_from(x).unwrap()
}

/// Checks that neither range algorithm misses a sign change that shows up
/// when densely sampling the exact polynomial.
pub fn range_soundness(u: &mut Unstructured<'_>) -> Result<(), arbitrary::Error> {
    let res = u.int_in_range(5..=64)?;
    let Ok(scale) = PixelScale::new(window(u)?, res, res, 5..=1024) else {
        return Ok(());
    };
    let poly = polynomial(u)?;
    let q = range_query(res, u)?;
    let config = EngineConfig::default();
    let mut bank = Bank::new(&config);
    // unwrap: finite coefficients are always accepted.
    bank.precompute(&poly, &config).unwrap();
    let mut view = BankView::new(&scale, &mut bank, &config);
    let uni = view.precached_poly(q.axis, q.key, 0).unwrap();

    let qf = view
        .range_qf(q.axis, q.lower, q.upper, q.key, &uni, q.kind)
        .unwrap();
    let maa = view
        .range_maa(q.axis, q.lower, q.upper, q.key, &uni, q.kind)
        .unwrap();

    let l = exact(scale.to_real(q.axis, q.lower));
    let r = exact(scale.to_real(q.axis, q.upper));
    let key = exact(scale.to_real(q.axis.flip(), q.key));
    // y-outer, like the input.
    let dense = poly.to_exact().unwrap();
    const SAMPLES: u32 = 1000;
    let step = (&r - &l) / Rational::from(SAMPLES);
    let signs: Vec<Sign> = (0..=SAMPLES)
        .map(|i| {
            let t = &l + &step * Rational::from(i);
            let v = match q.axis {
                Axis::X => dense.eval(&key, &t),
                Axis::Y => dense.eval(&t, &key),
            };
            Sign::of_exact(&v)
        })
        .collect();
    let changes = signs.contains(&Sign::Positive) && signs.contains(&Sign::Negative);
    if changes {
        assert!(qf.crossing, "QF missed a crossing: {q:?} on {poly:?}");
        assert!(maa.crossing, "MAA missed a crossing: {q:?} on {poly:?}");
    }
    Ok(())
}

/// Checks that the sign resolver always agrees with exact evaluation, and
/// that caching doesn't change anything.
pub fn sign_resolution(u: &mut Unstructured<'_>) -> Result<(), arbitrary::Error> {
    let res = u.int_in_range(5..=64)?;
    let Ok(scale) = PixelScale::new(window(u)?, res, res, 5..=1024) else {
        return Ok(());
    };
    let poly = polynomial(u)?;
    let config = EngineConfig {
        modular_enabled: u.arbitrary()?,
        ..EngineConfig::default()
    };
    let mut bank = Bank::new(&config);
    bank.precompute(&poly, &config).unwrap();
    let mut view = BankView::new(&scale, &mut bank, &config);

    for _ in 0..u.int_in_range(1..=8)? {
        let axis = if u.arbitrary()? { Axis::X } else { Axis::Y };
        let coord = pixel_coordinate(res, u)?;
        let key = pixel_coordinate(res, u)?;
        let uni = view.precached_poly(axis, key, 0).unwrap();
        let sign = view.evaluate_generic(axis, coord, key, &uni).unwrap();
        let again = view.evaluate_generic(axis, coord, key, &uni).unwrap();

        let (x, y) = scale.real_point(axis, coord, key);
        let want = Sign::of_exact(&poly.eval_exact(&exact(x), &exact(y)).unwrap());
        assert_eq!(sign, want, "wrong sign at ({x}, {y}) for {poly:?}");
        assert_eq!(sign, again);
    }
    Ok(())
}
