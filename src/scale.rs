//! The mapping between pixel-relative coordinates and the drawing window.

use std::ops::RangeInclusive;

use kurbo::Rect;
use malachite::Rational;

use crate::num::to_f64;
use crate::Axis;

/// The drawing window was rejected.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SetupError {
    /// One of the window's coordinates was infinite or NaN.
    #[error("the drawing window has a non-finite coordinate")]
    NonFinite,
    /// The window has zero or negative width or height.
    #[error("the drawing window is empty: [{x0}, {x1}] x [{y0}, {y1}]")]
    Empty {
        /// Left boundary.
        x0: f64,
        /// Right boundary.
        x1: f64,
        /// Bottom boundary.
        y0: f64,
        /// Top boundary.
        y1: f64,
    },
    /// The pixel resolution is outside the supported range.
    #[error("resolution {width}x{height} is outside the supported range {min}..={max}")]
    Resolution {
        /// Requested horizontal resolution.
        width: u32,
        /// Requested vertical resolution.
        height: u32,
        /// Smallest supported resolution.
        min: u32,
        /// Largest supported resolution.
        max: u32,
    },
}

/// The drawing window and its pixel size, in both fast and exact arithmetic.
///
/// Pixel-relative coordinates (as used by the rasterizer, which subdivides
/// pixels into halves, quarters and so on) are mapped to the real plane by
/// `min + c * pixel_size`. The float pixel size is rounded once from the
/// exact quotient, and then the exact pixel size is *replaced* by the float
/// one, so that the two representations agree exactly.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelScale {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    pixel_w: f64,
    pixel_h: f64,
    x_min_r: Rational,
    y_min_r: Rational,
    pixel_w_r: Rational,
    pixel_h_r: Rational,
    res_w: u32,
    res_h: u32,
}

impl PixelScale {
    /// Validates the window and resolution, and computes the pixel size.
    pub fn new(
        window: Rect,
        res_w: u32,
        res_h: u32,
        resolution: RangeInclusive<u32>,
    ) -> Result<PixelScale, SetupError> {
        let Rect { x0, y0, x1, y1 } = window;
        if ![x0, y0, x1, y1].iter().all(|c| c.is_finite()) {
            return Err(SetupError::NonFinite);
        }
        if x0 >= x1 || y0 >= y1 {
            return Err(SetupError::Empty { x0, x1, y0, y1 });
        }
        if !resolution.contains(&res_w) || !resolution.contains(&res_h) {
            return Err(SetupError::Resolution {
                width: res_w,
                height: res_h,
                min: *resolution.start(),
                max: *resolution.end(),
            });
        }

        // unwrap: we checked that everything is finite.
        let exact = |c: f64| Rational::try_from(c).unwrap();
        let x_min_r = exact(x0);
        let y_min_r = exact(y0);
        let pixel_w = to_f64(&((exact(x1) - &x_min_r) / Rational::from(res_w)));
        let pixel_h = to_f64(&((exact(y1) - &y_min_r) / Rational::from(res_h)));

        Ok(PixelScale {
            x_min: x0,
            x_max: x1,
            y_min: y0,
            y_max: y1,
            pixel_w,
            pixel_h,
            x_min_r,
            y_min_r,
            // The rounded sizes are the ones we compute with.
            pixel_w_r: exact(pixel_w),
            pixel_h_r: exact(pixel_h),
            res_w,
            res_h,
        })
    }

    /// The drawing window.
    pub fn window(&self) -> Rect {
        Rect::new(self.x_min, self.y_min, self.x_max, self.y_max)
    }

    /// The horizontal and vertical resolution, in pixels.
    pub fn resolution(&self) -> (u32, u32) {
        (self.res_w, self.res_h)
    }

    /// The size of a pixel along `axis`.
    pub fn pixel_size(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.pixel_w,
            Axis::Y => self.pixel_h,
        }
    }

    /// The exact size of a pixel along `axis`; always equal to [`PixelScale::pixel_size`].
    pub fn pixel_size_exact(&self, axis: Axis) -> &Rational {
        match axis {
            Axis::X => &self.pixel_w_r,
            Axis::Y => &self.pixel_h_r,
        }
    }

    /// The lower boundary of the window along `axis`, exactly.
    pub fn min_exact(&self, axis: Axis) -> &Rational {
        match axis {
            Axis::X => &self.x_min_r,
            Axis::Y => &self.y_min_r,
        }
    }

    /// Maps a pixel-relative coordinate along `axis` to the real plane.
    pub fn to_real(&self, axis: Axis, c: f64) -> f64 {
        match axis {
            Axis::X => self.x_min + c * self.pixel_w,
            Axis::Y => self.y_min + c * self.pixel_h,
        }
    }

    /// The real point `(x, y)` for a coordinate `coord` along `axis` and a
    /// coordinate `key` along the other axis.
    pub fn real_point(&self, axis: Axis, coord: f64, key: f64) -> (f64, f64) {
        let along = self.to_real(axis, coord);
        let across = self.to_real(axis.flip(), key);
        match axis {
            Axis::X => (along, across),
            Axis::Y => (across, along),
        }
    }
}
