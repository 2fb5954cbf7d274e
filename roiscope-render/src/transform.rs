//! Image space ↔ screen space mapping.

use roiscope_core::Point;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Pan/zoom state supplied by the viewer: `screen = image * scale + offset`.
///
/// X and Y scale independently.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ViewTransform {
    scale_x: f64,
    scale_y: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewTransform {
    pub const IDENTITY: Self = Self {
        scale_x: 1.0,
        scale_y: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    /// Creates a transform.
    ///
    /// # Errors
    /// [`Error::InvalidTransform`] for non-finite values or a zero scale.
    pub fn new(scale_x: f64, scale_y: f64, offset_x: f64, offset_y: f64) -> Result<Self> {
        let all_finite = [scale_x, scale_y, offset_x, offset_y]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(Error::InvalidTransform(format!(
                "non-finite component in scale ({scale_x}, {scale_y}) offset ({offset_x}, {offset_y})"
            )));
        }
        if scale_x == 0.0 || scale_y == 0.0 {
            return Err(Error::InvalidTransform(format!(
                "zero scale ({scale_x}, {scale_y})"
            )));
        }
        Ok(Self {
            scale_x,
            scale_y,
            offset_x,
            offset_y,
        })
    }

    /// Pure translation.
    pub const fn translation(offset_x: f64, offset_y: f64) -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            offset_x,
            offset_y,
        }
    }

    pub fn scale(&self) -> (f64, f64) {
        (self.scale_x, self.scale_y)
    }

    pub fn offset(&self) -> (f64, f64) {
        (self.offset_x, self.offset_y)
    }

    /// Same scale, offset shifted by `(dx, dy)` screen pixels.
    #[must_use]
    pub fn panned(&self, dx: f64, dy: f64) -> Self {
        Self {
            offset_x: self.offset_x + dx,
            offset_y: self.offset_y + dy,
            ..*self
        }
    }

    /// Image point to screen.
    #[inline]
    pub fn to_screen(&self, p: Point) -> Point {
        Point::new(
            p.x * self.scale_x + self.offset_x,
            p.y * self.scale_y + self.offset_y,
        )
    }

    /// Point in a shape's local frame to screen.
    ///
    /// Translates by `base` first, then scales, then offsets.
    #[inline]
    pub fn to_screen_with_base(&self, base: Point, local: Point) -> Point {
        self.to_screen(Point::new(local.x + base.x, local.y + base.y))
    }

    /// Screen point to image space without rounding.
    #[inline]
    pub fn to_image_exact(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.offset_x) / self.scale_x,
            (p.y - self.offset_y) / self.scale_y,
        )
    }

    /// Screen point to the nearest image pixel.
    ///
    /// `None` when the result does not fit an `i32`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_image(&self, p: Point) -> Option<(i32, i32)> {
        let exact = self.to_image_exact(p);
        let x = exact.x.round();
        let y = exact.y.round();
        let range = f64::from(i32::MIN)..=f64::from(i32::MAX);
        (range.contains(&x) && range.contains(&y)).then(|| (x as i32, y as i32))
    }

    /// Size in screen pixels of an image of the given size.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn display_size(&self, width: u32, height: u32) -> (u32, u32) {
        let w = (f64::from(width) * self.scale_x.abs()).ceil();
        let h = (f64::from(height) * self.scale_y.abs()).ceil();
        (
            w.clamp(0.0, f64::from(u32::MAX)) as u32,
            h.clamp(0.0, f64::from(u32::MAX)) as u32,
        )
    }
}
