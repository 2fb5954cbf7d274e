//! Raster primitives over RGBA images.
//!
//! Fills blend source-over; strokes overwrite. No antialiasing.

use image::{Rgba as Pixel, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect as PixelRect;
use roiscope_core::{Point, Rgba};

use crate::transform::ViewTransform;
use crate::{Error, Result};

/// Convert f64 to f32 with allowed precision loss.
#[allow(clippy::cast_possible_truncation)]
fn f64_to_f32(value: f64) -> f32 {
    value as f32
}

/// Clamp an f64 into an i64 pixel index.
#[allow(clippy::cast_possible_truncation)]
fn f64_to_i64(value: f64) -> i64 {
    value.clamp(-1e15, 1e15) as i64
}

/// Allocates a transparent canvas, failing instead of aborting when the
/// memory is not available.
pub fn try_canvas(width: u32, height: u32) -> Result<RgbaImage> {
    let alloc_error = || Error::BufferAllocation { width, height };
    let len = u64::from(width)
        .checked_mul(u64::from(height))
        .and_then(|n| n.checked_mul(4))
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(alloc_error)?;
    let mut data: Vec<u8> = Vec::new();
    data.try_reserve_exact(len).map_err(|_| alloc_error())?;
    data.resize(len, 0);
    RgbaImage::from_raw(width, height, data).ok_or_else(alloc_error)
}

#[inline]
pub fn to_pixel(color: Rgba) -> Pixel<u8> {
    Pixel(color.to_array())
}

/// Source-over blend of a straight-alpha color onto `dst`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn blend_pixel(dst: &mut Pixel<u8>, src: Rgba) {
    match src.a {
        0 => {}
        255 => *dst = to_pixel(src),
        _ => {
            let sa = f32::from(src.a) / 255.0;
            let da = f32::from(dst.0[3]) / 255.0;
            let out_a = sa + da * (1.0 - sa);
            let mix = |s: u8, d: u8| {
                let v = (f32::from(s) * sa + f32::from(d) * da * (1.0 - sa)) / out_a;
                v.round().clamp(0.0, 255.0) as u8
            };
            *dst = Pixel([
                mix(src.r, dst.0[0]),
                mix(src.g, dst.0[1]),
                mix(src.b, dst.0[2]),
                (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
            ]);
        }
    }
}

/// Sets every pixel to transparent.
pub fn clear(canvas: &mut RgbaImage) {
    for pixel in canvas.pixels_mut() {
        *pixel = Pixel([0, 0, 0, 0]);
    }
}

/// Even-odd scanline fill of one or more rings in canvas coordinates.
///
/// A pixel is filled when its center lies inside. Returns `false` (drawing
/// nothing) if any vertex is not finite.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn fill_rings(canvas: &mut RgbaImage, rings: &[Vec<Point>], color: Rgba) -> bool {
    let all_finite = rings
        .iter()
        .flatten()
        .all(|p| p.x.is_finite() && p.y.is_finite());
    if !all_finite {
        return false;
    }
    if color.is_transparent() {
        return true;
    }
    let (width, height) = canvas.dimensions();
    let (min_y, max_y) = rings
        .iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.y), hi.max(p.y))
        });
    if !min_y.is_finite() {
        return true;
    }
    let first_row = f64_to_i64((min_y - 0.5).ceil()).max(0);
    let last_row = f64_to_i64((max_y - 0.5).floor()).min(i64::from(height) - 1);

    let mut crossings: Vec<f64> = Vec::new();
    for row in first_row..=last_row {
        #[allow(clippy::cast_precision_loss)]
        let yc = row as f64 + 0.5;
        crossings.clear();
        for ring in rings {
            let n = ring.len();
            for i in 0..n {
                let a = ring[i];
                let b = ring[(i + 1) % n];
                if (a.y <= yc) != (b.y <= yc) {
                    crossings.push(a.x + (yc - a.y) * (b.x - a.x) / (b.y - a.y));
                }
            }
        }
        crossings.sort_by(f64::total_cmp);
        for pair in crossings.chunks_exact(2) {
            let start = f64_to_i64((pair[0] - 0.5).ceil()).max(0);
            let end = f64_to_i64((pair[1] - 0.5).ceil()).min(i64::from(width));
            for x in start..end {
                blend_pixel(canvas.get_pixel_mut(x as u32, row as u32), color);
            }
        }
    }
    true
}

/// Liang-Barsky clip of segment `a-b` to `[x0, x1] x [y0, y1]`.
fn clip_segment(a: Point, b: Point, x0: f64, y0: f64, x1: f64, y1: f64) -> Option<(Point, Point)> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    for (p, q) in [
        (-dx, a.x - x0),
        (dx, x1 - a.x),
        (-dy, a.y - y0),
        (dy, y1 - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
            if t0 > t1 {
                return None;
            }
        }
    }
    Some((
        Point::new(a.x + t0 * dx, a.y + t0 * dy),
        Point::new(a.x + t1 * dx, a.y + t1 * dy),
    ))
}

/// Strokes a polyline, optionally closed, `width` pixels wide.
///
/// Returns the number of segments drawn; non-finite and off-canvas
/// segments are skipped.
pub fn stroke_polyline(
    canvas: &mut RgbaImage,
    points: &[Point],
    closed: bool,
    color: Rgba,
    width: f32,
) -> usize {
    let n = points.len();
    if n < 2 {
        return 0;
    }
    let pixel = to_pixel(color);
    let passes = width.round().max(1.0);
    let half = f64::from(passes - 1.0) / 2.0;
    let pad = f64::from(passes) + 1.0;
    let (w, h) = canvas.dimensions();
    let (x0, y0, x1, y1) = (-pad, -pad, f64::from(w) + pad, f64::from(h) + pad);

    let segment_count = if closed { n } else { n - 1 };
    let mut drawn = 0;
    for i in 0..segment_count {
        let a = points[i];
        let b = points[(i + 1) % n];
        if !(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite()) {
            continue;
        }
        let Some((a, b)) = clip_segment(a, b, x0, y0, x1, y1) else {
            continue;
        };
        let len = a.distance(&b);
        let (nx, ny) = if len > 0.0 {
            (-(b.y - a.y) / len, (b.x - a.x) / len)
        } else {
            (0.0, 0.0)
        };
        let mut k = 0.0;
        while k < f64::from(passes) {
            let o = k - half;
            draw_line_segment_mut(
                canvas,
                (f64_to_f32(a.x + nx * o), f64_to_f32(a.y + ny * o)),
                (f64_to_f32(b.x + nx * o), f64_to_f32(b.y + ny * o)),
                pixel,
            );
            k += 1.0;
        }
        drawn += 1;
    }
    drawn
}

/// Outline of an integer rectangle, `width` pixels centered on the edge.
pub fn stroke_rect(canvas: &mut RgbaImage, x: i32, y: i32, w: i32, h: i32, color: Rgba, width: u32) {
    let pixel = to_pixel(color);
    let (cw, ch) = (i64::from(canvas.width()), i64::from(canvas.height()));
    let passes = i64::from(width.max(1));
    for k in 0..passes {
        let inset = k - (passes - 1) / 2;
        let left = i64::from(x) + inset;
        let top = i64::from(y) + inset;
        let right = i64::from(x) + i64::from(w) - inset;
        let bottom = i64::from(y) + i64::from(h) - inset;
        if right <= left || bottom <= top {
            continue;
        }
        if right <= 0 || bottom <= 0 || left >= cw || top >= ch {
            continue;
        }
        // Edges past the canvas are pulled in to one pixel outside it.
        let left = left.max(-1);
        let top = top.max(-1);
        let right = right.min(cw + 1);
        let bottom = bottom.min(ch + 1);
        let (Ok(px), Ok(py), Ok(pw), Ok(ph)) = (
            i32::try_from(left),
            i32::try_from(top),
            u32::try_from(right - left),
            u32::try_from(bottom - top),
        ) else {
            continue;
        };
        draw_hollow_rect_mut(canvas, PixelRect::at(px, py).of_size(pw, ph), pixel);
    }
}

/// Fills an axis-aligned rectangle given in canvas coordinates.
pub fn fill_rect(canvas: &mut RgbaImage, corners: [Point; 4], color: Rgba) -> bool {
    fill_rings(canvas, &[corners.to_vec()], color)
}

/// Copies the image area of `src` onto `dst` through `transform`.
///
/// `src` holds the image at `(origin, origin)` with size `image_size`;
/// each destination pixel samples the nearest source pixel and blends.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn blit(
    dst: &mut RgbaImage,
    src: &RgbaImage,
    origin: u32,
    image_size: (u32, u32),
    transform: &ViewTransform,
) -> usize {
    let (img_w, img_h) = image_size;
    let (dst_w, dst_h) = dst.dimensions();
    let a = transform.to_screen(Point::new(0.0, 0.0));
    let b = transform.to_screen(Point::new(f64::from(img_w), f64::from(img_h)));
    let x_start = f64_to_i64(a.x.min(b.x).floor()).max(0);
    let x_end = f64_to_i64(a.x.max(b.x).ceil()).min(i64::from(dst_w));
    let y_start = f64_to_i64(a.y.min(b.y).floor()).max(0);
    let y_end = f64_to_i64(a.y.max(b.y).ceil()).min(i64::from(dst_h));

    let mut copied = 0;
    for y in y_start..y_end {
        for x in x_start..x_end {
            #[allow(clippy::cast_precision_loss)]
            let center = Point::new(x as f64 + 0.5, y as f64 + 0.5);
            let p = transform.to_image_exact(center);
            let (sx, sy) = (p.x.floor(), p.y.floor());
            if sx < 0.0 || sy < 0.0 || sx >= f64::from(img_w) || sy >= f64::from(img_h) {
                continue;
            }
            let source = src.get_pixel(sx as u32 + origin, sy as u32 + origin);
            if source.0[3] == 0 {
                continue;
            }
            blend_pixel(dst.get_pixel_mut(x as u32, y as u32), Rgba::from(source.0));
            copied += 1;
        }
    }
    copied
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corners(x: f64, y: f64, w: f64, h: f64) -> Vec<Point> {
        vec![
            Point::new(x, y),
            Point::new(x + w, y),
            Point::new(x + w, y + h),
            Point::new(x, y + h),
        ]
    }

    fn filled(canvas: &RgbaImage) -> usize {
        canvas.pixels().filter(|p| p.0[3] > 0).count()
    }

    #[test]
    fn test_fill_counts_pixel_centers() {
        let mut canvas = RgbaImage::new(20, 20);
        assert!(fill_rings(&mut canvas, &[corners(2.0, 3.0, 5.0, 4.0)], Rgba::RED));
        assert_eq!(filled(&canvas), 20);
        assert_eq!(canvas.get_pixel(2, 3).0, [255, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(7, 3).0[3], 0);
    }

    #[test]
    fn test_fill_even_odd_hole() {
        let mut canvas = RgbaImage::new(20, 20);
        let rings = [corners(0.0, 0.0, 10.0, 10.0), corners(3.0, 3.0, 4.0, 4.0)];
        fill_rings(&mut canvas, &rings, Rgba::BLUE);
        assert_eq!(filled(&canvas), 100 - 16);
        assert_eq!(canvas.get_pixel(5, 5).0[3], 0);
    }

    #[test]
    fn test_fill_rejects_non_finite() {
        let mut canvas = RgbaImage::new(4, 4);
        let ring = vec![Point::new(0.0, 0.0), Point::new(f64::NAN, 1.0), Point::new(1.0, 1.0)];
        assert!(!fill_rings(&mut canvas, &[ring], Rgba::RED));
        assert_eq!(filled(&canvas), 0);
    }

    #[test]
    fn test_blend_half_alpha_over_opaque() {
        let mut px = Pixel([0, 0, 255, 255]);
        blend_pixel(&mut px, Rgba::new(255, 0, 0, 128));
        assert_eq!(px.0[3], 255);
        assert!(px.0[0] > 120 && px.0[0] < 135);
        assert!(px.0[2] > 120 && px.0[2] < 135);
    }

    #[test]
    fn test_stroke_far_offscreen_is_clipped() {
        let mut canvas = RgbaImage::new(10, 10);
        let pts = [Point::new(-1e12, 5.0), Point::new(1e12, 5.0)];
        assert_eq!(stroke_polyline(&mut canvas, &pts, false, Rgba::GREEN, 1.0), 1);
        assert_eq!(canvas.get_pixel(5, 5).0, [0, 255, 0, 255]);
    }

    #[test]
    fn test_stroke_rect_width() {
        let mut canvas = RgbaImage::new(30, 30);
        stroke_rect(&mut canvas, 5, 5, 10, 10, Rgba::YELLOW, 2);
        assert_eq!(canvas.get_pixel(5, 5).0[3], 255);
        assert_eq!(canvas.get_pixel(6, 6).0[3], 255);
        assert_eq!(canvas.get_pixel(10, 10).0[3], 0);
        // degenerate rect draws nothing and does not panic
        stroke_rect(&mut canvas, 0, 0, 0, 5, Rgba::YELLOW, 1);
    }

    #[test]
    fn test_try_canvas() {
        let canvas = try_canvas(7, 3).unwrap();
        assert_eq!(canvas.dimensions(), (7, 3));
        assert!(canvas.pixels().all(|p| p.0 == [0, 0, 0, 0]));
        assert!(matches!(
            try_canvas(u32::MAX, u32::MAX),
            Err(Error::BufferAllocation { width: u32::MAX, .. })
        ));
    }

    #[test]
    fn test_stroke_rect_extreme_coordinates() {
        let mut canvas = RgbaImage::new(20, 20);
        stroke_rect(&mut canvas, i32::MAX - 5, i32::MAX - 5, i32::MAX, i32::MAX, Rgba::RED, 3);
        stroke_rect(&mut canvas, i32::MIN, i32::MIN, 10, 10, Rgba::RED, 3);
        assert!(canvas.pixels().all(|p| p.0[3] == 0));

        // a huge rectangle around the canvas leaves it untouched
        stroke_rect(&mut canvas, i32::MIN, i32::MIN, i32::MAX, i32::MAX, Rgba::RED, 1);
        assert!(canvas.pixels().all(|p| p.0[3] == 0));

        // edges that cross the canvas are still drawn after clipping
        stroke_rect(&mut canvas, -1000, 5, i32::MAX, 10, Rgba::RED, 1);
        assert_eq!(canvas.get_pixel(0, 5).0[3], 255);
        assert_eq!(canvas.get_pixel(19, 14).0[3], 255);
        assert_eq!(canvas.get_pixel(10, 10).0[3], 0);
    }

    #[test]
    fn test_blit_scales_image_area() {
        let margin = 2;
        let mut src = RgbaImage::new(4 + 2 * margin, 4 + 2 * margin);
        src.put_pixel(margin, margin, Pixel([255, 0, 0, 255]));
        // pixel in the margin must never be copied
        src.put_pixel(0, 0, Pixel([0, 255, 0, 255]));
        let mut dst = RgbaImage::new(20, 20);
        let t = ViewTransform::new(2.0, 2.0, 3.0, 3.0).unwrap();
        let copied = blit(&mut dst, &src, margin, (4, 4), &t);
        assert_eq!(copied, 4);
        assert_eq!(dst.get_pixel(3, 3).0, [255, 0, 0, 255]);
        assert_eq!(dst.get_pixel(4, 4).0, [255, 0, 0, 255]);
        assert_eq!(dst.get_pixel(5, 5).0[3], 0);
        assert_eq!(dst.get_pixel(1, 1).0[3], 0);
    }
}
