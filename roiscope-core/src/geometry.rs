//! Geometry primitives for region outlines.
//!
//! Everything here lives in image-pixel space. A [`ShapeHandle`] is the
//! outline a segmentation backend (or a freehand tool) hands over; simple
//! user-drawn primitives carry no handle and are described by their
//! bounding [`Rect`] alone.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use std::f64::consts::PI;

/// A point in image space (sub-pixel precision).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    /// X coordinate (column).
    pub x: f64,
    /// Y coordinate (row).
    pub y: f64,
}

impl Point {
    /// Creates a new point.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Point shifted by `(dx, dy)`.
    #[inline]
    #[must_use]
    pub fn translated(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// Axis-aligned integer rectangle, `x`/`y` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl Rect {
    /// Creates a new rectangle.
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge, saturating at `i32::MAX`.
    #[inline]
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge, saturating at `i32::MAX`.
    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Returns true if the rectangle covers no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Pixel area (`0` for empty rectangles).
    pub fn area(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            f64::from(self.width) * f64::from(self.height)
        }
    }

    /// Integer center, rounding toward the top-left.
    #[inline]
    pub fn center(&self) -> (i32, i32) {
        (
            self.x.saturating_add(self.width / 2),
            self.y.saturating_add(self.height / 2),
        )
    }

    /// Exact geometric center.
    pub fn center_point(&self) -> Point {
        Point::new(
            f64::from(self.x) + f64::from(self.width) / 2.0,
            f64::from(self.y) + f64::from(self.height) / 2.0,
        )
    }

    /// Half-open containment: left/top edges inside, right/bottom outside.
    pub fn contains(&self, point: Point) -> bool {
        !self.is_empty()
            && point.x >= f64::from(self.x)
            && point.y >= f64::from(self.y)
            && point.x < f64::from(self.right())
            && point.y < f64::from(self.bottom())
    }

    /// Returns true if the two rectangles share at least one pixel.
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Smallest rectangle covering both.
    #[must_use]
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, span(x, right), span(y, bottom))
    }

    /// Rectangle shifted by `(dx, dy)`.
    #[must_use]
    pub fn translated(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }

    /// Pixel-aligned bounds enclosing a set of points.
    #[allow(clippy::cast_possible_truncation)]
    pub fn enclosing(points: &[Point]) -> Option<Rect> {
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for p in points {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        if !min_x.is_finite() || !min_y.is_finite() || !max_x.is_finite() || !max_y.is_finite() {
            return None;
        }
        let x = min_x.floor() as i32;
        let y = min_y.floor() as i32;
        Some(Rect::new(
            x,
            y,
            span(x, max_x.ceil() as i32),
            span(y, max_y.ceil() as i32),
        ))
    }

    /// The four corners, clockwise from top-left.
    pub fn corners(&self) -> [Point; 4] {
        let (l, t) = (f64::from(self.x), f64::from(self.y));
        let (r, b) = (f64::from(self.right()), f64::from(self.bottom()));
        [
            Point::new(l, t),
            Point::new(r, t),
            Point::new(r, b),
            Point::new(l, b),
        ]
    }
}

/// Distance from `start` to `end`, clamped to `0..=i32::MAX`.
#[allow(clippy::cast_possible_truncation)]
fn span(start: i32, end: i32) -> i32 {
    (i64::from(end) - i64::from(start)).clamp(0, i64::from(i32::MAX)) as i32
}

/// Closed polygon outline. The closing edge is implicit.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Polygon {
    vertices: Vec<Point>,
}

impl Polygon {
    /// Creates a polygon from its vertices.
    pub fn new(vertices: Vec<Point>) -> Self {
        Self { vertices }
    }

    /// Creates a polygon from `(x, y)` pairs.
    pub fn from_coords<I>(coords: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        Self::new(coords.into_iter().map(Point::from).collect())
    }

    /// The four-corner outline of a rectangle.
    pub fn from_rect(rect: &Rect) -> Self {
        Self::new(rect.corners().to_vec())
    }

    /// Regular tessellation of the ellipse inscribed in `rect`.
    #[allow(clippy::cast_precision_loss)]
    pub fn ellipse(rect: &Rect, segments: usize) -> Self {
        let segments = segments.max(8);
        let center = rect.center_point();
        let rx = f64::from(rect.width) / 2.0;
        let ry = f64::from(rect.height) / 2.0;
        let vertices = (0..segments)
            .map(|i| {
                let theta = 2.0 * PI * i as f64 / segments as f64;
                Point::new(center.x + rx * theta.cos(), center.y + ry * theta.sin())
            })
            .collect();
        Self::new(vertices)
    }

    /// Vertex list.
    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Returns true if there are no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// A polygon needs three finite vertices to enclose anything.
    pub fn is_valid(&self) -> bool {
        self.vertices.len() >= 3
            && self
                .vertices
                .iter()
                .all(|p| p.x.is_finite() && p.y.is_finite())
    }

    /// Shoelace area, positive for counter-clockwise winding in a y-up frame.
    pub fn signed_area(&self) -> f64 {
        let n = self.vertices.len();
        if n < 3 {
            return 0.0;
        }
        let mut area2 = 0.0;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            area2 += a.x * b.y - b.x * a.y;
        }
        area2 / 2.0
    }

    /// Enclosed area.
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Outline length including the closing edge.
    pub fn perimeter(&self) -> f64 {
        let n = self.vertices.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| self.vertices[i].distance(&self.vertices[(i + 1) % n]))
            .sum()
    }

    /// Pixel-aligned bounding box.
    pub fn bounds(&self) -> Option<Rect> {
        Rect::enclosing(&self.vertices)
    }

    /// Even-odd (crossing number) containment test.
    pub fn contains(&self, point: Point) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let vi = self.vertices[i];
            let vj = self.vertices[j];
            if (vi.y > point.y) != (vj.y > point.y) {
                let x_cross = (vj.x - vi.x) * (point.y - vi.y) / (vj.y - vi.y) + vi.x;
                if point.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Polygon shifted by `(dx, dy)`.
    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64) -> Polygon {
        Polygon::new(
            self.vertices
                .iter()
                .map(|p| p.translated(dx, dy))
                .collect(),
        )
    }
}

/// Multi-ring outline expressed relative to a local origin (`base`).
///
/// The first ring is the outer boundary, any further rings are holes.
/// Absolute image coordinates are `ring vertex + base`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompositeShape {
    base: Point,
    rings: Vec<Polygon>,
}

impl CompositeShape {
    /// Creates a composite from a base offset and local rings.
    pub fn new(base: Point, rings: Vec<Polygon>) -> Self {
        Self { base, rings }
    }

    /// Local origin of the rings.
    pub fn base(&self) -> Point {
        self.base
    }

    /// Rings in local coordinates.
    pub fn rings(&self) -> &[Polygon] {
        &self.rings
    }

    /// True when the outer ring can enclose area.
    pub fn is_valid(&self) -> bool {
        self.rings.first().is_some_and(Polygon::is_valid)
            && self.base.x.is_finite()
            && self.base.y.is_finite()
    }

    /// Outer area minus hole area.
    pub fn area(&self) -> f64 {
        let Some((outer, holes)) = self.rings.split_first() else {
            return 0.0;
        };
        let holes: f64 = holes.iter().map(Polygon::area).sum();
        (outer.area() - holes).max(0.0)
    }

    /// Absolute bounds of all rings.
    pub fn bounds(&self) -> Option<Rect> {
        let mut result: Option<Rect> = None;
        for ring in &self.rings {
            let Some(local) = ring.translated(self.base.x, self.base.y).bounds() else {
                continue;
            };
            result = Some(result.map_or(local, |r| r.union(&local)));
        }
        result
    }

    /// Even-odd containment over every ring, `point` in image space.
    pub fn contains(&self, point: Point) -> bool {
        let local = point.translated(-self.base.x, -self.base.y);
        self.rings
            .iter()
            .filter(|ring| ring.contains(local))
            .count()
            % 2
            == 1
    }

    /// Outer ring in absolute coordinates.
    pub fn outer_absolute(&self) -> Option<Polygon> {
        self.rings
            .first()
            .map(|ring| ring.translated(self.base.x, self.base.y))
    }
}

/// Complex outline owned by a region.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ShapeHandle {
    /// Traced polygon in absolute image coordinates.
    Polygon(Polygon),
    /// Multi-ring shape with its own local origin.
    Composite(CompositeShape),
}

impl ShapeHandle {
    /// Absolute bounding box, `None` when the outline has no finite vertex.
    pub fn bounds(&self) -> Option<Rect> {
        match self {
            ShapeHandle::Polygon(polygon) => polygon.bounds(),
            ShapeHandle::Composite(composite) => composite.bounds(),
        }
    }

    /// Enclosed area.
    pub fn area(&self) -> f64 {
        match self {
            ShapeHandle::Polygon(polygon) => polygon.area(),
            ShapeHandle::Composite(composite) => composite.area(),
        }
    }

    /// Outline length (outer ring only for composites).
    pub fn perimeter(&self) -> f64 {
        match self {
            ShapeHandle::Polygon(polygon) => polygon.perimeter(),
            ShapeHandle::Composite(composite) => {
                composite.rings().first().map_or(0.0, Polygon::perimeter)
            }
        }
    }

    /// Containment in image space.
    pub fn contains(&self, point: Point) -> bool {
        match self {
            ShapeHandle::Polygon(polygon) => polygon.contains(point),
            ShapeHandle::Composite(composite) => composite.contains(point),
        }
    }

    /// True when the outline encloses area.
    pub fn is_valid(&self) -> bool {
        match self {
            ShapeHandle::Polygon(polygon) => polygon.is_valid(),
            ShapeHandle::Composite(composite) => composite.is_valid(),
        }
    }
}

impl From<Polygon> for ShapeHandle {
    fn from(value: Polygon) -> Self {
        ShapeHandle::Polygon(value)
    }
}

impl From<CompositeShape> for ShapeHandle {
    fn from(value: CompositeShape) -> Self {
        ShapeHandle::Composite(value)
    }
}

/// How a region's outline is specified at creation.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Primitive region, outline derived from bounds and kind.
    Bounds(Rect),
    /// Complex outline, bounds derived from the shape.
    Shape(ShapeHandle),
}

impl From<Rect> for Geometry {
    fn from(value: Rect) -> Self {
        Geometry::Bounds(value)
    }
}

impl From<ShapeHandle> for Geometry {
    fn from(value: ShapeHandle) -> Self {
        Geometry::Shape(value)
    }
}

impl From<Polygon> for Geometry {
    fn from(value: Polygon) -> Self {
        Geometry::Shape(ShapeHandle::Polygon(value))
    }
}

impl From<CompositeShape> for Geometry {
    fn from(value: CompositeShape) -> Self {
        Geometry::Shape(ShapeHandle::Composite(value))
    }
}

/// Ellipse inscribed in `rect`, containment test.
pub fn ellipse_contains(rect: &Rect, point: Point) -> bool {
    if rect.is_empty() {
        return false;
    }
    let center = rect.center_point();
    let rx = f64::from(rect.width) / 2.0;
    let ry = f64::from(rect.height) / 2.0;
    let nx = (point.x - center.x) / rx;
    let ny = (point.y - center.y) / ry;
    nx * nx + ny * ny <= 1.0
}
