//! Drawable shape resolution and the per-region shape cache.

use std::sync::Arc;

use dashmap::DashMap;
use roiscope_core::{CompositeShape, Point, Polygon, Rect, Region, RegionId, RegionKind, ShapeHandle};

use crate::transform::ViewTransform;

/// Geometry in the form the rasterizer draws.
#[derive(Debug, Clone, PartialEq)]
pub enum Drawable {
    Rect(Rect),
    /// Absolute image coordinates.
    Polygon(Polygon),
    /// Rings in a local frame at `base`, first ring outer.
    Path { base: Point, rings: Vec<Polygon> },
}

impl Drawable {
    /// Rings mapped through `transform`, each as a vertex list.
    pub fn screen_rings(&self, transform: &ViewTransform) -> Vec<Vec<Point>> {
        match self {
            Drawable::Rect(rect) => vec![rect.corners().iter().map(|&p| transform.to_screen(p)).collect()],
            Drawable::Polygon(polygon) => vec![polygon
                .vertices()
                .iter()
                .map(|&p| transform.to_screen(p))
                .collect()],
            Drawable::Path { base, rings } => rings
                .iter()
                .map(|ring| {
                    ring.vertices()
                        .iter()
                        .map(|&p| transform.to_screen_with_base(*base, p))
                        .collect()
                })
                .collect(),
        }
    }

    /// Number of vertices across all rings.
    pub fn vertex_count(&self) -> usize {
        match self {
            Drawable::Rect(_) => 4,
            Drawable::Polygon(polygon) => polygon.len(),
            Drawable::Path { rings, .. } => rings.iter().map(Polygon::len).sum(),
        }
    }
}

/// Whether the drawable is the region's true outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fidelity {
    Exact,
    /// Fell back to the bounding rectangle.
    Degraded(String),
}

/// A drawable plus how faithfully it represents the region.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedShape {
    pub drawable: Drawable,
    pub fidelity: Fidelity,
}

impl ResolvedShape {
    pub fn is_degraded(&self) -> bool {
        matches!(self.fidelity, Fidelity::Degraded(_))
    }
}

/// Resolves a region's drawable.
///
/// Order: composite path, traced polygon, then the bounding rectangle.
/// Circles without an outline become a tessellated ellipse. Malformed
/// outlines degrade to the rectangle.
pub fn resolve_shape(region: &Region, circle_segments: usize) -> ResolvedShape {
    let degraded = |reason: String| {
        log::debug!("Region '{}' drawn as bounds: {reason}", region.name());
        ResolvedShape {
            drawable: Drawable::Rect(region.bounds()),
            fidelity: Fidelity::Degraded(reason),
        }
    };
    match region.shape() {
        Some(ShapeHandle::Composite(composite)) if composite.is_valid() => {
            let rings = composite
                .rings()
                .iter()
                .filter(|ring| ring.is_valid())
                .cloned()
                .collect();
            ResolvedShape {
                drawable: Drawable::Path {
                    base: composite.base(),
                    rings,
                },
                fidelity: Fidelity::Exact,
            }
        }
        Some(ShapeHandle::Composite(composite)) => degraded(describe_composite(composite)),
        Some(ShapeHandle::Polygon(polygon)) if polygon.is_valid() => ResolvedShape {
            drawable: Drawable::Polygon(polygon.clone()),
            fidelity: Fidelity::Exact,
        },
        Some(ShapeHandle::Polygon(polygon)) => degraded(format!(
            "polygon with {} usable vertices",
            polygon.len()
        )),
        None if region.kind() == RegionKind::Circle && !region.bounds().is_empty() => {
            ResolvedShape {
                drawable: Drawable::Polygon(Polygon::ellipse(&region.bounds(), circle_segments)),
                fidelity: Fidelity::Exact,
            }
        }
        None => ResolvedShape {
            drawable: Drawable::Rect(region.bounds()),
            fidelity: Fidelity::Exact,
        },
    }
}

fn describe_composite(composite: &CompositeShape) -> String {
    match composite.rings().first() {
        None => "composite without rings".to_string(),
        Some(outer) => format!("composite outer ring with {} vertices", outer.len()),
    }
}

/// Concurrent memo of resolved shapes keyed by region id.
///
/// Entries are never invalidated automatically; call [`clear`](Self::clear)
/// after changing geometry.
#[derive(Debug)]
pub struct ShapeCache {
    shapes: DashMap<RegionId, Arc<ResolvedShape>>,
    circle_segments: usize,
}

impl Default for ShapeCache {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_CIRCLE_SEGMENTS)
    }
}

impl ShapeCache {
    pub fn new(circle_segments: usize) -> Self {
        Self {
            shapes: DashMap::new(),
            circle_segments,
        }
    }

    /// Cached drawable for `region`, resolving it on first use.
    pub fn get(&self, region: &Region) -> Arc<ResolvedShape> {
        if let Some(hit) = self.shapes.get(&region.id()) {
            return Arc::clone(hit.value());
        }
        let resolved = Arc::new(resolve_shape(region, self.circle_segments));
        self.shapes.insert(region.id(), Arc::clone(&resolved));
        resolved
    }

    /// Drops one entry.
    pub fn evict(&self, id: RegionId) {
        self.shapes.remove(&id);
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.shapes.clear();
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}
