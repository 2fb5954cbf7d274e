//! The region entity.
//!
//! A [`Region`] is one detected or user-drawn object on one image. The
//! biological kinds (nucleus, cytoplasm, cell) carry a [`Body`] with
//! cross-references to their partners. Those references are ids into the
//! owning [`RegionSet`](crate::RegionSet) and can only be changed through
//! the set's paired link operations, which keep both sides consistent.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use uuid::Uuid;

use crate::category::{Category, RegionKind};
use crate::color::Rgba;
use crate::error::{Error, Result};
use crate::geometry::{ellipse_contains, Geometry, Point, Rect, ShapeHandle};

/// Default segmentation method recorded on imported nuclei.
pub const NUCLEUS_SEGMENTATION: &str = "StarDist";
/// Default segmentation method recorded on derived cytoplasm.
pub const CYTOPLASM_SEGMENTATION: &str = "Voronoi_Subtraction";
/// Default segmentation method recorded on derived cells.
pub const CELL_SEGMENTATION: &str = "Voronoi_Tessellation";

/// Process-wide unique region identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegionId(Uuid);

impl RegionId {
    /// Fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing uuid.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RegionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Links held by a nucleus.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NucleusLinks {
    pub(crate) parent_cell: Option<RegionId>,
    pub(crate) associated_cytoplasm: Option<RegionId>,
    pub(crate) segmentation_method: String,
}

impl NucleusLinks {
    pub fn parent_cell(&self) -> Option<RegionId> {
        self.parent_cell
    }

    pub fn associated_cytoplasm(&self) -> Option<RegionId> {
        self.associated_cytoplasm
    }

    pub fn segmentation_method(&self) -> &str {
        &self.segmentation_method
    }
}

impl Default for NucleusLinks {
    fn default() -> Self {
        Self {
            parent_cell: None,
            associated_cytoplasm: None,
            segmentation_method: NUCLEUS_SEGMENTATION.to_string(),
        }
    }
}

/// Links held by a cytoplasm.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CytoplasmLinks {
    pub(crate) associated_nucleus: Option<RegionId>,
    pub(crate) parent_cell: Option<RegionId>,
    pub(crate) segmentation_method: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub(crate) mean_intensity: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub(crate) std_intensity: Option<f64>,
}

impl CytoplasmLinks {
    pub fn associated_nucleus(&self) -> Option<RegionId> {
        self.associated_nucleus
    }

    pub fn parent_cell(&self) -> Option<RegionId> {
        self.parent_cell
    }

    pub fn segmentation_method(&self) -> &str {
        &self.segmentation_method
    }

    /// Mean stain intensity, when measured.
    pub fn mean_intensity(&self) -> Option<f64> {
        self.mean_intensity
    }

    pub fn std_intensity(&self) -> Option<f64> {
        self.std_intensity
    }
}

impl Default for CytoplasmLinks {
    fn default() -> Self {
        Self {
            associated_nucleus: None,
            parent_cell: None,
            segmentation_method: CYTOPLASM_SEGMENTATION.to_string(),
            mean_intensity: None,
            std_intensity: None,
        }
    }
}

/// Links held by a cell, plus the cached nucleus/cytoplasm area ratio.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellLinks {
    pub(crate) associated_nucleus: Option<RegionId>,
    pub(crate) associated_cytoplasm: Option<RegionId>,
    pub(crate) nucleus_to_cytoplasm_ratio: f64,
    pub(crate) segmentation_method: String,
}

impl CellLinks {
    pub fn associated_nucleus(&self) -> Option<RegionId> {
        self.associated_nucleus
    }

    pub fn associated_cytoplasm(&self) -> Option<RegionId> {
        self.associated_cytoplasm
    }

    /// Nucleus area divided by cytoplasm area, `0` unless complete.
    pub fn nucleus_to_cytoplasm_ratio(&self) -> f64 {
        self.nucleus_to_cytoplasm_ratio
    }

    /// Both nucleus and cytoplasm are linked.
    pub fn is_complete(&self) -> bool {
        self.associated_nucleus.is_some() && self.associated_cytoplasm.is_some()
    }

    pub fn segmentation_method(&self) -> &str {
        &self.segmentation_method
    }
}

impl Default for CellLinks {
    fn default() -> Self {
        Self {
            associated_nucleus: None,
            associated_cytoplasm: None,
            nucleus_to_cytoplasm_ratio: 0.0,
            segmentation_method: CELL_SEGMENTATION.to_string(),
        }
    }
}

/// Entity-specific part of a region.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Body {
    /// No biological links (vessels, ignore areas, primitives, tagged-only regions).
    #[default]
    Plain,
    Nucleus(NucleusLinks),
    Cytoplasm(CytoplasmLinks),
    Cell(CellLinks),
}

impl Body {
    /// Entity name used in error messages.
    pub fn entity_name(&self) -> &'static str {
        match self {
            Body::Plain => "plain region",
            Body::Nucleus(_) => "nucleus",
            Body::Cytoplasm(_) => "cytoplasm",
            Body::Cell(_) => "cell",
        }
    }

    /// Drops every cross-reference and resets the cached ratio.
    pub(crate) fn clear_links(&mut self) {
        match self {
            Body::Plain => {}
            Body::Nucleus(links) => {
                links.parent_cell = None;
                links.associated_cytoplasm = None;
            }
            Body::Cytoplasm(links) => {
                links.associated_nucleus = None;
                links.parent_cell = None;
            }
            Body::Cell(links) => {
                links.associated_nucleus = None;
                links.associated_cytoplasm = None;
                links.nucleus_to_cytoplasm_ratio = 0.0;
            }
        }
    }

    /// Every id this body points at.
    pub fn linked_ids(&self) -> Vec<RegionId> {
        match self {
            Body::Plain => Vec::new(),
            Body::Nucleus(l) => l.parent_cell.into_iter().chain(l.associated_cytoplasm).collect(),
            Body::Cytoplasm(l) => l.associated_nucleus.into_iter().chain(l.parent_cell).collect(),
            Body::Cell(l) => l
                .associated_nucleus
                .into_iter()
                .chain(l.associated_cytoplasm)
                .collect(),
        }
    }
}

/// One region of interest on one image.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Region {
    id: RegionId,
    kind: RegionKind,
    bounds: Rect,
    shape: Option<ShapeHandle>,
    name: String,
    display_color: Option<Rgba>,
    ignored: bool,
    assigned_class: Option<String>,
    notes: Option<String>,
    source_image: String,
    body: Body,
}

impl Region {
    /// Creates a region without biological links.
    ///
    /// A kind tag of `Nucleus`/`Cytoplasm`/`Cell` is kept, but the region
    /// cannot take part in linking; use [`Region::nucleus`] and friends for that.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] when a shape has no finite vertex.
    pub fn new(
        kind: RegionKind,
        geometry: impl Into<Geometry>,
        source_image: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self> {
        Self::build(kind, geometry.into(), source_image.into(), name.into(), Body::Plain)
    }

    /// Creates a nucleus entity.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] when a shape has no finite vertex.
    pub fn nucleus(
        geometry: impl Into<Geometry>,
        source_image: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self> {
        Self::build(
            RegionKind::Nucleus,
            geometry.into(),
            source_image.into(),
            name.into(),
            Body::Nucleus(NucleusLinks::default()),
        )
    }

    /// Creates a cytoplasm entity.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] when a shape has no finite vertex.
    pub fn cytoplasm(
        geometry: impl Into<Geometry>,
        source_image: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self> {
        Self::build(
            RegionKind::Cytoplasm,
            geometry.into(),
            source_image.into(),
            name.into(),
            Body::Cytoplasm(CytoplasmLinks::default()),
        )
    }

    /// Creates a cell entity. Link it through a [`RegionSet`](crate::RegionSet).
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] when a shape has no finite vertex.
    pub fn cell(
        geometry: impl Into<Geometry>,
        source_image: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self> {
        Self::build(
            RegionKind::Cell,
            geometry.into(),
            source_image.into(),
            name.into(),
            Body::Cell(CellLinks::default()),
        )
    }

    fn build(
        kind: RegionKind,
        geometry: Geometry,
        source_image: String,
        name: String,
        body: Body,
    ) -> Result<Self> {
        let (bounds, shape) = match geometry {
            Geometry::Bounds(rect) => (rect, None),
            Geometry::Shape(shape) => {
                let bounds = shape.bounds().ok_or_else(|| {
                    Error::InvalidGeometry(format!("{kind} '{name}' has no finite vertex"))
                })?;
                (bounds, Some(shape))
            }
        };
        Ok(Self {
            id: RegionId::new(),
            kind,
            bounds,
            shape,
            name,
            display_color: None,
            ignored: false,
            assigned_class: None,
            notes: None,
            source_image,
            body,
        })
    }

    /// Sets a display color override.
    #[must_use]
    pub fn with_color(mut self, color: Rgba) -> Self {
        self.display_color = Some(color);
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.assigned_class = Some(class.into());
        self
    }

    /// Overrides the segmentation method recorded on a biological entity.
    /// No effect on plain regions.
    #[must_use]
    pub fn with_segmentation_method(mut self, method: impl Into<String>) -> Self {
        let method = method.into();
        match &mut self.body {
            Body::Plain => {}
            Body::Nucleus(l) => l.segmentation_method = method,
            Body::Cytoplasm(l) => l.segmentation_method = method,
            Body::Cell(l) => l.segmentation_method = method,
        }
        self
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn kind(&self) -> RegionKind {
        self.kind
    }

    /// Bounding box in image pixels.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Complex outline, absent for primitive shapes.
    pub fn shape(&self) -> Option<&ShapeHandle> {
        self.shape.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Color override, if any.
    pub fn display_color(&self) -> Option<Rgba> {
        self.display_color
    }

    pub fn set_display_color(&mut self, color: Option<Rgba>) {
        self.display_color = color;
    }

    /// Override color, else the kind's default.
    pub fn effective_color(&self) -> Rgba {
        self.display_color
            .unwrap_or_else(|| self.kind.default_color())
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    pub fn set_ignored(&mut self, ignored: bool) {
        self.ignored = ignored;
    }

    pub fn assigned_class(&self) -> Option<&str> {
        self.assigned_class.as_deref()
    }

    pub fn set_assigned_class(&mut self, class: Option<String>) {
        self.assigned_class = class;
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        self.notes = notes;
    }

    /// Image this region belongs to.
    pub fn source_image(&self) -> &str {
        &self.source_image
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub(crate) fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn as_nucleus(&self) -> Option<&NucleusLinks> {
        match &self.body {
            Body::Nucleus(links) => Some(links),
            _ => None,
        }
    }

    pub fn as_cytoplasm(&self) -> Option<&CytoplasmLinks> {
        match &self.body {
            Body::Cytoplasm(links) => Some(links),
            _ => None,
        }
    }

    pub fn as_cell(&self) -> Option<&CellLinks> {
        match &self.body {
            Body::Cell(links) => Some(links),
            _ => None,
        }
    }

    /// Styling category.
    ///
    /// Precedence: entity body, then kind tag, then name heuristics,
    /// then vessel.
    pub fn category(&self) -> Category {
        match (&self.body, Category::from_kind(self.kind)) {
            (Body::Nucleus(_), _) => Category::Nucleus,
            (Body::Cytoplasm(_), _) => Category::Cytoplasm,
            (Body::Cell(_), _) => Category::Cell,
            (Body::Plain, Some(tagged)) => tagged,
            (Body::Plain, None) => Category::from_name(&self.name).unwrap_or(Category::Vessel),
        }
    }

    /// Enclosed area in square pixels.
    ///
    /// Shape area when a usable outline exists, the inscribed ellipse for
    /// circles, bounds area otherwise.
    pub fn area(&self) -> f64 {
        match &self.shape {
            Some(shape) if shape.is_valid() => shape.area(),
            _ if self.kind == RegionKind::Circle => {
                std::f64::consts::PI * f64::from(self.bounds.width) * f64::from(self.bounds.height)
                    / 4.0
            }
            _ => self.bounds.area(),
        }
    }

    /// Outline length in pixels.
    pub fn perimeter(&self) -> f64 {
        match &self.shape {
            Some(shape) if shape.is_valid() => shape.perimeter(),
            _ if self.kind == RegionKind::Circle => {
                // Ramanujan's approximation
                let a = f64::from(self.bounds.width) / 2.0;
                let b = f64::from(self.bounds.height) / 2.0;
                std::f64::consts::PI * (3.0 * (a + b) - ((3.0 * a + b) * (a + 3.0 * b)).sqrt())
            }
            _ if self.bounds.is_empty() => 0.0,
            _ => 2.0 * f64::from(self.bounds.width + self.bounds.height),
        }
    }

    /// Integer center of the bounding box.
    pub fn center(&self) -> (i32, i32) {
        self.bounds.center()
    }

    /// Shape-aware containment test in image space.
    pub fn contains(&self, point: Point) -> bool {
        match &self.shape {
            Some(shape) if shape.is_valid() => shape.contains(point),
            _ if self.kind == RegionKind::Circle => ellipse_contains(&self.bounds, point),
            _ => self.bounds.contains(point),
        }
    }

    /// Bounding-box overlap with `rect`.
    pub fn intersects(&self, rect: &Rect) -> bool {
        self.bounds.intersects(rect)
    }

    /// True iff any bounds-to-edge distance is strictly below `border_distance`.
    pub fn should_be_ignored(&self, image_width: i32, image_height: i32, border_distance: i32) -> bool {
        let b = self.bounds;
        let border_distance = i64::from(border_distance);
        let left = i64::from(b.x);
        let top = i64::from(b.y);
        let right = i64::from(image_width) - (i64::from(b.x) + i64::from(b.width));
        let bottom = i64::from(image_height) - (i64::from(b.y) + i64::from(b.height));
        left < border_distance
            || top < border_distance
            || right < border_distance
            || bottom < border_distance
    }

    /// Number parsed from a `"Kind_N"` style name.
    ///
    /// Only the segment after the first `_` is read, so `"Nucleus_3_b"` is 3.
    pub fn name_number(&self) -> Option<u32> {
        self.name.split('_').nth(1)?.parse().ok()
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let b = self.bounds;
        write!(
            f,
            "{} [{},{} {}x{}] on {}",
            self.name, b.x, b.y, b.width, b.height, self.source_image
        )
    }
}
