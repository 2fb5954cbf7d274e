//! Export records handed to an ROI encoder.

use roiscope_core::{Point, Rect, Region, RegionKind, Rgba, ShapeHandle};
use serde::Serialize;

/// Stroke width written into every exported record.
pub const EXPORT_STROKE_WIDTH: f32 = 2.0;

/// Outline of an exported region, in image pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoiGeometry {
    Rectangle { bounds: Rect },
    Oval { bounds: Rect },
    Polygon { vertices: Vec<Point> },
    /// Outer ring plus holes, vertices relative to `base`.
    Composite { base: Point, rings: Vec<Vec<Point>> },
}

impl RoiGeometry {
    /// Picks the most faithful geometry for a region.
    ///
    /// Valid shapes are exported as is. Invalid shapes and primitives fall
    /// back to bounds, circles as an oval.
    pub fn from_region(region: &Region) -> Self {
        match region.shape() {
            Some(ShapeHandle::Polygon(polygon)) if polygon.is_valid() => RoiGeometry::Polygon {
                vertices: polygon.vertices().to_vec(),
            },
            Some(ShapeHandle::Composite(shape)) if shape.is_valid() => RoiGeometry::Composite {
                base: shape.base(),
                rings: shape.rings().iter().map(|r| r.vertices().to_vec()).collect(),
            },
            _ if region.kind() == RegionKind::Circle => RoiGeometry::Oval {
                bounds: region.bounds(),
            },
            _ => RoiGeometry::Rectangle {
                bounds: region.bounds(),
            },
        }
    }

    /// Short type label.
    pub fn type_name(&self) -> &'static str {
        match self {
            RoiGeometry::Rectangle { .. } => "rectangle",
            RoiGeometry::Oval { .. } => "oval",
            RoiGeometry::Polygon { .. } => "polygon",
            RoiGeometry::Composite { .. } => "composite",
        }
    }
}

/// Everything an encoder needs to write one region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoiRecord {
    pub name: String,
    pub geometry: RoiGeometry,
    #[serde(serialize_with = "serialize_color")]
    pub stroke_color: Rgba,
    pub stroke_width: f32,
}

impl RoiRecord {
    pub fn from_region(region: &Region) -> Self {
        Self {
            name: region.name().to_string(),
            geometry: RoiGeometry::from_region(region),
            stroke_color: region.effective_color(),
            stroke_width: EXPORT_STROKE_WIDTH,
        }
    }
}

impl From<&Region> for RoiRecord {
    fn from(region: &Region) -> Self {
        Self::from_region(region)
    }
}

fn serialize_color<S: serde::Serializer>(color: &Rgba, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(color)
}

/// Byte-level ROI encoder (ImageJ `.roi` or similar).
pub trait RoiEncoder {
    /// Encodes one record into the bytes of a single `.roi` file.
    ///
    /// # Errors
    /// Returns an error if the record cannot be represented.
    fn encode(&self, record: &RoiRecord) -> crate::Result<Vec<u8>>;
}

/// Encoder writing records as pretty JSON. Useful for inspection and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRoiEncoder;

impl RoiEncoder for JsonRoiEncoder {
    fn encode(&self, record: &RoiRecord) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(record)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roiscope_core::{CompositeShape, Polygon};

    #[test]
    fn test_polygon_region_exports_vertices() {
        let polygon = Polygon::from_coords([(0.0, 0.0), (10.0, 0.0), (5.0, 8.0)]);
        let region = Region::nucleus(polygon, "a.tif", "Nucleus_1").unwrap();
        let record = RoiRecord::from_region(&region);
        assert_eq!(record.name, "Nucleus_1");
        assert!((record.stroke_width - 2.0).abs() < f32::EPSILON);
        match record.geometry {
            RoiGeometry::Polygon { vertices } => assert_eq!(vertices.len(), 3),
            other => panic!("unexpected geometry {other:?}"),
        }
    }

    #[test]
    fn test_composite_keeps_rings() {
        let outer = Polygon::from_coords([(0.0, 0.0), (20.0, 0.0), (20.0, 20.0), (0.0, 20.0)]);
        let hole = Polygon::from_coords([(5.0, 5.0), (10.0, 5.0), (10.0, 10.0), (5.0, 10.0)]);
        let shape = CompositeShape::new(Point::new(100.0, 50.0), vec![outer, hole]);
        let region = Region::new(RegionKind::Vessel, shape, "a.tif", "Vessel_1").unwrap();
        match RoiGeometry::from_region(&region) {
            RoiGeometry::Composite { base, rings } => {
                assert_eq!(base, Point::new(100.0, 50.0));
                assert_eq!(rings.len(), 2);
            }
            other => panic!("unexpected geometry {other:?}"),
        }
    }

    #[test]
    fn test_primitives_fall_back_to_bounds() {
        let bounds = Rect::new(3, 4, 10, 6);
        let circle = Region::new(RegionKind::Circle, bounds, "a.tif", "c").unwrap();
        let square = Region::new(RegionKind::Square, bounds, "a.tif", "s").unwrap();
        assert_eq!(RoiGeometry::from_region(&circle), RoiGeometry::Oval { bounds });
        assert_eq!(RoiGeometry::from_region(&square), RoiGeometry::Rectangle { bounds });
    }

    #[test]
    fn test_stroke_color_uses_override() {
        let region = Region::new(RegionKind::Square, Rect::new(0, 0, 2, 2), "a.tif", "s")
            .unwrap()
            .with_color(Rgba::CYAN);
        assert_eq!(RoiRecord::from(&region).stroke_color, Rgba::CYAN);
    }

    #[test]
    fn test_json_encoder() {
        let region = Region::new(RegionKind::Circle, Rect::new(1, 2, 3, 4), "a.tif", "Circle_1").unwrap();
        let bytes = JsonRoiEncoder.encode(&RoiRecord::from(&region)).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["name"], "Circle_1");
        assert_eq!(value["geometry"]["type"], "oval");
        assert_eq!(value["geometry"]["bounds"]["width"], 3);
    }
}
