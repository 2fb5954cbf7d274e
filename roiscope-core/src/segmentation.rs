//! Conversion of segmentation output into regions.

use std::collections::{HashMap, HashSet};

use crate::category::RegionKind;
use crate::error::{Error, Result};
use crate::geometry::{Geometry, Rect, ShapeHandle};
use crate::region::{Region, RegionId};
use crate::set::RegionSet;

/// One detected object as delivered by a segmentation backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub kind: RegionKind,
    /// Bounding box reported by the backend.
    pub bounds: Rect,
    /// Traced outline, if the backend produced one.
    pub shape: Option<ShapeHandle>,
    /// Explicit name; auto-generated when absent.
    pub name: Option<String>,
}

impl Detection {
    pub fn new(kind: RegionKind, bounds: Rect) -> Self {
        Self {
            kind,
            bounds,
            shape: None,
            name: None,
        }
    }

    #[must_use]
    pub fn with_shape(mut self, shape: impl Into<ShapeHandle>) -> Self {
        self.shape = Some(shape.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Groups detections (by index) into one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellAssembly {
    pub cell: usize,
    pub nucleus: Option<usize>,
    pub cytoplasm: Option<usize>,
}

/// Turns detections for one image into regions with `"{Kind}_{n}"` names.
///
/// Counters are per kind and persist across calls, so several batches for
/// the same image keep numbering.
#[derive(Debug, Clone)]
pub struct DetectionImporter {
    image: String,
    counters: HashMap<RegionKind, u32>,
}

impl DetectionImporter {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            counters: HashMap::new(),
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    /// Next auto-generated name for `kind`.
    pub fn next_name(&mut self, kind: RegionKind) -> String {
        let counter = self.counters.entry(kind).or_insert(0);
        *counter += 1;
        format!("{}_{}", kind.display_name(), counter)
    }

    /// Converts one detection.
    ///
    /// The shape's own bounds take precedence over the reported box; a shape
    /// without finite vertices is dropped and the reported box is used.
    ///
    /// # Errors
    /// Propagates region construction errors.
    pub fn import(&mut self, detection: Detection) -> Result<Region> {
        let name = match detection.name {
            Some(name) => name,
            None => self.next_name(detection.kind),
        };
        let geometry: Geometry = match detection.shape {
            Some(shape) if shape.bounds().is_some() => shape.into(),
            Some(_) => {
                log::debug!("Dropping empty outline of '{name}', using reported bounds");
                detection.bounds.into()
            }
            None => detection.bounds.into(),
        };
        let image = self.image.clone();
        match detection.kind {
            RegionKind::Nucleus => Region::nucleus(geometry, image, name),
            RegionKind::Cytoplasm => Region::cytoplasm(geometry, image, name),
            RegionKind::Cell => Region::cell(geometry, image, name),
            kind => Region::new(kind, geometry, image, name),
        }
    }

    /// Converts a batch and assembles cells.
    ///
    /// Every detection becomes a region. Each assembly links its cell to the
    /// nucleus and cytoplasm it names.
    ///
    /// # Errors
    /// [`Error::InvalidAssembly`] for out-of-range or reused indices, and
    /// [`Error::WrongKind`] when an index names the wrong kind.
    pub fn import_image(
        &mut self,
        detections: Vec<Detection>,
        assemblies: &[CellAssembly],
    ) -> Result<RegionSet> {
        let count = detections.len();
        let mut used = HashSet::new();
        for assembly in assemblies {
            for idx in [Some(assembly.cell), assembly.nucleus, assembly.cytoplasm]
                .into_iter()
                .flatten()
            {
                if idx >= count {
                    return Err(Error::InvalidAssembly(format!(
                        "detection index {idx} out of range ({count} detections)"
                    )));
                }
                if !used.insert(idx) {
                    return Err(Error::InvalidAssembly(format!(
                        "detection {idx} used by more than one cell part"
                    )));
                }
            }
        }

        let mut set = RegionSet::new(self.image.clone());
        let mut ids: Vec<RegionId> = Vec::with_capacity(count);
        for detection in detections {
            let region = self.import(detection)?;
            ids.push(set.insert(region)?);
        }
        for assembly in assemblies {
            let cell = ids[assembly.cell];
            let nucleus = assembly.nucleus.map(|i| ids[i]);
            let cytoplasm = assembly.cytoplasm.map(|i| ids[i]);
            set.link_nucleus(cell, nucleus)?;
            set.link_cytoplasm(cell, cytoplasm)?;
            if let (Some(c), Some(n)) = (cytoplasm, nucleus) {
                set.associate(c, Some(n))?;
            }
        }
        log::debug!(
            "Imported {} regions ({} cells) for '{}'",
            set.len(),
            assemblies.len(),
            self.image
        );
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;

    #[test]
    fn test_auto_names_per_kind() {
        let mut importer = DetectionImporter::new("slide.tif");
        let a = importer
            .import(Detection::new(RegionKind::Nucleus, Rect::new(0, 0, 5, 5)))
            .unwrap();
        let b = importer
            .import(Detection::new(RegionKind::Vessel, Rect::new(0, 0, 5, 5)))
            .unwrap();
        let c = importer
            .import(Detection::new(RegionKind::Nucleus, Rect::new(0, 0, 5, 5)))
            .unwrap();
        let named = importer
            .import(Detection::new(RegionKind::Nucleus, Rect::new(0, 0, 5, 5)).with_name("mine"))
            .unwrap();
        assert_eq!(a.name(), "Nucleus_1");
        assert_eq!(b.name(), "Vessel_1");
        assert_eq!(c.name(), "Nucleus_2");
        assert_eq!(named.name(), "mine");
        assert!(a.as_nucleus().is_some());
        assert!(b.as_nucleus().is_none());
    }

    #[test]
    fn test_shape_bounds_win() {
        let mut importer = DetectionImporter::new("slide.tif");
        let poly = Polygon::from_coords([(2.0, 3.0), (12.0, 3.0), (12.0, 9.0)]);
        let region = importer
            .import(Detection::new(RegionKind::Nucleus, Rect::new(0, 0, 50, 50)).with_shape(poly))
            .unwrap();
        assert_eq!(region.bounds(), Rect::new(2, 3, 10, 6));
        assert!(region.shape().is_some());
    }

    #[test]
    fn test_empty_shape_falls_back_to_bounds() {
        let mut importer = DetectionImporter::new("slide.tif");
        let region = importer
            .import(
                Detection::new(RegionKind::Nucleus, Rect::new(1, 1, 4, 4))
                    .with_shape(Polygon::default()),
            )
            .unwrap();
        assert_eq!(region.bounds(), Rect::new(1, 1, 4, 4));
        assert!(region.shape().is_none());
    }

    #[test]
    fn test_assembly_validation() {
        let mut importer = DetectionImporter::new("slide.tif");
        let detections = vec![
            Detection::new(RegionKind::Cell, Rect::new(0, 0, 10, 10)),
            Detection::new(RegionKind::Nucleus, Rect::new(2, 2, 2, 2)),
        ];
        let err = importer
            .import_image(
                detections.clone(),
                &[CellAssembly { cell: 0, nucleus: Some(5), cytoplasm: None }],
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAssembly(_)));

        let err = importer
            .import_image(
                detections,
                &[CellAssembly { cell: 1, nucleus: Some(0), cytoplasm: None }],
            )
            .unwrap_err();
        assert!(matches!(err, Error::WrongKind { .. }));
    }
}
