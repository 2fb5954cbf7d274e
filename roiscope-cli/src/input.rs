//! Segmentation input files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use roiscope_core::{
    CellAssembly, Detection, DetectionImporter, Polygon, Rect, RegionKind, RegionStore,
};
use serde::Deserialize;

use crate::{CliError, Result};

/// Top-level input document.
#[derive(Debug, Deserialize)]
pub struct SegmentationFile {
    pub images: Vec<ImageInput>,
}

#[derive(Debug, Deserialize)]
pub struct ImageInput {
    pub image: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub detections: Vec<DetectionInput>,
    #[serde(default)]
    pub cells: Vec<CellInput>,
}

#[derive(Debug, Deserialize)]
pub struct DetectionInput {
    pub kind: String,
    /// `[x, y, width, height]`
    pub bounds: [i32; 4],
    #[serde(default)]
    pub polygon: Option<Vec<[f64; 2]>>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CellInput {
    pub cell: usize,
    #[serde(default)]
    pub nucleus: Option<usize>,
    #[serde(default)]
    pub cytoplasm: Option<usize>,
}

/// Image dimensions kept next to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub image: String,
    pub width: u32,
    pub height: u32,
}

impl DetectionInput {
    fn to_detection(&self) -> Result<Detection> {
        let kind = RegionKind::parse_label(&self.kind)
            .ok_or_else(|| CliError::InvalidInput(format!("unknown region kind '{}'", self.kind)))?;
        let [x, y, w, h] = self.bounds;
        let mut detection = Detection::new(kind, Rect::new(x, y, w, h));
        if let Some(points) = &self.polygon {
            detection = detection.with_shape(Polygon::from_coords(points.iter().map(|[x, y]| (*x, *y))));
        }
        if let Some(name) = &self.name {
            detection = detection.with_name(name.clone());
        }
        Ok(detection)
    }
}

impl SegmentationFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Imports every image into a fresh store and applies the border rule.
    ///
    /// Images are returned in input order.
    pub fn load(self, border_distance: i32) -> Result<(RegionStore, Vec<ImageInfo>)> {
        let store = RegionStore::new();
        let mut infos = Vec::with_capacity(self.images.len());
        for input in self.images {
            if infos.iter().any(|i: &ImageInfo| i.image == input.image) {
                return Err(CliError::InvalidInput(format!(
                    "image '{}' listed twice",
                    input.image
                )));
            }
            let detections = input
                .detections
                .iter()
                .map(DetectionInput::to_detection)
                .collect::<Result<Vec<_>>>()?;
            let assemblies: Vec<CellAssembly> = input
                .cells
                .iter()
                .map(|c| CellAssembly {
                    cell: c.cell,
                    nucleus: c.nucleus,
                    cytoplasm: c.cytoplasm,
                })
                .collect();
            let mut importer = DetectionImporter::new(input.image.clone());
            let set = importer.import_image(detections, &assemblies)?;
            store.replace_image(set);

            let width = i32::try_from(input.width)
                .map_err(|_| CliError::InvalidInput(format!("width {} too large", input.width)))?;
            let height = i32::try_from(input.height)
                .map_err(|_| CliError::InvalidInput(format!("height {} too large", input.height)))?;
            let ignored = store.apply_border_rule(&input.image, width, height, border_distance)?;
            log::info!(
                "Loaded {} regions for '{}' ({ignored} near the border)",
                store.count(&input.image),
                input.image
            );
            infos.push(ImageInfo {
                image: input.image,
                width: input.width,
                height: input.height,
            });
        }
        Ok((store, infos))
    }
}
