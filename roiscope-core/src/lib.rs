//! roiscope-core: Region-of-interest model for histopathology images.
//!
//! This crate provides region geometry, the region entity with its
//! nucleus/cytoplasm/cell links, per-image region sets, the shared region
//! store, segmentation import, spatial metrics records and display settings.
//!

pub mod category;
pub mod color;
pub mod error;
pub mod geometry;
pub mod metrics;
pub mod region;
pub mod segmentation;
pub mod set;
pub mod settings;
pub mod store;

pub use category::{Category, RegionKind};
pub use color::Rgba;
pub use error::{Error, Result};
pub use geometry::{CompositeShape, Geometry, Point, Polygon, Rect, ShapeHandle};
pub use metrics::SpatialMetrics;
pub use region::{Body, CellLinks, CytoplasmLinks, NucleusLinks, Region, RegionId};
pub use segmentation::{CellAssembly, Detection, DetectionImporter};
pub use set::RegionSet;
pub use settings::{AppearanceSettings, DisplaySettings, IgnoreSettings};
pub use store::{RegionEvent, RegionListener, RegionStore, StoreStatistics};
