//! roiscope-io: Export layout and measurement tables for roiscope.
//!
//! This crate provides:
//! - **`RoiRecord`** - what an ROI encoder needs for one region
//! - **Export layout** - single `.roi` files, per-image archives and the
//!   all-images master archive
//! - **`MeasurementWriter`** - CSV and JSON region tables
//!

mod error;
pub mod export;
pub mod layout;
mod writer;

pub use error::{Error, Result};
pub use export::{JsonRoiEncoder, RoiEncoder, RoiGeometry, RoiRecord, EXPORT_STROKE_WIDTH};
pub use layout::{
    plan_image_export, plan_master_archive, sanitize_file_name, ArchiveEntry, ImageExport,
    MasterArchive, SubArchive,
};
pub use writer::{collect_rows, MeasurementRow, MeasurementWriter};
