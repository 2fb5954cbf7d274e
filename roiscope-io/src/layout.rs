//! ImageJ-compatible export layout.
//!
//! One region is written as a lone `.roi` file, several as a ZIP of
//! numbered `.roi` entries. Exporting every image produces a master ZIP
//! holding one `{stem}_ROIs.zip` per image. Only the layout is planned
//! here; byte encoding goes through a [`RoiEncoder`].

use roiscope_core::{Region, RegionSet};
use serde::Serialize;

use crate::export::{RoiEncoder, RoiRecord};
use crate::{Error, Result};

/// Suffix of per-image archives.
pub const ARCHIVE_SUFFIX: &str = "_ROIs.zip";

/// Drops the extension and replaces anything outside `[A-Za-z0-9._-]` with `_`.
///
/// A leading dot is not treated as an extension separator.
pub fn sanitize_file_name(file_name: &str) -> String {
    let stem = match file_name.rfind('.') {
        Some(dot) if dot > 0 => &file_name[..dot],
        _ => file_name,
    };
    stem.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Entry name inside a region archive, `index` counted from zero.
pub fn entry_name(index: usize, region_name: &str) -> String {
    format!("{:04}-{}.roi", index + 1, region_name)
}

/// Per-image archive name.
pub fn archive_name(image: &str) -> String {
    format!("{}{ARCHIVE_SUFFIX}", sanitize_file_name(image))
}

/// One `.roi` file to write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveEntry {
    pub file_name: String,
    pub record: RoiRecord,
}

/// Layout for the regions of one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum ImageExport {
    /// A lone `.roi` file.
    Single(ArchiveEntry),
    /// A ZIP of numbered entries.
    Archive {
        file_name: String,
        entries: Vec<ArchiveEntry>,
    },
}

impl ImageExport {
    /// Output file name.
    pub fn file_name(&self) -> &str {
        match self {
            ImageExport::Single(entry) => &entry.file_name,
            ImageExport::Archive { file_name, .. } => file_name,
        }
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        match self {
            ImageExport::Single(entry) => std::slice::from_ref(entry),
            ImageExport::Archive { entries, .. } => entries,
        }
    }

    /// Encodes every entry; the caller owns the container format.
    ///
    /// # Errors
    /// Propagates the first encoder failure.
    pub fn encode(&self, encoder: &dyn RoiEncoder) -> Result<Vec<(String, Vec<u8>)>> {
        encode_entries(self.entries(), encoder)
    }
}

/// Plans the export of one image's regions.
///
/// # Errors
/// Returns [`Error::EmptyExport`] when `regions` is empty.
pub fn plan_image_export(image: &str, regions: &[Region]) -> Result<ImageExport> {
    match regions {
        [] => Err(Error::EmptyExport(format!("no regions for image '{image}'"))),
        [region] => Ok(ImageExport::Single(ArchiveEntry {
            file_name: format!("{}.roi", sanitize_file_name(image)),
            record: RoiRecord::from_region(region),
        })),
        _ => Ok(ImageExport::Archive {
            file_name: archive_name(image),
            entries: archive_entries(regions),
        }),
    }
}

/// One per-image archive inside the master archive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubArchive {
    pub image: String,
    pub file_name: String,
    pub entries: Vec<ArchiveEntry>,
}

/// Layout of an all-images export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MasterArchive {
    pub file_name: String,
    pub archives: Vec<SubArchive>,
}

impl MasterArchive {
    /// Total number of `.roi` entries across all sub-archives.
    pub fn region_count(&self) -> usize {
        self.archives.iter().map(|a| a.entries.len()).sum()
    }

    /// Encodes every sub-archive's entries, keyed by sub-archive name.
    ///
    /// # Errors
    /// Propagates the first encoder failure.
    pub fn encode(&self, encoder: &dyn RoiEncoder) -> Result<Vec<(String, Vec<(String, Vec<u8>)>)>> {
        self.archives
            .iter()
            .map(|a| Ok((a.file_name.clone(), encode_entries(&a.entries, encoder)?)))
            .collect()
    }
}

/// Plans a master archive over several images.
///
/// Images without regions are skipped. A single-region image still gets a
/// sub-archive with one entry.
///
/// # Errors
/// Returns [`Error::EmptyExport`] when no image has regions.
pub fn plan_master_archive<'a, I>(sets: I, file_name: impl Into<String>) -> Result<MasterArchive>
where
    I: IntoIterator<Item = &'a RegionSet>,
{
    let archives: Vec<SubArchive> = sets
        .into_iter()
        .filter(|set| !set.is_empty())
        .map(|set| SubArchive {
            image: set.image().to_string(),
            file_name: archive_name(set.image()),
            entries: archive_entries(set.regions()),
        })
        .collect();
    if archives.is_empty() {
        return Err(Error::EmptyExport("no regions in any image".to_string()));
    }
    let master = MasterArchive {
        file_name: file_name.into(),
        archives,
    };
    log::debug!(
        "planned master archive {} with {} images, {} regions",
        master.file_name,
        master.archives.len(),
        master.region_count()
    );
    Ok(master)
}

fn archive_entries(regions: &[Region]) -> Vec<ArchiveEntry> {
    regions
        .iter()
        .enumerate()
        .map(|(i, region)| ArchiveEntry {
            file_name: entry_name(i, region.name()),
            record: RoiRecord::from_region(region),
        })
        .collect()
}

fn encode_entries(entries: &[ArchiveEntry], encoder: &dyn RoiEncoder) -> Result<Vec<(String, Vec<u8>)>> {
    entries
        .iter()
        .map(|e| Ok((e.file_name.clone(), encoder.encode(&e.record)?)))
        .collect()
}
