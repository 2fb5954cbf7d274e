//! Measurement table writers.

use crate::Result;
use roiscope_core::{Region, RegionId, RegionSet, SpatialMetrics};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const CSV_HEADER: [&str; 18] = [
    "id",
    "name",
    "image",
    "category",
    "kind",
    "x",
    "y",
    "width",
    "height",
    "area",
    "ignored",
    "class",
    "nc_ratio",
    "neighbor_count",
    "nearest_distance",
    "mean_distance",
    "local_density",
    "clustering_coefficient",
];

/// One row of the measurement table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRow {
    pub id: RegionId,
    pub name: String,
    pub image: String,
    pub category: String,
    pub kind: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub area: f64,
    pub ignored: bool,
    pub class: Option<String>,
    /// Only for cells with both partners linked.
    pub nc_ratio: Option<f64>,
    pub neighbor_count: Option<usize>,
    pub nearest_distance: Option<f64>,
    pub mean_distance: Option<f64>,
    pub local_density: Option<f64>,
    pub clustering_coefficient: Option<f64>,
}

impl MeasurementRow {
    pub fn new(region: &Region, metrics: Option<&SpatialMetrics>) -> Self {
        let bounds = region.bounds();
        let nc_ratio = region
            .as_cell()
            .filter(|links| links.is_complete())
            .map(roiscope_core::CellLinks::nucleus_to_cytoplasm_ratio);
        Self {
            id: region.id(),
            name: region.name().to_string(),
            image: region.source_image().to_string(),
            category: region.category().display_name().to_string(),
            kind: region.kind().display_name().to_string(),
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
            area: region.area(),
            ignored: region.is_ignored(),
            class: region.assigned_class().map(str::to_string),
            nc_ratio,
            neighbor_count: metrics.map(SpatialMetrics::neighbor_count),
            nearest_distance: metrics.and_then(SpatialMetrics::nearest_distance),
            mean_distance: metrics.and_then(SpatialMetrics::mean_distance),
            local_density: metrics.map(SpatialMetrics::local_density),
            clustering_coefficient: metrics.map(SpatialMetrics::clustering_coefficient),
        }
    }
}

/// Builds the table for one image, in region order.
///
/// Ignored regions are dropped unless `include_ignored` is set.
pub fn collect_rows(
    set: &RegionSet,
    metrics: &HashMap<RegionId, SpatialMetrics>,
    include_ignored: bool,
) -> Vec<MeasurementRow> {
    set.iter()
        .filter(|r| include_ignored || !r.is_ignored())
        .map(|r| MeasurementRow::new(r, metrics.get(&r.id())))
        .collect()
}

/// Writer for measurement tables.
pub struct MeasurementWriter {
    writer: BufWriter<File>,
}

impl MeasurementWriter {
    /// Creates a new file writer.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }

    /// Writes rows as CSV with a header line. Missing values are empty.
    ///
    /// The header is written even when `rows` is empty.
    pub fn write_csv(&mut self, rows: &[MeasurementRow]) -> Result<()> {
        let mut csv = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut self.writer);
        csv.write_record(CSV_HEADER)?;
        for row in rows {
            csv.serialize(row)?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Writes rows as a pretty-printed JSON array. Missing values are `null`.
    pub fn write_json(&mut self, rows: &[MeasurementRow]) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, rows)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes the writer.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roiscope_core::{Rect, RegionKind};
    use tempfile::NamedTempFile;

    fn sample_set() -> RegionSet {
        let mut set = RegionSet::new("a.tif");
        set.insert(Region::new(RegionKind::Vessel, Rect::new(0, 0, 10, 5), "a.tif", "Vessel, large").unwrap())
            .unwrap();
        let mut ignored = Region::new(RegionKind::Square, Rect::new(50, 50, 4, 4), "a.tif", "Square_1").unwrap();
        ignored.set_ignored(true);
        set.insert(ignored).unwrap();
        set
    }

    #[test]
    fn test_write_measurements_csv() {
        let set = sample_set();
        let rows = collect_rows(&set, &HashMap::new(), false);
        assert_eq!(rows.len(), 1);

        let file = NamedTempFile::new().unwrap();
        let mut writer = MeasurementWriter::create(file.path()).unwrap();
        writer.write_csv(&rows).unwrap();
        drop(writer);

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert!(lines[1].contains("\"Vessel, large\",a.tif,Vessel,Vessel,0,0,10,5,50.0,false,"));
        assert!(lines[1].ends_with(",,,,,,,"));
    }

    #[test]
    fn test_csv_names_with_delimiters_read_back() {
        let name = "a,\"b\"\nc";
        let mut set = RegionSet::new("a.tif");
        set.insert(Region::new(RegionKind::Circle, Rect::new(1, 2, 3, 4), "a.tif", name).unwrap())
            .unwrap();
        let rows = collect_rows(&set, &HashMap::new(), false);

        let file = NamedTempFile::new().unwrap();
        let mut writer = MeasurementWriter::create(file.path()).unwrap();
        writer.write_csv(&rows).unwrap();
        drop(writer);

        let mut reader = csv::Reader::from_path(file.path()).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), CSV_HEADER.len());
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][1], name);
        assert_eq!(&records[0][0], rows[0].id.to_string());
        assert_eq!(&records[0][11], "");
    }

    #[test]
    fn test_empty_table_still_has_header() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = MeasurementWriter::create(file.path()).unwrap();
        writer.write_csv(&[]).unwrap();
        drop(writer);

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content.trim_end(), CSV_HEADER.join(","));
    }

    #[test]
    fn test_write_measurements_json_with_ignored() {
        let set = sample_set();
        let rows = collect_rows(&set, &HashMap::new(), true);
        assert_eq!(rows.len(), 2);

        let file = NamedTempFile::new().unwrap();
        let mut writer = MeasurementWriter::create(file.path()).unwrap();
        writer.write_json(&rows).unwrap();
        drop(writer);

        let content = std::fs::read_to_string(file.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["ignored"], true);
        assert!(rows[1]["nearest_distance"].is_null());
    }
}
