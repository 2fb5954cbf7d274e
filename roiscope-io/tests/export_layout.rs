use std::collections::HashMap;

use roiscope_core::{Polygon, Rect, Region, RegionKind, RegionSet, RegionStore, SpatialMetrics};
use roiscope_io::{
    collect_rows, plan_image_export, plan_master_archive, Error, ImageExport, JsonRoiEncoder,
    MeasurementWriter, RoiEncoder, RoiRecord,
};
use tempfile::NamedTempFile;

fn square(image: &str, name: &str, x: i32) -> Region {
    Region::new(RegionKind::Square, Rect::new(x, 0, 5, 5), image, name).unwrap()
}

#[test]
fn test_single_region_exports_lone_file() {
    let regions = vec![square("slide 1.tif", "Square_1", 0)];
    let plan = plan_image_export("slide 1.tif", &regions).unwrap();
    assert!(matches!(plan, ImageExport::Single(_)));
    assert_eq!(plan.file_name(), "slide_1.roi");
    assert_eq!(plan.entries().len(), 1);
}

#[test]
fn test_several_regions_export_numbered_archive() {
    let regions = vec![
        square("slide.tif", "Square_1", 0),
        square("slide.tif", "Square_2", 10),
        square("slide.tif", "Square_3", 20),
    ];
    let plan = plan_image_export("slide.tif", &regions).unwrap();
    assert_eq!(plan.file_name(), "slide_ROIs.zip");
    let names: Vec<&str> = plan.entries().iter().map(|e| e.file_name.as_str()).collect();
    assert_eq!(names, ["0001-Square_1.roi", "0002-Square_2.roi", "0003-Square_3.roi"]);

    let encoded = plan.encode(&JsonRoiEncoder).unwrap();
    assert_eq!(encoded.len(), 3);
    assert!(encoded.iter().all(|(_, bytes)| !bytes.is_empty()));
}

#[test]
fn test_empty_image_is_an_error() {
    let err = plan_image_export("empty.tif", &[]).unwrap_err();
    assert!(matches!(err, Error::EmptyExport(_)));
}

#[test]
fn test_master_archive_gives_every_image_a_sub_archive() {
    let store = RegionStore::new();
    store.add(square("a b.tif", "Square_1", 0)).unwrap();
    store.add(square("c.png", "Square_1", 0)).unwrap();
    store.add(square("c.png", "Square_2", 10)).unwrap();

    let sets: Vec<_> = store.images().into_iter().filter_map(|i| store.snapshot(&i)).collect();
    let master = plan_master_archive(sets.iter().map(|s| &**s), "all_ROIs.zip").unwrap();
    assert_eq!(master.region_count(), 3);

    let mut names: Vec<&str> = master.archives.iter().map(|a| a.file_name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, ["a_b_ROIs.zip", "c_ROIs.zip"]);
    let single = master.archives.iter().find(|a| a.image == "a b.tif").unwrap();
    assert_eq!(single.entries[0].file_name, "0001-Square_1.roi");
}

#[test]
fn test_master_archive_of_nothing_is_an_error() {
    let empty = RegionSet::new("x.tif");
    assert!(matches!(
        plan_master_archive([&empty], "all.zip"),
        Err(Error::EmptyExport(_))
    ));
}

struct Failing;

impl RoiEncoder for Failing {
    fn encode(&self, record: &RoiRecord) -> roiscope_io::Result<Vec<u8>> {
        Err(Error::Io(std::io::Error::other(format!("cannot encode {}", record.name))))
    }
}

#[test]
fn test_encoder_failure_propagates() {
    let regions = vec![square("a.tif", "Square_1", 0), square("a.tif", "Square_2", 10)];
    let plan = plan_image_export("a.tif", &regions).unwrap();
    assert!(matches!(plan.encode(&Failing), Err(Error::Io(_))));
}

#[test]
fn test_measurements_with_neighbor_metrics() {
    let mut set = RegionSet::new("a.tif");
    let nucleus = Region::nucleus(
        Polygon::from_coords([(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]),
        "a.tif",
        "Nucleus_1",
    )
    .unwrap();
    let nucleus_id = set.insert(nucleus).unwrap();
    let other_id = set.insert(square("a.tif", "Square_1", 30)).unwrap();

    let mut metrics = HashMap::new();
    metrics.insert(
        nucleus_id,
        SpatialMetrics::new(nucleus_id, vec![other_id], &[27.5], 0.001),
    );

    let rows = collect_rows(&set, &metrics, true);
    assert_eq!(rows[0].neighbor_count, Some(1));
    assert_eq!(rows[0].nearest_distance, Some(27.5));
    assert_eq!(rows[1].neighbor_count, None);

    let file = NamedTempFile::new().unwrap();
    let mut writer = MeasurementWriter::create(file.path()).unwrap();
    writer.write_csv(&rows).unwrap();
    drop(writer);
    let content = std::fs::read_to_string(file.path()).unwrap();
    assert_eq!(content.lines().count(), 3);
    assert!(content.lines().nth(1).unwrap().contains(",1,27.5,27.5,0.001,"));
}
