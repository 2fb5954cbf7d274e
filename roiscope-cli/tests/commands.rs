use std::io::Write;
use std::process::Command;

use tempfile::{tempdir, NamedTempFile};

const SEGMENTATION: &str = r#"{
    "images": [
        {
            "image": "slide 1.tif", "width": 300, "height": 200,
            "detections": [
                {"kind": "cell", "bounds": [100, 60, 60, 60]},
                {"kind": "nucleus", "bounds": [120, 80, 20, 20],
                 "polygon": [[120, 80], [140, 80], [140, 100], [120, 100]]},
                {"kind": "cytoplasm", "bounds": [105, 65, 50, 50]},
                {"kind": "vessel", "bounds": [2, 2, 30, 30]}
            ],
            "cells": [{"cell": 0, "nucleus": 1, "cytoplasm": 2}]
        },
        {
            "image": "slide 2.tif", "width": 100, "height": 100,
            "detections": [{"kind": "circle", "bounds": [40, 40, 20, 20]}]
        }
    ]
}"#;

fn input_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(SEGMENTATION.as_bytes()).unwrap();
    file
}

fn roiscope(args: &[&str]) -> String {
    let output = Command::new(env!("CARGO_BIN_EXE_roiscope"))
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "roiscope {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn test_render_writes_one_png_per_image() {
    let input = input_file();
    let dir = tempdir().unwrap();
    let out = dir.path().join("overlays");
    roiscope(&[
        "render",
        "-i",
        input.path().to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
        "--mode",
        "batch",
        "--scale-x",
        "2",
        "--scale-y",
        "1.5",
    ]);
    let first = image::open(out.join("slide_1_overlay.png")).unwrap();
    assert_eq!((first.width(), first.height()), (600, 300));
    assert!(out.join("slide_2_overlay.png").exists());
}

#[test]
fn test_render_single_image_directly() {
    let input = input_file();
    let dir = tempdir().unwrap();
    let out = dir.path().join("one.png");
    roiscope(&[
        "render",
        "-i",
        input.path().to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
        "--image",
        "slide 2.tif",
        "--direct",
    ]);
    let rendered = image::open(&out).unwrap().to_rgba8();
    assert_eq!(rendered.dimensions(), (100, 100));
    assert!(rendered.pixels().any(|p| p.0[3] > 0));
}

#[test]
fn test_stats_json() {
    let input = input_file();
    let stdout = roiscope(&["stats", "-i", input.path().to_str().unwrap(), "--json"]);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["images"], 2);
    assert_eq!(value["total_regions"], 5);
    assert_eq!(value["ignored_regions"], 1);
    let first = &value["per_image"][0];
    assert_eq!(first["complete_cells"], 1);
    let ratio = first["mean_nc_ratio"].as_f64().unwrap();
    assert!((ratio - 400.0 / 2500.0).abs() < 1e-9);
}

#[test]
fn test_measure_csv_skips_ignored_by_default() {
    let input = input_file();
    let out = NamedTempFile::new().unwrap();
    roiscope(&[
        "measure",
        "-i",
        input.path().to_str().unwrap(),
        "-o",
        out.path().to_str().unwrap(),
        "--format",
        "csv",
    ]);
    let content = std::fs::read_to_string(out.path()).unwrap();
    assert_eq!(content.lines().count(), 5);

    roiscope(&[
        "measure",
        "-i",
        input.path().to_str().unwrap(),
        "-o",
        out.path().to_str().unwrap(),
        "--format",
        "csv",
        "--include-ignored",
    ]);
    let content = std::fs::read_to_string(out.path()).unwrap();
    assert_eq!(content.lines().count(), 6);
}

#[test]
fn test_export_plan_lists_sub_archives() {
    let input = input_file();
    let stdout = roiscope(&["export-plan", "-i", input.path().to_str().unwrap()]);
    assert!(stdout.starts_with("All_ROIs.zip (5 regions)"));
    assert!(stdout.contains("slide_1_ROIs.zip"));
    assert!(stdout.contains("slide_2_ROIs.zip"));
    assert!(stdout.contains("0001-Circle_1.roi (oval)"));
}

#[test]
fn test_pick_finds_topmost_region() {
    let input = input_file();
    let stdout = roiscope(&[
        "pick",
        "-i",
        input.path().to_str().unwrap(),
        "--image",
        "slide 1.tif",
        "--x",
        "130",
        "--y",
        "90",
    ]);
    assert!(stdout.starts_with("Cytoplasm_1"));
}

#[test]
fn test_render_rejects_oversize_canvas() {
    let input = input_file();
    let dir = tempdir().unwrap();
    let out = dir.path().join("huge.png");
    let output = Command::new(env!("CARGO_BIN_EXE_roiscope"))
        .args([
            "render",
            "-i",
            input.path().to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--image",
            "slide 2.tif",
            "--direct",
            "--scale-x",
            "1e9",
            "--scale-y",
            "1e9",
        ])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(!out.exists());
}
