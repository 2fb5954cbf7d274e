#![allow(clippy::uninlined_format_args)]
use std::sync::Arc;
use std::thread;

use roiscope_core::{DisplaySettings, Polygon, Rect, Region, RegionKind, RegionSet, Rgba};
use roiscope_render::{
    ColorProvider, RenderConfig, RenderMode, RenderOutcome, RenderingEngine, ShapeCache,
    ViewTransform,
};

const IMAGE: &str = "large.tif";

/// 5000 regions on a 100x50 grid, every 7th one ignored.
fn dense_set() -> (RegionSet, usize) {
    let mut set = RegionSet::new(IMAGE);
    let mut hidden = 0;
    for i in 0..5000 {
        let x = (i % 100) * 20;
        let y = (i / 100) * 20;
        let mut region = match i % 3 {
            0 => Region::nucleus(
                Polygon::from_coords([
                    (f64::from(x), f64::from(y)),
                    (f64::from(x + 12), f64::from(y)),
                    (f64::from(x + 6), f64::from(y + 12)),
                ]),
                IMAGE,
                format!("Nucleus_{}", i),
            ),
            1 => Region::new(RegionKind::Vessel, Rect::new(x, y, 12, 12), IMAGE, format!("Vessel_{}", i)),
            _ => Region::new(RegionKind::Circle, Rect::new(x, y, 10, 10), IMAGE, format!("cell {}", i)),
        }
        .unwrap();
        if i % 7 == 0 {
            region.set_ignored(true);
            hidden += 1;
        }
        set.insert(region).unwrap();
    }
    (set, hidden)
}

#[test]
fn test_batch_mode_draws_one_primitive_per_visible_region() {
    let (set, hidden) = dense_set();
    let mut engine = RenderingEngine::default();
    engine.set_mode(RenderMode::Batch);
    let RenderOutcome::Rendered(stats) = engine.render(&set, 2000, 1000) else {
        panic!("batch render did not run");
    };
    assert_eq!(stats.considered, 5000);
    assert_eq!(stats.hidden, hidden);
    assert_eq!(stats.drawn, 5000 - hidden);
    // nucleus blue, vessel red, name heuristic puts "cell" regions in yellow
    assert_eq!(stats.color_groups, 3);
}

#[test]
fn test_ultra_fast_mode_draws_one_primitive_per_visible_region() {
    let (set, hidden) = dense_set();
    let mut engine = RenderingEngine::default();
    engine.set_mode(RenderMode::UltraFast);
    let RenderOutcome::Rendered(stats) = engine.render(&set, 2000, 1000) else {
        panic!("ultra-fast render did not run");
    };
    assert_eq!(stats.drawn, 5000 - hidden);
    let buffer = engine.buffer().unwrap();
    assert!(buffer
        .pixels()
        .filter(|p| p.0[3] > 0)
        .all(|p| p.0 == Rgba::YELLOW.to_array()));
}

#[test]
fn test_full_mode_and_viewport_copy() {
    let (set, hidden) = dense_set();
    let mut engine = RenderingEngine::default();
    let RenderOutcome::Rendered(stats) = engine.render(&set, 2000, 1000) else {
        panic!("full render did not run");
    };
    assert_eq!(stats.drawn, 5000 - hidden);
    assert_eq!(stats.degraded, 0);

    let mut viewport = image::RgbaImage::new(400, 300);
    let t = ViewTransform::new(0.5, 0.25, -20.0, 10.0).unwrap();
    assert!(engine.copy_to_viewport(&mut viewport, &t));
    assert!(viewport.pixels().any(|p| p.0[3] > 0));
}

#[test]
fn test_shape_cache_concurrent_access() {
    let (set, _) = dense_set();
    let regions: Arc<Vec<Region>> = Arc::new(set.regions().to_vec());
    let cache = Arc::new(ShapeCache::new(32));
    let workers: Vec<_> = (0..4)
        .map(|w| {
            let cache = Arc::clone(&cache);
            let regions = Arc::clone(&regions);
            thread::spawn(move || {
                for region in regions.iter().skip(w).step_by(2) {
                    let first = cache.get(region);
                    assert_eq!(*first, *cache.get(region));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(cache.len(), 5000);
}

struct Monochrome;

impl ColorProvider for Monochrome {
    fn fill_color(&self, _: &Region, _: roiscope_core::Category, _: &DisplaySettings) -> Rgba {
        Rgba::TRANSPARENT
    }

    fn border_color(&self, _: &Region, _: roiscope_core::Category, _: &DisplaySettings) -> Rgba {
        Rgba::CYAN
    }

    fn border_width(&self, _: &Region, _: roiscope_core::Category, _: &DisplaySettings) -> f32 {
        1.0
    }

    fn should_render(&self, _: &Region, _: &DisplaySettings) -> bool {
        true
    }
}

#[test]
fn test_custom_provider_and_reset() {
    let (set, hidden) = dense_set();
    let mut engine = RenderingEngine::new(RenderConfig::default(), DisplaySettings::default());
    engine.set_mode(RenderMode::Batch);
    engine.set_color_provider(Some(Arc::new(Monochrome)));
    let RenderOutcome::Rendered(stats) = engine.render(&set, 2000, 1000) else {
        panic!("render did not run");
    };
    assert_eq!(stats.drawn, 5000);
    assert_eq!(stats.color_groups, 1);

    engine.set_color_provider(None);
    let RenderOutcome::Rendered(stats) = engine.render(&set, 2000, 1000) else {
        panic!("provider change must invalidate the buffer");
    };
    assert_eq!(stats.drawn, 5000 - hidden);
}
