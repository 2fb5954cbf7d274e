//! Buffered overlay renderer.
//!
//! All regions of the current image are rasterized once, in image space,
//! into an off-screen buffer padded by a margin on every side. Pan and zoom
//! then only re-blit the buffer through the viewer's [`ViewTransform`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use roiscope_core::{DisplaySettings, Point, Polygon, Rect, Region, RegionSet, Rgba};

use crate::config::{RenderConfig, RenderMode};
use crate::error::{Error, Result};
use crate::provider::{ColorProvider, DefaultColorProvider};
use crate::raster;
use crate::shape::{Drawable, Fidelity, ShapeCache};
use crate::transform::ViewTransform;

/// Extra slots added whenever the ultra-fast coordinate array has to grow.
const SCRATCH_GROWTH: usize = 100;

/// Buffer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Invalid,
    Rendering,
    Valid,
}

/// Counters for one render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderStats {
    pub mode: RenderMode,
    /// Regions offered to the pass.
    pub considered: usize,
    /// Primitives drawn, one per visible region.
    pub drawn: usize,
    /// Regions rejected by `should_render`.
    pub hidden: usize,
    /// Regions drawn from their bounds because the outline was unusable.
    pub degraded: usize,
    /// Distinct border colors (batch mode only).
    pub color_groups: usize,
    pub elapsed: Duration,
}

impl RenderStats {
    fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            considered: 0,
            drawn: 0,
            hidden: 0,
            degraded: 0,
            color_groups: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// Result of [`RenderingEngine::render`].
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Rendered(RenderStats),
    /// The buffer was valid and recent for an unchanged region set.
    Skipped,
    /// The buffer could not be allocated; retry on the next paint.
    Unavailable,
}

/// Result of a point-in-region test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Tested against the region's outline.
    Exact(bool),
    /// Outline unusable; tested against the bounding box.
    Fallback(bool),
}

impl HitOutcome {
    pub fn is_hit(self) -> bool {
        match self {
            HitOutcome::Exact(hit) | HitOutcome::Fallback(hit) => hit,
        }
    }

    pub fn is_fallback(self) -> bool {
        matches!(self, HitOutcome::Fallback(_))
    }
}

#[derive(Debug, Clone)]
struct LastPass {
    image: String,
    count: usize,
    revision: u64,
    size: (u32, u32),
    at: Instant,
}

/// Renders region overlays for one viewer.
///
/// Owns its buffer exclusively; callers serialize render passes.
pub struct RenderingEngine {
    config: RenderConfig,
    settings: DisplaySettings,
    provider: Arc<dyn ColorProvider>,
    shapes: Arc<ShapeCache>,
    mode: RenderMode,
    state: BufferState,
    buffer: Option<RgbaImage>,
    last: Option<LastPass>,
    scratch: Vec<Point>,
}

impl std::fmt::Debug for RenderingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderingEngine")
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("buffer", &self.buffer_size())
            .field("cached_shapes", &self.shapes.len())
            .finish_non_exhaustive()
    }
}

impl Default for RenderingEngine {
    fn default() -> Self {
        Self::new(RenderConfig::default(), DisplaySettings::default())
    }
}

impl RenderingEngine {
    pub fn new(config: RenderConfig, settings: DisplaySettings) -> Self {
        let shapes = Arc::new(ShapeCache::new(config.circle_segments));
        let scratch = Vec::with_capacity(config.scratch_capacity);
        Self {
            config,
            settings,
            provider: Arc::new(DefaultColorProvider),
            shapes,
            mode: RenderMode::Full,
            state: BufferState::Invalid,
            buffer: None,
            last: None,
            scratch,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn settings(&self) -> &DisplaySettings {
        &self.settings
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    /// Shared shape cache, safe to use from other threads.
    pub fn shape_cache(&self) -> &Arc<ShapeCache> {
        &self.shapes
    }

    pub fn clear_shape_cache(&self) {
        self.shapes.clear();
    }

    /// Current buffer dimensions, margin included.
    pub fn buffer_size(&self) -> Option<(u32, u32)> {
        self.buffer.as_ref().map(RgbaImage::dimensions)
    }

    /// The buffer when it holds a complete pass.
    pub fn buffer(&self) -> Option<&RgbaImage> {
        (self.state == BufferState::Valid)
            .then_some(self.buffer.as_ref())
            .flatten()
    }

    /// Capacity of the ultra-fast coordinate array.
    pub fn scratch_capacity(&self) -> usize {
        self.scratch.capacity()
    }

    pub fn invalidate_buffer(&mut self) {
        if self.state != BufferState::Invalid {
            log::trace!("Render buffer invalidated");
        }
        self.state = BufferState::Invalid;
    }

    /// Replaces the display settings and invalidates the buffer.
    pub fn update_settings(&mut self, settings: DisplaySettings) {
        self.settings = settings;
        self.invalidate_buffer();
    }

    /// Installs a color provider; `None` restores the default.
    pub fn set_color_provider(&mut self, provider: Option<Arc<dyn ColorProvider>>) {
        self.provider = provider.unwrap_or_else(|| Arc::new(DefaultColorProvider));
        self.invalidate_buffer();
    }

    /// Switches strategy; a change invalidates the buffer.
    pub fn set_mode(&mut self, mode: RenderMode) {
        if mode != self.mode {
            log::debug!("Render mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
            self.invalidate_buffer();
        }
    }

    fn margin_i32(&self) -> i32 {
        i32::try_from(self.config.buffer_margin).unwrap_or(i32::MAX)
    }

    fn is_fresh(&self, set: &RegionSet, size: (u32, u32)) -> bool {
        self.state == BufferState::Valid
            && self.last.as_ref().is_some_and(|last| {
                last.image == set.image()
                    && last.count == set.len()
                    && last.revision == set.revision()
                    && last.size == size
                    && last.at.elapsed() < self.config.recency_window
            })
    }

    /// Makes the buffer at least `image + 2 * margin` in each dimension.
    fn ensure_buffer(&mut self, image_width: u32, image_height: u32) -> Result<()> {
        let margin2 = self.config.buffer_margin.saturating_mul(2);
        let too_large = || Error::BufferAllocation {
            width: image_width,
            height: image_height,
        };
        let need_w = image_width.checked_add(margin2).ok_or_else(too_large)?;
        let need_h = image_height.checked_add(margin2).ok_or_else(too_large)?;
        if let Some(buffer) = &self.buffer {
            let (w, h) = buffer.dimensions();
            if w >= need_w && h >= need_h {
                return Ok(());
            }
        }
        let (cur_w, cur_h) = self.buffer_size().unwrap_or((0, 0));
        let (width, height) = (cur_w.max(need_w), cur_h.max(need_h));
        let buffer = raster::try_canvas(width, height)?;
        log::debug!("Render buffer resized to {width}x{height}");
        self.buffer = Some(buffer);
        Ok(())
    }

    /// Renders every region of `set` into the buffer.
    ///
    /// Skipped when the buffer is valid, the set is unchanged and the last
    /// pass is within the recency window.
    pub fn render(&mut self, set: &RegionSet, image_width: u32, image_height: u32) -> RenderOutcome {
        let size = (image_width, image_height);
        if self.is_fresh(set, size) {
            log::trace!("Skipping render of '{}': buffer is fresh", set.image());
            return RenderOutcome::Skipped;
        }
        if let Err(e) = self.ensure_buffer(image_width, image_height) {
            log::warn!("Render of '{}' unavailable: {e}", set.image());
            self.state = BufferState::Invalid;
            return RenderOutcome::Unavailable;
        }
        let Some(mut buffer) = self.buffer.take() else {
            self.state = BufferState::Invalid;
            return RenderOutcome::Unavailable;
        };

        self.state = BufferState::Rendering;
        let started = Instant::now();
        raster::clear(&mut buffer);
        let mut stats = match self.mode {
            RenderMode::Full => {
                let margin = f64::from(self.config.buffer_margin);
                self.draw_full(&mut buffer, set.regions(), &ViewTransform::translation(margin, margin))
            }
            RenderMode::Batch => self.draw_batch(&mut buffer, set.regions()),
            RenderMode::UltraFast => self.draw_ultra_fast(&mut buffer, set.regions()),
        };
        stats.elapsed = started.elapsed();

        self.buffer = Some(buffer);
        self.state = BufferState::Valid;
        self.last = Some(LastPass {
            image: set.image().to_string(),
            count: set.len(),
            revision: set.revision(),
            size,
            at: Instant::now(),
        });
        log::debug!(
            "Rendered {} of {} regions for '{}' in {:?} ({:?})",
            stats.drawn,
            stats.considered,
            set.image(),
            stats.elapsed,
            stats.mode
        );
        RenderOutcome::Rendered(stats)
    }

    /// Full fidelity: fill then stroke each visible region's resolved shape.
    fn draw_full(&self, canvas: &mut RgbaImage, regions: &[Region], to_canvas: &ViewTransform) -> RenderStats {
        let mut stats = RenderStats::new(RenderMode::Full);
        for region in regions {
            stats.considered += 1;
            let category = region.category();
            let style = self.provider.style(region, category, &self.settings);
            if !style.visible {
                stats.hidden += 1;
                continue;
            }
            let shape = self.shapes.get(region);
            if shape.is_degraded() {
                stats.degraded += 1;
            }
            let rings = shape.drawable.screen_rings(to_canvas);
            if !raster::fill_rings(canvas, &rings, style.fill) {
                log::debug!("Skipping fill of '{}': non-finite coordinates", region.name());
            }
            for ring in &rings {
                raster::stroke_polyline(canvas, ring, true, style.border, style.border_width);
            }
            stats.drawn += 1;
        }
        stats
    }

    /// Batch: bounds outlines only, grouped by border color.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn draw_batch(&self, canvas: &mut RgbaImage, regions: &[Region]) -> RenderStats {
        let mut stats = RenderStats::new(RenderMode::Batch);
        let mut groups: Vec<(Rgba, Vec<Rect>)> = Vec::new();
        let mut group_of: HashMap<Rgba, usize> = HashMap::new();
        for region in regions {
            stats.considered += 1;
            if !self.provider.should_render(region, &self.settings) {
                stats.hidden += 1;
                continue;
            }
            let color = self
                .provider
                .border_color(region, region.category(), &self.settings);
            let idx = *group_of.entry(color).or_insert_with(|| {
                groups.push((color, Vec::new()));
                groups.len() - 1
            });
            groups[idx].1.push(region.bounds());
        }

        let margin = self.margin_i32();
        let width = self.config.batch_stroke_width.round().max(1.0) as u32;
        for (color, rects) in &groups {
            for rect in rects {
                raster::stroke_rect(
                    canvas,
                    rect.x.saturating_add(margin),
                    rect.y.saturating_add(margin),
                    rect.width,
                    rect.height,
                    *color,
                    width,
                );
                stats.drawn += 1;
            }
        }
        stats.color_groups = groups.len();
        stats
    }

    /// Ultra-fast: outer outline of every visible region in one color.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn draw_ultra_fast(&mut self, canvas: &mut RgbaImage, regions: &[Region]) -> RenderStats {
        let mut stats = RenderStats::new(RenderMode::UltraFast);
        let color = self.config.ultra_fast_color;
        let width = self.config.ultra_fast_stroke_width;
        let margin = f64::from(self.config.buffer_margin);
        let to_canvas = ViewTransform::translation(margin, margin);
        for region in regions {
            stats.considered += 1;
            if !self.provider.should_render(region, &self.settings) {
                stats.hidden += 1;
                continue;
            }
            let shape = self.shapes.get(region);
            let outer = match &shape.drawable {
                Drawable::Polygon(polygon) => Some((Point::new(0.0, 0.0), polygon)),
                Drawable::Path { base, rings } => rings.first().map(|ring| (*base, ring)),
                Drawable::Rect(_) => None,
            };
            match outer {
                Some((base, ring)) => {
                    let needed = ring.len();
                    self.scratch.clear();
                    if needed > self.scratch.capacity() {
                        self.scratch.reserve_exact(needed + SCRATCH_GROWTH);
                    }
                    self.scratch.extend(
                        ring.vertices()
                            .iter()
                            .map(|&p| to_canvas.to_screen_with_base(base, p)),
                    );
                    raster::stroke_polyline(canvas, &self.scratch, true, color, width);
                }
                None => {
                    let b = region.bounds();
                    let m = self.margin_i32();
                    raster::stroke_rect(
                        canvas,
                        b.x.saturating_add(m),
                        b.y.saturating_add(m),
                        b.width,
                        b.height,
                        color,
                        width.round().max(1.0) as u32,
                    );
                }
            }
            stats.drawn += 1;
        }
        stats
    }

    /// Blits the image area of a valid buffer onto `target`.
    ///
    /// Returns `false`, drawing nothing, when the buffer is not valid.
    pub fn copy_to_viewport(&self, target: &mut RgbaImage, transform: &ViewTransform) -> bool {
        let (Some(buffer), Some(last)) = (self.buffer(), self.last.as_ref()) else {
            return false;
        };
        let (buf_w, buf_h) = buffer.dimensions();
        let margin2 = self.config.buffer_margin.saturating_mul(2);
        let width = last.size.0.min(buf_w.saturating_sub(margin2));
        let height = last.size.1.min(buf_h.saturating_sub(margin2));
        raster::blit(target, buffer, self.config.buffer_margin, (width, height), transform);
        true
    }

    /// Draws `regions` straight onto `target` at full fidelity, bypassing the buffer.
    pub fn render_directly(
        &self,
        target: &mut RgbaImage,
        regions: &[Region],
        transform: &ViewTransform,
    ) -> RenderStats {
        let started = Instant::now();
        let mut stats = self.draw_full(target, regions, transform);
        stats.elapsed = started.elapsed();
        stats
    }

    /// Tests whether a screen point falls inside `region`.
    ///
    /// The cached shape is mapped forward through `transform` (base offset
    /// first). Unusable outlines or coordinates fall back to the bounds.
    pub fn is_point_in_region(&self, point: Point, region: &Region, transform: &ViewTransform) -> HitOutcome {
        let shape = self.shapes.get(region);
        if let Fidelity::Degraded(reason) = &shape.fidelity {
            log::debug!("Hit test on '{}' uses bounds: {reason}", region.name());
            return HitOutcome::Fallback(bounds_hit(point, region, transform));
        }
        let rings = shape.drawable.screen_rings(transform);
        let finite = point.x.is_finite()
            && point.y.is_finite()
            && rings.iter().flatten().all(|p| p.x.is_finite() && p.y.is_finite());
        if !finite {
            log::debug!("Hit test on '{}' uses bounds: non-finite coordinates", region.name());
            return HitOutcome::Fallback(bounds_hit(point, region, transform));
        }
        let crossings = rings
            .into_iter()
            .map(Polygon::new)
            .filter(|ring| ring.contains(point))
            .count();
        HitOutcome::Exact(crossings % 2 == 1)
    }

    /// Topmost visible region under a screen point.
    pub fn find_region_at<'a>(
        &self,
        point: Point,
        regions: &'a [Region],
        transform: &ViewTransform,
    ) -> Option<&'a Region> {
        regions.iter().rev().find(|region| {
            self.provider.should_render(region, &self.settings)
                && self.is_point_in_region(point, region, transform).is_hit()
        })
    }
}

fn bounds_hit(point: Point, region: &Region, transform: &ViewTransform) -> bool {
    let p = transform.to_image_exact(point);
    p.x.is_finite() && p.y.is_finite() && region.bounds().contains(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roiscope_core::RegionKind;

    const IMAGE: &str = "slide.tif";

    fn vessel(x: i32, y: i32) -> Region {
        Region::new(RegionKind::Vessel, Rect::new(x, y, 10, 10), IMAGE, "Vessel_1").unwrap()
    }

    fn set_of(regions: Vec<Region>) -> RegionSet {
        let mut set = RegionSet::new(IMAGE);
        for region in regions {
            set.insert(region).unwrap();
        }
        set
    }

    #[test]
    fn test_state_machine_and_skip() {
        let mut engine = RenderingEngine::new(
            RenderConfig::default().with_recency_window(Duration::from_secs(60)),
            DisplaySettings::default(),
        );
        let set = set_of(vec![vessel(10, 10)]);
        assert_eq!(engine.state(), BufferState::Invalid);
        assert!(matches!(engine.render(&set, 50, 50), RenderOutcome::Rendered(_)));
        assert_eq!(engine.state(), BufferState::Valid);
        assert_eq!(engine.render(&set, 50, 50), RenderOutcome::Skipped);

        engine.update_settings(DisplaySettings::default());
        assert_eq!(engine.state(), BufferState::Invalid);
        assert!(matches!(engine.render(&set, 50, 50), RenderOutcome::Rendered(_)));

        engine.set_mode(RenderMode::Batch);
        assert!(matches!(engine.render(&set, 50, 50), RenderOutcome::Rendered(_)));
        engine.set_mode(RenderMode::Batch);
        assert_eq!(engine.render(&set, 50, 50), RenderOutcome::Skipped);
    }

    #[test]
    fn test_mutation_forces_render() {
        let mut engine = RenderingEngine::new(
            RenderConfig::default().with_recency_window(Duration::from_secs(60)),
            DisplaySettings::default(),
        );
        let mut set = set_of(vec![vessel(10, 10)]);
        engine.render(&set, 50, 50);
        let id = set.regions()[0].id();
        set.update(id, |r| r.set_ignored(true)).unwrap();
        assert!(matches!(engine.render(&set, 50, 50), RenderOutcome::Rendered(_)));
    }

    #[test]
    fn test_buffer_grows_never_shrinks() {
        let mut engine = RenderingEngine::default();
        let set = set_of(vec![vessel(10, 10)]);
        engine.render(&set, 300, 200);
        assert_eq!(engine.buffer_size(), Some((500, 400)));
        engine.invalidate_buffer();
        engine.render(&set, 100, 100);
        assert_eq!(engine.buffer_size(), Some((500, 400)));
        engine.invalidate_buffer();
        engine.render(&set, 400, 100);
        assert_eq!(engine.buffer_size(), Some((600, 400)));
    }

    #[test]
    fn test_full_mode_draws_at_margin() {
        let mut engine = RenderingEngine::default();
        let set = set_of(vec![vessel(0, 0)]);
        engine.render(&set, 20, 20);
        let buffer = engine.buffer().unwrap();
        // border pixel at image (0,0) lands at (margin, margin)
        assert_eq!(buffer.get_pixel(100, 100).0, Rgba::RED.to_array());
        assert_eq!(buffer.get_pixel(99, 99).0[3], 0);
        // interior carries the translucent fill
        assert_eq!(buffer.get_pixel(105, 105).0, [255, 0, 0, 51]);
    }

    #[test]
    fn test_hidden_regions_are_skipped() {
        let mut engine = RenderingEngine::default();
        let mut hidden = vessel(30, 30);
        hidden.set_ignored(true);
        let set = set_of(vec![vessel(0, 0), hidden]);
        let RenderOutcome::Rendered(stats) = engine.render(&set, 60, 60) else {
            panic!("expected a render pass");
        };
        assert_eq!(stats.considered, 2);
        assert_eq!(stats.drawn, 1);
        assert_eq!(stats.hidden, 1);
    }

    #[test]
    fn test_ultra_fast_grows_scratch() {
        let mut engine = RenderingEngine::new(
            RenderConfig::default().with_scratch_capacity(16),
            DisplaySettings::default(),
        );
        engine.set_mode(RenderMode::UltraFast);
        let circle = Region::new(RegionKind::Circle, Rect::new(5, 5, 30, 30), IMAGE, "c").unwrap();
        let set = set_of(vec![circle]);
        engine.render(&set, 50, 50);
        assert!(engine.scratch_capacity() >= 48);
        let buffer = engine.buffer().unwrap();
        assert!(buffer.pixels().any(|p| p.0 == Rgba::YELLOW.to_array()));
    }

    #[test]
    fn test_copy_requires_valid_buffer() {
        let mut engine = RenderingEngine::default();
        let mut target = RgbaImage::new(40, 40);
        assert!(!engine.copy_to_viewport(&mut target, &ViewTransform::IDENTITY));
        let set = set_of(vec![vessel(0, 0)]);
        engine.render(&set, 20, 20);
        let zoom = ViewTransform::new(2.0, 2.0, 0.0, 0.0).unwrap();
        assert!(engine.copy_to_viewport(&mut target, &zoom));
        assert_eq!(target.get_pixel(0, 0).0, Rgba::RED.to_array());
        assert_eq!(target.get_pixel(39, 39).0[3], 0);
    }

    #[test]
    fn test_hit_test_and_find() {
        let engine = RenderingEngine::default();
        let below = vessel(0, 0);
        let above = vessel(5, 5);
        let regions = vec![below.clone(), above.clone()];
        let t = ViewTransform::new(2.0, 2.0, 10.0, 10.0).unwrap();

        // image (7,7) -> screen (24,24), inside both
        let p = Point::new(24.0, 24.0);
        assert_eq!(engine.is_point_in_region(p, &below, &t), HitOutcome::Exact(true));
        assert_eq!(engine.find_region_at(p, &regions, &t).map(Region::id), Some(above.id()));

        // image (2,2) only inside the lower one
        let q = Point::new(14.0, 14.0);
        assert_eq!(engine.find_region_at(q, &regions, &t).map(Region::id), Some(below.id()));
        assert!(engine.find_region_at(Point::new(1.0, 1.0), &regions, &t).is_none());
    }

    #[test]
    fn test_hit_test_falls_back_for_degenerate_outline() {
        let engine = RenderingEngine::default();
        let sliver = Polygon::from_coords([(0.0, 0.0), (10.0, 10.0)]);
        let region = Region::nucleus(sliver, IMAGE, "Nucleus_1").unwrap();
        let outcome = engine.is_point_in_region(Point::new(2.0, 8.0), &region, &ViewTransform::IDENTITY);
        assert_eq!(outcome, HitOutcome::Fallback(true));
        assert!(outcome.is_fallback());
    }
}
