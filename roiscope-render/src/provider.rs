//! Pluggable per-region styling.

use roiscope_core::{Category, DisplaySettings, Region, Rgba};

/// Resolved style for one region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionStyle {
    pub fill: Rgba,
    pub border: Rgba,
    pub border_width: f32,
    pub visible: bool,
}

/// Source of fill/border colors, border width and visibility.
///
/// The engine resolves the category once per region and passes it in.
pub trait ColorProvider: Send + Sync {
    fn fill_color(&self, region: &Region, category: Category, settings: &DisplaySettings) -> Rgba;

    fn border_color(&self, region: &Region, category: Category, settings: &DisplaySettings) -> Rgba;

    fn border_width(&self, region: &Region, category: Category, settings: &DisplaySettings) -> f32;

    fn should_render(&self, region: &Region, settings: &DisplaySettings) -> bool;

    /// All four at once.
    fn style(&self, region: &Region, category: Category, settings: &DisplaySettings) -> RegionStyle {
        RegionStyle {
            fill: self.fill_color(region, category, settings),
            border: self.border_color(region, category, settings),
            border_width: self.border_width(region, category, settings),
            visible: self.should_render(region, settings),
        }
    }
}

/// Styles regions from [`DisplaySettings`].
///
/// Ignored regions use the ignore appearance and are drawn only when
/// `show_ignored` is set. A region's own display color replaces the
/// category border color.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultColorProvider;

impl ColorProvider for DefaultColorProvider {
    fn fill_color(&self, region: &Region, category: Category, settings: &DisplaySettings) -> Rgba {
        if region.is_ignored() {
            return settings.ignore.fill_color();
        }
        settings.appearance(category).fill_color()
    }

    fn border_color(&self, region: &Region, category: Category, settings: &DisplaySettings) -> Rgba {
        if region.is_ignored() {
            return settings.ignore.color;
        }
        region
            .display_color()
            .unwrap_or(settings.appearance(category).border_color)
    }

    #[allow(clippy::cast_precision_loss)]
    fn border_width(&self, region: &Region, category: Category, settings: &DisplaySettings) -> f32 {
        if region.is_ignored() {
            return settings.ignore.border_width as f32;
        }
        settings.appearance(category).border_width as f32
    }

    fn should_render(&self, region: &Region, settings: &DisplaySettings) -> bool {
        !region.is_ignored() || settings.ignore.show_ignored
    }
}
