//! Display settings consumed by color providers.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::color::Rgba;
use crate::error::{Error, Result};

/// Styling for one category.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AppearanceSettings {
    pub border_color: Rgba,
    /// Fill alpha as a fraction in `[0, 1]`.
    pub fill_opacity: f32,
    /// Stroke width in pixels, at least 1.
    pub border_width: u32,
}

impl AppearanceSettings {
    /// Validated constructor.
    ///
    /// # Errors
    /// [`Error::InvalidSettings`] when opacity is outside `[0, 1]` or the
    /// width is zero.
    pub fn new(border_color: Rgba, fill_opacity: f32, border_width: u32) -> Result<Self> {
        let settings = Self {
            border_color,
            fill_opacity,
            border_width,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Fill color: border color with alpha from the opacity.
    pub fn fill_color(&self) -> Rgba {
        self.border_color.with_opacity(self.fill_opacity)
    }

    #[must_use]
    pub fn with_border_color(self, border_color: Rgba) -> Self {
        Self {
            border_color,
            ..self
        }
    }

    #[must_use]
    pub fn with_fill_opacity(self, fill_opacity: f32) -> Self {
        Self {
            fill_opacity,
            ..self
        }
    }

    #[must_use]
    pub fn with_border_width(self, border_width: u32) -> Self {
        Self {
            border_width,
            ..self
        }
    }

    /// # Errors
    /// [`Error::InvalidSettings`] describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        validate_opacity(self.fill_opacity)?;
        validate_width(self.border_width)
    }

    /// Factory defaults for a category.
    pub fn default_for(category: Category) -> Self {
        let (border_color, fill_opacity, border_width) = match category {
            Category::Vessel => (Rgba::RED, 0.2, 2),
            Category::Nucleus => (Rgba::BLUE, 0.2, 2),
            Category::Cytoplasm => (Rgba::GREEN, 0.2, 2),
            Category::Cell => (Rgba::YELLOW, 0.1, 1),
        };
        Self {
            border_color,
            fill_opacity,
            border_width,
        }
    }
}

/// Border-exclusion rule and styling of ignored regions.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IgnoreSettings {
    /// Regions closer than this to any image edge are ignored.
    pub border_distance: i32,
    pub color: Rgba,
    pub fill_opacity: f32,
    pub border_width: u32,
    /// Draw ignored regions instead of hiding them.
    pub show_ignored: bool,
}

impl Default for IgnoreSettings {
    fn default() -> Self {
        Self {
            border_distance: 10,
            color: Rgba::GRAY,
            fill_opacity: 0.2,
            border_width: 2,
            show_ignored: false,
        }
    }
}

impl IgnoreSettings {
    pub fn fill_color(&self) -> Rgba {
        self.color.with_opacity(self.fill_opacity)
    }

    #[must_use]
    pub fn with_border_distance(self, border_distance: i32) -> Self {
        Self {
            border_distance,
            ..self
        }
    }

    #[must_use]
    pub fn with_show_ignored(self, show_ignored: bool) -> Self {
        Self {
            show_ignored,
            ..self
        }
    }

    /// # Errors
    /// [`Error::InvalidSettings`] describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.border_distance < 0 {
            return Err(Error::InvalidSettings(format!(
                "border distance must be non-negative, got {}",
                self.border_distance
            )));
        }
        validate_opacity(self.fill_opacity)?;
        validate_width(self.border_width)
    }
}

/// Everything a renderer needs to style regions.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DisplaySettings {
    pub vessel: AppearanceSettings,
    pub nucleus: AppearanceSettings,
    pub cytoplasm: AppearanceSettings,
    pub cell: AppearanceSettings,
    pub ignore: IgnoreSettings,
    pub pixels_per_micrometer: f64,
    pub scale_unit: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            vessel: AppearanceSettings::default_for(Category::Vessel),
            nucleus: AppearanceSettings::default_for(Category::Nucleus),
            cytoplasm: AppearanceSettings::default_for(Category::Cytoplasm),
            cell: AppearanceSettings::default_for(Category::Cell),
            ignore: IgnoreSettings::default(),
            pixels_per_micrometer: 1.0,
            scale_unit: "µm".to_string(),
        }
    }
}

impl DisplaySettings {
    pub fn appearance(&self, category: Category) -> &AppearanceSettings {
        match category {
            Category::Vessel => &self.vessel,
            Category::Nucleus => &self.nucleus,
            Category::Cytoplasm => &self.cytoplasm,
            Category::Cell => &self.cell,
        }
    }

    /// Copy with one category's appearance replaced.
    #[must_use]
    pub fn with_appearance(mut self, category: Category, appearance: AppearanceSettings) -> Self {
        match category {
            Category::Vessel => self.vessel = appearance,
            Category::Nucleus => self.nucleus = appearance,
            Category::Cytoplasm => self.cytoplasm = appearance,
            Category::Cell => self.cell = appearance,
        }
        self
    }

    #[must_use]
    pub fn with_ignore(mut self, ignore: IgnoreSettings) -> Self {
        self.ignore = ignore;
        self
    }

    /// # Errors
    /// [`Error::InvalidSettings`] when the scale is not strictly positive.
    pub fn with_scale(mut self, pixels_per_micrometer: f64, unit: impl Into<String>) -> Result<Self> {
        self.pixels_per_micrometer = pixels_per_micrometer;
        self.scale_unit = unit.into();
        self.validate()?;
        Ok(self)
    }

    /// Converts a pixel length to the physical unit.
    pub fn to_physical(&self, pixels: f64) -> f64 {
        pixels / self.pixels_per_micrometer
    }

    /// Checks every field.
    ///
    /// # Errors
    /// [`Error::InvalidSettings`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        for category in Category::ALL {
            if let Err(Error::InvalidSettings(msg)) = self.appearance(category).validate() {
                return Err(Error::InvalidSettings(format!("{category}: {msg}")));
            }
        }
        self.ignore.validate()?;
        if !(self.pixels_per_micrometer.is_finite() && self.pixels_per_micrometer > 0.0) {
            return Err(Error::InvalidSettings(format!(
                "pixels per micrometer must be positive, got {}",
                self.pixels_per_micrometer
            )));
        }
        if self.scale_unit.trim().is_empty() {
            return Err(Error::InvalidSettings("scale unit must not be empty".into()));
        }
        Ok(())
    }
}

fn validate_opacity(opacity: f32) -> Result<()> {
    if (0.0..=1.0).contains(&opacity) {
        Ok(())
    } else {
        Err(Error::InvalidSettings(format!(
            "fill opacity must be in [0, 1], got {opacity}"
        )))
    }
}

fn validate_width(width: u32) -> Result<()> {
    if width >= 1 {
        Ok(())
    } else {
        Err(Error::InvalidSettings("border width must be at least 1".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = DisplaySettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.appearance(Category::Nucleus).border_color, Rgba::BLUE);
        assert_eq!(settings.cell.border_width, 1);
        assert_eq!(settings.vessel.fill_color(), Rgba::new(255, 0, 0, 51));
        assert_eq!(settings.ignore.border_distance, 10);
        assert!(!settings.ignore.show_ignored);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(AppearanceSettings::new(Rgba::RED, 1.5, 2).is_err());
        assert!(AppearanceSettings::new(Rgba::RED, 0.5, 0).is_err());
        assert!(DisplaySettings::default().with_scale(0.0, "µm").is_err());
        assert!(DisplaySettings::default().with_scale(2.0, " ").is_err());
        let bad = DisplaySettings::default()
            .with_appearance(Category::Cell, AppearanceSettings::default_for(Category::Cell).with_fill_opacity(-0.1));
        assert!(matches!(bad.validate(), Err(Error::InvalidSettings(_))));
    }

    #[test]
    fn test_physical_scale() {
        let settings = DisplaySettings::default().with_scale(4.0, "µm").unwrap();
        assert!((settings.to_physical(10.0) - 2.5).abs() < f64::EPSILON);
    }
}
