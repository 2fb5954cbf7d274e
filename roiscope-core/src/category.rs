//! Region kinds and the styling categories they resolve to.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::color::Rgba;

/// Creation-time kind of a region. Immutable for the region's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RegionKind {
    Nucleus,
    Cytoplasm,
    Cell,
    Vessel,
    Ignore,
    Square,
    Rectangle,
    Circle,
}

impl RegionKind {
    /// All kinds, in declaration order.
    pub const ALL: [RegionKind; 8] = [
        RegionKind::Nucleus,
        RegionKind::Cytoplasm,
        RegionKind::Cell,
        RegionKind::Vessel,
        RegionKind::Ignore,
        RegionKind::Square,
        RegionKind::Rectangle,
        RegionKind::Circle,
    ];

    /// Human-readable name, also used as the auto-name prefix.
    pub fn display_name(self) -> &'static str {
        match self {
            RegionKind::Nucleus => "Nucleus",
            RegionKind::Cytoplasm => "Cytoplasm",
            RegionKind::Cell => "Cell",
            RegionKind::Vessel => "Vessel",
            RegionKind::Ignore => "Ignore",
            RegionKind::Square => "Square",
            RegionKind::Rectangle => "Rectangle",
            RegionKind::Circle => "Circle",
        }
    }

    /// Fallback display color when a region carries no override.
    pub fn default_color(self) -> Rgba {
        match self {
            RegionKind::Nucleus => Rgba::new(0, 255, 0, 128),
            RegionKind::Cytoplasm => Rgba::new(0, 100, 255, 100),
            RegionKind::Cell => Rgba::new(255, 255, 0, 120),
            RegionKind::Vessel => Rgba::new(255, 0, 0, 120),
            RegionKind::Ignore => Rgba::new(128, 128, 128, 80),
            RegionKind::Square | RegionKind::Rectangle | RegionKind::Circle => {
                Rgba::new(255, 255, 255, 100)
            }
        }
    }

    /// Primitive shapes drawn by hand, geometry comes from bounds alone.
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            RegionKind::Square | RegionKind::Rectangle | RegionKind::Circle
        )
    }

    /// Parses a kind from a loose label (`"nuclei"`, `"Blood vessel"`, ...).
    ///
    /// Returns `None` for labels that match nothing.
    pub fn parse_label(label: &str) -> Option<RegionKind> {
        let lower = label.trim().to_ascii_lowercase();
        let kind = match lower.as_str() {
            "nucleus" | "nuclei" => RegionKind::Nucleus,
            "cytoplasm" | "cyto" => RegionKind::Cytoplasm,
            "cell" | "cells" => RegionKind::Cell,
            "vessel" | "vessels" | "blood vessel" | "blood_vessel" => RegionKind::Vessel,
            "ignore" | "ignored" => RegionKind::Ignore,
            "square" => RegionKind::Square,
            "rectangle" | "rect" => RegionKind::Rectangle,
            "circle" | "oval" => RegionKind::Circle,
            _ => return None,
        };
        Some(kind)
    }
}

impl std::fmt::Display for RegionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Styling category, the key into per-category display settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Category {
    Vessel,
    Nucleus,
    Cytoplasm,
    Cell,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Vessel,
        Category::Nucleus,
        Category::Cytoplasm,
        Category::Cell,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Category::Vessel => "Vessel",
            Category::Nucleus => "Nucleus",
            Category::Cytoplasm => "Cytoplasm",
            Category::Cell => "Cell",
        }
    }

    /// Category implied by a region kind tag, if any.
    ///
    /// `Ignore` regions are styled as vessels; primitives carry no category.
    pub fn from_kind(kind: RegionKind) -> Option<Category> {
        match kind {
            RegionKind::Nucleus => Some(Category::Nucleus),
            RegionKind::Cytoplasm => Some(Category::Cytoplasm),
            RegionKind::Cell => Some(Category::Cell),
            RegionKind::Vessel | RegionKind::Ignore => Some(Category::Vessel),
            RegionKind::Square | RegionKind::Rectangle | RegionKind::Circle => None,
        }
    }

    /// Substring heuristic on a display name.
    ///
    /// Checked in order: "cell", "cyto", "nucle", "vessel".
    pub fn from_name(name: &str) -> Option<Category> {
        let lower = name.to_lowercase();
        if lower.contains("cell") {
            Some(Category::Cell)
        } else if lower.contains("cyto") {
            Some(Category::Cytoplasm)
        } else if lower.contains("nucle") {
            Some(Category::Nucleus)
        } else if lower.contains("vessel") {
            Some(Category::Vessel)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label() {
        assert_eq!(RegionKind::parse_label("Nuclei"), Some(RegionKind::Nucleus));
        assert_eq!(
            RegionKind::parse_label(" blood vessel "),
            Some(RegionKind::Vessel)
        );
        assert_eq!(RegionKind::parse_label("mitochondria"), None);
    }

    #[test]
    fn test_ignore_styles_as_vessel() {
        assert_eq!(
            Category::from_kind(RegionKind::Ignore),
            Some(Category::Vessel)
        );
        assert_eq!(Category::from_kind(RegionKind::Circle), None);
    }

    #[test]
    fn test_name_heuristic_order() {
        // "cell" wins over "cyto" when both appear
        assert_eq!(Category::from_name("CytoCell_3"), Some(Category::Cell));
        assert_eq!(Category::from_name("Cytoplasm_1"), Some(Category::Cytoplasm));
        assert_eq!(Category::from_name("nucleus 4"), Some(Category::Nucleus));
        assert_eq!(Category::from_name("Vessel_2"), Some(Category::Vessel));
        assert_eq!(Category::from_name("Freehand"), None);
    }
}
