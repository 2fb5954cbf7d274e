//! Rendering engine configuration.

use std::time::Duration;

use roiscope_core::Rgba;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Buffer padding on every side of the image (pixels).
pub const DEFAULT_BUFFER_MARGIN: u32 = 100;
/// Window in which an unchanged region set is not re-rendered.
pub const DEFAULT_RECENCY_WINDOW: Duration = Duration::from_millis(100);
/// Segments used to tessellate circles.
pub const DEFAULT_CIRCLE_SEGMENTS: usize = 48;
/// Initial length of the ultra-fast coordinate arrays.
pub const DEFAULT_SCRATCH_CAPACITY: usize = 1000;

/// Drawing strategy for a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum RenderMode {
    /// Per-category fill and stroke of the resolved shape.
    #[default]
    Full,
    /// Outline-only bounds rectangles grouped by border color.
    Batch,
    /// Raw outlines in one fixed color and width.
    UltraFast,
}

impl RenderMode {
    pub fn is_fast(self) -> bool {
        !matches!(self, RenderMode::Full)
    }
}

/// Rendering engine configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RenderConfig {
    pub buffer_margin: u32,
    pub recency_window: Duration,
    /// Stroke width of batch-mode rectangles.
    pub batch_stroke_width: f32,
    pub ultra_fast_color: Rgba,
    pub ultra_fast_stroke_width: f32,
    pub circle_segments: usize,
    pub scratch_capacity: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            buffer_margin: DEFAULT_BUFFER_MARGIN,
            recency_window: DEFAULT_RECENCY_WINDOW,
            batch_stroke_width: 2.0,
            ultra_fast_color: Rgba::YELLOW,
            ultra_fast_stroke_width: 1.0,
            circle_segments: DEFAULT_CIRCLE_SEGMENTS,
            scratch_capacity: DEFAULT_SCRATCH_CAPACITY,
        }
    }
}

impl RenderConfig {
    #[must_use]
    pub fn with_buffer_margin(mut self, margin: u32) -> Self {
        self.buffer_margin = margin;
        self
    }

    #[must_use]
    pub fn with_recency_window(mut self, window: Duration) -> Self {
        self.recency_window = window;
        self
    }

    #[must_use]
    pub fn with_batch_stroke_width(mut self, width: f32) -> Self {
        self.batch_stroke_width = width;
        self
    }

    #[must_use]
    pub fn with_ultra_fast_style(mut self, color: Rgba, width: f32) -> Self {
        self.ultra_fast_color = color;
        self.ultra_fast_stroke_width = width;
        self
    }

    #[must_use]
    pub fn with_circle_segments(mut self, segments: usize) -> Self {
        self.circle_segments = segments;
        self
    }

    #[must_use]
    pub fn with_scratch_capacity(mut self, capacity: usize) -> Self {
        self.scratch_capacity = capacity;
        self
    }
}
