//! roiscope-render: Overlay rendering for region sets.
//!
//! This crate provides:
//! - **`ViewTransform`** - image ↔ screen mapping under pan and non-uniform zoom
//! - **`ShapeCache`** - concurrent memo of resolved drawable shapes
//! - **`ColorProvider`** - pluggable per-region styling
//! - **`RenderingEngine`** - margin-padded buffer with full, batch and
//!   ultra-fast strategies, viewport blit and hit testing
//!

pub mod config;
pub mod engine;
pub mod error;
pub mod provider;
pub mod raster;
pub mod shape;
pub mod transform;

pub use config::{RenderConfig, RenderMode};
pub use engine::{BufferState, HitOutcome, RenderOutcome, RenderStats, RenderingEngine};
pub use error::{Error, Result};
pub use provider::{ColorProvider, DefaultColorProvider, RegionStyle};
pub use shape::{resolve_shape, Drawable, Fidelity, ResolvedShape, ShapeCache};
pub use transform::ViewTransform;
