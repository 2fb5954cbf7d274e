//! Error types for roiscope-render.

use thiserror::Error;

/// Result type alias for rendering operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Rendering errors.
///
/// Shape and hit-test degradations are not errors; see
/// [`Fidelity`](crate::Fidelity) and [`HitOutcome`](crate::HitOutcome).
#[derive(Error, Debug)]
pub enum Error {
    /// The off-screen buffer could not be allocated.
    #[error("cannot allocate {width}x{height} render buffer")]
    BufferAllocation {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },

    /// Scale or offset unusable for mapping coordinates.
    #[error("invalid transform: {0}")]
    InvalidTransform(String),

    /// Core model error.
    #[error("core error: {0}")]
    Core(#[from] roiscope_core::Error),
}
