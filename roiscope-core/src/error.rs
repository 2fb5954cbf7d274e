//! Error types for roiscope-core.

use crate::region::RegionId;
use thiserror::Error;

/// Result type alias for roiscope operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for region bookkeeping.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// No region with this id exists in the set being modified.
    #[error("unknown region: {0}")]
    UnknownRegion(RegionId),

    /// A link operation received a region of the wrong entity type.
    #[error("region {id} is not a {expected}")]
    WrongKind {
        /// Offending region.
        id: RegionId,
        /// Entity type the operation needed.
        expected: &'static str,
    },

    /// A region was offered to the set of a different image.
    #[error("region {id} belongs to image '{found}', not '{expected}'")]
    ForeignImage {
        /// Offending region.
        id: RegionId,
        /// Image owning the target set.
        expected: String,
        /// Image recorded on the region.
        found: String,
    },

    /// The region id is already present.
    #[error("duplicate region: {0}")]
    DuplicateRegion(RegionId),

    /// Back-references disagree between a cell and one of its parts.
    #[error("inconsistent link between {from} and {to}: {detail}")]
    InconsistentLink {
        /// Region holding the forward reference.
        from: RegionId,
        /// Region the reference points at.
        to: RegionId,
        /// What is wrong with the pair.
        detail: &'static str,
    },

    /// A cell assembly refers to detections that do not exist.
    #[error("invalid cell assembly: {0}")]
    InvalidAssembly(String),

    /// Display settings rejected by validation.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Geometry that cannot describe a region.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
}
