//! Types specific to boxtree

use num::Float;

/// Floating point type used for particle coordinates and box geometry.
pub trait RealScalar: Float + Send + Sync + std::fmt::Debug + 'static {}

impl<T: Float + Send + Sync + std::fmt::Debug + 'static> RealScalar for T {}

/// Convert a primitive number into the working precision.
pub(crate) fn real<T: RealScalar, N: num::ToPrimitive>(value: N) -> T {
    T::from(value).unwrap()
}

/// Error type for tree and traversal construction.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A builder was called with invalid options or unusable input.
    #[error("Configuration Error: {0}")]
    Configuration(String),

    /// The particle distribution requires subdivision beyond the maximum level.
    #[error(
        "Box {box_id} holds {nparticles} particles at the maximum level {max_level} and cannot be split further"
    )]
    MaxLevelExceeded {
        /// Box that could not be split.
        box_id: usize,
        /// Number of particles in that box.
        nparticles: usize,
        /// Configured maximum level.
        max_level: usize,
    },

    /// A built structure failed validation.
    #[error("Invariant Violation: {0}")]
    InvariantViolation(String),
}

/// Result Type
pub type Result<T> = std::result::Result<T, Error>;
