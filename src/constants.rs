//! Crate wide constants

/// Marks an absent parent or child slot. Never a valid box id.
pub const NO_BOX: usize = usize::MAX;

/// Default maximum number of particles in a leaf box.
pub const DEFAULT_MAX_PARTICLES_IN_BOX: usize = 30;

/// Default deepest level a tree may reach.
pub const DEFAULT_MAX_LEVEL: usize = 30;

/// Hard limit on the tree depth, box anchors must convert exactly into double precision.
pub const MAX_LEVEL_LIMIT: usize = 48;

/// Highest supported spatial dimension.
pub const MAX_DIM: usize = 3;

/// Default number of boxes of separation required for two boxes to be well separated.
pub const DEFAULT_WELL_SEP_IS_N_AWAY: usize = 1;

/// Relative padding added around the particle bounding box to form the root box.
pub const DOMAIN_PADDING: f64 = 1e-5;
