//! Interaction lists for fast multipole methods
pub mod builder;
pub mod lists;
pub mod separation;
pub mod types;
pub mod validate;

pub use builder::{TraversalBuildInfo, TraversalBuilder, TraversalBuilderOptions};
pub use lists::CompressedList;
pub use separation::{box_gap, separation_threshold, SeparationCriterion};
pub use types::Traversal;
