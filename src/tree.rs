//! Adaptive box trees over sources and targets
pub mod builder;
pub mod domain;
pub mod types;
pub mod validate;

pub use builder::{TreeBuildInfo, TreeBuilder, TreeBuilderOptions};
pub use domain::{BoundingBox, Domain};
pub use types::Tree;
