//! Boxtree
//!
//! Adaptive `2^DIM`-ary box trees over sources and targets, and the interaction lists a fast
//! multipole method needs to evaluate far-field interactions through them.
//!
//! ```
//! use boxtree::{tools::make_normal_particle_array, TraversalBuilder, TreeBuilder};
//!
//! let sources = make_normal_particle_array::<f64, 2>(1000, 0);
//! let (tree, _) = TreeBuilder::default().build(&sources, None).unwrap();
//! let (traversal, _) = TraversalBuilder::default().build(&tree).unwrap();
//!
//! for (index, &ibox) in traversal.target_boxes().iter().enumerate() {
//!     assert!(traversal.neighbor_source_boxes().get(index).contains(&ibox));
//! }
//! ```
#![cfg_attr(feature = "strict", deny(warnings))]
#![warn(missing_docs)]

pub mod constants;
pub mod helpers;
pub mod tools;
pub mod traversal;
pub mod tree;
pub mod types;

pub use traversal::{
    CompressedList, Traversal, TraversalBuildInfo, TraversalBuilder, TraversalBuilderOptions,
};
pub use tree::{BoundingBox, Domain, Tree, TreeBuildInfo, TreeBuilder, TreeBuilderOptions};
pub use types::{Error, RealScalar, Result};
