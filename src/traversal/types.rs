//! Interaction lists of a box tree.
use crate::{
    constants::NO_BOX,
    traversal::{lists::CompressedList, separation::SeparationCriterion},
    tree::{BoundingBox, Tree},
    types::RealScalar,
};

/// Interaction lists of all boxes of a tree.
///
/// A traversal borrows the tree it was built from. Box sets are stored as sorted arrays of box
/// ids, and every list family is indexed by position within one of these sets.
#[derive(Debug, Clone)]
pub struct Traversal<'a, T: RealScalar, const DIM: usize> {
    pub(crate) tree: &'a Tree<T, DIM>,
    pub(crate) criterion: SeparationCriterion,

    pub(crate) source_boxes: Vec<usize>,
    pub(crate) source_parent_boxes: Vec<usize>,
    pub(crate) target_boxes: Vec<usize>,
    pub(crate) target_or_target_parent_boxes: Vec<usize>,

    pub(crate) level_start_source_box_nrs: Vec<usize>,
    pub(crate) level_start_source_parent_box_nrs: Vec<usize>,
    pub(crate) level_start_target_box_nrs: Vec<usize>,
    pub(crate) level_start_target_or_target_parent_box_nrs: Vec<usize>,

    pub(crate) target_box_index: Vec<usize>,
    pub(crate) target_or_target_parent_box_index: Vec<usize>,

    pub(crate) colleagues: CompressedList,
    pub(crate) neighbor_source_boxes: CompressedList,
    pub(crate) from_sep_siblings: CompressedList,
    pub(crate) from_sep_smaller_by_level: Vec<CompressedList>,
    pub(crate) from_sep_bigger: CompressedList,
}

impl<'a, T: RealScalar, const DIM: usize> Traversal<'a, T, DIM> {
    /// The tree this traversal was built from.
    pub fn tree(&self) -> &'a Tree<T, DIM> {
        self.tree
    }

    /// Number of boxes between two well separated boxes.
    pub fn well_sep_is_n_away(&self) -> usize {
        self.criterion.well_sep_is_n_away()
    }

    /// Check if two boxes are well separated.
    pub fn is_well_separated(&self, ibox: usize, jbox: usize) -> bool {
        self.criterion.is_well_separated(self.tree, ibox, jbox)
    }

    /// Number of levels of the tree.
    pub fn nlevels(&self) -> usize {
        self.tree.nlevels()
    }

    /// Leaf boxes containing sources.
    pub fn source_boxes(&self) -> &[usize] {
        &self.source_boxes
    }

    /// Non-leaf boxes containing sources.
    pub fn source_parent_boxes(&self) -> &[usize] {
        &self.source_parent_boxes
    }

    /// Leaf boxes containing targets.
    pub fn target_boxes(&self) -> &[usize] {
        &self.target_boxes
    }

    /// All boxes containing targets.
    pub fn target_or_target_parent_boxes(&self) -> &[usize] {
        &self.target_or_target_parent_boxes
    }

    /// Start of every level within [Self::source_boxes], `nlevels + 1` entries.
    pub fn level_start_source_box_nrs(&self) -> &[usize] {
        &self.level_start_source_box_nrs
    }

    /// Start of every level within [Self::source_parent_boxes], `nlevels + 1` entries.
    pub fn level_start_source_parent_box_nrs(&self) -> &[usize] {
        &self.level_start_source_parent_box_nrs
    }

    /// Start of every level within [Self::target_boxes], `nlevels + 1` entries.
    pub fn level_start_target_box_nrs(&self) -> &[usize] {
        &self.level_start_target_box_nrs
    }

    /// Start of every level within [Self::target_or_target_parent_boxes], `nlevels + 1` entries.
    pub fn level_start_target_or_target_parent_box_nrs(&self) -> &[usize] {
        &self.level_start_target_or_target_parent_box_nrs
    }

    /// Position of a box within [Self::target_boxes].
    pub fn target_box_index(&self, ibox: usize) -> Option<usize> {
        match self.target_box_index[ibox] {
            NO_BOX => None,
            index => Some(index),
        }
    }

    /// Position of a box within [Self::target_or_target_parent_boxes].
    pub fn target_or_target_parent_box_index(&self, ibox: usize) -> Option<usize> {
        match self.target_or_target_parent_box_index[ibox] {
            NO_BOX => None,
            index => Some(index),
        }
    }

    /// Boxes with sources on the same level that are not well separated, the box itself
    /// excluded. Indexed like [Self::target_or_target_parent_boxes].
    pub fn colleagues(&self) -> &CompressedList {
        &self.colleagues
    }

    /// List 1: leaf boxes with sources that are not well separated from a target leaf.
    /// Indexed like [Self::target_boxes].
    pub fn neighbor_source_boxes(&self) -> &CompressedList {
        &self.neighbor_source_boxes
    }

    /// List 2: well separated boxes on the same level whose parents are not well separated.
    /// Indexed like [Self::target_or_target_parent_boxes].
    pub fn from_sep_siblings(&self) -> &CompressedList {
        &self.from_sep_siblings
    }

    /// List 3: well separated boxes finer than a target leaf whose parents are not well
    /// separated from it, one list per level of the source box. Each list is indexed like
    /// [Self::target_boxes].
    pub fn from_sep_smaller_by_level(&self) -> &[CompressedList] {
        &self.from_sep_smaller_by_level
    }

    /// List 3 of a target leaf over all levels, sorted by box id.
    pub fn from_sep_smaller(&self, target_index: usize) -> Vec<usize> {
        let mut boxes = self
            .from_sep_smaller_by_level
            .iter()
            .flat_map(|list| list.get(target_index).iter().copied())
            .collect::<Vec<_>>();
        boxes.sort_unstable();
        boxes
    }

    /// List 4: well separated leaf boxes coarser than a box that are not well separated from
    /// its parent. Indexed like [Self::target_or_target_parent_boxes].
    pub fn from_sep_bigger(&self) -> &CompressedList {
        &self.from_sep_bigger
    }

    /// Source bounding box of every box.
    pub fn box_source_bounding_boxes(&self) -> &[BoundingBox<T, DIM>] {
        self.tree.box_source_bounding_boxes()
    }

    /// Target bounding box of every box.
    pub fn box_target_bounding_boxes(&self) -> &[BoundingBox<T, DIM>] {
        self.tree.box_target_bounding_boxes()
    }
}
