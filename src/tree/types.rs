//! The box tree data structure.
use crate::{
    constants::NO_BOX,
    tree::domain::{BoundingBox, Domain},
    types::RealScalar,
};

/// An adaptive tree of boxes over a set of sources and targets.
///
/// Boxes are stored in flat arrays indexed by box id. Ids are assigned level by level
/// (breadth first), so box ids are sorted by level and the root has id 0. Particles are
/// re-sorted into tree order such that the particles of every box, including those of its
/// descendants, form a contiguous range.
#[derive(Debug, Clone)]
pub struct Tree<T: RealScalar, const DIM: usize> {
    pub(crate) domain: Domain<T, DIM>,
    pub(crate) bounding_box: BoundingBox<T, DIM>,
    pub(crate) max_particles_in_box: usize,
    pub(crate) sources_are_targets: bool,

    pub(crate) sources: Vec<[T; DIM]>,
    pub(crate) targets: Vec<[T; DIM]>,
    pub(crate) user_source_ids: Vec<usize>,
    pub(crate) user_target_ids: Vec<usize>,
    pub(crate) sorted_target_ids: Vec<usize>,

    pub(crate) nlevels: usize,
    pub(crate) box_levels: Vec<usize>,
    pub(crate) box_parent_ids: Vec<usize>,
    pub(crate) box_child_ids: Vec<usize>,
    pub(crate) box_anchors: Vec<[u64; DIM]>,
    pub(crate) box_centers: Vec<[T; DIM]>,

    pub(crate) box_source_starts: Vec<usize>,
    pub(crate) box_source_counts: Vec<usize>,
    pub(crate) box_target_starts: Vec<usize>,
    pub(crate) box_target_counts: Vec<usize>,

    pub(crate) box_source_bounding_boxes: Vec<BoundingBox<T, DIM>>,
    pub(crate) box_target_bounding_boxes: Vec<BoundingBox<T, DIM>>,

    pub(crate) level_start_box_nrs: Vec<usize>,
}

impl<T: RealScalar, const DIM: usize> Tree<T, DIM> {
    /// Number of child slots per box.
    pub const NCHILDREN: usize = 1 << DIM;

    /// Total number of boxes.
    pub fn nboxes(&self) -> usize {
        self.box_levels.len()
    }

    /// Number of levels, the root level included.
    pub fn nlevels(&self) -> usize {
        self.nlevels
    }

    /// Spatial dimension.
    pub fn dim(&self) -> usize {
        DIM
    }

    /// The padded cubic domain covered by the root box.
    pub fn domain(&self) -> &Domain<T, DIM> {
        &self.domain
    }

    /// Tight bounding box of all sources and targets.
    pub fn bounding_box(&self) -> &BoundingBox<T, DIM> {
        &self.bounding_box
    }

    /// Side length of the root box.
    pub fn root_extent(&self) -> T {
        self.domain.extent
    }

    /// Maximum number of particles a leaf may hold.
    pub fn max_particles_in_box(&self) -> usize {
        self.max_particles_in_box
    }

    /// Whether the targets are the sources.
    pub fn sources_are_targets(&self) -> bool {
        self.sources_are_targets
    }

    /// Level of every box.
    pub fn box_levels(&self) -> &[usize] {
        &self.box_levels
    }

    /// Parent of every box, [NO_BOX] for the root.
    pub fn box_parent_ids(&self) -> &[usize] {
        &self.box_parent_ids
    }

    /// Parent of a box, if it is not the root.
    pub fn box_parent(&self, ibox: usize) -> Option<usize> {
        match self.box_parent_ids[ibox] {
            NO_BOX => None,
            parent => Some(parent),
        }
    }

    /// Child slots of all boxes, `NCHILDREN` consecutive entries per box. Absent children
    /// are marked with [NO_BOX].
    pub fn box_child_ids(&self) -> &[usize] {
        &self.box_child_ids
    }

    /// Child slots of a single box. Slot `i` holds the child whose position along axis `d`
    /// is in the upper half of the box iff bit `d` of `i` is set.
    pub fn box_children(&self, ibox: usize) -> &[usize] {
        &self.box_child_ids[ibox * Self::NCHILDREN..(ibox + 1) * Self::NCHILDREN]
    }

    /// Iterate over the existing children of a box.
    pub fn child_boxes(&self, ibox: usize) -> impl Iterator<Item = usize> + '_ {
        self.box_children(ibox)
            .iter()
            .copied()
            .filter(|&child| child != NO_BOX)
    }

    /// A box is a leaf iff it has no children.
    pub fn is_leaf(&self, ibox: usize) -> bool {
        self.box_children(ibox).iter().all(|&child| child == NO_BOX)
    }

    /// Integer coordinates of every box within the uniform grid of its level.
    pub fn box_anchors(&self) -> &[[u64; DIM]] {
        &self.box_anchors
    }

    /// Center of every box.
    pub fn box_centers(&self) -> &[[T; DIM]] {
        &self.box_centers
    }

    /// Side length of the boxes on a level.
    pub fn box_size(&self, level: usize) -> T {
        self.domain.box_size(level)
    }

    /// Lower and upper corner of a box.
    pub fn get_box_extent(&self, ibox: usize) -> ([T; DIM], [T; DIM]) {
        self.domain
            .box_extent(self.box_levels[ibox], &self.box_anchors[ibox])
    }

    /// Index of the first box on each level, `nlevels + 1` entries.
    pub fn level_start_box_nrs(&self) -> &[usize] {
        &self.level_start_box_nrs
    }

    /// Sources in tree order.
    pub fn sources(&self) -> &[[T; DIM]] {
        &self.sources
    }

    /// Targets in tree order.
    pub fn targets(&self) -> &[[T; DIM]] {
        &self.targets
    }

    /// Number of sources.
    pub fn nsources(&self) -> usize {
        self.sources.len()
    }

    /// Number of targets.
    pub fn ntargets(&self) -> usize {
        self.targets.len()
    }

    /// Map from tree order to user order of the sources.
    pub fn user_source_ids(&self) -> &[usize] {
        &self.user_source_ids
    }

    /// Map from tree order to user order of the targets.
    pub fn user_target_ids(&self) -> &[usize] {
        &self.user_target_ids
    }

    /// Map from user order to tree order of the targets.
    pub fn sorted_target_ids(&self) -> &[usize] {
        &self.sorted_target_ids
    }

    /// First source of every box in tree order.
    pub fn box_source_starts(&self) -> &[usize] {
        &self.box_source_starts
    }

    /// Number of sources in every box, descendants included.
    pub fn box_source_counts(&self) -> &[usize] {
        &self.box_source_counts
    }

    /// First target of every box in tree order.
    pub fn box_target_starts(&self) -> &[usize] {
        &self.box_target_starts
    }

    /// Number of targets in every box, descendants included.
    pub fn box_target_counts(&self) -> &[usize] {
        &self.box_target_counts
    }

    /// Sources contained in a box.
    pub fn box_sources(&self, ibox: usize) -> &[[T; DIM]] {
        let start = self.box_source_starts[ibox];
        &self.sources[start..start + self.box_source_counts[ibox]]
    }

    /// Targets contained in a box.
    pub fn box_targets(&self, ibox: usize) -> &[[T; DIM]] {
        let start = self.box_target_starts[ibox];
        &self.targets[start..start + self.box_target_counts[ibox]]
    }

    /// Number of particles relevant for subdividing a box.
    pub fn box_particle_count(&self, ibox: usize) -> usize {
        if self.sources_are_targets {
            self.box_source_counts[ibox]
        } else {
            self.box_source_counts[ibox] + self.box_target_counts[ibox]
        }
    }

    /// Bounding box of the center and the sources of every box.
    pub fn box_source_bounding_boxes(&self) -> &[BoundingBox<T, DIM>] {
        &self.box_source_bounding_boxes
    }

    /// Bounding box of the center and the targets of every box.
    pub fn box_target_bounding_boxes(&self) -> &[BoundingBox<T, DIM>] {
        &self.box_target_bounding_boxes
    }

    /// Ids of all leaf boxes.
    pub fn leaf_boxes(&self) -> Vec<usize> {
        (0..self.nboxes()).filter(|&ibox| self.is_leaf(ibox)).collect()
    }
}
