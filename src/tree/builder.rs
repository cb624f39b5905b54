//! Construction of adaptive box trees.
use std::time::{Duration, Instant};

use itertools::izip;
use log::{debug, info};
use rayon::prelude::*;

use crate::{
    constants::{
        DEFAULT_MAX_LEVEL, DEFAULT_MAX_PARTICLES_IN_BOX, MAX_DIM, MAX_LEVEL_LIMIT, NO_BOX,
    },
    helpers::{index_pointer, level_starts},
    tree::{
        domain::{BoundingBox, Domain},
        types::Tree,
        validate::validate_tree,
    },
    types::{Error, RealScalar, Result},
};

/// Options for a tree builder
#[derive(Debug, Clone)]
pub struct TreeBuilderOptions {
    /// Maximum number of particles in a leaf box
    max_particles_in_box: usize,
    /// Deepest level a box may be created on
    max_level: usize,
    /// Re-check all tree invariants after construction
    validate: bool,
}

impl Default for TreeBuilderOptions {
    fn default() -> Self {
        Self {
            max_particles_in_box: DEFAULT_MAX_PARTICLES_IN_BOX,
            max_level: DEFAULT_MAX_LEVEL,
            validate: false,
        }
    }
}

impl TreeBuilderOptions {
    /// Set the maximum number of particles in a leaf box
    pub fn set_max_particles_in_box(&mut self, max_particles_in_box: usize) {
        self.max_particles_in_box = max_particles_in_box;
    }

    /// Get the maximum number of particles in a leaf box
    pub fn max_particles_in_box(&self) -> usize {
        self.max_particles_in_box
    }

    /// Set the deepest level a box may be created on
    pub fn set_max_level(&mut self, max_level: usize) {
        self.max_level = max_level;
    }

    /// Get the deepest level a box may be created on
    pub fn max_level(&self) -> usize {
        self.max_level
    }

    /// Enable or disable validation of the built tree
    pub fn set_validate(&mut self, validate: bool) {
        self.validate = validate;
    }

    /// Check if the built tree is validated
    pub fn validate(&self) -> bool {
        self.validate
    }
}

/// Statistics gathered while building a tree.
#[derive(Debug, Clone)]
pub struct TreeBuildInfo {
    /// Number of boxes
    pub nboxes: usize,
    /// Number of levels
    pub nlevels: usize,
    /// Number of leaf boxes
    pub nleaves: usize,
    /// Largest particle count of any leaf
    pub max_leaf_particles: usize,
    /// Wall clock time spent in the build
    pub elapsed: Duration,
}

/// Hands out box ids in creation order.
#[derive(Debug, Default)]
struct BoxIdAllocator {
    next: usize,
}

impl BoxIdAllocator {
    fn allocate(&mut self) -> usize {
        let ibox = self.next;
        self.next += 1;
        ibox
    }

    fn count(&self) -> usize {
        self.next
    }
}

/// Box arrays under construction.
struct BoxArrays<T: RealScalar, const DIM: usize> {
    levels: Vec<usize>,
    parent_ids: Vec<usize>,
    child_ids: Vec<usize>,
    anchors: Vec<[u64; DIM]>,
    centers: Vec<[T; DIM]>,
    source_starts: Vec<usize>,
    source_counts: Vec<usize>,
    target_starts: Vec<usize>,
    target_counts: Vec<usize>,
    source_bounding_boxes: Vec<BoundingBox<T, DIM>>,
    target_bounding_boxes: Vec<BoundingBox<T, DIM>>,
}

impl<T: RealScalar, const DIM: usize> BoxArrays<T, DIM> {
    const NCHILDREN: usize = 1 << DIM;

    fn new() -> Self {
        Self {
            levels: Vec::new(),
            parent_ids: Vec::new(),
            child_ids: Vec::new(),
            anchors: Vec::new(),
            centers: Vec::new(),
            source_starts: Vec::new(),
            source_counts: Vec::new(),
            target_starts: Vec::new(),
            target_counts: Vec::new(),
            source_bounding_boxes: Vec::new(),
            target_bounding_boxes: Vec::new(),
        }
    }

    fn push_box(
        &mut self,
        domain: &Domain<T, DIM>,
        level: usize,
        parent: usize,
        anchor: [u64; DIM],
        (source_start, source_count): (usize, usize),
        (target_start, target_count): (usize, usize),
    ) {
        let center = domain.box_center(level, &anchor);
        self.levels.push(level);
        self.parent_ids.push(parent);
        self.child_ids
            .extend(std::iter::repeat(NO_BOX).take(Self::NCHILDREN));
        self.anchors.push(anchor);
        self.centers.push(center);
        self.source_starts.push(source_start);
        self.source_counts.push(source_count);
        self.target_starts.push(target_start);
        self.target_counts.push(target_count);
        // Finalised once the level is complete
        self.source_bounding_boxes
            .push(BoundingBox::from_point(&center));
        self.target_bounding_boxes
            .push(BoundingBox::from_point(&center));
    }

    fn nparticles(&self, ibox: usize) -> usize {
        self.source_counts[ibox] + self.target_counts[ibox]
    }

    fn source_ids<'a>(&self, ibox: usize, source_order: &'a [usize]) -> &'a [usize] {
        let start = self.source_starts[ibox];
        &source_order[start..start + self.source_counts[ibox]]
    }

    fn target_ids<'a>(&self, ibox: usize, target_order: &'a [usize]) -> &'a [usize] {
        let start = self.target_starts[ibox];
        &target_order[start..start + self.target_counts[ibox]]
    }

    /// Bounding boxes of the center and the sources, and of the center and the targets of a box.
    fn bounding_boxes(
        &self,
        ibox: usize,
        (sources, source_order): (&[[T; DIM]], &[usize]),
        (targets, target_order): (&[[T; DIM]], &[usize]),
    ) -> (BoundingBox<T, DIM>, BoundingBox<T, DIM>) {
        let center = &self.centers[ibox];
        (
            bounding_box(center, sources, self.source_ids(ibox, source_order)),
            bounding_box(center, targets, self.target_ids(ibox, target_order)),
        )
    }
}

/// The particles of one box, partitioned by child.
struct SplitBox {
    parent: usize,
    sources: Vec<usize>,
    source_counts: Vec<usize>,
    targets: Vec<usize>,
    target_counts: Vec<usize>,
}

/// Index of the child of a box with the given center that a point falls into.
fn child_index<T: RealScalar, const DIM: usize>(point: &[T; DIM], center: &[T; DIM]) -> usize {
    point
        .iter()
        .zip(center)
        .enumerate()
        .fold(0, |index, (d, (x, c))| if x >= c { index | (1 << d) } else { index })
}

/// Stable partition of particle ids by the child they fall into.
///
/// Returns the reordered ids and the number of particles per child.
fn partition_particles<T: RealScalar, const DIM: usize>(
    points: &[[T; DIM]],
    ids: &[usize],
    center: &[T; DIM],
) -> (Vec<usize>, Vec<usize>) {
    let nchildren = 1 << DIM;
    let keys = ids
        .iter()
        .map(|&id| child_index(&points[id], center))
        .collect::<Vec<_>>();

    let mut counts = vec![0; nchildren];
    for &key in &keys {
        counts[key] += 1;
    }

    let mut offsets = index_pointer(&counts);
    let mut sorted = vec![0; ids.len()];
    for (&id, &key) in izip!(ids, &keys) {
        sorted[offsets[key]] = id;
        offsets[key] += 1;
    }

    (sorted, counts)
}

/// Bounding box of a center and a set of points.
fn bounding_box<T: RealScalar, const DIM: usize>(
    center: &[T; DIM],
    points: &[[T; DIM]],
    ids: &[usize],
) -> BoundingBox<T, DIM> {
    let mut bbox = BoundingBox::from_point(center);
    for &id in ids {
        bbox.extend(&points[id]);
    }
    bbox
}

/// Builder for adaptive box trees.
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    options: TreeBuilderOptions,
}

impl TreeBuilder {
    /// Create a tree builder.
    pub fn new(options: TreeBuilderOptions) -> Self {
        Self { options }
    }

    /// Get the builder options.
    pub fn options(&self) -> &TreeBuilderOptions {
        &self.options
    }

    /// Get mutable builder options.
    pub fn options_mut(&mut self) -> &mut TreeBuilderOptions {
        &mut self.options
    }

    fn check_configuration<T: RealScalar, const DIM: usize>(
        &self,
        sources: &[[T; DIM]],
    ) -> Result<()> {
        if DIM == 0 || DIM > MAX_DIM {
            Err(Error::Configuration(format!(
                "Trees are supported in 1 to {} dimensions, not {}",
                MAX_DIM, DIM
            )))
        } else if self.options.max_particles_in_box == 0 {
            Err(Error::Configuration(
                "max_particles_in_box must be at least 1".to_string(),
            ))
        } else if self.options.max_level > MAX_LEVEL_LIMIT {
            Err(Error::Configuration(format!(
                "max_level must not exceed {}, got {}",
                MAX_LEVEL_LIMIT, self.options.max_level
            )))
        } else if sources.is_empty() {
            Err(Error::Configuration(
                "Must have a positive number of source particles".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Build a tree over a set of sources and optionally distinct targets.
    ///
    /// If no targets are given the sources are used as targets. Boxes are split as long as
    /// they hold more than `max_particles_in_box` particles, where sources and distinct
    /// targets are counted together.
    ///
    /// # Arguments
    /// * `sources` - Source coordinates.
    /// * `targets` - Target coordinates, or `None` to use the sources as targets.
    pub fn build<T: RealScalar, const DIM: usize>(
        &self,
        sources: &[[T; DIM]],
        targets: Option<&[[T; DIM]]>,
    ) -> Result<(Tree<T, DIM>, TreeBuildInfo)> {
        let start_time = Instant::now();
        self.check_configuration(sources)?;

        let sources_are_targets = targets.is_none();
        let targets = targets.unwrap_or(&[]);
        let nchildren = 1 << DIM;
        let max_particles_in_box = self.options.max_particles_in_box;

        let bounding_box = BoundingBox::from_points([sources, targets])?;
        let domain = Domain::from_bounding_box(&bounding_box);

        // User ids of the particles, kept sorted such that every box owns a contiguous range
        let mut source_order = (0..sources.len()).collect::<Vec<_>>();
        let mut target_order = (0..targets.len()).collect::<Vec<_>>();

        let mut allocator = BoxIdAllocator::default();
        let mut boxes = BoxArrays::<T, DIM>::new();

        let root = allocator.allocate();
        boxes.push_box(
            &domain,
            0,
            NO_BOX,
            [0; DIM],
            (0, sources.len()),
            (0, targets.len()),
        );
        let (source_bbox, target_bbox) =
            boxes.bounding_boxes(root, (sources, &source_order), (targets, &target_order));
        boxes.source_bounding_boxes[root] = source_bbox;
        boxes.target_bounding_boxes[root] = target_bbox;

        let mut level = 0;
        let mut level_begin = root;

        loop {
            let level_end = allocator.count();
            let overfull = (level_begin..level_end)
                .filter(|&ibox| boxes.nparticles(ibox) > max_particles_in_box)
                .collect::<Vec<_>>();

            if overfull.is_empty() {
                break;
            }

            if level == self.options.max_level {
                let ibox = overfull[0];
                return Err(Error::MaxLevelExceeded {
                    box_id: ibox,
                    nparticles: boxes.nparticles(ibox),
                    max_level: self.options.max_level,
                });
            }

            // Partition the particles of every overfull box of this level in parallel
            let splits = overfull
                .par_iter()
                .map(|&ibox| {
                    let center = &boxes.centers[ibox];
                    let (sources, source_counts) =
                        partition_particles(sources, boxes.source_ids(ibox, &source_order), center);
                    let (targets, target_counts) =
                        partition_particles(targets, boxes.target_ids(ibox, &target_order), center);
                    SplitBox {
                        parent: ibox,
                        sources,
                        source_counts,
                        targets,
                        target_counts,
                    }
                })
                .collect::<Vec<_>>();

            // Assign ids in parent order, which keeps ids sorted by level
            for split in splits {
                let parent = split.parent;
                let parent_anchor = boxes.anchors[parent];
                let mut source_start = boxes.source_starts[parent];
                let mut target_start = boxes.target_starts[parent];

                source_order[source_start..source_start + split.sources.len()]
                    .copy_from_slice(&split.sources);
                target_order[target_start..target_start + split.targets.len()]
                    .copy_from_slice(&split.targets);

                for (child, (&nsources, &ntargets)) in
                    izip!(&split.source_counts, &split.target_counts).enumerate()
                {
                    if nsources + ntargets > 0 {
                        let mut anchor = parent_anchor;
                        for (d, a) in anchor.iter_mut().enumerate() {
                            *a = 2 * *a + ((child >> d) & 1) as u64;
                        }

                        let ibox = allocator.allocate();
                        boxes.push_box(
                            &domain,
                            level + 1,
                            parent,
                            anchor,
                            (source_start, nsources),
                            (target_start, ntargets),
                        );
                        boxes.child_ids[parent * nchildren + child] = ibox;
                    }
                    source_start += nsources;
                    target_start += ntargets;
                }
            }

            level += 1;
            level_begin = level_end;

            // The new level is only complete once its bounding boxes are known
            let new_boxes = level_begin..allocator.count();
            let (source_bounding_boxes, target_bounding_boxes): (Vec<_>, Vec<_>) = new_boxes
                .clone()
                .into_par_iter()
                .map(|ibox| {
                    boxes.bounding_boxes(ibox, (sources, &source_order), (targets, &target_order))
                })
                .unzip();
            boxes.source_bounding_boxes[new_boxes.clone()]
                .copy_from_slice(&source_bounding_boxes);
            boxes.target_bounding_boxes[new_boxes.clone()]
                .copy_from_slice(&target_bounding_boxes);

            debug!(
                "Created {} boxes on level {} from {} overfull boxes",
                new_boxes.len(),
                level,
                overfull.len()
            );
        }

        let nlevels = level + 1;
        let nboxes = allocator.count();
        let box_ids = (0..nboxes).collect::<Vec<_>>();
        let level_start_box_nrs = level_starts(&box_ids, &boxes.levels, nlevels);

        let sorted_sources = source_order.iter().map(|&id| sources[id]).collect::<Vec<_>>();

        let (targets, user_target_ids, box_target_starts, box_target_counts, target_bboxes) =
            if sources_are_targets {
                (
                    sorted_sources.clone(),
                    source_order.clone(),
                    boxes.source_starts.clone(),
                    boxes.source_counts.clone(),
                    boxes.source_bounding_boxes.clone(),
                )
            } else {
                (
                    target_order.iter().map(|&id| targets[id]).collect(),
                    target_order,
                    boxes.target_starts,
                    boxes.target_counts,
                    boxes.target_bounding_boxes,
                )
            };

        let mut sorted_target_ids = vec![0; user_target_ids.len()];
        for (sorted, &user) in user_target_ids.iter().enumerate() {
            sorted_target_ids[user] = sorted;
        }

        let tree = Tree {
            domain,
            bounding_box,
            max_particles_in_box,
            sources_are_targets,
            sources: sorted_sources,
            targets,
            user_source_ids: source_order,
            user_target_ids,
            sorted_target_ids,
            nlevels,
            box_levels: boxes.levels,
            box_parent_ids: boxes.parent_ids,
            box_child_ids: boxes.child_ids,
            box_anchors: boxes.anchors,
            box_centers: boxes.centers,
            box_source_starts: boxes.source_starts,
            box_source_counts: boxes.source_counts,
            box_target_starts,
            box_target_counts,
            box_source_bounding_boxes: boxes.source_bounding_boxes,
            box_target_bounding_boxes: target_bboxes,
            level_start_box_nrs,
        };

        if self.options.validate {
            validate_tree(&tree)?;
        }

        let leaves = tree.leaf_boxes();
        let info = TreeBuildInfo {
            nboxes,
            nlevels,
            nleaves: leaves.len(),
            max_leaf_particles: leaves
                .iter()
                .map(|&ibox| tree.box_particle_count(ibox))
                .max()
                .unwrap_or(0),
            elapsed: start_time.elapsed(),
        };

        info!(
            "Built tree with {} boxes on {} levels ({} leaves) for {} sources and {} targets in {:?}",
            info.nboxes,
            info.nlevels,
            info.nleaves,
            tree.nsources(),
            tree.ntargets(),
            info.elapsed
        );

        Ok((tree, info))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tools::{make_normal_particle_array, make_uniform_particle_array};

    fn builder(max_particles_in_box: usize) -> TreeBuilder {
        let mut options = TreeBuilderOptions::default();
        options.set_max_particles_in_box(max_particles_in_box);
        options.set_validate(true);
        TreeBuilder::new(options)
    }

    #[test]
    fn test_single_box() {
        let sources = vec![[0.0, 0.0], [1.0, 0.5], [0.25, 1.0]];
        let (tree, info) = builder(3).build(&sources, None).unwrap();

        assert_eq!(tree.nboxes(), 1);
        assert_eq!(tree.nlevels(), 1);
        assert!(tree.is_leaf(0));
        assert_eq!(tree.box_parent(0), None);
        assert_eq!(tree.box_children(0), &[NO_BOX; 4]);
        assert_eq!(tree.box_source_counts(), &[3]);
        assert_eq!(tree.box_target_counts(), &[3]);
        assert_eq!(info.nleaves, 1);
        assert_eq!(info.max_leaf_particles, 3);
    }

    #[test]
    fn test_split_into_quadrants() {
        // Particles in three of the four quadrants
        let sources = vec![[0.9, 0.9], [0.1, 0.1], [0.1, 0.9], [0.0, 0.0], [1.0, 1.0]];
        let (tree, _) = builder(2).build(&sources, None).unwrap();

        // Empty quadrants are not created
        assert_eq!(tree.nlevels(), 2);
        assert_eq!(tree.nboxes(), 4);
        assert_eq!(tree.box_levels(), &[0, 1, 1, 1]);
        assert_eq!(tree.box_children(0), &[1, NO_BOX, 2, 3]);
        assert_eq!(tree.level_start_box_nrs(), &[0, 1, 4]);
        assert_eq!(tree.box_source_counts(), &[5, 2, 1, 2]);
        assert_eq!(tree.box_anchors(), &[[0, 0], [0, 0], [0, 1], [1, 1]]);

        for ibox in 1..4 {
            assert_eq!(tree.box_parent(ibox), Some(0));
            let (lower, upper) = tree.get_box_extent(ibox);
            for point in tree.box_sources(ibox) {
                for d in 0..2 {
                    assert!(lower[d] <= point[d] && point[d] < upper[d]);
                }
            }
        }
    }

    #[test]
    fn test_user_ids() {
        let sources = make_uniform_particle_array::<f64, 3>(500, None, None, 0);
        let targets = make_uniform_particle_array::<f64, 3>(300, Some(-1.0), Some(0.5), 1);
        let (tree, _) = builder(20).build(&sources, Some(targets.as_slice())).unwrap();

        assert!(!tree.sources_are_targets());
        for (sorted, &user) in tree.user_source_ids().iter().enumerate() {
            assert_eq!(tree.sources()[sorted], sources[user]);
        }
        for (user, &sorted) in tree.sorted_target_ids().iter().enumerate() {
            assert_eq!(tree.targets()[sorted], targets[user]);
            assert_eq!(tree.user_target_ids()[sorted], user);
        }
    }

    #[test]
    fn test_leaves_respect_particle_limit() {
        let max_particles_in_box = 30;
        let sources = make_normal_particle_array::<f64, 2>(10000, 0);
        let (tree, info) = builder(max_particles_in_box)
            .build(&sources, None)
            .unwrap();

        assert!(info.max_leaf_particles <= max_particles_in_box);
        assert_eq!(tree.leaf_boxes().len(), info.nleaves);
        for ibox in tree.leaf_boxes() {
            assert!(tree.box_particle_count(ibox) <= max_particles_in_box);
        }
        assert_eq!(
            tree.leaf_boxes()
                .iter()
                .map(|&ibox| tree.box_source_counts()[ibox])
                .sum::<usize>(),
            10000
        );
    }

    #[test]
    fn test_sources_and_targets_count_together() {
        // Each set alone fits into a single box
        let sources = vec![[0.1, 0.1, 0.1]; 3];
        let targets = vec![[0.9, 0.9, 0.9]; 3];
        let (tree, _) = builder(4).build(&sources, Some(targets.as_slice())).unwrap();

        assert_eq!(tree.nboxes(), 3);
        let children = tree.child_boxes(0).collect::<Vec<_>>();
        assert_eq!(children, vec![1, 2]);
        assert_eq!(tree.box_source_counts()[1..], [3, 0]);
        assert_eq!(tree.box_target_counts()[1..], [0, 3]);
    }

    #[test]
    fn test_coincident_points_exceed_max_level() {
        let sources = vec![[0.5, 0.5]; 40];
        let mut options = TreeBuilderOptions::default();
        options.set_max_level(10);

        match TreeBuilder::new(options).build(&sources, None) {
            Err(Error::MaxLevelExceeded {
                nparticles,
                max_level,
                ..
            }) => {
                assert_eq!(nparticles, 40);
                assert_eq!(max_level, 10);
            }
            other => panic!("expected MaxLevelExceeded, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_configuration() {
        let sources = vec![[0.0, 0.0]];
        assert!(matches!(
            builder(0).build(&sources, None),
            Err(Error::Configuration(_))
        ));

        let mut options = TreeBuilderOptions::default();
        options.set_max_level(MAX_LEVEL_LIMIT + 1);
        assert!(matches!(
            TreeBuilder::new(options).build(&sources, None),
            Err(Error::Configuration(_))
        ));

        let empty: Vec<[f64; 2]> = vec![];
        assert!(matches!(
            builder(10).build(&empty, None),
            Err(Error::Configuration(_))
        ));

        let four_dimensional = vec![[0.0; 4]];
        assert!(matches!(
            builder(10).build(&four_dimensional, None),
            Err(Error::Configuration(_))
        ));

        let non_finite = vec![[0.0, f64::INFINITY]];
        assert!(matches!(
            builder(10).build(&non_finite, None),
            Err(Error::Configuration(_))
        ));
    }
}
