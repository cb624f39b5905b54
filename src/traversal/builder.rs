//! Construction of interaction lists.
use std::time::{Duration, Instant};

use log::{debug, info};
use rayon::prelude::*;

use crate::{
    constants::{DEFAULT_WELL_SEP_IS_N_AWAY, NO_BOX},
    helpers::level_starts,
    traversal::{
        lists::{count_then_fill, count_then_fill_by_level, CompressedList},
        separation::SeparationCriterion,
        types::Traversal,
        validate::validate_traversal,
    },
    tree::Tree,
    types::{Error, RealScalar, Result},
};

/// Options for a traversal builder
#[derive(Debug, Clone)]
pub struct TraversalBuilderOptions {
    /// Number of boxes between two well separated boxes
    well_sep_is_n_away: usize,
    /// Re-check all list invariants after construction
    validate: bool,
}

impl Default for TraversalBuilderOptions {
    fn default() -> Self {
        Self {
            well_sep_is_n_away: DEFAULT_WELL_SEP_IS_N_AWAY,
            validate: false,
        }
    }
}

impl TraversalBuilderOptions {
    /// Set the number of boxes between two well separated boxes
    pub fn set_well_sep_is_n_away(&mut self, well_sep_is_n_away: usize) {
        self.well_sep_is_n_away = well_sep_is_n_away;
    }

    /// Get the number of boxes between two well separated boxes
    pub fn well_sep_is_n_away(&self) -> usize {
        self.well_sep_is_n_away
    }

    /// Enable or disable validation of the built lists
    pub fn set_validate(&mut self, validate: bool) {
        self.validate = validate;
    }

    /// Check if the built lists are validated
    pub fn validate(&self) -> bool {
        self.validate
    }
}

/// Statistics gathered while building a traversal.
#[derive(Debug, Clone)]
pub struct TraversalBuildInfo {
    /// Number of colleague entries
    pub ncolleagues: usize,
    /// Number of List 1 entries
    pub nneighbor_source_boxes: usize,
    /// Number of List 2 entries
    pub nfrom_sep_siblings: usize,
    /// Number of List 3 entries
    pub nfrom_sep_smaller: usize,
    /// Number of List 4 entries
    pub nfrom_sep_bigger: usize,
    /// Wall time of the build
    pub elapsed: Duration,
}

/// Outcome of the descent below the near set of a target leaf.
enum Interaction {
    /// A leaf that is not well separated
    Neighbor(usize),
    /// A well separated box on a finer level whose parent is not well separated
    Smaller { level: usize, ibox: usize },
}

/// Children of a box that contain sources.
fn source_children<T: RealScalar, const DIM: usize>(
    tree: &Tree<T, DIM>,
    ibox: usize,
) -> impl Iterator<Item = usize> + '_ {
    tree.child_boxes(ibox)
        .filter(move |&child| tree.box_source_counts()[child] > 0)
}

/// Shared state of the list visitors.
struct ListContext<'a, T: RealScalar, const DIM: usize> {
    tree: &'a Tree<T, DIM>,
    criterion: SeparationCriterion,
    /// Boxes with sources that are not well separated from a box, either on its level or
    /// coarser leaves. Only filled for boxes with targets.
    near: Vec<Vec<usize>>,
}

impl<T: RealScalar, const DIM: usize> ListContext<'_, T, DIM> {
    fn has_sources(&self, ibox: usize) -> bool {
        self.tree.box_source_counts()[ibox] > 0
    }

    fn parent_near(&self, ibox: usize) -> &[usize] {
        match self.tree.box_parent(ibox) {
            Some(parent) => self.near[parent].as_slice(),
            None => &[],
        }
    }

    /// Near set of a box from the near set of its parent.
    fn near_set(&self, ibox: usize) -> Vec<usize> {
        if ibox == 0 {
            return if self.has_sources(0) { vec![0] } else { vec![] };
        }

        let mut near = Vec::new();
        for &jbox in self.parent_near(ibox) {
            if self.tree.is_leaf(jbox) {
                if !self.criterion.is_well_separated(self.tree, ibox, jbox) {
                    near.push(jbox);
                }
            } else {
                near.extend(
                    source_children(self.tree, jbox)
                        .filter(|&child| !self.criterion.is_well_separated(self.tree, ibox, child)),
                );
            }
        }
        near.sort_unstable();
        near
    }

    fn visit_colleagues(&self, ibox: usize, emit: &mut dyn FnMut(usize)) {
        let level = self.tree.box_levels()[ibox];
        self.near[ibox]
            .iter()
            .copied()
            .filter(|&jbox| jbox != ibox && self.tree.box_levels()[jbox] == level)
            .for_each(emit);
    }

    fn visit_from_sep_siblings(&self, ibox: usize, emit: &mut dyn FnMut(usize)) {
        for &jbox in self.parent_near(ibox) {
            for child in source_children(self.tree, jbox) {
                if self.criterion.is_well_separated(self.tree, ibox, child) {
                    emit(child);
                }
            }
        }
    }

    fn visit_from_sep_bigger(&self, ibox: usize, emit: &mut dyn FnMut(usize)) {
        for &jbox in self.parent_near(ibox) {
            if self.tree.is_leaf(jbox) && self.criterion.is_well_separated(self.tree, ibox, jbox) {
                emit(jbox);
            }
        }
    }

    /// Classify the boxes below the near set of a target leaf, one level at a time.
    fn descend(&self, ibox: usize, emit: &mut dyn FnMut(Interaction)) {
        let mut frontier = Vec::new();
        for &jbox in &self.near[ibox] {
            if self.tree.is_leaf(jbox) {
                emit(Interaction::Neighbor(jbox));
            } else {
                frontier.extend(source_children(self.tree, jbox));
            }
        }

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for jbox in frontier {
                if self.criterion.is_well_separated(self.tree, ibox, jbox) {
                    emit(Interaction::Smaller {
                        level: self.tree.box_levels()[jbox],
                        ibox: jbox,
                    });
                } else if self.tree.is_leaf(jbox) {
                    emit(Interaction::Neighbor(jbox));
                } else {
                    next.extend(source_children(self.tree, jbox));
                }
            }
            frontier = next;
        }
    }
}

/// Builder for interaction lists.
#[derive(Debug, Clone, Default)]
pub struct TraversalBuilder {
    options: TraversalBuilderOptions,
}

impl TraversalBuilder {
    /// Create a traversal builder.
    pub fn new(options: TraversalBuilderOptions) -> Self {
        Self { options }
    }

    /// Get the builder options.
    pub fn options(&self) -> &TraversalBuilderOptions {
        &self.options
    }

    /// Get mutable builder options.
    pub fn options_mut(&mut self) -> &mut TraversalBuilderOptions {
        &mut self.options
    }

    /// Build the interaction lists of a tree.
    pub fn build<'a, T: RealScalar, const DIM: usize>(
        &self,
        tree: &'a Tree<T, DIM>,
    ) -> Result<(Traversal<'a, T, DIM>, TraversalBuildInfo)> {
        let start_time = Instant::now();

        if self.options.well_sep_is_n_away == 0 {
            return Err(Error::Configuration(
                "well_sep_is_n_away must be at least 1".to_string(),
            ));
        }

        let nboxes = tree.nboxes();
        let nlevels = tree.nlevels();
        let box_levels = tree.box_levels();
        let source_counts = tree.box_source_counts();
        let target_counts = tree.box_target_counts();

        let (source_boxes, source_parent_boxes): (Vec<_>, Vec<_>) = (0..nboxes)
            .filter(|&ibox| source_counts[ibox] > 0)
            .partition(|&ibox| tree.is_leaf(ibox));
        let target_or_target_parent_boxes = (0..nboxes)
            .filter(|&ibox| target_counts[ibox] > 0)
            .collect::<Vec<_>>();
        let target_boxes = target_or_target_parent_boxes
            .iter()
            .copied()
            .filter(|&ibox| tree.is_leaf(ibox))
            .collect::<Vec<_>>();

        let level_start_target_or_target_parent_box_nrs =
            level_starts(&target_or_target_parent_boxes, box_levels, nlevels);

        let mut target_box_index = vec![NO_BOX; nboxes];
        for (index, &ibox) in target_boxes.iter().enumerate() {
            target_box_index[ibox] = index;
        }
        let mut target_or_target_parent_box_index = vec![NO_BOX; nboxes];
        for (index, &ibox) in target_or_target_parent_boxes.iter().enumerate() {
            target_or_target_parent_box_index[ibox] = index;
        }

        let mut context = ListContext {
            tree,
            criterion: SeparationCriterion::new(self.options.well_sep_is_n_away),
            near: vec![Vec::new(); nboxes],
        };

        // Near sets of a level depend on those of the previous level
        let starts = &level_start_target_or_target_parent_box_nrs;
        for level in 0..nlevels {
            let level_boxes = &target_or_target_parent_boxes[starts[level]..starts[level + 1]];
            let near_sets = level_boxes
                .par_iter()
                .map(|&ibox| context.near_set(ibox))
                .collect::<Vec<_>>();
            debug!(
                "Near sets on level {}: {} boxes, {} entries",
                level,
                level_boxes.len(),
                near_sets.iter().map(Vec::len).sum::<usize>()
            );
            for (&ibox, near) in level_boxes.iter().zip(near_sets) {
                context.near[ibox] = near;
            }
        }

        let context = &context;
        let ntarget_or_target_parent_boxes = target_or_target_parent_boxes.len();
        let ttp = &target_or_target_parent_boxes;
        let targets = &target_boxes;

        let colleagues = count_then_fill(ntarget_or_target_parent_boxes, |index, emit| {
            context.visit_colleagues(ttp[index], emit)
        });
        let from_sep_siblings = count_then_fill(ntarget_or_target_parent_boxes, |index, emit| {
            context.visit_from_sep_siblings(ttp[index], emit)
        });
        let from_sep_bigger = count_then_fill(ntarget_or_target_parent_boxes, |index, emit| {
            context.visit_from_sep_bigger(ttp[index], emit)
        });
        let neighbor_source_boxes = count_then_fill(targets.len(), |index, emit| {
            context.descend(targets[index], &mut |interaction| {
                if let Interaction::Neighbor(jbox) = interaction {
                    emit(jbox);
                }
            })
        });
        let from_sep_smaller_by_level =
            count_then_fill_by_level(targets.len(), nlevels, |index, emit| {
                context.descend(targets[index], &mut |interaction| {
                    if let Interaction::Smaller { level, ibox } = interaction {
                        emit(level, ibox);
                    }
                })
            });

        let traversal = Traversal {
            tree,
            criterion: context.criterion,
            level_start_source_box_nrs: level_starts(&source_boxes, box_levels, nlevels),
            level_start_source_parent_box_nrs: level_starts(
                &source_parent_boxes,
                box_levels,
                nlevels,
            ),
            level_start_target_box_nrs: level_starts(&target_boxes, box_levels, nlevels),
            level_start_target_or_target_parent_box_nrs,
            source_boxes,
            source_parent_boxes,
            target_boxes,
            target_or_target_parent_boxes,
            target_box_index,
            target_or_target_parent_box_index,
            colleagues,
            neighbor_source_boxes,
            from_sep_siblings,
            from_sep_smaller_by_level,
            from_sep_bigger,
        };

        if self.options.validate {
            validate_traversal(&traversal)?;
        }

        let info = TraversalBuildInfo {
            ncolleagues: traversal.colleagues.nentries(),
            nneighbor_source_boxes: traversal.neighbor_source_boxes.nentries(),
            nfrom_sep_siblings: traversal.from_sep_siblings.nentries(),
            nfrom_sep_smaller: traversal
                .from_sep_smaller_by_level
                .iter()
                .map(CompressedList::nentries)
                .sum(),
            nfrom_sep_bigger: traversal.from_sep_bigger.nentries(),
            elapsed: start_time.elapsed(),
        };

        info!(
            "Built traversal of {} boxes: {} List 1, {} List 2, {} List 3 and {} List 4 entries in {:?}",
            nboxes,
            info.nneighbor_source_boxes,
            info.nfrom_sep_siblings,
            info.nfrom_sep_smaller,
            info.nfrom_sep_bigger,
            info.elapsed
        );

        Ok((traversal, info))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::{TreeBuilder, TreeBuilderOptions};

    fn grid_points(n: usize) -> Vec<[f64; 2]> {
        (0..n * n)
            .map(|i| [(i % n) as f64 + 0.5, (i / n) as f64 + 0.5])
            .collect()
    }

    fn uniform_tree(n: usize, max_particles_in_box: usize) -> Tree<f64, 2> {
        let mut options = TreeBuilderOptions::default();
        options.set_max_particles_in_box(max_particles_in_box);
        let (tree, _) = TreeBuilder::new(options)
            .build(&grid_points(n), None)
            .unwrap();
        tree
    }

    #[test]
    fn test_single_box() {
        let tree = uniform_tree(2, 10);
        let (traversal, info) = TraversalBuilder::default().build(&tree).unwrap();

        assert_eq!(traversal.target_boxes(), &[0]);
        assert_eq!(traversal.source_boxes(), &[0]);
        assert!(traversal.source_parent_boxes().is_empty());
        assert_eq!(traversal.neighbor_source_boxes().get(0), &[0]);
        assert!(traversal.colleagues().get(0).is_empty());
        assert_eq!(info.nfrom_sep_siblings, 0);
        assert_eq!(info.nfrom_sep_smaller, 0);
        assert_eq!(info.nfrom_sep_bigger, 0);
    }

    #[test]
    fn test_uniform_grid_lists() {
        // One particle per box of an 8 x 8 grid on level 3
        let tree = uniform_tree(8, 1);
        assert_eq!(tree.nlevels(), 4);
        let (traversal, _) = TraversalBuilder::default().build(&tree).unwrap();

        let starts = traversal.level_start_target_box_nrs();
        assert_eq!(starts, &[0, 0, 0, 0, 64]);

        for (index, &ibox) in traversal.target_boxes().iter().enumerate() {
            let anchor = tree.box_anchors()[ibox];
            let on_boundary = |a: u64| usize::from(a == 0 || a == 7);
            let nneighbors_x = 3 - on_boundary(anchor[0]);
            let nneighbors_y = 3 - on_boundary(anchor[1]);

            let neighbors = traversal.neighbor_source_boxes().get(index);
            assert_eq!(neighbors.len(), nneighbors_x * nneighbors_y);
            assert!(neighbors.contains(&ibox));

            let ttp_index = traversal.target_or_target_parent_box_index(ibox).unwrap();
            assert_eq!(
                traversal.colleagues().get(ttp_index).len(),
                neighbors.len() - 1
            );
            // Interior boxes interact with 27 boxes on their own level
            if (2..6).contains(&anchor[0]) && (2..6).contains(&anchor[1]) {
                assert_eq!(traversal.from_sep_siblings().get(ttp_index).len(), 27);
            }
            assert!(traversal.from_sep_smaller(index).is_empty());
            assert!(traversal.from_sep_bigger().get(ttp_index).is_empty());
        }
    }

    #[test]
    fn test_adaptive_lists() {
        // A dense cluster in one corner next to sparse points
        let mut points = grid_points(4);
        points.extend((0..64).map(|i| [0.01 + 0.01 * (i % 8) as f64, 0.01 + 0.01 * (i / 8) as f64]));
        let mut options = TreeBuilderOptions::default();
        options.set_max_particles_in_box(4);
        let (tree, _) = TreeBuilder::new(options).build(&points, None).unwrap();

        let mut options = TraversalBuilderOptions::default();
        options.set_validate(true);
        let (traversal, info) = TraversalBuilder::new(options).build(&tree).unwrap();

        assert!(info.nfrom_sep_smaller > 0);
        assert_eq!(info.nfrom_sep_smaller, info.nfrom_sep_bigger);
        assert_eq!(
            traversal.target_or_target_parent_boxes(),
            (0..tree.nboxes()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_invalid_separation() {
        let tree = uniform_tree(2, 10);
        let mut options = TraversalBuilderOptions::default();
        options.set_well_sep_is_n_away(0);

        assert!(matches!(
            TraversalBuilder::new(options).build(&tree),
            Err(Error::Configuration(_))
        ));
    }
}
