//! Consistency checks for built trees.
use crate::{
    constants::NO_BOX,
    helpers::level_starts,
    tree::{domain::BoundingBox, types::Tree},
    types::{Error, RealScalar, Result},
};

/// Fail with an invariant violation if `condition` does not hold.
pub(crate) fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::InvariantViolation(message()))
    }
}

/// Check all structural and geometric invariants of a tree.
pub fn validate_tree<T: RealScalar, const DIM: usize>(tree: &Tree<T, DIM>) -> Result<()> {
    check_connectivity(tree)?;
    check_levels(tree)?;
    check_particles(tree)?;
    check_bounding_boxes(tree)
}

fn check_connectivity<T: RealScalar, const DIM: usize>(tree: &Tree<T, DIM>) -> Result<()> {
    let nboxes = tree.nboxes();
    ensure(nboxes > 0, || "tree has no boxes".to_string())?;
    ensure(
        tree.box_levels()[0] == 0 && tree.box_parent_ids()[0] == NO_BOX,
        || "box 0 is not a root box".to_string(),
    )?;

    for ibox in 1..nboxes {
        let parent = tree.box_parent_ids()[ibox];
        ensure(parent < ibox, || {
            format!("box {ibox} has parent {parent} which is not an earlier box")
        })?;
        ensure(
            tree.box_levels()[parent] + 1 == tree.box_levels()[ibox],
            || format!("box {ibox} is not one level below its parent {parent}"),
        )?;
        ensure(tree.box_children(parent).contains(&ibox), || {
            format!("box {ibox} is not a child of its parent {parent}")
        })?;
    }

    for ibox in 0..nboxes {
        let anchor = tree.box_anchors()[ibox];
        for (slot, &child) in tree.box_children(ibox).iter().enumerate() {
            if child == NO_BOX {
                continue;
            }
            ensure(child > ibox && child < nboxes, || {
                format!("box {ibox} has invalid child {child}")
            })?;
            ensure(tree.box_parent_ids()[child] == ibox, || {
                format!("child {child} of box {ibox} does not point back to it")
            })?;
            let child_anchor = tree.box_anchors()[child];
            for d in 0..DIM {
                ensure(
                    child_anchor[d] >> 1 == anchor[d] && (child_anchor[d] & 1) as usize == (slot >> d) & 1,
                    || format!("child {child} of box {ibox} is not in slot {slot}"),
                )?;
            }
        }
    }

    Ok(())
}

fn check_levels<T: RealScalar, const DIM: usize>(tree: &Tree<T, DIM>) -> Result<()> {
    let levels = tree.box_levels();
    ensure(levels.windows(2).all(|pair| pair[0] <= pair[1]), || {
        "box ids are not sorted by level".to_string()
    })?;
    ensure(
        levels.last().map(|&level| level + 1) == Some(tree.nlevels()),
        || "number of levels does not match the deepest box".to_string(),
    )?;

    let box_ids = (0..tree.nboxes()).collect::<Vec<_>>();
    ensure(
        level_starts(&box_ids, levels, tree.nlevels()) == tree.level_start_box_nrs(),
        || "level start table does not match the box levels".to_string(),
    )
}

fn check_particle_ranges(
    tree_starts: &[usize],
    tree_counts: &[usize],
    children: impl Fn(usize) -> Vec<usize>,
    nboxes: usize,
    kind: &str,
) -> Result<()> {
    for ibox in 0..nboxes {
        let child_ids = children(ibox);
        if child_ids.is_empty() {
            continue;
        }
        // Children partition the range of their parent in slot order
        let mut next = tree_starts[ibox];
        for child in child_ids {
            ensure(tree_starts[child] == next, || {
                format!("{kind} range of box {child} does not continue the range of its siblings")
            })?;
            next += tree_counts[child];
        }
        ensure(next == tree_starts[ibox] + tree_counts[ibox], || {
            format!("{kind} ranges of the children of box {ibox} do not cover their parent")
        })?;
    }
    Ok(())
}

fn check_particles<T: RealScalar, const DIM: usize>(tree: &Tree<T, DIM>) -> Result<()> {
    let nboxes = tree.nboxes();
    let children = |ibox: usize| tree.child_boxes(ibox).collect::<Vec<_>>();

    ensure(
        tree.box_source_counts()[0] == tree.nsources()
            && tree.box_target_counts()[0] == tree.ntargets(),
        || "root box does not hold all particles".to_string(),
    )?;
    check_particle_ranges(
        tree.box_source_starts(),
        tree.box_source_counts(),
        children,
        nboxes,
        "source",
    )?;
    check_particle_ranges(
        tree.box_target_starts(),
        tree.box_target_counts(),
        children,
        nboxes,
        "target",
    )?;

    for ibox in 0..nboxes {
        ensure(tree.box_particle_count(ibox) > 0, || {
            format!("box {ibox} holds no particles")
        })?;

        if !tree.is_leaf(ibox) {
            continue;
        }
        ensure(
            tree.box_particle_count(ibox) <= tree.max_particles_in_box(),
            || format!("leaf {ibox} holds more than the maximum number of particles"),
        )?;

        let (lower, upper) = tree.get_box_extent(ibox);
        let extent = BoundingBox {
            min: lower,
            max: upper,
        };
        ensure(
            tree.box_sources(ibox)
                .iter()
                .chain(tree.box_targets(ibox))
                .all(|point| extent.contains(point)),
            || format!("leaf {ibox} holds particles outside of its extent"),
        )?;
    }

    Ok(())
}

fn check_bounding_boxes<T: RealScalar, const DIM: usize>(tree: &Tree<T, DIM>) -> Result<()> {
    for ibox in 0..tree.nboxes() {
        let (lower, upper) = tree.get_box_extent(ibox);
        let extent = BoundingBox {
            min: lower,
            max: upper,
        };
        let center = &tree.box_centers()[ibox];

        for (kind, bbox) in [
            ("source", &tree.box_source_bounding_boxes()[ibox]),
            ("target", &tree.box_target_bounding_boxes()[ibox]),
        ] {
            ensure(extent.contains_box(bbox), || {
                format!("{kind} bounding box of box {ibox} exceeds the box extent")
            })?;
            ensure(bbox.contains(center), || {
                format!("{kind} bounding box of box {ibox} does not contain the box center")
            })?;
        }
    }
    Ok(())
}
