//! Consistency checks for built interaction lists.
use itertools::Itertools;

use crate::{
    traversal::{lists::CompressedList, separation::separation_threshold, types::Traversal},
    tree::validate::ensure,
    types::{RealScalar, Result},
};

/// Check the defining properties of all interaction lists of a traversal.
pub fn validate_traversal<T: RealScalar, const DIM: usize>(
    traversal: &Traversal<'_, T, DIM>,
) -> Result<()> {
    check_box_sets(traversal)?;
    check_level_tables(traversal)?;
    check_colleagues(traversal)?;
    check_neighbor_source_boxes(traversal)?;
    check_from_sep_siblings(traversal)?;
    check_from_sep_smaller(traversal)?;
    check_from_sep_bigger(traversal)?;
    if traversal.tree().sources_are_targets() {
        check_duality(traversal)?;
    }
    Ok(())
}

fn check_box_sets<T: RealScalar, const DIM: usize>(
    traversal: &Traversal<'_, T, DIM>,
) -> Result<()> {
    let tree = traversal.tree();
    let source_counts = tree.box_source_counts();
    let target_counts = tree.box_target_counts();

    for (name, boxes, leaves, counts) in [
        ("source_boxes", traversal.source_boxes(), true, source_counts),
        (
            "source_parent_boxes",
            traversal.source_parent_boxes(),
            false,
            source_counts,
        ),
        ("target_boxes", traversal.target_boxes(), true, target_counts),
    ] {
        ensure(boxes.iter().tuple_windows().all(|(a, b)| a < b), || {
            format!("{name} are not sorted")
        })?;
        for &ibox in boxes {
            ensure(tree.is_leaf(ibox) == leaves && counts[ibox] > 0, || {
                format!("box {ibox} does not belong to {name}")
            })?;
        }
    }

    let ttp = traversal.target_or_target_parent_boxes();
    ensure(
        ttp.iter().copied().eq((0..tree.nboxes()).filter(|&ibox| target_counts[ibox] > 0)),
        || "target_or_target_parent_boxes are not the boxes with targets".to_string(),
    )?;
    for (index, &ibox) in ttp.iter().enumerate() {
        ensure(
            traversal.target_or_target_parent_box_index(ibox) == Some(index),
            || format!("box {ibox} has a wrong target or target parent index"),
        )?;
    }
    for (index, &ibox) in traversal.target_boxes().iter().enumerate() {
        ensure(traversal.target_box_index(ibox) == Some(index), || {
            format!("box {ibox} has a wrong target box index")
        })?;
    }

    if tree.sources_are_targets() {
        ensure(traversal.source_boxes() == traversal.target_boxes(), || {
            "source and target boxes differ for identical sources and targets".to_string()
        })?;
    }
    Ok(())
}

fn check_level_tables<T: RealScalar, const DIM: usize>(
    traversal: &Traversal<'_, T, DIM>,
) -> Result<()> {
    let levels = traversal.tree().box_levels();
    let nlevels = traversal.nlevels();

    for (name, boxes, starts) in [
        (
            "source_boxes",
            traversal.source_boxes(),
            traversal.level_start_source_box_nrs(),
        ),
        (
            "source_parent_boxes",
            traversal.source_parent_boxes(),
            traversal.level_start_source_parent_box_nrs(),
        ),
        (
            "target_boxes",
            traversal.target_boxes(),
            traversal.level_start_target_box_nrs(),
        ),
        (
            "target_or_target_parent_boxes",
            traversal.target_or_target_parent_boxes(),
            traversal.level_start_target_or_target_parent_box_nrs(),
        ),
    ] {
        ensure(
            starts.len() == nlevels + 1 && starts[0] == 0 && starts[nlevels] == boxes.len(),
            || format!("level table of {name} does not cover all boxes"),
        )?;
        for (level, range) in starts.windows(2).enumerate() {
            ensure(
                range[0] <= range[1]
                    && boxes[range[0]..range[1]]
                        .iter()
                        .all(|&ibox| levels[ibox] == level),
                || format!("level {level} of {name} holds boxes of other levels"),
            )?;
        }
    }
    Ok(())
}

fn check_list_shape(name: &str, list: &CompressedList, nindexed: usize) -> Result<()> {
    ensure(
        list.len() == nindexed && list.starts().last() == Some(&list.nentries()),
        || format!("{name} is not indexed by {nindexed} boxes"),
    )?;
    ensure(
        list.iter()
            .all(|entries| entries.iter().tuple_windows().all(|(a, b)| a < b)),
        || format!("{name} has unsorted or duplicate entries"),
    )
}

fn check_colleagues<T: RealScalar, const DIM: usize>(
    traversal: &Traversal<'_, T, DIM>,
) -> Result<()> {
    let levels = traversal.tree().box_levels();
    let ttp = traversal.target_or_target_parent_boxes();
    check_list_shape("colleagues", traversal.colleagues(), ttp.len())?;

    for (&ibox, colleagues) in ttp.iter().zip(traversal.colleagues().iter()) {
        for &jbox in colleagues {
            ensure(
                jbox != ibox
                    && levels[jbox] == levels[ibox]
                    && !traversal.is_well_separated(ibox, jbox),
                || format!("box {jbox} is not a colleague of box {ibox}"),
            )?;
        }
    }
    Ok(())
}

fn check_neighbor_source_boxes<T: RealScalar, const DIM: usize>(
    traversal: &Traversal<'_, T, DIM>,
) -> Result<()> {
    let tree = traversal.tree();
    let targets = traversal.target_boxes();
    check_list_shape("List 1", traversal.neighbor_source_boxes(), targets.len())?;

    for (&ibox, neighbors) in targets.iter().zip(traversal.neighbor_source_boxes().iter()) {
        for &jbox in neighbors {
            ensure(
                tree.is_leaf(jbox)
                    && tree.box_source_counts()[jbox] > 0
                    && !traversal.is_well_separated(ibox, jbox),
                || format!("box {jbox} is not a neighbor source box of box {ibox}"),
            )?;
        }
        if tree.sources_are_targets() {
            ensure(neighbors.binary_search(&ibox).is_ok(), || {
                format!("target box {ibox} is missing from its own List 1")
            })?;
        }
    }
    Ok(())
}

fn check_from_sep_siblings<T: RealScalar, const DIM: usize>(
    traversal: &Traversal<'_, T, DIM>,
) -> Result<()> {
    let tree = traversal.tree();
    let levels = tree.box_levels();
    let centers = tree.box_centers();
    let ttp = traversal.target_or_target_parent_boxes();
    check_list_shape("List 2", traversal.from_sep_siblings(), ttp.len())?;

    for (&ibox, siblings) in ttp.iter().zip(traversal.from_sep_siblings().iter()) {
        let threshold = separation_threshold(
            tree.root_extent(),
            levels[ibox],
            traversal.well_sep_is_n_away(),
        );
        for &jbox in siblings {
            let distance = centers[ibox]
                .iter()
                .zip(&centers[jbox])
                .map(|(&a, &b)| (a - b) * (a - b))
                .fold(T::zero(), |acc, x| acc + x)
                .sqrt();
            ensure(
                levels[jbox] == levels[ibox]
                    && traversal.is_well_separated(ibox, jbox)
                    && distance > threshold,
                || format!("box {jbox} is not a well separated sibling of box {ibox}"),
            )?;
        }
    }
    Ok(())
}

fn check_from_sep_smaller<T: RealScalar, const DIM: usize>(
    traversal: &Traversal<'_, T, DIM>,
) -> Result<()> {
    let tree = traversal.tree();
    let levels = tree.box_levels();
    let targets = traversal.target_boxes();
    ensure(
        traversal.from_sep_smaller_by_level().len() == traversal.nlevels(),
        || "List 3 does not have one list per level".to_string(),
    )?;

    for (level, list) in traversal.from_sep_smaller_by_level().iter().enumerate() {
        check_list_shape("List 3", list, targets.len())?;
        for (&ibox, smaller) in targets.iter().zip(list.iter()) {
            for &jbox in smaller {
                let parent_is_near = tree
                    .box_parent(jbox)
                    .is_some_and(|parent| !traversal.is_well_separated(ibox, parent));
                ensure(
                    levels[jbox] == level
                        && levels[ibox] < level
                        && traversal.is_well_separated(ibox, jbox)
                        && parent_is_near,
                    || format!("box {jbox} is not a smaller separated box of box {ibox}"),
                )?;
            }
        }
    }
    Ok(())
}

fn check_from_sep_bigger<T: RealScalar, const DIM: usize>(
    traversal: &Traversal<'_, T, DIM>,
) -> Result<()> {
    let tree = traversal.tree();
    let levels = tree.box_levels();
    let ttp = traversal.target_or_target_parent_boxes();
    check_list_shape("List 4", traversal.from_sep_bigger(), ttp.len())?;

    for (&ibox, bigger) in ttp.iter().zip(traversal.from_sep_bigger().iter()) {
        for &jbox in bigger {
            let parent_is_near = tree
                .box_parent(ibox)
                .is_some_and(|parent| !traversal.is_well_separated(parent, jbox));
            ensure(
                tree.is_leaf(jbox)
                    && levels[jbox] < levels[ibox]
                    && traversal.is_well_separated(ibox, jbox)
                    && parent_is_near,
                || format!("box {jbox} is not a bigger separated box of box {ibox}"),
            )?;
        }
    }
    Ok(())
}

/// With identical sources and targets, `B` is in List 4 of `T` iff `T` is in List 3 of `B`.
fn check_duality<T: RealScalar, const DIM: usize>(
    traversal: &Traversal<'_, T, DIM>,
) -> Result<()> {
    let levels = traversal.tree().box_levels();
    let ttp = traversal.target_or_target_parent_boxes();

    let mut bigger_pairs = Vec::new();
    for (&ibox, bigger) in ttp.iter().zip(traversal.from_sep_bigger().iter()) {
        bigger_pairs.extend(bigger.iter().map(|&jbox| (jbox, ibox)));
    }

    let mut smaller_pairs = Vec::new();
    for (index, &ibox) in traversal.target_boxes().iter().enumerate() {
        smaller_pairs.extend(
            traversal
                .from_sep_smaller(index)
                .into_iter()
                .map(|jbox| (ibox, jbox)),
        );
    }

    bigger_pairs.sort_unstable();
    smaller_pairs.sort_unstable();
    ensure(bigger_pairs == smaller_pairs, || {
        match bigger_pairs
            .iter()
            .zip(&smaller_pairs)
            .find(|(a, b)| a != b)
        {
            Some((&(big, small), _)) => format!(
                "List 3 and List 4 are not dual for box {big} on level {} and box {small}",
                levels[big]
            ),
            None => format!(
                "List 3 has {} entries and List 4 has {}",
                smaller_pairs.len(),
                bigger_pairs.len()
            ),
        }
    })
}
