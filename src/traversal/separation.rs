//! Well-separateness of boxes.
//!
//! Two boxes are compared on the finer of their two levels. The gap between them is the
//! Chebyshev distance between their extents measured in side lengths of the finer box, which
//! is an exact integer computed from the box anchors. Two boxes are well separated if this gap
//! is at least `well_sep_is_n_away`. The test is symmetric, and if a box is not well separated
//! from some other box then neither is its parent.
use crate::{
    tree::Tree,
    types::{real, RealScalar},
};

/// Chebyshev gap between two boxes in units of the side length of the finer box.
///
/// # Arguments
/// * `level_a` - Level of the first box.
/// * `anchor_a` - Anchor of the first box.
/// * `level_b` - Level of the second box.
/// * `anchor_b` - Anchor of the second box.
pub fn box_gap<const DIM: usize>(
    level_a: usize,
    anchor_a: &[u64; DIM],
    level_b: usize,
    anchor_b: &[u64; DIM],
) -> u64 {
    let level = level_a.max(level_b);
    let shift_a = level - level_a;
    let shift_b = level - level_b;

    anchor_a
        .iter()
        .zip(anchor_b)
        .map(|(&a, &b)| {
            let (a_lower, a_upper) = (a << shift_a, (a + 1) << shift_a);
            let (b_lower, b_upper) = (b << shift_b, (b + 1) << shift_b);
            b_lower
                .saturating_sub(a_upper)
                .max(a_lower.saturating_sub(b_upper))
        })
        .max()
        .unwrap_or(0)
}

/// Minimum center distance of two well separated boxes on `level`, the classical
/// `(2n + 1/2)` box radii criterion.
pub fn separation_threshold<T: RealScalar>(
    root_extent: T,
    level: usize,
    well_sep_is_n_away: usize,
) -> T {
    let radius = root_extent * real(0.5) / real::<T, _>(1u64 << level);
    real::<T, _>(2 * well_sep_is_n_away) * radius + real::<T, _>(0.5) * radius
}

/// Separation criterion of a traversal.
#[derive(Debug, Clone, Copy)]
pub struct SeparationCriterion {
    well_sep_is_n_away: usize,
}

impl SeparationCriterion {
    /// Create a criterion requiring `well_sep_is_n_away` boxes between well separated boxes.
    pub fn new(well_sep_is_n_away: usize) -> Self {
        Self { well_sep_is_n_away }
    }

    /// Number of boxes of separation.
    pub fn well_sep_is_n_away(&self) -> usize {
        self.well_sep_is_n_away
    }

    /// Check if two boxes of a tree are well separated.
    pub fn is_well_separated<T: RealScalar, const DIM: usize>(
        &self,
        tree: &Tree<T, DIM>,
        ibox: usize,
        jbox: usize,
    ) -> bool {
        let levels = tree.box_levels();
        let anchors = tree.box_anchors();
        box_gap(levels[ibox], &anchors[ibox], levels[jbox], &anchors[jbox])
            >= self.well_sep_is_n_away as u64
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_same_level_gap() {
        assert_eq!(box_gap(2, &[1, 1], 2, &[1, 1]), 0);
        // Face and corner neighbours touch
        assert_eq!(box_gap(2, &[1, 1], 2, &[2, 1]), 0);
        assert_eq!(box_gap(2, &[1, 1], 2, &[2, 2]), 0);
        // One box in between
        assert_eq!(box_gap(2, &[0, 1], 2, &[2, 1]), 1);
        assert_eq!(box_gap(2, &[0, 0], 2, &[3, 1]), 2);
    }

    #[test]
    fn test_gap_between_levels() {
        // Level 1 box covering [2, 4) x [0, 2) in level 2 units
        let coarse = [1, 0];
        assert_eq!(box_gap(1, &coarse, 2, &[1, 0]), 0);
        assert_eq!(box_gap(1, &coarse, 2, &[0, 0]), 1);
        assert_eq!(box_gap(1, &coarse, 2, &[2, 3]), 1);
        assert_eq!(box_gap(1, &coarse, 3, &[1, 0]), 2);
        // A box and its own descendant overlap
        assert_eq!(box_gap(1, &coarse, 3, &[5, 2]), 0);
    }

    #[test]
    fn test_gap_is_symmetric() {
        let boxes = [
            (0, [0u64, 0, 0]),
            (1, [1, 0, 1]),
            (2, [0, 3, 2]),
            (3, [7, 1, 0]),
            (3, [2, 2, 5]),
            (4, [9, 3, 12]),
        ];
        for (level_a, anchor_a) in &boxes {
            for (level_b, anchor_b) in &boxes {
                assert_eq!(
                    box_gap(*level_a, anchor_a, *level_b, anchor_b),
                    box_gap(*level_b, anchor_b, *level_a, anchor_a)
                );
            }
        }
    }

    #[test]
    fn test_parent_is_never_more_separated() {
        let target = (3, [2u64, 5]);
        for level in 1..5usize {
            for x in 0..(1u64 << level) {
                for y in 0..(1u64 << level) {
                    let child = box_gap(target.0, &target.1, level, &[x, y]);
                    let parent = box_gap(target.0, &target.1, level - 1, &[x >> 1, y >> 1]);
                    assert!(parent <= child);
                }
            }
        }
    }

    #[test]
    fn test_separation_threshold() {
        // Two and a half box radii for well_sep_is_n_away = 1
        assert_relative_eq!(separation_threshold(1.0, 0, 1), 1.25);
        assert_relative_eq!(separation_threshold(8.0, 2, 1), 2.5);
        assert_relative_eq!(separation_threshold(8.0, 2, 2), 4.5);
    }
}
