//! Helpers

/// Compute the start of each level's run in a level-sorted array of box ids.
///
/// The result has `nlevels + 1` entries, the boxes of level `l` occupy
/// `box_ids[starts[l]..starts[l + 1]]`. Levels without boxes produce empty runs.
///
/// # Arguments
/// * `box_ids` - Box ids, sorted such that their levels are non-decreasing.
/// * `box_levels` - Level of every box in the tree.
/// * `nlevels` - Number of levels in the tree.
pub fn level_starts(box_ids: &[usize], box_levels: &[usize], nlevels: usize) -> Vec<usize> {
    let mut starts = vec![box_ids.len(); nlevels + 1];
    let mut next_level = 0;

    for (index, &ibox) in box_ids.iter().enumerate() {
        let level = box_levels[ibox];
        debug_assert!(level + 1 >= next_level, "box ids are not level sorted");
        while next_level <= level {
            starts[next_level] = index;
            next_level += 1;
        }
    }

    starts
}

/// Turn per-element counts into an index pointer of length `counts.len() + 1`.
pub fn index_pointer(counts: &[usize]) -> Vec<usize> {
    let mut starts = Vec::with_capacity(counts.len() + 1);
    let mut total = 0;
    starts.push(total);
    for count in counts {
        total += count;
        starts.push(total);
    }
    starts
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_level_starts() {
        let box_levels = vec![0, 1, 1, 2, 2, 2, 3];
        let box_ids = (0..box_levels.len()).collect::<Vec<_>>();

        let starts = level_starts(&box_ids, &box_levels, 4);
        assert_eq!(starts, vec![0, 1, 3, 6, 7]);
    }

    #[test]
    fn test_level_starts_with_missing_levels() {
        // A subset of boxes in which level 1 and the last level are absent
        let box_levels = vec![0, 1, 1, 2, 2, 3];
        let box_ids = vec![0, 3, 4];

        let starts = level_starts(&box_ids, &box_levels, 4);
        assert_eq!(starts, vec![0, 1, 1, 3, 3]);

        for level in 0..4 {
            for &ibox in &box_ids[starts[level]..starts[level + 1]] {
                assert_eq!(box_levels[ibox], level);
            }
        }
    }

    #[test]
    fn test_level_starts_empty() {
        let starts = level_starts(&[], &[0, 1], 2);
        assert_eq!(starts, vec![0, 0, 0]);
    }

    #[test]
    fn test_index_pointer() {
        assert_eq!(index_pointer(&[2, 0, 3]), vec![0, 2, 2, 5]);
        assert_eq!(index_pointer(&[]), vec![0]);
    }
}
