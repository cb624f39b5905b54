//! Compressed storage of interaction lists and their parallel construction.
//!
//! Lists are assembled in two passes. A first parallel pass counts the entries of every
//! indexed element, the counts are turned into an index pointer, and a second parallel pass
//! writes the entries into disjoint slices of the preallocated output.
use rayon::prelude::*;

use crate::helpers::index_pointer;

/// A list of box ids for every element of an indexed set.
///
/// The entries of element `i` are `lists[starts[i]..starts[i + 1]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedList {
    pub(crate) starts: Vec<usize>,
    pub(crate) lists: Vec<usize>,
}

impl Default for CompressedList {
    fn default() -> Self {
        Self {
            starts: vec![0],
            lists: Vec::new(),
        }
    }
}

impl CompressedList {
    /// Index pointer, one entry more than the indexed set has elements.
    pub fn starts(&self) -> &[usize] {
        &self.starts
    }

    /// Concatenated entries of all elements.
    pub fn lists(&self) -> &[usize] {
        &self.lists
    }

    /// Number of indexed elements.
    pub fn len(&self) -> usize {
        self.starts.len() - 1
    }

    /// Check if the indexed set is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of entries.
    pub fn nentries(&self) -> usize {
        self.lists.len()
    }

    /// Entries of element `index`.
    pub fn get(&self, index: usize) -> &[usize] {
        &self.lists[self.starts[index]..self.starts[index + 1]]
    }

    /// Iterate over the entries of all elements in order.
    pub fn iter(&self) -> impl Iterator<Item = &[usize]> + '_ {
        self.starts
            .windows(2)
            .map(|range| &self.lists[range[0]..range[1]])
    }
}

/// Split `data` into consecutive mutable chunks delimited by an index pointer.
fn split_by_starts<'a>(mut data: &'a mut [usize], starts: &[usize]) -> Vec<&'a mut [usize]> {
    let mut chunks = Vec::with_capacity(starts.len().saturating_sub(1));
    for range in starts.windows(2) {
        let (head, tail) = std::mem::take(&mut data).split_at_mut(range[1] - range[0]);
        chunks.push(head);
        data = tail;
    }
    chunks
}

/// Build a compressed list over `nindexed` elements.
///
/// `visit(i, emit)` must call `emit` once for every entry of element `i`, and must produce the
/// same entries every time it is called. Entries of each element are stored sorted.
pub(crate) fn count_then_fill<F>(nindexed: usize, visit: F) -> CompressedList
where
    F: Fn(usize, &mut dyn FnMut(usize)) + Sync,
{
    let counts = (0..nindexed)
        .into_par_iter()
        .map(|index| {
            let mut count = 0;
            visit(index, &mut |_| count += 1);
            count
        })
        .collect::<Vec<_>>();

    let starts = index_pointer(&counts);
    let mut lists = vec![0; starts[nindexed]];

    split_by_starts(&mut lists, &starts)
        .into_par_iter()
        .enumerate()
        .for_each(|(index, chunk)| {
            let mut position = 0;
            visit(index, &mut |ibox| {
                chunk[position] = ibox;
                position += 1;
            });
            chunk.sort_unstable();
        });

    CompressedList { starts, lists }
}

/// Build one compressed list per level over `nindexed` elements.
///
/// `visit(i, emit)` calls `emit(level, ibox)` for every entry of element `i`, the entry is
/// stored in the list of `level`.
pub(crate) fn count_then_fill_by_level<F>(
    nindexed: usize,
    nlevels: usize,
    visit: F,
) -> Vec<CompressedList>
where
    F: Fn(usize, &mut dyn FnMut(usize, usize)) + Sync,
{
    let counts = (0..nindexed)
        .into_par_iter()
        .map(|index| {
            let mut counts = vec![0; nlevels];
            visit(index, &mut |level, _| counts[level] += 1);
            counts
        })
        .collect::<Vec<_>>();

    let mut lists_by_level = (0..nlevels)
        .map(|level| {
            let level_counts = counts.iter().map(|c| c[level]).collect::<Vec<_>>();
            let starts = index_pointer(&level_counts);
            CompressedList {
                lists: vec![0; starts[nindexed]],
                starts,
            }
        })
        .collect::<Vec<_>>();

    // Output slices of every indexed element, one per level
    let mut chunks = (0..nindexed)
        .map(|_| Vec::with_capacity(nlevels))
        .collect::<Vec<Vec<&mut [usize]>>>();
    for CompressedList { starts, lists } in lists_by_level.iter_mut() {
        for (element_chunks, chunk) in chunks.iter_mut().zip(split_by_starts(lists, starts)) {
            element_chunks.push(chunk);
        }
    }

    chunks
        .into_par_iter()
        .enumerate()
        .for_each(|(index, mut level_chunks)| {
            let mut positions = vec![0; nlevels];
            visit(index, &mut |level, ibox| {
                level_chunks[level][positions[level]] = ibox;
                positions[level] += 1;
            });
            for chunk in level_chunks.iter_mut() {
                chunk.sort_unstable();
            }
        });

    lists_by_level
}
