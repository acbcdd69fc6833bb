// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! # Rated Combination Queue
//!
//! Enumerates the combination lattice in non-decreasing
//! [`CombinationScore`] order without materializing the cross product: a
//! binary heap seeded with the origin pops the best frontier cell and
//! pushes its one-step successors along every axis.
//!
//! The enumeration is correct because the score is monotone along lattice
//! edges — a successor increments one scheduling-option index, so its
//! index sum strictly grows — and deterministic because heap ties are
//! broken by the dense position, which is stable for a given model.

use crate::combination_index::{CombinationIndex, CombinationScore, CombinationWeigher};
use contrail_model::combination::Combination;
use rustc_hash::FxHashSet;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// A lazy best-first walk over the combination space.
#[derive(Debug)]
pub struct RatedCombinationQueue<'a, W> {
    index: &'a CombinationIndex,
    weigher: W,
    heap: BinaryHeap<Reverse<(CombinationScore, usize)>>,
    enqueued: FxHashSet<usize>,
}

impl<'a, W> RatedCombinationQueue<'a, W>
where
    W: CombinationWeigher,
{
    /// Creates a queue positioned before the cheapest combination.
    pub fn new(index: &'a CombinationIndex, weigher: W) -> Self {
        let mut queue = RatedCombinationQueue {
            index,
            weigher,
            heap: BinaryHeap::new(),
            enqueued: FxHashSet::default(),
        };

        let origin = 0usize;
        let score = queue.weigher.weigh(&index.decode(origin));
        queue.heap.push(Reverse((score, origin)));
        queue.enqueued.insert(origin);
        queue
    }

    /// Number of cells currently sitting on the frontier.
    #[inline]
    pub fn frontier_len(&self) -> usize {
        self.heap.len()
    }

    fn push_successors(&mut self, position: usize) {
        for axis in 0..self.index.dimensions().len() {
            let Some(next) = self.index.successor(position, axis) else {
                continue;
            };
            if !self.enqueued.insert(next) {
                continue;
            }
            let score = self.weigher.weigh(&self.index.decode(next));
            self.heap.push(Reverse((score, next)));
        }
    }
}

impl<'a, W> Iterator for RatedCombinationQueue<'a, W>
where
    W: CombinationWeigher,
{
    type Item = (Combination, CombinationScore);

    fn next(&mut self) -> Option<Self::Item> {
        let Reverse((score, position)) = self.heap.pop()?;
        self.push_successors(position);
        Some((self.index.decode(position), score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combination_index::IndexSumWeigher;
    use proptest::prelude::*;

    #[test]
    fn test_emits_every_combination_once() {
        let index = CombinationIndex::new(&[3, 2, 2]).unwrap();
        let queue = RatedCombinationQueue::new(&index, IndexSumWeigher);

        let combinations: Vec<_> = queue.map(|(c, _)| c).collect();
        assert_eq!(combinations.len(), index.len());

        let unique: FxHashSet<_> = combinations.iter().collect();
        assert_eq!(unique.len(), index.len());
    }

    #[test]
    fn test_origin_first() {
        let index = CombinationIndex::new(&[4, 4]).unwrap();
        let mut queue = RatedCombinationQueue::new(&index, IndexSumWeigher);
        let (first, score) = queue.next().unwrap();
        assert_eq!(first, Combination::from_positions(&[0, 0]));
        assert_eq!(score.index_sum, 0);
    }

    #[test]
    fn test_deterministic_order() {
        let index = CombinationIndex::new(&[3, 3]).unwrap();
        let a: Vec<_> = RatedCombinationQueue::new(&index, IndexSumWeigher)
            .map(|(c, _)| c)
            .collect();
        let b: Vec<_> = RatedCombinationQueue::new(&index, IndexSumWeigher)
            .map(|(c, _)| c)
            .collect();
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn prop_scores_never_decrease(
            dims in proptest::collection::vec(1usize..5, 1..4)
        ) {
            let index = CombinationIndex::new(&dims).unwrap();
            let queue = RatedCombinationQueue::new(&index, IndexSumWeigher);

            let mut previous = None;
            let mut count = 0usize;
            for (_, score) in queue {
                if let Some(prev) = previous {
                    prop_assert!(score >= prev);
                }
                previous = Some(score);
                count += 1;
            }
            prop_assert_eq!(count, index.len());
        }
    }
}
