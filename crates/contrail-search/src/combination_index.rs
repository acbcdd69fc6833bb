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

//! # Combination Index
//!
//! The dense, mixed-radix encoding of the combination space: one
//! dimension per searchable leg-group, a bijection between combinations
//! and positions in `0..len()`, and the deterministic tie-break score
//! used to enumerate equally priced combinations reproducibly.
//!
//! The position encoding is row-major with the last leg fastest, so
//! position `0` is the all-zeros combination and `decode` is the exact
//! inverse of `encode`. Flight bitmaps are addressed by these positions,
//! which is why the encoding must stay stable for the life of a request.

use contrail_core::num::checked_product;
use contrail_model::combination::Combination;
use smallvec::SmallVec;

/// Deterministic tie-break score of a combination.
///
/// Ordering favors a smaller aggregate scheduling-option index sum, then
/// a smaller aggregate travel-segment count. This is a reproducible
/// default ordering among equally priced combinations, not a correctness
/// requirement.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct CombinationScore {
    pub index_sum: u64,
    pub segment_count: u64,
}

/// Computes the tie-break score of a combination.
pub trait CombinationWeigher {
    fn weigh(&self, combination: &Combination) -> CombinationScore;
}

/// The model-free default weigher: index sum only.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexSumWeigher;

impl CombinationWeigher for IndexSumWeigher {
    #[inline]
    fn weigh(&self, combination: &Combination) -> CombinationScore {
        CombinationScore {
            index_sum: combination.sop_index_sum(),
            segment_count: 0,
        }
    }
}

impl<F> CombinationWeigher for F
where
    F: Fn(&Combination) -> CombinationScore,
{
    #[inline]
    fn weigh(&self, combination: &Combination) -> CombinationScore {
        self(combination)
    }
}

/// The dense dimensional index over the combination space.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CombinationIndex {
    dims: SmallVec<[usize; 4]>,
    /// Row-major strides; `strides[k]` is the product of `dims[k+1..]`.
    strides: SmallVec<[usize; 4]>,
    len: usize,
}

impl CombinationIndex {
    /// Creates the index for the given per-leg dimension sizes.
    ///
    /// Returns `None` when the space is empty (no dimensions, a zero
    /// dimension) or its size overflows `usize` — both mean the partition
    /// has no candidate space.
    pub fn new(dims: &[usize]) -> Option<Self> {
        let len = checked_product(dims)?;
        if len == 0 {
            return None;
        }

        let mut strides: SmallVec<[usize; 4]> = SmallVec::with_capacity(dims.len());
        let mut stride = 1usize;
        for &dim in dims.iter().rev() {
            strides.push(stride);
            stride = stride.checked_mul(dim)?;
        }
        strides.reverse();

        Some(CombinationIndex {
            dims: dims.iter().copied().collect(),
            strides,
            len,
        })
    }

    /// One size per participating leg-group.
    #[inline]
    pub fn dimensions(&self) -> &[usize] {
        &self.dims
    }

    /// Total number of combinations in the space.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the space is empty. Construction rejects empty spaces, so
    /// this is always `false` for a built index.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maps a combination to its dense position.
    ///
    /// Returns `None` for combinations of the wrong arity, with
    /// out-of-bounds indices, or containing the surface placeholder —
    /// placeholders have no bit address.
    pub fn encode(&self, combination: &Combination) -> Option<usize> {
        if combination.len() != self.dims.len() {
            return None;
        }

        let mut position = 0usize;
        for (n, sop) in combination.iter().enumerate() {
            if sop.is_sentinel() || sop.get() >= self.dims[n] {
                return None;
            }
            position += sop.get() * self.strides[n];
        }
        Some(position)
    }

    /// Maps a dense position back to its combination; the inverse of
    /// [`CombinationIndex::encode`].
    ///
    /// # Panics
    ///
    /// Panics if `position >= len()`.
    pub fn decode(&self, position: usize) -> Combination {
        assert!(
            position < self.len,
            "called `CombinationIndex::decode` with position {position} but the space has {} cells",
            self.len
        );

        let mut rest = position;
        let mut positions: SmallVec<[usize; 4]> = SmallVec::with_capacity(self.dims.len());
        for n in 0..self.dims.len() {
            positions.push(rest / self.strides[n]);
            rest %= self.strides[n];
        }
        Combination::from_positions(&positions)
    }

    /// The position one step along `axis` from `position`, if that
    /// neighbor exists. Used by the rated lattice enumeration.
    pub fn successor(&self, position: usize, axis: usize) -> Option<usize> {
        debug_assert!(position < self.len && axis < self.dims.len());

        let digit = (position / self.strides[axis]) % self.dims[axis];
        if digit + 1 >= self.dims[axis] {
            return None;
        }
        Some(position + self.strides[axis])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_degenerate_spaces() {
        assert!(CombinationIndex::new(&[]).is_none());
        assert!(CombinationIndex::new(&[3, 0, 2]).is_none());
        assert!(CombinationIndex::new(&[usize::MAX, 2]).is_none());
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let index = CombinationIndex::new(&[2, 3, 2]).unwrap();
        assert_eq!(index.len(), 12);

        for position in 0..index.len() {
            let combination = index.decode(position);
            assert_eq!(index.encode(&combination), Some(position));
        }
    }

    #[test]
    fn test_position_zero_is_origin() {
        let index = CombinationIndex::new(&[4, 5]).unwrap();
        assert_eq!(index.decode(0), Combination::from_positions(&[0, 0]));
        // Last leg runs fastest.
        assert_eq!(index.decode(1), Combination::from_positions(&[0, 1]));
        assert_eq!(index.decode(5), Combination::from_positions(&[1, 0]));
    }

    #[test]
    fn test_encode_rejects_bad_keys() {
        let index = CombinationIndex::new(&[2, 2]).unwrap();
        assert_eq!(index.encode(&Combination::from_positions(&[0])), None);
        assert_eq!(index.encode(&Combination::from_positions(&[2, 0])), None);

        let surface = Combination::from_sops([
            contrail_model::index::SopIndex::new(0),
            contrail_model::index::SopIndex::SENTINEL,
        ]);
        assert_eq!(index.encode(&surface), None);
    }

    #[test]
    fn test_successor_walks_one_axis() {
        let index = CombinationIndex::new(&[2, 3]).unwrap();
        let origin = index.encode(&Combination::from_positions(&[0, 0])).unwrap();

        let right = index.successor(origin, 1).unwrap();
        assert_eq!(index.decode(right), Combination::from_positions(&[0, 1]));

        let down = index.successor(origin, 0).unwrap();
        assert_eq!(index.decode(down), Combination::from_positions(&[1, 0]));

        // Axis 0 is saturated at digit 1 of 2.
        assert_eq!(index.successor(down, 0), None);
    }

    #[test]
    fn test_score_ordering() {
        let small = CombinationScore {
            index_sum: 1,
            segment_count: 9,
        };
        let large = CombinationScore {
            index_sum: 2,
            segment_count: 0,
        };
        assert!(small < large);

        let fewer_segments = CombinationScore {
            index_sum: 2,
            segment_count: 1,
        };
        assert!(fewer_segments < CombinationScore {
            index_sum: 2,
            segment_count: 4,
        });
    }
}
