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

//! # Combination
//!
//! The universal key of the search: one scheduling-option choice per
//! searchable leg. Combinations key the flight and estimate matrices, the
//! flight bitmaps, and the dedupe sets, so the type is a compact value —
//! a small-vector of [`SopIndex`] that stays inline for itineraries of up
//! to four legs.
//!
//! Aggregated-leg positions (legs merged across a stopover) use
//! [`SopIndex::SENTINEL`] as a surface-sector placeholder; a sentinel is
//! never a real scheduling-option index.

use crate::index::{LegIndex, SopIndex};
use smallvec::SmallVec;

/// One scheduling-option choice per searchable leg.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Combination(SmallVec<[SopIndex; 4]>);

impl Combination {
    /// Creates a combination from raw per-leg scheduling-option positions.
    #[inline]
    pub fn from_positions(positions: &[usize]) -> Self {
        Combination(positions.iter().map(|&p| SopIndex::new(p)).collect())
    }

    /// Creates a combination from typed indices.
    #[inline]
    pub fn from_sops<I>(sops: I) -> Self
    where
        I: IntoIterator<Item = SopIndex>,
    {
        Combination(sops.into_iter().collect())
    }

    /// The number of leg positions (including sentinel placeholders).
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the combination has no positions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the scheduling-option index chosen for `leg`.
    #[inline]
    pub fn get(&self, leg: LegIndex) -> Option<SopIndex> {
        self.0.get(leg.get()).copied()
    }

    /// Iterates the per-leg choices in leg order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = SopIndex> + '_ {
        self.0.iter().copied()
    }

    /// The per-leg choices as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[SopIndex] {
        &self.0
    }

    /// Whether any position is the surface-sector placeholder.
    #[inline]
    pub fn has_surface_placeholder(&self) -> bool {
        self.0.iter().any(SopIndex::is_sentinel)
    }

    /// Sum of the non-sentinel scheduling-option indices. Cheaper options
    /// appear earlier in their leg's list, so a smaller sum is the primary
    /// tie-break of the deterministic enumeration order.
    #[inline]
    pub fn sop_index_sum(&self) -> u64 {
        self.0
            .iter()
            .filter(|sop| !sop.is_sentinel())
            .map(|sop| sop.get() as u64)
            .sum()
    }
}

impl std::fmt::Debug for Combination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (n, sop) in self.0.iter().enumerate() {
            if n != 0 {
                write!(f, ", ")?;
            }
            if sop.is_sentinel() {
                write!(f, "-")?;
            } else {
                write!(f, "{}", sop.get())?;
            }
        }
        write!(f, ")")
    }
}

impl std::fmt::Display for Combination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_roundtrip() {
        let combination = Combination::from_positions(&[0, 2, 1]);
        assert_eq!(combination.len(), 3);
        assert_eq!(combination.get(LegIndex::new(1)), Some(SopIndex::new(2)));
        assert_eq!(combination.get(LegIndex::new(3)), None);
    }

    #[test]
    fn test_index_sum_skips_placeholders() {
        let combination =
            Combination::from_sops([SopIndex::new(3), SopIndex::SENTINEL, SopIndex::new(2)]);
        assert_eq!(combination.sop_index_sum(), 5);
        assert!(combination.has_surface_placeholder());
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let a = Combination::from_positions(&[0, 5]);
        let b = Combination::from_positions(&[1, 0]);
        assert!(a < b);
    }

    #[test]
    fn test_display() {
        let combination =
            Combination::from_sops([SopIndex::new(1), SopIndex::SENTINEL, SopIndex::new(0)]);
        assert_eq!(format!("{combination}"), "(1, -, 0)");
    }
}
