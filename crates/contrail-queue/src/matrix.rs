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

//! # Flight and Estimate Matrices
//!
//! The two result stores of a queue (and, after merging, of the whole
//! request):
//!
//! - The **flight matrix** maps a combination to its accepted fare
//!   combination — the family head, the authoritative priced solution
//!   for that exact flight combination. Append-only during a search
//!   pass; entries are only removed when superseded or pruned.
//! - The **estimate matrix** maps a combination to a `(parent, fare)`
//!   pair: a child presumed to share its parent's pricing, pending later
//!   confirmation.
//!
//! A combination never appears in both at once; the reconciliation at
//! merge time enforces this, preferring a priced entry over a fare-less
//! one for the same key.

use contrail_model::{combination::Combination, fare::FareArena, index::FareId, money::Money};
use rustc_hash::FxHashMap;

/// One accepted solution: a fare, or an explicitly fare-less placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolutionEntry {
    /// `None` marks a flight-only solution with no fare at all; fare-less
    /// fallback entries with a sentinel-priced fare carry `Some`.
    pub fare: Option<FareId>,
}

impl SolutionEntry {
    #[inline]
    pub fn priced(fare: FareId) -> Self {
        SolutionEntry { fare: Some(fare) }
    }

    #[inline]
    pub fn flight_only() -> Self {
        SolutionEntry { fare: None }
    }

    /// Whether the entry carries a genuine (non-sentinel) fare.
    pub fn has_real_fare(&self, arena: &FareArena) -> bool {
        self.fare
            .is_some_and(|id| !arena.get(id).is_fallback())
    }

    /// Effective price for ordering; fare-less entries sort last.
    pub fn price(&self, arena: &FareArena) -> Money {
        self.fare.map_or(Money::FALLBACK, |id| arena.price_of(id))
    }
}

/// Combination → accepted fare combination (the family head).
#[derive(Debug, Clone, Default)]
pub struct FlightMatrix {
    map: FxHashMap<Combination, SolutionEntry>,
}

impl FlightMatrix {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts if absent; returns whether the entry was added.
    pub fn insert(&mut self, combination: Combination, entry: SolutionEntry) -> bool {
        match self.map.entry(combination) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    /// Replaces an existing entry's fare; used by post-passes only.
    pub fn replace(&mut self, combination: &Combination, entry: SolutionEntry) {
        if let Some(slot) = self.map.get_mut(combination) {
            *slot = entry;
        }
    }

    #[inline]
    pub fn contains(&self, combination: &Combination) -> bool {
        self.map.contains_key(combination)
    }

    #[inline]
    pub fn get(&self, combination: &Combination) -> Option<&SolutionEntry> {
        self.map.get(combination)
    }

    pub fn remove(&mut self, combination: &Combination) -> Option<SolutionEntry> {
        self.map.remove(combination)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Combination, &SolutionEntry)> {
        self.map.iter()
    }

    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&Combination, &mut SolutionEntry) -> bool,
    {
        self.map.retain(keep);
    }

    /// Entries sorted by price, then combination — the deterministic
    /// order used wherever solutions are re-examined.
    pub fn sorted_by_price(&self, arena: &FareArena) -> Vec<(Combination, SolutionEntry)> {
        let mut entries: Vec<(Combination, SolutionEntry)> = self
            .map
            .iter()
            .map(|(c, e)| (c.clone(), *e))
            .collect();
        entries.sort_by(|a, b| {
            a.1.price(arena)
                .cmp(&b.1.price(arena))
                .then_with(|| a.0.cmp(&b.0))
        });
        entries
    }

    /// Absorbs all entries of `other`, keeping existing keys.
    pub fn absorb(&mut self, other: FlightMatrix) {
        for (combination, entry) in other.map {
            self.map.entry(combination).or_insert(entry);
        }
    }
}

/// A child solution presumed to share its parent's pricing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimatedSolution {
    pub parent: Combination,
    pub fare: FareId,
}

/// Combination → (parent combination, fare) for estimated children.
#[derive(Debug, Clone, Default)]
pub struct EstimateMatrix {
    map: FxHashMap<Combination, EstimatedSolution>,
}

impl EstimateMatrix {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, combination: Combination, estimate: EstimatedSolution) -> bool {
        match self.map.entry(combination) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(estimate);
                true
            }
        }
    }

    #[inline]
    pub fn contains(&self, combination: &Combination) -> bool {
        self.map.contains_key(combination)
    }

    #[inline]
    pub fn get(&self, combination: &Combination) -> Option<&EstimatedSolution> {
        self.map.get(combination)
    }

    pub fn remove(&mut self, combination: &Combination) -> Option<EstimatedSolution> {
        self.map.remove(combination)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Combination, &EstimatedSolution)> {
        self.map.iter()
    }

    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&Combination, &mut EstimatedSolution) -> bool,
    {
        self.map.retain(keep);
    }

    /// Re-points every child of `old_parent` to `new_parent`.
    pub fn repoint_children(&mut self, old_parent: &Combination, new_parent: &Combination) {
        for estimate in self.map.values_mut() {
            if estimate.parent == *old_parent {
                estimate.parent = new_parent.clone();
            }
        }
    }

    /// The children currently pointing at `parent`.
    pub fn children_of<'a>(
        &'a self,
        parent: &'a Combination,
    ) -> impl Iterator<Item = &'a Combination> + 'a {
        self.map
            .iter()
            .filter(move |(_, e)| e.parent == *parent)
            .map(|(c, _)| c)
    }

    pub fn absorb(&mut self, other: EstimateMatrix) {
        for (combination, estimate) in other.map {
            self.map.entry(combination).or_insert(estimate);
        }
    }
}

/// Reconciles keys present in both matrices after a merge: a priced
/// entry always wins over a fare-less one; on a tie the flight-matrix
/// entry is authoritative and the estimate is dropped.
pub fn reconcile_duplicates(
    flight: &mut FlightMatrix,
    estimates: &mut EstimateMatrix,
    arena: &FareArena,
) {
    let duplicated: Vec<Combination> = estimates
        .iter()
        .filter(|(c, _)| flight.contains(c))
        .map(|(c, _)| c.clone())
        .collect();

    for combination in duplicated {
        let estimate_has_fare = estimates
            .get(&combination)
            .is_some_and(|e| !arena.get(e.fare).is_fallback());
        let flight_has_fare = flight
            .get(&combination)
            .is_some_and(|e| e.has_real_fare(arena));

        if estimate_has_fare && !flight_has_fare {
            flight.remove(&combination);
        } else {
            estimates.remove(&combination);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contrail_model::carrier::Carrier;
    use contrail_model::fare::{FareCombination, FareComponent};
    use contrail_model::index::LegIndex;

    fn arena_with_prices(prices: &[Money]) -> (FareArena, Vec<FareId>) {
        let arena = FareArena::new();
        let ids = prices
            .iter()
            .map(|&p| {
                if p.is_fallback() {
                    arena.insert(FareCombination::fallback(p))
                } else {
                    arena.insert(FareCombination::new(
                        p,
                        vec![FareComponent {
                            first_leg: LegIndex::new(0),
                            last_leg: LegIndex::new(0),
                            carrier: Carrier::new("AA"),
                            amount: p,
                            industry: false,
                        }],
                    ))
                }
            })
            .collect();
        (arena, ids)
    }

    #[test]
    fn test_insert_is_first_wins() {
        let mut matrix = FlightMatrix::new();
        let key = Combination::from_positions(&[0, 0]);
        assert!(matrix.insert(key.clone(), SolutionEntry::priced(FareId::new(0))));
        assert!(!matrix.insert(key.clone(), SolutionEntry::priced(FareId::new(1))));
        assert_eq!(matrix.get(&key).unwrap().fare, Some(FareId::new(0)));
    }

    #[test]
    fn test_sorted_by_price_puts_fallback_last() {
        let (arena, ids) = arena_with_prices(&[Money::FALLBACK, Money::from_major(10)]);
        let mut matrix = FlightMatrix::new();
        matrix.insert(
            Combination::from_positions(&[0]),
            SolutionEntry::priced(ids[0]),
        );
        matrix.insert(
            Combination::from_positions(&[1]),
            SolutionEntry::priced(ids[1]),
        );

        let sorted = matrix.sorted_by_price(&arena);
        assert_eq!(sorted[0].0, Combination::from_positions(&[1]));
        assert_eq!(sorted[1].0, Combination::from_positions(&[0]));
    }

    #[test]
    fn test_repoint_children() {
        let mut estimates = EstimateMatrix::new();
        let old_parent = Combination::from_positions(&[0]);
        let new_parent = Combination::from_positions(&[1]);
        estimates.insert(
            Combination::from_positions(&[2]),
            EstimatedSolution {
                parent: old_parent.clone(),
                fare: FareId::new(0),
            },
        );

        estimates.repoint_children(&old_parent, &new_parent);
        assert_eq!(estimates.children_of(&new_parent).count(), 1);
        assert_eq!(estimates.children_of(&old_parent).count(), 0);
    }

    #[test]
    fn test_reconcile_priced_estimate_beats_fareless_flight() {
        // Estimate carries a real fare, flight entry is fare-less: the
        // flight entry is removed and the estimate survives.
        let (arena, ids) = arena_with_prices(&[Money::from_major(42), Money::FALLBACK]);
        let key = Combination::from_positions(&[0]);

        let mut flight = FlightMatrix::new();
        flight.insert(key.clone(), SolutionEntry::priced(ids[1]));
        let mut estimates = EstimateMatrix::new();
        estimates.insert(
            key.clone(),
            EstimatedSolution {
                parent: Combination::from_positions(&[1]),
                fare: ids[0],
            },
        );

        reconcile_duplicates(&mut flight, &mut estimates, &arena);
        assert!(!flight.contains(&key));
        assert!(estimates.contains(&key));
    }

    #[test]
    fn test_reconcile_flight_wins_otherwise() {
        let (arena, ids) = arena_with_prices(&[Money::from_major(42), Money::from_major(50)]);
        let key = Combination::from_positions(&[0]);

        let mut flight = FlightMatrix::new();
        flight.insert(key.clone(), SolutionEntry::priced(ids[0]));
        let mut estimates = EstimateMatrix::new();
        estimates.insert(
            key.clone(),
            EstimatedSolution {
                parent: Combination::from_positions(&[1]),
                fare: ids[1],
            },
        );

        reconcile_duplicates(&mut flight, &mut estimates, &arena);
        assert!(flight.contains(&key));
        assert!(!estimates.contains(&key));
    }

    #[test]
    fn test_priced_estimate_beats_entry_without_any_fare() {
        let (arena, ids) = arena_with_prices(&[Money::from_major(42)]);
        let key = Combination::from_positions(&[0]);

        let mut flight = FlightMatrix::new();
        flight.insert(key.clone(), SolutionEntry::flight_only());
        let mut estimates = EstimateMatrix::new();
        estimates.insert(
            key.clone(),
            EstimatedSolution {
                parent: Combination::from_positions(&[1]),
                fare: ids[0],
            },
        );

        reconcile_duplicates(&mut flight, &mut estimates, &arena);
        assert!(!flight.contains(&key));
        assert!(estimates.contains(&key));
    }

    #[test]
    fn test_no_key_in_both_after_reconcile() {
        let (arena, ids) = arena_with_prices(&[Money::from_major(42)]);
        let key = Combination::from_positions(&[0]);

        let mut flight = FlightMatrix::new();
        flight.insert(key.clone(), SolutionEntry::priced(ids[0]));
        let mut estimates = EstimateMatrix::new();
        estimates.insert(
            key.clone(),
            EstimatedSolution {
                parent: key.clone(),
                fare: ids[0],
            },
        );

        reconcile_duplicates(&mut flight, &mut estimates, &arena);
        assert!(flight.contains(&key) ^ estimates.contains(&key));
    }
}
