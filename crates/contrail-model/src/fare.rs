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

//! # Fare Combinations and the Request Arena
//!
//! A [`FareCombination`] is a priced pairing of per-market fares covering
//! the full itinerary. Instances are created by the external pricing
//! service on demand; the engine only stores them and refers to them by
//! [`FareId`].
//!
//! All fare combinations of a request live in one append-only
//! [`FareArena`]. A family head may be referenced simultaneously from the
//! flight matrix and from many estimate-matrix children, across queue and
//! orchestrator alike — arena ownership plus `Arc` handles makes that
//! sharing safe without any per-entry lifetime bookkeeping. The arena is
//! the only piece of shared mutable state the parallel queue phase touches
//! besides the diversity counters, and its mutex guards nothing but the
//! append.

use crate::{
    carrier::Carrier,
    index::{FareId, LegIndex},
    money::Money,
};
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

/// One per-market fare inside a fare combination.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FareComponent {
    /// First leg covered by this fare market.
    pub first_leg: LegIndex,
    /// Last leg covered by this fare market (inclusive).
    pub last_leg: LegIndex,
    /// Governing carrier of the fare market.
    pub carrier: Carrier,
    /// Fare amount for this market.
    pub amount: Money,
    /// Whether this is an industry (multi-carrier) fare. Industry-fare
    /// solutions never participate in family grouping.
    pub industry: bool,
}

/// A priced pairing of per-market fares for the full itinerary.
#[derive(Clone, Debug)]
pub struct FareCombination {
    total: Money,
    components: Vec<FareComponent>,
    family_key: u64,
    source: Option<String>,
}

impl FareCombination {
    /// Creates a priced fare combination.
    ///
    /// The family key — used by family grouping to decide whether two
    /// solutions share the same underlying fares — is derived from the
    /// components, not the total, so surcharge-adjusted duplicates of the
    /// same fares still group together.
    pub fn new(total: Money, components: Vec<FareComponent>) -> Self {
        let mut hasher = FxHasher::default();
        for component in &components {
            component.hash(&mut hasher);
        }
        let family_key = hasher.finish();

        FareCombination {
            total,
            components,
            family_key,
            source: None,
        }
    }

    /// Creates a fare-less placeholder used for flight-only solutions.
    /// Carries no components and sorts last via its sentinel price.
    #[inline]
    pub fn fallback(price: Money) -> Self {
        FareCombination {
            total: price,
            components: Vec::new(),
            family_key: 0,
            source: None,
        }
    }

    /// Total price of the combination.
    #[inline]
    pub fn total(&self) -> Money {
        self.total
    }

    /// The per-market fares.
    #[inline]
    pub fn components(&self) -> &[FareComponent] {
        &self.components
    }

    /// Key identifying the underlying fare set for family grouping.
    #[inline]
    pub fn family_key(&self) -> u64 {
        self.family_key
    }

    /// Whether this is a fare-less flight-only placeholder.
    #[inline]
    pub fn is_fallback(&self) -> bool {
        self.components.is_empty() || self.total.is_fallback()
    }

    /// Whether any component is an industry fare.
    #[inline]
    pub fn uses_industry_fare(&self) -> bool {
        self.components.iter().any(|c| c.industry)
    }

    /// If every component is governed by the same carrier, returns it.
    pub fn single_carrier(&self) -> Option<Carrier> {
        let mut carriers = self.components.iter().map(|c| c.carrier);
        let first = carriers.next()?;
        carriers.all(|c| c == first).then_some(first)
    }

    /// Label of the partition that produced this combination.
    #[inline]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Records the producing partition's label.
    #[inline]
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = Some(source.into());
    }
}

/// The request-scoped, append-only store of fare combinations.
///
/// Entries are immutable once inserted; handles stay valid for the life of
/// the request. Appends may come from concurrently running queues, so the
/// backing vector sits behind a mutex, but lookups hand out `Arc` clones
/// and never block readers on each other.
#[derive(Debug, Default)]
pub struct FareArena {
    entries: Mutex<Vec<Arc<FareCombination>>>,
}

impl FareArena {
    /// Creates an empty arena.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a fare combination and returns its handle.
    pub fn insert(&self, fare: FareCombination) -> FareId {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push(Arc::new(fare));
        FareId::new(entries.len() - 1)
    }

    /// Looks up a fare combination by handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not belong to this arena.
    pub fn get(&self, id: FareId) -> Arc<FareCombination> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(id.get())
            .cloned()
            .unwrap_or_else(|| panic!("called `FareArena::get` with a foreign handle: {id}"))
    }

    /// Total price of the fare behind `id`.
    #[inline]
    pub fn price_of(&self, id: FareId) -> Money {
        self.get(id).total()
    }

    /// Number of stored combinations.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(carrier: &str, amount: i64) -> FareComponent {
        FareComponent {
            first_leg: LegIndex::new(0),
            last_leg: LegIndex::new(0),
            carrier: Carrier::new(carrier),
            amount: Money::from_major(amount),
            industry: false,
        }
    }

    #[test]
    fn test_family_key_depends_on_components_only() {
        let a = FareCombination::new(Money::from_major(100), vec![component("AA", 100)]);
        let b = FareCombination::new(Money::from_major(120), vec![component("AA", 100)]);
        let c = FareCombination::new(Money::from_major(100), vec![component("UA", 100)]);

        assert_eq!(a.family_key(), b.family_key());
        assert_ne!(a.family_key(), c.family_key());
    }

    #[test]
    fn test_fallback_is_tagged() {
        let fallback = FareCombination::fallback(Money::FALLBACK);
        assert!(fallback.is_fallback());
        assert!(fallback.components().is_empty());

        let priced = FareCombination::new(Money::from_major(50), vec![component("AA", 50)]);
        assert!(!priced.is_fallback());
    }

    #[test]
    fn test_single_carrier() {
        let online = FareCombination::new(
            Money::from_major(10),
            vec![component("AA", 5), component("AA", 5)],
        );
        assert_eq!(online.single_carrier(), Some(Carrier::new("AA")));

        let mixed = FareCombination::new(
            Money::from_major(10),
            vec![component("AA", 5), component("UA", 5)],
        );
        assert_eq!(mixed.single_carrier(), None);
    }

    #[test]
    fn test_arena_handles() {
        let arena = FareArena::new();
        let id = arena.insert(FareCombination::new(
            Money::from_major(75),
            vec![component("LH", 75)],
        ));
        assert_eq!(arena.price_of(id), Money::from_major(75));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    #[should_panic(expected = "foreign handle")]
    fn test_arena_rejects_foreign_handle() {
        let arena = FareArena::new();
        let _ = arena.get(FareId::new(3));
    }
}
