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

//! # Shopping Model
//!
//! The immutable request model: legs, their scheduling options, and the
//! alternate-date pair table, together with the combination-level
//! classification queries (online/interline, non-stop, custom,
//! cabin-valid, connection times) that every partition filter is built
//! from.
//!
//! The model is created once per request via [`ShoppingModelBuilder`] and
//! shared read-only by all concurrently running queues; nothing here is
//! mutated during search. The single cached value — a scheduling option's
//! interline classification — is computed on first use behind a
//! `OnceLock`, so concurrent readers race benignly to the same answer.

use crate::{
    carrier::{Airport, Carrier},
    combination::Combination,
    index::{DatePairId, SopIndex},
};
use smallvec::SmallVec;
use std::sync::OnceLock;

/// One flown segment of a scheduling option.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FlightSegment {
    pub origin: Airport,
    pub destination: Airport,
    pub carrier: Carrier,
    /// Departure, in minutes since the request's reference instant.
    pub departure_minute: u32,
    /// Arrival, in minutes since the request's reference instant.
    pub arrival_minute: u32,
}

/// An alternate-date pair: the outbound/return day bucket a scheduling
/// option belongs to under alternate-date search.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DatePair {
    pub departure_day: u32,
    pub return_day: u32,
}

/// One candidate flight itinerary for a leg.
///
/// Owned by its [`Leg`]; search refers to it by [`SopIndex`] only and
/// never copies it.
#[derive(Clone, Debug)]
pub struct SchedulingOption {
    segments: Vec<FlightSegment>,
    governing_carrier: Carrier,
    cabin_valid: bool,
    custom: bool,
    long_connect: bool,
    domestic_connect_over_4h: bool,
    high_mileage: bool,
    date_pair: Option<DatePairId>,
    interline: OnceLock<bool>,
}

impl SchedulingOption {
    /// Creates a scheduling option with default attribute flags
    /// (cabin-valid, not custom, no long connection).
    ///
    /// # Panics
    ///
    /// Panics if `segments` is empty.
    pub fn new(governing_carrier: Carrier, segments: Vec<FlightSegment>) -> Self {
        assert!(
            !segments.is_empty(),
            "called `SchedulingOption::new` with no segments"
        );

        SchedulingOption {
            segments,
            governing_carrier,
            cabin_valid: true,
            custom: false,
            long_connect: false,
            domestic_connect_over_4h: false,
            high_mileage: false,
            date_pair: None,
            interline: OnceLock::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_cabin_valid(mut self, valid: bool) -> Self {
        self.cabin_valid = valid;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_custom(mut self, custom: bool) -> Self {
        self.custom = custom;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_long_connect(mut self, long_connect: bool) -> Self {
        self.long_connect = long_connect;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_domestic_connect_over_4h(mut self, over: bool) -> Self {
        self.domestic_connect_over_4h = over;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_high_mileage(mut self, high: bool) -> Self {
        self.high_mileage = high;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_date_pair(mut self, date_pair: DatePairId) -> Self {
        self.date_pair = Some(date_pair);
        self
    }

    #[inline]
    pub fn segments(&self) -> &[FlightSegment] {
        &self.segments
    }

    #[inline]
    pub fn governing_carrier(&self) -> Carrier {
        self.governing_carrier
    }

    #[inline]
    pub fn cabin_valid(&self) -> bool {
        self.cabin_valid
    }

    #[inline]
    pub fn is_custom(&self) -> bool {
        self.custom
    }

    #[inline]
    pub fn has_long_connect(&self) -> bool {
        self.long_connect
    }

    #[inline]
    pub fn domestic_connect_over_4h(&self) -> bool {
        self.domestic_connect_over_4h
    }

    #[inline]
    pub fn is_high_mileage(&self) -> bool {
        self.high_mileage
    }

    #[inline]
    pub fn date_pair(&self) -> Option<DatePairId> {
        self.date_pair
    }

    /// Whether this option is a non-stop flight.
    #[inline]
    pub fn is_nonstop(&self) -> bool {
        self.segments.len() == 1
    }

    /// Whether the option's segments are flown by more than one marketing
    /// carrier. Computed once on first use and cached.
    pub fn is_interline(&self) -> bool {
        *self.interline.get_or_init(|| {
            let first = self.segments[0].carrier;
            self.segments.iter().any(|s| s.carrier != first)
        })
    }

    /// Departure minute of the first segment.
    #[inline]
    pub fn first_departure(&self) -> u32 {
        self.segments[0].departure_minute
    }

    /// Arrival minute of the last segment.
    #[inline]
    pub fn last_arrival(&self) -> u32 {
        self.segments[self.segments.len() - 1].arrival_minute
    }

    /// The intermediate connection airports of this option, in flown order.
    pub fn connection_airports(&self) -> SmallVec<[Airport; 2]> {
        self.segments
            .iter()
            .take(self.segments.len().saturating_sub(1))
            .map(|s| s.destination)
            .collect()
    }

    /// Whether two options are interchangeable for estimate purposes:
    /// same governing carrier, segment count, and connect-time bucket.
    /// High-mileage options additionally require an identical routing,
    /// since their pricing is mileage-sensitive.
    pub fn similar_to(&self, other: &SchedulingOption) -> bool {
        if self.governing_carrier != other.governing_carrier
            || self.segments.len() != other.segments.len()
            || self.domestic_connect_over_4h != other.domestic_connect_over_4h
            || self.long_connect != other.long_connect
        {
            return false;
        }

        if self.high_mileage || other.high_mileage {
            return self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| {
                    a.origin == b.origin && a.destination == b.destination && a.carrier == b.carrier
                });
        }

        true
    }
}

/// An ordered position in the itinerary owning its scheduling options.
#[derive(Clone, Debug)]
pub struct Leg {
    sops: Vec<SchedulingOption>,
    custom: bool,
    aggregated: bool,
}

impl Leg {
    /// Creates a leg from its ordered scheduling options.
    #[inline]
    pub fn new(sops: Vec<SchedulingOption>) -> Self {
        Leg {
            sops,
            custom: false,
            aggregated: false,
        }
    }

    /// Marks this leg as participating in custom-solution search.
    #[inline]
    #[must_use]
    pub fn with_custom(mut self) -> Self {
        self.custom = true;
        self
    }

    /// Marks this leg as an aggregated across-stopover leg-group; it is
    /// excluded from the combination dimensions and addressed through the
    /// surface-sector sentinel.
    #[inline]
    #[must_use]
    pub fn with_aggregated(mut self) -> Self {
        self.aggregated = true;
        self
    }

    #[inline]
    pub fn sops(&self) -> &[SchedulingOption] {
        &self.sops
    }

    #[inline]
    pub fn sop(&self, index: SopIndex) -> Option<&SchedulingOption> {
        self.sops.get(index.get())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sops.is_empty()
    }

    #[inline]
    pub fn is_custom(&self) -> bool {
        self.custom
    }

    #[inline]
    pub fn is_aggregated(&self) -> bool {
        self.aggregated
    }
}

/// The immutable data model of one shopping request.
#[derive(Clone, Debug)]
pub struct ShoppingModel {
    legs: Vec<Leg>,
    /// Indices of the non-aggregated legs; combination position `n` maps
    /// to `legs[searchable[n]]`.
    searchable: Vec<usize>,
    date_pairs: Vec<DatePair>,
    min_connect_minutes: u32,
}

impl ShoppingModel {
    /// All legs, including aggregated leg-groups.
    #[inline]
    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    /// Number of searchable (non-aggregated) legs, i.e. the length every
    /// combination of this request must have.
    #[inline]
    pub fn num_searchable_legs(&self) -> usize {
        self.searchable.len()
    }

    /// The searchable leg behind combination position `position`.
    #[inline]
    pub fn searchable_leg(&self, position: usize) -> Option<&Leg> {
        self.searchable.get(position).map(|&n| &self.legs[n])
    }

    /// Per-position dimension sizes of the combination space.
    pub fn dimensions(&self) -> SmallVec<[usize; 4]> {
        self.searchable
            .iter()
            .map(|&n| self.legs[n].len())
            .collect()
    }

    /// The scheduling option a combination chose at `position`, or `None`
    /// for surface placeholders and out-of-bounds indices.
    pub fn sop_at(&self, combination: &Combination, position: usize) -> Option<&SchedulingOption> {
        let sop = combination.get(crate::index::LegIndex::new(position))?;
        if sop.is_sentinel() {
            return None;
        }
        self.searchable_leg(position)?.sop(sop)
    }

    /// The alternate-date pair table.
    #[inline]
    pub fn date_pairs(&self) -> &[DatePair] {
        &self.date_pairs
    }

    /// Whether this is an alternate-date request.
    #[inline]
    pub fn is_alt_dates(&self) -> bool {
        !self.date_pairs.is_empty()
    }

    #[inline]
    pub fn min_connect_minutes(&self) -> u32 {
        self.min_connect_minutes
    }

    /// Iterates the real scheduling options a combination selects,
    /// skipping surface placeholders.
    pub fn selected_sops<'a>(
        &'a self,
        combination: &'a Combination,
    ) -> impl Iterator<Item = &'a SchedulingOption> + 'a {
        (0..combination.len()).filter_map(move |n| self.sop_at(combination, n))
    }

    /// Whether every position of the combination addresses an in-bounds
    /// scheduling option (or a surface placeholder on an aggregated run).
    pub fn in_bounds(&self, combination: &Combination) -> bool {
        if combination.len() != self.num_searchable_legs() {
            return false;
        }
        combination.iter().enumerate().all(|(n, sop)| {
            sop.is_sentinel()
                || self
                    .searchable_leg(n)
                    .is_some_and(|leg| sop.get() < leg.len())
        })
    }

    /// If every selected option is governed by the same carrier, returns
    /// it; `None` means the combination is interline.
    pub fn online_carrier(&self, combination: &Combination) -> Option<Carrier> {
        let mut sops = self.selected_sops(combination);
        let first = sops.next()?;
        if first.is_interline() {
            return None;
        }
        let carrier = first.governing_carrier();
        sops.all(|sop| !sop.is_interline() && sop.governing_carrier() == carrier)
            .then_some(carrier)
    }

    /// Whether the combination mixes carriers across or within legs.
    #[inline]
    pub fn is_interline(&self, combination: &Combination) -> bool {
        self.online_carrier(combination).is_none()
    }

    /// Whether every selected option is a non-stop flight.
    pub fn is_nonstop(&self, combination: &Combination) -> bool {
        self.selected_sops(combination)
            .all(SchedulingOption::is_nonstop)
    }

    /// Whether the combination qualifies as a custom solution: every
    /// custom leg must have chosen a custom scheduling option.
    pub fn is_custom(&self, combination: &Combination) -> bool {
        (0..combination.len()).all(|n| {
            let Some(leg) = self.searchable_leg(n) else {
                return false;
            };
            if !leg.is_custom() {
                return true;
            }
            self.sop_at(combination, n).is_some_and(|s| s.is_custom())
        })
    }

    /// Whether any custom leg exists in the request.
    pub fn has_custom_legs(&self) -> bool {
        self.searchable.iter().any(|&n| self.legs[n].is_custom())
    }

    /// Whether every selected option is cabin-valid.
    pub fn cabin_valid(&self, combination: &Combination) -> bool {
        self.selected_sops(combination)
            .all(SchedulingOption::cabin_valid)
    }

    /// Whether any selected option carries a long connection.
    pub fn has_long_connect(&self, combination: &Combination) -> bool {
        self.selected_sops(combination)
            .any(SchedulingOption::has_long_connect)
    }

    /// Whether any selected option has a domestic connection over four
    /// hours — the attribute families must agree on.
    pub fn has_connect_over_4h(&self, combination: &Combination) -> bool {
        self.selected_sops(combination)
            .any(SchedulingOption::domestic_connect_over_4h)
    }

    /// Total flown segments over the selected options; the secondary
    /// tie-break of the deterministic enumeration order.
    pub fn segment_count(&self, combination: &Combination) -> u32 {
        self.selected_sops(combination)
            .map(|s| s.segments().len() as u32)
            .sum()
    }

    /// Whether the inter-leg connection times meet the request minimum.
    pub fn connection_times_ok(&self, combination: &Combination) -> bool {
        let mut previous_arrival: Option<u32> = None;
        for n in 0..combination.len() {
            let Some(sop) = self.sop_at(combination, n) else {
                continue;
            };
            if let Some(arrival) = previous_arrival {
                if sop.first_departure() < arrival.saturating_add(self.min_connect_minutes) {
                    return false;
                }
            }
            previous_arrival = Some(sop.last_arrival());
        }
        true
    }

    /// The alternate-date bucket of the combination, taken from its first
    /// selected option. Builders assign one pair id per option; mixed
    /// pairs within one combination are rejected by the candidate filter
    /// before this is consulted.
    pub fn date_pair_of(&self, combination: &Combination) -> Option<DatePairId> {
        self.selected_sops(combination)
            .find_map(SchedulingOption::date_pair)
    }

    /// The connection airports of the combination in flown order; the key
    /// for connection-point diversity.
    pub fn connection_points(&self, combination: &Combination) -> SmallVec<[Airport; 4]> {
        let mut points = SmallVec::new();
        for sop in self.selected_sops(combination) {
            points.extend(sop.connection_airports());
        }
        points
    }

    /// Whether two combinations select pairwise similar options on every
    /// leg (see [`SchedulingOption::similar_to`]).
    pub fn combinations_similar(&self, a: &Combination, b: &Combination) -> bool {
        if a.len() != b.len() {
            return false;
        }
        (0..a.len()).all(|n| match (self.sop_at(a, n), self.sop_at(b, n)) {
            (Some(x), Some(y)) => x.similar_to(y),
            (None, None) => true,
            _ => false,
        })
    }
}

/// Builder for [`ShoppingModel`].
///
/// Legs are added in journey order; alternate-date pairs are registered
/// up front so scheduling options can refer to them by id.
#[derive(Debug, Default)]
pub struct ShoppingModelBuilder {
    legs: Vec<Leg>,
    date_pairs: Vec<DatePair>,
    min_connect_minutes: u32,
}

impl ShoppingModelBuilder {
    #[inline]
    pub fn new() -> Self {
        ShoppingModelBuilder {
            legs: Vec::new(),
            date_pairs: Vec::new(),
            min_connect_minutes: 60,
        }
    }

    #[inline]
    #[must_use]
    pub fn min_connect_minutes(mut self, minutes: u32) -> Self {
        self.min_connect_minutes = minutes;
        self
    }

    /// Registers an alternate-date pair and returns its id.
    pub fn add_date_pair(&mut self, pair: DatePair) -> DatePairId {
        self.date_pairs.push(pair);
        DatePairId::new(self.date_pairs.len() - 1)
    }

    /// Appends a leg in journey order.
    pub fn add_leg(&mut self, leg: Leg) -> &mut Self {
        self.legs.push(leg);
        self
    }

    /// Builds the validated model.
    ///
    /// # Panics
    ///
    /// Panics if no leg was added, if a searchable leg has no scheduling
    /// options, or if an option references an unregistered date pair.
    pub fn build(self) -> ShoppingModel {
        assert!(
            !self.legs.is_empty(),
            "called `ShoppingModelBuilder::build` with no legs"
        );

        let searchable: Vec<usize> = self
            .legs
            .iter()
            .enumerate()
            .filter(|(_, leg)| !leg.is_aggregated())
            .map(|(n, _)| n)
            .collect();

        for &n in &searchable {
            assert!(
                !self.legs[n].is_empty(),
                "called `ShoppingModelBuilder::build` with an empty searchable leg at {n}"
            );
        }

        let num_pairs = self.date_pairs.len();
        for leg in &self.legs {
            for sop in leg.sops() {
                if let Some(pair) = sop.date_pair() {
                    assert!(
                        pair.get() < num_pairs,
                        "called `ShoppingModelBuilder::build` with unregistered date pair {pair}"
                    );
                }
            }
        }

        ShoppingModel {
            legs: self.legs,
            searchable,
            date_pairs: self.date_pairs,
            min_connect_minutes: self.min_connect_minutes,
        }
    }
}
