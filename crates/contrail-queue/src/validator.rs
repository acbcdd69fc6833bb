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

//! # Two-Phase Bitmap Validator
//!
//! Proves a (fare, combination) pair compatible in two passes: a cheap
//! pre-check run while candidates stream by, and the expensive full
//! rule/booking-code check run lazily, only when a combination reaches
//! the head of the queue and is about to be emitted. Combinations that
//! are never emitted never pay for the full check.
//!
//! Results are memoized in a [`FlightBitmap`] per `(fare, date-pair)`;
//! the memo is generator-local, so no locking is involved. Two variants
//! exist, selected once at queue construction:
//!
//! - [`StandardBitmapValidator`] addresses bits by the full combination
//!   encoding.
//! - [`AggregatedLegValidator`] addresses bits by the combination
//!   restricted to the fare's applicable legs, so combinations that
//!   differ only outside a fare's markets share one bit.

use crate::bitmap::{BitStatus, FailReason, FlightBitmap};
use crate::traits::{FareRuleProbe, ProbeOutcome};
use contrail_model::{
    combination::Combination,
    fare::FareCombination,
    index::{DatePairId, FareId, LegIndex},
};
use contrail_search::combination_index::CombinationIndex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// The generator-facing validation contract.
pub trait BitmapValidator: Send {
    /// Memo-only lookup; never invokes the validation service. Returns
    /// [`BitStatus::Deferred`] when the bit is untested for this date
    /// pair but already failed for another.
    fn lookup(
        &self,
        fare_id: FareId,
        combination: &Combination,
        date_pair: Option<DatePairId>,
    ) -> BitStatus;

    /// The cheap first pass. Memoized: a terminal or skipped bit is
    /// returned as recorded without consulting the service again.
    fn first_pass(
        &mut self,
        fare: &FareCombination,
        fare_id: FareId,
        combination: &Combination,
        date_pair: Option<DatePairId>,
        probe: &dyn FareRuleProbe,
    ) -> BitStatus;

    /// The expensive second pass, resolving a skipped bit to a terminal
    /// status. Memoized the same way; returns whether the bit passed.
    fn second_pass(
        &mut self,
        fare: &FareCombination,
        fare_id: FareId,
        combination: &Combination,
        date_pair: Option<DatePairId>,
        probe: &dyn FareRuleProbe,
    ) -> bool;
}

fn record_outcome(bitmap: &mut FlightBitmap, bit: usize, outcome: ProbeOutcome) -> BitStatus {
    match outcome {
        ProbeOutcome::Pass => {
            bitmap.record_pass(bit);
            BitStatus::Pass
        }
        ProbeOutcome::Fail => {
            bitmap.record_fail(bit, FailReason::Routing);
            BitStatus::Fail(FailReason::Routing)
        }
        ProbeOutcome::Skip => {
            bitmap.record_skip(bit);
            BitStatus::Skip
        }
    }
}

/// The standard SKIP-bit validator: bits are addressed by the full
/// combination encoding.
#[derive(Debug)]
pub struct StandardBitmapValidator {
    index: CombinationIndex,
    maps: FxHashMap<(FareId, Option<DatePairId>), FlightBitmap>,
}

impl StandardBitmapValidator {
    pub fn new(index: CombinationIndex) -> Self {
        StandardBitmapValidator {
            index,
            maps: FxHashMap::default(),
        }
    }

    fn bitmap_mut(&mut self, fare_id: FareId, date_pair: Option<DatePairId>) -> &mut FlightBitmap {
        let len = self.index.len();
        self.maps
            .entry((fare_id, date_pair))
            .or_insert_with(|| FlightBitmap::new(len))
    }

    /// Whether any date pair other than `date_pair` recorded a failure
    /// on `bit` for this fare.
    fn failed_elsewhere(
        &self,
        fare_id: FareId,
        bit: usize,
        date_pair: Option<DatePairId>,
    ) -> bool {
        self.maps.iter().any(|((fare, pair), bitmap)| {
            *fare == fare_id
                && *pair != date_pair
                && pair.is_some()
                && matches!(bitmap.status(bit), BitStatus::Fail(_))
        })
    }
}

impl BitmapValidator for StandardBitmapValidator {
    fn lookup(
        &self,
        fare_id: FareId,
        combination: &Combination,
        date_pair: Option<DatePairId>,
    ) -> BitStatus {
        let Some(bit) = self.index.encode(combination) else {
            return BitStatus::Untested;
        };

        let status = self
            .maps
            .get(&(fare_id, date_pair))
            .map_or(BitStatus::Untested, |bitmap| bitmap.status(bit));

        if status == BitStatus::Untested
            && date_pair.is_some()
            && self.failed_elsewhere(fare_id, bit, date_pair)
        {
            return BitStatus::Deferred;
        }
        status
    }

    fn first_pass(
        &mut self,
        fare: &FareCombination,
        fare_id: FareId,
        combination: &Combination,
        date_pair: Option<DatePairId>,
        probe: &dyn FareRuleProbe,
    ) -> BitStatus {
        let Some(bit) = self.index.encode(combination) else {
            // Unaddressable cells (surface placeholders) are probed
            // directly and never memoized.
            return match probe.quick_check(fare, combination, date_pair) {
                ProbeOutcome::Pass => BitStatus::Pass,
                ProbeOutcome::Fail => BitStatus::Fail(FailReason::Routing),
                ProbeOutcome::Skip => BitStatus::Skip,
            };
        };

        let recorded = self.bitmap_mut(fare_id, date_pair).status(bit);
        if recorded != BitStatus::Untested {
            return recorded;
        }

        let outcome = probe.quick_check(fare, combination, date_pair);
        record_outcome(self.bitmap_mut(fare_id, date_pair), bit, outcome)
    }

    fn second_pass(
        &mut self,
        fare: &FareCombination,
        fare_id: FareId,
        combination: &Combination,
        date_pair: Option<DatePairId>,
        probe: &dyn FareRuleProbe,
    ) -> bool {
        let Some(bit) = self.index.encode(combination) else {
            return probe.full_check(fare, combination, date_pair);
        };

        match self.bitmap_mut(fare_id, date_pair).status(bit) {
            BitStatus::Pass => true,
            BitStatus::Fail(_) => false,
            BitStatus::Untested | BitStatus::Skip | BitStatus::Deferred => {
                let passed = probe.full_check(fare, combination, date_pair);
                let bitmap = self.bitmap_mut(fare_id, date_pair);
                if passed {
                    bitmap.record_pass(bit);
                } else {
                    bitmap.record_fail(bit, FailReason::Rules);
                }
                passed
            }
        }
    }
}

/// The aggregated-leg (solo) validator: bits are addressed by the
/// combination restricted to the fare's applicable legs, so validation
/// outcomes are shared across combinations that only differ on legs the
/// fare does not cover.
#[derive(Debug)]
pub struct AggregatedLegValidator {
    dims: SmallVec<[usize; 4]>,
    maps: FxHashMap<(FareId, Option<DatePairId>), (CombinationIndex, Vec<usize>, FlightBitmap)>,
}

impl AggregatedLegValidator {
    pub fn new(index: &CombinationIndex) -> Self {
        AggregatedLegValidator {
            dims: index.dimensions().iter().copied().collect(),
            maps: FxHashMap::default(),
        }
    }

    /// The searchable-leg positions a fare's components cover; an empty
    /// component list (fallback fares) covers everything.
    fn covered_positions(&self, fare: &FareCombination) -> Vec<usize> {
        if fare.components().is_empty() {
            return (0..self.dims.len()).collect();
        }

        let mut covered: Vec<usize> = fare
            .components()
            .iter()
            .flat_map(|c| c.first_leg.get()..=c.last_leg.get())
            .filter(|&p| p < self.dims.len())
            .collect();
        covered.sort_unstable();
        covered.dedup();
        covered
    }

    fn entry_for(
        &mut self,
        fare: &FareCombination,
        fare_id: FareId,
        date_pair: Option<DatePairId>,
    ) -> Option<&mut (CombinationIndex, Vec<usize>, FlightBitmap)> {
        if !self.maps.contains_key(&(fare_id, date_pair)) {
            let covered = self.covered_positions(fare);
            let sub_dims: Vec<usize> = covered.iter().map(|&p| self.dims[p]).collect();
            let sub_index = CombinationIndex::new(&sub_dims)?;
            let bitmap = FlightBitmap::new(sub_index.len());
            self.maps
                .insert((fare_id, date_pair), (sub_index, covered, bitmap));
        }
        self.maps.get_mut(&(fare_id, date_pair))
    }

    fn project(combination: &Combination, covered: &[usize]) -> Option<Combination> {
        let mut positions: SmallVec<[usize; 4]> = SmallVec::with_capacity(covered.len());
        for &p in covered {
            let sop = combination.get(LegIndex::new(p))?;
            if sop.is_sentinel() {
                return None;
            }
            positions.push(sop.get());
        }
        Some(Combination::from_positions(&positions))
    }
}

impl BitmapValidator for AggregatedLegValidator {
    fn lookup(
        &self,
        fare_id: FareId,
        combination: &Combination,
        date_pair: Option<DatePairId>,
    ) -> BitStatus {
        let Some((sub_index, covered, bitmap)) = self.maps.get(&(fare_id, date_pair)) else {
            return BitStatus::Untested;
        };
        let Some(projected) = Self::project(combination, covered) else {
            return BitStatus::Untested;
        };
        sub_index
            .encode(&projected)
            .map_or(BitStatus::Untested, |bit| bitmap.status(bit))
    }

    fn first_pass(
        &mut self,
        fare: &FareCombination,
        fare_id: FareId,
        combination: &Combination,
        date_pair: Option<DatePairId>,
        probe: &dyn FareRuleProbe,
    ) -> BitStatus {
        let bit = self
            .entry_for(fare, fare_id, date_pair)
            .and_then(|(sub_index, covered, _)| {
                Self::project(combination, covered).and_then(|p| sub_index.encode(&p))
            });

        let Some(bit) = bit else {
            return match probe.quick_check(fare, combination, date_pair) {
                ProbeOutcome::Pass => BitStatus::Pass,
                ProbeOutcome::Fail => BitStatus::Fail(FailReason::Routing),
                ProbeOutcome::Skip => BitStatus::Skip,
            };
        };

        // Entry exists after `entry_for` succeeded above.
        let (_, _, bitmap) = self
            .maps
            .get_mut(&(fare_id, date_pair))
            .expect("entry created by entry_for");
        let recorded = bitmap.status(bit);
        if recorded != BitStatus::Untested {
            return recorded;
        }

        let outcome = probe.quick_check(fare, combination, date_pair);
        let (_, _, bitmap) = self
            .maps
            .get_mut(&(fare_id, date_pair))
            .expect("entry created by entry_for");
        record_outcome(bitmap, bit, outcome)
    }

    fn second_pass(
        &mut self,
        fare: &FareCombination,
        fare_id: FareId,
        combination: &Combination,
        date_pair: Option<DatePairId>,
        probe: &dyn FareRuleProbe,
    ) -> bool {
        let bit = self
            .entry_for(fare, fare_id, date_pair)
            .and_then(|(sub_index, covered, _)| {
                Self::project(combination, covered).and_then(|p| sub_index.encode(&p))
            });

        let Some(bit) = bit else {
            return probe.full_check(fare, combination, date_pair);
        };

        let (_, _, bitmap) = self
            .maps
            .get_mut(&(fare_id, date_pair))
            .expect("entry created by entry_for");
        match bitmap.status(bit) {
            BitStatus::Pass => true,
            BitStatus::Fail(_) => false,
            _ => {
                let passed = probe.full_check(fare, combination, date_pair);
                let (_, _, bitmap) = self
                    .maps
                    .get_mut(&(fare_id, date_pair))
                    .expect("entry created by entry_for");
                if passed {
                    bitmap.record_pass(bit);
                } else {
                    bitmap.record_fail(bit, FailReason::Rules);
                }
                passed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contrail_model::carrier::Carrier;
    use contrail_model::fare::FareComponent;
    use contrail_model::money::Money;
    use std::cell::Cell;

    /// A scripted probe counting its invocations.
    struct CountingProbe {
        quick: ProbeOutcome,
        full: bool,
        quick_calls: Cell<u32>,
        full_calls: Cell<u32>,
    }

    impl CountingProbe {
        fn new(quick: ProbeOutcome, full: bool) -> Self {
            CountingProbe {
                quick,
                full,
                quick_calls: Cell::new(0),
                full_calls: Cell::new(0),
            }
        }
    }

    impl FareRuleProbe for CountingProbe {
        fn quick_check(
            &self,
            _fare: &FareCombination,
            _combination: &Combination,
            _date_pair: Option<DatePairId>,
        ) -> ProbeOutcome {
            self.quick_calls.set(self.quick_calls.get() + 1);
            self.quick
        }

        fn full_check(
            &self,
            _fare: &FareCombination,
            _combination: &Combination,
            _date_pair: Option<DatePairId>,
        ) -> bool {
            self.full_calls.set(self.full_calls.get() + 1);
            self.full
        }
    }

    fn fare() -> FareCombination {
        FareCombination::new(
            Money::from_major(100),
            vec![FareComponent {
                first_leg: LegIndex::new(0),
                last_leg: LegIndex::new(1),
                carrier: Carrier::new("AA"),
                amount: Money::from_major(100),
                industry: false,
            }],
        )
    }

    #[test]
    fn test_first_pass_is_memoized() {
        let index = CombinationIndex::new(&[2, 2]).unwrap();
        let mut validator = StandardBitmapValidator::new(index);
        let probe = CountingProbe::new(ProbeOutcome::Pass, true);
        let fare = fare();
        let combination = Combination::from_positions(&[1, 0]);

        for _ in 0..3 {
            let status = validator.first_pass(&fare, FareId::new(0), &combination, None, &probe);
            assert_eq!(status, BitStatus::Pass);
        }
        assert_eq!(probe.quick_calls.get(), 1);
    }

    #[test]
    fn test_fail_is_permanent_and_never_retried() {
        let index = CombinationIndex::new(&[2, 2]).unwrap();
        let mut validator = StandardBitmapValidator::new(index);
        let probe = CountingProbe::new(ProbeOutcome::Fail, true);
        let fare = fare();
        let combination = Combination::from_positions(&[0, 1]);

        let first = validator.first_pass(&fare, FareId::new(0), &combination, None, &probe);
        assert!(matches!(first, BitStatus::Fail(_)));

        // A failed bit stays failed through both passes, with no service calls.
        let again = validator.first_pass(&fare, FareId::new(0), &combination, None, &probe);
        assert!(matches!(again, BitStatus::Fail(_)));
        assert!(!validator.second_pass(&fare, FareId::new(0), &combination, None, &probe));
        assert_eq!(probe.quick_calls.get(), 1);
        assert_eq!(probe.full_calls.get(), 0);
    }

    #[test]
    fn test_skip_resolves_lazily() {
        let index = CombinationIndex::new(&[2, 2]).unwrap();
        let mut validator = StandardBitmapValidator::new(index);
        let probe = CountingProbe::new(ProbeOutcome::Skip, true);
        let fare = fare();
        let combination = Combination::from_positions(&[0, 0]);

        let status = validator.first_pass(&fare, FareId::new(0), &combination, None, &probe);
        assert_eq!(status, BitStatus::Skip);
        assert_eq!(probe.full_calls.get(), 0);

        // The full check runs only at the second pass, once.
        assert!(validator.second_pass(&fare, FareId::new(0), &combination, None, &probe));
        assert!(validator.second_pass(&fare, FareId::new(0), &combination, None, &probe));
        assert_eq!(probe.full_calls.get(), 1);
        assert_eq!(
            validator.lookup(FareId::new(0), &combination, None),
            BitStatus::Pass
        );
    }

    #[test]
    fn test_date_pairs_are_isolated_and_deferred() {
        let index = CombinationIndex::new(&[2]).unwrap();
        let mut validator = StandardBitmapValidator::new(index);
        let probe = CountingProbe::new(ProbeOutcome::Fail, true);
        let fare = fare();
        let combination = Combination::from_positions(&[0]);
        let pair_a = Some(DatePairId::new(0));
        let pair_b = Some(DatePairId::new(1));

        let status = validator.first_pass(&fare, FareId::new(0), &combination, pair_a, &probe);
        assert!(matches!(status, BitStatus::Fail(_)));

        // Failing for one date pair leaves the other undetermined.
        assert_eq!(
            validator.lookup(FareId::new(0), &combination, pair_b),
            BitStatus::Deferred
        );
    }

    #[test]
    fn test_aggregated_validator_shares_bits_across_uncovered_legs() {
        let index = CombinationIndex::new(&[2, 3]).unwrap();
        let mut validator = AggregatedLegValidator::new(&index);
        let probe = CountingProbe::new(ProbeOutcome::Pass, true);

        // Fare covering only leg 0.
        let fare = FareCombination::new(
            Money::from_major(50),
            vec![FareComponent {
                first_leg: LegIndex::new(0),
                last_leg: LegIndex::new(0),
                carrier: Carrier::new("AA"),
                amount: Money::from_major(50),
                industry: false,
            }],
        );

        let a = Combination::from_positions(&[1, 0]);
        let b = Combination::from_positions(&[1, 2]);

        validator.first_pass(&fare, FareId::new(0), &a, None, &probe);
        let status = validator.first_pass(&fare, FareId::new(0), &b, None, &probe);

        // Same restricted bit, so the second combination hits the memo.
        assert_eq!(status, BitStatus::Pass);
        assert_eq!(probe.quick_calls.get(), 1);
    }
}
