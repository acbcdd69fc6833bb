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

//! # Family Grouping
//!
//! A family is a flight-matrix entry (the mother) plus estimate-matrix
//! children presumed to share its price. Grouping collapses equivalent
//! mothers — same underlying fares, pairwise-similar scheduling options
//! on every leg — into one authoritative head; the absorbed entries
//! become children.
//!
//! Families must agree on every diversity-relevant attribute. Similarity
//! already enforces the domestic-connection-time bucket within one
//! queue's grouping; after the orchestrator merges partitions,
//! [`split_inconsistent_families`] re-checks the invariant and splits
//! violators, so split-then-recheck is idempotent.

use crate::matrix::{EstimateMatrix, EstimatedSolution, FlightMatrix, SolutionEntry};
use contrail_model::{
    combination::Combination, fare::FareArena, model::ShoppingModel,
};
use tracing::debug;

/// Whether a solution may head or join a family: it must carry a real
/// fare and must not be built on industry fares.
pub fn can_be_in_family(entry: &SolutionEntry, arena: &FareArena) -> bool {
    match entry.fare {
        Some(id) => {
            let fare = arena.get(id);
            !fare.is_fallback() && !fare.uses_industry_fare()
        }
        None => false,
    }
}

/// Collapses equivalent family heads in `flight` into mothers plus
/// estimate children.
///
/// Protected heads (`keep_as_head` returning `true`, used for custom
/// family heads) are never absorbed into another family.
pub fn group_families<F>(
    model: &ShoppingModel,
    arena: &FareArena,
    flight: &mut FlightMatrix,
    estimates: &mut EstimateMatrix,
    mut keep_as_head: F,
) where
    F: FnMut(&Combination) -> bool,
{
    let ordered = flight.sorted_by_price(arena);
    let mut kept: Vec<(Combination, SolutionEntry)> = Vec::with_capacity(ordered.len());
    let mut absorbed = 0usize;

    for (combination, entry) in ordered {
        if !can_be_in_family(&entry, arena) || keep_as_head(&combination) {
            kept.push((combination, entry));
            continue;
        }

        let family_key = entry
            .fare
            .map(|id| arena.get(id).family_key())
            .unwrap_or_default();

        let mother = kept.iter().position(|(head, head_entry)| {
            can_be_in_family(head_entry, arena)
                && head_entry
                    .fare
                    .is_some_and(|id| arena.get(id).family_key() == family_key)
                && model.combinations_similar(head, &combination)
        });

        match mother {
            Some(position) => {
                let head = kept[position].0.clone();
                // Children of the absorbed head follow it into the new family.
                estimates.repoint_children(&combination, &head);
                if let Some(fare) = entry.fare {
                    estimates.insert(
                        combination,
                        EstimatedSolution { parent: head, fare },
                    );
                }
                absorbed += 1;
            }
            None => kept.push((combination, entry)),
        }
    }

    if absorbed > 0 {
        debug!(absorbed, "collapsed equivalent family heads");
        let mut grouped = FlightMatrix::new();
        for (combination, entry) in kept {
            grouped.insert(combination, entry);
        }
        *flight = grouped;
    }

    regroup_industry_families(arena, flight, estimates);
}

/// Industry-fare solutions never share a family: children that turn out
/// to use industry fares are promoted back into the flight matrix.
pub fn regroup_industry_families(
    arena: &FareArena,
    flight: &mut FlightMatrix,
    estimates: &mut EstimateMatrix,
) {
    let promoted: Vec<(Combination, EstimatedSolution)> = estimates
        .iter()
        .filter(|(_, e)| arena.get(e.fare).uses_industry_fare())
        .map(|(c, e)| (c.clone(), e.clone()))
        .collect();

    for (combination, estimate) in promoted {
        estimates.remove(&combination);
        flight.insert(combination, SolutionEntry::priced(estimate.fare));
    }
}

/// Splits families whose members disagree on the domestic
/// connection-time bucket: disagreeing children leave the family, the
/// first of them becomes the mother of a new one.
pub fn split_inconsistent_families(
    model: &ShoppingModel,
    flight: &mut FlightMatrix,
    estimates: &mut EstimateMatrix,
) {
    let heads: Vec<Combination> = flight.iter().map(|(c, _)| c.clone()).collect();

    for head in heads {
        let head_bucket = model.has_connect_over_4h(&head);
        let mut strays: Vec<Combination> = estimates
            .children_of(&head)
            .filter(|child| model.has_connect_over_4h(child) != head_bucket)
            .cloned()
            .collect();
        if strays.is_empty() {
            continue;
        }
        strays.sort();

        debug!(?head, children = strays.len(), "splitting inconsistent family");

        let mother = strays.remove(0);
        let Some(mother_estimate) = estimates.remove(&mother) else {
            continue;
        };
        flight.insert(mother.clone(), SolutionEntry::priced(mother_estimate.fare));

        for stray in strays {
            if let Some(estimate) = estimates.remove(&stray) {
                estimates.insert(
                    stray,
                    EstimatedSolution {
                        parent: mother.clone(),
                        fare: estimate.fare,
                    },
                );
            }
        }
    }
}

/// Whether every family in the matrices agrees on the
/// connection-time bucket. Used by tests and debug assertions.
pub fn families_consistent(
    model: &ShoppingModel,
    flight: &FlightMatrix,
    estimates: &EstimateMatrix,
) -> bool {
    flight.iter().all(|(head, _)| {
        let bucket = model.has_connect_over_4h(head);
        estimates
            .children_of(head)
            .all(|child| model.has_connect_over_4h(child) == bucket)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contrail_model::carrier::{Airport, Carrier};
    use contrail_model::fare::{FareCombination, FareComponent};
    use contrail_model::index::{FareId, LegIndex};
    use contrail_model::model::{
        FlightSegment, Leg, SchedulingOption, ShoppingModelBuilder,
    };
    use contrail_model::money::Money;

    fn sop(carrier: &str, over_4h: bool) -> SchedulingOption {
        SchedulingOption::new(
            Carrier::new(carrier),
            vec![FlightSegment {
                origin: Airport::new("AAA"),
                destination: Airport::new("BBB"),
                carrier: Carrier::new(carrier),
                departure_minute: 0,
                arrival_minute: 100,
            }],
        )
        .with_domestic_connect_over_4h(over_4h)
    }

    fn model() -> ShoppingModel {
        let mut builder = ShoppingModelBuilder::new();
        builder.add_leg(Leg::new(vec![
            sop("AA", false),
            sop("AA", false),
            sop("AA", true),
        ]));
        builder.build()
    }

    fn priced_fare(arena: &FareArena, amount: i64, industry: bool) -> FareId {
        arena.insert(FareCombination::new(
            Money::from_major(amount),
            vec![FareComponent {
                first_leg: LegIndex::new(0),
                last_leg: LegIndex::new(0),
                carrier: Carrier::new("AA"),
                amount: Money::from_major(amount),
                industry,
            }],
        ))
    }

    #[test]
    fn test_equivalent_heads_collapse() {
        let model = model();
        let arena = FareArena::new();
        let fare = priced_fare(&arena, 100, false);

        let mut flight = FlightMatrix::new();
        flight.insert(Combination::from_positions(&[0]), SolutionEntry::priced(fare));
        flight.insert(Combination::from_positions(&[1]), SolutionEntry::priced(fare));
        let mut estimates = EstimateMatrix::new();

        group_families(&model, &arena, &mut flight, &mut estimates, |_| false);

        assert_eq!(flight.len(), 1);
        assert_eq!(estimates.len(), 1);
        let head = Combination::from_positions(&[0]);
        assert_eq!(estimates.children_of(&head).count(), 1);
    }

    #[test]
    fn test_dissimilar_buckets_stay_apart() {
        let model = model();
        let arena = FareArena::new();
        let fare = priced_fare(&arena, 100, false);

        let mut flight = FlightMatrix::new();
        flight.insert(Combination::from_positions(&[0]), SolutionEntry::priced(fare));
        // SOP 2 sits in the >4h connect bucket, so it is not similar.
        flight.insert(Combination::from_positions(&[2]), SolutionEntry::priced(fare));
        let mut estimates = EstimateMatrix::new();

        group_families(&model, &arena, &mut flight, &mut estimates, |_| false);

        assert_eq!(flight.len(), 2);
        assert!(estimates.is_empty());
    }

    #[test]
    fn test_industry_fares_never_group() {
        let model = model();
        let arena = FareArena::new();
        let industry = priced_fare(&arena, 100, true);

        let mut flight = FlightMatrix::new();
        flight.insert(
            Combination::from_positions(&[0]),
            SolutionEntry::priced(industry),
        );
        flight.insert(
            Combination::from_positions(&[1]),
            SolutionEntry::priced(industry),
        );
        let mut estimates = EstimateMatrix::new();

        group_families(&model, &arena, &mut flight, &mut estimates, |_| false);
        assert_eq!(flight.len(), 2);
    }

    #[test]
    fn test_protected_heads_survive() {
        let model = model();
        let arena = FareArena::new();
        let fare = priced_fare(&arena, 100, false);
        let protected = Combination::from_positions(&[1]);

        let mut flight = FlightMatrix::new();
        flight.insert(Combination::from_positions(&[0]), SolutionEntry::priced(fare));
        flight.insert(protected.clone(), SolutionEntry::priced(fare));
        let mut estimates = EstimateMatrix::new();

        group_families(&model, &arena, &mut flight, &mut estimates, |c| {
            *c == protected
        });
        assert_eq!(flight.len(), 2);
    }

    #[test]
    fn test_split_then_recheck_is_idempotent() {
        let model = model();
        let arena = FareArena::new();
        let fare = priced_fare(&arena, 100, false);

        let head = Combination::from_positions(&[0]);
        let mut flight = FlightMatrix::new();
        flight.insert(head.clone(), SolutionEntry::priced(fare));

        let mut estimates = EstimateMatrix::new();
        // A child in the wrong connect bucket, as a cross-queue merge
        // could produce.
        estimates.insert(
            Combination::from_positions(&[2]),
            EstimatedSolution {
                parent: head.clone(),
                fare,
            },
        );
        estimates.insert(
            Combination::from_positions(&[1]),
            EstimatedSolution {
                parent: head.clone(),
                fare,
            },
        );
        assert!(!families_consistent(&model, &flight, &estimates));

        split_inconsistent_families(&model, &mut flight, &mut estimates);
        assert!(families_consistent(&model, &flight, &estimates));
        assert_eq!(flight.len(), 2);

        // Running the split again changes nothing.
        let before_flight = flight.len();
        let before_estimates = estimates.len();
        split_inconsistent_families(&model, &mut flight, &mut estimates);
        assert_eq!(flight.len(), before_flight);
        assert_eq!(estimates.len(), before_estimates);
    }
}
