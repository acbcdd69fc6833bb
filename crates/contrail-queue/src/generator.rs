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

//! # Shopping Queue
//!
//! The per-partition solution generator. One queue serves one partition
//! of demand — a single online carrier, the interline aggregate, the
//! one-way-fare partition, or the dedicated non-stop partition — and
//! emits complete validated solutions in non-decreasing total-price
//! order by pulling fare combinations from the pricing layer and
//! streaming candidate combinations through the bitmap validator.
//!
//! The queue is a small state machine: `Idle` until the first `run`,
//! `Running` while producing, `AwaitingMore` once its own request is met
//! but the global diversity contract may still need it (resumable via
//! [`ShoppingQueue::get_additional_solutions`]), `Exhausted` when the
//! fare space is consumed, and `Hurried` once the cooperative deadline
//! fires — in which state it finishes only work already started.
//!
//! A failure of one candidate (validation or pricing) is recovered
//! locally by advancing to the next candidate; only partition-wide
//! failures are stored and surfaced at merge time.

use crate::bitmap::BitStatus;
use crate::config::SearchTuning;
use crate::family;
use crate::matrix::{EstimateMatrix, EstimatedSolution, FlightMatrix, SolutionEntry};
use crate::traits::{DiagnosticSink, FareRuleProbe, FareSupplier, NoopDiagnostics};
use crate::validator::{BitmapValidator, StandardBitmapValidator};
use contrail_model::{
    carrier::{Airport, Carrier},
    combination::Combination,
    fare::{FareArena, FareCombination},
    index::{FareId, SopIndex},
    model::ShoppingModel,
    money::Money,
};
use contrail_search::{
    cancel::{CancelToken, StepPacer},
    combination_index::{CombinationIndex, CombinationScore},
    counters::DiversityCounters,
    error::PartitionError,
    rated_queue::RatedCombinationQueue,
    stats::{QueueStatistics, QueueStatisticsBuilder},
};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Which partition of demand a queue serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// One online carrier.
    Online(Carrier),
    /// The interline aggregate.
    Interline,
    /// The dedicated one-way-fare partition.
    OneWayFares,
    /// The dedicated non-stop partition.
    NonStop,
}

impl QueueKind {
    /// Label used for diagnostics and as the solutions' source tag.
    pub fn label(&self) -> String {
        match self {
            QueueKind::Online(carrier) => format!("ONLINE-{carrier}"),
            QueueKind::Interline => "INTERLINE".to_string(),
            QueueKind::OneWayFares => "OWFARES".to_string(),
            QueueKind::NonStop => "NONSTOP".to_string(),
        }
    }

    #[inline]
    pub fn carrier(&self) -> Option<Carrier> {
        match self {
            QueueKind::Online(carrier) => Some(*carrier),
            _ => None,
        }
    }

    #[inline]
    pub fn is_interline(&self) -> bool {
        matches!(self, QueueKind::Interline)
    }
}

/// Lifecycle state of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Running,
    AwaitingMore,
    Exhausted,
    Hurried,
}

/// Builder for [`ShoppingQueue`].
pub struct ShoppingQueueBuilder<'a> {
    model: &'a ShoppingModel,
    arena: &'a FareArena,
    counters: &'a DiversityCounters,
    token: &'a CancelToken,
    tuning: &'a SearchTuning,
    kind: QueueKind,
    supplier: Box<dyn FareSupplier + Send + 'a>,
    probe: Box<dyn FareRuleProbe + Send + 'a>,
    validator: Option<Box<dyn BitmapValidator + 'a>>,
    diagnostics: Box<dyn DiagnosticSink + 'a>,
    requested: u32,
    estimated_requested: u32,
    custom_quota: u32,
    fare_repeat_limit: Option<u16>,
    date_pair_needs: Vec<u32>,
    long_connect_allowed_online: bool,
}

impl<'a> ShoppingQueueBuilder<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: &'a ShoppingModel,
        arena: &'a FareArena,
        counters: &'a DiversityCounters,
        token: &'a CancelToken,
        tuning: &'a SearchTuning,
        kind: QueueKind,
        supplier: Box<dyn FareSupplier + Send + 'a>,
        probe: Box<dyn FareRuleProbe + Send + 'a>,
    ) -> Self {
        ShoppingQueueBuilder {
            model,
            arena,
            counters,
            token,
            tuning,
            kind,
            supplier,
            probe,
            validator: None,
            diagnostics: Box::new(NoopDiagnostics),
            requested: 0,
            estimated_requested: 0,
            custom_quota: 0,
            fare_repeat_limit: None,
            date_pair_needs: Vec::new(),
            long_connect_allowed_online: false,
        }
    }

    #[must_use]
    pub fn requested(mut self, count: u32) -> Self {
        self.requested = count;
        self
    }

    #[must_use]
    pub fn estimated_requested(mut self, count: u32) -> Self {
        self.estimated_requested = count;
        self
    }

    #[must_use]
    pub fn custom_quota(mut self, quota: u32) -> Self {
        self.custom_quota = quota;
        self
    }

    #[must_use]
    pub fn fare_repeat_limit(mut self, limit: u16) -> Self {
        self.fare_repeat_limit = Some(limit);
        self
    }

    /// Remaining solutions owed per alternate-date pair, indexed by
    /// `DatePairId`.
    #[must_use]
    pub fn date_pair_needs(mut self, needs: Vec<u32>) -> Self {
        self.date_pair_needs = needs;
        self
    }

    /// Allows long-connection options in an online queue; set when this
    /// carrier is the only partition of the request.
    #[must_use]
    pub fn allow_long_connect_online(mut self) -> Self {
        self.long_connect_allowed_online = true;
        self
    }

    /// Overrides the standard validator (e.g. with the aggregated-leg
    /// variant).
    #[must_use]
    pub fn validator(mut self, validator: Box<dyn BitmapValidator + 'a>) -> Self {
        self.validator = Some(validator);
        self
    }

    #[must_use]
    pub fn diagnostics(mut self, sink: Box<dyn DiagnosticSink + 'a>) -> Self {
        self.diagnostics = sink;
        self
    }

    /// Builds the queue.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::EmptyCandidateSpace`] when the model has
    /// no searchable combination space.
    pub fn build(self) -> Result<ShoppingQueue<'a>, PartitionError> {
        let dims = self.model.dimensions();
        let index =
            CombinationIndex::new(&dims).ok_or_else(|| PartitionError::EmptyCandidateSpace {
                partition: self.kind.label(),
            })?;

        let validator = self
            .validator
            .unwrap_or_else(|| Box::new(StandardBitmapValidator::new(index.clone())));
        let min_family_size = self.tuning.family_size_for(self.kind.is_interline());

        Ok(ShoppingQueue {
            model: self.model,
            arena: self.arena,
            counters: self.counters,
            token: self.token,
            tuning: self.tuning,
            kind: self.kind,
            index,
            supplier: self.supplier,
            probe: self.probe,
            validator,
            diagnostics: self.diagnostics,
            flight: FlightMatrix::new(),
            estimates: EstimateMatrix::new(),
            state: QueueState::Idle,
            requested: self.requested,
            estimated_requested: self.estimated_requested,
            custom_quota: self.custom_quota,
            min_family_size,
            fare_repeat_limit: self.fare_repeat_limit,
            fare_repeat_counts: FxHashMap::default(),
            last_fare: None,
            error: None,
            bad_estimate_heads: FxHashSet::default(),
            num_bad_estimates: 0,
            custom_family_heads: FxHashSet::default(),
            collect_estimates: false,
            collect_flight_only_estimates: false,
            create_more: true,
            search_beyond: false,
            custom_search: false,
            search_beyond_found: 0,
            seen_connection_points: FxHashSet::default(),
            foreign_solutions: FxHashSet::default(),
            date_pair_needs: self.date_pair_needs,
            long_connect_allowed_online: self.long_connect_allowed_online,
            supply_exhausted: false,
            consecutive_fares: 0,
            consecutive_candidates: 0,
            total_fares: 0,
            total_candidates: 0,
            duration: Duration::ZERO,
        })
    }
}

/// The priority-queue solution generator for one partition.
pub struct ShoppingQueue<'a> {
    model: &'a ShoppingModel,
    arena: &'a FareArena,
    counters: &'a DiversityCounters,
    token: &'a CancelToken,
    tuning: &'a SearchTuning,
    kind: QueueKind,
    index: CombinationIndex,
    supplier: Box<dyn FareSupplier + Send + 'a>,
    probe: Box<dyn FareRuleProbe + Send + 'a>,
    validator: Box<dyn BitmapValidator + 'a>,
    diagnostics: Box<dyn DiagnosticSink + 'a>,

    flight: FlightMatrix,
    estimates: EstimateMatrix,
    state: QueueState,
    requested: u32,
    estimated_requested: u32,
    custom_quota: u32,
    min_family_size: u32,
    fare_repeat_limit: Option<u16>,
    fare_repeat_counts: FxHashMap<u64, u16>,
    last_fare: Option<FareId>,
    error: Option<PartitionError>,
    bad_estimate_heads: FxHashSet<Combination>,
    num_bad_estimates: u32,
    custom_family_heads: FxHashSet<Combination>,
    collect_estimates: bool,
    collect_flight_only_estimates: bool,
    create_more: bool,
    search_beyond: bool,
    custom_search: bool,
    search_beyond_found: u32,
    seen_connection_points: FxHashSet<SmallVec<[Airport; 4]>>,
    foreign_solutions: FxHashSet<Combination>,
    date_pair_needs: Vec<u32>,
    long_connect_allowed_online: bool,
    supply_exhausted: bool,

    consecutive_fares: u32,
    consecutive_candidates: u32,
    total_fares: u64,
    total_candidates: u64,
    duration: Duration,
}

impl<'a> ShoppingQueue<'a> {
    // ─── Lifecycle ──────────────────────────────────────────────────

    /// Drives the queue until its requested count is met, the fare space
    /// is exhausted, or hurry is signalled. Populates the flight and
    /// estimate matrices as a side effect.
    pub fn run(&mut self) {
        let start = Instant::now();
        self.state = QueueState::Running;

        if self.token.is_aborted() {
            self.state = QueueState::Hurried;
            return;
        }

        self.clamp_requested();
        self.collect_solutions();
        if !self.search_beyond && self.estimated_requested > 0 {
            self.collect_estimates = true;
            self.generate_estimated_solutions();
        }
        self.settle_state();
        self.duration += start.elapsed();

        debug!(
            queue = %self.kind.label(),
            solutions = self.flight.len(),
            estimates = self.estimates.len(),
            state = ?self.state,
            "queue run finished"
        );
    }

    /// Resumes generation to add up to `extra` more accepted
    /// combinations; returns whether any progress was made.
    pub fn get_additional_solutions(&mut self, extra: u32) -> bool {
        let before = self.effective_solutions();

        if self.last_fare.is_none() && !self.collect_flight_only_estimates {
            return false;
        }

        self.requested = self.flight.len() as u32 + extra;
        self.clamp_requested();

        if self.collect_flight_only_estimates {
            self.generate_estimated_flight_only_solutions();
        } else {
            if let Some(fare) = self.last_fare {
                // Re-drive the fare at the head before pulling new ones.
                self.process_solution(fare, false);
            }
            self.state = QueueState::Running;
            self.collect_solutions();
            self.settle_state();
        }

        self.effective_solutions() > before
    }

    fn clamp_requested(&mut self) {
        let cells = self.index.len() as u32;
        if self.requested > cells {
            self.requested = cells;
        }
    }

    fn collect_solutions(&mut self) {
        while self.needs_more_solutions(self.requested) {
            if self.token.must_hurry() {
                self.state = QueueState::Hurried;
                return;
            }
            let Some(fare_id) = self.next_fare() else {
                return;
            };
            self.last_fare = Some(fare_id);
            self.process_solution(fare_id, false);
        }
    }

    /// Pulls the next cheapest fare combination from the pricing layer.
    fn next_fare(&mut self) -> Option<FareId> {
        if self.give_up_on_fares() || self.token.is_aborted() {
            return None;
        }

        let last_price = self.last_fare.map(|id| self.arena.price_of(id));
        let next = match self.supplier.next_fare(last_price) {
            Ok(next) => next,
            Err(supply_error) => {
                warn!(queue = %self.kind.label(), error = %supply_error, "partition supply failed");
                self.error = Some(PartitionError::Pricing {
                    partition: self.kind.label(),
                    detail: supply_error.0,
                });
                self.supply_exhausted = true;
                return None;
            }
        };

        let Some(mut fare) = next else {
            self.supply_exhausted = true;
            return None;
        };

        if let Some(last) = last_price {
            debug_assert!(
                fare.total() >= last,
                "fare supplier violated the non-decreasing price contract"
            );
        }

        self.consecutive_fares += 1;
        self.total_fares += 1;
        fare.set_source(self.kind.label());
        Some(self.arena.insert(fare))
    }

    fn settle_state(&mut self) {
        if self.state == QueueState::Hurried {
            return;
        }
        self.state = if self.supply_exhausted {
            QueueState::Exhausted
        } else {
            QueueState::AwaitingMore
        };
    }

    // ─── Candidate processing ───────────────────────────────────────

    /// Streams candidate combinations for one fare combination through
    /// the bitmap validator and files the survivors.
    fn process_solution(&mut self, fare_id: FareId, extra_fare_path: bool) {
        if self.model.is_alt_dates() && self.date_pair_needs.iter().all(|&n| n == 0) {
            return;
        }

        let fare = self.arena.get(fare_id);
        let (mut stopat, interline_fill) = self.stop_target(extra_fare_path);
        self.consecutive_candidates = 0;

        let index = self.index.clone();
        let model = self.model;
        let weigher = |combination: &Combination| CombinationScore {
            index_sum: combination.sop_index_sum(),
            segment_count: u64::from(model.segment_count(combination)),
        };

        for (combination, _) in RatedCombinationQueue::new(&index, weigher) {
            if !self.needs_more_solutions(stopat) {
                break;
            }
            if self.give_up_on_candidates() {
                break;
            }
            if self.token.must_hurry() {
                self.state = QueueState::Hurried;
                break;
            }
            if self.flight.contains(&combination) {
                continue;
            }
            if self.collect_estimates && self.estimates.contains(&combination) {
                continue;
            }
            if !self.is_valid_cell(&combination) {
                continue;
            }

            self.consecutive_candidates += 1;
            self.total_candidates += 1;

            let date_pair = self.model.date_pair_of(&combination);
            let status = match self.validator.lookup(fare_id, &combination, date_pair) {
                BitStatus::Untested | BitStatus::Deferred => self.validator.first_pass(
                    &fare,
                    fare_id,
                    &combination,
                    date_pair,
                    &*self.probe,
                ),
                recorded => recorded,
            };

            let passed = match status {
                BitStatus::Pass => true,
                // The combination is about to be emitted; only now is the
                // expensive second pass worth paying for.
                BitStatus::Skip => self.validator.second_pass(
                    &fare,
                    fare_id,
                    &combination,
                    date_pair,
                    &*self.probe,
                ),
                _ => false,
            };
            if !passed {
                continue;
            }

            let connection_points = self.model.connection_points(&combination);
            if self.search_beyond && self.seen_connection_points.contains(&connection_points) {
                continue;
            }
            if self.custom_search {
                if !self.needs_more_custom() {
                    return;
                }
                if !self.model.is_custom(&combination) {
                    continue;
                }
            }

            if !self.add_to_flight_matrix(combination.clone(), SolutionEntry::priced(fare_id)) {
                continue;
            }

            if self.seen_connection_points.insert(connection_points) && self.search_beyond {
                self.search_beyond_found += 1;
            }
            self.consecutive_fares = 0;
            self.consecutive_candidates = 0;

            if let Some(pair) = date_pair {
                let slot = &mut self.date_pair_needs[pair.get()];
                *slot = slot.saturating_sub(1);
                if *slot == 0 {
                    break;
                }
            }

            if self.collect_estimates && !self.search_beyond && !self.custom_search {
                let before = self.estimates.len();
                self.find_estimated_sops(&combination, fare_id);
                let found = (self.estimates.len() - before) as u32;
                if found < self.min_family_size
                    && !self.model.is_nonstop(&combination)
                    && !self.custom_family_heads.contains(&combination)
                    && self.bad_estimate_heads.insert(combination.clone())
                {
                    self.num_bad_estimates += 1 + found;
                }
            }

            if extra_fare_path {
                stopat = self.flight.len() as u32;
            }
        }

        // An interline queue that filled its fare-path share covers the
        // rest of its quota with flight-only solutions.
        if interline_fill && self.flight.len() as u32 >= stopat && !self.custom_search {
            self.generate_solutions_with_no_fares(Money::FALLBACK, false);
        }
    }

    /// How many flight-matrix entries this fare drive may stop at, and
    /// whether the interline fare/flight-only split is in effect.
    fn stop_target(&self, extra_fare_path: bool) -> (u32, bool) {
        if self.search_beyond || self.custom_search {
            return (self.flight.len() as u32, false);
        }
        if extra_fare_path {
            return (self.flight.len() as u32 + 1, false);
        }
        if self.model.is_alt_dates() {
            return (u32::MAX, false);
        }

        let mut stopat = self.requested;
        // The cheapest fare path may deliver a few extra options so a
        // sparse request still fills up.
        if self.flight.is_empty() && self.estimated_requested == 0 {
            stopat = stopat.saturating_add(3);
        }

        if self.kind.is_interline() && self.tuning.interline_diversity_percent < 100 {
            let share = contrail_core::num::apply_percent_ceil(
                stopat,
                self.tuning.interline_diversity_percent,
            )
            .max(1);
            return (share, true);
        }

        (stopat, false)
    }

    /// Structural filters every candidate must clear before validation.
    fn is_valid_cell(&self, combination: &Combination) -> bool {
        if !self.model.in_bounds(combination) {
            return false;
        }
        if self.flight.contains(combination) || self.estimates.contains(combination) {
            return false;
        }
        if self.foreign_solutions.contains(combination) {
            return false;
        }
        if !self.model.cabin_valid(combination) {
            return false;
        }
        if !self.model.connection_times_ok(combination) {
            return false;
        }

        if self.model.is_alt_dates() {
            let Some(pair) = self.model.date_pair_of(combination) else {
                return false;
            };
            if self.date_pair_needs.get(pair.get()).copied().unwrap_or(0) == 0 {
                return false;
            }
        }

        match self.kind {
            QueueKind::Online(carrier) => {
                let on_carrier = self
                    .model
                    .selected_sops(combination)
                    .all(|sop| sop.governing_carrier() == carrier);
                if !on_carrier {
                    return false;
                }
                if !self.long_connect_allowed_online && self.model.has_long_connect(combination) {
                    return false;
                }
                true
            }
            QueueKind::Interline => {
                // Online combinations belong to their carrier's queue,
                // except long-connection ones, which only this queue takes.
                self.model.is_interline(combination) || self.model.has_long_connect(combination)
            }
            QueueKind::NonStop => self.model.is_nonstop(combination),
            QueueKind::OneWayFares => true,
        }
    }

    /// Files an accepted solution and maintains the diversity counters.
    fn add_to_flight_matrix(&mut self, combination: Combination, entry: SolutionEntry) -> bool {
        if let (QueueKind::OneWayFares, Some(limit), Some(fare_id)) =
            (self.kind, self.fare_repeat_limit, entry.fare)
        {
            let key = self.arena.get(fare_id).family_key();
            if self.fare_repeat_counts.get(&key).copied().unwrap_or(0) >= limit {
                return false;
            }
        }

        let has_long_connect = self.model.has_long_connect(&combination);
        if has_long_connect {
            if let Some(cap) = self.tuning.max_long_connect_solutions {
                if self.counters.long_connect_count() >= cap {
                    return false;
                }
            }
        }

        let mut record_custom = false;
        if self.custom_quota > 0 {
            if self.model.is_custom(&combination) {
                if self.counters.custom_count() < self.custom_quota || has_long_connect {
                    record_custom = true;
                } else {
                    return false;
                }
            } else if self.custom_search {
                return false;
            }
        }

        if !self.flight.insert(combination.clone(), entry) {
            return false;
        }

        if record_custom {
            self.counters.record_custom();
            self.custom_family_heads.insert(combination.clone());
        }
        if has_long_connect {
            self.counters.record_long_connect();
        }
        match self.model.online_carrier(&combination) {
            Some(carrier) => self.counters.record_online(carrier),
            None => self.counters.record_interline(),
        }
        if self.model.is_nonstop(&combination) {
            self.counters.record_non_stop();
        }
        if let Some(pair) = self.model.date_pair_of(&combination) {
            self.counters.record_date_pair(pair);
        }

        if let (QueueKind::OneWayFares, Some(_), Some(fare_id)) =
            (self.kind, self.fare_repeat_limit, entry.fare)
        {
            let key = self.arena.get(fare_id).family_key();
            *self.fare_repeat_counts.entry(key).or_insert(0) += 1;
        }

        true
    }

    // ─── Progress predicates and budgets ────────────────────────────

    fn needs_more_solutions(&self, wanted: u32) -> bool {
        if (self.flight.len() as u32) < wanted {
            return true;
        }
        if self.search_beyond && self.search_beyond_found < self.tuning.connection_point_quota {
            return true;
        }
        self.custom_search && self.needs_more_custom()
    }

    fn needs_more_custom(&self) -> bool {
        self.custom_quota > 0 && self.counters.custom_count() < self.custom_quota
    }

    fn fare_budget(&self) -> u32 {
        if self.search_beyond {
            self.tuning.fare_paths_search_beyond()
        } else if self.custom_search {
            self.tuning.fare_paths_custom()
        } else {
            self.tuning.max_fare_paths
        }
    }

    fn candidate_budget(&self) -> u32 {
        if self.search_beyond {
            return self.tuning.max_combinations_search_beyond;
        }
        if self.custom_search {
            return self.tuning.max_combinations_custom;
        }
        let base = self.tuning.max_combinations_per_fare;
        if self.model.num_searchable_legs() >= 5 {
            base.saturating_mul(self.tuning.multi_leg_combination_factor)
        } else {
            base
        }
    }

    fn give_up_on_fares(&self) -> bool {
        self.consecutive_fares > self.fare_budget()
            || (self.consecutive_fares > self.tuning.max_fare_paths_with_hits
                && self.consecutive_candidates > self.candidate_budget())
    }

    fn give_up_on_candidates(&self) -> bool {
        self.consecutive_candidates > self.candidate_budget()
    }

    // ─── Estimates ──────────────────────────────────────────────────

    /// How many solutions this queue effectively holds, with bad
    /// estimates discounted.
    pub fn effective_solutions(&self) -> u32 {
        let total = (self.flight.len() + self.estimates.len()) as u32;
        total.saturating_sub(self.num_bad_estimates)
    }

    fn estimate_budget_open(&self) -> bool {
        self.effective_solutions() < self.estimated_requested
    }

    /// Re-walks the accepted solutions, cheapest first, filing estimate
    /// children until the estimate budget is met.
    pub fn generate_estimated_solutions(&mut self) {
        let ordered = self.flight.sorted_by_price(self.arena);
        for (combination, entry) in ordered {
            if !self.estimate_budget_open() {
                break;
            }
            let Some(fare_id) = entry.fare else {
                continue;
            };
            if self.arena.get(fare_id).is_fallback() {
                continue;
            }
            if self.custom_search && !self.model.is_custom(&combination) {
                continue;
            }
            self.find_estimated_sops(&combination, fare_id);
        }
    }

    /// Files children similar to `parent` that the cheap validation pass
    /// accepts, presuming they share the parent's pricing.
    fn find_estimated_sops(&mut self, parent: &Combination, fare_id: FareId) {
        let fare = self.arena.get(fare_id);
        let Some(lists) = self.similar_choice_lists(parent) else {
            return;
        };

        let mut odometer: SmallVec<[usize; 4]> = SmallVec::from_elem(0, lists.len());
        loop {
            let candidate = Combination::from_sops(
                odometer
                    .iter()
                    .zip(lists.iter())
                    .map(|(&digit, list)| list[digit]),
            );

            if candidate != *parent && self.estimate_budget_open() {
                self.try_file_estimate(parent, &candidate, fare_id, Some(fare.as_ref()));
            }
            if !self.estimate_budget_open() {
                return;
            }
            if !advance_odometer(&mut odometer, &lists) {
                return;
            }
        }
    }

    /// Per-position scheduling-option choices similar to the parent's.
    fn similar_choice_lists(&self, parent: &Combination) -> Option<Vec<Vec<SopIndex>>> {
        let mut lists: Vec<Vec<SopIndex>> = Vec::with_capacity(parent.len());
        for position in 0..parent.len() {
            match self.model.sop_at(parent, position) {
                Some(parent_sop) => {
                    let leg = self.model.searchable_leg(position)?;
                    let similar: Vec<SopIndex> = leg
                        .sops()
                        .iter()
                        .enumerate()
                        .filter(|(_, sop)| sop.cabin_valid() && parent_sop.similar_to(sop))
                        .map(|(n, _)| SopIndex::new(n))
                        .collect();
                    lists.push(similar);
                }
                None => lists.push(vec![SopIndex::SENTINEL]),
            }
        }
        if lists.iter().any(Vec::is_empty) {
            return None;
        }
        Some(lists)
    }

    fn try_file_estimate(
        &mut self,
        parent: &Combination,
        candidate: &Combination,
        fare_id: FareId,
        fare: Option<&FareCombination>,
    ) {
        if self.flight.contains(candidate) || self.estimates.contains(candidate) {
            return;
        }
        if !self.is_valid_cell(candidate) {
            return;
        }

        // Only the cheap pass gates an estimate; the presumption of
        // shared pricing is confirmed (or withdrawn) later.
        if let Some(fare) = fare {
            let date_pair = self.model.date_pair_of(candidate);
            let status = match self.validator.lookup(fare_id, candidate, date_pair) {
                BitStatus::Untested | BitStatus::Deferred => {
                    self.validator
                        .first_pass(fare, fare_id, candidate, date_pair, &*self.probe)
                }
                recorded => recorded,
            };
            if status != BitStatus::Pass {
                return;
            }
        }

        if self.model.has_long_connect(candidate) {
            if let Some(cap) = self.tuning.max_long_connect_solutions {
                if self.counters.long_connect_count() >= cap {
                    return;
                }
            }
            self.counters.record_long_connect();
        }

        if self.custom_quota > 0
            && self.model.is_custom(candidate)
            && self.needs_more_custom()
        {
            self.counters.record_custom();
            self.custom_family_heads.insert(parent.clone());
        }

        self.estimates.insert(
            candidate.clone(),
            EstimatedSolution {
                parent: parent.clone(),
                fare: fare_id,
            },
        );
    }

    /// Files flight-only estimate children around fare-less family heads.
    pub fn generate_estimated_flight_only_solutions(&mut self) {
        let ordered = self.flight.sorted_by_price(self.arena);
        for (combination, entry) in ordered {
            if !self.estimate_budget_open() {
                break;
            }
            let Some(fare_id) = entry.fare else {
                continue;
            };
            if !self.arena.get(fare_id).is_fallback() {
                continue;
            }

            let Some(lists) = self.similar_choice_lists(&combination) else {
                continue;
            };
            let mut odometer: SmallVec<[usize; 4]> = SmallVec::from_elem(0, lists.len());
            loop {
                let candidate = Combination::from_sops(
                    odometer
                        .iter()
                        .zip(lists.iter())
                        .map(|(&digit, list)| list[digit]),
                );
                if candidate != combination && self.estimate_budget_open() {
                    self.try_file_estimate(&combination, &candidate, fare_id, None);
                }
                if !self.estimate_budget_open() || !advance_odometer(&mut odometer, &lists) {
                    break;
                }
            }
        }
    }

    /// Re-examines estimate children whose presumed-shared pricing has
    /// been invalidated and discards them, together with under-sized
    /// family heads.
    pub fn remove_bad_estimates(&mut self) {
        let heads = std::mem::take(&mut self.bad_estimate_heads);
        if !heads.is_empty() {
            debug!(queue = %self.kind.label(), heads = heads.len(), "removing bad estimates");
        }

        for head in &heads {
            self.flight.remove(head);
        }
        self.estimates.retain(|_, estimate| !heads.contains(&estimate.parent));

        // Children orphaned for any other reason go with their parent.
        let flight = &self.flight;
        self.estimates.retain(|_, estimate| flight.contains(&estimate.parent));

        self.num_bad_estimates = 0;
    }

    // ─── Flight-only generation ─────────────────────────────────────

    /// Emits fare-less placeholder solutions tagged with a sentinel
    /// price so they sort last. With `direct_only`, only all-non-stop
    /// combinations qualify.
    pub fn generate_solutions_with_no_fares(&mut self, fallback_price: Money, direct_only: bool) {
        if self.kind == QueueKind::OneWayFares || self.model.is_alt_dates() {
            return;
        }
        if self.custom_search {
            self.generate_custom_solutions_with_no_fares(fallback_price);
            return;
        }

        self.diagnostics.append(&format!(
            "generating flight-only solutions for queue {}",
            self.kind.label()
        ));

        let fallback_id = self.insert_fallback_fare(fallback_price);
        let index = self.index.clone();
        let model = self.model;
        let weigher = |combination: &Combination| CombinationScore {
            index_sum: combination.sop_index_sum(),
            segment_count: u64::from(model.segment_count(combination)),
        };

        let mut failed_cells = 0u32;
        let mut pacer = StepPacer::new();
        for (combination, _) in RatedCombinationQueue::new(&index, weigher) {
            if !self.needs_more_solutions(self.requested) {
                break;
            }
            failed_cells += 1;
            if failed_cells > self.tuning.max_failed_cells_flight_only {
                break;
            }
            // Cheap cells, so the token is only polled every few steps.
            if pacer.hurried(self.token) {
                return;
            }
            if direct_only && !self.model.is_nonstop(&combination) {
                continue;
            }
            if !self.is_valid_cell(&combination) {
                continue;
            }

            failed_cells = 0;
            if self.add_to_flight_matrix(combination.clone(), SolutionEntry::priced(fallback_id)) {
                self.diagnostics.append(&format!("  {combination}"));
            }
        }
    }

    /// Flight-only generation preferring online connection trips, and
    /// among two-leg requests, mirror-image ones.
    pub fn generate_connecting_solutions_with_no_fares(&mut self, fallback_price: Money) {
        if self.model.is_alt_dates() {
            return;
        }

        let fallback_id = self.insert_fallback_fare(fallback_price);
        let carrier = self.kind.carrier();
        let two_leg = self.model.num_searchable_legs() == 2;
        let index = self.index.clone();
        let model = self.model;
        let weigher = |combination: &Combination| CombinationScore {
            index_sum: combination.sop_index_sum(),
            segment_count: u64::from(model.segment_count(combination)),
        };

        let mut saved: Vec<Combination> = Vec::new();
        let mut failed_cells = 0u32;

        for (combination, _) in RatedCombinationQueue::new(&index, weigher) {
            if !self.needs_more_solutions(self.requested) {
                break;
            }
            failed_cells += 1;
            if failed_cells > self.tuning.max_failed_cells_flight_only {
                break;
            }

            let connecting = self.model.selected_sops(&combination).all(|sop| {
                sop.segments().len() == 2
                    && carrier.is_none_or(|c| sop.governing_carrier() == c)
            });
            if !connecting || !self.is_valid_cell(&combination) {
                continue;
            }

            failed_cells = 0;
            if two_leg && self.is_mirror_trip(&combination) {
                self.add_to_flight_matrix(combination, SolutionEntry::priced(fallback_id));
                return;
            }
            if (saved.len() as u32) < self.requested {
                saved.push(combination);
            }
        }

        for combination in saved {
            if !self.needs_more_solutions(self.requested) {
                break;
            }
            self.add_to_flight_matrix(combination, SolutionEntry::priced(fallback_id));
        }
    }

    /// Whether a two-leg combination is a mirror-image connection trip:
    /// same connection airport and same governing carrier both ways.
    fn is_mirror_trip(&self, combination: &Combination) -> bool {
        let mut sops = self.model.selected_sops(combination);
        let (Some(outbound), Some(inbound)) = (sops.next(), sops.next()) else {
            return false;
        };
        outbound.governing_carrier() == inbound.governing_carrier()
            && outbound.connection_airports() == inbound.connection_airports()
    }

    /// Flight-only generation over the custom scheduling options only.
    pub fn generate_custom_solutions_with_no_fares(&mut self, fallback_price: Money) {
        let Some(lists) = self.custom_choice_lists() else {
            return;
        };
        let fallback_id = self.insert_fallback_fare(fallback_price);

        let mut failed_cells = 0u32;
        let mut odometer: SmallVec<[usize; 4]> = SmallVec::from_elem(0, lists.len());
        loop {
            if !self.needs_more_custom() {
                return;
            }
            failed_cells += 1;
            if failed_cells > self.tuning.max_failed_cells_flight_only {
                return;
            }

            let candidate = Combination::from_sops(
                odometer
                    .iter()
                    .zip(lists.iter())
                    .map(|(&digit, list)| list[digit]),
            );
            if self.is_valid_cell(&candidate) && self.model.is_custom(&candidate) {
                failed_cells = 0;
                self.add_to_flight_matrix(candidate, SolutionEntry::priced(fallback_id));
            }

            if !advance_odometer(&mut odometer, &lists) {
                return;
            }
        }
    }

    /// The per-leg cabin-valid scheduling options eligible for custom
    /// solutions: custom legs narrow down to their custom options.
    fn custom_choice_lists(&self) -> Option<Vec<Vec<SopIndex>>> {
        let mut lists = Vec::with_capacity(self.model.num_searchable_legs());
        for position in 0..self.model.num_searchable_legs() {
            let leg = self.model.searchable_leg(position)?;
            let choices: Vec<SopIndex> = leg
                .sops()
                .iter()
                .enumerate()
                .filter(|(_, sop)| sop.cabin_valid() && (!leg.is_custom() || sop.is_custom()))
                .map(|(n, _)| SopIndex::new(n))
                .collect();
            if choices.is_empty() {
                return None;
            }
            lists.push(choices);
        }
        Some(lists)
    }

    fn insert_fallback_fare(&mut self, price: Money) -> FareId {
        let mut fare = FareCombination::fallback(price);
        fare.set_source(self.kind.label());
        self.arena.insert(fare)
    }

    // ─── Post-passes ────────────────────────────────────────────────

    /// Collapses equivalent families; custom family heads are protected.
    pub fn group_mother(&mut self) {
        if self.model.is_alt_dates() || self.estimated_requested == 0 {
            return;
        }
        let protected = std::mem::take(&mut self.custom_family_heads);
        family::group_families(
            self.model,
            self.arena,
            &mut self.flight,
            &mut self.estimates,
            |combination| protected.contains(combination),
        );
        self.custom_family_heads = protected;
    }

    /// A queue whose only solution is fare-less gets it promoted to
    /// price zero so it sorts ahead of every other partition's output.
    pub fn make_option_higher_priority(&mut self) {
        if self.flight.len() != 1 {
            return;
        }
        let (combination, entry) = match self.flight.iter().next() {
            Some((c, e)) => (c.clone(), *e),
            None => return,
        };
        let fare_less = entry
            .fare
            .is_none_or(|id| self.arena.get(id).is_fallback());
        if fare_less {
            let promoted = self.insert_fallback_fare(Money::ZERO);
            self.flight.replace(&combination, SolutionEntry::priced(promoted));
        }
    }

    /// Alternate dates: prunes entries priced far beyond the cheapest
    /// one before the merge.
    pub fn remove_high_priced_date_pairs(&mut self) {
        if !self.model.is_alt_dates() {
            return;
        }
        let lowest = self
            .flight
            .iter()
            .filter(|(_, e)| e.has_real_fare(self.arena))
            .map(|(_, e)| e.price(self.arena))
            .min();
        let Some(lowest) = lowest else {
            return;
        };

        let limit = Money::from_minor(
            (i128::from(lowest.minor()) * i128::from(self.tuning.alt_date_price_jump_percent)
                / 100) as i64,
        );

        let arena = self.arena;
        self.flight.retain(|_, entry| {
            !entry.has_real_fare(arena) || entry.price(arena) <= limit
        });
        let flight = &self.flight;
        self.estimates.retain(|_, estimate| flight.contains(&estimate.parent));
    }

    /// Re-uses an already-discovered, equally priced fare combination to
    /// add one more solution at the same price point.
    pub fn same_level_backfill(&mut self) {
        let Some(last) = self.last_fare else {
            return;
        };
        let price = self.arena.price_of(last);
        let Some(mut fare) = self.supplier.repeat_at(price) else {
            return;
        };
        if fare.total() != price {
            return;
        }
        fare.set_source(self.kind.label());
        let fare_id = self.arena.insert(fare);
        self.process_solution(fare_id, true);
    }

    /// Searches beyond the already-discovered solutions for additional
    /// connection-point diversity. Re-drives known fare combinations
    /// first, then pulls new ones under the shrunk budgets.
    pub fn drive_search_beyond(&mut self) {
        if self.kind.is_interline() {
            return;
        }

        self.search_beyond = true;
        self.search_beyond_found = 0;
        self.seen_connection_points.clear();
        for (combination, _) in self.flight.iter() {
            let points = self.model.connection_points(combination);
            self.seen_connection_points.insert(points);
        }

        let known: Vec<FareId> = self.sorted_solutions().into_iter().map(|(_, f)| f).collect();
        for fare_id in known {
            if !self.needs_more_solutions(self.flight.len() as u32) || self.token.must_hurry() {
                break;
            }
            self.process_solution(fare_id, true);
        }

        while self.needs_more_solutions(self.flight.len() as u32) && !self.token.must_hurry() {
            let Some(fare_id) = self.next_fare() else {
                break;
            };
            self.last_fare = Some(fare_id);
            self.process_solution(fare_id, false);
        }

        self.search_beyond = false;
    }

    /// Re-drives the queue hunting for custom solutions only, known fare
    /// combinations first.
    pub fn drive_custom_search(&mut self) {
        if self.custom_quota == 0 {
            return;
        }

        self.custom_search = true;
        let known: Vec<FareId> = self.sorted_solutions().into_iter().map(|(_, f)| f).collect();
        for fare_id in known {
            if !self.needs_more_custom() || self.token.must_hurry() {
                break;
            }
            self.process_solution(fare_id, true);
        }

        while self.needs_more_custom() && !self.token.must_hurry() {
            let Some(fare_id) = self.next_fare() else {
                break;
            };
            self.last_fare = Some(fare_id);
            self.process_solution(fare_id, false);
        }

        self.custom_search = false;
    }

    // ─── Introspection ──────────────────────────────────────────────

    #[inline]
    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    #[inline]
    pub fn state(&self) -> QueueState {
        self.state
    }

    #[inline]
    pub fn is_interline(&self) -> bool {
        self.kind.is_interline()
    }

    #[inline]
    pub fn flight_matrix(&self) -> &FlightMatrix {
        &self.flight
    }

    #[inline]
    pub fn estimate_matrix(&self) -> &EstimateMatrix {
        &self.estimates
    }

    #[inline]
    pub fn num_bad_estimates(&self) -> u32 {
        self.num_bad_estimates
    }

    #[inline]
    pub fn last_solution(&self) -> Option<FareId> {
        self.last_fare
    }

    #[inline]
    pub fn requested(&self) -> u32 {
        self.requested
    }

    pub fn set_requested(&mut self, count: u32) {
        self.requested = count;
        self.clamp_requested();
    }

    #[inline]
    pub fn estimated_requested(&self) -> u32 {
        self.estimated_requested
    }

    #[inline]
    pub fn set_estimated_requested(&mut self, count: u32) {
        self.estimated_requested = count;
    }

    #[inline]
    pub fn set_min_family_size(&mut self, size: u32) {
        self.min_family_size = size;
    }

    #[inline]
    pub fn create_more(&self) -> bool {
        self.create_more
    }

    #[inline]
    pub fn set_create_more(&mut self, create: bool) {
        self.create_more = create;
    }

    #[inline]
    pub fn set_collect_estimates(&mut self, collect: bool) {
        self.collect_estimates = collect;
    }

    #[inline]
    pub fn set_collect_flight_only_estimates(&mut self, collect: bool) {
        self.collect_flight_only_estimates = collect;
    }

    /// Solutions already produced by other partitions, to be excluded
    /// here. Only set between passes, never while queues run in
    /// parallel.
    pub fn set_foreign_solutions(&mut self, foreign: FxHashSet<Combination>) {
        self.foreign_solutions = foreign;
    }

    /// Takes the partition-level error, if one occurred.
    pub fn take_error(&mut self) -> Option<PartitionError> {
        self.error.take()
    }

    /// The priced, non-fallback solutions, cheapest first.
    pub fn sorted_solutions(&self) -> Vec<(Combination, FareId)> {
        self.flight
            .sorted_by_price(self.arena)
            .into_iter()
            .filter_map(|(combination, entry)| {
                let fare_id = entry.fare?;
                let fare = self.arena.get(fare_id);
                if fare.is_fallback() || fare.total() <= Money::ZERO {
                    return None;
                }
                Some((combination, fare_id))
            })
            .collect()
    }

    /// Whether any accepted solution is online (single-carrier).
    pub fn found_online_option(&self) -> bool {
        if self.kind.is_interline() {
            return true;
        }
        self.flight
            .iter()
            .any(|(combination, _)| self.model.online_carrier(combination).is_some())
    }

    /// Whether any accepted solution is a non-stop combination, or the
    /// queue only holds fare-less entries (which the non-stop backfill
    /// will replace anyway).
    pub fn found_nonstop_option(&self) -> bool {
        self.flight.iter().any(|(combination, entry)| {
            !entry.has_real_fare(self.arena) || self.model.is_nonstop(combination)
        })
    }

    /// Whether any accepted solution carries a genuine fare path.
    pub fn found_fare_path_option(&self) -> bool {
        self.flight.iter().any(|(_, entry)| {
            entry.has_real_fare(self.arena) && entry.price(self.arena) > Money::ZERO
        })
    }

    /// Moves the matrices out for the orchestrator's merge.
    pub fn take_results(&mut self) -> (FlightMatrix, EstimateMatrix) {
        (
            std::mem::take(&mut self.flight),
            std::mem::take(&mut self.estimates),
        )
    }

    /// Statistics of this queue's work so far.
    pub fn statistics(&self) -> QueueStatistics {
        QueueStatisticsBuilder::new()
            .fare_combinations_tried(self.total_fares)
            .candidates_tried(self.total_candidates)
            .solutions_found(self.flight.len() as u64)
            .estimates_found(self.estimates.len() as u64)
            .duration(self.duration)
            .build()
    }
}

/// Advances a mixed-radix odometer; returns `false` after the last
/// combination.
fn advance_odometer(odometer: &mut [usize], lists: &[Vec<SopIndex>]) -> bool {
    for position in (0..odometer.len()).rev() {
        odometer[position] += 1;
        if odometer[position] < lists[position].len() {
            return true;
        }
        odometer[position] = 0;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ProbeOutcome, SupplyError};
    use contrail_model::fare::FareComponent;
    use contrail_model::index::LegIndex;
    use contrail_model::model::{FlightSegment, Leg, SchedulingOption, ShoppingModelBuilder};

    fn segment(carrier: &str, dep: u32, arr: u32) -> FlightSegment {
        FlightSegment {
            origin: Airport::new("AAA"),
            destination: Airport::new("BBB"),
            carrier: Carrier::new(carrier),
            departure_minute: dep,
            arrival_minute: arr,
        }
    }

    fn nonstop(carrier: &str, dep: u32) -> SchedulingOption {
        SchedulingOption::new(Carrier::new(carrier), vec![segment(carrier, dep, dep + 100)])
    }

    fn one_leg_model(num_sops: usize) -> ShoppingModel {
        let mut builder = ShoppingModelBuilder::new();
        builder.add_leg(Leg::new(
            (0..num_sops).map(|n| nonstop("AA", n as u32 * 10)).collect(),
        ));
        builder.build()
    }

    fn priced(amount: i64) -> FareCombination {
        FareCombination::new(
            Money::from_major(amount),
            vec![FareComponent {
                first_leg: LegIndex::new(0),
                last_leg: LegIndex::new(3),
                carrier: Carrier::new("AA"),
                amount: Money::from_major(amount),
                industry: false,
            }],
        )
    }

    /// A supplier producing a fixed, pre-sorted list of fares.
    struct ScriptedSupplier {
        fares: Vec<FareCombination>,
        cursor: usize,
        fail: bool,
    }

    impl ScriptedSupplier {
        fn new(mut fares: Vec<FareCombination>) -> Self {
            fares.sort_by_key(|f| f.total());
            ScriptedSupplier {
                fares,
                cursor: 0,
                fail: false,
            }
        }

        fn failing() -> Self {
            ScriptedSupplier {
                fares: Vec::new(),
                cursor: 0,
                fail: true,
            }
        }
    }

    impl FareSupplier for ScriptedSupplier {
        fn next_fare(
            &mut self,
            _last_price: Option<Money>,
        ) -> Result<Option<FareCombination>, SupplyError> {
            if self.fail {
                return Err(SupplyError("pricing backend unavailable".to_string()));
            }
            let fare = self.fares.get(self.cursor).cloned();
            self.cursor += 1;
            Ok(fare)
        }
    }

    /// A probe whose verdict is scripted per combination.
    struct TableProbe<F>(F);

    impl<F> FareRuleProbe for TableProbe<F>
    where
        F: Fn(&Combination) -> ProbeOutcome,
    {
        fn quick_check(
            &self,
            _fare: &FareCombination,
            combination: &Combination,
            _date_pair: Option<contrail_model::index::DatePairId>,
        ) -> ProbeOutcome {
            (self.0)(combination)
        }

        fn full_check(
            &self,
            _fare: &FareCombination,
            combination: &Combination,
            _date_pair: Option<contrail_model::index::DatePairId>,
        ) -> bool {
            (self.0)(combination) != ProbeOutcome::Fail
        }
    }

    fn build_queue<'a>(
        model: &'a ShoppingModel,
        arena: &'a FareArena,
        counters: &'a DiversityCounters,
        token: &'a CancelToken,
        tuning: &'a SearchTuning,
        kind: QueueKind,
        fares: Vec<FareCombination>,
        probe: impl Fn(&Combination) -> ProbeOutcome + Send + 'static,
        requested: u32,
    ) -> ShoppingQueue<'a> {
        ShoppingQueueBuilder::new(
            model,
            arena,
            counters,
            token,
            tuning,
            kind,
            Box::new(ScriptedSupplier::new(fares)),
            Box::new(TableProbe(probe)),
        )
        .requested(requested)
        .build()
        .expect("non-empty candidate space")
    }

    #[test]
    fn test_scenario_one_leg_three_sops_cheapest_first() {
        // 1 leg, 3 SOPs, 1 fare valid on all 3: exactly 3 combinations,
        // cheapest (lowest SOP index) first.
        let model = one_leg_model(3);
        let arena = FareArena::new();
        let counters = DiversityCounters::new(&[Carrier::new("AA")], 0);
        let token = CancelToken::new();
        let tuning = SearchTuning::default();

        let mut queue = build_queue(
            &model,
            &arena,
            &counters,
            &token,
            &tuning,
            QueueKind::Online(Carrier::new("AA")),
            vec![priced(100)],
            |_| ProbeOutcome::Pass,
            3,
        );
        queue.run();

        assert_eq!(queue.flight_matrix().len(), 3);
        let sorted = queue.flight_matrix().sorted_by_price(&arena);
        assert_eq!(sorted[0].0, Combination::from_positions(&[0]));
        assert_eq!(queue.state(), QueueState::AwaitingMore);
        assert!(queue.last_solution().is_some());
    }

    #[test]
    fn test_alt_dates_fill_each_pair_and_stop() {
        use contrail_model::model::DatePair;

        let mut builder = ShoppingModelBuilder::new();
        let pair_a = builder.add_date_pair(DatePair {
            departure_day: 10,
            return_day: 17,
        });
        let pair_b = builder.add_date_pair(DatePair {
            departure_day: 11,
            return_day: 18,
        });
        builder.add_leg(Leg::new(vec![
            nonstop("AA", 0).with_date_pair(pair_a),
            nonstop("AA", 30).with_date_pair(pair_a),
            nonstop("AA", 60).with_date_pair(pair_b),
        ]));
        let model = builder.build();

        let arena = FareArena::new();
        let counters = DiversityCounters::new(&[Carrier::new("AA")], 2);
        let token = CancelToken::new();
        let tuning = SearchTuning::default();

        let mut queue = ShoppingQueueBuilder::new(
            &model,
            &arena,
            &counters,
            &token,
            &tuning,
            QueueKind::Online(Carrier::new("AA")),
            Box::new(ScriptedSupplier::new(vec![priced(100), priced(110)])),
            Box::new(TableProbe(|_: &Combination| ProbeOutcome::Pass)),
        )
        .requested(3)
        .date_pair_needs(vec![1, 1])
        .build()
        .unwrap();
        queue.run();

        // One solution per date pair; the second pair-A option stays out.
        assert_eq!(counters.date_pair_count(pair_a), 1);
        assert_eq!(counters.date_pair_count(pair_b), 1);
        assert_eq!(queue.flight_matrix().len(), 2);
    }

    #[test]
    fn test_scenario_fare_invalid_on_leg_one_index_one() {
        // 2 legs with 2 and 3 SOPs; the fare fails whenever leg-1 index
        // is 1: exactly 4 of 6 combinations, none with leg-1 index 1.
        let mut builder = ShoppingModelBuilder::new();
        builder
            .add_leg(Leg::new(vec![nonstop("AA", 0), nonstop("AA", 10)]))
            .add_leg(Leg::new(vec![
                nonstop("AA", 300),
                nonstop("AA", 310),
                nonstop("AA", 320),
            ]));
        let model = builder.build();
        let arena = FareArena::new();
        let counters = DiversityCounters::new(&[Carrier::new("AA")], 0);
        let token = CancelToken::new();
        let tuning = SearchTuning::default();

        let mut queue = build_queue(
            &model,
            &arena,
            &counters,
            &token,
            &tuning,
            QueueKind::Online(Carrier::new("AA")),
            vec![priced(100)],
            |combination| {
                if combination.get(LegIndex::new(1)) == Some(SopIndex::new(1)) {
                    ProbeOutcome::Fail
                } else {
                    ProbeOutcome::Pass
                }
            },
            6,
        );
        queue.run();

        assert_eq!(queue.flight_matrix().len(), 4);
        // Requesting more cannot resurrect failed bits.
        queue.get_additional_solutions(3);
        assert_eq!(queue.flight_matrix().len(), 4);
        for (combination, _) in queue.flight_matrix().iter() {
            assert_ne!(combination.get(LegIndex::new(1)), Some(SopIndex::new(1)));
        }
    }

    #[test]
    fn test_prices_are_non_decreasing() {
        let model = one_leg_model(4);
        let arena = FareArena::new();
        let counters = DiversityCounters::new(&[Carrier::new("AA")], 0);
        let token = CancelToken::new();
        let tuning = SearchTuning::default();

        let mut queue = build_queue(
            &model,
            &arena,
            &counters,
            &token,
            &tuning,
            QueueKind::Online(Carrier::new("AA")),
            vec![priced(300), priced(100), priced(200)],
            |_| ProbeOutcome::Pass,
            4,
        );
        queue.run();

        let prices: Vec<Money> = queue
            .flight_matrix()
            .sorted_by_price(&arena)
            .into_iter()
            .map(|(_, e)| e.price(&arena))
            .collect();
        for window in prices.windows(2) {
            assert!(window[0] <= window[1]);
        }
    }

    #[test]
    fn test_hurry_before_start_produces_nothing() {
        let model = one_leg_model(3);
        let arena = FareArena::new();
        let counters = DiversityCounters::new(&[Carrier::new("AA")], 0);
        let token = CancelToken::new();
        token.signal_hurry();
        token.set_abort_on_hurry(true);
        let tuning = SearchTuning::default();

        let mut queue = build_queue(
            &model,
            &arena,
            &counters,
            &token,
            &tuning,
            QueueKind::Online(Carrier::new("AA")),
            vec![priced(100)],
            |_| ProbeOutcome::Pass,
            3,
        );
        queue.run();

        assert_eq!(queue.state(), QueueState::Hurried);
        assert!(queue.flight_matrix().is_empty());
    }

    #[test]
    fn test_partition_supply_error_is_stored_not_thrown() {
        let model = one_leg_model(2);
        let arena = FareArena::new();
        let counters = DiversityCounters::new(&[Carrier::new("AA")], 0);
        let token = CancelToken::new();
        let tuning = SearchTuning::default();

        let mut queue = ShoppingQueueBuilder::new(
            &model,
            &arena,
            &counters,
            &token,
            &tuning,
            QueueKind::Online(Carrier::new("AA")),
            Box::new(ScriptedSupplier::failing()),
            Box::new(TableProbe(|_: &Combination| ProbeOutcome::Pass)),
        )
        .requested(2)
        .build()
        .unwrap();

        queue.run();
        assert!(queue.flight_matrix().is_empty());
        assert!(matches!(
            queue.take_error(),
            Some(PartitionError::Pricing { .. })
        ));
    }

    #[test]
    fn test_flight_only_fallback_sorts_last() {
        let model = one_leg_model(3);
        let arena = FareArena::new();
        let counters = DiversityCounters::new(&[Carrier::new("AA")], 0);
        let token = CancelToken::new();
        let tuning = SearchTuning::default();

        let mut queue = build_queue(
            &model,
            &arena,
            &counters,
            &token,
            &tuning,
            QueueKind::Online(Carrier::new("AA")),
            vec![priced(100)],
            // Only the first combination prices.
            |combination| {
                if combination == &Combination::from_positions(&[0]) {
                    ProbeOutcome::Pass
                } else {
                    ProbeOutcome::Fail
                }
            },
            3,
        );
        queue.run();
        assert_eq!(queue.flight_matrix().len(), 1);

        queue.generate_solutions_with_no_fares(Money::FALLBACK, false);
        assert_eq!(queue.flight_matrix().len(), 3);

        let sorted = queue.flight_matrix().sorted_by_price(&arena);
        assert!(sorted[0].1.has_real_fare(&arena));
        assert!(!sorted[1].1.has_real_fare(&arena));
    }

    #[test]
    fn test_direct_only_fallback_skips_connections() {
        let mut builder = ShoppingModelBuilder::new();
        builder.add_leg(Leg::new(vec![
            nonstop("AA", 0),
            SchedulingOption::new(
                Carrier::new("AA"),
                vec![segment("AA", 0, 50), segment("AA", 120, 200)],
            ),
        ]));
        let model = builder.build();
        let arena = FareArena::new();
        let counters = DiversityCounters::new(&[Carrier::new("AA")], 0);
        let token = CancelToken::new();
        let tuning = SearchTuning::default();

        let mut queue = build_queue(
            &model,
            &arena,
            &counters,
            &token,
            &tuning,
            QueueKind::Online(Carrier::new("AA")),
            vec![],
            |_| ProbeOutcome::Pass,
            2,
        );
        queue.generate_solutions_with_no_fares(Money::FALLBACK, true);

        assert_eq!(queue.flight_matrix().len(), 1);
        let (combination, _) = queue.flight_matrix().iter().next().unwrap();
        assert!(model.is_nonstop(combination));
    }

    #[test]
    fn test_estimates_and_bad_estimate_removal() {
        // Four similar SOPs; fare accepts only the first combination
        // fully, estimates fill the family.
        let model = one_leg_model(4);
        let arena = FareArena::new();
        let counters = DiversityCounters::new(&[Carrier::new("AA")], 0);
        let token = CancelToken::new();
        let tuning = SearchTuning::default();

        let mut queue = build_queue(
            &model,
            &arena,
            &counters,
            &token,
            &tuning,
            QueueKind::Online(Carrier::new("AA")),
            vec![priced(100)],
            |_| ProbeOutcome::Pass,
            1,
        );
        queue.set_estimated_requested(4);
        queue.run();

        assert_eq!(queue.flight_matrix().len(), 1);
        assert_eq!(queue.estimate_matrix().len(), 3);

        // Simulate the parent being pruned: children become orphans and
        // removal drops them.
        let parent = Combination::from_positions(&[0]);
        queue.flight.remove(&parent);
        queue.remove_bad_estimates();
        assert_eq!(queue.estimate_matrix().len(), 0);
    }

    #[test]
    fn test_interline_queue_rejects_online_combinations() {
        let mut builder = ShoppingModelBuilder::new();
        builder.add_leg(Leg::new(vec![nonstop("AA", 0), nonstop("UA", 10)]));
        builder.add_leg(Leg::new(vec![nonstop("AA", 300)]));
        let model = builder.build();
        let arena = FareArena::new();
        let counters = DiversityCounters::new(&[Carrier::new("AA")], 0);
        let token = CancelToken::new();
        let tuning = SearchTuning::default();

        let mut queue = build_queue(
            &model,
            &arena,
            &counters,
            &token,
            &tuning,
            QueueKind::Interline,
            vec![priced(100)],
            |_| ProbeOutcome::Pass,
            4,
        );
        queue.run();

        // Only (UA, AA) is interline; (AA, AA) belongs to the online queue.
        assert_eq!(queue.flight_matrix().len(), 1);
        let (combination, _) = queue.flight_matrix().iter().next().unwrap();
        assert!(model.is_interline(combination));
        assert_eq!(counters.interline_count(), 1);
    }

    #[test]
    fn test_skip_bits_resolve_lazily_via_second_pass() {
        let model = one_leg_model(2);
        let arena = FareArena::new();
        let counters = DiversityCounters::new(&[Carrier::new("AA")], 0);
        let token = CancelToken::new();
        let tuning = SearchTuning::default();

        // Everything skips in the quick pass; the full pass accepts.
        let mut queue = build_queue(
            &model,
            &arena,
            &counters,
            &token,
            &tuning,
            QueueKind::Online(Carrier::new("AA")),
            vec![priced(100)],
            |_| ProbeOutcome::Skip,
            2,
        );
        queue.run();
        assert_eq!(queue.flight_matrix().len(), 2);
    }

    #[test]
    fn test_group_mother_builds_families() {
        let model = one_leg_model(3);
        let arena = FareArena::new();
        let counters = DiversityCounters::new(&[Carrier::new("AA")], 0);
        let token = CancelToken::new();
        let tuning = SearchTuning::default();

        let mut queue = build_queue(
            &model,
            &arena,
            &counters,
            &token,
            &tuning,
            QueueKind::Online(Carrier::new("AA")),
            vec![priced(100)],
            |_| ProbeOutcome::Pass,
            3,
        );
        queue.set_estimated_requested(1);
        queue.run();
        let heads_before = queue.flight_matrix().len();
        queue.group_mother();

        // Identically priced, similar solutions collapse into one family.
        assert!(queue.flight_matrix().len() <= heads_before);
        assert_eq!(
            queue.flight_matrix().len() + queue.estimate_matrix().len(),
            3
        );
    }

    #[test]
    fn test_make_option_higher_priority() {
        let model = one_leg_model(1);
        let arena = FareArena::new();
        let counters = DiversityCounters::new(&[Carrier::new("AA")], 0);
        let token = CancelToken::new();
        let tuning = SearchTuning::default();

        let mut queue = build_queue(
            &model,
            &arena,
            &counters,
            &token,
            &tuning,
            QueueKind::Online(Carrier::new("AA")),
            vec![],
            |_| ProbeOutcome::Pass,
            1,
        );
        queue.generate_solutions_with_no_fares(Money::FALLBACK, false);
        assert_eq!(queue.flight_matrix().len(), 1);

        queue.make_option_higher_priority();
        let (_, entry) = queue.flight_matrix().iter().next().unwrap();
        assert_eq!(entry.price(&arena), Money::ZERO);
    }

    #[test]
    fn test_exhausted_state_when_supply_runs_dry() {
        let model = one_leg_model(2);
        let arena = FareArena::new();
        let counters = DiversityCounters::new(&[Carrier::new("AA")], 0);
        let token = CancelToken::new();
        let tuning = SearchTuning::default();

        let mut queue = build_queue(
            &model,
            &arena,
            &counters,
            &token,
            &tuning,
            QueueKind::Online(Carrier::new("AA")),
            vec![priced(100)],
            |_| ProbeOutcome::Fail,
            5,
        );
        queue.run();
        assert_eq!(queue.state(), QueueState::Exhausted);
        assert!(queue.flight_matrix().is_empty());
    }
}
