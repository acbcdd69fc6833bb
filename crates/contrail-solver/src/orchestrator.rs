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

//! # Orchestrator
//!
//! Creates one solution-generator queue per diversity partition, runs
//! the online queues in parallel where safe, then executes the ordered
//! top-up passes until the global diversity contract is met or the soft
//! deadline expires, and merges every partition's matrices into the
//! global result set.
//!
//! The pass order mirrors the production flow: resume under-target
//! queues, fare-less fallbacks, estimate inflation, flight-only
//! families, non-stop coverage, same-level backfill, search-beyond for
//! connection-point diversity, and the custom/multi-airport
//! collaborators — each pass polling the cancel token between steps.
//! The merge itself runs single-threaded; only the online queue phase is
//! parallel.

use crate::shaping::{
    custom::CustomSolutionBuilder, multi_airport::MultiAirportAgent,
    non_stop::RequiredNonStopsCalculator,
};
use contrail_core::num::{apply_percent, per_bucket_share};
use contrail_model::{
    carrier::{Airport, Carrier},
    fare::{FareArena, FareCombination},
    model::ShoppingModel,
    money::Money,
};
use contrail_queue::{
    config::SearchTuning,
    family::split_inconsistent_families,
    generator::{QueueKind, ShoppingQueue, ShoppingQueueBuilder},
    matrix::{reconcile_duplicates, EstimateMatrix, FlightMatrix, SolutionEntry},
    traits::{FareRuleProbe, FareSupplier},
};
use contrail_search::{
    cancel::CancelToken,
    combination_index::CombinationIndex,
    counters::{CountersSnapshot, DiversityCounters},
    decision::DiversifierDecision,
    error::{SearchError, SearchResult},
    stats::QueueStatistics,
};
use tracing::{debug, info, warn};

/// Creates the per-partition collaborators: the fare supplier (pricing)
/// and the rule probe (fare/rule validation service).
pub trait PartitionServices: Sync {
    fn fare_supplier<'s>(&'s self, kind: QueueKind) -> Box<dyn FareSupplier + Send + 's>;
    fn rule_probe<'s>(&'s self, kind: QueueKind) -> Box<dyn FareRuleProbe + Send + 's>;
}

/// The merged output of a whole request.
#[derive(Debug)]
pub struct SolutionSet {
    /// Combination → accepted fare combination (family heads).
    pub flight: FlightMatrix,
    /// Combination → (parent, fare) estimate children.
    pub estimates: EstimateMatrix,
    /// Final diversity counter values.
    pub counters: CountersSnapshot,
    /// Per-partition statistics, in queue creation order.
    pub statistics: Vec<(String, QueueStatistics)>,
}

/// The per-request orchestration layer.
pub struct Orchestrator<'a, S> {
    model: &'a ShoppingModel,
    arena: &'a FareArena,
    services: &'a S,
    decision: DiversifierDecision,
    tuning: SearchTuning,
    token: &'a CancelToken,
    multi_airport: Vec<Airport>,
    fare_selection_override: bool,
    passengers: u32,
}

impl<'a, S> Orchestrator<'a, S>
where
    S: PartitionServices,
{
    pub fn new(
        model: &'a ShoppingModel,
        arena: &'a FareArena,
        services: &'a S,
        decision: DiversifierDecision,
        token: &'a CancelToken,
    ) -> Self {
        Orchestrator {
            model,
            arena,
            services,
            decision,
            tuning: SearchTuning::default(),
            token,
            multi_airport: Vec::new(),
            fare_selection_override: false,
            passengers: 1,
        }
    }

    #[must_use]
    pub fn tuning(mut self, tuning: SearchTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Alternate airports eligible for multi-airport backfill.
    #[must_use]
    pub fn multi_airport(mut self, airports: Vec<Airport>) -> Self {
        self.multi_airport = airports;
        self
    }

    /// Marks the request as using a fare-selection override mode, which
    /// disables the parallel queue phase.
    #[must_use]
    pub fn fare_selection_override(mut self, enabled: bool) -> Self {
        self.fare_selection_override = enabled;
        self
    }

    #[must_use]
    pub fn passengers(mut self, count: u32) -> Self {
        self.passengers = count;
        self
    }

    /// Whether the online queues may run one worker thread each.
    fn can_use_parallel_queues(&self) -> bool {
        if self.fare_selection_override {
            return false;
        }
        !(self.model.is_alt_dates() && self.passengers <= 1)
    }

    /// Runs the whole search: queues, top-up passes, merge.
    ///
    /// # Errors
    ///
    /// - [`SearchError::InvalidDiversifierDecision`] before any queue runs.
    /// - [`SearchError::Partition`] when the request has no candidate
    ///   space at all.
    /// - [`SearchError::NoCombinableSolution`] when no partition produced
    ///   anything after all passes — the single fatal outcome.
    pub fn run(&self) -> SearchResult<SolutionSet> {
        self.decision.validate()?;

        let carriers: Vec<Carrier> = self.decision.online.iter().map(|t| t.carrier).collect();
        let counters = DiversityCounters::new(&carriers, self.model.date_pairs().len());

        let ctx = PassContext {
            model: self.model,
            arena: self.arena,
            tuning: &self.tuning,
            token: self.token,
            counters: &counters,
        };

        let mut queues: Vec<ShoppingQueue<'_>> = Vec::new();

        // ── Queue phase ────────────────────────────────────────────
        self.build_online_queues(&ctx, &mut queues)?;
        self.token.set_abort_on_hurry(true);
        run_online_queues(&mut queues, self.can_use_parallel_queues(), self.token);
        self.token.set_abort_on_hurry(false);

        let mut interline_empty = false;
        self.run_interline_queue(&ctx, &mut queues, &mut interline_empty)?;
        self.run_one_way_queue(&ctx, &mut queues)?;

        // ── Top-up passes ──────────────────────────────────────────
        if !self.token.is_aborted() {
            self.queue_postprocessing(&ctx, &mut queues, interline_empty)?;
        }

        // ── Merge ──────────────────────────────────────────────────
        self.merge(&ctx, queues)
    }

    fn build_queue<'q>(
        &'q self,
        ctx: &PassContext<'q>,
        kind: QueueKind,
        requested: u32,
        estimated: u32,
    ) -> ShoppingQueueBuilder<'q> {
        let mut builder = ShoppingQueueBuilder::new(
            ctx.model,
            ctx.arena,
            ctx.counters,
            ctx.token,
            ctx.tuning,
            kind,
            self.services.fare_supplier(kind),
            self.services.rule_probe(kind),
        )
        .requested(requested)
        .estimated_requested(estimated)
        .custom_quota(self.decision.custom_requested);

        if self.model.is_alt_dates() {
            builder = builder.date_pair_needs(vec![
                self.decision.per_date_pair_options;
                self.model.date_pairs().len()
            ]);
        }
        builder
    }

    fn build_online_queues<'q>(
        &'q self,
        ctx: &PassContext<'q>,
        queues: &mut Vec<ShoppingQueue<'q>>,
    ) -> SearchResult<()> {
        // When only one carrier partition exists and no interline share
        // is owed, long connections have nowhere else to go.
        let allow_long_connect =
            self.decision.interline_options == 0 && self.decision.online.len() == 1;

        let estimate_per_option = self.estimate_share_per_option();

        for target in &self.decision.online {
            if target.options == 0 {
                continue;
            }
            let estimated = match estimate_per_option {
                Some(per_option) => per_option.saturating_mul(target.options),
                None => self.decision.estimated_requested,
            };

            let mut builder = self.build_queue(
                ctx,
                QueueKind::Online(target.carrier),
                target.options,
                estimated,
            );
            if allow_long_connect {
                builder = builder.allow_long_connect_online();
            }
            queues.push(builder.build()?);
        }
        Ok(())
    }

    /// Per-option estimate share when the request adjustment percentage
    /// is in play.
    fn estimate_share_per_option(&self) -> Option<u32> {
        if self.decision.estimated_requested == 0
            || self.tuning.options_request_adjust_percent == 100
        {
            return None;
        }
        let total_options = self.decision.total_online() + self.decision.interline_options;
        if total_options == 0 {
            return None;
        }
        let adjusted = apply_percent(
            self.decision.estimated_requested,
            self.tuning.options_request_adjust_percent,
        );
        Some(adjusted / total_options)
    }

    fn run_interline_queue<'q>(
        &'q self,
        ctx: &PassContext<'q>,
        queues: &mut Vec<ShoppingQueue<'q>>,
        interline_empty: &mut bool,
    ) -> SearchResult<()> {
        if self.decision.interline_options == 0 {
            return Ok(());
        }

        let estimated = match self.estimate_share_per_option() {
            Some(per_option) => per_option.saturating_mul(self.decision.interline_options),
            None => self.decision.estimated_requested,
        };
        let requested = if self.model.is_alt_dates() {
            self.decision.interline_options * self.model.date_pairs().len() as u32
        } else {
            self.decision.interline_options
        };

        let mut queue = self
            .build_queue(ctx, QueueKind::Interline, requested, estimated)
            .build()?;

        // The online phase has joined; its solutions are off-limits here.
        let mut foreign = rustc_hash::FxHashSet::default();
        for online in queues.iter() {
            for (combination, _) in online.flight_matrix().iter() {
                foreign.insert(combination.clone());
            }
        }
        queue.set_foreign_solutions(foreign);

        if !self.token.must_hurry() {
            queue.run();
            *interline_empty = queue.flight_matrix().is_empty();
        }
        queues.push(queue);
        Ok(())
    }

    fn run_one_way_queue<'q>(
        &'q self,
        ctx: &PassContext<'q>,
        queues: &mut Vec<ShoppingQueue<'q>>,
    ) -> SearchResult<()> {
        if self.decision.one_way_options == 0 {
            return Ok(());
        }

        let mut builder =
            self.build_queue(ctx, QueueKind::OneWayFares, self.decision.one_way_options, 0);
        if let Some(limit) = self.decision.fare_repeat_limit {
            builder = builder.fare_repeat_limit(limit);
        }
        let mut queue = builder.build()?;

        if !self.token.must_hurry() {
            queue.run();
        }
        queues.push(queue);
        Ok(())
    }

    // ─── Top-up passes ──────────────────────────────────────────────

    fn queue_postprocessing<'q>(
        &'q self,
        ctx: &PassContext<'q>,
        queues: &mut Vec<ShoppingQueue<'q>>,
        interline_empty: bool,
    ) -> SearchResult<()> {
        if queues.is_empty() {
            return Err(SearchError::NoCombinableSolution);
        }

        // ── Analyze queue status ───────────────────────────────────
        let mut solutions_found: u32 = queues.iter().map(|q| q.flight_matrix().len() as u32).sum();
        let mut some_queue_met_target = false;
        let mut some_online_empty = false;
        let mut met_target_queues = 0usize;

        for queue in queues.iter_mut() {
            if queue.flight_matrix().is_empty() {
                queue.set_create_more(false);
                if !queue.is_interline() {
                    some_online_empty = true;
                }
            }
            if queue.requested() <= queue.flight_matrix().len() as u32 {
                some_queue_met_target = true;
                met_target_queues += 1;
            }
        }

        let shortfall = self
            .decision
            .total_requested
            .saturating_sub(solutions_found);
        let per_queue = per_bucket_share(shortfall, met_target_queues);
        debug!(solutions_found, shortfall, "queue post-processing starts");

        // ── Pass 1: resume queues that met their previous request ──
        if !self.model.is_alt_dates() {
            for queue in queues.iter_mut().rev() {
                if self.token.must_hurry() || solutions_found >= self.decision.total_requested {
                    break;
                }
                if queue.requested() <= queue.flight_matrix().len() as u32 {
                    let before = queue.flight_matrix().len() as u32;
                    queue.get_additional_solutions(per_queue);
                    solutions_found += queue.flight_matrix().len() as u32 - before;
                }
            }
        }

        // ── Pass 2: fare-less fallbacks ────────────────────────────
        if solutions_found == 0 {
            for queue in queues.iter_mut() {
                if self.decision.estimated_requested > 0 {
                    let inflated = queue.requested().saturating_add(
                        apply_percent(queue.requested(), ctx.tuning.additional_solution_percent)
                            .max(1),
                    );
                    queue.set_requested(inflated);
                }
                queue.generate_solutions_with_no_fares(Money::FALLBACK, false);
                solutions_found += queue.flight_matrix().len() as u32;
            }
        } else if some_online_empty || interline_empty {
            for queue in queues.iter_mut() {
                if !queue.flight_matrix().is_empty() {
                    continue;
                }
                if queue.is_interline() {
                    queue.generate_solutions_with_no_fares(Money::FALLBACK, false);
                } else {
                    queue.generate_connecting_solutions_with_no_fares(Money::FALLBACK);
                    // Connection preferences rarely cover complex trips.
                    if self.model.num_searchable_legs() > 3 {
                        queue.set_requested(queue.flight_matrix().len() as u32 + 1);
                        queue.generate_solutions_with_no_fares(Money::FALLBACK, false);
                    }
                }
            }
        }

        // ── Pass 3: estimate inflation ─────────────────────────────
        if !self.model.is_alt_dates() && self.decision.estimated_requested > 0 {
            self.estimate_top_up(ctx, queues, some_queue_met_target, interline_empty);
        }
        // Clean up the per-queue locking flags before the later passes.
        for queue in queues.iter_mut() {
            queue.set_create_more(true);
        }

        // ── Pass 4: non-stop fallback for queues lacking one ───────
        for queue in queues.iter_mut() {
            if self.token.must_hurry() {
                break;
            }
            if queue.found_nonstop_option() {
                continue;
            }
            queue.set_requested(
                queue.flight_matrix().len() as u32 + ctx.tuning.max_direct_flight_only,
            );
            queue.generate_solutions_with_no_fares(Money::FALLBACK, true);
        }

        // ── Pass 6: same-level backfill ────────────────────────────
        for queue in queues.iter_mut() {
            if self.token.must_hurry() {
                break;
            }
            queue.same_level_backfill();
        }

        // ── Pass 7: search beyond for connection-point diversity ──
        if !self.model.is_alt_dates() {
            for queue in queues.iter_mut() {
                if self.token.must_hurry() {
                    break;
                }
                if queue.is_interline() {
                    continue;
                }
                queue.drive_search_beyond();
            }
        }

        // ── Pass 8: collaborators ──────────────────────────────────
        if !self.multi_airport.is_empty() {
            let agent = MultiAirportAgent::new(
                self.multi_airport.clone(),
                ctx.tuning.estimates_per_iteration,
            );
            agent.perform(self.model, queues, self.token);
        }
        if self.decision.custom_requested > 0 {
            let builder = CustomSolutionBuilder::new(self.decision.custom_requested);
            builder.top_up(queues, ctx.counters, self.token, ctx.tuning);
        }

        // Queues without a single online option fall back to online
        // connection trips.
        for queue in queues.iter_mut() {
            if self.token.must_hurry() {
                break;
            }
            if !queue.found_online_option() {
                queue.generate_connecting_solutions_with_no_fares(Money::FALLBACK);
            }
        }

        // ── Pass 5 (last, like the production flow): non-stop queue ─
        self.process_non_stop_queue(ctx, queues)?;

        Ok(())
    }

    /// The estimate-inflation loop: redistributes the estimate shortfall
    /// over queues that can still produce, alternating estimate
    /// generation with short resume drives.
    fn estimate_top_up(
        &self,
        ctx: &PassContext<'_>,
        queues: &mut [ShoppingQueue<'_>],
        some_queue_met_target: bool,
        interline_empty: bool,
    ) {
        let produced: u32 = queues
            .iter()
            .map(ShoppingQueue::effective_solutions)
            .sum();
        let mut wanted = i64::from(self.decision.estimated_requested) - i64::from(produced);
        let stop_at = i64::from(apply_percent(
            self.decision.estimated_requested,
            ctx.tuning.options_response_adjust_percent,
        ));

        let mut found_new = true;
        while wanted > 0 && found_new && !self.token.must_hurry() {
            found_new = false;

            for queue in queues.iter_mut() {
                if self.token.must_hurry() || wanted <= 0 {
                    break;
                }
                if !queue.create_more() {
                    continue;
                }

                let before = queue.effective_solutions();
                queue.set_collect_estimates(true);
                queue.set_min_family_size(ctx.tuning.family_size_for(queue.is_interline()));

                if interline_empty && !some_queue_met_target {
                    queue.set_collect_flight_only_estimates(true);
                    queue.get_additional_solutions(ctx.tuning.estimates_per_solution);
                    queue.set_collect_flight_only_estimates(false);
                } else {
                    queue.set_estimated_requested(
                        self.decision
                            .estimated_requested
                            .min(before.saturating_add(ctx.tuning.estimates_per_solution)),
                    );
                    queue.generate_estimated_solutions();
                    if queue.effective_solutions() == before
                        && !queue.get_additional_solutions(ctx.tuning.estimates_per_iteration)
                    {
                        queue.set_create_more(false);
                    }
                }

                let after = queue.effective_solutions();
                if after > before {
                    wanted -= i64::from(after - before);
                    found_new = true;
                }

                let produced_now = i64::from(self.decision.estimated_requested) - wanted;
                if produced_now >= stop_at {
                    return;
                }
            }
        }

        // Flight-only families when estimation still falls short.
        let mut flight_only_created = 0u32;
        found_new = true;
        while wanted > 0
            && found_new
            && flight_only_created < ctx.tuning.estimates_flight_only_family
            && !self.token.must_hurry()
        {
            found_new = false;
            for queue in queues.iter_mut() {
                if self.token.must_hurry() || wanted <= 0 {
                    break;
                }
                if !queue.create_more() {
                    continue;
                }

                let before = queue.effective_solutions();
                let before_flight = queue.flight_matrix().len() as u32;
                queue.set_requested(before_flight + ctx.tuning.estimates_per_iteration);
                queue.generate_solutions_with_no_fares(Money::FALLBACK, false);
                flight_only_created += queue.flight_matrix().len() as u32 - before_flight;

                if queue.flight_matrix().len() as u32 > before_flight {
                    queue.set_collect_flight_only_estimates(true);
                    queue.get_additional_solutions(ctx.tuning.estimates_per_solution);
                    queue.set_collect_flight_only_estimates(false);
                }

                let after = queue.effective_solutions();
                if after > before {
                    wanted -= i64::from(after - before);
                    found_new = true;
                } else {
                    queue.set_create_more(false);
                }
            }
        }
    }

    /// Pass 5: the dedicated non-stop queue plus direct-only fare-less
    /// backfill when the non-stop quota is not yet covered.
    fn process_non_stop_queue<'q>(
        &'q self,
        ctx: &PassContext<'q>,
        queues: &mut Vec<ShoppingQueue<'q>>,
    ) -> SearchResult<()> {
        if self.model.is_alt_dates() || self.decision.non_stop_requested == 0 {
            return Ok(());
        }

        let mut calculator = RequiredNonStopsCalculator::new(self.decision.non_stop_requested);
        calculator.count_already_generated(self.model, queues);
        let required = calculator.required_count();
        if required == 0 {
            return Ok(());
        }
        debug!(required, "additional non-stop queue");

        let mut queue = self
            .build_queue(ctx, QueueKind::NonStop, required, 0)
            .build()?;
        // The non-stop queue must not re-emit combinations other
        // partitions already own.
        let mut foreign = rustc_hash::FxHashSet::default();
        for existing in queues.iter() {
            for (combination, _) in existing.flight_matrix().iter() {
                foreign.insert(combination.clone());
            }
        }
        queue.set_foreign_solutions(foreign);

        if !self.token.must_hurry() {
            queue.run();
        }

        let produced = queue.flight_matrix().len() as u32;
        if produced < required && !self.token.must_hurry() {
            queue.set_requested(produced + ctx.tuning.max_direct_flight_only);
            queue.generate_solutions_with_no_fares(Money::FALLBACK, true);
        }

        queues.push(queue);
        Ok(())
    }

    // ─── Merge ──────────────────────────────────────────────────────

    fn merge(
        &self,
        ctx: &PassContext<'_>,
        mut queues: Vec<ShoppingQueue<'_>>,
    ) -> SearchResult<SolutionSet> {
        let mut flight = FlightMatrix::new();
        let mut estimates = EstimateMatrix::new();
        let mut statistics = Vec::with_capacity(queues.len());

        for queue in queues.iter_mut() {
            if let Some(error) = queue.take_error() {
                // A partition failure degrades to that partition's
                // absence; the request fails only if nothing is left.
                warn!(partition = %queue.kind().label(), %error, "partition failed");
            }
            queue.remove_bad_estimates();
            queue.remove_high_priced_date_pairs();
            queue.group_mother();
            queue.make_option_higher_priority();

            statistics.push((queue.kind().label(), queue.statistics()));
            let (queue_flight, queue_estimates) = queue.take_results();
            flight.absorb(queue_flight);
            estimates.absorb(queue_estimates);
        }

        reconcile_duplicates(&mut flight, &mut estimates, self.arena);

        if !self.model.is_alt_dates() && self.decision.estimated_requested > 0 {
            split_inconsistent_families(self.model, &mut flight, &mut estimates);
        }

        if self.model.is_alt_dates() {
            self.fill_missing_date_pairs(ctx, &mut flight);
        }

        if flight.is_empty() {
            return Err(SearchError::NoCombinableSolution);
        }

        // When the merged result fits the request, everything should be
        // priced for real: promote the estimates into the flight matrix.
        if !self.model.is_alt_dates()
            && (flight.len() + estimates.len()) as u32 <= self.decision.total_requested
        {
            let promoted: Vec<_> = estimates
                .iter()
                .map(|(c, e)| (c.clone(), e.fare))
                .collect();
            for (combination, fare) in promoted {
                estimates.remove(&combination);
                flight.insert(combination, SolutionEntry::priced(fare));
            }
        }

        info!(
            solutions = flight.len(),
            estimates = estimates.len(),
            "search merged"
        );

        Ok(SolutionSet {
            flight,
            estimates,
            counters: ctx.counters.snapshot(),
            statistics,
        })
    }

    /// Alternate dates: date pairs with no solution at all are filled
    /// with fare-less placeholders so every requested pair is
    /// represented.
    fn fill_missing_date_pairs(&self, ctx: &PassContext<'_>, flight: &mut FlightMatrix) {
        let num_pairs = self.model.date_pairs().len();
        let mut covered = vec![false; num_pairs];
        for (combination, _) in flight.iter() {
            if let Some(pair) = self.model.date_pair_of(combination) {
                if let Some(slot) = covered.get_mut(pair.get()) {
                    *slot = true;
                }
            }
        }
        if covered.iter().all(|&c| c) {
            return;
        }

        let Some(index) = CombinationIndex::new(&self.model.dimensions()) else {
            return;
        };
        let mut fallback = FareCombination::fallback(Money::FALLBACK);
        fallback.set_source("ALTDATE-FOS");
        let fallback_id = self.arena.insert(fallback);

        let budget = ctx.tuning.max_failed_cells_flight_only as usize;
        for position in 0..index.len().min(budget) {
            if covered.iter().all(|&c| c) {
                break;
            }
            let combination = index.decode(position);
            let Some(pair) = self.model.date_pair_of(&combination) else {
                continue;
            };
            if covered[pair.get()]
                || flight.contains(&combination)
                || !self.model.cabin_valid(&combination)
                || !self.model.connection_times_ok(&combination)
            {
                continue;
            }
            flight.insert(combination, SolutionEntry::priced(fallback_id));
            covered[pair.get()] = true;
        }
    }
}

/// Context shared by the pass helpers.
struct PassContext<'q> {
    model: &'q ShoppingModel,
    arena: &'q FareArena,
    tuning: &'q SearchTuning,
    token: &'q CancelToken,
    counters: &'q DiversityCounters,
}

/// Runs the online queues, one worker thread each when allowed; the last
/// queue always runs on the calling thread.
fn run_online_queues(queues: &mut [ShoppingQueue<'_>], parallel: bool, token: &CancelToken) {
    let Some((last, rest)) = queues.split_last_mut() else {
        return;
    };

    if parallel {
        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(rest.len());
            for queue in rest.iter_mut() {
                handles.push(scope.spawn(move || queue.run()));
            }
            last.run();
            for handle in handles {
                handle.join().expect("online queue thread panicked");
            }
        });
    } else {
        for queue in rest.iter_mut() {
            if token.is_aborted() {
                return;
            }
            queue.run();
        }
        if !token.is_aborted() {
            last.run();
        }
    }
}
