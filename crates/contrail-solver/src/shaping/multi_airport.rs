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

//! Multi-airport backfill: when a configured alternate airport appears
//! in the request's scheduling options but not in any produced
//! solution, ask the queues for more output so the alternate airport is
//! represented.

use contrail_model::{carrier::Airport, model::ShoppingModel, money::Money};
use contrail_queue::generator::ShoppingQueue;
use contrail_search::cancel::CancelToken;
use tracing::debug;

/// The alternate-airport backfill agent, created from a configured
/// airport list.
#[derive(Debug, Clone)]
pub struct MultiAirportAgent {
    airports: Vec<Airport>,
    extra_per_queue: u32,
}

impl MultiAirportAgent {
    pub fn new(airports: Vec<Airport>, extra_per_queue: u32) -> Self {
        MultiAirportAgent {
            airports,
            extra_per_queue,
        }
    }

    /// Airports from the configured list actually served by the model.
    fn relevant_airports(&self, model: &ShoppingModel) -> Vec<Airport> {
        self.airports
            .iter()
            .copied()
            .filter(|airport| {
                model.legs().iter().any(|leg| {
                    leg.sops().iter().any(|sop| {
                        sop.segments()
                            .iter()
                            .any(|s| s.origin == *airport || s.destination == *airport)
                    })
                })
            })
            .collect()
    }

    fn airport_represented(
        model: &ShoppingModel,
        queue: &ShoppingQueue<'_>,
        airport: Airport,
    ) -> bool {
        queue.flight_matrix().iter().any(|(combination, _)| {
            model.selected_sops(combination).any(|sop| {
                sop.segments()
                    .iter()
                    .any(|s| s.origin == airport || s.destination == airport)
            })
        })
    }

    /// Requests additional output until each relevant alternate airport
    /// is represented in every queue's result, falling back to
    /// flight-only solutions.
    pub fn perform(
        &self,
        model: &ShoppingModel,
        queues: &mut [ShoppingQueue<'_>],
        token: &CancelToken,
    ) {
        let airports = self.relevant_airports(model);
        if airports.is_empty() {
            return;
        }
        debug!(airports = airports.len(), "multi-airport backfill");

        for airport in airports {
            for queue in queues.iter_mut() {
                if token.must_hurry() {
                    return;
                }
                if Self::airport_represented(model, queue, airport) {
                    continue;
                }
                if !queue.get_additional_solutions(self.extra_per_queue)
                    || !Self::airport_represented(model, queue, airport)
                {
                    queue.generate_solutions_with_no_fares(Money::FALLBACK, false);
                }
            }
        }
    }
}
