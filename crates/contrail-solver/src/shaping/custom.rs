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

//! Custom-solution backfill: three phases of decreasing quality, each
//! gated on the remaining custom-solution quota and the cancel token.

use contrail_model::money::Money;
use contrail_queue::{config::SearchTuning, generator::ShoppingQueue};
use contrail_search::{cancel::CancelToken, counters::DiversityCounters};
use tracing::debug;

/// Tops up custom solutions using the queues' public contract only.
#[derive(Debug, Clone, Copy)]
pub struct CustomSolutionBuilder {
    quota: u32,
}

impl CustomSolutionBuilder {
    #[inline]
    pub fn new(quota: u32) -> Self {
        CustomSolutionBuilder { quota }
    }

    fn satisfied(&self, counters: &DiversityCounters) -> bool {
        counters.custom_count() >= self.quota
    }

    /// Runs the three backfill phases: re-drive existing fare
    /// combinations under custom search, resume under-quota queues, then
    /// fill with custom flight-only solutions.
    pub fn top_up(
        &self,
        queues: &mut [ShoppingQueue<'_>],
        counters: &DiversityCounters,
        token: &CancelToken,
        tuning: &SearchTuning,
    ) {
        if self.quota == 0 || self.satisfied(counters) {
            return;
        }
        debug!(
            quota = self.quota,
            found = counters.custom_count(),
            "custom solution top-up"
        );

        for queue in queues.iter_mut() {
            if self.satisfied(counters) || token.must_hurry() {
                return;
            }
            queue.drive_custom_search();
        }

        for queue in queues.iter_mut() {
            if self.satisfied(counters) || token.must_hurry() {
                return;
            }
            queue.get_additional_solutions(tuning.estimates_per_iteration);
        }

        for queue in queues.iter_mut() {
            if self.satisfied(counters) || token.must_hurry() {
                return;
            }
            queue.generate_custom_solutions_with_no_fares(Money::FALLBACK);
        }
    }
}
