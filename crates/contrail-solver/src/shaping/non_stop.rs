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

//! Required-non-stop calculation: how many non-stop solutions the
//! request is still owed, overall and per carrier.

use contrail_model::{carrier::Carrier, model::ShoppingModel};
use contrail_queue::generator::ShoppingQueue;
use rustc_hash::FxHashMap;

/// Computes the outstanding non-stop requirement over produced results.
#[derive(Debug, Clone, Default)]
pub struct RequiredNonStopsCalculator {
    requested: u32,
    already_generated: u32,
    per_carrier: FxHashMap<Carrier, u32>,
}

impl RequiredNonStopsCalculator {
    pub fn new(requested: u32) -> Self {
        RequiredNonStopsCalculator {
            requested,
            ..Self::default()
        }
    }

    /// Counts the non-stop solutions already present in the queues'
    /// matrices, overall and per online carrier.
    pub fn count_already_generated(
        &mut self,
        model: &ShoppingModel,
        queues: &[ShoppingQueue<'_>],
    ) {
        self.already_generated = 0;
        self.per_carrier.clear();

        for queue in queues {
            for (combination, _) in queue.flight_matrix().iter() {
                if !model.is_nonstop(combination) {
                    continue;
                }
                self.already_generated += 1;
                if let Some(carrier) = model.online_carrier(combination) {
                    *self.per_carrier.entry(carrier).or_insert(0) += 1;
                }
            }
        }
    }

    /// The outstanding overall requirement.
    #[inline]
    pub fn required_count(&self) -> u32 {
        self.requested.saturating_sub(self.already_generated)
    }

    /// Splits `shortfall` across carriers, favoring carriers that have
    /// produced no non-stop solution yet.
    pub fn required_per_carrier(
        &self,
        carriers: &[Carrier],
        shortfall: u32,
    ) -> Vec<(Carrier, u32)> {
        if carriers.is_empty() || shortfall == 0 {
            return Vec::new();
        }

        let mut uncovered: Vec<Carrier> = carriers
            .iter()
            .copied()
            .filter(|c| self.per_carrier.get(c).copied().unwrap_or(0) == 0)
            .collect();
        if uncovered.is_empty() {
            uncovered = carriers.to_vec();
        }

        let share = contrail_core::num::per_bucket_share(shortfall, uncovered.len());
        uncovered.into_iter().map(|c| (c, share)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_count_saturates() {
        let mut calculator = RequiredNonStopsCalculator::new(2);
        calculator.already_generated = 5;
        assert_eq!(calculator.required_count(), 0);
    }

    #[test]
    fn test_per_carrier_favors_uncovered() {
        let aa = Carrier::new("AA");
        let ua = Carrier::new("UA");
        let mut calculator = RequiredNonStopsCalculator::new(4);
        calculator.per_carrier.insert(aa, 2);

        let split = calculator.required_per_carrier(&[aa, ua], 4);
        assert_eq!(split, vec![(ua, 4)]);
    }

    #[test]
    fn test_per_carrier_falls_back_to_everyone() {
        let aa = Carrier::new("AA");
        let ua = Carrier::new("UA");
        let mut calculator = RequiredNonStopsCalculator::new(4);
        calculator.per_carrier.insert(aa, 1);
        calculator.per_carrier.insert(ua, 1);

        let split = calculator.required_per_carrier(&[aa, ua], 4);
        assert_eq!(split.len(), 2);
        assert!(split.iter().all(|(_, n)| *n == 2));
    }
}
