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

//! # Diversity Counters
//!
//! The per-request running counts of produced solutions by category.
//! Parallel online queues bump the same categories concurrently, so every
//! mutation is a single atomic increment or a guarded decrement — no
//! read-modify-write sequences. The key sets (carriers, date pairs) are
//! fixed at construction, which keeps lookups lock-free.

use contrail_model::{carrier::Carrier, index::DatePairId};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};

/// Shared atomic counts of produced solutions by diversity category.
#[derive(Debug)]
pub struct DiversityCounters {
    /// Sorted by carrier for binary-search lookup.
    online: Vec<(Carrier, AtomicU32)>,
    interline: AtomicU32,
    non_stop: AtomicU32,
    custom: AtomicU32,
    long_connect: AtomicU32,
    date_pairs: Vec<AtomicU32>,
}

impl DiversityCounters {
    /// Creates counters for the given carrier set and number of
    /// alternate-date pairs.
    pub fn new(carriers: &[Carrier], num_date_pairs: usize) -> Self {
        let mut sorted: Vec<Carrier> = carriers.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        DiversityCounters {
            online: sorted
                .into_iter()
                .map(|c| (c, AtomicU32::new(0)))
                .collect(),
            interline: AtomicU32::new(0),
            non_stop: AtomicU32::new(0),
            custom: AtomicU32::new(0),
            long_connect: AtomicU32::new(0),
            date_pairs: (0..num_date_pairs).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    fn online_slot(&self, carrier: Carrier) -> Option<&AtomicU32> {
        self.online
            .binary_search_by_key(&carrier, |(c, _)| *c)
            .ok()
            .map(|n| &self.online[n].1)
    }

    /// Records one online solution for `carrier`. Unknown carriers are
    /// counted as interline rather than dropped.
    pub fn record_online(&self, carrier: Carrier) {
        match self.online_slot(carrier) {
            Some(slot) => {
                slot.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.interline.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[inline]
    pub fn record_interline(&self) {
        self.interline.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_non_stop(&self) {
        self.non_stop.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_custom(&self) {
        self.custom.fetch_add(1, Ordering::Relaxed);
    }

    /// Backs out a custom count recorded for an insertion that was then
    /// rejected; saturates at zero.
    pub fn unrecord_custom(&self) {
        let _ = self
            .custom
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    #[inline]
    pub fn record_long_connect(&self) {
        self.long_connect.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_date_pair(&self, pair: DatePairId) {
        if let Some(slot) = self.date_pairs.get(pair.get()) {
            slot.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn online_count(&self, carrier: Carrier) -> u32 {
        self.online_slot(carrier)
            .map_or(0, |slot| slot.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn interline_count(&self) -> u32 {
        self.interline.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn non_stop_count(&self) -> u32 {
        self.non_stop.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn custom_count(&self) -> u32 {
        self.custom.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn long_connect_count(&self) -> u32 {
        self.long_connect.load(Ordering::Relaxed)
    }

    pub fn date_pair_count(&self, pair: DatePairId) -> u32 {
        self.date_pairs
            .get(pair.get())
            .map_or(0, |slot| slot.load(Ordering::Relaxed))
    }

    /// A point-in-time copy for downstream formatting.
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            online: self
                .online
                .iter()
                .map(|(c, v)| (c.as_str().to_string(), v.load(Ordering::Relaxed)))
                .collect(),
            interline: self.interline.load(Ordering::Relaxed),
            non_stop: self.non_stop.load(Ordering::Relaxed),
            custom: self.custom.load(Ordering::Relaxed),
            long_connect: self.long_connect.load(Ordering::Relaxed),
            date_pairs: self
                .date_pairs
                .iter()
                .map(|v| v.load(Ordering::Relaxed))
                .collect(),
        }
    }
}

/// A serializable point-in-time view of [`DiversityCounters`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    pub online: Vec<(String, u32)>,
    pub interline: u32,
    pub non_stop: u32,
    pub custom: u32,
    pub long_connect: u32,
    pub date_pairs: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_online_counts_per_carrier() {
        let counters = DiversityCounters::new(&[Carrier::new("AA"), Carrier::new("UA")], 0);
        counters.record_online(Carrier::new("AA"));
        counters.record_online(Carrier::new("AA"));
        counters.record_online(Carrier::new("UA"));

        assert_eq!(counters.online_count(Carrier::new("AA")), 2);
        assert_eq!(counters.online_count(Carrier::new("UA")), 1);
        assert_eq!(counters.online_count(Carrier::new("LH")), 0);
    }

    #[test]
    fn test_unknown_carrier_counts_as_interline() {
        let counters = DiversityCounters::new(&[Carrier::new("AA")], 0);
        counters.record_online(Carrier::new("ZZ"));
        assert_eq!(counters.interline_count(), 1);
    }

    #[test]
    fn test_custom_decrement_saturates() {
        let counters = DiversityCounters::new(&[], 0);
        counters.unrecord_custom();
        assert_eq!(counters.custom_count(), 0);

        counters.record_custom();
        counters.unrecord_custom();
        assert_eq!(counters.custom_count(), 0);
    }

    #[test]
    fn test_date_pair_counts() {
        let counters = DiversityCounters::new(&[], 2);
        counters.record_date_pair(DatePairId::new(1));
        counters.record_date_pair(DatePairId::new(1));
        // Out of range is ignored.
        counters.record_date_pair(DatePairId::new(9));

        assert_eq!(counters.date_pair_count(DatePairId::new(0)), 0);
        assert_eq!(counters.date_pair_count(DatePairId::new(1)), 2);
    }

    #[test]
    fn test_concurrent_increments() {
        let counters = DiversityCounters::new(&[Carrier::new("AA")], 0);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..1000 {
                        counters.record_online(Carrier::new("AA"));
                    }
                });
            }
        });
        assert_eq!(counters.online_count(Carrier::new("AA")), 4000);
    }

    #[test]
    fn test_snapshot() {
        let counters = DiversityCounters::new(&[Carrier::new("AA")], 1);
        counters.record_online(Carrier::new("AA"));
        counters.record_non_stop();

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.online, vec![("AA".to_string(), 1)]);
        assert_eq!(snapshot.non_stop, 1);
        assert_eq!(snapshot.date_pairs, vec![0]);
    }
}
