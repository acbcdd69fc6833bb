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

//! # Flight Bitmap
//!
//! The tri-state memo of one fare combination's validation outcomes.
//! Each bit is addressed by the dense dimensional position of a
//! combination; three parallel bit planes (`tested`, `valid`, `skipped`)
//! give four states — untested, pass, fail, skip — in three bits per
//! cell, with failure reasons kept in a side map only for the (rare)
//! failed bits.
//!
//! Pass and Fail are terminal: once recorded they are never overwritten,
//! and a recorded Fail never triggers a retry.

use fixedbitset::FixedBitSet;
use rustc_hash::FxHashMap;

/// Validation status of one (fare, combination) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitStatus {
    /// Nothing recorded for this bit yet.
    Untested,
    /// Proven compatible; terminal.
    Pass,
    /// Proven incompatible; terminal, never retried.
    Fail(FailReason),
    /// The cheap pass could not resolve the bit; a full check is still
    /// outstanding.
    Skip,
    /// Alternate dates only: the bit is undetermined for this date pair
    /// while already failed for another.
    Deferred,
}

impl BitStatus {
    /// Whether this status is terminal (will never change).
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, BitStatus::Pass | BitStatus::Fail(_))
    }
}

/// Why a flight bit failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailReason {
    /// Routing or global-direction pre-check failed.
    Routing,
    /// Booking-code validation failed.
    BookingCode,
    /// Full rule validation failed.
    Rules,
    /// Pricing refused the combination.
    Pricing,
}

impl std::fmt::Display for FailReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailReason::Routing => write!(f, "routing"),
            FailReason::BookingCode => write!(f, "booking code"),
            FailReason::Rules => write!(f, "rules"),
            FailReason::Pricing => write!(f, "pricing"),
        }
    }
}

/// The per-fare bit planes over one combination space.
#[derive(Debug, Clone)]
pub struct FlightBitmap {
    tested: FixedBitSet,
    valid: FixedBitSet,
    skipped: FixedBitSet,
    failures: FxHashMap<usize, FailReason>,
}

impl FlightBitmap {
    /// Creates an all-untested bitmap over `len` cells.
    pub fn new(len: usize) -> Self {
        FlightBitmap {
            tested: FixedBitSet::with_capacity(len),
            valid: FixedBitSet::with_capacity(len),
            skipped: FixedBitSet::with_capacity(len),
            failures: FxHashMap::default(),
        }
    }

    /// Number of addressable cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.tested.len()
    }

    /// Whether the bitmap has no cells.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tested.is_empty()
    }

    /// Current status of `bit`.
    pub fn status(&self, bit: usize) -> BitStatus {
        debug_assert!(bit < self.len());

        if !self.tested.contains(bit) {
            return BitStatus::Untested;
        }
        if self.skipped.contains(bit) {
            return BitStatus::Skip;
        }
        if self.valid.contains(bit) {
            return BitStatus::Pass;
        }
        BitStatus::Fail(
            self.failures
                .get(&bit)
                .copied()
                .unwrap_or(FailReason::Rules),
        )
    }

    /// Records a terminal pass.
    ///
    /// # Panics
    ///
    /// In debug builds, panics when overwriting a terminal status.
    pub fn record_pass(&mut self, bit: usize) {
        debug_assert!(
            !self.status(bit).is_terminal(),
            "called `FlightBitmap::record_pass` on a terminal bit {bit}"
        );

        self.tested.insert(bit);
        self.valid.insert(bit);
        self.skipped.remove(bit);
    }

    /// Records a terminal failure.
    ///
    /// # Panics
    ///
    /// In debug builds, panics when overwriting a terminal status.
    pub fn record_fail(&mut self, bit: usize, reason: FailReason) {
        debug_assert!(
            !self.status(bit).is_terminal(),
            "called `FlightBitmap::record_fail` on a terminal bit {bit}"
        );

        self.tested.insert(bit);
        self.valid.remove(bit);
        self.skipped.remove(bit);
        self.failures.insert(bit, reason);
    }

    /// Marks the bit as skipped by the cheap pass; the full check is
    /// still outstanding.
    pub fn record_skip(&mut self, bit: usize) {
        debug_assert!(
            !self.status(bit).is_terminal(),
            "called `FlightBitmap::record_skip` on a terminal bit {bit}"
        );

        self.tested.insert(bit);
        self.skipped.insert(bit);
    }

    /// Whether any bit of this fare ever failed.
    #[inline]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Number of bits proven valid so far.
    #[inline]
    pub fn count_valid(&self) -> usize {
        self.valid.count_ones(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untested_by_default() {
        let bitmap = FlightBitmap::new(8);
        assert_eq!(bitmap.status(0), BitStatus::Untested);
        assert_eq!(bitmap.status(7), BitStatus::Untested);
    }

    #[test]
    fn test_pass_fail_skip_roundtrip() {
        let mut bitmap = FlightBitmap::new(4);
        bitmap.record_pass(0);
        bitmap.record_fail(1, FailReason::Routing);
        bitmap.record_skip(2);

        assert_eq!(bitmap.status(0), BitStatus::Pass);
        assert_eq!(bitmap.status(1), BitStatus::Fail(FailReason::Routing));
        assert_eq!(bitmap.status(2), BitStatus::Skip);
        assert_eq!(bitmap.status(3), BitStatus::Untested);
        assert_eq!(bitmap.count_valid(), 1);
        assert!(bitmap.has_failures());
    }

    #[test]
    fn test_skip_resolves_to_terminal() {
        let mut bitmap = FlightBitmap::new(2);
        bitmap.record_skip(0);
        bitmap.record_pass(0);
        assert_eq!(bitmap.status(0), BitStatus::Pass);

        bitmap.record_skip(1);
        bitmap.record_fail(1, FailReason::BookingCode);
        assert_eq!(bitmap.status(1), BitStatus::Fail(FailReason::BookingCode));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "terminal bit")]
    fn test_terminal_bits_are_frozen() {
        let mut bitmap = FlightBitmap::new(1);
        bitmap.record_pass(0);
        bitmap.record_fail(0, FailReason::Rules);
    }
}
