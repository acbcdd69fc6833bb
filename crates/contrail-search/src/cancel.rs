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

//! # Cancellation Token
//!
//! The transaction-scoped hurry/abort signal, polled cooperatively at
//! generator-chosen safe points (after the candidate in flight completes
//! validation) and between orchestrator passes.
//!
//! Two tiers:
//!
//! - **Hurry** (soft deadline): stop admitting new candidates, finish the
//!   item in flight, return whatever exists. Never an error.
//! - **Abort** (hard stop from an external supervisor): stop issuing new
//!   work immediately and return partial results if any exist.
//!
//! During the parallel queue phase the orchestrator flips
//! `abort_on_hurry`, so a slow queue observes the soft deadline as an
//! abort and cannot hold up the whole transaction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Shared hurry/abort state, passed by reference into every queue and
/// orchestrator call.
#[derive(Debug, Default)]
pub struct CancelToken {
    hurry: AtomicBool,
    abort: AtomicBool,
    abort_on_hurry: AtomicBool,
    soft_deadline: Option<Instant>,
    hard_deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that never fires on its own; it can still be signalled.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// A token whose hurry condition arms itself at `soft_deadline`.
    #[inline]
    pub fn with_soft_deadline(soft_deadline: Instant) -> Self {
        CancelToken {
            soft_deadline: Some(soft_deadline),
            ..Self::default()
        }
    }

    /// A token with both a soft (hurry) and a hard (abort) deadline.
    #[inline]
    pub fn with_deadlines(soft_deadline: Instant, hard_deadline: Instant) -> Self {
        CancelToken {
            soft_deadline: Some(soft_deadline),
            hard_deadline: Some(hard_deadline),
            ..Self::default()
        }
    }

    /// Signals the soft "finish up" condition.
    #[inline]
    pub fn signal_hurry(&self) {
        self.hurry.store(true, Ordering::Relaxed);
    }

    /// Signals the hard abort.
    #[inline]
    pub fn signal_abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    /// While set, [`CancelToken::is_aborted`] also reports the hurry
    /// condition, so queues running behind the soft deadline stand down.
    #[inline]
    pub fn set_abort_on_hurry(&self, enabled: bool) {
        self.abort_on_hurry.store(enabled, Ordering::Relaxed);
    }

    /// Whether the soft deadline has passed or hurry was signalled.
    pub fn must_hurry(&self) -> bool {
        if self.hurry.load(Ordering::Relaxed) {
            return true;
        }
        if let Some(deadline) = self.soft_deadline {
            if Instant::now() >= deadline {
                // Latch, so later polls skip the clock read.
                self.hurry.store(true, Ordering::Relaxed);
                return true;
            }
        }
        false
    }

    /// Whether the search must stop issuing new work entirely.
    pub fn is_aborted(&self) -> bool {
        if self.abort.load(Ordering::Relaxed) {
            return true;
        }
        if let Some(deadline) = self.hard_deadline {
            if Instant::now() >= deadline {
                self.abort.store(true, Ordering::Relaxed);
                return true;
            }
        }
        self.abort_on_hurry.load(Ordering::Relaxed) && self.must_hurry()
    }
}

/// A step-filtered poller for hot loops.
///
/// Reading the clock on every candidate is wasteful; the pacer only
/// consults the token every `2^k` steps via a bitmask, the same trick the
/// per-step time budget check uses elsewhere in the workspace.
#[derive(Debug, Clone)]
pub struct StepPacer {
    steps: u64,
    mask: u64,
}

impl StepPacer {
    /// Default: poll every 1,024 steps.
    const DEFAULT_MASK: u64 = 0x3FF;

    #[inline]
    pub fn new() -> Self {
        StepPacer {
            steps: 0,
            mask: Self::DEFAULT_MASK,
        }
    }

    /// A pacer polling every `interval` steps; `interval` must be a power
    /// of two.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero or not a power of two.
    pub fn with_interval(interval: u64) -> Self {
        assert!(
            interval.is_power_of_two(),
            "called `StepPacer::with_interval` with a non-power-of-two interval: {interval}"
        );
        StepPacer {
            steps: 0,
            mask: interval - 1,
        }
    }

    /// Counts a step; returns `true` when the token reports hurry at a
    /// polling step.
    #[inline]
    pub fn hurried(&mut self, token: &CancelToken) -> bool {
        self.steps = self.steps.wrapping_add(1);
        (self.steps & self.mask) == 0 && token.must_hurry()
    }
}

impl Default for StepPacer {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_token_starts_quiet() {
        let token = CancelToken::new();
        assert!(!token.must_hurry());
        assert!(!token.is_aborted());
    }

    #[test]
    fn test_signals_latch() {
        let token = CancelToken::new();
        token.signal_hurry();
        assert!(token.must_hurry());
        assert!(!token.is_aborted());

        token.signal_abort();
        assert!(token.is_aborted());
    }

    #[test]
    fn test_expired_soft_deadline_reports_hurry() {
        let token = CancelToken::with_soft_deadline(Instant::now() - Duration::from_millis(1));
        assert!(token.must_hurry());
        assert!(!token.is_aborted());
    }

    #[test]
    fn test_abort_on_hurry_escalates() {
        let token = CancelToken::new();
        token.signal_hurry();
        assert!(!token.is_aborted());

        token.set_abort_on_hurry(true);
        assert!(token.is_aborted());

        token.set_abort_on_hurry(false);
        assert!(!token.is_aborted());
    }

    #[test]
    fn test_pacer_skips_most_polls() {
        let token = CancelToken::new();
        token.signal_hurry();

        let mut pacer = StepPacer::with_interval(4);
        // Only every fourth step consults the token.
        assert!(!pacer.hurried(&token));
        assert!(!pacer.hurried(&token));
        assert!(!pacer.hurried(&token));
        assert!(pacer.hurried(&token));
    }

    #[test]
    #[should_panic(expected = "non-power-of-two")]
    fn test_pacer_rejects_bad_interval() {
        let _ = StepPacer::with_interval(3);
    }
}
