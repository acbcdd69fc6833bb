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

//! # External Collaborator Contracts
//!
//! The generator consumes three narrow interfaces. Fare/rule semantics,
//! tax law and the pricing internals live entirely behind them; the
//! engine only sees the documented outcomes.

use contrail_model::{
    combination::Combination,
    fare::FareCombination,
    index::DatePairId,
    money::Money,
};

/// Outcome of the cheap first validation pass over one flight bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The bit is proven compatible.
    Pass,
    /// The bit is proven incompatible; terminal.
    Fail,
    /// The cheap pass could not resolve the bit; a full check is needed.
    Skip,
}

/// The external fare/rule validation service.
///
/// `quick_check` is the inexpensive pre-check (global direction, routing
/// envelope); `full_check` is the expensive rule and booking-code
/// validation, invoked lazily only when a combination is about to be
/// emitted. Both must be deterministic per `(fare, combination,
/// date_pair)` — results are memoized and never re-queried.
pub trait FareRuleProbe {
    fn quick_check(
        &self,
        fare: &FareCombination,
        combination: &Combination,
        date_pair: Option<DatePairId>,
    ) -> ProbeOutcome;

    fn full_check(
        &self,
        fare: &FareCombination,
        combination: &Combination,
        date_pair: Option<DatePairId>,
    ) -> bool;
}

/// A partition-wide pricing failure. Candidate-level pricing refusals
/// are expressed by simply not producing a fare; this error is reserved
/// for the whole partition becoming unpriceable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct SupplyError(pub String);

/// The external pricing machinery, seen as a stream of priced fare
/// combinations in non-decreasing total-price order.
pub trait FareSupplier {
    /// Produces the next cheapest fare combination, priced at or above
    /// `last_price` (or the very cheapest when `None`). `Ok(None)` means
    /// the partition's fare space is exhausted; `Err` fails the whole
    /// partition.
    fn next_fare(&mut self, last_price: Option<Money>)
        -> Result<Option<FareCombination>, SupplyError>;

    /// Produces another, distinct fare combination priced exactly at
    /// `price`, if the pricing layer has one. Used by the same-level
    /// backfill pass; the default says there is none.
    fn repeat_at(&mut self, _price: Money) -> Option<FareCombination> {
        None
    }
}

/// Optional write-only diagnostic sink; absence must not change behavior.
pub trait DiagnosticSink: Send {
    fn append(&mut self, line: &str);
}

/// The default sink: discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDiagnostics;

impl DiagnosticSink for NoopDiagnostics {
    #[inline]
    fn append(&mut self, _line: &str) {}
}

/// A sink collecting lines in memory; used by tests and by callers that
/// render diagnostics downstream.
#[derive(Debug, Clone, Default)]
pub struct BufferedDiagnostics {
    lines: Vec<String>,
}

impl BufferedDiagnostics {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl DiagnosticSink for BufferedDiagnostics {
    fn append(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_sink_records_lines() {
        let mut sink = BufferedDiagnostics::new();
        sink.append("queue ONLINE-AA: 3 results requested");
        assert_eq!(sink.lines().len(), 1);
        assert!(sink.lines()[0].contains("ONLINE-AA"));
    }

    #[test]
    fn test_noop_sink_is_silent() {
        let mut sink = NoopDiagnostics;
        sink.append("dropped");
    }
}
