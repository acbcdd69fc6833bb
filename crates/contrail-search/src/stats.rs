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

use serde::Serialize;
use std::time::Duration;

/// Statistics of one queue run, reported alongside its matrices.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct QueueStatistics {
    /// Fare combinations pulled from the pricing layer.
    pub fare_combinations_tried: u64,
    /// Candidate combinations examined across all fares.
    pub candidates_tried: u64,
    /// Accepted solutions in the flight matrix.
    pub solutions_found: u64,
    /// Estimate-matrix children filed.
    pub estimates_found: u64,
    /// Wall-clock duration of the run.
    #[serde(skip)]
    pub duration: Duration,
}

impl std::fmt::Display for QueueStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fares: {}, candidates: {}, solutions: {}, estimates: {}, duration: {:?}",
            self.fare_combinations_tried,
            self.candidates_tried,
            self.solutions_found,
            self.estimates_found,
            self.duration
        )
    }
}

/// Builder for [`QueueStatistics`].
#[derive(Debug, Clone, Default)]
pub struct QueueStatisticsBuilder {
    stats: QueueStatistics,
}

impl QueueStatisticsBuilder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn fare_combinations_tried(mut self, count: u64) -> Self {
        self.stats.fare_combinations_tried = count;
        self
    }

    #[inline]
    #[must_use]
    pub fn candidates_tried(mut self, count: u64) -> Self {
        self.stats.candidates_tried = count;
        self
    }

    #[inline]
    #[must_use]
    pub fn solutions_found(mut self, count: u64) -> Self {
        self.stats.solutions_found = count;
        self
    }

    #[inline]
    #[must_use]
    pub fn estimates_found(mut self, count: u64) -> Self {
        self.stats.estimates_found = count;
        self
    }

    #[inline]
    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.stats.duration = duration;
        self
    }

    #[inline]
    pub fn build(self) -> QueueStatistics {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let stats = QueueStatisticsBuilder::new()
            .fare_combinations_tried(4)
            .candidates_tried(40)
            .solutions_found(3)
            .estimates_found(9)
            .duration(Duration::from_millis(12))
            .build();

        assert_eq!(stats.fare_combinations_tried, 4);
        assert_eq!(stats.candidates_tried, 40);
        assert_eq!(stats.solutions_found, 3);
        assert_eq!(stats.estimates_found, 9);
    }

    #[test]
    fn test_display_mentions_counts() {
        let stats = QueueStatisticsBuilder::new().solutions_found(7).build();
        assert!(format!("{stats}").contains("solutions: 7"));
    }
}
