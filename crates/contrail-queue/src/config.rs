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

//! # Search Tuning
//!
//! Every numeric threshold of the engine — family-size minimums,
//! percentage adjustments for estimate counts, candidate budgets,
//! connection-point quotas — is business tuning, not an algorithmic
//! contract. They are all gathered here, deserializable from deployment
//! configuration, with defaults matching a conservative production
//! profile. Nothing in the engine hard-codes these numbers at a call
//! site.

use contrail_core::num::apply_percent_ceil;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchTuning {
    /// Minimum family size before a head is flagged as a bad estimate.
    pub min_family_size: u32,
    /// Interline override for `min_family_size`; `None` inherits it.
    pub min_family_size_interline: Option<u32>,

    /// Extra solutions asked from each queue per estimate top-up round.
    pub estimates_per_iteration: u32,
    /// Estimate children requested around each accepted solution.
    pub estimates_per_solution: u32,
    /// Cap on flight-only solutions created while chasing estimates.
    pub estimates_flight_only_family: u32,
    /// Percentage by which a queue's request is inflated when fare-less
    /// generation has to cover for an empty result.
    pub additional_solution_percent: u32,
    /// Percentage adjustment applied to the requested estimate total.
    pub options_request_adjust_percent: u32,
    /// Percentage of the requested estimate total that, once present,
    /// stops further top-up rounds.
    pub options_response_adjust_percent: u32,

    /// Give-up budget: fare combinations tried without any accepted
    /// combination.
    pub max_fare_paths: u32,
    /// Give-up budget once candidate combinations have also been tried.
    pub max_fare_paths_with_hits: u32,
    /// Consecutive failing candidate combinations per fare.
    pub max_combinations_per_fare: u32,
    /// Multiplier applied to `max_combinations_per_fare` for requests
    /// with five or more legs.
    pub multi_leg_combination_factor: u32,
    /// Consecutive structurally invalid cells tolerated by flight-only
    /// generation.
    pub max_failed_cells_flight_only: u32,
    /// Direct flight-only solutions generated by the non-stop backfill.
    pub max_direct_flight_only: u32,

    /// Percentage shrink of the candidate budgets under search-beyond.
    pub search_beyond_percent: u32,
    /// Candidate budget for one search-beyond drive.
    pub max_combinations_search_beyond: u32,
    /// Percentage shrink of the candidate budgets under custom search.
    pub custom_search_percent: u32,
    /// Candidate budget for one custom-search drive.
    pub max_combinations_custom: u32,
    /// Distinct connection-point sets a carrier queue should cover.
    pub connection_point_quota: u32,

    /// Percentage of an interline queue's quota served by real fare
    /// paths; the rest may be filled with flight-only solutions.
    pub interline_diversity_percent: u32,
    /// Of the flight-only remainder, the percentage that must be
    /// mirror-image connection trips.
    pub mirror_trip_percent: u32,

    /// Cap on solutions using long-connection options; `None` is
    /// unlimited.
    pub max_long_connect_solutions: Option<u32>,

    /// Alternate dates: entries priced beyond this percentage of the
    /// cheapest solution are pruned before merge.
    pub alt_date_price_jump_percent: u32,
}

impl Default for SearchTuning {
    fn default() -> Self {
        SearchTuning {
            min_family_size: 3,
            min_family_size_interline: None,
            estimates_per_iteration: 10,
            estimates_per_solution: 6,
            estimates_flight_only_family: 20,
            additional_solution_percent: 20,
            options_request_adjust_percent: 100,
            options_response_adjust_percent: 100,
            max_fare_paths: 800,
            max_fare_paths_with_hits: 300,
            max_combinations_per_fare: 400,
            multi_leg_combination_factor: 10,
            max_failed_cells_flight_only: 100_000,
            max_direct_flight_only: 2,
            search_beyond_percent: 50,
            max_combinations_search_beyond: 5,
            custom_search_percent: 50,
            max_combinations_custom: 5,
            connection_point_quota: 3,
            interline_diversity_percent: 100,
            mirror_trip_percent: 0,
            max_long_connect_solutions: None,
            alt_date_price_jump_percent: 300,
        }
    }
}

impl SearchTuning {
    /// Effective minimum family size for a queue.
    #[inline]
    pub fn family_size_for(&self, interline: bool) -> u32 {
        if interline {
            self.min_family_size_interline
                .unwrap_or(self.min_family_size)
        } else {
            self.min_family_size
        }
    }

    /// Fare-combination budget under search-beyond.
    #[inline]
    pub fn fare_paths_search_beyond(&self) -> u32 {
        apply_percent_ceil(self.max_fare_paths_with_hits, self.search_beyond_percent)
    }

    /// Fare-combination budget under custom search.
    #[inline]
    pub fn fare_paths_custom(&self) -> u32 {
        apply_percent_ceil(self.max_fare_paths_with_hits, self.custom_search_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let tuning = SearchTuning::default();
        assert!(tuning.min_family_size > 0);
        assert!(tuning.max_fare_paths >= tuning.max_fare_paths_with_hits);
        assert_eq!(tuning.family_size_for(false), tuning.min_family_size);
        assert_eq!(tuning.family_size_for(true), tuning.min_family_size);
    }

    #[test]
    fn test_interline_family_override() {
        let tuning = SearchTuning {
            min_family_size_interline: Some(5),
            ..Default::default()
        };
        assert_eq!(tuning.family_size_for(true), 5);
        assert_eq!(tuning.family_size_for(false), 3);
    }

    #[test]
    fn test_shrunk_budgets_round_up() {
        let tuning = SearchTuning {
            max_fare_paths_with_hits: 5,
            search_beyond_percent: 50,
            ..Default::default()
        };
        assert_eq!(tuning.fare_paths_search_beyond(), 3);
    }

    #[test]
    fn test_deserializes_partial_config() {
        let tuning: SearchTuning = serde_json::from_str(r#"{"min_family_size": 7}"#)
            .expect("partial tuning config must deserialize");
        assert_eq!(tuning.min_family_size, 7);
        assert_eq!(tuning.max_fare_paths, 800);
    }
}
