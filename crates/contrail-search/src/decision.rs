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

//! # Diversifier Decision
//!
//! The externally computed per-partition target counts the orchestrator
//! must try to satisfy: how many solutions each online carrier owes, the
//! interline share, the estimated-solution total, and the custom,
//! non-stop, one-way and per-date-pair quotas. Consumed read-only at
//! orchestrator start; malformed decisions fail the request before any
//! queue runs.

use crate::error::{SearchError, SearchResult};
use contrail_model::carrier::Carrier;

/// The online-solution quota of one carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnlineTarget {
    pub carrier: Carrier,
    pub options: u32,
}

/// Per-partition target counts, handed over by the external diversifier.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiversifierDecision {
    /// Online quota per carrier; carriers with a zero quota get no queue.
    pub online: Vec<OnlineTarget>,
    /// Number of interline solutions owed.
    pub interline_options: u32,
    /// Total number of solutions the request asked for.
    pub total_requested: u32,
    /// Requested number of estimated (family-inflated) solutions;
    /// zero disables estimation entirely.
    pub estimated_requested: u32,
    /// Custom-solution quota.
    pub custom_requested: u32,
    /// Non-stop quota.
    pub non_stop_requested: u32,
    /// Extra itineraries owed by the dedicated one-way-fare partition.
    pub one_way_options: u32,
    /// How often one fare combination may be reused in the one-way
    /// partition before being suppressed.
    pub fare_repeat_limit: Option<u16>,
    /// Solutions owed per alternate-date pair.
    pub per_date_pair_options: u32,
}

impl DiversifierDecision {
    /// Sum of all online quotas.
    pub fn total_online(&self) -> u32 {
        self.online.iter().map(|t| t.options).sum()
    }

    /// Whether the decision asks for any work at all.
    pub fn has_work(&self) -> bool {
        self.total_online() > 0
            || self.interline_options > 0
            || self.one_way_options > 0
            || self.non_stop_requested > 0
    }

    /// Validates internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidDiversifierDecision`] when the
    /// decision owes no solutions anywhere or lists a carrier twice.
    pub fn validate(&self) -> SearchResult<()> {
        if !self.has_work() {
            return Err(SearchError::InvalidDiversifierDecision {
                reason: "no partition owes any solutions".to_string(),
            });
        }

        let mut carriers: Vec<Carrier> = self.online.iter().map(|t| t.carrier).collect();
        carriers.sort_unstable();
        let before = carriers.len();
        carriers.dedup();
        if carriers.len() != before {
            return Err(SearchError::InvalidDiversifierDecision {
                reason: "duplicate online carrier target".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(carrier: &str, options: u32) -> OnlineTarget {
        OnlineTarget {
            carrier: Carrier::new(carrier),
            options,
        }
    }

    #[test]
    fn test_valid_decision() {
        let decision = DiversifierDecision {
            online: vec![target("AA", 2), target("UA", 1)],
            interline_options: 1,
            total_requested: 4,
            ..Default::default()
        };
        assert!(decision.validate().is_ok());
        assert_eq!(decision.total_online(), 3);
    }

    #[test]
    fn test_empty_decision_is_rejected() {
        let decision = DiversifierDecision::default();
        assert!(matches!(
            decision.validate(),
            Err(SearchError::InvalidDiversifierDecision { .. })
        ));
    }

    #[test]
    fn test_duplicate_carrier_is_rejected() {
        let decision = DiversifierDecision {
            online: vec![target("AA", 2), target("AA", 1)],
            total_requested: 3,
            ..Default::default()
        };
        assert!(decision.validate().is_err());
    }
}
