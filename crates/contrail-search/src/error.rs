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

//! # Error Taxonomy
//!
//! Three tiers, matching how failures are actually recovered:
//!
//! - **Candidate-level** failures (a combination fails validation or
//!   pricing) are plain control flow inside the generator and never
//!   appear here.
//! - **Partition-level** failures ([`PartitionError`]) are surfaced to
//!   the orchestrator, which may still succeed overall if other
//!   partitions produced results.
//! - **Request-level** failures ([`SearchError`]) are what callers see;
//!   `NoCombinableSolution` is the single fatal outcome of the whole
//!   subsystem.
//!
//! Time and resource exhaustion are not errors — the hurry/abort token
//! degrades the search to a partial result instead.

/// A failure confined to one partition's queue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartitionError {
    /// The partition's combination space is empty (no searchable legs,
    /// or a dimension product of zero).
    #[error("partition '{partition}' has an empty candidate space")]
    EmptyCandidateSpace { partition: String },

    /// The pricing layer failed for the whole partition, not just for a
    /// single candidate.
    #[error("pricing failed for partition '{partition}': {detail}")]
    Pricing { partition: String, detail: String },
}

/// A request-level failure returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    /// No combinable solution exists anywhere, across all partitions,
    /// after all top-up passes.
    #[error("no combinable solution found for this request")]
    NoCombinableSolution,

    /// The diversifier handed over malformed target counts.
    #[error("invalid diversifier decision: {reason}")]
    InvalidDiversifierDecision { reason: String },

    /// A partition failed and no other partition compensated.
    #[error(transparent)]
    Partition(#[from] PartitionError),
}

/// Convenience alias used by the fallible entry points.
pub type SearchResult<T> = Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_partition() {
        let err = PartitionError::EmptyCandidateSpace {
            partition: "ONLINE-AA".to_string(),
        };
        assert!(err.to_string().contains("ONLINE-AA"));
    }

    #[test]
    fn test_partition_error_converts() {
        let err: SearchError = PartitionError::Pricing {
            partition: "INTERLINE".to_string(),
            detail: "backend unavailable".to_string(),
        }
        .into();
        assert!(matches!(err, SearchError::Partition(_)));
    }
}
