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

//! # Contrail Search
//!
//! Search plumbing shared by the generator and the orchestrator:
//!
//! - `combination_index`: the dense dimensional encoding of the
//!   combination space and its deterministic tie-break scoring.
//! - `rated_queue`: lattice enumeration of combinations in non-decreasing
//!   score order.
//! - `cancel`: the cooperative hurry/abort token polled at candidate
//!   boundaries.
//! - `counters`: shared atomic diversity counters.
//! - `decision`: the diversifier's per-partition target counts.
//! - `error`: the candidate/partition/request error taxonomy.
//! - `stats`: per-queue statistics.

pub mod cancel;
pub mod combination_index;
pub mod counters;
pub mod decision;
pub mod error;
pub mod rated_queue;
pub mod stats;
