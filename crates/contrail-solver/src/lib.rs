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

//! # Contrail Solver
//!
//! The orchestration layer: one [`orchestrator::Orchestrator`] per
//! request creates a solution-generator queue per diversity partition,
//! runs the online queues in parallel where safe, then executes the
//! ordered top-up passes until the diversity contract is met or the time
//! budget expires, and finally merges every partition's matrices into
//! the global result set.
//!
//! The `shaping` module holds the narrow post-processing collaborators
//! (custom-solution backfill, multi-airport backfill, required-non-stop
//! calculation); they drive the queues exclusively through the queues'
//! public contract and own no matrices of their own.

pub mod orchestrator;
pub mod shaping;
