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

//! # Contrail Queue
//!
//! The per-partition solution generator: a priority-queue engine that
//! emits complete, bitmap-validated, priced solutions in non-decreasing
//! price order for one partition of demand (a single online carrier, the
//! interline aggregate, the one-way-fare partition, or the dedicated
//! non-stop partition).
//!
//! - `traits`: the narrow contracts to the external fare/rule validation
//!   and pricing services and the optional diagnostic sink.
//! - `bitmap`: the tri-state flight-bit memo per fare combination.
//! - `validator`: the two-phase (cheap, then lazily full) bitmap
//!   validator in its standard and aggregated-leg variants.
//! - `matrix`: the flight and estimate matrices and their reconciliation.
//! - `family`: family grouping and splitting over the matrices.
//! - `config`: the business-tuning knobs, all configuration-derived.
//! - `generator`: the [`generator::ShoppingQueue`] state machine itself.

pub mod bitmap;
pub mod config;
pub mod family;
pub mod generator;
pub mod matrix;
pub mod traits;
pub mod validator;
