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

//! Overflow-aware arithmetic helpers.
//!
//! The dense dimensional encodings multiply per-leg dimension sizes
//! together; for adversarial inputs (many legs, many scheduling options)
//! the product can overflow `usize`, so all products are computed checked.

use num_traits::PrimInt;

/// Computes the product of all values in `dims`, returning `None` on
/// overflow or when `dims` is empty.
///
/// An empty dimension list is rejected rather than defaulting to `1`: a
/// request without searchable legs has no combination space at all, and
/// callers must treat it as a partition-level error.
#[inline]
pub fn checked_product<T>(dims: &[T]) -> Option<T>
where
    T: PrimInt,
{
    if dims.is_empty() {
        return None;
    }

    let mut product = T::one();
    for &dim in dims {
        product = product.checked_mul(&dim)?;
    }
    Some(product)
}

/// Divides `numerator * percent` by 100 without intermediate overflow,
/// rounding down. Used for the percentage-derived tuning knobs.
#[inline]
pub fn apply_percent(value: u32, percent: u32) -> u32 {
    ((u64::from(value) * u64::from(percent)) / 100) as u32
}

/// Like [`apply_percent`], rounding up. The orchestrator uses this when a
/// shortfall is divided among queues so that rounding never under-asks.
#[inline]
pub fn apply_percent_ceil(value: u32, percent: u32) -> u32 {
    ((u64::from(value) * u64::from(percent)).div_ceil(100)) as u32
}

/// Evenly divides `total` across `buckets`, rounding up; zero buckets
/// yield zero.
#[inline]
pub fn per_bucket_share(total: u32, buckets: usize) -> u32 {
    if buckets == 0 {
        return 0;
    }
    u64::from(total).div_ceil(buckets as u64) as u32
}
