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

//! # Fixed-Point Money
//!
//! Total prices order the entire search, so they must compare exactly.
//! `Money` stores minor units (hundredths) in an `i64` instead of using a
//! float, which keeps the non-decreasing-price invariant of the generator
//! free of rounding artifacts and makes the type `Ord + Hash`.
//!
//! A distinguished [`Money::FALLBACK`] sentinel tags fare-less flight-only
//! solutions. The sentinel is deliberately enormous so that fare-less
//! entries sort after every genuinely priced solution, and
//! [`Money::is_fallback`] makes the tag explicit rather than a magic
//! comparison scattered through the call sites.

/// An exact monetary amount in minor units (hundredths).
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    /// The zero amount.
    pub const ZERO: Money = Money(0);

    /// The sentinel price carried by fare-less flight-only solutions.
    /// Any amount at or above this value is treated as "no real fare".
    pub const FALLBACK: Money = Money(1_000_000_00);

    /// Creates an amount from whole currency units.
    #[inline]
    pub const fn from_major(units: i64) -> Self {
        Money(units * 100)
    }

    /// Creates an amount from minor units (hundredths).
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the raw minor-unit value.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Whether this amount is the fare-less sentinel (or beyond it).
    #[inline]
    pub const fn is_fallback(&self) -> bool {
        self.0 >= Self::FALLBACK.0
    }

    /// Saturating addition; amounts never wrap.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction; amounts never wrap.
    #[inline]
    #[must_use]
    pub const fn saturating_sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}

impl std::fmt::Debug for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_fallback() {
            write!(f, "Money(FALLBACK)")
        } else {
            write!(f, "Money({self})")
        }
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Money::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_exact() {
        assert!(Money::from_minor(1) < Money::from_minor(2));
        assert!(Money::from_major(10) < Money::FALLBACK);
        assert_eq!(Money::from_major(3), Money::from_minor(300));
    }

    #[test]
    fn test_fallback_sorts_last() {
        let mut prices = vec![
            Money::FALLBACK,
            Money::from_major(120),
            Money::from_major(99),
        ];
        prices.sort();
        assert_eq!(prices.last(), Some(&Money::FALLBACK));
        assert!(prices.last().is_some_and(Money::is_fallback));
    }

    #[test]
    fn test_saturating_arithmetic() {
        let max = Money::from_minor(i64::MAX);
        assert_eq!(max.saturating_add(Money::from_minor(1)), max);
        assert_eq!(
            Money::from_major(5).saturating_sub(Money::from_major(2)),
            Money::from_major(3)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_minor(12345)), "123.45");
        assert_eq!(format!("{}", Money::from_minor(7)), "0.07");
    }

    #[test]
    fn test_sum() {
        let total: Money = [Money::from_major(1), Money::from_major(2)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_major(3));
    }
}
