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

//! Compact, copyable codes for carriers and airports.
//!
//! Both are stored as fixed three-byte arrays (space padded) so they can be
//! hashed and compared in hot loops without heap traffic. Two-letter airline
//! designators and three-letter airport codes both fit.

/// An airline designator, e.g. `AA` or `LH`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Carrier([u8; 3]);

impl Carrier {
    /// Creates a carrier from its code.
    ///
    /// # Panics
    ///
    /// Panics if the code is empty or longer than three bytes.
    pub fn new(code: &str) -> Self {
        assert!(
            !code.is_empty() && code.len() <= 3,
            "called `Carrier::new` with an invalid code: {code:?}"
        );

        let mut bytes = [b' '; 3];
        bytes[..code.len()].copy_from_slice(code.as_bytes());
        Carrier(bytes)
    }

    /// Returns the code with trailing padding removed.
    #[inline]
    pub fn as_str(&self) -> &str {
        // Construction only accepts &str input, so the bytes stay valid UTF-8.
        std::str::from_utf8(&self.0)
            .unwrap_or_default()
            .trim_end_matches(' ')
    }
}

impl std::fmt::Display for Carrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Debug for Carrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Carrier({})", self.as_str())
    }
}

/// An airport code, e.g. `JFK`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Airport([u8; 3]);

impl Airport {
    /// Creates an airport from its code.
    ///
    /// # Panics
    ///
    /// Panics if the code is empty or longer than three bytes.
    pub fn new(code: &str) -> Self {
        assert!(
            !code.is_empty() && code.len() <= 3,
            "called `Airport::new` with an invalid code: {code:?}"
        );

        let mut bytes = [b' '; 3];
        bytes[..code.len()].copy_from_slice(code.as_bytes());
        Airport(bytes)
    }

    /// Returns the code with trailing padding removed.
    #[inline]
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0)
            .unwrap_or_default()
            .trim_end_matches(' ')
    }
}

impl std::fmt::Display for Airport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Debug for Airport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Airport({})", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carrier_roundtrip() {
        let cx = Carrier::new("AA");
        assert_eq!(cx.as_str(), "AA");
        assert_eq!(format!("{cx}"), "AA");
    }

    #[test]
    fn test_carrier_equality_ignores_padding() {
        assert_eq!(Carrier::new("LH"), Carrier::new("LH"));
        assert_ne!(Carrier::new("LH"), Carrier::new("LHX"));
    }

    #[test]
    #[should_panic(expected = "invalid code")]
    fn test_carrier_rejects_long_code() {
        let _ = Carrier::new("TOOLONG");
    }

    #[test]
    fn test_airport_roundtrip() {
        let ap = Airport::new("JFK");
        assert_eq!(ap.as_str(), "JFK");
        assert_eq!(format!("{ap:?}"), "Airport(JFK)");
    }
}
