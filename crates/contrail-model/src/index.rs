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

use contrail_core::index::{TypedIndex, TypedIndexTag};

/// A tag type for leg indices.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct LegIndexTag;

impl TypedIndexTag for LegIndexTag {
    const NAME: &'static str = "LegIndex";
}

/// A typed index addressing a leg of the requested journey.
pub type LegIndex = TypedIndex<LegIndexTag>;

/// A tag type for scheduling-option indices.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SopIndexTag;

impl TypedIndexTag for SopIndexTag {
    const NAME: &'static str = "SopIndex";
}

/// A typed index addressing a scheduling option within its leg.
///
/// `SopIndex::SENTINEL` marks the surface-sector placeholder inside an
/// aggregated-leg combination; it never addresses a real option.
pub type SopIndex = TypedIndex<SopIndexTag>;

/// A tag type for fare-combination identifiers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct FareIdTag;

impl TypedIndexTag for FareIdTag {
    const NAME: &'static str = "FareId";
}

/// A non-owning handle into the request-scoped [`crate::fare::FareArena`].
pub type FareId = TypedIndex<FareIdTag>;

/// A tag type for alternate-date pair identifiers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DatePairIdTag;

impl TypedIndexTag for DatePairIdTag {
    const NAME: &'static str = "DatePairId";
}

/// A typed index into the model's alternate-date pair table.
pub type DatePairId = TypedIndex<DatePairIdTag>;
