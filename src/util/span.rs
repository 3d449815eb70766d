use std::fmt;
use std::ops::Range;

use miette::SourceSpan;

/// A location in the source code, measured in characters
///
/// The checker and the lowering pass never look inside a span, they only
/// carry it along so that errors can point at the offending node.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Span covering exactly one character
    pub fn single(index: usize) -> Self {
        Self::new(index, index + 1)
    }

    /// Zero width span, e.g. for the end of input
    pub fn marker(index: usize) -> Self {
        Self::new(index, index)
    }

    /// Smallest span containing both `self` and `other`
    pub fn join(self, other: Span) -> Self {
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        SourceSpan::new(span.start.into(), span.len())
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
