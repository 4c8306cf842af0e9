//! Half-open text intervals and the capabilities shared by everything that
//! occupies one.

use serde::{Deserialize, Serialize};

/// A half-open interval `[start, end)` of byte offsets into a view's text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    /// Create a range.
    ///
    /// # Panics
    ///
    /// Panics when `start > end`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(
            start <= end,
            "text range start {} is after its end {}",
            start,
            end
        );
        Self { start, end }
    }

    /// Range covering all of `text`.
    pub fn of_text(text: &str) -> Self {
        Self::new(0, text.len())
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns true if `other` lies entirely within this range.
    pub fn contains(&self, other: &TextRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Returns true if `offset` is inside `[start, end)`.
    pub fn contains_offset(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Returns true if the two ranges share at least one offset.
    pub fn overlaps(&self, other: &TextRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The slice of `text` this range covers, or `None` when the range is out
    /// of bounds or does not fall on character boundaries.
    pub fn covered_text<'t>(&self, text: &'t str) -> Option<&'t str> {
        text.get(self.start..self.end)
    }
}

impl From<std::ops::Range<usize>> for TextRange {
    fn from(range: std::ops::Range<usize>) -> Self {
        TextRange::new(range.start, range.end)
    }
}

impl std::fmt::Display for TextRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Anything positioned over text.
pub trait Spanned {
    fn text_range(&self) -> TextRange;

    fn start(&self) -> usize {
        self.text_range().start
    }

    fn end(&self) -> usize {
        self.text_range().end
    }
}

impl Spanned for TextRange {
    fn text_range(&self) -> TextRange {
        *self
    }
}

/// A positioned value that carries its own surface text.
pub trait HasText: Spanned {
    fn text(&self) -> &str;
}

/// A positioned value that knows whether whitespace follows it.
pub trait HasSpaceAfter: Spanned {
    fn has_space_after(&self) -> bool;
}
