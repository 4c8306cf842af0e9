//! Write-once label collection and the read-optimized sorted index it builds.
//!
//! A [`Labeler`] accepts labels in any order. Building it sorts the labels by
//! `(start, end)` into a [`LabelIndex`], after which the labeler refuses
//! further writes. All index queries are binary searches over the sorted
//! starts followed by a bounded scan.

use std::sync::Arc;

use tracing::debug;

use crate::label::short_type_name;
use crate::{Label, LabelError, Spanned, TextRange};

/// Immutable, sorted snapshot of all labels of one type within one view.
///
/// Ordered by `start` ascending, then `end` ascending. Labels with identical
/// spans keep the order in which they were added.
#[derive(Debug, Clone)]
pub struct LabelIndex<T> {
    labels: Vec<T>,
    /// `max_end[i]` is the largest end among `labels[..=i]`; never decreases.
    max_end: Vec<usize>,
}

impl<T> Default for LabelIndex<T> {
    fn default() -> Self {
        Self {
            labels: Vec::new(),
            max_end: Vec::new(),
        }
    }
}

impl<T: Label> LabelIndex<T> {
    /// Build an index from labels in any order.
    ///
    /// Distinct label types have identical-span duplicates collapsed: the
    /// first label added for a span is kept.
    pub fn from_labels(labels: impl IntoIterator<Item = T>) -> Self {
        let mut labels: Vec<T> = labels.into_iter().collect();
        // stable: identical spans stay in insertion order
        labels.sort_by_key(|label| (label.start(), label.end()));

        if T::DISTINCT {
            let before = labels.len();
            labels.dedup_by(|later, earlier| later.text_range() == earlier.text_range());
            let dropped = before - labels.len();
            if dropped > 0 {
                debug!(
                    label_type = short_type_name::<T>(),
                    dropped, "collapsed duplicate spans of distinct label type"
                );
            }
        }

        let max_end = labels
            .iter()
            .scan(0, |max, label| {
                *max = label.end().max(*max);
                Some(*max)
            })
            .collect();

        Self { labels, max_end }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.labels.get(index)
    }

    pub fn first(&self) -> Option<&T> {
        self.labels.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.labels.last()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.labels
    }

    /// Position of the first label starting at or after `offset`.
    pub(crate) fn lower_bound(&self, offset: usize) -> usize {
        self.labels.partition_point(|label| label.start() < offset)
    }

    /// Position one past the last label starting at or before `offset`.
    fn upper_bound(&self, offset: usize) -> usize {
        self.labels.partition_point(|label| label.start() <= offset)
    }

    /// Labels whose span is exactly `[start, end)`.
    pub fn at_location(&self, start: usize, end: usize) -> &[T] {
        let from = self
            .labels
            .partition_point(|label| (label.start(), label.end()) < (start, end));
        let to = self
            .labels
            .partition_point(|label| (label.start(), label.end()) <= (start, end));
        &self.labels[from..to]
    }

    /// Labels fully contained in `range`, ascending by start.
    pub fn inside_span(&self, range: TextRange) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let from = self.lower_bound(range.start);
        let to = self.upper_bound(range.end);
        self.labels[from..to.max(from)]
            .iter()
            .filter(move |label| label.end() <= range.end)
    }

    /// Labels whose span contains `range`, ascending by start.
    ///
    /// The scan starts at the first label whose running maximum end reaches
    /// `range.end`; everything before it ends too early to cover.
    pub fn covering(&self, range: TextRange) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let from = self.max_end.partition_point(|&end| end < range.end);
        let to = self.upper_bound(range.start);
        self.labels[from..to.max(from)]
            .iter()
            .filter(move |label| label.end() >= range.end)
    }

    /// Labels starting at or after `offset`.
    pub fn following(&self, offset: usize) -> &[T] {
        &self.labels[self.lower_bound(offset)..]
    }

    pub fn ascending(&self) -> std::slice::Iter<'_, T> {
        self.labels.iter()
    }

    pub fn descending(&self) -> std::iter::Rev<std::slice::Iter<'_, T>> {
        self.labels.iter().rev()
    }

    /// The first `max` labels in ascending order.
    pub fn limit(&self, max: usize) -> std::iter::Take<std::slice::Iter<'_, T>> {
        self.labels.iter().take(max)
    }
}

impl<'a, T: Label> IntoIterator for &'a LabelIndex<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.ascending()
    }
}

/// Append-only collector that produces a [`LabelIndex`] exactly once.
///
/// After [`build`](Labeler::build) every call to [`add`](Labeler::add)
/// returns [`LabelError::Finalized`].
#[derive(Debug)]
pub struct Labeler<T> {
    pending: Vec<T>,
    index: Option<Arc<LabelIndex<T>>>,
}

impl<T> Default for Labeler<T> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            index: None,
        }
    }
}

impl<T: Label> Labeler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, label: T) -> Result<(), LabelError> {
        if self.index.is_some() {
            return Err(LabelError::Finalized {
                type_name: short_type_name::<T>(),
            });
        }
        self.pending.push(label);
        Ok(())
    }

    /// Add every label from `labels`, stopping at the first rejection.
    pub fn add_all(&mut self, labels: impl IntoIterator<Item = T>) -> Result<(), LabelError> {
        for label in labels {
            self.add(label)?;
        }
        Ok(())
    }

    /// Finalize into an index. Idempotent: later calls return the same index.
    pub fn build(&mut self) -> Arc<LabelIndex<T>> {
        if let Some(index) = &self.index {
            return Arc::clone(index);
        }
        let labels = std::mem::take(&mut self.pending);
        let index = Arc::new(LabelIndex::from_labels(labels));
        self.index = Some(Arc::clone(&index));
        index
    }

    pub fn is_finalized(&self) -> bool {
        self.index.is_some()
    }

    /// Labels added so far, in insertion order. Empty once finalized.
    pub fn pending(&self) -> &[T] {
        &self.pending
    }

    /// The built index, if finalized.
    pub fn index(&self) -> Option<&Arc<LabelIndex<T>>> {
        self.index.as_ref()
    }
}
