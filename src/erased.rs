//! Type-erased access to labelers and label indices.
//!
//! Views store one [`Labeler`] per label type keyed by `TypeId`, and the
//! expression engine walks indices whose concrete label type it only knows
//! through an alias table. These object-safe traits are implemented
//! automatically for every [`Label`] type.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::label::short_type_name;
use crate::{Label, LabelIndex, Labeler, Spanned, TextRange};

/// Read-only, type-erased view of a [`LabelIndex`].
pub trait ErasedIndex: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn range_at(&self, position: usize) -> TextRange;

    fn label_at(&self, position: usize) -> &dyn Any;

    /// Position of the first label starting at or after `offset`.
    fn lower_bound(&self, offset: usize) -> usize;

    fn type_name(&self) -> &'static str;
}

impl<T: Label> ErasedIndex for LabelIndex<T> {
    fn len(&self) -> usize {
        LabelIndex::len(self)
    }

    fn range_at(&self, position: usize) -> TextRange {
        self.as_slice()[position].text_range()
    }

    fn label_at(&self, position: usize) -> &dyn Any {
        &self.as_slice()[position]
    }

    fn lower_bound(&self, offset: usize) -> usize {
        LabelIndex::lower_bound(self, offset)
    }

    fn type_name(&self) -> &'static str {
        short_type_name::<T>()
    }
}

/// Type-erased storage for one label type's [`Labeler`] inside a view.
pub trait LabelSlot: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn type_name(&self) -> &'static str;

    fn is_finalized(&self) -> bool;

    /// Finalize (idempotently) and return the index.
    fn build_erased(&mut self) -> Arc<dyn ErasedIndex>;
}

impl<T: Label> LabelSlot for Labeler<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        short_type_name::<T>()
    }

    fn is_finalized(&self) -> bool {
        Labeler::is_finalized(self)
    }

    fn build_erased(&mut self) -> Arc<dyn ErasedIndex> {
        self.build()
    }
}

/// Runtime handle for a label type: its `TypeId`, name and a constructor for
/// an empty slot.
#[derive(Clone, Copy)]
pub struct LabelKind {
    type_id: TypeId,
    type_name: &'static str,
    new_slot: fn() -> Box<dyn LabelSlot>,
}

impl std::fmt::Debug for LabelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelKind")
            .field("type_name", &self.type_name)
            .finish()
    }
}

impl PartialEq for LabelKind {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for LabelKind {}

fn new_slot<T: Label>() -> Box<dyn LabelSlot> {
    Box::new(Labeler::<T>::new())
}

impl LabelKind {
    pub fn of<T: Label>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: short_type_name::<T>(),
            new_slot: new_slot::<T>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn new_slot(&self) -> Box<dyn LabelSlot> {
        (self.new_slot)()
    }
}
