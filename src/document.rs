//! Documents and their named views.
//!
//! A [`Document`] owns raw text. Each [`View`] projects that text (or a
//! sub-range of it) and owns one [`Labeler`] per label type. Processors that
//! build on each other's output share the [`SYSTEM_VIEW`].

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::trace;

use crate::erased::{ErasedIndex, LabelKind, LabelSlot};
use crate::{DocumentError, Label, LabelError, LabelIndex, Labeler, TextRange};

/// Reserved view name where pipeline stages hand labels to each other.
pub const SYSTEM_VIEW: &str = "_SystemView";

/// A named text projection plus its per-type labelers and indices.
pub struct View {
    name: String,
    text: Arc<str>,
    origin: usize,
    slots: HashMap<TypeId, Box<dyn LabelSlot>>,
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("name", &self.name)
            .field("text_len", &self.text.len())
            .field("origin", &self.origin)
            .field("label_types", &self.label_type_names())
            .finish()
    }
}

fn downcast_mut<T: Label>(slot: &mut dyn LabelSlot) -> &mut Labeler<T> {
    match slot.as_any_mut().downcast_mut::<Labeler<T>>() {
        Some(labeler) => labeler,
        None => unreachable!("slot keyed by TypeId holds another labeler type"),
    }
}

impl View {
    /// A standalone view over `text`. Usually created through
    /// [`Document::attach_text`].
    pub fn new(name: impl Into<String>, text: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            origin: 0,
            slots: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }

    /// Byte offset of this view's text within its document's text.
    pub fn origin(&self) -> usize {
        self.origin
    }

    fn slot_mut(&mut self, kind: &LabelKind) -> &mut dyn LabelSlot {
        self.slots
            .entry(kind.type_id())
            .or_insert_with(|| kind.new_slot())
            .as_mut()
    }

    /// The labeler for `T`, created empty on first use.
    ///
    /// Once [`label_index`](View::label_index) has been called for `T` the
    /// returned labeler rejects every `add`.
    pub fn labeler<T: Label>(&mut self) -> &mut Labeler<T> {
        downcast_mut::<T>(self.slot_mut(&LabelKind::of::<T>()))
    }

    /// Shorthand for `self.labeler::<T>().add(label)`.
    pub fn add<T: Label>(&mut self, label: T) -> Result<(), LabelError> {
        self.labeler::<T>().add(label)
    }

    /// Finalize `T`'s labeler (idempotently) and return its index.
    pub fn label_index<T: Label>(&mut self) -> Arc<LabelIndex<T>> {
        if !self.labeler::<T>().is_finalized() {
            trace!(
                view = %self.name,
                label_type = LabelKind::of::<T>().type_name(),
                "finalizing labeler"
            );
        }
        self.labeler::<T>().build()
    }

    /// The labeler for `T` if any label of that type was touched.
    pub fn labeler_ref<T: Label>(&self) -> Option<&Labeler<T>> {
        self.slots
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.as_any().downcast_ref::<Labeler<T>>())
    }

    /// The index for `T` if it has already been finalized. Never finalizes.
    pub fn built_index<T: Label>(&self) -> Option<Arc<LabelIndex<T>>> {
        self.labeler_ref::<T>()
            .and_then(|labeler| labeler.index().cloned())
    }

    pub(crate) fn erased_index(&mut self, kind: &LabelKind) -> Arc<dyn ErasedIndex> {
        let name = self.name.clone();
        let slot = self.slot_mut(kind);
        if !slot.is_finalized() {
            trace!(view = %name, label_type = kind.type_name(), "finalizing labeler");
        }
        slot.build_erased()
    }

    /// Names of every label type with a labeler in this view, sorted.
    pub fn label_type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.slots.values().map(|slot| slot.type_name()).collect();
        names.sort_unstable();
        names
    }
}

/// Raw text plus named views over it.
#[derive(Debug)]
pub struct Document {
    id: String,
    text: Arc<str>,
    views: BTreeMap<String, View>,
    metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<Arc<str>>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            views: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Create a view named `name` over `text`.
    pub fn attach_text(
        &mut self,
        name: &str,
        text: impl Into<Arc<str>>,
    ) -> Result<&mut View, DocumentError> {
        self.insert_view(View::new(name, text))
    }

    /// Create a view named `name` over the whole document text.
    pub fn attach_full_text(&mut self, name: &str) -> Result<&mut View, DocumentError> {
        let text = Arc::clone(&self.text);
        self.attach_text(name, text)
    }

    /// Create a view over `range` of the document text. Offsets inside the
    /// view are relative to `range.start`, available as [`View::origin`].
    pub fn attach_range(
        &mut self,
        name: &str,
        range: TextRange,
    ) -> Result<&mut View, DocumentError> {
        let text = range
            .covered_text(&self.text)
            .ok_or_else(|| DocumentError::InvalidRange {
                document: self.id.clone(),
                range,
            })?;
        let mut view = View::new(name, text);
        view.origin = range.start;
        self.insert_view(view)
    }

    fn insert_view(&mut self, view: View) -> Result<&mut View, DocumentError> {
        use std::collections::btree_map::Entry;

        match self.views.entry(view.name.clone()) {
            Entry::Occupied(_) => Err(DocumentError::ViewExists {
                document: self.id.clone(),
                view: view.name,
            }),
            Entry::Vacant(slot) => Ok(slot.insert(view)),
        }
    }

    pub fn view(&self, name: &str) -> Option<&View> {
        self.views.get(name)
    }

    pub fn view_mut(&mut self, name: &str) -> Option<&mut View> {
        self.views.get_mut(name)
    }

    /// Like [`view_mut`](Document::view_mut) but missing views are an error.
    pub fn require_view_mut(&mut self, name: &str) -> Result<&mut View, DocumentError> {
        let id = &self.id;
        self.views
            .get_mut(name)
            .ok_or_else(|| DocumentError::UnknownView {
                document: id.clone(),
                view: name.to_string(),
            })
    }

    /// The system view, attached over the full text on first access.
    pub fn system_view_mut(&mut self) -> &mut View {
        let text = &self.text;
        self.views
            .entry(SYSTEM_VIEW.to_string())
            .or_insert_with(|| View::new(SYSTEM_VIEW, Arc::clone(text)))
    }

    pub fn view_names(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Spanned, TextRange};

    #[derive(Debug, Clone, PartialEq)]
    struct Number(TextRange);

    impl Spanned for Number {
        fn text_range(&self) -> TextRange {
            self.0
        }
    }

    impl Label for Number {}

    #[derive(Debug, Clone, PartialEq)]
    struct Sentence(TextRange);

    impl Spanned for Sentence {
        fn text_range(&self) -> TextRange {
            self.0
        }
    }

    impl Label for Sentence {}

    #[test]
    fn test_attach_text_twice_fails() {
        let mut doc = Document::new("d1", "Beer: Around 25 bottles a week.");
        doc.attach_full_text(SYSTEM_VIEW).unwrap();
        assert_eq!(
            doc.attach_text(SYSTEM_VIEW, "other").unwrap_err(),
            DocumentError::ViewExists {
                document: "d1".to_string(),
                view: SYSTEM_VIEW.to_string(),
            }
        );
        doc.attach_text("other", "other").unwrap();
        assert_eq!(doc.view_names().collect::<Vec<_>>(), vec!["_SystemView", "other"]);
    }

    #[test]
    fn test_labeler_then_index_freezes() {
        let mut doc = Document::new("d1", "Beer: Around 25 bottles a week.");
        let view = doc.attach_full_text(SYSTEM_VIEW).unwrap();
        view.add(Number(TextRange::new(13, 15))).unwrap();
        view.labeler::<Sentence>()
            .add(Sentence(TextRange::new(0, 24)))
            .unwrap();

        let numbers = view.label_index::<Number>();
        assert_eq!(numbers.len(), 1);
        assert!(view.add(Number(TextRange::new(0, 1))).is_err());
        // other types are unaffected
        assert!(view.add(Sentence(TextRange::new(25, 31))).is_ok());
        assert_eq!(view.label_index::<Sentence>().len(), 2);

        // idempotent: same shared index
        assert!(Arc::ptr_eq(&numbers, &view.label_index::<Number>()));
    }

    #[test]
    fn test_index_of_untouched_type_is_empty() {
        let mut view = View::new("v", "text");
        assert!(view.built_index::<Number>().is_none());
        assert!(view.label_index::<Number>().is_empty());
        assert!(view.built_index::<Number>().is_some());
        assert_eq!(view.label_type_names(), vec!["Number"]);
    }

    #[test]
    fn test_attach_range() {
        let mut doc = Document::new("d1", "Title. Beer: Around 25 bottles.");
        let view = doc.attach_range("body", TextRange::new(7, 31)).unwrap();
        assert_eq!(view.text(), "Beer: Around 25 bottles.");
        assert_eq!(view.origin(), 7);

        assert!(matches!(
            doc.attach_range("bad", TextRange::new(7, 99)),
            Err(DocumentError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_unknown_view() {
        let mut doc = Document::new("d1", "x");
        assert!(doc.view("nope").is_none());
        assert_eq!(
            doc.require_view_mut("nope").unwrap_err(),
            DocumentError::UnknownView {
                document: "d1".to_string(),
                view: "nope".to_string(),
            }
        );
    }

    #[test]
    fn test_system_view_created_once() {
        let mut doc = Document::new("d1", "abc");
        doc.system_view_mut().add(Number(TextRange::new(0, 1))).unwrap();
        doc.system_view_mut().add(Number(TextRange::new(1, 2))).unwrap();
        assert_eq!(doc.system_view_mut().label_index::<Number>().len(), 2);
        assert_eq!(doc.view(SYSTEM_VIEW).map(View::text), Some("abc"));
    }

    #[test]
    fn test_indices_shared_across_threads() {
        let mut view = View::new("v", "0123456789");
        for i in 0..10 {
            view.add(Number(TextRange::new(i, i + 1))).unwrap();
        }
        let index = view.label_index::<Number>();
        std::thread::scope(|scope| {
            for t in 0..4 {
                let index = Arc::clone(&index);
                scope.spawn(move || {
                    assert_eq!(index.at_location(t, t + 1).len(), 1);
                });
            }
        });
    }
}
