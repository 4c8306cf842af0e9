//! The label model: typed, positioned annotations over a view's text.

use std::fmt::Debug;

use crate::Spanned;

/// A typed annotation stored in a [`LabelIndex`](crate::LabelIndex).
///
/// Implement this for every label type a pipeline produces. The associated
/// constants describe the type's metadata:
///
/// - `DISTINCT`: at most one label of this type may occupy an identical span
///   within one index. Later duplicates are dropped when the index is built.
/// - `VERSION`: version tag carried alongside exported labels.
///
/// # Example
///
/// ```
/// use layered_labels::{Label, Spanned, TextRange};
///
/// #[derive(Debug, Clone)]
/// struct Row(TextRange);
///
/// impl Spanned for Row {
///     fn text_range(&self) -> TextRange { self.0 }
/// }
///
/// impl Label for Row {
///     const DISTINCT: bool = true;
///     const VERSION: &'static str = "2_0";
/// }
///
/// assert!(Row::metadata().distinct);
/// ```
pub trait Label: Spanned + Debug + Send + Sync + 'static {
    const DISTINCT: bool = false;
    const VERSION: &'static str = "1_0";

    fn metadata() -> LabelMetadata
    where
        Self: Sized,
    {
        LabelMetadata {
            type_name: short_type_name::<Self>(),
            version: Self::VERSION,
            distinct: Self::DISTINCT,
        }
    }
}

/// Static description of a label type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelMetadata {
    pub type_name: &'static str,
    pub version: &'static str,
    pub distinct: bool,
}

/// Last path segment of a type name, e.g. `Token` for `layered_labels::token::Token`.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
