//! Typed, positioned labels over text and the engine for querying them.
//!
//! ## Core Types
//!
//! - [`TextRange`] / [`Spanned`] - Half-open byte intervals
//! - [`Label`] - Typed annotation with distinctness and version metadata
//! - [`Labeler`] / [`LabelIndex`] - Write-once builder and its sorted index
//! - [`SequenceDetector`] - Dictionary phrase matcher over token sequences
//! - [`SearchExpr`] / [`Searcher`] - Pattern expressions over label sequences
//! - [`Document`] / [`View`] - Raw text with named views holding labels
//!
//! ## Example
//!
//! ```
//! use layered_labels::{tokenize, Document, Token, SYSTEM_VIEW};
//!
//! let mut doc = Document::new("doc-1", "Beer: Around 25 bottles a week.");
//! let view = doc.attach_full_text(SYSTEM_VIEW).unwrap();
//! for token in tokenize(view.text()) {
//!     view.add(token).unwrap();
//! }
//!
//! let tokens = view.label_index::<Token>();
//! assert_eq!(tokens.len(), 8);
//! assert_eq!(tokens.at_location(6, 12)[0].text, "Around");
//! ```

mod display;
mod document;
mod erased;
mod errors;
mod label;
mod label_index;
mod search;
mod sequence_detector;
mod text_range;
mod token;


pub use display::ViewDisplay;
pub use document::{Document, View, SYSTEM_VIEW};
pub use errors::{DetectorError, DocumentError, LabelError, SearchExprError};
pub use label::{Label, LabelMetadata};
pub use label_index::{LabelIndex, Labeler};
pub use search::{AttrValue, LabelAliases, SearchExpr, Searcher, TypeRegistration};
pub use sequence_detector::{eq_ignore_case, SequenceDetector};
pub use text_range::{HasSpaceAfter, HasText, Spanned, TextRange};
pub use token::{tokenize, Token};
