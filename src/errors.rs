//! Error types for the label store, phrase detector and expression compiler.

use std::path::PathBuf;

use thiserror::Error;

/// Misuse of a labeler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    /// A label was added after the labeler's index was finalized.
    #[error("labeler for {type_name} is finalized; no labels can be added")]
    Finalized { type_name: &'static str },
}

/// Misuse of a document's views.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("document {document} already has a view named {view}")]
    ViewExists { document: String, view: String },

    #[error("document {document} has no view named {view}")]
    UnknownView { document: String, view: String },

    #[error("range {range} is not a valid text range of document {document}")]
    InvalidRange {
        document: String,
        range: crate::TextRange,
    },
}

/// Failure to construct a [`SequenceDetector`](crate::SequenceDetector).
#[derive(Debug, Error)]
pub enum DetectorError {
    /// The dictionary could not be read.
    #[error("failed to read dictionary {}: {source}", path.display())]
    Resource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A dictionary line could not be tokenized.
    #[error("dictionary {} line {line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

/// Failure to compile a search expression. Offsets are byte offsets into the
/// expression string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchExprError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unknown label alias {alias:?} at offset {offset}")]
    UnknownAlias { offset: usize, alias: String },

    #[error("label type {alias} has no accessor {accessor:?} (offset {offset})")]
    UnknownAccessor {
        offset: usize,
        alias: String,
        accessor: String,
    },

    #[error("duplicate capture name {name:?} at offset {offset}")]
    DuplicateCapture { offset: usize, name: String },

    /// `$name` refers to a capture not declared earlier in the expression.
    #[error("back-reference to unknown capture {name:?} at offset {offset}")]
    UnknownCapture { offset: usize, name: String },

    #[error("literal at offset {offset} needs a registered token type")]
    NoTokenType { offset: usize },
}

impl SearchExprError {
    /// Byte offset into the expression where compilation failed.
    pub fn offset(&self) -> usize {
        match self {
            SearchExprError::Syntax { offset, .. }
            | SearchExprError::UnknownAlias { offset, .. }
            | SearchExprError::UnknownAccessor { offset, .. }
            | SearchExprError::DuplicateCapture { offset, .. }
            | SearchExprError::UnknownCapture { offset, .. }
            | SearchExprError::NoTokenType { offset } => *offset,
        }
    }
}
