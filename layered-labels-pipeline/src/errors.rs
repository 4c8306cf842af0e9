//! Error types for sources, settings and processor chains.

use std::io;
use std::path::PathBuf;

use layered_labels::{DetectorError, DocumentError, LabelError, SearchExprError};
use thiserror::Error;

/// Failures that stop a run or prevent a component from being built.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to parse settings {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unsupported charset {name:?}")]
    UnsupportedCharset { name: String },

    #[error("missing setting {key:?}")]
    MissingSetting { key: String },

    #[error("artifact {artifact:?} already has a document named {name:?}")]
    DuplicateDocument { artifact: String, name: String },

    #[error(transparent)]
    Detector(#[from] DetectorError),

    #[error(transparent)]
    SearchExpr(#[from] SearchExprError),

    /// The runner's final flush failed.
    #[error("done() failed: {0}")]
    Done(#[source] ProcessError),
}

/// Failure of one processor on one artifact. Recorded per artifact, never
/// fatal to a run.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Label(#[from] LabelError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    SearchExpr(#[from] SearchExprError),

    #[error("{processor}: {message}")]
    Failed { processor: String, message: String },
}

impl ProcessError {
    pub fn failed(processor: impl Into<String>, message: impl Into<String>) -> Self {
        ProcessError::Failed {
            processor: processor.into(),
            message: message.into(),
        }
    }
}
