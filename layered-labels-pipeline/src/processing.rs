//! Extension points of a processing run.
//!
//! Every trait here is `Send + Sync`: one instance is shared by all worker
//! threads of [`run_parallel`](crate::run_parallel). Processors that keep
//! state across artifacts use interior mutability.

use layered_labels::Document;

use crate::{Artifact, PipelineError, ProcessError};

/// Pull-based supply of artifacts.
pub trait ArtifactSource: Send {
    /// Best-effort artifact count for progress reporting. `None` when
    /// unknown.
    fn estimate_total(&self) -> Option<usize> {
        None
    }

    /// Hand the next artifact to `consumer`, if any remains.
    ///
    /// Returns `Ok(false)` once the source is exhausted.
    fn try_advance(&mut self, consumer: &mut dyn FnMut(Artifact)) -> Result<bool, PipelineError>;
}

/// Drives one artifact through a processor chain.
pub trait Runner: Send + Sync {
    fn process_artifact(&self, artifact: &mut Artifact) -> Result<(), ProcessError>;

    /// Called exactly once, after the last artifact was processed.
    fn done(&self) -> Result<(), ProcessError>;
}

/// Accumulates state across artifacts.
pub trait Aggregator: Send + Sync {
    /// Artifacts may arrive in any order.
    fn process(&self, artifact: &Artifact) -> Result<(), ProcessError>;

    /// Called exactly once, after every artifact was observed.
    fn done(&self) -> Result<(), ProcessError>;
}

/// Per-artifact step with access to all of its documents.
pub trait ArtifactProcessor: Send + Sync {
    fn process(&self, artifact: &mut Artifact) -> Result<(), ProcessError>;
}

/// Per-document step: reads existing label indices and adds new labels.
pub trait DocumentProcessor: Send + Sync {
    fn process(&self, document: &mut Document) -> Result<(), ProcessError>;
}

impl<F> DocumentProcessor for F
where
    F: Fn(&mut Document) -> Result<(), ProcessError> + Send + Sync,
{
    fn process(&self, document: &mut Document) -> Result<(), ProcessError> {
        self(document)
    }
}
