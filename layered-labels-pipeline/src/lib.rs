//! Batch processing for `layered-labels` documents.
//!
//! An [`ArtifactSource`] supplies [`Artifact`]s, a [`Runner`] (usually a
//! [`Pipeline`]) feeds each one through its document processors, artifact
//! processors and aggregators, and [`run`] / [`run_parallel`] drive the loop:
//!
//! ```
//! use layered_labels::Token;
//! use layered_labels_pipeline::{run, Pipeline, StopSignal, TokenizeProcessor, VecArtifactSource};
//!
//! let pipeline = Pipeline::new().with_document_processor(TokenizeProcessor);
//! let mut source = VecArtifactSource::from_texts("Original", [("a", "Took 2 pills.")]).unwrap();
//!
//! let report = run(&pipeline, &mut source, &StopSignal::new()).unwrap();
//! assert_eq!(report.processed, 1);
//! assert!(report.failures.is_empty());
//! ```
//!
//! Sources and processors are built from a [`ConfigProvider`], either TOML
//! [`Settings`] or in-memory [`MapSettings`].

mod artifact;
mod errors;
mod processing;
mod processors;
mod runner;
mod settings;
mod source;

#[cfg(test)]
mod tests {
    mod quantifier_pipeline;
}

pub use artifact::Artifact;
pub use errors::{PipelineError, ProcessError};
pub use processing::{Aggregator, ArtifactProcessor, ArtifactSource, DocumentProcessor, Runner};
pub use processors::{ExpressionProcessor, PhraseProcessor, TokenizeProcessor};
pub use runner::{run, run_parallel, ArtifactFailure, Pipeline, RunReport, StopSignal};
pub use settings::{ConfigProvider, MapSettings, Settings};
pub use source::{Charset, TextFilesArtifactSource, VecArtifactSource};
