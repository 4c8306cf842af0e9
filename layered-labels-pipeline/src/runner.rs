//! Processor chains and the loops that feed them.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::{
    Aggregator, Artifact, ArtifactProcessor, ArtifactSource, DocumentProcessor, PipelineError,
    ProcessError, Runner,
};

/// Ordered processor chain.
///
/// For each artifact: every document processor over every document (in
/// document name order), then every artifact processor, then every
/// aggregator.
#[derive(Default)]
pub struct Pipeline {
    document_processors: Vec<Box<dyn DocumentProcessor>>,
    artifact_processors: Vec<Box<dyn ArtifactProcessor>>,
    aggregators: Vec<Arc<dyn Aggregator>>,
    done: AtomicBool,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("document_processors", &self.document_processors.len())
            .field("artifact_processors", &self.artifact_processors.len())
            .field("aggregators", &self.aggregators.len())
            .finish()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document_processor(mut self, processor: impl DocumentProcessor + 'static) -> Self {
        self.document_processors.push(Box::new(processor));
        self
    }

    pub fn with_artifact_processor(mut self, processor: impl ArtifactProcessor + 'static) -> Self {
        self.artifact_processors.push(Box::new(processor));
        self
    }

    /// Aggregators are shared so callers can read their results after the
    /// run.
    pub fn with_aggregator(mut self, aggregator: Arc<dyn Aggregator>) -> Self {
        self.aggregators.push(aggregator);
        self
    }
}

impl Runner for Pipeline {
    fn process_artifact(&self, artifact: &mut Artifact) -> Result<(), ProcessError> {
        for document in artifact.documents_mut() {
            for processor in &self.document_processors {
                processor.process(document)?;
            }
        }
        for processor in &self.artifact_processors {
            processor.process(artifact)?;
        }
        for aggregator in &self.aggregators {
            aggregator.process(artifact)?;
        }
        Ok(())
    }

    fn done(&self) -> Result<(), ProcessError> {
        if self.done.swap(true, Ordering::SeqCst) {
            warn!("pipeline done() called more than once; ignoring");
            return Ok(());
        }
        for aggregator in &self.aggregators {
            aggregator.done()?;
        }
        Ok(())
    }
}

/// Cooperative cancellation flag, checked before each supply call.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An artifact whose chain returned an error or panicked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFailure {
    pub artifact_id: String,
    pub message: String,
}

/// Outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Source estimate at the start of the run.
    pub estimated_total: Option<usize>,
    /// Artifacts taken from the source, failed ones included.
    pub processed: usize,
    pub failures: Vec<ArtifactFailure>,
    /// Supply stopped on a [`StopSignal`] before the source was exhausted.
    pub cancelled: bool,
}

impl RunReport {
    fn new(estimated_total: Option<usize>) -> Self {
        Self {
            estimated_total,
            ..Self::default()
        }
    }

    pub fn succeeded(&self) -> usize {
        self.processed - self.failures.len()
    }

    fn record(&mut self, outcome: Result<(), ArtifactFailure>) {
        self.processed += 1;
        if let Err(failure) = outcome {
            self.failures.push(failure);
        }
    }
}

/// Run one artifact through `runner`, turning errors and panics into a
/// failure record.
fn process_one<R: Runner + ?Sized>(runner: &R, mut artifact: Artifact) -> Result<(), ArtifactFailure> {
    trace!(artifact = artifact.id(), "processing artifact");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| runner.process_artifact(&mut artifact)));
    let message = match outcome {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(err)) => err.to_string(),
        Err(payload) => panic_message(payload.as_ref()),
    };

    error!(artifact = artifact.id(), %message, "artifact failed");
    Err(ArtifactFailure {
        artifact_id: artifact.id().to_string(),
        message,
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

fn finish<R: Runner + ?Sized>(runner: &R, report: RunReport) -> Result<RunReport, PipelineError> {
    runner.done().map_err(PipelineError::Done)?;
    info!(
        processed = report.processed,
        failed = report.failures.len(),
        cancelled = report.cancelled,
        "run finished"
    );
    Ok(report)
}

/// Feed every artifact of `source` through `runner` on the current thread,
/// then call [`Runner::done`].
///
/// A failing artifact is recorded in the report and the run continues. A
/// source error ends the run without calling `done`.
pub fn run<R: Runner + ?Sized>(
    runner: &R,
    source: &mut dyn ArtifactSource,
    stop: &StopSignal,
) -> Result<RunReport, PipelineError> {
    let mut report = RunReport::new(source.estimate_total());
    info!(estimated_total = ?report.estimated_total, "run started");

    loop {
        if stop.is_stopped() {
            warn!(processed = report.processed, "run cancelled");
            report.cancelled = true;
            break;
        }
        let advanced = source.try_advance(&mut |artifact| {
            report.record(process_one(runner, artifact));
        })?;
        if !advanced {
            break;
        }
    }

    finish(runner, report)
}

/// Like [`run`] with `workers` threads pulling from a shared source.
///
/// The source is locked only while an artifact is taken from it. `done` is
/// called once, after every worker has finished.
pub fn run_parallel<R: Runner + ?Sized>(
    runner: &R,
    source: &mut dyn ArtifactSource,
    workers: usize,
    stop: &StopSignal,
) -> Result<RunReport, PipelineError> {
    let workers = workers.max(1);
    let report = Mutex::new(RunReport::new(source.estimate_total()));
    let source = Mutex::new(source);
    let source_error: Mutex<Option<PipelineError>> = Mutex::new(None);
    let exhausted = AtomicBool::new(false);
    let cancelled = AtomicBool::new(false);

    info!(estimated_total = ?report.lock().estimated_total, workers, "parallel run started");

    std::thread::scope(|scope| {
        for worker in 0..workers {
            let (report, source, source_error) = (&report, &source, &source_error);
            let (exhausted, cancelled) = (&exhausted, &cancelled);

            scope.spawn(move || loop {
                if exhausted.load(Ordering::SeqCst) {
                    break;
                }
                if stop.is_stopped() {
                    cancelled.store(true, Ordering::SeqCst);
                    break;
                }

                let mut next = None;
                let advanced = source.lock().try_advance(&mut |artifact| next = Some(artifact));
                match advanced {
                    Ok(true) => {}
                    Ok(false) => {
                        exhausted.store(true, Ordering::SeqCst);
                        break;
                    }
                    Err(err) => {
                        error!(worker, %err, "artifact source failed");
                        exhausted.store(true, Ordering::SeqCst);
                        source_error.lock().get_or_insert(err);
                        break;
                    }
                }

                if let Some(artifact) = next {
                    let outcome = process_one(runner, artifact);
                    report.lock().record(outcome);
                }
            });
        }
    });

    if let Some(err) = source_error.into_inner() {
        return Err(err);
    }

    let mut report = report.into_inner();
    if cancelled.load(Ordering::SeqCst) && !exhausted.load(Ordering::SeqCst) {
        warn!(processed = report.processed, "run cancelled");
        report.cancelled = true;
    }
    debug!(workers, "all workers finished");
    finish(runner, report)
}
