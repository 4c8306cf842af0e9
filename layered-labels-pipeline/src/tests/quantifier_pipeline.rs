//! Quantifier detection over a directory of notes, configured from a
//! settings file and run on several workers.

use std::fs;
use std::sync::Arc;

use layered_labels::{
    Document, Label, LabelAliases, Spanned, TextRange, Token, SYSTEM_VIEW,
};
use parking_lot::Mutex;

use crate::{
    run_parallel, Aggregator, Artifact, ArtifactProcessor, ExpressionProcessor, PhraseProcessor,
    Pipeline, ProcessError, Settings, StopSignal, TextFilesArtifactSource, TokenizeProcessor,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndefiniteKind {
    Local,
}

#[derive(Debug, Clone)]
struct IndefiniteQuantifierCue {
    range: TextRange,
    kind: IndefiniteKind,
}

#[derive(Debug, Clone)]
struct Quantifier {
    range: TextRange,
    exact: bool,
}

#[derive(Debug, Clone)]
struct Sentence(TextRange);

#[derive(Debug, Clone)]
struct Number(TextRange);

#[derive(Debug, Clone)]
struct FuzzyValue(TextRange);

impl Spanned for IndefiniteQuantifierCue {
    fn text_range(&self) -> TextRange {
        self.range
    }
}

impl Spanned for Quantifier {
    fn text_range(&self) -> TextRange {
        self.range
    }
}

impl Spanned for Sentence {
    fn text_range(&self) -> TextRange {
        self.0
    }
}

impl Spanned for Number {
    fn text_range(&self) -> TextRange {
        self.0
    }
}

impl Spanned for FuzzyValue {
    fn text_range(&self) -> TextRange {
        self.0
    }
}

impl Label for IndefiniteQuantifierCue {}
impl Label for Quantifier {}
impl Label for Sentence {}
impl Label for Number {}
impl Label for FuzzyValue {}

/// Sentences end at each '.'; trailing text without one is a sentence too.
fn split_sentences(document: &mut Document) -> Result<(), ProcessError> {
    let view = document.system_view_mut();
    let text = view.text();

    let mut sentences = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        if start.is_none() && !c.is_whitespace() {
            start = Some(i);
        }
        if c == '.' {
            if let Some(begin) = start.take() {
                sentences.push(Sentence(TextRange::new(begin, i + 1)));
            }
        }
    }
    if let Some(begin) = start {
        sentences.push(Sentence(TextRange::new(begin, text.trim_end().len())));
    }

    view.labeler::<Sentence>().add_all(sentences)?;
    Ok(())
}

fn detect_numbers(document: &mut Document) -> Result<(), ProcessError> {
    let view = document.system_view_mut();
    let numbers: Vec<Number> = view
        .label_index::<Token>()
        .ascending()
        .filter(|token| token.text.parse::<i64>().is_ok())
        .map(|token| Number(token.range))
        .collect();
    view.labeler::<Number>().add_all(numbers)?;
    Ok(())
}

/// Finalizes the quantifiers and records their count on the artifact.
struct CountQuantifiers;

impl ArtifactProcessor for CountQuantifiers {
    fn process(&self, artifact: &mut Artifact) -> Result<(), ProcessError> {
        let mut count = 0;
        for document in artifact.documents_mut() {
            count += document.system_view_mut().label_index::<Quantifier>().len();
        }
        artifact.set_metadata("quantifiers", count.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct QuantifierReport {
    lines: Mutex<Vec<String>>,
    summary: Mutex<Option<String>>,
}

impl Aggregator for QuantifierReport {
    fn process(&self, artifact: &Artifact) -> Result<(), ProcessError> {
        for document in artifact.documents() {
            let Some(index) = document
                .view(SYSTEM_VIEW)
                .and_then(|view| view.built_index::<Quantifier>())
            else {
                return Err(ProcessError::failed("report", "quantifiers were not finalized"));
            };

            let mut lines = self.lines.lock();
            for quantifier in index.ascending() {
                lines.push(format!(
                    "{} {} {:?} exact={}",
                    artifact.id(),
                    quantifier.range,
                    quantifier.range.covered_text(document.text()).unwrap_or(""),
                    quantifier.exact
                ));
            }
        }
        Ok(())
    }

    fn done(&self) -> Result<(), ProcessError> {
        let mut lines = self.lines.lock().clone();
        lines.sort();
        *self.summary.lock() = Some(lines.join("\n"));
        Ok(())
    }
}

fn aliases() -> LabelAliases {
    let mut aliases = LabelAliases::new();
    aliases
        .register::<IndefiniteQuantifierCue>("IndefiniteQuantifierCue")
        .with_accessor("kind", |cue: &IndefiniteQuantifierCue| {
            format!("{:?}", cue.kind)
        });
    aliases.register::<Number>("Number");
    aliases.register::<FuzzyValue>("FuzzyValue");
    aliases.register_token_type::<Token>("ParseToken");
    aliases
}

#[test]
fn test_quantifiers_across_a_directory() {
    let root = tempfile::tempdir().unwrap();
    let notes = root.path().join("notes");
    fs::create_dir_all(notes.join("ward")).unwrap();
    fs::write(
        notes.join("beer.txt"),
        "Beer: Around 25 bottles a week. Took a few pills.",
    )
    .unwrap();
    fs::write(
        notes.join("ward").join("visit.txt"),
        "Walked about 2 miles. Slept 8 hours.",
    )
    .unwrap();

    let local = root.path().join("local.txt");
    let fuzzy = root.path().join("fuzzy.txt");
    fs::write(&local, "around\nabout\n").unwrap();
    fs::write(&fuzzy, "a few\n\nsome\n").unwrap();

    let settings_path = root.path().join("settings.toml");
    fs::write(
        &settings_path,
        format!(
            r#"
inputDirectory = '{}'
extension = "txt"
documentName = "Original"

[cues]
localPath = '{}'
fuzzyPath = '{}'

[quantifier]
expression = '([?indef:IndefiniteQuantifierCue<kind=Local>] ->)? (Number | fuzz:FuzzyValue)'
"#,
            notes.display(),
            local.display(),
            fuzzy.display()
        ),
    )
    .unwrap();
    let settings = Settings::load(&settings_path).unwrap();

    let local_cues = PhraseProcessor::from_settings(&settings, "cues.localPath", |range| {
        IndefiniteQuantifierCue {
            range,
            kind: IndefiniteKind::Local,
        }
    })
    .unwrap()
    .within::<Sentence>();
    let fuzzy_values = PhraseProcessor::from_settings(&settings, "cues.fuzzyPath", FuzzyValue)
        .unwrap()
        .within::<Sentence>();
    let quantifiers =
        ExpressionProcessor::from_settings(&settings, "quantifier.expression", &aliases(), |searcher| {
            Some(Quantifier {
                range: searcher.matched()?,
                exact: searcher.span("indef").is_none() && searcher.span("fuzz").is_none(),
            })
        })
        .unwrap();

    let report = Arc::new(QuantifierReport::default());
    let pipeline = Pipeline::new()
        .with_document_processor(TokenizeProcessor)
        .with_document_processor(split_sentences)
        .with_document_processor(detect_numbers)
        .with_document_processor(local_cues)
        .with_document_processor(fuzzy_values)
        .with_document_processor(quantifiers)
        .with_artifact_processor(CountQuantifiers)
        .with_aggregator(report.clone());

    let mut source = TextFilesArtifactSource::from_settings(&settings).unwrap();
    let run = run_parallel(&pipeline, &mut source, 2, &StopSignal::new()).unwrap();

    assert_eq!(run.estimated_total, Some(2));
    assert_eq!(run.processed, 2);
    assert!(run.failures.is_empty(), "{:?}", run.failures);

    let summary = report.summary.lock().clone().unwrap();
    insta::assert_snapshot!(summary, @r###"
    beer [37, 42) "a few" exact=false
    beer [6, 15) "Around 25" exact=false
    visit [28, 29) "8" exact=true
    visit [7, 14) "about 2" exact=false
    "###);
}

#[test]
fn test_unfinalized_quantifiers_fail_the_artifact() {
    let report = Arc::new(QuantifierReport::default());
    let pipeline = Pipeline::new()
        .with_document_processor(TokenizeProcessor)
        .with_aggregator(report.clone());

    let mut source =
        crate::VecArtifactSource::from_texts("Original", [("a", "Took 2 pills.")]).unwrap();
    let run = crate::run(&pipeline, &mut source, &StopSignal::new()).unwrap();

    assert_eq!(run.failures.len(), 1);
    assert_eq!(run.failures[0].artifact_id, "a");
    assert_eq!(
        run.failures[0].message,
        "report: quantifiers were not finalized"
    );
    assert_eq!(report.summary.lock().as_deref(), Some(""));
}

fn finalize_tokens(document: &mut Document) -> Result<(), ProcessError> {
    document.system_view_mut().label_index::<Token>();
    Ok(())
}

#[derive(Default)]
struct TokenCounts {
    counts: Mutex<Vec<(String, usize)>>,
    flushed: Mutex<bool>,
}

impl Aggregator for TokenCounts {
    fn process(&self, artifact: &Artifact) -> Result<(), ProcessError> {
        for document in artifact.documents() {
            let tokens = document
                .view(SYSTEM_VIEW)
                .and_then(|view| view.built_index::<Token>())
                .map_or(0, |index| index.len());
            self.counts.lock().push((artifact.id().to_string(), tokens));
        }
        Ok(())
    }

    fn done(&self) -> Result<(), ProcessError> {
        *self.flushed.lock() = true;
        Ok(())
    }
}

#[test]
fn test_run_continues_past_bad_files() {
    let notes = tempfile::tempdir().unwrap();
    fs::write(notes.path().join("a.txt"), "Took 2 pills.").unwrap();
    fs::write(notes.path().join("b.txt"), [b'T', b'o', b'o', b'k', b' ', 0xff, b'.']).unwrap();
    fs::write(notes.path().join("c.txt"), "Gone before reading.").unwrap();
    fs::write(notes.path().join("d.txt"), "Slept.").unwrap();

    let counts = Arc::new(TokenCounts::default());
    let pipeline = Pipeline::new()
        .with_document_processor(TokenizeProcessor)
        .with_document_processor(finalize_tokens)
        .with_aggregator(counts.clone());

    let mut source = TextFilesArtifactSource::new(notes.path(), "txt", "Original").unwrap();
    fs::remove_file(notes.path().join("c.txt")).unwrap();
    let run = crate::run(&pipeline, &mut source, &StopSignal::new()).unwrap();

    assert_eq!(run.processed, 3);
    assert!(run.failures.is_empty(), "{:?}", run.failures);
    assert!(*counts.flushed.lock());
    assert_eq!(source.skipped(), [notes.path().join("c.txt")]);

    let mut counts = counts.counts.lock().clone();
    counts.sort();
    assert_eq!(
        counts,
        vec![("a".to_string(), 4), ("b".to_string(), 3), ("d".to_string(), 2)]
    );
}
