//! Generic document processors over the system view.
//!
//! Domain detectors are usually a [`PhraseProcessor`] (dictionary cues) or an
//! [`ExpressionProcessor`] (patterns over earlier labels) plus a constructor
//! for the label they produce.

use std::sync::Arc;

use layered_labels::{
    eq_ignore_case, tokenize, Document, Label, LabelAliases, SearchExpr, Searcher,
    SequenceDetector, Spanned, TextRange, Token, View,
};
use tracing::debug;

use crate::{ConfigProvider, DocumentProcessor, PipelineError, ProcessError};

/// Ranges of every `C` label in the view.
fn container_ranges<C: Label>(view: &mut View) -> Vec<TextRange> {
    view.label_index::<C>()
        .ascending()
        .map(Spanned::text_range)
        .collect()
}

/// Search ranges: the containers when set, otherwise the whole view.
fn search_ranges(view: &mut View, within: Option<fn(&mut View) -> Vec<TextRange>>) -> Vec<TextRange> {
    match within {
        Some(containers) => containers(view),
        None => vec![TextRange::of_text(view.text())],
    }
}

/// Splits the document text into [`Token`] labels in the system view.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenizeProcessor;

impl DocumentProcessor for TokenizeProcessor {
    fn process(&self, document: &mut Document) -> Result<(), ProcessError> {
        let view = document.system_view_mut();
        let tokens = tokenize(view.text());
        view.labeler::<Token>().add_all(tokens)?;
        Ok(())
    }
}

/// Labels every dictionary phrase found among the system view's tokens.
///
/// Matching runs per container label when [`within`](PhraseProcessor::within)
/// is set, so phrases never straddle two containers.
pub struct PhraseProcessor<L> {
    detector: SequenceDetector<String, str>,
    make: Box<dyn Fn(TextRange) -> L + Send + Sync>,
    within: Option<fn(&mut View) -> Vec<TextRange>>,
}

impl<L> std::fmt::Debug for PhraseProcessor<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhraseProcessor")
            .field("phrases", &self.detector.phrase_count())
            .field("label", &std::any::type_name::<L>())
            .finish()
    }
}

impl<L: Label> PhraseProcessor<L> {
    pub fn new(
        detector: SequenceDetector<String, str>,
        make: impl Fn(TextRange) -> L + Send + Sync + 'static,
    ) -> Self {
        Self {
            detector,
            make: Box::new(make),
            within: None,
        }
    }

    /// Case-insensitive dictionary read from the file named by setting
    /// `key`.
    pub fn from_settings(
        settings: &dyn ConfigProvider,
        key: &str,
        make: impl Fn(TextRange) -> L + Send + Sync + 'static,
    ) -> Result<Self, PipelineError> {
        let path = settings.require(key)?;
        let detector = SequenceDetector::load_from_file(path, eq_ignore_case::<str>)?;
        Ok(Self::new(detector, make))
    }

    /// Match only inside `C` labels.
    pub fn within<C: Label>(mut self) -> Self {
        self.within = Some(container_ranges::<C>);
        self
    }
}

impl<L: Label> DocumentProcessor for PhraseProcessor<L> {
    fn process(&self, document: &mut Document) -> Result<(), ProcessError> {
        let view = document.system_view_mut();
        let tokens = view.label_index::<Token>();

        let mut labels = Vec::new();
        for range in search_ranges(view, self.within) {
            let inside: Vec<&Token> = tokens.inside_span(range).collect();
            let texts: Vec<&str> = inside.iter().map(|token| token.text.as_str()).collect();
            for found in self.detector.detect_all(&texts) {
                let span = TextRange::new(inside[*found.start()].start(), inside[*found.end()].end());
                labels.push((self.make)(span));
            }
        }

        debug!(
            document = document.id(),
            label_type = std::any::type_name::<L>(),
            found = labels.len(),
            "phrase detection"
        );
        document.system_view_mut().labeler::<L>().add_all(labels)?;
        Ok(())
    }
}

/// Runs a compiled expression over the system view and labels each match
/// `make` accepts.
pub struct ExpressionProcessor<L> {
    expr: Arc<SearchExpr>,
    make: Box<dyn Fn(&Searcher<'_>) -> Option<L> + Send + Sync>,
    within: Option<fn(&mut View) -> Vec<TextRange>>,
}

impl<L> std::fmt::Debug for ExpressionProcessor<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionProcessor")
            .field("expr", &self.expr.source())
            .field("label", &std::any::type_name::<L>())
            .finish()
    }
}

impl<L: Label> ExpressionProcessor<L> {
    pub fn new(
        expr: Arc<SearchExpr>,
        make: impl Fn(&Searcher<'_>) -> Option<L> + Send + Sync + 'static,
    ) -> Self {
        Self {
            expr,
            make: Box::new(make),
            within: None,
        }
    }

    /// Compile the expression stored under setting `key`.
    pub fn from_settings(
        settings: &dyn ConfigProvider,
        key: &str,
        aliases: &LabelAliases,
        make: impl Fn(&Searcher<'_>) -> Option<L> + Send + Sync + 'static,
    ) -> Result<Self, PipelineError> {
        let expr = SearchExpr::parse(aliases, settings.require(key)?)?;
        Ok(Self::new(Arc::new(expr), make))
    }

    /// Search each `C` label separately.
    pub fn within<C: Label>(mut self) -> Self {
        self.within = Some(container_ranges::<C>);
        self
    }
}

impl<L: Label> DocumentProcessor for ExpressionProcessor<L> {
    fn process(&self, document: &mut Document) -> Result<(), ProcessError> {
        let view = document.system_view_mut();

        let mut labels = Vec::new();
        for range in search_ranges(view, self.within) {
            let mut searcher = self.expr.create_searcher_in(view, range);
            while searcher.search() {
                labels.extend((self.make)(&searcher));
            }
        }

        view.labeler::<L>().add_all(labels)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MapSettings;
    use layered_labels::LabelError;
    use std::io::Write;

    #[derive(Debug, Clone, PartialEq)]
    struct Cue(TextRange);

    impl Spanned for Cue {
        fn text_range(&self) -> TextRange {
            self.0
        }
    }

    impl Label for Cue {}

    #[derive(Debug, Clone, PartialEq)]
    struct Line(TextRange);

    impl Spanned for Line {
        fn text_range(&self) -> TextRange {
            self.0
        }
    }

    impl Label for Line {}

    fn tokenized(text: &str) -> Document {
        let mut document = Document::new("doc", text);
        TokenizeProcessor.process(&mut document).unwrap();
        document
    }

    #[test]
    fn test_tokenize_processor() {
        let mut document = tokenized("Took 2 pills.");
        let tokens = document.system_view_mut().label_index::<Token>();
        let texts: Vec<&str> = tokens.ascending().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Took", "2", "pills", "."]);
    }

    #[test]
    fn test_phrase_processor_ignores_case() {
        let detector = SequenceDetector::from_phrases(["a few", "about"], eq_ignore_case::<str>);
        let processor = PhraseProcessor::new(detector, Cue);

        let mut document = tokenized("About 3, then A FEW more.");
        processor.process(&mut document).unwrap();

        let cues = document.system_view_mut().label_index::<Cue>();
        assert_eq!(
            cues.as_slice(),
            [Cue(TextRange::new(0, 5)), Cue(TextRange::new(14, 19))]
        );
    }

    #[test]
    fn test_phrase_processor_within_containers() {
        let detector = SequenceDetector::from_phrases(["a few"], eq_ignore_case::<str>);
        let processor = PhraseProcessor::new(detector, Cue).within::<Line>();

        // "a" ends the first line, "few" starts the second
        let mut document = tokenized("took a few\nfew a\nfew");
        let view = document.system_view_mut();
        view.add(Line(TextRange::new(0, 10))).unwrap();
        view.add(Line(TextRange::new(11, 16))).unwrap();
        view.add(Line(TextRange::new(17, 20))).unwrap();
        processor.process(&mut document).unwrap();

        let cues = document.system_view_mut().label_index::<Cue>();
        assert_eq!(cues.as_slice(), [Cue(TextRange::new(5, 10))]);
    }

    #[test]
    fn test_phrase_processor_from_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "around\n\nsome").unwrap();
        let settings = MapSettings::new().with("cues.localPath", file.path().to_string_lossy());

        let processor = PhraseProcessor::from_settings(&settings, "cues.localPath", Cue).unwrap();
        let mut document = tokenized("Around 5 or SOME");
        processor.process(&mut document).unwrap();
        assert_eq!(document.system_view_mut().label_index::<Cue>().len(), 2);

        let missing = PhraseProcessor::from_settings(&settings, "cues.fuzzyPath", Cue);
        assert!(matches!(missing, Err(PipelineError::MissingSetting { .. })));
    }

    #[test]
    fn test_expression_processor() {
        let mut aliases = LabelAliases::new();
        aliases.register::<Cue>("Cue");
        aliases.register_token_type::<Token>("ParseToken");
        let settings = MapSettings::new().with("expr", "c:Cue -> ParseToken");

        let processor = ExpressionProcessor::from_settings(&settings, "expr", &aliases, |searcher| {
            searcher.matched().map(Line)
        })
        .unwrap();

        let mut document = tokenized("about 5 and about, 6");
        let view = document.system_view_mut();
        view.add(Cue(TextRange::new(0, 5))).unwrap();
        view.add(Cue(TextRange::new(12, 17))).unwrap();
        processor.process(&mut document).unwrap();

        let lines = document.system_view_mut().label_index::<Line>();
        assert_eq!(
            lines.as_slice(),
            [Line(TextRange::new(0, 7)), Line(TextRange::new(12, 18))]
        );
    }

    #[test]
    fn test_expression_processor_cannot_label_its_own_input() {
        let mut aliases = LabelAliases::new();
        aliases.register::<Cue>("Cue");
        let expr = Arc::new(SearchExpr::parse(&aliases, "Cue").unwrap());
        let processor = ExpressionProcessor::new(expr, |searcher| searcher.matched().map(Cue));

        let mut document = Document::new("doc", "x");
        document
            .system_view_mut()
            .add(Cue(TextRange::new(0, 1)))
            .unwrap();

        assert!(matches!(
            processor.process(&mut document),
            Err(ProcessError::Label(LabelError::Finalized { .. }))
        ));
    }
}
