use unicode_segmentation::UnicodeSegmentation;

use crate::{HasSpaceAfter, HasText, Label, Spanned, TextRange};

/// A word-boundary token of a view's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub range: TextRange,
    pub text: String,
    pub has_space_after: bool,
}

impl Spanned for Token {
    fn text_range(&self) -> TextRange {
        self.range
    }
}

impl HasText for Token {
    fn text(&self) -> &str {
        &self.text
    }
}

impl HasSpaceAfter for Token {
    fn has_space_after(&self) -> bool {
        self.has_space_after
    }
}

impl Label for Token {
    const DISTINCT: bool = true;
}

/// Split `text` on Unicode word boundaries, dropping whitespace segments.
///
/// Punctuation becomes its own token. Offsets are byte offsets into `text`.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();

    for (start, segment) in text.split_word_bound_indices() {
        if segment.chars().all(char::is_whitespace) {
            if let Some(last) = tokens.last_mut() {
                last.has_space_after = true;
            }
            continue;
        }
        tokens.push(Token {
            range: TextRange::new(start, start + segment.len()),
            text: segment.to_string(),
            has_space_after: false,
        });
    }

    tokens
}
