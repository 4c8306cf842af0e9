//! Multi-phrase matching over sequences of arbitrary tokens.
//!
//! Dictionary phrases are stored in a token trie. Tokens are compared with a
//! caller-supplied predicate, so a dictionary of strings can be run over
//! token labels, plain `&str` slices or anything else the predicate accepts.
//!
//! Matching is leftmost-longest and non-overlapping: at each position the
//! longest phrase is taken and scanning resumes after it.

use std::borrow::Borrow;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::Path;

use tracing::debug;

use crate::DetectorError;

type Equals<S, T> = Box<dyn Fn(&S, &T) -> bool + Send + Sync>;

struct TrieNode<S> {
    children: Vec<(S, usize)>,
    terminal: bool,
}

impl<S> TrieNode<S> {
    fn new() -> Self {
        Self {
            children: Vec::new(),
            terminal: false,
        }
    }
}

/// Immutable dictionary automaton. Safe to share across threads.
pub struct SequenceDetector<S, T: ?Sized> {
    nodes: Vec<TrieNode<S>>,
    phrase_count: usize,
    equals: Equals<S, T>,
}

impl<S: fmt::Debug, T: ?Sized> fmt::Debug for SequenceDetector<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceDetector")
            .field("phrase_count", &self.phrase_count)
            .field("node_count", &self.nodes.len())
            .finish()
    }
}

impl<S: PartialEq, T: ?Sized> SequenceDetector<S, T> {
    /// Build a detector from phrases already split into tokens.
    ///
    /// Empty phrases are ignored.
    pub fn from_sequences<P>(
        phrases: impl IntoIterator<Item = P>,
        equals: impl Fn(&S, &T) -> bool + Send + Sync + 'static,
    ) -> Self
    where
        P: IntoIterator<Item = S>,
    {
        let mut nodes = vec![TrieNode::new()];
        let mut phrase_count = 0;

        for phrase in phrases {
            let mut current = 0;
            let mut any = false;
            for token in phrase {
                any = true;
                let existing = nodes[current]
                    .children
                    .iter()
                    .find(|(key, _)| *key == token)
                    .map(|(_, child)| *child);
                current = match existing {
                    Some(child) => child,
                    None => {
                        let child = nodes.len();
                        nodes.push(TrieNode::new());
                        nodes[current].children.push((token, child));
                        child
                    }
                };
            }
            if any && !nodes[current].terminal {
                nodes[current].terminal = true;
                phrase_count += 1;
            }
        }

        Self {
            nodes,
            phrase_count,
            equals: Box::new(equals),
        }
    }
}

impl<T: ?Sized> SequenceDetector<String, T> {
    /// Build a detector from whitespace-separated phrases.
    pub fn from_phrases<'a>(
        phrases: impl IntoIterator<Item = &'a str>,
        equals: impl Fn(&String, &T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::from_sequences(
            phrases
                .into_iter()
                .map(|phrase| phrase.split_whitespace().map(str::to_string).collect::<Vec<_>>()),
            equals,
        )
    }

    /// Load a dictionary file: UTF-8, one phrase per line, tokens separated
    /// by whitespace, blank lines skipped.
    pub fn load_from_file(
        path: impl AsRef<Path>,
        equals: impl Fn(&String, &T) -> bool + Send + Sync + 'static,
    ) -> Result<Self, DetectorError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| DetectorError::Resource {
            path: path.to_path_buf(),
            source,
        })?;

        let mut phrases = Vec::new();
        for (line_idx, raw) in bytes.split(|b| *b == b'\n').enumerate() {
            let line = std::str::from_utf8(raw).map_err(|e| DetectorError::Parse {
                path: path.to_path_buf(),
                line: line_idx + 1,
                message: format!("invalid UTF-8: {}", e),
            })?;
            let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
            if !tokens.is_empty() {
                phrases.push(tokens);
            }
        }

        let detector = Self::from_sequences(phrases, equals);
        debug!(
            path = %path.display(),
            phrases = detector.phrase_count,
            "loaded phrase dictionary"
        );
        Ok(detector)
    }
}

impl<S, T: ?Sized> SequenceDetector<S, T> {
    /// Number of distinct phrases in the dictionary.
    pub fn phrase_count(&self) -> usize {
        self.phrase_count
    }

    pub fn is_empty(&self) -> bool {
        self.phrase_count == 0
    }

    /// Index of the last token of the longest phrase starting at `start`.
    ///
    /// Several trie children can accept the same token when `equals` is
    /// looser than `==` ("A few" and "a lot" under case folding), so every
    /// accepting branch is followed.
    pub fn longest_match_at<U: Borrow<T>>(&self, tokens: &[U], start: usize) -> Option<usize> {
        let mut active = vec![0];
        let mut next = Vec::new();
        let mut longest = None;

        for (i, token) in tokens.iter().enumerate().skip(start) {
            let token = token.borrow();
            next.clear();
            for &node in &active {
                next.extend(
                    self.nodes[node]
                        .children
                        .iter()
                        .filter(|(key, _)| (self.equals)(key, token))
                        .map(|(_, child)| *child),
                );
            }
            if next.is_empty() {
                break;
            }
            if next.iter().any(|&child| self.nodes[child].terminal) {
                longest = Some(i);
            }
            std::mem::swap(&mut active, &mut next);
        }

        longest
    }

    /// All non-overlapping leftmost-longest matches as inclusive token index
    /// ranges, ascending.
    pub fn detect_all<U: Borrow<T>>(&self, tokens: &[U]) -> Vec<RangeInclusive<usize>> {
        let mut matches = Vec::new();
        if self.is_empty() {
            return matches;
        }

        let mut i = 0;
        while i < tokens.len() {
            match self.longest_match_at(tokens, i) {
                Some(last) => {
                    matches.push(i..=last);
                    i = last + 1;
                }
                None => i += 1,
            }
        }

        matches
    }
}

/// Case-insensitive comparison of a dictionary word with any textual token.
pub fn eq_ignore_case<T: AsRef<str> + ?Sized>(word: &String, token: &T) -> bool {
    word.chars()
        .flat_map(char::to_lowercase)
        .eq(token.as_ref().chars().flat_map(char::to_lowercase))
}
