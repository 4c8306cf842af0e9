//! Match-time evaluation of a compiled search expression over one view.

use std::sync::Arc;

use tracing::trace;

use super::aliases::AttrValue;
use super::ast::{Expected, Literal, Node, TypeTerm};
use super::SearchExpr;
use crate::erased::ErasedIndex;
use crate::{Label, TextRange};

/// How the next label must relate to the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    /// First term of an attempt: must start exactly at the position.
    Start,
    /// After `->`: must start at the position, whitespace aside.
    Adjacent,
    /// Anywhere at or after the position.
    Free,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LabelRef {
    type_slot: usize,
    position: usize,
}

#[derive(Debug, Clone, Copy)]
struct State {
    pos: usize,
    anchor: Anchor,
    /// Minimal start among consumed labels.
    begin: Option<usize>,
    last: Option<LabelRef>,
}

impl State {
    fn at(pos: usize, anchor: Anchor) -> Self {
        Self {
            pos,
            anchor,
            begin: None,
            last: None,
        }
    }

    fn consume(self, range: TextRange, label: LabelRef) -> Self {
        Self {
            pos: range.end,
            anchor: Anchor::Free,
            begin: Some(self.begin.map_or(range.start, |begin| begin.min(range.start))),
            last: Some(label),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Capture {
    range: TextRange,
    label: Option<LabelRef>,
}

type Captures = Vec<Option<Capture>>;

struct Matcher<'s> {
    text: &'s str,
    indices: &'s [Arc<dyn ErasedIndex>],
}

impl<'s> Matcher<'s> {
    fn match_node(
        &self,
        node: &Node,
        state: State,
        limit: usize,
        captures: &mut Captures,
    ) -> Option<State> {
        match node {
            Node::Sequence(nodes) => {
                let mut state = state;
                for node in nodes {
                    state = self.match_node(node, state, limit, captures)?;
                }
                Some(state)
            }
            Node::Alternation(alternatives) => {
                for alternative in alternatives {
                    let snapshot = captures.clone();
                    if let Some(next) = self.match_node(alternative, state, limit, captures) {
                        return Some(next);
                    }
                    *captures = snapshot;
                }
                None
            }
            Node::Adjacent => Some(State {
                anchor: Anchor::Adjacent,
                ..state
            }),
            Node::Repeat { node, min, max } => {
                let mut state = state;
                let mut count = 0;
                while max.map_or(true, |max| count < max) {
                    let snapshot = captures.clone();
                    match self.match_node(node, state, limit, captures) {
                        Some(next) => {
                            count += 1;
                            let stalled = next.pos == state.pos
                                && next.begin == state.begin
                                && next.anchor == state.anchor;
                            state = next;
                            if stalled {
                                break;
                            }
                        }
                        None => {
                            *captures = snapshot;
                            break;
                        }
                    }
                }
                if count >= *min {
                    Some(state)
                } else {
                    None
                }
            }
            Node::Capture { slot, node } => {
                let inner = self.match_node(
                    node,
                    State {
                        begin: None,
                        last: None,
                        ..state
                    },
                    limit,
                    captures,
                )?;
                if let Some(begin) = inner.begin {
                    captures[*slot] = Some(Capture {
                        range: TextRange::new(begin, inner.pos),
                        label: inner.last,
                    });
                }
                Some(State {
                    begin: match (state.begin, inner.begin) {
                        (Some(a), Some(b)) => Some(a.min(b)),
                        (a, b) => a.or(b),
                    },
                    last: inner.last.or(state.last),
                    ..inner
                })
            }
            Node::Lookahead { node, negate } => {
                let mut tentative = captures.clone();
                let found = self.match_node(node, state, limit, &mut tentative).is_some();
                if found == *negate {
                    return None;
                }
                if found {
                    *captures = tentative;
                }
                Some(state)
            }
            Node::Type(term) => self.match_label(term, false, None, state, limit, captures),
            Node::Pinned(pinned) => self.match_label(
                &pinned.label,
                pinned.seek,
                Some((pinned.conditions.as_slice(), pinned.exact)),
                state,
                limit,
                captures,
            ),
            Node::Literal(literal) => self.match_literal(literal, state, limit),
        }
    }

    /// Offset of the first non-whitespace character at or after `pos`.
    fn skip_whitespace(&self, pos: usize, limit: usize) -> usize {
        let rest = self.text.get(pos..limit.min(self.text.len())).unwrap_or("");
        pos + (rest.len() - rest.trim_start().len())
    }

    /// Last start offset the anchor allows, if any.
    fn window_end(&self, state: State, limit: usize) -> Option<usize> {
        match state.anchor {
            Anchor::Start => Some(state.pos),
            Anchor::Adjacent => Some(self.skip_whitespace(state.pos, limit)),
            Anchor::Free => None,
        }
    }

    fn match_label(
        &self,
        term: &TypeTerm,
        seek: bool,
        conditions: Option<(&[Node], bool)>,
        state: State,
        limit: usize,
        captures: &mut Captures,
    ) -> Option<State> {
        let index = &self.indices[term.type_slot];
        let window_end = self.window_end(state, limit);
        let mut nearest: Option<usize> = None;

        for position in index.lower_bound(state.pos)..index.len() {
            let range = index.range_at(position);
            if range.start > limit
                || window_end.map_or(false, |end| range.start > end)
                || nearest.map_or(false, |start| range.start > start)
            {
                break;
            }
            if range.end > limit || !self.predicates_hold(term, &**index, position, captures) {
                continue;
            }
            if !seek && state.anchor == Anchor::Free {
                nearest.get_or_insert(range.start);
            }

            let snapshot = captures.clone();
            if self.conditions_hold(conditions, range, captures) {
                return Some(state.consume(
                    range,
                    LabelRef {
                        type_slot: term.type_slot,
                        position,
                    },
                ));
            }
            *captures = snapshot;
        }

        None
    }

    /// Back-references to captures that have not matched yet never hold.
    fn predicates_hold(
        &self,
        term: &TypeTerm,
        index: &dyn ErasedIndex,
        position: usize,
        captures: &Captures,
    ) -> bool {
        let label = index.label_at(position);
        term.predicates.iter().all(|predicate| {
            let actual = (predicate.extract)(label);
            match &predicate.expected {
                Expected::Value(expected) => actual.as_ref() == Some(expected),
                Expected::Span { slot, .. } => match (actual, captures[*slot]) {
                    (Some(AttrValue::Span(range)), Some(capture)) => range == capture.range,
                    _ => false,
                },
                Expected::Captured { slot, extract, .. } => {
                    let bound = captures[*slot]
                        .and_then(|capture| capture.label)
                        .and_then(|bound| {
                            extract(self.indices[bound.type_slot].label_at(bound.position))
                        });
                    actual.is_some() && actual == bound
                }
            }
        })
    }

    fn conditions_hold(
        &self,
        conditions: Option<(&[Node], bool)>,
        range: TextRange,
        captures: &mut Captures,
    ) -> bool {
        let Some((conditions, exact)) = conditions else {
            return true;
        };

        conditions.iter().all(|condition| {
            match self.match_node(
                condition,
                State::at(range.start, Anchor::Free),
                range.end,
                captures,
            ) {
                Some(inner) => !exact || (inner.begin == Some(range.start) && inner.pos == range.end),
                None => false,
            }
        })
    }

    fn match_literal(&self, literal: &Literal, state: State, limit: usize) -> Option<State> {
        let index = &self.indices[literal.type_slot];
        let window_end = self.window_end(state, limit);

        for position in index.lower_bound(state.pos)..index.len() {
            let first = index.range_at(position);
            if first.start > limit || window_end.map_or(false, |end| first.start > end) {
                break;
            }

            let last = position + literal.word_count - 1;
            if last >= index.len() {
                break;
            }
            let end = index.range_at(last).end;
            if end > limit {
                continue;
            }

            let texts: Option<Vec<&str>> = (position..=last)
                .map(|p| (literal.text_of)(index.label_at(p)))
                .collect();
            let Some(texts) = texts else {
                continue;
            };
            if literal.words.longest_match_at(&texts, 0) == Some(literal.word_count - 1) {
                return Some(state.consume(
                    TextRange::new(first.start, end),
                    LabelRef {
                        type_slot: literal.type_slot,
                        position: last,
                    },
                ));
            }
        }

        None
    }
}

/// Stateful cursor yielding successive matches of a [`SearchExpr`] in one
/// view.
///
/// Each [`search`](Searcher::search) finds the next leftmost match at or after
/// the cursor and moves the cursor past it. Once `search` returns false the
/// searcher stays exhausted until [`reset`](Searcher::reset).
pub struct Searcher<'e> {
    expr: &'e SearchExpr,
    text: Arc<str>,
    indices: Vec<Arc<dyn ErasedIndex>>,
    range: TextRange,
    candidates: Vec<usize>,
    cursor: usize,
    exhausted: bool,
    matched: Option<TextRange>,
    captures: Captures,
}

impl<'e> std::fmt::Debug for Searcher<'e> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Searcher")
            .field("expr", &self.expr.source())
            .field("range", &self.range)
            .field("cursor", &self.cursor)
            .field("exhausted", &self.exhausted)
            .field("matched", &self.matched)
            .finish()
    }
}

impl<'e> Searcher<'e> {
    pub(crate) fn new(
        expr: &'e SearchExpr,
        text: Arc<str>,
        indices: Vec<Arc<dyn ErasedIndex>>,
        range: TextRange,
    ) -> Self {
        let mut searcher = Self {
            expr,
            text,
            indices,
            range,
            candidates: Vec::new(),
            cursor: range.start,
            exhausted: false,
            matched: None,
            captures: vec![None; expr.capture_names().len()],
        };
        searcher.reset(range);
        searcher
    }

    /// Restart from the beginning of `range`, forgetting the last match.
    pub fn reset(&mut self, range: TextRange) {
        let mut candidates = Vec::new();
        for index in &self.indices {
            for position in index.lower_bound(range.start)..index.len() {
                let label = index.range_at(position);
                if label.start > range.end {
                    break;
                }
                if label.end <= range.end {
                    candidates.push(label.start);
                }
            }
        }
        candidates.sort_unstable();
        candidates.dedup();

        self.range = range;
        self.candidates = candidates;
        self.cursor = range.start;
        self.exhausted = false;
        self.clear_match();
    }

    fn clear_match(&mut self) {
        self.matched = None;
        for capture in self.captures.iter_mut() {
            *capture = None;
        }
    }

    /// Find the next match. Returns false once no match remains.
    pub fn search(&mut self) -> bool {
        if self.exhausted {
            return false;
        }

        let matcher = Matcher {
            text: &self.text,
            indices: &self.indices,
        };
        let first = self.candidates.partition_point(|start| *start < self.cursor);

        for &start in &self.candidates[first..] {
            let mut captures = vec![None; self.captures.len()];
            let Some(state) = matcher.match_node(
                &self.expr.root,
                State::at(start, Anchor::Start),
                self.range.end,
                &mut captures,
            ) else {
                continue;
            };
            let Some(begin) = state.begin else {
                continue;
            };

            let matched = TextRange::new(begin, state.pos);
            trace!(expr = self.expr.source(), %matched, "search matched");
            self.matched = Some(matched);
            self.captures = captures;
            self.cursor = state.pos.max(start + 1);
            return true;
        }

        self.exhausted = true;
        self.clear_match();
        false
    }

    /// The range searched since the last reset.
    pub fn range(&self) -> TextRange {
        self.range
    }

    /// Span of the last match: minimal start and maximal end of its labels.
    pub fn matched(&self) -> Option<TextRange> {
        self.matched
    }

    pub fn begin(&self) -> Option<usize> {
        self.matched.map(|range| range.start)
    }

    pub fn end(&self) -> Option<usize> {
        self.matched.map(|range| range.end)
    }

    pub fn matched_text(&self) -> Option<&str> {
        self.matched.and_then(|range| range.covered_text(&self.text))
    }

    pub fn group_names(&self) -> &[String] {
        self.expr.capture_names()
    }

    fn capture(&self, name: &str) -> Option<&Capture> {
        let slot = self.expr.capture_slot(name)?;
        self.captures[slot].as_ref()
    }

    /// Span bound to capture `name` by the last match, if it took part.
    pub fn span(&self, name: &str) -> Option<TextRange> {
        self.capture(name).map(|capture| capture.range)
    }

    /// Label bound to capture `name` by the last match, if it took part and
    /// is of type `T`.
    ///
    /// Around a repetition or a group this is the last label the capture
    /// consumed: `n:Number+` binds the final number, `x:(A | B)` whichever
    /// alternative matched.
    pub fn label<T: Label>(&self, name: &str) -> Option<&T> {
        let label = self.capture(name)?.label?;
        self.indices[label.type_slot]
            .label_at(label.position)
            .downcast_ref::<T>()
    }
}
