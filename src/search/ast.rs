//! Compiled form of a search expression.
//!
//! Type references are already resolved: each carries the index of its label
//! type in the expression's type table and its predicate extractors.

use std::fmt;

use super::aliases::{Accessor, AttrValue, TextOf};
use crate::SequenceDetector;

pub(crate) enum Node {
    /// Elements matched in order.
    Sequence(Vec<Node>),
    /// Ordered choice: the first alternative that matches wins.
    Alternation(Vec<Node>),
    /// `->`: the next label must begin where the previous one ended.
    Adjacent,
    /// `?`, `*`, `+` and `{m,n}`. Greedy, never gives back.
    Repeat {
        node: Box<Node>,
        min: u32,
        max: Option<u32>,
    },
    Capture {
        slot: usize,
        node: Box<Node>,
    },
    /// `(?=...)` and `(?!...)`: tests the sub-expression without consuming.
    Lookahead {
        node: Box<Node>,
        negate: bool,
    },
    Type(TypeTerm),
    Pinned(Pinned),
    Literal(Literal),
}

pub(crate) struct TypeTerm {
    pub alias: String,
    /// Index into the expression's type table.
    pub type_slot: usize,
    pub predicates: Vec<Predicate>,
}

pub(crate) struct Predicate {
    pub accessor: String,
    pub expected: Expected,
    pub extract: Accessor,
}

/// Right-hand side of a predicate.
pub(crate) enum Expected {
    Value(AttrValue),
    /// `$name`: the span bound to capture `name`.
    Span { name: String, slot: usize },
    /// `$name.accessor`: an accessor of the label bound to capture `name`.
    Captured {
        name: String,
        slot: usize,
        accessor: String,
        extract: Accessor,
    },
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Value(value) => write!(f, "{}", value),
            Expected::Span { name, .. } => write!(f, "${}", name),
            Expected::Captured { name, accessor, .. } => write!(f, "${}.{}", name, accessor),
        }
    }
}

/// `[Type cond & cond]`
pub(crate) struct Pinned {
    pub label: TypeTerm,
    /// `[?...]`: try every following candidate, not only the nearest.
    pub seek: bool,
    /// `[!...]`: every condition must span the pinned label exactly.
    pub exact: bool,
    pub conditions: Vec<Node>,
}

/// `"a few"`: consecutive tokens with exactly these texts.
pub(crate) struct Literal {
    pub text: String,
    pub type_slot: usize,
    pub text_of: TextOf,
    pub words: SequenceDetector<String, str>,
    pub word_count: usize,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Sequence(nodes) => f.debug_tuple("Sequence").field(nodes).finish(),
            Node::Alternation(nodes) => f.debug_tuple("Alternation").field(nodes).finish(),
            Node::Adjacent => f.write_str("Adjacent"),
            Node::Repeat { node, min, max } => f
                .debug_struct("Repeat")
                .field("node", node)
                .field("min", min)
                .field("max", max)
                .finish(),
            Node::Capture { slot, node } => f
                .debug_struct("Capture")
                .field("slot", slot)
                .field("node", node)
                .finish(),
            Node::Lookahead { node, negate } => f
                .debug_struct("Lookahead")
                .field("node", node)
                .field("negate", negate)
                .finish(),
            Node::Type(term) => write!(f, "Type({:?})", term),
            Node::Pinned(pinned) => f
                .debug_struct("Pinned")
                .field("label", &pinned.label)
                .field("seek", &pinned.seek)
                .field("exact", &pinned.exact)
                .field("conditions", &pinned.conditions)
                .finish(),
            Node::Literal(literal) => write!(f, "Literal({:?})", literal.text),
        }
    }
}

impl fmt::Debug for TypeTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.alias)?;
        if !self.predicates.is_empty() {
            f.write_str("<")?;
            for (i, predicate) in self.predicates.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}={}", predicate.accessor, predicate.expected)?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}
