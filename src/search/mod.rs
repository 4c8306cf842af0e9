//! Pattern expressions over the labels of a view.
//!
//! An expression is compiled once against a [`LabelAliases`] table and can
//! then be run over any number of views:
//!
//! ```
//! use layered_labels::{Label, LabelAliases, SearchExpr, Spanned, TextRange, View};
//!
//! #[derive(Debug)]
//! struct Number(TextRange);
//! impl Spanned for Number {
//!     fn text_range(&self) -> TextRange { self.0 }
//! }
//! impl Label for Number {}
//!
//! let mut aliases = LabelAliases::new();
//! aliases.register::<Number>("Number");
//! let expr = SearchExpr::parse(&aliases, "first:Number -> Number").unwrap();
//!
//! let mut view = View::new("v", "10 20 30");
//! for range in [0..2, 3..5, 6..8] {
//!     view.add(Number(range.into())).unwrap();
//! }
//!
//! let mut searcher = expr.create_searcher(&mut view);
//! assert!(searcher.search());
//! assert_eq!(searcher.matched(), Some(TextRange::new(0, 5)));
//! assert_eq!(searcher.span("first"), Some(TextRange::new(0, 2)));
//! assert!(!searcher.search());
//! ```
//!
//! Syntax summary:
//!
//! | form | meaning |
//! |------|---------|
//! | `A B` | `A`, then the nearest `B` at or after its end |
//! | `A -> B` | `B` must begin where `A` ends, whitespace aside |
//! | `A \| B` | ordered choice |
//! | `(...)`, `(...)?`, `*`, `+`, `{m,n}` | grouping and greedy repetition |
//! | `name:A` | capture |
//! | `A<accessor=value>` | attribute predicate |
//! | `A<accessor=$name>`, `A<accessor=$name.other>` | equals the span of capture `name`, or accessor `other` of its label |
//! | `(?=...)`, `(?!...)` | the group must (or must not) match here; consumes nothing |
//! | `[A cond & cond]` | every condition matches inside the `A` label |
//! | `[!A cond]`, `[?A]` | conditions cover `A` exactly; try every `A`, not only the nearest |
//! | `"a few"` | consecutive tokens of the registered token type |

mod aliases;
mod ast;
mod lexer;
mod parser;
mod searcher;

use tracing::debug;

pub use aliases::{AttrValue, LabelAliases, TypeRegistration};
pub use searcher::Searcher;

use crate::erased::LabelKind;
use crate::{SearchExprError, TextRange, View};

/// A compiled search expression. Immutable and shareable across threads.
pub struct SearchExpr {
    source: String,
    root: ast::Node,
    kinds: Vec<LabelKind>,
    capture_names: Vec<String>,
}

impl std::fmt::Debug for SearchExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchExpr")
            .field("source", &self.source)
            .field("root", &self.root)
            .finish()
    }
}

impl SearchExpr {
    /// Compile `expression`, resolving type names through `aliases`.
    pub fn parse(aliases: &LabelAliases, expression: &str) -> Result<Self, SearchExprError> {
        let compiled = parser::Parser::new(aliases, expression)?.parse()?;
        debug!(
            expression,
            label_types = compiled.kinds.len(),
            captures = compiled.capture_names.len(),
            "compiled search expression"
        );

        Ok(Self {
            source: expression.to_string(),
            root: compiled.root,
            kinds: compiled.kinds,
            capture_names: compiled.capture_names,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Capture names in declaration order.
    pub fn capture_names(&self) -> &[String] {
        &self.capture_names
    }

    pub(crate) fn capture_slot(&self, name: &str) -> Option<usize> {
        self.capture_names.iter().position(|known| known == name)
    }

    /// Searcher over the whole view.
    ///
    /// Finalizes the labelers of every label type the expression references.
    pub fn create_searcher(&self, view: &mut View) -> Searcher<'_> {
        let range = TextRange::of_text(view.text());
        self.create_searcher_in(view, range)
    }

    /// Searcher restricted to labels inside `range`.
    pub fn create_searcher_in(&self, view: &mut View, range: TextRange) -> Searcher<'_> {
        let indices = self
            .kinds
            .iter()
            .map(|kind| view.erased_index(kind))
            .collect();
        Searcher::new(self, view.shared_text(), indices, range)
    }
}
