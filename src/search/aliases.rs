//! Alias table resolving the type names used in search expressions.
//!
//! Each alias maps to a label type plus the accessors that attribute
//! predicates (`Type<accessor=value>`) may reference on it. Accessors are
//! registered up front; an expression naming an unregistered accessor does
//! not compile.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::erased::LabelKind;
use crate::{HasText, Label, TextRange};

/// Value produced by an accessor and compared against predicate literals.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttrValue {
    Text(String),
    Int(i64),
    Bool(bool),
    /// A span, compared against `$capture` back-references.
    Span(TextRange),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(text) => write!(f, "{:?}", text),
            AttrValue::Int(value) => write!(f, "{}", value),
            AttrValue::Bool(value) => write!(f, "{}", value),
            AttrValue::Span(range) => write!(f, "{}", range),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Int(value.into())
    }
}

impl From<TextRange> for AttrValue {
    fn from(value: TextRange) -> Self {
        AttrValue::Span(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

pub(crate) type Accessor = Arc<dyn Fn(&dyn Any) -> Option<AttrValue> + Send + Sync>;

pub(crate) type TextOf = fn(&dyn Any) -> Option<&str>;

fn text_of<T: HasText + 'static>(label: &dyn Any) -> Option<&str> {
    label.downcast_ref::<T>().map(HasText::text)
}

#[derive(Clone)]
pub(crate) struct RegisteredType {
    pub(crate) kind: LabelKind,
    pub(crate) accessors: HashMap<String, Accessor>,
    pub(crate) text_of: Option<TextOf>,
}

/// Alias table passed to [`SearchExpr::parse`](crate::SearchExpr::parse).
///
/// ```
/// use layered_labels::{LabelAliases, Token};
///
/// let mut aliases = LabelAliases::new();
/// aliases
///     .register_token_type::<Token>("Token")
///     .with_accessor("spaced", |t: &Token| t.has_space_after);
/// assert!(aliases.contains("Token"));
/// ```
#[derive(Clone, Default)]
pub struct LabelAliases {
    types: HashMap<String, RegisteredType>,
    token_alias: Option<String>,
}

impl fmt::Debug for LabelAliases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut aliases: Vec<_> = self.types.keys().collect();
        aliases.sort();
        f.debug_struct("LabelAliases")
            .field("aliases", &aliases)
            .field("token_alias", &self.token_alias)
            .finish()
    }
}

impl LabelAliases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `alias`, replacing any earlier registration.
    pub fn register<T: Label>(&mut self, alias: &str) -> TypeRegistration<'_, T> {
        let entry = self.insert(
            alias,
            RegisteredType {
                kind: LabelKind::of::<T>(),
                accessors: HashMap::new(),
                text_of: None,
            },
        );
        TypeRegistration {
            entry,
            _marker: PhantomData,
        }
    }

    /// Register `T` as the token type that `"literal"` terms match against.
    /// A `text` accessor is registered for it automatically.
    pub fn register_token_type<T: Label + HasText>(
        &mut self,
        alias: &str,
    ) -> TypeRegistration<'_, T> {
        self.token_alias = Some(alias.to_string());
        let entry = self.insert(
            alias,
            RegisteredType {
                kind: LabelKind::of::<T>(),
                accessors: HashMap::new(),
                text_of: Some(text_of::<T>),
            },
        );
        TypeRegistration {
            entry,
            _marker: PhantomData,
        }
        .with_accessor("text", |token: &T| token.text().to_string())
    }

    fn insert(&mut self, alias: &str, registered: RegisteredType) -> &mut RegisteredType {
        if self.token_alias.as_deref() == Some(alias) && registered.text_of.is_none() {
            self.token_alias = None;
        }
        self.types.insert(alias.to_string(), registered);
        match self.types.get_mut(alias) {
            Some(entry) => entry,
            None => unreachable!("alias was just inserted"),
        }
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.types.contains_key(alias)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub(crate) fn get(&self, alias: &str) -> Option<&RegisteredType> {
        self.types.get(alias)
    }

    pub(crate) fn token_type(&self) -> Option<(&str, &RegisteredType)> {
        let alias = self.token_alias.as_deref()?;
        self.types.get(alias).map(|registered| (alias, registered))
    }
}

/// Builder returned by [`LabelAliases::register`] for adding accessors.
pub struct TypeRegistration<'a, T> {
    entry: &'a mut RegisteredType,
    _marker: PhantomData<fn(&T)>,
}

impl<'a, T: Label> TypeRegistration<'a, T> {
    /// Make `name` usable in `Alias<name=value>` predicates.
    pub fn with_accessor<V: Into<AttrValue>>(
        self,
        name: &str,
        accessor: impl Fn(&T) -> V + Send + Sync + 'static,
    ) -> Self {
        let erased: Accessor = Arc::new(move |label: &dyn Any| {
            label
                .downcast_ref::<T>()
                .map(|l| Into::<AttrValue>::into(accessor(l)))
        });
        self.entry.accessors.insert(name.to_string(), erased);
        self
    }
}
