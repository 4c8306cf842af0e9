//! Recursive descent parser for search expressions
//!
//! # Grammar
//!
//! ```text
//! expr        := alternation EOF
//! alternation := sequence ('|' sequence)*
//! sequence    := element+
//! element     := '->' | (IDENT ':')? primary quantifier?
//! primary     := '(' alternation ')' | lookahead | pinned | type_ref | STRING
//! lookahead   := '(' '?' ('=' | '!') alternation ')'
//! pinned      := '[' ('?' | '!')* (IDENT ':')? type_ref (alternation ('&' alternation)*)? ']'
//! type_ref    := IDENT ('<' predicate (',' predicate)* '>')?
//! predicate   := IDENT '=' (STRING | INT | IDENT | backref)
//! backref     := '$' IDENT ('.' IDENT)?
//! quantifier  := ('?' | '*' | '+' | '{' INT (',' INT?)? '}') '+'?
//! ```
//!
//! A trailing `+` marks a quantifier possessive. Repetition never gives back
//! what it matched, so it changes nothing; reluctant `??` / `*?` are
//! rejected.
//!
//! Aliases, accessors and capture names are resolved while parsing, so every
//! error carries the byte offset of the token that caused it.

use super::aliases::{AttrValue, LabelAliases};
use super::ast::{Expected, Literal, Node, Pinned, Predicate, TypeTerm};
use super::lexer::{Lexeme, Lexer, Token};
use crate::erased::LabelKind;
use crate::{SearchExprError, SequenceDetector};

/// Output of a successful parse.
pub(crate) struct Compiled {
    pub root: Node,
    pub kinds: Vec<LabelKind>,
    pub capture_names: Vec<String>,
}

pub(crate) struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Lexeme,
    aliases: &'a LabelAliases,
    kinds: Vec<LabelKind>,
    capture_names: Vec<String>,
    /// Alias of the label each capture binds, when it is always one type.
    capture_aliases: Vec<Option<String>>,
}

type Result<T> = std::result::Result<T, SearchExprError>;

impl<'a> Parser<'a> {
    pub fn new(aliases: &'a LabelAliases, input: &'a str) -> Result<Self> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_lexeme()?;

        Ok(Self {
            lexer,
            current,
            aliases,
            kinds: Vec::new(),
            capture_names: Vec::new(),
            capture_aliases: Vec::new(),
        })
    }

    pub fn parse(mut self) -> Result<Compiled> {
        let root = self.parse_alternation()?;

        if self.current.token != Token::Eof {
            return Err(self.unexpected("end of expression"));
        }

        Ok(Compiled {
            root,
            kinds: self.kinds,
            capture_names: self.capture_names,
        })
    }

    fn advance(&mut self) -> Result<Lexeme> {
        let next = self.lexer.next_lexeme()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn unexpected(&self, expected: &str) -> SearchExprError {
        SearchExprError::Syntax {
            offset: self.current.offset,
            message: format!("expected {}, found {:?}", expected, self.current.token),
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<Lexeme> {
        if self.current.token == token {
            self.advance()
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_ident(&mut self, expected: &str) -> Result<(String, usize)> {
        match &self.current.token {
            Token::Ident(name) => {
                let name = name.clone();
                let offset = self.advance()?.offset;
                Ok((name, offset))
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn ends_sequence(&self) -> bool {
        matches!(
            self.current.token,
            Token::Pipe | Token::RightParen | Token::RightBracket | Token::Amp | Token::Eof
        )
    }

    /// Parse: alternation := sequence ('|' sequence)*
    fn parse_alternation(&mut self) -> Result<Node> {
        let mut alternatives = vec![self.parse_sequence()?];

        while self.current.token == Token::Pipe {
            self.advance()?;
            alternatives.push(self.parse_sequence()?);
        }

        if alternatives.len() == 1 {
            Ok(alternatives.remove(0))
        } else {
            Ok(Node::Alternation(alternatives))
        }
    }

    /// Parse: sequence := element+
    fn parse_sequence(&mut self) -> Result<Node> {
        let mut elements = Vec::new();

        while !self.ends_sequence() {
            elements.push(self.parse_element()?);
        }

        match elements.len() {
            0 => Err(self.unexpected("a term")),
            1 => Ok(elements.remove(0)),
            _ => Ok(Node::Sequence(elements)),
        }
    }

    /// Parse: element := '->' | (IDENT ':')? primary quantifier?
    fn parse_element(&mut self) -> Result<Node> {
        if self.current.token == Token::Arrow {
            self.advance()?;
            return Ok(Node::Adjacent);
        }

        let element = match self.current.token.clone() {
            Token::Ident(name) => {
                let offset = self.advance()?.offset;
                if self.current.token == Token::Colon {
                    self.advance()?;
                    let slot = self.declare_capture(name, offset)?;
                    let node = self.parse_quantified()?;
                    self.capture_aliases[slot] = bound_alias(&node);
                    return Ok(Node::Capture {
                        slot,
                        node: Box::new(node),
                    });
                }
                Node::Type(self.parse_type_ref(name, offset)?)
            }
            _ => self.parse_primary()?,
        };

        self.parse_quantifier(element)
    }

    fn parse_quantified(&mut self) -> Result<Node> {
        let primary = match self.current.token.clone() {
            Token::Ident(name) => {
                let offset = self.advance()?.offset;
                Node::Type(self.parse_type_ref(name, offset)?)
            }
            _ => self.parse_primary()?,
        };
        self.parse_quantifier(primary)
    }

    /// Parse: primary := '(' alternation ')' | lookahead | pinned | STRING
    fn parse_primary(&mut self) -> Result<Node> {
        match self.current.token.clone() {
            Token::LeftParen => {
                self.advance()?;
                if self.current.token == Token::Question {
                    return self.parse_lookahead();
                }
                let inner = self.parse_alternation()?;
                self.expect(Token::RightParen, "')'")?;
                Ok(inner)
            }
            Token::LeftBracket => self.parse_pinned(),
            Token::Str(text) => {
                let offset = self.advance()?.offset;
                self.literal(text, offset)
            }
            _ => Err(self.unexpected("a term")),
        }
    }

    /// Parse the rest of: lookahead := '(' '?' ('=' | '!') alternation ')'
    fn parse_lookahead(&mut self) -> Result<Node> {
        self.expect(Token::Question, "'?'")?;
        let negate = match self.current.token {
            Token::Eq => false,
            Token::Bang => true,
            _ => return Err(self.unexpected("'=' or '!'")),
        };
        self.advance()?;

        let node = self.parse_alternation()?;
        self.expect(Token::RightParen, "')'")?;
        Ok(Node::Lookahead {
            node: Box::new(node),
            negate,
        })
    }

    /// Parse: pinned := '[' ('?' | '!')* (IDENT ':')? type_ref conditions? ']'
    fn parse_pinned(&mut self) -> Result<Node> {
        self.expect(Token::LeftBracket, "'['")?;

        let mut seek = false;
        let mut exact = false;
        loop {
            match self.current.token {
                Token::Question => seek = true,
                Token::Bang => exact = true,
                _ => break,
            }
            self.advance()?;
        }

        let (name, offset) = self.expect_ident("a label type")?;
        let (capture, label) = if self.current.token == Token::Colon {
            self.advance()?;
            let slot = self.declare_capture(name, offset)?;
            let (alias, alias_offset) = self.expect_ident("a label type")?;
            self.capture_aliases[slot] = Some(alias.clone());
            (Some(slot), self.parse_type_ref(alias, alias_offset)?)
        } else {
            (None, self.parse_type_ref(name, offset)?)
        };

        let mut conditions = Vec::new();
        if self.current.token != Token::RightBracket {
            conditions.push(self.parse_alternation()?);
            while self.current.token == Token::Amp {
                self.advance()?;
                conditions.push(self.parse_alternation()?);
            }
        }

        self.expect(Token::RightBracket, "']'")?;

        let pinned = Node::Pinned(Pinned {
            label,
            seek,
            exact,
            conditions,
        });

        Ok(match capture {
            Some(slot) => Node::Capture {
                slot,
                node: Box::new(pinned),
            },
            None => pinned,
        })
    }

    /// Parse: type_ref := IDENT ('<' predicate (',' predicate)* '>')?
    fn parse_type_ref(&mut self, alias: String, offset: usize) -> Result<TypeTerm> {
        let aliases = self.aliases;
        let registered = aliases
            .get(&alias)
            .ok_or_else(|| SearchExprError::UnknownAlias {
                offset,
                alias: alias.clone(),
            })?;
        let type_slot = self.type_slot(registered.kind);

        let mut predicates = Vec::new();
        if self.current.token == Token::LeftAngle {
            self.advance()?;
            loop {
                let (accessor, accessor_offset) = self.expect_ident("an accessor name")?;
                let extract = registered.accessors.get(&accessor).cloned().ok_or_else(|| {
                    SearchExprError::UnknownAccessor {
                        offset: accessor_offset,
                        alias: alias.clone(),
                        accessor: accessor.clone(),
                    }
                })?;
                self.expect(Token::Eq, "'='")?;
                let expected = match self.current.token {
                    Token::Dollar => self.parse_back_reference()?,
                    _ => Expected::Value(self.parse_value()?),
                };
                predicates.push(Predicate {
                    accessor,
                    expected,
                    extract,
                });

                if self.current.token == Token::Comma {
                    self.advance()?;
                } else {
                    break;
                }
            }
            self.expect(Token::RightAngle, "'>'")?;
        }

        Ok(TypeTerm {
            alias,
            type_slot,
            predicates,
        })
    }

    fn parse_value(&mut self) -> Result<AttrValue> {
        let value = match &self.current.token {
            Token::Str(text) => AttrValue::Text(text.clone()),
            Token::Int(value) => AttrValue::Int(*value),
            Token::Ident(name) if name == "true" => AttrValue::Bool(true),
            Token::Ident(name) if name == "false" => AttrValue::Bool(false),
            Token::Ident(name) => AttrValue::Text(name.clone()),
            _ => return Err(self.unexpected("a value")),
        };
        self.advance()?;
        Ok(value)
    }

    /// Parse: backref := '$' IDENT ('.' IDENT)?
    fn parse_back_reference(&mut self) -> Result<Expected> {
        self.expect(Token::Dollar, "'$'")?;
        let (name, offset) = self.expect_ident("a capture name")?;
        let slot = self
            .capture_names
            .iter()
            .position(|known| *known == name)
            .ok_or_else(|| SearchExprError::UnknownCapture {
                offset,
                name: name.clone(),
            })?;
        if self.current.token != Token::Dot {
            return Ok(Expected::Span { name, slot });
        }
        self.advance()?;

        let (accessor, accessor_offset) = self.expect_ident("an accessor name")?;
        let Some(alias) = self.capture_aliases[slot].clone() else {
            return Err(SearchExprError::Syntax {
                offset,
                message: format!("capture {:?} does not bind a single label type", name),
            });
        };
        let extract = self
            .aliases
            .get(&alias)
            .and_then(|registered| registered.accessors.get(&accessor))
            .cloned()
            .ok_or_else(|| SearchExprError::UnknownAccessor {
                offset: accessor_offset,
                alias,
                accessor: accessor.clone(),
            })?;
        Ok(Expected::Captured {
            name,
            slot,
            accessor,
            extract,
        })
    }

    /// Parse: quantifier := ('?' | '*' | '+' | '{' INT (',' INT?)? '}') '+'?
    fn parse_quantifier(&mut self, node: Node) -> Result<Node> {
        let (min, max) = match self.current.token {
            Token::Question => (0, Some(1)),
            Token::Star => (0, None),
            Token::Plus => (1, None),
            Token::LeftBrace => {
                self.advance()?;
                let min = self.parse_count()?;
                let max = if self.current.token == Token::Comma {
                    self.advance()?;
                    match self.current.token {
                        Token::RightBrace => None,
                        _ => Some(self.parse_count()?),
                    }
                } else {
                    Some(min)
                };
                if let Some(max) = max {
                    if max < min {
                        return Err(SearchExprError::Syntax {
                            offset: self.current.offset,
                            message: format!("repetition maximum {} is below minimum {}", max, min),
                        });
                    }
                }
                if self.current.token != Token::RightBrace {
                    return Err(self.unexpected("'}'"));
                }
                (min, max)
            }
            _ => return Ok(node),
        };
        self.advance()?;

        match self.current.token {
            Token::Plus => {
                self.advance()?;
            }
            Token::Question => {
                return Err(SearchExprError::Syntax {
                    offset: self.current.offset,
                    message: "reluctant repetition is not supported".to_string(),
                });
            }
            _ => {}
        }

        Ok(Node::Repeat {
            node: Box::new(node),
            min,
            max,
        })
    }

    fn parse_count(&mut self) -> Result<u32> {
        match self.current.token {
            Token::Int(value) => {
                let count = u32::try_from(value).map_err(|_| SearchExprError::Syntax {
                    offset: self.current.offset,
                    message: format!("invalid repetition count {}", value),
                })?;
                self.advance()?;
                Ok(count)
            }
            _ => Err(self.unexpected("a repetition count")),
        }
    }

    fn literal(&mut self, text: String, offset: usize) -> Result<Node> {
        let aliases = self.aliases;
        let (_, registered) = aliases
            .token_type()
            .ok_or(SearchExprError::NoTokenType { offset })?;
        let text_of = match registered.text_of {
            Some(text_of) => text_of,
            None => return Err(SearchExprError::NoTokenType { offset }),
        };
        let type_slot = self.type_slot(registered.kind);

        let word_count = text.split_whitespace().count();
        if word_count == 0 {
            return Err(SearchExprError::Syntax {
                offset,
                message: "empty literal".to_string(),
            });
        }
        let words = SequenceDetector::from_phrases([text.as_str()], |word: &String, token: &str| {
            word == token
        });

        Ok(Node::Literal(Literal {
            text,
            type_slot,
            text_of,
            words,
            word_count,
        }))
    }

    fn declare_capture(&mut self, name: String, offset: usize) -> Result<usize> {
        if self.capture_names.contains(&name) {
            return Err(SearchExprError::DuplicateCapture { offset, name });
        }
        self.capture_names.push(name);
        self.capture_aliases.push(None);
        Ok(self.capture_names.len() - 1)
    }

    fn type_slot(&mut self, kind: LabelKind) -> usize {
        match self.kinds.iter().position(|known| *known == kind) {
            Some(slot) => slot,
            None => {
                self.kinds.push(kind);
                self.kinds.len() - 1
            }
        }
    }
}

/// Alias of the label a capture around `node` binds, when that is always
/// the same type.
fn bound_alias(node: &Node) -> Option<String> {
    match node {
        Node::Type(term) => Some(term.alias.clone()),
        Node::Pinned(pinned) => Some(pinned.label.alias.clone()),
        Node::Repeat { node, .. } => bound_alias(node),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Label, Spanned, TextRange, Token as TokenLabel};

    #[derive(Debug)]
    struct Number(TextRange);

    impl Spanned for Number {
        fn text_range(&self) -> TextRange {
            self.0
        }
    }

    impl Label for Number {}

    fn aliases() -> LabelAliases {
        let mut aliases = LabelAliases::new();
        aliases
            .register::<Number>("Number")
            .with_accessor("span", |n: &Number| n.0);
        aliases.register::<Number>("Num");
        aliases
            .register_token_type::<TokenLabel>("Token")
            .with_accessor("spaced", |t: &TokenLabel| t.has_space_after);
        aliases
    }

    fn parse(input: &str) -> Result<Compiled> {
        let aliases = aliases();
        Parser::new(&aliases, input)?.parse()
    }

    fn shape(input: &str) -> String {
        format!("{:?}", parse(input).unwrap().root)
    }

    #[test]
    fn test_sequence_and_alternation() {
        assert_eq!(
            shape("Number -> Token | Num"),
            "Alternation([Sequence([Type(Number), Adjacent, Type(Token)]), Type(Num)])"
        );
    }

    #[test]
    fn test_captures_and_quantifiers() {
        let compiled = parse("([?cue:Token] ->)? n:Number+ Token{1,3}").unwrap();
        assert_eq!(compiled.capture_names, vec!["cue", "n"]);
        assert_eq!(
            format!("{:?}", compiled.root),
            "Sequence([Repeat { node: Sequence([Capture { slot: 0, node: Pinned { label: Token, seek: true, exact: false, conditions: [] } }, Adjacent]), min: 0, max: Some(1) }, Capture { slot: 1, node: Repeat { node: Type(Number), min: 1, max: None } }, Repeat { node: Type(Token), min: 1, max: Some(3) }])"
        );
    }

    #[test]
    fn test_possessive_suffix_is_accepted() {
        assert_eq!(
            shape("Number*+ Token{1,2}+"),
            "Sequence([Repeat { node: Type(Number), min: 0, max: None }, Repeat { node: Type(Token), min: 1, max: Some(2) }])"
        );
        assert!(matches!(
            parse("Number+? Token"),
            Err(SearchExprError::Syntax { offset: 7, .. })
        ));
    }

    #[test]
    fn test_lookahead() {
        assert_eq!(
            shape("Number (?!-> Token<spaced=false>) (?=Num)"),
            "Sequence([Type(Number), Lookahead { node: Sequence([Adjacent, Type(Token<spaced=false>)]), negate: true }, Lookahead { node: Type(Num), negate: false }])"
        );
        assert!(matches!(
            parse("(?<a>Number)"),
            Err(SearchExprError::Syntax { offset: 2, .. })
        ));
    }

    #[test]
    fn test_back_references() {
        assert_eq!(
            shape("n:Number+ t:Token Token<text=$t.text, spaced=true> Number<span=$n>"),
            "Sequence([Capture { slot: 0, node: Repeat { node: Type(Number), min: 1, max: None } }, Capture { slot: 1, node: Type(Token) }, Type(Token<text=$t.text, spaced=true>), Type(Number<span=$n>)])"
        );
        assert_eq!(
            parse("Token<text=$t.text>").err(),
            Some(SearchExprError::UnknownCapture {
                offset: 12,
                name: "t".to_string(),
            })
        );
        assert_eq!(
            parse("n:Number Token<text=$n.text>").err(),
            Some(SearchExprError::UnknownAccessor {
                offset: 23,
                alias: "Number".to_string(),
                accessor: "text".to_string(),
            })
        );
        assert!(matches!(
            parse("g:(Number Token) Token<text=$g.text>"),
            Err(SearchExprError::Syntax { offset: 29, .. })
        ));
    }

    #[test]
    fn test_aliases_of_one_type_share_slot() {
        let compiled = parse("Number Num Token").unwrap();
        assert_eq!(compiled.kinds.len(), 2);
    }

    #[test]
    fn test_predicates() {
        assert_eq!(
            shape(r#"[!Token<text="a", spaced=true> "a"]"#),
            r#"Pinned { label: Token<text="a", spaced=true>, seek: false, exact: true, conditions: [Literal("a")] }"#
        );
    }

    #[test]
    fn test_unknown_alias_offset() {
        assert_eq!(
            parse("Number | Fuzzy").err(),
            Some(SearchExprError::UnknownAlias {
                offset: 9,
                alias: "Fuzzy".to_string(),
            })
        );
    }

    #[test]
    fn test_unknown_accessor_offset() {
        assert_eq!(
            parse("Token<pos=DT>").err(),
            Some(SearchExprError::UnknownAccessor {
                offset: 6,
                alias: "Token".to_string(),
                accessor: "pos".to_string(),
            })
        );
    }

    #[test]
    fn test_syntax_errors_carry_offsets() {
        for (input, offset) in [
            ("(Number", 7),
            ("Number |", 8),
            ("Number )", 7),
            ("Token<text=>", 11),
            ("Number{3,1}", 10),
            ("[Number", 7),
            ("\"\"", 0),
        ] {
            match parse(input) {
                Err(SearchExprError::Syntax { offset: at, .. }) => {
                    assert_eq!(at, offset, "offset for {:?}", input)
                }
                other => panic!("expected syntax error for {:?}, got {:?}", input, other.err()),
            }
        }
    }

    #[test]
    fn test_duplicate_capture() {
        assert_eq!(
            parse("a:Number a:Token").err(),
            Some(SearchExprError::DuplicateCapture {
                offset: 9,
                name: "a".to_string(),
            })
        );
    }

    #[test]
    fn test_literal_needs_token_type() {
        let mut aliases = LabelAliases::new();
        aliases.register::<Number>("Number");
        let err = Parser::new(&aliases, "Number \"a\"")
            .and_then(|parser| parser.parse())
            .err();
        assert_eq!(err, Some(SearchExprError::NoTokenType { offset: 7 }));
    }
}
