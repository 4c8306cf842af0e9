//! Lexer for search expressions.

use crate::SearchExprError;

/// Token types for search expressions
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// A type alias, capture name, accessor name or enum value
    Ident(String),
    /// A double-quoted string
    Str(String),
    Int(i64),

    /// `->` adjacency
    Arrow,
    /// `|` alternation
    Pipe,
    /// `?` optional suffix, or seek flag after `[`
    Question,
    /// `!` exact flag after `[`
    Bang,
    /// `:` capture separator
    Colon,
    /// `&` between pinned conditions
    Amp,
    /// `$` back-reference to a capture
    Dollar,
    /// `.` between a back-reference and an accessor
    Dot,
    Star,
    Plus,
    Comma,
    Eq,

    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftAngle,
    RightAngle,
    LeftBrace,
    RightBrace,

    Eof,
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Lexeme {
    pub token: Token,
    pub offset: usize,
}

pub(crate) struct Lexer<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek_char(&self) -> Option<char> {
        let mut chars = self.input[self.position..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.position += ch.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current_char(), Some(ch) if ch.is_whitespace()) {
            self.advance();
        }
    }

    fn syntax(&self, offset: usize, message: impl Into<String>) -> SearchExprError {
        SearchExprError::Syntax {
            offset,
            message: message.into(),
        }
    }

    pub fn next_lexeme(&mut self) -> Result<Lexeme, SearchExprError> {
        self.skip_whitespace();
        let offset = self.position;

        let Some(ch) = self.current_char() else {
            return Ok(Lexeme {
                token: Token::Eof,
                offset,
            });
        };

        let single = match ch {
            '|' => Some(Token::Pipe),
            '?' => Some(Token::Question),
            '!' => Some(Token::Bang),
            ':' => Some(Token::Colon),
            '&' => Some(Token::Amp),
            '$' => Some(Token::Dollar),
            '.' => Some(Token::Dot),
            '*' => Some(Token::Star),
            '+' => Some(Token::Plus),
            ',' => Some(Token::Comma),
            '=' => Some(Token::Eq),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '[' => Some(Token::LeftBracket),
            ']' => Some(Token::RightBracket),
            '<' => Some(Token::LeftAngle),
            '>' => Some(Token::RightAngle),
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(Lexeme { token, offset });
        }

        let token = match ch {
            '-' if self.peek_char() == Some('>') => {
                self.advance();
                self.advance();
                Token::Arrow
            }
            '-' if matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) => {
                self.advance();
                Token::Int(-self.read_int(offset)?)
            }
            '"' => {
                self.advance();
                Token::Str(self.read_quoted_string(offset)?)
            }
            _ if ch.is_ascii_digit() => Token::Int(self.read_int(offset)?),
            _ if Self::is_ident_start(ch) => Token::Ident(self.read_ident()),
            _ => {
                return Err(self.syntax(offset, format!("unexpected character {:?}", ch)));
            }
        };

        Ok(Lexeme { token, offset })
    }

    fn read_ident(&mut self) -> String {
        let start = self.position;
        while matches!(self.current_char(), Some(ch) if Self::is_ident_char(ch)) {
            self.advance();
        }
        self.input[start..self.position].to_string()
    }

    fn read_int(&mut self, offset: usize) -> Result<i64, SearchExprError> {
        let start = self.position;
        while matches!(self.current_char(), Some(ch) if ch.is_ascii_digit()) {
            self.advance();
        }
        self.input[start..self.position]
            .parse()
            .map_err(|_| self.syntax(offset, "integer out of range"))
    }

    fn read_quoted_string(&mut self, offset: usize) -> Result<String, SearchExprError> {
        let mut value = String::new();

        loop {
            match self.current_char() {
                None => return Err(self.syntax(offset, "unterminated string")),
                Some('"') => {
                    self.advance();
                    return Ok(value);
                }
                Some('\\') => {
                    self.advance();
                    match self.current_char() {
                        Some(escaped @ ('"' | '\\')) => {
                            value.push(escaped);
                            self.advance();
                        }
                        _ => {
                            return Err(self.syntax(self.position, "invalid escape in string"));
                        }
                    }
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn is_ident_start(ch: char) -> bool {
        ch.is_ascii_alphabetic() || ch == '_'
    }

    fn is_ident_char(ch: char) -> bool {
        ch.is_ascii_alphanumeric() || ch == '_'
    }
}
