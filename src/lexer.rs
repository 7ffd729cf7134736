//! Lexer: converts source text into a flat sequence of tokens.
//!
//! Whitespace (space, tab, CR, LF) and `;` line comments are skipped. Each token
//! records the 1-based line and column where it starts. The token list always ends
//! with a single [`TokenKind::EndOfInput`].

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_till, take_while},
    character::complete::{char, digit1, multispace1, satisfy},
    combinator::{opt, recognize},
    multi::many0_count,
    sequence::pair,
};
use tracing::trace;

use crate::{Error, LexError, Position};

/// Allowed non-alphanumeric characters in symbol names
pub(crate) const SYMBOL_SPECIAL_CHARS: &str = "+-*/<>=!?&|%$_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    Number,
    Symbol,
    String,
    Bool,
    EndOfInput,
    Illegal,
}

/// A lexical token. For strings `text` holds the unescaped contents without quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }
}

fn is_symbol_start(c: char) -> bool {
    c.is_alphabetic() || SYMBOL_SPECIAL_CHARS.contains(c)
}

fn is_symbol_char(c: char) -> bool {
    is_symbol_start(c) || c.is_ascii_digit()
}

/// Skip any run of whitespace and comments
fn skip_trivia(input: &str) -> IResult<&str, &str> {
    recognize(many0_count(alt((
        multispace1,
        recognize(pair(char(';'), take_till(|c: char| c == '\n'))),
    ))))
    .parse(input)
}

/// Parse an integer literal: an optional `-` directly followed by digits
fn scan_number(input: &str) -> IResult<&str, &str> {
    recognize(pair(opt(char('-')), digit1)).parse(input)
}

/// Parse a symbol; `true` and `false` are classified as booleans by the caller
fn scan_symbol(input: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(is_symbol_start), take_while(is_symbol_char))).parse(input)
}

/// Parse a string literal, returning its unescaped contents.
///
/// Known escapes are `\n \t \r \" \\`; any other escaped character stands for
/// itself. A missing closing quote is a hard failure rather than a mismatch.
fn scan_string(input: &str) -> IResult<&str, String> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut contents = String::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => return Ok((char_iter.as_str(), contents)),
            Some('\\') => {
                match char_iter.next() {
                    Some('n') => contents.push('\n'),
                    Some('t') => contents.push('\t'),
                    Some('r') => contents.push('\r'),
                    Some(other) => contents.push(other),
                    None => {
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            remaining,
                            nom::error::ErrorKind::Char,
                        )));
                    }
                }
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                contents.push(ch);
                remaining = char_iter.as_str();
            }
            None => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    remaining,
                    nom::error::ErrorKind::Char,
                )));
            }
        }
    }
}

struct Lexer<'a> {
    rest: &'a str,
    position: Position,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Lexer {
            rest: input,
            position: Position { line: 1, column: 1 },
        }
    }

    /// Move to `remaining`, which must be a suffix of the current input
    fn advance_to(&mut self, remaining: &'a str) {
        let rest = self.rest;
        let consumed = &rest[..rest.len() - remaining.len()];
        for ch in consumed.chars() {
            if ch == '\n' {
                self.position.line += 1;
                self.position.column = 1;
            } else {
                self.position.column += 1;
            }
        }
        self.rest = remaining;
    }

    fn token(&self, kind: TokenKind, text: impl Into<String>, start: Position) -> Token {
        Token {
            kind,
            text: text.into(),
            line: start.line,
            column: start.column,
        }
    }

    fn next_token(&mut self) -> Token {
        if let Ok((remaining, _)) = skip_trivia(self.rest) {
            self.advance_to(remaining);
        }

        let start = self.position;
        let Some(first) = self.rest.chars().next() else {
            return self.token(TokenKind::EndOfInput, "", start);
        };

        match first {
            '(' | ')' => {
                let kind = if first == '(' {
                    TokenKind::LeftParen
                } else {
                    TokenKind::RightParen
                };
                let rest = self.rest;
                self.advance_to(&rest[1..]);
                return self.token(kind, first.to_string(), start);
            }
            '"' => {
                return match scan_string(self.rest) {
                    Ok((remaining, contents)) => {
                        self.advance_to(remaining);
                        self.token(TokenKind::String, contents, start)
                    }
                    Err(_) => self.token(TokenKind::Illegal, "unterminated string", start),
                };
            }
            _ => {}
        }

        if let Ok((remaining, digits)) = scan_number(self.rest) {
            self.advance_to(remaining);
            return self.token(TokenKind::Number, digits, start);
        }

        if let Ok((remaining, name)) = scan_symbol(self.rest) {
            self.advance_to(remaining);
            let kind = if name == "true" || name == "false" {
                TokenKind::Bool
            } else {
                TokenKind::Symbol
            };
            return self.token(kind, name, start);
        }

        self.token(TokenKind::Illegal, first.to_string(), start)
    }
}

/// Tokenize source text.
///
/// Fails on the first unrecognised character or unterminated string, reporting
/// its position and text.
pub fn tokenize(source: &str) -> Result<Vec<Token>, Error> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();

    loop {
        let token = lexer.next_token();
        match token.kind {
            TokenKind::Illegal => {
                return Err(LexError {
                    position: token.position(),
                    text: token.text,
                }
                .into());
            }
            TokenKind::EndOfInput => {
                tokens.push(token);
                break;
            }
            _ => tokens.push(token),
        }
    }

    trace!(count = tokens.len(), "tokenized source");
    Ok(tokens)
}
