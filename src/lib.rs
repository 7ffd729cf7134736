//! Zylisp - a minimal Lisp with lexical closures
//!
//! Source text is tokenized, read into symbolic expressions and evaluated
//! directly by a recursive tree walker. There is no bytecode stage.
//!
//! ```text
//! ;; define a procedure and call it
//! (define square (lambda (x) (* x x)))
//! (square 5)                    ; => 25
//!
//! ;; closures capture their defining scope by reference
//! (define make-adder (lambda (n) (lambda (x) (+ x n))))
//! ((make-adder 10) 5)           ; => 15
//!
//! ;; quoted data
//! (car (quote (1 2 3)))         ; => 1
//! ```
//!
//! ## Semantics
//!
//! - Integers are fixed-width (`i64`); overflow is reported, never wrapped
//! - `false` and `nil` are the only false values; `0`, `""` and `()` are true
//! - Arguments are evaluated left to right and the first error aborts the call
//! - Procedures apply in a fresh child of the scope they were created in
//! - There is no tail-call elimination; recursion depth is bounded by [`MAX_EVAL_DEPTH`]
//!
//! ## Modules
//!
//! - `ast`: the [`ast::Value`] data model and printer
//! - `lexer`: source text to tokens with line/column tracking
//! - `reader`: tokens to values (one per top-level form)
//! - `evaluator`: environments, special forms and procedure application
//! - `builtinops`: the primitive procedure library

use std::fmt;

use thiserror::Error;

use crate::ast::Value;
use crate::builtinops::Arity;

/// Maximum nesting depth accepted by the reader
pub const MAX_PARSE_DEPTH: usize = 128;

/// Maximum number of nested closure applications before evaluation is aborted
pub const MAX_EVAL_DEPTH: usize = 10_000;

/// A 1-based line/column location in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Lexical error: an unrecognised character or an unterminated string.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("illegal token at {position}: {text:?}")]
pub struct LexError {
    pub position: Position,
    /// The offending character, or a short description for unterminated strings
    pub text: String,
}

/// Categorizes the different kinds of reader errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    /// A token that cannot start an expression (e.g. a stray `)`)
    InvalidSyntax,
    /// Input ended before the expression was complete (empty input, unclosed list)
    Incomplete,
    /// Expression nesting exceeded [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
    /// Extra tokens found after a complete expression
    TrailingContent,
    /// Implementation-imposed limit exceeded (integer literal out of range)
    ImplementationLimit,
}

/// A structured error describing a reader failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Where the problem was detected, when a token was available
    pub position: Option<Position>,
    /// The problematic token text, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        position: Option<Position>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            position,
            found,
        }
    }

    /// Create a ParseError with a kind and message but no location
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(position) = &self.position {
            write!(f, " at {position}")?;
        }
        if let Some(found) = &self.found {
            write!(f, " (found {found:?})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Error types for the interpreter.
///
/// Every error is terminal for the expression being evaluated; it unwinds
/// unchanged to whoever called [`evaluator::eval`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),
    #[error("malformed {form}: {reason}")]
    MalformedForm { form: String, reason: String },
    #[error("{callee}: expected {expected}, got {got}")]
    ArityError {
        callee: String,
        expected: Arity,
        got: usize,
    },
    #[error("{operator}: unexpected argument {value}")]
    TypeError { operator: String, value: Value },
    #[error("/: division by zero")]
    DivisionByZero,
    #[error("{0}: empty list")]
    EmptyListError(String),
    #[error("not a function: {0}")]
    NotCallable(Value),
    #[error("{0}: integer overflow")]
    IntegerOverflow(String),
    #[error("evaluation depth limit exceeded (max: {0})")]
    DepthLimitExceeded(usize),
}

impl Error {
    pub fn arity_error(callee: impl Into<String>, expected: Arity, got: usize) -> Self {
        Error::ArityError {
            callee: callee.into(),
            expected,
            got,
        }
    }

    pub fn malformed(form: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedForm {
            form: form.into(),
            reason: reason.into(),
        }
    }

    pub fn type_error(operator: impl Into<String>, value: &Value) -> Self {
        Error::TypeError {
            operator: operator.into(),
            value: value.clone(),
        }
    }
}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod lexer;
pub mod reader;

pub use builtinops::load_primitives;
pub use evaluator::{Environment, eval, eval_program, global_environment, new_root_environment};
pub use lexer::{Token, TokenKind, tokenize};
pub use reader::{parse, parse_program, read, read_all};
