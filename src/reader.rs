//! Reader: recursive-descent parsing of tokens into [`Value`]s.
//!
//! [`read`] produces exactly one top-level form and rejects anything left over;
//! [`read_all`] produces one value per top-level form of a whole program.

use tracing::trace;

use crate::ast::{NumberType, Value};
use crate::lexer::{Token, TokenKind, tokenize};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

struct Reader<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Reader { tokens, pos: 0 }
    }

    /// The next significant token; `None` once only the end marker (or nothing) is left
    fn peek(&self) -> Option<&'a Token> {
        self.tokens
            .get(self.pos)
            .filter(|token| token.kind != TokenKind::EndOfInput)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }

    fn error_at(kind: ParseErrorKind, message: &str, token: &Token) -> Error {
        ParseError::new(kind, message, Some(token.position()), Some(token.text.clone())).into()
    }

    fn read_expr(&mut self, depth: usize) -> Result<Value, Error> {
        let Some(token) = self.peek() else {
            return Err(ParseError::from_message(
                ParseErrorKind::Incomplete,
                "unexpected end of input",
            )
            .into());
        };

        if depth >= MAX_PARSE_DEPTH {
            return Err(Self::error_at(
                ParseErrorKind::TooDeeplyNested,
                &format!("expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                token,
            ));
        }

        match token.kind {
            TokenKind::LeftParen => self.read_list(depth),
            TokenKind::Number => {
                self.pos += 1;
                token
                    .text
                    .parse::<NumberType>()
                    .map(Value::Number)
                    .map_err(|_| {
                        Self::error_at(ParseErrorKind::ImplementationLimit, "invalid number", token)
                    })
            }
            TokenKind::Symbol => {
                self.pos += 1;
                Ok(Value::Symbol(token.text.clone()))
            }
            TokenKind::String => {
                self.pos += 1;
                Ok(Value::String(token.text.clone()))
            }
            TokenKind::Bool => {
                self.pos += 1;
                Ok(Value::Bool(token.text == "true"))
            }
            TokenKind::RightParen => Err(Self::error_at(
                ParseErrorKind::InvalidSyntax,
                "unexpected closing paren",
                token,
            )),
            TokenKind::EndOfInput | TokenKind::Illegal => Err(Self::error_at(
                ParseErrorKind::InvalidSyntax,
                "unexpected token",
                token,
            )),
        }
    }

    fn read_list(&mut self, depth: usize) -> Result<Value, Error> {
        let Some(open) = self.advance() else {
            return Err(
                ParseError::from_message(ParseErrorKind::Incomplete, "unclosed list").into(),
            );
        };

        let mut elements = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(Self::error_at(
                        ParseErrorKind::Incomplete,
                        "unclosed list",
                        open,
                    ));
                }
                Some(token) if token.kind == TokenKind::RightParen => {
                    self.pos += 1;
                    return Ok(Value::List(elements));
                }
                Some(_) => elements.push(self.read_expr(depth + 1)?),
            }
        }
    }
}

/// Read exactly one expression from a token sequence.
///
/// Fails if tokens other than the end marker remain afterwards.
pub fn read(tokens: &[Token]) -> Result<Value, Error> {
    let mut reader = Reader::new(tokens);
    let value = reader.read_expr(0)?;

    if let Some(token) = reader.peek() {
        return Err(Reader::error_at(
            ParseErrorKind::TrailingContent,
            "unexpected token after expression",
            token,
        ));
    }

    Ok(value)
}

/// Read every top-level expression from a token sequence, in order.
pub fn read_all(tokens: &[Token]) -> Result<Vec<Value>, Error> {
    let mut reader = Reader::new(tokens);
    let mut forms = Vec::new();

    while reader.peek().is_some() {
        forms.push(reader.read_expr(0)?);
    }

    trace!(forms = forms.len(), "read program");
    Ok(forms)
}

/// Tokenize and read a single expression from source text.
pub fn parse(source: &str) -> Result<Value, Error> {
    read(&tokenize(source)?)
}

/// Tokenize and read every top-level expression from source text.
pub fn parse_program(source: &str) -> Result<Vec<Value>, Error> {
    read_all(&tokenize(source)?)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{sym, val};
    use crate::{LexError, Position};

    /// Test result variants for data-driven reader tests
    #[derive(Debug)]
    enum ParseTestResult {
        Success(Value),                // Reading should succeed with this value
        SpecificError(ParseErrorKind), // Reading should fail with this kind
        AnyError,                      // Reading should fail (any error)
    }
    use ParseTestResult::*;

    fn success<T: Into<Value>>(value: T) -> ParseTestResult {
        Success(value.into())
    }

    /// Run parse tests, checking that every successful result survives a
    /// print -> parse round trip unchanged
    fn run_parse_tests(test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("Parse test #{} ({input:?})", i + 1);
            let result = parse(input);

            match (result, expected) {
                (Ok(actual), Success(expected_val)) => {
                    assert_eq!(actual, *expected_val, "{test_id}: value mismatch");

                    let displayed = format!("{actual}");
                    let reparsed = parse(&displayed).unwrap_or_else(|e| {
                        panic!("{test_id}: round-trip parse failed for '{displayed}': {e:?}")
                    });
                    assert_eq!(reparsed, actual, "{test_id}: round-trip mismatch");
                }
                (Err(_), AnyError) => {}
                (Err(crate::Error::Parse(err)), SpecificError(kind)) => {
                    assert_eq!(err.kind, *kind, "{test_id}: error kind mismatch");
                }
                (Err(err), SpecificError(kind)) => {
                    panic!("{test_id}: expected {kind:?} parse error, got {err:?}");
                }
                (Ok(actual), AnyError | SpecificError(_)) => {
                    panic!("{test_id}: expected error, got {actual:?}");
                }
                (Err(err), Success(_)) => {
                    panic!("{test_id}: expected success, got error {err:?}");
                }
            }
        }
    }

    #[test]
    fn test_reader_comprehensive() {
        let test_cases = vec![
            // ===== NUMBERS =====
            ("42", success(42)),
            ("-17", success(-17)),
            ("0", success(0)),
            ("9223372036854775807", success(i64::MAX)),
            ("-9223372036854775808", success(i64::MIN)),
            (
                "99999999999999999999",
                SpecificError(ParseErrorKind::ImplementationLimit),
            ),
            // ===== SYMBOLS =====
            ("x", success(sym("x"))),
            ("+", success(sym("+"))),
            ("hello-world", success(sym("hello-world"))),
            ("null?", success(sym("null?"))),
            ("nil", success(sym("nil"))),
            // ===== BOOLEANS =====
            ("true", success(true)),
            ("false", success(false)),
            // ===== STRINGS =====
            ("\"hello\"", success("hello")),
            ("\"hello world\"", success("hello world")),
            (r#""line\nbreak \"quoted\"""#, success("line\nbreak \"quoted\"")),
            ("\"\"", success("")),
            // ===== LISTS =====
            ("()", success(Value::List(vec![]))),
            ("(42)", success([42])),
            ("(+ 1 2)", success(vec![sym("+"), val(1), val(2)])),
            (
                "(+ (* 2 3) 4)",
                success(vec![
                    sym("+"),
                    val(vec![sym("*"), val(2), val(3)]),
                    val(4),
                ]),
            ),
            (
                "(1 hello \"world\" true)",
                success(vec![val(1), sym("hello"), val("world"), val(true)]),
            ),
            ("( 1   2\t\n3 )", success([1, 2, 3])),
            ("(((1)))", success([val([val([val(1)])])])),
            (
                "(lambda (x) ; the identity\n x)",
                success(vec![sym("lambda"), val(vec![sym("x")]), sym("x")]),
            ),
            // ===== ERRORS =====
            ("(+ 1 2", SpecificError(ParseErrorKind::Incomplete)),
            ("((1 2)", SpecificError(ParseErrorKind::Incomplete)),
            ("(+ 1 2))", SpecificError(ParseErrorKind::TrailingContent)),
            (")", SpecificError(ParseErrorKind::InvalidSyntax)),
            ("", SpecificError(ParseErrorKind::Incomplete)),
            ("   ; nothing here", SpecificError(ParseErrorKind::Incomplete)),
            ("1 2", SpecificError(ParseErrorKind::TrailingContent)),
            ("(+ 1 2) (+ 3 4)", SpecificError(ParseErrorKind::TrailingContent)),
            ("@invalid", AnyError),
            ("\"unterminated", AnyError),
        ];

        run_parse_tests(test_cases);
    }

    #[test]
    fn test_error_positions() {
        match parse("(define x\n  (+ 1 2)))") {
            Err(crate::Error::Parse(err)) => {
                assert_eq!(err.kind, ParseErrorKind::TrailingContent);
                assert_eq!(err.position, Some(Position { line: 2, column: 11 }));
                assert_eq!(err.found.as_deref(), Some(")"));
            }
            other => panic!("expected trailing content error, got {other:?}"),
        }

        match parse("\n  (1 2") {
            Err(crate::Error::Parse(err)) => {
                assert_eq!(err.kind, ParseErrorKind::Incomplete);
                assert_eq!(err.position, Some(Position { line: 2, column: 3 }));
            }
            other => panic!("expected unclosed list error, got {other:?}"),
        }
    }

    #[test]
    fn test_lex_errors_pass_through() {
        assert_eq!(
            parse("(a @)"),
            Err(crate::Error::Lex(LexError {
                position: Position { line: 1, column: 4 },
                text: "@".to_owned(),
            }))
        );
    }

    #[test]
    fn test_depth_limits() {
        let under_limit = format!(
            "{}x{}",
            "(".repeat(MAX_PARSE_DEPTH - 1),
            ")".repeat(MAX_PARSE_DEPTH - 1)
        );
        let at_limit = format!(
            "{}x{}",
            "(".repeat(MAX_PARSE_DEPTH),
            ")".repeat(MAX_PARSE_DEPTH)
        );

        assert!(parse(&under_limit).is_ok());
        match parse(&at_limit) {
            Err(crate::Error::Parse(err)) => {
                assert_eq!(err.kind, ParseErrorKind::TooDeeplyNested);
            }
            other => panic!("expected depth error, got {other:?}"),
        }
    }

    #[test]
    fn test_read_all() {
        let forms = parse_program(
            "; a program
             (define square (lambda (x) (* x x)))
             (square 5)
             42",
        )
        .unwrap();
        assert_eq!(forms.len(), 3);
        assert_eq!(forms[1], val(vec![sym("square"), val(5)]));
        assert_eq!(forms[2], val(42));

        assert_eq!(parse_program("").unwrap(), vec![]);
        assert_eq!(parse_program("  ; just a comment\n").unwrap(), vec![]);
        assert!(parse_program("(a) (b").is_err());
        assert!(parse_program("(a) )").is_err());
    }

    #[test]
    fn test_read_from_tokens() {
        let tokens = tokenize("(car (list 1 2 3))").unwrap();
        let value = read(&tokens).unwrap();
        assert_eq!(
            value,
            val(vec![sym("car"), val(vec![sym("list"), val(1), val(2), val(3)])])
        );

        // A token list without the end marker reads the same way
        let without_end = &tokens[..tokens.len() - 1];
        assert_eq!(read(without_end).unwrap(), value);
    }
}
