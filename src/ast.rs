//! This module defines the [`Value`] type: the symbolic expression produced by the
//! reader and the result of every evaluation. Programs and data share this one
//! representation. Ergonomic helpers such as [`val`], [`sym`] and [`nil`] are provided
//! for building values in code and tests, together with `From` conversions for Rust
//! integers, strings, booleans, arrays and vectors. `Display` prints values in
//! re-readable source form wherever the value has a source form.

use crate::Error;
use crate::builtinops::PrimitiveFn;
use crate::evaluator::Environment;

/// Type alias for number values in interpreter
pub type NumberType = i64;

/// Core value type in interpreter
///
/// To build a value, use the helper functions:
/// - `val(42)` for values, `sym("name")` for symbols, `nil()` for the empty value
/// - `val([1, 2, 3])` for homogeneous lists
/// - `val(vec![sym("op"), val(42)])` for mixed lists
#[derive(Clone)]
pub enum Value {
    /// Fixed-width integers
    Number(NumberType),
    /// Symbols (identifiers)
    Symbol(String),
    /// String literals
    String(String),
    /// Boolean values
    Bool(bool),
    /// The empty/absent value. Distinct from the empty list.
    Nil,
    /// Lists
    List(Vec<Value>),
    /// User-defined procedures. The captured environment is shared, not copied:
    /// later definitions in it are visible to the body.
    Closure {
        params: Vec<String>,
        body: Box<Value>,
        env: Environment,
    },
    /// Built-in procedures, compared by name
    Primitive { name: String, func: PrimitiveFn },
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::String(s) => write!(f, "String(\"{s}\")"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Nil => write!(f, "Nil"),
            Value::List(list) => {
                write!(f, "List(")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            // The captured environment is left out: it may contain this very closure.
            Value::Closure { params, body, .. } => {
                write!(f, "Closure(params={params:?}, body={body:?})")
            }
            Value::Primitive { name, .. } => write!(f, "Primitive({name})"),
        }
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(NumberType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(|x| x.into()).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(|x| x.into()).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(slice: &[T]) -> Self {
        Value::List(slice.iter().cloned().map(|x| x.into()).collect())
    }
}

impl TryFrom<Value> for NumberType {
    type Error = Error;

    fn try_from(value: Value) -> Result<NumberType, Error> {
        if let Value::Number(n) = value {
            Ok(n)
        } else {
            Err(Error::type_error("number", &value))
        }
    }
}

/// Helper function for creating symbols - works great in mixed lists!
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating Values - works great in mixed lists!
/// Accepts any type that can be converted to Value
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for the empty value
pub fn nil() -> Value {
    Value::Nil
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::String(s) => {
                write!(f, "\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '\r' => write!(f, "\\r")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Value::Bool(b) => write!(f, "{b}"),
            Value::Nil => write!(f, "nil"),
            Value::List(elements) => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Value::Closure { .. } => write!(f, "<function>"),
            Value::Primitive { name, .. } => write!(f, "<primitive:{name}>"),
        }
    }
}

impl Value {
    /// Only `false` and `nil` are false; every other value, including `0`,
    /// `""` and the empty list, counts as true.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false) | Value::Nil)
    }

    /// Check if a value is the empty list
    pub fn is_empty_list(&self) -> bool {
        matches!(self, Value::List(list) if list.is_empty())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Primitive { name: n1, .. }, Value::Primitive { name: n2, .. }) => n1 == n2,
            (
                Value::Closure {
                    params: p1,
                    body: b1,
                    env: e1,
                },
                Value::Closure {
                    params: p2,
                    body: b2,
                    env: e2,
                },
            ) => e1.ptr_eq(e2) && p1 == p2 && b1 == b2,
            _ => false, // Different variants are never equal
        }
    }
}

#[cfg(test)]
mod helper_function_tests {
    use super::*;

    #[test]
    fn test_helper_functions_data_driven() {
        // (helper_result, expected_value)
        let test_cases = vec![
            (val(42), Value::Number(42)),
            (val(-17), Value::Number(-17)),
            (val(-0), Value::Number(0)),
            (val(4294967295u32), Value::Number(4294967295)),
            (val(2147483647i32), Value::Number(2147483647)),
            (val(255u8), Value::Number(255)),
            (val(-128i8), Value::Number(-128)),
            (val(NumberType::MAX), Value::Number(NumberType::MAX)),
            (val(NumberType::MIN), Value::Number(NumberType::MIN)),
            (val(true), Value::Bool(true)),
            (val("hello"), Value::String("hello".to_owned())),
            (val(""), Value::String(String::new())),
            (sym("foo-bar?"), Value::Symbol("foo-bar?".to_owned())),
            (sym(String::from("test")), Value::Symbol("test".to_owned())),
            (nil(), Value::Nil),
            (
                val([1, 2, 3]),
                Value::List(vec![Value::Number(1), Value::Number(2), Value::Number(3)]),
            ),
            (
                val(vec![sym("operation"), val(42), val("result"), val(true)]),
                Value::List(vec![
                    Value::Symbol("operation".to_owned()),
                    Value::Number(42),
                    Value::String("result".to_owned()),
                    Value::Bool(true),
                ]),
            ),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert_eq!(actual, expected, "Test case {} failed", i + 1);
        }
    }

    #[test]
    fn test_display() {
        let test_cases = vec![
            (val(42), "42"),
            (val(-17), "-17"),
            (val(0), "0"),
            (sym("x"), "x"),
            (sym("hello-world"), "hello-world"),
            (val("hello"), "\"hello\""),
            (val("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\""),
            (val(true), "true"),
            (val(false), "false"),
            (nil(), "nil"),
            (Value::List(vec![]), "()"),
            (val([1, 2, 3]), "(1 2 3)"),
            (
                val(vec![sym("+"), val(vec![sym("*"), val(2), val(3)]), val(4)]),
                "(+ (* 2 3) 4)",
            ),
        ];

        for (value, expected) in test_cases {
            assert_eq!(format!("{value}"), expected, "display of {value:?}");
        }
    }

    #[test]
    fn test_truthiness() {
        assert!(!val(false).is_truthy());
        assert!(!nil().is_truthy());

        assert!(val(true).is_truthy());
        assert!(val(0).is_truthy());
        assert!(val("").is_truthy());
        assert!(Value::List(vec![]).is_truthy());
        assert!(sym("x").is_truthy());
    }

    #[test]
    fn test_nil_is_not_the_empty_list() {
        assert_ne!(nil(), Value::List(vec![]));
        assert!(Value::List(vec![]).is_empty_list());
        assert!(!nil().is_empty_list());
    }

    #[test]
    fn test_try_from() {
        assert_eq!(NumberType::try_from(val(7)), Ok(7));
        assert!(matches!(
            NumberType::try_from(val("7")),
            Err(Error::TypeError { .. })
        ));
    }
}
