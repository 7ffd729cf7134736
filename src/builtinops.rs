//! Built-in procedure registry.
//!
//! Every primitive is an ordinary function over already-evaluated arguments.
//! Special forms (`define`, `lambda`, `if`, `quote`, `set!`) control evaluation of
//! their operands and are handled by the evaluator, not by this registry.
//!
//! ```text
//! (+ 1 2 3)            ; => 6
//! (- 5)                ; => -5
//! (cons 1 (list 2 3))  ; => (1 2 3)
//! (null? (list))       ; => true
//! ```
//!
//! ## Error Handling
//!
//! - **Arity**: each entry declares an [`Arity`] that is checked before the body runs
//! - **Types**: arithmetic and comparisons accept only numbers; `car`/`cdr` only lists
//! - **Overflow**: arithmetic uses checked operations and reports `IntegerOverflow`
//! - **Division**: divisors are checked in order; the first non-number or zero is reported
//!
//! ## Adding New Primitives
//!
//! 1. Implement a `fn(&[Value]) -> Result<Value, Error>`
//! 2. Add it to `BUILTIN_OPS` with its name and arity
//! 3. Add test cases to `test_builtin_function_implementations`
//!
//! Hosts that need a primitive with access to the calling environment can use
//! [`Environment::register_primitive`] instead.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::LazyLock;

use tracing::debug;

use crate::Error;
use crate::ast::{NumberType, Value};
use crate::evaluator::Environment;

/// Native procedure stored in a [`Value::Primitive`]. Receives the evaluated
/// arguments and the environment of the call site.
pub type PrimitiveFn = Rc<dyn Fn(&[Value], &Environment) -> Result<Value, Error>>;

/// Signature of the registry's built-in implementations
type BuiltinFn = fn(&[Value]) -> Result<Value, Error>;

/// Accepted argument count of a callable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Any => true,
        }
    }

    /// Check `got` against this arity, naming `callee` in the error
    pub fn validate(self, callee: &str, got: usize) -> Result<(), Error> {
        if self.accepts(got) {
            Ok(())
        } else {
            Err(Error::arity_error(callee, self, got))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = |n: usize| if n == 1 { "argument" } else { "arguments" };
        match self {
            Arity::Exact(n) => write!(f, "{n} {}", plural(*n)),
            Arity::AtLeast(n) => write!(f, "at least {n} {}", plural(*n)),
            Arity::Any => write!(f, "any number of arguments"),
        }
    }
}

/// Definition of a built-in procedure
#[derive(Debug, Clone, Copy)]
pub struct BuiltinOp {
    /// The name the procedure is bound to in the global environment
    pub name: &'static str,
    /// Expected number of arguments
    pub arity: Arity,
    func: BuiltinFn,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl BuiltinOp {
    /// Validate the argument count, then run the implementation
    pub fn call(&self, args: &[Value]) -> Result<Value, Error> {
        self.arity.validate(self.name, args.len())?;
        (self.func)(args)
    }
}

//
// Argument helpers
//

fn number_arg(operator: &str, value: &Value) -> Result<NumberType, Error> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(Error::type_error(operator, other)),
    }
}

fn number_args(operator: &str, args: &[Value]) -> Result<Vec<NumberType>, Error> {
    args.iter().map(|arg| number_arg(operator, arg)).collect()
}

fn list_arg<'a>(operator: &str, value: &'a Value) -> Result<&'a [Value], Error> {
    match value {
        Value::List(elements) => Ok(elements),
        other => Err(Error::type_error(operator, other)),
    }
}

fn overflow(operator: &str) -> Error {
    Error::IntegerOverflow(operator.to_owned())
}

//
// Builtin Function Implementations
//

fn builtin_add(args: &[Value]) -> Result<Value, Error> {
    let mut sum: NumberType = 0;
    for n in number_args("+", args)? {
        sum = sum.checked_add(n).ok_or_else(|| overflow("+"))?;
    }
    Ok(Value::Number(sum))
}

fn builtin_mul(args: &[Value]) -> Result<Value, Error> {
    let mut product: NumberType = 1;
    for n in number_args("*", args)? {
        product = product.checked_mul(n).ok_or_else(|| overflow("*"))?;
    }
    Ok(Value::Number(product))
}

fn builtin_sub(args: &[Value]) -> Result<Value, Error> {
    let nums = number_args("-", args)?;
    let Some((&first, rest)) = nums.split_first() else {
        return Err(Error::arity_error("-", Arity::AtLeast(1), 0));
    };

    if rest.is_empty() {
        return first.checked_neg().map(Value::Number).ok_or_else(|| overflow("-"));
    }

    let mut result = first;
    for &n in rest {
        result = result.checked_sub(n).ok_or_else(|| overflow("-"))?;
    }
    Ok(Value::Number(result))
}

/// Integer division, truncating toward zero. A single operand yields its
/// reciprocal, which is 0 for any magnitude above 1.
///
/// Divisors are checked left to right, each for its type and then for zero,
/// so the first bad operand decides the error.
fn builtin_div(args: &[Value]) -> Result<Value, Error> {
    let Some((first, rest)) = args.split_first() else {
        return Err(Error::arity_error("/", Arity::AtLeast(1), 0));
    };
    let first = number_arg("/", first)?;

    if rest.is_empty() {
        if first == 0 {
            return Err(Error::DivisionByZero);
        }
        return Ok(Value::Number(1 / first));
    }

    let mut result = first;
    for arg in rest {
        let divisor = number_arg("/", arg)?;
        if divisor == 0 {
            return Err(Error::DivisionByZero);
        }
        result = result.checked_div(divisor).ok_or_else(|| overflow("/"))?;
    }
    Ok(Value::Number(result))
}

// Macro to generate numeric comparison functions
macro_rules! numeric_comparison {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            match args {
                [a, b] => {
                    let (a, b) = (number_arg($op_str, a)?, number_arg($op_str, b)?);
                    Ok(Value::Bool(a $op b))
                }
                _ => Err(Error::arity_error($op_str, Arity::Exact(2), args.len())),
            }
        }
    };
}

numeric_comparison!(builtin_eq, ==, "=");
numeric_comparison!(builtin_lt, <, "<");
numeric_comparison!(builtin_gt, >, ">");
numeric_comparison!(builtin_le, <=, "<=");
numeric_comparison!(builtin_ge, >=, ">=");

fn builtin_list(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::List(args.to_vec()))
}

fn builtin_car(args: &[Value]) -> Result<Value, Error> {
    let [list] = args else {
        return Err(Error::arity_error("car", Arity::Exact(1), args.len()));
    };
    match list_arg("car", list)? {
        [first, ..] => Ok(first.clone()),
        [] => Err(Error::EmptyListError("car".to_owned())),
    }
}

fn builtin_cdr(args: &[Value]) -> Result<Value, Error> {
    let [list] = args else {
        return Err(Error::arity_error("cdr", Arity::Exact(1), args.len()));
    };
    match list_arg("cdr", list)? {
        [_, rest @ ..] => Ok(Value::List(rest.to_vec())),
        [] => Err(Error::EmptyListError("cdr".to_owned())),
    }
}

fn builtin_cons(args: &[Value]) -> Result<Value, Error> {
    let [first, rest] = args else {
        return Err(Error::arity_error("cons", Arity::Exact(2), args.len()));
    };
    let tail = list_arg("cons", rest)?;

    let mut new_list = Vec::with_capacity(tail.len() + 1);
    new_list.push(first.clone());
    new_list.extend_from_slice(tail);
    Ok(Value::List(new_list))
}

// Macro to generate single-argument type predicates
macro_rules! type_predicate {
    ($name:ident, $op_str:expr, $pattern:pat) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            match args {
                [value] => Ok(Value::Bool(matches!(value, $pattern))),
                _ => Err(Error::arity_error($op_str, Arity::Exact(1), args.len())),
            }
        }
    };
}

type_predicate!(builtin_is_number, "number?", Value::Number(_));
type_predicate!(builtin_is_symbol, "symbol?", Value::Symbol(_));
type_predicate!(builtin_is_list, "list?", Value::List(_));

fn builtin_is_null(args: &[Value]) -> Result<Value, Error> {
    match args {
        [value] => Ok(Value::Bool(value.is_empty_list())),
        _ => Err(Error::arity_error("null?", Arity::Exact(1), args.len())),
    }
}

/// Global registry of all built-in procedures, in binding order
static BUILTIN_OPS: &[BuiltinOp] = &[
    // Arithmetic
    BuiltinOp {
        name: "+",
        arity: Arity::Any,
        func: builtin_add,
    },
    BuiltinOp {
        name: "-",
        arity: Arity::AtLeast(1),
        func: builtin_sub,
    },
    BuiltinOp {
        name: "*",
        arity: Arity::Any,
        func: builtin_mul,
    },
    BuiltinOp {
        name: "/",
        arity: Arity::AtLeast(1),
        func: builtin_div,
    },
    // Comparison
    BuiltinOp {
        name: "=",
        arity: Arity::Exact(2),
        func: builtin_eq,
    },
    BuiltinOp {
        name: "<",
        arity: Arity::Exact(2),
        func: builtin_lt,
    },
    BuiltinOp {
        name: ">",
        arity: Arity::Exact(2),
        func: builtin_gt,
    },
    BuiltinOp {
        name: "<=",
        arity: Arity::Exact(2),
        func: builtin_le,
    },
    BuiltinOp {
        name: ">=",
        arity: Arity::Exact(2),
        func: builtin_ge,
    },
    // Lists
    BuiltinOp {
        name: "list",
        arity: Arity::Any,
        func: builtin_list,
    },
    BuiltinOp {
        name: "car",
        arity: Arity::Exact(1),
        func: builtin_car,
    },
    BuiltinOp {
        name: "cdr",
        arity: Arity::Exact(1),
        func: builtin_cdr,
    },
    BuiltinOp {
        name: "cons",
        arity: Arity::Exact(2),
        func: builtin_cons,
    },
    // Type predicates
    BuiltinOp {
        name: "number?",
        arity: Arity::Exact(1),
        func: builtin_is_number,
    },
    BuiltinOp {
        name: "symbol?",
        arity: Arity::Exact(1),
        func: builtin_is_symbol,
    },
    BuiltinOp {
        name: "list?",
        arity: Arity::Exact(1),
        func: builtin_is_list,
    },
    BuiltinOp {
        name: "null?",
        arity: Arity::Exact(1),
        func: builtin_is_null,
    },
];

/// Lazy static map from name to BuiltinOp (private - use find_builtin_op)
static BUILTIN_BY_NAME: LazyLock<HashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| BUILTIN_OPS.iter().map(|op| (op.name, op)).collect());

/// Get all builtin procedures
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS
}

/// Find a builtin procedure by name
pub fn find_builtin_op(name: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_NAME.get(name).copied()
}

/// Bind every built-in procedure into `env` as a [`Value::Primitive`].
pub fn load_primitives(env: &Environment) {
    for op in get_builtin_ops() {
        let func: PrimitiveFn = Rc::new(move |args: &[Value], _env: &Environment| op.call(args));
        env.define(
            op.name,
            Value::Primitive {
                name: op.name.to_owned(),
                func,
            },
        );
    }
    debug!(count = BUILTIN_OPS.len(), "loaded primitives");
}
