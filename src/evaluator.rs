//! Evaluator: lexical environments, special forms and procedure application.
//!
//! Evaluation is a direct recursive walk over [`Value`] trees. There is no
//! tail-call elimination: every closure application counts one level against
//! [`MAX_EVAL_DEPTH`], and the native stack is grown on demand so that limit,
//! not the thread's stack size, is what ends runaway recursion.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::ast::Value;
use crate::builtinops::{Arity, PrimitiveFn, load_primitives};
use crate::reader::parse_program;
use crate::{Error, MAX_EVAL_DEPTH};

/// Remaining stack below which evaluation continues on a fresh segment
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each additional stack segment
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

#[derive(Default)]
struct Scope {
    bindings: HashMap<String, Value>,
    parent: Option<Environment>,
}

/// A lexical scope: a name-to-value mapping plus an optional parent.
///
/// Cloning an `Environment` yields another handle to the same scope, so a
/// closure and the code that defined it observe each other's definitions.
/// Parent links point outward only.
#[derive(Clone, Default)]
pub struct Environment(Rc<RefCell<Scope>>);

impl Environment {
    /// Create a parent-less (root) scope with no bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new child scope whose parent is this one
    pub fn extend(&self) -> Environment {
        Environment(Rc::new(RefCell::new(Scope {
            bindings: HashMap::new(),
            parent: Some(self.clone()),
        })))
    }

    pub fn parent(&self) -> Option<Environment> {
        self.0.borrow().parent.clone()
    }

    /// Bind `name` in this scope only, overwriting any existing binding here
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().bindings.insert(name.into(), value);
    }

    /// Rebind the nearest existing binding of `name`. Never creates a binding.
    pub fn set(&self, name: &str, value: Value) -> Result<(), Error> {
        let mut scope = self.clone();
        loop {
            let parent = {
                let mut current = scope.0.borrow_mut();
                if let Some(slot) = current.bindings.get_mut(name) {
                    *slot = value;
                    return Ok(());
                }
                current.parent.clone()
            };
            match parent {
                Some(parent) => scope = parent,
                None => return Err(Error::UndefinedVariable(name.to_owned())),
            }
        }
    }

    /// Find the value of the nearest binding of `name`, innermost scope first
    pub fn lookup(&self, name: &str) -> Result<Value, Error> {
        let mut scope = self.clone();
        loop {
            let parent = {
                let current = scope.0.borrow();
                if let Some(value) = current.bindings.get(name) {
                    return Ok(value.clone());
                }
                current.parent.clone()
            };
            match parent {
                Some(parent) => scope = parent,
                None => return Err(Error::UndefinedVariable(name.to_owned())),
            }
        }
    }

    /// True if both handles refer to the same scope
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Get all bindings visible from this scope, sorted by name.
    /// Inner bindings hide outer bindings of the same name.
    pub fn bindings(&self) -> Vec<(String, Value)> {
        let mut visible: HashMap<String, Value> = HashMap::new();
        let mut scope = Some(self.clone());

        while let Some(current) = scope {
            let inner = current.0.borrow();
            for (name, value) in &inner.bindings {
                visible
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
            scope = inner.parent.clone();
        }

        let mut result: Vec<_> = visible.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// Register a native procedure under `name` in this scope.
    ///
    /// The argument count is checked against `arity` before `func` runs, so
    /// `func` may index `args` accordingly.
    ///
    /// # Example
    /// ```
    /// use zylisp::ast::Value;
    /// use zylisp::builtinops::Arity;
    /// use zylisp::{eval, global_environment, parse};
    ///
    /// let env = global_environment();
    /// env.register_primitive("double", Arity::Exact(1), |args, _env| match &args[0] {
    ///     Value::Number(n) => Ok(Value::Number(n * 2)),
    ///     other => Err(zylisp::Error::type_error("double", other)),
    /// });
    ///
    /// let expr = parse("(double 21)").unwrap();
    /// assert_eq!(eval(&expr, &env).unwrap(), Value::Number(42));
    /// ```
    pub fn register_primitive<F>(&self, name: &str, arity: Arity, func: F)
    where
        F: Fn(&[Value], &Environment) -> Result<Value, Error> + 'static,
    {
        let callee = name.to_owned();
        let wrapped: PrimitiveFn = Rc::new(move |args: &[Value], env: &Environment| {
            arity.validate(&callee, args.len())?;
            func(args, env)
        });

        self.define(
            name,
            Value::Primitive {
                name: name.to_owned(),
                func: wrapped,
            },
        );
    }
}

// Bindings may hold closures over this very scope, so only names are shown.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = self.0.borrow();
        let mut names: Vec<&String> = scope.bindings.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("has_parent", &scope.parent.is_some())
            .finish()
    }
}

/// Create an empty root environment
pub fn new_root_environment() -> Environment {
    Environment::new()
}

/// Create a root environment with every primitive loaded
pub fn global_environment() -> Environment {
    let env = new_root_environment();
    load_primitives(&env);
    env
}

/// Evaluate an expression in `env`
pub fn eval(expr: &Value, env: &Environment) -> Result<Value, Error> {
    eval_with_depth_tracking(expr, env, 0)
}

/// Read and evaluate every top-level form of `source` in order.
///
/// Returns the value of the last form, or `Nil` for a program with no forms.
/// The whole program is read before anything is evaluated, so a syntax error
/// anywhere means nothing runs.
pub fn eval_program(source: &str, env: &Environment) -> Result<Value, Error> {
    parse_program(source)?
        .iter()
        .try_fold(Value::Nil, |_, form| eval(form, env))
}

/// Evaluate an S-expression with depth tracking to prevent stack overflow.
/// `depth` is the number of closure applications in progress.
fn eval_with_depth_tracking(expr: &Value, env: &Environment, depth: usize) -> Result<Value, Error> {
    if depth >= MAX_EVAL_DEPTH {
        return Err(Error::DepthLimitExceeded(MAX_EVAL_DEPTH));
    }

    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || eval_inner(expr, env, depth))
}

fn eval_inner(expr: &Value, env: &Environment, depth: usize) -> Result<Value, Error> {
    match expr {
        Value::Number(_)
        | Value::String(_)
        | Value::Bool(_)
        | Value::Nil
        | Value::Closure { .. }
        | Value::Primitive { .. } => Ok(expr.clone()),

        Value::Symbol(name) => env.lookup(name),

        Value::List(elements) => eval_list(elements, env, depth),
    }
}

/// Helper function to evaluate argument expressions left to right.
/// The first failure aborts the rest.
fn eval_args(args: &[Value], env: &Environment, depth: usize) -> Result<Vec<Value>, Error> {
    args.iter()
        .map(|arg| eval_with_depth_tracking(arg, env, depth))
        .collect()
}

/// Evaluate a list expression: special form or procedure application
fn eval_list(elements: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    let [head, operands @ ..] = elements else {
        return Ok(Value::Nil);
    };

    if let Value::Symbol(name) = head
        && let Some(form) = find_special_form(name)
    {
        form.arity.validate(form.name, operands.len())?;
        return (form.eval)(operands, env, depth);
    }

    let func = eval_with_depth_tracking(head, env, depth)?;
    let args = eval_args(operands, env, depth)?;
    apply_with_depth_tracking(head, &func, &args, env, depth)
}

/// Apply an already-evaluated procedure to already-evaluated arguments.
pub fn apply(func: &Value, args: &[Value], env: &Environment) -> Result<Value, Error> {
    apply_with_depth_tracking(func, func, args, env, 0)
}

/// `callee` is the expression that produced `func`, used to name it in errors
fn apply_with_depth_tracking(
    callee: &Value,
    func: &Value,
    args: &[Value],
    env: &Environment,
    depth: usize,
) -> Result<Value, Error> {
    match func {
        Value::Primitive { func, .. } => func(args, env),
        Value::Closure {
            params,
            body,
            env: closure_env,
        } => {
            if params.len() != args.len() {
                return Err(Error::arity_error(
                    callee.to_string(),
                    Arity::Exact(params.len()),
                    args.len(),
                ));
            }

            let call_env = closure_env.extend();
            for (param, arg) in params.iter().zip(args) {
                call_env.define(param.clone(), arg.clone());
            }

            trace!(%callee, args = args.len(), depth, "applying closure");
            eval_with_depth_tracking(body, &call_env, depth + 1)
        }
        other => Err(Error::NotCallable(other.clone())),
    }
}

//
// Special forms
//

type SpecialFormFn = fn(&[Value], &Environment, usize) -> Result<Value, Error>;

/// A form that receives its operands unevaluated
struct SpecialForm {
    name: &'static str,
    arity: Arity,
    eval: SpecialFormFn,
}

static SPECIAL_FORMS: &[SpecialForm] = &[
    SpecialForm {
        name: "define",
        arity: Arity::Exact(2),
        eval: eval_define,
    },
    SpecialForm {
        name: "set!",
        arity: Arity::Exact(2),
        eval: eval_set,
    },
    SpecialForm {
        name: "lambda",
        arity: Arity::Exact(2),
        eval: eval_lambda,
    },
    SpecialForm {
        name: "if",
        arity: Arity::Exact(3),
        eval: eval_if,
    },
    SpecialForm {
        name: "quote",
        arity: Arity::Exact(1),
        eval: eval_quote,
    },
];

fn find_special_form(name: &str) -> Option<&'static SpecialForm> {
    SPECIAL_FORMS.iter().find(|form| form.name == name)
}

/// Names that are dispatched as special forms rather than looked up
pub fn special_form_names() -> impl Iterator<Item = &'static str> {
    SPECIAL_FORMS.iter().map(|form| form.name)
}

/// `(quote expr)`
fn eval_quote(args: &[Value], _env: &Environment, _depth: usize) -> Result<Value, Error> {
    match args {
        [expr] => Ok(expr.clone()),
        _ => Err(Error::arity_error("quote", Arity::Exact(1), args.len())),
    }
}

/// `(define name expr)`: binds in the current scope and returns the value
fn eval_define(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = eval_with_depth_tracking(expr, env, depth)?;
            debug!(%name, "define");
            env.define(name.clone(), value.clone());
            Ok(value)
        }
        [other, _] => Err(Error::malformed(
            "define",
            format!("name must be a symbol, got {other}"),
        )),
        _ => Err(Error::arity_error("define", Arity::Exact(2), args.len())),
    }
}

/// `(set! name expr)`: rebinds the nearest existing binding and returns the value
fn eval_set(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = eval_with_depth_tracking(expr, env, depth)?;
            env.set(name, value.clone())?;
            debug!(%name, "set");
            Ok(value)
        }
        [other, _] => Err(Error::malformed(
            "set!",
            format!("name must be a symbol, got {other}"),
        )),
        _ => Err(Error::arity_error("set!", Arity::Exact(2), args.len())),
    }
}

/// `(if test then else)`: evaluates exactly one branch
fn eval_if(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [test_expr, then_expr, else_expr] => {
            let branch = if eval_with_depth_tracking(test_expr, env, depth)?.is_truthy() {
                then_expr
            } else {
                else_expr
            };
            eval_with_depth_tracking(branch, env, depth)
        }
        _ => Err(Error::arity_error("if", Arity::Exact(3), args.len())),
    }
}

/// `(lambda (p1 ...) body)`: captures the current scope by reference
fn eval_lambda(args: &[Value], env: &Environment, _depth: usize) -> Result<Value, Error> {
    match args {
        [Value::List(param_list), body] => {
            let mut params: Vec<String> = Vec::with_capacity(param_list.len());
            for param in param_list {
                match param {
                    Value::Symbol(name) => {
                        if params.contains(name) {
                            return Err(Error::malformed(
                                "lambda",
                                format!("duplicate parameter {name}"),
                            ));
                        }
                        params.push(name.clone());
                    }
                    other => {
                        return Err(Error::malformed(
                            "lambda",
                            format!("parameter must be a symbol, got {other}"),
                        ));
                    }
                }
            }

            Ok(Value::Closure {
                params,
                body: Box::new(body.clone()),
                env: env.clone(),
            })
        }
        [other, _] => Err(Error::malformed(
            "lambda",
            format!("parameters must be a list, got {other}"),
        )),
        _ => Err(Error::arity_error("lambda", Arity::Exact(2), args.len())),
    }
}
