use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use zylisp::ast::Value;
use zylisp::builtinops::{find_builtin_op, get_builtin_ops};
use zylisp::evaluator::{Environment, special_form_names};
use zylisp::{Error, ParseError, ParseErrorKind, eval, eval_program, global_environment, parse_program};

/// A minimal Lisp with lexical closures
#[derive(Parser)]
#[command(name = "zylisp")]
#[command(version)]
#[command(about = "Run a Zylisp script, evaluate an expression, or start the REPL")]
struct Cli {
    /// Script to run; starts the interactive REPL when omitted
    script: Option<PathBuf>,

    /// Evaluate EXPR, print its value and exit
    #[arg(short, long, value_name = "EXPR", conflicts_with = "script")]
    eval: Option<String>,

    /// Log definitions and procedure calls to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("zylisp=trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let env = global_environment();

    let outcome = if let Some(source) = &cli.eval {
        run_source(source, &env)
    } else if let Some(path) = &cli.script {
        match std::fs::read_to_string(path) {
            Ok(source) => {
                info!(path = %path.display(), "running script");
                run_source(&source, &env)
            }
            Err(err) => {
                eprintln!("Error: cannot read {}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        }
    } else {
        return run_repl(&env);
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Evaluate a whole program, printing the value of its last form
fn run_source(source: &str, env: &Environment) -> Result<(), Error> {
    let result = eval_program(source, env)?;
    if !matches!(result, Value::Nil) {
        println!("{result}");
    }
    Ok(())
}

fn is_incomplete(err: &Error) -> bool {
    matches!(
        err,
        Error::Parse(ParseError {
            kind: ParseErrorKind::Incomplete,
            ..
        })
    )
}

fn run_repl(env: &Environment) -> ExitCode {
    println!("Zylisp");
    println!("Enter expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Error: could not initialize REPL: {err}");
            return ExitCode::FAILURE;
        }
    };

    // Lines of a form that spans several lines
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() { "zylisp> " } else { "   ...> " };

        match rl.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if pending.is_empty() {
                    if trimmed.is_empty() {
                        continue;
                    }

                    match trimmed {
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(env);
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {
                            if let Some(name) = trimmed.strip_prefix(":help ") {
                                describe(name.trim());
                                continue;
                            }
                        }
                    }
                }

                pending.push_str(&line);
                pending.push('\n');

                let forms = match parse_program(&pending) {
                    Ok(forms) => forms,
                    Err(err) if is_incomplete(&err) => continue,
                    Err(err) => {
                        println!("Error: {err}");
                        let _ = rl.add_history_entry(pending.trim_end());
                        pending.clear();
                        continue;
                    }
                };

                let _ = rl.add_history_entry(pending.trim_end());
                pending.clear();

                for form in &forms {
                    match eval(form, env) {
                        Ok(result) => println!("{result}"),
                        Err(err) => {
                            println!("Error: {err}");
                            break;
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) if !pending.is_empty() => {
                debug!("discarding incomplete input");
                pending.clear();
            }
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {err}");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

fn print_help() {
    println!("Commands:");
    println!("  :help  - Show this help message");
    println!("  :help NAME - Describe a primitive or special form");
    println!("  :env   - Show current environment bindings");
    println!("  :quit  - Exit the interpreter");
    println!("  :exit  - Exit the interpreter");
    println!("  Ctrl+C - Discard an incomplete multi-line form, or exit");
    println!();
    println!("Values:");
    println!("  Numbers: 42, -5    Strings: \"hi\"    Booleans: true, false");
    println!("  Only false and nil are false; 0, \"\" and () are true");
    println!();

    let forms: Vec<_> = special_form_names().collect();
    println!("Special forms: {}", forms.join(" "));

    let primitives: Vec<_> = get_builtin_ops().iter().map(|op| op.name).collect();
    println!("Primitives: {}", primitives.join(" "));
    println!();

    println!("Examples:");
    println!("  (define square (lambda (x) (* x x)))");
    println!("  (square 5)");
    println!("  (car (quote (1 2 3)))");
    println!();
}

/// Print what `name` is bound to before any user definitions
fn describe(name: &str) {
    if special_form_names().any(|form| form == name) {
        println!("{name}: special form");
    } else if let Some(op) = find_builtin_op(name) {
        println!("{name}: primitive taking {}", op.arity);
    } else {
        println!("{name}: not a primitive or special form");
    }
}

fn print_environment(env: &Environment) {
    let bindings = env.bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    let mut primitives = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Value::Primitive { .. } => primitives.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    if !primitives.is_empty() {
        println!("Primitives ({}):", primitives.len());
        // Print in columns for readability
        let mut col = 0;
        for name in primitives {
            print!("  {name:<10}");
            col += 1;
            if col % 6 == 0 {
                println!();
            }
        }
        if col % 6 != 0 {
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
