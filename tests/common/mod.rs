//! Test utilities for lotvm integration tests
//!
//! This module provides shared utilities for integration tests, including:
//! - Fixture grammars over strings and booleans
//! - A tree-walking reference evaluator to check compiled execution against
//! - Tracing setup for test output
#![allow(dead_code)]

use lotvm::vm::PrimitiveFn;
use lotvm::{BuiltinOp, Grammar, Node, PrimitiveError, Value, ValueType};
use tracing_subscriber::{fmt, EnvFilter};

/// Install a test-writer subscriber once per test binary.
///
/// Use `RUST_LOG` to see VM traces, e.g. `RUST_LOG=lotvm::vm=trace`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
}

fn str_arg(args: &[Value], i: usize) -> String {
    args[i].as_str().unwrap_or_default().to_string()
}

/// S -> a | (S S)
pub fn pairs_grammar() -> Grammar {
    let mut g = Grammar::new(ValueType::Str, ValueType::Str, &[ValueType::Str]).unwrap();
    g.add_terminal("a", "a", 1.0).unwrap();
    g.add_primitive(
        ValueType::Str,
        "(%s%s)",
        &[ValueType::Str, ValueType::Str],
        1.0,
        |args| Ok(Value::from(format!("({}{})", str_arg(args, 0), str_arg(args, 1)))),
    )
    .unwrap();
    g
}

/// Programs from strings to strings.
///
/// With `random`, Bool also has `flip()` and `flipp(%s)` over a few float
/// constants.
pub fn string_grammar(random: bool) -> Grammar {
    use ValueType::*;
    let types: &[ValueType] = if random { &[Str, Bool, Float] } else { &[Str, Bool] };
    let mut g = Grammar::new(Str, Str, types).unwrap();

    g.add_builtin(BuiltinOp::X, Str, "x", 3.0, 0).unwrap();
    g.add_terminal("'a'", "a", 1.0).unwrap();
    g.add_terminal("'b'", "b", 1.0).unwrap();
    g.add_terminal("''", "", 0.5).unwrap();
    g.add_primitive(Str, "tail(%s)", &[Str], 1.0, |args| {
        Ok(Value::from(str_arg(args, 0).chars().skip(1).collect::<String>()))
    })
    .unwrap();
    g.add_primitive(Str, "head(%s)", &[Str], 0.5, |args| {
        str_arg(args, 0)
            .chars()
            .next()
            .map(|c| Value::from(c.to_string()))
            .ok_or_else(|| PrimitiveError::Runtime("head of empty string".into()))
    })
    .unwrap();
    g.add_primitive(Str, "cat(%s,%s)", &[Str, Str], 0.5, |args| {
        let s = str_arg(args, 0) + &str_arg(args, 1);
        if s.len() > 256 {
            return Err(PrimitiveError::SizeLimit {
                limit: 256,
                got: s.len(),
            });
        }
        Ok(Value::from(s))
    })
    .unwrap();
    g.add_in_place(Str, "append(%s,%s)", &[Str, Str], 0.3, |target, args| {
        let tail = str_arg(args, 0);
        let s = target
            .as_str_mut()
            .ok_or_else(|| PrimitiveError::Runtime("append to a non-string".into()))?;
        if s.len() + tail.len() > 256 {
            return Err(PrimitiveError::SizeLimit {
                limit: 256,
                got: s.len() + tail.len(),
            });
        }
        s.push_str(&tail);
        Ok(())
    })
    .unwrap();
    g.add_builtin(BuiltinOp::If, Str, "if(%s,%s,%s)", 0.5, 0).unwrap();
    g.add_builtin(BuiltinOp::SafeRecurse, Str, "F(%s)", 0.3, 0).unwrap();

    g.add_primitive(Bool, "empty(%s)", &[Str], 1.0, |args| {
        Ok(Value::Bool(str_arg(args, 0).is_empty()))
    })
    .unwrap();
    g.add_primitive(Bool, "eq(%s,%s)", &[Str, Str], 0.5, |args| {
        Ok(Value::Bool(str_arg(args, 0) == str_arg(args, 1)))
    })
    .unwrap();
    g.add_builtin(BuiltinOp::True, Bool, "true", 0.3, 0).unwrap();
    g.add_builtin(BuiltinOp::False, Bool, "false", 0.3, 0).unwrap();
    g.add_builtin(BuiltinOp::And, Bool, "and(%s,%s)", 0.2, 0).unwrap();
    g.add_builtin(BuiltinOp::Or, Bool, "or(%s,%s)", 0.2, 0).unwrap();
    g.add_builtin(BuiltinOp::Not, Bool, "not(%s)", 0.3, 0).unwrap();

    if random {
        g.add_builtin(BuiltinOp::Flip, Bool, "flip()", 1.0, 0).unwrap();
        g.add_builtin(BuiltinOp::FlipP, Bool, "flipp(%s)", 0.5, 0).unwrap();
        g.add_terminal("0.1", 0.1, 1.0).unwrap();
        g.add_terminal("0.75", 0.75, 1.0).unwrap();
    }
    g
}

/// Evaluate a deterministic tree directly, recursing into `root` for
/// recursive calls. `None` means the evaluation was abandoned: a primitive
/// failed, or more than `max_recursion` calls were made.
pub fn reference_eval(g: &Grammar, root: &Node, input: &Value, max_recursion: usize) -> Option<Value> {
    let mut calls = 0;
    walk(g, root, root, input, max_recursion, &mut calls)
}

fn walk(
    g: &Grammar,
    root: &Node,
    n: &Node,
    x: &Value,
    max_recursion: usize,
    calls: &mut usize,
) -> Option<Value> {
    let child = |i: usize, calls: &mut usize| walk(g, root, n.child(i)?, x, max_recursion, calls);
    let rule = n.rule();

    match rule.op() {
        lotvm::vm::Op::Primitive(id) => {
            let prim = g.primitives().get(id)?;
            let mut args = Vec::with_capacity(n.arity());
            for i in 0..n.arity() {
                args.push(child(i, calls)?);
            }
            match &prim.func {
                PrimitiveFn::Pure(f) => f(&args).ok(),
                PrimitiveFn::InPlace(f) => {
                    let mut first = args.remove(0);
                    f(&mut first, &args).ok()?;
                    Some(first)
                }
            }
        }
        lotvm::vm::Op::Builtin(op) => match op {
            BuiltinOp::X => Some(x.clone()),
            BuiltinOp::True => Some(Value::Bool(true)),
            BuiltinOp::False => Some(Value::Bool(false)),
            BuiltinOp::Int => Some(Value::Int(i64::from(rule.arg()))),
            BuiltinOp::Not => Some(Value::Bool(!child(0, calls)?.as_bool()?)),
            BuiltinOp::And => {
                if child(0, calls)?.as_bool()? {
                    child(1, calls)
                } else {
                    Some(Value::Bool(false))
                }
            }
            BuiltinOp::Or => {
                if child(0, calls)?.as_bool()? {
                    Some(Value::Bool(true))
                } else {
                    child(1, calls)
                }
            }
            BuiltinOp::If => {
                if child(0, calls)?.as_bool()? {
                    child(1, calls)
                } else {
                    child(2, calls)
                }
            }
            BuiltinOp::Recurse | BuiltinOp::SafeRecurse => {
                let arg = child(0, calls)?;
                if op == BuiltinOp::SafeRecurse && arg.is_empty() {
                    return Some(g.output_type().default_value());
                }
                *calls += 1;
                if *calls > max_recursion {
                    return None;
                }
                walk(g, root, root, &arg, max_recursion, calls)
            }
            _ => panic!("reference evaluator does not handle {}", op),
        },
    }
}
