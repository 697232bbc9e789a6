//! # Comparison and Logic
//!
//! `=` and `!=` compare any values structurally. The ordering atoms accept
//! either all numbers or all strings and compare each adjacent pair.

use std::cmp::Ordering;

use crate::script::atoms::helpers::{expect_arity, expect_at_least};
use crate::script::atoms::{Atom, AtomRegistry, PureAtomFn};
use crate::script::error::ScriptError;
use crate::script::value::Value;

/// Structural equality of all arguments.
///
/// Usage: (= <a> <b> ...)
///
/// Example:
///   (= "3" "3") ; => true
pub const ATOM_EQ: PureAtomFn = |args| {
    expect_at_least("=", args, 2)?;
    Ok(Value::Bool(args.windows(2).all(|w| w[0] == w[1])))
};

/// Usage: (!= <a> <b>)
pub const ATOM_NEQ: PureAtomFn = |args| {
    expect_arity("!=", args, 2)?;
    Ok(Value::Bool(args[0] != args[1]))
};

pub const ATOM_LT: PureAtomFn = |args| compare_chain("<", args, |o| o == Ordering::Less);
pub const ATOM_GT: PureAtomFn = |args| compare_chain(">", args, |o| o == Ordering::Greater);
pub const ATOM_LTE: PureAtomFn = |args| compare_chain("<=", args, |o| o != Ordering::Greater);
pub const ATOM_GTE: PureAtomFn = |args| compare_chain(">=", args, |o| o != Ordering::Less);

/// Logical negation using script truthiness.
///
/// Usage: (not <value>)
///
/// Example:
///   (not nil) ; => true
pub const ATOM_NOT: PureAtomFn = |args| {
    expect_arity("not", args, 1)?;
    Ok(Value::Bool(!args[0].is_truthy()))
};

fn compare_chain(
    atom: &str,
    args: &[Value],
    accept: fn(Ordering) -> bool,
) -> Result<Value, ScriptError> {
    expect_at_least(atom, args, 2)?;
    for pair in args.windows(2) {
        if !accept(compare(atom, &pair[0], &pair[1])?) {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn compare(atom: &str, a: &Value, b: &Value) -> Result<Ordering, ScriptError> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .partial_cmp(y)
            .ok_or_else(|| ScriptError::type_mismatch(atom, "comparable numbers", "NaN")),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (Value::Number(_), other) | (Value::String(_), other) => Err(ScriptError::type_mismatch(
            atom,
            a.type_name(),
            other.type_name(),
        )),
        (other, _) => Err(ScriptError::type_mismatch(
            atom,
            "number or string",
            other.type_name(),
        )),
    }
}

pub fn register_logic_atoms(registry: &mut AtomRegistry) {
    registry.register("=", Atom::Pure(ATOM_EQ));
    registry.register("!=", Atom::Pure(ATOM_NEQ));
    registry.register("<", Atom::Pure(ATOM_LT));
    registry.register(">", Atom::Pure(ATOM_GT));
    registry.register("<=", Atom::Pure(ATOM_LTE));
    registry.register(">=", Atom::Pure(ATOM_GTE));
    registry.register("not", Atom::Pure(ATOM_NOT));
}
