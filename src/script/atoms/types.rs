//! # Types, Conversion and Errors

use crate::script::atoms::helpers::expect_arity;
use crate::script::atoms::{Atom, AtomRegistry, PureAtomFn};
use crate::script::error::ScriptError;
use crate::script::value::Value;

pub const ATOM_IS_NIL: PureAtomFn = |args| predicate("nil?", args, |v| matches!(v, Value::Nil));
pub const ATOM_IS_NUMBER: PureAtomFn =
    |args| predicate("number?", args, |v| matches!(v, Value::Number(_)));
pub const ATOM_IS_STRING: PureAtomFn =
    |args| predicate("string?", args, |v| matches!(v, Value::String(_)));
pub const ATOM_IS_BOOL: PureAtomFn = |args| predicate("bool?", args, |v| matches!(v, Value::Bool(_)));
pub const ATOM_IS_LIST: PureAtomFn = |args| predicate("list?", args, |v| matches!(v, Value::List(_)));
pub const ATOM_IS_MAP: PureAtomFn = |args| predicate("map?", args, |v| matches!(v, Value::Map(_)));

fn predicate(atom: &str, args: &[Value], test: fn(&Value) -> bool) -> Result<Value, ScriptError> {
    expect_arity(atom, args, 1)?;
    Ok(Value::Bool(test(&args[0])))
}

/// Parses a number out of a string; numbers pass through unchanged.
/// Unparseable text yields `nil` so scripts can test for it.
///
/// Usage: (number <value>)
///
/// Example:
///   (number " 42\n") ; => 42
pub const ATOM_NUMBER: PureAtomFn = |args| {
    expect_arity("number", args, 1)?;
    match &args[0] {
        Value::Number(n) => Ok(Value::Number(*n)),
        Value::String(s) => Ok(s.trim().parse::<f64>().map(Value::Number).unwrap_or_default()),
        other => Err(ScriptError::type_mismatch("number", "number or string", other.type_name())),
    }
};

/// Usage: (type-of <value>)
pub const ATOM_TYPE_OF: PureAtomFn = |args| {
    expect_arity("type-of", args, 1)?;
    Ok(Value::from(args[0].type_name()))
};

/// Aborts evaluation with a message built like `str`.
///
/// Usage: (error <part> ...)
///
/// Example:
///   (error "unexpected exit code " code)
pub const ATOM_ERROR: PureAtomFn = |args| {
    let message: String = args.iter().map(ToString::to_string).collect();
    Err(ScriptError::Raised { message })
};

pub fn register_type_atoms(registry: &mut AtomRegistry) {
    registry.register("nil?", Atom::Pure(ATOM_IS_NIL));
    registry.register("number?", Atom::Pure(ATOM_IS_NUMBER));
    registry.register("string?", Atom::Pure(ATOM_IS_STRING));
    registry.register("bool?", Atom::Pure(ATOM_IS_BOOL));
    registry.register("list?", Atom::Pure(ATOM_IS_LIST));
    registry.register("map?", Atom::Pure(ATOM_IS_MAP));
    registry.register("number", Atom::Pure(ATOM_NUMBER));
    registry.register("type-of", Atom::Pure(ATOM_TYPE_OF));
    registry.register("error", Atom::Pure(ATOM_ERROR));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_conversion() {
        assert_eq!(ATOM_NUMBER(&[Value::from(" 42\n")]).unwrap(), Value::Number(42.0));
        assert_eq!(ATOM_NUMBER(&[Value::from("forty")]).unwrap(), Value::Nil);
    }

    #[test]
    fn error_raises_its_message() {
        let err = ATOM_ERROR(&[Value::from("bad "), Value::Number(3.0)]).unwrap_err();
        assert_eq!(err.to_string(), "bad 3");
    }

    #[test]
    fn predicates() {
        assert_eq!(ATOM_IS_NIL(&[Value::Nil]).unwrap(), Value::Bool(true));
        assert_eq!(ATOM_IS_MAP(&[Value::Nil]).unwrap(), Value::Bool(false));
        assert_eq!(ATOM_TYPE_OF(&[Value::from("x")]).unwrap(), Value::from("string"));
    }
}
