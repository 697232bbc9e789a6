//! # Collection Operations
//!
//! Lists and maps are immutable: `assoc` returns a new map. `nil` behaves as
//! an empty list wherever a list is expected, so `(first nil)` is `nil`.

use crate::script::atoms::helpers::{
    expect_arity, expect_arity_range, expect_at_least, expect_callable, expect_index, expect_list,
    expect_map, expect_string,
};
use crate::script::atoms::{ApplicativeAtomFn, Atom, AtomRegistry, PureAtomFn};
use crate::script::error::ScriptError;
use crate::script::value::Value;

// ============================================================================
// CONSTRUCTION AND ACCESS
// ============================================================================

pub const ATOM_LIST: PureAtomFn = |args| Ok(Value::List(args.to_vec()));

/// Length of a string (in characters), list or map.
///
/// Usage: (len <collection>)
pub const ATOM_LEN: PureAtomFn = |args| {
    expect_arity("len", args, 1)?;
    let len = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(fields) => fields.len(),
        Value::Nil => 0,
        other => return Err(ScriptError::type_mismatch("len", "collection", other.type_name())),
    };
    Ok(Value::Number(len as f64))
};

pub const ATOM_FIRST: PureAtomFn = |args| {
    expect_arity("first", args, 1)?;
    Ok(expect_list("first", &args[0])?.first().cloned().unwrap_or_default())
};

pub const ATOM_REST: PureAtomFn = |args| {
    expect_arity("rest", args, 1)?;
    let items = expect_list("rest", &args[0])?;
    Ok(Value::List(items.iter().skip(1).cloned().collect()))
};

/// Usage: (nth <list> <index>)
pub const ATOM_NTH: PureAtomFn = |args| {
    expect_arity("nth", args, 2)?;
    let items = expect_list("nth", &args[0])?;
    let index = expect_index("nth", &args[1])?;
    Ok(items.get(index).cloned().unwrap_or_default())
};

/// Looks up a map key or list index, with an optional default.
///
/// Usage: (get <collection> <key> [default])
///
/// Example:
///   (get ctx "config")      ; => the assertion configuration
///   (get {:a 1} "b" 0)      ; => 0
pub const ATOM_GET: PureAtomFn = |args| {
    expect_arity_range("get", args, 2, 3)?;
    let default = args.get(2).cloned().unwrap_or_default();
    Ok(lookup("get", &args[0], &args[1])?.unwrap_or(default))
};

/// Follows a path of keys through nested maps and lists.
///
/// Usage: (get-in <collection> <key> ...)
///
/// Example:
///   (get-in ctx "output" "stdout")
pub const ATOM_GET_IN: PureAtomFn = |args| {
    expect_at_least("get-in", args, 1)?;
    let mut current = args[0].clone();
    for key in &args[1..] {
        match lookup("get-in", &current, key)? {
            Some(next) => current = next,
            None => return Ok(Value::Nil),
        }
    }
    Ok(current)
};

fn lookup(atom: &str, collection: &Value, key: &Value) -> Result<Option<Value>, ScriptError> {
    match collection {
        Value::Map(fields) => Ok(fields.get(expect_string(atom, key)?).cloned()),
        Value::List(items) => Ok(items.get(expect_index(atom, key)?).cloned()),
        Value::Nil => Ok(None),
        other => Err(ScriptError::type_mismatch(atom, "map or list", other.type_name())),
    }
}

/// Usage: (assoc <map> <key> <value> ...)
pub const ATOM_ASSOC: PureAtomFn = |args| {
    expect_at_least("assoc", args, 1)?;
    let mut fields = match &args[0] {
        Value::Nil => Default::default(),
        other => expect_map("assoc", other)?.clone(),
    };
    let pairs = &args[1..];
    if pairs.len() % 2 != 0 {
        return Err(ScriptError::arity("assoc", "a map followed by key/value pairs", args.len()));
    }
    for pair in pairs.chunks(2) {
        fields.insert(expect_string("assoc", &pair[0])?.to_string(), pair[1].clone());
    }
    Ok(Value::Map(fields))
};

pub const ATOM_KEYS: PureAtomFn = |args| {
    expect_arity("keys", args, 1)?;
    let fields = expect_map("keys", &args[0])?;
    Ok(Value::List(fields.keys().map(|k| Value::String(k.clone())).collect()))
};

// ============================================================================
// HIGHER-ORDER OPERATIONS
// ============================================================================

/// Usage: (map <fn> <list>)
///
/// Example:
///   (map trim (lines stdout))
pub const ATOM_MAP: ApplicativeAtomFn = |args, interpreter| {
    expect_arity("map", args, 2)?;
    let f = expect_callable("map", &args[0])?;
    let items = expect_list("map", &args[1])?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(interpreter.apply(f, vec![item.clone()])?);
    }
    Ok(Value::List(out))
};

/// Usage: (filter <predicate> <list>)
pub const ATOM_FILTER: ApplicativeAtomFn = |args, interpreter| {
    expect_arity("filter", args, 2)?;
    let f = expect_callable("filter", &args[0])?;
    let items = expect_list("filter", &args[1])?;
    let mut out = Vec::new();
    for item in items {
        if interpreter.apply(f, vec![item.clone()])?.is_truthy() {
            out.push(item.clone());
        }
    }
    Ok(Value::List(out))
};

/// Usage: (reduce <fn> <initial> <list>)
///
/// Example:
///   (reduce + 0 (list 1 2 3)) ; => 6
pub const ATOM_REDUCE: ApplicativeAtomFn = |args, interpreter| {
    expect_arity("reduce", args, 3)?;
    let f = expect_callable("reduce", &args[0])?;
    let items = expect_list("reduce", &args[2])?;
    let mut acc = args[1].clone();
    for item in items {
        acc = interpreter.apply(f, vec![acc, item.clone()])?;
    }
    Ok(acc)
};

pub fn register_collection_atoms(registry: &mut AtomRegistry) {
    registry.register("list", Atom::Pure(ATOM_LIST));
    registry.register("len", Atom::Pure(ATOM_LEN));
    registry.register("first", Atom::Pure(ATOM_FIRST));
    registry.register("rest", Atom::Pure(ATOM_REST));
    registry.register("nth", Atom::Pure(ATOM_NTH));
    registry.register("get", Atom::Pure(ATOM_GET));
    registry.register("get-in", Atom::Pure(ATOM_GET_IN));
    registry.register("assoc", Atom::Pure(ATOM_ASSOC));
    registry.register("keys", Atom::Pure(ATOM_KEYS));
    registry.register("map", Atom::Applicative(ATOM_MAP));
    registry.register("filter", Atom::Applicative(ATOM_FILTER));
    registry.register("reduce", Atom::Applicative(ATOM_REDUCE));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> Value {
        Value::from_json(&json!({"output": {"stdout": "3\n", "exitCode": 0}, "tags": ["a", "b"]}))
    }

    #[test]
    fn get_in_walks_maps_and_lists() {
        let args = [ctx(), Value::from("output"), Value::from("stdout")];
        assert_eq!(ATOM_GET_IN(&args).unwrap(), Value::from("3\n"));
        let args = [ctx(), Value::from("tags"), Value::Number(1.0)];
        assert_eq!(ATOM_GET_IN(&args).unwrap(), Value::from("b"));
        let args = [ctx(), Value::from("missing"), Value::from("deeper")];
        assert_eq!(ATOM_GET_IN(&args).unwrap(), Value::Nil);
    }

    #[test]
    fn get_falls_back_to_default() {
        let args = [ctx(), Value::from("nope"), Value::Number(0.0)];
        assert_eq!(ATOM_GET(&args).unwrap(), Value::Number(0.0));
    }

    #[test]
    fn assoc_returns_a_new_map() {
        let original = ctx();
        let updated = ATOM_ASSOC(&[original.clone(), Value::from("pass"), Value::Bool(true)]).unwrap();
        assert_eq!(ATOM_LEN(&[original]).unwrap(), Value::Number(2.0));
        assert_eq!(ATOM_LEN(&[updated]).unwrap(), Value::Number(3.0));
    }

    #[test]
    fn first_and_rest_on_empty() {
        assert_eq!(ATOM_FIRST(&[Value::Nil]).unwrap(), Value::Nil);
        assert_eq!(ATOM_REST(&[Value::List(vec![])]).unwrap(), Value::List(vec![]));
    }
}
