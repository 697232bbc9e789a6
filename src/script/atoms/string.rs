//! # String Operations

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::script::atoms::helpers::{expect_arity, expect_list, expect_string};
use crate::script::atoms::{Atom, AtomRegistry, PureAtomFn};
use crate::script::error::ScriptError;
use crate::script::value::Value;

/// Concatenates the display form of every argument.
///
/// Usage: (str <a> <b> ...)
///
/// Example:
///   (str "exit " 0) ; => "exit 0"
pub const ATOM_STR: PureAtomFn = |args| {
    let mut out = String::new();
    for arg in args {
        out.push_str(&arg.to_string());
    }
    Ok(Value::String(out))
};

pub const ATOM_TRIM: PureAtomFn = |args| {
    expect_arity("trim", args, 1)?;
    Ok(Value::from(expect_string("trim", &args[0])?.trim()))
};

pub const ATOM_UPPER: PureAtomFn = |args| {
    expect_arity("upper", args, 1)?;
    Ok(Value::String(expect_string("upper", &args[0])?.to_uppercase()))
};

pub const ATOM_LOWER: PureAtomFn = |args| {
    expect_arity("lower", args, 1)?;
    Ok(Value::String(expect_string("lower", &args[0])?.to_lowercase()))
};

/// Splits text into lines, dropping line terminators.
///
/// Usage: (lines <string>)
///
/// Example:
///   (lines "a\nb\n") ; => ("a" "b")
pub const ATOM_LINES: PureAtomFn = |args| {
    expect_arity("lines", args, 1)?;
    let text = expect_string("lines", &args[0])?;
    Ok(Value::List(text.lines().map(Value::from).collect()))
};

/// Usage: (split <string> <separator>)
pub const ATOM_SPLIT: PureAtomFn = |args| {
    expect_arity("split", args, 2)?;
    let text = expect_string("split", &args[0])?;
    let separator = expect_string("split", &args[1])?;
    if separator.is_empty() {
        return Ok(Value::List(
            text.chars().map(|c| Value::String(c.to_string())).collect(),
        ));
    }
    Ok(Value::List(text.split(separator).map(Value::from).collect()))
};

/// Joins the display form of each list item.
///
/// Usage: (join <list> <separator>)
///
/// Example:
///   (join (list 1 2) ",") ; => "1,2"
pub const ATOM_JOIN: PureAtomFn = |args| {
    expect_arity("join", args, 2)?;
    let items = expect_list("join", &args[0])?;
    let separator = expect_string("join", &args[1])?;
    let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
    Ok(Value::String(parts.join(separator)))
};

/// Substring test for strings, membership for lists, key lookup for maps.
///
/// Usage: (contains? <haystack> <needle>)
pub const ATOM_CONTAINS: PureAtomFn = |args| {
    expect_arity("contains?", args, 2)?;
    let found = match &args[0] {
        Value::String(s) => s.contains(expect_string("contains?", &args[1])?),
        Value::List(items) => items.contains(&args[1]),
        Value::Map(fields) => fields.contains_key(expect_string("contains?", &args[1])?),
        other => {
            return Err(ScriptError::type_mismatch(
                "contains?",
                "string, list or map",
                other.type_name(),
            ))
        }
    };
    Ok(Value::Bool(found))
};

pub const ATOM_STARTS_WITH: PureAtomFn = |args| {
    expect_arity("starts-with?", args, 2)?;
    let text = expect_string("starts-with?", &args[0])?;
    let prefix = expect_string("starts-with?", &args[1])?;
    Ok(Value::Bool(text.starts_with(prefix)))
};

pub const ATOM_ENDS_WITH: PureAtomFn = |args| {
    expect_arity("ends-with?", args, 2)?;
    let text = expect_string("ends-with?", &args[0])?;
    let suffix = expect_string("ends-with?", &args[1])?;
    Ok(Value::Bool(text.ends_with(suffix)))
};

/// Regular expression search.
///
/// Usage: (matches? <string> <pattern>)
///
/// Example:
///   (matches? "error: line 3" "line [0-9]+") ; => true
pub const ATOM_MATCHES: PureAtomFn = |args| {
    expect_arity("matches?", args, 2)?;
    let text = expect_string("matches?", &args[0])?;
    let pattern = expect_string("matches?", &args[1])?;
    Ok(Value::Bool(compile_pattern(pattern)?.is_match(text)))
};

const PATTERN_CACHE_LIMIT: usize = 256;

/// Compiled `matches?` patterns, shared by every interpreter.
static PATTERN_CACHE: Lazy<Mutex<HashMap<String, Regex>>> = Lazy::new(Default::default);

fn compile_pattern(pattern: &str) -> Result<Regex, ScriptError> {
    let mut cache = PATTERN_CACHE.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.clone());
    }
    let regex = Regex::new(pattern).map_err(|e| ScriptError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    if cache.len() >= PATTERN_CACHE_LIMIT {
        cache.clear();
    }
    cache.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

pub fn register_string_atoms(registry: &mut AtomRegistry) {
    registry.register("str", Atom::Pure(ATOM_STR));
    registry.register("trim", Atom::Pure(ATOM_TRIM));
    registry.register("upper", Atom::Pure(ATOM_UPPER));
    registry.register("lower", Atom::Pure(ATOM_LOWER));
    registry.register("lines", Atom::Pure(ATOM_LINES));
    registry.register("split", Atom::Pure(ATOM_SPLIT));
    registry.register("join", Atom::Pure(ATOM_JOIN));
    registry.register("contains?", Atom::Pure(ATOM_CONTAINS));
    registry.register("starts-with?", Atom::Pure(ATOM_STARTS_WITH));
    registry.register("ends-with?", Atom::Pure(ATOM_ENDS_WITH));
    registry.register("matches?", Atom::Pure(ATOM_MATCHES));
}
