//! Argument checking shared by every atom module.

use im::OrdMap;

use crate::script::error::ScriptError;
use crate::script::value::Value;

pub fn expect_arity(atom: &str, args: &[Value], expected: usize) -> Result<(), ScriptError> {
    if args.len() != expected {
        return Err(ScriptError::arity(atom, expected, args.len()));
    }
    Ok(())
}

pub fn expect_arity_range(
    atom: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<(), ScriptError> {
    if args.len() < min || args.len() > max {
        return Err(ScriptError::arity(atom, format!("{min}..={max}"), args.len()));
    }
    Ok(())
}

pub fn expect_at_least(atom: &str, args: &[Value], min: usize) -> Result<(), ScriptError> {
    if args.len() < min {
        return Err(ScriptError::arity(atom, format!("at least {min}"), args.len()));
    }
    Ok(())
}

pub fn expect_number(atom: &str, value: &Value) -> Result<f64, ScriptError> {
    value
        .as_number()
        .ok_or_else(|| ScriptError::type_mismatch(atom, "number", value.type_name()))
}

pub fn expect_string<'a>(atom: &str, value: &'a Value) -> Result<&'a str, ScriptError> {
    value
        .as_str()
        .ok_or_else(|| ScriptError::type_mismatch(atom, "string", value.type_name()))
}

pub fn expect_list<'a>(atom: &str, value: &'a Value) -> Result<&'a [Value], ScriptError> {
    match value {
        Value::List(items) => Ok(items),
        Value::Nil => Ok(&[]),
        other => Err(ScriptError::type_mismatch(atom, "list", other.type_name())),
    }
}

pub fn expect_map<'a>(atom: &str, value: &'a Value) -> Result<&'a OrdMap<String, Value>, ScriptError> {
    match value {
        Value::Map(fields) => Ok(fields),
        other => Err(ScriptError::type_mismatch(atom, "map", other.type_name())),
    }
}

pub fn expect_callable<'a>(atom: &str, value: &'a Value) -> Result<&'a Value, ScriptError> {
    if value.is_callable() {
        Ok(value)
    } else {
        Err(ScriptError::type_mismatch(atom, "function", value.type_name()))
    }
}

/// Converts a non-negative integral number into an index.
pub fn expect_index(atom: &str, value: &Value) -> Result<usize, ScriptError> {
    let n = expect_number(atom, value)?;
    if n < 0.0 || n.fract() != 0.0 {
        return Err(ScriptError::type_mismatch(
            atom,
            "non-negative integer",
            &n.to_string(),
        ));
    }
    Ok(n as usize)
}
