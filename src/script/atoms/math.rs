//! # Mathematical Operations
//!
//! All numbers are `f64`. Integral results print without a fractional part.

use crate::script::atoms::helpers::{expect_arity, expect_at_least, expect_number};
use crate::script::atoms::{Atom, AtomRegistry, PureAtomFn};
use crate::script::error::ScriptError;
use crate::script::value::Value;

// ============================================================================
// ARITHMETIC OPERATIONS
// ============================================================================

/// Adds numbers.
///
/// Usage: (+ <a> <b> ...)
///
/// Example:
///   (+ 1 2 3) ; => 6
pub const ATOM_ADD: PureAtomFn = |args| {
    let mut sum = 0.0;
    for arg in args {
        sum += expect_number("+", arg)?;
    }
    Ok(Value::Number(sum))
};

/// Subtracts numbers, or negates a single number.
///
/// Usage: (- <a> <b> ...)
///
/// Example:
///   (- 5 2) ; => 3
///   (- 4)   ; => -4
pub const ATOM_SUB: PureAtomFn = |args| {
    expect_at_least("-", args, 1)?;
    let first = expect_number("-", &args[0])?;
    if args.len() == 1 {
        return Ok(Value::Number(-first));
    }
    let mut result = first;
    for arg in &args[1..] {
        result -= expect_number("-", arg)?;
    }
    Ok(Value::Number(result))
};

/// Multiplies numbers.
///
/// Usage: (* <a> <b> ...)
///
/// Example:
///   (* 2 3 4) ; => 24
pub const ATOM_MUL: PureAtomFn = |args| {
    let mut product = 1.0;
    for arg in args {
        product *= expect_number("*", arg)?;
    }
    Ok(Value::Number(product))
};

/// Divides the first number by each of the rest.
///
/// Usage: (/ <a> <b> ...)
///
/// Example:
///   (/ 10 4) ; => 2.5
pub const ATOM_DIV: PureAtomFn = |args| {
    expect_at_least("/", args, 2)?;
    let mut result = expect_number("/", &args[0])?;
    for arg in &args[1..] {
        let divisor = expect_number("/", arg)?;
        if divisor == 0.0 {
            return Err(ScriptError::DivisionByZero);
        }
        result /= divisor;
    }
    Ok(Value::Number(result))
};

/// Remainder of integer division.
///
/// Usage: (mod <a> <b>)
///
/// Example:
///   (mod 7 3) ; => 1
pub const ATOM_MOD: PureAtomFn = |args| {
    expect_arity("mod", args, 2)?;
    let a = expect_number("mod", &args[0])?;
    let b = expect_number("mod", &args[1])?;
    if b == 0.0 {
        return Err(ScriptError::DivisionByZero);
    }
    Ok(Value::Number(a % b))
};

// ============================================================================
// MATH FUNCTIONS
// ============================================================================

pub const ATOM_ABS: PureAtomFn = |args| {
    expect_arity("abs", args, 1)?;
    Ok(Value::Number(expect_number("abs", &args[0])?.abs()))
};

pub const ATOM_MIN: PureAtomFn = |args| fold_numbers("min", args, f64::min);

pub const ATOM_MAX: PureAtomFn = |args| fold_numbers("max", args, f64::max);

fn fold_numbers(atom: &str, args: &[Value], op: fn(f64, f64) -> f64) -> Result<Value, ScriptError> {
    expect_at_least(atom, args, 1)?;
    let mut acc = expect_number(atom, &args[0])?;
    for arg in &args[1..] {
        acc = op(acc, expect_number(atom, arg)?);
    }
    Ok(Value::Number(acc))
}

pub fn register_math_atoms(registry: &mut AtomRegistry) {
    registry.register("+", Atom::Pure(ATOM_ADD));
    registry.register("-", Atom::Pure(ATOM_SUB));
    registry.register("*", Atom::Pure(ATOM_MUL));
    registry.register("/", Atom::Pure(ATOM_DIV));
    registry.register("mod", Atom::Pure(ATOM_MOD));
    registry.register("abs", Atom::Pure(ATOM_ABS));
    registry.register("min", Atom::Pure(ATOM_MIN));
    registry.register("max", Atom::Pure(ATOM_MAX));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(x: f64) -> Value {
        Value::Number(x)
    }

    #[test]
    fn arithmetic() {
        assert_eq!(ATOM_ADD(&[n(1.0), n(2.0), n(3.0)]).unwrap(), n(6.0));
        assert_eq!(ATOM_SUB(&[n(4.0)]).unwrap(), n(-4.0));
        assert_eq!(ATOM_DIV(&[n(10.0), n(4.0)]).unwrap(), n(2.5));
        assert_eq!(ATOM_MOD(&[n(7.0), n(3.0)]).unwrap(), n(1.0));
        assert_eq!(ATOM_MAX(&[n(1.0), n(9.0), n(3.0)]).unwrap(), n(9.0));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert!(matches!(
            ATOM_DIV(&[n(1.0), n(0.0)]),
            Err(ScriptError::DivisionByZero)
        ));
    }

    #[test]
    fn non_numbers_are_rejected() {
        let err = ATOM_ADD(&[n(1.0), Value::from("2")]).unwrap_err();
        assert!(matches!(err, ScriptError::TypeMismatch { .. }));
    }
}
