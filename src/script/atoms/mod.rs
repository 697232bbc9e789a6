//! # Atom Library
//!
//! Atoms are the built-in functions available to assertion scripts. None of
//! them perform I/O: an assertion may only inspect the context it is given.
//!
//! - **`math`**: `+`, `-`, `*`, `/`, `mod`, `abs`, `min`, `max`
//! - **`logic`**: `=`, `!=`, `<`, `>`, `<=`, `>=`, `not`
//! - **`string`**: `str`, `trim`, `lines`, `split`, `join`, `upper`, `lower`,
//!   `contains?`, `starts-with?`, `ends-with?`, `matches?`
//! - **`collections`**: `list`, `len`, `first`, `rest`, `nth`, `get`,
//!   `get-in`, `assoc`, `keys`, `map`, `filter`, `reduce`
//! - **`types`**: type predicates, `number`, `type-of`, `error`

use im::HashMap;
use once_cell::sync::Lazy;

use crate::script::error::ScriptError;
use crate::script::eval::Interpreter;
use crate::script::value::Value;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Atoms that only look at their (already evaluated) arguments.
pub type PureAtomFn = fn(args: &[Value]) -> Result<Value, ScriptError>;

/// Atoms that call back into the interpreter, e.g. `map` applying a lambda.
pub type ApplicativeAtomFn =
    fn(args: &[Value], interpreter: &mut Interpreter) -> Result<Value, ScriptError>;

#[derive(Clone, Copy)]
pub enum Atom {
    Pure(PureAtomFn),
    Applicative(ApplicativeAtomFn),
}

#[derive(Default, Clone)]
pub struct AtomRegistry {
    atoms: HashMap<&'static str, (&'static str, Atom)>,
}

impl AtomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &'static str, atom: Atom) {
        self.atoms.insert(name, (name, atom));
    }

    pub fn get(&self, name: &str) -> Option<Atom> {
        self.atoms.get(name).map(|(_, atom)| *atom)
    }

    /// Returns the registry's own `'static` copy of `name`, if registered.
    pub fn resolve(&self, name: &str) -> Option<&'static str> {
        self.atoms.get(name).map(|(name, _)| *name)
    }

}

pub mod collections;
pub mod helpers;
pub mod logic;
pub mod math;
pub mod string;
pub mod types;

// ============================================================================
// REGISTRATION
// ============================================================================

static STANDARD_ATOMS: Lazy<AtomRegistry> = Lazy::new(|| {
    let mut registry = AtomRegistry::new();
    register_all_atoms(&mut registry);
    registry
});

/// The shared, read-only registry every interpreter resolves atoms from.
pub fn standard() -> &'static AtomRegistry {
    &STANDARD_ATOMS
}

pub fn register_all_atoms(registry: &mut AtomRegistry) {
    math::register_math_atoms(registry);
    logic::register_logic_atoms(registry);
    string::register_string_atoms(registry);
    collections::register_collection_atoms(registry);
    types::register_type_atoms(registry);
}
