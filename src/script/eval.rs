//! Evaluation engine for assertion scripts.
//!
//! An [`Interpreter`] owns the global bindings produced by loading a
//! [`Program`] and evaluates nodes against an immutable lexical [`Env`].
//! Every evaluation step is counted and every nested evaluation deepens a
//! depth counter; both are bounded by [`Limits`].
//!
//! Special forms: `define`, `lambda`/`fn`, `if`, `cond`, `let`, `do`, `and`,
//! `or`, `quote`. Everything else in head position is evaluated and applied.

use std::sync::Arc;

use im::OrdMap;

use crate::script::atoms::{self, Atom, AtomRegistry};
use crate::script::error::ScriptError;
use crate::script::parser::{Expr, Node, Program};
use crate::script::value::{Env, Lambda, Value};

pub const DEFAULT_MAX_DEPTH: usize = 256;
pub const DEFAULT_MAX_STEPS: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_depth: usize,
    pub max_steps: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_depth: DEFAULT_MAX_DEPTH,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

// ============================================================================
// INTERPRETER
// ============================================================================

pub struct Interpreter {
    globals: Env,
    atoms: &'static AtomRegistry,
    limits: Limits,
    depth: usize,
    steps: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        Interpreter {
            globals: Env::new(),
            atoms: atoms::standard(),
            limits,
            depth: 0,
            steps: 0,
        }
    }

    /// Evaluates every top-level form, binding `define`s into the globals.
    pub fn load(&mut self, program: &Program) -> Result<(), ScriptError> {
        self.reset_budget();
        for node in program.nodes.iter() {
            if let Some((name, value)) = self.eval_definition(node, &Env::new())? {
                self.globals.insert(name, value);
            } else {
                self.eval(node, &Env::new())?;
            }
        }
        Ok(())
    }

    pub fn is_function(&self, name: &str) -> bool {
        matches!(self.globals.get(name), Some(Value::Lambda(_)))
    }

    /// Calls a globally defined function with a fresh step budget.
    pub fn call_global(&mut self, name: &str, args: Vec<Value>) -> Result<Value, ScriptError> {
        let f = self
            .globals
            .get(name)
            .cloned()
            .ok_or_else(|| ScriptError::UndefinedSymbol {
                symbol: name.to_string(),
            })?;
        self.reset_budget();
        self.apply(&f, args)
    }

    /// Applies a callable value to already evaluated arguments.
    pub fn apply(&mut self, f: &Value, args: Vec<Value>) -> Result<Value, ScriptError> {
        match f {
            Value::Atom(name) => match self.atoms.get(name) {
                Some(Atom::Pure(atom)) => atom(&args),
                Some(Atom::Applicative(atom)) => atom(&args, self),
                None => Err(ScriptError::UndefinedSymbol {
                    symbol: name.to_string(),
                }),
            },
            Value::Lambda(lambda) => self.apply_lambda(lambda, args),
            other => Err(ScriptError::NotCallable(other.to_string())),
        }
    }

    fn apply_lambda(&mut self, lambda: &Arc<Lambda>, args: Vec<Value>) -> Result<Value, ScriptError> {
        let label = lambda.name.as_deref().unwrap_or("lambda");
        let arity_ok = match lambda.rest {
            Some(_) => args.len() >= lambda.params.len(),
            None => args.len() == lambda.params.len(),
        };
        if !arity_ok {
            let expected = match lambda.rest {
                Some(_) => format!("at least {}", lambda.params.len()),
                None => lambda.params.len().to_string(),
            };
            return Err(ScriptError::arity(label, expected, args.len()));
        }

        let mut env = lambda.env.clone();
        if let Some(name) = &lambda.name {
            env.insert(name.clone(), Value::Lambda(Arc::clone(lambda)));
        }
        let mut args = args.into_iter();
        for param in &lambda.params {
            env.insert(param.clone(), args.next().unwrap_or_default());
        }
        if let Some(rest) = &lambda.rest {
            env.insert(rest.clone(), Value::List(args.collect()));
        }
        self.eval_body(&lambda.body, &env)
    }

    fn reset_budget(&mut self) {
        self.steps = 0;
        self.depth = 0;
    }

    // ------------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------------

    pub fn eval(&mut self, node: &Node, env: &Env) -> Result<Value, ScriptError> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(ScriptError::StepBudgetExhausted {
                limit: self.limits.max_steps,
            });
        }
        if self.depth >= self.limits.max_depth {
            return Err(ScriptError::DepthExceeded {
                limit: self.limits.max_depth,
            });
        }
        self.depth += 1;
        let result = self.eval_expr(node, env);
        self.depth -= 1;
        result
    }

    fn eval_expr(&mut self, node: &Node, env: &Env) -> Result<Value, ScriptError> {
        match &node.expr {
            Expr::Nil => Ok(Value::Nil),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) | Expr::Keyword(s) => Ok(Value::String(s.clone())),
            Expr::Symbol(name) => self.resolve(name, env),
            Expr::Quote(inner) => Ok(quote(inner)),
            Expr::Map(entries) => {
                let mut fields = OrdMap::new();
                for pair in entries.chunks(2) {
                    let key = self.eval(&pair[0], env)?;
                    let Value::String(key) = key else {
                        return Err(ScriptError::type_mismatch(
                            "map literal",
                            "string key",
                            key.type_name(),
                        ));
                    };
                    let value = self.eval(&pair[1], env)?;
                    fields.insert(key, value);
                }
                Ok(Value::Map(fields))
            }
            Expr::List(items) => self.eval_list(items, env),
        }
    }

    fn resolve(&self, name: &str, env: &Env) -> Result<Value, ScriptError> {
        if let Some(value) = env.get(name).or_else(|| self.globals.get(name)) {
            return Ok(value.clone());
        }
        if name == "else" {
            return Ok(Value::Bool(true));
        }
        self.atoms
            .resolve(name)
            .map(Value::Atom)
            .ok_or_else(|| ScriptError::UndefinedSymbol {
                symbol: name.to_string(),
            })
    }

    fn eval_list(&mut self, items: &[Node], env: &Env) -> Result<Value, ScriptError> {
        let Some((head, tail)) = items.split_first() else {
            return Ok(Value::List(Vec::new()));
        };

        if let Some(form) = head.as_symbol() {
            match form {
                "quote" => return self.eval_quote(tail),
                "if" => return self.eval_if(tail, env),
                "cond" => return self.eval_cond(tail, env),
                "let" => return self.eval_let(tail, env),
                "do" => return self.eval_body(tail, env),
                "and" => return self.eval_and(tail, env),
                "or" => return self.eval_or(tail, env),
                "lambda" | "fn" => return self.make_lambda(None, tail, env),
                "define" => {
                    return Err(ScriptError::malformed(
                        "define",
                        "only allowed at the top level or at the start of a body",
                    ))
                }
                _ => {}
            }
        }

        let f = self.eval(head, env)?;
        if !f.is_callable() {
            return Err(ScriptError::NotCallable(f.to_string()));
        }
        let mut args = Vec::with_capacity(tail.len());
        for arg in tail {
            args.push(self.eval(arg, env)?);
        }
        self.apply(&f, args)
    }

    /// Evaluates a sequence of forms; `define`s bind into a scope visible to
    /// the forms after them.
    fn eval_body(&mut self, body: &[Node], env: &Env) -> Result<Value, ScriptError> {
        let mut scope = env.clone();
        let mut last = Value::Nil;
        for node in body {
            if let Some((name, value)) = self.eval_definition(node, &scope)? {
                scope.insert(name, value);
                last = Value::Nil;
            } else {
                last = self.eval(node, &scope)?;
            }
        }
        Ok(last)
    }

    // ------------------------------------------------------------------------
    // Special forms
    // ------------------------------------------------------------------------

    /// Returns the binding produced by `node` when it is a `define` form.
    fn eval_definition(
        &mut self,
        node: &Node,
        env: &Env,
    ) -> Result<Option<(String, Value)>, ScriptError> {
        let Expr::List(items) = &node.expr else {
            return Ok(None);
        };
        let Some((head, tail)) = items.split_first() else {
            return Ok(None);
        };
        if head.as_symbol() != Some("define") {
            return Ok(None);
        }

        match tail.first().map(|n| &n.expr) {
            Some(Expr::Symbol(name)) => {
                if tail.len() != 2 {
                    return Err(ScriptError::malformed(
                        "define",
                        "expected (define name value)",
                    ));
                }
                let value = match self.eval(&tail[1], env)? {
                    Value::Lambda(lambda) if lambda.name.is_none() => Value::Lambda(Arc::new(Lambda {
                        name: Some(name.clone()),
                        params: lambda.params.clone(),
                        rest: lambda.rest.clone(),
                        body: Arc::clone(&lambda.body),
                        env: lambda.env.clone(),
                    })),
                    other => other,
                };
                Ok(Some((name.clone(), value)))
            }
            Some(Expr::List(signature)) => {
                let Some(name) = signature.first().and_then(Node::as_symbol) else {
                    return Err(ScriptError::malformed(
                        "define",
                        "function name must be a symbol",
                    ));
                };
                let (params, rest) = parse_params("define", &signature[1..])?;
                if tail.len() < 2 {
                    return Err(ScriptError::malformed("define", "missing function body"));
                }
                let lambda = Lambda {
                    name: Some(name.to_string()),
                    params,
                    rest,
                    body: tail[1..].to_vec().into(),
                    env: env.clone(),
                };
                Ok(Some((name.to_string(), Value::Lambda(Arc::new(lambda)))))
            }
            _ => Err(ScriptError::malformed(
                "define",
                "expected a name or (name params...)",
            )),
        }
    }

    fn make_lambda(
        &mut self,
        name: Option<String>,
        tail: &[Node],
        env: &Env,
    ) -> Result<Value, ScriptError> {
        let Some((params_node, body)) = tail.split_first() else {
            return Err(ScriptError::malformed("lambda", "missing parameter list"));
        };
        let Expr::List(param_nodes) = &params_node.expr else {
            return Err(ScriptError::malformed("lambda", "parameters must be a list"));
        };
        if body.is_empty() {
            return Err(ScriptError::malformed("lambda", "missing body"));
        }
        let (params, rest) = parse_params("lambda", param_nodes)?;
        Ok(Value::Lambda(Arc::new(Lambda {
            name,
            params,
            rest,
            body: body.to_vec().into(),
            env: env.clone(),
        })))
    }

    fn eval_quote(&mut self, tail: &[Node]) -> Result<Value, ScriptError> {
        match tail {
            [inner] => Ok(quote(inner)),
            _ => Err(ScriptError::malformed("quote", "expected exactly one form")),
        }
    }

    fn eval_if(&mut self, tail: &[Node], env: &Env) -> Result<Value, ScriptError> {
        match tail {
            [test, then] => {
                if self.eval(test, env)?.is_truthy() {
                    self.eval(then, env)
                } else {
                    Ok(Value::Nil)
                }
            }
            [test, then, otherwise] => {
                if self.eval(test, env)?.is_truthy() {
                    self.eval(then, env)
                } else {
                    self.eval(otherwise, env)
                }
            }
            _ => Err(ScriptError::malformed(
                "if",
                "expected (if test then [else])",
            )),
        }
    }

    /// `(cond (test body...) ... (else body...))`
    fn eval_cond(&mut self, tail: &[Node], env: &Env) -> Result<Value, ScriptError> {
        for clause in tail {
            let Expr::List(parts) = &clause.expr else {
                return Err(ScriptError::malformed("cond", "each clause must be a list"));
            };
            let Some((test, body)) = parts.split_first() else {
                return Err(ScriptError::malformed("cond", "empty clause"));
            };
            if self.eval(test, env)?.is_truthy() {
                return self.eval_body(body, env);
            }
        }
        Ok(Value::Nil)
    }

    /// `(let ((name value) ...) body...)`; bindings are sequential.
    fn eval_let(&mut self, tail: &[Node], env: &Env) -> Result<Value, ScriptError> {
        let Some((bindings, body)) = tail.split_first() else {
            return Err(ScriptError::malformed("let", "missing bindings"));
        };
        let Expr::List(bindings) = &bindings.expr else {
            return Err(ScriptError::malformed("let", "bindings must be a list"));
        };
        let mut scope = env.clone();
        for binding in bindings {
            let (name, value) = match &binding.expr {
                Expr::List(pair) if pair.len() == 2 => match pair[0].as_symbol() {
                    Some(name) => (name, &pair[1]),
                    None => return Err(ScriptError::malformed("let", "binding name must be a symbol")),
                },
                _ => return Err(ScriptError::malformed("let", "each binding must be (name value)")),
            };
            let value = self.eval(value, &scope)?;
            scope.insert(name.to_string(), value);
        }
        self.eval_body(body, &scope)
    }

    fn eval_and(&mut self, tail: &[Node], env: &Env) -> Result<Value, ScriptError> {
        let mut last = Value::Bool(true);
        for node in tail {
            last = self.eval(node, env)?;
            if !last.is_truthy() {
                return Ok(last);
            }
        }
        Ok(last)
    }

    fn eval_or(&mut self, tail: &[Node], env: &Env) -> Result<Value, ScriptError> {
        for node in tail {
            let value = self.eval(node, env)?;
            if value.is_truthy() {
                return Ok(value);
            }
        }
        Ok(Value::Nil)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn parse_params(form: &str, nodes: &[Node]) -> Result<(Vec<String>, Option<String>), ScriptError> {
    let mut params = Vec::new();
    let mut iter = nodes.iter();
    while let Some(node) = iter.next() {
        let Some(name) = node.as_symbol() else {
            return Err(ScriptError::malformed(form, "parameters must be symbols"));
        };
        if name == "&" {
            let rest = iter.next().and_then(Node::as_symbol).ok_or_else(|| {
                ScriptError::malformed(form, "expected a rest parameter name after '&'")
            })?;
            if iter.next().is_some() {
                return Err(ScriptError::malformed(form, "rest parameter must come last"));
            }
            return Ok((params, Some(rest.to_string())));
        }
        params.push(name.to_string());
    }
    Ok((params, None))
}

/// Quoted symbols become strings; quoted lists become lists of quoted items.
fn quote(node: &Node) -> Value {
    match &node.expr {
        Expr::Nil => Value::Nil,
        Expr::Bool(b) => Value::Bool(*b),
        Expr::Number(n) => Value::Number(*n),
        Expr::String(s) | Expr::Symbol(s) | Expr::Keyword(s) => Value::String(s.clone()),
        Expr::List(items) => Value::List(items.iter().map(quote).collect()),
        Expr::Map(entries) => Value::Map(
            entries
                .chunks(2)
                .map(|pair| (quote(&pair[0]).to_string(), quote(&pair[1])))
                .collect(),
        ),
        Expr::Quote(inner) => quote(inner),
    }
}
