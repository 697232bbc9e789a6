//! Assertion script parser.
//!
//! Turns script source into a flat list of spanned [`Node`]s. The parser is
//! purely syntactic: special forms are recognised by the evaluator, not here.

use std::sync::Arc;

use miette::NamedSource;
use pest::{error::InputLocation, iterators::Pair, Parser};
use pest_derive::Parser;

use crate::script::error::ScriptError;

#[derive(Parser)]
#[grammar = "script/grammar.pest"]
struct ScriptParser;

// ============================================================================
// SYNTAX TREE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub expr: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Symbol(String),
    /// `:name`, evaluates to the string `"name"`.
    Keyword(String),
    List(Vec<Node>),
    /// `{k v ...}`, always an even number of forms.
    Map(Vec<Node>),
    Quote(Box<Node>),
}

impl Node {
    pub fn as_symbol(&self) -> Option<&str> {
        match &self.expr {
            Expr::Symbol(s) => Some(s),
            _ => None,
        }
    }
}

/// A parsed script, cheap to clone and share between threads.
#[derive(Debug, Clone)]
pub struct Program {
    pub name: String,
    pub nodes: Arc<[Node]>,
}

impl Program {
    pub fn compile(name: &str, source: &str) -> Result<Self, ScriptError> {
        let nodes = parse(name, source)?;
        Ok(Program {
            name: name.to_string(),
            nodes: nodes.into(),
        })
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parses script source into top-level nodes.
pub fn parse(name: &str, source: &str) -> Result<Vec<Node>, ScriptError> {
    let mut pairs = ScriptParser::parse(Rule::program, source)
        .map_err(|e| convert_parse_error(e, name, source))?;

    let Some(program) = pairs.next() else {
        return Ok(Vec::new());
    };

    program
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(|p| build_node(p, name, source))
        .collect()
}

// ============================================================================
// NODE BUILDERS
// ============================================================================

fn build_node(pair: Pair<Rule>, name: &str, source: &str) -> Result<Node, ScriptError> {
    let span = get_span(&pair);
    let expr = match pair.as_rule() {
        Rule::number => {
            let text = pair.as_str();
            let value = text
                .parse::<f64>()
                .map_err(|_| syntax_error(name, source, span, format!("invalid number '{text}'")))?;
            Expr::Number(value)
        }
        Rule::string => Expr::String(unescape_string(pair.as_str())),
        Rule::keyword => Expr::Keyword(pair.as_str()[1..].to_string()),
        Rule::boolean => Expr::Bool(pair.as_str() == "true"),
        Rule::nil => Expr::Nil,
        Rule::symbol => Expr::Symbol(pair.as_str().to_string()),
        Rule::list => Expr::List(build_children(pair, name, source)?),
        Rule::map => {
            let children = build_children(pair, name, source)?;
            if children.len() % 2 != 0 {
                return Err(syntax_error(
                    name,
                    source,
                    span,
                    "map literal needs an even number of forms".to_string(),
                ));
            }
            Expr::Map(children)
        }
        Rule::quote => {
            let mut children = build_children(pair, name, source)?;
            let Some(quoted) = children.pop() else {
                return Err(syntax_error(
                    name,
                    source,
                    span,
                    "expected an expression after quote".to_string(),
                ));
            };
            Expr::Quote(Box::new(quoted))
        }
        rule => {
            return Err(syntax_error(
                name,
                source,
                span,
                format!("unsupported rule: {:?}", rule),
            ))
        }
    };
    Ok(Node { expr, span })
}

fn build_children(pair: Pair<Rule>, name: &str, source: &str) -> Result<Vec<Node>, ScriptError> {
    pair.into_inner()
        .map(|p| build_node(p, name, source))
        .collect()
}

// ============================================================================
// UTILITIES
// ============================================================================

fn get_span(pair: &Pair<Rule>) -> Span {
    Span {
        start: pair.as_span().start(),
        end: pair.as_span().end(),
    }
}

fn unescape_string(text: &str) -> String {
    let inner = &text[1..text.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}

fn syntax_error(name: &str, source: &str, span: Span, message: String) -> ScriptError {
    ScriptError::Syntax {
        message,
        src: NamedSource::new(name, source.to_string()),
        span: (span.start, span.end.saturating_sub(span.start)).into(),
    }
}

fn convert_parse_error(error: pest::error::Error<Rule>, name: &str, source: &str) -> ScriptError {
    let span = match error.location {
        InputLocation::Pos(pos) => Span { start: pos, end: pos },
        InputLocation::Span((start, end)) => Span { start, end },
    };

    let rendered = error.to_string();
    let message = if rendered.contains("expected ')'") || source.matches('(').count() > source.matches(')').count() {
        "missing closing parenthesis"
    } else if source.matches('{').count() > source.matches('}').count() {
        "missing closing brace"
    } else if source.matches('"').count() % 2 != 0 {
        "missing closing quote"
    } else {
        "unexpected input"
    };

    syntax_error(name, source, span, message.to_string())
}
