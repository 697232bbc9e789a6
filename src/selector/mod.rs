//! Label selectors.
//!
//! A selector is a conjunction of requirements over a label set:
//!
//! ```text
//! suite=core, tier in (1, 2), !flaky, platform!=windows
//! ```
//!
//! The empty selector matches every label set. `!=` and `notin` also match
//! when the key is absent.

use std::fmt;
use std::str::FromStr;

use miette::{Diagnostic, NamedSource, SourceSpan};
use once_cell::sync::Lazy;
use pest::{error::InputLocation, iterators::Pair, Parser};
use pest_derive::Parser;
use regex::Regex;
use thiserror::Error;

use crate::model::Labels;

#[derive(Parser)]
#[grammar = "selector/selector.pest"]
struct SelectorParser;

const MAX_NAME_LENGTH: usize = 63;
const MAX_PREFIX_LENGTH: usize = 253;

static NAME_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?$").expect("static regex")
});

static DNS_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("static regex")
});

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error, Diagnostic)]
pub enum SelectorError {
    #[error("invalid label selector: {message}")]
    #[diagnostic(
        code(spectest::config::selector),
        help("selectors look like `key`, `!key`, `key=value`, `key!=value`, `key in (a, b)`")
    )]
    Syntax {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("invalid label key '{key}': {reason}")]
    #[diagnostic(code(spectest::config::selector_key))]
    InvalidKey {
        key: String,
        reason: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("this key")]
        span: SourceSpan,
    },

    #[error("invalid label value '{value}': {reason}")]
    #[diagnostic(code(spectest::config::selector_value))]
    InvalidValue {
        value: String,
        reason: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("this value")]
        span: SourceSpan,
    },
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Exists,
    DoesNotExist,
    Equals,
    NotEquals,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub key: String,
    pub operator: Operator,
    pub values: Vec<String>,
}

impl Requirement {
    pub fn matches(&self, labels: &Labels) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
            Operator::Equals | Operator::In => value.is_some_and(|v| self.values.contains(v)),
            Operator::NotEquals | Operator::NotIn => !value.is_some_and(|v| self.values.contains(v)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// A selector with no requirements; matches everything.
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let mut pairs = SelectorParser::parse(Rule::selector, input)
            .map_err(|e| convert_parse_error(e, input))?;
        let Some(selector) = pairs.next() else {
            return Ok(Self::everything());
        };

        let requirements = selector
            .into_inner()
            .filter(|p| p.as_rule() != Rule::EOI)
            .map(|p| build_requirement(p, input))
            .collect::<Result<_, _>>()?;
        Ok(Selector { requirements })
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Conjunction of both selectors.
    pub fn and(mut self, other: &Selector) -> Self {
        self.requirements.extend(other.requirements.iter().cloned());
        self
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
            Operator::Equals => write!(f, "{}={}", self.key, self.values.join("")),
            Operator::NotEquals => write!(f, "{}!={}", self.key, self.values.join("")),
            Operator::In => write!(f, "{} in ({})", self.key, self.values.join(",")),
            Operator::NotIn => write!(f, "{} notin ({})", self.key, self.values.join(",")),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, requirement) in self.requirements.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", requirement)?;
        }
        Ok(())
    }
}

// ============================================================================
// BUILDERS
// ============================================================================

fn build_requirement(pair: Pair<Rule>, input: &str) -> Result<Requirement, SelectorError> {
    let rule = pair.as_rule();
    let mut key = None;
    let mut operator = None;
    let mut values = Vec::new();

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::key => key = Some(validate_key(&part, input)?),
            Rule::set_operator => {
                operator = Some(if part.as_str() == "in" {
                    Operator::In
                } else {
                    Operator::NotIn
                })
            }
            Rule::equality_operator => {
                operator = Some(if part.as_str() == "!=" {
                    Operator::NotEquals
                } else {
                    Operator::Equals
                })
            }
            Rule::value => values.push(validate_value(&part, input)?),
            Rule::value_list => {
                for value in part.into_inner() {
                    values.push(validate_value(&value, input)?);
                }
            }
            _ => {}
        }
    }

    let operator = match rule {
        Rule::exists => Operator::Exists,
        Rule::not_exists => Operator::DoesNotExist,
        _ => operator.unwrap_or(Operator::Exists),
    };

    Ok(Requirement {
        key: key.unwrap_or_default(),
        operator,
        values,
    })
}

fn validate_key(pair: &Pair<Rule>, input: &str) -> Result<String, SelectorError> {
    let key = pair.as_str();
    check_label_key(key).map_err(|reason| SelectorError::InvalidKey {
        key: key.to_string(),
        reason,
        src: NamedSource::new("selector", input.to_string()),
        span: span_of(pair),
    })?;
    Ok(key.to_string())
}

/// Checks a label key: a name with an optional DNS subdomain prefix.
pub fn check_label_key(key: &str) -> Result<(), String> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };
    if let Some(prefix) = prefix {
        if prefix.is_empty() || prefix.len() > MAX_PREFIX_LENGTH || !DNS_PREFIX.is_match(prefix) {
            return Err(format!(
                "prefix must be a DNS subdomain of at most {MAX_PREFIX_LENGTH} characters"
            ));
        }
    }
    check_name_part(name)
}

/// Checks a label value; the empty value is allowed.
pub fn check_label_value(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Ok(());
    }
    check_name_part(value)
}

fn validate_value(pair: &Pair<Rule>, input: &str) -> Result<String, SelectorError> {
    let value = pair.as_str();
    check_label_value(value).map_err(|reason| SelectorError::InvalidValue {
        value: value.to_string(),
        reason,
        src: NamedSource::new("selector", input.to_string()),
        span: span_of(pair),
    })?;
    Ok(value.to_string())
}

/// Checks the shape shared by label names and label values.
fn check_name_part(text: &str) -> Result<(), String> {
    if text.is_empty() {
        return Err("must not be empty".to_string());
    }
    if text.len() > MAX_NAME_LENGTH {
        return Err(format!("must be at most {MAX_NAME_LENGTH} characters"));
    }
    if !NAME_PART.is_match(text) {
        return Err(
            "must consist of alphanumerics, '-', '_' or '.', and start and end with an alphanumeric"
                .to_string(),
        );
    }
    Ok(())
}

fn span_of(pair: &Pair<Rule>) -> SourceSpan {
    let span = pair.as_span();
    (span.start(), span.end() - span.start()).into()
}

fn convert_parse_error(error: pest::error::Error<Rule>, input: &str) -> SelectorError {
    let (start, len) = match error.location {
        InputLocation::Pos(pos) => (pos, 0),
        InputLocation::Span((start, end)) => (start, end - start),
    };
    let message = match error.variant {
        pest::error::ErrorVariant::ParsingError { ref positives, .. } if positives.is_empty() => {
            "unexpected input".to_string()
        }
        pest::error::ErrorVariant::ParsingError { ref positives, .. } => format!(
            "expected {}",
            positives
                .iter()
                .map(|r| format!("{:?}", r).replace('_', " "))
                .collect::<Vec<_>>()
                .join(" or ")
        ),
        pest::error::ErrorVariant::CustomError { ref message } => message.clone(),
    };
    SelectorError::Syntax {
        message,
        src: NamedSource::new("selector", input.to_string()),
        span: (start, len).into(),
    }
}
