//! JSON payload templates
//!
//! Strings may embed `${suffix}`, `${id.<node>}` and `${var.<name>}`. A
//! string that is exactly one placeholder is replaced by the referenced
//! value itself, so `"${id.kraj}"` renders as the number `42` rather than
//! the string `"42"`. Object keys are never rendered.

use serde_json::Value as JsonValue;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unterminated placeholder in \"{0}\"")]
    Unterminated(String),

    #[error("unknown placeholder '${{{0}}}'")]
    UnknownPlaceholder(String),

    #[error("placeholder {0} has no value")]
    Unbound(Placeholder),
}

/// A reference inside a template string
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Placeholder {
    /// Per-iteration uniqueness token
    Suffix,
    /// Identifier of a workflow node
    Id(String),
    /// Per-iteration variable
    Var(String),
}

impl Placeholder {
    fn parse(inner: &str) -> Result<Self, TemplateError> {
        let inner = inner.trim();
        if inner == "suffix" {
            return Ok(Placeholder::Suffix);
        }
        match inner.split_once('.') {
            Some(("id", name)) if !name.is_empty() => Ok(Placeholder::Id(name.to_string())),
            Some(("var", name)) if !name.is_empty() => Ok(Placeholder::Var(name.to_string())),
            _ => Err(TemplateError::UnknownPlaceholder(inner.to_string())),
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placeholder::Suffix => write!(f, "${{suffix}}"),
            Placeholder::Id(name) => write!(f, "${{id.{}}}", name),
            Placeholder::Var(name) => write!(f, "${{var.{}}}", name),
        }
    }
}

/// Source of placeholder values
pub trait Scope {
    fn lookup(&self, placeholder: &Placeholder) -> Option<JsonValue>;
}

enum Segment<'a> {
    Literal(&'a str),
    Ref(Placeholder),
}

fn parse(input: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        if start > 0 {
            segments.push(Segment::Literal(&rest[..start]));
        }
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| TemplateError::Unterminated(input.to_string()))?;
        segments.push(Segment::Ref(Placeholder::parse(&after[..end])?));
        rest = &after[end + 1..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }

    Ok(segments)
}

/// Text form of a value inside a larger string or a query parameter
pub fn display_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn lookup(scope: &dyn Scope, placeholder: Placeholder) -> Result<JsonValue, TemplateError> {
    scope
        .lookup(&placeholder)
        .ok_or(TemplateError::Unbound(placeholder))
}

/// Render a string template to text
pub fn render_str(input: &str, scope: &dyn Scope) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(input.len());
    for segment in parse(input)? {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Ref(placeholder) => out.push_str(&display_value(&lookup(scope, placeholder)?)),
        }
    }
    Ok(out)
}

/// Render a JSON template
pub fn render(template: &JsonValue, scope: &dyn Scope) -> Result<JsonValue, TemplateError> {
    match template {
        JsonValue::String(s) => {
            let mut segments = parse(s)?;
            if segments.len() == 1 {
                if let Segment::Ref(placeholder) = segments.remove(0) {
                    return lookup(scope, placeholder);
                }
            }
            render_str(s, scope).map(JsonValue::String)
        }
        JsonValue::Array(items) => items
            .iter()
            .map(|item| render(item, scope))
            .collect::<Result<Vec<_>, _>>()
            .map(JsonValue::Array),
        JsonValue::Object(map) => {
            let mut rendered = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                rendered.insert(key.clone(), render(value, scope)?);
            }
            Ok(JsonValue::Object(rendered))
        }
        other => Ok(other.clone()),
    }
}

/// Every placeholder in a string template
pub fn placeholders_in_str(input: &str) -> Result<Vec<Placeholder>, TemplateError> {
    Ok(parse(input)?
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Ref(placeholder) => Some(placeholder),
            Segment::Literal(_) => None,
        })
        .collect())
}

/// Every placeholder in a JSON template
pub fn placeholders(template: &JsonValue) -> Result<Vec<Placeholder>, TemplateError> {
    let mut found = Vec::new();
    collect(template, &mut found)?;
    Ok(found)
}

fn collect(template: &JsonValue, found: &mut Vec<Placeholder>) -> Result<(), TemplateError> {
    match template {
        JsonValue::String(s) => found.extend(placeholders_in_str(s)?),
        JsonValue::Array(items) => {
            for item in items {
                collect(item, found)?;
            }
        }
        JsonValue::Object(map) => {
            for value in map.values() {
                collect(value, found)?;
            }
        }
        _ => {}
    }
    Ok(())
}
