//! Include directive scanning and variable substitution.

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

/// Variables passed to an included partial: `@@include('x.html', {"title": "Home"})`.
pub type IncludeContext = Map<String, Value>;

/// A single `@@include(...)` occurrence in a source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    /// Byte range of the whole directive in the scanned text
    pub range: Range<usize>,

    /// Referenced path, as written
    pub path: String,

    /// Optional JSON object of variables for the partial
    pub context: Option<IncludeContext>,
}

/// Errors that can occur while scanning directives.
#[derive(Debug, thiserror::Error)]
pub enum DirectiveError {
    #[error("Invalid include context for '{path}': {message}")]
    InvalidContext { path: String, message: String },
}

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@@include\(\s*(?:'([^']*)'|"([^"]*)")\s*(?:,\s*(\{[\s\S]*?\}))?\s*\)"#)
        .expect("Invalid include regex")
});

static VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@@([A-Za-z_][A-Za-z0-9_]*)").expect("Invalid variable regex"));

/// Find every include directive in `content`, in source order.
pub fn find_directives(content: &str) -> Result<Vec<Directive>, DirectiveError> {
    let mut directives = Vec::new();

    for caps in INCLUDE_RE.captures_iter(content) {
        let whole = caps.get(0).expect("capture group 0 always exists");
        let path = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        let context = match caps.get(3) {
            Some(raw) => Some(parse_context(&path, raw.as_str())?),
            None => None,
        };

        directives.push(Directive {
            range: whole.range(),
            path,
            context,
        });
    }

    Ok(directives)
}

fn parse_context(path: &str, raw: &str) -> Result<IncludeContext, DirectiveError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(DirectiveError::InvalidContext {
            path: path.to_string(),
            message: format!("expected an object, found {}", other),
        }),
        Err(e) => Err(DirectiveError::InvalidContext {
            path: path.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Replace `@@name` markers with values from `context`.
///
/// Unknown names are left untouched, so a later pass (or the browser) still
/// sees them. Strings are inserted verbatim; other values as JSON. Include
/// directives are copied unchanged, so nested includes still parse.
pub fn substitute_vars(content: &str, context: &IncludeContext) -> String {
    if context.is_empty() {
        return content.to_string();
    }

    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for directive in INCLUDE_RE.find_iter(content) {
        out.push_str(&substitute_text(&content[last..directive.start()], context));
        out.push_str(directive.as_str());
        last = directive.end();
    }
    out.push_str(&substitute_text(&content[last..], context));
    out
}

fn substitute_text(text: &str, context: &IncludeContext) -> String {
    VAR_RE
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            match context.get(name) {
                Some(Value::String(s)) => s.clone(),
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
