//! `${path}` expressions evaluated against JSON response bodies.
//!
//! A path is a dot-separated list of object keys with optional `[n]` array
//! indexes, optionally prefixed with `$`: `${sensors[0].temp}`,
//! `${$.device.name}`. An expression without placeholders is a literal.

use serde_json::Value;

enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

/// Evaluates `expression` against `data`.
///
/// - No placeholder: the expression itself, as a JSON string.
/// - A single placeholder spanning the whole expression: the referenced
///   value with its JSON type preserved.
/// - Placeholders mixed with text: the rendered string.
///
/// Returns `None` when any referenced path does not exist.
pub fn evaluate(expression: &str, data: &Value) -> Option<Value> {
    let found = placeholders(expression);
    if found.is_empty() {
        return Some(Value::String(expression.to_string()));
    }

    if let [(start, end, path)] = found.as_slice() {
        if *start == 0 && *end == expression.len() {
            return lookup(path, data).cloned();
        }
    }

    let mut rendered = String::with_capacity(expression.len());
    let mut cursor = 0;
    for (start, end, path) in found {
        rendered.push_str(&expression[cursor..start]);
        rendered.push_str(&value_to_text(lookup(path, data)?));
        cursor = end;
    }
    rendered.push_str(&expression[cursor..]);
    Some(Value::String(rendered))
}

/// Resolves a path inside `data`.
pub fn lookup<'a>(path: &str, data: &'a Value) -> Option<&'a Value> {
    parse_path(path)?
        .into_iter()
        .try_fold(data, |current, segment| match segment {
            Segment::Key(key) => current.get(key),
            Segment::Index(index) => current.get(index),
        })
}

/// Renders a JSON value as plain text (strings without quotes).
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Locates `${...}` spans as `(start, end, inner path)`.
fn placeholders(expression: &str) -> Vec<(usize, usize, &str)> {
    let mut found = Vec::new();
    let mut pos = 0;
    while let Some(open) = expression[pos..].find("${") {
        let start = pos + open;
        let inner_start = start + 2;
        match expression[inner_start..].find('}') {
            Some(close) => {
                let inner_end = inner_start + close;
                found.push((start, inner_end + 1, &expression[inner_start..inner_end]));
                pos = inner_end + 1;
            }
            None => break,
        }
    }
    found
}

fn parse_path(path: &str) -> Option<Vec<Segment<'_>>> {
    let path = path.trim();
    let path = path.strip_prefix('$').unwrap_or(path);

    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            continue;
        }
        let (name, mut rest) = match part.find('[') {
            Some(i) => (&part[..i], &part[i..]),
            None => (part, ""),
        };
        if !name.is_empty() {
            segments.push(Segment::Key(name));
        }
        while !rest.is_empty() {
            let inner = rest.strip_prefix('[')?;
            let close = inner.find(']')?;
            let index = inner[..close].trim().parse().ok()?;
            segments.push(Segment::Index(index));
            rest = &inner[close + 1..];
        }
    }
    Some(segments)
}
