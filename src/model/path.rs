//! Path queries over an instance graph, used to pick sub-instances to load.
//!
//! Supported syntax: optional leading `$`, `.name`, a bare leading `name`,
//! `['name']` / `["name"]`, `[n]`, `[*]` and `.*`.

use super::ModelInstance;
use crate::error::{OdmError, Result};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Child(String),
    Index(usize),
    Wildcard,
}

pub(crate) fn parse(path: &str) -> Result<Vec<Segment>> {
    let invalid = |reason: &str| OdmError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let mut rest = path.trim();
    if let Some(stripped) = rest.strip_prefix('$') {
        rest = stripped;
    }

    let mut segments = Vec::new();
    let mut first = true;
    while !rest.is_empty() {
        if let Some(after_dot) = rest.strip_prefix('.') {
            if after_dot.starts_with('.') {
                return Err(invalid("recursive descent is not supported"));
            }
            if let Some(after_star) = after_dot.strip_prefix('*') {
                segments.push(Segment::Wildcard);
                rest = after_star;
            } else {
                let (name, remainder) = split_name(after_dot);
                if name.is_empty() {
                    return Err(invalid("expected a field name after `.`"));
                }
                segments.push(Segment::Child(name.to_string()));
                rest = remainder;
            }
        } else if let Some(after_bracket) = rest.strip_prefix('[') {
            let close = after_bracket
                .find(']')
                .ok_or_else(|| invalid("unterminated `[`"))?;
            let inner = after_bracket[..close].trim();
            segments.push(parse_bracket(inner).ok_or_else(|| invalid("bad subscript"))?);
            rest = &after_bracket[close + 1..];
        } else if first {
            let (name, remainder) = split_name(rest);
            if name.is_empty() {
                return Err(invalid("expected a field name"));
            }
            segments.push(Segment::Child(name.to_string()));
            rest = remainder;
        } else {
            return Err(invalid("expected `.` or `[`"));
        }
        first = false;
    }
    Ok(segments)
}

fn split_name(s: &str) -> (&str, &str) {
    let end = s.find(['.', '[']).unwrap_or(s.len());
    (&s[..end], &s[end..])
}

fn parse_bracket(inner: &str) -> Option<Segment> {
    if inner == "*" {
        return Some(Segment::Wildcard);
    }
    for quote in ['\'', '"'] {
        if let Some(name) = inner
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            return Some(Segment::Child(name.to_string()));
        }
    }
    inner.parse().ok().map(Segment::Index)
}

/// Every value the path selects, starting from `root`.
pub(crate) fn query(root: &Value, segments: &[Segment]) -> Vec<Value> {
    let mut current = vec![root.clone()];
    for segment in segments {
        let mut next = Vec::new();
        for node in current {
            match (segment, node) {
                (Segment::Child(name), Value::Model(instance)) => {
                    next.extend(instance.get(name));
                }
                (Segment::Child(name), Value::Object(mut map)) => {
                    next.extend(map.shift_remove(name));
                }
                (Segment::Index(i), Value::Array(mut items)) if *i < items.len() => {
                    next.push(items.swap_remove(*i));
                }
                (Segment::Wildcard, Value::Model(instance)) => {
                    next.extend(instance.fields().into_values());
                }
                (Segment::Wildcard, Value::Object(map)) => next.extend(map.into_values()),
                (Segment::Wildcard, Value::Array(items)) => next.extend(items),
                _ => {}
            }
        }
        current = next;
    }
    current
}

/// Model instances among the selected values, looking one level into
/// arrays. Each shared instance appears once.
pub(crate) fn collect_models(selected: Vec<Value>) -> Vec<ModelInstance> {
    let mut found: Vec<ModelInstance> = Vec::new();
    let mut push = |instance: ModelInstance| {
        if !found.iter().any(|seen| seen.same_instance(&instance)) {
            found.push(instance);
        }
    };
    for value in selected {
        match value {
            Value::Model(instance) => push(instance),
            Value::Array(items) => {
                for item in items {
                    if let Value::Model(instance) = item {
                        push(instance);
                    }
                }
            }
            _ => {}
        }
    }
    found
}
