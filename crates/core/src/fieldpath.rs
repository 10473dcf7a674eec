//! Dotted field paths over dynamic JSON documents.
//!
//! Grammar is intentionally small: dot separated keys, each optionally
//! followed by a single `[index]`, e.g. `spec.image` or `spec.ports[0].name`.

#![forbid(unsafe_code)]

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorReason {
    NotFound,
    NotAString,
    InvalidPath,
}

impl std::fmt::Display for FieldErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FieldErrorReason::NotFound => "no such field",
            FieldErrorReason::NotAString => "not a string",
            FieldErrorReason::InvalidPath => "invalid field path",
        })
    }
}

/// A field that could not be read from a document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct FieldError {
    pub field: String,
    pub reason: FieldErrorReason,
}

impl FieldError {
    fn new(field: &str, reason: FieldErrorReason) -> Self {
        Self { field: field.to_string(), reason }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

fn parse(path: &str) -> Option<Vec<Segment<'_>>> {
    if path.is_empty() { return None; }
    let mut out = Vec::new();
    for seg in path.split('.') {
        if seg.is_empty() { return None; }
        match seg.find('[') {
            Some(brk) => {
                let idx = seg.get(brk + 1..)?.strip_suffix(']')?;
                if brk == 0 || idx.is_empty() || !idx.chars().all(|c| c.is_ascii_digit()) { return None; }
                out.push(Segment::Key(&seg[..brk]));
                out.push(Segment::Index(idx.parse().ok()?));
            }
            None => {
                if seg.contains(']') { return None; }
                out.push(Segment::Key(seg));
            }
        }
    }
    Some(out)
}

/// Resolve `path` inside `root`.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Result<&'a Value, FieldError> {
    let segments = parse(path).ok_or_else(|| FieldError::new(path, FieldErrorReason::InvalidPath))?;
    let mut cur = root;
    for seg in segments {
        let next = match (seg, cur) {
            (Segment::Key(k), Value::Object(map)) => map.get(k),
            (Segment::Index(i), Value::Array(arr)) => arr.get(i),
            _ => None,
        };
        cur = next.ok_or_else(|| FieldError::new(path, FieldErrorReason::NotFound))?;
    }
    Ok(cur)
}

/// Read a string at `path`. A present empty string is a valid value.
pub fn get_string(root: &Value, path: &str) -> Result<String, FieldError> {
    match lookup(root, path)? {
        Value::String(s) => Ok(s.clone()),
        _ => Err(FieldError::new(path, FieldErrorReason::NotAString)),
    }
}
