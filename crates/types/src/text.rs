//! Text normalization for the free-text search column.

use crate::BodyKind;

/// Normalize a remote subject: trim, and collapse empty/whitespace to `None`.
pub fn normalize_subject(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Remove markup tags and decode the handful of entities that show up in
/// remote HTML bodies. Not a sanitizer; only enough to make text searchable.
pub fn strip_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                // Tag boundaries act as word separators.
                if !out.ends_with(' ') && !out.is_empty() {
                    out.push(' ');
                }
            }
            '&' if !in_tag => {
                let rest = &input[i..];
                let (decoded, len) = decode_entity(rest);
                out.push_str(decoded);
                // Skip the remainder of the entity.
                for _ in 1..len {
                    chars.next();
                }
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Decode a leading HTML entity; returns the replacement and how many input
/// chars it consumed (1 = bare '&', passed through).
fn decode_entity(s: &str) -> (&'static str, usize) {
    const ENTITIES: &[(&str, &str)] = &[
        ("&amp;", "&"),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&apos;", "'"),
        ("&nbsp;", " "),
    ];
    for (entity, replacement) in ENTITIES {
        if s.starts_with(entity) {
            return (replacement, entity.len());
        }
    }
    ("&", 1)
}

/// Collapse runs of whitespace to single spaces and trim.
fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build the search column for a subject+body pair: lower-cased, markup
/// stripped, whitespace collapsed. Returns `None` when the result would not
/// differ from the raw fields, so unchanged plain-text rows carry no
/// redundant copy.
pub fn search_text(subject: Option<&str>, body: &str, body_kind: BodyKind) -> Option<String> {
    let body_text = match body_kind {
        BodyKind::Html => strip_markup(body),
        BodyKind::Text => body.to_string(),
    };
    let mut composite = String::new();
    if let Some(subject) = subject {
        composite.push_str(subject);
        composite.push(' ');
    }
    composite.push_str(&body_text);
    let normalized = collapse_whitespace(&composite).to_lowercase();
    if subject.is_none() && normalized == body {
        None
    } else {
        Some(normalized)
    }
}
