//! Best-effort JSON decoding of model output.
//!
//! Models wrap JSON in code fences, prefix it with prose, or return
//! something else entirely. None of that is an error here.

use serde::de::DeserializeOwned;

/// Isolate the most likely JSON text: a ```json fence, then any fence,
/// then the outermost `{...}` span, then the trimmed input.
pub fn extract_json_block(text: &str) -> &str {
    if let Some(inner) = fenced(text, Some("json")) {
        return inner.trim();
    }
    if let Some(inner) = fenced(text, None) {
        return inner.trim();
    }
    if let Some(span) = brace_span(text) {
        return span;
    }
    text.trim()
}

/// Decode `T` from model output, or `None` when nothing usable is found.
pub fn decode<T: DeserializeOwned>(text: &str) -> Option<T> {
    if let Ok(v) = serde_json::from_str(extract_json_block(text)) {
        return Some(v);
    }
    brace_span(text).and_then(|span| serde_json::from_str(span).ok())
}

/// Content of the first code fence. With `lang`, only a fence whose info
/// string starts with it (case-insensitive) qualifies.
fn fenced<'a>(text: &'a str, lang: Option<&str>) -> Option<&'a str> {
    let mut rest = text;
    let mut offset = 0;
    while let Some(open) = rest.find("```") {
        let body_start = offset + open + 3;
        let close = text[body_start..].find("```")?;
        let inner = &text[body_start..body_start + close];
        match lang {
            None => return Some(inner),
            Some(tag) => {
                if inner.len() >= tag.len()
                    && inner.is_char_boundary(tag.len())
                    && inner[..tag.len()].eq_ignore_ascii_case(tag)
                {
                    return Some(&inner[tag.len()..]);
                }
            }
        }
        offset = body_start + close + 3;
        rest = &text[offset..];
    }
    None
}

fn brace_span(text: &str) -> Option<&str> {
    let first = text.find('{')?;
    let last = text.rfind('}')?;
    (last > first).then(|| &text[first..=last])
}
