//! Fixed-schema GROW card markup.
//!
//! Rendering is a pure function of the payload: identical payloads give
//! byte-identical markup. Field values are inserted as markup so the goal
//! may carry a `highlight-text` span.

use super::grow::GrowCardPayload;

const TEMPLATE: &str = include_str!("../../templates/grow.html");

const DEFAULT_GOAL: &str = "在未来三个月内，明确目标并建立可执行路径。";
const DEFAULT_SLOGAN: &str = "拒绝模糊，用行动定义结果";
const DEFAULT_FOOTER: &str = "EXECUTIVE INSIDER, POWER YOUR DECISION";

const MAX_ITEMS: usize = 3;
/// Keys at least this long are treated as prose, not a `Key：Value` label.
const MAX_KEY_CHARS: usize = 15;

pub fn render_grow_card(payload: &GrowCardPayload) -> String {
    let reality = render_list(&payload.reality);
    let options = render_list(&payload.options);
    let will = render_list(&payload.will);
    fill_template(TEMPLATE, |name| match name {
        "GOAL" => Some(or_default(&payload.goal, DEFAULT_GOAL)),
        "REALITY_LIST" => Some(reality.as_str()),
        "OPTIONS_LIST" => Some(options.as_str()),
        "WILL_LIST" => Some(will.as_str()),
        "SLOGAN_CN" => Some(or_default(&payload.slogan_cn, DEFAULT_SLOGAN)),
        "FOOTER_SUB" => Some(or_default(&payload.footer_sub, DEFAULT_FOOTER)),
        _ => None,
    })
}

/// Substitute `{{NAME}}` placeholders in one pass over `template`.
/// Inserted values are never rescanned; unknown names stay as written.
fn fill_template<'a>(template: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find("}}").and_then(|close| Some((close, lookup(&after[..close])?))) {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Wrap markup in an `html` code fence, the form stored and streamed.
pub fn fence_html(markup: &str) -> String {
    format!("```html\n{markup}\n```")
}

fn render_list(items: &[String]) -> String {
    items
        .iter()
        .take(MAX_ITEMS)
        .map(|item| format!("<div class=\"list-item\">{}</div>", label_item(item)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `Key：Value` (or `Key: Value`) becomes `<strong>Key</strong> : Value`.
fn label_item(item: &str) -> String {
    if item.starts_with("<strong>") {
        return item.to_owned();
    }
    let Some((idx, sep)) = item.char_indices().find(|(_, c)| *c == ':' || *c == '：') else {
        return item.to_owned();
    };
    let key = &item[..idx];
    let value = item[idx + sep.len_utf8()..].trim_start();
    if key.is_empty() || key.chars().count() >= MAX_KEY_CHARS || value.contains('\n') {
        return item.to_owned();
    }
    format!("<strong>{key}</strong> : {value}")
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}
