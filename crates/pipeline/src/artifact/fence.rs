//! Splitting a stored reply into prose and an embedded markup artifact.

/// A fenced block: byte range of the whole block and of its body.
struct Fence {
    start: usize,
    end: usize,
    body_start: usize,
    body_end: usize,
}

impl Fence {
    fn body<'a>(&self, text: &'a str) -> &'a str {
        &text[self.body_start..self.body_end]
    }

    /// Body of an `html`-tagged fence, with the tag removed.
    fn html_body<'a>(&self, text: &'a str) -> Option<&'a str> {
        let body = self.body(text);
        let tagged = body.len() >= 4 && body.is_char_boundary(4) && body[..4].eq_ignore_ascii_case("html");
        tagged.then(|| &body[4..])
    }
}

/// Closed ``` fences, paired left to right.
fn fences(text: &str) -> Vec<Fence> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(open) = text[pos..].find("```") {
        let body_start = pos + open + 3;
        let Some(close) = text[body_start..].find("```") else {
            break;
        };
        let body_end = body_start + close;
        out.push(Fence {
            start: pos + open,
            end: body_end + 3,
            body_start,
            body_end,
        });
        pos = body_end + 3;
    }
    out
}

/// Whether `s` contains something shaped like an HTML tag.
fn looks_like_markup(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        if b != b'<' {
            return false;
        }
        let mut j = i + 1;
        if bytes.get(j) == Some(&b'/') {
            j += 1;
        }
        bytes.get(j).is_some_and(u8::is_ascii_alphabetic) && s[j..].contains('>')
    })
}

/// Byte range of an inline `<html ... </html>` document (case-insensitive).
fn inline_document(text: &str) -> Option<(usize, usize)> {
    let lower = text.to_ascii_lowercase();
    let start = lower.find("<html")?;
    let end = lower.rfind("</html>")? + "</html>".len();
    (end > start).then_some((start, end))
}

/// The markup artifact embedded in `text`: an `html` fence, else the first
/// fence if it holds markup, else an inline `<html>` document.
pub fn extract_artifact(text: &str) -> Option<String> {
    let all = fences(text);
    if let Some(body) = all.iter().find_map(|f| f.html_body(text)) {
        return Some(body.trim().to_owned());
    }
    if let Some(first) = all.first() {
        let body = first.body(text);
        if looks_like_markup(body) {
            return Some(body.trim().to_owned());
        }
    }
    inline_document(text).map(|(s, e)| text[s..e].trim().to_owned())
}

/// `text` with every markup artifact removed. Non-markup fences are kept.
pub fn strip_artifact(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    for f in fences(text) {
        let drop = f.html_body(text).is_some() || looks_like_markup(f.body(text));
        out.push_str(&text[pos..f.start]);
        if !drop {
            out.push_str(&text[f.start..f.end]);
        }
        pos = f.end;
    }
    out.push_str(&text[pos..]);

    if let Some((s, e)) = inline_document(&out) {
        out.replace_range(s..e, "");
    }
    out.trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_html_fence() {
        let text = "这是卡片：\n```html\n<div>card</div>\n```\n请查收";
        assert_eq!(extract_artifact(text).as_deref(), Some("<div>card</div>"));
        assert_eq!(strip_artifact(text), "这是卡片：\n\n请查收");
    }

    #[test]
    fn untagged_fence_needs_markup() {
        let code = "示例：\n```\nlet x = 1;\n```";
        assert_eq!(extract_artifact(code), None);
        assert_eq!(strip_artifact(code), code);

        let markup = "```\n<section>x</section>\n```";
        assert_eq!(extract_artifact(markup).as_deref(), Some("<section>x</section>"));
        assert_eq!(strip_artifact(markup), "");
    }

    #[test]
    fn inline_document_is_extracted() {
        let text = "前言 <HTML><body>x</body></HTML> 后记";
        assert_eq!(
            extract_artifact(text).as_deref(),
            Some("<HTML><body>x</body></HTML>")
        );
        assert_eq!(strip_artifact(text), "前言  后记");
    }

    #[test]
    fn plain_text_has_no_artifact() {
        assert_eq!(extract_artifact("你好，今天想聊什么？"), None);
        assert_eq!(strip_artifact("  你好  "), "你好");
    }

    #[test]
    fn unclosed_fence_is_left_alone() {
        let text = "```html\n<div>";
        assert_eq!(strip_artifact(text), text);
    }
}
