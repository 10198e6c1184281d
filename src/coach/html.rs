//! Markdown-ish model output to HTML.
//!
//! Handles the handful of constructs the coach actually produces: headings,
//! bullet and numbered lists, `key: value` lines and plain paragraphs. Each
//! input line maps to one HTML element; blank lines become `<br>`.

/// Convert model output to HTML. All text content is escaped.
pub fn format_response_as_html(text: &str) -> String {
    let mut html: Vec<String> = Vec::new();
    let mut list = List::None;

    for line in text.trim().lines() {
        let line = strip_bold(line.trim());

        if line.is_empty() {
            list.close(&mut html);
            html.push("<br>".to_string());
            continue;
        }

        if let Some(item) = line.strip_prefix("- ") {
            list.open(List::Bullets, &mut html);
            html.push(format!("<li>{}</li>", escape(item)));
            continue;
        }
        if let Some(item) = numbered_item(line) {
            list.open(List::Numbered, &mut html);
            html.push(format!("<li>{}</li>", escape(item)));
            continue;
        }

        list.close(&mut html);
        html.push(block(line));
    }

    list.close(&mut html);
    html.join("\n")
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum List {
    None,
    Bullets,
    Numbered,
}

impl List {
    fn open(&mut self, kind: List, html: &mut Vec<String>) {
        if *self == kind {
            return;
        }
        self.close(html);
        html.push(
            match kind {
                List::Numbered => "<ol>",
                _ => "<ul>",
            }
            .to_string(),
        );
        *self = kind;
    }

    fn close(&mut self, html: &mut Vec<String>) {
        match self {
            List::Bullets => html.push("</ul>".to_string()),
            List::Numbered => html.push("</ol>".to_string()),
            List::None => {}
        }
        *self = List::None;
    }
}

/// Headings, `key: value` pairs and paragraphs.
fn block(line: &str) -> String {
    if let Some(h) = line.strip_prefix("### ") {
        return format!("<h3>{}</h3>", escape(h));
    }
    if let Some(h) = line.strip_prefix("## ") {
        return format!("<h2>{}</h2>", escape(h));
    }
    if let Some(h) = line.strip_prefix("# ") {
        return format!("<h1>{}</h1>", escape(h));
    }
    if !line.starts_with("http") {
        if let Some((key, value)) = line.split_once(':') {
            return format!(
                "<p><strong>{}:</strong> {}</p>",
                escape(key.trim()),
                escape(value.trim())
            );
        }
    }
    format!("<p>{}</p>", escape(line))
}

/// A line wrapped entirely in `**` loses the markers.
fn strip_bold(line: &str) -> &str {
    if line.starts_with("**") && line.ends_with("**") {
        let inner = if line.len() >= 4 {
            &line[2..line.len() - 2]
        } else {
            ""
        };
        return inner.trim();
    }
    line
}

/// `12. text` -> `text`. The marker is digits, a dot, then one whitespace char.
fn numbered_item(line: &str) -> Option<&str> {
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].strip_prefix('.')?;
    let mut chars = rest.chars();
    let ws = chars.next().filter(|c| c.is_whitespace())?;
    Some(&rest[ws.len_utf8()..])
}

/// Escape the characters that matter in HTML text and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
