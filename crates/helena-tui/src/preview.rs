//! Terminal rendering of the preview document.
//!
//! The preview is an HTML document; the terminal only gets its text. Tags
//! are dropped, block elements start new lines, `<br>` becomes a newline,
//! and `<style>`/`<script>`/`<head>` bodies are skipped entirely.

const SKIPPED: &[&str] = &["style", "script", "head", "title"];
const BLOCKS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "ul", "ol", "tr", "pre",
    "body", "html", "table", "section", "article", "header", "footer",
];

pub fn html_to_text(html: &str) -> String {
    let mut out = String::new();
    let mut rest = html;
    let mut in_pre = false;

    while let Some(start) = rest.find('<') {
        // `<` only opens a tag before a name, a closing slash or a declaration
        let opens_tag = rest[start + 1..]
            .starts_with(|c: char| c.is_ascii_alphabetic() || c == '/' || c == '!');
        if !opens_tag {
            push_text(&mut out, &rest[..=start], in_pre);
            rest = &rest[start + 1..];
            continue;
        }

        push_text(&mut out, &rest[..start], in_pre);
        let after = &rest[start..];
        let Some(end) = after.find('>') else {
            push_text(&mut out, after, in_pre);
            rest = "";
            break;
        };

        let tag = after[1..end].trim().to_ascii_lowercase();
        rest = &after[end + 1..];

        let closing = tag.starts_with('/');
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or("")
            .to_string();

        if !closing && SKIPPED.contains(&name.as_str()) {
            let close = format!("</{}", name);
            rest = match rest.to_ascii_lowercase().find(&close) {
                Some(pos) => &rest[pos..],
                None => "",
            };
            continue;
        }

        match name.as_str() {
            "br" => out.push('\n'),
            "img" => {
                new_line(&mut out);
                out.push_str("[image]");
                new_line(&mut out);
            }
            "pre" => {
                in_pre = !closing;
                new_line(&mut out);
            }
            n if BLOCKS.contains(&n) => new_line(&mut out),
            _ => {}
        }
    }
    push_text(&mut out, rest, in_pre);

    tidy(&out)
}

fn push_text(out: &mut String, text: &str, in_pre: bool) {
    let text = decode_entities(text);
    if in_pre {
        out.push_str(&text);
        return;
    }
    let mut last_space = out.ends_with(|c: char| c.is_whitespace()) || out.is_empty();
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(c);
            last_space = false;
        }
    }
}

fn new_line(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Trim line ends and keep at most one blank line in a row.
fn tidy(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() && lines.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}
