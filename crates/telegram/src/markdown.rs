//! Markdown-ish backend text to Telegram HTML.
//!
//! Handles `**bold**`, `*italic*`, `_italic_`, `~~strike~~`, inline and
//! fenced code, and `[label](url)` links. An unclosed delimiter is kept as a
//! literal character. Everything outside markup is HTML-escaped.

/// Telegram message size limit.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

/// Telegram caption size limit for photos.
pub const TELEGRAM_CAPTION_LIMIT: usize = 1024;

const SPAN_DELIMITERS: [(&str, &str); 4] = [("**", "b"), ("~~", "s"), ("*", "i"), ("_", "i")];

/// A piece of a longer message: the markdown it came from and its HTML.
/// `source` is what gets sent when Telegram refuses the HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownChunk {
    pub source: String,
    pub html: String,
}

/// Render markdown as Telegram HTML.
#[must_use]
pub fn to_telegram_html(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut rest = markdown;
    let mut prev: Option<char> = None;

    while let Some(ch) = rest.chars().next() {
        if let Some((html, consumed)) = inline_span(rest, prev) {
            out.push_str(&html);
            prev = rest[..consumed].chars().next_back();
            rest = &rest[consumed..];
            continue;
        }
        push_escaped(&mut out, ch);
        prev = Some(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

/// Read one markup span at the start of `input`, returning its HTML and the
/// number of bytes it covered.
fn inline_span(input: &str, prev: Option<char>) -> Option<(String, usize)> {
    if let Some(body) = input.strip_prefix("```") {
        let end = body.find("```")?;
        return Some((code_block(&body[..end]), end + 6));
    }
    if let Some(body) = input.strip_prefix('`') {
        let end = body.find('`')?;
        let html = format!("<code>{}</code>", escape_html(&body[..end]));
        return Some((html, end + 2));
    }
    if input.starts_with('[') {
        return link(input);
    }

    for (delim, tag) in SPAN_DELIMITERS {
        let Some(body) = input.strip_prefix(delim) else {
            continue;
        };
        // snake_case identifiers are not emphasis
        let underscore = delim == "_";
        if underscore && prev.is_some_and(char::is_alphanumeric) {
            return None;
        }
        let end = body.find(delim)?;
        let inner = &body[..end];
        if inner.is_empty() || inner.starts_with(char::is_whitespace) {
            return None;
        }
        if underscore && body[end + 1..].starts_with(char::is_alphanumeric) {
            return None;
        }
        let html = format!("<{tag}>{}</{tag}>", to_telegram_html(inner));
        return Some((html, end + delim.len() * 2));
    }
    None
}

fn code_block(block: &str) -> String {
    let (lang, code) = match block.split_once('\n') {
        Some((lang, code)) if is_language_tag(lang) => (lang, code),
        Some(("", code)) => ("", code),
        _ => ("", block),
    };
    let code = escape_html(code.strip_suffix('\n').unwrap_or(code));
    if lang.is_empty() {
        format!("<pre>{code}</pre>")
    } else {
        format!("<pre><code class=\"language-{lang}\">{code}</code></pre>")
    }
}

fn is_language_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_' | '#'))
}

fn link(input: &str) -> Option<(String, usize)> {
    let close = input.find("](")?;
    let label = &input[1..close];
    if label.is_empty() || label.contains(['[', ']', '\n']) {
        return None;
    }
    let target = &input[close + 2..];
    let end = target.find(')')?;
    let url = &target[..end];
    if url.is_empty() || url.contains(char::is_whitespace) {
        return None;
    }
    let html = format!(
        "<a href=\"{}\">{}</a>",
        escape_attr(url),
        to_telegram_html(label)
    );
    Some((html, close + 2 + end + 1))
}

fn push_escaped(out: &mut String, ch: char) {
    match ch {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        other => out.push(other),
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        push_escaped(&mut out, ch);
    }
    out
}

fn escape_attr(text: &str) -> String {
    escape_html(text).replace('"', "&quot;")
}

// ── Chunking ────────────────────────────────────────────────────────────────

/// Split markdown so that each chunk's HTML fits `max_len` bytes.
///
/// The source is split, not the HTML, so no chunk cuts through a tag.
/// Splits prefer a newline, then a space.
#[must_use]
pub fn chunk_markdown(markdown: &str, max_len: usize) -> Vec<MarkdownChunk> {
    if max_len == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut remaining = markdown;
    while !remaining.is_empty() {
        let html = to_telegram_html(remaining);
        if html.len() <= max_len {
            chunks.push(MarkdownChunk {
                source: remaining.to_string(),
                html,
            });
            break;
        }

        let split_at = best_split(remaining, max_len);
        let head = &remaining[..split_at];
        chunks.push(MarkdownChunk {
            source: head.to_string(),
            html: to_telegram_html(head),
        });
        remaining = remaining[split_at..].trim_start_matches(['\n', ' ']);
    }
    chunks
}

/// The head of `markdown` that fits a photo caption. The rest is dropped.
#[must_use]
pub fn truncate_caption(markdown: &str) -> Option<MarkdownChunk> {
    chunk_markdown(markdown, TELEGRAM_CAPTION_LIMIT)
        .into_iter()
        .next()
}

fn best_split(markdown: &str, max_len: usize) -> usize {
    let mut boundaries: Vec<usize> = markdown.char_indices().map(|(i, _)| i).collect();
    boundaries.push(markdown.len());

    // Longest prefix whose HTML fits.
    let (mut lo, mut hi) = (1usize, boundaries.len() - 1);
    let mut best = 0usize;
    while lo <= hi {
        let mid = lo + (hi - lo) / 2;
        let split = boundaries[mid];
        if to_telegram_html(&markdown[..split]).len() <= max_len {
            best = split;
            lo = mid + 1;
        } else {
            hi = mid - 1;
        }
    }
    if best == 0 {
        return boundaries.get(1).copied().unwrap_or(markdown.len());
    }

    let head = &markdown[..best];
    match head.rfind('\n').or_else(|| head.rfind(' ')) {
        Some(pos) if pos > 0 => pos,
        _ => best,
    }
}
