//! Inline markdown: format runs and the text-match transformers that turn
//! spans of a run into links, images, hashtags and video embeds.
//!
//! Text is written with backslash escapes wherever a character would read
//! back as markup. Whitespace and line breaks that the block scanner would
//! trim or split on are written as numeric character references (`&#32;`).

use super::MarkdownCodec;
use super::transformers::{TextFormatTransformer, TextMatchTransformer};
use crate::model::{
    Carousel, CarouselImage, Document, ModelError, NodeKey, NodeKind, NodeType, TextFormat,
};
use crate::video::{parse_video_url, video_ref_from_captures};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Parsed inline content, not yet attached to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text { text: String, format: TextFormat },
    Node { kind: NodeKind, children: Vec<Inline> },
    /// Block-level content found inline, such as a bare video URL.
    Block(NodeKind),
}

impl Inline {
    pub fn text(text: impl Into<String>, format: TextFormat) -> Self {
        Inline::Text {
            text: text.into(),
            format,
        }
    }

    /// Attaches this item under `parent`. Block items are attached as-is and
    /// fail if `parent` cannot hold them.
    pub fn attach(self, doc: &mut Document, parent: NodeKey) -> Result<(), ModelError> {
        match self {
            Inline::Text { text, format } => {
                if !text.is_empty() {
                    doc.append_new(parent, NodeKind::formatted(text, format))?;
                }
            }
            Inline::Node { kind, children } => {
                let key = doc.append_new(parent, kind)?;
                for child in children {
                    child.attach(doc, key)?;
                }
            }
            Inline::Block(kind) => {
                doc.append_new(parent, kind)?;
            }
        }
        Ok(())
    }
}

/// What a text-match import sees besides its own captures.
pub struct InlineScope<'a> {
    pub codec: &'a MarkdownCodec,
    pub haystack: &'a str,
    pub format: TextFormat,
    pub allow_blocks: bool,
}

/// How a container lays out its inline content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InlineLayout {
    /// Paragraphs and quotes: line breaks are written as line breaks.
    Flow,
    /// Headings, list items, titles and labels: one line, trimmed on import.
    Line,
    /// Anything inside a table cell: one line, and `|` never appears bare.
    Cell,
}

impl InlineLayout {
    pub(crate) fn for_node(doc: &Document, key: NodeKey) -> Self {
        let mut cursor = Some(key);
        while let Some(node) = cursor {
            if doc.node_type(node) == Some(NodeType::TableCell) {
                return InlineLayout::Cell;
            }
            cursor = doc.parent(node);
        }
        match doc.node_type(key) {
            Some(NodeType::Paragraph | NodeType::Quote) => InlineLayout::Flow,
            _ => InlineLayout::Line,
        }
    }
}

// Link labels may hold code spans, whose content can include `]`.
static LINK_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^!?\[(?:\\.|`+[^`]*`+|[^\]\\])*\]\((?:\\.|[^)\s\\])*\)").unwrap()
});

pub(crate) static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[((?:\\.|[^\]\\])*)\]\(((?:\\.|[^)\s\\])*)\)").unwrap()
});

pub(crate) static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[((?:\\.|`+[^`]*`+|[^\]\\])*)\]\(((?:\\.|[^)\s\\])*)\)").unwrap()
});

pub(crate) static AUTOLINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>()\[\]]*[^\s<>()\[\].,;:!?'"]"#).unwrap()
});

pub(crate) static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([\p{L}_][\p{L}\p{N}_]*)").unwrap());

static HASHTAG_SPAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[\p{L}_][\p{L}\p{N}_]*").unwrap());

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^&(?:#([0-9]{1,7})|#[xX]([0-9a-fA-F]{1,6})|([A-Za-z][A-Za-z0-9]{1,31}));")
        .unwrap()
});

/// Characters that always take a backslash when they appear in text.
const ESCAPED: [char; 13] = ['\\', '*', '_', '~', '`', '[', ']', '(', ')', '#', '<', '>', '|'];

/// Character references that stay meaningful inside code spans.
const CODE_REFS: [(&str, char); 3] = [("&#10;", '\n'), ("&#13;", '\r'), ("&#38;", '&')];

pub(crate) fn char_ref(ch: char) -> String {
    format!("&#{};", u32::from(ch))
}

/// Decodes the character reference opening `rest`, returning its length.
fn decode_entity(rest: &str) -> Option<(usize, char)> {
    let caps = ENTITY_RE.captures(rest)?;
    let len = caps.get(0)?.end();
    let numeric = |value: u32| {
        char::from_u32(value)
            .filter(|ch| *ch != '\0')
            .unwrap_or(char::REPLACEMENT_CHARACTER)
    };
    let ch = if let Some(decimal) = caps.get(1) {
        numeric(decimal.as_str().parse().ok()?)
    } else if let Some(hex) = caps.get(2) {
        numeric(u32::from_str_radix(hex.as_str(), 16).ok()?)
    } else {
        match caps.get(3)?.as_str() {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            "nbsp" => '\u{a0}',
            _ => return None,
        }
    };
    Some((len, ch))
}

/// Resolves backslash escapes and character references.
pub(crate) fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut index = 0;
    while let Some(ch) = text[index..].chars().next() {
        let rest = &text[index..];
        if let Some(pair) = escape_pair(rest) {
            out.push_str(&pair[1..]);
            index += pair.len();
            continue;
        }
        if ch == '&'
            && let Some((len, decoded)) = decode_entity(rest)
        {
            out.push(decoded);
            index += len;
            continue;
        }
        out.push(ch);
        index += ch.len_utf8();
    }
    out
}

/// Code span content keeps backslashes and only knows [`CODE_REFS`].
fn decode_code(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    'scan: while let Some(ch) = rest.chars().next() {
        for (reference, decoded) in CODE_REFS {
            if let Some(after) = rest.strip_prefix(reference) {
                out.push(decoded);
                rest = after;
                continue 'scan;
            }
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

/// A backslash followed by ASCII punctuation at the start of `rest`.
fn escape_pair(rest: &str) -> Option<&str> {
    let mut chars = rest.chars();
    (chars.next() == Some('\\') && chars.next().is_some_and(|ch| ch.is_ascii_punctuation()))
        .then(|| &rest[..2])
}

/// True when the character at `index` follows an odd run of backslashes.
pub(crate) fn is_escaped(text: &str, index: usize) -> bool {
    text[..index]
        .bytes()
        .rev()
        .take_while(|byte| *byte == b'\\')
        .count()
        % 2
        == 1
}

/// Escapes text that sits inside a delimiter pair. Edge whitespace becomes
/// character references so the delimiters stay attached to the text.
fn escape_enclosed(text: &str) -> String {
    let core = text.trim();
    let lead = &text[..text.len() - text.trim_start().len()];
    let trail = if core.is_empty() {
        ""
    } else {
        &text[lead.len() + core.len()..]
    };
    let mut out: String = lead.chars().map(char_ref).collect();
    out.push_str(&escape_text(core));
    out.extend(trail.chars().map(char_ref));
    out
}

/// Escapes an image alt text or a carousel caption.
pub(crate) fn escape_label(text: &str) -> String {
    escape_text(text).replace('\n', "&#10;")
}

/// Escapes a link or image destination.
pub(crate) fn escape_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for (index, ch) in url.char_indices() {
        match ch {
            '\\' | '(' | ')' | '[' | ']' | '<' | '>' | '|' | '`' => {
                out.push('\\');
                out.push(ch);
            }
            '&' if decode_entity(&url[index..]).is_some() => out.push_str("\\&"),
            _ if ch.is_whitespace() => out.push_str(&char_ref(ch)),
            _ => out.push(ch),
        }
    }
    out
}

/// Byte length of the repeated `tag` run opening `rest`.
pub(crate) fn tag_run(rest: &str, tag: &str) -> usize {
    if tag.is_empty() {
        return 0;
    }
    let mut len = 0;
    while rest[len..].starts_with(tag) {
        len += tag.len();
    }
    len
}

/// A verbatim span opening `rest`: a run of `tag` closed by a run of the same
/// length. Returns the whole span's length and its raw content. One space
/// of padding is dropped from each side when both are present.
pub(crate) fn fenced_span<'a>(rest: &'a str, tag: &str) -> Option<(usize, &'a str)> {
    let fence = tag_run(rest, tag);
    if fence == 0 {
        return None;
    }
    let body = &rest[fence..];
    let mut from = 0;
    while let Some(found) = body[from..].find(tag) {
        let start = from + found;
        let run = tag_run(&body[start..], tag);
        if run == fence {
            let content = &body[..start];
            let padded = content.len() >= 2
                && content.starts_with(' ')
                && content.ends_with(' ')
                && !content.bytes().all(|byte| byte == b' ');
            let content = if padded {
                &content[1..content.len() - 1]
            } else {
                content
            };
            return Some((fence + start + run, content));
        }
        from = start + run;
    }
    None
}

/// Writes `text` as a verbatim span fenced with one more `tag` than its
/// longest inner run.
fn code_span(text: &str, tag: &str, in_cell: bool) -> String {
    let mut longest = 0;
    let mut index = 0;
    while index < text.len() {
        let run = tag_run(&text[index..], tag);
        if run > 0 {
            longest = longest.max(run / tag.len());
            index += run;
        } else {
            index += text[index..].chars().next().map_or(1, char::len_utf8);
        }
    }
    let fence = tag.repeat(longest + 1);
    let pad = text.starts_with(tag)
        || text.ends_with(tag)
        || (text.starts_with(' ') && text.ends_with(' ') && !text.bytes().all(|b| b == b' '));

    let mut out = fence.clone();
    if pad {
        out.push(' ');
    }
    for (index, ch) in text.char_indices() {
        let rest = &text[index..];
        match ch {
            '\n' | '\r' => out.push_str(&char_ref(ch)),
            '&' if CODE_REFS.iter().any(|(reference, _)| rest.starts_with(reference)) => {
                out.push_str("&#38;");
            }
            '|' if in_cell => out.push_str("\\|"),
            _ => out.push(ch),
        }
    }
    if pad {
        out.push(' ');
    }
    out.push_str(&fence);
    out
}

/// Escapes `text` for a delimiter-free run.
pub(crate) fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (index, ch) in text.char_indices() {
        let rest = &text[index..];
        if ch == '\r' {
            out.push_str(&char_ref(ch));
            continue;
        }
        if ESCAPED.contains(&ch)
            || (ch == ':' && rest[1..].starts_with("//"))
            || (ch == '&' && decode_entity(rest).is_some())
        {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// True when a text node of `format` is taken verbatim.
fn is_verbatim(format: TextFormat, formats: &[TextFormatTransformer]) -> bool {
    formats
        .iter()
        .any(|transformer| transformer.verbatim && format.contains(transformer.format))
}

/// Turns the raw markdown of one run into its text.
fn decode_run(text: &str, format: TextFormat, formats: &[TextFormatTransformer]) -> String {
    if is_verbatim(format, formats) {
        decode_code(text)
    } else {
        unescape(text)
    }
}

/// Something the format scanner steps over whole.
enum Span<'a> {
    Literal(usize),
    Verbatim(usize, &'a str, TextFormat),
}

impl Span<'_> {
    fn len(&self) -> usize {
        match self {
            Span::Literal(len) | Span::Verbatim(len, _, _) => *len,
        }
    }
}

fn span_at<'a>(text: &'a str, index: usize, formats: &[TextFormatTransformer]) -> Option<Span<'a>> {
    let rest = &text[index..];
    if let Some(pair) = escape_pair(rest) {
        return Some(Span::Literal(pair.len()));
    }
    for transformer in formats.iter().filter(|transformer| transformer.verbatim) {
        for &tag in transformer.tags {
            if let Some((len, inner)) = fenced_span(rest, tag) {
                return Some(Span::Verbatim(len, inner, transformer.format));
            }
            // An unclosed run is literal as a whole.
            let run = tag_run(rest, tag);
            if run > 0 {
                return Some(Span::Literal(run));
            }
        }
    }
    if let Some(span) = LINK_SPAN_RE.find(rest) {
        return Some(Span::Literal(span.end()));
    }
    if rest.starts_with('#')
        && hashtag_starts_at(text, index)
        && let Some(span) = HASHTAG_SPAN_RE.find(rest)
    {
        return Some(Span::Literal(span.end()));
    }
    None
}

/// Splits `text` into runs of uniform format. Run text is still raw
/// markdown: escapes are resolved once text matches have claimed their spans.
/// Code spans, link spans and hashtags are never split by emphasis.
pub fn parse_formats(
    text: &str,
    base: TextFormat,
    formats: &[TextFormatTransformer],
) -> Vec<(String, TextFormat)> {
    let mut runs: Vec<(String, TextFormat)> = Vec::new();
    let mut plain = String::new();
    let mut index = 0;

    while index < text.len() {
        let rest = &text[index..];
        match span_at(text, index, formats) {
            Some(Span::Verbatim(len, inner, format)) => {
                flush(&mut runs, &mut plain, base);
                push_run(&mut runs, inner.to_string(), base.with(format));
                index += len;
                continue;
            }
            Some(Span::Literal(len)) => {
                plain.push_str(&rest[..len]);
                index += len;
                continue;
            }
            None => {}
        }
        if let Some((open, close, format)) = emphasis_at(text, index, formats) {
            flush(&mut runs, &mut plain, base);
            let inner = &text[index + open.len()..close];
            for (run, run_format) in parse_formats(inner, base.with(format), formats) {
                push_run(&mut runs, run, run_format);
            }
            index = close + open.len();
            continue;
        }
        let Some(ch) = rest.chars().next() else {
            break;
        };
        plain.push(ch);
        index += ch.len_utf8();
    }
    flush(&mut runs, &mut plain, base);
    runs
}

fn flush(runs: &mut Vec<(String, TextFormat)>, plain: &mut String, base: TextFormat) {
    if !plain.is_empty() {
        push_run(runs, std::mem::take(plain), base);
    }
}

fn push_run(runs: &mut Vec<(String, TextFormat)>, text: String, format: TextFormat) {
    if text.is_empty() {
        return;
    }
    if let Some((last, last_format)) = runs.last_mut()
        && *last_format == format
    {
        last.push_str(&text);
        return;
    }
    runs.push((text, format));
}

/// Opening delimiter at `index` with its matching closer.
fn emphasis_at(
    text: &str,
    index: usize,
    formats: &[TextFormatTransformer],
) -> Option<(&'static str, usize, TextFormat)> {
    let rest = &text[index..];
    for transformer in formats.iter().filter(|transformer| !transformer.verbatim) {
        for &tag in transformer.tags {
            if !rest.starts_with(tag) {
                continue;
            }
            if rest[tag.len()..].chars().next().is_none_or(char::is_whitespace) {
                continue;
            }
            if tag.starts_with('_') && text[..index].chars().next_back().is_some_and(is_word_char) {
                continue;
            }
            if let Some(close) = find_closer(text, index + tag.len(), tag, formats) {
                return Some((tag, close, transformer.format));
            }
        }
    }
    None
}

fn find_closer(
    text: &str,
    from: usize,
    tag: &str,
    formats: &[TextFormatTransformer],
) -> Option<usize> {
    let mut index = from;
    while index < text.len() {
        if let Some(span) = span_at(text, index, formats) {
            index += span.len();
            continue;
        }
        let rest = &text[index..];
        if index > from
            && rest.starts_with(tag)
            && !text[..index].chars().next_back().is_some_and(char::is_whitespace)
            && !(tag.starts_with('_') && rest[tag.len()..].chars().next().is_some_and(is_word_char))
        {
            return Some(index);
        }
        index += rest.chars().next().map_or(1, char::len_utf8);
    }
    None
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric()
}

fn is_tag_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Whether the `#` at `index` opens a hashtag. A tag may follow another tag
/// directly (`#a#b`) but not a word, an entity opener or a bare `#`.
pub(crate) fn hashtag_starts_at(text: &str, index: usize) -> bool {
    if is_escaped(text, index) {
        return false;
    }
    let before = &text[..index];
    let Some(previous) = before.chars().next_back() else {
        return true;
    };
    if previous == '&' || previous == '#' {
        return is_escaped(before, index - previous.len_utf8());
    }
    if !is_word_char(previous) {
        return true;
    }
    let tag_start = before
        .char_indices()
        .rev()
        .take_while(|(_, ch)| is_tag_char(*ch))
        .last()
        .map_or(index, |(start, _)| start);
    let opens_tag = before[tag_start..]
        .chars()
        .next()
        .is_some_and(|ch| ch == '_' || ch.is_alphabetic());
    opens_tag
        && before[..tag_start].ends_with('#')
        && hashtag_starts_at(text, tag_start - 1)
}

/// Full inline pipeline for one block's text.
pub fn parse_inline(
    codec: &MarkdownCodec,
    text: &str,
    base: TextFormat,
    allow_blocks: bool,
) -> Vec<Inline> {
    let formats = codec.format_transformers();
    let mut out = Vec::new();
    for (run, format) in parse_formats(text, base, formats) {
        if is_verbatim(format, formats) {
            out.push(Inline::text(decode_code(&run), format));
            continue;
        }
        apply_text_matches(codec, &run, format, allow_blocks, &mut out);
    }
    out
}

fn apply_text_matches(
    codec: &MarkdownCodec,
    run: &str,
    format: TextFormat,
    allow_blocks: bool,
    out: &mut Vec<Inline>,
) {
    let scope = InlineScope {
        codec,
        haystack: run,
        format,
        allow_blocks,
    };
    let mut cursor = 0;
    while cursor < run.len() {
        let mut best: Option<(usize, usize, Inline)> = None;
        for transformer in codec.text_match_transformers() {
            let Some(found) = first_match(transformer, run, cursor, &scope) else {
                continue;
            };
            if best.as_ref().is_none_or(|(start, _, _)| found.0 < *start) {
                best = Some(found);
            }
        }
        let Some((start, end, inline)) = best else {
            break;
        };
        if start > cursor {
            out.push(Inline::text(unescape(&run[cursor..start]), format));
        }
        out.push(inline);
        cursor = end;
    }
    if cursor < run.len() {
        out.push(Inline::text(unescape(&run[cursor..]), format));
    }
}

fn first_match(
    transformer: &TextMatchTransformer,
    run: &str,
    from: usize,
    scope: &InlineScope<'_>,
) -> Option<(usize, usize, Inline)> {
    let mut position = from;
    while position < run.len() {
        let caps = transformer.regex.captures_at(run, position)?;
        let whole = caps.get(0)?;
        if !is_escaped(run, whole.start())
            && let Some(inline) = (transformer.import)(&caps, scope)
        {
            return Some((whole.start(), whole.end(), inline));
        }
        position = whole.start() + run[whole.start()..].chars().next().map_or(1, char::len_utf8);
    }
    None
}

/// A text-match transformer firing on the character just typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutMatch {
    /// Byte offset in the text where the replaced span starts.
    pub start: usize,
    pub inline: Inline,
}

pub(crate) fn match_shortcut(
    codec: &MarkdownCodec,
    before_caret: &str,
    typed: char,
    format: TextFormat,
    allow_blocks: bool,
) -> Option<ShortcutMatch> {
    // A closing trigger belongs to the span; whitespace only ends it.
    let mut haystack = before_caret.to_string();
    if !typed.is_whitespace() {
        haystack.push(typed);
    }
    let scope = InlineScope {
        codec,
        haystack: &haystack,
        format,
        allow_blocks,
    };
    codec
        .text_match_transformers()
        .iter()
        .filter(|transformer| transformer.trigger == typed)
        .find_map(|transformer| {
            let caps = transformer
                .regex
                .captures_iter(&haystack)
                .filter(|caps| caps.get(0).is_some_and(|m| m.end() == haystack.len()))
                .last()?;
            let start = caps.get(0)?.start();
            (transformer.import)(&caps, &scope).map(|inline| ShortcutMatch { start, inline })
        })
}

pub(crate) fn import_video_image(caps: &Captures<'_>, scope: &InlineScope<'_>) -> Option<Inline> {
    if !scope.allow_blocks {
        return None;
    }
    let video = parse_video_url(&unescape(caps.get(2)?.as_str()))?;
    Some(Inline::Block(NodeKind::video(video)))
}

pub(crate) fn import_image(caps: &Captures<'_>, _scope: &InlineScope<'_>) -> Option<Inline> {
    Some(Inline::Node {
        kind: NodeKind::image(
            unescape(caps.get(2)?.as_str()),
            unescape(caps.get(1)?.as_str()),
        ),
        children: Vec::new(),
    })
}

pub(crate) fn import_link(caps: &Captures<'_>, scope: &InlineScope<'_>) -> Option<Inline> {
    let label = caps.get(1)?.as_str();
    let formats = scope.codec.format_transformers();
    let children = parse_formats(label, scope.format, formats)
        .into_iter()
        .map(|(text, format)| Inline::text(decode_run(&text, format, formats), format))
        .collect();
    Some(Inline::Node {
        kind: NodeKind::Link {
            url: unescape(caps.get(2)?.as_str()),
        },
        children,
    })
}

/// A video URL only counts when it ends where the URL ends. Trailing
/// sentence punctuation is left to the surrounding text.
pub(crate) fn import_video_url(caps: &Captures<'_>, scope: &InlineScope<'_>) -> Option<Inline> {
    if !scope.allow_blocks {
        return None;
    }
    let after = &scope.haystack[caps.get(0)?.end()..];
    let mut chars = after.chars();
    let bounded = match chars.next() {
        None => true,
        Some(ch) if ch.is_whitespace() || ch == ')' => true,
        Some('.' | ',' | ';' | ':' | '!' | '?') => chars.next().is_none_or(char::is_whitespace),
        Some(_) => false,
    };
    if !bounded {
        return None;
    }
    video_ref_from_captures(caps).map(|video| Inline::Block(NodeKind::video(video)))
}

pub(crate) fn import_autolink(caps: &Captures<'_>, scope: &InlineScope<'_>) -> Option<Inline> {
    let url = unescape(caps.get(0)?.as_str());
    let children = vec![Inline::text(url.clone(), scope.format)];
    Some(Inline::Node {
        kind: NodeKind::Link { url },
        children,
    })
}

pub(crate) fn import_hashtag(caps: &Captures<'_>, scope: &InlineScope<'_>) -> Option<Inline> {
    if !hashtag_starts_at(scope.haystack, caps.get(0)?.start()) {
        return None;
    }
    Some(Inline::Node {
        kind: NodeKind::Hashtag {
            tag: caps.get(1)?.as_str().to_string(),
        },
        children: Vec::new(),
    })
}

pub(crate) fn export_image(_: &MarkdownCodec, doc: &Document, key: NodeKey) -> Option<String> {
    match doc.kind(key)? {
        NodeKind::Image { src, alt } => {
            Some(format!("![{}]({})", escape_label(alt), escape_url(src)))
        }
        _ => None,
    }
}

pub(crate) fn export_link(codec: &MarkdownCodec, doc: &Document, key: NodeKey) -> Option<String> {
    match doc.kind(key)? {
        NodeKind::Link { url } => Some(format!(
            "[{}]({})",
            codec.export_inline(doc, key),
            escape_url(url)
        )),
        _ => None,
    }
}

pub(crate) fn export_hashtag(_: &MarkdownCodec, doc: &Document, key: NodeKey) -> Option<String> {
    match doc.kind(key)? {
        NodeKind::Hashtag { tag } => Some(format!("#{tag}")),
        _ => None,
    }
}

pub(crate) fn export_none(_: &MarkdownCodec, _: &Document, _: NodeKey) -> Option<String> {
    None
}

/// Renders one text run: escaped text wrapped in the delimiters of every
/// format it carries. Verbatim formats go innermost and adjacent delimiters
/// never share a character.
pub fn export_text(
    text: &str,
    format: TextFormat,
    formats: &[TextFormatTransformer],
    in_cell: bool,
) -> String {
    if text.is_empty() {
        return String::new();
    }
    let active: Vec<&TextFormatTransformer> = formats
        .iter()
        .filter(|transformer| {
            !transformer.tags.is_empty()
                && !transformer.format.is_plain()
                && format.contains(transformer.format)
        })
        .collect();
    let body = match active.iter().find(|transformer| transformer.verbatim) {
        Some(verbatim) => code_span(text, verbatim.tags[0], in_cell),
        None if active.is_empty() => return escape_text(text),
        None => escape_enclosed(text),
    };

    let mut out = String::new();
    let mut closing: Vec<&str> = Vec::new();
    let mut previous: Option<char> = None;
    for transformer in active.iter().filter(|transformer| !transformer.verbatim) {
        let Some(&tag) = transformer
            .tags
            .iter()
            .find(|tag| tag.chars().next() != previous)
            .or_else(|| transformer.tags.first())
        else {
            continue;
        };
        out.push_str(tag);
        closing.push(tag);
        previous = tag.chars().last();
    }
    out.push_str(&body);
    for tag in closing.into_iter().rev() {
        out.push_str(tag);
    }
    out
}

/// Keeps rendered inline markdown inside its block. No line may read as the
/// start of another block, and whitespace the block scanner would trim or
/// treat as a blank line is written as character references.
pub(crate) fn guard_lines(rendered: &str, layout: InlineLayout) -> String {
    let mut out = String::with_capacity(rendered.len());
    let mut line_start = true;
    let mut index = 0;
    while let Some(ch) = rendered[index..].chars().next() {
        let next = index + ch.len_utf8();
        let rest = &rendered[next..];
        if ch == '\n' {
            if layout == InlineLayout::Flow
                && !line_start
                && !rest.is_empty()
                && !rest.starts_with('\n')
            {
                out.push('\n');
                line_start = true;
            } else {
                out.push_str(&char_ref(ch));
                line_start = false;
            }
            index = next;
            continue;
        }
        let bare_space = ch.is_whitespace()
            && (line_start
                || rest
                    .chars()
                    .take_while(|ch| *ch != '\n')
                    .all(char::is_whitespace));
        if ch == '\r' || bare_space {
            out.push_str(&char_ref(ch));
            index = next;
            continue;
        }
        if line_start {
            line_start = false;
            let digits = rendered[index..]
                .bytes()
                .take_while(u8::is_ascii_digit)
                .count();
            if digits > 0 && rendered[index + digits..].starts_with('.') {
                out.push_str(&rendered[index..index + digits]);
                out.push_str("\\.");
                index += digits + 1;
                continue;
            }
            if matches!(ch, '-' | '+' | ':') {
                out.push('\\');
            }
        }
        out.push(ch);
        index = next;
    }
    out
}

/// Parses the `![alt](src)` lines of a carousel block body.
pub(crate) fn parse_carousel_lines(lines: &[&str]) -> Carousel {
    let mut carousel = Carousel::new();
    for line in lines {
        if let Some(caps) = IMAGE_RE.captures(line.trim())
            && let (Some(alt), Some(src)) = (caps.get(1), caps.get(2))
        {
            carousel.push(CarouselImage::from_source(
                unescape(src.as_str()),
                unescape(alt.as_str()),
            ));
        }
    }
    carousel
}
