//! Transformer definitions and the built-in set.
//!
//! Three shapes exist. Element transformers consume whole lines and build
//! block nodes. Text-match transformers claim a regex span inside a text run.
//! Text-format transformers map delimiter pairs onto [`TextFormat`] bits.
//! Within each shape, registration order is precedence order.

use super::MarkdownCodec;
use super::collapsible;
use super::inline::{self, Inline, InlineScope};
use crate::model::{Document, ListType, ModelError, NodeKey, NodeKind, NodeType, TextFormat};
use crate::video::VIDEO_URL_RE;
use regex::{Captures, Regex};
use std::sync::LazyLock;

pub type BlockImportFn =
    fn(&MarkdownCodec, &[&str], &mut Document, NodeKey) -> Result<usize, ModelError>;
pub type ExportFn = fn(&MarkdownCodec, &Document, NodeKey) -> Option<String>;
pub type TextMatchImportFn = fn(&Captures<'_>, &InlineScope<'_>) -> Option<Inline>;

/// Consumes block-level lines. `import` returns how many lines it used.
#[derive(Debug, Clone, Copy)]
pub struct ElementTransformer {
    pub name: &'static str,
    pub kinds: &'static [NodeType],
    pub matches: fn(&[&str]) -> bool,
    pub import: BlockImportFn,
    pub export: ExportFn,
}

/// Claims spans of a text run. `trigger` is the character that completes the
/// span while typing.
#[derive(Debug, Clone, Copy)]
pub struct TextMatchTransformer {
    pub name: &'static str,
    pub kinds: &'static [NodeType],
    pub regex: &'static LazyLock<Regex>,
    pub trigger: char,
    pub import: TextMatchImportFn,
    pub export: ExportFn,
}

/// A delimiter pair. The first tag is preferred on export; `verbatim`
/// content is never parsed further.
#[derive(Debug, Clone, Copy)]
pub struct TextFormatTransformer {
    pub format: TextFormat,
    pub tags: &'static [&'static str],
    pub verbatim: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum Transformer {
    Element(ElementTransformer),
    TextMatch(TextMatchTransformer),
    TextFormat(TextFormatTransformer),
}

impl Transformer {
    /// Node kinds this transformer produces and renders.
    pub fn kinds(&self) -> &'static [NodeType] {
        match self {
            Transformer::Element(element) => element.kinds,
            Transformer::TextMatch(text_match) => text_match.kinds,
            Transformer::TextFormat(_) => &[NodeType::Text],
        }
    }
}

pub fn builtin_transformers() -> Vec<Transformer> {
    vec![
        Transformer::TextFormat(TextFormatTransformer {
            format: TextFormat::CODE,
            tags: &["`"],
            verbatim: true,
        }),
        Transformer::TextFormat(TextFormatTransformer {
            format: TextFormat::BOLD,
            tags: &["**", "__"],
            verbatim: false,
        }),
        Transformer::TextFormat(TextFormatTransformer {
            format: TextFormat::STRIKETHROUGH,
            tags: &["~~"],
            verbatim: false,
        }),
        Transformer::TextFormat(TextFormatTransformer {
            format: TextFormat::ITALIC,
            tags: &["*", "_"],
            verbatim: false,
        }),
        Transformer::Element(ElementTransformer {
            name: "heading",
            kinds: &[NodeType::Heading],
            matches: |lines| HEADING_RE.is_match(lines[0]),
            import: import_heading,
            export: export_heading,
        }),
        Transformer::Element(ElementTransformer {
            name: "code",
            kinds: &[NodeType::CodeBlock],
            matches: |lines| fence_open(lines[0]).is_some(),
            import: import_code,
            export: export_code,
        }),
        Transformer::Element(ElementTransformer {
            name: "quote",
            kinds: &[NodeType::Quote],
            matches: |lines| lines[0].trim_start().starts_with('>'),
            import: import_quote,
            export: export_quote,
        }),
        Transformer::Element(ElementTransformer {
            name: "horizontal-rule",
            kinds: &[NodeType::HorizontalRule],
            matches: |lines| RULE_RE.is_match(lines[0]),
            import: |_, _, doc, parent| {
                doc.append_new(parent, NodeKind::HorizontalRule)?;
                Ok(1)
            },
            export: |_, _, _| Some("---".to_string()),
        }),
        Transformer::Element(ElementTransformer {
            name: "list",
            kinds: &[NodeType::List],
            matches: |lines| list_line(lines[0]).is_some(),
            import: import_list,
            export: export_list,
        }),
        Transformer::Element(ElementTransformer {
            name: "table",
            kinds: &[NodeType::Table],
            matches: |lines| {
                lines.len() > 1
                    && lines[0].trim_start().starts_with('|')
                    && TABLE_SEPARATOR_RE.is_match(lines[1])
            },
            import: import_table,
            export: export_table,
        }),
        Transformer::Element(ElementTransformer {
            name: "carousel",
            kinds: &[NodeType::Carousel],
            matches: |lines| lines[0].trim() == CAROUSEL_OPEN,
            import: import_carousel,
            export: export_carousel,
        }),
        Transformer::Element(ElementTransformer {
            name: "video-embed",
            kinds: &[NodeType::VideoEmbed],
            matches: |_| false,
            import: |_, _, _, _| Ok(0),
            export: |_, doc, key| doc.kind(key)?.video_ref().map(|video| video.watch_url()),
        }),
        Transformer::Element(ElementTransformer {
            name: "collapsible",
            kinds: &[NodeType::CollapsibleContainer],
            matches: |_| false,
            import: |_, _, _, _| Ok(0),
            export: collapsible::export_collapsible,
        }),
        Transformer::Element(ElementTransformer {
            name: "paragraph",
            kinds: &[NodeType::Paragraph],
            matches: |_| true,
            import: import_paragraph,
            export: |codec, doc, key| Some(codec.export_inline(doc, key)),
        }),
        Transformer::TextMatch(TextMatchTransformer {
            name: "video-image",
            kinds: &[NodeType::VideoEmbed],
            regex: &inline::IMAGE_RE,
            trigger: ')',
            import: inline::import_video_image,
            export: inline::export_none,
        }),
        Transformer::TextMatch(TextMatchTransformer {
            name: "image",
            kinds: &[NodeType::Image],
            regex: &inline::IMAGE_RE,
            trigger: ')',
            import: inline::import_image,
            export: inline::export_image,
        }),
        Transformer::TextMatch(TextMatchTransformer {
            name: "link",
            kinds: &[NodeType::Link],
            regex: &inline::LINK_RE,
            trigger: ')',
            import: inline::import_link,
            export: inline::export_link,
        }),
        Transformer::TextMatch(TextMatchTransformer {
            name: "video-url",
            kinds: &[NodeType::VideoEmbed],
            regex: &VIDEO_URL_RE,
            trigger: ' ',
            import: inline::import_video_url,
            export: inline::export_none,
        }),
        Transformer::TextMatch(TextMatchTransformer {
            name: "autolink",
            kinds: &[NodeType::Link],
            regex: &inline::AUTOLINK_RE,
            trigger: ' ',
            import: inline::import_autolink,
            export: inline::export_none,
        }),
        Transformer::TextMatch(TextMatchTransformer {
            name: "hashtag",
            kinds: &[NodeType::Hashtag],
            regex: &inline::HASHTAG_RE,
            trigger: ' ',
            import: inline::import_hashtag,
            export: inline::export_hashtag,
        }),
    ]
}

const CAROUSEL_OPEN: &str = ":::carousel";
const CAROUSEL_CLOSE: &str = ":::";

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})(?:[ \t]+(.*))?$").unwrap());

static RULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:-{3,}|\*{3,}|_{3,})\s*$").unwrap());

static LIST_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([ \t]*)([-*+]|\d{1,9}[.)])(?:[ \t]+(?:\[([ xX])\](?:[ \t]+|$))?(.*))?$")
        .unwrap()
});

static TABLE_SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\|?\s*:?-+:?\s*(?:\|\s*:?-+:?\s*)*\|?\s*$").unwrap()
});

fn import_heading(
    codec: &MarkdownCodec,
    lines: &[&str],
    doc: &mut Document,
    parent: NodeKey,
) -> Result<usize, ModelError> {
    let Some(caps) = HEADING_RE.captures(lines[0]) else {
        return Ok(0);
    };
    let level = caps.get(1).map_or(1, |hashes| hashes.as_str().len()) as u8;
    let heading = doc.append_new(parent, NodeKind::heading(level))?;
    let text = caps.get(2).map_or("", |text| text.as_str()).trim_end();
    codec.attach_inline(doc, heading, text)?;
    Ok(1)
}

fn export_heading(codec: &MarkdownCodec, doc: &Document, key: NodeKey) -> Option<String> {
    let NodeKind::Heading { level } = doc.kind(key)? else {
        return None;
    };
    let hashes = "#".repeat(usize::from(*level));
    let content = codec.export_inline(doc, key);
    if content.is_empty() {
        return Some(hashes);
    }
    Some(format!("{hashes} {content}"))
}

/// Length of the backtick run opening a fenced code block on `line`. The info
/// string after the run may not hold a backtick, so a line that merely starts
/// with a long code span is not a fence.
pub(crate) fn fence_open(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let run = trimmed.bytes().take_while(|byte| *byte == b'`').count();
    (run >= 3 && !trimmed[run..].contains('`')).then_some(run)
}

pub(crate) fn fence_closes(line: &str, open: usize) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= open && trimmed.bytes().all(|byte| byte == b'`')
}

fn import_code(
    _: &MarkdownCodec,
    lines: &[&str],
    doc: &mut Document,
    parent: NodeKey,
) -> Result<usize, ModelError> {
    let Some(fence) = fence_open(lines[0]) else {
        return Ok(0);
    };
    let info = lines[0].trim_start()[fence..].trim();
    let language = info.split_whitespace().next().map(str::to_string);
    let close = lines
        .iter()
        .skip(1)
        .position(|line| fence_closes(line, fence))
        .map(|offset| offset + 1);
    let body_end = close.unwrap_or(lines.len());
    let code = lines[1..body_end].join("\n");

    let block = doc.append_new(parent, NodeKind::CodeBlock { language })?;
    if !code.is_empty() {
        doc.append_new(block, NodeKind::text(code))?;
    }
    Ok(close.map_or(lines.len(), |close| close + 1))
}

fn export_code(_: &MarkdownCodec, doc: &Document, key: NodeKey) -> Option<String> {
    let NodeKind::CodeBlock { language } = doc.kind(key)? else {
        return None;
    };
    let code = doc.text_content(key);
    let longest = code
        .split(|ch| ch != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat((longest + 1).max(3));
    let mut output = fence.clone();
    if let Some(language) = language {
        output.push_str(language);
    }
    output.push('\n');
    if !code.is_empty() {
        output.push_str(&code);
        output.push('\n');
    }
    output.push_str(&fence);
    Some(output)
}

fn import_quote(
    codec: &MarkdownCodec,
    lines: &[&str],
    doc: &mut Document,
    parent: NodeKey,
) -> Result<usize, ModelError> {
    let mut quote_lines: Vec<&str> = Vec::new();
    for line in lines {
        let Some(stripped) = line.trim_start().strip_prefix('>') else {
            break;
        };
        quote_lines.push(stripped.strip_prefix(' ').unwrap_or(stripped));
    }
    let quote = doc.append_new(parent, NodeKind::Quote)?;
    codec.attach_inline(doc, quote, &quote_lines.join("\n"))?;
    Ok(quote_lines.len())
}

fn export_quote(codec: &MarkdownCodec, doc: &Document, key: NodeKey) -> Option<String> {
    let inner = codec.export_inline(doc, key);
    Some(
        inner
            .split('\n')
            .map(|line| {
                if line.is_empty() {
                    ">".to_string()
                } else {
                    format!("> {line}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

struct ListLine<'a> {
    indent: usize,
    list_type: ListType,
    number: Option<u32>,
    checked: Option<bool>,
    content: &'a str,
}

fn list_line(line: &str) -> Option<ListLine<'_>> {
    let caps = LIST_ITEM_RE.captures(line)?;
    let indent = caps.get(1)?.as_str().len();
    let marker = caps.get(2)?.as_str();
    let number = marker
        .trim_end_matches(['.', ')'])
        .parse::<u32>()
        .ok();
    let checkbox = caps.get(3).map(|mark| mark.as_str() != " ");
    let list_type = match (number, checkbox) {
        (Some(_), _) => ListType::Number,
        (None, Some(_)) => ListType::Check,
        (None, None) => ListType::Bullet,
    };
    Some(ListLine {
        indent,
        list_type,
        number,
        checked: if list_type == ListType::Check {
            checkbox
        } else {
            None
        },
        content: caps.get(4).map_or("", |content| content.as_str().trim_end()),
    })
}

fn import_list(
    codec: &MarkdownCodec,
    lines: &[&str],
    doc: &mut Document,
    parent: NodeKey,
) -> Result<usize, ModelError> {
    let Some(first) = list_line(lines[0]) else {
        return Ok(0);
    };
    let list = doc.append_new(
        parent,
        NodeKind::List {
            list_type: first.list_type,
            start: first.number.unwrap_or(1),
        },
    )?;

    let mut index = 0;
    let mut last_item = None;
    while index < lines.len() {
        let Some(line) = list_line(lines[index]) else {
            break;
        };
        if line.indent < first.indent {
            break;
        }
        if line.indent > first.indent {
            let Some(item) = last_item else {
                break;
            };
            index += import_list(codec, &lines[index..], doc, item)?.max(1);
            continue;
        }
        if line.list_type != first.list_type {
            break;
        }
        let item = doc.append_new(
            list,
            NodeKind::ListItem {
                checked: line.checked,
            },
        )?;
        codec.attach_inline(doc, item, line.content)?;
        last_item = Some(item);
        index += 1;
    }
    Ok(index)
}

fn export_list(codec: &MarkdownCodec, doc: &Document, key: NodeKey) -> Option<String> {
    let mut lines = Vec::new();
    export_list_lines(codec, doc, key, 0, &mut lines);
    Some(lines.join("\n"))
}

fn export_list_lines(
    codec: &MarkdownCodec,
    doc: &Document,
    list: NodeKey,
    depth: usize,
    out: &mut Vec<String>,
) {
    let Some(NodeKind::List { list_type, start }) = doc.kind(list) else {
        return;
    };
    let indent = "  ".repeat(depth);
    for (offset, item) in doc.children(list).iter().enumerate() {
        let marker = match list_type {
            ListType::Bullet => "-".to_string(),
            ListType::Number => format!("{}.", *start as usize + offset),
            ListType::Check => {
                let checked = matches!(
                    doc.kind(*item),
                    Some(NodeKind::ListItem {
                        checked: Some(true)
                    })
                );
                format!("- [{}]", if checked { 'x' } else { ' ' })
            }
        };
        let content = codec.export_inline(doc, *item);
        if content.is_empty() {
            out.push(format!("{indent}{marker}"));
        } else {
            out.push(format!("{indent}{marker} {content}"));
        }
        for child in doc.children(*item) {
            if doc.node_type(*child) == Some(NodeType::List) {
                export_list_lines(codec, doc, *child, depth + 1, out);
            }
        }
    }
}

/// Splits a table row into trimmed cells. A `|` right after a backslash
/// belongs to the cell, and loses that backslash.
fn split_row(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = match trimmed.strip_suffix('|') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => trimmed,
    };
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut previous = None;
    for ch in trimmed.chars() {
        match (ch, previous) {
            ('|', Some('\\')) => {
                cell.pop();
                cell.push('|');
            }
            ('|', _) => cells.push(std::mem::take(&mut cell).trim().to_string()),
            _ => cell.push(ch),
        }
        previous = Some(ch);
    }
    cells.push(cell.trim().to_string());
    cells
}

fn import_table(
    codec: &MarkdownCodec,
    lines: &[&str],
    doc: &mut Document,
    parent: NodeKey,
) -> Result<usize, ModelError> {
    let table = doc.append_new(parent, NodeKind::Table)?;
    let mut consumed = 0;
    for (index, line) in lines.iter().enumerate() {
        if index == 1 {
            consumed += 1;
            continue;
        }
        if !line.trim_start().starts_with('|') {
            break;
        }
        let row = doc.append_new(table, NodeKind::TableRow)?;
        for cell_text in split_row(line) {
            let cell = doc.append_new(row, NodeKind::TableCell { header: index == 0 })?;
            codec.attach_inline(doc, cell, &cell_text)?;
        }
        consumed += 1;
    }
    Ok(consumed)
}

fn export_table(codec: &MarkdownCodec, doc: &Document, key: NodeKey) -> Option<String> {
    let rows = doc.children(key);
    let mut output = Vec::with_capacity(rows.len() + 1);
    for (index, row) in rows.iter().enumerate() {
        let cells: Vec<String> = doc
            .children(*row)
            .iter()
            .map(|cell| codec.export_inline(doc, *cell))
            .collect();
        output.push(format!("| {} |", cells.join(" | ")));
        if index == 0 {
            let separator = vec!["---"; cells.len().max(1)];
            output.push(format!("| {} |", separator.join(" | ")));
        }
    }
    (!output.is_empty()).then(|| output.join("\n"))
}

fn import_carousel(
    _: &MarkdownCodec,
    lines: &[&str],
    doc: &mut Document,
    parent: NodeKey,
) -> Result<usize, ModelError> {
    let close = lines
        .iter()
        .skip(1)
        .position(|line| line.trim() == CAROUSEL_CLOSE)
        .map(|offset| offset + 1);
    let body_end = close.unwrap_or(lines.len());
    let carousel = inline::parse_carousel_lines(&lines[1..body_end]);
    doc.append_new(parent, NodeKind::Carousel(carousel))?;
    Ok(close.map_or(lines.len(), |close| close + 1))
}

fn export_carousel(_: &MarkdownCodec, doc: &Document, key: NodeKey) -> Option<String> {
    let NodeKind::Carousel(carousel) = doc.kind(key)? else {
        return None;
    };
    let mut lines = vec![CAROUSEL_OPEN.to_string()];
    lines.extend(
        carousel
            .images()
            .iter()
            .map(|image| {
                format!(
                    "![{}]({})",
                    inline::escape_label(&image.alt),
                    inline::escape_url(&image.src)
                )
            }),
    );
    lines.push(CAROUSEL_CLOSE.to_string());
    Some(lines.join("\n"))
}

/// The fallback element. Runs until a blank line or until another element
/// transformer would start. Video embeds found inside split the paragraph
/// when the parent can hold blocks.
fn import_paragraph(
    codec: &MarkdownCodec,
    lines: &[&str],
    doc: &mut Document,
    parent: NodeKey,
) -> Result<usize, ModelError> {
    let mut end = 1;
    while end < lines.len()
        && !lines[end].trim().is_empty()
        && !codec.interrupts_paragraph(&lines[end..])
    {
        end += 1;
    }
    let text = lines[..end].join("\n");
    let allow_blocks = doc
        .node_type(parent)
        .is_some_and(|kind| kind.accepts_child(NodeType::VideoEmbed));

    let mut current: Option<NodeKey> = None;
    let mut after_block = false;
    for item in inline::parse_inline(codec, &text, TextFormat::PLAIN, allow_blocks) {
        match item {
            Inline::Block(kind) => {
                if let Some(paragraph) = current.take() {
                    trim_trailing_space(doc, paragraph)?;
                }
                doc.append_new(parent, kind)?;
                after_block = true;
            }
            Inline::Text { text, format } if current.is_none() => {
                let text = if after_block {
                    text.trim_start().to_string()
                } else {
                    text
                };
                if text.is_empty() {
                    continue;
                }
                let paragraph = doc.append_new(parent, NodeKind::Paragraph)?;
                Inline::Text { text, format }.attach(doc, paragraph)?;
                current = Some(paragraph);
            }
            other => {
                let paragraph = match current {
                    Some(paragraph) => paragraph,
                    None => doc.append_new(parent, NodeKind::Paragraph)?,
                };
                other.attach(doc, paragraph)?;
                current = Some(paragraph);
            }
        }
    }
    Ok(end)
}

/// Drops whitespace left at the end of a paragraph cut short by a block,
/// removing the paragraph if nothing remains.
fn trim_trailing_space(doc: &mut Document, paragraph: NodeKey) -> Result<(), ModelError> {
    if let Some(&last) = doc.children(paragraph).last()
        && let Some(NodeKind::Text { text, .. }) = doc.kind(last)
    {
        let trimmed = text.trim_end().to_string();
        if trimmed.is_empty() {
            doc.remove(last)?;
        } else {
            doc.set_text(last, trimmed)?;
        }
    }
    if doc.children(paragraph).is_empty() {
        doc.remove(paragraph)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_line_classification() {
        let line = list_line("  - [x] done").unwrap();
        assert_eq!(line.indent, 2);
        assert_eq!(line.list_type, ListType::Check);
        assert_eq!(line.checked, Some(true));
        assert_eq!(line.content, "done");

        let line = list_line("3. third").unwrap();
        assert_eq!(line.list_type, ListType::Number);
        assert_eq!(line.number, Some(3));

        assert!(list_line("-not a list").is_none());
        assert!(list_line("**bold**").is_none());
        assert_eq!(list_line("-").unwrap().content, "");
    }

    #[test]
    fn test_split_row() {
        assert_eq!(split_row("| a | b |"), vec!["a", "b"]);
        assert_eq!(split_row("|  |"), vec![""]);
        assert_eq!(split_row("| a \\| b | `c\\|` |"), vec!["a | b", "`c|`"]);
    }

    #[test]
    fn test_code_fences() {
        assert_eq!(fence_open("```rust"), Some(3));
        assert_eq!(fence_open("  ````"), Some(4));
        assert_eq!(fence_open("``` a`` ```"), None);
        assert_eq!(fence_open("``"), None);
        assert!(fence_closes("````", 3));
        assert!(!fence_closes("``", 3));

        let mut doc = Document::new();
        let root = doc.root();
        let block = doc
            .append_new(root, NodeKind::CodeBlock { language: None })
            .unwrap();
        doc.append_new(block, NodeKind::text("```\nstill code")).unwrap();
        let codec = MarkdownCodec::new();
        let markdown = codec.export_block(&doc, block);
        assert_eq!(markdown, "````\n```\nstill code\n````");
        assert!(codec.from_markdown(&markdown).unwrap().structurally_eq(&doc));
    }

    #[test]
    fn test_kinds_per_shape() {
        let transformers = builtin_transformers();
        let elements = transformers
            .iter()
            .filter(|transformer| matches!(transformer, Transformer::Element(_)))
            .count();
        assert_eq!(elements, 10);
        assert!(
            transformers
                .iter()
                .any(|transformer| transformer.kinds() == [NodeType::Hashtag])
        );
    }
}
