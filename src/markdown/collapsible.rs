//! Collapsible sections in markdown.
//!
//! Markdown has no collapsible block, so sections travel as raw
//! `<details><summary>` markup. Before the line scanner runs, each region is
//! swapped for a placeholder paragraph. After the scanner, each placeholder
//! paragraph is swapped back for a container whose title is parsed as inline
//! markdown and whose body is parsed as blocks.

use super::MarkdownCodec;
use super::inline::{fenced_span, tag_run};
use super::transformers::{fence_closes, fence_open};
use crate::model::{Document, ModelError, NodeKey, NodeKind, NodeType};
use regex::Regex;
use std::sync::LazyLock;
use uuid::Uuid;

static DETAILS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^<details(\s+open(?:\s*=\s*(?:"[^"]*"|'[^']*'))?)?\s*>\s*<summary>(.*?)</summary>(.*?)</details>"#,
    )
    .unwrap()
});

static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^</?([A-Za-z][A-Za-z0-9-]*)(?:\s[^<>]*)?/?>").unwrap());

/// One `<details>` region lifted out of the source text. `title` and `body`
/// are markdown with the HTML tags stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapsibleRegion {
    pub placeholder: String,
    pub is_open: bool,
    pub title: String,
    pub body: String,
}

/// Replaces every `<details>` region with a placeholder paragraph and
/// returns the rewritten text with the regions in source order. Escaped
/// characters and code spans are passed over.
pub fn extract(text: &str) -> (String, Vec<CollapsibleRegion>) {
    let mut regions = Vec::new();
    let mut out = String::with_capacity(text.len());
    let mut index = 0;
    while let Some(ch) = text[index..].chars().next() {
        let rest = &text[index..];
        if ch == '<'
            && let Some(caps) = DETAILS_RE.captures(rest)
            && let Some(whole) = caps.get(0)
        {
            let region = CollapsibleRegion {
                placeholder: format!("COLLAPSIBLE-{}", Uuid::new_v4().simple()),
                is_open: caps.get(1).is_some(),
                title: strip_tags(caps.get(2).map_or("", |m| m.as_str()), false)
                    .trim()
                    .to_string(),
                body: strip_body(caps.get(3).map_or("", |m| m.as_str())),
            };
            out.push_str("\n\n");
            out.push_str(&region.placeholder);
            out.push_str("\n\n");
            regions.push(region);
            index += whole.end();
            continue;
        }
        let len = passed_over(rest, ch);
        out.push_str(&rest[..len]);
        index += len;
    }
    (out, regions)
}

/// Length of the text at `rest` that tag handling must not look inside.
fn passed_over(rest: &str, ch: char) -> usize {
    match ch {
        '\\' => 1 + rest[1..].chars().next().map_or(0, char::len_utf8),
        '`' => fenced_span(rest, "`").map_or_else(|| tag_run(rest, "`"), |(len, _)| len),
        _ => ch.len_utf8(),
    }
}

/// Drops HTML tags. With `breaks`, `</p>` and `<br>` end a paragraph.
pub fn strip_tags(text: &str, breaks: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut index = 0;
    while let Some(ch) = text[index..].chars().next() {
        let rest = &text[index..];
        if ch == '<'
            && let Some(caps) = HTML_TAG_RE.captures(rest)
            && let (Some(whole), Some(name)) = (caps.get(0), caps.get(1))
        {
            let name = name.as_str().to_ascii_lowercase();
            let closing = whole.as_str().starts_with("</");
            if breaks && (name == "br" || (name == "p" && closing)) {
                out.push_str("\n\n");
            }
            index += whole.end();
            continue;
        }
        let len = passed_over(rest, ch);
        out.push_str(&rest[..len]);
        index += len;
    }
    out
}

/// Strips tags from a region body, leaving fenced code untouched.
fn strip_body(body: &str) -> String {
    let mut lines = Vec::new();
    let mut fence: Option<usize> = None;
    for line in body.split('\n') {
        match fence {
            Some(open) => {
                if fence_closes(line, open) {
                    fence = None;
                }
                lines.push(line.to_string());
            }
            None => match fence_open(line) {
                Some(open) => {
                    fence = Some(open);
                    lines.push(line.to_string());
                }
                None => lines.push(strip_tags(line, true)),
            },
        }
    }
    lines.join("\n")
}

/// Turns placeholder paragraphs back into containers. A placeholder that
/// landed somewhere a container cannot live (inside a list item, say) keeps
/// only the title text.
pub fn restore(
    codec: &MarkdownCodec,
    doc: &mut Document,
    regions: &[CollapsibleRegion],
) -> Result<(), ModelError> {
    if regions.is_empty() {
        return Ok(());
    }
    let placeholders: Vec<(NodeKey, usize)> = doc
        .iter()
        .filter_map(|node| match node.kind() {
            NodeKind::Text { text, .. } => regions
                .iter()
                .position(|region| *text == region.placeholder)
                .map(|index| (node.key(), index)),
            _ => None,
        })
        .collect();

    for (text_key, index) in placeholders {
        let region = &regions[index];
        let paragraph = doc
            .parent(text_key)
            .filter(|parent| doc.node_type(*parent) == Some(NodeType::Paragraph))
            .filter(|parent| doc.children(*parent).len() == 1);
        let host = paragraph.and_then(|paragraph| doc.parent(paragraph));

        match (paragraph, host) {
            (Some(paragraph), Some(host))
                if doc
                    .node_type(host)
                    .is_some_and(|kind| kind.accepts_child(NodeType::CollapsibleContainer)) =>
            {
                let container = build_container(codec, doc, region)?;
                doc.replace(paragraph, container)?;
            }
            _ => doc.set_text(text_key, title_text(codec, region)?)?,
        }
    }
    Ok(())
}

fn build_container(
    codec: &MarkdownCodec,
    doc: &mut Document,
    region: &CollapsibleRegion,
) -> Result<NodeKey, ModelError> {
    let container = doc.create_node(NodeKind::CollapsibleContainer {
        is_open: region.is_open,
    })?;
    let Some((title, content)) = doc.collapsible_parts(container) else {
        return Err(ModelError::CollapsibleStructure(
            "container created without title and content",
        ));
    };
    let filled = codec
        .attach_inline(doc, title, &region.title)
        .and_then(|()| {
            let lines: Vec<&str> = region.body.lines().collect();
            codec.import_blocks(&lines, doc, content)
        });
    if let Err(err) = filled {
        let _ = doc.remove(container);
        return Err(err);
    }
    Ok(container)
}

fn title_text(codec: &MarkdownCodec, region: &CollapsibleRegion) -> Result<String, ModelError> {
    let mut scratch = Document::new();
    let root = scratch.root();
    let paragraph = scratch.append_new(root, NodeKind::Paragraph)?;
    codec.attach_inline(&mut scratch, paragraph, &region.title)?;
    Ok(scratch.text_content(paragraph))
}

/// Renders a container back to `<details>` markup. The title is inline
/// markdown; body blocks use their own transformers.
pub(crate) fn export_collapsible(
    codec: &MarkdownCodec,
    doc: &Document,
    key: NodeKey,
) -> Option<String> {
    let NodeKind::CollapsibleContainer { is_open } = doc.kind(key)? else {
        return None;
    };
    let (title, content) = doc.collapsible_parts(key)?;
    let body: Vec<String> = doc
        .children(content)
        .iter()
        .map(|block| codec.export_block(doc, *block))
        .collect();
    Some(format!(
        "<details{}><summary>{}</summary>{}</details>",
        if *is_open { " open" } else { "" },
        codec.export_inline(doc, title),
        body.join("\n\n"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_regions() {
        let source = "Intro\n<details open><summary>**Bold** <em>title</em></summary>\n\nfirst\n\n<p>second</p></details>\nOutro";
        let (text, regions) = extract(source);
        assert_eq!(regions.len(), 1);
        let region = &regions[0];
        assert_eq!(text, format!("Intro\n\n\n{}\n\n\nOutro", region.placeholder));
        assert!(region.is_open);
        assert_eq!(region.title, "**Bold** title");
        assert_eq!(region.body.trim(), "first\n\nsecond");
    }

    #[test]
    fn test_extract_closed_and_multiple() {
        let (text, regions) = extract(
            "<details><summary>A</summary>a</details><details><summary>B</summary></details>",
        );
        assert_eq!(regions.len(), 2);
        assert_ne!(regions[0].placeholder, regions[1].placeholder);
        assert!(text.contains(&regions[0].placeholder));
        assert!(text.contains(&regions[1].placeholder));
        assert!(!regions[0].is_open);
        assert_eq!(regions[1].title, "B");
        assert!(regions[1].body.is_empty());
    }

    #[test]
    fn test_extract_skips_code_and_escapes() {
        let source = "`<details><summary>A</summary></details>` \\<details><summary>B</summary></details>";
        let (text, regions) = extract(source);
        assert!(regions.is_empty());
        assert_eq!(text, source);
    }

    #[test]
    fn test_restore_falls_back_to_title() {
        let codec = MarkdownCodec::new();
        let mut doc = Document::new();
        let root = doc.root();
        let list = doc
            .append_new(root, NodeKind::list(crate::model::ListType::Bullet))
            .unwrap();
        let item = doc
            .append_new(list, NodeKind::ListItem { checked: None })
            .unwrap();
        let region = CollapsibleRegion {
            placeholder: "COLLAPSIBLE-test".to_string(),
            is_open: false,
            title: "**Title** &amp; more".to_string(),
            body: String::new(),
        };
        let text = doc
            .append_new(item, NodeKind::text(region.placeholder.clone()))
            .unwrap();
        restore(&codec, &mut doc, &[region]).unwrap();
        assert_eq!(doc.text_content(text), "Title & more");
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(
            strip_tags("a <b>b</b> `<i>` \\<c> x<br>y", true),
            "a b `<i>` \\<c> x\n\ny"
        );
        assert_eq!(strip_tags("<p>one</p>two", false), "onetwo");
    }
}
