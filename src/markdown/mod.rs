//! Markdown codec.
//!
//! A [`MarkdownCodec`] owns an ordered transformer list and converts between
//! a [`Document`] and markdown text. Import runs in three stages:
//!
//! 1. `<details>` regions are lifted out and replaced by placeholders
//!    (see [`collapsible`]).
//! 2. A line scanner asks each element transformer in registration order
//!    whether it starts at the current line; the first one that does consumes
//!    its lines. Inline text then goes through format and text-match
//!    transformers.
//! 3. Placeholders are swapped back for collapsible containers and the tree
//!    is normalized.
//!
//! Export walks the root's children in order and renders each block with the
//! first element transformer registered for its kind.

pub mod collapsible;
pub mod inline;
pub mod transformers;

use crate::model::{Document, ModelError, NodeKey, NodeKind, TextFormat};
use inline::{Inline, InlineLayout, ShortcutMatch};
use transformers::{ElementTransformer, TextFormatTransformer, TextMatchTransformer, Transformer};

pub use transformers::builtin_transformers;

#[derive(Debug, Clone)]
pub struct MarkdownCodec {
    elements: Vec<ElementTransformer>,
    text_matches: Vec<TextMatchTransformer>,
    formats: Vec<TextFormatTransformer>,
}

impl Default for MarkdownCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownCodec {
    /// Codec with the built-in transformer set.
    pub fn new() -> Self {
        Self::with_transformers(builtin_transformers())
    }

    pub fn with_transformers(transformers: impl IntoIterator<Item = Transformer>) -> Self {
        let mut codec = Self {
            elements: Vec::new(),
            text_matches: Vec::new(),
            formats: Vec::new(),
        };
        for transformer in transformers {
            codec.register(transformer);
        }
        codec
    }

    /// Appends a transformer. Earlier registrations win ties, so a custom
    /// transformer meant to take precedence belongs in
    /// [`MarkdownCodec::with_transformers`] ahead of the built-in list.
    pub fn register(&mut self, transformer: Transformer) {
        match transformer {
            Transformer::Element(element) => self.elements.push(element),
            Transformer::TextMatch(text_match) => self.text_matches.push(text_match),
            Transformer::TextFormat(format) => self.formats.push(format),
        }
    }

    pub fn element_transformers(&self) -> &[ElementTransformer] {
        &self.elements
    }

    pub fn text_match_transformers(&self) -> &[TextMatchTransformer] {
        &self.text_matches
    }

    pub fn format_transformers(&self) -> &[TextFormatTransformer] {
        &self.formats
    }

    pub fn to_markdown(&self, doc: &Document) -> String {
        doc.children(doc.root())
            .iter()
            .map(|block| self.export_block(doc, *block))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Renders one block-level node. Falls back to its plain text when no
    /// element transformer claims the kind.
    pub fn export_block(&self, doc: &Document, key: NodeKey) -> String {
        let Some(node_type) = doc.node_type(key) else {
            return String::new();
        };
        self.elements
            .iter()
            .filter(|transformer| transformer.kinds.contains(&node_type))
            .find_map(|transformer| (transformer.export)(self, doc, key))
            .unwrap_or_else(|| doc.text_content(key))
    }

    /// Renders the inline children of `key`. Block children are skipped; the
    /// caller owns their layout. Adjacent pieces are kept apart where their
    /// markdown would otherwise run together.
    pub fn export_inline(&self, doc: &Document, key: NodeKey) -> String {
        let layout = InlineLayout::for_node(doc, key);
        let mut pieces: Vec<Piece<'_>> = Vec::new();
        for child in doc.children(key) {
            match doc.kind(*child) {
                Some(NodeKind::Text { text, format }) if !text.is_empty() => {
                    if let Some(Piece::Text(last, last_format)) = pieces.last_mut()
                        && *last_format == *format
                    {
                        last.push_str(text);
                    } else {
                        pieces.push(Piece::Text(text.clone(), *format));
                    }
                }
                Some(kind)
                    if kind.node_type().is_inline() && !matches!(kind, NodeKind::Text { .. }) =>
                {
                    pieces.push(Piece::Node(*child, kind));
                }
                _ => {}
            }
        }

        let mut output = String::new();
        let mut after_tag = false;
        for piece in pieces {
            match piece {
                Piece::Text(text, format) => {
                    let mut rendered = inline::export_text(
                        &text,
                        format,
                        &self.formats,
                        layout == InlineLayout::Cell,
                    );
                    if after_tag
                        && let Some(first) = rendered.chars().next()
                        && first.is_alphanumeric()
                    {
                        rendered.replace_range(..first.len_utf8(), &inline::char_ref(first));
                    }
                    output.push_str(&rendered);
                    after_tag = false;
                }
                Piece::Node(child, kind) => {
                    let node_type = kind.node_type();
                    let rendered = self
                        .text_matches
                        .iter()
                        .filter(|transformer| transformer.kinds.contains(&node_type))
                        .find_map(|transformer| (transformer.export)(self, doc, child))
                        .unwrap_or_else(|| inline::escape_text(&doc.text_content(child)));
                    let is_tag = matches!(kind, NodeKind::Hashtag { .. });
                    if is_tag && !after_tag {
                        detach_last(&mut output, |ch| ch.is_alphanumeric() || ch == '&');
                    }
                    if rendered.starts_with('[')
                        && output.ends_with('!')
                        && !inline::is_escaped(&output, output.len() - 1)
                    {
                        output.insert(output.len() - 1, '\\');
                    }
                    output.push_str(&rendered);
                    after_tag = is_tag;
                }
            }
        }
        inline::guard_lines(&output, layout)
    }

    pub fn from_markdown(&self, text: &str) -> Result<Document, ModelError> {
        let mut doc = Document::new();
        let root = doc.root();
        self.import_into(text, &mut doc, root)?;
        Ok(doc)
    }

    /// Parses `text` and appends the resulting blocks under `parent`.
    pub fn import_into(
        &self,
        text: &str,
        doc: &mut Document,
        parent: NodeKey,
    ) -> Result<(), ModelError> {
        let (prepared, regions) = collapsible::extract(text);
        let lines: Vec<&str> = prepared.lines().collect();
        self.import_blocks(&lines, doc, parent)?;
        collapsible::restore(self, doc, &regions)?;
        doc.normalize();
        Ok(())
    }

    pub(crate) fn import_blocks(
        &self,
        lines: &[&str],
        doc: &mut Document,
        parent: NodeKey,
    ) -> Result<(), ModelError> {
        let mut index = 0;
        while index < lines.len() {
            let rest = &lines[index..];
            if rest[0].trim().is_empty() {
                index += 1;
                continue;
            }
            let found = self
                .elements
                .iter()
                .find(|transformer| (transformer.matches)(rest));
            let consumed = match found {
                Some(transformer) => (transformer.import)(self, rest, doc, parent)?,
                None => 0,
            };
            index += consumed.max(1);
        }
        Ok(())
    }

    /// True when a non-paragraph element transformer starts at `lines[0]`.
    pub(crate) fn interrupts_paragraph(&self, lines: &[&str]) -> bool {
        self.elements.iter().any(|transformer| {
            !transformer.kinds.contains(&crate::model::NodeType::Paragraph)
                && (transformer.matches)(lines)
        })
    }

    /// Parses `text` as inline content and appends it under `parent`.
    pub(crate) fn attach_inline(
        &self,
        doc: &mut Document,
        parent: NodeKey,
        text: &str,
    ) -> Result<(), ModelError> {
        for item in inline::parse_inline(self, text, TextFormat::PLAIN, false) {
            item.attach(doc, parent)?;
        }
        Ok(())
    }

    /// Parses a single line of inline markdown without touching a document.
    pub fn parse_inline(&self, text: &str, allow_blocks: bool) -> Vec<Inline> {
        inline::parse_inline(self, text, TextFormat::PLAIN, allow_blocks)
    }

    /// Checks whether typing `typed` after `before_caret` completes a
    /// text-match span, as a typing shortcut would.
    pub fn shortcut(
        &self,
        before_caret: &str,
        typed: char,
        format: TextFormat,
        allow_blocks: bool,
    ) -> Option<ShortcutMatch> {
        inline::match_shortcut(self, before_caret, typed, format, allow_blocks)
    }
}

enum Piece<'a> {
    Text(String, TextFormat),
    Node(NodeKey, &'a NodeKind),
}

/// Rewrites the last character of `output` as a character reference when it
/// matches `joins` and is not already escaped.
fn detach_last(output: &mut String, joins: impl Fn(char) -> bool) {
    let Some(last) = output.chars().next_back() else {
        return;
    };
    let at = output.len() - last.len_utf8();
    if joins(last) && !inline::is_escaped(output, at) {
        output.replace_range(at.., &inline::char_ref(last));
    }
}

/// [`MarkdownCodec::to_markdown`] with the built-in transformers.
pub fn to_markdown(doc: &Document) -> String {
    MarkdownCodec::new().to_markdown(doc)
}

/// [`MarkdownCodec::from_markdown`] with the built-in transformers.
pub fn from_markdown(text: &str) -> Result<Document, ModelError> {
    MarkdownCodec::new().from_markdown(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ListType, NodeType};
    use crate::video::VideoPlatform;

    fn block_types(doc: &Document) -> Vec<NodeType> {
        doc.children(doc.root())
            .iter()
            .filter_map(|key| doc.node_type(*key))
            .collect()
    }

    #[test]
    fn test_block_scanner() {
        let doc = from_markdown(
            "# Title\n\nSome *text* here\nand more\n\n> quoted\n\n---\n\n```rust\nfn main() {}\n```\n\n- a\n- b",
        )
        .unwrap();
        assert_eq!(
            block_types(&doc),
            vec![
                NodeType::Heading,
                NodeType::Paragraph,
                NodeType::Quote,
                NodeType::HorizontalRule,
                NodeType::CodeBlock,
                NodeType::List,
            ]
        );
        let paragraph = doc.children(doc.root())[1];
        assert_eq!(doc.text_content(paragraph), "Some text here\nand more");
        let code = doc.children(doc.root())[4];
        assert_eq!(
            doc.kind(code),
            Some(&NodeKind::CodeBlock {
                language: Some("rust".to_string())
            })
        );
        assert_eq!(doc.text_content(code), "fn main() {}");
    }

    #[test]
    fn test_list_interrupts_paragraph() {
        let doc = from_markdown("intro\n- one\n- two").unwrap();
        assert_eq!(block_types(&doc), vec![NodeType::Paragraph, NodeType::List]);
    }

    #[test]
    fn test_nested_list_round_trip() {
        let source = "1. one\n  - [x] done\n  - [ ] todo\n2. two";
        let doc = from_markdown(source).unwrap();
        let list = doc.children(doc.root())[0];
        assert_eq!(
            doc.kind(list),
            Some(&NodeKind::List {
                list_type: ListType::Number,
                start: 1
            })
        );
        let first_item = doc.children(list)[0];
        let nested = doc.children(first_item)[1];
        assert_eq!(
            doc.kind(nested),
            Some(&NodeKind::List {
                list_type: ListType::Check,
                start: 1
            })
        );
        assert_eq!(to_markdown(&doc), source);
    }

    #[test]
    fn test_table_round_trip() {
        let source = "| Name | Qty |\n| --- | --- |\n| apple | 3 |";
        let doc = from_markdown(source).unwrap();
        let table = doc.children(doc.root())[0];
        assert_eq!(doc.node_type(table), Some(NodeType::Table));
        let header_cell = doc.children(doc.children(table)[0])[0];
        assert_eq!(
            doc.kind(header_cell),
            Some(&NodeKind::TableCell { header: true })
        );
        assert_eq!(to_markdown(&doc), source);
    }

    #[test]
    fn test_bare_video_url_becomes_block() {
        let doc = from_markdown("Watch https://youtu.be/dQw4w9WgXcQ now").unwrap();
        assert_eq!(
            block_types(&doc),
            vec![NodeType::Paragraph, NodeType::VideoEmbed, NodeType::Paragraph]
        );
        let video = doc.children(doc.root())[1];
        let video_ref = doc.kind(video).and_then(NodeKind::video_ref).unwrap();
        assert_eq!(video_ref.platform, VideoPlatform::Youtube);
        assert_eq!(video_ref.video_id, "dQw4w9WgXcQ");
        assert_eq!(doc.text_content(doc.children(doc.root())[0]), "Watch");
        assert_eq!(doc.text_content(doc.children(doc.root())[2]), "now");
        assert_eq!(
            to_markdown(&doc),
            "Watch\n\nhttps://www.youtube.com/watch?v=dQw4w9WgXcQ\n\nnow"
        );
    }

    #[test]
    fn test_video_inside_list_item_stays_link() {
        let doc = from_markdown("- https://youtu.be/dQw4w9WgXcQ").unwrap();
        let item = doc.children(doc.children(doc.root())[0])[0];
        assert_eq!(
            doc.node_type(doc.children(item)[0]),
            Some(NodeType::Link)
        );
    }

    #[test]
    fn test_collapsible_round_trip() {
        let doc = from_markdown("<details><summary>Title</summary>Body text</details>").unwrap();
        let container = doc.children(doc.root())[0];
        assert_eq!(
            doc.kind(container),
            Some(&NodeKind::CollapsibleContainer { is_open: false })
        );
        let (title, content) = doc.collapsible_parts(container).unwrap();
        assert_eq!(doc.text_content(title), "Title");
        assert_eq!(doc.children(content).len(), 1);
        assert_eq!(doc.text_content(doc.children(content)[0]), "Body text");
        assert_eq!(
            to_markdown(&doc),
            "<details><summary>Title</summary>Body text</details>"
        );
    }

    #[test]
    fn test_carousel_block() {
        let source = ":::carousel\n![one](https://x.dev/1.png)\n![](data:image/png;base64,AAAA)\n:::";
        let doc = from_markdown(source).unwrap();
        let NodeKind::Carousel(carousel) = doc.kind(doc.children(doc.root())[0]).unwrap() else {
            panic!("expected carousel");
        };
        assert_eq!(carousel.len(), 2);
        assert!(!carousel.images()[0].is_uploaded);
        assert!(carousel.images()[1].is_uploaded);
        assert_eq!(carousel.images()[1].size_bytes, 3);
        assert_eq!(to_markdown(&doc), source);
    }

    #[test]
    fn test_empty_input() {
        assert!(from_markdown("").unwrap().is_empty());
        assert!(from_markdown("\n\n  \n").unwrap().is_empty());
        assert_eq!(to_markdown(&Document::new()), "");
    }

    #[test]
    fn test_shortcut_via_codec() {
        let codec = MarkdownCodec::new();
        let found = codec
            .shortcut("see https://youtu.be/dQw4w9WgXcQ", ' ', TextFormat::PLAIN, true)
            .unwrap();
        assert_eq!(found.start, 4);
        assert!(matches!(found.inline, Inline::Block(NodeKind::VideoEmbed { .. })));
    }
}
