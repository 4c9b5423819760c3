//! Text selections and the insertion primitives paste strategies rely on.
//!
//! A selection lives inside a single text node and is measured in grapheme
//! clusters, so a caret can never land in the middle of a user-perceived
//! character.

use super::{Document, ModelError, NodeKey, NodeKind, NodeType};
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSelection {
    pub text: NodeKey,
    pub anchor: usize,
    pub focus: usize,
}

impl TextSelection {
    pub fn caret(text: NodeKey, offset: usize) -> Self {
        Self {
            text,
            anchor: offset,
            focus: offset,
        }
    }

    pub fn range(text: NodeKey, anchor: usize, focus: usize) -> Self {
        Self {
            text,
            anchor,
            focus,
        }
    }

    pub fn start(&self) -> usize {
        self.anchor.min(self.focus)
    }

    pub fn end(&self) -> usize {
        self.anchor.max(self.focus)
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

impl Document {
    /// Deletes the selected text and returns the collapsed caret left behind.
    pub fn delete_selection(
        &mut self,
        selection: TextSelection,
    ) -> Result<TextSelection, ModelError> {
        let text = self.text_of(selection.text)?;
        let start = grapheme_offset_to_byte(text, selection.start())
            .ok_or(ModelError::IndexOutOfBounds)?;
        let end = grapheme_offset_to_byte(text, selection.end())
            .ok_or(ModelError::IndexOutOfBounds)?;
        if start != end {
            let mut remaining = text.to_string();
            remaining.replace_range(start..end, "");
            self.set_text(selection.text, remaining)?;
        }
        Ok(TextSelection::caret(selection.text, selection.start()))
    }

    /// Inserts an inline node at the selection, replacing any selected text.
    pub fn insert_inline_at(
        &mut self,
        selection: TextSelection,
        node: NodeKey,
    ) -> Result<(), ModelError> {
        let caret = self.delete_selection(selection)?;
        let parent = self
            .parent(caret.text)
            .ok_or(ModelError::Detached(caret.text))?;
        let parent_type = self.get(parent)?.node_type();
        let node_type = self.get(node)?.node_type();
        if !parent_type.accepts_child(node_type) {
            return Err(ModelError::InvalidChild {
                parent: parent_type,
                child: node_type,
            });
        }
        let index = self.split_at_caret(caret)?;
        self.insert(parent, index, node)?;
        self.drop_empty_text(parent);
        Ok(())
    }

    /// Inserts block nodes at the selection. The block holding the caret is
    /// split around the insertion point, and halves left without content are
    /// removed. Without a selection the blocks are appended to the root.
    pub fn insert_blocks_at(
        &mut self,
        selection: Option<TextSelection>,
        blocks: &[NodeKey],
    ) -> Result<(), ModelError> {
        for block in blocks {
            let kind = self.get(*block)?.node_type();
            if !kind.is_block() {
                return Err(ModelError::InvalidChild {
                    parent: NodeType::Root,
                    child: kind,
                });
            }
        }
        let Some(selection) = selection else {
            let root = self.root();
            for block in blocks {
                self.append(root, *block)?;
            }
            return Ok(());
        };

        let caret = self.delete_selection(selection)?;
        let (container, block) = self.enclosing_block(caret.text)?;
        let mut insert_at = self
            .index_in_parent(block)
            .ok_or(ModelError::Detached(block))?
            + 1;

        let splittable = matches!(
            self.get(block)?.node_type(),
            NodeType::Paragraph | NodeType::Heading | NodeType::Quote
        ) && self.parent(caret.text) == Some(block);

        let mut halves = vec![block];
        if splittable {
            let split_index = self.split_at_caret(caret)?;
            let tail = self.children(block)[split_index..].to_vec();
            if !tail.is_empty() {
                let kind = self.get(block)?.kind().clone();
                let right = self.create_node(kind)?;
                self.insert(container, insert_at, right)?;
                for child in tail {
                    self.append(right, child)?;
                }
                halves.push(right);
            }
        }

        for block_key in blocks {
            self.insert(container, insert_at, *block_key)?;
            insert_at += 1;
        }

        if splittable {
            for half in halves {
                self.drop_empty_text(half);
                if self.children(half).is_empty() {
                    self.remove(half)?;
                }
            }
        }
        Ok(())
    }

    /// Splits the caret's text node and returns the child index at which new
    /// content goes.
    fn split_at_caret(&mut self, caret: TextSelection) -> Result<usize, ModelError> {
        let index = self
            .index_in_parent(caret.text)
            .ok_or(ModelError::Detached(caret.text))?;
        let text = self.text_of(caret.text)?.to_string();
        let byte = grapheme_offset_to_byte(&text, caret.start())
            .ok_or(ModelError::IndexOutOfBounds)?;
        if byte == 0 {
            return Ok(index);
        }
        if byte == text.len() {
            return Ok(index + 1);
        }
        let format = match self.kind(caret.text) {
            Some(NodeKind::Text { format, .. }) => *format,
            _ => return Err(ModelError::NotAText(caret.text)),
        };
        let (left, right) = text.split_at(byte);
        self.set_text(caret.text, left)?;
        let right_key = self.create_node(NodeKind::formatted(right, format))?;
        let parent = self.parent(caret.text).ok_or(ModelError::Detached(caret.text))?;
        self.insert(parent, index + 1, right_key)?;
        Ok(index + 1)
    }

    /// The nearest ancestor that sits directly in a block container, paired
    /// with that container.
    fn enclosing_block(&self, key: NodeKey) -> Result<(NodeKey, NodeKey), ModelError> {
        let mut current = key;
        loop {
            let parent = self.parent(current).ok_or(ModelError::Detached(current))?;
            match self.get(parent)?.node_type() {
                NodeType::Root | NodeType::CollapsibleContent => return Ok((parent, current)),
                _ => current = parent,
            }
        }
    }

    fn text_of(&self, key: NodeKey) -> Result<&str, ModelError> {
        match self.get(key)?.kind() {
            NodeKind::Text { text, .. } => Ok(text),
            _ => Err(ModelError::NotAText(key)),
        }
    }

    fn drop_empty_text(&mut self, parent: NodeKey) {
        let empty: Vec<NodeKey> = self
            .children(parent)
            .iter()
            .copied()
            .filter(|child| {
                matches!(self.kind(*child), Some(NodeKind::Text { text, .. }) if text.is_empty())
            })
            .collect();
        for child in empty {
            let _ = self.remove(child);
        }
    }
}

pub(crate) fn grapheme_offset_to_byte(text: &str, grapheme_offset: usize) -> Option<usize> {
    if grapheme_offset == 0 {
        return Some(0);
    }

    let mut count = 0;
    for (byte_index, _) in text.grapheme_indices(true) {
        if count == grapheme_offset {
            return Some(byte_index);
        }
        count += 1;
    }
    if count == grapheme_offset {
        Some(text.len())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::{VideoPlatform, VideoRef};

    fn doc_with_paragraph(text: &str) -> (Document, NodeKey, NodeKey) {
        let mut doc = Document::new();
        let root = doc.root();
        let para = doc.append_new(root, NodeKind::Paragraph).unwrap();
        let text = doc.append_new(para, NodeKind::text(text)).unwrap();
        (doc, para, text)
    }

    #[test]
    fn test_grapheme_offsets() {
        assert_eq!(grapheme_offset_to_byte("a🇺🇸b", 1), Some(1));
        assert_eq!(grapheme_offset_to_byte("a🇺🇸b", 2), Some(9));
        assert_eq!(grapheme_offset_to_byte("a🇺🇸b", 3), Some(10));
        assert_eq!(grapheme_offset_to_byte("a🇺🇸b", 4), None);
    }

    #[test]
    fn test_delete_selection_returns_caret() {
        let (mut doc, para, text) = doc_with_paragraph("hello world");
        let caret = doc
            .delete_selection(TextSelection::range(text, 11, 5))
            .unwrap();
        assert_eq!(caret, TextSelection::caret(text, 5));
        assert_eq!(doc.text_content(para), "hello");
    }

    #[test]
    fn test_inline_insert_splits_text() {
        let (mut doc, para, text) = doc_with_paragraph("before after");
        let image = doc
            .create_node(NodeKind::image("https://x/i.png", "i"))
            .unwrap();
        doc.insert_inline_at(TextSelection::caret(text, 7), image)
            .unwrap();
        let children = doc.children(para);
        assert_eq!(children.len(), 3);
        assert_eq!(children[1], image);
        assert_eq!(doc.text_content(children[0]), "before ");
        assert_eq!(doc.text_content(children[2]), "after");
    }

    #[test]
    fn test_block_insert_splits_paragraph() {
        let (mut doc, para, text) = doc_with_paragraph("left right");
        let video = doc
            .create_node(NodeKind::video(VideoRef::new(
                VideoPlatform::Youtube,
                "dQw4w9WgXcQ",
            )))
            .unwrap();
        doc.insert_blocks_at(Some(TextSelection::caret(text, 5)), &[video])
            .unwrap();
        let blocks = doc.children(doc.root()).to_vec();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], para);
        assert_eq!(doc.text_content(blocks[0]), "left ");
        assert_eq!(blocks[1], video);
        assert_eq!(doc.text_content(blocks[2]), "right");
    }

    #[test]
    fn test_block_insert_replaces_fully_selected_paragraph() {
        let (mut doc, _para, text) = doc_with_paragraph("all of it");
        let rule = doc.create_node(NodeKind::HorizontalRule).unwrap();
        doc.insert_blocks_at(Some(TextSelection::range(text, 0, 9)), &[rule])
            .unwrap();
        assert_eq!(doc.children(doc.root()), &[rule]);
    }

    #[test]
    fn test_block_insert_without_selection_appends() {
        let (mut doc, para, _text) = doc_with_paragraph("keep");
        let rule = doc.create_node(NodeKind::HorizontalRule).unwrap();
        doc.insert_blocks_at(None, &[rule]).unwrap();
        assert_eq!(doc.children(doc.root()), &[para, rule]);
    }
}
