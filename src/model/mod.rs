//! Document model: an arena-backed node tree with a single immutable root.
//!
//! Nodes are addressed by [`NodeKey`]. Every node records its parent key and
//! owns an ordered list of child keys. All consumers walk the tree in the same
//! deterministic pre-order (see [`Document::iter`]), which keeps serialized
//! output stable for identical trees.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub mod carousel;
pub mod node;
pub mod selection;

pub use carousel::{Carousel, CarouselImage};
pub use node::{ListType, Node, NodeKey, NodeKind, NodeType, TextFormat};
pub use selection::TextSelection;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("node {0} not found")]
    NodeNotFound(NodeKey),
    #[error("node {0} is not attached to a parent")]
    Detached(NodeKey),
    #[error("the root node cannot be moved, replaced or removed")]
    RootImmutable,
    #[error("{parent} cannot contain {child}")]
    InvalidChild { parent: NodeType, child: NodeType },
    #[error("collapsible structure violated: {0}")]
    CollapsibleStructure(&'static str),
    #[error("operation would create a cycle")]
    WouldCreateCycle,
    #[error("index out of bounds")]
    IndexOutOfBounds,
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),
    #[error("node {0} is not a text node")]
    NotAText(NodeKey),
    #[error("carousel image {0} not found")]
    CarouselImageNotFound(String),
}

const COLLAPSIBLE_FIXED: &str = "a collapsible container owns exactly a title and a content node";

#[derive(Debug, Clone)]
pub struct Document {
    root: NodeKey,
    nodes: HashMap<NodeKey, Node>,
}

impl Document {
    pub fn new() -> Self {
        let root = Node::new(NodeKind::Root);
        let key = root.key;
        let mut nodes = HashMap::new();
        nodes.insert(key, root);
        Self { root: key, nodes }
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(&key)
    }

    pub fn kind(&self, key: NodeKey) -> Option<&NodeKind> {
        self.nodes.get(&key).map(|node| node.kind())
    }

    pub fn node_type(&self, key: NodeKey) -> Option<NodeType> {
        self.nodes.get(&key).map(Node::node_type)
    }

    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes
            .get(&key)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(&key).and_then(|node| node.parent)
    }

    pub fn index_in_parent(&self, key: NodeKey) -> Option<usize> {
        let parent = self.parent(key)?;
        self.children(parent).iter().position(|child| *child == key)
    }

    pub fn is_empty(&self) -> bool {
        self.children(self.root).is_empty()
    }

    /// True when `key` is reachable from the root.
    pub fn is_attached(&self, key: NodeKey) -> bool {
        let mut current = key;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Shared handle on a node's current attributes.
    pub fn snapshot(&self, key: NodeKey) -> Option<Arc<NodeKind>> {
        self.nodes.get(&key).map(Node::snapshot)
    }

    /// Creates a detached node. A collapsible container is created together
    /// with its title and content children.
    ///
    /// A detached node stays in the arena until it is attached, removed or
    /// dropped by [`Document::sweep_detached`].
    pub fn create_node(&mut self, kind: NodeKind) -> Result<NodeKey, ModelError> {
        if matches!(kind, NodeKind::Root) {
            return Err(ModelError::InvalidAttribute(
                "a document has exactly one root".to_string(),
            ));
        }
        kind.validate().map_err(ModelError::InvalidAttribute)?;

        let is_container = matches!(kind, NodeKind::CollapsibleContainer { .. });
        let node = Node::new(kind);
        let key = node.key;
        self.nodes.insert(key, node);

        if is_container {
            for part in [NodeKind::CollapsibleTitle, NodeKind::CollapsibleContent] {
                let mut child = Node::new(part);
                child.parent = Some(key);
                let child_key = child.key;
                self.nodes.insert(child_key, child);
                self.get_mut(key)?.children.push(child_key);
            }
        }
        Ok(key)
    }

    /// Title and content keys of a collapsible container.
    pub fn collapsible_parts(&self, container: NodeKey) -> Option<(NodeKey, NodeKey)> {
        match (self.node_type(container)?, self.children(container)) {
            (NodeType::CollapsibleContainer, [title, content]) => Some((*title, *content)),
            _ => None,
        }
    }

    /// Places `child` at `index` under `parent`, moving it if it is attached
    /// elsewhere.
    pub fn insert(
        &mut self,
        parent: NodeKey,
        index: usize,
        child: NodeKey,
    ) -> Result<(), ModelError> {
        if child == self.root {
            return Err(ModelError::RootImmutable);
        }
        let parent_type = self.get(parent)?.node_type();
        let child_type = self.get(child)?.node_type();
        if parent_type == NodeType::CollapsibleContainer {
            return Err(ModelError::CollapsibleStructure(COLLAPSIBLE_FIXED));
        }
        if !parent_type.accepts_child(child_type) {
            return Err(ModelError::InvalidChild {
                parent: parent_type,
                child: child_type,
            });
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(ModelError::WouldCreateCycle);
        }
        self.ensure_detachable(child)?;

        let mut available = self.children(parent).len();
        if self.parent(child) == Some(parent) {
            available -= 1;
        }
        if index > available {
            return Err(ModelError::IndexOutOfBounds);
        }

        self.detach(child);
        self.get_mut(parent)?.children.insert(index, child);
        self.get_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn append(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), ModelError> {
        let mut index = self.get(parent)?.children.len();
        if self.parent(child) == Some(parent) {
            index -= 1;
        }
        self.insert(parent, index, child)
    }

    /// Creates a node and appends it to `parent` in one step.
    pub fn append_new(&mut self, parent: NodeKey, kind: NodeKind) -> Result<NodeKey, ModelError> {
        let key = self.create_node(kind)?;
        if let Err(err) = self.append(parent, key) {
            self.drop_subtree(key);
            return Err(err);
        }
        Ok(key)
    }

    /// Removes a node together with its whole subtree.
    pub fn remove(&mut self, key: NodeKey) -> Result<(), ModelError> {
        if key == self.root {
            return Err(ModelError::RootImmutable);
        }
        self.get(key)?;
        self.ensure_detachable(key)?;
        self.detach(key);
        self.drop_subtree(key);
        Ok(())
    }

    /// Puts `new` where `old` is and drops `old` with its subtree.
    pub fn replace(&mut self, old: NodeKey, new: NodeKey) -> Result<(), ModelError> {
        if old == self.root || new == self.root {
            return Err(ModelError::RootImmutable);
        }
        if old == new {
            return Ok(());
        }
        let old_type = self.get(old)?.node_type();
        let new_type = self.get(new)?.node_type();
        let parent = self.parent(old).ok_or(ModelError::Detached(old))?;
        let parent_type = self.get(parent)?.node_type();

        if parent_type == NodeType::CollapsibleContainer {
            if old_type != new_type {
                return Err(ModelError::CollapsibleStructure(
                    "title and content can only be replaced by the same kind",
                ));
            }
        } else if !parent_type.accepts_child(new_type) {
            return Err(ModelError::InvalidChild {
                parent: parent_type,
                child: new_type,
            });
        }
        if self.is_ancestor(new, old) {
            return Err(ModelError::WouldCreateCycle);
        }
        self.ensure_detachable(new)?;

        self.detach(new);
        let index = self
            .index_in_parent(old)
            .ok_or(ModelError::Detached(old))?;
        self.get_mut(parent)?.children[index] = new;
        self.get_mut(new)?.parent = Some(parent);
        self.get_mut(old)?.parent = None;
        self.drop_subtree(old);
        Ok(())
    }

    /// Deep copy of a subtree with fresh keys. The copy is detached.
    pub fn clone_subtree(&mut self, key: NodeKey) -> Result<NodeKey, ModelError> {
        let entries = Self::subtree_entries(self, key)?;
        self.insert_copies(key, entries)
    }

    /// Deep copy of a subtree from another document into this one, detached.
    pub fn import_subtree(
        &mut self,
        source: &Document,
        key: NodeKey,
    ) -> Result<NodeKey, ModelError> {
        let entries = Self::subtree_entries(source, key)?;
        self.insert_copies(key, entries)
    }

    /// Pre-order list of `(key, parent, attributes)` for the subtree at `key`.
    fn subtree_entries(
        source: &Document,
        key: NodeKey,
    ) -> Result<Vec<(NodeKey, Option<NodeKey>, Arc<NodeKind>)>, ModelError> {
        if source.get(key)?.node_type() == NodeType::Root {
            return Err(ModelError::RootImmutable);
        }
        Ok(source
            .descendants(key)
            .map(|node| (node.key, node.parent, node.snapshot()))
            .collect())
    }

    /// Inserts fresh nodes for `entries`. Parents precede their children and
    /// siblings arrive in order, so appending rebuilds the same shape.
    fn insert_copies(
        &mut self,
        key: NodeKey,
        entries: Vec<(NodeKey, Option<NodeKey>, Arc<NodeKind>)>,
    ) -> Result<NodeKey, ModelError> {
        let mut fresh: HashMap<NodeKey, NodeKey> = HashMap::with_capacity(entries.len());
        for (original, parent, kind) in entries {
            let copy = Node::from_snapshot(kind);
            let copy_key = copy.key;
            self.nodes.insert(copy_key, copy);
            if original != key
                && let Some(parent_copy) = parent.and_then(|parent| fresh.get(&parent).copied())
            {
                self.get_mut(copy_key)?.parent = Some(parent_copy);
                self.get_mut(parent_copy)?.children.push(copy_key);
            }
            fresh.insert(original, copy_key);
        }
        fresh.get(&key).copied().ok_or(ModelError::NodeNotFound(key))
    }

    /// Mutates a node's attributes in place. The write is copy-on-write so
    /// snapshots handed out earlier keep the old attributes. The update is
    /// rolled back if it changes the node's kind or leaves invalid attributes.
    pub fn update<R>(
        &mut self,
        key: NodeKey,
        f: impl FnOnce(&mut NodeKind) -> R,
    ) -> Result<R, ModelError> {
        let node = self.get_mut(key)?;
        let before = Arc::clone(&node.kind);
        let result = f(Arc::make_mut(&mut node.kind));
        if node.kind.node_type() != before.node_type() {
            node.kind = before;
            return Err(ModelError::InvalidAttribute(
                "an update cannot change the node kind".to_string(),
            ));
        }
        if let Err(reason) = node.kind.validate() {
            node.kind = before;
            return Err(ModelError::InvalidAttribute(reason));
        }
        Ok(result)
    }

    /// Runs `f` against a copy of a carousel's image list and commits the
    /// copy only if `f` succeeds.
    pub fn update_carousel<R>(
        &mut self,
        key: NodeKey,
        f: impl FnOnce(&mut Carousel) -> Result<R, ModelError>,
    ) -> Result<R, ModelError> {
        let node = self.get_mut(key)?;
        let NodeKind::Carousel(carousel) = node.kind.as_ref() else {
            return Err(ModelError::InvalidAttribute(format!(
                "{} is not a carousel",
                node.node_type()
            )));
        };
        let mut working = carousel.clone();
        let result = f(&mut working)?;
        node.kind = Arc::new(NodeKind::Carousel(working));
        Ok(result)
    }

    pub fn set_text(&mut self, key: NodeKey, value: impl Into<String>) -> Result<(), ModelError> {
        let value = value.into();
        let updated = self.update(key, |kind| match kind {
            NodeKind::Text { text, .. } => {
                *text = value;
                true
            }
            _ => false,
        })?;
        if updated {
            Ok(())
        } else {
            Err(ModelError::NotAText(key))
        }
    }

    /// Pre-order walk over everything reachable from the root.
    pub fn iter(&self) -> PreOrder<'_> {
        self.descendants(self.root)
    }

    /// Pre-order walk starting at (and including) `key`.
    pub fn descendants(&self, key: NodeKey) -> PreOrder<'_> {
        PreOrder {
            doc: self,
            stack: vec![key],
        }
    }

    /// Concatenated text of a subtree. Hashtags contribute `#tag`.
    pub fn text_content(&self, key: NodeKey) -> String {
        let mut out = String::new();
        for node in self.descendants(key) {
            match node.kind() {
                NodeKind::Text { text, .. } => out.push_str(text),
                NodeKind::Hashtag { tag } => {
                    out.push('#');
                    out.push_str(tag);
                }
                _ => {}
            }
        }
        out
    }

    /// Number of nodes reachable from the root, the root included.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Number of nodes held in the arena, detached ones included.
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    /// Drops every node that is not reachable from the root and returns how
    /// many were dropped. Keys of dropped nodes stop resolving.
    pub fn sweep_detached(&mut self) -> usize {
        let reachable: HashSet<NodeKey> = self.iter().map(Node::key).collect();
        let before = self.nodes.len();
        self.nodes.retain(|key, _| reachable.contains(key));
        let dropped = before - self.nodes.len();
        if dropped > 0 {
            tracing::debug!(dropped, "swept detached nodes");
        }
        dropped
    }

    /// Merges adjacent text siblings sharing a format and drops empty text
    /// nodes.
    pub fn normalize(&mut self) {
        let parents: Vec<NodeKey> = self
            .iter()
            .filter(|node| !node.children.is_empty())
            .map(Node::key)
            .collect();
        for parent in parents {
            self.normalize_children(parent);
        }
    }

    /// Compares two trees while ignoring node keys, carousel image ids and
    /// how text is split across adjacent nodes.
    pub fn structurally_eq(&self, other: &Document) -> bool {
        self.shape(self.root) == other.shape(other.root)
    }

    /// Key-free outline of a subtree.
    pub fn shape(&self, key: NodeKey) -> Shape {
        let kind = self
            .kind(key)
            .cloned()
            .unwrap_or(NodeKind::Root);
        let mut children: Vec<Shape> = Vec::new();
        for child in self.children(key) {
            let shape = self.shape(*child);
            if let NodeKind::Text { text, format } = &shape.kind {
                if text.is_empty() {
                    continue;
                }
                if let Some(Shape {
                    kind:
                        NodeKind::Text {
                            text: prev_text,
                            format: prev_format,
                        },
                    ..
                }) = children.last_mut()
                    && prev_format == format
                {
                    prev_text.push_str(text);
                    continue;
                }
            }
            children.push(shape);
        }
        Shape { kind, children }
    }

    fn normalize_children(&mut self, parent: NodeKey) {
        let children = self.children(parent).to_vec();
        let mut previous: Option<(NodeKey, TextFormat)> = None;
        for child in children {
            let Some(NodeKind::Text { text, format }) = self.kind(child).cloned() else {
                previous = None;
                continue;
            };
            if text.is_empty() {
                self.detach(child);
                self.drop_subtree(child);
                continue;
            }
            match previous {
                Some((prev_key, prev_format)) if prev_format == format => {
                    let _ = self.update(prev_key, |kind| {
                        if let NodeKind::Text { text: prev, .. } = kind {
                            prev.push_str(&text);
                        }
                    });
                    self.detach(child);
                    self.drop_subtree(child);
                }
                _ => previous = Some((child, format)),
            }
        }
    }

    pub(crate) fn get(&self, key: NodeKey) -> Result<&Node, ModelError> {
        self.nodes.get(&key).ok_or(ModelError::NodeNotFound(key))
    }

    fn get_mut(&mut self, key: NodeKey) -> Result<&mut Node, ModelError> {
        self.nodes.get_mut(&key).ok_or(ModelError::NodeNotFound(key))
    }

    /// True when `ancestor` lies on the parent chain of `key`.
    fn is_ancestor(&self, ancestor: NodeKey, key: NodeKey) -> bool {
        let mut current = self.parent(key);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent(parent);
        }
        false
    }

    fn ensure_detachable(&self, key: NodeKey) -> Result<(), ModelError> {
        match self.parent(key).and_then(|parent| self.node_type(parent)) {
            Some(NodeType::CollapsibleContainer) => {
                Err(ModelError::CollapsibleStructure(COLLAPSIBLE_FIXED))
            }
            _ => Ok(()),
        }
    }

    fn detach(&mut self, key: NodeKey) {
        let Some(parent) = self.parent(key) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.retain(|child| *child != key);
        }
        if let Some(node) = self.nodes.get_mut(&key) {
            node.parent = None;
        }
    }

    fn drop_subtree(&mut self, key: NodeKey) {
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PreOrder<'a> {
    doc: &'a Document,
    stack: Vec<NodeKey>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let key = self.stack.pop()?;
            if let Some(node) = self.doc.nodes.get(&key) {
                self.stack.extend(node.children.iter().rev());
                return Some(node);
            }
        }
    }
}

/// Key-free outline of a node and its descendants.
#[derive(Debug, Clone)]
pub struct Shape {
    pub kind: NodeKind,
    pub children: Vec<Shape>,
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        let same_kind = match (&self.kind, &other.kind) {
            (NodeKind::Carousel(a), NodeKind::Carousel(b)) => a.same_content(b),
            (a, b) => a == b,
        };
        same_kind && self.children == other.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(doc: &mut Document, text: &str) -> NodeKey {
        let root = doc.root();
        let para = doc.append_new(root, NodeKind::Paragraph).unwrap();
        doc.append_new(para, NodeKind::text(text)).unwrap();
        para
    }

    #[test]
    fn test_root_is_immutable() {
        let mut doc = Document::new();
        let root = doc.root();
        assert_eq!(doc.remove(root), Err(ModelError::RootImmutable));
        let para = doc.create_node(NodeKind::Paragraph).unwrap();
        assert_eq!(doc.replace(root, para), Err(ModelError::RootImmutable));
        assert!(doc.create_node(NodeKind::Root).is_err());
    }

    #[test]
    fn test_pre_order_is_document_order() {
        let mut doc = Document::new();
        paragraph(&mut doc, "one");
        paragraph(&mut doc, "two");
        let texts: Vec<String> = doc
            .iter()
            .filter_map(|node| match node.kind() {
                NodeKind::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(doc.len(), 5);
    }

    #[test]
    fn test_insert_rejects_invalid_children() {
        let mut doc = Document::new();
        let root = doc.root();
        let text = doc.create_node(NodeKind::text("loose")).unwrap();
        assert_eq!(
            doc.append(root, text),
            Err(ModelError::InvalidChild {
                parent: NodeType::Root,
                child: NodeType::Text,
            })
        );
        let image = doc
            .append_new(root, NodeKind::Paragraph)
            .and_then(|para| doc.append_new(para, NodeKind::image("https://x/a.png", "")))
            .unwrap();
        let more = doc.create_node(NodeKind::text("x")).unwrap();
        assert!(matches!(
            doc.append(image, more),
            Err(ModelError::InvalidChild { .. })
        ));
    }

    #[test]
    fn test_insert_moves_and_rejects_cycles() {
        let mut doc = Document::new();
        let root = doc.root();
        let outer = doc.append_new(root, NodeKind::list(ListType::Bullet)).unwrap();
        let item = doc
            .append_new(outer, NodeKind::ListItem { checked: None })
            .unwrap();
        let inner = doc.append_new(item, NodeKind::list(ListType::Bullet)).unwrap();
        let inner_item = doc
            .append_new(inner, NodeKind::ListItem { checked: None })
            .unwrap();
        assert_eq!(
            doc.append(inner_item, outer),
            Err(ModelError::WouldCreateCycle)
        );

        let second = doc
            .append_new(outer, NodeKind::ListItem { checked: None })
            .unwrap();
        doc.insert(outer, 0, second).unwrap();
        assert_eq!(doc.children(outer), &[second, item]);
        assert_eq!(doc.insert(outer, 5, second), Err(ModelError::IndexOutOfBounds));
    }

    #[test]
    fn test_collapsible_shape_is_fixed() {
        let mut doc = Document::new();
        let root = doc.root();
        let container = doc
            .append_new(root, NodeKind::CollapsibleContainer { is_open: true })
            .unwrap();
        let (title, content) = doc.collapsible_parts(container).unwrap();
        assert_eq!(doc.node_type(title), Some(NodeType::CollapsibleTitle));
        assert_eq!(doc.node_type(content), Some(NodeType::CollapsibleContent));

        assert!(matches!(
            doc.remove(title),
            Err(ModelError::CollapsibleStructure(_))
        ));
        let extra = doc.create_node(NodeKind::CollapsibleContent).unwrap();
        assert!(matches!(
            doc.append(container, extra),
            Err(ModelError::CollapsibleStructure(_))
        ));
        let para = doc.create_node(NodeKind::Paragraph).unwrap();
        assert!(matches!(
            doc.replace(content, para),
            Err(ModelError::CollapsibleStructure(_))
        ));
        assert!(matches!(
            doc.append(root, title),
            Err(ModelError::InvalidChild { .. })
        ));

        // Same-kind replacement keeps the shape intact.
        let body = doc.create_node(NodeKind::CollapsibleContent).unwrap();
        doc.replace(content, body).unwrap();
        assert_eq!(doc.collapsible_parts(container), Some((title, body)));
    }

    #[test]
    fn test_remove_drops_subtree() {
        let mut doc = Document::new();
        let para = paragraph(&mut doc, "gone");
        let text = doc.children(para)[0];
        doc.remove(para).unwrap();
        assert!(doc.node(para).is_none());
        assert!(doc.node(text).is_none());
        assert!(doc.is_empty());
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut doc = Document::new();
        let first = paragraph(&mut doc, "a");
        let second = paragraph(&mut doc, "b");
        let rule = doc.create_node(NodeKind::HorizontalRule).unwrap();
        doc.replace(first, rule).unwrap();
        assert_eq!(doc.children(doc.root()), &[rule, second]);
        assert!(doc.node(first).is_none());
    }

    #[test]
    fn test_clone_subtree_assigns_fresh_keys() {
        let mut doc = Document::new();
        let para = paragraph(&mut doc, "copy me");
        let copy = doc.clone_subtree(para).unwrap();
        assert_ne!(copy, para);
        assert_eq!(doc.parent(copy), None);
        assert_eq!(doc.text_content(copy), "copy me");
        assert_ne!(doc.children(copy)[0], doc.children(para)[0]);
    }

    #[test]
    fn test_clone_subtree_leaves_source_untouched() {
        let mut doc = Document::new();
        let root = doc.root();
        let container = doc
            .append_new(root, NodeKind::CollapsibleContainer { is_open: true })
            .unwrap();
        let (title, content) = doc.collapsible_parts(container).unwrap();
        doc.append_new(title, NodeKind::text("Title")).unwrap();
        let inner = doc.append_new(content, NodeKind::Paragraph).unwrap();
        doc.append_new(inner, NodeKind::text("one")).unwrap();
        doc.append_new(inner, NodeKind::formatted("two", TextFormat::BOLD))
            .unwrap();
        let before = doc.shape(root);
        let reachable = doc.len();

        let copy = doc.clone_subtree(container).unwrap();
        assert_eq!(doc.shape(root), before);
        assert_eq!(doc.len(), reachable);
        assert_eq!(doc.arena_len(), reachable + 7);
        let (copy_title, copy_content) = doc.collapsible_parts(copy).unwrap();
        assert_eq!(doc.text_content(copy_title), "Title");
        let copy_inner = doc.children(copy_content)[0];
        assert_eq!(doc.text_content(copy_inner), "onetwo");
        assert_eq!(doc.parent(copy_inner), Some(copy_content));
    }

    #[test]
    fn test_sweep_detached_drops_unreachable_nodes() {
        let mut doc = Document::new();
        paragraph(&mut doc, "kept");
        let reachable = doc.len();
        let stray = doc.create_node(NodeKind::Paragraph).unwrap();
        doc.append_new(stray, NodeKind::text("lost")).unwrap();
        assert_eq!(doc.arena_len(), reachable + 2);

        assert_eq!(doc.sweep_detached(), 2);
        assert_eq!(doc.arena_len(), reachable);
        assert_eq!(doc.len(), reachable);
        assert!(doc.kind(stray).is_none());
        assert_eq!(doc.sweep_detached(), 0);
    }

    #[test]
    fn test_update_is_copy_on_write() {
        let mut doc = Document::new();
        let para = paragraph(&mut doc, "before");
        let text = doc.children(para)[0];
        let snapshot = doc.snapshot(text).unwrap();
        doc.set_text(text, "after").unwrap();
        assert_eq!(*snapshot, NodeKind::text("before"));
        assert_eq!(doc.kind(text), Some(&NodeKind::text("after")));
    }

    #[test]
    fn test_update_cannot_change_kind() {
        let mut doc = Document::new();
        let para = paragraph(&mut doc, "x");
        let result = doc.update(para, |kind| *kind = NodeKind::Quote);
        assert!(matches!(result, Err(ModelError::InvalidAttribute(_))));
        assert_eq!(doc.kind(para), Some(&NodeKind::Paragraph));

        let root = doc.root();
        let heading = doc.append_new(root, NodeKind::heading(2)).unwrap();
        let result = doc.update(heading, |kind| *kind = NodeKind::heading(9));
        assert!(result.is_err());
        assert_eq!(doc.kind(heading), Some(&NodeKind::heading(2)));
    }

    #[test]
    fn test_failed_carousel_update_leaves_node_untouched() {
        let mut doc = Document::new();
        let root = doc.root();
        let carousel = doc
            .append_new(root, NodeKind::Carousel(Carousel::new()))
            .unwrap();
        let id = doc
            .update_carousel(carousel, |c| Ok(c.add_url("https://x/a.png", "a")))
            .unwrap();
        let result = doc.update_carousel(carousel, |c| {
            c.set_alt(&id, "changed")?;
            c.remove("missing")
        });
        assert!(result.is_err());
        let NodeKind::Carousel(c) = doc.kind(carousel).unwrap() else {
            panic!("expected carousel");
        };
        assert_eq!(c.get(&id).unwrap().alt, "a");
    }

    #[test]
    fn test_normalize_merges_text_runs() {
        let mut doc = Document::new();
        let root = doc.root();
        let para = doc.append_new(root, NodeKind::Paragraph).unwrap();
        doc.append_new(para, NodeKind::text("a")).unwrap();
        doc.append_new(para, NodeKind::text("b")).unwrap();
        doc.append_new(para, NodeKind::text("")).unwrap();
        doc.append_new(para, NodeKind::formatted("c", TextFormat::BOLD))
            .unwrap();
        doc.normalize();
        assert_eq!(doc.children(para).len(), 2);
        assert_eq!(doc.text_content(para), "abc");
    }

    #[test]
    fn test_structural_equality_ignores_keys_and_splits() {
        let mut a = Document::new();
        paragraph(&mut a, "hello world");
        let mut b = Document::new();
        let root = b.root();
        let para = b.append_new(root, NodeKind::Paragraph).unwrap();
        b.append_new(para, NodeKind::text("hello ")).unwrap();
        b.append_new(para, NodeKind::text("world")).unwrap();
        assert!(a.structurally_eq(&b));
        b.append_new(para, NodeKind::formatted("!", TextFormat::BOLD))
            .unwrap();
        assert!(!a.structurally_eq(&b));
    }
}
