//! Node registry: a kind-indexed table of serialization and markup behavior.
//!
//! The registry is an explicit value handed to the editor at construction.
//! Nothing about it is process-wide, so two editors can run with different
//! sets of registered kinds.

use crate::markup::{self, Markup, MarkupElement};
use crate::model::{Document, ModelError, NodeKey, NodeKind, NodeType, TextFormat};
use serde_json::{Map, Value};
use std::collections::HashMap;

mod builtin;

pub type SerializeFn = fn(&NodeKind) -> Map<String, Value>;
pub type DeserializeFn = fn(&Map<String, Value>) -> Result<NodeKind, RegistryError>;
pub type ImportMarkupFn = fn(&MarkupElement) -> Option<NodeKind>;
pub type ExportMarkupFn = fn(&NodeKind) -> Markup;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown node kind `{0}`")]
    UnknownNodeKind(String),
    #[error("malformed node: {0}")]
    Malformed(String),
    #[error("persisted document has no root node")]
    MissingRoot,
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Behavior registered for one node kind.
///
/// `serialize` only produces the kind's own attributes; the `type` tag and
/// the `children` array are written by the registry.
#[derive(Debug, Clone, Copy)]
pub struct NodeBehavior {
    pub serialize: SerializeFn,
    pub deserialize: DeserializeFn,
    pub import_markup: ImportMarkupFn,
    pub export_markup: ExportMarkupFn,
}

#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    behaviors: HashMap<NodeType, NodeBehavior>,
}

impl NodeRegistry {
    /// An empty registry. Documents only load and save kinds registered here.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every kind this crate ships.
    pub fn with_builtin_kinds() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Installs `behavior` for `kind`, returning the behavior it replaced.
    pub fn register(&mut self, kind: NodeType, behavior: NodeBehavior) -> Option<NodeBehavior> {
        self.behaviors.insert(kind, behavior)
    }

    pub fn unregister(&mut self, kind: NodeType) -> Option<NodeBehavior> {
        self.behaviors.remove(&kind)
    }

    pub fn get(&self, kind: NodeType) -> Option<&NodeBehavior> {
        self.behaviors.get(&kind)
    }

    pub fn contains(&self, kind: NodeType) -> bool {
        self.behaviors.contains_key(&kind)
    }

    /// Registered kinds in declaration order.
    pub fn kinds(&self) -> Vec<NodeType> {
        NodeType::ALL
            .into_iter()
            .filter(|kind| self.contains(*kind))
            .collect()
    }

    fn behavior(&self, kind: NodeType) -> Result<&NodeBehavior, RegistryError> {
        self.get(kind)
            .ok_or_else(|| RegistryError::UnknownNodeKind(kind.tag().to_string()))
    }

    /// JSON form of one node and its subtree.
    pub fn serialize_node(&self, doc: &Document, key: NodeKey) -> Result<Value, RegistryError> {
        let kind = doc.kind(key).ok_or(ModelError::NodeNotFound(key))?;
        let node_type = kind.node_type();
        let mut object = if node_type == NodeType::Root {
            Map::new()
        } else {
            (self.behavior(node_type)?.serialize)(kind)
        };
        object.insert("type".to_string(), Value::from(node_type.tag()));
        if !node_type.is_leaf() {
            let children = doc
                .children(key)
                .iter()
                .map(|child| self.serialize_node(doc, *child))
                .collect::<Result<Vec<_>, _>>()?;
            object.insert("children".to_string(), Value::Array(children));
        }
        Ok(Value::Object(object))
    }

    /// `{"root": {...}}`, the persisted document form.
    pub fn serialize_document(&self, doc: &Document) -> Result<Value, RegistryError> {
        let mut object = Map::new();
        object.insert("root".to_string(), self.serialize_node(doc, doc.root())?);
        Ok(Value::Object(object))
    }

    pub fn to_persisted_string(&self, doc: &Document) -> Result<String, RegistryError> {
        Ok(serde_json::to_string(&self.serialize_document(doc)?)?)
    }

    /// Rebuilds a document from its persisted JSON form. Any node kind that
    /// is not registered fails the whole call; no partial document escapes.
    pub fn deserialize_document(&self, value: &Value) -> Result<Document, RegistryError> {
        let root = value.get("root").ok_or(RegistryError::MissingRoot)?;
        let object = root
            .as_object()
            .ok_or_else(|| RegistryError::Malformed("root is not an object".to_string()))?;
        if type_tag(object)? != NodeType::Root.tag() {
            return Err(RegistryError::MissingRoot);
        }
        let mut doc = Document::new();
        let doc_root = doc.root();
        self.load_children(&mut doc, doc_root, object)?;
        Ok(doc)
    }

    pub fn from_persisted_str(&self, input: &str) -> Result<Document, RegistryError> {
        let value: Value = serde_json::from_str(input)?;
        self.deserialize_document(&value)
    }

    fn load_children(
        &self,
        doc: &mut Document,
        parent: NodeKey,
        object: &Map<String, Value>,
    ) -> Result<(), RegistryError> {
        for child in children_of(object)? {
            let key = self.load_node(doc, child)?;
            doc.append(parent, key)?;
        }
        Ok(())
    }

    fn load_node(&self, doc: &mut Document, value: &Value) -> Result<NodeKey, RegistryError> {
        let object = value
            .as_object()
            .ok_or_else(|| RegistryError::Malformed("node is not an object".to_string()))?;
        let tag = type_tag(object)?;
        let node_type = NodeType::from_tag(tag)
            .filter(|kind| *kind != NodeType::Root)
            .ok_or_else(|| RegistryError::UnknownNodeKind(tag.to_string()))?;
        let behavior = self.behavior(node_type)?;
        let kind = (behavior.deserialize)(object)?;
        if kind.node_type() != node_type {
            return Err(RegistryError::Malformed(format!(
                "`{tag}` deserialized into {}",
                kind.node_type()
            )));
        }

        let key = doc.create_node(kind)?;
        if node_type == NodeType::CollapsibleContainer {
            let (title, content) = doc
                .collapsible_parts(key)
                .ok_or(ModelError::CollapsibleStructure("container without parts"))?;
            let parts = children_of(object)?;
            let [title_json, content_json] = parts else {
                return Err(RegistryError::Malformed(
                    "collapsible container needs exactly a title and a content child".to_string(),
                ));
            };
            for (part, expected, json) in [
                (title, NodeType::CollapsibleTitle, title_json),
                (content, NodeType::CollapsibleContent, content_json),
            ] {
                let part_object = json.as_object().ok_or_else(|| {
                    RegistryError::Malformed("collapsible part is not an object".to_string())
                })?;
                if type_tag(part_object)? != expected.tag() {
                    return Err(RegistryError::Malformed(format!(
                        "expected {expected} inside collapsible container"
                    )));
                }
                self.behavior(expected)?;
                self.load_children(doc, part, part_object)?;
            }
        } else if node_type.is_leaf() {
            if !children_of(object)?.is_empty() {
                return Err(RegistryError::Malformed(format!("{node_type} cannot have children")));
            }
        } else {
            self.load_children(doc, key, object)?;
        }
        Ok(key)
    }

    /// Markup for every top-level block of `doc`.
    pub fn export_markup(&self, doc: &Document) -> Result<Vec<Markup>, RegistryError> {
        doc.children(doc.root())
            .iter()
            .map(|child| self.export_node(doc, *child))
            .collect()
    }

    fn export_node(&self, doc: &Document, key: NodeKey) -> Result<Markup, RegistryError> {
        let kind = doc.kind(key).ok_or(ModelError::NodeNotFound(key))?;
        let mut markup = (self.behavior(kind.node_type())?.export_markup)(kind);
        if let Markup::Element(element) = &mut markup {
            for child in doc.children(key) {
                element.children.push(self.export_node(doc, *child)?);
            }
        }
        Ok(markup)
    }

    pub fn to_html(&self, doc: &Document) -> Result<String, RegistryError> {
        Ok(markup::render(&self.export_markup(doc)?))
    }

    /// Builds a document from a markup forest. Elements no registered kind
    /// claims are unwrapped, and loose inline content at block level is
    /// gathered into paragraphs.
    pub fn import_markup(&self, nodes: &[Markup]) -> Result<Document, RegistryError> {
        let mut doc = Document::new();
        let root = doc.root();
        let mut importer = MarkupImporter {
            registry: self,
            doc: &mut doc,
        };
        importer.import_into(root, nodes, TextFormat::PLAIN)?;
        doc.normalize();
        Ok(doc)
    }

    pub fn import_html(&self, html: &str) -> Result<Document, RegistryError> {
        self.import_markup(&markup::parse(html))
    }

    fn claim(&self, element: &MarkupElement) -> Option<NodeKind> {
        NodeType::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind))
            .find_map(|behavior| (behavior.import_markup)(element))
    }
}

struct MarkupImporter<'a> {
    registry: &'a NodeRegistry,
    doc: &'a mut Document,
}

impl MarkupImporter<'_> {
    fn import_into(
        &mut self,
        parent: NodeKey,
        nodes: &[Markup],
        format: TextFormat,
    ) -> Result<(), RegistryError> {
        for node in nodes {
            match node {
                Markup::Text(text) => {
                    let parent_type = self.node_type(parent)?;
                    if text.trim().is_empty() && parent_type.accepts_child(NodeType::Paragraph) {
                        continue;
                    }
                    if !self.registry.contains(NodeType::Text) {
                        return Err(RegistryError::UnknownNodeKind(NodeType::Text.tag().into()));
                    }
                    let key = self.doc.create_node(NodeKind::formatted(text.as_str(), format))?;
                    self.place(parent, key)?;
                }
                Markup::Element(element) => self.import_element(parent, element, format)?,
            }
        }
        Ok(())
    }

    fn import_element(
        &mut self,
        parent: NodeKey,
        element: &MarkupElement,
        format: TextFormat,
    ) -> Result<(), RegistryError> {
        if let Some(extra) = format_for_tag(&element.tag) {
            return self.import_into(parent, &element.children, format.with(extra));
        }
        let Some(kind) = self.registry.claim(element) else {
            return self.import_into(parent, &element.children, format);
        };
        let node_type = kind.node_type();
        if !self.fits(parent, node_type)? {
            return self.import_into(parent, &element.children, format);
        }

        let key = self.doc.create_node(kind)?;
        match node_type {
            NodeType::CollapsibleContainer => {
                let (title, content) = self
                    .doc
                    .collapsible_parts(key)
                    .ok_or(ModelError::CollapsibleStructure("container without parts"))?;
                for child in &element.children {
                    match child {
                        Markup::Element(summary) if summary.tag == "summary" => {
                            self.import_into(title, &summary.children, TextFormat::PLAIN)?;
                        }
                        other => {
                            let other = std::slice::from_ref(other);
                            self.import_into(content, other, TextFormat::PLAIN)?;
                        }
                    }
                }
            }
            NodeType::CodeBlock => {
                let code = element.text_content();
                if !code.is_empty() {
                    let text = self.doc.create_node(NodeKind::text(code))?;
                    self.doc.append(key, text)?;
                }
            }
            leaf if leaf.is_leaf() => {}
            _ => self.import_into(key, &element.children, format)?,
        }
        self.place(parent, key)
    }

    /// Whether a node of `child` type can end up under `parent`, directly or
    /// through a wrapping paragraph.
    fn fits(&self, parent: NodeKey, child: NodeType) -> Result<bool, RegistryError> {
        let parent_type = self.node_type(parent)?;
        Ok(parent_type.accepts_child(child)
            || (child.is_inline() && parent_type.accepts_child(NodeType::Paragraph)))
    }

    fn place(&mut self, parent: NodeKey, key: NodeKey) -> Result<(), RegistryError> {
        let parent_type = self.node_type(parent)?;
        let child_type = self.node_type(key)?;
        if parent_type.accepts_child(child_type) {
            self.doc.append(parent, key)?;
            return Ok(());
        }
        if child_type.is_inline() && parent_type.accepts_child(NodeType::Paragraph) {
            let last = self.doc.children(parent).last().copied();
            let wrapper = match last {
                Some(last) if self.doc.node_type(last) == Some(NodeType::Paragraph) => last,
                _ => self.doc.append_new(parent, NodeKind::Paragraph)?,
            };
            self.doc.append(wrapper, key)?;
            return Ok(());
        }
        self.doc.remove(key)?;
        Ok(())
    }

    fn node_type(&self, key: NodeKey) -> Result<NodeType, RegistryError> {
        Ok(self
            .doc
            .node_type(key)
            .ok_or(ModelError::NodeNotFound(key))?)
    }
}

fn format_for_tag(tag: &str) -> Option<TextFormat> {
    match tag {
        "strong" | "b" => Some(TextFormat::BOLD),
        "em" | "i" => Some(TextFormat::ITALIC),
        "s" | "del" | "strike" => Some(TextFormat::STRIKETHROUGH),
        "code" => Some(TextFormat::CODE),
        _ => None,
    }
}

fn type_tag(object: &Map<String, Value>) -> Result<&str, RegistryError> {
    object
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| RegistryError::Malformed("node without a `type` tag".to_string()))
}

fn children_of(object: &Map<String, Value>) -> Result<&[Value], RegistryError> {
    match object.get("children") {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(children)) => Ok(children),
        Some(_) => Err(RegistryError::Malformed("`children` is not an array".to_string())),
    }
}
