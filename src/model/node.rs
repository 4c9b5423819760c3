//! Node kinds and their attributes.

use super::carousel::Carousel;
use crate::video::{VideoPlatform, VideoRef};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, LazyLock};
use uuid::Uuid;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}_][\p{L}\p{N}_]*$").unwrap());

pub type NodeKey = Uuid;

/// Tag identifying a node kind, independent of its attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeType {
    Root,
    Text,
    Paragraph,
    Heading,
    Quote,
    CodeBlock,
    List,
    ListItem,
    Link,
    Table,
    TableRow,
    TableCell,
    HorizontalRule,
    Hashtag,
    Image,
    VideoEmbed,
    Carousel,
    CollapsibleContainer,
    CollapsibleTitle,
    CollapsibleContent,
}

impl NodeType {
    pub const ALL: [NodeType; 20] = [
        NodeType::Root,
        NodeType::Text,
        NodeType::Paragraph,
        NodeType::Heading,
        NodeType::Quote,
        NodeType::CodeBlock,
        NodeType::List,
        NodeType::ListItem,
        NodeType::Link,
        NodeType::Table,
        NodeType::TableRow,
        NodeType::TableCell,
        NodeType::HorizontalRule,
        NodeType::Hashtag,
        NodeType::Image,
        NodeType::VideoEmbed,
        NodeType::Carousel,
        NodeType::CollapsibleContainer,
        NodeType::CollapsibleTitle,
        NodeType::CollapsibleContent,
    ];

    /// The `type` tag used in the persisted JSON form.
    pub fn tag(self) -> &'static str {
        match self {
            NodeType::Root => "root",
            NodeType::Text => "text",
            NodeType::Paragraph => "paragraph",
            NodeType::Heading => "heading",
            NodeType::Quote => "quote",
            NodeType::CodeBlock => "code-block",
            NodeType::List => "list",
            NodeType::ListItem => "list-item",
            NodeType::Link => "link",
            NodeType::Table => "table",
            NodeType::TableRow => "table-row",
            NodeType::TableCell => "table-cell",
            NodeType::HorizontalRule => "horizontal-rule",
            NodeType::Hashtag => "hashtag",
            NodeType::Image => "image",
            NodeType::VideoEmbed => "video-embed",
            NodeType::Carousel => "carousel",
            NodeType::CollapsibleContainer => "collapsible-container",
            NodeType::CollapsibleTitle => "collapsible-title",
            NodeType::CollapsibleContent => "collapsible-content",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        NodeType::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Kinds that live inside a paragraph-like block.
    pub fn is_inline(self) -> bool {
        matches!(
            self,
            NodeType::Text | NodeType::Link | NodeType::Hashtag | NodeType::Image
        )
    }

    /// Kinds that may sit directly under the root or a collapsible body.
    pub fn is_block(self) -> bool {
        matches!(
            self,
            NodeType::Paragraph
                | NodeType::Heading
                | NodeType::Quote
                | NodeType::CodeBlock
                | NodeType::List
                | NodeType::Table
                | NodeType::HorizontalRule
                | NodeType::VideoEmbed
                | NodeType::Carousel
                | NodeType::CollapsibleContainer
        )
    }

    /// Leaf and decorator kinds never own children.
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            NodeType::Text
                | NodeType::Hashtag
                | NodeType::Image
                | NodeType::HorizontalRule
                | NodeType::VideoEmbed
                | NodeType::Carousel
        )
    }

    pub fn accepts_child(self, child: NodeType) -> bool {
        match self {
            NodeType::Root | NodeType::CollapsibleContent => child.is_block(),
            NodeType::Paragraph
            | NodeType::Heading
            | NodeType::Quote
            | NodeType::TableCell
            | NodeType::CollapsibleTitle => child.is_inline(),
            NodeType::CodeBlock | NodeType::Link => child == NodeType::Text,
            NodeType::List => child == NodeType::ListItem,
            NodeType::ListItem => child.is_inline() || child == NodeType::List,
            NodeType::Table => child == NodeType::TableRow,
            NodeType::TableRow => child == NodeType::TableCell,
            NodeType::CollapsibleContainer => {
                matches!(
                    child,
                    NodeType::CollapsibleTitle | NodeType::CollapsibleContent
                )
            }
            _ => false,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Inline formatting bits carried by text nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextFormat(u8);

impl TextFormat {
    pub const PLAIN: TextFormat = TextFormat(0);
    pub const BOLD: TextFormat = TextFormat(1);
    pub const ITALIC: TextFormat = TextFormat(1 << 1);
    pub const STRIKETHROUGH: TextFormat = TextFormat(1 << 2);
    pub const CODE: TextFormat = TextFormat(1 << 4);

    const KNOWN: u8 = 1 | (1 << 1) | (1 << 2) | (1 << 4);

    pub fn from_bits(bits: u8) -> Self {
        TextFormat(bits & Self::KNOWN)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: TextFormat) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn with(self, other: TextFormat) -> Self {
        TextFormat(self.0 | other.0)
    }

    pub fn is_plain(self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Bullet,
    Number,
    Check,
}

impl ListType {
    pub fn as_str(self) -> &'static str {
        match self {
            ListType::Bullet => "bullet",
            ListType::Number => "number",
            ListType::Check => "check",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bullet" => Some(ListType::Bullet),
            "number" => Some(ListType::Number),
            "check" => Some(ListType::Check),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Text { text: String, format: TextFormat },
    Paragraph,
    Heading { level: u8 },
    Quote,
    CodeBlock { language: Option<String> },
    List { list_type: ListType, start: u32 },
    ListItem { checked: Option<bool> },
    Link { url: String },
    Table,
    TableRow,
    TableCell { header: bool },
    HorizontalRule,
    Hashtag { tag: String },
    Image { src: String, alt: String },
    VideoEmbed { platform: VideoPlatform, video_id: String },
    Carousel(Carousel),
    CollapsibleContainer { is_open: bool },
    CollapsibleTitle,
    CollapsibleContent,
}

impl NodeKind {
    pub fn text(text: impl Into<String>) -> Self {
        NodeKind::Text {
            text: text.into(),
            format: TextFormat::PLAIN,
        }
    }

    pub fn formatted(text: impl Into<String>, format: TextFormat) -> Self {
        NodeKind::Text {
            text: text.into(),
            format,
        }
    }

    pub fn heading(level: u8) -> Self {
        NodeKind::Heading { level }
    }

    pub fn image(src: impl Into<String>, alt: impl Into<String>) -> Self {
        NodeKind::Image {
            src: src.into(),
            alt: alt.into(),
        }
    }

    pub fn video(video: VideoRef) -> Self {
        NodeKind::VideoEmbed {
            platform: video.platform,
            video_id: video.video_id,
        }
    }

    pub fn list(list_type: ListType) -> Self {
        NodeKind::List {
            list_type,
            start: 1,
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Root => NodeType::Root,
            NodeKind::Text { .. } => NodeType::Text,
            NodeKind::Paragraph => NodeType::Paragraph,
            NodeKind::Heading { .. } => NodeType::Heading,
            NodeKind::Quote => NodeType::Quote,
            NodeKind::CodeBlock { .. } => NodeType::CodeBlock,
            NodeKind::List { .. } => NodeType::List,
            NodeKind::ListItem { .. } => NodeType::ListItem,
            NodeKind::Link { .. } => NodeType::Link,
            NodeKind::Table => NodeType::Table,
            NodeKind::TableRow => NodeType::TableRow,
            NodeKind::TableCell { .. } => NodeType::TableCell,
            NodeKind::HorizontalRule => NodeType::HorizontalRule,
            NodeKind::Hashtag { .. } => NodeType::Hashtag,
            NodeKind::Image { .. } => NodeType::Image,
            NodeKind::VideoEmbed { .. } => NodeType::VideoEmbed,
            NodeKind::Carousel(_) => NodeType::Carousel,
            NodeKind::CollapsibleContainer { .. } => NodeType::CollapsibleContainer,
            NodeKind::CollapsibleTitle => NodeType::CollapsibleTitle,
            NodeKind::CollapsibleContent => NodeType::CollapsibleContent,
        }
    }

    pub fn video_ref(&self) -> Option<VideoRef> {
        match self {
            NodeKind::VideoEmbed { platform, video_id } => {
                Some(VideoRef::new(*platform, video_id.clone()))
            }
            _ => None,
        }
    }

    /// Attribute-level validity that does not depend on tree position.
    pub(crate) fn validate(&self) -> Result<(), String> {
        match self {
            NodeKind::Heading { level } if !(1..=6).contains(level) => {
                Err(format!("heading level {level} is outside 1..=6"))
            }
            NodeKind::VideoEmbed { video_id, .. } if video_id.is_empty() => {
                Err("video embed without an id".to_string())
            }
            NodeKind::Hashtag { tag } if !TAG_RE.is_match(tag) => {
                Err(format!("`{tag}` is not a hashtag"))
            }
            NodeKind::CodeBlock {
                language: Some(language),
            } if language.is_empty()
                || language.contains(|ch: char| ch.is_whitespace() || ch == '`') =>
            {
                Err(format!("`{language}` is not a code language"))
            }
            _ => Ok(()),
        }
    }
}

/// A node in the document arena.
///
/// Attributes sit behind an `Arc` so snapshots can share them; writes go
/// through `Arc::make_mut` and never disturb a previously taken snapshot.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) key: NodeKey,
    pub(crate) kind: Arc<NodeKind>,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            key: Uuid::new_v4(),
            kind: Arc::new(kind),
            parent: None,
            children: Vec::new(),
        }
    }

    pub(crate) fn from_snapshot(kind: Arc<NodeKind>) -> Self {
        Self {
            key: Uuid::new_v4(),
            kind,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// Shared handle on the attribute set as of now.
    pub fn snapshot(&self) -> Arc<NodeKind> {
        Arc::clone(&self.kind)
    }
}
