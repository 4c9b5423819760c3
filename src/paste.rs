//! Clipboard paste classification.
//!
//! [`classify`] is a pure decision over a [`ClipboardPayload`]; [`apply_paste`]
//! carries the decision out against a document. The decision order is fixed:
//! image file, other file, bare video URL, markdown-looking text, decline.

use crate::markdown::MarkdownCodec;
use crate::model::{Document, ModelError, NodeKey, NodeKind, NodeType, TextSelection};
use crate::video::{VideoRef, bare_video_url};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ClipboardFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// The file as an embedded-binary `data:` source.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardPayload {
    pub files: Vec<ClipboardFile>,
    pub text: String,
}

impl ClipboardPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            files: Vec::new(),
            text: text.into(),
        }
    }

    pub fn file(file: ClipboardFile) -> Self {
        Self {
            files: vec![file],
            text: String::new(),
        }
    }

    pub fn with_file(mut self, file: ClipboardFile) -> Self {
        self.files.push(file);
        self
    }
}

/// What a paste should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasteStrategy {
    /// Insert the image file at this index of the payload.
    Image { file_index: usize },
    /// A non-image file; nothing is inserted.
    RejectFile { mime_type: String },
    VideoEmbed(VideoRef),
    Markdown,
    /// Leave the paste to the host's plain-text insertion.
    Decline,
}

impl PasteStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            PasteStrategy::Image { .. } => "image",
            PasteStrategy::RejectFile { .. } => "reject-file",
            PasteStrategy::VideoEmbed(_) => "video-embed",
            PasteStrategy::Markdown => "markdown",
            PasteStrategy::Decline => "decline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasteError {
    #[error("image is {size} bytes but the limit is {limit} bytes")]
    ImageTooLarge { size: u64, limit: u64 },
    #[error("only images can be pasted, got {0}; add videos by pasting their link")]
    UnsupportedMediaType(String),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Result of an applied paste.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasteOutcome {
    Image(NodeKey),
    Video(NodeKey),
    Markdown(Vec<NodeKey>),
    Declined,
}

impl PasteOutcome {
    pub fn is_declined(&self) -> bool {
        matches!(self, PasteOutcome::Declined)
    }

    /// Whether the document was changed.
    pub fn mutated(&self) -> bool {
        match self {
            PasteOutcome::Markdown(blocks) => !blocks.is_empty(),
            PasteOutcome::Declined => false,
            _ => true,
        }
    }
}

/// Independent hints that a text is markdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkdownSignal {
    Heading,
    List,
    Link,
    Emphasis,
    Code,
    Blockquote,
    HorizontalRule,
    TableRow,
    Details,
    Image,
    FencedCode,
    DetailsBlock,
}

impl MarkdownSignal {
    /// A strong signal is enough on its own.
    pub fn is_strong(self) -> bool {
        matches!(
            self,
            MarkdownSignal::Image | MarkdownSignal::FencedCode | MarkdownSignal::DetailsBlock
        )
    }
}

static SIGNALS: LazyLock<Vec<(MarkdownSignal, Regex)>> = LazyLock::new(|| {
    [
        (MarkdownSignal::Heading, r"(?m)^#{1,6}[ \t]+\S"),
        (MarkdownSignal::List, r"(?m)^[ \t]*(?:[-*+]|\d{1,9}[.)])[ \t]+\S"),
        (MarkdownSignal::Link, r"\[[^\]\n]+\]\([^)\s]+\)"),
        (
            MarkdownSignal::Emphasis,
            r"\*\*[^*\n]+\*\*|__[^_\n]+__|~~[^~\n]+~~|(?:^|\s)[*_][^\s*_][^*_\n]*[*_](?:\s|[.,;:!?]|$)",
        ),
        (MarkdownSignal::Code, r"`[^`\n]+`|(?m)^```"),
        (MarkdownSignal::Blockquote, r"(?m)^>[ \t]?\S"),
        (MarkdownSignal::HorizontalRule, r"(?m)^[ \t]*(?:-{3,}|\*{3,}|_{3,})[ \t]*$"),
        (MarkdownSignal::TableRow, r"(?m)^[ \t]*\|.*\|[ \t]*$"),
        (MarkdownSignal::Details, r"(?i)<details"),
        (MarkdownSignal::Image, r"!\[[^\]\n]*\]\([^)\s]+\)"),
        (MarkdownSignal::FencedCode, r"(?ms)^```[^\n]*\n.*?^```"),
        (MarkdownSignal::DetailsBlock, r"(?is)<details[^>]*>.*?</details>"),
    ]
    .into_iter()
    .map(|(signal, pattern)| (signal, Regex::new(pattern).unwrap()))
    .collect()
});

/// Every signal that fires on `text`, in a fixed order.
pub fn markdown_signals(text: &str) -> Vec<MarkdownSignal> {
    SIGNALS
        .iter()
        .filter(|(_, regex)| regex.is_match(text))
        .map(|(signal, _)| *signal)
        .collect()
}

/// Two independent weak signals, or any one strong signal.
pub fn looks_like_markdown(text: &str) -> bool {
    let signals = markdown_signals(text);
    signals.iter().any(|signal| signal.is_strong())
        || signals.iter().filter(|signal| !signal.is_strong()).count() >= 2
}

pub fn classify(payload: &ClipboardPayload) -> PasteStrategy {
    if let Some(file_index) = payload.files.iter().position(ClipboardFile::is_image) {
        return PasteStrategy::Image { file_index };
    }
    if let Some(file) = payload.files.first() {
        return PasteStrategy::RejectFile {
            mime_type: file.mime_type.clone(),
        };
    }
    if payload.text.trim().is_empty() {
        return PasteStrategy::Decline;
    }
    if let Some(video) = bare_video_url(&payload.text) {
        return PasteStrategy::VideoEmbed(video);
    }
    if looks_like_markdown(&payload.text) {
        return PasteStrategy::Markdown;
    }
    PasteStrategy::Decline
}

/// Classifies `payload` and applies the decision to `doc`.
///
/// An active selection is replaced. Without one, block content is appended
/// to the root. A failed check leaves the document untouched.
pub fn apply_paste(
    doc: &mut Document,
    codec: &MarkdownCodec,
    selection: Option<TextSelection>,
    payload: &ClipboardPayload,
    max_image_bytes: u64,
) -> Result<PasteOutcome, PasteError> {
    let strategy = classify(payload);
    tracing::debug!(
        strategy = strategy.name(),
        files = payload.files.len(),
        text_len = payload.text.len(),
        "paste classified"
    );
    match strategy {
        PasteStrategy::Image { file_index } => {
            let Some(file) = payload.files.get(file_index) else {
                return Ok(PasteOutcome::Declined);
            };
            insert_image_file(doc, selection, file, max_image_bytes).map(PasteOutcome::Image)
        }
        PasteStrategy::RejectFile { mime_type } => {
            Err(PasteError::UnsupportedMediaType(mime_type))
        }
        PasteStrategy::VideoEmbed(video) => {
            let node = doc.create_node(NodeKind::video(video))?;
            if let Err(err) = doc.insert_blocks_at(selection, &[node]) {
                let _ = doc.remove(node);
                return Err(err.into());
            }
            Ok(PasteOutcome::Video(node))
        }
        PasteStrategy::Markdown => {
            let parsed = codec.from_markdown(&payload.text)?;
            let mut blocks = Vec::new();
            for block in parsed.children(parsed.root()) {
                blocks.push(doc.import_subtree(&parsed, *block)?);
            }
            if let Err(err) = doc.insert_blocks_at(selection, &blocks) {
                for block in &blocks {
                    let _ = doc.remove(*block);
                }
                return Err(err.into());
            }
            doc.normalize();
            Ok(PasteOutcome::Markdown(blocks))
        }
        PasteStrategy::Decline => Ok(PasteOutcome::Declined),
    }
}

/// Inserts an image file as an embedded-binary image node. Inline positions
/// take the image directly; otherwise it gets its own paragraph.
pub fn insert_image_file(
    doc: &mut Document,
    selection: Option<TextSelection>,
    file: &ClipboardFile,
    max_image_bytes: u64,
) -> Result<NodeKey, PasteError> {
    if !file.is_image() {
        return Err(PasteError::UnsupportedMediaType(file.mime_type.clone()));
    }
    if file.size() > max_image_bytes {
        return Err(PasteError::ImageTooLarge {
            size: file.size(),
            limit: max_image_bytes,
        });
    }
    let image = doc.create_node(NodeKind::image(file.to_data_url(), file.name.clone()))?;

    let inline_target = selection.filter(|selection| {
        doc.parent(selection.text)
            .and_then(|parent| doc.node_type(parent))
            .is_some_and(|parent| parent.accepts_child(NodeType::Image))
    });
    let inserted = match inline_target {
        Some(selection) => doc.insert_inline_at(selection, image),
        None => insert_in_paragraph(doc, selection, image),
    };
    if let Err(err) = inserted {
        if doc.node(image).is_some() {
            let _ = doc.remove(image);
        }
        return Err(err.into());
    }
    Ok(image)
}

fn insert_in_paragraph(
    doc: &mut Document,
    selection: Option<TextSelection>,
    inline: NodeKey,
) -> Result<(), ModelError> {
    let paragraph = doc.create_node(NodeKind::Paragraph)?;
    doc.append(paragraph, inline)?;
    if let Err(err) = doc.insert_blocks_at(selection, &[paragraph]) {
        let _ = doc.remove(paragraph);
        return Err(err);
    }
    Ok(())
}
