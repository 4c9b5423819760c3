//! The host-facing editor.
//!
//! An [`Editor`] owns one document together with the registry, codec, media
//! accountant and change pipeline that serve it. Hosts mutate through the
//! editor so that every committed change re-reads media state, notifies
//! update listeners and schedules a debounced flush.

use crate::config::EditorConfig;
use crate::markdown::MarkdownCodec;
use crate::markdown::inline::Inline;
use crate::media::{EmbeddedMediaInfo, MediaAccountant, MediaError, PayloadUsage, ValidationReport};
use crate::model::selection::grapheme_offset_to_byte;
use crate::model::{Document, ModelError, NodeKey, NodeKind, NodeType, TextFormat, TextSelection};
use crate::paste::{self, ClipboardFile, ClipboardPayload, PasteError, PasteOutcome};
use crate::pipeline::{ChangePipeline, FlushReport};
use crate::registry::{NodeRegistry, RegistryError};
use serde_json::Value;
use std::time::Instant;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("persisted document could not be parsed: {0}")]
    ParseFailure(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Paste(#[from] PasteError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("a carousel holds at most {limit} images")]
    CarouselFull { limit: usize },
    #[error("the editor has been torn down")]
    TornDown,
}

/// Parses a persisted string. JSON with a `root` key is a serialized tree;
/// anything else is read as markdown. Blank input is an empty document.
pub fn load_persisted(
    registry: &NodeRegistry,
    codec: &MarkdownCodec,
    input: &str,
) -> Result<Document, LoadError> {
    if input.trim().is_empty() {
        return Ok(Document::new());
    }
    match serde_json::from_str::<Value>(input) {
        Ok(value) if value.get("root").is_some() => Ok(registry.deserialize_document(&value)?),
        Ok(Value::Object(_)) => Err(LoadError::ParseFailure(
            "json object without a root node".to_string(),
        )),
        _ => Ok(codec.from_markdown(input)?),
    }
}

/// Proof that a file read started while a particular mount was live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTicket {
    mount: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ChangeCallback = Box<dyn FnMut(&str)>;
type MediaCallback = Box<dyn FnMut(&[EmbeddedMediaInfo])>;
type UpdateListener = Box<dyn FnMut(&Document)>;

pub struct Editor {
    config: EditorConfig,
    registry: NodeRegistry,
    codec: MarkdownCodec,
    doc: Document,
    selection: Option<TextSelection>,
    accountant: MediaAccountant,
    pipeline: ChangePipeline,
    on_change: Option<ChangeCallback>,
    on_media_change: Option<MediaCallback>,
    listeners: Vec<(ListenerId, UpdateListener)>,
    next_listener: u64,
    mount: u64,
    mounted: bool,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(
            EditorConfig::default(),
            NodeRegistry::with_builtin_kinds(),
            MarkdownCodec::new(),
        )
    }
}

impl Editor {
    pub fn new(config: EditorConfig, registry: NodeRegistry, codec: MarkdownCodec) -> Self {
        Self {
            accountant: MediaAccountant::new(config.max_payload_bytes, config.max_image_bytes),
            pipeline: ChangePipeline::new(config.debounce),
            config,
            registry,
            codec,
            doc: Document::new(),
            selection: None,
            on_change: None,
            on_media_change: None,
            listeners: Vec::new(),
            next_listener: 0,
            mount: 0,
            mounted: true,
        }
    }

    pub fn with_config(config: EditorConfig) -> Self {
        Self::new(config, NodeRegistry::with_builtin_kinds(), MarkdownCodec::new())
    }

    /// Loads the host's persisted string. A string that cannot be loaded
    /// leaves the editor on an empty document; the failure is logged, not
    /// returned.
    pub fn initialize(&mut self, persisted: &str) {
        if let Err(err) = self.try_initialize(persisted) {
            match &err {
                LoadError::Registry(RegistryError::UnknownNodeKind(kind)) => {
                    tracing::warn!(
                        kind = %kind,
                        "unknown node kind in persisted document; starting empty"
                    );
                }
                other => {
                    tracing::warn!(
                        error = %other,
                        "failed to load persisted document; starting empty"
                    );
                }
            }
            self.replace_document(Document::new());
        }
    }

    /// Like [`Editor::initialize`], but reports the failure. The editor is
    /// left on an empty document when it fails.
    pub fn try_initialize(&mut self, persisted: &str) -> Result<(), LoadError> {
        match load_persisted(&self.registry, &self.codec, persisted) {
            Ok(doc) => {
                self.replace_document(doc);
                Ok(())
            }
            Err(err) => {
                self.replace_document(Document::new());
                Err(err)
            }
        }
    }

    fn replace_document(&mut self, doc: Document) {
        self.doc = doc;
        self.selection = None;
        self.mounted = true;
        self.pipeline.take();
        self.accountant.recompute(&self.doc);
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn codec(&self) -> &MarkdownCodec {
        &self.codec
    }

    pub fn pipeline(&self) -> &ChangePipeline {
        &self.pipeline
    }

    pub fn selection(&self) -> Option<TextSelection> {
        self.selection
    }

    pub fn set_selection(&mut self, selection: Option<TextSelection>) {
        self.selection = selection;
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn on_change(&mut self, callback: impl FnMut(&str) + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    pub fn on_media_change(&mut self, callback: impl FnMut(&[EmbeddedMediaInfo]) + 'static) {
        self.on_media_change = Some(Box::new(callback));
    }

    /// Installs an observer called with the document after every committed
    /// mutation.
    pub fn register_update_listener(
        &mut self,
        listener: impl FnMut(&Document) + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_update_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        self.listeners.len() != before
    }

    pub fn set_max_payload_bytes(&mut self, max_payload_bytes: u64) {
        self.config.max_payload_bytes = max_payload_bytes;
        self.accountant.set_max_payload_bytes(max_payload_bytes);
    }

    pub fn media(&self) -> &[EmbeddedMediaInfo] {
        self.accountant.media()
    }

    pub fn validation(&self) -> ValidationReport {
        self.accountant.validation()
    }

    pub fn payload_usage(&self) -> PayloadUsage {
        self.accountant.usage()
    }

    pub fn payload_usage_percent(&self) -> f64 {
        self.accountant.usage().percent()
    }

    pub fn is_over_capacity(&self) -> bool {
        self.accountant.is_over_capacity()
    }

    pub fn to_markdown(&self) -> String {
        self.codec.to_markdown(&self.doc)
    }

    pub fn to_html(&self) -> Result<String, RegistryError> {
        self.registry.to_html(&self.doc)
    }

    pub fn to_persisted_string(&self) -> Result<String, RegistryError> {
        self.registry.to_persisted_string(&self.doc)
    }

    /// Runs `f` against the document and commits the result. The commit
    /// happens even when `f` fails part way, so media state never lags the
    /// tree. Nodes still detached at commit are dropped from the arena.
    pub fn update<R>(
        &mut self,
        now: Instant,
        f: impl FnOnce(&mut Document) -> Result<R, ModelError>,
    ) -> Result<R, EditorError> {
        self.ensure_mounted()?;
        let result = f(&mut self.doc);
        self.drop_stale_selection();
        self.commit(now);
        Ok(result?)
    }

    pub fn paste(
        &mut self,
        payload: &ClipboardPayload,
        now: Instant,
    ) -> Result<PasteOutcome, EditorError> {
        self.ensure_mounted()?;
        let outcome = paste::apply_paste(
            &mut self.doc,
            &self.codec,
            self.selection,
            payload,
            self.config.max_image_bytes,
        )?;
        if outcome.mutated() {
            self.drop_stale_selection();
            self.commit(now);
        }
        Ok(outcome)
    }

    /// Handles a typed character when it completes a text-match shortcut
    /// such as `[label](url)` or a bare video URL followed by a space.
    ///
    /// Returns `false` when no shortcut applies; the host then inserts the
    /// character itself. On `true` the character has been consumed (closing
    /// triggers) or placed after the new node (whitespace triggers).
    pub fn type_char(&mut self, typed: char, now: Instant) -> Result<bool, EditorError> {
        self.ensure_mounted()?;
        let Some(selection) = self.selection.filter(TextSelection::is_collapsed) else {
            return Ok(false);
        };
        let Some(NodeKind::Text { text, format }) = self.doc.kind(selection.text).cloned() else {
            return Ok(false);
        };
        let Some(block) = self.doc.parent(selection.text) else {
            return Ok(false);
        };
        let block_type = self.doc.node_type(block).ok_or(ModelError::NodeNotFound(block))?;
        if !block_type.accepts_child(NodeType::Link) || format.contains(TextFormat::CODE) {
            return Ok(false);
        }
        let allow_blocks = block_type == NodeType::Paragraph
            && self
                .doc
                .parent(block)
                .and_then(|host| self.doc.node_type(host))
                .is_some_and(|host| host.accepts_child(NodeType::VideoEmbed));

        let caret = grapheme_offset_to_byte(&text, selection.focus)
            .ok_or(ModelError::IndexOutOfBounds)?;
        let (before, after) = text.split_at(caret);
        let Some(found) = self.codec.shortcut(before, typed, format, allow_blocks) else {
            return Ok(false);
        };
        let prefix = &before[..found.start];

        match found.inline {
            Inline::Block(kind) => {
                let checkpoint = self.doc.clone();
                let split = TextSelection::caret(selection.text, prefix.graphemes(true).count());
                let placed = self
                    .doc
                    .set_text(selection.text, format!("{prefix}{after}"))
                    .and_then(|()| self.doc.create_node(kind))
                    .and_then(|node| self.doc.insert_blocks_at(Some(split), &[node]));
                if let Err(err) = placed {
                    self.doc = checkpoint;
                    return Err(err.into());
                }
                self.selection = None;
            }
            inline => {
                let index = self
                    .doc
                    .index_in_parent(selection.text)
                    .ok_or(ModelError::Detached(selection.text))?;
                let holder = self.doc.create_node(NodeKind::Paragraph)?;
                inline.attach(&mut self.doc, holder)?;
                let created = self.doc.children(holder).to_vec();
                for (offset, child) in created.iter().enumerate() {
                    self.doc.insert(block, index + 1 + offset, *child)?;
                }
                self.doc.remove(holder)?;

                let mut tail_text = String::new();
                if typed.is_whitespace() {
                    tail_text.push(typed);
                }
                tail_text.push_str(after);
                self.selection = if tail_text.is_empty() {
                    None
                } else {
                    let tail = self.doc.create_node(NodeKind::formatted(tail_text, format))?;
                    self.doc.insert(block, index + 1 + created.len(), tail)?;
                    Some(TextSelection::caret(tail, usize::from(typed.is_whitespace())))
                };
                if prefix.is_empty() {
                    self.doc.remove(selection.text)?;
                } else {
                    self.doc.set_text(selection.text, prefix)?;
                }
            }
        }
        self.commit(now);
        Ok(true)
    }

    /// Adds an uploaded image to a carousel after checking type, size and
    /// the per-carousel limit. Returns the new image id.
    pub fn add_carousel_image(
        &mut self,
        carousel: NodeKey,
        file: &ClipboardFile,
        now: Instant,
    ) -> Result<String, EditorError> {
        self.ensure_mounted()?;
        if !file.is_image() {
            return Err(PasteError::UnsupportedMediaType(file.mime_type.clone()).into());
        }
        self.accountant.check_image(file.size())?;
        self.ensure_carousel_room(carousel)?;
        let data_url = file.to_data_url();
        let id = self
            .doc
            .update_carousel(carousel, |images| {
                Ok(images.add_uploaded(data_url, file.name.clone()))
            })?;
        self.commit(now);
        Ok(id)
    }

    pub fn add_carousel_url(
        &mut self,
        carousel: NodeKey,
        url: &str,
        alt: &str,
        now: Instant,
    ) -> Result<String, EditorError> {
        self.ensure_mounted()?;
        self.ensure_carousel_room(carousel)?;
        let id = self
            .doc
            .update_carousel(carousel, |images| Ok(images.add_url(url, alt)))?;
        self.commit(now);
        Ok(id)
    }

    pub fn remove_carousel_image(
        &mut self,
        carousel: NodeKey,
        id: &str,
        now: Instant,
    ) -> Result<(), EditorError> {
        self.ensure_mounted()?;
        self.doc
            .update_carousel(carousel, |images| images.remove(id).map(|_| ()))?;
        self.commit(now);
        Ok(())
    }

    pub fn move_carousel_image(
        &mut self,
        carousel: NodeKey,
        from: usize,
        to: usize,
        now: Instant,
    ) -> Result<(), EditorError> {
        self.ensure_mounted()?;
        self.doc
            .update_carousel(carousel, |images| images.move_image(from, to))?;
        self.commit(now);
        Ok(())
    }

    pub fn set_carousel_alt(
        &mut self,
        carousel: NodeKey,
        id: &str,
        alt: &str,
        now: Instant,
    ) -> Result<(), EditorError> {
        self.ensure_mounted()?;
        self.doc
            .update_carousel(carousel, |images| images.set_alt(id, alt))?;
        self.commit(now);
        Ok(())
    }

    fn ensure_carousel_room(&self, carousel: NodeKey) -> Result<(), EditorError> {
        let limit = self.config.max_carousel_images;
        match self.doc.kind(carousel) {
            Some(NodeKind::Carousel(images)) if images.len() >= limit => {
                Err(EditorError::CarouselFull { limit })
            }
            Some(_) => Ok(()),
            None => Err(ModelError::NodeNotFound(carousel).into()),
        }
    }

    /// Starts an asynchronous file read bound to the current mount.
    pub fn begin_file_read(&self) -> ReadTicket {
        ReadTicket { mount: self.mount }
    }

    /// Applies a finished image read at the current selection. Reads that
    /// complete after [`Editor::teardown`] are discarded and return `None`.
    pub fn finish_image_read(
        &mut self,
        ticket: ReadTicket,
        file: &ClipboardFile,
        now: Instant,
    ) -> Result<Option<NodeKey>, EditorError> {
        if !self.mounted || ticket.mount != self.mount {
            tracing::debug!(file = %file.name, "discarding file read finished after teardown");
            return Ok(None);
        }
        let image = paste::insert_image_file(
            &mut self.doc,
            self.selection,
            file,
            self.config.max_image_bytes,
        )?;
        self.drop_stale_selection();
        self.commit(now);
        Ok(Some(image))
    }

    /// Flushes when the debounce window has elapsed at `now`.
    pub fn tick(&mut self, now: Instant) -> Result<Option<FlushReport>, RegistryError> {
        match self.pipeline.poll(now) {
            Some(mutations) => self.deliver(mutations).map(Some),
            None => Ok(None),
        }
    }

    /// Flushes a pending change immediately.
    pub fn flush_now(&mut self) -> Result<Option<FlushReport>, RegistryError> {
        match self.pipeline.take() {
            Some(mutations) => self.deliver(mutations).map(Some),
            None => Ok(None),
        }
    }

    /// Unmounts the editor. A pending change is flushed first; outstanding
    /// read tickets stop being honored.
    pub fn teardown(&mut self) -> Result<Option<FlushReport>, RegistryError> {
        let report = self.flush_now()?;
        self.mounted = false;
        self.mount += 1;
        self.selection = None;
        Ok(report)
    }

    fn ensure_mounted(&self) -> Result<(), EditorError> {
        if self.mounted {
            Ok(())
        } else {
            Err(EditorError::TornDown)
        }
    }

    fn drop_stale_selection(&mut self) {
        if let Some(selection) = self.selection
            && !(self.doc.is_attached(selection.text)
                && matches!(self.doc.kind(selection.text), Some(NodeKind::Text { .. })))
        {
            self.selection = None;
        }
    }

    fn commit(&mut self, now: Instant) {
        self.doc.sweep_detached();
        self.accountant.recompute(&self.doc);
        for (_, listener) in &mut self.listeners {
            listener(&self.doc);
        }
        self.pipeline.schedule(now);
    }

    fn deliver(&mut self, mutations: u64) -> Result<FlushReport, RegistryError> {
        let report =
            ChangePipeline::run_flush(&self.doc, &self.registry, &mut self.accountant, mutations)?;
        if let Some(callback) = self.on_change.as_mut() {
            callback(&report.serialized);
        }
        if let Some(callback) = self.on_media_change.as_mut() {
            callback(&report.media);
        }
        Ok(report)
    }
}
