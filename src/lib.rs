//! md-richtext: a structured rich-document engine for content editors.
//!
//! This crate holds the editing core behind a rich content editor. It includes:
//!
//! - **Document model** - an arena tree of typed nodes with copy-on-write attributes
//! - **Node registry** - per-kind JSON and markup behavior, injected per editor
//! - **Markdown codec** - ordered transformers converting tree and markdown both ways
//! - **Paste classifier** - routes clipboard payloads to image, video or markdown insertion
//! - **Media accountant** - tracks embedded-binary bytes against a payload cap
//! - **Change pipeline** - debounced serialize, account and notify cycle
//!
//! # Quick Start
//!
//! ```rust
//! use md_richtext::{Editor, from_markdown, to_markdown};
//!
//! let doc = from_markdown("# Hello\n\nWorld").unwrap();
//! assert_eq!(to_markdown(&doc), "# Hello\n\nWorld");
//!
//! let mut editor = Editor::default();
//! editor.initialize("# Hello");
//! assert!(editor.validation().valid);
//! ```

// Document model and selection primitives
pub mod model;

// Node registry and the markup tree it imports from and exports to
pub mod markup;
pub mod registry;

// Markdown codec
pub mod markdown;

// Clipboard paste classification
pub mod paste;

// Media extraction and payload accounting
pub mod media;

// Debounced change pipeline
pub mod pipeline;

// Host-facing editor
pub mod config;
pub mod editor;

pub mod video;

// Re-export model types
pub use model::{
    Carousel, CarouselImage, Document, ListType, ModelError, Node, NodeKey, NodeKind, NodeType,
    TextFormat, TextSelection,
};

// Re-export registry and codec types
pub use markdown::{MarkdownCodec, from_markdown, to_markdown};
pub use registry::{NodeBehavior, NodeRegistry, RegistryError};

// Re-export paste, media and pipeline types
pub use media::{EmbeddedMediaInfo, MediaAccountant, MediaError, PayloadUsage, ValidationReport};
pub use paste::{
    ClipboardFile, ClipboardPayload, PasteError, PasteOutcome, PasteStrategy, classify,
    looks_like_markdown,
};
pub use pipeline::{ChangePipeline, FlushReport, PipelineState};

// Re-export editor types
pub use config::EditorConfig;
pub use editor::{Editor, EditorError, ListenerId, LoadError, ReadTicket, load_persisted};
pub use video::{VideoPlatform, VideoRef, bare_video_url, parse_video_url};
