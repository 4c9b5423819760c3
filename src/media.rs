//! Embedded-media extraction and payload accounting.
//!
//! Only embedded-binary (`data:...;base64,`) sources count against the
//! payload cap. Externally hosted URLs are listed with a size of zero.

use crate::model::{Document, NodeKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedMediaInfo {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub url: String,
    pub size_bytes: u64,
}

impl EmbeddedMediaInfo {
    fn image(url: &str, size_bytes: u64) -> Self {
        Self {
            media_type: MediaType::Image,
            url: url.to_string(),
            size_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("image is {} but the per-image limit is {}", format_bytes(*size), format_bytes(*limit))]
    ImageTooLarge { size: u64, limit: u64 },
    #[error(
        "embedded media totals {} which exceeds the {} limit",
        format_bytes(*total),
        format_bytes(*limit)
    )]
    PayloadOverCapacity { total: u64, limit: u64 },
}

pub fn is_embedded_binary(src: &str) -> bool {
    src.starts_with("data:") && src.contains(";base64,")
}

/// Decoded byte size of an embedded-binary source: `ceil(len * 0.75)` of
/// the encoded payload. External URLs are zero.
pub fn embedded_size(src: &str) -> u64 {
    if !is_embedded_binary(src) {
        return 0;
    }
    let encoded = src
        .split_once(";base64,")
        .map(|(_, payload)| payload.len() as u64)
        .unwrap_or(0);
    (encoded * 3).div_ceil(4)
}

/// Walks a document in pre-order and lists every image source it embeds.
pub fn extract_media(doc: &Document) -> Vec<EmbeddedMediaInfo> {
    let mut media = Vec::new();
    for node in doc.iter() {
        match node.kind() {
            NodeKind::Image { src, .. } => {
                media.push(EmbeddedMediaInfo::image(src, embedded_size(src)));
            }
            NodeKind::Carousel(carousel) => {
                for image in carousel.images() {
                    media.push(EmbeddedMediaInfo::image(&image.src, image.counted_bytes()));
                }
            }
            _ => {}
        }
    }
    media
}

/// Same as [`extract_media`], but over the persisted JSON form
/// (`{"root": ...}` or a bare node object).
pub fn extract_media_from_json(value: &Value) -> Vec<EmbeddedMediaInfo> {
    let mut media = Vec::new();
    let root = value.get("root").unwrap_or(value);
    collect_json_media(root, &mut media);
    media
}

fn collect_json_media(node: &Value, out: &mut Vec<EmbeddedMediaInfo>) {
    match node.get("type").and_then(Value::as_str) {
        Some("image") => {
            if let Some(src) = node.get("src").and_then(Value::as_str) {
                out.push(EmbeddedMediaInfo::image(src, embedded_size(src)));
            }
        }
        Some("carousel") => {
            let images = node.get("images").and_then(Value::as_array);
            for image in images.into_iter().flatten() {
                let src = image.get("src").and_then(Value::as_str).unwrap_or_default();
                let uploaded = image
                    .get("isUploaded")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let stored = image.get("sizeBytes").and_then(Value::as_u64).unwrap_or(0);
                let size = match (uploaded, stored) {
                    (false, _) => 0,
                    (true, 0) => embedded_size(src),
                    (true, stored) => stored,
                };
                out.push(EmbeddedMediaInfo::image(src, size));
            }
        }
        _ => {}
    }
    if let Some(children) = node.get("children").and_then(Value::as_array) {
        for child in children {
            collect_json_media(child, out);
        }
    }
}

pub fn total_bytes(media: &[EmbeddedMediaInfo]) -> u64 {
    media.iter().map(|info| info.size_bytes).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadUsage {
    pub total_bytes: u64,
    pub max_payload_bytes: u64,
}

impl PayloadUsage {
    /// `(total / cap) * 100`. A zero cap reads as 0% when empty and 100%
    /// otherwise.
    pub fn percent(&self) -> f64 {
        if self.max_payload_bytes == 0 {
            return if self.total_bytes == 0 { 0.0 } else { 100.0 };
        }
        (self.total_bytes as f64 / self.max_payload_bytes as f64) * 100.0
    }

    pub fn is_over_capacity(&self) -> bool {
        self.total_bytes > self.max_payload_bytes
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Tracks the media list of the live document against the configured caps.
///
/// Going over capacity never blocks editing; it only flips the validation
/// report so the host can warn or refuse to save.
#[derive(Debug, Clone)]
pub struct MediaAccountant {
    max_payload_bytes: u64,
    max_image_bytes: u64,
    media: Vec<EmbeddedMediaInfo>,
    over_capacity: bool,
}

impl MediaAccountant {
    pub fn new(max_payload_bytes: u64, max_image_bytes: u64) -> Self {
        Self {
            max_payload_bytes,
            max_image_bytes,
            media: Vec::new(),
            over_capacity: false,
        }
    }

    /// Re-reads every media-bearing node of `doc`.
    pub fn recompute(&mut self, doc: &Document) -> &[EmbeddedMediaInfo] {
        self.media = extract_media(doc);
        self.refresh_capacity();
        &self.media
    }

    pub fn recompute_from_json(&mut self, value: &Value) -> &[EmbeddedMediaInfo] {
        self.media = extract_media_from_json(value);
        self.refresh_capacity();
        &self.media
    }

    pub fn set_max_payload_bytes(&mut self, max_payload_bytes: u64) {
        self.max_payload_bytes = max_payload_bytes;
        self.refresh_capacity();
    }

    pub fn max_payload_bytes(&self) -> u64 {
        self.max_payload_bytes
    }

    pub fn max_image_bytes(&self) -> u64 {
        self.max_image_bytes
    }

    pub fn media(&self) -> &[EmbeddedMediaInfo] {
        &self.media
    }

    pub fn total_bytes(&self) -> u64 {
        total_bytes(&self.media)
    }

    pub fn usage(&self) -> PayloadUsage {
        PayloadUsage {
            total_bytes: self.total_bytes(),
            max_payload_bytes: self.max_payload_bytes,
        }
    }

    pub fn is_over_capacity(&self) -> bool {
        self.over_capacity
    }

    /// Rejects a single image before it enters the document.
    pub fn check_image(&self, size: u64) -> Result<(), MediaError> {
        if size > self.max_image_bytes {
            return Err(MediaError::ImageTooLarge {
                size,
                limit: self.max_image_bytes,
            });
        }
        Ok(())
    }

    pub fn validation(&self) -> ValidationReport {
        let mut errors = Vec::new();
        let usage = self.usage();
        if usage.is_over_capacity() {
            errors.push(
                MediaError::PayloadOverCapacity {
                    total: usage.total_bytes,
                    limit: usage.max_payload_bytes,
                }
                .to_string(),
            );
        }
        for info in &self.media {
            if let Err(err) = self.check_image(info.size_bytes) {
                errors.push(err.to_string());
            }
        }
        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }

    fn refresh_capacity(&mut self) {
        let usage = self.usage();
        let over = usage.is_over_capacity();
        if over && !self.over_capacity {
            tracing::warn!(
                total_bytes = usage.total_bytes,
                max_payload_bytes = usage.max_payload_bytes,
                "embedded media payload over capacity"
            );
        }
        self.over_capacity = over;
    }
}

/// Human-readable byte count for validation messages.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
