//! Recognition of hosted-video URLs.
//!
//! Only YouTube and Vimeo are recognized. A recognized URL is reduced to a
//! [`VideoRef`] so it can be rebuilt in canonical form on export.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoPlatform {
    Youtube,
    Vimeo,
}

impl VideoPlatform {
    pub fn as_str(self) -> &'static str {
        match self {
            VideoPlatform::Youtube => "youtube",
            VideoPlatform::Vimeo => "vimeo",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "youtube" => Some(VideoPlatform::Youtube),
            "vimeo" => Some(VideoPlatform::Vimeo),
            _ => None,
        }
    }
}

impl fmt::Display for VideoPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRef {
    pub platform: VideoPlatform,
    pub video_id: String,
}

impl VideoRef {
    pub fn new(platform: VideoPlatform, video_id: impl Into<String>) -> Self {
        Self {
            platform,
            video_id: video_id.into(),
        }
    }

    /// Canonical page URL, used as the markdown form of an embed.
    pub fn watch_url(&self) -> String {
        match self.platform {
            VideoPlatform::Youtube => format!("https://www.youtube.com/watch?v={}", self.video_id),
            VideoPlatform::Vimeo => format!("https://vimeo.com/{}", self.video_id),
        }
    }

    /// Player URL suitable for an `<iframe>`.
    pub fn embed_url(&self) -> String {
        match self.platform {
            VideoPlatform::Youtube => {
                format!("https://www.youtube-nocookie.com/embed/{}", self.video_id)
            }
            VideoPlatform::Vimeo => format!("https://player.vimeo.com/video/{}", self.video_id),
        }
    }
}

// Groups 1 and 2 capture YouTube ids, groups 3 and 4 Vimeo ids.
const VIDEO_HOSTS: &str = concat!(
    r"(?:",
    r"(?:www\.|m\.)?youtube(?:-nocookie)?\.com/(?:watch\?(?:[^\s#]*&)?v=|embed/|shorts/|live/|v/)([A-Za-z0-9_-]{11})(?:[?&#][^\s)]*)?",
    r"|youtu\.be/([A-Za-z0-9_-]{11})(?:[?&#][^\s)]*)?",
    r"|(?:www\.)?vimeo\.com/(?:video/)?(\d+)(?:[?#][^\s)]*)?",
    r"|player\.vimeo\.com/video/(\d+)(?:[?#][^\s)]*)?",
    r")"
);

static VIDEO_URL_EXACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^(?:https?://)?{VIDEO_HOSTS}$")).unwrap());

pub(crate) static VIDEO_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("https?://{VIDEO_HOSTS}")).unwrap());

/// Parses a string that is exactly one recognized video URL.
pub fn parse_video_url(text: &str) -> Option<VideoRef> {
    let caps = VIDEO_URL_EXACT_RE.captures(text.trim())?;
    video_ref_from_captures(&caps)
}

pub(crate) fn video_ref_from_captures(caps: &regex::Captures<'_>) -> Option<VideoRef> {
    if let Some(id) = caps.get(1).or_else(|| caps.get(2)) {
        return Some(VideoRef::new(VideoPlatform::Youtube, id.as_str()));
    }
    caps.get(3)
        .or_else(|| caps.get(4))
        .map(|id| VideoRef::new(VideoPlatform::Vimeo, id.as_str()))
}

/// The video behind `text` when it is a single line holding nothing but a
/// video URL. Surrounding whitespace is ignored.
pub fn bare_video_url(text: &str) -> Option<VideoRef> {
    let trimmed = text.trim();
    if trimmed.contains('\n') {
        return None;
    }
    parse_video_url(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_short_link() {
        let video = parse_video_url("https://youtu.be/dQw4w9WgXcQ").unwrap();
        assert_eq!(video.platform, VideoPlatform::Youtube);
        assert_eq!(video.video_id, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_youtube_watch_with_extra_params() {
        let video =
            parse_video_url("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42")
                .unwrap();
        assert_eq!(video.video_id, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_vimeo_variants() {
        assert_eq!(
            parse_video_url("https://vimeo.com/76979871").unwrap(),
            VideoRef::new(VideoPlatform::Vimeo, "76979871")
        );
        assert_eq!(
            parse_video_url("https://player.vimeo.com/video/76979871").unwrap(),
            VideoRef::new(VideoPlatform::Vimeo, "76979871")
        );
    }

    #[test]
    fn test_rejects_non_video_and_multiline() {
        assert!(parse_video_url("https://example.com/watch?v=dQw4w9WgXcQ").is_none());
        assert!(
            bare_video_url("https://youtu.be/dQw4w9WgXcQ\nhttps://youtu.be/dQw4w9WgXcQ")
                .is_none()
        );
        assert!(bare_video_url("see https://youtu.be/dQw4w9WgXcQ").is_none());
        assert_eq!(
            bare_video_url("  https://youtu.be/dQw4w9WgXcQ\n"),
            Some(VideoRef::new(VideoPlatform::Youtube, "dQw4w9WgXcQ"))
        );
    }

    #[test]
    fn test_watch_url_round_trips() {
        let video = VideoRef::new(VideoPlatform::Youtube, "dQw4w9WgXcQ");
        assert_eq!(parse_video_url(&video.watch_url()), Some(video.clone()));
        let vimeo = VideoRef::new(VideoPlatform::Vimeo, "123");
        assert_eq!(parse_video_url(&vimeo.watch_url()), Some(vimeo));
    }

    #[test]
    fn test_inline_pattern_finds_url_in_text() {
        let text = "watch https://youtu.be/dQw4w9WgXcQ now";
        let caps = VIDEO_URL_RE.captures(text).unwrap();
        assert_eq!(caps.get(0).unwrap().as_str(), "https://youtu.be/dQw4w9WgXcQ");
    }
}
