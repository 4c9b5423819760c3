//! Behaviors for the node kinds shipped with the crate.

use super::{NodeBehavior, NodeRegistry, RegistryError};
use crate::markup::{Markup, MarkupElement};
use crate::model::{Carousel, CarouselImage, ListType, NodeKind, NodeType, TextFormat};
use crate::video::{VideoPlatform, VideoRef, parse_video_url};
use serde_json::{Map, Value};

pub(super) fn register_all(registry: &mut NodeRegistry) {
    registry.register(
        NodeType::Text,
        NodeBehavior {
            serialize: |kind| match kind {
                NodeKind::Text { text, format } => attrs([
                    ("text", Value::from(text.as_str())),
                    ("format", Value::from(format.bits())),
                ]),
                _ => Map::new(),
            },
            deserialize: |object| {
                let format = optional_u64(object, "format")?;
                let format = u8::try_from(format)
                    .map_err(|_| RegistryError::Malformed(format!("text format {format}")))?;
                Ok(NodeKind::Text {
                    text: required_str(object, "text")?.to_string(),
                    format: TextFormat::from_bits(format),
                })
            },
            import_markup: |_| None,
            export_markup: export_text,
        },
    );
    registry.register(
        NodeType::Paragraph,
        NodeBehavior {
            serialize: no_attrs,
            deserialize: |_| Ok(NodeKind::Paragraph),
            import_markup: |element| (element.tag == "p").then_some(NodeKind::Paragraph),
            export_markup: |_| MarkupElement::new("p").into(),
        },
    );
    registry.register(
        NodeType::Heading,
        NodeBehavior {
            serialize: |kind| match kind {
                NodeKind::Heading { level } => attrs([("level", Value::from(*level))]),
                _ => Map::new(),
            },
            deserialize: |object| {
                let level = required_u64(object, "level")?;
                u8::try_from(level)
                    .ok()
                    .filter(|level| (1..=6).contains(level))
                    .map(NodeKind::heading)
                    .ok_or_else(|| RegistryError::Malformed(format!("heading level {level}")))
            },
            import_markup: |element| match element.tag.as_bytes() {
                [b'h', level @ b'1'..=b'6'] => Some(NodeKind::heading(level - b'0')),
                _ => None,
            },
            export_markup: |kind| match kind {
                NodeKind::Heading { level } => MarkupElement::new(format!("h{level}")).into(),
                _ => MarkupElement::new("h1").into(),
            },
        },
    );
    registry.register(
        NodeType::Quote,
        NodeBehavior {
            serialize: no_attrs,
            deserialize: |_| Ok(NodeKind::Quote),
            import_markup: |element| (element.tag == "blockquote").then_some(NodeKind::Quote),
            export_markup: |_| MarkupElement::new("blockquote").into(),
        },
    );
    registry.register(
        NodeType::CodeBlock,
        NodeBehavior {
            serialize: |kind| match kind {
                NodeKind::CodeBlock { language } => {
                    attrs([("language", language.as_deref().map_or(Value::Null, Value::from))])
                }
                _ => Map::new(),
            },
            deserialize: |object| {
                Ok(NodeKind::CodeBlock {
                    language: optional_str(object, "language")?.map(str::to_string),
                })
            },
            import_markup: |element| {
                if element.tag != "pre" {
                    return None;
                }
                let class = element.get_attr("class").or_else(|| {
                    element.children.iter().find_map(|child| match child {
                        Markup::Element(code) if code.tag == "code" => code.get_attr("class"),
                        _ => None,
                    })
                });
                let language = class
                    .and_then(|class| {
                        class
                            .split_whitespace()
                            .find_map(|c| c.strip_prefix("language-"))
                    })
                    .filter(|language| !language.is_empty() && !language.contains('`'))
                    .map(str::to_string);
                Some(NodeKind::CodeBlock { language })
            },
            export_markup: |kind| {
                let mut pre = MarkupElement::new("pre");
                if let NodeKind::CodeBlock {
                    language: Some(language),
                } = kind
                {
                    pre = pre.attr("class", format!("language-{language}"));
                }
                pre.into()
            },
        },
    );
    registry.register(
        NodeType::List,
        NodeBehavior {
            serialize: |kind| match kind {
                NodeKind::List { list_type, start } => attrs([
                    ("listType", Value::from(list_type.as_str())),
                    ("start", Value::from(*start)),
                ]),
                _ => Map::new(),
            },
            deserialize: |object| {
                let name = required_str(object, "listType")?;
                let list_type = ListType::from_name(name)
                    .ok_or_else(|| RegistryError::Malformed(format!("list type `{name}`")))?;
                let start = match object.get("start") {
                    None | Some(Value::Null) => 1,
                    Some(_) => u32::try_from(required_u64(object, "start")?)
                        .map_err(|_| RegistryError::Malformed("list start".to_string()))?,
                };
                Ok(NodeKind::List { list_type, start })
            },
            import_markup: |element| match element.tag.as_str() {
                "ul" if element.get_attr("data-list-type") == Some("check") => {
                    Some(NodeKind::list(ListType::Check))
                }
                "ul" => Some(NodeKind::list(ListType::Bullet)),
                "ol" => Some(NodeKind::List {
                    list_type: ListType::Number,
                    start: element
                        .get_attr("start")
                        .and_then(|start| start.parse().ok())
                        .unwrap_or(1),
                }),
                _ => None,
            },
            export_markup: |kind| match kind {
                NodeKind::List {
                    list_type: ListType::Number,
                    start,
                } => {
                    let ol = MarkupElement::new("ol");
                    if *start == 1 {
                        ol.into()
                    } else {
                        ol.attr("start", start.to_string()).into()
                    }
                }
                NodeKind::List {
                    list_type: ListType::Check,
                    ..
                } => MarkupElement::new("ul").attr("data-list-type", "check").into(),
                _ => MarkupElement::new("ul").into(),
            },
        },
    );
    registry.register(
        NodeType::ListItem,
        NodeBehavior {
            serialize: |kind| match kind {
                NodeKind::ListItem {
                    checked: Some(checked),
                } => attrs([("checked", Value::from(*checked))]),
                _ => Map::new(),
            },
            deserialize: |object| {
                Ok(NodeKind::ListItem {
                    checked: optional_bool(object, "checked")?,
                })
            },
            import_markup: |element| {
                (element.tag == "li").then(|| NodeKind::ListItem {
                    checked: element
                        .get_attr("data-checked")
                        .map(|value| value == "true"),
                })
            },
            export_markup: |kind| {
                let li = MarkupElement::new("li");
                match kind {
                    NodeKind::ListItem {
                        checked: Some(checked),
                    } => li.attr("data-checked", checked.to_string()).into(),
                    _ => li.into(),
                }
            },
        },
    );
    registry.register(
        NodeType::Link,
        NodeBehavior {
            serialize: |kind| match kind {
                NodeKind::Link { url } => attrs([("url", Value::from(url.as_str()))]),
                _ => Map::new(),
            },
            deserialize: |object| {
                Ok(NodeKind::Link {
                    url: required_str(object, "url")?.to_string(),
                })
            },
            import_markup: |element| {
                if element.tag != "a" {
                    return None;
                }
                element.get_attr("href").map(|href| NodeKind::Link {
                    url: href.to_string(),
                })
            },
            export_markup: |kind| match kind {
                NodeKind::Link { url } => MarkupElement::new("a").attr("href", url.as_str()).into(),
                _ => MarkupElement::new("a").into(),
            },
        },
    );
    registry.register(
        NodeType::Table,
        NodeBehavior {
            serialize: no_attrs,
            deserialize: |_| Ok(NodeKind::Table),
            import_markup: |element| (element.tag == "table").then_some(NodeKind::Table),
            export_markup: |_| MarkupElement::new("table").into(),
        },
    );
    registry.register(
        NodeType::TableRow,
        NodeBehavior {
            serialize: no_attrs,
            deserialize: |_| Ok(NodeKind::TableRow),
            import_markup: |element| (element.tag == "tr").then_some(NodeKind::TableRow),
            export_markup: |_| MarkupElement::new("tr").into(),
        },
    );
    registry.register(
        NodeType::TableCell,
        NodeBehavior {
            serialize: |kind| match kind {
                NodeKind::TableCell { header } => attrs([("header", Value::from(*header))]),
                _ => Map::new(),
            },
            deserialize: |object| {
                Ok(NodeKind::TableCell {
                    header: optional_bool(object, "header")?.unwrap_or(false),
                })
            },
            import_markup: |element| match element.tag.as_str() {
                "th" => Some(NodeKind::TableCell { header: true }),
                "td" => Some(NodeKind::TableCell { header: false }),
                _ => None,
            },
            export_markup: |kind| match kind {
                NodeKind::TableCell { header: true } => MarkupElement::new("th").into(),
                _ => MarkupElement::new("td").into(),
            },
        },
    );
    registry.register(
        NodeType::HorizontalRule,
        NodeBehavior {
            serialize: no_attrs,
            deserialize: |_| Ok(NodeKind::HorizontalRule),
            import_markup: |element| (element.tag == "hr").then_some(NodeKind::HorizontalRule),
            export_markup: |_| MarkupElement::new("hr").into(),
        },
    );
    registry.register(
        NodeType::Hashtag,
        NodeBehavior {
            serialize: |kind| match kind {
                NodeKind::Hashtag { tag } => attrs([("tag", Value::from(tag.as_str()))]),
                _ => Map::new(),
            },
            deserialize: |object| {
                Ok(NodeKind::Hashtag {
                    tag: required_str(object, "tag")?.to_string(),
                })
            },
            import_markup: |element| {
                if element.tag != "span" || element.get_attr("class") != Some("hashtag") {
                    return None;
                }
                let tag = element.text_content();
                let tag = tag.trim().trim_start_matches('#');
                Some(NodeKind::Hashtag {
                    tag: tag.to_string(),
                })
                .filter(|kind| kind.validate().is_ok())
            },
            export_markup: |kind| match kind {
                NodeKind::Hashtag { tag } => MarkupElement::new("span")
                    .attr("class", "hashtag")
                    .text(format!("#{tag}"))
                    .into(),
                _ => MarkupElement::new("span").into(),
            },
        },
    );
    registry.register(
        NodeType::Image,
        NodeBehavior {
            serialize: |kind| match kind {
                NodeKind::Image { src, alt } => attrs([
                    ("src", Value::from(src.as_str())),
                    ("altText", Value::from(alt.as_str())),
                ]),
                _ => Map::new(),
            },
            deserialize: |object| {
                Ok(NodeKind::image(
                    required_str(object, "src")?,
                    optional_str(object, "altText")?.unwrap_or_default(),
                ))
            },
            import_markup: |element| {
                if element.tag != "img" {
                    return None;
                }
                let src = element.get_attr("src")?;
                Some(NodeKind::image(src, element.get_attr("alt").unwrap_or_default()))
            },
            export_markup: |kind| match kind {
                NodeKind::Image { src, alt } => MarkupElement::new("img")
                    .attr("src", src.as_str())
                    .attr("alt", alt.as_str())
                    .into(),
                _ => MarkupElement::new("img").into(),
            },
        },
    );
    registry.register(
        NodeType::VideoEmbed,
        NodeBehavior {
            serialize: |kind| match kind {
                NodeKind::VideoEmbed { platform, video_id } => attrs([
                    ("platform", Value::from(platform.as_str())),
                    ("videoId", Value::from(video_id.as_str())),
                ]),
                _ => Map::new(),
            },
            deserialize: |object| {
                let name = required_str(object, "platform")?;
                let platform = VideoPlatform::from_name(name)
                    .ok_or_else(|| RegistryError::Malformed(format!("video platform `{name}`")))?;
                Ok(NodeKind::video(VideoRef::new(
                    platform,
                    required_str(object, "videoId")?,
                )))
            },
            import_markup: |element| {
                if element.tag != "iframe" {
                    return None;
                }
                let tagged = element
                    .get_attr("data-platform")
                    .and_then(VideoPlatform::from_name)
                    .zip(element.get_attr("data-video-id"))
                    .map(|(platform, id)| VideoRef::new(platform, id));
                tagged
                    .or_else(|| element.get_attr("src").and_then(parse_video_url))
                    .map(NodeKind::video)
            },
            export_markup: |kind| {
                let Some(video) = kind.video_ref() else {
                    return MarkupElement::new("iframe").into();
                };
                MarkupElement::new("iframe")
                    .attr("src", video.embed_url())
                    .attr("data-platform", video.platform.as_str())
                    .attr("data-video-id", video.video_id.as_str())
                    .attr("allowfullscreen", "")
                    .into()
            },
        },
    );
    registry.register(
        NodeType::Carousel,
        NodeBehavior {
            serialize: |kind| match kind {
                NodeKind::Carousel(carousel) => attrs([(
                    "images",
                    serde_json::to_value(carousel.images()).unwrap_or(Value::Array(Vec::new())),
                )]),
                _ => Map::new(),
            },
            deserialize: |object| {
                let images = match object.get("images") {
                    None | Some(Value::Null) => Vec::new(),
                    Some(value) => serde_json::from_value::<Vec<CarouselImage>>(value.clone())?,
                };
                Ok(NodeKind::Carousel(Carousel::from_images(images)))
            },
            import_markup: |element| {
                if element.tag != "div" || !element.has_attr("data-carousel") {
                    return None;
                }
                let mut carousel = Carousel::new();
                collect_images(&element.children, &mut carousel);
                Some(NodeKind::Carousel(carousel))
            },
            export_markup: |kind| {
                let mut div = MarkupElement::new("div").attr("data-carousel", "");
                if let NodeKind::Carousel(carousel) = kind {
                    for image in carousel.images() {
                        div = div.child(
                            MarkupElement::new("img")
                                .attr("src", image.src.as_str())
                                .attr("alt", image.alt.as_str())
                                .into(),
                        );
                    }
                }
                div.into()
            },
        },
    );
    registry.register(
        NodeType::CollapsibleContainer,
        NodeBehavior {
            serialize: |kind| match kind {
                NodeKind::CollapsibleContainer { is_open } => {
                    attrs([("open", Value::from(*is_open))])
                }
                _ => Map::new(),
            },
            deserialize: |object| {
                Ok(NodeKind::CollapsibleContainer {
                    is_open: optional_bool(object, "open")?.unwrap_or(false),
                })
            },
            import_markup: |element| {
                (element.tag == "details").then(|| NodeKind::CollapsibleContainer {
                    is_open: element.has_attr("open"),
                })
            },
            export_markup: |kind| {
                let details = MarkupElement::new("details");
                match kind {
                    NodeKind::CollapsibleContainer { is_open: true } => {
                        details.attr("open", "").into()
                    }
                    _ => details.into(),
                }
            },
        },
    );
    registry.register(
        NodeType::CollapsibleTitle,
        NodeBehavior {
            serialize: no_attrs,
            deserialize: |_| Ok(NodeKind::CollapsibleTitle),
            import_markup: |_| None,
            export_markup: |_| MarkupElement::new("summary").into(),
        },
    );
    registry.register(
        NodeType::CollapsibleContent,
        NodeBehavior {
            serialize: no_attrs,
            deserialize: |_| Ok(NodeKind::CollapsibleContent),
            import_markup: |_| None,
            export_markup: |_| {
                MarkupElement::new("div")
                    .attr("data-collapsible-content", "")
                    .into()
            },
        },
    );
}

fn no_attrs(_: &NodeKind) -> Map<String, Value> {
    Map::new()
}

fn attrs<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Wraps text in one element per format bit, outermost first.
fn export_text(kind: &NodeKind) -> Markup {
    let NodeKind::Text { text, format } = kind else {
        return Markup::Text(String::new());
    };
    let mut markup = Markup::Text(text.clone());
    for (bit, tag) in [
        (TextFormat::CODE, "code"),
        (TextFormat::STRIKETHROUGH, "s"),
        (TextFormat::ITALIC, "em"),
        (TextFormat::BOLD, "strong"),
    ] {
        if format.contains(bit) {
            markup = MarkupElement::new(tag).child(markup).into();
        }
    }
    markup
}

fn collect_images(nodes: &[Markup], carousel: &mut Carousel) {
    for node in nodes {
        if let Markup::Element(element) = node {
            if element.tag == "img"
                && let Some(src) = element.get_attr("src")
            {
                carousel.push(CarouselImage::from_source(
                    src,
                    element.get_attr("alt").unwrap_or_default(),
                ));
            } else {
                collect_images(&element.children, carousel);
            }
        }
    }
}

fn required_str<'a>(object: &'a Map<String, Value>, key: &str) -> Result<&'a str, RegistryError> {
    object
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| RegistryError::Malformed(format!("missing string `{key}`")))
}

fn optional_str<'a>(
    object: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a str>, RegistryError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(_) => Err(RegistryError::Malformed(format!("`{key}` is not a string"))),
    }
}

fn required_u64(object: &Map<String, Value>, key: &str) -> Result<u64, RegistryError> {
    object
        .get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| RegistryError::Malformed(format!("missing number `{key}`")))
}

fn optional_u64(object: &Map<String, Value>, key: &str) -> Result<u64, RegistryError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(0),
        Some(_) => required_u64(object, key),
    }
}

fn optional_bool(object: &Map<String, Value>, key: &str) -> Result<Option<bool>, RegistryError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(_) => Err(RegistryError::Malformed(format!("`{key}` is not a boolean"))),
    }
}
