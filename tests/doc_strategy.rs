#![allow(dead_code)]

//! Generators for documents built only from kinds the markdown codec can
//! carry without loss. Text is drawn from all of printable ASCII, so markdown
//! metacharacters, entity-like runs and edge whitespace all show up, and
//! inline items are placed next to each other with no separator.

use md_richtext::video::{VideoPlatform, VideoRef};
use md_richtext::{Carousel, CarouselImage, Document, ListType, NodeKey, NodeKind, TextFormat};
use proptest::collection::vec;
use proptest::prelude::*;

#[derive(Clone, Debug)]
pub enum InlineSpec {
    Text(String, TextFormat),
    Link { label: String, slug: String },
    Hashtag(String),
    Image { alt: String, slug: String },
}

#[derive(Clone, Debug)]
pub struct ListSpec {
    pub list_type: ListType,
    pub start: u32,
    pub items: Vec<(Option<bool>, Vec<InlineSpec>, Option<Box<ListSpec>>)>,
}

#[derive(Clone, Debug)]
pub enum BlockSpec {
    Paragraph(Vec<InlineSpec>),
    Heading(u8, Vec<InlineSpec>),
    Quote(Vec<InlineSpec>),
    Code(Option<String>, String),
    List(ListSpec),
    Table(Vec<Vec<Vec<InlineSpec>>>),
    Rule,
    Video(VideoRef),
    Carousel(Vec<(String, String)>),
    Collapsible {
        open: bool,
        title: Vec<InlineSpec>,
        paragraphs: Vec<Vec<InlineSpec>>,
    },
}

pub fn word() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

pub fn words() -> impl Strategy<Value = String> {
    vec(word(), 1..4).prop_map(|words| words.join(" "))
}

/// Non-empty printable ASCII, spaces and punctuation included.
pub fn printable() -> impl Strategy<Value = String> {
    "[ -~]{1,12}"
}

fn maybe_printable() -> impl Strategy<Value = String> {
    "[ -~]{0,12}"
}

fn slug() -> impl Strategy<Value = String> {
    "[ -~]{0,8}"
}

fn format() -> impl Strategy<Value = TextFormat> {
    prop_oneof![
        4 => Just(TextFormat::PLAIN),
        1 => Just(TextFormat::BOLD),
        1 => Just(TextFormat::ITALIC),
        1 => Just(TextFormat::STRIKETHROUGH),
        1 => Just(TextFormat::CODE),
        1 => Just(TextFormat::BOLD.with(TextFormat::ITALIC)),
        1 => Just(TextFormat::BOLD.with(TextFormat::CODE)),
        1 => Just(TextFormat::ITALIC.with(TextFormat::STRIKETHROUGH)),
        1 => Just(
            TextFormat::BOLD
                .with(TextFormat::ITALIC)
                .with(TextFormat::STRIKETHROUGH)
                .with(TextFormat::CODE)
        ),
    ]
}

/// Text runs padded with spaces on either side.
fn spaced() -> impl Strategy<Value = String> {
    (" {0,2}", printable(), " {0,2}").prop_map(|(lead, core, trail)| format!("{lead}{core}{trail}"))
}

fn inline_spec() -> impl Strategy<Value = InlineSpec> {
    prop_oneof![
        4 => (printable(), format()).prop_map(|(text, format)| InlineSpec::Text(text, format)),
        1 => (spaced(), format()).prop_map(|(text, format)| InlineSpec::Text(text, format)),
        1 => (maybe_printable(), slug()).prop_map(|(label, slug)| InlineSpec::Link { label, slug }),
        1 => "[a-zA-Z_][a-zA-Z0-9_]{0,6}".prop_map(InlineSpec::Hashtag),
        1 => (maybe_printable(), slug()).prop_map(|(alt, slug)| InlineSpec::Image { alt, slug }),
    ]
}

pub fn inline_content() -> impl Strategy<Value = Vec<InlineSpec>> {
    vec(inline_spec(), 1..5)
}

fn list_type() -> impl Strategy<Value = ListType> {
    prop_oneof![
        Just(ListType::Bullet),
        Just(ListType::Number),
        Just(ListType::Check)
    ]
}

fn flat_list() -> impl Strategy<Value = ListSpec> {
    (list_type(), 1u32..5, vec((any::<bool>(), inline_content()), 1..4)).prop_map(
        |(list_type, start, items)| ListSpec {
            list_type,
            start: if list_type == ListType::Number { start } else { 1 },
            items: items
                .into_iter()
                .map(|(checked, content)| {
                    let checked = (list_type == ListType::Check).then_some(checked);
                    (checked, content, None)
                })
                .collect(),
        },
    )
}

fn list_spec() -> impl Strategy<Value = ListSpec> {
    (flat_list(), vec(prop::option::of(flat_list()), 1..4)).prop_map(|(mut list, nested)| {
        for (item, nested) in list.items.iter_mut().zip(nested) {
            item.2 = nested.map(Box::new);
        }
        list
    })
}

fn video() -> impl Strategy<Value = VideoRef> {
    prop_oneof![
        "[A-Za-z0-9]{11}".prop_map(|id| VideoRef::new(VideoPlatform::Youtube, id)),
        "[1-9][0-9]{5,9}".prop_map(|id| VideoRef::new(VideoPlatform::Vimeo, id)),
    ]
}

fn carousel_source() -> impl Strategy<Value = String> {
    prop_oneof![
        slug().prop_map(|slug| format!("https://img.example.com/{slug}.png")),
        "([A-Za-z0-9]{4}){1,6}".prop_map(|payload| format!("data:image/png;base64,{payload}")),
    ]
}

pub fn block_spec() -> impl Strategy<Value = BlockSpec> {
    prop_oneof![
        3 => inline_content().prop_map(BlockSpec::Paragraph),
        1 => (1u8..=6, inline_content())
            .prop_map(|(level, content)| BlockSpec::Heading(level, content)),
        1 => inline_content().prop_map(BlockSpec::Quote),
        1 => (prop::option::of("[a-z]{1,5}"), vec("[ -~]{0,12}", 1..3))
            .prop_map(|(language, lines)| BlockSpec::Code(language, lines.join("\n"))),
        1 => list_spec().prop_map(BlockSpec::List),
        1 => (1usize..4, 1usize..4)
            .prop_flat_map(|(rows, cols)| vec(vec(inline_content(), cols), rows))
            .prop_map(BlockSpec::Table),
        1 => Just(BlockSpec::Rule),
        1 => video().prop_map(BlockSpec::Video),
        1 => vec((carousel_source(), maybe_printable()), 0..4).prop_map(BlockSpec::Carousel),
        1 => (any::<bool>(), vec(inline_spec(), 0..4), vec(inline_content(), 0..3))
            .prop_map(|(open, title, paragraphs)| BlockSpec::Collapsible {
                open,
                title,
                paragraphs,
            }),
    ]
}

pub fn document_specs() -> impl Strategy<Value = Vec<BlockSpec>> {
    vec(block_spec(), 0..8)
}

fn append_inline(doc: &mut Document, parent: NodeKey, content: &[InlineSpec]) {
    for spec in content {
        match spec {
            InlineSpec::Text(text, format) => {
                doc.append_new(parent, NodeKind::formatted(text.clone(), *format))
                    .unwrap();
            }
            InlineSpec::Link { label, slug } => {
                let link = doc
                    .append_new(
                        parent,
                        NodeKind::Link {
                            url: format!("https://example.com/{slug}"),
                        },
                    )
                    .unwrap();
                doc.append_new(link, NodeKind::text(label.clone())).unwrap();
            }
            InlineSpec::Hashtag(tag) => {
                doc.append_new(parent, NodeKind::Hashtag { tag: tag.clone() })
                    .unwrap();
            }
            InlineSpec::Image { alt, slug } => {
                doc.append_new(
                    parent,
                    NodeKind::image(format!("https://img.example.com/{slug}.png"), alt.clone()),
                )
                .unwrap();
            }
        }
    }
}

fn append_list(doc: &mut Document, parent: NodeKey, spec: &ListSpec) {
    let list = doc
        .append_new(
            parent,
            NodeKind::List {
                list_type: spec.list_type,
                start: spec.start,
            },
        )
        .unwrap();
    for (checked, content, nested) in &spec.items {
        let item = doc
            .append_new(list, NodeKind::ListItem { checked: *checked })
            .unwrap();
        append_inline(doc, item, content);
        if let Some(nested) = nested {
            append_list(doc, item, nested);
        }
    }
}

pub fn build(specs: &[BlockSpec]) -> Document {
    let mut doc = Document::new();
    let root = doc.root();
    for spec in specs {
        match spec {
            BlockSpec::Paragraph(content) => {
                let paragraph = doc.append_new(root, NodeKind::Paragraph).unwrap();
                append_inline(&mut doc, paragraph, content);
            }
            BlockSpec::Heading(level, content) => {
                let heading = doc.append_new(root, NodeKind::heading(*level)).unwrap();
                append_inline(&mut doc, heading, content);
            }
            BlockSpec::Quote(content) => {
                let quote = doc.append_new(root, NodeKind::Quote).unwrap();
                append_inline(&mut doc, quote, content);
            }
            BlockSpec::Code(language, code) => {
                let block = doc
                    .append_new(
                        root,
                        NodeKind::CodeBlock {
                            language: language.clone(),
                        },
                    )
                    .unwrap();
                doc.append_new(block, NodeKind::text(code.clone())).unwrap();
            }
            BlockSpec::List(list) => append_list(&mut doc, root, list),
            BlockSpec::Table(rows) => {
                let table = doc.append_new(root, NodeKind::Table).unwrap();
                for (index, cells) in rows.iter().enumerate() {
                    let row = doc.append_new(table, NodeKind::TableRow).unwrap();
                    for content in cells {
                        let cell = doc
                            .append_new(row, NodeKind::TableCell { header: index == 0 })
                            .unwrap();
                        append_inline(&mut doc, cell, content);
                    }
                }
            }
            BlockSpec::Rule => {
                doc.append_new(root, NodeKind::HorizontalRule).unwrap();
            }
            BlockSpec::Video(video) => {
                doc.append_new(root, NodeKind::video(video.clone())).unwrap();
            }
            BlockSpec::Carousel(images) => {
                let carousel = Carousel::from_images(
                    images
                        .iter()
                        .map(|(src, alt)| CarouselImage::from_source(src.clone(), alt.clone()))
                        .collect(),
                );
                doc.append_new(root, NodeKind::Carousel(carousel)).unwrap();
            }
            BlockSpec::Collapsible {
                open,
                title,
                paragraphs,
            } => {
                let container = doc
                    .append_new(root, NodeKind::CollapsibleContainer { is_open: *open })
                    .unwrap();
                let (title_key, content) = doc.collapsible_parts(container).unwrap();
                append_inline(&mut doc, title_key, title);
                for inline in paragraphs {
                    let paragraph = doc.append_new(content, NodeKind::Paragraph).unwrap();
                    append_inline(&mut doc, paragraph, inline);
                }
            }
        }
    }
    doc
}

pub fn documents() -> impl Strategy<Value = Document> {
    document_specs().prop_map(|specs| build(&specs))
}
