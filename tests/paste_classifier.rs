use md_richtext::paste::{MarkdownSignal, apply_paste, markdown_signals};
use md_richtext::{
    ClipboardFile, ClipboardPayload, Document, Editor, EditorConfig, EditorError, MarkdownCodec,
    NodeKind, NodeType, PasteError, PasteOutcome, PasteStrategy, TextSelection, VideoPlatform,
    classify, looks_like_markdown,
};
use proptest::prelude::*;
use std::time::Instant;

fn block_types(doc: &Document) -> Vec<NodeType> {
    doc.children(doc.root())
        .iter()
        .filter_map(|key| doc.node_type(*key))
        .collect()
}

#[test]
fn test_bare_video_url_becomes_single_embed() {
    let mut doc = Document::new();
    let outcome = apply_paste(
        &mut doc,
        &MarkdownCodec::new(),
        None,
        &ClipboardPayload::text("https://youtu.be/dQw4w9WgXcQ"),
        u64::MAX,
    )
    .unwrap();

    let PasteOutcome::Video(node) = outcome else {
        panic!("expected a video embed, got {outcome:?}");
    };
    assert_eq!(block_types(&doc), vec![NodeType::VideoEmbed]);
    let video = doc.kind(node).and_then(NodeKind::video_ref).unwrap();
    assert_eq!(video.platform, VideoPlatform::Youtube);
    assert_eq!(video.video_id, "dQw4w9WgXcQ");
    assert!(!doc.iter().any(|node| node.node_type() == NodeType::Link));
}

#[test]
fn test_plain_prose_declines() {
    assert_eq!(
        classify(&ClipboardPayload::text("Hello world")),
        PasteStrategy::Decline
    );
    let mut doc = Document::new();
    let outcome = apply_paste(
        &mut doc,
        &MarkdownCodec::new(),
        None,
        &ClipboardPayload::text("Hello world"),
        u64::MAX,
    )
    .unwrap();
    assert!(outcome.is_declined());
    assert!(doc.is_empty());
}

#[test]
fn test_video_paste_replaces_selection() {
    let mut doc = Document::new();
    let root = doc.root();
    let paragraph = doc.append_new(root, NodeKind::Paragraph).unwrap();
    let text = doc
        .append_new(paragraph, NodeKind::text("see LINK here"))
        .unwrap();

    apply_paste(
        &mut doc,
        &MarkdownCodec::new(),
        Some(TextSelection::range(text, 4, 8)),
        &ClipboardPayload::text("https://vimeo.com/76979871\n"),
        u64::MAX,
    )
    .unwrap();

    assert_eq!(
        block_types(&doc),
        vec![NodeType::Paragraph, NodeType::VideoEmbed, NodeType::Paragraph]
    );
    let blocks = doc.children(doc.root()).to_vec();
    assert_eq!(doc.text_content(blocks[0]), "see ");
    assert_eq!(doc.text_content(blocks[2]), " here");
}

#[test]
fn test_multi_line_text_with_video_url_is_not_an_embed() {
    let payload = ClipboardPayload::text("https://youtu.be/dQw4w9WgXcQ\nsecond line");
    assert_eq!(classify(&payload), PasteStrategy::Decline);
}

#[test]
fn test_weak_and_strong_signals() {
    assert!(!looks_like_markdown("some **bold** words"));
    assert!(looks_like_markdown("# Title\n\nsome **bold** words"));
    assert!(looks_like_markdown("![diagram](https://img.example.com/a.png)"));
    assert!(looks_like_markdown("```\nlet x = 1;\n```"));
    assert!(looks_like_markdown(
        "<details><summary>More</summary>hidden</details>"
    ));
    assert!(!looks_like_markdown("<details> is an HTML tag"));

    let signals = markdown_signals("- item\n> quote");
    assert_eq!(signals, vec![MarkdownSignal::List, MarkdownSignal::Blockquote]);
}

#[test]
fn test_editor_markdown_paste_appends_and_schedules() {
    let mut editor = Editor::default();
    editor.initialize("Intro");
    assert!(!editor.pipeline().is_pending());

    let outcome = editor
        .paste(
            &ClipboardPayload::text("## Steps\n\n- first\n- second"),
            Instant::now(),
        )
        .unwrap();
    assert!(matches!(outcome, PasteOutcome::Markdown(ref blocks) if blocks.len() == 2));
    assert_eq!(
        block_types(editor.document()),
        vec![NodeType::Paragraph, NodeType::Heading, NodeType::List]
    );
    assert!(editor.pipeline().is_pending());
}

#[test]
fn test_editor_rejects_video_file_without_change() {
    let mut editor = Editor::default();
    editor.initialize("Intro");
    let before = editor.to_markdown();

    let payload = ClipboardPayload::file(ClipboardFile::new("clip.mp4", "video/mp4", vec![0; 16]));
    let err = editor.paste(&payload, Instant::now()).unwrap_err();
    assert!(matches!(
        err,
        EditorError::Paste(PasteError::UnsupportedMediaType(mime)) if mime == "video/mp4"
    ));
    assert_eq!(editor.to_markdown(), before);
    assert!(!editor.pipeline().is_pending());
}

#[test]
fn test_editor_rejects_oversized_image() {
    let mut editor = Editor::with_config(EditorConfig::default().with_max_image_bytes(8));
    editor.initialize("");

    let payload =
        ClipboardPayload::file(ClipboardFile::new("big.png", "image/png", vec![0; 9]));
    let err = editor.paste(&payload, Instant::now()).unwrap_err();
    assert!(matches!(
        err,
        EditorError::Paste(PasteError::ImageTooLarge { size: 9, limit: 8 })
    ));
    assert!(editor.document().is_empty());
    assert!(editor.media().is_empty());
}

#[test]
fn test_editor_image_paste_is_tracked() {
    let mut editor = Editor::default();
    editor.initialize("");

    let payload = ClipboardPayload::text("ignored **text** # here")
        .with_file(ClipboardFile::new("dot.png", "image/png", vec![1, 2, 3]));
    let outcome = editor.paste(&payload, Instant::now()).unwrap();
    assert!(matches!(outcome, PasteOutcome::Image(_)));
    assert_eq!(editor.media().len(), 1);
    assert_eq!(editor.payload_usage().total_bytes, 3);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(proptest_config::cases()))]
    #[test]
    fn prop_plain_words_decline(words in proptest::collection::vec("[A-Za-z]{1,10}", 1..12)) {
        let text = words.join(" ");
        prop_assert_eq!(classify(&ClipboardPayload::text(text)), PasteStrategy::Decline);
    }

    #[test]
    fn prop_youtube_urls_embed(id in "[A-Za-z0-9_-]{11}") {
        for url in [
            format!("https://youtu.be/{id}"),
            format!("https://www.youtube.com/watch?v={id}"),
            format!("  https://youtube.com/shorts/{id}  "),
        ] {
            let strategy = classify(&ClipboardPayload::text(url));
            let PasteStrategy::VideoEmbed(video) = strategy else {
                return Err(TestCaseError::fail(format!("not an embed: {strategy:?}")));
            };
            prop_assert_eq!(video.video_id, id.clone());
        }
    }

    #[test]
    fn prop_image_file_always_wins(text in "[ -~\n]{0,80}") {
        let payload = ClipboardPayload::text(text)
            .with_file(ClipboardFile::new("a.txt", "text/plain", vec![1]))
            .with_file(ClipboardFile::new("b.png", "image/png", vec![1]));
        prop_assert_eq!(classify(&payload), PasteStrategy::Image { file_index: 1 });
    }
}
