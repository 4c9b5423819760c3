#![no_main]

use libfuzzer_sys::fuzz_target;
use md_richtext::paste::apply_paste;
use md_richtext::{ClipboardPayload, Document, MarkdownCodec};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let mut doc = Document::new();
    let _ = apply_paste(
        &mut doc,
        &MarkdownCodec::new(),
        None,
        &ClipboardPayload::text(text.as_ref()),
        u64::MAX,
    );
});
