#![no_main]

use libfuzzer_sys::fuzz_target;
use md_richtext::{from_markdown, to_markdown};

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    let Ok(doc) = from_markdown(&input) else {
        return;
    };
    let once = to_markdown(&doc);
    if let Ok(again) = from_markdown(&once) {
        let _ = to_markdown(&again);
    }
});
