#![no_main]

use libfuzzer_sys::fuzz_target;
use md_richtext::{MarkdownCodec, NodeRegistry, load_persisted};

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    let registry = NodeRegistry::with_builtin_kinds();
    if let Ok(doc) = load_persisted(&registry, &MarkdownCodec::new(), &input) {
        let persisted = registry
            .to_persisted_string(&doc)
            .expect("loaded documents serialize");
        let reloaded = registry
            .from_persisted_str(&persisted)
            .expect("serialized documents load");
        assert!(reloaded.structurally_eq(&doc));
    }
});
