#![no_main]

use libfuzzer_sys::fuzz_target;

use speakdown::text::{markdown_to_text, sanitize, SymbolSet};

fuzz_target!(|data: &str| {
    // Arbitrary Markdown must never panic the extractor, and the sanitizer
    // must accept whatever it produces.
    let text = markdown_to_text(data);
    let _ = sanitize(&text, &SymbolSet::all());
});
