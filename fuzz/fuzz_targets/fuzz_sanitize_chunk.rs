#![no_main]

use libfuzzer_sys::fuzz_target;

use speakdown::text::{sanitize, split, Symbol, SymbolSet};

fuzz_target!(|input: (u16, u16, &str)| {
    let (mask, size, text) = input;

    let excluded: SymbolSet = Symbol::ALL
        .into_iter()
        .enumerate()
        .filter(|(i, _)| mask & (1u16 << i) != 0)
        .map(|(_, s)| s)
        .collect();
    let sanitized = sanitize(text, &excluded);

    // Chunking is lossless and never splits inside a character.
    let chunk_size = usize::from(size % 512) + 1;
    let chunks = split(&sanitized, chunk_size).expect("chunk size is non-zero");
    let rejoined: String = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(rejoined, sanitized);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.index, i);
        assert!(chunk.char_len() <= chunk_size);
    }
});
