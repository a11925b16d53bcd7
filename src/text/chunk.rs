//! Positional text chunker.
//!
//! Speech providers cap the length of a single request, so sanitized text is
//! cut into fixed-size pieces. The cut is purely by character count; word and
//! sentence boundaries are not respected.

use super::{Result, TextError};

/// A bounded slice of the document, synthesized as one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position; also the concatenation order of the audio.
    pub index: usize,
    pub text: String,
}

impl Chunk {
    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Split `text` into chunks of exactly `chunk_size` characters (the last one
/// may be shorter). Empty input yields no chunks.
pub fn split(text: &str, chunk_size: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(TextError::InvalidChunkSize);
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in text.char_indices() {
        if count == chunk_size {
            chunks.push(Chunk {
                index: chunks.len(),
                text: text[start..offset].to_string(),
            });
            start = offset;
            count = 0;
        }
        count += 1;
    }

    if start < text.len() {
        chunks.push(Chunk {
            index: chunks.len(),
            text: text[start..].to_string(),
        });
    }

    Ok(chunks)
}
