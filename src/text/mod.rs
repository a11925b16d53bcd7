//! Text preparation
//!
//! Everything that happens to a document before it reaches a provider:
//!
//! - **extract**: Markdown to plain text
//! - **sanitize**: removal of leftover markup symbols the user chose to exclude
//! - **chunk**: positional splitting into bounded-length chunks

pub mod chunk;
pub mod extract;
pub mod sanitize;

pub use chunk::{split, Chunk};
pub use extract::markdown_to_text;
pub use sanitize::{sanitize, Symbol, SymbolSet};

use thiserror::Error;

/// Text preparation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextError {
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),
}

/// Result type for text operations
pub type Result<T> = std::result::Result<T, TextError>;
