//! speakdown library
//!
//! Converts Markdown documents into a single spoken-audio file. The
//! [`pipeline`] module drives extraction, sanitizing, chunking, optional
//! language-model optimization, per-chunk speech synthesis and assembly,
//! and removes every temporary file before reporting the outcome.
//!
//! Optimized text is cached by content hash in [`cache`]; the API key used
//! for optimization is kept in the locally scoped [`credentials`] store.

pub mod audio;
pub mod cache;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod logging;
pub mod optimize;
pub mod pipeline;
pub mod text;
pub mod tts;
