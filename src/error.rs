// src/error.rs

//! Crate error type.

use thiserror::Error;

/// Errors surfaced to the host.
///
/// Everything else the stream can throw at the emulator (unknown
/// sequences, malformed UTF-8, oversized string sequences) is handled
/// locally with logging and never fails the stream.
#[derive(Debug, Error)]
pub enum Error {
    /// A parse routine consumed no input and changed no state. This is a
    /// bug in the parser, not a property of the input; the stream cannot
    /// make progress past it.
    #[error("vt parser made no progress ({routine} routine at byte offset {pos})")]
    ParserStuck {
        /// Name of the routine that stalled.
        routine: &'static str,
        /// Byte offset into the current chunk.
        pos: usize,
    },
}
