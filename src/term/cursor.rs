// src/term/cursor.rs

//! Cursor position, attributes, and latched sub-state.

use crate::glyph::Attr;
use bitflags::bitflags;

bitflags! {
    /// Latched cursor sub-state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CursorState: u8 {
        /// The next printable wraps to the first column before it lands.
        const WRAPNEXT = 1 << 0;
        /// Row addresses are interpreted relative to the scroll region.
        const ORIGIN = 1 << 1;
    }
}

/// The cursor: grid position, the attributes new glyphs will carry, and
/// the wrap/origin latches. The whole struct doubles as the DECSC
/// snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    /// Column, `0..cols`.
    pub x: usize,
    /// Row in screen coordinates, `0..rows`.
    pub y: usize,
    /// Attributes applied to printed and cleared glyphs.
    pub attr: Attr,
    pub state: CursorState,
}

impl Cursor {
    #[must_use]
    pub fn wrap_pending(&self) -> bool {
        self.state.contains(CursorState::WRAPNEXT)
    }

    #[must_use]
    pub fn origin_relative(&self) -> bool {
        self.state.contains(CursorState::ORIGIN)
    }
}
