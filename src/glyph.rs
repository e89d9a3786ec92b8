// src/glyph.rs

//! Defines the `Glyph` type and its packed attribute word.
//!
//! A `Glyph` is a single character cell: one display code point plus a
//! 32-bit attribute word carrying the colors and styling flags. The packed
//! word is the canonical representation; call sites go through the named
//! accessors rather than twiddling bits themselves.

use bitflags::bitflags;
use std::fmt;

/// Color index meaning "default background".
pub const DEFAULT_BG: u16 = 256;
/// Color index meaning "default foreground".
pub const DEFAULT_FG: u16 = 257;

/// Mask for a 9-bit color index field.
const COLOR_MASK: u32 = 0x1FF;
/// Bit offset of the foreground index within the packed word.
const FG_SHIFT: u32 = 9;
/// Bit offset of the styling flags within the packed word.
const FLAGS_SHIFT: u32 = 18;

bitflags! {
    /// Glyph styling flags, stored in the high bits of the attribute word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AttrFlags: u16 {
        const REVERSE   = 1 << 0;
        const UNDERLINE = 1 << 1;
        const BOLD      = 1 << 2;
        const GFX       = 1 << 3;
        const ITALIC    = 1 << 4;
        const BLINK     = 1 << 5;
    }
}

/// A packed glyph attribute word.
///
/// Layout: bits 0-8 hold the background color index (0-511, where
/// [`DEFAULT_BG`] means "default"), bits 9-17 the foreground index
/// ([`DEFAULT_FG`] means "default"), and bits 18 and up the
/// [`AttrFlags`] bitmask.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attr(u32);

impl Attr {
    /// Builds an attribute word from its three fields.
    #[must_use]
    pub fn new(fg: u16, bg: u16, flags: AttrFlags) -> Self {
        let mut attr = Attr(0);
        attr.set_fg(fg);
        attr.set_bg(bg);
        attr.set_flags(flags);
        attr
    }

    /// The raw packed word.
    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Reconstructs an attribute from a raw packed word.
    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        Attr(bits)
    }

    /// Background color index.
    #[must_use]
    pub fn bg(self) -> u16 {
        (self.0 & COLOR_MASK) as u16
    }

    /// Foreground color index.
    #[must_use]
    pub fn fg(self) -> u16 {
        ((self.0 >> FG_SHIFT) & COLOR_MASK) as u16
    }

    /// Styling flags.
    #[must_use]
    pub fn flags(self) -> AttrFlags {
        AttrFlags::from_bits_truncate((self.0 >> FLAGS_SHIFT) as u16)
    }

    pub fn set_bg(&mut self, bg: u16) {
        self.0 = (self.0 & !COLOR_MASK) | (u32::from(bg) & COLOR_MASK);
    }

    pub fn set_fg(&mut self, fg: u16) {
        self.0 = (self.0 & !(COLOR_MASK << FG_SHIFT)) | ((u32::from(fg) & COLOR_MASK) << FG_SHIFT);
    }

    pub fn set_flags(&mut self, flags: AttrFlags) {
        self.0 = (self.0 & ((1 << FLAGS_SHIFT) - 1)) | (u32::from(flags.bits()) << FLAGS_SHIFT);
    }

    pub fn insert_flags(&mut self, flags: AttrFlags) {
        self.set_flags(self.flags() | flags);
    }

    pub fn remove_flags(&mut self, flags: AttrFlags) {
        self.set_flags(self.flags() - flags);
    }
}

impl Default for Attr {
    /// Default colors, no styling. This is the SGR-reset state.
    fn default() -> Self {
        Attr::new(DEFAULT_FG, DEFAULT_BG, AttrFlags::empty())
    }
}

impl fmt::Debug for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attr")
            .field("fg", &self.fg())
            .field("bg", &self.bg())
            .field("flags", &self.flags())
            .finish()
    }
}

/// A single terminal grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    /// Packed visual attributes.
    pub attr: Attr,
    /// The display code point, post character-set translation.
    pub ch: char,
}

impl Glyph {
    /// A blank (space) cell carrying the given attributes.
    #[must_use]
    pub fn blank(attr: Attr) -> Self {
        Glyph { attr, ch: ' ' }
    }
}

impl Default for Glyph {
    fn default() -> Self {
        Glyph::blank(Attr::default())
    }
}
