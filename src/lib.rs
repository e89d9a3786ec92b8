// src/lib.rs

//! A reusable VT-series terminal emulator library.
//!
//! `vtscreen` consumes the byte stream a pty produces — the same stream
//! a DEC VT100/VT220/xterm-compatible terminal would consume — and
//! maintains a faithful in-memory model of what such a terminal would
//! display: a grid of styled glyphs, scrollback, a cursor, character
//! sets, mode flags, tab stops, a scroll region, and a window title.
//!
//! The work happens in a two-stage pipeline:
//!
//! 1. [`ansi::Parser`] decodes C0/C1 controls, ESC introducers, CSI
//!    sequences with parameters and modifier bytes, ST/BEL-framed
//!    string sequences, and character-set designations into semantic
//!    [`ansi::Command`]s.
//! 2. [`term::screen::Screen`] consumes those commands and mutates the
//!    grid, cursor, modes, scroll region, tabs, and alternate-screen
//!    slot, tracking a dirty row interval.
//!
//! [`Term`] ties the stages together, forwards reply bytes (device
//! attributes, cursor reports) to the pty, and notifies observers:
//!
//! ```
//! use vtscreen::{Term, TermConfig};
//!
//! let mut term = Term::new(TermConfig { cols: 80, rows: 24, ..TermConfig::default() }, Vec::<u8>::new());
//! term.process(b"hello \x1b[1mworld\x1b[0m").unwrap();
//! assert_eq!(term.cursor().x, 11);
//! ```

pub mod ansi;
pub mod glyph;
pub mod term;

mod error;

pub use ansi::{Parser, ParserOptions};
pub use error::Error;
pub use glyph::{Attr, AttrFlags, Glyph, DEFAULT_BG, DEFAULT_FG};
pub use term::cursor::{Cursor, CursorState};
pub use term::modes::TermMode;
pub use term::screen::Row;
pub use term::{Term, TermConfig, TermObserver};
