// src/term/mod.rs

//! Stage two of the pipeline plus the public facade.
//!
//! [`Term`] wires the parser to the screen model and to the host: it
//! feeds byte chunks through the parser, interprets the resulting
//! commands, forwards reply bytes to the pty, and notifies subscribed
//! observers. `alternate`, `title`, `resize`, and `bell` fire
//! synchronously at the triggering sequence; `refresh` fires at most
//! once per processed chunk, after all mutations from that chunk are in
//! place.

pub mod action;
pub mod cursor;
pub mod modes;
pub mod screen;

use std::collections::VecDeque;
use std::io;

use log::{trace, warn};

use crate::ansi::{Parser, ParserOptions};
use crate::error::Error;
use crate::term::action::EmulatorAction;
use crate::term::cursor::Cursor;
use crate::term::modes::TermMode;
use crate::term::screen::{Row, Screen};

/// Construction parameters for [`Term`].
#[derive(Debug, Clone)]
pub struct TermConfig {
    pub cols: usize,
    pub rows: usize,
    /// Honor DECCOLM (`?3`) 80/132-column switching.
    pub allow_width_change: bool,
    pub parser: ParserOptions,
}

impl Default for TermConfig {
    fn default() -> Self {
        TermConfig {
            cols: 80,
            rows: 24,
            allow_width_change: true,
            parser: ParserOptions::default(),
        }
    }
}

/// Receives state-change notifications. All methods default to no-ops so
/// implementations subscribe to just what they need.
pub trait TermObserver {
    /// Something in the buffer changed. `dirty` is the inclusive interval
    /// of absolute buffer rows; `lines` is the corresponding slice.
    fn refresh(&mut self, dirty: (usize, usize), lines: &[Row], cursor: Cursor) {
        let _ = (dirty, lines, cursor);
    }

    /// The alternate screen was entered or left.
    fn alternate(&mut self, on: bool) {
        let _ = on;
    }

    /// The window title changed.
    fn title(&mut self, title: &str) {
        let _ = title;
    }

    /// The geometry changed.
    fn resize(&mut self, cols: usize, rows: usize) {
        let _ = (cols, rows);
    }

    /// BEL was received.
    fn bell(&mut self) {}
}

/// The terminal emulator: parser, screen model, pty write channel, and
/// observer registry.
///
/// The pty is modeled as the outbound half of the byte channel; inbound
/// bytes are pushed by the host through [`Term::process`].
pub struct Term<W: io::Write> {
    parser: Parser,
    screen: Screen,
    pty: W,
    observers: Vec<Box<dyn TermObserver>>,
}

impl<W: io::Write> Term<W> {
    pub fn new(config: TermConfig, pty: W) -> Self {
        Term {
            parser: Parser::new(config.parser),
            screen: Screen::new(config.cols, config.rows, config.allow_width_change),
            pty,
            observers: Vec::new(),
        }
    }

    /// Registers an observer for refresh/alternate/title/resize events.
    pub fn subscribe(&mut self, observer: Box<dyn TermObserver>) {
        self.observers.push(observer);
    }

    /// Processes one chunk of pty output to completion, dispatching all
    /// resulting notifications before returning.
    pub fn process(&mut self, bytes: &[u8]) -> Result<(), Error> {
        trace!("processing {} bytes", bytes.len());
        let commands = self.parser.feed(bytes)?;
        for command in commands {
            if let Some(action) = self.screen.interpret(command) {
                self.dispatch(action);
            }
        }
        self.flush_refresh();
        Ok(())
    }

    /// Changes the geometry. Degenerate values clamp to 1x1.
    pub fn resize(&mut self, cols: usize, rows: usize) {
        if let Some(action) = self.screen.resize(cols, rows, false) {
            self.dispatch(action);
        }
        self.flush_refresh();
    }

    // --- Accessors ---

    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.screen.cursor()
    }

    /// The whole line buffer, scrollback included.
    #[must_use]
    pub fn buffer(&self) -> &VecDeque<Row> {
        self.screen.buffer()
    }

    #[must_use]
    pub fn title(&self) -> &str {
        self.screen.title()
    }

    #[must_use]
    pub fn mode(&self) -> TermMode {
        self.screen.mode()
    }

    #[must_use]
    pub fn pty(&self) -> &W {
        &self.pty
    }

    // --- Internal dispatch ---

    fn dispatch(&mut self, action: EmulatorAction) {
        match action {
            EmulatorAction::WritePty(bytes) => {
                if let Err(err) = self.pty.write_all(&bytes) {
                    warn!("pty write failed: {}", err);
                }
            }
            EmulatorAction::SetTitle(title) => {
                for observer in &mut self.observers {
                    observer.title(&title);
                }
            }
            EmulatorAction::AlternateScreen(on) => {
                for observer in &mut self.observers {
                    observer.alternate(on);
                }
            }
            EmulatorAction::Resized { cols, rows } => {
                for observer in &mut self.observers {
                    observer.resize(cols, rows);
                }
            }
            EmulatorAction::RingBell => {
                for observer in &mut self.observers {
                    observer.bell();
                }
            }
        }
    }

    /// Emits the coalesced refresh for this chunk, if anything changed.
    fn flush_refresh(&mut self) {
        let Some((lo, hi)) = self.screen.take_dirty() else {
            return;
        };
        let Term {
            screen, observers, ..
        } = self;
        let lines: Vec<Row> = screen
            .buffer()
            .iter()
            .skip(lo)
            .take(hi - lo + 1)
            .cloned()
            .collect();
        let cursor = screen.cursor();
        for observer in observers.iter_mut() {
            observer.refresh((lo, hi), &lines, cursor);
        }
    }
}
