// src/term/action.rs

//! Actions the screen model hands back to the facade.
//!
//! Interpreting a command mutates the screen in place; anything with an
//! effect outside the grid — reply bytes for the pty, an observer
//! notification — comes back as an `EmulatorAction` and is dispatched
//! synchronously, before the next command is interpreted.

/// An externally visible effect of one interpreted command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmulatorAction {
    /// Reply bytes to forward to the pty.
    WritePty(Vec<u8>),
    /// The window title changed (OSC 0/2).
    SetTitle(String),
    /// The alternate screen was entered (`true`) or left (`false`).
    AlternateScreen(bool),
    /// The geometry changed (DECCOLM or an external resize).
    Resized { cols: usize, rows: usize },
    /// BEL was received.
    RingBell,
}
