// src/ansi/commands.rs

//! Semantic events emitted by the VT parser and consumed by the screen.

use crate::glyph::{DEFAULT_BG, DEFAULT_FG};
use log::warn;
use std::iter::Peekable;
use std::slice::Iter;

// --- Fixed reply payloads ---

/// Primary DA / DECID reply: VT100 with the advanced video option.
pub const DA1_RESPONSE: &[u8] = b"\x1b[?1;2c";
/// Secondary DA reply.
pub const DA2_RESPONSE: &[u8] = b"\x1b[>0;256;0c";
/// DSR 5 reply: operating status OK.
pub const DSR_RESPONSE_OK: &[u8] = b"\x1b[0n";
/// DSR ?15 reply: no printer.
pub const DSR_RESPONSE_PRINTER: &[u8] = b"\x1b[?11n";
/// DSR ?25 reply: UDK locked.
pub const DSR_RESPONSE_UDK: &[u8] = b"\x1b[?21n";
/// DSR ?26 reply: North American keyboard.
pub const DSR_RESPONSE_KEYBOARD: &[u8] = b"\x1b[?27;1;0;0n";
/// DSR ?53 reply: no locator.
pub const DSR_RESPONSE_LOCATOR: &[u8] = b"\x1b[?50n";

// --- SGR parameter constants ---

pub const SGR_RESET: u16 = 0;
pub const SGR_BOLD: u16 = 1;
pub const SGR_ITALIC: u16 = 3;
pub const SGR_UNDERLINE: u16 = 4;
pub const SGR_BLINK_SLOW: u16 = 5;
pub const SGR_BLINK_RAPID: u16 = 6;
pub const SGR_REVERSE: u16 = 7;
pub const SGR_CONCEAL: u16 = 8;

pub const SGR_NORMAL_INTENSITY: u16 = 22;
pub const SGR_NO_ITALIC: u16 = 23;
pub const SGR_NO_UNDERLINE: u16 = 24;
pub const SGR_NO_BLINK: u16 = 25;
pub const SGR_NO_REVERSE: u16 = 27;
pub const SGR_NO_CONCEAL: u16 = 28;

pub const SGR_FG_BLACK: u16 = 30;
pub const SGR_FG_WHITE: u16 = 37;
pub const SGR_EXTENDED_COLOR_FG: u16 = 38;
pub const SGR_FG_DEFAULT: u16 = 39;
pub const SGR_BG_BLACK: u16 = 40;
pub const SGR_BG_WHITE: u16 = 47;
pub const SGR_EXTENDED_COLOR_BG: u16 = 48;
pub const SGR_BG_DEFAULT: u16 = 49;

pub const SGR_FG_BRIGHT_BLACK: u16 = 90;
pub const SGR_FG_BRIGHT_WHITE: u16 = 97;
pub const SGR_BG_BRIGHT_BLACK: u16 = 100;
pub const SGR_BG_BRIGHT_WHITE: u16 = 107;

/// SGR sub-parameter selecting a 256-color palette index.
pub const SGR_EXT_MODE_256_INDEX: u16 = 5;
/// SGR sub-parameter selecting an RGB true-color triple (unsupported).
pub const SGR_EXT_MODE_RGB: u16 = 2;

/// A single parsed SGR attribute.
///
/// Colors are palette indices; [`DEFAULT_FG`]/[`DEFAULT_BG`] denote the
/// terminal default colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Reset,
    Bold,
    NoBold,
    Italic,
    NoItalic,
    Underline,
    NoUnderline,
    Blink,
    NoBlink,
    Reverse,
    NoReverse,
    Conceal,
    NoConceal,
    Foreground(u16),
    Background(u16),
}

/// C0 control codes the screen reacts to. The parser handles the rest
/// (shifts, ESC, flow control) itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C0Control {
    Bell,
    Backspace,
    Tab,
    LineFeed,
    VerticalTab,
    FormFeed,
    CarriageReturn,
}

/// Two- and three-byte escape sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscCommand {
    /// IND: move down, scrolling at the region bottom.
    Index,
    /// NEL: move down and to column zero.
    NextLine,
    /// HTS: set a tab stop at the cursor column.
    SetTabStop,
    /// RI: move up, scrolling at the region top.
    ReverseIndex,
    /// DECSC.
    SaveCursor,
    /// DECRC.
    RestoreCursor,
    /// `ESC =`.
    KeypadApplicationMode,
    /// `ESC >`.
    KeypadNumericMode,
    /// RIS: hard reset.
    FullReset,
    /// DECALN: fill the screen with `E`.
    ScreenAlignmentTest,
}

/// Parametrized CSI commands. Counts carry their parsed argument with
/// the "missing or zero means one" defaulting already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsiCommand {
    /// ICH: insert `n` blank characters.
    InsertBlankChars(u16),
    CursorUp(u16),
    CursorDown(u16),
    CursorForward(u16),
    CursorBackward(u16),
    CursorNextLine(u16),
    CursorPrevLine(u16),
    /// CHA: move to column `n` (1-based).
    CursorColumn(u16),
    /// CUP/HVP: move to row, column (1-based).
    CursorPosition(u16, u16),
    /// VPA: move to row `n` (1-based), keeping the column.
    CursorRow(u16),
    /// CHT: forward `n` tab stops.
    ForwardTab(u16),
    /// CBT: backward `n` tab stops.
    BackwardTab(u16),
    /// ED with its raw mode parameter.
    EraseInDisplay(u16),
    /// EL with its raw mode parameter.
    EraseInLine(u16),
    InsertLines(u16),
    DeleteLines(u16),
    DeleteChars(u16),
    ScrollUp(u16),
    ScrollDown(u16),
    /// ECH: blank `n` characters at the cursor.
    EraseChars(u16),
    PrimaryDeviceAttributes,
    SecondaryDeviceAttributes,
    /// TBC with its raw mode parameter.
    TabClear(u16),
    SetMode(u16),
    ResetMode(u16),
    SetModePrivate(u16),
    ResetModePrivate(u16),
    SetGraphicsRendition(Vec<Attribute>),
    DeviceStatusReport { code: u16, private: bool },
    /// DECSTBM. `bottom == 0` means the last row.
    SetScrollingRegion { top: u16, bottom: u16 },
    SaveCursor,
    RestoreCursor,
    /// DECSTR.
    SoftReset,
}

/// Operating system commands the emulator acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OscCommand {
    /// OSC 0 / OSC 2.
    SetTitle(String),
    /// OSC 52 with a base64 payload, already decoded.
    SetClipboard(Vec<u8>),
    /// OSC 52 with a `?` payload.
    QueryClipboard,
}

/// A semantic event produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A run of printable text, already translated through the active
    /// character sets.
    Print(String),
    Control(C0Control),
    Esc(EscCommand),
    Csi(CsiCommand),
    Osc(OscCommand),
    /// Reply bytes originating in the parser itself (DECID).
    Write(Vec<u8>),
}

/// Folds an SGR parameter list into attributes.
///
/// An empty list is a reset. True-color (`38;2;r;g;b`) is recognized but
/// skipped, matching the crate's 256-color model.
pub(super) fn parse_sgr(params: &[u16]) -> Vec<Attribute> {
    let mut attrs = Vec::new();
    if params.is_empty() {
        attrs.push(Attribute::Reset);
        return attrs;
    }
    let mut iter = params.iter().peekable();
    while let Some(&param) = iter.next() {
        match param {
            SGR_RESET => attrs.push(Attribute::Reset),
            SGR_BOLD => attrs.push(Attribute::Bold),
            SGR_ITALIC => attrs.push(Attribute::Italic),
            SGR_UNDERLINE => attrs.push(Attribute::Underline),
            SGR_BLINK_SLOW | SGR_BLINK_RAPID => attrs.push(Attribute::Blink),
            SGR_REVERSE => attrs.push(Attribute::Reverse),
            SGR_CONCEAL => attrs.push(Attribute::Conceal),
            SGR_NORMAL_INTENSITY => attrs.push(Attribute::NoBold),
            SGR_NO_ITALIC => attrs.push(Attribute::NoItalic),
            SGR_NO_UNDERLINE => attrs.push(Attribute::NoUnderline),
            SGR_NO_BLINK => attrs.push(Attribute::NoBlink),
            SGR_NO_REVERSE => attrs.push(Attribute::NoReverse),
            SGR_NO_CONCEAL => attrs.push(Attribute::NoConceal),
            SGR_FG_BLACK..=SGR_FG_WHITE => {
                attrs.push(Attribute::Foreground(param - SGR_FG_BLACK));
            }
            SGR_FG_DEFAULT => attrs.push(Attribute::Foreground(DEFAULT_FG)),
            SGR_BG_BLACK..=SGR_BG_WHITE => {
                attrs.push(Attribute::Background(param - SGR_BG_BLACK));
            }
            SGR_BG_DEFAULT => attrs.push(Attribute::Background(DEFAULT_BG)),
            SGR_FG_BRIGHT_BLACK..=SGR_FG_BRIGHT_WHITE => {
                attrs.push(Attribute::Foreground(param - SGR_FG_BRIGHT_BLACK + 8));
            }
            SGR_BG_BRIGHT_BLACK..=SGR_BG_BRIGHT_WHITE => {
                attrs.push(Attribute::Background(param - SGR_BG_BRIGHT_BLACK + 8));
            }
            SGR_EXTENDED_COLOR_FG => {
                if let Some(index) = parse_extended_color(&mut iter) {
                    attrs.push(Attribute::Foreground(index));
                }
            }
            SGR_EXTENDED_COLOR_BG => {
                if let Some(index) = parse_extended_color(&mut iter) {
                    attrs.push(Attribute::Background(index));
                }
            }
            _ => {
                warn!("unknown SGR parameter: {}", param);
            }
        }
    }
    attrs
}

/// Parses the tail of a `38`/`48` extended color introducer. Returns a
/// palette index for the `5;N` form; the RGB form is consumed and dropped.
fn parse_extended_color(iter: &mut Peekable<Iter<u16>>) -> Option<u16> {
    match iter.next() {
        Some(&SGR_EXT_MODE_256_INDEX) => iter.next().and_then(|&index| {
            if index <= 255 {
                Some(index)
            } else {
                warn!("invalid 256-color index: {}", index);
                None
            }
        }),
        Some(&SGR_EXT_MODE_RGB) => {
            // Consume r, g, b so the remaining parameters stay aligned.
            iter.next();
            iter.next();
            iter.next();
            warn!("true-color SGR is not supported, ignoring");
            None
        }
        Some(other) => {
            warn!("unsupported extended color mode specifier: {}", other);
            None
        }
        None => {
            warn!("missing parameters for extended color");
            None
        }
    }
}
