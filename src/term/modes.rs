// src/term/modes.rs

//! Terminal mode flags and the mode-related parameter enums.

use bitflags::bitflags;
use log::warn;

bitflags! {
    /// The terminal mode word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TermMode: u32 {
        /// Autowrap (DECAWM).
        const WRAP        = 1 << 0;
        /// Insert/replace (IRM).
        const INSERT      = 1 << 1;
        /// Application keypad (DECKPAM).
        const APPKEYPAD   = 1 << 2;
        /// The alternate screen is active.
        const ALTSCREEN   = 1 << 3;
        /// Linefeed implies carriage return (LNM).
        const CRLF        = 1 << 4;
        /// Mouse button reporting requested (X10/VT200).
        const MOUSEBTN    = 1 << 5;
        /// Mouse motion reporting requested.
        const MOUSEMOTION = 1 << 6;
        /// Reverse video (DECSCNM).
        const REVERSE     = 1 << 7;
        /// Keyboard action mode (KAM).
        const KBDLOCK     = 1 << 8;
        /// Cursor hidden (inverse of DECTCEM).
        const HIDE        = 1 << 9;
        /// Send/receive mode (SRM).
        const ECHO        = 1 << 10;
        /// Application cursor keys (DECCKM).
        const APPCURSOR   = 1 << 11;
        /// SGR mouse coordinate encoding requested.
        const MOUSESGR    = 1 << 12;
    }
}

impl Default for TermMode {
    fn default() -> Self {
        TermMode::WRAP
    }
}

/// Erase extents for ED and EL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseMode {
    /// From the cursor to the end of the screen/line.
    ToEnd,
    /// From the start of the screen/line to the cursor.
    ToStart,
    /// The whole screen/line.
    All,
    /// "Erase saved lines" (ED only); treated as a full clear.
    Scrollback,
    Unknown,
}

impl From<u16> for EraseMode {
    fn from(value: u16) -> Self {
        match value {
            0 => EraseMode::ToEnd,
            1 => EraseMode::ToStart,
            2 => EraseMode::All,
            3 => EraseMode::Scrollback,
            _ => {
                warn!("unknown erase mode value: {}", value);
                EraseMode::Unknown
            }
        }
    }
}

/// TBC parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabClearMode {
    /// Clear the tab stop at the cursor column.
    CurrentColumn,
    /// Clear every tab stop.
    All,
    Unsupported,
}

impl From<u16> for TabClearMode {
    fn from(value: u16) -> Self {
        match value {
            0 => TabClearMode::CurrentColumn,
            3 => TabClearMode::All,
            _ => {
                warn!("unsupported tab clear mode value: {}", value);
                TabClearMode::Unsupported
            }
        }
    }
}

/// ANSI (SM/RM) mode numbers the screen recognizes.
pub const ANSI_MODE_KBDLOCK: u16 = 2;
pub const ANSI_MODE_INSERT: u16 = 4;
pub const ANSI_MODE_ECHO: u16 = 12;
pub const ANSI_MODE_CRLF: u16 = 20;

/// DEC private (DECSET/DECRST) mode numbers the screen recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecMode {
    /// `?1`: application cursor keys.
    CursorKeys,
    /// `?3`: 132-column mode (DECCOLM).
    Column132,
    /// `?5`: reverse video (DECSCNM).
    ReverseVideo,
    /// `?6`: origin mode (DECOM).
    Origin,
    /// `?7`: autowrap (DECAWM).
    AutoWrap,
    /// `?12`: cursor blink.
    CursorBlink,
    /// `?25`: cursor visible (DECTCEM).
    CursorVisible,
    /// `?40`: allow 80 ↔ 132 switching.
    AllowWidthChange,
    /// `?45`: reverse wraparound.
    ReverseWrap,
    /// `?47`: alternate screen.
    AltScreen,
    /// `?67`: backarrow key sends backspace.
    BackspaceSendsBs,
    /// `?1000`: mouse button reporting.
    MouseButton,
    /// `?1002`: mouse motion reporting.
    MouseMotion,
    /// `?1006`: SGR mouse coordinates.
    MouseSgr,
    /// `?1010`: scroll to bottom on output.
    ScrollOnOutput,
    /// `?1011`: scroll to bottom on keystroke.
    ScrollOnKeystroke,
    /// `?1036`: meta sends escape.
    MetaSendsEscape,
    /// `?1039`: alt sends escape.
    AltSendsEscape,
    /// `?1047`: alternate screen (xterm).
    AltScreen1047,
    /// `?1048`: save/restore cursor.
    SaveCursor,
    /// `?1049`: save cursor, switch to cleared alternate screen.
    AltScreenSaveCursor,
}

impl DecMode {
    /// Maps a DECSET/DECRST parameter to a known mode.
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(DecMode::CursorKeys),
            3 => Some(DecMode::Column132),
            5 => Some(DecMode::ReverseVideo),
            6 => Some(DecMode::Origin),
            7 => Some(DecMode::AutoWrap),
            12 => Some(DecMode::CursorBlink),
            25 => Some(DecMode::CursorVisible),
            40 => Some(DecMode::AllowWidthChange),
            45 => Some(DecMode::ReverseWrap),
            47 => Some(DecMode::AltScreen),
            67 => Some(DecMode::BackspaceSendsBs),
            1000 => Some(DecMode::MouseButton),
            1002 => Some(DecMode::MouseMotion),
            1006 => Some(DecMode::MouseSgr),
            1010 => Some(DecMode::ScrollOnOutput),
            1011 => Some(DecMode::ScrollOnKeystroke),
            1036 => Some(DecMode::MetaSendsEscape),
            1039 => Some(DecMode::AltSendsEscape),
            1047 => Some(DecMode::AltScreen1047),
            1048 => Some(DecMode::SaveCursor),
            1049 => Some(DecMode::AltScreenSaveCursor),
            _ => None,
        }
    }
}
