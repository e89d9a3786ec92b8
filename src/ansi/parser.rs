// src/ansi/parser.rs

//! The VT escape-sequence state machine.
//!
//! Bytes go in through [`Parser::feed`]; semantic [`Command`]s come out.
//! The parser owns the character-set table, so text runs are translated
//! before they are emitted. Sequences split across chunks (CSI tails,
//! OSC strings, multi-byte UTF-8 code points) are carried over to the
//! next call.

use std::mem;
use std::str;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use super::base64;
use super::charset::{CharsetId, CharsetTable, G0, G1, G2, G3};
use super::commands::{
    parse_sgr, C0Control, Command, CsiCommand, EscCommand, OscCommand, DA1_RESPONSE,
};
use super::state::{Routine, ScanState, StringKind};
use crate::error::Error;

/// Substituted for malformed UTF-8 on the display.
const BAD_UTF8_REPLACEMENT: char = '?';

/// Tunable parser limits.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Wall-clock budget for an unterminated string sequence, measured
    /// from its first byte to any subsequent chunk.
    pub osc_time_limit: Duration,
    /// Maximum accumulated length of an OSC/DCS/PM/APC string.
    pub max_string_sequence: usize,
    /// Log unknown dispatch codes.
    pub warn: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            osc_time_limit: Duration::from_millis(2000),
            max_string_sequence: 1024,
            warn: true,
        }
    }
}

/// Stateful VT parser: consumes byte chunks, produces semantic commands.
#[derive(Debug)]
pub struct Parser {
    state: ScanState,
    charsets: CharsetTable,
    /// Tail of a multi-byte UTF-8 code point split at a chunk boundary.
    pending_utf8: Vec<u8>,
    /// Accumulated body of the string sequence under collection.
    string_buf: Vec<u8>,
    /// When the active string sequence started, for the time limit.
    string_started: Option<Instant>,
    /// An ESC was seen inside a string; the next byte decides ST or abort.
    string_esc: bool,
    opts: ParserOptions,
    commands: Vec<Command>,
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new(ParserOptions::default())
    }
}

impl Parser {
    pub fn new(opts: ParserOptions) -> Self {
        Parser {
            state: ScanState::default(),
            charsets: CharsetTable::default(),
            pending_utf8: Vec::new(),
            string_buf: Vec::new(),
            string_started: None,
            string_esc: false,
            opts,
            commands: Vec::new(),
        }
    }

    /// Processes one chunk of pty output and returns the commands it
    /// completed. A routine that fails to advance the scan state is a
    /// programming error and surfaces as [`Error::ParserStuck`].
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Command>, Error> {
        if let Routine::Str(kind) = self.state.routine {
            let expired = self
                .string_started
                .is_some_and(|t| t.elapsed() > self.opts.osc_time_limit);
            if expired {
                debug!("aborting {} string sequence: time limit exceeded", kind.name());
                self.abort_string();
                self.state.reset_routine();
            }
        }

        self.state.begin_chunk(bytes);
        while !self.state.is_complete() {
            let before = (self.state.pos(), self.state.routine);
            match self.state.routine {
                Routine::Ground => self.scan_ground(),
                Routine::Escape => self.scan_escape(),
                Routine::EscapeIntermediate(intro) => self.scan_escape_intermediate(intro),
                Routine::Csi => self.scan_csi(),
                Routine::Str(kind) => self.scan_string(kind),
            }
            if (self.state.pos(), self.state.routine) == before {
                return Err(Error::ParserStuck {
                    routine: self.state.routine.name(),
                    pos: self.state.pos(),
                });
            }
        }
        Ok(mem::take(&mut self.commands))
    }

    // --- Ground ---

    /// Scans up to the next control byte, emitting the preceding text as
    /// a translated print run, then dispatches the control.
    fn scan_ground(&mut self) {
        let rest = self.state.remaining();
        let ctl_rel = rest.iter().position(|&b| b < 0x20 || b == 0x7F);
        let run_len = ctl_rel.unwrap_or(rest.len());
        let run: Vec<u8> = rest[..run_len].to_vec();
        let ctl = ctl_rel.map(|i| rest[i]);

        self.state.advance(run_len);
        if !run.is_empty() || !self.pending_utf8.is_empty() {
            let text = self.decode_text(&run, ctl.is_none());
            if !text.is_empty() {
                let translated = self.charsets.translate(text);
                self.commands.push(Command::Print(translated));
            }
        }
        if let Some(byte) = ctl {
            self.state.advance(1);
            self.dispatch_control(byte);
        }
    }

    /// Decodes a text run as UTF-8, joining any tail left over from the
    /// previous chunk. Malformed sequences become `?`; an incomplete
    /// sequence at the end of the chunk is held for the next one.
    fn decode_text(&mut self, run: &[u8], at_chunk_end: bool) -> String {
        let mut bytes = mem::take(&mut self.pending_utf8);
        bytes.extend_from_slice(run);

        let mut out = String::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            match str::from_utf8(&bytes[i..]) {
                Ok(s) => {
                    out.push_str(s);
                    i = bytes.len();
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&bytes[i..i + valid]));
                    i += valid;
                    match e.error_len() {
                        Some(bad) => {
                            warn!("malformed UTF-8 in pty stream, substituting");
                            out.push(BAD_UTF8_REPLACEMENT);
                            i += bad;
                        }
                        None => {
                            if at_chunk_end {
                                self.pending_utf8 = bytes[i..].to_vec();
                            } else {
                                warn!("UTF-8 sequence interrupted by control byte");
                                out.push(BAD_UTF8_REPLACEMENT);
                            }
                            i = bytes.len();
                        }
                    }
                }
            }
        }
        out
    }

    /// The CC1 table: one C0 control byte.
    fn dispatch_control(&mut self, byte: u8) {
        match byte {
            0x07 => self.commands.push(Command::Control(C0Control::Bell)),
            0x08 => self.commands.push(Command::Control(C0Control::Backspace)),
            0x09 => self.commands.push(Command::Control(C0Control::Tab)),
            0x0A => self.commands.push(Command::Control(C0Control::LineFeed)),
            0x0B => self.commands.push(Command::Control(C0Control::VerticalTab)),
            0x0C => self.commands.push(Command::Control(C0Control::FormFeed)),
            0x0D => self
                .commands
                .push(Command::Control(C0Control::CarriageReturn)),
            0x0E => self.charsets.shift_gl(G1), // SO
            0x0F => self.charsets.shift_gl(G0), // SI
            0x1B => self.state.routine = Routine::Escape,
            // ENQ, CAN, SUB show up as a question mark.
            0x05 | 0x18 | 0x1A => self.commands.push(Command::Print(String::from("?"))),
            // NUL, XON, XOFF, DEL are dropped.
            0x00 | 0x11 | 0x13 | 0x7F => trace!("ignoring control byte 0x{:02X}", byte),
            _ => debug!("unhandled C0 control byte 0x{:02X}", byte),
        }
    }

    // --- Escape ---

    fn scan_escape(&mut self) {
        let Some(byte) = self.state.consume() else {
            return;
        };
        self.state.reset_routine();
        match byte {
            b'D' => self.commands.push(Command::Esc(EscCommand::Index)),
            b'E' => self.commands.push(Command::Esc(EscCommand::NextLine)),
            b'H' => self.commands.push(Command::Esc(EscCommand::SetTabStop)),
            b'M' => self.commands.push(Command::Esc(EscCommand::ReverseIndex)),
            b'Z' => self.commands.push(Command::Write(DA1_RESPONSE.to_vec())),
            b'7' => {
                self.charsets.save();
                self.commands.push(Command::Esc(EscCommand::SaveCursor));
            }
            b'8' => {
                self.charsets.restore();
                self.commands.push(Command::Esc(EscCommand::RestoreCursor));
            }
            b'[' => {
                self.state.reset_args();
                self.state.routine = Routine::Csi;
            }
            b']' => self.start_string(StringKind::Osc),
            b'P' => self.start_string(StringKind::Dcs),
            b'^' => self.start_string(StringKind::Pm),
            b'_' => self.start_string(StringKind::Apc),
            b'=' => self
                .commands
                .push(Command::Esc(EscCommand::KeypadApplicationMode)),
            b'>' => self
                .commands
                .push(Command::Esc(EscCommand::KeypadNumericMode)),
            b'c' => {
                self.charsets.reset();
                self.commands.push(Command::Esc(EscCommand::FullReset));
            }
            b'n' => self.charsets.shift_gl(G2), // LS2
            b'o' => self.charsets.shift_gl(G3), // LS3
            b'|' => self.charsets.shift_gr(G3), // LS3R
            b'}' => self.charsets.shift_gr(G2), // LS2R
            b'~' => self.charsets.shift_gr(G1), // LS1R
            b'(' | b')' | b'*' | b'+' | b'-' | b'.' | b'/' | b'#' => {
                self.state.routine = Routine::EscapeIntermediate(byte);
            }
            // ESC ESC: drop the first, reparse from ground.
            0x1B => trace!("ESC ESC, resetting"),
            _ => {
                if self.opts.warn {
                    warn!("unknown escape sequence: ESC {:?}", byte as char);
                }
            }
        }
    }

    fn scan_escape_intermediate(&mut self, intro: u8) {
        let Some(byte) = self.state.consume() else {
            return;
        };
        self.state.reset_routine();
        if intro == b'#' {
            if byte == b'8' {
                self.commands
                    .push(Command::Esc(EscCommand::ScreenAlignmentTest));
            } else if self.opts.warn {
                warn!("unknown escape sequence: ESC # {:?}", byte as char);
            }
            return;
        }
        let slot = match intro {
            b'(' => G0,
            b')' | b'-' => G1,
            b'*' | b'.' => G2,
            b'+' | b'/' => G3,
            _ => {
                debug!("unexpected escape intermediate 0x{:02X}", intro);
                return;
            }
        };
        self.charsets.designate(slot, CharsetId::from_designator(byte));
    }

    // --- CSI ---

    fn scan_csi(&mut self) {
        while let Some(byte) = self.state.peek() {
            match byte {
                b'0'..=b'9' => {
                    self.state.advance(1);
                    self.state.push_digit(byte);
                }
                b';' => {
                    self.state.advance(1);
                    self.state.next_arg();
                }
                b':' => {
                    // Sub-parameters are not part of this machine; abort.
                    self.state.advance(1);
                    if self.opts.warn {
                        warn!("aborting CSI sequence on ':'");
                    }
                    self.state.reset_args();
                    self.state.reset_routine();
                    return;
                }
                0x20..=0x3F => {
                    self.state.advance(1);
                    if self.state.args.is_empty() {
                        self.state.leading.push(byte as char);
                    } else {
                        self.state.trailing.push(byte as char);
                    }
                }
                0x40..=0x7E => {
                    self.state.advance(1);
                    self.dispatch_csi(byte);
                    self.state.reset_args();
                    self.state.reset_routine();
                    return;
                }
                0x1B => {
                    // ESC aborts the sequence and starts a fresh one.
                    self.state.advance(1);
                    self.state.reset_args();
                    self.state.routine = Routine::Escape;
                    return;
                }
                b if b < 0x20 => {
                    // Embedded C0 controls execute without ending the CSI.
                    self.state.advance(1);
                    self.dispatch_control(b);
                }
                0x7F => {
                    self.state.advance(1);
                }
                _ => {
                    self.state.advance(1);
                    if self.opts.warn {
                        warn!("aborting CSI sequence on unexpected byte 0x{:02X}", byte);
                    }
                    self.state.reset_args();
                    self.state.reset_routine();
                    return;
                }
            }
        }
    }

    /// Dispatches a completed CSI sequence keyed on
    /// `(leading modifiers, trailing modifiers, final byte)`.
    fn dispatch_csi(&mut self, final_byte: u8) {
        let n1 = |i: usize| self.state.int_arg(i, 1);
        let key = (
            self.state.leading.as_str(),
            self.state.trailing.as_str(),
            final_byte,
        );
        trace!("CSI dispatch: {:?} args {:?}", key, self.state.args);

        let command = match key {
            ("", "", b'@') => Some(CsiCommand::InsertBlankChars(n1(0))),
            ("", "", b'A') => Some(CsiCommand::CursorUp(n1(0))),
            ("", "", b'B') => Some(CsiCommand::CursorDown(n1(0))),
            ("", "", b'C') => Some(CsiCommand::CursorForward(n1(0))),
            ("", "", b'D') => Some(CsiCommand::CursorBackward(n1(0))),
            ("", "", b'E') => Some(CsiCommand::CursorNextLine(n1(0))),
            ("", "", b'F') => Some(CsiCommand::CursorPrevLine(n1(0))),
            ("", "", b'G') => Some(CsiCommand::CursorColumn(n1(0))),
            ("", "", b'H') | ("", "", b'f') => Some(CsiCommand::CursorPosition(n1(0), n1(1))),
            ("", "", b'I') => Some(CsiCommand::ForwardTab(n1(0))),
            ("", "", b'J') => Some(CsiCommand::EraseInDisplay(self.state.int_arg(0, 0))),
            ("", "", b'K') => Some(CsiCommand::EraseInLine(self.state.int_arg(0, 0))),
            ("", "", b'L') => Some(CsiCommand::InsertLines(n1(0))),
            ("", "", b'M') => Some(CsiCommand::DeleteLines(n1(0))),
            ("", "", b'P') => Some(CsiCommand::DeleteChars(n1(0))),
            ("", "", b'S') => Some(CsiCommand::ScrollUp(n1(0))),
            ("", "", b'T') => Some(CsiCommand::ScrollDown(n1(0))),
            ("", "", b'X') => Some(CsiCommand::EraseChars(n1(0))),
            ("", "", b'Z') => Some(CsiCommand::BackwardTab(n1(0))),
            ("", "", b'c') => Some(CsiCommand::PrimaryDeviceAttributes),
            (">", "", b'c') => Some(CsiCommand::SecondaryDeviceAttributes),
            ("", "", b'd') => Some(CsiCommand::CursorRow(n1(0))),
            ("", "", b'g') => Some(CsiCommand::TabClear(self.state.int_arg(0, 0))),
            ("", "", b'h') | ("", "", b'l') | ("?", "", b'h') | ("?", "", b'l') => {
                let private = !self.state.leading.is_empty();
                let enable = final_byte == b'h';
                let mut params = self.state.raw_args();
                if params.is_empty() {
                    params.push(0);
                }
                for param in params {
                    let command = match (private, enable) {
                        (false, true) => CsiCommand::SetMode(param),
                        (false, false) => CsiCommand::ResetMode(param),
                        (true, true) => CsiCommand::SetModePrivate(param),
                        (true, false) => CsiCommand::ResetModePrivate(param),
                    };
                    self.commands.push(Command::Csi(command));
                }
                None
            }
            ("", "", b'm') => Some(CsiCommand::SetGraphicsRendition(parse_sgr(
                &self.state.raw_args(),
            ))),
            ("", "", b'n') => Some(CsiCommand::DeviceStatusReport {
                code: self.state.int_arg(0, 0),
                private: false,
            }),
            ("?", "", b'n') => Some(CsiCommand::DeviceStatusReport {
                code: self.state.int_arg(0, 0),
                private: true,
            }),
            ("", "", b'r') => Some(CsiCommand::SetScrollingRegion {
                top: self.state.int_arg(0, 1),
                bottom: self.state.int_arg(1, 0),
            }),
            ("", "", b's') => Some(CsiCommand::SaveCursor),
            ("", "", b'u') => Some(CsiCommand::RestoreCursor),
            ("!", "", b'p') => Some(CsiCommand::SoftReset),
            _ => {
                if self.opts.warn {
                    warn!(
                        "unknown CSI sequence: {}{}{} args {:?}",
                        self.state.leading,
                        self.state.trailing,
                        final_byte as char,
                        self.state.args
                    );
                }
                None
            }
        };

        if let Some(command) = command {
            self.commands.push(Command::Csi(command));
        }
    }

    // --- String sequences ---

    fn start_string(&mut self, kind: StringKind) {
        self.string_buf.clear();
        self.string_started = Some(Instant::now());
        self.string_esc = false;
        self.state.routine = Routine::Str(kind);
    }

    fn scan_string(&mut self, kind: StringKind) {
        while let Some(byte) = self.state.peek() {
            if self.string_esc {
                self.string_esc = false;
                if byte == b'\\' {
                    self.state.advance(1);
                    self.finish_string(kind);
                    self.state.reset_routine();
                } else {
                    // An embedded ESC that is not the ST prefix aborts the
                    // string; the ESC starts a new sequence.
                    debug!("aborting {} string sequence: embedded ESC", kind.name());
                    self.abort_string();
                    self.state.routine = Routine::Escape;
                }
                return;
            }
            match byte {
                0x07 => {
                    self.state.advance(1);
                    self.finish_string(kind);
                    self.state.reset_routine();
                    return;
                }
                0x1B => {
                    self.state.advance(1);
                    self.string_esc = true;
                }
                _ => {
                    self.state.advance(1);
                    self.string_buf.push(byte);
                    if self.string_buf.len() > self.opts.max_string_sequence {
                        debug!(
                            "aborting {} string sequence: longer than {} bytes",
                            kind.name(),
                            self.opts.max_string_sequence
                        );
                        self.abort_string();
                        self.state.reset_routine();
                        return;
                    }
                }
            }
        }
    }

    fn abort_string(&mut self) {
        self.string_buf.clear();
        self.string_started = None;
        self.string_esc = false;
    }

    fn finish_string(&mut self, kind: StringKind) {
        self.string_started = None;
        self.string_esc = false;
        let data = mem::take(&mut self.string_buf);
        match kind {
            StringKind::Osc => self.dispatch_osc(&data),
            _ => debug!("discarding {} string ({} bytes)", kind.name(), data.len()),
        }
    }

    fn dispatch_osc(&mut self, data: &[u8]) {
        let Some((ps, content)) = split_osc_prefix(data) else {
            if self.opts.warn {
                warn!("malformed OSC sequence: {:?}", String::from_utf8_lossy(data));
            }
            return;
        };
        match ps {
            0 | 2 => {
                let title = String::from_utf8_lossy(content).into_owned();
                self.commands.push(Command::Osc(OscCommand::SetTitle(title)));
            }
            52 => {
                // OSC 52 ; Pc ; Pd — Pc names the clipboard, Pd is the payload.
                let payload = match content.iter().position(|&b| b == b';') {
                    Some(pos) => &content[pos + 1..],
                    None => content,
                };
                if payload == b"?" {
                    self.commands.push(Command::Osc(OscCommand::QueryClipboard));
                } else {
                    match base64::decode(payload) {
                        Some(bytes) => self
                            .commands
                            .push(Command::Osc(OscCommand::SetClipboard(bytes))),
                        None => {
                            if self.opts.warn {
                                warn!("OSC 52 payload is not valid base64, ignoring");
                            }
                        }
                    }
                }
            }
            _ => {
                if self.opts.warn {
                    warn!("unknown OSC code: {}", ps);
                }
            }
        }
    }
}

/// Splits raw OSC data into its numeric code and the content after the
/// first semicolon. Parses the prefix as bytes so large payloads are not
/// copied through a lossy string conversion up front.
fn split_osc_prefix(data: &[u8]) -> Option<(u32, &[u8])> {
    let semi_pos = data.iter().position(|&b| b == b';');
    let (ps_bytes, content) = match semi_pos {
        Some(pos) => (&data[..pos], &data[pos + 1..]),
        None => (data, &[] as &[u8]),
    };
    let mut ps: u32 = 0;
    for &b in ps_bytes {
        match b {
            b'0'..=b'9' => {
                ps = ps.checked_mul(10)?.checked_add(u32::from(b - b'0'))?;
            }
            _ => return None,
        }
    }
    Some((ps, content))
}
