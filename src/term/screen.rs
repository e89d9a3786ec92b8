// src/term/screen.rs

//! Stage two of the pipeline: the screen model.
//!
//! Consumes semantic commands from the parser and mutates a grid of
//! styled glyphs, a cursor, mode flags, a scroll region, tab stops, and
//! the alternate-screen save slot, tracking a dirty row interval as it
//! goes. Rows are reference counted so snapshots handed to observers are
//! cheap; mutation goes through `Arc::make_mut`.

use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::ansi::base64_encode;
use crate::ansi::commands::{
    C0Control, Command, CsiCommand, EscCommand, OscCommand, DA1_RESPONSE, DA2_RESPONSE,
    DSR_RESPONSE_KEYBOARD, DSR_RESPONSE_LOCATOR, DSR_RESPONSE_OK, DSR_RESPONSE_PRINTER,
    DSR_RESPONSE_UDK,
};
use crate::ansi::commands::Attribute;
use crate::glyph::{Attr, AttrFlags, Glyph};
use crate::term::action::EmulatorAction;
use crate::term::cursor::{Cursor, CursorState};
use crate::term::modes::{
    DecMode, EraseMode, TabClearMode, TermMode, ANSI_MODE_CRLF, ANSI_MODE_ECHO, ANSI_MODE_INSERT,
    ANSI_MODE_KBDLOCK,
};

/// One grid line. Reference counted for copy-on-write snapshots.
pub type Row = Arc<Vec<Glyph>>;

/// Tab stops default to every eighth column.
const TAB_INTERVAL: usize = 8;

/// DECCOLM column counts.
const DECCOLM_WIDE: usize = 132;
const DECCOLM_NARROW: usize = 80;

/// Snapshot taken when the alternate screen is entered.
#[derive(Debug, Clone)]
struct AltScreenSlot {
    mode: TermMode,
    buffer: VecDeque<Row>,
    base: usize,
    cursor: Cursor,
    scroll: (usize, usize),
    tabs: Vec<bool>,
}

/// The terminal screen: scrollback plus visible grid, cursor, modes,
/// scroll region, tabs, and the alternate-screen slot.
///
/// The buffer holds `base + rows` lines; rows `[base, base + rows)` are
/// the visible screen and everything below `base` is scrollback. A
/// screen coordinate `y` addresses absolute buffer row `base + y`.
#[derive(Debug, Clone)]
pub struct Screen {
    buffer: VecDeque<Row>,
    base: usize,
    cols: usize,
    rows: usize,
    cursor: Cursor,
    saved_cursor: Option<Cursor>,
    mode: TermMode,
    scroll_top: usize,
    scroll_bot: usize,
    tabs: Vec<bool>,
    /// Inclusive interval of absolute buffer rows touched since the last
    /// refresh.
    dirty: Option<(usize, usize)>,
    alt: Option<AltScreenSlot>,
    title: String,
    clipboard: Vec<u8>,
    allow_width_change: bool,
}

impl Screen {
    /// Creates a screen of the given geometry, clamped to at least 1x1.
    #[must_use]
    pub fn new(cols: usize, rows: usize, allow_width_change: bool) -> Self {
        let mut screen = Screen {
            buffer: VecDeque::new(),
            base: 0,
            cols: cols.max(1),
            rows: rows.max(1),
            cursor: Cursor::default(),
            saved_cursor: None,
            mode: TermMode::default(),
            scroll_top: 0,
            scroll_bot: 0,
            tabs: Vec::new(),
            dirty: None,
            alt: None,
            title: String::new(),
            clipboard: Vec::new(),
            allow_width_change,
        };
        screen.hard_reset();
        // A freshly built screen has nothing to repaint yet.
        screen.dirty = None;
        screen
    }

    // --- Accessors ---

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Current scrollback depth; also the buffer index of visible row 0.
    #[must_use]
    pub fn base(&self) -> usize {
        self.base
    }

    /// The whole buffer, scrollback included.
    #[must_use]
    pub fn buffer(&self) -> &VecDeque<Row> {
        &self.buffer
    }

    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    #[must_use]
    pub fn mode(&self) -> TermMode {
        self.mode
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The scroll region as `(top, bottom)`, inclusive screen rows.
    #[must_use]
    pub fn scroll_region(&self) -> (usize, usize) {
        (self.scroll_top, self.scroll_bot)
    }

    /// Decoded OSC 52 clipboard contents.
    #[must_use]
    pub fn clipboard(&self) -> &[u8] {
        &self.clipboard
    }

    /// A visible line by screen row.
    #[must_use]
    pub fn line(&self, y: usize) -> Option<&Row> {
        self.buffer.get(self.base + y)
    }

    /// Takes the pending dirty interval, leaving it empty.
    pub fn take_dirty(&mut self) -> Option<(usize, usize)> {
        self.dirty.take()
    }

    // --- Blank material ---

    fn blank_glyph(&self) -> Glyph {
        Glyph::blank(self.cursor.attr)
    }

    fn blank_row(&self) -> Row {
        Arc::new(vec![self.blank_glyph(); self.cols])
    }

    fn reset_tabs(&mut self) {
        self.tabs = vec![false; self.cols];
        for x in (0..self.cols).step_by(TAB_INTERVAL) {
            self.tabs[x] = true;
        }
    }

    // --- Dirty tracking ---

    fn mark_abs(&mut self, y_abs: usize) {
        self.dirty = Some(match self.dirty {
            None => (y_abs, y_abs),
            Some((lo, hi)) => (lo.min(y_abs), hi.max(y_abs)),
        });
    }

    fn mark_row(&mut self, y: usize) {
        self.mark_abs(self.base + y.min(self.rows.saturating_sub(1)));
    }

    // --- Command interpretation ---

    /// Applies one semantic command. Effects that reach outside the grid
    /// come back as an action for the facade to dispatch.
    pub fn interpret(&mut self, command: Command) -> Option<EmulatorAction> {
        match command {
            Command::Print(text) => {
                self.print_str(&text);
                None
            }
            Command::Control(c0) => self.interpret_control(c0),
            Command::Esc(esc) => self.interpret_esc(esc),
            Command::Csi(csi) => self.interpret_csi(csi),
            Command::Osc(osc) => self.interpret_osc(osc),
            Command::Write(bytes) => Some(EmulatorAction::WritePty(bytes)),
        }
    }

    fn interpret_control(&mut self, c0: C0Control) -> Option<EmulatorAction> {
        match c0 {
            C0Control::Bell => {
                trace!("bell");
                return Some(EmulatorAction::RingBell);
            }
            C0Control::Backspace => {
                self.move_to(self.cursor.x as isize - 1, self.cursor.y as isize, true);
            }
            C0Control::Tab => self.forward_tab(1),
            C0Control::LineFeed | C0Control::VerticalTab | C0Control::FormFeed => {
                self.new_line(self.mode.contains(TermMode::CRLF));
            }
            C0Control::CarriageReturn => {
                self.move_to(0, self.cursor.y as isize, true);
            }
        }
        None
    }

    fn interpret_esc(&mut self, esc: EscCommand) -> Option<EmulatorAction> {
        match esc {
            EscCommand::Index => self.new_line(false),
            EscCommand::NextLine => self.new_line(true),
            EscCommand::SetTabStop => {
                let x = self.cursor.x;
                if x < self.tabs.len() {
                    self.tabs[x] = true;
                }
            }
            EscCommand::ReverseIndex => self.reverse_index(),
            EscCommand::SaveCursor => self.save_cursor(),
            EscCommand::RestoreCursor => self.restore_cursor(),
            EscCommand::KeypadApplicationMode => self.mode.insert(TermMode::APPKEYPAD),
            EscCommand::KeypadNumericMode => self.mode.remove(TermMode::APPKEYPAD),
            EscCommand::FullReset => self.hard_reset(),
            EscCommand::ScreenAlignmentTest => {
                self.clear_region(0, 0, self.cols, self.rows, Some('E'));
            }
        }
        None
    }

    fn interpret_csi(&mut self, csi: CsiCommand) -> Option<EmulatorAction> {
        let (x, y) = (self.cursor.x as isize, self.cursor.y as isize);
        match csi {
            CsiCommand::InsertBlankChars(n) => self.insert_blank_chars(n as usize),
            CsiCommand::CursorUp(n) => self.move_to(x, y - n as isize, true),
            CsiCommand::CursorDown(n) => self.move_to(x, y + n as isize, true),
            CsiCommand::CursorForward(n) => self.move_to(x + n as isize, y, true),
            CsiCommand::CursorBackward(n) => self.move_to(x - n as isize, y, true),
            CsiCommand::CursorNextLine(n) => self.move_to(0, y + n as isize, true),
            CsiCommand::CursorPrevLine(n) => self.move_to(0, y - n as isize, true),
            CsiCommand::CursorColumn(n) => self.move_to(n as isize - 1, y, true),
            CsiCommand::CursorPosition(row, col) => {
                self.move_to(col as isize - 1, row as isize - 1, false);
            }
            CsiCommand::CursorRow(row) => self.move_to(x, row as isize - 1, false),
            CsiCommand::ForwardTab(n) => self.forward_tab(n),
            CsiCommand::BackwardTab(n) => self.backward_tab(n),
            CsiCommand::EraseInDisplay(mode) => self.erase_in_display(EraseMode::from(mode)),
            CsiCommand::EraseInLine(mode) => self.erase_in_line(EraseMode::from(mode)),
            CsiCommand::InsertLines(n) => self.insert_lines(n as usize),
            CsiCommand::DeleteLines(n) => self.delete_lines(n as usize),
            CsiCommand::DeleteChars(n) => self.delete_chars(n as usize),
            CsiCommand::ScrollUp(n) => self.scroll(i32::from(n)),
            CsiCommand::ScrollDown(n) => self.scroll(-i32::from(n)),
            CsiCommand::EraseChars(n) => {
                self.clear_region(self.cursor.x, self.cursor.y, n as usize, 1, None);
            }
            CsiCommand::PrimaryDeviceAttributes => {
                return Some(EmulatorAction::WritePty(DA1_RESPONSE.to_vec()));
            }
            CsiCommand::SecondaryDeviceAttributes => {
                return Some(EmulatorAction::WritePty(DA2_RESPONSE.to_vec()));
            }
            CsiCommand::TabClear(mode) => self.clear_tabs(TabClearMode::from(mode)),
            CsiCommand::SetMode(param) => self.set_ansi_mode(param, true),
            CsiCommand::ResetMode(param) => self.set_ansi_mode(param, false),
            CsiCommand::SetModePrivate(param) => return self.set_dec_mode(param, true),
            CsiCommand::ResetModePrivate(param) => return self.set_dec_mode(param, false),
            CsiCommand::SetGraphicsRendition(attrs) => self.apply_sgr(&attrs),
            CsiCommand::DeviceStatusReport { code, private } => {
                return self.device_status_report(code, private);
            }
            CsiCommand::SetScrollingRegion { top, bottom } => {
                self.set_scrolling_region(top, bottom);
            }
            CsiCommand::SaveCursor => self.save_cursor(),
            CsiCommand::RestoreCursor => self.restore_cursor(),
            CsiCommand::SoftReset => self.soft_reset(),
        }
        None
    }

    fn interpret_osc(&mut self, osc: OscCommand) -> Option<EmulatorAction> {
        match osc {
            OscCommand::SetTitle(title) => {
                self.title = title.clone();
                Some(EmulatorAction::SetTitle(title))
            }
            OscCommand::SetClipboard(bytes) => {
                self.clipboard = bytes;
                None
            }
            OscCommand::QueryClipboard => {
                let mut reply = b"\x1b]52;c;".to_vec();
                reply.extend_from_slice(&base64_encode(&self.clipboard));
                reply.push(0x07);
                Some(EmulatorAction::WritePty(reply))
            }
        }
    }

    // --- Printing ---

    fn print_str(&mut self, text: &str) {
        for ch in text.chars() {
            self.print_char(ch);
        }
    }

    fn print_char(&mut self, ch: char) {
        if self.mode.contains(TermMode::WRAP) && self.cursor.wrap_pending() {
            self.cursor.state.remove(CursorState::WRAPNEXT);
            self.new_line(true);
        }
        let (x, y) = (self.cursor.x, self.cursor.y);
        let index = self.base + y;

        if self.mode.contains(TermMode::INSERT) && x + 1 < self.cols {
            // Shift the tail of the row right; the rightmost glyph falls off.
            let row = Arc::make_mut(&mut self.buffer[index]);
            row[x..].rotate_right(1);
        }

        let row = Arc::make_mut(&mut self.buffer[index]);
        row[x] = Glyph {
            attr: self.cursor.attr,
            ch,
        };
        if x + 1 < self.cols {
            self.cursor.x = x + 1;
        } else {
            self.cursor.state.insert(CursorState::WRAPNEXT);
        }
        self.mark_row(y);
    }

    // --- Cursor movement ---

    /// Moves the cursor, clamping into the addressable area and clearing
    /// the wrap latch. With origin mode active the addressable rows are
    /// the scroll region, and non-absolute row addresses are offset by
    /// its top.
    fn move_to(&mut self, x: isize, y: isize, absolute_y: bool) {
        let origin = self.cursor.origin_relative();
        let (min_y, max_y) = if origin {
            (self.scroll_top as isize, self.scroll_bot as isize)
        } else {
            (0, self.rows as isize - 1)
        };
        let y = if origin && !absolute_y {
            y + self.scroll_top as isize
        } else {
            y
        };

        let old_y = self.cursor.y;
        self.cursor.x = x.clamp(0, self.cols as isize - 1) as usize;
        self.cursor.y = y.clamp(min_y, max_y) as usize;
        self.cursor.state.remove(CursorState::WRAPNEXT);
        self.mark_row(old_y);
        self.mark_row(self.cursor.y);
    }

    /// Moves down one row, scrolling when the cursor sits on the region
    /// bottom. Optionally returns to the first column.
    fn new_line(&mut self, first_col: bool) {
        self.cursor.state.remove(CursorState::WRAPNEXT);
        self.mark_row(self.cursor.y);
        if self.cursor.y == self.scroll_bot {
            self.scroll(1);
        } else if self.cursor.y + 1 < self.rows {
            self.cursor.y += 1;
        }
        if first_col {
            self.cursor.x = 0;
        }
        self.mark_row(self.cursor.y);
    }

    /// Moves up one row, scrolling when the cursor sits on the region top.
    fn reverse_index(&mut self) {
        self.cursor.state.remove(CursorState::WRAPNEXT);
        self.mark_row(self.cursor.y);
        if self.cursor.y == self.scroll_top {
            self.scroll(-1);
        } else if self.cursor.y > 0 {
            self.cursor.y -= 1;
        }
        self.mark_row(self.cursor.y);
    }

    fn forward_tab(&mut self, n: u16) {
        let mut x = self.cursor.x;
        for _ in 0..n.max(1) {
            x = self.next_tab_stop(x);
        }
        self.move_to(x as isize, self.cursor.y as isize, true);
    }

    fn backward_tab(&mut self, n: u16) {
        let mut x = self.cursor.x;
        for _ in 0..n.max(1) {
            x = self.prev_tab_stop(x);
        }
        self.move_to(x as isize, self.cursor.y as isize, true);
    }

    fn next_tab_stop(&self, from: usize) -> usize {
        for x in from + 1..self.cols {
            if self.tabs[x] {
                return x;
            }
        }
        self.cols - 1
    }

    fn prev_tab_stop(&self, from: usize) -> usize {
        for x in (0..from).rev() {
            if self.tabs[x] {
                return x;
            }
        }
        0
    }

    fn clear_tabs(&mut self, mode: TabClearMode) {
        match mode {
            TabClearMode::CurrentColumn => {
                let x = self.cursor.x;
                if x < self.tabs.len() {
                    self.tabs[x] = false;
                }
            }
            TabClearMode::All => self.tabs.fill(false),
            TabClearMode::Unsupported => {}
        }
    }

    // --- Scrolling ---

    /// Scrolls the region: positive is up (content moves toward
    /// scrollback), negative is down.
    ///
    /// Scrolling up always grows scrollback, even when the region top is
    /// not the first row; strict VT semantics would drop the line at the
    /// region top instead.
    fn scroll(&mut self, n: i32) {
        if n == 0 {
            return;
        }
        let blank = self.blank_row();
        if n > 0 {
            for _ in 0..n {
                self.base += 1;
                let at = (self.base + self.scroll_bot).min(self.buffer.len());
                self.buffer.insert(at, blank.clone());
            }
        } else {
            for _ in 0..n.unsigned_abs() {
                let bot = self.base + self.scroll_bot;
                if bot < self.buffer.len() {
                    self.buffer.remove(bot);
                }
                let top = (self.base + self.scroll_top).min(self.buffer.len());
                self.buffer.insert(top, blank.clone());
            }
        }
        self.mark_row(self.scroll_top);
        self.mark_row(self.scroll_bot);
    }

    fn insert_lines(&mut self, n: usize) {
        let y = self.cursor.y;
        if y < self.scroll_top || y > self.scroll_bot {
            return;
        }
        let count = n.min(self.scroll_bot - y + 1);
        let blank = self.blank_row();
        for _ in 0..count {
            self.buffer.remove(self.base + self.scroll_bot);
            self.buffer.insert(self.base + y, blank.clone());
        }
        self.mark_row(y);
        self.mark_row(self.scroll_bot);
    }

    fn delete_lines(&mut self, n: usize) {
        let y = self.cursor.y;
        if y < self.scroll_top || y > self.scroll_bot {
            return;
        }
        let count = n.min(self.scroll_bot - y + 1);
        let blank = self.blank_row();
        for _ in 0..count {
            self.buffer.remove(self.base + y);
            let at = (self.base + self.scroll_bot).min(self.buffer.len());
            self.buffer.insert(at, blank.clone());
        }
        self.mark_row(y);
        self.mark_row(self.scroll_bot);
    }

    // --- In-line editing ---

    fn insert_blank_chars(&mut self, n: usize) {
        let (x, y) = (self.cursor.x, self.cursor.y);
        let count = n.min(self.cols.saturating_sub(x));
        if count == 0 {
            return;
        }
        let blank = self.blank_glyph();
        let row = Arc::make_mut(&mut self.buffer[self.base + y]);
        row[x..].rotate_right(count);
        for cell in row[x..x + count].iter_mut() {
            *cell = blank;
        }
        self.mark_row(y);
    }

    fn delete_chars(&mut self, n: usize) {
        let (x, y) = (self.cursor.x, self.cursor.y);
        let count = n.min(self.cols.saturating_sub(x));
        if count == 0 {
            return;
        }
        let blank = self.blank_glyph();
        let cols = self.cols;
        let row = Arc::make_mut(&mut self.buffer[self.base + y]);
        row[x..].rotate_left(count);
        for cell in row[cols - count..].iter_mut() {
            *cell = blank;
        }
        self.mark_row(y);
    }

    // --- Clearing ---

    /// Fills a clamped rectangle with blanks (or an explicit fill
    /// character) carrying the cursor attributes.
    fn clear_region(&mut self, x: usize, y: usize, w: usize, h: usize, fill: Option<char>) {
        let x_end = (x + w).min(self.cols);
        let y_end = (y + h).min(self.rows);
        if x >= x_end || y >= y_end {
            return;
        }
        let glyph = Glyph {
            attr: self.cursor.attr,
            ch: fill.unwrap_or(' '),
        };
        for row_y in y..y_end {
            let row = Arc::make_mut(&mut self.buffer[self.base + row_y]);
            for cell in row[x..x_end].iter_mut() {
                *cell = glyph;
            }
        }
        self.mark_row(y);
        self.mark_row(y_end - 1);
    }

    fn erase_in_display(&mut self, mode: EraseMode) {
        let (x, y) = (self.cursor.x, self.cursor.y);
        match mode {
            EraseMode::ToEnd => {
                self.clear_region(x, y, self.cols - x, 1, None);
                if y + 1 < self.rows {
                    self.clear_region(0, y + 1, self.cols, self.rows - y - 1, None);
                }
            }
            EraseMode::ToStart => {
                self.clear_region(0, y, x + 1, 1, None);
                if y > 0 {
                    self.clear_region(0, 0, self.cols, y, None);
                }
            }
            EraseMode::All | EraseMode::Scrollback => {
                self.clear_region(0, 0, self.cols, self.rows, None);
            }
            EraseMode::Unknown => {}
        }
    }

    fn erase_in_line(&mut self, mode: EraseMode) {
        let (x, y) = (self.cursor.x, self.cursor.y);
        match mode {
            EraseMode::ToEnd => self.clear_region(x, y, self.cols - x, 1, None),
            EraseMode::ToStart => self.clear_region(0, y, x + 1, 1, None),
            EraseMode::All => self.clear_region(0, y, self.cols, 1, None),
            EraseMode::Scrollback | EraseMode::Unknown => {}
        }
    }

    // --- Save/restore, resets ---

    fn save_cursor(&mut self) {
        self.saved_cursor = Some(self.cursor);
    }

    fn restore_cursor(&mut self) {
        let saved = self.saved_cursor.unwrap_or_default();
        self.cursor.attr = saved.attr;
        self.cursor.state = saved.state;
        // Re-clamp; this also drops a stale wrap latch.
        self.move_to(saved.x as isize, saved.y as isize, true);
    }

    /// RIS: rebuild the model from scratch.
    pub fn hard_reset(&mut self) {
        self.cursor = Cursor::default();
        self.saved_cursor = None;
        self.mode = TermMode::default();
        self.base = 0;
        self.buffer.clear();
        let blank = self.blank_row();
        for _ in 0..self.rows {
            self.buffer.push_back(blank.clone());
        }
        self.scroll_top = 0;
        self.scroll_bot = self.rows - 1;
        self.reset_tabs();
        self.alt = None;
        self.mark_row(0);
        self.mark_row(self.rows - 1);
    }

    /// DECSTR: mode defaults and full scroll region, contents preserved.
    fn soft_reset(&mut self) {
        self.mode = TermMode::default();
        self.scroll_top = 0;
        self.scroll_bot = self.rows - 1;
        self.cursor.state = CursorState::empty();
    }

    // --- Modes ---

    fn set_ansi_mode(&mut self, param: u16, enable: bool) {
        let flag = match param {
            ANSI_MODE_KBDLOCK => TermMode::KBDLOCK,
            ANSI_MODE_INSERT => TermMode::INSERT,
            ANSI_MODE_ECHO => TermMode::ECHO,
            ANSI_MODE_CRLF => TermMode::CRLF,
            _ => {
                warn!("unknown ANSI mode {} ({})", param, if enable { "SM" } else { "RM" });
                return;
            }
        };
        self.mode.set(flag, enable);
    }

    fn set_dec_mode(&mut self, param: u16, enable: bool) -> Option<EmulatorAction> {
        match DecMode::from_u16(param) {
            Some(DecMode::CursorKeys) => self.mode.set(TermMode::APPCURSOR, enable),
            Some(DecMode::Column132) => {
                if self.allow_width_change {
                    let cols = if enable { DECCOLM_WIDE } else { DECCOLM_NARROW };
                    return self.resize(cols, self.rows, false);
                }
                debug!("DECCOLM ignored: width changes disallowed");
            }
            Some(DecMode::ReverseVideo) => {
                self.mode.set(TermMode::REVERSE, enable);
                self.mark_row(0);
                self.mark_row(self.rows - 1);
            }
            Some(DecMode::Origin) => {
                self.cursor.state.set(CursorState::ORIGIN, enable);
                self.move_to(0, 0, false);
            }
            Some(DecMode::AutoWrap) => self.mode.set(TermMode::WRAP, enable),
            Some(DecMode::CursorVisible) => self.mode.set(TermMode::HIDE, !enable),
            Some(DecMode::AllowWidthChange) => self.allow_width_change = enable,
            Some(DecMode::AltScreen) | Some(DecMode::AltScreen1047) => {
                return self.set_alternate(enable, false);
            }
            Some(DecMode::AltScreenSaveCursor) => return self.set_alternate(enable, true),
            Some(DecMode::SaveCursor) => {
                if enable {
                    self.save_cursor();
                } else {
                    self.restore_cursor();
                }
            }
            Some(DecMode::MouseButton) => self.mode.set(TermMode::MOUSEBTN, enable),
            Some(DecMode::MouseMotion) => self.mode.set(TermMode::MOUSEMOTION, enable),
            Some(DecMode::MouseSgr) => self.mode.set(TermMode::MOUSESGR, enable),
            Some(DecMode::CursorBlink)
            | Some(DecMode::ReverseWrap)
            | Some(DecMode::BackspaceSendsBs)
            | Some(DecMode::ScrollOnOutput)
            | Some(DecMode::ScrollOnKeystroke)
            | Some(DecMode::MetaSendsEscape)
            | Some(DecMode::AltSendsEscape) => {
                debug!("DEC private mode {} recognized but has no model state", param);
            }
            None => warn!("unknown DEC private mode {}", param),
        }
        None
    }

    /// Switches to or from the alternate screen.
    ///
    /// Entering snapshots the whole model state into the slot and starts
    /// from a hard reset; leaving restores the snapshot verbatim and
    /// discards whatever dirty range the alternate session accumulated.
    fn set_alternate(&mut self, on: bool, save_cursor: bool) -> Option<EmulatorAction> {
        if on {
            if self.mode.contains(TermMode::ALTSCREEN) {
                return None;
            }
            if save_cursor {
                self.save_cursor();
            }
            let slot = AltScreenSlot {
                mode: self.mode,
                buffer: mem::take(&mut self.buffer),
                base: self.base,
                cursor: self.cursor,
                scroll: (self.scroll_top, self.scroll_bot),
                tabs: mem::take(&mut self.tabs),
            };
            self.hard_reset();
            self.alt = Some(slot);
            self.mode.insert(TermMode::ALTSCREEN);
            Some(EmulatorAction::AlternateScreen(true))
        } else {
            if !self.mode.contains(TermMode::ALTSCREEN) {
                return None;
            }
            match self.alt.take() {
                Some(slot) => {
                    self.buffer = slot.buffer;
                    self.base = slot.base;
                    self.cursor = slot.cursor;
                    self.mode = slot.mode;
                    self.scroll_top = slot.scroll.0;
                    self.scroll_bot = slot.scroll.1;
                    self.tabs = slot.tabs;
                }
                None => {
                    warn!("leaving alternate screen with no saved slot");
                    self.mode.remove(TermMode::ALTSCREEN);
                }
            }
            self.dirty = None;
            Some(EmulatorAction::AlternateScreen(false))
        }
    }

    // --- SGR ---

    fn apply_sgr(&mut self, attrs: &[Attribute]) {
        let mut attr = self.cursor.attr;
        for &a in attrs {
            match a {
                Attribute::Reset => attr = Attr::default(),
                Attribute::Bold => attr.insert_flags(AttrFlags::BOLD),
                Attribute::NoBold => attr.remove_flags(AttrFlags::BOLD),
                Attribute::Italic => attr.insert_flags(AttrFlags::ITALIC),
                Attribute::NoItalic => attr.remove_flags(AttrFlags::ITALIC),
                Attribute::Underline => attr.insert_flags(AttrFlags::UNDERLINE),
                Attribute::NoUnderline => attr.remove_flags(AttrFlags::UNDERLINE),
                Attribute::Blink => attr.insert_flags(AttrFlags::BLINK),
                Attribute::NoBlink => attr.remove_flags(AttrFlags::BLINK),
                Attribute::Reverse => attr.insert_flags(AttrFlags::REVERSE),
                Attribute::NoReverse => attr.remove_flags(AttrFlags::REVERSE),
                Attribute::Conceal | Attribute::NoConceal => {
                    debug!("conceal attribute has no packed flag, ignoring");
                }
                Attribute::Foreground(index) => attr.set_fg(index),
                Attribute::Background(index) => attr.set_bg(index),
            }
        }
        self.cursor.attr = attr;
    }

    // --- Replies ---

    fn device_status_report(&self, code: u16, private: bool) -> Option<EmulatorAction> {
        let reply = match (private, code) {
            (false, 5) => DSR_RESPONSE_OK.to_vec(),
            (false, 6) => format!("\x1b[{};{}R", self.cursor.y + 1, self.cursor.x + 1).into_bytes(),
            (true, 6) => {
                format!("\x1b[?{};{}R", self.cursor.y + 1, self.cursor.x + 1).into_bytes()
            }
            (true, 15) => DSR_RESPONSE_PRINTER.to_vec(),
            (true, 25) => DSR_RESPONSE_UDK.to_vec(),
            (true, 26) => DSR_RESPONSE_KEYBOARD.to_vec(),
            (true, 53) => DSR_RESPONSE_LOCATOR.to_vec(),
            _ => {
                warn!("unknown DSR code {} (private: {})", code, private);
                return None;
            }
        };
        Some(EmulatorAction::WritePty(reply))
    }

    // --- Region setup ---

    fn set_scrolling_region(&mut self, top: u16, bottom: u16) {
        let top0 = (top.max(1) as usize - 1).min(self.rows - 1);
        let bot0 = if bottom == 0 {
            self.rows - 1
        } else {
            (bottom as usize - 1).min(self.rows - 1)
        };
        if top0 < bot0 {
            self.scroll_top = top0;
            self.scroll_bot = bot0;
        } else {
            warn!(
                "invalid scrolling region ({}, {}), using full screen",
                top, bottom
            );
            self.scroll_top = 0;
            self.scroll_bot = self.rows - 1;
        }
        self.move_to(0, 0, false);
    }

    // --- Resize ---

    /// Adjusts geometry: columns are padded or truncated per line, rows
    /// are extended or trimmed at the bottom. Tabs and the scroll region
    /// reset, the cursor is clamped. Degenerate geometry clamps to 1x1.
    pub fn resize(&mut self, cols: usize, rows: usize, silent: bool) -> Option<EmulatorAction> {
        let nc = cols.max(1);
        let nr = rows.max(1);
        let had_dirty = self.dirty.is_some();

        if nc != self.cols {
            let blank = self.blank_glyph();
            for row in self.buffer.iter_mut() {
                Arc::make_mut(row).resize(nc, blank);
            }
            if let Some(slot) = self.alt.as_mut() {
                for row in slot.buffer.iter_mut() {
                    Arc::make_mut(row).resize(nc, blank);
                }
            }
        }
        self.cols = nc;

        let target = self.base + nr;
        while self.buffer.len() < target {
            let blank = Arc::new(vec![self.blank_glyph(); nc]);
            self.buffer.push_back(blank);
        }
        while self.buffer.len() > target {
            self.buffer.pop_back();
        }
        if let Some(slot) = self.alt.as_mut() {
            let alt_target = slot.base + nr;
            while slot.buffer.len() < alt_target {
                slot.buffer.push_back(Arc::new(vec![Glyph::default(); nc]));
            }
            while slot.buffer.len() > alt_target {
                slot.buffer.pop_back();
            }
            slot.cursor.x = slot.cursor.x.min(nc - 1);
            slot.cursor.y = slot.cursor.y.min(nr - 1);
            slot.scroll = (0, nr - 1);
            slot.tabs = vec![false; nc];
            for x in (0..nc).step_by(TAB_INTERVAL) {
                slot.tabs[x] = true;
            }
        }
        self.rows = nr;

        self.reset_tabs();
        self.scroll_top = 0;
        self.scroll_bot = nr - 1;
        self.cursor.x = self.cursor.x.min(nc - 1);
        self.cursor.y = self.cursor.y.min(nr - 1);
        self.cursor.state.remove(CursorState::WRAPNEXT);

        if had_dirty {
            // The old interval may address rows the new geometry no longer
            // has; repaint the whole visible screen instead.
            self.dirty = None;
            self.mark_row(0);
            self.mark_row(nr - 1);
        }
        (!silent).then_some(EmulatorAction::Resized { cols: nc, rows: nr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::{DEFAULT_BG, DEFAULT_FG};

    fn screen() -> Screen {
        Screen::new(40, 24, true)
    }

    fn print(screen: &mut Screen, text: &str) {
        screen.interpret(Command::Print(text.into()));
    }

    fn row_text(screen: &Screen, y: usize) -> String {
        screen.line(y).unwrap().iter().map(|g| g.ch).collect()
    }

    fn abs_row_text(screen: &Screen, y_abs: usize) -> String {
        screen.buffer()[y_abs].iter().map(|g| g.ch).collect()
    }

    #[test]
    fn buffer_length_invariant_holds() {
        let mut s = screen();
        assert_eq!(s.buffer().len(), s.base() + s.rows());
        for _ in 0..30 {
            s.interpret(Command::Control(C0Control::LineFeed));
        }
        assert_eq!(s.buffer().len(), s.base() + s.rows());
        assert!(s.buffer().iter().all(|row| row.len() == s.cols()));
    }

    #[test]
    fn print_advances_cursor_and_dirties_row() {
        let mut s = screen();
        print(&mut s, "test");
        assert_eq!(row_text(&s, 0), format!("test{}", " ".repeat(36)));
        assert_eq!(s.cursor().x, 4);
        assert_eq!(s.cursor().y, 0);
        assert_eq!(s.take_dirty(), Some((0, 0)));
    }

    #[test]
    fn wrap_latch_at_right_edge() {
        let mut s = screen();
        print(&mut s, &"E".repeat(50));
        assert_eq!(row_text(&s, 0), "E".repeat(40));
        assert_eq!(row_text(&s, 1), format!("{}{}", "E".repeat(10), " ".repeat(30)));
        assert_eq!(s.cursor().x, 10);
        assert_eq!(s.cursor().y, 1);
        assert!(!s.cursor().wrap_pending());
    }

    #[test]
    fn no_wrap_without_wrap_mode() {
        let mut s = screen();
        s.interpret(Command::Csi(CsiCommand::ResetModePrivate(7)));
        print(&mut s, &"E".repeat(50));
        // Overprints in the last column instead of wrapping.
        assert_eq!(row_text(&s, 0), "E".repeat(40));
        assert_eq!(row_text(&s, 1), " ".repeat(40));
        assert_eq!(s.cursor().x, 39);
    }

    #[test]
    fn insert_mode_shifts_row_tail() {
        let mut s = screen();
        print(&mut s, "abc");
        s.interpret(Command::Csi(CsiCommand::CursorPosition(1, 1)));
        s.interpret(Command::Csi(CsiCommand::SetMode(4)));
        print(&mut s, "X");
        assert!(row_text(&s, 0).starts_with("Xabc"));
    }

    #[test]
    fn scroll_up_grows_scrollback() {
        let mut s = screen();
        for i in 0..30 {
            print(&mut s, &i.to_string());
            s.interpret(Command::Control(C0Control::LineFeed));
            s.interpret(Command::Control(C0Control::CarriageReturn));
        }
        assert_eq!(s.base(), 7);
        assert!(abs_row_text(&s, 0).starts_with('0'));
        assert!(abs_row_text(&s, 29).starts_with("29"));
    }

    #[test]
    fn scroll_region_respected_by_line_feed() {
        let mut s = screen();
        for i in 0..30 {
            print(&mut s, &i.to_string());
            s.interpret(Command::Control(C0Control::LineFeed));
            s.interpret(Command::Control(C0Control::CarriageReturn));
        }
        s.interpret(Command::Csi(CsiCommand::SetScrollingRegion { top: 1, bottom: 23 }));
        s.interpret(Command::Csi(CsiCommand::CursorPosition(23, 1)));
        print(&mut s, "29");
        s.interpret(Command::Control(C0Control::CarriageReturn));
        s.interpret(Command::Control(C0Control::LineFeed));
        print(&mut s, "30");
        s.interpret(Command::Csi(CsiCommand::SetScrollingRegion { top: 1, bottom: 24 }));
        assert!(abs_row_text(&s, 23).starts_with("23"));
        assert!(abs_row_text(&s, 24).starts_with("24"));
        assert!(abs_row_text(&s, 29).starts_with("29"));
        assert!(abs_row_text(&s, 30).starts_with("30"));
    }

    #[test]
    fn origin_mode_offsets_addressing() {
        let mut s = screen();
        s.interpret(Command::Csi(CsiCommand::SetScrollingRegion { top: 5, bottom: 20 }));
        s.interpret(Command::Csi(CsiCommand::SetModePrivate(6)));
        assert_eq!(s.cursor().y, 4); // homed to the region top
        s.interpret(Command::Csi(CsiCommand::CursorPosition(1, 1)));
        assert_eq!(s.cursor().y, 4);
        s.interpret(Command::Csi(CsiCommand::CursorPosition(100, 1)));
        assert_eq!(s.cursor().y, 19); // clamped to the region bottom
        s.interpret(Command::Csi(CsiCommand::ResetModePrivate(6)));
        s.interpret(Command::Csi(CsiCommand::CursorPosition(1, 1)));
        assert_eq!(s.cursor().y, 0);
    }

    #[test]
    fn erase_below_clears_from_cursor() {
        let mut s = screen();
        for _ in 0..3 {
            print(&mut s, "xxxx");
            s.interpret(Command::Control(C0Control::LineFeed));
            s.interpret(Command::Control(C0Control::CarriageReturn));
        }
        s.interpret(Command::Csi(CsiCommand::CursorPosition(2, 3)));
        s.interpret(Command::Csi(CsiCommand::EraseInDisplay(0)));
        assert!(row_text(&s, 0).starts_with("xxxx"));
        assert_eq!(row_text(&s, 1), format!("xx{}", " ".repeat(38)));
        assert_eq!(row_text(&s, 2), " ".repeat(40));
    }

    #[test]
    fn erase_line_variants() {
        let mut s = screen();
        print(&mut s, "abcdef");
        s.interpret(Command::Csi(CsiCommand::CursorColumn(3)));
        s.interpret(Command::Csi(CsiCommand::EraseInLine(0)));
        assert!(row_text(&s, 0).starts_with("ab"));
        assert_eq!(&row_text(&s, 0)[2..6], "    ");
        print(&mut s, "cdef");
        s.interpret(Command::Csi(CsiCommand::CursorColumn(2)));
        s.interpret(Command::Csi(CsiCommand::EraseInLine(1)));
        assert!(row_text(&s, 0).starts_with("  "));
    }

    #[test]
    fn insert_and_delete_chars() {
        let mut s = screen();
        print(&mut s, "abcdef");
        s.interpret(Command::Csi(CsiCommand::CursorPosition(1, 3)));
        s.interpret(Command::Csi(CsiCommand::InsertBlankChars(2)));
        assert!(row_text(&s, 0).starts_with("ab  cdef"));
        s.interpret(Command::Csi(CsiCommand::DeleteChars(2)));
        assert!(row_text(&s, 0).starts_with("abcdef"));
    }

    #[test]
    fn insert_and_delete_lines() {
        let mut s = screen();
        for i in 0..3 {
            print(&mut s, &format!("line{}", i));
            s.interpret(Command::Control(C0Control::LineFeed));
            s.interpret(Command::Control(C0Control::CarriageReturn));
        }
        s.interpret(Command::Csi(CsiCommand::CursorPosition(1, 1)));
        s.interpret(Command::Csi(CsiCommand::InsertLines(1)));
        assert_eq!(row_text(&s, 0), " ".repeat(40));
        assert!(row_text(&s, 1).starts_with("line0"));
        s.interpret(Command::Csi(CsiCommand::DeleteLines(1)));
        assert!(row_text(&s, 0).starts_with("line0"));
    }

    #[test]
    fn tab_stops_every_eight() {
        let mut s = screen();
        s.interpret(Command::Control(C0Control::Tab));
        assert_eq!(s.cursor().x, 8);
        s.interpret(Command::Csi(CsiCommand::ForwardTab(2)));
        assert_eq!(s.cursor().x, 24);
        s.interpret(Command::Csi(CsiCommand::BackwardTab(1)));
        assert_eq!(s.cursor().x, 16);
        s.interpret(Command::Csi(CsiCommand::TabClear(3)));
        s.interpret(Command::Control(C0Control::Tab));
        assert_eq!(s.cursor().x, 39); // no stops left, last column
    }

    #[test]
    fn set_tab_stop_via_hts() {
        let mut s = screen();
        s.interpret(Command::Csi(CsiCommand::TabClear(3)));
        s.interpret(Command::Csi(CsiCommand::CursorColumn(5)));
        s.interpret(Command::Esc(EscCommand::SetTabStop));
        s.interpret(Command::Csi(CsiCommand::CursorColumn(1)));
        s.interpret(Command::Control(C0Control::Tab));
        assert_eq!(s.cursor().x, 4);
    }

    #[test]
    fn save_restore_cursor_round_trip() {
        let mut s = screen();
        s.interpret(Command::Csi(CsiCommand::CursorPosition(5, 10)));
        s.interpret(Command::Csi(CsiCommand::SetGraphicsRendition(vec![
            Attribute::Bold,
        ])));
        s.interpret(Command::Esc(EscCommand::SaveCursor));
        s.interpret(Command::Csi(CsiCommand::CursorPosition(1, 1)));
        s.interpret(Command::Csi(CsiCommand::SetGraphicsRendition(vec![
            Attribute::Reset,
        ])));
        s.interpret(Command::Esc(EscCommand::RestoreCursor));
        assert_eq!((s.cursor().x, s.cursor().y), (9, 4));
        assert!(s.cursor().attr.flags().contains(AttrFlags::BOLD));
    }

    #[test]
    fn alternate_screen_round_trip_restores_exactly() {
        let mut s = screen();
        print(&mut s, "A");
        let saved_cursor = s.cursor();
        let saved_rows: Vec<Row> = s.buffer().iter().cloned().collect();

        let on = s.interpret(Command::Csi(CsiCommand::SetModePrivate(1049)));
        assert_eq!(on, Some(EmulatorAction::AlternateScreen(true)));
        assert!(s.mode().contains(TermMode::ALTSCREEN));
        print(&mut s, "B");
        assert!(row_text(&s, 0).starts_with("B"));

        let off = s.interpret(Command::Csi(CsiCommand::ResetModePrivate(1049)));
        assert_eq!(off, Some(EmulatorAction::AlternateScreen(false)));
        assert!(!s.mode().contains(TermMode::ALTSCREEN));
        assert!(row_text(&s, 0).starts_with("A"));
        assert_eq!(s.cursor(), saved_cursor);
        // Rows come back as the same allocations, not copies.
        for (restored, original) in s.buffer().iter().zip(saved_rows.iter()) {
            assert!(Arc::ptr_eq(restored, original));
        }
        // The alternate session's dirty range was discarded.
        assert_eq!(s.take_dirty(), None);
    }

    #[test]
    fn sgr_colors_land_in_glyphs() {
        let mut s = screen();
        s.interpret(Command::Csi(CsiCommand::SetGraphicsRendition(vec![
            Attribute::Foreground(1),
        ])));
        print(&mut s, "X");
        s.interpret(Command::Csi(CsiCommand::SetGraphicsRendition(vec![
            Attribute::Reset,
        ])));
        print(&mut s, "Y");
        let row = s.line(0).unwrap();
        assert_eq!(row[0].attr.fg(), 1);
        assert_eq!(row[1].attr.fg(), DEFAULT_FG);
        assert_eq!(row[1].attr.bg(), DEFAULT_BG);
        assert_eq!(row[1].attr, Attr::default());
    }

    #[test]
    fn primary_da_replies_without_dirtying() {
        let mut s = screen();
        let action = s.interpret(Command::Csi(CsiCommand::PrimaryDeviceAttributes));
        assert_eq!(
            action,
            Some(EmulatorAction::WritePty(b"\x1b[?1;2c".to_vec()))
        );
        assert_eq!(s.take_dirty(), None);
    }

    #[test]
    fn cursor_position_report() {
        let mut s = screen();
        s.interpret(Command::Csi(CsiCommand::CursorPosition(3, 7)));
        let action = s.interpret(Command::Csi(CsiCommand::DeviceStatusReport {
            code: 6,
            private: false,
        }));
        assert_eq!(action, Some(EmulatorAction::WritePty(b"\x1b[3;7R".to_vec())));
    }

    #[test]
    fn resize_is_idempotent_for_contents() {
        let mut s = screen();
        print(&mut s, "keep me");
        let before: Vec<String> = (0..s.rows()).map(|y| row_text(&s, y)).collect();
        s.resize(40, 24, false);
        let after: Vec<String> = (0..s.rows()).map(|y| row_text(&s, y)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn resize_pads_and_truncates() {
        let mut s = screen();
        print(&mut s, "0123456789");
        s.resize(5, 10, false);
        assert_eq!(s.cols(), 5);
        assert_eq!(s.rows(), 10);
        assert_eq!(s.buffer().len(), s.base() + 10);
        assert_eq!(row_text(&s, 0), "01234");
        assert!(s.cursor().x < 5);
        s.resize(8, 12, false);
        assert_eq!(row_text(&s, 0), "01234   ");
    }

    #[test]
    fn resize_clamps_degenerate_geometry() {
        let mut s = screen();
        let action = s.resize(0, 0, false);
        assert_eq!(s.cols(), 1);
        assert_eq!(s.rows(), 1);
        assert_eq!(action, Some(EmulatorAction::Resized { cols: 1, rows: 1 }));
    }

    #[test]
    fn deccolm_resizes_when_allowed() {
        let mut s = screen();
        let action = s.interpret(Command::Csi(CsiCommand::SetModePrivate(3)));
        assert_eq!(action, Some(EmulatorAction::Resized { cols: 132, rows: 24 }));
        let action = s.interpret(Command::Csi(CsiCommand::ResetModePrivate(3)));
        assert_eq!(action, Some(EmulatorAction::Resized { cols: 80, rows: 24 }));
    }

    #[test]
    fn deccolm_ignored_when_disallowed() {
        let mut s = Screen::new(40, 24, false);
        assert_eq!(s.interpret(Command::Csi(CsiCommand::SetModePrivate(3))), None);
        assert_eq!(s.cols(), 40);
    }

    #[test]
    fn decaln_fills_with_e() {
        let mut s = screen();
        s.interpret(Command::Esc(EscCommand::ScreenAlignmentTest));
        assert_eq!(row_text(&s, 0), "E".repeat(40));
        assert_eq!(row_text(&s, 23), "E".repeat(40));
    }

    #[test]
    fn soft_reset_preserves_contents() {
        let mut s = screen();
        print(&mut s, "stay");
        s.interpret(Command::Csi(CsiCommand::SetScrollingRegion { top: 2, bottom: 10 }));
        s.interpret(Command::Csi(CsiCommand::SetMode(4)));
        s.interpret(Command::Csi(CsiCommand::SoftReset));
        assert!(row_text(&s, 0).starts_with("stay"));
        assert_eq!(s.scroll_region(), (0, 23));
        assert_eq!(s.mode(), TermMode::default());
    }

    #[test]
    fn hard_reset_rebuilds_everything() {
        let mut s = screen();
        print(&mut s, "gone");
        s.interpret(Command::Control(C0Control::LineFeed));
        s.interpret(Command::Csi(CsiCommand::SetScrollingRegion { top: 2, bottom: 10 }));
        s.interpret(Command::Esc(EscCommand::FullReset));
        assert_eq!(s.base(), 0);
        assert_eq!(row_text(&s, 0), " ".repeat(40));
        assert_eq!(s.cursor(), Cursor::default());
        assert_eq!(s.scroll_region(), (0, 23));
    }

    #[test]
    fn bell_rings_without_dirtying() {
        let mut s = screen();
        let action = s.interpret(Command::Control(C0Control::Bell));
        assert_eq!(action, Some(EmulatorAction::RingBell));
        assert_eq!(s.take_dirty(), None);
    }

    #[test]
    fn clipboard_set_and_query() {
        let mut s = screen();
        s.interpret(Command::Osc(OscCommand::SetClipboard(b"hello".to_vec())));
        assert_eq!(s.clipboard(), b"hello");
        let action = s.interpret(Command::Osc(OscCommand::QueryClipboard));
        assert_eq!(
            action,
            Some(EmulatorAction::WritePty(b"\x1b]52;c;aGVsbG8=\x07".to_vec()))
        );
    }

    #[test]
    fn title_stored_and_notified() {
        let mut s = screen();
        let action = s.interpret(Command::Osc(OscCommand::SetTitle("shell".into())));
        assert_eq!(action, Some(EmulatorAction::SetTitle("shell".into())));
        assert_eq!(s.title(), "shell");
    }

    #[test]
    fn reverse_index_scrolls_down_at_top() {
        let mut s = screen();
        print(&mut s, "top");
        s.interpret(Command::Esc(EscCommand::ReverseIndex));
        assert_eq!(row_text(&s, 0), " ".repeat(40));
        assert!(row_text(&s, 1).starts_with("top"));
    }

    #[test]
    fn scroll_invariants_survive_region_scrolling() {
        let mut s = screen();
        s.interpret(Command::Csi(CsiCommand::SetScrollingRegion { top: 5, bottom: 15 }));
        s.interpret(Command::Csi(CsiCommand::ScrollUp(3)));
        s.interpret(Command::Csi(CsiCommand::ScrollDown(2)));
        assert_eq!(s.buffer().len(), s.base() + s.rows());
        let (top, bottom) = s.scroll_region();
        assert!(top <= bottom && bottom < s.rows());
    }
}
