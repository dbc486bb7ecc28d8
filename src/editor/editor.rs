//! Line Editor Sessions
//!
//! `LineEditor` consumes decoded key events and maintains the editable
//! buffer, the cursor, the history browsing position, and the optional
//! reverse-search overlay. One `read_line` call is one composition
//! session: it enters raw mode, loops on key events, and returns the
//! accepted line or a sentinel.
//!
//! The cursor column is a byte offset into the current row and always
//! lands on a code point boundary; all motion and deletion goes through
//! the UTF-8 utility to keep that invariant.

use std::io;

use crate::editor::history::History;
use crate::editor::keys::{Decode, Key, KeyDecoder};
use crate::editor::{term, utf8};

const SEARCH_PREFIX: &str = "(reverse-search)`";
const SEARCH_SEP: &str = "': ";

/// What one editor session produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A finished command line (possibly empty)
    Line(String),
    /// ^D, the user ended the session
    Exit,
    /// I/O failure or invalid editor state; the caller should stop
    Interrupt,
}

/// Reverse-search overlay state.
struct Search {
    query: String,
}

pub struct LineEditor {
    history: History,
    /// Row 0 is the line being composed; rows 1.. shadow history entries
    /// and are materialized to mutable copies on first edit.
    buffer: Vec<Option<String>>,
    row: usize,
    /// Byte offset into the current row's string
    col: usize,
    search: Option<Search>,
    prompt: String,
}

impl LineEditor {
    pub fn new() -> Self {
        let prompt = std::env::var("PS1").unwrap_or_else(|_| {
            let uid = unsafe { libc::getuid() };
            if uid == 0 { "# " } else { "$ " }.to_string()
        });
        let history = History::new();
        let buffer = vec![None; history.capacity() + 1];
        Self {
            history,
            buffer,
            row: 0,
            col: 0,
            search: None,
            prompt,
        }
    }

    /// Access to the accepted-line history (for tests and diagnostics).
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Run one composition session against the terminal.
    ///
    /// Raw mode and the SIGWINCH handler are active only for the
    /// duration of the call; `saved` is restored on every return path.
    pub fn read_line(&mut self, saved: &libc::termios) -> ReadOutcome {
        match self.run_session(saved) {
            Ok(outcome) => outcome,
            Err(err) => {
                log::debug!("editor session aborted: {}", err);
                ReadOutcome::Interrupt
            }
        }
    }

    fn run_session(&mut self, saved: &libc::termios) -> io::Result<ReadOutcome> {
        self.reset();
        let _raw = term::RawSession::enter(saved)?;
        term::write_str(&self.prompt)?;

        let mut decoder = KeyDecoder::new();
        loop {
            if term::take_winch() {
                self.redraw_current()?;
            }
            let byte = match term::getch()? {
                Some(byte) => byte,
                None => return Ok(ReadOutcome::Exit),
            };
            let key = match decoder.feed(byte) {
                Decode::Incomplete => continue,
                // Invalid sequences are dropped silently.
                Decode::Invalid => continue,
                Decode::Key(key) => key,
            };
            if let Some(outcome) = self.dispatch(key)? {
                if let ReadOutcome::Line(ref line) = outcome {
                    if !line.is_empty() {
                        self.history.add(line);
                    }
                }
                return Ok(outcome);
            }
        }
    }

    /// Start a fresh composition: all shadow rows dropped, cursor home.
    fn reset(&mut self) {
        let rows = self.history.capacity() + 1;
        self.buffer.clear();
        self.buffer.resize(rows, None);
        self.buffer[0] = Some(String::new());
        self.row = 0;
        self.col = 0;
        self.search = None;
    }

    // =========================================================================
    // Row access
    // =========================================================================

    /// The stored string of a row: the materialized copy if the row has
    /// been edited, otherwise the history entry it shadows.
    fn row_text(&self, row: usize) -> &str {
        if let Some(Some(line)) = self.buffer.get(row) {
            return line;
        }
        if row > 0 {
            self.history.get(row - 1).unwrap_or("")
        } else {
            ""
        }
    }

    fn line(&self) -> &str {
        self.row_text(self.row)
    }

    /// Copy-on-write access to the current row. History itself is never
    /// modified; the first mutation of a history row edits a copy.
    fn line_mut(&mut self) -> &mut String {
        if self.buffer[self.row].is_none() {
            let copy = if self.row > 0 {
                self.history.get(self.row - 1).unwrap_or("").to_string()
            } else {
                String::new()
            };
            self.buffer[self.row] = Some(copy);
        }
        self.buffer[self.row].get_or_insert_with(String::new)
    }

    fn bad_utf8() -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, "cursor split a code point")
    }

    // =========================================================================
    // Event dispatch
    // =========================================================================

    pub(crate) fn dispatch(&mut self, key: Key) -> io::Result<Option<ReadOutcome>> {
        if self.search.is_some() {
            return self.dispatch_search(key);
        }

        match key {
            Key::Text(c) => self.insert_char(c)?,
            Key::Backspace => self.delete_backward()?,
            Key::Delete => self.delete_forward()?,
            Key::Backward => self.move_backward()?,
            Key::Forward => self.move_forward()?,
            Key::Home => self.move_home()?,
            Key::End => self.move_end()?,
            Key::Up => self.history_up()?,
            Key::Down => self.history_down()?,
            Key::Search => self.enter_search()?,
            Key::Clear => self.clear_and_redraw()?,
            Key::Tab | Key::PageUp | Key::PageDown => {}
            Key::Enter => {
                term::write_str("\n")?;
                return Ok(Some(ReadOutcome::Line(self.line().to_string())));
            }
            Key::LineKill => {
                term::write_str("^C\n")?;
                return Ok(Some(ReadOutcome::Line(String::new())));
            }
            Key::Exit => {
                term::write_str("^D\n")?;
                return Ok(Some(ReadOutcome::Exit));
            }
        }
        Ok(None)
    }

    fn dispatch_search(&mut self, key: Key) -> io::Result<Option<ReadOutcome>> {
        match key {
            Key::Text(c) => {
                if let Some(search) = self.search.as_mut() {
                    search.query.push(c);
                }
                self.search_from(0);
                self.redraw_overlay()?;
            }
            Key::Backspace => {
                if let Some(search) = self.search.as_mut() {
                    search.query.pop();
                }
                self.search_from(0);
                self.redraw_overlay()?;
            }
            Key::Search => {
                self.search_from(self.row + 1);
                self.redraw_overlay()?;
            }
            // Motions leave search mode and act on the landed-on line.
            Key::Backward => {
                self.exit_search()?;
                self.move_backward()?;
            }
            Key::Forward => {
                self.exit_search()?;
                self.move_forward()?;
            }
            Key::Home => {
                self.exit_search()?;
                self.move_home()?;
            }
            Key::End => {
                self.exit_search()?;
                self.move_end()?;
            }
            Key::Up => {
                self.exit_search()?;
                self.history_up()?;
            }
            Key::Down => {
                self.exit_search()?;
                self.history_down()?;
            }
            Key::Tab | Key::Delete => self.exit_search()?,
            Key::Clear => {
                self.search = None;
                self.clear_and_redraw()?;
            }
            Key::PageUp | Key::PageDown => {}
            Key::Enter => {
                self.search = None;
                term::write_str("\n")?;
                return Ok(Some(ReadOutcome::Line(self.line().to_string())));
            }
            Key::LineKill => {
                self.search = None;
                term::write_str("^C\n")?;
                return Ok(Some(ReadOutcome::Line(String::new())));
            }
            Key::Exit => {
                self.search = None;
                term::write_str("^D\n")?;
                return Ok(Some(ReadOutcome::Exit));
            }
        }
        Ok(None)
    }

    // =========================================================================
    // Text mutation
    // =========================================================================

    fn insert_char(&mut self, c: char) -> io::Result<()> {
        let col = self.col;
        let line = self.line_mut();
        line.insert(col, c);
        let tail = line[col..].to_string();
        self.col = col + c.len_utf8();
        self.redraw_tail(&tail, 1)
    }

    fn delete_backward(&mut self) -> io::Result<()> {
        if self.col == 0 {
            return Ok(());
        }
        let col = self.col;
        let n = utf8::tail_codepoint_bytes(&self.line().as_bytes()[..col])
            .ok_or_else(Self::bad_utf8)?;
        let new_col = col - n;
        let line = self.line_mut();
        line.replace_range(new_col..col, "");
        let tail = line[new_col..].to_string();
        self.col = new_col;
        term::cursor_back(1)?;
        self.redraw_tail(&tail, 0)
    }

    fn delete_forward(&mut self) -> io::Result<()> {
        let col = self.col;
        if col >= self.line().len() {
            return Ok(());
        }
        let n = utf8::leading_length(self.line().as_bytes()[col]).ok_or_else(Self::bad_utf8)?;
        let line = self.line_mut();
        line.replace_range(col..col + n, "");
        let tail = line[col..].to_string();
        self.redraw_tail(&tail, 0)
    }

    // =========================================================================
    // Cursor motion
    // =========================================================================

    fn move_backward(&mut self) -> io::Result<()> {
        if self.col == 0 {
            return Ok(());
        }
        let n = utf8::tail_codepoint_bytes(&self.line().as_bytes()[..self.col])
            .ok_or_else(Self::bad_utf8)?;
        self.col -= n;
        term::cursor_back(1)
    }

    fn move_forward(&mut self) -> io::Result<()> {
        if self.col >= self.line().len() {
            return Ok(());
        }
        let n = utf8::leading_length(self.line().as_bytes()[self.col]).ok_or_else(Self::bad_utf8)?;
        self.col += n;
        term::cursor_forward(1)
    }

    fn move_home(&mut self) -> io::Result<()> {
        let back = utf8::codepoint_count(&self.line().as_bytes()[..self.col])
            .ok_or_else(Self::bad_utf8)?;
        self.col = 0;
        term::cursor_back(back)
    }

    fn move_end(&mut self) -> io::Result<()> {
        let forward = utf8::codepoint_count(&self.line().as_bytes()[self.col..])
            .ok_or_else(Self::bad_utf8)?;
        self.col = self.line().len();
        term::cursor_forward(forward)
    }

    // =========================================================================
    // History browsing
    // =========================================================================

    fn history_up(&mut self) -> io::Result<()> {
        if self.row < self.history.len() {
            self.row += 1;
            self.col = self.line().len();
            self.redraw_line()?;
        }
        Ok(())
    }

    fn history_down(&mut self) -> io::Result<()> {
        if self.row > 0 {
            self.row -= 1;
            self.col = self.line().len();
            self.redraw_line()?;
        }
        Ok(())
    }

    // =========================================================================
    // Reverse search
    // =========================================================================

    fn enter_search(&mut self) -> io::Result<()> {
        self.search = Some(Search { query: String::new() });
        self.redraw_overlay()
    }

    fn exit_search(&mut self) -> io::Result<()> {
        self.search = None;
        self.redraw_line()
    }

    /// Move to the first row at or above `start` whose stored string
    /// contains the query, with the column on the match. Stays put when
    /// nothing matches.
    fn search_from(&mut self, start: usize) {
        let query = match &self.search {
            Some(search) => search.query.clone(),
            None => return,
        };
        for row in start..=self.history.len() {
            if let Some(pos) = self.row_text(row).find(query.as_str()) {
                self.row = row;
                self.col = pos;
                return;
            }
        }
    }

    // =========================================================================
    // Redraw
    // =========================================================================

    /// Save cursor, clear to end of line, write the tail, restore, and
    /// optionally advance by whole columns.
    fn redraw_tail(&self, tail: &str, advance: usize) -> io::Result<()> {
        term::save_cursor()?;
        term::clear_to_eol()?;
        term::write_str(tail)?;
        term::restore_cursor()?;
        term::cursor_forward(advance)
    }

    /// Rewrite the whole line and park the cursor at the current column.
    fn redraw_line(&self) -> io::Result<()> {
        let line = self.line();
        let back =
            utf8::codepoint_count(&line.as_bytes()[self.col..]).ok_or_else(Self::bad_utf8)?;
        term::write_str("\r")?;
        term::write_str(&self.prompt)?;
        term::write_str(line)?;
        term::clear_to_eol()?;
        term::cursor_back(back)
    }

    /// Rewrite the reverse-search overlay, cursor parked after the query.
    fn redraw_overlay(&self) -> io::Result<()> {
        let search = match &self.search {
            Some(search) => search,
            None => return Ok(()),
        };
        let overlay = format!("{}{}{}{}", SEARCH_PREFIX, search.query, SEARCH_SEP, self.line());
        let suffix_start = SEARCH_PREFIX.len() + search.query.len();
        let back = utf8::codepoint_count(&overlay.as_bytes()[suffix_start..])
            .ok_or_else(Self::bad_utf8)?;
        term::write_str("\r")?;
        term::write_str(&overlay)?;
        term::clear_to_eol()?;
        term::cursor_back(back)
    }

    fn clear_and_redraw(&self) -> io::Result<()> {
        term::clear_screen()?;
        self.redraw_line()
    }

    fn redraw_current(&self) -> io::Result<()> {
        if self.search.is_some() {
            self.redraw_overlay()
        } else {
            self.redraw_line()
        }
    }
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
