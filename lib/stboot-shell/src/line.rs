// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Maximum number of characters on a command line.
pub const LINE_CAPACITY: usize = 64;

/// A completed command line, as handed from the editor to the dispatcher.
pub type Line = heapless::String<LINE_CAPACITY>;

/// The line being edited.
///
/// `len` is the insertion index (end of entered text) and `cursor` is the
/// arrow index (point of next edit). We maintain
/// `cursor <= len <= LINE_CAPACITY` at all times, and only ever store bytes
/// in `0x20..=0x7e`, so the contents are always valid UTF-8.
#[derive(Clone, Debug)]
pub struct LineBuffer {
    buf: [u8; LINE_CAPACITY],
    len: usize,
    cursor: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self {
            buf: [0; LINE_CAPACITY],
            len: 0,
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == LINE_CAPACITY
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn as_str(&self) -> &str {
        // Only printable ASCII is ever inserted.
        core::str::from_utf8(self.as_bytes()).unwrap_or("")
    }

    /// Text from the cursor to the end of the line.
    pub fn tail(&self) -> &[u8] {
        &self.buf[self.cursor..self.len]
    }

    /// Inserts `c` at the cursor, shifting anything after it right by one.
    /// Returns `false`, leaving the buffer untouched, if the line is full.
    pub fn insert(&mut self, c: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.buf.copy_within(self.cursor..self.len, self.cursor + 1);
        self.buf[self.cursor] = c;
        self.len += 1;
        self.cursor += 1;
        true
    }

    /// Removes the character just before the cursor. Returns `false` if the
    /// cursor is already at the start of the line.
    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.buf.copy_within(self.cursor..self.len, self.cursor - 1);
        self.len -= 1;
        self.cursor -= 1;
        true
    }

    pub fn move_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    pub fn move_right(&mut self) -> bool {
        if self.cursor == self.len {
            return false;
        }
        self.cursor += 1;
        true
    }

    /// Appends `s` at the end of the line, stopping at capacity, and moves
    /// the cursor to the new end. Returns the number of bytes appended.
    pub fn append(&mut self, s: &str) -> usize {
        let room = LINE_CAPACITY - self.len;
        let n = s.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        self.cursor = self.len;
        n
    }

    /// Replaces the whole line, leaving the cursor at the end.
    pub fn set(&mut self, s: &str) {
        self.clear();
        self.append(s);
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.cursor = 0;
    }

    pub fn to_line(&self) -> Line {
        let mut line = Line::new();
        // Capacities match, so this cannot fail.
        let _ = line.push_str(self.as_str());
        line
    }
}
