// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt;

/// A character stream that the shell reads keystrokes from and echoes to.
///
/// Formatted output goes through the `fmt::Write` supertrait, so anything
/// implementing `Console` can be handed to `write!`.
pub trait Console: fmt::Write {
    /// Returns the next input byte, blocking until one arrives.
    ///
    /// This is the only place the shell ever waits.
    fn read_byte(&mut self) -> u8;

    /// Writes raw bytes.
    fn write_bytes(&mut self, bytes: &[u8]);

    /// Moves the terminal cursor `n` columns left. Does nothing for 0.
    fn cursor_left(&mut self, n: usize) {
        if n > 0 {
            // Writes to a console can't fail in any way we can report.
            let _ = write!(self, "\x1b[{n}D");
        }
    }

    /// Moves the terminal cursor `n` columns right. Does nothing for 0.
    fn cursor_right(&mut self, n: usize) {
        if n > 0 {
            let _ = write!(self, "\x1b[{n}C");
        }
    }
}

/// Control bytes and escape sequences spoken on the console.
pub mod ansi {
    /// ASCII ETX, sent by Ctrl-C.
    pub const ETX: u8 = 0x03;
    pub const TAB: u8 = b'\t';
    pub const CR: u8 = b'\r';
    pub const ESC: u8 = 0x1b;
    /// What terminals send for the Backspace key.
    pub const DEL: u8 = 0x7f;

    pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
    pub const CLEAR_TO_EOL: &str = "\x1b[K";

    pub const RED: &str = "\x1b[1;31m";
    pub const YELLOW: &str = "\x1b[1;33m";
    pub const CYAN: &str = "\x1b[1;36m";
    pub const RESET: &str = "\x1b[0m";
}
