// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt;

use boot_handoff::Handoff;
use bootlog::{write_record, Level, Log};
use flash_update::{ImageSource, XipFlash};
use stboot_shell::Console;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cache {
    Instruction,
    Data,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CacheOp {
    Invalidate,
    Disable,
    Enable,
}

impl CacheOp {
    /// `i` invalidates and `0` disables. Anything else, including nothing
    /// at all, enables.
    pub fn from_arg(c: Option<u8>) -> Self {
        match c {
            Some(b'i') => CacheOp::Invalidate,
            Some(b'0') => CacheOp::Disable,
            _ => CacheOp::Enable,
        }
    }
}

/// The hardware the monitor runs on.
pub trait Board: Handoff {
    type Console: Console;
    type Flash: XipFlash;
    type Images: ImageSource;

    /// Milliseconds since reset.
    fn now_ms() -> u32;

    /// Reads a word from an arbitrary address.
    ///
    /// # Safety
    ///
    /// `addr` is whatever the user typed. It may be unmapped, unaligned or
    /// a register with read side effects.
    unsafe fn peek32(&mut self, addr: u32) -> u32;

    /// Writes a word to an arbitrary address.
    ///
    /// # Safety
    ///
    /// As for [`Board::peek32`], and the write may clobber anything.
    unsafe fn poke32(&mut self, addr: u32, value: u32);

    fn cache(&mut self, which: Cache, op: CacheOp);

    fn reset(&mut self) -> !;
}

/// What a [`Board`] hands over to the monitor.
pub struct Parts<B: Board> {
    pub board: B,
    pub console: B::Console,
    pub flash: B::Flash,
    pub images: B::Images,
    /// Scratch space images are loaded into before programming.
    pub staging: &'static mut [u8],
}

/// The console, as used by the monitor: raw terminal I/O plus timestamped
/// log records.
pub struct Tty<C> {
    con: C,
    now: fn() -> u32,
}

impl<C: Console> Tty<C> {
    pub fn new(con: C, now: fn() -> u32) -> Self {
        Self { con, now }
    }

    pub fn inner(&mut self) -> &mut C {
        &mut self.con
    }

    pub fn into_inner(self) -> C {
        self.con
    }

    /// Prints `args` and a line break, without a timestamp.
    pub fn line(&mut self, args: fmt::Arguments<'_>) {
        let _ = self.con.write_fmt(args);
        let _ = self.con.write_str("\r\n");
    }
}

impl<C: Console> fmt::Write for Tty<C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.con.write_str(s)
    }
}

impl<C: Console> Console for Tty<C> {
    fn read_byte(&mut self) -> u8 {
        self.con.read_byte()
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.con.write_bytes(bytes)
    }
}

impl<C: Console> Log for Tty<C> {
    fn log(&mut self, level: Level, args: fmt::Arguments<'_>) {
        let now = (self.now)();
        let _ = write_record(&mut self.con, level, now, args);
    }
}
