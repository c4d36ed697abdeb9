// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt;

use crate::{write_record, Level, Log};

/// Holds log records produced before there's a console to print them on.
///
/// Records are formatted as they arrive, so timestamps reflect when they
/// were logged rather than when they were flushed. Once `N` bytes are held,
/// further bytes are dropped and counted.
pub struct EarlyLog<const N: usize> {
    buf: [u8; N],
    len: usize,
    dropped: usize,
    now: fn() -> u32,
}

impl<const N: usize> EarlyLog<N> {
    /// Creates an empty log that stamps records using `now` (milliseconds
    /// since reset).
    pub const fn new(now: fn() -> u32) -> Self {
        Self {
            buf: [0; N],
            len: 0,
            dropped: 0,
            now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes held.
    pub fn available(&self) -> usize {
        self.len
    }

    /// Bytes discarded because the buffer was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Queues as much of `data` as fits.
    pub fn enqueue(&mut self, data: &[u8]) {
        let n = data.len().min(N - self.len);
        self.buf[self.len..self.len + n].copy_from_slice(&data[..n]);
        self.len += n;
        self.dropped += data.len() - n;
    }

    /// Hands everything queued to `f` and empties the log. The drop count
    /// is kept.
    pub fn drain(&mut self, mut f: impl FnMut(&[u8])) {
        if self.len > 0 {
            f(&self.buf[..self.len]);
        }
        self.len = 0;
    }
}

impl<const N: usize> fmt::Write for EarlyLog<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.enqueue(s.as_bytes());
        Ok(())
    }
}

impl<const N: usize> Log for EarlyLog<N> {
    fn log(&mut self, level: Level, args: fmt::Arguments<'_>) {
        let now = (self.now)();
        // We never report write failure, only count drops.
        let _ = write_record(self, level, now, args);
    }
}
