// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Logging for st-boot.
//!
//! There are two kinds of output here, and they go to different places:
//!
//! - **Log records** are human-readable lines on the console, stamped with
//!   the time since reset:
//!
//!   ```text
//!   [    0.012000] sdram: 32 MiB @ 0xc0000000
//!   ```
//!
//!   Anything implementing [`Log`] can receive them; use the [`pr_err!`],
//!   [`pr_warn!`], [`pr_info!`] and [`pr_debug!`] macros, which take the sink
//!   as their first argument. Before the console exists, records go into an
//!   [`EarlyLog`] and are replayed once it does.
//!
//! - **Trace entries** are compact `Copy` values pushed into a static
//!   [`Ringbuf`] with [`ringbuf_entry!`]. They are never printed; they're
//!   for looking at from a debugger after something has gone wrong:
//!
//!   ```console
//!   (gdb) print stboot_monitor::TRACE
//!   ```

#![cfg_attr(not(test), no_std)]

use core::fmt;

mod early;
mod ringbuf;

pub use early::EarlyLog;
pub use ringbuf::{Ringbuf, RingbufEntry, StaticRingbuf};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl Level {
    /// ANSI color the record is wrapped in, if any.
    pub const fn color(self) -> Option<&'static str> {
        match self {
            Level::Error => Some("\x1b[1;31m"),
            Level::Warn => Some("\x1b[1;33m"),
            Level::Info | Level::Debug => None,
        }
    }
}

const RESET: &str = "\x1b[0m";

/// A destination for log records.
pub trait Log {
    fn log(&mut self, level: Level, args: fmt::Arguments<'_>);
}

/// Formats one record, `[sssss.uuuuuu] message\r\n`, into `w`.
///
/// The tick only has millisecond resolution, so the last three digits of
/// the fraction are always zero.
pub fn write_record<W: fmt::Write + ?Sized>(
    w: &mut W,
    level: Level,
    now_ms: u32,
    args: fmt::Arguments<'_>,
) -> fmt::Result {
    let color = level.color();
    if let Some(c) = color {
        w.write_str(c)?;
    }
    write!(w, "[{:5}.{:06}] ", now_ms / 1000, (now_ms % 1000) * 1000)?;
    w.write_fmt(args)?;
    if color.is_some() {
        w.write_str(RESET)?;
    }
    w.write_str("\r\n")
}

#[macro_export]
macro_rules! pr_err {
    ($sink:expr, $($arg:tt)+) => {{
        use $crate::Log as _;
        $sink.log($crate::Level::Error, format_args!($($arg)+))
    }};
}

#[macro_export]
macro_rules! pr_warn {
    ($sink:expr, $($arg:tt)+) => {{
        use $crate::Log as _;
        $sink.log($crate::Level::Warn, format_args!($($arg)+))
    }};
}

#[macro_export]
macro_rules! pr_info {
    ($sink:expr, $($arg:tt)+) => {{
        use $crate::Log as _;
        $sink.log($crate::Level::Info, format_args!($($arg)+))
    }};
}

#[macro_export]
macro_rules! pr_debug {
    ($sink:expr, $($arg:tt)+) => {{
        use $crate::Log as _;
        $sink.log($crate::Level::Debug, format_args!($($arg)+))
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Capture {
        now: u32,
        out: String,
    }

    impl Log for Capture {
        fn log(&mut self, level: Level, args: fmt::Arguments<'_>) {
            write_record(&mut self.out, level, self.now, args).unwrap();
        }
    }

    #[test]
    fn record_format() {
        let mut c = Capture {
            now: 12_345,
            ..Default::default()
        };
        pr_info!(c, "sdram: {} MiB", 32);
        assert_eq!(c.out, "[   12.345000] sdram: 32 MiB\r\n");
    }

    #[test]
    fn zero_time() {
        let mut c = Capture::default();
        pr_debug!(c, "tick");
        assert_eq!(c.out, "[    0.000000] tick\r\n");
    }

    #[test]
    fn errors_and_warnings_are_colored() {
        let mut c = Capture::default();
        pr_err!(c, "boom");
        assert_eq!(c.out, "\x1b[1;31m[    0.000000] boom\x1b[0m\r\n");

        let mut c = Capture::default();
        pr_warn!(c, "hmm {:#x}", 0x10);
        assert_eq!(c.out, "\x1b[1;33m[    0.000000] hmm 0x10\x1b[0m\r\n");
    }

    #[test]
    fn macros_accept_a_reference() {
        let mut c = Capture::default();
        let sink = &mut c;
        pr_info!(sink, "via ref");
        assert!(c.out.ends_with("via ref\r\n"));
    }
}
