// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The built-in commands.

use core::fmt;

use stboot_shell::Command;

use crate::{Board, Monitor};

/// Prints a plain (untimestamped) line on the monitor's console.
macro_rules! outln {
    ($m:expr, $($arg:tt)*) => {
        $m.tty.line(format_args!($($arg)*))
    };
}

mod boot;
mod cache;
mod flash;
mod mem;
mod misc;

/// Registered in this order; `help` and tab completion list them newest
/// first.
pub(crate) fn table<B: Board>() -> [Command<Monitor<B>>; 11] {
    [
        Command {
            name: "boot",
            help: Some(boot::help),
            exec: boot::boot::<B>,
        },
        Command {
            name: "help",
            help: None,
            exec: misc::help::<B>,
        },
        Command {
            name: "clear",
            help: None,
            exec: misc::clear::<B>,
        },
        Command {
            name: "md",
            help: Some(mem::help_md),
            exec: mem::md::<B>,
        },
        Command {
            name: "mw",
            help: Some(mem::help_mw),
            exec: mem::mw::<B>,
        },
        Command {
            name: "mtest",
            help: None,
            exec: mem::mtest::<B>,
        },
        Command {
            name: "cache",
            help: Some(cache::help),
            exec: cache::cache::<B>,
        },
        Command {
            name: "version",
            help: None,
            exec: misc::version::<B>,
        },
        Command {
            name: "reset",
            help: None,
            exec: misc::reset::<B>,
        },
        Command {
            name: "qftool",
            help: Some(flash::help_qftool),
            exec: flash::qftool::<B>,
        },
        Command {
            name: "update",
            help: Some(flash::help_update),
            exec: flash::update::<B>,
        },
    ]
}

/// Indents everything written through it by eight spaces, and turns `\n`
/// into `\r\n`. Help text is written through one of these.
struct Indent<'a, W: fmt::Write + ?Sized> {
    inner: &'a mut W,
    at_line_start: bool,
}

impl<'a, W: fmt::Write + ?Sized> Indent<'a, W> {
    fn new(inner: &'a mut W) -> Self {
        Self {
            inner,
            at_line_start: true,
        }
    }
}

impl<W: fmt::Write + ?Sized> fmt::Write for Indent<'_, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for (i, part) in s.split('\n').enumerate() {
            if i > 0 {
                self.inner.write_str("\r\n")?;
                self.at_line_start = true;
            }
            if part.is_empty() {
                continue;
            }
            if self.at_line_start {
                self.inner.write_str("        ")?;
                self.at_line_start = false;
            }
            self.inner.write_str(part)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{self, MockBoard};
    use fmt::Write;

    #[test]
    fn every_command_registers() {
        let t = table::<MockBoard>();
        let r = stboot_shell::Registry::from_table(&t).unwrap();
        assert_eq!(r.len(), t.len());
        let names: Vec<_> = r.iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            [
                "update", "qftool", "reset", "version", "cache", "mtest",
                "mw", "md", "clear", "help", "boot"
            ]
        );
    }

    #[test]
    fn indent() {
        let mut s = String::new();
        let mut w = Indent::new(&mut s);
        write!(w, "one\ntw").unwrap();
        write!(w, "o\n").unwrap();
        assert_eq!(s, "        one\r\n        two\r\n");
    }

    #[test]
    fn completion_uses_the_table() {
        let mut m = mock::monitor();
        m.tty.inner().feed(b"up\t\r");
        m.step();
        // Completed to "update" with no argument: usage and EINVAL.
        let out = m.tty.inner().take_output();
        assert!(out.contains("update\r\n"), "{out:?}");
        assert!(out.contains("usage: update fdt|kernel"), "{out:?}");
    }
}
