// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `md`, `mw` and `mtest`.
//!
//! None of these check the address they're given.

use core::fmt::{self, Write as _};

use bootlog::pr_err;
use stboot_shell::{
    parse::{parse_mem_range, Radix},
    Error,
};

use crate::{Board, Monitor, XipFlash};

/// Words moved per loop iteration by `mtest`.
const BURST: u32 = 32;

pub(super) fn help_md(w: &mut dyn fmt::Write) -> fmt::Result {
    writeln!(w, "md <address> <length>")?;
    writeln!(w, "read CPUID: md e000ed00 1")?;
    writeln!(w, "411fc271")
}

pub(super) fn help_mw(w: &mut dyn fmt::Write) -> fmt::Result {
    writeln!(w, "mw <address> <value>")
}

pub(super) fn md<B: Board>(m: &mut Monitor<B>, line: &str) -> Result<(), Error> {
    let (addr, count) = parse_mem_range(line, Radix::Decimal)?;
    for i in 0..count {
        // Safety: the user picked the address.
        let word = unsafe { m.board.peek32(addr.wrapping_add(i.wrapping_mul(4))) };
        let _ = write!(m.tty, "{word:08x} ");
        if i % 4 == 3 {
            let _ = m.tty.write_str("\r\n");
        }
    }
    let _ = m.tty.write_str("\r\n");
    Ok(())
}

pub(super) fn mw<B: Board>(m: &mut Monitor<B>, line: &str) -> Result<(), Error> {
    let (addr, value) = parse_mem_range(line, Radix::Hex)?;
    // Safety: the user picked the address.
    unsafe { m.board.poke32(addr, value) };
    Ok(())
}

/// Throughput in MB/s, decimal megabytes, rounded down.
struct Speed {
    bytes: u32,
    ms: u32,
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kb = self.bytes / 1000;
        match self.ms {
            0 => write!(f, ">{kb} MB/s"),
            ms => write!(f, "{} MB/s", kb / ms),
        }
    }
}

fn timed<B: Board>(f: impl FnOnce()) -> u32 {
    let start = B::now_ms();
    f();
    B::now_ms().wrapping_sub(start)
}

fn write_pattern<B: Board>(board: &mut B, base: u32, words: u32) {
    let mut addr = base;
    let mut j = 0u32;
    for _ in 0..words / BURST {
        for _ in 0..BURST {
            // Safety: only called on the configured SDRAM window.
            unsafe { board.poke32(addr, j) };
            addr = addr.wrapping_add(4);
            j = j.wrapping_add(1);
        }
    }
}

/// Reads `words` words from `base`, returning the first that doesn't match
/// the pattern, if `check` is set.
fn read_back<B: Board>(
    board: &mut B,
    base: u32,
    words: u32,
    check: bool,
) -> Option<(u32, u32)> {
    let mut addr = base;
    let mut j = 0u32;
    let mut bad = None;
    for _ in 0..words / BURST {
        for _ in 0..BURST {
            // Safety: only called on configured memory windows.
            let v = unsafe { board.peek32(addr) };
            if check && v != j && bad.is_none() {
                bad = Some((addr, v));
            }
            addr = addr.wrapping_add(4);
            j = j.wrapping_add(1);
        }
    }
    bad
}

pub(super) fn mtest<B: Board>(m: &mut Monitor<B>, _line: &str) -> Result<(), Error> {
    let bytes = m.config.mtest_bytes;
    let words = bytes / 4;
    let sdram = m.config.sdram.base;

    let board = &mut m.board;
    let ms = timed::<B>(|| write_pattern(board, sdram, words));
    outln!(m, "sdram write: {}", Speed { bytes, ms });

    let mut bad = None;
    let board = &mut m.board;
    let ms = timed::<B>(|| bad = read_back(board, sdram, words, true));
    outln!(m, "sdram  read: {}", Speed { bytes, ms });

    if m.flash.is_mapped() {
        let xip = m.config.xip.base;
        let board = &mut m.board;
        let ms = timed::<B>(|| {
            read_back(board, xip, words, false);
        });
        outln!(m, "qspi-flash read: {}", Speed { bytes, ms });
    } else {
        outln!(m, "qspi-flash read: not memory-mapped");
    }
    outln!(m, "");

    if let Some((addr, v)) = bad {
        let expected = (addr - sdram) / 4;
        pr_err!(
            m.tty,
            "mtest: sdram 0x{:08x}: wrote 0x{:08x}, read 0x{:08x}",
            addr,
            expected,
            v
        );
        return Err(Error::Io);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::mock;

    #[test]
    fn md_reads_cpuid() {
        let mut m = mock::monitor();
        m.board.mem.insert(0xe000_ed00, 0x411f_c271);
        m.execute("md e000ed00 1");
        assert_eq!(m.tty.inner().take_output(), "411fc271 \r\n");
    }

    #[test]
    fn md_wraps_every_four_words() {
        let mut m = mock::monitor();
        for i in 0..5 {
            m.board.mem.insert(0x2400_0000 + i * 4, i);
        }
        m.execute("md 24000000 5");
        assert_eq!(
            m.tty.inner().take_output(),
            "00000000 00000001 00000002 00000003 \r\n00000004 \r\n"
        );
    }

    #[test]
    fn md_zero_length() {
        let mut m = mock::monitor();
        m.execute("md 24000000 0");
        assert_eq!(m.tty.inner().take_output(), "\r\n");
    }

    #[test]
    fn md_wraps_around_the_address_space() {
        let mut m = mock::monitor();
        m.board.mem.insert(0xffff_fffc, 1);
        m.board.mem.insert(0, 2);
        m.execute("md fffffffc 2");
        assert_eq!(m.tty.inner().take_output(), "00000001 00000002 \r\n");
    }

    #[test]
    fn md_count_is_decimal() {
        let mut m = mock::monitor();
        m.execute("md 0 10");
        let out = m.tty.inner().take_output();
        assert_eq!(out.matches("00000000 ").count(), 10);
    }

    #[test]
    fn mw_then_md() {
        let mut m = mock::monitor();
        m.execute("mw 0x24000010 deadbeef");
        assert_eq!(m.board.mem.get(&0x2400_0010), Some(&0xdead_beef));
        m.execute("md 24000010 1");
        assert_eq!(m.tty.inner().take_output(), "deadbeef \r\n");
    }

    #[test]
    fn missing_arguments() {
        let mut m = mock::monitor();
        m.execute("md 24000000");
        let out = m.tty.inner().take_output();
        assert!(out.contains("error: md: -EINVAL (-22)"), "{out:?}");
        m.execute("mw");
        let out = m.tty.inner().take_output();
        assert!(out.contains("error: mw: -EINVAL (-22)"), "{out:?}");
    }

    #[test]
    fn mtest_reports_throughput() {
        let mut m = mock::monitor();
        mock::set_tick_step(1);
        m.execute("mtest");
        assert_eq!(
            m.tty.inner().take_output(),
            "sdram write: 4 MB/s\r\n\
             sdram  read: 4 MB/s\r\n\
             qspi-flash read: 4 MB/s\r\n\
             \r\n"
        );
        // 0x1000 bytes of pattern landed in SDRAM.
        assert_eq!(m.board.mem.get(&0xc000_0ffc), Some(&0x3ff));
    }

    #[test]
    fn mtest_too_fast_to_time() {
        let mut m = mock::monitor();
        mock::set_tick_step(0);
        m.flash.mapped = false;
        m.execute("mtest");
        assert_eq!(
            m.tty.inner().take_output(),
            "sdram write: >4 MB/s\r\n\
             sdram  read: >4 MB/s\r\n\
             qspi-flash read: not memory-mapped\r\n\
             \r\n"
        );
    }

    #[test]
    fn mtest_catches_stuck_bits() {
        let mut m = mock::monitor();
        m.board.stuck = Some(0xc000_0010);
        m.execute("mtest");
        let out = m.tty.inner().take_output();
        assert!(
            out.contains("mtest: sdram 0xc0000010: wrote 0x00000004, read 0x00000000"),
            "{out:?}"
        );
        assert!(out.contains("error: mtest: -EIO (-5)"), "{out:?}");
    }
}
