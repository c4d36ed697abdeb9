// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A host-side board for exercising the monitor.

use std::cell::Cell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use boot_handoff::{Handoff, Registers};
use flash_update::{FlashError, ImageSource, NorFlash, SourceError, BLOCK_SIZE};
use stboot_shell::Console;

use crate::config::{Config, QSPI_SIZE};
use crate::{Board, Cache, CacheOp, Monitor, Parts, XipFlash};

thread_local! {
    static NOW: Cell<u32> = const { Cell::new(0) };
    static STEP: Cell<u32> = const { Cell::new(0) };
}

/// Makes every read of the clock advance it by `ms`.
pub fn set_tick_step(ms: u32) {
    STEP.with(|s| s.set(ms));
}

#[derive(Default)]
pub struct MockBoard {
    /// Sparse word-addressed memory; unwritten words read as zero.
    pub mem: BTreeMap<u32, u32>,
    /// An address whose writes are lost.
    pub stuck: Option<u32>,
    pub cache_ops: Vec<(Cache, CacheOp)>,
    pub events: Vec<&'static str>,
}

impl Handoff for MockBoard {
    fn disable_dcache(&mut self) {
        self.events.push("dcache off");
    }

    fn disable_systick(&mut self) {
        self.events.push("systick off");
    }

    fn mask_interrupts(&mut self) {
        self.events.push("irq masked");
    }

    unsafe fn jump(&mut self, entry: u32, regs: Registers) -> ! {
        panic!(
            "jump {entry:#x} r0={:#x} r1={:#x} r2={:#x}",
            regs.r0, regs.r1, regs.r2
        );
    }
}

impl Board for MockBoard {
    type Console = MockConsole;
    type Flash = MockFlash;
    type Images = MockImages;

    fn now_ms() -> u32 {
        let step = STEP.with(Cell::get);
        NOW.with(|n| {
            let t = n.get();
            n.set(t.wrapping_add(step));
            t
        })
    }

    unsafe fn peek32(&mut self, addr: u32) -> u32 {
        self.mem.get(&addr).copied().unwrap_or(0)
    }

    unsafe fn poke32(&mut self, addr: u32, value: u32) {
        if self.stuck != Some(addr) {
            self.mem.insert(addr, value);
        }
    }

    fn cache(&mut self, which: Cache, op: CacheOp) {
        self.cache_ops.push((which, op));
    }

    fn reset(&mut self) -> ! {
        panic!("reset");
    }
}

#[derive(Default)]
pub struct MockConsole {
    input: VecDeque<u8>,
    output: String,
}

impl MockConsole {
    pub fn feed(&mut self, input: &[u8]) {
        self.input.extend(input.iter().copied());
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}

impl fmt::Write for MockConsole {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.output.push_str(s);
        Ok(())
    }
}

impl Console for MockConsole {
    fn read_byte(&mut self) -> u8 {
        self.input.pop_front().expect("console input exhausted")
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.output.push_str(&String::from_utf8_lossy(bytes));
    }
}

/// NOR semantics: erase sets a block to 0xff, programming ANDs.
pub struct MockFlash {
    pub mem: Vec<u8>,
    pub mapped: bool,
    /// Erasing the block at this offset times out.
    pub fail_erase_at: Option<u32>,
}

impl MockFlash {
    fn range(&self, addr: u32, len: usize) -> Result<std::ops::Range<usize>, FlashError> {
        assert!(!self.mapped, "indirect access while memory-mapped");
        let start = addr as usize;
        let end = start + len;
        if end > self.mem.len() {
            return Err(FlashError::OutOfRange);
        }
        Ok(start..end)
    }
}

impl NorFlash for MockFlash {
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        let r = self.range(addr, buf.len())?;
        buf.copy_from_slice(&self.mem[r]);
        Ok(())
    }

    fn erase_block(&mut self, addr: u32) -> Result<(), FlashError> {
        assert_eq!(addr % BLOCK_SIZE, 0);
        if self.fail_erase_at == Some(addr) {
            return Err(FlashError::Timeout);
        }
        let r = self.range(addr, BLOCK_SIZE as usize)?;
        self.mem[r].fill(0xff);
        Ok(())
    }

    fn program_page(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError> {
        let r = self.range(addr, data.len())?;
        for (m, d) in self.mem[r].iter_mut().zip(data) {
            *m &= d;
        }
        Ok(())
    }
}

impl XipFlash for MockFlash {
    fn memory_map(&mut self) -> Result<(), FlashError> {
        self.mapped = true;
        Ok(())
    }

    fn unmap(&mut self) -> Result<(), FlashError> {
        self.mapped = false;
        Ok(())
    }

    fn is_mapped(&self) -> bool {
        self.mapped
    }

    fn read_id(&mut self) -> Result<[u8; 3], FlashError> {
        assert!(!self.mapped, "indirect access while memory-mapped");
        Ok([0xef, 0x40, 0x17])
    }
}

#[derive(Default)]
pub struct MockImages {
    pub files: BTreeMap<&'static str, Vec<u8>>,
}

impl ImageSource for MockImages {
    fn load(&mut self, name: &str, buf: &mut [u8]) -> Result<usize, SourceError> {
        let data = self.files.get(name).ok_or(SourceError::NotFound)?;
        let dst = buf.get_mut(..data.len()).ok_or(SourceError::TooLarge)?;
        dst.copy_from_slice(data);
        Ok(data.len())
    }
}

/// A monitor on a fresh mock board: flash erased and memory-mapped, the
/// clock at zero and not advancing.
pub fn monitor() -> Monitor<MockBoard> {
    NOW.with(|n| n.set(0));
    set_tick_step(0);

    let staging = vec![0u8; 8 * BLOCK_SIZE as usize].into_boxed_slice();
    let parts = Parts {
        board: MockBoard::default(),
        console: MockConsole::default(),
        flash: MockFlash {
            mem: vec![0xff; QSPI_SIZE as usize],
            mapped: true,
            fail_erase_at: None,
        },
        images: MockImages::default(),
        staging: Box::leak(staging),
    };
    let config = Config {
        mtest_bytes: 0x1000,
        ..Config::ART_PI
    };
    Monitor::new(parts, config).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_runs_a_typed_line() {
        let mut m = monitor();
        m.tty.inner().feed(b"mw 1000 5\r");
        m.step();
        assert_eq!(m.board.mem.get(&0x1000), Some(&5));
        let out = m.tty.inner().take_output();
        assert!(out.starts_with(crate::config::PROMPT), "{out:?}");
        assert!(out.ends_with("mw 1000 5\r\n"), "{out:?}");
    }

    #[test]
    fn history_recalls_previous_command() {
        let mut m = monitor();
        m.tty.inner().feed(b"mw 1000 5\r");
        m.step();
        m.board.mem.clear();
        m.tty.inner().feed(b"\x1b[A\r");
        m.step();
        assert_eq!(m.board.mem.get(&0x1000), Some(&5));
    }

    #[test]
    fn banner() {
        let mut m = monitor();
        m.banner();
        let out = m.tty.inner().take_output();
        assert!(out.contains("/_____/"), "{out:?}");
    }
}
