// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STM32H7 QUADSPI driver for a single Winbond W25Q-series NOR flash.
//!
//! Everything is polled. The controller is used in two modes:
//!
//! - indirect, for the id, status, erase and program commands, and for
//!   reads through [`NorFlash::read`];
//! - memory-mapped, where reads of the QUADSPI window turn into quad-output
//!   fast reads, so code can execute straight out of flash.
//!
//! Switching to indirect mode aborts memory-mapped mode; the two can't be
//! mixed, so [`NorFlash`] calls while mapped are refused.

#![no_std]

#[cfg(feature = "h743")]
use stm32h7::stm32h743 as device;

#[cfg(feature = "h753")]
use stm32h7::stm32h753 as device;

use bootlog::{ringbuf, ringbuf_entry};
use flash_update::{FlashError, NorFlash, XipFlash, BLOCK_SIZE, PAGE_SIZE};

const FIFO_SIZE: u8 = 32;

/// Command timeouts, in milliseconds. The W25Q64JV's worst cases are 2 s
/// for a 64 KiB block erase and 3 ms for a page program.
const TRANSFER_TIMEOUT_MS: u32 = 100;
const ERASE_TIMEOUT_MS: u32 = 3000;
const PROGRAM_TIMEOUT_MS: u32 = 10;

/// Status register 1: erase or program in progress.
const SR1_BUSY: u8 = 1 << 0;
/// Status register 2: quad enable.
const SR2_QE: u8 = 1 << 1;

#[derive(Copy, Clone)]
enum Command {
    WriteStatusReg2 = 0x31,
    PageProgram = 0x02,
    ReadStatusReg = 0x05,
    WriteEnable = 0x06,
    ReadStatusReg2 = 0x35,
    FastReadQuadOutput = 0x6B,
    EnableReset = 0x66,
    Reset = 0x99,
    ReadId = 0x9F,
    BlockErase64 = 0xD8,
}

/// Lines used by a phase of a command, as encoded in CCR.
#[derive(Copy, Clone)]
enum Lines {
    None = 0b00,
    Single = 0b01,
    Quad = 0b11,
}

#[derive(Copy, Clone)]
enum FMode {
    IndirectWrite = 0b00,
    IndirectRead = 0b01,
    MemoryMapped = 0b11,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Timeout(u8),
    Erase(u32),
    Mapped(bool),
}

ringbuf!(Trace, 16, Trace::None);

/// One command's worth of CCR settings.
#[derive(Copy, Clone)]
struct Ccr {
    fmode: FMode,
    command: Command,
    addr: Option<u32>,
    dummy: u8,
    data: Lines,
}

impl Ccr {
    const fn new(fmode: FMode, command: Command) -> Self {
        Self {
            fmode,
            command,
            addr: None,
            dummy: 0,
            data: Lines::None,
        }
    }
}

/// The controller and the flash behind it.
pub struct Qspi {
    reg: &'static device::quadspi::RegisterBlock,
    now: fn() -> u32,
    size: u32,
    mapped: bool,
}

impl Qspi {
    /// Creates a new wrapper for `reg`. `now` is a millisecond clock, used
    /// for timeouts.
    pub fn new(reg: &'static device::quadspi::RegisterBlock, now: fn() -> u32) -> Self {
        Self {
            reg,
            now,
            size: 0,
            mapped: false,
        }
    }

    /// Sets up the controller, resets the flash and turns on its quad
    /// outputs.
    ///
    /// The controller must have its clock enabled and its pins routed
    /// before calling this. `divider` divides the kernel clock down to the
    /// bus clock; `l2size` is log2 of the flash size in bytes.
    pub fn init(&mut self, divider: u8, l2size: u8) -> Result<(), FlashError> {
        #[rustfmt::skip]
        self.reg.cr.write(|w| unsafe {
            w
                // Divide kernel clock by the divider, which means setting
                // prescaler to one less.
                .prescaler().bits(divider - 1)
                // Sample half a cycle late; at 100 MHz the data isn't
                // valid on the edge.
                .sshift().set_bit()
                .fthres().bits(FIFO_SIZE / 2 - 1)
                .en().set_bit()
        });
        #[rustfmt::skip]
        self.reg.dcr.write(|w| unsafe {
            w
                // Flash size is recorded as log2 minus 1.
                .fsize().bits(l2size - 1)
                // CS high for 2 cycles between commands.
                .csht().bits(1)
                // Clock mode 0.
                .ckmode().clear_bit()
        });
        self.size = 1 << l2size;

        self.simple(Command::EnableReset)?;
        self.simple(Command::Reset)?;
        self.wait_idle(PROGRAM_TIMEOUT_MS)?;

        let mut sr2 = 0u8;
        self.read_impl(
            Ccr::new(FMode::IndirectRead, Command::ReadStatusReg2),
            core::slice::from_mut(&mut sr2),
        )?;
        if sr2 & SR2_QE == 0 {
            self.simple(Command::WriteEnable)?;
            self.write_impl(
                Ccr::new(FMode::IndirectWrite, Command::WriteStatusReg2),
                &[sr2 | SR2_QE],
            )?;
            self.wait_idle(TRANSFER_TIMEOUT_MS)?;
        }
        Ok(())
    }

    fn read_status(&mut self) -> Result<u8, FlashError> {
        let mut status = 0u8;
        self.read_impl(
            Ccr::new(FMode::IndirectRead, Command::ReadStatusReg),
            core::slice::from_mut(&mut status),
        )?;
        Ok(status)
    }

    /// Polls the flash until it finishes its current erase or program.
    fn wait_idle(&mut self, timeout_ms: u32) -> Result<(), FlashError> {
        let start = (self.now)();
        while self.read_status()? & SR1_BUSY != 0 {
            if (self.now)().wrapping_sub(start) > timeout_ms {
                ringbuf_entry!(Trace::Timeout(Command::ReadStatusReg as u8));
                return Err(FlashError::Timeout);
            }
        }
        Ok(())
    }

    /// Spins until `done` returns true or `timeout_ms` passes.
    fn wait_for(
        &self,
        command: Command,
        timeout_ms: u32,
        done: impl Fn(&device::quadspi::RegisterBlock) -> bool,
    ) -> Result<(), FlashError> {
        let start = (self.now)();
        while !done(self.reg) {
            if (self.now)().wrapping_sub(start) > timeout_ms {
                ringbuf_entry!(Trace::Timeout(command as u8));
                return Err(FlashError::Timeout);
            }
        }
        Ok(())
    }

    fn check_range(&self, addr: u32, len: usize) -> Result<(), FlashError> {
        match addr.checked_add(len as u32) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(FlashError::OutOfRange),
        }
    }

    fn set_transfer_length(&self, len: usize) {
        self.reg
            .dlr
            .write(|w| unsafe { w.dl().bits(len as u32 - 1) });
    }

    /// Writes CCR, and AR if there's an address. Depending on the mode,
    /// one of those writes starts the command.
    fn start(&self, ccr: Ccr) {
        // Routines below expect that we don't have a transfer-complete flag
        // hanging around from some previous transfer.
        self.reg.fcr.write(|w| w.ctcf().set_bit());

        let (adsize, admode) = match ccr.addr {
            // 24-bit address on one line.
            Some(_) => (0b10, Lines::Single),
            None => (0b00, Lines::None),
        };
        #[rustfmt::skip]
        self.reg.ccr.write(|w| unsafe {
            w
                .fmode().bits(ccr.fmode as u8)
                .dmode().bits(ccr.data as u8)
                .dcyc().bits(ccr.dummy)
                // No alternate bytes
                .abmode().bits(0)
                .adsize().bits(adsize)
                .admode().bits(admode as u8)
                // Instruction on single line
                .imode().bits(Lines::Single as u8)
                .instruction().bits(ccr.command as u8)
        });
        if let (Some(addr), false) = (ccr.addr, matches!(ccr.fmode, FMode::MemoryMapped)) {
            self.reg.ar.write(|w| unsafe { w.address().bits(addr) });
        }
    }

    /// Waits for the end of an indirect command.
    fn finish(&self, command: Command) -> Result<(), FlashError> {
        self.wait_for(command, TRANSFER_TIMEOUT_MS, |r| r.sr.read().tcf().bit())?;
        self.reg.fcr.write(|w| w.ctcf().set_bit());
        self.wait_for(command, TRANSFER_TIMEOUT_MS, |r| !r.sr.read().busy().bit())
    }

    /// An instruction with no address or data.
    fn simple(&mut self, command: Command) -> Result<(), FlashError> {
        self.write_impl(Ccr::new(FMode::IndirectWrite, command), &[])
    }

    fn write_impl(&mut self, mut ccr: Ccr, data: &[u8]) -> Result<(), FlashError> {
        if !data.is_empty() {
            self.set_transfer_length(data.len());
            ccr.data = Lines::Single;
        }
        // With no address and no data, the CCR write kicks things off.
        // Otherwise it's the AR write.
        self.start(ccr);

        for &byte in data {
            self.wait_for(ccr.command, TRANSFER_TIMEOUT_MS, |r| {
                r.sr.read().flevel().bits() < FIFO_SIZE
            })?;
            self.send8(byte);
        }
        self.finish(ccr.command)
    }

    fn read_impl(&mut self, mut ccr: Ccr, out: &mut [u8]) -> Result<(), FlashError> {
        if out.is_empty() {
            return Ok(());
        }
        self.set_transfer_length(out.len());
        if matches!(ccr.data, Lines::None) {
            ccr.data = Lines::Single;
        }
        self.start(ccr);

        for byte in out {
            self.wait_for(ccr.command, TRANSFER_TIMEOUT_MS, |r| {
                r.sr.read().flevel().bits() > 0
            })?;
            *byte = self.recv8();
        }
        self.finish(ccr.command)
    }

    /// Performs an 8-bit load from the low byte of the Data Register.
    ///
    /// The DR is access-size-sensitive, so despite being 32 bits wide, if you
    /// want to remove only one byte from the FIFO, you need to use an 8-bit
    /// access.
    fn recv8(&self) -> u8 {
        let dr: &vcell::VolatileCell<u32> =
            unsafe { core::mem::transmute(&self.reg.dr) };
        // As we are a little-endian machine it is sufficient to change the type
        // of the pointer to byte.
        let dr8 = dr.as_ptr() as *mut u8;

        // Safety: we are dereferencing a pointer given to us by VolatileCell
        // (and thus UnsafeCell) using the same volatile access it would use.
        unsafe { dr8.read_volatile() }
    }

    /// Performs an 8-bit store to the low byte of the Data Register.
    fn send8(&self, b: u8) {
        let dr: &vcell::VolatileCell<u32> =
            unsafe { core::mem::transmute(&self.reg.dr) };
        let dr8 = dr.as_ptr() as *mut u8;

        // Safety: as for `recv8`.
        unsafe { dr8.write_volatile(b) }
    }

    fn refuse_if_mapped(&self) -> Result<(), FlashError> {
        // Mapped-mode reads would be aborted under the caller's feet.
        if self.mapped {
            Err(FlashError::OutOfRange)
        } else {
            Ok(())
        }
    }
}

impl NorFlash for Qspi {
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        self.refuse_if_mapped()?;
        self.check_range(addr, buf.len())?;
        let ccr = Ccr {
            addr: Some(addr),
            dummy: 8,
            data: Lines::Quad,
            ..Ccr::new(FMode::IndirectRead, Command::FastReadQuadOutput)
        };
        self.read_impl(ccr, buf)
    }

    fn erase_block(&mut self, addr: u32) -> Result<(), FlashError> {
        self.refuse_if_mapped()?;
        self.check_range(addr, 1)?;
        let addr = addr & !(BLOCK_SIZE - 1);
        ringbuf_entry!(Trace::Erase(addr));

        self.simple(Command::WriteEnable)?;
        let ccr = Ccr {
            addr: Some(addr),
            ..Ccr::new(FMode::IndirectWrite, Command::BlockErase64)
        };
        self.write_impl(ccr, &[])?;
        self.wait_idle(ERASE_TIMEOUT_MS)
    }

    fn program_page(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError> {
        self.refuse_if_mapped()?;
        self.check_range(addr, data.len())?;
        let page_offset = addr as usize % PAGE_SIZE;
        if page_offset + data.len() > PAGE_SIZE {
            return Err(FlashError::OutOfRange);
        }
        if data.is_empty() {
            return Ok(());
        }

        self.simple(Command::WriteEnable)?;
        let ccr = Ccr {
            addr: Some(addr),
            ..Ccr::new(FMode::IndirectWrite, Command::PageProgram)
        };
        self.write_impl(ccr, data)?;
        self.wait_idle(PROGRAM_TIMEOUT_MS)
    }
}

impl XipFlash for Qspi {
    fn memory_map(&mut self) -> Result<(), FlashError> {
        if self.mapped {
            return Ok(());
        }
        self.wait_for(Command::FastReadQuadOutput, TRANSFER_TIMEOUT_MS, |r| {
            !r.sr.read().busy().bit()
        })?;
        // Never time out of mapped mode; CS stays low between accesses.
        self.reg.cr.modify(|_, w| w.tcen().clear_bit());
        self.start(Ccr {
            addr: Some(0),
            dummy: 8,
            data: Lines::Quad,
            ..Ccr::new(FMode::MemoryMapped, Command::FastReadQuadOutput)
        });
        self.mapped = true;
        ringbuf_entry!(Trace::Mapped(true));
        Ok(())
    }

    fn unmap(&mut self) -> Result<(), FlashError> {
        if !self.mapped {
            return Ok(());
        }
        self.reg.cr.modify(|_, w| w.abort().set_bit());
        self.wait_for(Command::FastReadQuadOutput, TRANSFER_TIMEOUT_MS, |r| {
            !r.cr.read().abort().bit() && !r.sr.read().busy().bit()
        })?;
        self.mapped = false;
        ringbuf_entry!(Trace::Mapped(false));
        Ok(())
    }

    fn is_mapped(&self) -> bool {
        self.mapped
    }

    fn read_id(&mut self) -> Result<[u8; 3], FlashError> {
        self.refuse_if_mapped()?;
        let mut id = [0u8; 3];
        self.read_impl(Ccr::new(FMode::IndirectRead, Command::ReadId), &mut id)?;
        Ok(id)
    }
}
