// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::sync::atomic::{AtomicU32, Ordering};

use boot_handoff::{Handoff, Registers};
use cortex_m::peripheral::{syst::SystClkSource, CPUID, SCB, SYST};
use cortex_m_rt::exception;
use drv_stm32h7_qspi::Qspi;
use drv_stm32h7_usart::Usart;
use stboot_monitor::{Board, Cache, CacheOp};

use crate::images::Semihosted;

static TICKS: AtomicU32 = AtomicU32::new(0);

#[exception]
fn SysTick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

/// Milliseconds since [`start_tick`].
pub fn now_ms() -> u32 {
    TICKS.load(Ordering::Relaxed)
}

/// Starts the 1 ms SysTick interrupt.
pub fn start_tick(syst: &mut SYST, cpu_hz: u32) {
    syst.set_clock_source(SystClkSource::Core);
    syst.set_reload(cpu_hz / 1000 - 1);
    syst.clear_current();
    syst.enable_interrupt();
    syst.enable_counter();
}

pub struct ArtPi {
    pub scb: SCB,
    pub syst: SYST,
    pub cpuid: CPUID,
}

impl Handoff for ArtPi {
    fn disable_dcache(&mut self) {
        // Cleans first, so nothing staged in the cache is lost.
        self.scb.disable_dcache(&mut self.cpuid);
    }

    fn disable_systick(&mut self) {
        self.syst.disable_interrupt();
        self.syst.disable_counter();
    }

    fn mask_interrupts(&mut self) {
        cortex_m::interrupt::disable();
    }

    unsafe fn jump(&mut self, entry: u32, regs: Registers) -> ! {
        unsafe { boot_handoff::branch(entry, regs) }
    }
}

impl Board for ArtPi {
    type Console = Usart;
    type Flash = Qspi;
    type Images = Semihosted;

    fn now_ms() -> u32 {
        now_ms()
    }

    unsafe fn peek32(&mut self, addr: u32) -> u32 {
        unsafe { core::ptr::read_volatile(addr as *const u32) }
    }

    unsafe fn poke32(&mut self, addr: u32, value: u32) {
        unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
    }

    fn cache(&mut self, which: Cache, op: CacheOp) {
        match (which, op) {
            (Cache::Instruction, CacheOp::Invalidate) => {
                self.scb.invalidate_icache()
            }
            (Cache::Instruction, CacheOp::Disable) => self.scb.disable_icache(),
            (Cache::Instruction, CacheOp::Enable) => self.scb.enable_icache(),
            // Clean as well: our own stack lives behind this cache.
            (Cache::Data, CacheOp::Invalidate) => {
                self.scb.clean_invalidate_dcache(&mut self.cpuid)
            }
            (Cache::Data, CacheOp::Disable) => {
                self.scb.disable_dcache(&mut self.cpuid)
            }
            (Cache::Data, CacheOp::Enable) => {
                self.scb.enable_dcache(&mut self.cpuid)
            }
        }
    }

    fn reset(&mut self) -> ! {
        SCB::sys_reset()
    }
}
