// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! st-boot for the ART-Pi board (STM32H750, 32 MiB SDRAM, 8 MiB W25Q64 QSPI
//! flash).
#![no_std]
#![no_main]

// We have to do this if we don't otherwise use it to ensure its vector table
// gets linked in.
extern crate panic_halt;
extern crate stm32h7;

mod board;
mod images;
mod pins;

use core::fmt::Write as _;

use bootlog::{pr_err, pr_info, EarlyLog};
use cortex_m::peripheral::SCB;
use cortex_m_rt::{entry, exception, ExceptionFrame};
use drv_stm32h7_qspi::Qspi;
use drv_stm32h7_sdram::W9825G6KH;
use drv_stm32h7_startup::{device, ClockConfig, MpuRegion};
use drv_stm32h7_usart::Usart;
use flash_update::XipFlash;
use stboot_monitor::config::{
    FLASH_BASE, QSPI_BASE, SDRAM_BASE, SDRAM_SIZE,
};
use stboot_monitor::{Config, Monitor, Parts, Tty};
use stboot_shell::Console;

use crate::board::{now_ms, ArtPi};
use crate::images::Semihosted;

const CPU_HZ: u32 = 400_000_000;
const HCLK_HZ: u32 = 200_000_000;
/// USART1's kernel clock, PCLK2.
const USART_CLOCK_HZ: u32 = 100_000_000;
const BAUD_RATE: u32 = 115_200;

const EARLY_LOG_SIZE: usize = 512;

/// QSPI kernel clock (HCLK3) / 2 = 100 MHz.
const QSPI_DIVIDER: u8 = 2;
/// log2 of the W25Q64's 8 MiB.
const QSPI_L2SIZE: u8 = 23;

const DTCM_BASE: u32 = 0x2000_0000;
/// Cortex-M7 system exceptions plus the H743's 150 interrupts.
const VECTORS: usize = 16 + 150;

/// The top half of SDRAM holds images on their way to flash; `mtest`
/// stays in the bottom half.
const STAGING_BASE: u32 = SDRAM_BASE + SDRAM_SIZE / 2;
const STAGING_SIZE: u32 = SDRAM_SIZE / 2;

const MPU_REGIONS: [MpuRegion; 4] = [
    // AXI SRAM, 512 KiB
    MpuRegion {
        base: 0x2400_0000,
        log2_size: 19,
    },
    // SDRAM, 32 MiB
    MpuRegion {
        base: SDRAM_BASE,
        log2_size: 25,
    },
    // Internal flash, 2 MiB of address space
    MpuRegion {
        base: FLASH_BASE,
        log2_size: 21,
    },
    // QSPI XIP window, 8 MiB
    MpuRegion {
        base: QSPI_BASE,
        log2_size: 23,
    },
];

#[entry]
fn main() -> ! {
    let (mut cp, p) = drv_stm32h7_startup::system_init(
        ClockConfig {
            // 25MHz HSE / 5 is 5MHz at the VCO input:
            divm: 5,
            vcosel: device::rcc::pllcfgr::PLL1VCOSEL_A::WIDEVCO,
            pllrange: device::rcc::pllcfgr::PLL1RGE_A::RANGE4,
            // 5MHz * 160 = 800MHz IF. The PLL adds one to what we write.
            divn: 160 - 1,
            // 400MHz system clock.
            divp: device::rcc::pll1divr::DIVP1_A::DIV2,
            // 200MHz kernel clocks.
            divq: 4 - 1,
            divr: 2 - 1,

            cpu_div: device::rcc::d1cfgr::D1CPRE_A::DIV1,
            // AHB at 200MHz, all APBs at 100MHz.
            ahb_div: device::rcc::d1cfgr::HPRE_A::DIV2,
            apb1_div: device::rcc::d2cfgr::D2PPRE1_A::DIV2,
            apb2_div: device::rcc::d2cfgr::D2PPRE2_A::DIV2,
            apb3_div: device::rcc::d1cfgr::D1PPRE_A::DIV2,
            apb4_div: device::rcc::d3cfgr::D3PPRE_A::DIV2,

            // Flash at 200MHz: 2WS, 2 programming cycles.
            flash_latency: 2,
            flash_write_delay: 2,
        },
        &MPU_REGIONS,
    );
    board::start_tick(&mut cp.SYST, CPU_HZ);

    let mut early = EarlyLog::<EARLY_LOG_SIZE>::new(now_ms);
    pr_info!(early, "sysclk: system clock configured, CPU {}MHz", CPU_HZ / 1_000_000);
    for r in &MPU_REGIONS {
        pr_info!(
            early,
            "mpu: mem 0x{:08x} setup, size {} KiB",
            r.base,
            r.size() >> 10
        );
    }
    let vtor = relocate_vectors(&mut cp.SCB);
    pr_info!(early, "tcm: vectors -> 0x{:08x}", vtor);

    // Console
    pins::enable_ports(&p.RCC);
    p.RCC.apb2enr.modify(|_, w| w.usart1en().set_bit());
    cortex_m::asm::dsb();
    pins::usart1(&p);
    let usart = Usart::turn_on(
        unsafe { &*device::USART1::ptr() },
        USART_CLOCK_HZ,
        BAUD_RATE,
    );
    let mut tty = Tty::new(usart, now_ms);
    early.drain(|bytes| tty.inner().write_bytes(bytes));
    if early.dropped() != 0 {
        pr_err!(tty, "log: {} early bytes lost", early.dropped());
    }
    pr_info!(tty, "tty: uart1 init success");

    // SDRAM
    p.RCC.ahb3enr.modify(|_, w| w.fmcen().set_bit());
    cortex_m::asm::dsb();
    pins::fmc_sdram(&p);
    drv_stm32h7_sdram::init(unsafe { &*device::FMC::ptr() }, &W9825G6KH, HCLK_HZ);
    pr_info!(
        tty,
        "sdram: configure success, {} MiB at 0x{:08x}",
        W9825G6KH.size() >> 20,
        SDRAM_BASE
    );

    // QSPI flash
    p.RCC.ahb3enr.modify(|_, w| w.qspien().set_bit());
    cortex_m::asm::dsb();
    pins::quadspi(&p);
    let mut flash = Qspi::new(unsafe { &*device::QUADSPI::ptr() }, now_ms);
    match bring_up_flash(&mut flash) {
        Ok(id) => pr_info!(
            tty,
            "qspi-flash: jedec id {:02x} {:02x} {:02x}, memory-mapped at 0x{:08x}",
            id[0],
            id[1],
            id[2],
            QSPI_BASE
        ),
        Err(e) => pr_err!(tty, "qspi-flash: init failed: {:?}", e),
    }

    // Safety: nothing else refers to the top half of SDRAM, and it was
    // initialized above.
    let staging = unsafe {
        core::slice::from_raw_parts_mut(
            STAGING_BASE as *mut u8,
            STAGING_SIZE as usize,
        )
    };

    let parts = Parts {
        board: ArtPi {
            scb: cp.SCB,
            syst: cp.SYST,
            cpuid: cp.CPUID,
        },
        console: tty.into_inner(),
        flash,
        images: Semihosted,
        staging,
    };
    let Ok(mut monitor) = Monitor::new(parts, Config::ART_PI) else {
        panic!();
    };
    monitor.banner();
    monitor.run()
}

fn bring_up_flash(flash: &mut Qspi) -> Result<[u8; 3], flash_update::FlashError> {
    flash.init(QSPI_DIVIDER, QSPI_L2SIZE)?;
    let id = flash.read_id()?;
    flash.memory_map()?;
    Ok(id)
}

/// Copies the vector table into DTCM and points VTOR at the copy.
fn relocate_vectors(scb: &mut SCB) -> u32 {
    let from = scb.vtor.read() as *const u32;
    let to = DTCM_BASE as *mut u32;
    for i in 0..VECTORS {
        // Safety: both tables are VECTORS words long, and DTCM is unused
        // by anything else.
        unsafe { to.add(i).write_volatile(from.add(i).read_volatile()) };
    }
    cortex_m::asm::dsb();
    unsafe { scb.vtor.write(DTCM_BASE) };
    cortex_m::asm::dsb();
    cortex_m::asm::isb();
    DTCM_BASE
}

#[exception]
fn HardFault(ef: &ExceptionFrame) -> ! {
    let ipsr: u32;
    unsafe { core::arch::asm!("mrs {}, IPSR", out(reg) ipsr) };
    let scb = unsafe { &*SCB::PTR };

    // The monitor owns the console, but it's not coming back.
    let mut con = unsafe { Usart::steal(&*device::USART1::ptr()) };
    let _ = write!(
        con,
        "\x1b[31mError: Unhandled exception: IPSR = 0x{:08x} LR = 0x{:08x} \
         CFSR = 0x{:08x} HFSR = 0x{:08x}\x1b[0m\r\n",
        ipsr,
        ef.lr,
        scb.cfsr.read(),
        scb.hfsr.read(),
    );
    con.flush();

    loop {
        cortex_m::asm::wfi();
    }
}
