// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! FMC SDRAM controller bring-up, bank 1 only.
//!
//! The caller enables the FMC clock and puts the pins in AF12 first; after
//! [`init`] returns, the chip is readable and writable at `0xc000_0000`.

#![no_std]

#[cfg(feature = "h743")]
pub use stm32h7::stm32h743 as device;

#[cfg(feature = "h753")]
pub use stm32h7::stm32h753 as device;

/// Chip geometry and timings. Timings are in SDCLK cycles.
#[derive(Copy, Clone, Debug)]
pub struct SdramConfig {
    pub column_bits: u8,
    pub row_bits: u8,
    /// 16 or 32.
    pub bus_width: u8,
    pub internal_banks: u8,
    /// 2 or 3 cycles.
    pub cas_latency: u8,
    pub load_to_active: u8,
    pub exit_self_refresh: u8,
    pub self_refresh: u8,
    pub row_cycle: u8,
    pub write_recovery: u8,
    pub precharge: u8,
    pub row_to_column: u8,
    /// Every row must be refreshed within this many milliseconds.
    pub refresh_period_ms: u32,
    pub auto_refresh_cycles: u8,
}

/// Winbond W9825G6KH-6I, 32 MiB on a 16-bit bus, at SDCLK = 100 MHz.
pub const W9825G6KH: SdramConfig = SdramConfig {
    column_bits: 9,
    row_bits: 13,
    bus_width: 16,
    internal_banks: 4,
    cas_latency: 3,
    load_to_active: 2,
    exit_self_refresh: 7,
    self_refresh: 4,
    row_cycle: 7,
    write_recovery: 3,
    precharge: 2,
    row_to_column: 2,
    refresh_period_ms: 64,
    auto_refresh_cycles: 8,
};

impl SdramConfig {
    /// Size of the chip in bytes.
    pub const fn size(&self) -> u32 {
        (1 << (self.column_bits + self.row_bits))
            * self.internal_banks as u32
            * (self.bus_width as u32 / 8)
    }

    /// Mode register: burst length 1, sequential, CAS latency, single
    /// location writes.
    const fn mode_register(&self) -> u16 {
        const WRITE_BURST_SINGLE: u16 = 1 << 9;
        ((self.cas_latency as u16) << 4) | WRITE_BURST_SINGLE
    }

    /// SDRTR count: the refresh interval per row in SDCLK cycles, less a
    /// 20 cycle margin for refreshes that land during a read.
    pub const fn refresh_count(&self, sdclk_hz: u32) -> u16 {
        let rows = 1u32 << self.row_bits;
        let per_row = (sdclk_hz / 1000) * self.refresh_period_ms / rows;
        (per_row - 20) as u16
    }
}

#[derive(Copy, Clone)]
enum Command {
    ClockEnable = 0b001,
    PrechargeAll = 0b010,
    AutoRefresh = 0b011,
    LoadMode = 0b100,
}

fn send(fmc: &device::fmc::RegisterBlock, command: Command, refreshes: u8, mrd: u16) {
    #[rustfmt::skip]
    fmc.sdcmr.write(|w| unsafe {
        w
            .mode().bits(command as u8)
            // Bank 1 only.
            .ctb1().set_bit()
            // Field is count minus 1.
            .nrfs().bits(refreshes.saturating_sub(1))
            .mrd().bits(mrd)
    });
}

/// Configures bank 1 for `config`, runs the JEDEC power-up sequence and
/// enables the controller. The SDRAM clock is HCLK / 2.
///
/// `hclk_hz` is used for the 100 us power-up wait, and to size the refresh
/// counter.
pub fn init(fmc: &device::fmc::RegisterBlock, config: &SdramConfig, hclk_hz: u32) {
    let sdclk_hz = hclk_hz / 2;

    #[rustfmt::skip]
    fmc.sdbank1().sdcr.write(|w| unsafe {
        w
            .nc().bits(config.column_bits - 8)
            .nr().bits(config.row_bits - 11)
            .mwid().bits(config.bus_width / 16)
            .nb().bit(config.internal_banks == 4)
            .cas().bits(config.cas_latency)
            .wp().clear_bit()
            // SDCLK = HCLK / 2
            .sdclk().bits(0b10)
            .rburst().set_bit()
            // One HCLK of read pipe delay.
            .rpipe().bits(0b01)
    });

    // All fields are cycles minus one.
    #[rustfmt::skip]
    fmc.sdbank1().sdtr.write(|w| unsafe {
        w
            .tmrd().bits(config.load_to_active - 1)
            .txsr().bits(config.exit_self_refresh - 1)
            .tras().bits(config.self_refresh - 1)
            .trc().bits(config.row_cycle - 1)
            .twr().bits(config.write_recovery - 1)
            .trp().bits(config.precharge - 1)
            .trcd().bits(config.row_to_column - 1)
    });

    fmc.bcr1.modify(|_, w| w.fmcen().set_bit());

    send(fmc, Command::ClockEnable, 1, 0);
    // The chip wants at least 100 us of stable clock before anything else.
    cortex_m::asm::delay(hclk_hz / 10_000 + 1);

    send(fmc, Command::PrechargeAll, 1, 0);
    send(fmc, Command::AutoRefresh, config.auto_refresh_cycles, 0);
    send(fmc, Command::LoadMode, 1, config.mode_register());

    fmc.sdrtr
        .write(|w| unsafe { w.count().bits(config.refresh_count(sdclk_hz)) });
}
