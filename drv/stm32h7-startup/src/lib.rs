// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bare-metal bring-up for the STM32H7: RAM power-on before `main`, the
//! clock tree, MPU regions and the L1 caches.

#![no_std]

#[cfg(feature = "h743")]
pub use stm32h7::stm32h743 as device;

#[cfg(feature = "h753")]
pub use stm32h7::stm32h753 as device;

use cortex_m::peripheral::MPU;

// System pre-init hook for establishing system properties required by Rust.
//
// This routine must run before anything touches RAM! The cortex-m-rt crate's
// Reset handler ensures this. As a result, we have to write this in raw
// assembly code, to avoid trying to push/pop a stack frame.
core::arch::global_asm! {
    ".global __pre_init",
    ".type __pre_init,%function",
    ".thumb_func",
    ".cfi_startproc",
    "__pre_init:",

    // Lock the reset supply configuration (LDO) by writing PWR.CR3 back to
    // itself; the register is write-once.
    "    movw r0, :lower16:{PWR_addr}",
    "    movt r0, :upper16:{PWR_addr}",
    "    ldr r1, [r0, #{PWR_CR3_offset}]",
    "    str r1, [r0, #{PWR_CR3_offset}]",

    // Wait for the supply to settle at VOS3.
    "1:  ldr r1, [r0, #{PWR_CSR1_offset}]",
    "    tst r1, #(1 << {PWR_CSR1_ACTVOSRDY_bit})",
    "    beq 1b",

    // Clock the D2 SRAMs so the linker can put data there.
    "    movw r0, :lower16:{RCC_addr}",
    "    movt r0, :upper16:{RCC_addr}",
    "    ldr r1, [r0, #{RCC_AHB2ENR_offset}]",
    "    orrs r1, #((1 << {RCC_AHB2ENR_SRAM1EN_bit}) \
                  | (1 << {RCC_AHB2ENR_SRAM2EN_bit}) \
                  | (1 << {RCC_AHB2ENR_SRAM3EN_bit}))",
    "    str r1, [r0, #{RCC_AHB2ENR_offset}]",

    // ST erratum 2.2.9 "Reading from AXI SRAM may lead to data read
    // corruption": limit AXI SRAM read concurrency.
    "    movw r0, :lower16:{AXI_TARG7_FN_MOD_addr}",
    "    movt r0, :upper16:{AXI_TARG7_FN_MOD_addr}",
    "    ldr r1, [r0]",
    "    orrs r1, #(1 << {AXI_TARG7_FN_MOD_READ_ISS_OVERRIDE_bit})",
    "    str r1, [r0]",

    "    bx lr",
    ".cfi_endproc",
    ".size __pre_init, . - __pre_init",

    PWR_addr = const 0x5802_4800,
    PWR_CSR1_offset = const 0x4, // reference manual 6.8.2
    PWR_CSR1_ACTVOSRDY_bit = const 13,
    PWR_CR3_offset = const 0xC, // reference manual 6.8.4

    RCC_addr = const 0x5802_4400,
    RCC_AHB2ENR_offset = const 0x0DC, // reference manual 8.7.42
    RCC_AHB2ENR_SRAM1EN_bit = const 29,
    RCC_AHB2ENR_SRAM2EN_bit = const 30,
    RCC_AHB2ENR_SRAM3EN_bit = const 31,

    // AXI base (0x5100_0000) plus the offset from table 6.
    AXI_TARG7_FN_MOD_addr = const 0x5100_8108,
    AXI_TARG7_FN_MOD_READ_ISS_OVERRIDE_bit = const 0,
}

/// PLL1 and bus divider settings. PLL1 is always fed from the HSE crystal.
pub struct ClockConfig {
    pub divm: u8,
    pub vcosel: device::rcc::pllcfgr::PLL1VCOSEL_A,
    pub pllrange: device::rcc::pllcfgr::PLL1RGE_A,
    /// Multiplier minus one.
    pub divn: u16,
    pub divp: device::rcc::pll1divr::DIVP1_A,
    /// Divisor minus one.
    pub divq: u8,
    /// Divisor minus one.
    pub divr: u8,
    pub cpu_div: device::rcc::d1cfgr::D1CPRE_A,
    pub ahb_div: device::rcc::d1cfgr::HPRE_A,
    pub apb1_div: device::rcc::d2cfgr::D2PPRE1_A,
    pub apb2_div: device::rcc::d2cfgr::D2PPRE2_A,
    pub apb3_div: device::rcc::d1cfgr::D1PPRE_A,
    pub apb4_div: device::rcc::d3cfgr::D3PPRE_A,
    pub flash_latency: u8,
    pub flash_write_delay: u8,
}

/// A cacheable MPU region: normal memory, write-back with read and write
/// allocate, full access, executable.
#[derive(Copy, Clone, Debug)]
pub struct MpuRegion {
    /// Must be aligned to the region size.
    pub base: u32,
    /// log2 of the size in bytes, 5..=31.
    pub log2_size: u8,
}

impl MpuRegion {
    pub const fn size(&self) -> u32 {
        1 << self.log2_size
    }

    const fn rasr(&self) -> u32 {
        const AP_FULL: u32 = 0b011 << 24;
        const TEX1: u32 = 0b001 << 19;
        const CACHEABLE: u32 = 1 << 17;
        const BUFFERABLE: u32 = 1 << 16;
        const ENABLE: u32 = 1;
        AP_FULL
            | TEX1
            | CACHEABLE
            | BUFFERABLE
            | ((self.log2_size as u32 - 1) << 1)
            | ENABLE
    }
}

/// Programs `regions` into MPU slots 0.. and turns the MPU on, with the
/// default map as background for privileged code.
///
/// # Safety
///
/// Changes the attributes of live memory. The caller must not be relying on
/// cached data in any region being changed.
pub unsafe fn configure_mpu(mpu: &mut MPU, regions: &[MpuRegion]) {
    const CTRL_ENABLE: u32 = 1 << 0;
    const CTRL_PRIVDEFENA: u32 = 1 << 2;

    cortex_m::asm::dmb();
    unsafe {
        mpu.ctrl.write(0);
        for (i, r) in regions.iter().enumerate() {
            mpu.rnr.write(i as u32);
            mpu.rbar.write(r.base);
            mpu.rasr.write(r.rasr());
        }
        mpu.ctrl.write(CTRL_PRIVDEFENA | CTRL_ENABLE);
    }
    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

/// Takes the peripherals, maps `regions`, turns on the caches and switches
/// to the PLL.
pub fn system_init(
    config: ClockConfig,
    regions: &[MpuRegion],
) -> (cortex_m::Peripherals, device::Peripherals) {
    let mut cp = cortex_m::Peripherals::take().unwrap();
    let p = device::Peripherals::take().unwrap();

    // We are running at 64MHz on the HSI oscillator at voltage scale VOS3.
    //
    // Region attributes must be in place before the data cache sees any of
    // them.
    unsafe { configure_mpu(&mut cp.MPU, regions) };
    cp.SCB.enable_icache();
    cp.SCB.enable_dcache(&mut cp.CPUID);

    // Keep the debugger attached through sleep and stop.
    p.DBGMCU.cr.modify(|_, w| {
        w.d1dbgcken()
            .set_bit()
            .d3dbgcken()
            .set_bit()
            .dbgsleep_d1()
            .set_bit()
            .dbgstop_d1()
            .set_bit()
    });

    // SYSCFG hosts the I/O compensation cell, which the very-high-speed
    // SDRAM and QSPI pins need.
    p.RCC.apb4enr.modify(|_, w| w.syscfgen().enabled());
    cortex_m::asm::dmb();
    p.RCC.cr.modify(|_, w| w.csion().set_bit());
    p.SYSCFG.cccsr.modify(|_, w| w.en().set_bit());

    // VOS1, straight from VOS3.
    p.PWR.d3cr.write(|w| unsafe { w.vos().bits(0b11) });
    while !p.PWR.d3cr.read().vosrdy().bit() {
        // spin
    }

    p.RCC.cr.modify(|_, w| w.hseon().set_bit());
    while !p.RCC.cr.read().hserdy().bit() {
        // spin
    }

    // The VCO input (HSE / DIVM) must land within the configured range.
    p.RCC
        .pllckselr
        .modify(|_, w| w.divm1().bits(config.divm).pllsrc().hse());
    p.RCC.pllcfgr.modify(|_, w| {
        w.pll1vcosel()
            .variant(config.vcosel)
            .pll1rge()
            .variant(config.pllrange)
            .divp1en()
            .enabled()
            .divq1en()
            .enabled()
            .divr1en()
            .enabled()
    });
    p.RCC.pll1divr.modify(|_, w| unsafe {
        w.divn1()
            .bits(config.divn)
            .divp1()
            .variant(config.divp)
            .divq1()
            .bits(config.divq)
            .divr1()
            .bits(config.divr)
    });

    p.RCC.cr.modify(|_, w| w.pll1on().on());
    while !p.RCC.cr.read().pll1rdy().bit() {
        // spin
    }

    // Dividers first, so nothing is overclocked when the source changes.
    p.RCC.d1cfgr.write(|w| {
        w.d1cpre()
            .variant(config.cpu_div)
            .hpre()
            .variant(config.ahb_div)
            .d1ppre()
            .variant(config.apb3_div)
    });
    p.RCC.d2cfgr.write(|w| {
        w.d2ppre1()
            .variant(config.apb1_div)
            .d2ppre2()
            .variant(config.apb2_div)
    });
    p.RCC.d3cfgr.write(|w| w.d3ppre().variant(config.apb4_div));

    // Flash wait states per reference manual Table 13.
    p.FLASH.acr.write(|w| unsafe {
        w.latency()
            .bits(config.flash_latency)
            .wrhighfreq()
            .bits(config.flash_write_delay)
    });
    loop {
        let r = p.FLASH.acr.read();
        if r.latency().bits() == config.flash_latency
            && r.wrhighfreq().bits() == config.flash_write_delay
        {
            break;
        }
    }
    cortex_m::asm::dmb();

    p.RCC.cfgr.write(|w| w.sw().pll1());
    while !p.RCC.cfgr.read().sws().is_pll1() {
        // spin
    }

    while !p.SYSCFG.cccsr.read().ready().bit() {
        // spin
    }

    (cp, p)
}
