// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Alternate-function routing for the ART-Pi's console, QSPI flash and
//! SDRAM.

use drv_stm32h7_startup::device;

/// A GPIO port. The PAC gives every port GPIOA's register block type.
trait Port {
    /// Puts `pins` into push-pull alternate function `af` at very high
    /// speed, without pulls.
    fn alternate(&self, pins: u16, af: u8);
}

macro_rules! impl_port {
    ($module:ident) => {
        impl Port for device::$module::RegisterBlock {
            fn alternate(&self, pins: u16, af: u8) {
                const MODE_ALTERNATE: u32 = 0b10;
                const SPEED_VERY_HIGH: u32 = 0b11;

                // 1 in each targeted 1bit field.
                let lsbs_1 = u32::from(pins);
                // 0b01 in each targeted 2bit field.
                let lsbs_2 = outer_perfect_shuffle(lsbs_1);
                // 0b0001 in each targeted 4bit field, for each half.
                let lsbs_4l = outer_perfect_shuffle(lsbs_2 & 0xFFFF);
                let lsbs_4h = outer_perfect_shuffle(lsbs_2 >> 16);

                let mask_2 = lsbs_2.wrapping_mul(0b11);
                let mask_4l = lsbs_4l.wrapping_mul(0b1111);
                let mask_4h = lsbs_4h.wrapping_mul(0b1111);
                let af = u32::from(af & 0b1111);

                // Function and speed before mode, so the pin never drives
                // anything else.
                self.afrl.modify(|r, w| unsafe {
                    w.bits((r.bits() & !mask_4l) | af.wrapping_mul(lsbs_4l))
                });
                self.afrh.modify(|r, w| unsafe {
                    w.bits((r.bits() & !mask_4h) | af.wrapping_mul(lsbs_4h))
                });
                self.otyper
                    .modify(|r, w| unsafe { w.bits(r.bits() & !lsbs_1) });
                self.pupdr
                    .modify(|r, w| unsafe { w.bits(r.bits() & !mask_2) });
                self.ospeedr.modify(|r, w| unsafe {
                    w.bits(
                        (r.bits() & !mask_2)
                            | SPEED_VERY_HIGH.wrapping_mul(lsbs_2),
                    )
                });
                self.moder.modify(|r, w| unsafe {
                    w.bits(
                        (r.bits() & !mask_2)
                            | MODE_ALTERNATE.wrapping_mul(lsbs_2),
                    )
                });
            }
        }
    };
}

impl_port!(gpioa);

/// Interleaves bits in `input` as follows:
///
/// - Output bit 0 = input bit 0
/// - Output bit 1 = input bit 15
/// - Output bit 2 = input bit 1
/// - Output bit 3 = input bit 16
/// ...and so forth.
///
/// Method from Hacker's Delight.
const fn outer_perfect_shuffle(mut input: u32) -> u32 {
    let mut tmp = (input ^ (input >> 8)) & 0x0000ff00;
    input ^= tmp ^ (tmp << 8);
    tmp = (input ^ (input >> 4)) & 0x00f000f0;
    input ^= tmp ^ (tmp << 4);
    tmp = (input ^ (input >> 2)) & 0x0c0c0c0c;
    input ^= tmp ^ (tmp << 2);
    tmp = (input ^ (input >> 1)) & 0x22222222;
    input ^= tmp ^ (tmp << 1);
    input
}

const fn pins(list: &[u8]) -> u16 {
    let mut mask = 0;
    let mut i = 0;
    while i < list.len() {
        mask |= 1 << list[i];
        i += 1;
    }
    mask
}

const AF7_USART1: u8 = 7;
const AF9_QUADSPI: u8 = 9;
const AF10_QUADSPI: u8 = 10;
const AF12_FMC: u8 = 12;

/// Clocks every port we touch.
pub fn enable_ports(rcc: &device::RCC) {
    rcc.ahb4enr.modify(|_, w| {
        w.gpioaen().set_bit();
        w.gpiocen().set_bit();
        w.gpioden().set_bit();
        w.gpioeen().set_bit();
        w.gpiofen().set_bit();
        w.gpiogen().set_bit();
        w.gpiohen().set_bit();
        w
    });
    cortex_m::asm::dsb();
}

/// PA9 TX, PA10 RX.
pub fn usart1(p: &device::Peripherals) {
    p.GPIOA.alternate(pins(&[9, 10]), AF7_USART1);
}

/// PF10 CLK, PG6 NCS, PF8/PF9 IO0/IO1, PF7/PF6 IO2/IO3.
pub fn quadspi(p: &device::Peripherals) {
    p.GPIOF.alternate(pins(&[6, 7, 10]), AF9_QUADSPI);
    p.GPIOF.alternate(pins(&[8, 9]), AF10_QUADSPI);
    p.GPIOG.alternate(pins(&[6]), AF10_QUADSPI);
}

/// The W9825G6KH on SDRAM bank 1:
///
/// ```text
/// PF0-5, PF12-15, PG0-2  A0-A12     PD14-15, PD0-1  D0-D3
/// PG4, PG5               BA0, BA1   PE7-15          D4-D12
/// PC0                    SDNWE      PD8-10          D13-D15
/// PF11                   SDNRAS     PE0, PE1        NBL0, NBL1
/// PG15                   SDNCAS     PH2             SDCKE0
/// PG8                    SDCLK      PH3             SDNE0
/// ```
pub fn fmc_sdram(p: &device::Peripherals) {
    p.GPIOC.alternate(pins(&[0]), AF12_FMC);
    p.GPIOD
        .alternate(pins(&[0, 1, 8, 9, 10, 14, 15]), AF12_FMC);
    p.GPIOE.alternate(
        pins(&[0, 1, 7, 8, 9, 10, 11, 12, 13, 14, 15]),
        AF12_FMC,
    );
    p.GPIOF.alternate(
        pins(&[0, 1, 2, 3, 4, 5, 11, 12, 13, 14, 15]),
        AF12_FMC,
    );
    p.GPIOG
        .alternate(pins(&[0, 1, 2, 4, 5, 8, 15]), AF12_FMC);
    p.GPIOH.alternate(pins(&[2, 3]), AF12_FMC);
}
