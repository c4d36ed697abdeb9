// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polled USART console.
//!
//! There's no interrupt handling here: the monitor blocks on the console
//! and has nothing else to do while it waits, so reads and writes spin on
//! the status flags.

#![no_std]

use core::fmt;

#[cfg(feature = "h743")]
pub use stm32h7::stm32h743 as device;

#[cfg(feature = "h753")]
pub use stm32h7::stm32h753 as device;

use stboot_shell::Console;

/// Handle to an enabled USART device.
pub struct Usart {
    usart: &'static device::usart1::RegisterBlock,
}

impl Usart {
    /// Turns on `usart` at `baud_rate`, given its kernel clock.
    ///
    /// The caller has already enabled the peripheral clock and routed the
    /// TX/RX pins.
    pub fn turn_on(
        usart: &'static device::usart1::RegisterBlock,
        clock_hz: u32,
        baud_rate: u32,
    ) -> Self {
        // The UART has clock and is out of reset, but isn't actually on until
        // we:
        usart.cr1.write(|w| w.ue().enabled());
        let cycles_per_bit = (clock_hz + (baud_rate / 2)) / baud_rate;
        usart.brr.write(|w| w.brr().bits(cycles_per_bit as u16));

        usart
            .cr1
            .modify(|_, w| w.ue().enabled().te().enabled().re().enabled());

        Self { usart }
    }

    /// Wraps a USART that [`Usart::turn_on`] already set up, for use from
    /// fault handlers.
    ///
    /// # Safety
    ///
    /// Output interleaves with whatever the real owner was doing.
    pub unsafe fn steal(usart: &'static device::usart1::RegisterBlock) -> Self {
        Self { usart }
    }

    /// Try to push `byte` into the transmitter, returning `false` if it's
    /// still busy with the last one.
    pub fn try_tx_push(&self, byte: u8) -> bool {
        if self.usart.isr.read().txe().bit() {
            self.usart.tdr.write(|w| w.tdr().bits(u16::from(byte)));
            true
        } else {
            false
        }
    }

    /// Try to pop a received byte.
    pub fn try_rx_pop(&self) -> Option<u8> {
        if self.usart.isr.read().rxne().bit() {
            Some(self.usart.rdr.read().bits() as u8)
        } else {
            None
        }
    }

    /// Clears a receiver overrun, returning whether there was one. An
    /// overrun stops reception until it's cleared.
    pub fn check_and_clear_rx_overrun(&self) -> bool {
        if self.usart.isr.read().ore().bit() {
            self.usart.icr.write(|w| w.orecf().set_bit());
            true
        } else {
            false
        }
    }

    pub fn write_byte(&self, byte: u8) {
        while !self.try_tx_push(byte) {
            // spin
        }
    }

    /// Waits until the last byte has left the shift register.
    pub fn flush(&self) {
        while !self.usart.isr.read().tc().bit() {
            // spin
        }
    }
}

impl fmt::Write for Usart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}

impl Console for Usart {
    fn read_byte(&mut self) -> u8 {
        loop {
            self.check_and_clear_rx_overrun();
            if let Some(b) = self.try_rx_pop() {
                return b;
            }
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_byte(b);
        }
    }
}
