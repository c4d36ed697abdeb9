// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handing the processor to a kernel.
//!
//! The sequence is fixed:
//!
//! ```text
//! ValidatingAddress -> CacheTeardown -> InterruptMask -> Jump
//! ```
//!
//! and only the first step can fail. Everything that touches hardware is
//! behind the [`Handoff`] trait, so the ordering here can be exercised on a
//! host with a mock that panics instead of jumping.
//!
//! The kernel is entered with the register convention it expects from a
//! bootloader: `r0 = 0`, `r1 = !0` (no machine type; use the device tree)
//! and `r2` = the device tree address, branching to `kernel | 1` so the
//! core stays in Thumb state.
//!
//! Addresses are not checked against the memory map. A bad one faults after
//! the jump, at which point there's nothing left to report it to.

#![cfg_attr(not(test), no_std)]

use core::convert::Infallible;

/// Where to find the kernel and its device tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BootTarget {
    pub kernel: u32,
    pub fdt: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BootError {
    /// One address was given and the other was zero.
    Unset,
}

impl BootTarget {
    /// Applies the defaulting rule: if neither address was given (both
    /// zero), use `defaults`; if both were given, use them as-is.
    pub fn resolve(self, defaults: BootTarget) -> Result<BootTarget, BootError> {
        match (self.kernel, self.fdt) {
            (0, 0) => Ok(defaults),
            (0, _) | (_, 0) => Err(BootError::Unset),
            _ => Ok(self),
        }
    }

    /// Branch target, with the Thumb bit set.
    pub const fn entry_point(&self) -> u32 {
        self.kernel | 1
    }

    pub const fn registers(&self) -> Registers {
        Registers {
            r0: 0,
            r1: !0,
            r2: self.fdt,
        }
    }
}

/// Argument registers at kernel entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Registers {
    pub r0: u32,
    pub r1: u32,
    pub r2: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    ValidatingAddress,
    CacheTeardown,
    InterruptMask,
    Jump,
}

/// Platform side of the hand-off.
pub trait Handoff {
    /// Cleans and disables the data cache.
    fn disable_dcache(&mut self);

    /// Stops the system tick.
    fn disable_systick(&mut self);

    /// Masks all interrupts. There's no corresponding unmask.
    fn mask_interrupts(&mut self);

    /// Transfers control to `entry` with `regs` loaded.
    ///
    /// # Safety
    ///
    /// Everything the caller owns is abandoned, and `entry` must point at
    /// code expecting to be entered this way.
    unsafe fn jump(&mut self, entry: u32, regs: Registers) -> !;

    /// Called on entry to each stage.
    fn on_stage(&mut self, _stage: Stage) {}
}

/// Runs the hand-off sequence. Returns only if `requested` is rejected.
///
/// # Safety
///
/// On success this never returns and the target is entered with caches off
/// and interrupts masked; see [`Handoff::jump`].
pub unsafe fn boot<H: Handoff + ?Sized>(
    h: &mut H,
    requested: BootTarget,
    defaults: BootTarget,
) -> Result<Infallible, BootError> {
    h.on_stage(Stage::ValidatingAddress);
    let target = requested.resolve(defaults)?;

    h.on_stage(Stage::CacheTeardown);
    h.disable_dcache();

    h.on_stage(Stage::InterruptMask);
    h.disable_systick();
    h.mask_interrupts();

    h.on_stage(Stage::Jump);
    // Safety: passed on from our caller.
    unsafe { h.jump(target.entry_point(), target.registers()) }
}

/// Loads `regs` into r0-r2 and branches to `entry`.
///
/// # Safety
///
/// See [`Handoff::jump`].
#[cfg(target_arch = "arm")]
pub unsafe fn branch(entry: u32, regs: Registers) -> ! {
    unsafe {
        core::arch::asm!(
            "bx {entry}",
            entry = in(reg) entry,
            in("r0") regs.r0,
            in("r1") regs.r1,
            in("r2") regs.r2,
            options(noreturn),
        );
    }
}
