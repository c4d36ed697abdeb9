// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Memory map and image layout.
//!
//! The QSPI NOR flash (8 MiB) is laid out as:
//!
//! ```text
//! 0x0000_0000  device tree       64 KiB
//! 0x0001_0000  kernel            up to the progress sector
//! 0x007f_0000  update progress   64 KiB
//! ```
//!
//! and appears at [`QSPI_BASE`] when memory-mapped.

use boot_handoff::BootTarget;
use flash_update::{Region, BLOCK_SIZE};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const PROMPT: &str = "\x1b[1;36mst-boot > \x1b[0m";

pub const FLASH_BASE: u32 = 0x0800_0000;

pub const SDRAM_BASE: u32 = 0xc000_0000;
pub const SDRAM_SIZE: u32 = 32 << 20;

pub const QSPI_BASE: u32 = 0x9000_0000;
pub const QSPI_SIZE: u32 = 8 << 20;

pub const FDT_SIZE: u32 = 0x1_0000;
pub const FDT_ADDR: u32 = QSPI_BASE;
pub const KERNEL_ADDR: u32 = QSPI_BASE + FDT_SIZE;

/// Flash offset of the sector holding kernel update progress.
pub const PROGRESS_SECTOR: u32 = QSPI_SIZE - BLOCK_SIZE;

pub const KERNEL_IMAGE: &str = "xipImage";
pub const FDT_IMAGE: &str = "board.dtb";

/// Bytes moved by each leg of `mtest`.
pub const MTEST_SIZE: u32 = 0x40_0000;

/// An address range in the CPU's view of memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Window {
    pub base: u32,
    pub size: u32,
}

impl Window {
    pub fn contains(&self, addr: u32) -> bool {
        addr.wrapping_sub(self.base) < self.size
    }
}

/// Everything about the board the monitor needs to know.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Used by a bare `boot`.
    pub defaults: BootTarget,
    pub sdram: Window,
    /// Where the NOR flash shows up when memory-mapped.
    pub xip: Window,
    pub fdt: Region,
    pub kernel: Region,
    pub progress: u32,
    pub mtest_bytes: u32,
}

impl Config {
    pub const ART_PI: Config = Config {
        defaults: BootTarget {
            kernel: KERNEL_ADDR,
            fdt: FDT_ADDR,
        },
        sdram: Window {
            base: SDRAM_BASE,
            size: SDRAM_SIZE,
        },
        xip: Window {
            base: QSPI_BASE,
            size: QSPI_SIZE,
        },
        fdt: Region {
            base: 0,
            size: FDT_SIZE,
        },
        kernel: Region {
            base: FDT_SIZE,
            size: PROGRESS_SECTOR - FDT_SIZE,
        },
        progress: PROGRESS_SECTOR,
        mtest_bytes: MTEST_SIZE,
    };
}
