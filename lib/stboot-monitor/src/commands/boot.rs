// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt;

use boot_handoff::BootTarget;
use bootlog::{pr_info, pr_warn, ringbuf_entry};
use stboot_shell::{parse, Error};

use crate::{Board, Monitor, Trace, XipFlash, TRACE};

pub(super) fn help(w: &mut dyn fmt::Write) -> fmt::Result {
    writeln!(w, "boot <kernel address> - <fdt address>")?;
    writeln!(w, "use default address: boot")
}

pub(super) fn boot<B: Board>(m: &mut Monitor<B>, line: &str) -> Result<(), Error> {
    let requested = if parse::args(line).is_empty() {
        BootTarget { kernel: 0, fdt: 0 }
    } else {
        let a = parse::parse_boot_address(line)?;
        BootTarget {
            kernel: a.kernel,
            fdt: a.fdt,
        }
    };
    let target = requested
        .resolve(m.config.defaults)
        .map_err(|_| Error::Fault)?;

    let in_xip = m.config.xip.contains(target.kernel);
    if !in_xip && !m.config.sdram.contains(target.kernel) {
        pr_warn!(
            m.tty,
            "boot: kernel addr 0x{:x} is outside flash and sdram",
            target.kernel
        );
    }
    if in_xip && !m.flash.is_mapped() {
        m.flash.memory_map().map_err(|_| Error::Io)?;
    }

    pr_info!(
        m.tty,
        "boot: kernel addr: 0x{:x}, fdt addr: 0x{:x}",
        target.kernel,
        target.fdt
    );
    pr_info!(m.tty, "");
    pr_info!(m.tty, "boot: ready to boot kernel ...");
    pr_info!(m.tty, "");
    ringbuf_entry!(
        TRACE,
        Trace::Boot {
            kernel: target.kernel,
            fdt: target.fdt,
        }
    );

    // Safety: the user asked for this jump; a bad address faults on the
    // other side.
    match unsafe { boot_handoff::boot(&mut m.board, target, m.config.defaults) }
    {
        Ok(never) => match never {},
        Err(_) => Err(Error::Fault),
    }
}

#[cfg(test)]
mod tests {
    use crate::mock;

    #[test]
    #[should_panic(expected = "jump 0x90010001 r0=0x0 r1=0xffffffff r2=0x90000000")]
    fn bare_boot_uses_defaults() {
        let mut m = mock::monitor();
        m.execute("boot");
    }

    #[test]
    #[should_panic(expected = "jump 0xc0008001 r0=0x0 r1=0xffffffff r2=0xc0000000")]
    fn explicit_addresses() {
        let mut m = mock::monitor();
        m.execute("boot c0008000 - c0000000");
    }

    #[test]
    fn explicit_boot_logs_and_tears_down() {
        let mut m = mock::monitor();
        let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            m.execute("boot 90010000 - 90000000");
        }));
        assert!(r.is_err());
        let out = m.tty.inner().take_output();
        assert!(
            out.contains("boot: kernel addr: 0x90010000, fdt addr: 0x90000000"),
            "{out:?}"
        );
        assert!(out.contains("boot: ready to boot kernel ..."), "{out:?}");
        assert_eq!(
            m.board.events,
            ["dcache off", "systick off", "irq masked"]
        );
    }

    #[test]
    fn bad_address_is_efault_without_jumping() {
        let mut m = mock::monitor();
        m.execute("boot 90010000");
        let out = m.tty.inner().take_output();
        assert!(out.contains("error: boot: -EFAULT (-14)"), "{out:?}");
        assert!(m.board.events.is_empty());

        m.execute("boot 0 - 90000000");
        let out = m.tty.inner().take_output();
        assert!(out.contains("error: boot: -EFAULT (-14)"), "{out:?}");
        assert!(m.board.events.is_empty());
    }

    #[test]
    fn maps_flash_before_booting_from_it() {
        let mut m = mock::monitor();
        m.flash.mapped = false;
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            m.execute("boot");
        }));
        assert!(m.flash.mapped);
    }

    #[test]
    fn warns_about_unusual_addresses() {
        let mut m = mock::monitor();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            m.execute("boot 24000000 - 90000000");
        }));
        let out = m.tty.inner().take_output();
        assert!(out.contains("outside flash and sdram"), "{out:?}");
    }
}
