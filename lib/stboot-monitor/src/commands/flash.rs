// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `qftool` and `update`: the QSPI NOR flash.

use core::fmt;

use bootlog::{pr_err, pr_info, ringbuf_entry};
use flash_update::{
    write_image, write_image_resumable, Event, FlashError, ImageSource,
    SourceError, UpdateError,
};
use stboot_shell::{parse, Error};

use crate::config::{FDT_IMAGE, KERNEL_IMAGE};
use crate::{Board, Monitor, Trace, XipFlash, TRACE};

pub(super) fn help_qftool(w: &mut dyn fmt::Write) -> fmt::Result {
    writeln!(w, "qftool map|unmap|id")
}

pub(super) fn help_update(w: &mut dyn fmt::Write) -> fmt::Result {
    writeln!(w, "update fdt|kernel")?;
    writeln!(w, "loads {FDT_IMAGE} or {KERNEL_IMAGE} and programs it")
}

fn flash_errno(_: FlashError) -> Error {
    Error::Io
}

fn update_errno(e: UpdateError) -> Error {
    match e {
        UpdateError::Flash(_) | UpdateError::Verify { .. } => Error::Io,
        UpdateError::TooLarge => Error::NoMem,
        UpdateError::Empty => Error::Inval,
    }
}

fn source_errno(e: SourceError) -> Error {
    match e {
        SourceError::NotFound => Error::NoEnt,
        SourceError::TooLarge => Error::NoMem,
        SourceError::Io => Error::Io,
    }
}

pub(super) fn qftool<B: Board>(m: &mut Monitor<B>, line: &str) -> Result<(), Error> {
    match parse::args(line) {
        "map" => {
            m.flash.memory_map().map_err(flash_errno)?;
            pr_info!(m.tty, "qspi: memory-mapped at 0x{:08x}", m.config.xip.base);
        }
        "unmap" => {
            m.flash.unmap().map_err(flash_errno)?;
            pr_info!(m.tty, "qspi: indirect mode");
        }
        "id" => {
            let was_mapped = m.flash.is_mapped();
            if was_mapped {
                m.flash.unmap().map_err(flash_errno)?;
            }
            let id = m.flash.read_id();
            if was_mapped {
                m.flash.memory_map().map_err(flash_errno)?;
            }
            let [mfr, ty, cap] = id.map_err(flash_errno)?;
            outln!(m, "qspi: jedec id {mfr:02x} {ty:02x} {cap:02x}");
        }
        _ => {
            outln!(m, "usage: qftool map|unmap|id");
            return Err(Error::Inval);
        }
    }
    Ok(())
}

#[derive(Copy, Clone)]
enum Target {
    Fdt,
    Kernel,
}

pub(super) fn update<B: Board>(m: &mut Monitor<B>, line: &str) -> Result<(), Error> {
    let (target, name, region) = match parse::args(line) {
        "fdt" => (Target::Fdt, FDT_IMAGE, m.config.fdt),
        "kernel" => (Target::Kernel, KERNEL_IMAGE, m.config.kernel),
        _ => {
            outln!(m, "usage: update fdt|kernel");
            return Err(Error::Inval);
        }
    };

    let len = match m.images.load(name, &mut *m.staging) {
        Ok(len) => len,
        Err(e) => {
            let why = match e {
                SourceError::NotFound => "not found",
                SourceError::TooLarge => "too large",
                SourceError::Io => "read failed",
            };
            pr_err!(m.tty, "update: {}: {}", name, why);
            return Err(source_errno(e));
        }
    };
    pr_info!(m.tty, "update: {}: {} bytes", name, len);

    let was_mapped = m.flash.is_mapped();
    if was_mapped {
        m.flash.unmap().map_err(flash_errno)?;
    }

    let image = &m.staging[..len];
    let tty = &mut m.tty;
    let mut on_event = |e: Event| match e {
        Event::Resume { block } => {
            pr_info!(tty, "update: resuming at block {}", block);
        }
        Event::Block { block, total } => {
            ringbuf_entry!(TRACE, Trace::UpdateBlock(block));
            pr_info!(tty, "update: block {}/{}", block + 1, total);
        }
    };
    let result = match target {
        Target::Fdt => write_image(&mut m.flash, region, image, &mut on_event)
            .map(|_| ()),
        Target::Kernel => write_image_resumable(
            &mut m.flash,
            region,
            m.config.progress,
            image,
            &mut on_event,
        )
        .map(|_| ()),
    };

    // Put the flash back the way we found it, whatever happened.
    let remap = if was_mapped {
        m.flash.memory_map()
    } else {
        Ok(())
    };

    if let Err(e) = result {
        match e {
            UpdateError::Verify { block } => {
                pr_err!(m.tty, "update: {}: block {} failed verify", name, block)
            }
            UpdateError::TooLarge => {
                pr_err!(m.tty, "update: {}: larger than its partition", name)
            }
            _ => pr_err!(m.tty, "update: {}: {:?}", name, e),
        }
        return Err(update_errno(e));
    }
    remap.map_err(flash_errno)?;
    pr_info!(m.tty, "update: {} done", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::config::{FDT_IMAGE, KERNEL_IMAGE};
    use crate::mock;
    use flash_update::{read_progress, Calibration, BLOCK_SIZE};

    fn image(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn qftool_modes() {
        let mut m = mock::monitor();
        m.execute("qftool unmap");
        assert!(!m.flash.mapped);
        m.execute("qftool map");
        assert!(m.flash.mapped);
        m.execute("qftool id");
        assert!(m.flash.mapped);
        let out = m.tty.inner().take_output();
        assert!(out.contains("qspi: jedec id ef 40 17"), "{out:?}");

        m.execute("qftool erase");
        let out = m.tty.inner().take_output();
        assert!(out.contains("usage: qftool map|unmap|id"), "{out:?}");
        assert!(out.contains("error: qftool: -EINVAL (-22)"), "{out:?}");
    }

    #[test]
    fn update_fdt() {
        let mut m = mock::monitor();
        let fdt = image(3000);
        m.images.files.insert(FDT_IMAGE, fdt.clone());
        m.execute("update fdt");

        let out = m.tty.inner().take_output();
        assert!(out.contains("update: board.dtb: 3000 bytes"), "{out:?}");
        assert!(out.contains("update: block 1/1"), "{out:?}");
        assert!(out.contains("update: board.dtb done"), "{out:?}");
        assert_eq!(&m.flash.mem[..3000], &fdt[..]);
        assert!(m.flash.mapped);
    }

    #[test]
    fn update_kernel_resumes() {
        let mut m = mock::monitor();
        let kernel = image(3 * BLOCK_SIZE as usize + 100);
        m.images.files.insert(KERNEL_IMAGE, kernel.clone());

        // Fail partway through the third block.
        m.flash.fail_erase_at = Some(m.config.kernel.base + 2 * BLOCK_SIZE);
        m.execute("update kernel");
        let out = m.tty.inner().take_output();
        assert!(out.contains("error: update: -EIO (-5)"), "{out:?}");
        assert!(m.flash.mapped);

        m.flash.fail_erase_at = None;
        m.execute("update kernel");
        let out = m.tty.inner().take_output();
        assert!(out.contains("update: resuming at block 2"), "{out:?}");
        assert!(!out.contains("update: block 1/4"), "{out:?}");
        assert!(out.contains("update: block 4/4"), "{out:?}");
        assert!(out.contains("update: xipImage done"), "{out:?}");

        let base = m.config.kernel.base as usize;
        assert_eq!(&m.flash.mem[base..base + kernel.len()], &kernel[..]);
        m.flash.mapped = false;
        let record = read_progress(&mut m.flash, m.config.progress).unwrap();
        assert_eq!(record.calibration(), Calibration::Finished);
    }

    #[test]
    fn update_failures() {
        let mut m = mock::monitor();
        m.execute("update");
        let out = m.tty.inner().take_output();
        assert!(out.contains("usage: update fdt|kernel"), "{out:?}");

        m.execute("update fdt");
        let out = m.tty.inner().take_output();
        assert!(out.contains("update: board.dtb: not found"), "{out:?}");
        assert!(out.contains("error: update: -ENOENT (-2)"), "{out:?}");

        m.images
            .files
            .insert(FDT_IMAGE, image(BLOCK_SIZE as usize + 1));
        m.execute("update fdt");
        let out = m.tty.inner().take_output();
        assert!(out.contains("larger than its partition"), "{out:?}");
        assert!(out.contains("error: update: -ENOMEM (-12)"), "{out:?}");
        assert!(m.flash.mapped);
    }
}
