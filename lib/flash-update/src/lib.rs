// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Programming boot images into NOR flash.
//!
//! Images are written in 64 KiB blocks (the flash's erase unit), each block
//! as a series of 256-byte page programs. There are two ways to do it:
//!
//! - [`write_image`] erases and programs a region with no bookkeeping. If
//!   it's interrupted, run it again.
//! - [`write_image_resumable`] keeps a [`ProgressRecord`] in a sector of its
//!   own and clears one bit per finished block, so that after a reset the
//!   next attempt skips the blocks that already made it.
//!
//! The flash is reached through [`NorFlash`], and images come from an
//! [`ImageSource`]; neither knows about the other.

#![cfg_attr(not(test), no_std)]

mod progress;

pub use progress::{
    Calibration, ProgressRecord, BITMAP_BYTES, CALIBRATION_OFFSET,
};

use zerocopy::IntoBytes;

/// Erase unit, and the granularity of update progress.
pub const BLOCK_SIZE: u32 = 0x1_0000;

/// Largest single program operation.
pub const PAGE_SIZE: usize = 256;

/// Number of blocks the progress bitmap can track.
pub const MAX_BLOCKS: usize = 128;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlashError {
    /// The part didn't finish an operation in time.
    Timeout,
    /// Address past the end of the part.
    OutOfRange,
}

/// A NOR flash part, addressed by byte offset from its start.
pub trait NorFlash {
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), FlashError>;

    /// Sets the [`BLOCK_SIZE`] block containing `addr` to all 1s.
    fn erase_block(&mut self, addr: u32) -> Result<(), FlashError>;

    /// Programs up to [`PAGE_SIZE`] bytes, which must not cross a page
    /// boundary. Programming can only clear bits.
    fn program_page(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError>;
}

/// NOR flash that can also be mapped into the address space for
/// execute-in-place.
///
/// The [`NorFlash`] operations are only valid while unmapped.
pub trait XipFlash: NorFlash {
    fn memory_map(&mut self) -> Result<(), FlashError>;
    fn unmap(&mut self) -> Result<(), FlashError>;
    fn is_mapped(&self) -> bool;
    /// JEDEC manufacturer and device id.
    fn read_id(&mut self) -> Result<[u8; 3], FlashError>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SourceError {
    NotFound,
    /// The image doesn't fit the buffer it's being loaded into.
    TooLarge,
    Io,
}

/// Somewhere images can be loaded from by name.
pub trait ImageSource {
    /// Reads all of `name` into the start of `buf`, returning its length.
    fn load(&mut self, name: &str, buf: &mut [u8]) -> Result<usize, SourceError>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UpdateError {
    Flash(FlashError),
    /// Zero-length image.
    Empty,
    /// Larger than its region, or than the bitmap can track.
    TooLarge,
    /// A page read back differently than it was written.
    Verify { block: usize },
}

impl From<FlashError> for UpdateError {
    fn from(e: FlashError) -> Self {
        UpdateError::Flash(e)
    }
}

/// Where an image goes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    /// Flash offset of the first byte; block aligned.
    pub base: u32,
    pub size: u32,
}

/// What [`write_image_resumable`] did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Summary {
    /// First block written by this call.
    pub first: usize,
    pub blocks: usize,
}

/// Steps reported while writing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A previous attempt got this far; blocks before it are skipped.
    Resume { block: usize },
    /// About to erase and program `block` of `total`.
    Block { block: usize, total: usize },
}

fn block_count(image: &[u8], region: Region) -> Result<usize, UpdateError> {
    if image.is_empty() {
        return Err(UpdateError::Empty);
    }
    if image.len() > region.size as usize {
        return Err(UpdateError::TooLarge);
    }
    Ok(image.len().div_ceil(BLOCK_SIZE as usize))
}

/// Erases, programs and verifies one block of `image`.
fn write_block<F: NorFlash + ?Sized>(
    flash: &mut F,
    region: Region,
    image: &[u8],
    block: usize,
) -> Result<(), UpdateError> {
    let start = block * BLOCK_SIZE as usize;
    let end = (start + BLOCK_SIZE as usize).min(image.len());
    let base = region.base + start as u32;

    flash.erase_block(base)?;

    let mut readback = [0u8; PAGE_SIZE];
    for (i, page) in image[start..end].chunks(PAGE_SIZE).enumerate() {
        let addr = base + (i * PAGE_SIZE) as u32;
        flash.program_page(addr, page)?;

        let readback = &mut readback[..page.len()];
        flash.read(addr, readback)?;
        if readback != page {
            return Err(UpdateError::Verify { block });
        }
    }
    Ok(())
}

/// Writes `image` to the start of `region`.
pub fn write_image<F: NorFlash + ?Sized>(
    flash: &mut F,
    region: Region,
    image: &[u8],
    on_event: &mut dyn FnMut(Event),
) -> Result<usize, UpdateError> {
    let total = block_count(image, region)?;
    for block in 0..total {
        on_event(Event::Block { block, total });
        write_block(flash, region, image, block)?;
    }
    Ok(total)
}

/// Reads the progress record at `progress`.
pub fn read_progress<F: NorFlash + ?Sized>(
    flash: &mut F,
    progress: u32,
) -> Result<ProgressRecord, FlashError> {
    let mut record = ProgressRecord::ERASED;
    flash.read(progress, record.as_mut_bytes())?;
    Ok(record)
}

/// Writes `image` to the start of `region`, recording each finished block
/// in the progress sector at `progress`, and resuming from that record if
/// an earlier call was interrupted.
///
/// Resuming assumes the image is the same one that was being written. The
/// record is only used if its calibration byte says an update is in
/// progress; otherwise the sector is erased and a fresh pass started.
pub fn write_image_resumable<F: NorFlash + ?Sized>(
    flash: &mut F,
    region: Region,
    progress: u32,
    image: &[u8],
    on_event: &mut dyn FnMut(Event),
) -> Result<Summary, UpdateError> {
    let total = block_count(image, region)?;
    if total > MAX_BLOCKS {
        return Err(UpdateError::TooLarge);
    }

    let mut record = read_progress(flash, progress)?;
    let first = if record.calibration() == Calibration::InProgress {
        let first = record.resume_block().min(total);
        on_event(Event::Resume { block: first });
        first
    } else {
        flash.erase_block(progress)?;
        record = ProgressRecord::ERASED;
        record.calibration = Calibration::InProgress as u8;
        flash.program_page(
            progress + CALIBRATION_OFFSET,
            &[record.calibration],
        )?;
        0
    };

    for block in first..total {
        on_event(Event::Block { block, total });
        write_block(flash, region, image, block)?;

        let (i, byte) = record.mark_written(block);
        flash.program_page(progress + i as u32, &[byte])?;
    }

    flash.program_page(
        progress + CALIBRATION_OFFSET,
        &[Calibration::Finished as u8],
    )?;

    Ok(Summary {
        first,
        blocks: total,
    })
}
