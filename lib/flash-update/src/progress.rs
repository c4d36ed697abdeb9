// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! On-flash record of how far a kernel update got.
//!
//! The record sits at the start of a dedicated 64 KiB sector:
//!
//! ```text
//! offset  size  contents
//! 0       16    block bitmap, bit i = byte i / 8, mask 1 << (i % 8)
//! 16      1     calibration byte
//! ```
//!
//! A bitmap bit is 1 while its block is unwritten and is cleared once the
//! block has been programmed. Both fields only ever go from 1s to 0s
//! between erases, so every update is a plain NOR program.

use static_assertions::const_assert_eq;
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{BLOCK_SIZE, MAX_BLOCKS};

pub const BITMAP_BYTES: usize = MAX_BLOCKS / 8;

/// Offset of the calibration byte within the progress sector.
pub const CALIBRATION_OFFSET: u32 = BITMAP_BYTES as u32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Calibration {
    /// No update has been started since the sector was last erased. Also
    /// what any unrecognized value reads as.
    Idle = 0xff,
    /// An update is underway and the bitmap is meaningful.
    InProgress = 0xaa,
    /// The last update ran to completion.
    Finished = 0x00,
}

impl From<u8> for Calibration {
    fn from(b: u8) -> Self {
        match b {
            0xaa => Calibration::InProgress,
            0x00 => Calibration::Finished,
            _ => Calibration::Idle,
        }
    }
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
#[repr(C)]
pub struct ProgressRecord {
    pub bitmap: [u8; BITMAP_BYTES],
    pub calibration: u8,
}

const_assert_eq!(core::mem::size_of::<ProgressRecord>(), 17);

impl ProgressRecord {
    /// What an erased sector reads as.
    pub const ERASED: Self = Self {
        bitmap: [0xff; BITMAP_BYTES],
        calibration: 0xff,
    };

    pub fn calibration(&self) -> Calibration {
        Calibration::from(self.calibration)
    }

    pub fn is_written(&self, block: usize) -> bool {
        if self.calibration() == Calibration::Finished {
            return true;
        }
        self.bitmap[block / 8] & (1 << (block % 8)) == 0
    }

    /// Clears `block`'s bit, returning the index and new value of the
    /// bitmap byte that changed.
    pub fn mark_written(&mut self, block: usize) -> (usize, u8) {
        let i = block / 8;
        self.bitmap[i] &= !(1 << (block % 8));
        (i, self.bitmap[i])
    }

    /// First block an interrupted update still has to write.
    ///
    /// Blocks are written in ascending order, so the bitmap is a run of
    /// cleared bits followed by set ones. We scan down from the top past
    /// the set bits; the block after the highest cleared bit is where to
    /// pick up. With no bits cleared, that's block 0.
    pub fn resume_block(&self) -> usize {
        (0..MAX_BLOCKS)
            .rev()
            .find(|&b| self.is_written(b))
            .map_or(0, |b| b + 1)
    }

    /// Byte offset into the image of [`ProgressRecord::resume_block`].
    pub fn resume_offset(&self) -> u32 {
        self.resume_block() as u32 * BLOCK_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::{FromBytes, IntoBytes};

    fn written_through(n: usize) -> ProgressRecord {
        let mut r = ProgressRecord::ERASED;
        r.calibration = Calibration::InProgress as u8;
        for b in 0..n {
            r.mark_written(b);
        }
        r
    }

    #[test]
    fn resume_after_eighteen_blocks() {
        let r = written_through(18);
        assert_eq!(r.resume_block(), 18);
        assert_eq!(r.resume_offset(), 18 * 0x10000);
    }

    #[test]
    fn resume_edges() {
        assert_eq!(ProgressRecord::ERASED.resume_block(), 0);
        assert_eq!(written_through(1).resume_block(), 1);
        assert_eq!(written_through(MAX_BLOCKS).resume_block(), MAX_BLOCKS);
    }

    #[test]
    fn bit_layout() {
        let mut r = ProgressRecord::ERASED;
        assert_eq!(r.mark_written(0), (0, 0xfe));
        assert_eq!(r.mark_written(9), (1, 0xfd));
        assert_eq!(r.mark_written(127), (15, 0x7f));
        assert!(r.is_written(9));
        assert!(!r.is_written(10));
    }

    #[test]
    fn finished_reads_as_all_written() {
        let mut r = ProgressRecord::ERASED;
        r.calibration = Calibration::Finished as u8;
        assert!(r.is_written(100));
    }

    #[test]
    fn finished_resumes_past_the_end() {
        let mut r = ProgressRecord::ERASED;
        r.calibration = Calibration::Finished as u8;
        assert_eq!(r.resume_block(), MAX_BLOCKS);
    }

    #[test]
    fn calibration_decoding() {
        assert_eq!(Calibration::from(0xff), Calibration::Idle);
        assert_eq!(Calibration::from(0xaa), Calibration::InProgress);
        assert_eq!(Calibration::from(0x00), Calibration::Finished);
        assert_eq!(Calibration::from(0x5a), Calibration::Idle);
    }

    #[test]
    fn sector_bytes() {
        let mut raw = [0xffu8; 17];
        raw[0] = 0x00;
        raw[2] = 0x03 ^ 0xff;
        raw[16] = 0xaa;
        let r = ProgressRecord::read_from_bytes(&raw[..]).unwrap();
        assert_eq!(r.calibration(), Calibration::InProgress);
        assert!(r.is_written(7));
        assert!(r.is_written(16) && r.is_written(17));
        assert!(!r.is_written(8));
        assert_eq!(r.as_bytes(), &raw[..]);
    }
}
