// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Image files read off the debug host over ARM semihosting.
//!
//! Names are resolved relative to the debugger's working directory. With
//! no debugger attached the BKPT traps into HardFault, so `update` is a
//! bench-only command on this board.

use core::fmt::Write as _;

use cortex_m_semihosting::syscall;
use flash_update::{ImageSource, SourceError};

/// `open` mode "rb".
const MODE_READ_BINARY: usize = 1;

/// Longest file name we'll send, including the terminator.
const NAME_MAX: usize = 64;

pub struct Semihosted;

struct File(usize);

impl File {
    fn open(name: &str) -> Result<Self, SourceError> {
        let mut path = heapless::String::<NAME_MAX>::new();
        write!(path, "{name}\0").map_err(|_| SourceError::NotFound)?;

        let fd = unsafe {
            syscall!(OPEN, path.as_ptr(), MODE_READ_BINARY, name.len())
        };
        if fd == usize::MAX {
            return Err(SourceError::NotFound);
        }
        Ok(Self(fd))
    }

    fn len(&self) -> Result<usize, SourceError> {
        let len = unsafe { syscall!(FLEN, self.0) };
        if len as isize == -1 {
            Err(SourceError::Io)
        } else {
            Ok(len)
        }
    }

    /// Fills `buf` entirely.
    fn read_exact(&self, buf: &mut [u8]) -> Result<(), SourceError> {
        // READ returns the number of bytes it did *not* read.
        let left =
            unsafe { syscall!(READ, self.0, buf.as_mut_ptr(), buf.len()) };
        if left == 0 {
            Ok(())
        } else {
            Err(SourceError::Io)
        }
    }
}

impl Drop for File {
    fn drop(&mut self) {
        unsafe {
            syscall!(CLOSE, self.0);
        }
    }
}

impl ImageSource for Semihosted {
    fn load(&mut self, name: &str, buf: &mut [u8]) -> Result<usize, SourceError> {
        let file = File::open(name)?;
        let len = file.len()?;
        let dst = buf.get_mut(..len).ok_or(SourceError::TooLarge)?;
        file.read_exact(dst)?;
        Ok(len)
    }
}
