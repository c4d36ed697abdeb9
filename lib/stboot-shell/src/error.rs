// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt;

/// Failure status returned by command handlers.
///
/// These mirror the errno values the console has always printed, so that a
/// failing command still reports `-EFAULT` and friends.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// A named file does not exist.
    NoEnt,
    /// A storage device reported a failure or timed out.
    Io,
    /// Something does not fit where it has to go.
    NoMem,
    /// Malformed or missing address.
    Fault,
    /// Malformed or missing argument.
    Inval,
}

impl Error {
    /// Returns the (negative) errno value for this error.
    pub const fn code(self) -> i32 {
        match self {
            Error::NoEnt => -2,
            Error::Io => -5,
            Error::NoMem => -12,
            Error::Fault => -14,
            Error::Inval => -22,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Error::NoEnt => "ENOENT",
            Error::Io => "EIO",
            Error::NoMem => "ENOMEM",
            Error::Fault => "EFAULT",
            Error::Inval => "EINVAL",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-{} ({})", self.name(), self.code())
    }
}
