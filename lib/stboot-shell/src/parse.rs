// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Argument parsing over a command line.
//!
//! Nothing here allocates or fails on a malformed number: digits are
//! accumulated until the first character that isn't one, and whatever has
//! been accumulated is the value. Only missing tokens are errors.

use crate::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Radix {
    /// Base 16, with an optional `0x` prefix.
    Hex,
    Decimal,
}

/// A read position within a line.
#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    line: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            line: line.as_bytes(),
            pos: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.line.len()
    }

    fn peek(&self) -> Option<u8> {
        self.line.get(self.pos).copied()
    }

    pub fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    /// Consumes up to the next space or the end of the line.
    pub fn parse_name(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c != b' ') {
            self.pos += 1;
        }
        // We only ever split at an ASCII space, so the slice stays on a
        // character boundary.
        core::str::from_utf8(&self.line[start..self.pos]).unwrap_or("")
    }

    /// Consumes a number. A leading `-` is accepted and ignored. Arithmetic
    /// wraps, so overlong input keeps only its low 32 bits.
    pub fn parse_number(&mut self, radix: Radix) -> u32 {
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        if radix == Radix::Hex
            && self.peek() == Some(b'0')
            && matches!(self.line.get(self.pos + 1), Some(b'x' | b'X'))
        {
            self.pos += 2;
        }

        let base = match radix {
            Radix::Hex => 16,
            Radix::Decimal => 10,
        };
        let mut value = 0u32;
        while let Some(d) = self.peek().and_then(|c| (c as char).to_digit(base))
        {
            value = value.wrapping_mul(base).wrapping_add(d);
            self.pos += 1;
        }
        value
    }

    /// Skips spaces and consumes a single character.
    pub fn next_char(&mut self) -> Option<u8> {
        self.skip_spaces();
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    /// Skips spaces and returns the next token, or `None` at end of line.
    pub fn next_token(&mut self) -> Option<&'a str> {
        self.skip_spaces();
        if self.at_end() {
            None
        } else {
            Some(self.parse_name())
        }
    }

    /// Skips spaces and parses the next number, or returns `None` if the
    /// line has no more tokens.
    pub fn next_number(&mut self, radix: Radix) -> Option<u32> {
        self.skip_spaces();
        if self.at_end() {
            return None;
        }
        let n = self.parse_number(radix);
        // Drop anything left of a malformed token.
        self.parse_name();
        Some(n)
    }
}

/// Addresses given to `boot`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BootAddresses {
    pub kernel: u32,
    pub fdt: u32,
}

/// Parses `<cmd> <kernel-hex> - <fdt-hex>`.
///
/// The middle token names a root filesystem address; it is read and thrown
/// away. Zero means "unset", so a zero (or missing) address is a `Fault`, as
/// is a line with no command token at all.
pub fn parse_boot_address(line: &str) -> Result<BootAddresses, Error> {
    let mut c = Cursor::new(line);
    if c.next_token().is_none() {
        return Err(Error::Fault);
    }
    let kernel = c.next_number(Radix::Hex).unwrap_or(0);
    let _rootfs = c.next_token();
    let fdt = c.next_number(Radix::Hex).unwrap_or(0);

    if kernel == 0 || fdt == 0 {
        return Err(Error::Fault);
    }
    Ok(BootAddresses { kernel, fdt })
}

/// Parses `<cmd> <address-hex> <value>`, reading the value in `radix`.
///
/// `md` passes `Decimal` (a word count) and `mw` passes `Hex`.
pub fn parse_mem_range(line: &str, radix: Radix) -> Result<(u32, u32), Error> {
    let mut c = Cursor::new(line);
    c.next_token().ok_or(Error::Inval)?;
    let addr = c.next_number(Radix::Hex).ok_or(Error::Inval)?;
    let value = c.next_number(radix).ok_or(Error::Inval)?;
    Ok((addr, value))
}

/// Returns the text after the command token, with surrounding spaces
/// removed.
pub fn args(line: &str) -> &str {
    let line = line.trim_start_matches(' ');
    match line.find(' ') {
        Some(i) => line[i..].trim_matches(' '),
        None => "",
    }
}
