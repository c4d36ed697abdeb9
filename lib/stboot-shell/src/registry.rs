// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt;

use crate::Error;

/// Upper bound on registered commands.
pub const MAX_COMMANDS: usize = 16;

/// Command handler. Receives the context and the whole line, command name
/// included.
pub type ExecFn<T> = fn(&mut T, &str) -> Result<(), Error>;

/// Writes usage lines for a command, without indentation.
pub type HelpFn = fn(&mut dyn fmt::Write) -> fmt::Result;

pub struct Command<T> {
    pub name: &'static str,
    pub help: Option<HelpFn>,
    pub exec: ExecFn<T>,
}

// Derives would require `T: Clone`, which the context never is.
impl<T> Clone for Command<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Command<T> {}

impl<T> fmt::Debug for Command<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command").field("name", &self.name).finish()
    }
}

/// Returns the first space-delimited token of `line`.
pub fn first_token(line: &str) -> &str {
    line.trim_start_matches(' ')
        .split(' ')
        .next()
        .unwrap_or("")
}

/// The command table.
///
/// Commands are kept in registration order and reported most recently
/// registered first, which is the order `help` lists them and the order
/// lookup scans.
pub struct Registry<T> {
    commands: heapless::Vec<Command<T>, MAX_COMMANDS>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    pub const fn new() -> Self {
        Self {
            commands: heapless::Vec::new(),
        }
    }

    /// Builds a registry from a static table, registering entries in order.
    pub fn from_table(table: &[Command<T>]) -> Result<Self, Error> {
        let mut r = Self::new();
        for c in table {
            r.register(c.name, c.help, c.exec)?;
        }
        Ok(r)
    }

    /// Adds a command. Fails with `Inval` for an empty, space-containing or
    /// duplicate name, and with `NoMem` once the table is full.
    pub fn register(
        &mut self,
        name: &'static str,
        help: Option<HelpFn>,
        exec: ExecFn<T>,
    ) -> Result<(), Error> {
        if name.is_empty() || name.contains(' ') {
            return Err(Error::Inval);
        }
        if self.commands.iter().any(|c| c.name == name) {
            return Err(Error::Inval);
        }
        self.commands
            .push(Command { name, help, exec })
            .map_err(|_| Error::NoMem)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Iterates most recently registered first.
    pub fn iter(&self) -> impl Iterator<Item = &Command<T>> + '_ {
        self.commands.iter().rev()
    }

    /// Finds the command named by the first token of `line`. The match is
    /// exact: `mw` never resolves to `md` or `mtest`.
    pub fn lookup(&self, line: &str) -> Option<Command<T>> {
        let name = first_token(line);
        if name.is_empty() {
            return None;
        }
        self.iter().find(|c| c.name == name).copied()
    }
}

/// Source of names for tab completion.
pub trait Completer {
    /// Calls `f` with every candidate name, in listing order.
    fn for_each_name(&self, f: &mut dyn FnMut(&'static str));
}

impl<T> Completer for Registry<T> {
    fn for_each_name(&self, f: &mut dyn FnMut(&'static str)) {
        for c in self.iter() {
            f(c.name);
        }
    }
}

impl<const N: usize> Completer for [&'static str; N] {
    fn for_each_name(&self, f: &mut dyn FnMut(&'static str)) {
        for name in self {
            f(*name);
        }
    }
}
