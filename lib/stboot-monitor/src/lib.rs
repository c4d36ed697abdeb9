// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The st-boot monitor.
//!
//! [`Monitor`] owns everything the shell touches: the console, the NOR
//! flash, the image source, the line editor and its history, and the
//! command table. The board crate builds one from its [`Parts`] and calls
//! [`Monitor::run`], which never returns; the only way out is the `boot`,
//! `reset` or a fault.
//!
//! The hardware itself is behind [`Board`], so that all of this runs on a
//! host under `cargo test` against a mock board.

#![cfg_attr(not(test), no_std)]

mod board;
mod commands;
pub mod config;

#[cfg(test)]
mod mock;

pub use board::{Board, Cache, CacheOp, Parts, Tty};
pub use config::Config;
pub use flash_update::XipFlash;

use core::fmt::Write as _;

use bootlog::{pr_err, pr_info, ringbuf, ringbuf_entry};
use stboot_shell::{first_token, Error, LineEditor, Registry};

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Run(&'static str),
    Failed(&'static str, Error),
    Unknown,
    Boot { kernel: u32, fdt: u32 },
    UpdateBlock(usize),
}

ringbuf!(TRACE, Trace, 32, Trace::None);

pub struct Monitor<B: Board> {
    board: B,
    tty: Tty<B::Console>,
    flash: B::Flash,
    images: B::Images,
    staging: &'static mut [u8],
    config: Config,
    editor: LineEditor,
    registry: Registry<Self>,
}

impl<B: Board> Monitor<B> {
    /// Assembles the monitor and registers the built-in commands.
    pub fn new(parts: Parts<B>, config: Config) -> Result<Self, Error> {
        Ok(Self {
            board: parts.board,
            tty: Tty::new(parts.console, B::now_ms),
            flash: parts.flash,
            images: parts.images,
            staging: parts.staging,
            config,
            editor: LineEditor::new(config::PROMPT),
            registry: Registry::from_table(&commands::table::<B>())?,
        })
    }

    pub fn tty(&mut self) -> &mut Tty<B::Console> {
        &mut self.tty
    }

    /// Prints the logo.
    pub fn banner(&mut self) {
        let _ = self.tty.write_str(BANNER);
    }

    /// Reads one line and runs it.
    pub fn step(&mut self) {
        let line = self.editor.read_line(&mut self.tty, &self.registry);
        self.execute(&line);
    }

    pub fn run(&mut self) -> ! {
        loop {
            self.step();
        }
    }

    /// Runs `line` as though it had been typed.
    ///
    /// Failures are reported on the console and go no further.
    pub fn execute(&mut self, line: &str) {
        if first_token(line).is_empty() {
            return;
        }
        let Some(cmd) = self.registry.lookup(line) else {
            ringbuf_entry!(TRACE, Trace::Unknown);
            pr_info!(self.tty, "error: {}: no such a command", line);
            return;
        };

        ringbuf_entry!(TRACE, Trace::Run(cmd.name));
        if let Err(e) = (cmd.exec)(self, line) {
            ringbuf_entry!(TRACE, Trace::Failed(cmd.name, e));
            pr_err!(self.tty, "error: {}: {}", cmd.name, e);
        }
    }
}

const BANNER: &str = concat!(
    "\r\n",
    " _____   _____   _____   _____   _____   _____\r\n",
    "/  ___/ |_   _| |  _  \\ /  _  \\ /  _  \\ |_   _|\r\n",
    "| |___    | |   | |_| | | | | | | | | |   | |\r\n",
    "\\___  \\   | |   |  _  | | | | | | | | |   | |\r\n",
    " ___| |   | |   | |_| | | |_| | | |_| |   | |\r\n",
    "/_____/   |_|   |_____/ \\_____/ \\_____/   |_|\r\n",
    "\r\n",
);
