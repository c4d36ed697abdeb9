// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interactive console machinery for the st-boot monitor.
//!
//! This crate has no knowledge of the hardware. It provides:
//!
//! - [`Console`], the byte stream the shell talks over,
//! - [`LineEditor`], which turns raw keystrokes into a completed [`Line`],
//!   with cursor movement, history recall and tab completion,
//! - [`Registry`], the ordered table of [`Command`]s, and the first-token
//!   lookup used to dispatch a line to its handler,
//! - [`parse`], allocation-free token and number parsing over a line,
//! - [`Error`], the errno-style status handlers report.
//!
//! Everything is `no_std` and fixed-capacity so the same code runs on the
//! target and under `cargo test` on the host.

#![cfg_attr(not(test), no_std)]

mod console;
mod editor;
mod error;
mod history;
mod line;
pub mod parse;
mod registry;

pub use console::{ansi, Console};
pub use editor::LineEditor;
pub use error::Error;
pub use history::{History, HISTORY_DEPTH};
pub use line::{Line, LineBuffer, LINE_CAPACITY};
pub use registry::{
    first_token, Command, Completer, ExecFn, HelpFn, Registry,
    MAX_COMMANDS,
};

#[cfg(test)]
pub(crate) mod testutil;
