// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt::Write as _;

use bootlog::pr_info;
use stboot_shell::{ansi, Error};

use super::Indent;
use crate::config::VERSION;
use crate::{Board, Monitor};

pub(super) fn help<B: Board>(m: &mut Monitor<B>, _line: &str) -> Result<(), Error> {
    outln!(m, "support command:");
    for c in m.registry.iter() {
        outln!(m, "  {}", c.name);
        if let Some(usage) = c.help {
            let _ = usage(&mut Indent::new(&mut m.tty));
        }
    }
    outln!(m, "");
    Ok(())
}

pub(super) fn clear<B: Board>(m: &mut Monitor<B>, _line: &str) -> Result<(), Error> {
    let _ = m.tty.write_str(ansi::CLEAR_SCREEN);
    Ok(())
}

pub(super) fn version<B: Board>(m: &mut Monitor<B>, _line: &str) -> Result<(), Error> {
    outln!(m, "st-boot {VERSION}");
    Ok(())
}

pub(super) fn reset<B: Board>(m: &mut Monitor<B>, _line: &str) -> Result<(), Error> {
    pr_info!(m.tty, "reset: system reset ...");
    m.board.reset()
}
