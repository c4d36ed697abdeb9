// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt;

use bootlog::pr_info;
use stboot_shell::{parse::Cursor, Error};

use crate::{Board, Cache, CacheOp, Monitor};

pub(super) fn help(w: &mut dyn fmt::Write) -> fmt::Result {
    writeln!(w, "cache <name> <op>")?;
    writeln!(w, "disable icache: cache i 0")?;
    writeln!(w, "invalid dcache: cache d i")
}

pub(super) fn cache<B: Board>(m: &mut Monitor<B>, line: &str) -> Result<(), Error> {
    let mut c = Cursor::new(line);
    c.next_token();
    let target = c.next_char();
    let op = CacheOp::from_arg(c.next_char());

    let (which, name) = match target {
        Some(b'i') => (Cache::Instruction, "icache"),
        Some(b'd') => (Cache::Data, "dcache"),
        other => {
            let c = other.map(char::from).unwrap_or(' ');
            pr_info!(m.tty, "error: no command arg {}", c);
            return Err(Error::Fault);
        }
    };

    m.board.cache(which, op);
    let state = match op {
        CacheOp::Invalidate => "invalid",
        CacheOp::Disable => "disabled",
        CacheOp::Enable => "enabled",
    };
    outln!(m, "cache: {name} {state}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock;

    #[test]
    fn operations() {
        let mut m = mock::monitor();
        m.execute("cache i 0");
        m.execute("cache d i");
        m.execute("cache i x");
        m.execute("cache d");
        assert_eq!(
            m.board.cache_ops,
            [
                (Cache::Instruction, CacheOp::Disable),
                (Cache::Data, CacheOp::Invalidate),
                (Cache::Instruction, CacheOp::Enable),
                (Cache::Data, CacheOp::Enable),
            ]
        );
        assert_eq!(
            m.tty.inner().take_output(),
            "cache: icache disabled\r\n\
             cache: dcache invalid\r\n\
             cache: icache enabled\r\n\
             cache: dcache enabled\r\n"
        );
    }

    #[test]
    fn unknown_target() {
        let mut m = mock::monitor();
        m.execute("cache x 0");
        let out = m.tty.inner().take_output();
        assert!(out.contains("error: no command arg x"), "{out:?}");
        assert!(out.contains("error: cache: -EFAULT (-14)"), "{out:?}");
        assert!(m.board.cache_ops.is_empty());
    }
}
