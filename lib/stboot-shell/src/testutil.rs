// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::VecDeque;
use std::fmt;

use crate::Console;

/// Console that replays canned keystrokes and captures everything echoed.
#[derive(Default)]
pub struct ScriptedConsole {
    pub input: VecDeque<u8>,
    pub output: String,
}

impl ScriptedConsole {
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            output: String::new(),
        }
    }

    pub fn feed(&mut self, input: &[u8]) {
        self.input.extend(input.iter().copied());
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}

impl fmt::Write for ScriptedConsole {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.output.push_str(s);
        Ok(())
    }
}

impl Console for ScriptedConsole {
    fn read_byte(&mut self) -> u8 {
        self.input.pop_front().expect("console input exhausted")
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.output.push_str(&String::from_utf8_lossy(bytes));
    }
}
