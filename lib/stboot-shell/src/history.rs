// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::line::Line;

/// Number of completed lines remembered.
pub const HISTORY_DEPTH: usize = 32;

/// Ring of previously completed lines, recalled with Up/Down.
///
/// `tail` is the next slot to write. The recall cursor is kept as a number
/// of steps back from `tail` rather than as a slot index: 0 means "not
/// recalling", and it never exceeds `count`, so Up can't walk past the
/// oldest stored line even once the ring has wrapped.
pub struct History {
    lines: [Line; HISTORY_DEPTH],
    tail: usize,
    count: usize,
    back: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self {
            lines: core::array::from_fn(|_| Line::new()),
            tail: 0,
            count: 0,
            back: 0,
        }
    }

    /// Number of lines currently stored.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Records a completed line. Empty lines are not recorded. Always
    /// resets the recall cursor.
    pub fn push(&mut self, line: &str) {
        self.back = 0;
        if line.is_empty() {
            return;
        }
        let slot = &mut self.lines[self.tail];
        slot.clear();
        // History slots have the same capacity as the edit buffer.
        let _ = slot.push_str(line);
        self.tail = (self.tail + 1) % HISTORY_DEPTH;
        self.count = (self.count + 1).min(HISTORY_DEPTH);
    }

    /// Steps one line further into the past, or returns `None` at the
    /// oldest stored line.
    pub fn older(&mut self) -> Option<&str> {
        if self.back >= self.count {
            return None;
        }
        self.back += 1;
        Some(self.current())
    }

    /// Steps one line toward the present. Stepping past the newest line
    /// yields the empty line being composed. Returns `None` if we aren't
    /// recalling anything.
    pub fn newer(&mut self) -> Option<&str> {
        if self.back == 0 {
            return None;
        }
        self.back -= 1;
        if self.back == 0 {
            Some("")
        } else {
            Some(self.current())
        }
    }

    pub fn reset_cursor(&mut self) {
        self.back = 0;
    }

    fn current(&self) -> &str {
        let slot = (self.tail + HISTORY_DEPTH - self.back) % HISTORY_DEPTH;
        self.lines[slot].as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn with_lines(n: usize) -> History {
        let mut h = History::new();
        for i in 1..=n {
            h.push(&format!("L{i}"));
        }
        h
    }

    #[test]
    fn empty_history_recalls_nothing() {
        let mut h = History::new();
        assert_eq!(h.older(), None);
        assert_eq!(h.newer(), None);
    }

    #[test]
    fn empty_lines_are_skipped() {
        let mut h = History::new();
        h.push("md 0 1");
        h.push("");
        assert_eq!(h.len(), 1);
        assert_eq!(h.older(), Some("md 0 1"));
    }

    #[test]
    fn up_stops_at_oldest() {
        let mut h = with_lines(2);
        assert_eq!(h.older(), Some("L2"));
        assert_eq!(h.older(), Some("L1"));
        assert_eq!(h.older(), None);
        assert_eq!(h.newer(), Some("L2"));
        assert_eq!(h.newer(), Some(""));
        assert_eq!(h.newer(), None);
    }

    #[test]
    fn wraparound_drops_oldest() {
        let mut h = with_lines(HISTORY_DEPTH + 3);
        assert_eq!(h.len(), HISTORY_DEPTH);
        let mut last = String::new();
        let mut steps = 0;
        while let Some(l) = h.older() {
            last = l.to_string();
            steps += 1;
        }
        assert_eq!(steps, HISTORY_DEPTH);
        assert_eq!(last, "L4");
    }

    #[test]
    fn push_resets_cursor() {
        let mut h = with_lines(3);
        h.older();
        h.older();
        h.push("L4");
        assert_eq!(h.older(), Some("L4"));
    }

    proptest! {
        #[test]
        fn up_j_times_recalls_k_minus_j_plus_1(
            k in 1usize..=HISTORY_DEPTH,
            j in 1usize..=HISTORY_DEPTH,
        ) {
            let j = j.min(k);
            let mut h = with_lines(k);
            let mut got = String::new();
            for _ in 0..j {
                got = h.older().unwrap().to_string();
            }
            prop_assert_eq!(got, format!("L{}", k - j + 1));

            // Down walks back toward the newest line, then the empty one.
            for step in 1..j {
                let l = h.newer().unwrap().to_string();
                prop_assert_eq!(l, format!("L{}", k - j + 1 + step));
            }
            prop_assert_eq!(h.newer(), Some(""));
        }
    }
}
