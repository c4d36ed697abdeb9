// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::console::{ansi, Console};
use crate::history::History;
use crate::line::{Line, LineBuffer};
use crate::registry::Completer;

/// Turns keystrokes into command lines.
///
/// The editor owns the history ring, so it has to live as long as the shell
/// does; a fresh [`LineBuffer`] is started on each [`LineEditor::read_line`].
pub struct LineEditor {
    prompt: &'static str,
    history: History,
    buf: LineBuffer,
}

impl LineEditor {
    pub fn new(prompt: &'static str) -> Self {
        Self {
            prompt,
            history: History::new(),
            buf: LineBuffer::new(),
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Prints the prompt and reads one line, blocking on `con` for every
    /// keystroke.
    ///
    /// Returns on Enter with whatever was typed (possibly nothing), or on
    /// Ctrl-C with an empty line. Only non-empty lines completed with Enter
    /// are added to history.
    pub fn read_line<C: Console + ?Sized>(
        &mut self,
        con: &mut C,
        completer: &dyn Completer,
    ) -> Line {
        self.buf.clear();
        self.history.reset_cursor();
        let _ = con.write_str(self.prompt);

        loop {
            match con.read_byte() {
                ansi::CR => {
                    let _ = con.write_str("\r\n");
                    let line = self.buf.to_line();
                    self.history.push(&line);
                    return line;
                }
                ansi::ETX => {
                    let _ = con.write_str("\r\n");
                    self.buf.clear();
                    return Line::new();
                }
                ansi::DEL => self.backspace(con),
                ansi::TAB => self.complete(con, completer),
                ansi::ESC => self.escape(con),
                c @ 0x20..=0x7e => self.insert(con, c),
                _ => (),
            }
        }
    }

    fn insert<C: Console + ?Sized>(&mut self, con: &mut C, c: u8) {
        if !self.buf.insert(c) {
            return;
        }
        con.write_bytes(&[c]);
        let tail = self.buf.tail();
        con.write_bytes(tail);
        con.cursor_left(tail.len());
    }

    fn backspace<C: Console + ?Sized>(&mut self, con: &mut C) {
        if !self.buf.backspace() {
            return;
        }
        // Step back, shift the rest of the line over, blank the last
        // column and return to the edit point.
        con.write_bytes(b"\x08");
        let tail = self.buf.tail();
        con.write_bytes(tail);
        con.write_bytes(b" ");
        con.cursor_left(tail.len() + 1);
    }

    fn escape<C: Console + ?Sized>(&mut self, con: &mut C) {
        if con.read_byte() != b'[' {
            return;
        }
        match con.read_byte() {
            b'A' => {
                if let Some(l) = self.history.older() {
                    replace(&mut self.buf, con, l);
                }
            }
            b'B' => {
                if let Some(l) = self.history.newer() {
                    replace(&mut self.buf, con, l);
                }
            }
            b'C' => {
                if self.buf.move_right() {
                    con.cursor_right(1);
                }
            }
            b'D' => {
                if self.buf.move_left() {
                    con.cursor_left(1);
                }
            }
            b'0'..=b'9' => {
                // Delete, Home, End and friends: swallow the parameters and
                // the terminator.
                loop {
                    let b = con.read_byte();
                    if b == b'~' || !(b.is_ascii_digit() || b == b';') {
                        break;
                    }
                }
            }
            _ => (),
        }
    }

    fn complete<C: Console + ?Sized>(
        &mut self,
        con: &mut C,
        completer: &dyn Completer,
    ) {
        let prefix = self.buf.as_str();
        if prefix.contains(' ') {
            return;
        }

        let mut first: Option<&'static str> = None;
        let mut common = 0;
        let mut matches = 0;
        completer.for_each_name(&mut |name| {
            if !name.starts_with(prefix) {
                return;
            }
            matches += 1;
            match first {
                None => {
                    first = Some(name);
                    common = name.len();
                }
                Some(f) => common = common.min(common_prefix_len(f, name)),
            }
        });
        let Some(first) = first else {
            return;
        };

        let end = if matches == 1 { first.len() } else { common };
        let completion = &first[self.buf.len()..end];
        if !completion.is_empty() {
            con.cursor_right(self.buf.len() - self.buf.cursor());
            let n = self.buf.append(completion);
            let _ = con.write_str(&completion[..n]);
            return;
        }

        if matches > 1 {
            let prefix = self.buf.as_str();
            let _ = con.write_str("\r\n");
            completer.for_each_name(&mut |name| {
                if name.starts_with(prefix) {
                    let _ = con.write_str(name);
                    let _ = con.write_str("  ");
                }
            });
            let _ = con.write_str("\r\n");
            let _ = con.write_str(self.prompt);
            let _ = con.write_str(self.buf.as_str());
            con.cursor_left(self.buf.len() - self.buf.cursor());
        }
    }
}

/// Wipes the displayed line and shows `s` in its place, cursor at the end.
fn replace<C: Console + ?Sized>(buf: &mut LineBuffer, con: &mut C, s: &str) {
    con.cursor_left(buf.cursor());
    let _ = con.write_str(ansi::CLEAR_TO_EOL);
    buf.set(s);
    let _ = con.write_str(buf.as_str());
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedConsole;
    use crate::LINE_CAPACITY;
    use proptest::prelude::*;

    const PROMPT: &str = "> ";
    const NAMES: [&str; 4] = ["mtest", "mw", "md", "help"];
    const UP: &[u8] = b"\x1b[A";
    const DOWN: &[u8] = b"\x1b[B";
    const LEFT: &[u8] = b"\x1b[D";
    const RIGHT: &[u8] = b"\x1b[C";

    fn read(ed: &mut LineEditor, keys: &[u8]) -> (String, String) {
        let mut con = ScriptedConsole::new(keys);
        let line = ed.read_line(&mut con, &NAMES);
        assert!(con.input.is_empty(), "unread input: {:?}", con.input);
        (line.as_str().to_string(), con.output)
    }

    fn line_of(keys: &[u8]) -> String {
        read(&mut LineEditor::new(PROMPT), keys).0
    }

    fn keys(parts: &[&[u8]]) -> Vec<u8> {
        parts.concat()
    }

    #[test]
    fn prompt_and_echo() {
        let (line, out) = read(&mut LineEditor::new(PROMPT), b"md\r");
        assert_eq!(line, "md");
        assert_eq!(out, "> md\r\n");
    }

    #[test]
    fn insert_mid_line_redraws_tail() {
        let k = keys(&[b"mdx", LEFT, b"w", b"\r"]);
        let (line, out) = read(&mut LineEditor::new(PROMPT), &k);
        assert_eq!(line, "mdwx");
        // Typed char, the tail, then back over the tail.
        assert!(out.contains("wx\x1b[1D"), "{out:?}");
    }

    #[test]
    fn backspace_echo() {
        let k = keys(&[b"abc", LEFT, b"\x7f", b"\r"]);
        let (line, out) = read(&mut LineEditor::new(PROMPT), &k);
        assert_eq!(line, "ac");
        assert!(out.contains("\x08c \x1b[2D"), "{out:?}");
    }

    #[test]
    fn backspace_at_start_does_nothing() {
        let k = keys(&[b"a", LEFT, b"\x7f", b"\r"]);
        assert_eq!(line_of(&k), "a");
    }

    #[test]
    fn arrows_clamp() {
        let k = keys(&[b"ab", RIGHT, LEFT, LEFT, LEFT, b"x", b"\r"]);
        assert_eq!(line_of(&k), "xab");
    }

    #[test]
    fn ctrl_c_returns_empty_and_skips_history() {
        let mut ed = LineEditor::new(PROMPT);
        let (line, _) = read(&mut ed, b"md 0 1\x03");
        assert_eq!(line, "");
        assert!(ed.history().is_empty());
    }

    #[test]
    fn control_bytes_are_ignored() {
        assert_eq!(line_of(b"m\x01\x07d\n\r"), "md");
    }

    #[test]
    fn tilde_sequences_are_swallowed() {
        let k = keys(&[b"md", b"\x1b[3~", b"\x1b[1;5~", b"\r"]);
        assert_eq!(line_of(&k), "md");
    }

    #[test]
    fn overlong_input_is_dropped() {
        let mut k = vec![b'a'; LINE_CAPACITY + 5];
        k.push(b'\r');
        let (line, out) = read(&mut LineEditor::new(PROMPT), &k);
        assert_eq!(line.len(), LINE_CAPACITY);
        assert_eq!(out.len(), PROMPT.len() + LINE_CAPACITY + 2);
    }

    #[test]
    fn history_recall_and_return() {
        let mut ed = LineEditor::new(PROMPT);
        read(&mut ed, b"md 0 1\r");
        read(&mut ed, b"mw 0 1\r");
        read(&mut ed, b"\r");

        let k = keys(&[UP, UP, b"\r"]);
        assert_eq!(read(&mut ed, &k).0, "md 0 1");

        // The recalled line went back in as the newest entry.
        let k = keys(&[UP, UP, UP, UP, DOWN, b"\r"]);
        assert_eq!(read(&mut ed, &k).0, "mw 0 1");

        let k = keys(&[UP, DOWN, b"\r"]);
        assert_eq!(read(&mut ed, &k).0, "");
    }

    #[test]
    fn one_console_many_lines() {
        let mut ed = LineEditor::new(PROMPT);
        let mut con = ScriptedConsole::new(b"md 0 1\r");
        assert_eq!(ed.read_line(&mut con, &NAMES).as_str(), "md 0 1");
        assert_eq!(con.take_output(), "> md 0 1\r\n");

        con.feed(UP);
        con.feed(b"\r");
        assert_eq!(ed.read_line(&mut con, &NAMES).as_str(), "md 0 1");
        assert!(con.take_output().ends_with("md 0 1\r\n"));
        assert!(con.input.is_empty());
    }

    #[test]
    fn history_redraw_clears_old_text() {
        let mut ed = LineEditor::new(PROMPT);
        read(&mut ed, b"help\r");
        let k = keys(&[b"xyz", UP, b"\r"]);
        let (line, out) = read(&mut ed, &k);
        assert_eq!(line, "help");
        assert!(out.ends_with("xyz\x1b[3D\x1b[Khelp\r\n"), "{out:?}");
    }

    #[test]
    fn tab_completes_unique_match() {
        let (line, out) = read(&mut LineEditor::new(PROMPT), b"he\t\r");
        assert_eq!(line, "help");
        assert_eq!(out, "> help\r\n");
    }

    #[test]
    fn tab_extends_common_prefix() {
        // "mtest" and "mw" and "md" share only "m".
        assert_eq!(line_of(b"m\t\r"), "m");
        // "mtest" alone starts with "mt".
        assert_eq!(line_of(b"mt\t\r"), "mtest");
    }

    #[test]
    fn tab_lists_ambiguous_candidates() {
        let (line, out) = read(&mut LineEditor::new(PROMPT), b"m\t\r");
        assert_eq!(line, "m");
        assert!(out.contains("\r\nmtest  mw  md  \r\n> m"), "{out:?}");
    }

    #[test]
    fn tab_ignores_lines_with_arguments() {
        assert_eq!(line_of(b"he 1\t\r"), "he 1");
        assert_eq!(line_of(b"zz\t\r"), "zz");
    }

    proptest! {
        #[test]
        fn typing_is_identity(s in "[ -~]{0,64}") {
            let mut k = s.clone().into_bytes();
            k.push(b'\r');
            let (line, out) = read(&mut LineEditor::new(PROMPT), &k);
            prop_assert_eq!(&line, &s);
            prop_assert_eq!(out, format!("{PROMPT}{s}\r\n"));
        }

        #[test]
        fn backspace_anywhere(s in "[a-z]{1,64}", k in 1usize..=64) {
            let n = s.len();
            let k = k.min(n);
            let mut keys = s.clone().into_bytes();
            for _ in k..n {
                keys.extend_from_slice(LEFT);
            }
            keys.push(0x7f);
            keys.push(b'\r');

            let mut expected = s.clone();
            expected.remove(k - 1);
            prop_assert_eq!(line_of(&keys), expected);
        }
    }
}
