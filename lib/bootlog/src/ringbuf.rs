// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static trace ring.
//!
//! Declare one per module with [`ringbuf!`](crate::ringbuf!), giving the
//! payload type, the number of entries and an initial value:
//!
//! ```ignore
//! #[derive(Copy, Clone, PartialEq)]
//! enum Trace {
//!     None,
//!     Erase(u32),
//! }
//! ringbuf!(Trace, 32, Trace::None);
//! ```
//!
//! and record into it with [`ringbuf_entry!`](crate::ringbuf_entry!):
//!
//! ```ignore
//! ringbuf_entry!(Trace::Erase(addr));
//! ```
//!
//! Each entry remembers the source line that recorded it. Recording the
//! same payload from the same line twice in a row bumps `count` on the
//! existing entry instead of using a new slot, so a polling loop doesn't
//! wash everything else out of the ring.

use core::cell::RefCell;

use critical_section::Mutex;

#[derive(Debug, Copy, Clone)]
pub struct RingbufEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub payload: T,
}

#[derive(Debug)]
pub struct Ringbuf<T: Copy + PartialEq, const N: usize> {
    pub last: Option<usize>,
    pub buffer: [RingbufEntry<T>; N],
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, N> {
    pub const fn new(init: T) -> Self {
        Self {
            last: None,
            buffer: [RingbufEntry {
                line: 0,
                generation: 0,
                count: 0,
                payload: init,
            }; N],
        }
    }

    pub fn entry(&mut self, line: u16, payload: T) {
        // None is treated as out of range, so the first entry lands in slot
        // 0 and never merges with the initial contents.
        let last = self.last.unwrap_or(usize::MAX);

        if let Some(ent) = self.buffer.get_mut(last) {
            if ent.line == line && ent.payload == payload {
                if let Some(new_count) = ent.count.checked_add(1) {
                    ent.count = new_count;
                    return;
                }
            }
        }

        // Wrap by comparison, which also takes usize::MAX to 0.
        let ndx = {
            let next = last.wrapping_add(1);
            if next >= self.buffer.len() {
                0
            } else {
                next
            }
        };

        let ent = &mut self.buffer[ndx];
        *ent = RingbufEntry {
            line,
            payload,
            count: 1,
            generation: ent.generation.wrapping_add(1),
        };
        self.last = Some(ndx);
    }

    /// The most recently recorded entry.
    pub fn latest(&self) -> Option<&RingbufEntry<T>> {
        self.last.and_then(|i| self.buffer.get(i))
    }
}

/// A [`Ringbuf`] that can live in a `static`.
pub struct StaticRingbuf<T: Copy + PartialEq, const N: usize>(
    Mutex<RefCell<Ringbuf<T, N>>>,
);

impl<T: Copy + PartialEq, const N: usize> StaticRingbuf<T, N> {
    pub const fn new(init: T) -> Self {
        Self(Mutex::new(RefCell::new(Ringbuf::new(init))))
    }

    pub fn entry(&self, line: u16, payload: T) {
        critical_section::with(|cs| {
            self.0.borrow_ref_mut(cs).entry(line, payload)
        })
    }

    /// Runs `f` with the ring locked.
    pub fn with<R>(&self, f: impl FnOnce(&Ringbuf<T, N>) -> R) -> R {
        critical_section::with(|cs| f(&self.0.borrow_ref(cs)))
    }
}

/// Declares a trace ring in the current module.
///
/// `ringbuf!(NAME, Type, N, init)` makes a static named `NAME`; without a
/// name it is called `__RINGBUF`.
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[used]
        static $name: $crate::StaticRingbuf<$t, $n> =
            $crate::StaticRingbuf::new($init);
    };
    ($t:ty, $n:expr, $init:expr) => {
        $crate::ringbuf!(__RINGBUF, $t, $n, $init);
    };
}

/// Records a payload in a ring declared with [`ringbuf!`](crate::ringbuf!).
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        // Evaluated in a tuple so neither expression can see the other's
        // binding.
        let (p, buf) = ($payload, &$buf);
        $crate::StaticRingbuf::entry(buf, line!() as u16, p);
    }};
    ($payload:expr) => {
        $crate::ringbuf_entry!(__RINGBUF, $payload);
    };
}
