/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

/*!

A one-unit write-combining buffer.

When consecutive field writes land in the same storage unit, accessing the
backing store once per field is wasteful, and on write-sensitive media
(flash pages, serial device registers) it can be outright wrong. A
[`WriteBuf`] sits between the field operations and a backing
[`StorageMut`], caching exactly one unit. Repeated reads and
read-modify-write cycles against the current unit hit the cache; the
backing store is touched only when the access position moves to a higher
unit, on an explicit [`flush`](WriteBuf::flush), or on drop.

The buffer also elides readback entirely for units that the caller promises
to overwrite in full. The covered bit span (set with
[`covering`](WriteBuf::covering)) declares which bits the upcoming write
sequence produces: a unit lying wholly inside the span is synthesized as
zero instead of being fetched, since none of its previous contents can
survive. The default span covers everything, so by default the buffer
never reads the backing store.

The buffer serves strictly ascending unit positions. Moving backward
discards the cached unit without flushing it and reports the event to the
configured [`Backwards`] hook; the caller decides whether that is a bug or
an expected restart.

Reads through the buffer observe the cache, including synthesized zeros.
It is a write path, not a coherent read cache.

*/

use crate::traits::policy::{Backwards, IgnoreBackwards};
use crate::traits::storage::{Storage, StorageMut, Word};
use std::cell::Cell;
use std::ops::Range;

#[derive(Debug, Clone, Copy)]
enum State<S> {
    Empty,
    Clean { addr: usize, value: S },
    Dirty { addr: usize, value: S },
}

/// The write-combining buffer. See the [module documentation](self).
#[derive(Debug)]
pub struct WriteBuf<S: Word, A: StorageMut<S>, H: Backwards = IgnoreBackwards> {
    backing: A,
    state: Cell<State<S>>,
    covered: Range<usize>,
    flush_on_drop: bool,
    hook: H,
}

impl<S: Word, A: StorageMut<S>> WriteBuf<S, A> {
    /// Wrap a backing accessor positioned at the start of the target
    /// array. The buffer flushes on drop and covers all bits.
    pub fn new(backing: A) -> Self {
        Self::with_hook(backing, IgnoreBackwards)
    }
}

impl<S: Word, A: StorageMut<S>, H: Backwards> WriteBuf<S, A, H> {
    /// Like [`new`](WriteBuf::new), with a hook invoked on backward
    /// accesses.
    pub fn with_hook(backing: A, hook: H) -> Self {
        Self {
            backing,
            state: Cell::new(State::Empty),
            covered: 0..usize::MAX,
            flush_on_drop: true,
            hook,
        }
    }

    /// Declare the bit span the upcoming writes will fully produce.
    /// Units straddling either end of the span are read back before the
    /// first modification; units wholly inside are not.
    pub fn covering(mut self, covered: Range<usize>) -> Self {
        self.covered = covered;
        self
    }

    /// Disable the flush on drop; the caller commits the last unit with
    /// [`flush`](WriteBuf::flush) or abandons it with
    /// [`discard`](WriteBuf::discard).
    pub fn manual_flush(mut self) -> Self {
        self.flush_on_drop = false;
        self
    }

    /// An accessor over the buffer, positioned at unit 0. Any number of
    /// accessors may coexist; they share the single cached unit.
    pub fn accessor(&self) -> WriteBufAccessor<'_, S, A, H> {
        WriteBufAccessor { buf: self, pos: 0 }
    }

    /// Commit the cached unit to the backing store if it is dirty.
    pub fn flush(&self) {
        if let State::Dirty { addr, value } = self.state.get() {
            // Downgrade before committing so an aborted backing write is
            // not retried from drop.
            self.state.set(State::Clean { addr, value });
            log::trace!("flushing unit {}", addr);
            let mut acc = self.backing.clone();
            acc.advance(addr);
            acc.write(value);
        }
    }

    /// Drop the cached unit without writing it back.
    pub fn discard(&self) {
        self.state.set(State::Empty);
    }

    fn must_read(&self, addr: usize) -> bool {
        addr.saturating_mul(S::BITS) < self.covered.start
            || (addr + 1).saturating_mul(S::BITS) > self.covered.end
    }

    fn retarget(&self, addr: usize) {
        let cur = match self.state.get() {
            State::Empty => return,
            State::Clean { addr, .. } | State::Dirty { addr, .. } => addr,
        };
        if addr < cur {
            self.state.set(State::Empty);
            log::debug!("backward access: unit {} after unit {}", addr, cur);
            self.hook.handle_backwards(cur, addr);
        } else if addr > cur {
            self.flush();
            self.state.set(State::Empty);
        }
    }

    fn load(&self, addr: usize) -> S {
        self.retarget(addr);
        match self.state.get() {
            State::Clean { value, .. } | State::Dirty { value, .. } => value,
            State::Empty => {
                let value = if self.must_read(addr) {
                    let mut acc = self.backing.clone();
                    acc.advance(addr);
                    acc.read()
                } else {
                    // The unit lies wholly in the covered span; its
                    // previous contents cannot survive the sequence.
                    S::ZERO
                };
                self.state.set(State::Clean { addr, value });
                value
            }
        }
    }

    fn store(&self, addr: usize, value: S) {
        self.retarget(addr);
        self.state.set(State::Dirty { addr, value });
    }
}

impl<S: Word, A: StorageMut<S>, H: Backwards> Drop for WriteBuf<S, A, H> {
    fn drop(&mut self) {
        if self.flush_on_drop {
            self.flush();
        }
    }
}

/// A positioned accessor over a [`WriteBuf`].
#[derive(Debug)]
pub struct WriteBufAccessor<'a, S: Word, A: StorageMut<S>, H: Backwards = IgnoreBackwards> {
    buf: &'a WriteBuf<S, A, H>,
    pos: usize,
}

impl<S: Word, A: StorageMut<S>, H: Backwards> Clone for WriteBufAccessor<'_, S, A, H> {
    fn clone(&self) -> Self {
        Self {
            buf: self.buf,
            pos: self.pos,
        }
    }
}

impl<S: Word, A: StorageMut<S>, H: Backwards> Storage<S> for WriteBufAccessor<'_, S, A, H> {
    #[inline(always)]
    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    #[inline(always)]
    fn read(&mut self) -> S {
        self.buf.load(self.pos)
    }
}

impl<S: Word, A: StorageMut<S>, H: Backwards> StorageMut<S> for WriteBufAccessor<'_, S, A, H> {
    #[inline(always)]
    fn write(&mut self, value: S) {
        self.buf.store(self.pos, value);
    }
}
