/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

/*!

Storage-accessor capability traits.

The engine never touches memory directly: it goes through a value
implementing [`Storage`] (read-only back-ends) or [`StorageMut`]
(read-write back-ends). An accessor is a cursor over an array of storage
units of type `S`: [`advance`](Storage::advance) moves it forward by a
number of units, [`read`](Storage::read) and [`write`](StorageMut::write)
operate on the unit under the cursor.

Accessors must be cheap to clone, as clones are used to address different
units of the same backing store independently — in particular the
[write-combining buffer](crate::write_buf::WriteBuf) clones its backing
accessor once per committed unit. [`read`](Storage::read) takes `&mut self`
because a back-end may have side effects (e.g., a memory-mapped register
bank behind a select/data register pair).

For plain memory we provide [`SliceReader`] and [`SliceWriter`]. The
mutable flavor is a cursor over `&[Cell<S>]` rather than `&mut [S]`, so
that clones can coexist; [`SliceWriter::new`] performs the conversion via
[`Cell::from_mut`].

*/

use common_traits::*;
use core::cell::Cell;

/// A derived trait satisfied by all the unsigned fixed-width integer types
/// usable as storage units or logical field values.
pub trait Word: UnsignedInt + FiniteRangeNumber + AsBytes {}
impl<W: UnsignedInt + FiniteRangeNumber + AsBytes> Word for W {}

/// A cursor over an array of storage units of type `S`.
pub trait Storage<S: Word>: Clone {
    /// Move the cursor forward by `n` storage units.
    fn advance(&mut self, n: usize);

    /// Read the storage unit under the cursor.
    ///
    /// The cursor does not move. Back-ends may have side effects.
    fn read(&mut self) -> S;
}

/// A [`Storage`] cursor whose units can also be written.
pub trait StorageMut<S: Word>: Storage<S> {
    /// Write the storage unit under the cursor.
    ///
    /// The cursor does not move.
    fn write(&mut self, value: S);
}

/// A read-only accessor over a slice of storage units.
#[derive(Debug, Clone, Copy)]
pub struct SliceReader<'a, S> {
    data: &'a [S],
    pos: usize,
}

impl<'a, S> SliceReader<'a, S> {
    pub fn new(data: &'a [S]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<S: Word> Storage<S> for SliceReader<'_, S> {
    #[inline(always)]
    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    /// # Panics
    ///
    /// Panics if the cursor has been advanced past the end of the slice.
    #[inline(always)]
    fn read(&mut self) -> S {
        self.data[self.pos]
    }
}

/// A read-write accessor over a slice of storage units.
///
/// Built on `&[Cell<S>]` so that independent clones can write to the same
/// backing slice without aliasing a `&mut` reference.
pub struct SliceWriter<'a, S> {
    data: &'a [Cell<S>],
    pos: usize,
}

impl<'a, S> SliceWriter<'a, S> {
    pub fn new(data: &'a mut [S]) -> Self {
        Self {
            data: Cell::from_mut(data).as_slice_of_cells(),
            pos: 0,
        }
    }

    /// Build an accessor over storage that is already cell-wrapped.
    pub fn from_cells(data: &'a [Cell<S>]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<S: Copy + core::fmt::Debug> core::fmt::Debug for SliceWriter<'_, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SliceWriter")
            .field("data", &self.data)
            .field("pos", &self.pos)
            .finish()
    }
}

impl<S> Clone for SliceWriter<'_, S> {
    fn clone(&self) -> Self {
        Self {
            data: self.data,
            pos: self.pos,
        }
    }
}

impl<S> Copy for SliceWriter<'_, S> {}

impl<S: Word> Storage<S> for SliceWriter<'_, S> {
    #[inline(always)]
    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    /// # Panics
    ///
    /// Panics if the cursor has been advanced past the end of the slice.
    #[inline(always)]
    fn read(&mut self) -> S {
        self.data[self.pos].get()
    }
}

impl<S: Word> StorageMut<S> for SliceWriter<'_, S> {
    /// # Panics
    ///
    /// Panics if the cursor has been advanced past the end of the slice.
    #[inline(always)]
    fn write(&mut self, value: S) {
        self.data[self.pos].set(value);
    }
}
