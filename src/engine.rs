/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

/*!

Bit extraction and injection over storage-unit cursors.

This is the storage-agnostic core of the crate: given a starting bit inside
the first storage unit and a field width, the functions below walk the
accessor one unit at a time, assembling a logical value (read) or applying
a [`Modifier`] to each covered unit (modify). Fields may span several
units; the bits of every unit outside the target field are preserved
exactly, because modifiers always combine the injected chunk with the
cleared old unit contents instead of storing naively.

Two bit-numbering conventions are supported. In LSB-first order, bit 0 of
a field lands on the least-significant bit of its storage unit, and the
continuation of a split field carries the more-significant value bits. In
MSB-first order, bit 0 lands on the most-significant bit, and the first
unit of a split field carries the more-significant value bits.

The value type `V` may be wider than the storage type `S`, up to the
structural limit [`MAX_VALUE_TO_STORAGE_RATIO`], which bounds the number
of units any single field can span. The limit is enforced at compile time
by [`BitField`](crate::field::BitField); the functions here only
`debug_assert` it.

The per-unit side effects are part of the contract: a read-class operation
performs exactly one [`read`](Storage::read) per unit touched; a
write-class operation performs one read and one write per unit, except
that a chunk exactly filling a unit skips the read (see [`clear_chunk`]).

*/

use crate::traits::storage::{Storage, StorageMut, Word};
use common_traits::CastableFrom;

/// The number of bits in the value type cannot exceed this multiple of the
/// number of bits in the storage type.
pub const MAX_VALUE_TO_STORAGE_RATIO: usize = 8;

/// Return a value with its lowest `bit_width` bits set to one.
///
/// `bit_width` may be the full width of `W`; the all-ones case is
/// short-circuited so no shift by `W::BITS` ever happens.
#[inline(always)]
pub fn mask<W: Word>(bit_width: usize) -> W {
    if bit_width == 0 {
        W::ZERO
    } else {
        W::MAX >> (W::BITS - bit_width)
    }
}

/// The per-unit strategy of a modify operation.
///
/// The engine calls [`apply`](Modifier::apply) once per storage unit
/// covered by the field, with the cursor positioned on that unit:
/// `storage_shift` is the distance of the chunk from the unit's
/// least-significant bit, `value_shift` the distance of the chunk from the
/// value's least-significant bit, and `chunk_width` the number of bits of
/// the field that fall into this unit.
pub trait Modifier<S: Word> {
    fn apply<A: StorageMut<S>>(
        &self,
        acc: &mut A,
        storage_shift: usize,
        value_shift: usize,
        chunk_width: usize,
    );
}

/// Return the unit under the cursor with the chunk at
/// `storage_shift..storage_shift + chunk_width` cleared.
///
/// A chunk filling the whole unit returns zero without reading, as the
/// old contents cannot survive anyway.
#[inline(always)]
pub fn clear_chunk<S: Word, A: StorageMut<S>>(
    acc: &mut A,
    storage_shift: usize,
    chunk_width: usize,
) -> S {
    if chunk_width == S::BITS {
        return S::ZERO;
    }
    acc.read() & !(mask::<S>(chunk_width) << storage_shift)
}

/// Read a field in LSB-first order.
///
/// `first_bit` must be smaller than `S::BITS`; the caller is expected to
/// have advanced the accessor to the unit containing the field's first bit.
pub fn read_lsb<V, S, A>(mut acc: A, first_bit: usize, width: usize) -> V
where
    V: Word + CastableFrom<S>,
    S: Word,
    A: Storage<S>,
{
    debug_assert!(first_bit < S::BITS);
    debug_assert!(width <= MAX_VALUE_TO_STORAGE_RATIO * S::BITS);
    let mut bit = first_bit;
    let mut rem = width;
    let mut consumed = 0;
    let mut res = V::ZERO;
    loop {
        let chunk_width = Ord::min(rem, S::BITS - bit);
        let chunk = (acc.read() >> bit) & mask::<S>(chunk_width);
        res |= V::cast_from(chunk) << consumed;
        rem -= chunk_width;
        if rem == 0 {
            break;
        }
        consumed += chunk_width;
        bit = 0;
        acc.advance(1);
    }
    res
}

/// Read a field in MSB-first order.
///
/// `first_bit` counts from the most-significant bit of the unit under the
/// cursor; the chunk of a split field read first is the most significant
/// part of the result.
pub fn read_msb<V, S, A>(mut acc: A, first_bit: usize, width: usize) -> V
where
    V: Word + CastableFrom<S>,
    S: Word,
    A: Storage<S>,
{
    debug_assert!(first_bit < S::BITS);
    debug_assert!(width <= MAX_VALUE_TO_STORAGE_RATIO * S::BITS);
    let mut bit = first_bit;
    let mut rem = width;
    let mut res = V::ZERO;
    loop {
        let chunk_width = Ord::min(rem, S::BITS - bit);
        let chunk = (acc.read() >> (S::BITS - bit - chunk_width)) & mask::<S>(chunk_width);
        rem -= chunk_width;
        res |= V::cast_from(chunk) << rem;
        if rem == 0 {
            break;
        }
        bit = 0;
        acc.advance(1);
    }
    res
}

/// Rewrite a field in LSB-first order by applying `m` to every covered
/// unit.
pub fn modify_lsb<S, A, M>(mut acc: A, first_bit: usize, width: usize, m: M)
where
    S: Word,
    A: StorageMut<S>,
    M: Modifier<S>,
{
    debug_assert!(first_bit < S::BITS);
    debug_assert!(width <= MAX_VALUE_TO_STORAGE_RATIO * S::BITS);
    let mut bit = first_bit;
    let mut rem = width;
    let mut value_shift = 0;
    loop {
        let chunk_width = Ord::min(rem, S::BITS - bit);
        m.apply(&mut acc, bit, value_shift, chunk_width);
        rem -= chunk_width;
        if rem == 0 {
            break;
        }
        value_shift += chunk_width;
        bit = 0;
        acc.advance(1);
    }
}

/// Rewrite a field in MSB-first order by applying `m` to every covered
/// unit.
pub fn modify_msb<S, A, M>(mut acc: A, first_bit: usize, width: usize, m: M)
where
    S: Word,
    A: StorageMut<S>,
    M: Modifier<S>,
{
    debug_assert!(first_bit < S::BITS);
    debug_assert!(width <= MAX_VALUE_TO_STORAGE_RATIO * S::BITS);
    let mut bit = first_bit;
    let mut rem = width;
    loop {
        let chunk_width = Ord::min(rem, S::BITS - bit);
        rem -= chunk_width;
        // In MSB-first order the remaining width is exactly the distance of
        // this chunk from the value's least-significant bit.
        m.apply(&mut acc, S::BITS - bit - chunk_width, rem, chunk_width);
        if rem == 0 {
            break;
        }
        bit = 0;
        acc.advance(1);
    }
}
