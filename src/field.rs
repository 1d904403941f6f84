/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

/*!

The bundled field operations: validated reads, writes and bit-wise
modifications of a field identified by a [`FieldDesc`], plus the layout
queries that derive descriptors from a [`Format`].

A [`BitField`] value carries the whole access configuration: the logical
value type `V`, the storage unit type `S`, the [bit order](BitOrder), the
two layout axes used to resolve [`Format`] offsets, and an
[`ErrorPolicy`]. It holds no data; it is a stateless bundle of parameters
that is cheap to build and copy, in the same spirit as the traits class of
a hardware abstraction layer.

Validation runs before any storage access. A failed validation invokes the
policy hook and returns a [`FieldError`]; the backing store is never
partially modified. Reads report a too-wide field through the all-ones
sentinel instead, so they stay infallible for back-ends without error
channels.

*/

use crate::engine::{self, mask, Modifier, MAX_VALUE_TO_STORAGE_RATIO};
use crate::format::Format;
use crate::traits::policy::{ErrorPolicy, IgnoreErrors};
use crate::traits::storage::{Storage, StorageMut};
use common_traits::{CastableFrom, CastableInto};
use mem_dbg::{MemDbg, MemSize};
use std::marker::PhantomData;
use thiserror::Error;

pub use crate::traits::storage::Word;

/// A bit field: (offset, width) in bits, relative to the start of a
/// storage array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, MemDbg, MemSize)]
pub struct FieldDesc {
    pub offset: usize,
    pub width: usize,
}

impl FieldDesc {
    pub fn new(offset: usize, width: usize) -> Self {
        Self { offset, width }
    }

    /// The first bit past the field.
    pub fn end(&self) -> usize {
        self.offset + self.width
    }
}

/// Which end of a storage unit field bit 0 maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitOrder {
    /// Field bit 0 is the least-significant bit of its storage unit.
    #[default]
    Lsb,
    /// Field bit 0 is the most-significant bit of its storage unit.
    Msb,
}

/// Validation failures reported by the write-class operations.
///
/// The corresponding [`ErrorPolicy`] hook has already run when one of
/// these is returned; no storage access has taken place.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    #[error("field width {width} exceeds the {value_bits}-bit value type")]
    FieldTooWide { width: usize, value_bits: usize },
    #[error("value does not fit in {width} bits")]
    ValueTooBig { width: usize },
}

/// The access configuration: value type, storage type, bit order, layout
/// axes, and error policy.
///
/// The defaults mirror the most common hardware description: LSB-first
/// bit order, fields numbered from the start of the format, format aligned
/// flush against offset zero.
#[derive(Debug, Clone)]
pub struct BitField<V, S = V, P = IgnoreErrors> {
    order: BitOrder,
    numbered_from_start: bool,
    align_at_zero_offset: bool,
    policy: P,
    _marker: PhantomData<(V, S)>,
}

impl<V, S> BitField<V, S>
where
    V: Word + CastableInto<S> + CastableFrom<S>,
    S: Word,
{
    pub fn new() -> Self {
        Self::with_policy(IgnoreErrors)
    }
}

impl<V, S> Default for BitField<V, S>
where
    V: Word + CastableInto<S> + CastableFrom<S>,
    S: Word,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, S, P> BitField<V, S, P>
where
    V: Word + CastableInto<S> + CastableFrom<S>,
    S: Word,
    P: ErrorPolicy<V>,
{
    pub fn with_policy(policy: P) -> Self {
        // A value type wider than eight storage units is a misconfigured
        // type pairing; reject it during monomorphization.
        const {
            assert!(
                V::BITS <= MAX_VALUE_TO_STORAGE_RATIO * S::BITS,
                "value type too wide for storage type"
            )
        };
        Self {
            order: BitOrder::Lsb,
            numbered_from_start: true,
            align_at_zero_offset: true,
            policy,
            _marker: PhantomData,
        }
    }

    pub fn bit_order(mut self, order: BitOrder) -> Self {
        self.order = order;
        self
    }

    /// Use MSB-first field numbering.
    pub fn msb_first(self) -> Self {
        self.bit_order(BitOrder::Msb)
    }

    /// Number format fields from the trailing edge of the format instead
    /// of the leading edge.
    pub fn numbered_from_end(mut self) -> Self {
        self.numbered_from_start = false;
        self
    }

    /// Pad format offsets so the format ends flush with a storage-unit
    /// boundary instead of starting flush with offset zero.
    pub fn aligned_at_end(mut self) -> Self {
        self.align_at_zero_offset = false;
        self
    }

    fn check_width(&self, width: usize) -> Result<(), FieldError> {
        if width > V::BITS {
            self.policy.field_too_wide(width);
            return Err(FieldError::FieldTooWide {
                width,
                value_bits: V::BITS,
            });
        }
        Ok(())
    }

    fn check_fit(&self, value: V, width: usize) -> Result<(), FieldError> {
        // A full-width field holds any value; the all-ones bound itself
        // is not representable as 2^width - 1 in V.
        if width != V::BITS && value > mask::<V>(width) {
            self.policy.value_too_big(value, width);
            return Err(FieldError::ValueTooBig { width });
        }
        Ok(())
    }

    /// Read a field.
    ///
    /// A field wider than `V` invokes the policy hook and returns the
    /// all-ones sentinel without any storage access.
    pub fn read<A: Storage<S>>(&self, mut acc: A, field: FieldDesc) -> V {
        if self.check_width(field.width).is_err() {
            return !V::ZERO;
        }
        acc.advance(field.offset / S::BITS);
        let first_bit = field.offset % S::BITS;
        match self.order {
            BitOrder::Lsb => engine::read_lsb(acc, first_bit, field.width),
            BitOrder::Msb => engine::read_msb(acc, first_bit, field.width),
        }
    }

    /// Read a field, replicating its most-significant bit into the
    /// higher-order bits of the result.
    pub fn read_sign_extended<A: Storage<S>>(&self, acc: A, field: FieldDesc) -> V {
        let v = self.read(acc, field);
        if field.width == 0 || field.width >= V::BITS {
            return v;
        }
        if (v >> (field.width - 1)) & V::ONE == V::ONE {
            v | !mask::<V>(field.width)
        } else {
            v
        }
    }

    /// Apply an arbitrary [`Modifier`] to a field.
    ///
    /// Only the field width is validated: modifiers that carry a value are
    /// responsible for it fitting the field, or for accepting truncation.
    /// This is the unvalidated fast path shared by [`zero`](Self::zero),
    /// [`complement`](Self::complement) and
    /// [`write_unvalidated`](Self::write_unvalidated).
    pub fn modify<A: StorageMut<S>, M: Modifier<S>>(
        &self,
        mut acc: A,
        field: FieldDesc,
        m: M,
    ) -> Result<(), FieldError> {
        self.check_width(field.width)?;
        acc.advance(field.offset / S::BITS);
        let first_bit = field.offset % S::BITS;
        match self.order {
            BitOrder::Lsb => engine::modify_lsb(acc, first_bit, field.width, m),
            BitOrder::Msb => engine::modify_msb(acc, first_bit, field.width, m),
        }
        Ok(())
    }

    /// Store `value` into a field, preserving all bits outside it.
    pub fn write<A: StorageMut<S>>(
        &self,
        acc: A,
        field: FieldDesc,
        value: V,
    ) -> Result<(), FieldError> {
        self.check_width(field.width)?;
        self.check_fit(value, field.width)?;
        self.modify(acc, field, Replace(value))
    }

    /// Store `value` into a field without checking that it fits; excess
    /// high-order bits are truncated.
    pub fn write_unvalidated<A: StorageMut<S>>(
        &self,
        acc: A,
        field: FieldDesc,
        value: V,
    ) -> Result<(), FieldError> {
        self.modify(acc, field, Replace(value))
    }

    /// Clear a field to zero. Equivalent to writing zero, with no value
    /// validation by construction.
    pub fn zero<A: StorageMut<S>>(&self, acc: A, field: FieldDesc) -> Result<(), FieldError> {
        self.modify(acc, field, Zero)
    }

    /// Bit-wise AND `value` into a field.
    pub fn and<A: StorageMut<S>>(
        &self,
        acc: A,
        field: FieldDesc,
        value: V,
    ) -> Result<(), FieldError> {
        self.check_width(field.width)?;
        self.check_fit(value, field.width)?;
        self.modify(acc, field, And(value))
    }

    /// Bit-wise OR `value` into a field.
    pub fn or<A: StorageMut<S>>(
        &self,
        acc: A,
        field: FieldDesc,
        value: V,
    ) -> Result<(), FieldError> {
        self.check_width(field.width)?;
        self.check_fit(value, field.width)?;
        self.modify(acc, field, Or(value))
    }

    /// Bit-wise XOR `value` into a field.
    pub fn xor<A: StorageMut<S>>(
        &self,
        acc: A,
        field: FieldDesc,
        value: V,
    ) -> Result<(), FieldError> {
        self.check_width(field.width)?;
        self.check_fit(value, field.width)?;
        self.modify(acc, field, Xor(value))
    }

    /// Invert every bit of a field.
    pub fn complement<A: StorageMut<S>>(
        &self,
        acc: A,
        field: FieldDesc,
    ) -> Result<(), FieldError> {
        self.modify(acc, field, Complement)
    }

    // Layout queries. The axes configured on this value decide how the
    // raw offsets declared in a format translate into storage offsets.

    pub fn field_width(&self, fmt: &Format, name: &str) -> usize {
        fmt.width_of(name)
    }

    pub fn field_offset(&self, fmt: &Format, name: &str) -> usize {
        self.field_offset_from(fmt, name, 0)
    }

    /// Translate a raw format offset into a storage offset, applying the
    /// numbering direction and the end-alignment pad. `extent` is the bit
    /// size of the addressed entity (field width or sub-format size).
    ///
    /// A non-zero `base_offset` is assumed to already incorporate the pad
    /// that aligns the end of the containing format with a storage-unit
    /// boundary, so the pad is folded in only for a zero base.
    fn resolve_offset(
        &self,
        size_bits: usize,
        raw_offset: usize,
        extent: usize,
        base_offset: usize,
    ) -> usize {
        let offset = if self.numbered_from_start {
            raw_offset
        } else {
            size_bits - extent - raw_offset
        };
        if !self.align_at_zero_offset && size_bits % S::BITS != 0 && base_offset == 0 {
            offset + S::BITS - size_bits % S::BITS
        } else {
            offset + base_offset
        }
    }

    /// Resolve a field's offset relative to a containing format whose
    /// origin is at `base_offset`.
    pub fn field_offset_from(&self, fmt: &Format, name: &str, base_offset: usize) -> usize {
        let (raw_offset, width) = fmt.raw_field(name);
        self.resolve_offset(fmt.size_bits(), raw_offset, width, base_offset)
    }

    pub fn field(&self, fmt: &Format, name: &str) -> FieldDesc {
        FieldDesc::new(self.field_offset(fmt, name), fmt.width_of(name))
    }

    pub fn field_from(&self, fmt: &Format, name: &str, base_offset: usize) -> FieldDesc {
        FieldDesc::new(
            self.field_offset_from(fmt, name, base_offset),
            fmt.width_of(name),
        )
    }

    /// The descriptor spanning two declared fields, from the lower of the
    /// two starts to the upper of the two ends.
    ///
    /// Used when a group of adjacent declared fields must be accessed
    /// atomically as one unit.
    pub fn concat(&self, fmt: &Format, a: &str, b: &str) -> FieldDesc {
        let da = self.field(fmt, a);
        let db = self.field(fmt, b);
        let offset = Ord::min(da.offset, db.offset);
        let end = Ord::max(da.end(), db.end());
        FieldDesc::new(offset, end - offset)
    }

    /// The storage offset of an embedded sub-format's origin within `fmt`.
    ///
    /// Fields declared in the sub-format can then be resolved against the
    /// outer storage array with
    /// [`field_offset_from`](Self::field_offset_from).
    pub fn base_offset(&self, fmt: &Format, group: &str) -> usize {
        self.base_offset_from(fmt, group, 0)
    }

    pub fn base_offset_from(&self, fmt: &Format, group: &str, derived_offset: usize) -> usize {
        let (raw_offset, size_bits) = fmt.raw_group(group);
        self.resolve_offset(fmt.size_bits(), raw_offset, size_bits, derived_offset)
    }

    /// The number of storage units needed to hold `fmt`.
    pub fn storage_units(&self, fmt: &Format) -> usize {
        (fmt.size_bits() + S::BITS - 1) / S::BITS
    }

    // Named-field conveniences.

    pub fn read_field<A: Storage<S>>(&self, acc: A, fmt: &Format, name: &str) -> V {
        self.read(acc, self.field(fmt, name))
    }

    pub fn write_field<A: StorageMut<S>>(
        &self,
        acc: A,
        fmt: &Format,
        name: &str,
        value: V,
    ) -> Result<(), FieldError> {
        self.write(acc, self.field(fmt, name), value)
    }

    pub fn zero_field<A: StorageMut<S>>(
        &self,
        acc: A,
        fmt: &Format,
        name: &str,
    ) -> Result<(), FieldError> {
        self.zero(acc, self.field(fmt, name))
    }
}

// The per-unit strategies backing the operations above. The write path
// never stores naively: every strategy combines its bits with the cleared
// or current unit contents so bits outside the field survive.

/// Replace the field bits with those of the carried value.
#[derive(Debug, Clone, Copy)]
pub struct Replace<V>(pub V);

impl<V, S> Modifier<S> for Replace<V>
where
    V: Word + CastableInto<S>,
    S: Word,
{
    #[inline(always)]
    fn apply<A: StorageMut<S>>(
        &self,
        acc: &mut A,
        storage_shift: usize,
        value_shift: usize,
        chunk_width: usize,
    ) {
        let chunk: S = (self.0 >> value_shift).cast() & mask::<S>(chunk_width);
        let old = engine::clear_chunk(acc, storage_shift, chunk_width);
        acc.write((chunk << storage_shift) | old);
    }
}

/// Clear the field bits.
#[derive(Debug, Clone, Copy)]
pub struct Zero;

impl<S: Word> Modifier<S> for Zero {
    #[inline(always)]
    fn apply<A: StorageMut<S>>(
        &self,
        acc: &mut A,
        storage_shift: usize,
        _value_shift: usize,
        chunk_width: usize,
    ) {
        let old = engine::clear_chunk(acc, storage_shift, chunk_width);
        acc.write(old);
    }
}

/// AND the carried value into the field bits.
#[derive(Debug, Clone, Copy)]
pub struct And<V>(pub V);

impl<V, S> Modifier<S> for And<V>
where
    V: Word + CastableInto<S>,
    S: Word,
{
    #[inline(always)]
    fn apply<A: StorageMut<S>>(
        &self,
        acc: &mut A,
        storage_shift: usize,
        value_shift: usize,
        chunk_width: usize,
    ) {
        let chunk: S = (self.0 >> value_shift).cast() & mask::<S>(chunk_width);
        // Bits outside the field must stay one in the operand, so the
        // storage-level AND leaves them unchanged.
        let keep = !(mask::<S>(chunk_width) << storage_shift);
        let cur = acc.read();
        acc.write(cur & ((chunk << storage_shift) | keep));
    }
}

/// OR the carried value into the field bits. Zero outside the field is
/// the identity, so no masking of the old contents is needed.
#[derive(Debug, Clone, Copy)]
pub struct Or<V>(pub V);

impl<V, S> Modifier<S> for Or<V>
where
    V: Word + CastableInto<S>,
    S: Word,
{
    #[inline(always)]
    fn apply<A: StorageMut<S>>(
        &self,
        acc: &mut A,
        storage_shift: usize,
        value_shift: usize,
        chunk_width: usize,
    ) {
        let chunk: S = (self.0 >> value_shift).cast() & mask::<S>(chunk_width);
        let cur = acc.read();
        acc.write(cur | (chunk << storage_shift));
    }
}

/// XOR the carried value into the field bits.
#[derive(Debug, Clone, Copy)]
pub struct Xor<V>(pub V);

impl<V, S> Modifier<S> for Xor<V>
where
    V: Word + CastableInto<S>,
    S: Word,
{
    #[inline(always)]
    fn apply<A: StorageMut<S>>(
        &self,
        acc: &mut A,
        storage_shift: usize,
        value_shift: usize,
        chunk_width: usize,
    ) {
        let chunk: S = (self.0 >> value_shift).cast() & mask::<S>(chunk_width);
        let cur = acc.read();
        acc.write(cur ^ (chunk << storage_shift));
    }
}

/// Invert the field bits.
#[derive(Debug, Clone, Copy)]
pub struct Complement;

impl<S: Word> Modifier<S> for Complement {
    #[inline(always)]
    fn apply<A: StorageMut<S>>(
        &self,
        acc: &mut A,
        storage_shift: usize,
        _value_shift: usize,
        chunk_width: usize,
    ) {
        let m = mask::<S>(chunk_width) << storage_shift;
        let cur = acc.read();
        acc.write(cur ^ m);
    }
}
