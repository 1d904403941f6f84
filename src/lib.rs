/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

/*!

Generic access to arbitrarily wide, arbitrarily aligned bit fields packed
into arrays of fixed-width storage units, independently of the native
bit-field support of the compiler and of the bit-numbering convention of
the data.

The crate is built around a few small pieces:

- the [`Storage`](traits::storage::Storage) and
  [`StorageMut`](traits::storage::StorageMut) capability traits, which
  abstract the backing medium (plain memory, side-effecting memory-mapped
  registers, or anything that can read and write one storage unit at a
  time);
- the [`engine`] module, which extracts and injects bit fields spanning any
  number of storage units, in either
  [LSB-first or MSB-first](field::BitOrder) order, always preserving the
  bits outside the target field;
- the [`BitField`](field::BitField) façade, which bundles the engine
  operations ([`read`](field::BitField::read),
  [`write`](field::BitField::write), [`zero`](field::BitField::zero),
  bit-wise [`and`](field::BitField::and)/[`or`](field::BitField::or)/
  [`xor`](field::BitField::xor)/[`complement`](field::BitField::complement))
  with run-time validation and a pluggable
  [error policy](traits::policy::ErrorPolicy);
- the [`Format`](format::Format) declarative layout description, from which
  field offsets and widths are derived without manual bit arithmetic;
- the [`WriteBuf`](write_buf::WriteBuf) sequential write-combining buffer,
  which coalesces consecutive same-unit field writes into a single commit
  to the backing store.

Fields are identified by a [`FieldDesc`](field::FieldDesc), a plain
(offset, width) pair in bits; how the pair was obtained (by hand or through
a [`Format`](format::Format)) is irrelevant to the engine.

*/

pub mod engine;
pub mod field;
pub mod format;
pub mod traits;
pub mod write_buf;

pub mod prelude {
    pub use crate::engine::mask;
    pub use crate::engine::Modifier;
    pub use crate::field::*;
    pub use crate::format::*;
    pub use crate::traits::policy::*;
    pub use crate::traits::storage::*;
    pub use crate::write_buf::*;
}
