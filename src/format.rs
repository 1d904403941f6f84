/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

/*!

Declarative layouts. A [`Format`] records which named fields live at which
raw bit positions, plus the positions of embedded sub-formats. It is built
once through a [`FormatBuilder`] and is storage-agnostic: the raw offsets
it stores are interpreted by the layout queries of
[`BitField`](crate::field::BitField), which apply the numbering direction
and alignment axes.

Sub-format fields are not merged into the containing format. A group entry
records only the origin and extent of the embedded format; its fields are
resolved against their own [`Format`] with the base-offset queries.

*/

use anyhow::{bail, Result};
use mem_dbg::{MemDbg, MemSize};
use std::collections::HashSet;

#[derive(Debug, Clone, MemDbg, MemSize)]
struct NamedField {
    name: String,
    offset: usize,
    width: usize,
}

#[derive(Debug, Clone, MemDbg, MemSize)]
struct NamedGroup {
    name: String,
    offset: usize,
    size_bits: usize,
}

/// A named-field layout. See the [module documentation](self).
#[derive(Debug, Clone, MemDbg, MemSize)]
pub struct Format {
    fields: Vec<NamedField>,
    groups: Vec<NamedGroup>,
    size_bits: usize,
}

impl Format {
    pub fn builder() -> FormatBuilder {
        FormatBuilder::default()
    }

    /// Total extent of the format in bits, padding included.
    pub fn size_bits(&self) -> usize {
        self.size_bits
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// The declared width of a named field.
    ///
    /// # Panics
    ///
    /// Panics if no field has the given name.
    pub fn width_of(&self, name: &str) -> usize {
        self.raw_field(name).1
    }

    /// The declared (raw, un-resolved) offset of a named field.
    ///
    /// # Panics
    ///
    /// Panics if no field has the given name.
    pub fn raw_offset_of(&self, name: &str) -> usize {
        self.raw_field(name).0
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub(crate) fn raw_field(&self, name: &str) -> (usize, usize) {
        match self.fields.iter().find(|f| f.name == name) {
            Some(f) => (f.offset, f.width),
            None => panic!("No field named {:?}", name),
        }
    }

    pub(crate) fn raw_group(&self, name: &str) -> (usize, usize) {
        match self.groups.iter().find(|g| g.name == name) {
            Some(g) => (g.offset, g.size_bits),
            None => panic!("No group named {:?}", name),
        }
    }
}

/// Builds a [`Format`] field by field.
///
/// The builder keeps a cursor that advances past each declared field, so
/// sequential layouts need no explicit offsets; [`field_at`] places a
/// field anywhere, overlapping earlier ones if desired, and pushes the
/// cursor past it when it extends the format.
///
/// [`field_at`]: FormatBuilder::field_at
#[derive(Debug, Clone, Default)]
pub struct FormatBuilder {
    fields: Vec<NamedField>,
    groups: Vec<NamedGroup>,
    cursor: usize,
    max_end: usize,
}

impl FormatBuilder {
    /// Declare a field of `width` bits at the cursor.
    pub fn field(mut self, name: impl Into<String>, width: usize) -> Self {
        self.fields.push(NamedField {
            name: name.into(),
            offset: self.cursor,
            width,
        });
        self.cursor += width;
        self.max_end = Ord::max(self.max_end, self.cursor);
        self
    }

    /// Declare a field at an explicit raw offset. Overlap with previously
    /// declared fields is allowed; unions of alternative layouts are built
    /// this way.
    pub fn field_at(mut self, name: impl Into<String>, offset: usize, width: usize) -> Self {
        self.fields.push(NamedField {
            name: name.into(),
            offset,
            width,
        });
        self.cursor = Ord::max(self.cursor, offset + width);
        self.max_end = Ord::max(self.max_end, offset + width);
        self
    }

    /// Skip `width` unnamed bits.
    pub fn pad(mut self, width: usize) -> Self {
        self.cursor += width;
        self.max_end = Ord::max(self.max_end, self.cursor);
        self
    }

    /// Embed a sub-format at the cursor. Only its origin and extent are
    /// recorded; its fields stay addressable through the sub-format
    /// itself.
    pub fn group(mut self, name: impl Into<String>, fmt: &Format) -> Self {
        self.groups.push(NamedGroup {
            name: name.into(),
            offset: self.cursor,
            size_bits: fmt.size_bits(),
        });
        self.cursor += fmt.size_bits();
        self.max_end = Ord::max(self.max_end, self.cursor);
        self
    }

    pub fn build(self) -> Result<Format> {
        let mut seen = HashSet::new();
        for name in self
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(self.groups.iter().map(|g| g.name.as_str()))
        {
            if !seen.insert(name) {
                bail!("duplicate field name {:?}", name);
            }
        }
        Ok(Format {
            fields: self.fields,
            groups: self.groups,
            size_bits: Ord::max(self.max_end, self.cursor),
        })
    }
}
