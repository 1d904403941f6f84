/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use bitspan::prelude::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use Op::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Adv(usize),
    Read,
    Write,
}

/// A backing accessor that records every operation instead of touching
/// memory. Reads return zero.
#[derive(Clone)]
struct Probe {
    ops: Rc<RefCell<Vec<Op>>>,
}

impl Probe {
    fn new() -> (Self, Rc<RefCell<Vec<Op>>>) {
        let ops = Rc::new(RefCell::new(Vec::new()));
        (Self { ops: ops.clone() }, ops)
    }
}

impl Storage<u16> for Probe {
    fn advance(&mut self, n: usize) {
        self.ops.borrow_mut().push(Adv(n));
    }

    fn read(&mut self) -> u16 {
        self.ops.borrow_mut().push(Read);
        0
    }
}

impl StorageMut<u16> for Probe {
    fn write(&mut self, _value: u16) {
        self.ops.borrow_mut().push(Write);
    }
}

#[test]
fn one_commit_per_dirty_unit() {
    let _ = env_logger::builder().is_test(true).try_init();
    let bf = BitField::<u32, u16>::new();

    // (field span, expected backing trace including the drop flush)
    let cases: &[(usize, usize, &[Op])] = &[
        (0, 1, &[Adv(0), Write]),
        (0, 16, &[Adv(0), Write]),
        (0, 17, &[Adv(0), Write, Adv(1), Write]),
        (1, 15, &[Adv(0), Write]),
        (1, 31, &[Adv(0), Write, Adv(1), Write]),
        (1, 33, &[Adv(0), Write, Adv(1), Write, Adv(2), Write]),
        (15, 2, &[Adv(0), Write, Adv(1), Write]),
        (15, 32, &[Adv(0), Write, Adv(1), Write, Adv(2), Write]),
    ];

    for &(offset, width, expected) in cases {
        let (probe, ops) = Probe::new();
        {
            let wb = WriteBuf::new(probe);
            bf.write(wb.accessor(), FieldDesc::new(offset, width), 0)
                .unwrap();
        }
        assert_eq!(
            *ops.borrow(),
            expected,
            "trace mismatch for offset {} width {}",
            offset,
            width
        );
    }
}

fn gapped_format() -> Format {
    Format::builder()
        .field("f1", 5)
        .field("f2", 15)
        .field("f3", 8)
        .field("f4", 18)
        .field("f5", 22)
        .field("f6", 4)
        .field("f7", 8)
        .build()
        .unwrap()
}

#[test]
fn skipped_units_are_not_committed() {
    let bf = BitField::<u32, u16>::new();
    let fmt = gapped_format();

    let (probe, ops) = Probe::new();
    {
        let wb = WriteBuf::new(probe);
        // f2 spans units 0-1, f4 units 1-2, f6 sits alone in unit 4.
        // Unit 3 is never written and never committed.
        bf.write_field(wb.accessor(), &fmt, "f2", 0).unwrap();
        bf.write_field(wb.accessor(), &fmt, "f4", 0).unwrap();
        bf.write_field(wb.accessor(), &fmt, "f6", 0).unwrap();
    }
    assert_eq!(
        *ops.borrow(),
        [Adv(0), Write, Adv(1), Write, Adv(2), Write, Adv(4), Write]
    );
}

#[test]
fn covered_span_limits_readback() {
    let bf = BitField::<u32, u16>::new();
    let fmt = gapped_format();

    // The sequence produces bits 5..72: unit 0 straddles the start and
    // unit 4 straddles the end, so only those two are fetched.
    let covered = bf.field_offset(&fmt, "f2")..bf.field_offset(&fmt, "f7");
    assert_eq!(covered, 5..72);

    let (probe, ops) = Probe::new();
    {
        let wb = WriteBuf::new(probe).covering(covered);
        bf.write_field(wb.accessor(), &fmt, "f2", 0).unwrap();
        bf.write_field(wb.accessor(), &fmt, "f4", 0).unwrap();
        bf.write_field(wb.accessor(), &fmt, "f6", 0).unwrap();
    }
    assert_eq!(
        *ops.borrow(),
        [
            Adv(0),
            Read,
            Adv(0),
            Write,
            Adv(1),
            Write,
            Adv(2),
            Write,
            Adv(4),
            Read,
            Adv(4),
            Write
        ]
    );
}

#[test]
fn backward_access_discards_and_reports() {
    let bf = BitField::<u32, u16>::new();
    let fmt = gapped_format();

    let seen = Cell::new((usize::MAX, usize::MAX));
    let (probe, ops) = Probe::new();
    {
        let wb = WriteBuf::with_hook(probe, |previous: usize, next: usize| {
            seen.set((previous, next));
        });
        bf.write_field(wb.accessor(), &fmt, "f4", 0).unwrap();
        bf.write_field(wb.accessor(), &fmt, "f2", 0).unwrap();
        // Unit 2 was dirty when the position jumped back to unit 0; it
        // is dropped, not flushed.
        assert_eq!(seen.get(), (2, 0));
    }
    assert_eq!(
        *ops.borrow(),
        [Adv(1), Write, Adv(0), Write, Adv(1), Write]
    );
}

fn wide_format() -> Format {
    Format::builder()
        .field("f1", 21)
        .field("f2", 15)
        .field("f3", 8)
        .field("f4", 18)
        .field("f5", 22)
        .field("f6", 4)
        .field("f7", 24)
        .build()
        .unwrap()
}

#[test]
fn explicit_flush_commits_once() {
    let bf = BitField::<u32, u16>::new();
    let fmt = wide_format();

    let (probe, ops) = Probe::new();
    {
        let wb = WriteBuf::new(probe);
        bf.write_field(wb.accessor(), &fmt, "f2", 0).unwrap();
        bf.write_field(wb.accessor(), &fmt, "f4", 0).unwrap();
        bf.write_field(wb.accessor(), &fmt, "f6", 0).unwrap();
        assert_eq!(
            *ops.borrow(),
            [Adv(1), Write, Adv(2), Write, Adv(3), Write]
        );

        wb.flush();
        assert_eq!(ops.borrow().len(), 8);
        // Flushing a clean unit is a no-op, and so is the drop flush.
        wb.flush();
        assert_eq!(ops.borrow().len(), 8);
    }
    assert_eq!(
        ops.borrow()[6..],
        [Adv(5), Write]
    );
}

#[test]
fn manual_flush_and_discard() {
    let bf = BitField::<u32, u16>::new();
    let fmt = wide_format();
    let covered = bf.field_offset(&fmt, "f2")..bf.field_offset(&fmt, "f7");
    assert_eq!(covered, 21..88);

    let (probe, ops) = Probe::new();
    {
        let wb = WriteBuf::new(probe).covering(covered.clone()).manual_flush();
        bf.write_field(wb.accessor(), &fmt, "f2", 0).unwrap();
        bf.write_field(wb.accessor(), &fmt, "f4", 0).unwrap();
        bf.write_field(wb.accessor(), &fmt, "f6", 0).unwrap();
        wb.flush();
    }
    assert_eq!(
        *ops.borrow(),
        [
            Adv(1),
            Read,
            Adv(1),
            Write,
            Adv(2),
            Write,
            Adv(3),
            Write,
            Adv(5),
            Read,
            Adv(5),
            Write
        ]
    );

    // Same sequence, abandoned instead of flushed: the last unit never
    // reaches the backing store.
    let (probe, ops) = Probe::new();
    {
        let wb = WriteBuf::new(probe).covering(covered).manual_flush();
        bf.write_field(wb.accessor(), &fmt, "f2", 0).unwrap();
        bf.write_field(wb.accessor(), &fmt, "f4", 0).unwrap();
        bf.write_field(wb.accessor(), &fmt, "f6", 0).unwrap();
        wb.discard();
    }
    assert_eq!(
        *ops.borrow(),
        [
            Adv(1),
            Read,
            Adv(1),
            Write,
            Adv(2),
            Write,
            Adv(3),
            Write,
            Adv(5),
            Read
        ]
    );
}

#[test]
fn buffered_writes_match_direct_writes() {
    let bf = BitField::<u32, u16>::new();
    let fmt = gapped_format();
    let values: [(&str, u32); 7] = [
        ("f1", 0x15),
        ("f2", 0x4321),
        ("f3", 0xa5),
        ("f4", 0x2_bcde),
        ("f5", 0x3f_0f0f),
        ("f6", 0x9),
        ("f7", 0x77),
    ];

    // Every bit of the five units belongs to some field, so writing the
    // whole format erases any previous contents.
    let mut direct = [0u16; 5];
    for (name, v) in values {
        bf.write_field(SliceWriter::new(&mut direct), &fmt, name, v)
            .unwrap();
    }

    let mut buffered = [0xffffu16; 5];
    {
        let wb = WriteBuf::new(SliceWriter::new(&mut buffered));
        for (name, v) in values {
            bf.write_field(wb.accessor(), &fmt, name, v).unwrap();
        }
    }
    assert_eq!(buffered, direct);
}

#[test]
fn covered_span_preserves_the_outside() {
    let bf = BitField::<u32, u16>::new();
    let fmt = gapped_format();

    let mut data = [0xffffu16; 5];
    {
        let wb = WriteBuf::new(SliceWriter::new(&mut data)).covering(5..72);
        bf.write_field(wb.accessor(), &fmt, "f2", 0).unwrap();
        bf.write_field(wb.accessor(), &fmt, "f4", 0).unwrap();
        bf.write_field(wb.accessor(), &fmt, "f6", 0).unwrap();
    }
    // Bits below 5 and above 72 are read back and survive; unwritten
    // bits inside the span come out zero; unit 3 was never committed.
    assert_eq!(data, [0x001f, 0x0000, 0x0000, 0xffff, 0xff0f]);
}
