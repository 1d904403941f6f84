/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

/*!

Injection points for reacting to validation failures and out-of-order
storage access.

Both hooks default to doing nothing: failures are still reported to the
caller through return values (see [`FieldError`](crate::field::FieldError)),
so the hooks exist only for environments that want a side effect — a log
line, a diagnostic counter, or an abort — at the point of detection.

*/

/// Hooks invoked by [`BitField`](crate::field::BitField) when a requested
/// operation fails validation, before the operation is abandoned.
///
/// No storage access has happened when a hook runs.
pub trait ErrorPolicy<V> {
    /// The requested field width exceeds the bit width of the value type.
    fn field_too_wide(&self, _width: usize) {}

    /// The value to be stored does not fit in the field width.
    fn value_too_big(&self, _value: V, _width: usize) {}
}

/// The default [`ErrorPolicy`]: both hooks are no-ops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IgnoreErrors;

impl<V> ErrorPolicy<V> for IgnoreErrors {}

/// Hook invoked by [`WriteBuf`](crate::write_buf::WriteBuf) when a storage
/// unit with an address strictly smaller than the buffered one is accessed.
///
/// The buffer has already been reset when the hook runs, so the hook is
/// free to treat the condition as fatal.
pub trait Backwards {
    fn handle_backwards(&self, previous: usize, next: usize);
}

/// The default [`Backwards`] hook: does nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IgnoreBackwards;

impl Backwards for IgnoreBackwards {
    fn handle_backwards(&self, _previous: usize, _next: usize) {}
}

impl<F: Fn(usize, usize)> Backwards for F {
    fn handle_backwards(&self, previous: usize, next: usize) {
        self(previous, next)
    }
}
