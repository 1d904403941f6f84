/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

/*!

Capability traits consumed by the engine and the write-combining buffer:
[storage accessors](storage) and [error/backward-access policies](policy).

*/

pub mod policy;
pub mod storage;

pub mod prelude {
    pub use super::policy::*;
    pub use super::storage::*;
}
