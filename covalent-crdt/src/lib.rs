//! CRDTs backing covalent records.
//!
//! - [`LwwRegister<T>`]: one map field (last writer wins)
//! - [`Sequence<T>`]: list records (RGA ordering, tombstoned removals)
//! - [`Feed<T>`]: stream records (one append-only log per account)
//!
//! Every `merge` here is commutative, associative and idempotent, so
//! replicas converge whatever order they exchange state in.

mod feed;
mod lww_register;
mod sequence;

pub use feed::{Feed, FeedEntry};
pub use lww_register::{LwwRegister, Stamp};
pub use sequence::{ItemId, Sequence};
