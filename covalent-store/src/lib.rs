//! Record store for covalent.
//!
//! The schema engine treats the replicated store as an external collaborator
//! and talks to it only through [`RecordStore`]: create a map, list or stream
//! record under an owner group, load a record by id, mutate it, manage
//! permission groups, and wait for durable persistence.
//!
//! [`MemoryStore`] is an in-process implementation. Its records are real
//! CRDTs from `covalent-crdt` and its groups enforce the same role rules a
//! networked store would, so everything above it can be exercised without
//! a sync transport.

mod error;
mod group;
mod memory;
mod record;
mod store;

pub use error::{StoreError, StoreResult};
pub use group::{effective_role, Group, Role};
pub use memory::MemoryStore;
pub use record::{MapRecord, Record, RecordBody, RecordHeader, RecordKind};
pub use store::RecordStore;
