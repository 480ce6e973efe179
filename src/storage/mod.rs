//! Optional persistence for beliefs and hypotheses.
//!
//! The trait defines the collaborator contract; the in-memory backend is the
//! reference implementation.

mod memory;
mod traits;

pub use memory::InMemoryRecordStore;
pub use traits::{RecordKind, RecordStore, StorageError};
