//! # biosim-store
//!
//! Persistence layer for registry state.
//!
//! This crate provides:
//! - `StateRecord` rows (one JSON object per line)
//! - JSONL snapshot read/write with temp-file + rename replacement
//! - `mutate_state_jsonl` (lock-scoped, all-or-nothing read-modify-write)
//! - `snapshot_ref` content addressing for a whole state
//!
//! ## Data model
//!
//! ```text
//! JSONL (on disk: counters line, then one line per entity)
//!     ↕  read_state / write_state
//! Registries (in-memory, owned by a Simulation)
//! ```

pub mod atomic_state;
pub mod record;
pub mod snapshot;

pub use atomic_state::{AtomicStateMutationError, LockError, mutate_state_jsonl, state_lock_path};
pub use record::{BalanceRow, Counters, OwnershipRow, STATE_SNAPSHOT_SCHEMA, StateRecord};
pub use snapshot::{
    STATE_SNAPSHOT_REF_PREFIX, SnapshotError, read_records, read_state_from_path,
    read_state_or_empty, records_to_state, snapshot_ref, state_to_records, write_records,
    write_state_to_path,
};
