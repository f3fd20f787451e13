//! Lock-scoped atomic mutation of a snapshot file.
//!
//! A `<snapshot>.lock` sidecar created with `create_new` is the single
//! cross-process serialization point. Inside the lock the snapshot is loaded
//! into a fresh [`Simulation`], the caller's mutation runs, and the snapshot
//! is rewritten only if the mutation succeeded and reported a change.

use crate::snapshot::{SnapshotError, read_state_or_empty, write_state_to_path};
use biosim_kernel::{IdentityAuthority, SettlementPolicy, Simulation};
use chrono::Utc;
use serde_json::json;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub fn state_lock_path(state_path: &Path) -> PathBuf {
    let mut path: OsString = state_path.as_os_str().to_os_string();
    path.push(".lock");
    PathBuf::from(path)
}

/// Failure to take the state lock.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("state {state_path} is locked by another process (remove {lock_path} if stale)")]
    Busy {
        state_path: String,
        lock_path: String,
    },

    #[error("cannot lock state {state_path}: {message}")]
    Io { state_path: String, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum AtomicStateMutationError<E> {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("{0}")]
    Mutation(E),
}

/// Execute one lock-scoped mutation against a snapshot path.
///
/// The mutator returns `(value, changed)`; `changed=true` persists the
/// state before the lock is released. A missing snapshot starts from empty
/// registries.
pub fn mutate_state_jsonl<A, T, E, F>(
    path: impl AsRef<Path>,
    authority: A,
    policy: SettlementPolicy,
    mutator: F,
) -> Result<T, AtomicStateMutationError<E>>
where
    A: IdentityAuthority,
    F: FnOnce(&mut Simulation<A>) -> Result<(T, bool), E>,
{
    let path = path.as_ref();
    let _lock = StateLock::acquire(path)?;

    let state = read_state_or_empty(path)?;
    let mut simulation = Simulation::with_state(authority, policy, state);
    let (value, changed) = mutator(&mut simulation).map_err(AtomicStateMutationError::Mutation)?;
    if changed {
        write_state_to_path(path, simulation.state())?;
        tracing::debug!(state = %path.display(), "state persisted");
    }
    Ok(value)
}

/// Held for the duration of one mutation; dropping it removes the sidecar.
struct StateLock {
    lock_path: PathBuf,
}

impl StateLock {
    fn acquire(state_path: &Path) -> Result<Self, LockError> {
        let lock_path = state_lock_path(state_path);
        let io_error = |e: std::io::Error| LockError::Io {
            state_path: state_path.display().to_string(),
            message: e.to_string(),
        };

        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::warn!(state = %state_path.display(), "state lock busy");
                return Err(LockError::Busy {
                    state_path: state_path.display().to_string(),
                    lock_path: lock_path.display().to_string(),
                });
            }
            Err(e) => return Err(io_error(e)),
        };

        // Owner stamp for diagnosing stale locks; the lock itself is the file.
        let owner = json!({ "pid": std::process::id(), "acquiredAt": Utc::now().to_rfc3339() });
        let _ = writeln!(file, "{owner}");
        Ok(Self { lock_path })
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}
