//! Advisory file-locking discipline.
//!
//! Ported from the original C engine's direct `flock(2)` calls
//! (`LOCK_SH`/`LOCK_EX`/`LOCK_UN` around open/save/vacuum) onto the `fs2`
//! crate so the same whole-file advisory lock works on both Unix `flock`
//! and Windows `LockFileEx` without a `cfg`-gated fallback in every call
//! site.
//!
//! # Discipline
//! - `open`/`load`/`create` acquire a shared lock and hold it for the life
//!   of the handle.
//! - Any mutating operation (`save`, a streaming writer's `close`, `remove`
//!   only insofar as it's followed by `save`, `vacuum`) upgrades to
//!   exclusive for the duration of the mutating I/O, then downgrades back
//!   to shared.
//! - `close` releases the lock (dropping the file handle does this
//!   implicitly on all supported platforms, but we unlock explicitly so the
//!   release is visible at the call site it belongs to).

use std::fs::File;
use std::io;

use fs2::FileExt;

/// RAII guard that upgrades a shared lock to exclusive and restores the
/// shared lock on drop, even if the mutating operation returns early via
/// `?`.
pub struct ExclusiveGuard<'a> {
    file: &'a File,
}

impl<'a> ExclusiveGuard<'a> {
    pub fn acquire(file: &'a File) -> io::Result<Self> {
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        // Best-effort downgrade back to shared; nothing sensible to do with
        // an error here, and the file is about to be used read/write again
        // regardless.
        let _ = self.file.lock_shared();
    }
}

/// Acquire the archive's baseline shared lock (held for the handle's whole
/// lifetime once open/create/load succeeds).
pub fn acquire_shared(file: &File) -> io::Result<()> {
    file.lock_shared()
}

/// Release the advisory lock entirely. Called from `close`.
pub fn unlock(file: &File) -> io::Result<()> {
    file.unlock()
}

/// Non-blocking attempt to take the exclusive lock, for callers that want
/// to detect contention rather than block.
pub fn try_acquire_exclusive(file: &File) -> io::Result<bool> {
    match file.try_lock_exclusive() {
        Ok(()) => {
            // Immediately hand back to shared — this is a probe, not a hold.
            file.lock_shared()?;
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e),
    }
}
