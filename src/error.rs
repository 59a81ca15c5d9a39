//! Error taxonomy surfaced by every public operation.
//!
//! One variant per failure mode, with `#[from] io::Error` for passthrough,
//! collapsed into a single crate-wide type since the engine has one on-disk
//! format to reason about rather than several interchangeable codecs.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BindleError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Not a bindle archive: {detail}")]
    BadMagic { detail: String },

    #[error("Truncated index: expected {expected} bytes, archive has {available}")]
    TruncatedIndex { expected: u64, available: u64 },

    #[error("Truncated footer: file is only {size} bytes, footer needs {needed}")]
    TruncatedFooter { size: u64, needed: u64 },

    #[error("Entry not found: {name}")]
    NotFound { name: String },

    /// Reserved for strict modes that want `add` to refuse a duplicate name
    /// instead of shadowing it. `add` itself never returns this variant.
    #[error("Entry already exists: {name}")]
    Duplicate { name: String },

    #[error("Invalid entry name length: {len} bytes (must be 1..=65535)")]
    NameTooLong { len: usize },

    #[error("Compression failed: {0}")]
    CodecError(String),

    #[error("Decompression failed: {0}")]
    DecodeError(String),

    #[error("CRC32 mismatch for entry {name}: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch { name: String, expected: u32, actual: u32 },

    #[error("Vacuum failed and could not be rolled back: {detail} — archive handle is poisoned")]
    VacuumFailed { detail: String },

    #[error("Archive handle is poisoned by a previous failed vacuum")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, BindleError>;
