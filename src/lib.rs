//! # bindle — single-file append-oriented archive format
//!
//! Format guarantees (frozen for format version 1):
//! - All numeric fields are little-endian; never negotiated.
//! - The file begins with the 8-byte magic `BINDL001` and nothing else in
//!   the header — no version byte, no UUID, no flags.
//! - The index lives immediately after the data region; the trailing
//!   16-byte footer records where it starts and how many entries it holds.
//! - Every payload and every index record starts on an 8-byte boundary.
//! - Compression is a closed tagged variant, `{None, Zstd}`; `Auto` exists
//!   only as an API-level request and is always resolved before a record is
//!   constructed.
//! - Shadowing (re-`add`ing a name) overwrites an entry's metadata in place
//!   without disturbing its position in iteration order.
//! - `vacuum` reclaims dead space via a temp file and an atomic rename —
//!   the live file is never truncated or rewritten in place.

pub mod archive;
pub mod codec;
pub mod entry;
pub mod error;
pub mod ffi;
pub mod layout;
pub mod lock;
pub mod stream;

// Flat re-exports for the most common types.
pub use archive::Archive;
pub use codec::{CompressionRequest, CompressionType};
pub use entry::Entry;
pub use error::{BindleError, Result};
pub use stream::{Reader, Writer};
