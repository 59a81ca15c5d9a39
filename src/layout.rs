//! On-disk binary layout — header, entry record, and footer.
//!
//! # On-disk layout (all fields little-endian)
//!
//! ```text
//! offset 0                 : magic "BINDL001"            (8 bytes)
//! offset 8 .. data_end     : payloads, each padded to 8
//! offset data_end .. F-16  : index (entry_count records)
//! offset F-16 .. F         : footer { index_offset:u64, entry_count:u64 }
//! ```
//!
//! Per-record layout (packed, little-endian), immediately followed by
//! `name_len` name bytes and zero padding up to the next 8-byte boundary:
//!
//! ```text
//! u64 offset
//! u64 compressed_size
//! u64 uncompressed_size
//! u32 crc32
//! u16 name_len
//! u8  compression_type   (0=None, 1=Zstd)
//! u8  reserved (=0)
//! ```
//!
//! # Endianness
//! Every numeric field is little-endian. This is frozen: a future format
//! revision that changes endianness would need a distinct magic.
//!
//! # Alignment
//! Every payload and every index record starts on an 8-byte boundary
//! (`align_up`). This keeps offsets cheap to validate and leaves room for a
//! future mmap-based reader that wants word-aligned payloads.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::codec::CompressionType;
use crate::error::BindleError;

/// Archive header magic. Frozen for the lifetime of format version 1.
pub const MAGIC: &[u8; 8] = b"BINDL001";

/// Byte alignment for payloads and index records.
pub const ALIGN: u64 = 8;

/// Fixed size of one [`EntryRaw`] record, not counting the variable-length
/// name that follows it.
pub const ENTRY_RAW_SIZE: usize = 32;

/// Fixed size of the trailing footer.
pub const FOOTER_SIZE: u64 = 16;

/// Round `n` up to the next multiple of `ALIGN`.
#[inline]
pub fn align_up(n: u64) -> u64 {
    (n + (ALIGN - 1)) & !(ALIGN - 1)
}

// ── EntryRaw ─────────────────────────────────────────────────────────────────

/// The fixed-size, packed portion of one index record — exactly the bytes
/// the format puts on disk before the entry's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRaw {
    pub offset: u64,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub name_len: u16,
    pub compression_type: u8,
    pub reserved: u8,
}

impl EntryRaw {
    pub fn write<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.offset)?;
        w.write_u64::<LittleEndian>(self.compressed_size)?;
        w.write_u64::<LittleEndian>(self.uncompressed_size)?;
        w.write_u32::<LittleEndian>(self.crc32)?;
        w.write_u16::<LittleEndian>(self.name_len)?;
        w.write_u8(self.compression_type)?;
        w.write_u8(self.reserved)
    }

    pub fn read<R: Read>(mut r: R) -> io::Result<Self> {
        Ok(Self {
            offset: r.read_u64::<LittleEndian>()?,
            compressed_size: r.read_u64::<LittleEndian>()?,
            uncompressed_size: r.read_u64::<LittleEndian>()?,
            crc32: r.read_u32::<LittleEndian>()?,
            name_len: r.read_u16::<LittleEndian>()?,
            compression_type: r.read_u8()?,
            reserved: r.read_u8()?,
        })
    }
}

/// Resolve a raw on-disk `compression_type` byte to the closed codec
/// variant. `Auto` (2) is an API-only request value and must never be
/// found on disk — its presence here means the file is corrupt or was
/// written by code that violated the format contract.
pub fn compression_type_from_raw(raw: u8) -> Result<CompressionType, BindleError> {
    match raw {
        0 => Ok(CompressionType::None),
        1 => Ok(CompressionType::Zstd),
        other => Err(BindleError::BadMagic {
            detail: format!("unknown on-disk compression_type byte {other}"),
        }),
    }
}

// ── Footer ───────────────────────────────────────────────────────────────────

/// The trailing 16 bytes: where the index starts, and how many records it
/// holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub index_offset: u64,
    pub entry_count: u64,
}

impl Footer {
    pub fn write<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.index_offset)?;
        w.write_u64::<LittleEndian>(self.entry_count)
    }

    pub fn read<R: Read>(mut r: R) -> io::Result<Self> {
        Ok(Self {
            index_offset: r.read_u64::<LittleEndian>()?,
            entry_count: r.read_u64::<LittleEndian>()?,
        })
    }
}
