//! Codec layer — compression/decompression and CRC-32 over byte slices.
//!
//! # Identity rules
//! The on-disk `compression_type` byte is a closed set: `{None=0, Zstd=1}`.
//! `Auto=2` is accepted only at the API boundary (`Archive::add`) and is
//! always resolved to `None` or `Zstd` before a record is constructed — it
//! is never written to disk. Adding a third persisted codec is a breaking
//! format change, not a variant extension; see [`crate::layout::compression_type_from_raw`]
//! for the hard refusal of unknown on-disk bytes.

use std::io;

use crc32fast::Hasher;
use thiserror::Error;

/// Zstd level used by `add` and the streaming writer. Matches the reference
/// archive's default.
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Below this size, `Auto` never attempts compression — the framing
/// overhead of a Zstd frame dwarfs any possible saving.
const AUTO_MIN_SIZE: usize = 512;

/// `Auto` only keeps the compressed form if it is at least this much
/// smaller than the original. Ties (and anything not clearly smaller) fall
/// back to `None`, preferring `None` on an exact tie.
const AUTO_RATIO_THRESHOLD: f64 = 0.95;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
}

/// Compression variant requested by a caller. `Auto` only exists at this
/// layer — it never reaches disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionRequest {
    None,
    Zstd,
    Auto,
}

/// Compression variant actually stored for an entry. Closed set, matches
/// the on-disk byte values exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None = 0,
    Zstd = 1,
}

impl CompressionType {
    #[inline]
    pub fn as_raw(self) -> u8 {
        self as u8
    }
}

/// Resolve an `Auto` request by trial-compressing `data` and comparing
/// sizes against a deterministic heuristic:
///
/// - below [`AUTO_MIN_SIZE`] bytes: never compress.
/// - otherwise compress at [`DEFAULT_ZSTD_LEVEL`] and keep it only if the
///   result is smaller than `AUTO_RATIO_THRESHOLD * data.len()`.
/// - ties (compressed size exactly at the threshold or larger) resolve to
///   `None`.
///
/// Returns the resolved type and, when it chose `Zstd`, the already-computed
/// trial payload so the caller does not need to compress twice.
pub fn resolve_auto(data: &[u8]) -> Result<(CompressionType, Option<Vec<u8>>), CodecError> {
    if data.len() < AUTO_MIN_SIZE {
        return Ok((CompressionType::None, None));
    }
    let trial = zstd::encode_all(data, DEFAULT_ZSTD_LEVEL)
        .map_err(|e| CodecError::Compression(e.to_string()))?;
    let threshold = (data.len() as f64 * AUTO_RATIO_THRESHOLD) as usize;
    if trial.len() < threshold {
        Ok((CompressionType::Zstd, Some(trial)))
    } else {
        Ok((CompressionType::None, None))
    }
}

/// Compress `data` for on-disk storage under `compression`. `None` is a
/// verbatim passthrough; `Zstd` uses [`DEFAULT_ZSTD_LEVEL`].
pub fn compress(data: &[u8], compression: CompressionType) -> Result<Vec<u8>, CodecError> {
    match compression {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Zstd => zstd::encode_all(data, DEFAULT_ZSTD_LEVEL)
            .map_err(|e| CodecError::Compression(e.to_string())),
    }
}

/// Decompress `data` stored under `compression`, expecting exactly
/// `expected_len` bytes of output. Returns `Decompression` if the codec
/// errors or the produced length disagrees with `expected_len`.
pub fn decompress(
    data: &[u8],
    compression: CompressionType,
    expected_len: u64,
) -> Result<Vec<u8>, CodecError> {
    match compression {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Zstd => {
            let out = zstd::decode_all(data).map_err(|e| CodecError::Decompression(e.to_string()))?;
            if out.len() as u64 != expected_len {
                return Err(CodecError::Decompression(format!(
                    "decompressed {} bytes, expected {expected_len}",
                    out.len()
                )));
            }
            Ok(out)
        }
    }
}

/// CRC-32 of a single byte slice (used by `add`'s buffered write path).
pub fn crc32(data: &[u8]) -> u32 {
    let mut h = Hasher::new();
    h.update(data);
    h.finalize()
}

/// Incremental CRC-32, used by the streaming writer/reader so the checksum
/// can be folded in as bytes arrive rather than buffered up front.
#[derive(Default)]
pub struct RollingCrc32 {
    hasher: Hasher,
}

impl RollingCrc32 {
    pub fn new() -> Self {
        Self { hasher: Hasher::new() }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    pub fn finalize(self) -> u32 {
        self.hasher.finalize()
    }

    /// Peek the checksum of everything folded in so far without consuming
    /// the hasher, so a streaming reader can answer `verify_crc32` after
    /// drain while still holding the reader open.
    pub fn current(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}

/// A streaming Zstd encoder that accepts uncompressed chunks and emits
/// compressed bytes incrementally, flushing the frame trailer on
/// [`ZstdEncodeStream::finish`].
pub struct ZstdEncodeStream<'a> {
    encoder: zstd::stream::Encoder<'a, Vec<u8>>,
}

impl<'a> ZstdEncodeStream<'a> {
    pub fn new(level: i32) -> Result<Self, CodecError> {
        let encoder = zstd::stream::Encoder::new(Vec::new(), level)
            .map_err(|e| CodecError::Compression(e.to_string()))?;
        Ok(Self { encoder })
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), CodecError> {
        use std::io::Write;
        self.encoder
            .write_all(data)
            .map_err(|e| CodecError::Compression(e.to_string()))
    }

    /// Flush the frame trailer and return the complete compressed stream.
    pub fn finish(self) -> Result<Vec<u8>, CodecError> {
        self.encoder
            .finish()
            .map_err(|e| CodecError::Compression(e.to_string()))
    }
}

/// A streaming Zstd decoder that serves uncompressed bytes incrementally as
/// it pulls compressed bytes from `R`, so a reader never has to materialize
/// the whole decompressed payload up front — the decode-side counterpart of
/// [`ZstdEncodeStream`].
pub struct ZstdDecodeStream<R: io::Read> {
    decoder: zstd::stream::read::Decoder<'static, io::BufReader<R>>,
}

impl<R: io::Read> ZstdDecodeStream<R> {
    pub fn new(reader: R) -> Result<Self, CodecError> {
        let decoder = zstd::stream::read::Decoder::new(reader)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        Ok(Self { decoder })
    }
}

impl<R: io::Read> io::Read for ZstdDecodeStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder.read(buf)
    }
}
