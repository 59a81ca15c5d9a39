//! Streaming writer and reader — the incremental counterparts of
//! [`crate::archive::Archive::add`] and [`crate::archive::Archive::read`].
//!
//! A writer owns its archive exclusively for its lifetime and flushes a
//! single self-describing record on close; a reader resolves an entry's
//! metadata once up front and then serves bytes incrementally. There is
//! exactly one payload per writer session — no chunk splitting, no
//! deduplication, a single Zstd frame per entry rather than a
//! block-per-chunk stream.

use std::io::{Cursor, Read as _, Seek, SeekFrom, Write};

use crate::archive::{write_zero_padding, Archive};
use crate::codec::{self, CompressionRequest, CompressionType, RollingCrc32, ZstdDecodeStream, ZstdEncodeStream};
use crate::entry::Entry;
use crate::error::{BindleError, Result};
use crate::layout;

/// Incremental writer for a single named entry. Borrows its archive
/// exclusively; no other operation may run on the archive until
/// [`Writer::close`] (or the writer is dropped) releases the borrow.
pub struct Writer<'a> {
    archive: &'a mut Archive,
    name: String,
    start_offset: u64,
    compression_type: CompressionType,
    crc: RollingCrc32,
    uncompressed_len: u64,
    sink: WriterSink,
}

enum WriterSink {
    None(Vec<u8>),
    Zstd(ZstdEncodeStream<'static>),
}

impl<'a> Writer<'a> {
    pub(crate) fn new(archive: &'a mut Archive, name: &str, compress: CompressionRequest) -> Result<Self> {
        if name.is_empty() {
            return Err(BindleError::NameTooLong { len: 0 });
        }
        if name.len() > u16::MAX as usize {
            return Err(BindleError::NameTooLong { len: name.len() });
        }

        // A streaming writer never sees the whole blob up front, so the
        // size/ratio `Auto` heuristic (which needs a complete trial
        // compression) cannot run here — `Auto` resolves to `Zstd` eagerly
        // for the streaming path.
        let compression_type = match compress {
            CompressionRequest::None => CompressionType::None,
            CompressionRequest::Zstd | CompressionRequest::Auto => CompressionType::Zstd,
        };

        let sink = match compression_type {
            CompressionType::None => WriterSink::None(Vec::new()),
            CompressionType::Zstd => WriterSink::Zstd(
                ZstdEncodeStream::new(codec::DEFAULT_ZSTD_LEVEL)
                    .map_err(|e| BindleError::CodecError(e.to_string()))?,
            ),
        };

        let start_offset = archive.data_end();
        Ok(Self {
            archive,
            name: name.to_string(),
            start_offset,
            compression_type,
            crc: RollingCrc32::new(),
            uncompressed_len: 0,
            sink,
        })
    }

    /// Feed `buf` into the stream. CRC is folded over the *uncompressed*
    /// bytes as they arrive.
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.crc.update(buf);
        self.uncompressed_len += buf.len() as u64;
        match &mut self.sink {
            WriterSink::None(acc) => acc.extend_from_slice(buf),
            WriterSink::Zstd(enc) => enc.write(buf).map_err(|e| BindleError::CodecError(e.to_string()))?,
        }
        Ok(())
    }

    /// Flush the codec trailer, pad to the next 8-byte boundary, and shadow
    /// -resolve the entry against the archive's list. A failure here leaves
    /// `data_end` unchanged; the partially written bytes become dead space.
    pub fn close(self) -> Result<()> {
        let Writer { archive, name, start_offset, compression_type, crc, uncompressed_len, sink } = self;

        let payload = match sink {
            WriterSink::None(acc) => acc,
            WriterSink::Zstd(enc) => enc.finish().map_err(|e| BindleError::CodecError(e.to_string()))?,
        };
        let crc32 = crc.finalize();

        archive.file_mut().seek(SeekFrom::Start(start_offset))?;
        archive.file_mut().write_all(&payload)?;
        let padded = layout::align_up(payload.len() as u64);
        write_zero_padding(archive.file_mut(), padded - payload.len() as u64)?;
        archive.set_data_end(start_offset + padded);

        archive.entries_mut().upsert(Entry {
            name,
            offset: start_offset,
            compressed_size: payload.len() as u64,
            uncompressed_size: uncompressed_len,
            crc32,
            compression_type,
        });

        Ok(())
    }
}

/// Incremental reader for a single named entry. The *compressed* bytes are
/// read off disk once, up front, but decompression runs incrementally
/// through [`ZstdDecodeStream`] as the caller drains `read` — the
/// uncompressed payload is never materialized in full, which is the reason
/// a streaming reader exists instead of just calling [`Archive::read`].
pub struct Reader<'a> {
    _archive: &'a mut Archive,
    source: ReaderSource,
    remaining: u64,
    crc: RollingCrc32,
    stored_crc: u32,
    drained: bool,
}

enum ReaderSource {
    None(Cursor<Vec<u8>>),
    Zstd(ZstdDecodeStream<Cursor<Vec<u8>>>),
}

impl<'a> Reader<'a> {
    pub(crate) fn new(archive: &'a mut Archive, name: &str) -> Result<Self> {
        let entry = archive
            .entries_mut()
            .find(name)
            .ok_or_else(|| BindleError::NotFound { name: name.to_string() })?
            .clone();

        archive.file_mut().seek(SeekFrom::Start(entry.offset))?;
        let mut stored = vec![0u8; entry.compressed_size as usize];
        archive.file_mut().read_exact(&mut stored)?;

        let source = match entry.compression_type {
            CompressionType::None => ReaderSource::None(Cursor::new(stored)),
            CompressionType::Zstd => ReaderSource::Zstd(
                ZstdDecodeStream::new(Cursor::new(stored)).map_err(|e| BindleError::DecodeError(e.to_string()))?,
            ),
        };

        Ok(Self {
            _archive: archive,
            source,
            remaining: entry.uncompressed_size,
            crc: RollingCrc32::new(),
            stored_crc: entry.crc32,
            drained: entry.uncompressed_size == 0,
        })
    }

    /// Fill up to `buf.len()` bytes of uncompressed output; returns the
    /// number of bytes produced, 0 at end of stream. A decode error is
    /// reported as an early EOF — `verify_crc32` then fails because the
    /// folded checksum covers fewer bytes than `stored_crc` was computed
    /// over.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        if self.remaining == 0 {
            self.drained = true;
            return 0;
        }
        let cap = (buf.len() as u64).min(self.remaining) as usize;
        let n = match &mut self.source {
            ReaderSource::None(cur) => cur.read(&mut buf[..cap]),
            ReaderSource::Zstd(dec) => dec.read(&mut buf[..cap]),
        }
        .unwrap_or(0);

        self.crc.update(&buf[..n]);
        self.remaining -= n as u64;
        if n == 0 || self.remaining == 0 {
            self.drained = true;
        }
        n
    }

    /// Valid only after the stream is fully drained. A zero stored CRC
    /// (legacy entry written without one) always verifies true. Calling
    /// this before EOF is a contract violation and returns false.
    pub fn verify_crc32(&self) -> bool {
        if !self.drained {
            return false;
        }
        self.stored_crc == 0 || self.crc.current() == self.stored_crc
    }

    pub fn close(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::Archive;
    use tempfile::NamedTempFile;

    fn temp_path() -> std::path::PathBuf {
        let f = NamedTempFile::new().unwrap();
        let path = f.path().to_path_buf();
        drop(f);
        path
    }

    #[test]
    fn streaming_write_then_read_round_trips() {
        let path = temp_path();
        let mut ar = Archive::open(&path).unwrap();
        {
            let mut w = Writer::new(&mut ar, "s", CompressionRequest::None).unwrap();
            w.write(b"Streaming ").unwrap();
            w.write(b"from C!").unwrap();
            w.close().unwrap();
        }
        ar.save().unwrap();

        let mut r = Reader::new(&mut ar, "s").unwrap();
        let mut buf = [0u8; 256];
        let n = r.read(&mut buf);
        assert_eq!(&buf[..n], b"Streaming from C!");
        assert!(r.verify_crc32());
    }

    #[test]
    fn verify_crc32_is_false_before_drain() {
        let path = temp_path();
        let mut ar = Archive::open(&path).unwrap();
        {
            let mut w = Writer::new(&mut ar, "s", CompressionRequest::None).unwrap();
            w.write(b"0123456789").unwrap();
            w.close().unwrap();
        }
        ar.save().unwrap();

        let mut r = Reader::new(&mut ar, "s").unwrap();
        let mut small = [0u8; 4];
        r.read(&mut small);
        assert!(!r.verify_crc32(), "must not verify before full drain");
    }

    #[test]
    fn streaming_writer_with_zstd_round_trips() {
        let path = temp_path();
        let mut ar = Archive::open(&path).unwrap();
        let payload = b"x".repeat(4096);
        {
            let mut w = Writer::new(&mut ar, "z", CompressionRequest::Zstd).unwrap();
            for chunk in payload.chunks(513) {
                w.write(chunk).unwrap();
            }
            w.close().unwrap();
        }
        ar.save().unwrap();

        let mut r = Reader::new(&mut ar, "z").unwrap();
        let mut out = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = r.read(&mut buf);
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, payload);
        assert!(r.verify_crc32());
    }
}
