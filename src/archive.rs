//! High-level [`Archive`] — the primary embedding surface.
//!
//! ```no_run
//! use bindle::archive::Archive;
//! use bindle::codec::CompressionRequest;
//!
//! let mut ar = Archive::open("out.bndl")?;
//! ar.add("readme.txt", b"Hello, world!", CompressionRequest::None)?;
//! ar.save()?;
//!
//! let data = ar.read("readme.txt")?;
//! assert_eq!(data, b"Hello, world!");
//! # Ok::<(), bindle::error::BindleError>(())
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::codec::{self, CompressionRequest, CompressionType};
use crate::entry::{Entry, EntryList};
use crate::error::{BindleError, Result};
use crate::layout::{self, EntryRaw, Footer, ALIGN, ENTRY_RAW_SIZE, FOOTER_SIZE, MAGIC};
use crate::lock::{self, ExclusiveGuard};

/// An open Bindle archive handle.
///
/// Owns the file handle, the path, the data-region high-water mark
/// (`data_end`), and the ordered entry list exclusively — no field is ever
/// exposed as a raw handle to callers. `file` is `None` only for the brief
/// window inside `vacuum` between closing the old handle and opening the
/// renamed one; every public method checks `poisoned` (which `vacuum` sets
/// if it can't restore that invariant) before touching it.
pub struct Archive {
    path: PathBuf,
    file: Option<File>,
    entries: EntryList,
    data_end: u64,
    /// Set once a `vacuum` fails after the temp file was already written —
    /// every subsequent mutating or reading call then refuses with
    /// `Poisoned` rather than touching mismatched on-disk state.
    poisoned: bool,
}

impl Archive {
    // ── Constructors ─────────────────────────────────────────────────────────

    /// Open an existing archive or create a new one at `path` if it does not
    /// exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).create(true).open(&path)?;
        Self::from_file(path, file)
    }

    /// Create a fresh archive at `path`, truncating any existing file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Self::from_file(path, file)
    }

    /// Open an archive that must already exist; fails with `Io` (not found)
    /// rather than silently creating one.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Self::from_file(path, file)
    }

    fn from_file(path: PathBuf, mut file: File) -> Result<Self> {
        lock::acquire_shared(&file)?;

        let file_size = file.metadata()?.len();
        if file_size == 0 {
            file.seek(SeekFrom::Start(0))?;
            file.write_all(MAGIC)?;
            file.flush()?;
            return Ok(Self {
                path,
                file: Some(file),
                entries: EntryList::new(),
                data_end: 8,
                poisoned: false,
            });
        }

        file.seek(SeekFrom::Start(0))?;
        let mut magic = [0u8; 8];
        file.read_exact(&mut magic).map_err(|_| BindleError::BadMagic {
            detail: "file is shorter than the 8-byte header".into(),
        })?;
        if &magic != MAGIC {
            return Err(BindleError::BadMagic { detail: "magic mismatch".into() });
        }

        if file_size < FOOTER_SIZE {
            return Err(BindleError::TruncatedFooter { size: file_size, needed: FOOTER_SIZE });
        }
        file.seek(SeekFrom::Start(file_size - FOOTER_SIZE))?;
        let footer = Footer::read(&mut file)?;

        file.seek(SeekFrom::Start(footer.index_offset))?;
        let mut entries = Vec::with_capacity(footer.entry_count as usize);
        for _ in 0..footer.entry_count {
            let raw = EntryRaw::read(&mut file).map_err(|_| BindleError::TruncatedIndex {
                expected: ENTRY_RAW_SIZE as u64,
                available: file_size.saturating_sub(file.stream_position().unwrap_or(file_size)),
            })?;
            let mut name_buf = vec![0u8; raw.name_len as usize];
            file.read_exact(&mut name_buf).map_err(|_| BindleError::TruncatedIndex {
                expected: raw.name_len as u64,
                available: file_size.saturating_sub(file.stream_position().unwrap_or(file_size)),
            })?;
            let name = String::from_utf8_lossy(&name_buf).into_owned();

            let consumed = ENTRY_RAW_SIZE as u64 + raw.name_len as u64;
            let skip = layout::align_up(consumed) - consumed;
            if skip > 0 {
                file.seek(SeekFrom::Current(skip as i64))?;
            }

            let compression_type = layout::compression_type_from_raw(raw.compression_type)?;
            entries.push(Entry {
                name,
                offset: raw.offset,
                compressed_size: raw.compressed_size,
                uncompressed_size: raw.uncompressed_size,
                crc32: raw.crc32,
                compression_type,
            });
        }

        Ok(Self {
            path,
            file: Some(file),
            entries: EntryList::from_entries(entries),
            data_end: footer.index_offset,
            poisoned: false,
        })
    }

    fn check_poisoned(&self) -> Result<()> {
        if self.poisoned {
            Err(BindleError::Poisoned)
        } else {
            Ok(())
        }
    }

    // ── Write path ───────────────────────────────────────────────────────────

    /// Buffered add/shadow. Resolves `Auto` per the deterministic heuristic
    /// in [`codec::resolve_auto`], compresses, writes the payload at
    /// `data_end`, pads to the next 8-byte boundary, and shadows or appends
    /// the entry. The on-disk index is not touched until [`Archive::save`].
    pub fn add(&mut self, name: &str, data: &[u8], compress: CompressionRequest) -> Result<()> {
        self.check_poisoned()?;
        if name.is_empty() {
            return Err(BindleError::NameTooLong { len: 0 });
        }
        if name.len() > u16::MAX as usize {
            return Err(BindleError::NameTooLong { len: name.len() });
        }

        let (compression_type, payload) = match compress {
            CompressionRequest::None => (CompressionType::None, data.to_vec()),
            CompressionRequest::Zstd => (
                CompressionType::Zstd,
                codec::compress(data, CompressionType::Zstd).map_err(|e| BindleError::CodecError(e.to_string()))?,
            ),
            CompressionRequest::Auto => {
                let (ty, trial) =
                    codec::resolve_auto(data).map_err(|e| BindleError::CodecError(e.to_string()))?;
                match ty {
                    CompressionType::None => (CompressionType::None, data.to_vec()),
                    CompressionType::Zstd => {
                        (CompressionType::Zstd, trial.expect("resolve_auto returns a trial buffer for Zstd"))
                    }
                }
            }
        };

        let crc = codec::crc32(data);

        let offset = self.data_end;
        let file = self.file.as_mut().expect("archive file handle present outside vacuum's rename window");
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&payload)?;
        let padded = layout::align_up(payload.len() as u64);
        write_zero_padding(file, padded - payload.len() as u64)?;
        self.data_end = offset + padded;

        self.entries.upsert(Entry {
            name: name.to_string(),
            offset,
            compressed_size: payload.len() as u64,
            uncompressed_size: data.len() as u64,
            crc32: crc,
            compression_type,
        });

        Ok(())
    }

    // ── Read path ────────────────────────────────────────────────────────────

    /// Random-access read of a whole entry, decompressing as needed.
    pub fn read(&mut self, name: &str) -> Result<Vec<u8>> {
        self.check_poisoned()?;
        let entry = self
            .entries
            .find(name)
            .ok_or_else(|| BindleError::NotFound { name: name.to_string() })?
            .clone();

        let file = self.file.as_mut().expect("archive file handle present outside vacuum's rename window");
        file.seek(SeekFrom::Start(entry.offset))?;
        let mut buf = vec![0u8; entry.compressed_size as usize];
        file.read_exact(&mut buf)?;

        codec::decompress(&buf, entry.compression_type, entry.uncompressed_size)
            .map_err(|e| BindleError::DecodeError(e.to_string()))
    }

    /// Read an entry's bytes directly, without a decompression pass. Fails
    /// if the entry is stored compressed.
    pub fn read_uncompressed_direct(&mut self, name: &str) -> Result<Vec<u8>> {
        self.check_poisoned()?;
        let entry = self
            .entries
            .find(name)
            .ok_or_else(|| BindleError::NotFound { name: name.to_string() })?
            .clone();

        if entry.compression_type != CompressionType::None {
            return Err(BindleError::CodecError(format!(
                "entry '{name}' is compressed; use read() instead"
            )));
        }

        let file = self.file.as_mut().expect("archive file handle present outside vacuum's rename window");
        file.seek(SeekFrom::Start(entry.offset))?;
        let mut buf = vec![0u8; entry.compressed_size as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.entries.contains(name)
    }

    pub fn length(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn entry_name(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.name.as_str())
    }

    /// Remove the entry from the in-memory list. The payload stays in the
    /// data region as dead space until `vacuum`. Lost on `close` unless
    /// followed by `save`.
    pub fn remove(&mut self, name: &str) -> Result<bool> {
        self.check_poisoned()?;
        Ok(self.entries.remove(name))
    }

    // ── Persistence ──────────────────────────────────────────────────────────

    /// Serialize the index and footer at the current data tail, then
    /// truncate the file so no stale trailing footer from an earlier,
    /// larger save remains discoverable.
    pub fn save(&mut self) -> Result<()> {
        self.check_poisoned()?;
        let file = self.file.as_mut().expect("archive file handle present outside vacuum's rename window");
        let guard = ExclusiveGuard::acquire(file)?;

        let index_start = self.data_end;
        file.seek(SeekFrom::Start(index_start))?;
        write_index(&mut *file, &self.entries)?;
        write_footer(&mut *file, index_start, self.entries.len() as u64)?;
        file.flush()?;

        let end = file.stream_position()?;
        file.set_len(end)?;

        drop(guard);
        Ok(())
    }

    /// Crash-safe compaction: rewrite every live entry's payload into a
    /// fresh `<path>.tmp` file, then atomically rename it over `path`.
    /// Reclaims dead space left behind by shadowed or removed entries.
    pub fn vacuum(&mut self) -> Result<()> {
        self.check_poisoned()?;

        let tmp_path = tmp_path_for(&self.path);
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(MAGIC)?;
        let mut cur: u64 = 8;

        let file = self.file.as_mut().expect("archive file handle present outside vacuum's rename window");
        let mut new_entries = Vec::with_capacity(self.entries.len());
        for entry in self.entries.iter() {
            let mut buf = vec![0u8; entry.compressed_size as usize];
            file.seek(SeekFrom::Start(entry.offset))?;
            file.read_exact(&mut buf)?;

            tmp.seek(SeekFrom::Start(cur))?;
            tmp.write_all(&buf)?;
            let padded = layout::align_up(buf.len() as u64);
            write_zero_padding(&mut tmp, padded - buf.len() as u64)?;

            new_entries.push(Entry { offset: cur, ..entry.clone() });
            cur += padded;
        }
        let new_entries = EntryList::from_entries(new_entries);

        let index_start = cur;
        let write_result = write_index(&mut tmp, &new_entries).and_then(|_| {
            write_footer(&mut tmp, index_start, new_entries.len() as u64)?;
            tmp.flush()?;
            tmp.sync_all()
        });
        if let Err(e) = write_result {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(BindleError::VacuumFailed { detail: e.to_string() });
        }
        drop(tmp);

        // Unlock and close the original handle before the rename: an atomic
        // rename over a still-open handle is not guaranteed portable
        // (Windows rejects renaming a file with open handles by default).
        let old_file = self.file.take().expect("archive file handle present outside vacuum's rename window");
        lock::unlock(&old_file)?;
        drop(old_file);

        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            // The live file is still intact, so reopening it restores a
            // readable handle, but our in-memory offsets already describe
            // the compacted layout the rename never produced — the handle
            // is poisoned regardless of whether the reopen below succeeds.
            if let Ok(reopened) = OpenOptions::new().read(true).write(true).open(&self.path) {
                self.file = Some(reopened);
            }
            self.poisoned = true;
            return Err(BindleError::VacuumFailed { detail: e.to_string() });
        }

        let new_file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        lock::acquire_shared(&new_file)?;

        self.file = Some(new_file);
        self.entries = new_entries;
        self.data_end = index_start;
        Ok(())
    }

    // ── Streaming ────────────────────────────────────────────────────────────

    /// Open an incremental writer for `name`. Borrows the archive
    /// exclusively until the writer is closed or dropped.
    pub fn writer_new(&mut self, name: &str, compress: CompressionRequest) -> Result<crate::stream::Writer<'_>> {
        self.check_poisoned()?;
        crate::stream::Writer::new(self, name, compress)
    }

    /// Open an incremental reader for `name`.
    pub fn reader_new(&mut self, name: &str) -> Result<crate::stream::Reader<'_>> {
        self.check_poisoned()?;
        crate::stream::Reader::new(self, name)
    }

    // ── Close ────────────────────────────────────────────────────────────────

    /// Release the advisory lock and drop the handle. Does not implicitly
    /// save — mutations since the last `save` are lost.
    pub fn close(self) -> Result<()> {
        if let Some(file) = self.file.as_ref() {
            lock::unlock(file)?;
        }
        Ok(())
    }

    // ── Internal accessors used by the streaming writer/reader ──────────────

    pub(crate) fn file_mut(&mut self) -> &mut File {
        self.file.as_mut().expect("archive file handle present outside vacuum's rename window")
    }

    pub(crate) fn data_end(&self) -> u64 {
        self.data_end
    }

    pub(crate) fn set_data_end(&mut self, value: u64) {
        self.data_end = value;
    }

    pub(crate) fn entries_mut(&mut self) -> &mut EntryList {
        &mut self.entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }
}

// ── Shared helpers (used by `save`, `vacuum`, and the streaming writer) ─────

pub(crate) fn write_zero_padding<W: Write>(mut w: W, count: u64) -> io::Result<()> {
    if count == 0 {
        return Ok(());
    }
    let zeros = [0u8; ALIGN as usize];
    w.write_all(&zeros[..count as usize])
}

pub(crate) fn write_index<W: Write + Seek>(mut w: W, entries: &EntryList) -> io::Result<()> {
    for entry in entries.iter() {
        let name_bytes = entry.name.as_bytes();
        let raw = EntryRaw {
            offset: entry.offset,
            compressed_size: entry.compressed_size,
            uncompressed_size: entry.uncompressed_size,
            crc32: entry.crc32,
            name_len: name_bytes.len() as u16,
            compression_type: entry.compression_type.as_raw(),
            reserved: 0,
        };
        raw.write(&mut w)?;
        w.write_all(name_bytes)?;
        let consumed = ENTRY_RAW_SIZE as u64 + name_bytes.len() as u64;
        let pad = layout::align_up(consumed) - consumed;
        write_zero_padding(&mut w, pad)?;
    }
    Ok(())
}

pub(crate) fn write_footer<W: Write>(mut w: W, index_offset: u64, entry_count: u64) -> io::Result<()> {
    Footer { index_offset, entry_count }.write(&mut w)
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}
