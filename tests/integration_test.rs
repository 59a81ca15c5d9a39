use bindle::archive::Archive;
use bindle::codec::CompressionRequest;
use tempfile::NamedTempFile;

fn temp_path() -> std::path::PathBuf {
    let f = NamedTempFile::new().unwrap();
    let path = f.path().to_path_buf();
    drop(f);
    path
}

/// Scenario 1: plain add/save/reopen/read round trip.
#[test]
fn scenario_basic_round_trip() {
    let path = temp_path();
    {
        let mut ar = Archive::open(&path).unwrap();
        ar.add("a.txt", b"Hello", CompressionRequest::None).unwrap();
        ar.save().unwrap();
    }
    let mut ar = Archive::open(&path).unwrap();
    assert_eq!(ar.read("a.txt").unwrap(), b"Hello");
    assert_eq!(ar.length(), 1);
}

/// Scenario 2: Zstd compression shrinks a repetitive blob, and the stored
/// CRC matches the uncompressed bytes.
#[test]
fn scenario_zstd_compression_and_crc() {
    let path = temp_path();
    let data = b"1".repeat(20);
    {
        let mut ar = Archive::open(&path).unwrap();
        ar.add("x", &data, CompressionRequest::Zstd).unwrap();
        ar.save().unwrap();
    }
    let mut ar = Archive::open(&path).unwrap();
    let out = ar.read("x").unwrap();
    assert_eq!(out, data);
    assert_eq!(bindle::codec::crc32(&data), bindle::codec::crc32(&out));
}

/// Scenario 3: shadowing — re-adding a name keeps one entry with the
/// latest bytes.
#[test]
fn scenario_shadowing() {
    let path = temp_path();
    {
        let mut ar = Archive::open(&path).unwrap();
        ar.add("k", b"v1", CompressionRequest::None).unwrap();
        ar.add("k", b"v2", CompressionRequest::None).unwrap();
        ar.save().unwrap();
    }
    let mut ar = Archive::open(&path).unwrap();
    assert_eq!(ar.length(), 1);
    assert_eq!(ar.read("k").unwrap(), b"v2");
}

/// Scenario 4: remove + save drops visibility, vacuum reclaims disk space.
#[test]
fn scenario_remove_and_vacuum() {
    let path = temp_path();
    let mut ar = Archive::open(&path).unwrap();
    ar.add("f1", b"Data 1", CompressionRequest::None).unwrap();
    ar.add("f2", b"Data 2", CompressionRequest::None).unwrap();
    ar.save().unwrap();

    ar.remove("f1").unwrap();
    ar.save().unwrap();
    assert_eq!(ar.length(), 1);
    assert!(!ar.exists("f1"));
    assert!(ar.exists("f2"));

    let before = std::fs::metadata(&path).unwrap().len();
    ar.vacuum().unwrap();
    let after = std::fs::metadata(&path).unwrap().len();
    assert!(after <= before);
    assert_eq!(ar.read("f2").unwrap(), b"Data 2");
}

/// Scenario 5: streaming writer/reader round trip with CRC verification.
#[test]
fn scenario_streaming_writer_and_reader() {
    let path = temp_path();
    {
        let mut ar = Archive::open(&path).unwrap();
        {
            let mut w = ar.writer_new("s", CompressionRequest::None).unwrap();
            w.write(b"Streaming ").unwrap();
            w.write(b"from C!").unwrap();
            w.close().unwrap();
        }
        ar.save().unwrap();
    }

    let mut ar = Archive::open(&path).unwrap();
    let mut r = ar.reader_new("s").unwrap();
    let mut buf = [0u8; 256];
    let n = r.read(&mut buf);
    assert_eq!(&buf[..n], b"Streaming from C!");
    assert_eq!(r.read(&mut buf), 0, "a second read past EOF returns 0");
    assert!(r.verify_crc32());
}

/// Scenario 6: corruption detection — flipping a payload byte on disk
/// makes the streaming reader's CRC check fail.
#[test]
fn scenario_corruption_detection() {
    let path = temp_path();
    {
        let mut ar = Archive::open(&path).unwrap();
        ar.add("a.txt", b"Hello", CompressionRequest::None).unwrap();
        ar.save().unwrap();
    }

    // Flip one byte inside the payload region (offset 8, within "Hello").
    {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        f.seek(SeekFrom::Start(8)).unwrap();
        f.write_all(&[b'h' ^ 0xFF]).unwrap();
    }

    let mut ar = Archive::open(&path).unwrap();
    let mut r = ar.reader_new("a.txt").unwrap();
    let mut buf = [0u8; 16];
    loop {
        if r.read(&mut buf) == 0 {
            break;
        }
    }
    assert!(!r.verify_crc32());
}

/// Order is preserved across save and reopen regardless of insertion
/// order or later shadowing.
#[test]
fn order_preservation() {
    let path = temp_path();
    {
        let mut ar = Archive::open(&path).unwrap();
        ar.add("n1", b"1", CompressionRequest::None).unwrap();
        ar.add("n2", b"2", CompressionRequest::None).unwrap();
        ar.add("n3", b"3", CompressionRequest::None).unwrap();
        ar.save().unwrap();
    }
    let ar = Archive::open(&path).unwrap();
    let names: Vec<&str> = (0..ar.length()).map(|i| ar.entry_name(i as usize).unwrap()).collect();
    assert_eq!(names, vec!["n1", "n2", "n3"]);
}

/// read_uncompressed_direct refuses a compressed entry.
#[test]
fn read_uncompressed_direct_rejects_compressed_entries() {
    let path = temp_path();
    let mut ar = Archive::open(&path).unwrap();
    ar.add("z", &b"x".repeat(4096), CompressionRequest::Zstd).unwrap();
    ar.save().unwrap();
    assert!(ar.read_uncompressed_direct("z").is_err());
}

/// While one handle holds the exclusive lock, a second handle's attempt to
/// acquire exclusive observes contention rather than silently succeeding.
#[test]
fn exclusive_lock_blocks_concurrent_exclusive_acquire() {
    use bindle::lock::{try_acquire_exclusive, ExclusiveGuard};
    use std::fs::OpenOptions;

    let path = temp_path();
    // Seed the file so both handles open the same on-disk archive.
    Archive::open(&path).unwrap().save().unwrap();

    let first = OpenOptions::new().read(true).write(true).open(&path).unwrap();
    let second = OpenOptions::new().read(true).write(true).open(&path).unwrap();

    let guard = ExclusiveGuard::acquire(&first).unwrap();
    assert!(
        !try_acquire_exclusive(&second).unwrap(),
        "a second handle must observe contention while the first holds the exclusive lock"
    );
    drop(guard);

    assert!(
        try_acquire_exclusive(&second).unwrap(),
        "once the first handle releases, the second can take the exclusive lock"
    );
}
