//! Atomic Append Tests
//!
//! Files opened in append mode from several threads at once:
//! - Every write lands at end of file, whatever the stream position
//! - Records written concurrently never interleave
//! - The final length is the sum of all writes
//!
//! # Running Tests
//! ```bash
//! cargo test --test append_atomic
//! ```

use std::sync::{Arc, Barrier};
use std::thread;

use corvid_engine::nio::fd::{self, FileAccess, FileMode};
use corvid_engine::nio::{FileStream, Stream};

const RECORD_LEN: usize = 64;
const RECORDS_PER_WRITER: usize = 500;

fn record(tag: u8) -> Vec<u8> {
    let mut line = vec![tag; RECORD_LEN - 1];
    line.push(b'\n');
    line
}

// ===== Concurrent Writer Tests =====

#[test]
fn test_two_handles_never_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.log");
    let barrier = Arc::new(Barrier::new(2));

    let writers: Vec<_> = [b'A', b'B']
        .into_iter()
        .map(|tag| {
            let path = path.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                // each writer has its own handle, as two guest streams would
                let stream: FileStream = fd::open(&path, FileMode::Append, FileAccess::Write).unwrap();
                let line = record(tag);
                barrier.wait();
                for _ in 0..RECORDS_PER_WRITER {
                    assert_eq!(stream.write(&line).unwrap(), RECORD_LEN);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let contents = std::fs::read(&path).unwrap();
    assert_eq!(contents.len(), 2 * RECORDS_PER_WRITER * RECORD_LEN);

    let mut counts = [0usize; 2];
    for line in contents.chunks(RECORD_LEN) {
        let tag = line[0];
        assert!(tag == b'A' || tag == b'B', "unexpected byte {:#x}", tag);
        assert!(line[..RECORD_LEN - 1].iter().all(|&b| b == tag), "interleaved record");
        assert_eq!(line[RECORD_LEN - 1], b'\n');
        counts[(tag - b'A') as usize] += 1;
    }
    assert_eq!(counts, [RECORDS_PER_WRITER, RECORDS_PER_WRITER]);
}

#[test]
fn test_shared_handle_from_many_threads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.log");
    let stream = Arc::new(fd::open(&path, FileMode::Append, FileAccess::Write).unwrap());

    thread::scope(|scope| {
        for tag in [b'x', b'y', b'z'] {
            let stream = stream.clone();
            scope.spawn(move || {
                let line = record(tag);
                for _ in 0..100 {
                    stream.write(&line).unwrap();
                }
            });
        }
    });

    let contents = std::fs::read(&path).unwrap();
    assert_eq!(contents.len(), 3 * 100 * RECORD_LEN);
    for line in contents.chunks(RECORD_LEN) {
        assert!(line[..RECORD_LEN - 1].iter().all(|&b| b == line[0]));
    }
}

#[test]
fn test_large_appends_stay_whole() {
    const LARGE: usize = 1 << 20;
    const WRITES: usize = 4;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bulk.log");
    let stream = Arc::new(fd::open(&path, FileMode::Append, FileAccess::Write).unwrap());
    let barrier = Arc::new(Barrier::new(4));

    thread::scope(|scope| {
        for tag in [b'a', b'b', b'c', b'd'] {
            let stream = stream.clone();
            let barrier = barrier.clone();
            scope.spawn(move || {
                let block = vec![tag; LARGE];
                barrier.wait();
                for _ in 0..WRITES {
                    assert_eq!(stream.write(&block).unwrap(), LARGE);
                }
            });
        }
    });

    let contents = std::fs::read(&path).unwrap();
    assert_eq!(contents.len(), 4 * WRITES * LARGE);
    for block in contents.chunks(LARGE) {
        assert!(block.iter().all(|&b| b == block[0]), "block split by another writer");
    }
}

// ===== Positioning Tests =====

#[test]
fn test_append_ignores_seek() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("existing.log");
    std::fs::write(&path, b"head\n").unwrap();

    let stream = fd::open(&path, FileMode::Append, FileAccess::Write).unwrap();
    assert!(stream.is_append());
    stream.seek(0).unwrap();
    stream.write(b"tail\n").unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), b"head\ntail\n");
}

#[test]
fn test_append_creates_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh.log");

    let stream = fd::open(&path, FileMode::Append, FileAccess::Write).unwrap();
    stream.write(b"first\n").unwrap();
    assert_eq!(stream.len().unwrap(), 6);

    assert!(fd::open(&path, FileMode::Append, FileAccess::ReadWrite).is_err());
}
