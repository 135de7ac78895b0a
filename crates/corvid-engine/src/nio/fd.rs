//! Opening files behind guest `FileDescriptor`s

use std::fs::OpenOptions;
use std::path::Path;

use corvid_sdk::{BridgeError, BridgeResult};

use super::stream::FileStream;

/// How an existing or missing file is treated on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Create; fail if it exists.
    CreateNew,
    /// Create, truncating an existing file.
    Create,
    /// Open; fail if missing.
    Open,
    /// Open, creating it if missing.
    OpenOrCreate,
    /// Open and truncate; fail if missing.
    Truncate,
    /// Open or create, every write landing at end of file.
    Append,
}

/// Requested access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccess {
    /// Read only
    Read,
    /// Write only
    Write,
    /// Read and write
    ReadWrite,
}

impl FileAccess {
    fn can_read(self) -> bool {
        matches!(self, FileAccess::Read | FileAccess::ReadWrite)
    }

    fn can_write(self) -> bool {
        matches!(self, FileAccess::Write | FileAccess::ReadWrite)
    }
}

fn options(mode: FileMode, access: FileAccess) -> BridgeResult<OpenOptions> {
    let mut options = OpenOptions::new();
    options.read(access.can_read()).write(access.can_write());
    match mode {
        FileMode::CreateNew => {
            options.create_new(true);
        }
        FileMode::Create => {
            options.create(true).truncate(true);
        }
        FileMode::Open => {}
        FileMode::OpenOrCreate => {
            options.create(true);
        }
        FileMode::Truncate => {
            options.truncate(true);
        }
        FileMode::Append => {
            if access.can_read() {
                return Err(BridgeError::io("Append access can be requested only in write-only mode."));
            }
            // O_APPEND / FILE_APPEND_DATA: the kernel positions each write at
            // end of file, so unbuffered writes are atomic
            options.append(true).create(true);
        }
    }
    Ok(options)
}

/// Open `path` as an unbuffered file stream.
///
/// Writes go straight to the OS in one call each, which is what makes
/// [`FileMode::Append`] atomic per write.
pub fn open(path: impl AsRef<Path>, mode: FileMode, access: FileAccess) -> BridgeResult<FileStream> {
    let path = path.as_ref();
    let file = options(mode, access)?
        .open(path)
        .map_err(|e| BridgeError::io_with(format!("{} ({})", path.display(), e), e))?;
    tracing::debug!(path = %path.display(), ?mode, ?access, "opened file");
    Ok(FileStream::new(file, path, mode == FileMode::Append))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nio::stream::Stream;

    #[test]
    fn test_create_new_fails_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        open(&path, FileMode::CreateNew, FileAccess::Write).unwrap();
        let err = open(&path, FileMode::CreateNew, FileAccess::Write).unwrap_err();
        assert!(err.os_error().is_some());
    }

    #[test]
    fn test_open_missing_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(open(dir.path().join("missing"), FileMode::Open, FileAccess::Read).is_err());
    }

    #[test]
    fn test_truncate_and_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.bin");
        std::fs::write(&path, b"0123456789").unwrap();
        let stream = open(&path, FileMode::Truncate, FileAccess::ReadWrite).unwrap();
        assert_eq!(stream.len().unwrap(), 0);
        stream.write(b"abc").unwrap();
        drop(stream);

        let stream = open(&path, FileMode::Create, FileAccess::Write).unwrap();
        assert_eq!(stream.len().unwrap(), 0);
    }

    #[test]
    fn test_append_positions_at_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, b"one\n").unwrap();
        let stream = open(&path, FileMode::Append, FileAccess::Write).unwrap();
        assert!(stream.is_append());
        stream.write(b"two\n").unwrap();
        assert!(stream.sync());
        assert_eq!(std::fs::read(&path).unwrap(), b"one\ntwo\n");
    }

    #[test]
    fn test_append_rejects_read_access() {
        let dir = tempfile::tempdir().unwrap();
        let err = open(dir.path().join("x"), FileMode::Append, FileAccess::ReadWrite).unwrap_err();
        assert!(matches!(err, BridgeError::Io { .. }));
    }
}
