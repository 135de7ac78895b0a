//! Host streams and sockets carried by guest file descriptors

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use crate::platform::RawHandle;

/// A host stream as seen by the file natives.
///
/// Operations on a closed stream fail with `io::ErrorKind::NotConnected`;
/// seeking a non-seekable stream fails with `io::ErrorKind::Unsupported`.
pub trait Stream: Send + Sync + fmt::Debug + 'static {
    /// Whether `seek`/`position` are meaningful.
    fn can_seek(&self) -> bool;

    /// Whether `close` has been called.
    fn is_closed(&self) -> bool;

    /// Current position.
    fn position(&self) -> io::Result<u64>;

    /// Move to an absolute position, returning it.
    fn seek(&self, position: u64) -> io::Result<u64>;

    /// Read into `buf`, returning the byte count (0 at end of stream).
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write `buf` completely, returning its length.
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Flush buffered data to the OS.
    fn flush(&self) -> io::Result<()>;

    /// Release the underlying resource. Idempotent.
    fn close(&self);

    /// The file behind this stream, if it is file-backed.
    fn as_file(&self) -> Option<&FileStream> {
        None
    }
}

/// Shared handle to a [`Stream`]; the payload of guest stream objects.
pub type StreamRef = Arc<dyn Stream>;

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "Stream closed.")
}

/// File-backed, seekable stream.
pub struct FileStream {
    file: RwLock<Option<File>>,
    path: PathBuf,
    append: bool,
    // held across a whole append so a short write cannot let another
    // writer's bytes in between
    append_lock: Mutex<()>,
}

impl FileStream {
    /// Wrap an open file.
    pub fn new(file: File, path: impl Into<PathBuf>, append: bool) -> Self {
        Self {
            file: RwLock::new(Some(file)),
            path: path.into(),
            append,
            append_lock: Mutex::new(()),
        }
    }

    /// Path the file was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether every write lands at end of file.
    pub fn is_append(&self) -> bool {
        self.append
    }

    /// Current file length.
    pub fn len(&self) -> io::Result<u64> {
        self.with_file(|f| Ok(f.metadata()?.len()))
    }

    /// Whether the file is empty.
    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Grow or truncate the file.
    pub fn set_len(&self, len: u64) -> io::Result<()> {
        self.with_file(|f| f.set_len(len))
    }

    /// Force written data to stable storage; `true` on success.
    pub fn sync(&self) -> bool {
        match self.with_file(|f| f.sync_all()) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "fsync failed");
                false
            }
        }
    }

    /// Pin the OS handle for the duration of a native call. The stream
    /// cannot be closed while the returned guard is alive.
    pub fn pin_handle(&self) -> io::Result<PinnedHandle<'_>> {
        let guard = self.file.read();
        let raw = match guard.as_ref() {
            Some(file) => raw_file_handle(file),
            None => return Err(closed()),
        };
        Ok(PinnedHandle { _guard: guard, raw })
    }

    fn with_file<R>(&self, f: impl FnOnce(&File) -> io::Result<R>) -> io::Result<R> {
        let guard = self.file.read();
        match guard.as_ref() {
            Some(file) => f(file),
            None => Err(closed()),
        }
    }
}

impl Stream for FileStream {
    fn can_seek(&self) -> bool {
        !self.is_closed()
    }

    fn is_closed(&self) -> bool {
        self.file.read().is_none()
    }

    fn position(&self) -> io::Result<u64> {
        self.with_file(|mut f| f.stream_position())
    }

    fn seek(&self, position: u64) -> io::Result<u64> {
        self.with_file(|mut f| f.seek(SeekFrom::Start(position)))
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.with_file(|mut f| f.read(buf))
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let _append = self.append.then(|| self.append_lock.lock());
        self.with_file(|mut f| f.write_all(buf).map(|()| buf.len()))
    }

    fn flush(&self) -> io::Result<()> {
        self.with_file(|mut f| f.flush())
    }

    fn close(&self) {
        self.file.write().take();
    }

    fn as_file(&self) -> Option<&FileStream> {
        Some(self)
    }
}

impl fmt::Debug for FileStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStream")
            .field("path", &self.path)
            .field("append", &self.append)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// An OS file handle held open for the lifetime of the guard.
pub struct PinnedHandle<'a> {
    _guard: RwLockReadGuard<'a, Option<File>>,
    raw: RawHandle,
}

impl PinnedHandle<'_> {
    /// The pinned handle.
    pub fn raw(&self) -> RawHandle {
        self.raw
    }
}

#[cfg(unix)]
fn raw_file_handle(file: &File) -> RawHandle {
    use std::os::unix::io::AsRawFd;
    file.as_raw_fd() as RawHandle
}

#[cfg(windows)]
fn raw_file_handle(file: &File) -> RawHandle {
    use std::os::windows::io::AsRawHandle;
    file.as_raw_handle() as RawHandle
}

#[cfg(not(any(unix, windows)))]
fn raw_file_handle(_file: &File) -> RawHandle {
    -1
}

/// In-memory byte pipe: readable, writable, never seekable, never file-backed.
#[derive(Debug, Default)]
pub struct PipeStream {
    buffer: Mutex<VecDeque<u8>>,
    closed: AtomicBool,
}

impl PipeStream {
    /// An empty open pipe.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes waiting to be read.
    pub fn available(&self) -> usize {
        self.buffer.lock().len()
    }
}

impl Stream for PipeStream {
    fn can_seek(&self) -> bool {
        false
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn position(&self) -> io::Result<u64> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "pipe has no position"))
    }

    fn seek(&self, _position: u64) -> io::Result<u64> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "pipe is not seekable"))
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.is_closed() {
            return Err(closed());
        }
        let mut buffer = self.buffer.lock();
        let n = buf.len().min(buffer.len());
        for (dst, src) in buf.iter_mut().zip(buffer.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        if self.is_closed() {
            return Err(closed());
        }
        self.buffer.lock().extend(buf.iter().copied());
        Ok(buf.len())
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.buffer.lock().clear();
    }
}

/// Socket carried by a guest file descriptor. May be unresolved (never
/// connected, or already closed), in which case it has no native handle.
#[derive(Debug, Default)]
pub struct SocketHandle {
    stream: Mutex<Option<TcpStream>>,
}

impl SocketHandle {
    /// Wrap a connected socket.
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream: Mutex::new(Some(stream)),
        }
    }

    /// A socket with no native handle.
    pub fn unresolved() -> Self {
        Self::default()
    }

    /// Native socket handle, if resolvable.
    pub fn native_handle(&self) -> Option<RawHandle> {
        self.stream.lock().as_ref().map(raw_socket_handle)
    }

    /// Drop the native socket.
    pub fn close(&self) {
        self.stream.lock().take();
    }
}

#[cfg(unix)]
fn raw_socket_handle(stream: &TcpStream) -> RawHandle {
    use std::os::unix::io::AsRawFd;
    stream.as_raw_fd() as RawHandle
}

#[cfg(windows)]
fn raw_socket_handle(stream: &TcpStream) -> RawHandle {
    use std::os::windows::io::AsRawSocket;
    stream.as_raw_socket() as RawHandle
}

#[cfg(not(any(unix, windows)))]
fn raw_socket_handle(_stream: &TcpStream) -> RawHandle {
    -1
}
