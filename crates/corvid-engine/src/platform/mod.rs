//! Platform capability interface
//!
//! Everything OS-specific the interop layer needs sits behind [`Platform`]:
//! dynamic library loading, symbol lookup, file mapping, the allocation
//! granularity query and kernel-assisted file transfer. One backend exists
//! per supported OS family:
//!
//! - **Unix** (Linux, Android, macOS, iOS, BSD): `dlopen`, `mmap`,
//!   `posix_fadvise`, `sysconf`, `sendfile`
//! - **Windows**: `LoadLibraryW`, `CreateFileMappingW`/`MapViewOfFile`,
//!   `GetSystemInfo`, `TransmitFile`
//! - anything else: [`UnsupportedPlatform`], which fails every call
//!
//! Callers normally go through [`current()`]; tests substitute their own
//! implementation.

use std::ffi::c_void;
use std::fmt;
use std::io;
use std::ptr::NonNull;
use std::sync::Arc;

use corvid_sdk::{BridgeResult, IoStatus, LoadError, MapMode};
use once_cell::sync::Lazy;

use crate::defaults::TRANSMIT_PACKET_SIZE;

#[cfg(unix)]
mod unix;
mod unsupported;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::UnixPlatform;
pub use unsupported::UnsupportedPlatform;
#[cfg(windows)]
pub use windows::WindowsPlatform;

/// An OS file descriptor, `HANDLE` or `SOCKET`, widened to a pointer-sized
/// integer.
pub type RawHandle = isize;

/// Opaque handle to a loaded native library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LibraryHandle(usize);

impl LibraryHandle {
    /// Wrap a raw OS module handle.
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// The raw OS module handle.
    pub fn as_raw(self) -> usize {
        self.0
    }
}

/// How exported symbol names are spelled by the platform's calling
/// convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportNaming {
    /// Symbols are exported under their plain name.
    Plain,
    /// 32-bit stdcall decoration: `_name@argbytes`, with plain names as a
    /// fallback.
    Stdcall32,
}

/// Destination of a kernel-assisted transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferTarget {
    /// A connected socket.
    Socket(RawHandle),
    /// An open file.
    File(RawHandle),
}

impl TransferTarget {
    /// The native handle, whatever its kind.
    pub fn raw(self) -> RawHandle {
        match self {
            TransferTarget::Socket(h) | TransferTarget::File(h) => h,
        }
    }
}

/// OS operations used by the loader, the mapper and the file channel bridge.
///
/// Methods returning `io::Result` report raw OS failures; the callers decide
/// which guest-visible condition they become.
pub trait Platform: Send + Sync + fmt::Debug {
    /// Short backend name for logging.
    fn name(&self) -> &'static str;

    /// Export naming convention of this platform.
    fn export_naming(&self) -> ExportNaming {
        ExportNaming::Plain
    }

    /// Load the library at `path`.
    fn load_library(&self, path: &str) -> Result<LibraryHandle, LoadError>;

    /// Release a library handle.
    ///
    /// # Safety
    ///
    /// `handle` must come from [`Platform::load_library`] on this backend and
    /// must not have been freed already. No symbol resolved from it may be
    /// used afterwards.
    unsafe fn free_library(&self, handle: LibraryHandle);

    /// Look up an exported symbol by its exact name.
    fn resolve_symbol(&self, handle: LibraryHandle, name: &str) -> Option<NonNull<c_void>>;

    /// Advise the OS that `[offset, offset + len)` of `file` will be read
    /// soon. Platforms without such a facility return `Ok(())`.
    fn read_ahead(&self, file: RawHandle, offset: u64, len: u64) -> io::Result<()>;

    /// Map `len` bytes of `file` starting at `offset`.
    fn map_memory(&self, file: RawHandle, mode: MapMode, offset: u64, len: usize) -> io::Result<NonNull<u8>>;

    /// Unmap a region returned by [`Platform::map_memory`].
    ///
    /// # Safety
    ///
    /// `address`/`len` must describe exactly one live mapping produced by
    /// this backend, and nothing may access it afterwards.
    unsafe fn unmap_memory(&self, address: NonNull<u8>, len: usize) -> io::Result<()>;

    /// OS page or allocation granularity, in bytes.
    fn allocation_granularity(&self) -> BridgeResult<u64>;

    /// Kernel-assisted copy of `count` bytes of `source`, starting at
    /// `position`, to `target`.
    fn transfer_to(
        &self,
        source: RawHandle,
        position: u64,
        count: u64,
        target: TransferTarget,
    ) -> BridgeResult<IoStatus>;

    /// Whether [`Platform::transfer_to`] reads from the source's current
    /// position, so the caller must seek it to `position` first.
    fn transfer_requires_seek(&self) -> bool {
        false
    }
}

/// The backend for the running OS family.
pub fn native(transmit_packet_size: u32) -> Arc<dyn Platform> {
    #[cfg(unix)]
    {
        let _ = transmit_packet_size;
        Arc::new(UnixPlatform::new())
    }
    #[cfg(windows)]
    {
        Arc::new(WindowsPlatform::new(transmit_packet_size))
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = transmit_packet_size;
        Arc::new(UnsupportedPlatform)
    }
}

static CURRENT: Lazy<Arc<dyn Platform>> = Lazy::new(|| {
    let platform = native(TRANSMIT_PACKET_SIZE);
    tracing::debug!(platform = platform.name(), "selected platform backend");
    platform
});

/// Process-wide backend with default settings.
pub fn current() -> Arc<dyn Platform> {
    CURRENT.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_is_shared() {
        let a = current();
        let b = current();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_vendor = "apple", windows))]
    #[test]
    fn test_allocation_granularity_is_power_of_two() {
        let granularity = current().allocation_granularity().unwrap();
        assert!(granularity >= 4096);
        assert!(granularity.is_power_of_two());
    }

    #[test]
    fn test_transfer_target_raw() {
        assert_eq!(TransferTarget::Socket(7).raw(), 7);
        assert_eq!(TransferTarget::File(9).raw(), 9);
    }
}
