//! Unix backend (Linux, Android, macOS, iOS, BSD)

use std::ffi::{c_void, CStr, CString};
use std::io;
use std::ptr::{self, NonNull};

use corvid_sdk::{BridgeError, BridgeResult, IoStatus, LoadError, MapMode};

use super::{LibraryHandle, Platform, RawHandle, TransferTarget};

/// `libc`-based backend.
#[derive(Debug, Default)]
pub struct UnixPlatform {
    _private: (),
}

impl UnixPlatform {
    /// The backend.
    pub fn new() -> Self {
        Self::default()
    }
}

fn last_dl_error() -> Option<String> {
    let err = unsafe { libc::dlerror() };
    if err.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned())
    }
}

fn protection(mode: MapMode) -> (libc::c_int, libc::c_int) {
    match mode {
        MapMode::ReadOnly => (libc::PROT_READ, libc::MAP_SHARED),
        MapMode::ReadWrite => (libc::PROT_READ | libc::PROT_WRITE, libc::MAP_SHARED),
        MapMode::Private => (libc::PROT_READ | libc::PROT_WRITE, libc::MAP_PRIVATE),
    }
}

fn to_off(value: u64) -> io::Result<libc::off_t> {
    libc::off_t::try_from(value)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset out of range"))
}

impl Platform for UnixPlatform {
    fn name(&self) -> &'static str {
        "unix"
    }

    fn load_library(&self, path: &str) -> Result<LibraryHandle, LoadError> {
        let c_path = CString::new(path)
            .map_err(|e| LoadError::PlatformError(format!("Invalid path: {}", e)))?;

        // RTLD_NOW: resolve all symbols immediately
        // RTLD_LOCAL: keep symbols out of the global namespace
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        if handle.is_null() {
            let error = last_dl_error().unwrap_or_else(|| "Unknown error".to_string());
            return Err(LoadError::NotFound {
                path: format!("{}: {}", path, error),
            });
        }
        Ok(LibraryHandle::from_raw(handle as usize))
    }

    unsafe fn free_library(&self, handle: LibraryHandle) {
        if libc::dlclose(handle.as_raw() as *mut c_void) != 0 {
            tracing::warn!(error = ?last_dl_error(), "dlclose failed");
        }
    }

    fn resolve_symbol(&self, handle: LibraryHandle, name: &str) -> Option<NonNull<c_void>> {
        let c_name = CString::new(name).ok()?;
        unsafe {
            // clear any stale error
            libc::dlerror();
            let symbol = libc::dlsym(handle.as_raw() as *mut c_void, c_name.as_ptr());
            if let Some(error) = last_dl_error() {
                tracing::trace!(symbol = name, %error, "dlsym failed");
                return None;
            }
            NonNull::new(symbol)
        }
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    fn read_ahead(&self, file: RawHandle, offset: u64, len: u64) -> io::Result<()> {
        let rc = unsafe {
            libc::posix_fadvise(
                file as libc::c_int,
                to_off(offset)?,
                to_off(len)?,
                libc::POSIX_FADV_WILLNEED,
            )
        };
        // posix_fadvise returns the error number instead of setting errno
        match rc {
            0 => Ok(()),
            errno => Err(io::Error::from_raw_os_error(errno)),
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    fn read_ahead(&self, _file: RawHandle, _offset: u64, _len: u64) -> io::Result<()> {
        Ok(())
    }

    fn map_memory(&self, file: RawHandle, mode: MapMode, offset: u64, len: usize) -> io::Result<NonNull<u8>> {
        let (prot, flags) = protection(mode);
        let address = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                prot,
                flags,
                file as libc::c_int,
                to_off(offset)?,
            )
        };
        if address == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        NonNull::new(address.cast::<u8>())
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned null"))
    }

    unsafe fn unmap_memory(&self, address: NonNull<u8>, len: usize) -> io::Result<()> {
        if libc::munmap(address.as_ptr().cast::<c_void>(), len) != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_vendor = "apple"))]
    fn allocation_granularity(&self) -> BridgeResult<u64> {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        u64::try_from(size)
            .ok()
            .filter(|&size| size > 0)
            .ok_or_else(|| BridgeError::io_with("Page size query failed.", io::Error::last_os_error()))
    }

    #[cfg(not(any(target_os = "linux", target_os = "android", target_vendor = "apple")))]
    fn allocation_granularity(&self) -> BridgeResult<u64> {
        Err(BridgeError::PlatformUnsupported)
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn transfer_to(
        &self,
        source: RawHandle,
        position: u64,
        count: u64,
        target: TransferTarget,
    ) -> BridgeResult<IoStatus> {
        let mut offset = to_off(position).map_err(|e| BridgeError::io_with("Transfer failed.", e))?;
        let chunk = count.min(crate::defaults::MAX_SENDFILE_CHUNK) as usize;
        let sent = unsafe {
            libc::sendfile(
                target.raw() as libc::c_int,
                source as libc::c_int,
                &mut offset,
                chunk,
            )
        };
        if sent < 0 {
            return sendfile_failure(io::Error::last_os_error());
        }
        if sent == 0 && count > 0 {
            return Ok(IoStatus::Eof);
        }
        Ok(IoStatus::Ok(sent as u64))
    }

    #[cfg(target_vendor = "apple")]
    fn transfer_to(
        &self,
        source: RawHandle,
        position: u64,
        count: u64,
        target: TransferTarget,
    ) -> BridgeResult<IoStatus> {
        // BSD sendfile only writes to sockets
        let socket = match target {
            TransferTarget::Socket(socket) => socket,
            TransferTarget::File(_) => return Ok(IoStatus::UnsupportedCase),
        };
        let offset = to_off(position).map_err(|e| BridgeError::io_with("Transfer failed.", e))?;
        let mut len = to_off(count.min(crate::defaults::MAX_SENDFILE_CHUNK))
            .map_err(|e| BridgeError::io_with("Transfer failed.", e))?;
        let rc = unsafe {
            libc::sendfile(
                source as libc::c_int,
                socket as libc::c_int,
                offset,
                &mut len,
                ptr::null_mut(),
                0,
            )
        };
        if rc < 0 {
            let err = io::Error::last_os_error();
            // a partial send still reports the bytes written before the error
            if len > 0 {
                return Ok(IoStatus::Ok(len as u64));
            }
            return match err.raw_os_error() {
                Some(libc::ENOTSOCK) | Some(libc::ENOTSUP) => Ok(IoStatus::UnsupportedCase),
                _ => sendfile_failure(err),
            };
        }
        if len == 0 && count > 0 {
            return Ok(IoStatus::Eof);
        }
        Ok(IoStatus::Ok(len as u64))
    }

    #[cfg(not(any(target_os = "linux", target_os = "android", target_vendor = "apple")))]
    fn transfer_to(
        &self,
        _source: RawHandle,
        _position: u64,
        _count: u64,
        _target: TransferTarget,
    ) -> BridgeResult<IoStatus> {
        Ok(IoStatus::UnsupportedCase)
    }
}

#[cfg(any(target_os = "linux", target_os = "android", target_vendor = "apple"))]
fn sendfile_failure(err: io::Error) -> BridgeResult<IoStatus> {
    let status = match err.raw_os_error() {
        Some(libc::EAGAIN) => IoStatus::Unavailable,
        Some(libc::EINVAL) => IoStatus::UnsupportedCase,
        Some(libc::EINTR) => IoStatus::Interrupted,
        _ => return Err(BridgeError::io_with("Transfer failed.", err)),
    };
    tracing::warn!(error = %err, ?status, "sendfile reported a status");
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::io::AsRawFd;

    #[test]
    fn test_load_missing_library() {
        let err = UnixPlatform::new()
            .load_library("/nonexistent/libcorvid_missing.so")
            .unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }

    #[test]
    fn test_map_and_unmap_read_only() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"mapped bytes").unwrap();
        let platform = UnixPlatform::new();
        let address = platform
            .map_memory(file.as_raw_fd() as RawHandle, MapMode::ReadOnly, 0, 12)
            .unwrap();
        let view = unsafe { std::slice::from_raw_parts(address.as_ptr(), 12) };
        assert_eq!(view, b"mapped bytes");
        unsafe { platform.unmap_memory(address, 12).unwrap() };
    }

    #[test]
    fn test_read_ahead_on_regular_file() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&[0u8; 64]).unwrap();
        UnixPlatform::new()
            .read_ahead(file.as_raw_fd() as RawHandle, 0, 64)
            .unwrap();
    }

    #[test]
    fn test_map_bad_descriptor_fails() {
        let err = UnixPlatform::new()
            .map_memory(-1, MapMode::ReadOnly, 0, 4096)
            .unwrap_err();
        assert_ne!(err.kind(), io::ErrorKind::OutOfMemory);
    }
}
