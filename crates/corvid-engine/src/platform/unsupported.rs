//! Backend for OS families with no native implementation

use std::ffi::c_void;
use std::io;
use std::ptr::NonNull;

use corvid_sdk::{BridgeError, BridgeResult, IoStatus, LoadError, MapMode};

use super::{LibraryHandle, Platform, RawHandle, TransferTarget};

/// Fails every operation. Never degrades to a silent no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedPlatform;

fn unsupported() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "Unsupported operation on platform.")
}

impl Platform for UnsupportedPlatform {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn load_library(&self, path: &str) -> Result<LibraryHandle, LoadError> {
        Err(LoadError::PlatformError(format!(
            "cannot load {}: Unsupported operation on platform.",
            path
        )))
    }

    unsafe fn free_library(&self, _handle: LibraryHandle) {}

    fn resolve_symbol(&self, _handle: LibraryHandle, _name: &str) -> Option<NonNull<c_void>> {
        None
    }

    fn read_ahead(&self, _file: RawHandle, _offset: u64, _len: u64) -> io::Result<()> {
        Ok(())
    }

    fn map_memory(&self, _file: RawHandle, _mode: MapMode, _offset: u64, _len: usize) -> io::Result<NonNull<u8>> {
        Err(unsupported())
    }

    unsafe fn unmap_memory(&self, _address: NonNull<u8>, _len: usize) -> io::Result<()> {
        Err(unsupported())
    }

    fn allocation_granularity(&self) -> BridgeResult<u64> {
        Err(BridgeError::PlatformUnsupported)
    }

    fn transfer_to(
        &self,
        _source: RawHandle,
        _position: u64,
        _count: u64,
        _target: TransferTarget,
    ) -> BridgeResult<IoStatus> {
        Err(BridgeError::PlatformUnsupported)
    }
}
