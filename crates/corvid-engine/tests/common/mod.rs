//! Shared fixtures for the integration tests
//!
//! [`MockPlatform`] stands in for the OS: libraries are in-memory export
//! tables, every symbol probe is recorded, and mapping/transfer calls are
//! either forwarded to the real backend or failed on request.

#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::c_void;
use std::io;
use std::ptr::NonNull;
use std::sync::Arc;

use corvid_engine::nio::fd::{self, FileAccess, FileMode};
use corvid_engine::nio::StreamRef;
use corvid_engine::platform::{self, ExportNaming, LibraryHandle, Platform, RawHandle, TransferTarget};
use corvid_engine::{Bridge, BridgeResult, HostRef, IoStatus, LoadError, MapMode};
use parking_lot::Mutex;

/// Install a test subscriber once; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Default)]
struct MockState {
    libraries: HashMap<String, Vec<String>>,
    loaded: HashMap<usize, String>,
    next_handle: usize,
    probes: Vec<String>,
    freed: Vec<LibraryHandle>,
    map_failure: Option<io::ErrorKind>,
    transfers: Vec<TransferTarget>,
    transfer_result: Option<IoStatus>,
}

/// In-memory platform backend.
#[derive(Debug)]
pub struct MockPlatform {
    naming: ExportNaming,
    real: Arc<dyn Platform>,
    state: Mutex<MockState>,
}

impl MockPlatform {
    /// A backend with 32-bit stdcall export naming.
    pub fn stdcall() -> Arc<Self> {
        Arc::new(Self::with_naming(ExportNaming::Stdcall32))
    }

    /// A backend with plain export naming.
    pub fn plain() -> Arc<Self> {
        Arc::new(Self::with_naming(ExportNaming::Plain))
    }

    fn with_naming(naming: ExportNaming) -> Self {
        MockPlatform {
            naming,
            real: platform::current(),
            state: Mutex::new(MockState::default()),
        }
    }

    /// Make `path` loadable with the given exports.
    pub fn add_library(&self, path: &str, exports: &[&str]) {
        self.state
            .lock()
            .libraries
            .insert(path.to_string(), exports.iter().map(|s| s.to_string()).collect());
    }

    /// Every symbol name probed so far, in order.
    pub fn probes(&self) -> Vec<String> {
        self.state.lock().probes.clone()
    }

    /// Handles released so far.
    pub fn freed(&self) -> Vec<LibraryHandle> {
        self.state.lock().freed.clone()
    }

    /// Fail the next `map_memory` call with `kind`.
    pub fn fail_next_map(&self, kind: io::ErrorKind) {
        self.state.lock().map_failure = Some(kind);
    }

    /// Answer every `transfer_to` with `status` instead of calling the OS.
    pub fn answer_transfers(&self, status: IoStatus) {
        self.state.lock().transfer_result = Some(status);
    }

    /// Targets handed to `transfer_to`.
    pub fn transfers(&self) -> Vec<TransferTarget> {
        self.state.lock().transfers.clone()
    }
}

impl Platform for MockPlatform {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn export_naming(&self) -> ExportNaming {
        self.naming
    }

    fn load_library(&self, path: &str) -> Result<LibraryHandle, LoadError> {
        let mut state = self.state.lock();
        if !state.libraries.contains_key(path) {
            return Err(LoadError::NotFound {
                path: format!("{}: no such mock library", path),
            });
        }
        state.next_handle += 1;
        let handle = state.next_handle * 0x1000;
        state.loaded.insert(handle, path.to_string());
        Ok(LibraryHandle::from_raw(handle))
    }

    unsafe fn free_library(&self, handle: LibraryHandle) {
        let mut state = self.state.lock();
        state.loaded.remove(&handle.as_raw());
        state.freed.push(handle);
    }

    fn resolve_symbol(&self, handle: LibraryHandle, name: &str) -> Option<NonNull<c_void>> {
        let mut state = self.state.lock();
        state.probes.push(name.to_string());
        let path = state.loaded.get(&handle.as_raw())?;
        let index = state.libraries.get(path)?.iter().position(|export| export == name)?;
        NonNull::new((handle.as_raw() + (index + 1) * 0x10) as *mut c_void)
    }

    fn read_ahead(&self, file: RawHandle, offset: u64, len: u64) -> io::Result<()> {
        self.real.read_ahead(file, offset, len)
    }

    fn map_memory(&self, file: RawHandle, mode: MapMode, offset: u64, len: usize) -> io::Result<NonNull<u8>> {
        if let Some(kind) = self.state.lock().map_failure.take() {
            return Err(io::Error::from(kind));
        }
        self.real.map_memory(file, mode, offset, len)
    }

    unsafe fn unmap_memory(&self, address: NonNull<u8>, len: usize) -> io::Result<()> {
        self.real.unmap_memory(address, len)
    }

    fn allocation_granularity(&self) -> BridgeResult<u64> {
        Ok(65536)
    }

    fn transfer_to(
        &self,
        source: RawHandle,
        position: u64,
        count: u64,
        target: TransferTarget,
    ) -> BridgeResult<IoStatus> {
        let answer = {
            let mut state = self.state.lock();
            state.transfers.push(target);
            state.transfer_result
        };
        match answer {
            Some(status) => Ok(status),
            None => self.real.transfer_to(source, position, count, target),
        }
    }
}

/// Open `path` as a host file stream.
pub fn open_stream(path: &std::path::Path, mode: FileMode, access: FileAccess) -> StreamRef {
    Arc::new(fd::open(path, mode, access).unwrap())
}

/// A guest `FileDescriptor` wrapping `stream`.
pub fn descriptor(bridge: &Bridge, stream: StreamRef) -> HostRef {
    let fds = bridge.accessors().file_descriptor();
    let fd = fds.create().unwrap();
    fds.set_stream(&fd, Some(corvid_engine::host::bootstrap::wrap_stream(stream).unwrap()))
        .unwrap();
    fd
}

/// A guest `FileChannelImpl` over a fresh descriptor for `stream`.
pub fn channel(bridge: &Bridge, stream: StreamRef) -> HostRef {
    let fd = descriptor(bridge, stream);
    bridge.accessors().file_channel().create(&fd).unwrap()
}
