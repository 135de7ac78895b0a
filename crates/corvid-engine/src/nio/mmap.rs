//! Memory-mapped file regions

use std::fmt;
use std::io;
use std::ptr::NonNull;
use std::sync::Arc;

use corvid_sdk::{BridgeError, BridgeResult, MapMode};

use super::pressure::MemoryPressure;
use super::stream::FileStream;
use crate::platform::Platform;

const MAP_FAILED: &str = "File mapping failed.";

/// A live mapping. Exactly one owner releases it, through
/// [`PlatformMemoryMapper::unmap`]; dropping it without unmapping leaks the
/// view.
#[must_use = "a mapped region must be released with PlatformMemoryMapper::unmap"]
pub struct MappedRegion {
    address: NonNull<u8>,
    len: usize,
    mode: MapMode,
}

// SAFETY: the region is plain OS-managed memory; synchronizing access to its
// bytes is the guest's business, as with any direct buffer.
unsafe impl Send for MappedRegion {}
unsafe impl Sync for MappedRegion {}

impl MappedRegion {
    /// Base address, as handed to the guest.
    pub fn address(&self) -> usize {
        self.address.as_ptr() as usize
    }

    /// Mapped length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the region has zero length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Protection the region was mapped with.
    pub fn mode(&self) -> MapMode {
        self.mode
    }

    /// Raw base pointer.
    pub fn as_ptr(&self) -> *mut u8 {
        self.address.as_ptr()
    }

    /// View the mapped bytes.
    ///
    /// # Safety
    ///
    /// No one may write the region while the slice is alive.
    pub unsafe fn as_slice(&self) -> &[u8] {
        std::slice::from_raw_parts(self.address.as_ptr(), self.len)
    }

    /// Mutable view of the mapped bytes.
    ///
    /// # Safety
    ///
    /// The region must be writable (`mode().is_writable()`) and no other
    /// view may be alive while the slice is.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn as_mut_slice(&self) -> &mut [u8] {
        std::slice::from_raw_parts_mut(self.address.as_ptr(), self.len)
    }
}

impl fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedRegion")
            .field("address", &format_args!("{:#x}", self.address()))
            .field("len", &self.len)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Maps file regions and accounts for them as memory pressure.
///
/// Pressure is added only after a successful map and removed by every
/// unmap, so a map/unmap pair nets to zero and a failed map adds nothing.
#[derive(Debug, Clone)]
pub struct PlatformMemoryMapper {
    platform: Arc<dyn Platform>,
    pressure: Arc<dyn MemoryPressure>,
    read_ahead: bool,
}

impl PlatformMemoryMapper {
    /// A mapper over `platform`. `read_ahead` enables the will-need hint.
    pub fn new(platform: Arc<dyn Platform>, pressure: Arc<dyn MemoryPressure>, read_ahead: bool) -> Self {
        Self {
            platform,
            pressure,
            read_ahead,
        }
    }

    /// The pressure sink.
    pub fn pressure(&self) -> &Arc<dyn MemoryPressure> {
        &self.pressure
    }

    /// Map `len` bytes of `file` from `offset`.
    ///
    /// The file's handle stays pinned for the whole native call, so a
    /// concurrent close cannot pull it out from under the OS.
    pub fn map(&self, file: &FileStream, mode: MapMode, offset: u64, len: u64) -> BridgeResult<MappedRegion> {
        let size = usize::try_from(len).map_err(|_| BridgeError::OutOfMemory(MAP_FAILED.to_string()))?;
        let pinned = file.pin_handle().map_err(|_| BridgeError::stream_closed())?;

        if self.read_ahead {
            self.platform
                .read_ahead(pinned.raw(), offset, len)
                .map_err(|e| BridgeError::io_with(MAP_FAILED, e))?;
        }

        let address = self
            .platform
            .map_memory(pinned.raw(), mode, offset, size)
            .map_err(map_error)?;
        drop(pinned);

        self.pressure.add(len);
        tracing::debug!(
            path = %file.path().display(),
            address = address.as_ptr() as usize,
            offset,
            len,
            ?mode,
            "mapped file region"
        );
        Ok(MappedRegion {
            address,
            len: size,
            mode,
        })
    }

    /// Release a region. Its pressure is removed even if the OS reports a
    /// failure.
    pub fn unmap(&self, region: MappedRegion) -> BridgeResult<()> {
        let result = unsafe { self.platform.unmap_memory(region.address, region.len) };
        self.pressure.remove(region.len as u64);
        tracing::debug!(
            address = region.address(),
            len = region.len,
            "unmapped file region"
        );
        result.map_err(|e| {
            tracing::warn!(error = %e, "unmap failed");
            match e.kind() {
                io::ErrorKind::Unsupported => BridgeError::PlatformUnsupported,
                _ => BridgeError::io_with("Unmap failed.", e),
            }
        })
    }
}

fn map_error(err: io::Error) -> BridgeError {
    match err.kind() {
        io::ErrorKind::OutOfMemory => BridgeError::OutOfMemory(MAP_FAILED.to_string()),
        // backends with no mapping facility
        io::ErrorKind::Unsupported => BridgeError::PlatformUnsupported,
        _ => BridgeError::io_with(MAP_FAILED, err),
    }
}
