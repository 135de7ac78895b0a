//! Engine façade
//!
//! [`Bridge`] owns one platform backend and everything built on it: the host
//! type registry, the lazily created [`BaseAccessors`], the file channel
//! bridge and the table of regions mapped on behalf of the guest. The
//! guest-level operations here take guest objects (descriptors, channels)
//! and pull the host resources out of them through the accessors.

use std::sync::Arc;

use corvid_sdk::{BridgeError, BridgeResult, IoStatus};
use dashmap::DashMap;
use once_cell::race::OnceBox;

use crate::accessor::BaseAccessors;
use crate::defaults::TRANSMIT_PACKET_SIZE;
use crate::ffi::NativeLibrary;
use crate::ghost::{self, TagStore};
use crate::host::bootstrap::{self, register_runtime_classes};
use crate::host::{HostRef, TypeRegistry};
use crate::nio::pressure::{self, MemoryPressure};
use crate::nio::{Destination, FileChannelBridge, MappedRegion, PlatformMemoryMapper, SocketHandle, StreamRef};
use crate::platform::{self, Platform};
use crate::types::GuestTypeTag;

/// Configuration for a [`Bridge`]
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Advise the OS to read ahead before mapping a file region (default: true)
    pub read_ahead: bool,
    /// Bytes per packet for Win32 `TransmitFile` (default: 524288)
    pub transmit_packet_size: u32,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        BridgeOptions {
            read_ahead: true,
            transmit_packet_size: TRANSMIT_PACKET_SIZE,
        }
    }
}

/// The interop layer for one guest runtime.
pub struct Bridge {
    options: BridgeOptions,
    platform: Arc<dyn Platform>,
    types: Arc<TypeRegistry>,
    guest_types: DashMap<String, GuestTypeTag>,
    accessors: OnceBox<BaseAccessors>,
    channels: FileChannelBridge,
    regions: DashMap<usize, MappedRegion>,
}

impl Bridge {
    /// Create a bridge with default configuration
    pub fn new() -> BridgeResult<Self> {
        Self::with_options(BridgeOptions::default())
    }

    /// Create a bridge on the native backend for this OS
    pub fn with_options(options: BridgeOptions) -> BridgeResult<Self> {
        let platform = platform::native(options.transmit_packet_size);
        Self::with_platform(options, platform)
    }

    /// Create a bridge on an explicit backend
    pub fn with_platform(options: BridgeOptions, platform: Arc<dyn Platform>) -> BridgeResult<Self> {
        let types = Arc::new(TypeRegistry::new());
        register_runtime_classes(&types)?;

        let mapper = PlatformMemoryMapper::new(platform.clone(), pressure::shared(), options.read_ahead);
        let channels = FileChannelBridge::new(platform.clone(), mapper);
        tracing::debug!(platform = platform.name(), ?options, "bridge created");

        Ok(Bridge {
            options,
            platform,
            types,
            guest_types: DashMap::new(),
            accessors: OnceBox::new(),
            channels,
            regions: DashMap::new(),
        })
    }

    /// Account mapped memory to `pressure` instead of the process-wide
    /// counter.
    pub fn with_memory_pressure(mut self, pressure: Arc<dyn MemoryPressure>) -> Self {
        let mapper = PlatformMemoryMapper::new(self.platform.clone(), pressure, self.options.read_ahead);
        self.channels = FileChannelBridge::new(self.platform.clone(), mapper);
        self
    }

    /// Configuration this bridge was built with.
    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Platform backend.
    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    /// Host type registry, with the runtime classes already registered.
    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// Ghost tag store.
    pub fn tags(&self) -> &'static TagStore {
        ghost::global()
    }

    /// Memory pressure sink for mapped regions.
    pub fn pressure(&self) -> &Arc<dyn MemoryPressure> {
        self.channels.mapper().pressure()
    }

    /// File channel operations on host streams.
    pub fn channels(&self) -> &FileChannelBridge {
        &self.channels
    }

    /// Accessors for the runtime classes, created on first use.
    pub fn accessors(&self) -> &BaseAccessors {
        self.accessors
            .get_or_init(|| Box::new(BaseAccessors::new(self.types.clone())))
    }

    /// Make a guest type known by name to the ghost natives.
    pub fn define_guest_type(&self, tag: GuestTypeTag) {
        self.guest_types.insert(tag.name().to_string(), tag);
    }

    /// A guest type defined with [`Bridge::define_guest_type`].
    pub fn guest_type(&self, name: &str) -> BridgeResult<GuestTypeTag> {
        self.guest_types
            .get(name)
            .map(|tag| tag.clone())
            .ok_or_else(|| BridgeError::TypeNotFound(name.to_string()))
    }

    /// Load a native library on this bridge's backend.
    pub fn load_library(&self, path: &str) -> BridgeResult<NativeLibrary> {
        Ok(NativeLibrary::open_with(self.platform.clone(), path)?)
    }

    /// The host stream behind a guest descriptor, if it has one.
    pub fn descriptor_stream(&self, fd: &HostRef) -> BridgeResult<Option<StreamRef>> {
        match self.accessors().file_descriptor().stream(fd)? {
            None => Ok(None),
            Some(obj) => bootstrap::stream_of(&obj)
                .cloned()
                .map(Some)
                .ok_or_else(|| BridgeError::wrong_kind(bootstrap::STREAM, obj.class_name())),
        }
    }

    fn descriptor_socket(&self, fd: &HostRef) -> BridgeResult<Option<HostRef>> {
        self.accessors().file_descriptor().socket(fd)
    }

    /// `FileChannelImpl.initIDs`
    pub fn init_ids(&self) -> BridgeResult<u64> {
        self.channels.init_allocation_granularity()
    }

    /// `FileChannelImpl.position0`
    pub fn position0(&self, fd: &HostRef, offset: i64) -> BridgeResult<IoStatus> {
        let stream = self.descriptor_stream(fd)?;
        self.channels.position(stream.as_ref(), offset)
    }

    /// `FileChannelImpl.transferTo0`
    pub fn transfer_to0(&self, src: &HostRef, position: i64, count: i64, dst: &HostRef) -> BridgeResult<IoStatus> {
        let source = self.descriptor_stream(src)?;
        let socket_obj = self.descriptor_socket(dst)?;
        let socket: Option<&SocketHandle> = socket_obj.as_ref().and_then(bootstrap::socket_of);
        let stream = self.descriptor_stream(dst)?;
        let destination = Destination {
            socket,
            stream: stream.as_ref(),
        };
        self.channels.transfer_to(source.as_ref(), position, count, destination)
    }

    /// `FileChannelImpl.map0`: map a region of the channel's file and
    /// return its address.
    pub fn map0(&self, channel: &HostRef, prot: i32, position: i64, length: i64) -> BridgeResult<u64> {
        let fd = self
            .accessors()
            .file_channel()
            .fd(channel)?
            .ok_or_else(BridgeError::stream_closed)?;
        let stream = self.descriptor_stream(&fd)?;
        let region = self.channels.map(stream.as_ref(), prot, position, length)?;
        let address = region.address();
        self.regions.insert(address, region);
        Ok(address as u64)
    }

    /// `FileChannelImpl.unmap0`: release the region `map0` returned at
    /// `address`.
    pub fn unmap0(&self, address: u64, length: u64) -> BridgeResult<()> {
        let (_, region) = self
            .regions
            .remove(&(address as usize))
            .ok_or_else(|| BridgeError::io(format!("Unmap failed. No mapping at {:#x}.", address)))?;
        if region.len() as u64 != length {
            tracing::warn!(address, length, mapped = region.len(), "unmap length differs from mapping");
        }
        self.channels.unmap(region)
    }

    /// Regions mapped through `map0` and not yet unmapped.
    pub fn mapped_regions(&self) -> usize {
        self.regions.len()
    }

    /// `FileDescriptor.flush`: force the descriptor's file to stable storage.
    pub fn flush(&self, fd: &HostRef) -> BridgeResult<bool> {
        let stream = self
            .descriptor_stream(fd)?
            .ok_or_else(BridgeError::stream_closed)?;
        match stream.as_file() {
            Some(file) => Ok(file.sync()),
            None => Ok(stream.flush().is_ok()),
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if self.regions.is_empty() {
            return;
        }
        tracing::warn!(regions = self.regions.len(), "releasing regions still mapped at shutdown");
        let addresses: Vec<usize> = self.regions.iter().map(|entry| *entry.key()).collect();
        for address in addresses {
            if let Some((_, region)) = self.regions.remove(&address) {
                if let Err(e) = self.channels.unmap(region) {
                    tracing::warn!(address, error = %e, "failed to unmap region at shutdown");
                }
            }
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("platform", &self.platform.name())
            .field("options", &self.options)
            .field("types", &self.types.len())
            .field("mapped_regions", &self.regions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nio::fd::{self, FileAccess, FileMode};
    use crate::nio::pressure::ExternalMemory;
    use crate::nio::PipeStream;

    fn descriptor(bridge: &Bridge, stream: StreamRef) -> HostRef {
        let fds = bridge.accessors().file_descriptor();
        let fd = fds.create().unwrap();
        fds.set_stream(&fd, Some(bootstrap::wrap_stream(stream).unwrap())).unwrap();
        fd
    }

    #[test]
    fn test_runtime_classes_present() {
        let bridge = Bridge::new().unwrap();
        assert!(bridge.types().contains(bootstrap::FILE_DESCRIPTOR));
        assert_eq!(bridge.options().transmit_packet_size, TRANSMIT_PACKET_SIZE);
    }

    #[test]
    fn test_position0_through_descriptor() {
        let bridge = Bridge::new().unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"hello world").unwrap();
        let stream: StreamRef = Arc::new(fd::open(file.path(), FileMode::Open, FileAccess::Read).unwrap());
        let fd = descriptor(&bridge, stream);

        assert_eq!(bridge.position0(&fd, 6).unwrap(), IoStatus::Ok(6));
        assert_eq!(bridge.position0(&fd, -1).unwrap(), IoStatus::Ok(6));
    }

    #[test]
    fn test_position0_without_stream() {
        let bridge = Bridge::new().unwrap();
        let fd = bridge.accessors().file_descriptor().create().unwrap();
        assert_eq!(bridge.position0(&fd, 0).unwrap_err().to_string(), "Stream closed.");
    }

    #[test]
    fn test_flush_pipe_and_file() {
        let bridge = Bridge::new().unwrap();
        let pipe = descriptor(&bridge, Arc::new(PipeStream::new()));
        assert!(bridge.flush(&pipe).unwrap());

        let file = tempfile::NamedTempFile::new().unwrap();
        let stream: StreamRef = Arc::new(fd::open(file.path(), FileMode::Open, FileAccess::Write).unwrap());
        let fd = descriptor(&bridge, stream);
        assert!(bridge.flush(&fd).unwrap());
    }

    #[test]
    fn test_unmap_unknown_address() {
        let bridge = Bridge::new().unwrap();
        let err = bridge.unmap0(0x1000, 4096).unwrap_err();
        assert!(matches!(err, BridgeError::Io { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_drop_releases_live_regions() {
        let pressure = Arc::new(ExternalMemory::new());
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), vec![1u8; 4096]).unwrap();
        {
            let bridge = Bridge::new().unwrap().with_memory_pressure(pressure.clone());
            let stream: StreamRef = Arc::new(fd::open(file.path(), FileMode::Open, FileAccess::Read).unwrap());
            let fd = descriptor(&bridge, stream);
            let channel = bridge.accessors().file_channel().create(&fd).unwrap();
            bridge.map0(&channel, 0, 0, 4096).unwrap();
            assert_eq!(bridge.mapped_regions(), 1);
            assert_eq!(pressure.current(), 4096);
        }
        assert_eq!(pressure.current(), 0);
    }

    #[test]
    fn test_guest_types() {
        let bridge = Bridge::new().unwrap();
        assert!(matches!(bridge.guest_type("demo.Ghost"), Err(BridgeError::TypeNotFound(_))));
        bridge.define_guest_type(GuestTypeTag::ghost("demo.Ghost", vec![]));
        assert_eq!(bridge.guest_type("demo.Ghost").unwrap().name(), "demo.Ghost");
    }
}
