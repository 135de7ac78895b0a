//! Memory Mapping Tests
//!
//! File regions mapped through `FileChannelImpl.map0`:
//! - Writes through a read-write mapping reach the file
//! - Private mappings never write back
//! - Memory pressure rises on map and nets to zero on unmap
//! - Failed mappings add no pressure and surface the right guest error
//!
//! # Running Tests
//! ```bash
//! cargo test --test memory_mapping
//! ```

mod common;

use std::io;
use std::sync::Arc;

use common::MockPlatform;
use corvid_engine::defaults::{MAP_PV, MAP_RO, MAP_RW};
use corvid_engine::nio::pressure::{ExternalMemory, MemoryPressure};
use corvid_engine::nio::{FileAccess, FileMode};
use corvid_engine::platform::UnsupportedPlatform;
use corvid_engine::{Bridge, BridgeError, BridgeOptions, ErrorKind};

// ===== Round Trip Tests =====

#[cfg(unix)]
#[test]
fn test_read_write_mapping_reaches_file() {
    common::init_tracing();
    let pressure = Arc::new(ExternalMemory::new());
    let bridge = Bridge::new().unwrap().with_memory_pressure(pressure.clone());
    let page = bridge.init_ids().unwrap();
    let len = page * 3;

    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), vec![0u8; len as usize]).unwrap();

    let stream = common::open_stream(file.path(), FileMode::Open, FileAccess::ReadWrite);
    let channel = common::channel(&bridge, stream);
    let address = bridge.map0(&channel, MAP_RW, 0, len as i64).unwrap();
    assert_eq!(pressure.current(), len);
    assert_eq!(bridge.mapped_regions(), 1);

    let view = unsafe { std::slice::from_raw_parts_mut(address as usize as *mut u8, len as usize) };
    for (i, byte) in view.iter_mut().enumerate() {
        *byte = (i % 251) as u8;
    }
    bridge.unmap0(address, len).unwrap();
    assert_eq!(pressure.current(), 0);
    assert_eq!(bridge.mapped_regions(), 0);

    let reader = common::open_stream(file.path(), FileMode::Open, FileAccess::Read);
    let channel = common::channel(&bridge, reader);
    let address = bridge.map0(&channel, MAP_RO, 0, len as i64).unwrap();
    let view = unsafe { std::slice::from_raw_parts(address as usize as *const u8, len as usize) };
    assert_eq!(view, &expected_contents(len as usize)[..]);
    bridge.unmap0(address, len).unwrap();

    let on_disk = std::fs::read(file.path()).unwrap();
    assert_eq!(on_disk, expected_contents(len as usize));
}

#[cfg(unix)]
fn expected_contents(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[cfg(unix)]
#[test]
fn test_private_mapping_does_not_write_back() {
    let bridge = Bridge::new().unwrap();
    let page = bridge.init_ids().unwrap();
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), vec![7u8; page as usize]).unwrap();

    let stream = common::open_stream(file.path(), FileMode::Open, FileAccess::ReadWrite);
    let channel = common::channel(&bridge, stream);
    let address = bridge.map0(&channel, MAP_PV, 0, page as i64).unwrap();
    unsafe { std::ptr::write_bytes(address as usize as *mut u8, 9, page as usize) };
    bridge.unmap0(address, page).unwrap();

    assert!(std::fs::read(file.path()).unwrap().iter().all(|&b| b == 7));
}

#[cfg(unix)]
#[test]
fn test_offset_mapping() {
    let bridge = Bridge::new().unwrap();
    let page = bridge.init_ids().unwrap() as usize;
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut contents = vec![1u8; page];
    contents.extend(vec![2u8; page]);
    std::fs::write(file.path(), &contents).unwrap();

    let stream = common::open_stream(file.path(), FileMode::Open, FileAccess::Read);
    let channel = common::channel(&bridge, stream);
    let address = bridge.map0(&channel, MAP_RO, page as i64, page as i64).unwrap();
    let view = unsafe { std::slice::from_raw_parts(address as usize as *const u8, page) };
    assert!(view.iter().all(|&b| b == 2));
    bridge.unmap0(address, page as u64).unwrap();
}

// ===== Failure Tests =====

#[cfg(unix)]
#[test]
fn test_out_of_memory_adds_no_pressure() {
    let platform = MockPlatform::plain();
    let pressure = Arc::new(ExternalMemory::new());
    let bridge = Bridge::with_platform(BridgeOptions::default(), platform.clone())
        .unwrap()
        .with_memory_pressure(pressure.clone());

    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), vec![0u8; 4096]).unwrap();
    let stream = common::open_stream(file.path(), FileMode::Open, FileAccess::Read);
    let channel = common::channel(&bridge, stream);

    platform.fail_next_map(io::ErrorKind::OutOfMemory);
    let err = bridge.map0(&channel, MAP_RO, 0, 4096).unwrap_err();
    assert!(matches!(err, BridgeError::OutOfMemory(_)));
    assert_eq!(err.kind(), ErrorKind::ResourceExhaustion);
    assert_eq!(err.guest_class(), "java.lang.OutOfMemoryError");
    assert_eq!(pressure.current(), 0);

    platform.fail_next_map(io::ErrorKind::PermissionDenied);
    let err = bridge.map0(&channel, MAP_RO, 0, 4096).unwrap_err();
    assert_eq!(err.to_string(), "File mapping failed.");
    assert_eq!(err.guest_class(), "java.io.IOException");
    assert_eq!(pressure.current(), 0);
    assert_eq!(bridge.mapped_regions(), 0);

    // the next call goes through to the OS again
    let address = bridge.map0(&channel, MAP_RO, 0, 4096).unwrap();
    assert_eq!(pressure.current(), 4096);
    bridge.unmap0(address, 4096).unwrap();
    assert_eq!(pressure.current(), 0);
}

#[test]
fn test_unsupported_platform_raises() {
    let pressure = Arc::new(ExternalMemory::new());
    let bridge = Bridge::with_platform(BridgeOptions::default(), Arc::new(UnsupportedPlatform))
        .unwrap()
        .with_memory_pressure(pressure.clone());

    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), vec![0u8; 16]).unwrap();
    let stream = common::open_stream(file.path(), FileMode::Open, FileAccess::Read);
    let channel = common::channel(&bridge, stream);

    let err = bridge.map0(&channel, MAP_RO, 0, 16).unwrap_err();
    assert!(matches!(err, BridgeError::PlatformUnsupported));
    assert_eq!(err.kind(), ErrorKind::PlatformUnsupported);
    assert_eq!(pressure.current(), 0);
    assert_eq!(bridge.mapped_regions(), 0);
    assert!(matches!(bridge.init_ids(), Err(BridgeError::PlatformUnsupported)));
}

#[test]
fn test_invalid_arguments() {
    let bridge = Bridge::new().unwrap();
    let file = tempfile::NamedTempFile::new().unwrap();
    let stream = common::open_stream(file.path(), FileMode::Open, FileAccess::Read);
    let channel = common::channel(&bridge, stream);

    assert!(matches!(bridge.map0(&channel, 7, 0, 16), Err(BridgeError::InvalidMapMode(7))));
    assert!(matches!(bridge.map0(&channel, MAP_RO, -1, 16), Err(BridgeError::Io { .. })));

    let pipe = common::channel(&bridge, Arc::new(corvid_engine::nio::PipeStream::new()));
    assert_eq!(bridge.map0(&pipe, MAP_RO, 0, 16).unwrap_err().to_string(), "Map not supported.");
}

#[test]
fn test_map_without_descriptor_stream() {
    let bridge = Bridge::new().unwrap();
    let fd = bridge.accessors().file_descriptor().create().unwrap();
    let channel = bridge.accessors().file_channel().create(&fd).unwrap();
    assert_eq!(bridge.map0(&channel, MAP_RO, 0, 16).unwrap_err().to_string(), "Stream closed.");
}
