//! File channel natives on host streams
//!
//! The operations behind `FileChannelImpl`'s native methods, taking the
//! host stream and socket already pulled out of the guest descriptors.
//! Expected platform outcomes come back as [`IoStatus`] values; only real
//! failures are errors.

use std::io;
use std::sync::Arc;

use corvid_sdk::{BridgeError, BridgeResult, IoStatus, MapMode};

use super::mmap::{MappedRegion, PlatformMemoryMapper};
use super::stream::{PinnedHandle, SocketHandle, StreamRef};
use crate::platform::{Platform, TransferTarget};

/// Where a transfer writes to: the socket and stream of the destination
/// descriptor, either of which may be absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct Destination<'a> {
    /// Socket carried by the descriptor.
    pub socket: Option<&'a SocketHandle>,
    /// Stream carried by the descriptor.
    pub stream: Option<&'a StreamRef>,
}

/// Translate a failed stream call into a status, or a failure wrapped with
/// `context`.
fn stream_status(err: io::Error, context: &str) -> BridgeResult<IoStatus> {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => Ok(IoStatus::Eof),
        io::ErrorKind::Unsupported => Ok(IoStatus::Unsupported),
        io::ErrorKind::NotConnected => Ok(IoStatus::Unavailable),
        _ => Err(BridgeError::io_with(context, err)),
    }
}

fn open_stream(stream: Option<&StreamRef>) -> BridgeResult<&StreamRef> {
    match stream {
        Some(stream) if !stream.is_closed() => Ok(stream),
        _ => Err(BridgeError::stream_closed()),
    }
}

/// Host side of `sun.nio.ch.FileChannelImpl`.
#[derive(Debug, Clone)]
pub struct FileChannelBridge {
    platform: Arc<dyn Platform>,
    mapper: PlatformMemoryMapper,
}

impl FileChannelBridge {
    /// A bridge using `platform` for transfers and `mapper` for mappings.
    pub fn new(platform: Arc<dyn Platform>, mapper: PlatformMemoryMapper) -> Self {
        Self { platform, mapper }
    }

    /// The mapper used by [`FileChannelBridge::map`].
    pub fn mapper(&self) -> &PlatformMemoryMapper {
        &self.mapper
    }

    /// `initIDs`: the allocation granularity mapping offsets must align to.
    pub fn init_allocation_granularity(&self) -> BridgeResult<u64> {
        self.platform.allocation_granularity()
    }

    /// `position0`: seek to `offset` when it is non-negative, otherwise
    /// report the current position.
    pub fn position(&self, stream: Option<&StreamRef>, offset: i64) -> BridgeResult<IoStatus> {
        let stream = open_stream(stream)?;
        let result = if offset >= 0 {
            if !stream.can_seek() {
                return Ok(IoStatus::Unsupported);
            }
            stream.seek(offset as u64)
        } else {
            stream.position()
        };
        match result {
            Ok(position) => Ok(IoStatus::Ok(position)),
            Err(e) => stream_status(e, "Position failed."),
        }
    }

    /// `transferTo0`: copy up to `count` bytes of `source` from `position`
    /// to the destination with the kernel's help.
    ///
    /// A socket on the destination always wins over its stream; when that
    /// socket has no native handle the result is `UNSUPPORTED_CASE`.
    pub fn transfer_to(
        &self,
        source: Option<&StreamRef>,
        position: i64,
        count: i64,
        destination: Destination<'_>,
    ) -> BridgeResult<IoStatus> {
        let source = open_stream(source)?;
        let file = source
            .as_file()
            .ok_or_else(|| BridgeError::io("Transfer failed. Cannot transfer from non-file stream."))?;
        if position < 0 || count < 0 {
            return Err(BridgeError::io("Transfer failed."));
        }
        if count == 0 {
            return Ok(IoStatus::Ok(0));
        }

        let _pinned_target: PinnedHandle<'_>;
        let target = match destination.socket {
            // a socket that cannot be resolved is never bypassed for the stream
            Some(socket) => match socket.native_handle() {
                Some(raw) => TransferTarget::Socket(raw),
                None => return Ok(IoStatus::UnsupportedCase),
            },
            None => match destination.stream.and_then(|s| s.as_file()) {
                Some(target_file) => match target_file.pin_handle() {
                    Ok(pinned) => {
                        let raw = pinned.raw();
                        _pinned_target = pinned;
                        TransferTarget::File(raw)
                    }
                    Err(_) => return Ok(IoStatus::UnsupportedCase),
                },
                None => return Ok(IoStatus::UnsupportedCase),
            },
        };

        let pinned_source = match file.pin_handle() {
            Ok(pinned) => pinned,
            Err(e) => return stream_status(e, "Transfer failed."),
        };

        if self.platform.transfer_requires_seek() {
            let current = match source.position() {
                Ok(current) => current,
                Err(e) => return stream_status(e, "Transfer failed."),
            };
            if current != position as u64 {
                if !source.can_seek() {
                    return Ok(IoStatus::Unsupported);
                }
                if let Err(e) = source.seek(position as u64) {
                    return stream_status(e, "Transfer failed.");
                }
            }
        }

        let status = self
            .platform
            .transfer_to(pinned_source.raw(), position as u64, count as u64, target)?;
        tracing::trace!(
            path = %file.path().display(),
            position,
            count,
            ?target,
            ?status,
            "transfer"
        );
        Ok(status)
    }

    /// `map0`: map `length` bytes of the stream's file from `position`.
    pub fn map(&self, stream: Option<&StreamRef>, mode: i32, position: i64, length: i64) -> BridgeResult<MappedRegion> {
        let stream = open_stream(stream)?;
        let file = stream
            .as_file()
            .ok_or_else(|| BridgeError::io("Map not supported."))?;
        let mode = MapMode::from_code(mode).ok_or(BridgeError::InvalidMapMode(mode))?;
        if position < 0 || length < 0 {
            return Err(BridgeError::io("File mapping failed."));
        }
        self.mapper.map(file, mode, position as u64, length as u64)
    }

    /// `unmap0`: release a region produced by [`FileChannelBridge::map`].
    pub fn unmap(&self, region: MappedRegion) -> BridgeResult<()> {
        self.mapper.unmap(region)
    }
}
