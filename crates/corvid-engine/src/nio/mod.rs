//! File and channel support for the guest I/O natives
//!
//! - [`stream`]: host streams and sockets carried by guest descriptors
//! - [`fd`]: opening files, including atomic append
//! - [`mmap`]: mapping file regions with memory-pressure accounting
//! - [`channel`]: `FileChannelImpl` position, transfer and map operations
//! - [`pressure`]: off-heap memory accounting

pub mod channel;
pub mod fd;
pub mod mmap;
pub mod pressure;
pub mod stream;

pub use channel::{Destination, FileChannelBridge};
pub use fd::{FileAccess, FileMode};
pub use mmap::{MappedRegion, PlatformMemoryMapper};
pub use pressure::{ExternalMemory, MemoryPressure};
pub use stream::{FileStream, PinnedHandle, PipeStream, SocketHandle, Stream, StreamRef};
