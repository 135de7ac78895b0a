//! Default constants for the interop layer.
//!
//! Values the guest runtime fixes (status codes, map modes) live in
//! `corvid-sdk`; this module holds the engine's own tunables.

/// Bytes per send for kernel-assisted file transmission on Win32.
pub const TRANSMIT_PACKET_SIZE: u32 = 524_288;

/// Longest undecorated export name that is still probed in `_name@N` form.
pub const MAX_DECORATED_NAME_LEN: usize = 512 - 11;

/// Tag insertions between sweeps of entries whose object has been dropped.
pub const TAG_PURGE_INTERVAL: usize = 1024;

/// Largest byte count handed to a single `sendfile` call.
pub const MAX_SENDFILE_CHUNK: u64 = 0x7fff_f000;

/// Guest `FileChannelImpl.MAP_RO`.
pub const MAP_RO: i32 = 0;

/// Guest `FileChannelImpl.MAP_RW`.
pub const MAP_RW: i32 = 1;

/// Guest `FileChannelImpl.MAP_PV`.
pub const MAP_PV: i32 = 2;
