//! Guest I/O status codes
//!
//! Native I/O methods report a handful of expected outcomes as small negative
//! integers instead of raising. The values mirror `sun.nio.ch.IOStatus`.

/// Raw status constants as defined by the guest runtime.
pub mod io_status {
    /// End of stream reached
    pub const EOF: i64 = -1;
    /// Nothing available right now (would block)
    pub const UNAVAILABLE: i64 = -2;
    /// System call interrupted
    pub const INTERRUPTED: i64 = -3;
    /// Operation not supported
    pub const UNSUPPORTED: i64 = -4;
    /// Exception thrown in native code
    pub const THROWN: i64 = -5;
    /// This particular case is not supported, caller may fall back
    pub const UNSUPPORTED_CASE: i64 = -6;
}

/// Outcome of a native I/O call that completed without raising.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoStatus {
    /// Completed; carries a byte count or a position
    Ok(u64),
    /// End of stream
    Eof,
    /// Operation not supported on this stream
    Unsupported,
    /// Not supported for this combination of arguments
    UnsupportedCase,
    /// Would block, or the resource went away mid-call
    Unavailable,
    /// Interrupted by the platform
    Interrupted,
}

/// Result space of `transferTo`; identical to [`IoStatus`].
pub type TransferStatus = IoStatus;

impl IoStatus {
    /// Encode as the guest-visible `long`.
    pub fn to_raw(self) -> i64 {
        match self {
            IoStatus::Ok(n) => n.min(i64::MAX as u64) as i64,
            IoStatus::Eof => io_status::EOF,
            IoStatus::Unsupported => io_status::UNSUPPORTED,
            IoStatus::UnsupportedCase => io_status::UNSUPPORTED_CASE,
            IoStatus::Unavailable => io_status::UNAVAILABLE,
            IoStatus::Interrupted => io_status::INTERRUPTED,
        }
    }

    /// Decode a guest-visible `long`. `THROWN` has no status counterpart.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            n if n >= 0 => Some(IoStatus::Ok(n as u64)),
            io_status::EOF => Some(IoStatus::Eof),
            io_status::UNSUPPORTED => Some(IoStatus::Unsupported),
            io_status::UNSUPPORTED_CASE => Some(IoStatus::UnsupportedCase),
            io_status::UNAVAILABLE => Some(IoStatus::Unavailable),
            io_status::INTERRUPTED => Some(IoStatus::Interrupted),
            _ => None,
        }
    }

    /// Whether the call completed with a count/position.
    pub fn is_ok(self) -> bool {
        matches!(self, IoStatus::Ok(_))
    }

    /// Byte count or position, if any.
    pub fn value(self) -> Option<u64> {
        match self {
            IoStatus::Ok(n) => Some(n),
            _ => None,
        }
    }
}
