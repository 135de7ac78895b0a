//! Error types shared by the interop layer

use std::io;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised by the native library loader
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Library file not found or could not be loaded
    #[error("Library not found: {path}")]
    NotFound {
        /// Path that was attempted, with the platform's reason
        path: String,
    },

    /// Symbol not found in library
    #[error("Symbol not found: {symbol} in {library}")]
    SymbolNotFound {
        /// Symbol name that was not found
        symbol: String,
        /// Library path
        library: String,
    },

    /// Platform-specific error
    #[error("Platform error: {0}")]
    PlatformError(String),

    /// Invalid path encoding
    #[error("Invalid UTF-8 in path: {0}")]
    InvalidPath(String),
}

/// Failure buckets. Callers pick a recovery policy per bucket, never per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Guest/host shape mismatch; fatal to the operation, never retried
    Configuration,
    /// Closed, non-seekable or otherwise unusable resource, or an OS I/O failure
    ResourceState,
    /// The OS refused memory for the request
    ResourceExhaustion,
    /// No implementation for the running platform family
    PlatformUnsupported,
    /// Guest cast failure
    ClassCast,
}

/// Errors raised by the interop layer
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// No host type registered under a guest-visible name
    #[error("Type not found: {0}")]
    TypeNotFound(String),

    /// Field, method or constructor absent, or present with another signature
    #[error("Member not found: {type_name}.{member}{signature}")]
    MemberNotFound {
        /// Declaring type
        type_name: String,
        /// Member name (`<init>` for constructors)
        member: String,
        /// Requested signature
        signature: String,
    },

    /// Compare-and-swap requested for a width the guest never uses it on
    #[error("Compare-and-swap is not supported on {0} fields")]
    UnsupportedCompareAndSwap(String),

    /// Protection code outside `MAP_RO`/`MAP_RW`/`MAP_PV`
    #[error("Invalid map mode: {0}")]
    InvalidMapMode(i32),

    /// A value of the wrong kind reached a typed slot or argument
    #[error("Type mismatch: expected {expected}, got {got}")]
    WrongValueKind {
        /// Expected kind
        expected: String,
        /// Actual kind
        got: String,
    },

    /// Instance member used without a receiver
    #[error("Null receiver for {0}")]
    NullReceiver(String),

    /// Guest-visible I/O failure
    #[error("{message}")]
    Io {
        /// Guest-visible message
        message: String,
        /// Underlying OS error, if any
        #[source]
        source: Option<io::Error>,
    },

    /// The OS refused memory for a mapping
    #[error("{0}")]
    OutOfMemory(String),

    /// No implementation for the running platform family
    #[error("Unsupported operation on platform.")]
    PlatformUnsupported,

    /// Guest cast failure
    #[error("{0}")]
    ClassCast(String),

    /// Native library failure
    #[error(transparent)]
    Library(#[from] LoadError),
}

impl BridgeError {
    /// I/O failure without an underlying OS error.
    pub fn io(message: impl Into<String>) -> Self {
        BridgeError::Io {
            message: message.into(),
            source: None,
        }
    }

    /// I/O failure wrapping an OS error.
    pub fn io_with(message: impl Into<String>, source: io::Error) -> Self {
        BridgeError::Io {
            message: message.into(),
            source: Some(source),
        }
    }

    /// The stream behind a descriptor is gone.
    pub fn stream_closed() -> Self {
        BridgeError::io("Stream closed.")
    }

    /// A member lookup failed.
    pub fn member_not_found(
        type_name: impl Into<String>,
        member: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        BridgeError::MemberNotFound {
            type_name: type_name.into(),
            member: member.into(),
            signature: signature.into(),
        }
    }

    /// A value had the wrong kind.
    pub fn wrong_kind(expected: impl Into<String>, got: impl Into<String>) -> Self {
        BridgeError::WrongValueKind {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::TypeNotFound(_)
            | BridgeError::MemberNotFound { .. }
            | BridgeError::UnsupportedCompareAndSwap(_)
            | BridgeError::InvalidMapMode(_)
            | BridgeError::WrongValueKind { .. }
            | BridgeError::NullReceiver(_) => ErrorKind::Configuration,
            BridgeError::Io { .. } | BridgeError::Library(_) => ErrorKind::ResourceState,
            BridgeError::OutOfMemory(_) => ErrorKind::ResourceExhaustion,
            BridgeError::PlatformUnsupported => ErrorKind::PlatformUnsupported,
            BridgeError::ClassCast(_) => ErrorKind::ClassCast,
        }
    }

    /// Guest throwable class this error surfaces as.
    pub fn guest_class(&self) -> &'static str {
        match self {
            BridgeError::TypeNotFound(_)
            | BridgeError::MemberNotFound { .. }
            | BridgeError::UnsupportedCompareAndSwap(_)
            | BridgeError::InvalidMapMode(_)
            | BridgeError::WrongValueKind { .. } => "java.lang.InternalError",
            BridgeError::NullReceiver(_) => "java.lang.NullPointerException",
            BridgeError::Io { .. } | BridgeError::PlatformUnsupported => "java.io.IOException",
            BridgeError::OutOfMemory(_) => "java.lang.OutOfMemoryError",
            BridgeError::ClassCast(_) => "java.lang.ClassCastException",
            BridgeError::Library(_) => "java.lang.UnsatisfiedLinkError",
        }
    }

    /// OS error code carried by an I/O failure.
    pub fn os_error(&self) -> Option<i32> {
        match self {
            BridgeError::Io {
                source: Some(source),
                ..
            } => source.raw_os_error(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            BridgeError::TypeNotFound("x".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            BridgeError::UnsupportedCompareAndSwap("byte".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(BridgeError::stream_closed().kind(), ErrorKind::ResourceState);
        assert_eq!(
            BridgeError::OutOfMemory("File mapping failed.".into()).kind(),
            ErrorKind::ResourceExhaustion
        );
        assert_eq!(
            BridgeError::PlatformUnsupported.kind(),
            ErrorKind::PlatformUnsupported
        );
        assert_eq!(BridgeError::ClassCast("x".into()).kind(), ErrorKind::ClassCast);
    }

    #[test]
    fn test_guest_classes() {
        assert_eq!(
            BridgeError::OutOfMemory(String::new()).guest_class(),
            "java.lang.OutOfMemoryError"
        );
        assert_eq!(BridgeError::io("x").guest_class(), "java.io.IOException");
        assert_eq!(
            BridgeError::NullReceiver("f".into()).guest_class(),
            "java.lang.NullPointerException"
        );
    }

    #[test]
    fn test_io_error_carries_os_code() {
        let err = BridgeError::io_with("Transfer failed.", io::Error::from_raw_os_error(5));
        assert_eq!(err.to_string(), "Transfer failed.");
        assert_eq!(err.os_error(), Some(5));
        assert_eq!(BridgeError::stream_closed().os_error(), None);
    }

    #[test]
    fn test_member_not_found_message() {
        let err = BridgeError::member_not_found("java.io.FileDescriptor", "stream", ":Ljava.lang.Object;");
        assert_eq!(
            err.to_string(),
            "Member not found: java.io.FileDescriptor.stream:Ljava.lang.Object;"
        );
    }

    #[test]
    fn test_load_error_converts() {
        let err: BridgeError = LoadError::NotFound {
            path: "/nope.so".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::ResourceState);
        assert_eq!(err.to_string(), "Library not found: /nope.so");
    }
}
