//! Corvid SDK - shared vocabulary for native-method implementations
//!
//! This crate holds the small set of types that guest native methods and the
//! interop engine exchange without depending on the engine itself:
//!
//! - The error taxonomy (`BridgeError`, `ErrorKind`, `LoadError`)
//! - Guest I/O status codes (`IoStatus`, `TransferStatus`)
//! - Field and primitive kinds (`FieldKind`, `PrimitiveKind`)
//! - Memory-mapping protection modes (`MapMode`)

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod error;
mod kinds;
mod status;

pub use error::{BridgeError, BridgeResult, ErrorKind, LoadError};
pub use kinds::{FieldKind, MapMode, PrimitiveKind};
pub use status::{io_status, IoStatus, TransferStatus};
