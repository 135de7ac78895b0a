//! Native library loading for guest native methods
//!
//! [`NativeLibrary`] owns a loaded library; the free functions work on raw
//! [`LibraryHandle`](crate::platform::LibraryHandle)s for callers that track
//! liveness themselves.

pub mod loader;

pub use corvid_sdk::LoadError;
pub use loader::{free_library, get_export, load_library, NativeLibrary};
