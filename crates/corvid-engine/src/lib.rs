//! Corvid Interop Engine
//!
//! The layer between a hosted guest runtime and the managed host it runs on:
//! - **Ghost tags**: weak, identity-keyed guest type tags for structural types
//!   the host cannot express (`ghost` module)
//! - **Accessors**: lazily resolved, first-writer-wins member accessors
//!   (`accessor` module)
//! - **Field access**: plain, unsafe, unsafe-volatile and compare-and-swap
//!   access plans for guest fields (`field` module)
//! - **Native libraries**: loading and export lookup with stdcall name
//!   probing (`ffi` module)
//! - **File channels**: position, kernel-assisted transfer and memory
//!   mapping for `FileChannelImpl` (`nio` module)
//! - **Natives**: the guest native-method table (`natives` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use corvid_engine::{Bridge, NativeFunctionRegistry, HostValue};
//!
//! let bridge = Bridge::new()?;
//! let natives = NativeFunctionRegistry::standard();
//! let init_ids = natives.get("sun.nio.ch.FileChannelImpl.initIDs").unwrap();
//! let granularity = init_ids(&bridge, &[])?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Lazily resolved member accessors
pub mod accessor;

/// Engine façade
pub mod bridge;

/// Tunables and guest-fixed constants
pub mod defaults;

/// Native library loading
pub mod ffi;

/// Field access plans
pub mod field;

/// Ghost type identity tags
pub mod ghost;

/// Host object model
pub mod host;

/// Guest native-method registry
pub mod natives;

/// File and channel support
pub mod nio;

/// Platform capability interface
pub mod platform;

/// Guest type model
pub mod types;

pub use accessor::{AccessorTable, AccessorTypeResolver, BaseAccessors, MemberSpec};
pub use bridge::{Bridge, BridgeOptions};
pub use corvid_sdk::{
    BridgeError, BridgeResult, ErrorKind, FieldKind, IoStatus, LoadError, MapMode, PrimitiveKind,
    TransferStatus,
};
pub use ffi::NativeLibrary;
pub use field::{CompiledField, FieldDescriptor, Strategy};
pub use ghost::TagStore;
pub use host::{HostClass, HostRef, HostValue, TypeRegistry};
pub use natives::{NativeFunctionRegistry, ResolvedNatives};
pub use nio::{FileChannelBridge, MappedRegion, PlatformMemoryMapper};
pub use platform::Platform;
pub use types::GuestTypeTag;
