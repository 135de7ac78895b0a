//! Host object model
//!
//! The managed host environment the guest runs on: classes with reflectable
//! members, objects with atomic field storage and opaque native payloads.

pub mod bootstrap;
mod cell;
mod class;
mod object;
mod registry;

pub use cell::{FieldCell, ObjectSlot};
pub use class::{
    ConstructorThunk, FieldModifiers, HostClass, HostClassBuilder, HostConstructor, HostField,
    HostMethod, MethodThunk,
};
pub use object::{HostObject, HostRef, HostValue, Payload};
pub use registry::TypeRegistry;
