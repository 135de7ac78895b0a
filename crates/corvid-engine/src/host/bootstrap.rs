//! Runtime classes the file natives and accessor families resolve against

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use corvid_sdk::{BridgeError, BridgeResult};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use super::class::{FieldModifiers, HostClass};
use super::object::{HostRef, HostValue};
use super::registry::TypeRegistry;
use crate::nio::stream::{SocketHandle, StreamRef};

/// Guest string class; instances carry a `String` payload.
pub const STRING: &str = "java.lang.String";
/// Host stream wrapper; instances carry a [`StreamRef`] payload.
pub const STREAM: &str = "cli.System.IO.Stream";
/// Host socket wrapper; instances carry a [`SocketHandle`] payload.
pub const SOCKET: &str = "cli.System.Net.Sockets.Socket";
/// `java.io.FileDescriptor`
pub const FILE_DESCRIPTOR: &str = "java.io.FileDescriptor";
/// `sun.nio.ch.FileChannelImpl`
pub const FILE_CHANNEL_IMPL: &str = "sun.nio.ch.FileChannelImpl";
/// `java.io.RandomAccessFile`
pub const RANDOM_ACCESS_FILE: &str = "java.io.RandomAccessFile";
/// `java.util.Properties`
pub const PROPERTIES: &str = "java.util.Properties";
/// Iterator over a host enumerator
pub const ENUMERATOR_ITERATOR: &str = "corvid.lang.EnumeratorIterator";

/// `Lcli.System.IO.Stream;`
pub const STREAM_SIG: &str = "Lcli.System.IO.Stream;";
/// `Lcli.System.Net.Sockets.Socket;`
pub const SOCKET_SIG: &str = "Lcli.System.Net.Sockets.Socket;";
/// `Ljava.io.FileDescriptor;`
pub const FILE_DESCRIPTOR_SIG: &str = "Ljava.io.FileDescriptor;";
/// `Ljava.lang.Object;`
pub const OBJECT_SIG: &str = "Ljava.lang.Object;";
/// `Properties.getProperty`
pub const GET_PROPERTY_SIG: &str = "(Ljava.lang.String;)Ljava.lang.String;";
/// `Properties.setProperty`
pub const SET_PROPERTY_SIG: &str = "(Ljava.lang.String;Ljava.lang.String;)Ljava.lang.Object;";
/// No-argument constructor
pub const DEFAULT_CTOR_SIG: &str = "()V";
/// `EnumeratorIterator(Object)`
pub const ENUMERATOR_CTOR_SIG: &str = "(Ljava.lang.Object;)V";

type PropertyMap = Mutex<HashMap<String, String>>;

static STRING_CLASS: OnceCell<Arc<HostClass>> = OnceCell::new();
static STREAM_CLASS: OnceCell<Arc<HostClass>> = OnceCell::new();
static SOCKET_CLASS: OnceCell<Arc<HostClass>> = OnceCell::new();

fn wrapper_class(cell: &'static OnceCell<Arc<HostClass>>, name: &str) -> BridgeResult<&'static Arc<HostClass>> {
    cell.get_or_try_init(|| HostClass::builder(name).build())
}

/// A guest string.
pub fn new_string(value: impl Into<String>) -> BridgeResult<HostRef> {
    let class = wrapper_class(&STRING_CLASS, STRING)?;
    let value: String = value.into();
    Ok(class.instantiate_with(Arc::new(value)))
}

/// Wrap a host stream as a guest-visible object.
pub fn wrap_stream(stream: StreamRef) -> BridgeResult<HostRef> {
    let class = wrapper_class(&STREAM_CLASS, STREAM)?;
    Ok(class.instantiate_with(Arc::new(stream)))
}

/// Wrap a socket as a guest-visible object.
pub fn wrap_socket(socket: SocketHandle) -> BridgeResult<HostRef> {
    let class = wrapper_class(&SOCKET_CLASS, SOCKET)?;
    Ok(class.instantiate_with(Arc::new(socket)))
}

/// The host stream behind a wrapper object.
pub fn stream_of(obj: &HostRef) -> Option<&StreamRef> {
    obj.payload::<StreamRef>()
}

/// The socket behind a wrapper object.
pub fn socket_of(obj: &HostRef) -> Option<&SocketHandle> {
    obj.payload::<SocketHandle>()
}

fn string_arg(args: &[HostValue], index: usize, method: &str) -> BridgeResult<String> {
    match args.get(index) {
        Some(HostValue::Null) => Err(BridgeError::NullReceiver(method.to_string())),
        Some(value) => value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BridgeError::wrong_kind(STRING, value.kind_name())),
        None => Err(BridgeError::wrong_kind(
            format!("{} arguments", index + 1),
            args.len().to_string(),
        )),
    }
}

fn property_map<'a>(receiver: Option<&'a HostRef>, method: &str) -> BridgeResult<&'a PropertyMap> {
    let receiver = receiver.ok_or_else(|| BridgeError::NullReceiver(method.to_string()))?;
    receiver
        .payload::<PropertyMap>()
        .ok_or_else(|| BridgeError::wrong_kind(PROPERTIES, receiver.class_name().to_string()))
}

fn store_arg(obj: &HostRef, slot: usize, args: &[HostValue]) -> BridgeResult<()> {
    let value = args
        .first()
        .ok_or_else(|| BridgeError::wrong_kind("1 argument", "0"))?;
    obj.field(slot)?.store(value, Ordering::Release)
}

/// Register every runtime class, including the payload wrappers.
pub fn register_runtime_classes(registry: &TypeRegistry) -> BridgeResult<()> {
    registry.register(wrapper_class(&STRING_CLASS, STRING)?.clone());
    registry.register(wrapper_class(&STREAM_CLASS, STREAM)?.clone());
    registry.register(wrapper_class(&SOCKET_CLASS, SOCKET)?.clone());

    registry.register(
        HostClass::builder(FILE_DESCRIPTOR)
            .field("stream", STREAM_SIG, FieldModifiers::INSTANCE.with_volatile())
            .field("socket", SOCKET_SIG, FieldModifiers::INSTANCE.with_volatile())
            .constructor(DEFAULT_CTOR_SIG, |class, _| Ok(class.instantiate()))
            .build()?,
    );

    registry.register(
        HostClass::builder(FILE_CHANNEL_IMPL)
            .field("fd", FILE_DESCRIPTOR_SIG, FieldModifiers::INSTANCE.with_final())
            .constructor("(Ljava.io.FileDescriptor;)V", |class, args| {
                let obj = class.instantiate();
                store_arg(&obj, 0, args)?;
                Ok(obj)
            })
            .build()?,
    );

    registry.register(
        HostClass::builder(RANDOM_ACCESS_FILE)
            .field("fd", FILE_DESCRIPTOR_SIG, FieldModifiers::INSTANCE)
            .constructor(DEFAULT_CTOR_SIG, |class, _| Ok(class.instantiate()))
            .build()?,
    );

    registry.register(
        HostClass::builder(PROPERTIES)
            .method("getProperty", GET_PROPERTY_SIG, |receiver, args| {
                let map = property_map(receiver, "getProperty")?;
                let key = string_arg(args, 0, "getProperty")?;
                let value = map.lock().get(&key).cloned();
                match value {
                    Some(value) => Ok(HostValue::Ref(new_string(value)?)),
                    None => Ok(HostValue::Null),
                }
            })
            .method("setProperty", SET_PROPERTY_SIG, |receiver, args| {
                let map = property_map(receiver, "setProperty")?;
                let key = string_arg(args, 0, "setProperty")?;
                let value = string_arg(args, 1, "setProperty")?;
                let previous = map.lock().insert(key, value);
                match previous {
                    Some(previous) => Ok(HostValue::Ref(new_string(previous)?)),
                    None => Ok(HostValue::Null),
                }
            })
            .constructor(DEFAULT_CTOR_SIG, |class, _| {
                let map: PropertyMap = Mutex::new(HashMap::new());
                Ok(class.instantiate_with(Arc::new(map)))
            })
            .build()?,
    );

    registry.register(
        HostClass::builder(ENUMERATOR_ITERATOR)
            .field("enumerator", OBJECT_SIG, FieldModifiers::INSTANCE.with_final())
            .constructor(ENUMERATOR_CTOR_SIG, |class, args| {
                let obj = class.instantiate();
                store_arg(&obj, 0, args)?;
                Ok(obj)
            })
            .build()?,
    );

    tracing::debug!(classes = registry.len(), "registered runtime classes");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nio::stream::PipeStream;

    #[test]
    fn test_runtime_classes_registered() {
        let registry = TypeRegistry::new();
        register_runtime_classes(&registry).unwrap();
        for name in [
            STRING,
            STREAM,
            SOCKET,
            FILE_DESCRIPTOR,
            FILE_CHANNEL_IMPL,
            RANDOM_ACCESS_FILE,
            PROPERTIES,
            ENUMERATOR_ITERATOR,
        ] {
            assert!(registry.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_wrappers_share_class() {
        let a = new_string("a").unwrap();
        let b = new_string("b").unwrap();
        assert!(Arc::ptr_eq(a.class(), b.class()));
        assert_eq!(HostValue::Ref(a).as_str(), Some("a"));

        let stream: StreamRef = Arc::new(PipeStream::new());
        let wrapped = wrap_stream(stream).unwrap();
        assert!(stream_of(&wrapped).is_some());
        assert!(socket_of(&wrapped).is_none());
    }
}
