//! Accessor families for the runtime classes the file natives touch

use std::sync::Arc;

use corvid_sdk::{BridgeError, BridgeResult};

use super::{AccessorTable, AccessorTypeResolver, MemberSpec, SlotId};
use crate::host::bootstrap::{
    self, DEFAULT_CTOR_SIG, ENUMERATOR_CTOR_SIG, ENUMERATOR_ITERATOR, FILE_CHANNEL_IMPL,
    FILE_DESCRIPTOR, FILE_DESCRIPTOR_SIG, GET_PROPERTY_SIG, PROPERTIES, RANDOM_ACCESS_FILE,
    SET_PROPERTY_SIG, SOCKET_SIG, STREAM_SIG,
};
use crate::host::{HostRef, HostValue};

fn as_object(value: HostValue) -> BridgeResult<Option<HostRef>> {
    value.to_object()
}

fn as_string(value: HostValue) -> BridgeResult<Option<String>> {
    match value {
        HostValue::Null => Ok(None),
        other => other
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| BridgeError::wrong_kind(bootstrap::STRING, other.kind_name())),
    }
}

/// `java.io.FileDescriptor`: the host stream or socket behind a descriptor.
#[derive(Debug, Clone)]
pub struct FileDescriptorAccessor {
    table: Arc<AccessorTable>,
    stream: SlotId,
    socket: SlotId,
    constructor: SlotId,
}

impl FileDescriptorAccessor {
    /// A new, empty descriptor.
    pub fn create(&self) -> BridgeResult<HostRef> {
        self.table.constructor(self.constructor)?.invoke(&[])
    }

    /// The stream wrapper object, or `None`.
    pub fn stream(&self, fd: &HostRef) -> BridgeResult<Option<HostRef>> {
        as_object(self.table.field(self.stream)?.get(Some(fd))?)
    }

    /// Replace the stream wrapper object.
    pub fn set_stream(&self, fd: &HostRef, stream: Option<HostRef>) -> BridgeResult<()> {
        self.table.field(self.stream)?.set(Some(fd), &stream.into())
    }

    /// The socket wrapper object, or `None`.
    pub fn socket(&self, fd: &HostRef) -> BridgeResult<Option<HostRef>> {
        as_object(self.table.field(self.socket)?.get(Some(fd))?)
    }

    /// Replace the socket wrapper object.
    pub fn set_socket(&self, fd: &HostRef, socket: Option<HostRef>) -> BridgeResult<()> {
        self.table.field(self.socket)?.set(Some(fd), &socket.into())
    }
}

/// `sun.nio.ch.FileChannelImpl`: the descriptor a channel was opened on.
#[derive(Debug, Clone)]
pub struct FileChannelImplAccessor {
    table: Arc<AccessorTable>,
    fd: SlotId,
    constructor: SlotId,
}

impl FileChannelImplAccessor {
    /// A channel over `fd`.
    pub fn create(&self, fd: &HostRef) -> BridgeResult<HostRef> {
        self.table
            .constructor(self.constructor)?
            .invoke(&[HostValue::Ref(fd.clone())])
    }

    /// The channel's descriptor.
    pub fn fd(&self, channel: &HostRef) -> BridgeResult<Option<HostRef>> {
        as_object(self.table.field(self.fd)?.get(Some(channel))?)
    }
}

/// `java.io.RandomAccessFile`: descriptor get/set.
#[derive(Debug, Clone)]
pub struct RandomAccessFileAccessor {
    table: Arc<AccessorTable>,
    fd: SlotId,
}

impl RandomAccessFileAccessor {
    /// The file's descriptor.
    pub fn fd(&self, raf: &HostRef) -> BridgeResult<Option<HostRef>> {
        as_object(self.table.field(self.fd)?.get(Some(raf))?)
    }

    /// Replace the file's descriptor.
    pub fn set_fd(&self, raf: &HostRef, fd: Option<HostRef>) -> BridgeResult<()> {
        self.table.field(self.fd)?.set(Some(raf), &fd.into())
    }
}

/// `java.util.Properties`: property lookup and update.
#[derive(Debug, Clone)]
pub struct PropertiesAccessor {
    table: Arc<AccessorTable>,
    get_property: SlotId,
    set_property: SlotId,
}

impl PropertiesAccessor {
    /// `props.getProperty(key)`.
    pub fn get_property(&self, props: &HostRef, key: &str) -> BridgeResult<Option<String>> {
        let key = HostValue::Ref(bootstrap::new_string(key)?);
        as_string(self.table.method(self.get_property)?.invoke(Some(props), &[key])?)
    }

    /// `props.setProperty(key, value)`; returns the previous value.
    pub fn set_property(&self, props: &HostRef, key: &str, value: &str) -> BridgeResult<Option<String>> {
        let args = [
            HostValue::Ref(bootstrap::new_string(key)?),
            HostValue::Ref(bootstrap::new_string(value)?),
        ];
        as_string(self.table.method(self.set_property)?.invoke(Some(props), &args)?)
    }
}

/// Iterator adapter over a host enumerator: constructor invoker.
#[derive(Debug, Clone)]
pub struct EnumeratorIteratorAccessor {
    table: Arc<AccessorTable>,
    constructor: SlotId,
}

impl EnumeratorIteratorAccessor {
    /// `new EnumeratorIterator(enumerator)`.
    pub fn create(&self, enumerator: Option<HostRef>) -> BridgeResult<HostRef> {
        self.table
            .constructor(self.constructor)?
            .invoke(&[enumerator.into()])
    }
}

/// Accessor families shared by the runtime natives, backed by one table.
#[derive(Debug, Clone)]
pub struct BaseAccessors {
    table: Arc<AccessorTable>,
    file_descriptor: FileDescriptorAccessor,
    file_channel: FileChannelImplAccessor,
    random_access_file: RandomAccessFileAccessor,
    properties: PropertiesAccessor,
    enumerator_iterator: EnumeratorIteratorAccessor,
}

impl BaseAccessors {
    /// Declare every family member. Nothing is resolved until first use.
    pub fn new(resolver: Arc<dyn AccessorTypeResolver>) -> Self {
        let mut builder = AccessorTable::builder();
        let fd_stream = builder.declare(MemberSpec::field(FILE_DESCRIPTOR, "stream", STREAM_SIG));
        let fd_socket = builder.declare(MemberSpec::field(FILE_DESCRIPTOR, "socket", SOCKET_SIG));
        let fd_ctor = builder.declare(MemberSpec::constructor(FILE_DESCRIPTOR, DEFAULT_CTOR_SIG));
        let channel_fd =
            builder.declare(MemberSpec::field(FILE_CHANNEL_IMPL, "fd", FILE_DESCRIPTOR_SIG));
        let channel_ctor = builder.declare(MemberSpec::constructor(
            FILE_CHANNEL_IMPL,
            "(Ljava.io.FileDescriptor;)V",
        ));
        let raf_fd =
            builder.declare(MemberSpec::field(RANDOM_ACCESS_FILE, "fd", FILE_DESCRIPTOR_SIG));
        let get_property =
            builder.declare(MemberSpec::method(PROPERTIES, "getProperty", GET_PROPERTY_SIG));
        let set_property =
            builder.declare(MemberSpec::method(PROPERTIES, "setProperty", SET_PROPERTY_SIG));
        let enumerator_ctor =
            builder.declare(MemberSpec::constructor(ENUMERATOR_ITERATOR, ENUMERATOR_CTOR_SIG));
        let table = Arc::new(builder.build(resolver));

        Self {
            file_descriptor: FileDescriptorAccessor {
                table: table.clone(),
                stream: fd_stream,
                socket: fd_socket,
                constructor: fd_ctor,
            },
            file_channel: FileChannelImplAccessor {
                table: table.clone(),
                fd: channel_fd,
                constructor: channel_ctor,
            },
            random_access_file: RandomAccessFileAccessor {
                table: table.clone(),
                fd: raf_fd,
            },
            properties: PropertiesAccessor {
                table: table.clone(),
                get_property,
                set_property,
            },
            enumerator_iterator: EnumeratorIteratorAccessor {
                table: table.clone(),
                constructor: enumerator_ctor,
            },
            table,
        }
    }

    /// The shared slot arena.
    pub fn table(&self) -> &AccessorTable {
        &self.table
    }

    /// `java.io.FileDescriptor`
    pub fn file_descriptor(&self) -> &FileDescriptorAccessor {
        &self.file_descriptor
    }

    /// `sun.nio.ch.FileChannelImpl`
    pub fn file_channel(&self) -> &FileChannelImplAccessor {
        &self.file_channel
    }

    /// `java.io.RandomAccessFile`
    pub fn random_access_file(&self) -> &RandomAccessFileAccessor {
        &self.random_access_file
    }

    /// `java.util.Properties`
    pub fn properties(&self) -> &PropertiesAccessor {
        &self.properties
    }

    /// Enumerator-backed iterator
    pub fn enumerator_iterator(&self) -> &EnumeratorIteratorAccessor {
        &self.enumerator_iterator
    }
}
