//! Host object instances and values

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use corvid_sdk::{BridgeError, BridgeResult};

use super::cell::FieldCell;
use super::class::HostClass;

/// Shared reference to a host object. Object identity is `Arc` identity.
pub type HostRef = Arc<HostObject>;

/// Opaque native resource carried by an object (a stream, a socket, a string).
pub type Payload = Arc<dyn Any + Send + Sync>;

/// An instance of a [`HostClass`].
pub struct HostObject {
    class: Arc<HostClass>,
    fields: Box<[FieldCell]>,
    payload: Option<Payload>,
}

impl HostObject {
    pub(crate) fn new(class: Arc<HostClass>, payload: Option<Payload>) -> HostRef {
        let fields = class
            .fields()
            .iter()
            .filter(|f| !f.modifiers().is_static)
            .map(|f| FieldCell::new(f.kind()))
            .collect();
        Arc::new(HostObject {
            class,
            fields,
            payload,
        })
    }

    /// Runtime class.
    pub fn class(&self) -> &Arc<HostClass> {
        &self.class
    }

    /// Runtime class name.
    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    /// Instance field storage by slot.
    pub fn field(&self, slot: usize) -> BridgeResult<&FieldCell> {
        self.fields.get(slot).ok_or_else(|| {
            BridgeError::member_not_found(self.class.name(), format!("#{}", slot), "")
        })
    }

    /// Native payload, if it has type `T`.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref::<T>()
    }

    /// Whether this object carries any payload.
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("class", &self.class.name())
            .field("fields", &self.fields.len())
            .field("payload", &self.payload.is_some())
            .finish()
    }
}

/// A value crossing the field/method boundary.
#[derive(Clone, Debug)]
pub enum HostValue {
    /// Null reference
    Null,
    /// `boolean`
    Boolean(bool),
    /// `byte`
    Byte(i8),
    /// `char` (UTF-16 code unit)
    Char(u16),
    /// `short`
    Short(i16),
    /// `int`
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// Object reference; a value-type class instance is that value's boxed form
    Ref(HostRef),
}

impl HostValue {
    /// Short name of the value's kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Boolean(_) => "boolean",
            HostValue::Byte(_) => "byte",
            HostValue::Char(_) => "char",
            HostValue::Short(_) => "short",
            HostValue::Int(_) => "int",
            HostValue::Long(_) => "long",
            HostValue::Float(_) => "float",
            HostValue::Double(_) => "double",
            HostValue::Ref(_) => "reference",
        }
    }

    /// Whether this is the null reference.
    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    /// The referenced object, if any.
    pub fn as_object(&self) -> Option<&HostRef> {
        match self {
            HostValue::Ref(obj) => Some(obj),
            _ => None,
        }
    }

    /// `int` value.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            HostValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// `long` value.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            HostValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// `boolean` value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Guest string contents, if this references a `java.lang.String`.
    pub fn as_str(&self) -> Option<&str> {
        self.as_object()?.payload::<String>().map(String::as_str)
    }

    /// A reference argument as an optional object; anything else is a kind error.
    pub fn to_object(&self) -> BridgeResult<Option<HostRef>> {
        match self {
            HostValue::Null => Ok(None),
            HostValue::Ref(obj) => Ok(Some(obj.clone())),
            other => Err(BridgeError::wrong_kind("reference", other.kind_name())),
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Boolean(a), HostValue::Boolean(b)) => a == b,
            (HostValue::Byte(a), HostValue::Byte(b)) => a == b,
            (HostValue::Char(a), HostValue::Char(b)) => a == b,
            (HostValue::Short(a), HostValue::Short(b)) => a == b,
            (HostValue::Int(a), HostValue::Int(b)) => a == b,
            (HostValue::Long(a), HostValue::Long(b)) => a == b,
            (HostValue::Float(a), HostValue::Float(b)) => a.to_bits() == b.to_bits(),
            (HostValue::Double(a), HostValue::Double(b)) => a.to_bits() == b.to_bits(),
            (HostValue::Ref(a), HostValue::Ref(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        HostValue::Boolean(v)
    }
}

impl From<i32> for HostValue {
    fn from(v: i32) -> Self {
        HostValue::Int(v)
    }
}

impl From<i64> for HostValue {
    fn from(v: i64) -> Self {
        HostValue::Long(v)
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Double(v)
    }
}

impl From<HostRef> for HostValue {
    fn from(v: HostRef) -> Self {
        HostValue::Ref(v)
    }
}

impl From<Option<HostRef>> for HostValue {
    fn from(v: Option<HostRef>) -> Self {
        v.map_or(HostValue::Null, HostValue::Ref)
    }
}
