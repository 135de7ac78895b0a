//! Atomic field storage
//!
//! Every host field is backed by a cell of its exact width. Primitive cells are
//! std atomics; reference cells are epoch-reclaimed pointers so a concurrent
//! reader never observes a freed object.

use std::sync::atomic::{
    AtomicBool, AtomicI16, AtomicI32, AtomicI64, AtomicI8, AtomicU16, AtomicU32, AtomicU64,
    Ordering,
};
use std::sync::Arc;

use corvid_sdk::{BridgeError, BridgeResult, FieldKind, PrimitiveKind};
use crossbeam::epoch::{self, Atomic, Owned, Shared};

use super::object::{HostRef, HostValue};

/// Storage for one field.
#[derive(Debug)]
pub enum FieldCell {
    /// `boolean`
    Boolean(AtomicBool),
    /// `byte`
    Byte(AtomicI8),
    /// `char`
    Char(AtomicU16),
    /// `short`
    Short(AtomicI16),
    /// `int`
    Int(AtomicI32),
    /// `long`
    Long(AtomicI64),
    /// `float`, stored as bits
    Float(AtomicU32),
    /// `double`, stored as bits
    Double(AtomicU64),
    /// Object reference
    Object(ObjectSlot),
}

impl FieldCell {
    /// A zero-initialized cell of the given kind.
    pub fn new(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Primitive(p) => match p {
                PrimitiveKind::Boolean => FieldCell::Boolean(AtomicBool::new(false)),
                PrimitiveKind::Byte => FieldCell::Byte(AtomicI8::new(0)),
                PrimitiveKind::Char => FieldCell::Char(AtomicU16::new(0)),
                PrimitiveKind::Short => FieldCell::Short(AtomicI16::new(0)),
                PrimitiveKind::Int => FieldCell::Int(AtomicI32::new(0)),
                PrimitiveKind::Long => FieldCell::Long(AtomicI64::new(0)),
                PrimitiveKind::Float => FieldCell::Float(AtomicU32::new(0)),
                PrimitiveKind::Double => FieldCell::Double(AtomicU64::new(0)),
            },
            FieldKind::Reference => FieldCell::Object(ObjectSlot::new()),
        }
    }

    /// Storage kind of this cell.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldCell::Boolean(_) => FieldKind::Primitive(PrimitiveKind::Boolean),
            FieldCell::Byte(_) => FieldKind::Primitive(PrimitiveKind::Byte),
            FieldCell::Char(_) => FieldKind::Primitive(PrimitiveKind::Char),
            FieldCell::Short(_) => FieldKind::Primitive(PrimitiveKind::Short),
            FieldCell::Int(_) => FieldKind::Primitive(PrimitiveKind::Int),
            FieldCell::Long(_) => FieldKind::Primitive(PrimitiveKind::Long),
            FieldCell::Float(_) => FieldKind::Primitive(PrimitiveKind::Float),
            FieldCell::Double(_) => FieldKind::Primitive(PrimitiveKind::Double),
            FieldCell::Object(_) => FieldKind::Reference,
        }
    }

    /// Load with the given ordering (`Relaxed`, `Acquire` or `SeqCst`).
    pub fn load(&self, order: Ordering) -> HostValue {
        match self {
            FieldCell::Boolean(a) => HostValue::Boolean(a.load(order)),
            FieldCell::Byte(a) => HostValue::Byte(a.load(order)),
            FieldCell::Char(a) => HostValue::Char(a.load(order)),
            FieldCell::Short(a) => HostValue::Short(a.load(order)),
            FieldCell::Int(a) => HostValue::Int(a.load(order)),
            FieldCell::Long(a) => HostValue::Long(a.load(order)),
            FieldCell::Float(a) => HostValue::Float(f32::from_bits(a.load(order))),
            FieldCell::Double(a) => HostValue::Double(f64::from_bits(a.load(order))),
            FieldCell::Object(slot) => match slot.load(order) {
                Some(obj) => HostValue::Ref(obj),
                None => HostValue::Null,
            },
        }
    }

    /// Store with the given ordering (`Relaxed`, `Release` or `SeqCst`).
    pub fn store(&self, value: &HostValue, order: Ordering) -> BridgeResult<()> {
        match (self, value) {
            (FieldCell::Boolean(a), HostValue::Boolean(v)) => a.store(*v, order),
            (FieldCell::Byte(a), HostValue::Byte(v)) => a.store(*v, order),
            (FieldCell::Char(a), HostValue::Char(v)) => a.store(*v, order),
            (FieldCell::Short(a), HostValue::Short(v)) => a.store(*v, order),
            (FieldCell::Int(a), HostValue::Int(v)) => a.store(*v, order),
            (FieldCell::Long(a), HostValue::Long(v)) => a.store(*v, order),
            (FieldCell::Float(a), HostValue::Float(v)) => a.store(v.to_bits(), order),
            (FieldCell::Double(a), HostValue::Double(v)) => a.store(v.to_bits(), order),
            (FieldCell::Object(slot), HostValue::Null) => slot.store(None, order),
            (FieldCell::Object(slot), HostValue::Ref(obj)) => slot.store(Some(obj.clone()), order),
            _ => return Err(self.mismatch(value)),
        }
        Ok(())
    }

    /// Atomic compare-and-exchange. Only `int`, `long`, `double` and reference
    /// cells support it; doubles compare by bit pattern, references by identity.
    pub fn compare_exchange(&self, expected: &HostValue, update: &HostValue) -> BridgeResult<bool> {
        const ORDER: Ordering = Ordering::SeqCst;
        match self {
            FieldCell::Int(a) => match (expected, update) {
                (HostValue::Int(e), HostValue::Int(u)) => {
                    Ok(a.compare_exchange(*e, *u, ORDER, ORDER).is_ok())
                }
                _ => Err(self.mismatch_pair(expected, update)),
            },
            FieldCell::Long(a) => match (expected, update) {
                (HostValue::Long(e), HostValue::Long(u)) => {
                    Ok(a.compare_exchange(*e, *u, ORDER, ORDER).is_ok())
                }
                _ => Err(self.mismatch_pair(expected, update)),
            },
            FieldCell::Double(a) => match (expected, update) {
                (HostValue::Double(e), HostValue::Double(u)) => Ok(a
                    .compare_exchange(e.to_bits(), u.to_bits(), ORDER, ORDER)
                    .is_ok()),
                _ => Err(self.mismatch_pair(expected, update)),
            },
            FieldCell::Object(slot) => {
                let expected = match expected {
                    HostValue::Null => None,
                    HostValue::Ref(obj) => Some(obj),
                    other => return Err(self.mismatch(other)),
                };
                let update = match update {
                    HostValue::Null => None,
                    HostValue::Ref(obj) => Some(obj.clone()),
                    other => return Err(self.mismatch(other)),
                };
                Ok(slot.compare_exchange(expected, update))
            }
            other => Err(BridgeError::UnsupportedCompareAndSwap(other.kind().to_string())),
        }
    }

    fn mismatch(&self, value: &HostValue) -> BridgeError {
        BridgeError::wrong_kind(self.kind().to_string(), value.kind_name())
    }

    fn mismatch_pair(&self, expected: &HostValue, update: &HostValue) -> BridgeError {
        let got = if expected.kind_name() == self.kind().to_string() {
            update
        } else {
            expected
        };
        self.mismatch(got)
    }
}

/// Reference cell. Null is the absence of a pointer.
pub struct ObjectSlot {
    ptr: Atomic<HostRef>,
}

impl ObjectSlot {
    /// An empty (null) slot.
    pub fn new() -> Self {
        ObjectSlot { ptr: Atomic::null() }
    }

    /// Read the current reference.
    pub fn load(&self, order: Ordering) -> Option<HostRef> {
        let guard = epoch::pin();
        let current = self.ptr.load(order, &guard);
        // SAFETY: the pointee is only reclaimed after every pinned guard is released
        unsafe { current.as_ref() }.cloned()
    }

    /// Replace the current reference.
    pub fn store(&self, value: Option<HostRef>, order: Ordering) {
        let guard = epoch::pin();
        let old = match value {
            Some(obj) => self.ptr.swap(Owned::new(obj), order, &guard),
            None => self.ptr.swap(Shared::null(), order, &guard),
        };
        if !old.is_null() {
            // SAFETY: `old` was unlinked by the swap above
            unsafe { guard.defer_destroy(old) };
        }
    }

    /// Install `update` iff the slot currently holds `expected` (by identity).
    pub fn compare_exchange(&self, expected: Option<&HostRef>, update: Option<HostRef>) -> bool {
        const ORDER: Ordering = Ordering::SeqCst;
        let guard = epoch::pin();
        let mut pending = update.map(Owned::new);
        loop {
            let current = self.ptr.load(ORDER, &guard);
            // SAFETY: protected by `guard`
            let holds_expected = match (unsafe { current.as_ref() }, expected) {
                (None, None) => true,
                (Some(cur), Some(exp)) => Arc::ptr_eq(cur, exp),
                _ => false,
            };
            if !holds_expected {
                return false;
            }
            let result = match pending.take() {
                Some(owned) => self
                    .ptr
                    .compare_exchange(current, owned, ORDER, ORDER, &guard)
                    .map_err(|e| Some(e.new)),
                None => self
                    .ptr
                    .compare_exchange(current, Shared::null(), ORDER, ORDER, &guard)
                    .map_err(|_| None),
            };
            match result {
                Ok(_) => {
                    if !current.is_null() {
                        // SAFETY: `current` was unlinked by the exchange above
                        unsafe { guard.defer_destroy(current) };
                    }
                    return true;
                }
                // lost a race with another writer; re-check identity
                Err(back) => pending = back,
            }
        }
    }
}

impl Default for ObjectSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ObjectSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.load(Ordering::Relaxed) {
            Some(obj) => write!(f, "ObjectSlot({})", obj.class_name()),
            None => f.write_str("ObjectSlot(null)"),
        }
    }
}

impl Drop for ObjectSlot {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no other thread can reach this slot
        unsafe {
            let guard = epoch::unprotected();
            let current = self.ptr.load(Ordering::Relaxed, guard);
            if !current.is_null() {
                drop(current.into_owned());
            }
        }
    }
}
