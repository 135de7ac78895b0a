//! Access plan vocabulary and generator
//!
//! Each guest field access compiles to a short, fixed sequence of [`FieldOp`]s.
//! The sequences reproduce guest memory-model rules: where barriers sit, when a
//! 64-bit value must take the atomic path, and when a value-type receiver
//! must be unboxed first.

use std::sync::Arc;

use corvid_sdk::{BridgeError, BridgeResult, FieldKind, PrimitiveKind};

use super::FieldDescriptor;

/// Ordering attached to a load or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// No ordering beyond a naturally aligned same-width access
    Plain,
    /// Guest volatile: acquire on load, release on store
    Volatile,
}

/// One step of an access plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Locate the field in the declaring class's static storage
    LoadStatic,
    /// Locate the field in a non-null receiver of the declaring type
    LoadReceiver,
    /// Unbox a value-type receiver, then locate the field in it
    Unbox,
    /// Full two-way memory fence
    MemoryBarrier,
    /// Load from the located field
    Load(Order),
    /// Store to the located field
    Store(Order),
    /// Materialize the field's address; later indirect ops go through it
    LoadAddress,
    /// Load through the materialized address
    LoadIndirect(Order),
    /// Store through the materialized address
    StoreIndirect(Order),
    /// Width-specific sequentially consistent atomic load through the address
    VolatileRead(PrimitiveKind),
    /// Width-specific sequentially consistent atomic store through the address
    VolatileWrite(PrimitiveKind),
    /// Atomic compare-and-exchange through the address
    CompareExchange(FieldKind),
}

/// Access strategy for gets and sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Ordinary guest `getfield`/`putfield` semantics
    Plain,
    /// `Unsafe.getX`/`putX`
    Unsafe,
    /// `Unsafe.getXVolatile`/`putXVolatile`
    UnsafeVolatile,
}

/// A compiled sequence of field operations for one field and one access.
#[derive(Debug, Clone)]
pub struct AccessPlan {
    pub(super) field: Arc<FieldDescriptor>,
    pub(super) ops: Box<[FieldOp]>,
}

impl AccessPlan {
    fn new(field: &Arc<FieldDescriptor>, ops: Vec<FieldOp>) -> Self {
        Self {
            field: field.clone(),
            ops: ops.into_boxed_slice(),
        }
    }

    /// The operations, in execution order.
    pub fn ops(&self) -> &[FieldOp] {
        &self.ops
    }

    /// The field this plan accesses.
    pub fn field(&self) -> &FieldDescriptor {
        &self.field
    }
}

fn receiver_ops(field: &FieldDescriptor) -> Vec<FieldOp> {
    if field.modifiers.is_static {
        vec![FieldOp::LoadStatic]
    } else if field.declaring.is_value_type() {
        vec![FieldOp::Unbox]
    } else {
        vec![FieldOp::LoadReceiver]
    }
}

/// The 64-bit width of a volatile field, which must never take the plain path.
fn wide_volatile(field: &FieldDescriptor) -> Option<PrimitiveKind> {
    match field.kind {
        FieldKind::Primitive(p) if p.is_wide() && field.modifiers.is_volatile => Some(p),
        _ => None,
    }
}

/// Generate the get sequence for `strategy`.
pub fn emit_get(field: &Arc<FieldDescriptor>, strategy: Strategy) -> AccessPlan {
    let mut ops = receiver_ops(field);
    let volatile = field.modifiers.is_volatile;

    match (strategy, wide_volatile(field)) {
        (Strategy::UnsafeVolatile, _) => match field.kind {
            FieldKind::Primitive(p) => ops.extend([FieldOp::LoadAddress, FieldOp::VolatileRead(p)]),
            FieldKind::Reference => ops.extend([
                FieldOp::LoadAddress,
                FieldOp::MemoryBarrier,
                FieldOp::LoadIndirect(Order::Volatile),
            ]),
        },
        (_, Some(p)) => ops.extend([FieldOp::LoadAddress, FieldOp::VolatileRead(p)]),
        (Strategy::Unsafe, None) if field.modifiers.is_static && field.modifiers.is_final => {
            // go through the address so an optimizer cannot fold the constant
            if volatile {
                ops.push(FieldOp::MemoryBarrier);
            }
            ops.extend([
                FieldOp::LoadAddress,
                FieldOp::LoadIndirect(if volatile { Order::Volatile } else { Order::Plain }),
            ]);
        }
        (Strategy::Plain | Strategy::Unsafe, None) => {
            if volatile {
                ops.extend([FieldOp::MemoryBarrier, FieldOp::Load(Order::Volatile)]);
            } else {
                ops.push(FieldOp::Load(Order::Plain));
            }
        }
    }
    AccessPlan::new(field, ops)
}

/// Generate the set sequence for `strategy`.
pub fn emit_set(field: &Arc<FieldDescriptor>, strategy: Strategy) -> AccessPlan {
    let mut ops = receiver_ops(field);

    match (strategy, wide_volatile(field)) {
        (Strategy::UnsafeVolatile, _) => match field.kind {
            FieldKind::Primitive(p) => ops.extend([FieldOp::LoadAddress, FieldOp::VolatileWrite(p)]),
            FieldKind::Reference => ops.extend([
                FieldOp::LoadAddress,
                FieldOp::StoreIndirect(Order::Volatile),
                FieldOp::MemoryBarrier,
            ]),
        },
        (_, Some(p)) => ops.extend([FieldOp::LoadAddress, FieldOp::VolatileWrite(p)]),
        (Strategy::Plain | Strategy::Unsafe, None) => {
            if field.modifiers.is_volatile {
                ops.extend([FieldOp::Store(Order::Volatile), FieldOp::MemoryBarrier]);
            } else {
                ops.push(FieldOp::Store(Order::Plain));
            }
        }
    }
    AccessPlan::new(field, ops)
}

/// Generate the compare-and-swap sequence. Only `int`, `long`, `double` and
/// reference fields support it.
pub fn emit_compare_and_swap(field: &Arc<FieldDescriptor>) -> BridgeResult<AccessPlan> {
    match field.kind {
        FieldKind::Primitive(PrimitiveKind::Int | PrimitiveKind::Long | PrimitiveKind::Double)
        | FieldKind::Reference => {
            let mut ops = receiver_ops(field);
            ops.extend([FieldOp::LoadAddress, FieldOp::CompareExchange(field.kind)]);
            Ok(AccessPlan::new(field, ops))
        }
        other => Err(BridgeError::UnsupportedCompareAndSwap(other.to_string())),
    }
}
