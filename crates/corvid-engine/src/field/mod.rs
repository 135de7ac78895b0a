//! Guest field access
//!
//! A guest field mapped onto a host field is compiled once into access plans
//! for every strategy the guest can request:
//!
//! - plain get/set (`getfield`/`putfield`, volatile-aware)
//! - unsafe get/set (`Unsafe.getX`/`putX`)
//! - unsafe volatile get/set (`Unsafe.getXVolatile`/`putXVolatile`)
//! - compare-and-swap (`Unsafe.compareAndSwapX`)
//!
//! Plans are closed sequences of [`FieldOp`]s dispatched by a match; nothing is
//! generated at run time.

mod exec;
mod plan;

use std::sync::Arc;

use corvid_sdk::{BridgeError, BridgeResult, FieldKind};

use crate::host::{FieldModifiers, HostClass, HostRef, HostValue};

pub use plan::{emit_compare_and_swap, emit_get, emit_set, AccessPlan, FieldOp, Order, Strategy};

/// A guest field bound to its host storage.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    declaring: Arc<HostClass>,
    name: String,
    signature: String,
    kind: FieldKind,
    modifiers: FieldModifiers,
    slot: usize,
}

impl FieldDescriptor {
    /// Bind `name` with `signature` on `declaring`.
    pub fn resolve(declaring: &Arc<HostClass>, name: &str, signature: &str) -> BridgeResult<Self> {
        let field = declaring
            .find_field(name, signature)
            .ok_or_else(|| BridgeError::member_not_found(declaring.name(), name, format!(":{}", signature)))?;
        Ok(Self {
            declaring: declaring.clone(),
            name: field.name().to_string(),
            signature: field.signature().to_string(),
            kind: field.kind(),
            modifiers: field.modifiers(),
            slot: field.slot(),
        })
    }

    /// Declaring host type.
    pub fn declaring(&self) -> &Arc<HostClass> {
        &self.declaring
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Guest type signature.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Storage kind.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Guest modifiers.
    pub fn modifiers(&self) -> FieldModifiers {
        self.modifiers
    }
}

/// All access plans for one field.
#[derive(Debug, Clone)]
pub struct CompiledField {
    field: Arc<FieldDescriptor>,
    get: AccessPlan,
    set: AccessPlan,
    unsafe_get: AccessPlan,
    unsafe_set: AccessPlan,
    volatile_get: AccessPlan,
    volatile_set: AccessPlan,
    compare_and_swap: Option<AccessPlan>,
}

impl CompiledField {
    /// Generate every plan for `field`.
    pub fn compile(field: FieldDescriptor) -> Self {
        let field = Arc::new(field);
        Self {
            get: emit_get(&field, Strategy::Plain),
            set: emit_set(&field, Strategy::Plain),
            unsafe_get: emit_get(&field, Strategy::Unsafe),
            unsafe_set: emit_set(&field, Strategy::Unsafe),
            volatile_get: emit_get(&field, Strategy::UnsafeVolatile),
            volatile_set: emit_set(&field, Strategy::UnsafeVolatile),
            compare_and_swap: emit_compare_and_swap(&field).ok(),
            field,
        }
    }

    /// The bound field.
    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.field
    }

    /// Get plan for `strategy`.
    pub fn get_plan(&self, strategy: Strategy) -> &AccessPlan {
        match strategy {
            Strategy::Plain => &self.get,
            Strategy::Unsafe => &self.unsafe_get,
            Strategy::UnsafeVolatile => &self.volatile_get,
        }
    }

    /// Set plan for `strategy`.
    pub fn set_plan(&self, strategy: Strategy) -> &AccessPlan {
        match strategy {
            Strategy::Plain => &self.set,
            Strategy::Unsafe => &self.unsafe_set,
            Strategy::UnsafeVolatile => &self.volatile_set,
        }
    }

    /// Compare-and-swap plan; a configuration error for unsupported widths.
    pub fn compare_and_swap_plan(&self) -> BridgeResult<&AccessPlan> {
        self.compare_and_swap
            .as_ref()
            .ok_or_else(|| BridgeError::UnsupportedCompareAndSwap(self.field.kind.to_string()))
    }

    /// Plain get.
    pub fn get(&self, receiver: Option<&HostRef>) -> BridgeResult<HostValue> {
        self.get.get(receiver)
    }

    /// Plain set.
    pub fn set(&self, receiver: Option<&HostRef>, value: &HostValue) -> BridgeResult<()> {
        self.set.set(receiver, value)
    }

    /// Unsafe get.
    pub fn get_unsafe(&self, receiver: Option<&HostRef>) -> BridgeResult<HostValue> {
        self.unsafe_get.get(receiver)
    }

    /// Unsafe set.
    pub fn set_unsafe(&self, receiver: Option<&HostRef>, value: &HostValue) -> BridgeResult<()> {
        self.unsafe_set.set(receiver, value)
    }

    /// Unsafe volatile get.
    pub fn get_volatile(&self, receiver: Option<&HostRef>) -> BridgeResult<HostValue> {
        self.volatile_get.get(receiver)
    }

    /// Unsafe volatile set.
    pub fn set_volatile(&self, receiver: Option<&HostRef>, value: &HostValue) -> BridgeResult<()> {
        self.volatile_set.set(receiver, value)
    }

    /// Atomic compare-and-swap.
    pub fn compare_and_swap(
        &self,
        receiver: Option<&HostRef>,
        expected: &HostValue,
        update: &HostValue,
    ) -> BridgeResult<bool> {
        self.compare_and_swap_plan()?
            .compare_and_swap(receiver, expected, update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_sdk::PrimitiveKind;

    fn compile(class: &Arc<HostClass>, name: &str, sig: &str) -> CompiledField {
        CompiledField::compile(FieldDescriptor::resolve(class, name, sig).unwrap())
    }

    #[test]
    fn test_plain_volatile_barriers() {
        let class = HostClass::builder("demo.Flags")
            .field("ready", "Z", FieldModifiers::INSTANCE.with_volatile())
            .build()
            .unwrap();
        let field = compile(&class, "ready", "Z");

        assert_eq!(
            field.get_plan(Strategy::Plain).ops(),
            &[
                FieldOp::LoadReceiver,
                FieldOp::MemoryBarrier,
                FieldOp::Load(Order::Volatile)
            ]
        );
        assert_eq!(
            field.set_plan(Strategy::Plain).ops(),
            &[
                FieldOp::LoadReceiver,
                FieldOp::Store(Order::Volatile),
                FieldOp::MemoryBarrier
            ]
        );
    }

    #[test]
    fn test_wide_volatile_never_plain() {
        let class = HostClass::builder("demo.Clock")
            .field("ticks", "J", FieldModifiers::INSTANCE.with_volatile())
            .field("rate", "D", FieldModifiers::INSTANCE.with_volatile().with_static())
            .build()
            .unwrap();
        let ticks = compile(&class, "ticks", "J");
        for strategy in [Strategy::Plain, Strategy::Unsafe, Strategy::UnsafeVolatile] {
            let get = ticks.get_plan(strategy).ops();
            assert!(get.contains(&FieldOp::VolatileRead(PrimitiveKind::Long)));
            assert!(!get.iter().any(|op| matches!(op, FieldOp::Load(_))));
            let set = ticks.set_plan(strategy).ops();
            assert!(set.contains(&FieldOp::VolatileWrite(PrimitiveKind::Long)));
            assert!(!set.contains(&FieldOp::MemoryBarrier));
        }

        let rate = compile(&class, "rate", "D");
        assert_eq!(
            rate.get_plan(Strategy::Plain).ops(),
            &[
                FieldOp::LoadStatic,
                FieldOp::LoadAddress,
                FieldOp::VolatileRead(PrimitiveKind::Double)
            ]
        );
    }

    #[test]
    fn test_unsafe_static_final_goes_through_address() {
        let class = HostClass::builder("demo.Limits")
            .field("MAX", "I", FieldModifiers::INSTANCE.with_static().with_final())
            .field("count", "I", FieldModifiers::INSTANCE.with_static())
            .build()
            .unwrap();
        let max = compile(&class, "MAX", "I");
        assert_eq!(
            max.get_plan(Strategy::Unsafe).ops(),
            &[
                FieldOp::LoadStatic,
                FieldOp::LoadAddress,
                FieldOp::LoadIndirect(Order::Plain)
            ]
        );
        assert_eq!(
            max.get_plan(Strategy::Plain).ops(),
            &[FieldOp::LoadStatic, FieldOp::Load(Order::Plain)]
        );
        let count = compile(&class, "count", "I");
        assert_eq!(
            count.get_plan(Strategy::Unsafe).ops(),
            &[FieldOp::LoadStatic, FieldOp::Load(Order::Plain)]
        );

        max.set_unsafe(None, &HostValue::Int(7)).unwrap();
        assert_eq!(max.get_unsafe(None).unwrap(), HostValue::Int(7));
    }

    #[test]
    fn test_unsafe_volatile_object_brackets_with_barriers() {
        let class = HostClass::builder("demo.Node")
            .field("next", "Ldemo.Node;", FieldModifiers::INSTANCE)
            .build()
            .unwrap();
        let next = compile(&class, "next", "Ldemo.Node;");
        assert_eq!(
            next.get_plan(Strategy::UnsafeVolatile).ops(),
            &[
                FieldOp::LoadReceiver,
                FieldOp::LoadAddress,
                FieldOp::MemoryBarrier,
                FieldOp::LoadIndirect(Order::Volatile)
            ]
        );
        assert_eq!(
            next.set_plan(Strategy::UnsafeVolatile).ops(),
            &[
                FieldOp::LoadReceiver,
                FieldOp::LoadAddress,
                FieldOp::StoreIndirect(Order::Volatile),
                FieldOp::MemoryBarrier
            ]
        );

        let a = class.instantiate();
        let b = class.instantiate();
        next.set_volatile(Some(&a), &HostValue::Ref(b.clone())).unwrap();
        assert_eq!(next.get_volatile(Some(&a)).unwrap(), HostValue::Ref(b));
    }

    #[test]
    fn test_value_type_unboxes_first() {
        let class = HostClass::builder("demo.Point")
            .value_type()
            .field("x", "I", FieldModifiers::INSTANCE)
            .build()
            .unwrap();
        let x = compile(&class, "x", "I");
        for strategy in [Strategy::Plain, Strategy::Unsafe, Strategy::UnsafeVolatile] {
            assert_eq!(x.get_plan(strategy).ops()[0], FieldOp::Unbox);
            assert_eq!(x.set_plan(strategy).ops()[0], FieldOp::Unbox);
        }
        assert_eq!(x.compare_and_swap_plan().unwrap().ops()[0], FieldOp::Unbox);

        let boxed = class.instantiate();
        x.set(Some(&boxed), &HostValue::Int(3)).unwrap();
        assert_eq!(x.get(Some(&boxed)).unwrap(), HostValue::Int(3));

        let other = HostClass::builder("demo.Other").build().unwrap().instantiate();
        assert!(matches!(
            x.get(Some(&other)),
            Err(BridgeError::ClassCast(_))
        ));
    }

    #[test]
    fn test_null_receiver() {
        let class = HostClass::builder("demo.Box")
            .field("v", "I", FieldModifiers::INSTANCE)
            .build()
            .unwrap();
        let v = compile(&class, "v", "I");
        assert!(matches!(v.get(None), Err(BridgeError::NullReceiver(_))));
    }

    #[test]
    fn test_cas_widths() {
        let class = HostClass::builder("demo.Mixed")
            .field("i", "I", FieldModifiers::INSTANCE)
            .field("b", "B", FieldModifiers::INSTANCE)
            .field("f", "F", FieldModifiers::INSTANCE)
            .build()
            .unwrap();
        let obj = class.instantiate();

        let i = compile(&class, "i", "I");
        assert!(i.compare_and_swap(Some(&obj), &HostValue::Int(0), &HostValue::Int(5)).unwrap());
        assert!(!i.compare_and_swap(Some(&obj), &HostValue::Int(0), &HostValue::Int(6)).unwrap());
        assert_eq!(i.get(Some(&obj)).unwrap(), HostValue::Int(5));

        for (name, sig) in [("b", "B"), ("f", "F")] {
            let field = compile(&class, name, sig);
            assert!(matches!(
                field.compare_and_swap_plan(),
                Err(BridgeError::UnsupportedCompareAndSwap(_))
            ));
        }
    }

    #[test]
    fn test_resolve_missing_field() {
        let class = HostClass::builder("demo.Empty").build().unwrap();
        let err = FieldDescriptor::resolve(&class, "nope", "I").unwrap_err();
        assert!(matches!(err, BridgeError::MemberNotFound { .. }));
    }
}
