//! Access plan execution

use std::hint::black_box;
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

use corvid_sdk::{BridgeError, BridgeResult, FieldKind, PrimitiveKind};

use super::plan::{AccessPlan, FieldOp, Order};
use crate::host::{FieldCell, HostRef, HostValue};

impl Order {
    fn load(self) -> Ordering {
        match self {
            Order::Plain => Ordering::Relaxed,
            Order::Volatile => Ordering::Acquire,
        }
    }

    fn store(self) -> Ordering {
        match self {
            Order::Plain => Ordering::Relaxed,
            Order::Volatile => Ordering::Release,
        }
    }
}

enum Operand<'v> {
    Get,
    Set(&'v HostValue),
    Swap(&'v HostValue, &'v HostValue),
}

enum Outcome {
    Value(HostValue),
    Stored,
    Swapped(bool),
}

fn misuse(expected: &str) -> BridgeError {
    BridgeError::wrong_kind(expected, "mismatched access plan")
}

impl Operand<'_> {
    fn value(&self) -> BridgeResult<&HostValue> {
        match self {
            Operand::Set(value) => Ok(*value),
            _ => Err(misuse("store operand")),
        }
    }

    fn swap(&self) -> BridgeResult<(&HostValue, &HostValue)> {
        match self {
            Operand::Swap(expected, update) => Ok((*expected, *update)),
            _ => Err(misuse("compare-and-swap operands")),
        }
    }
}

fn located(cell: Option<&FieldCell>) -> BridgeResult<&FieldCell> {
    cell.ok_or_else(|| misuse("located field"))
}

fn check_width(cell: &FieldCell, width: PrimitiveKind) -> BridgeResult<()> {
    if cell.kind() == FieldKind::Primitive(width) {
        Ok(())
    } else {
        Err(BridgeError::wrong_kind(width.name(), cell.kind().to_string()))
    }
}

impl AccessPlan {
    /// Run a get plan.
    pub fn get(&self, receiver: Option<&HostRef>) -> BridgeResult<HostValue> {
        match self.run(receiver, Operand::Get)? {
            Outcome::Value(value) => Ok(value),
            _ => Err(misuse("get plan")),
        }
    }

    /// Run a set plan.
    pub fn set(&self, receiver: Option<&HostRef>, value: &HostValue) -> BridgeResult<()> {
        match self.run(receiver, Operand::Set(value))? {
            Outcome::Stored => Ok(()),
            _ => Err(misuse("set plan")),
        }
    }

    /// Run a compare-and-swap plan; `true` iff the field held `expected`
    /// and now holds `update`.
    pub fn compare_and_swap(
        &self,
        receiver: Option<&HostRef>,
        expected: &HostValue,
        update: &HostValue,
    ) -> BridgeResult<bool> {
        match self.run(receiver, Operand::Swap(expected, update))? {
            Outcome::Swapped(swapped) => Ok(swapped),
            _ => Err(misuse("compare-and-swap plan")),
        }
    }

    fn receiver_cell<'a>(
        &self,
        receiver: Option<&'a HostRef>,
        unbox: bool,
    ) -> BridgeResult<&'a FieldCell> {
        let field = &self.field;
        let obj = receiver.ok_or_else(|| {
            BridgeError::NullReceiver(format!("{}.{}", field.declaring.name(), field.name))
        })?;
        let exact = Arc::ptr_eq(obj.class(), &field.declaring);
        if !exact || (unbox && !obj.class().is_value_type()) {
            return Err(BridgeError::ClassCast(format!(
                "{} cannot be cast to {}",
                obj.class_name(),
                field.declaring.name()
            )));
        }
        obj.field(field.slot)
    }

    fn run<'a>(&'a self, receiver: Option<&'a HostRef>, operand: Operand<'_>) -> BridgeResult<Outcome> {
        let mut cell: Option<&'a FieldCell> = None;
        let mut address: Option<&'a FieldCell> = None;
        let mut outcome = Outcome::Stored;

        for op in self.ops.iter() {
            match *op {
                FieldOp::LoadStatic => {
                    cell = Some(self.field.declaring.static_cell(self.field.slot)?);
                }
                FieldOp::LoadReceiver => cell = Some(self.receiver_cell(receiver, false)?),
                FieldOp::Unbox => cell = Some(self.receiver_cell(receiver, true)?),
                FieldOp::MemoryBarrier => fence(Ordering::SeqCst),
                FieldOp::LoadAddress => address = Some(black_box(located(cell)?)),
                FieldOp::Load(order) => {
                    outcome = Outcome::Value(located(cell)?.load(order.load()));
                }
                FieldOp::Store(order) => {
                    located(cell)?.store(operand.value()?, order.store())?;
                }
                FieldOp::LoadIndirect(order) => {
                    outcome = Outcome::Value(located(address)?.load(order.load()));
                }
                FieldOp::StoreIndirect(order) => {
                    located(address)?.store(operand.value()?, order.store())?;
                }
                FieldOp::VolatileRead(width) => {
                    let target = located(address)?;
                    check_width(target, width)?;
                    outcome = Outcome::Value(target.load(Ordering::SeqCst));
                }
                FieldOp::VolatileWrite(width) => {
                    let target = located(address)?;
                    check_width(target, width)?;
                    target.store(operand.value()?, Ordering::SeqCst)?;
                }
                FieldOp::CompareExchange(_) => {
                    let (expected, update) = operand.swap()?;
                    outcome = Outcome::Swapped(located(address)?.compare_exchange(expected, update)?);
                }
            }
        }
        Ok(outcome)
    }
}
