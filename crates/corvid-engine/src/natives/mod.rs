//! Native method registry
//!
//! Guest native methods are looked up by their qualified name
//! (`"sun.nio.ch.FileChannelImpl.map0"`) in a [`NativeFunctionRegistry`].
//! [`ResolvedNatives`] is the dispatch table built at link time: after
//! linking, a call is a direct indexed call into a Vec with no hash lookup.

mod ghost;
mod nio;

use std::collections::HashMap;
use std::sync::Arc;

use corvid_sdk::{BridgeError, BridgeResult, LoadError};

use crate::bridge::Bridge;
use crate::host::{HostRef, HostValue};

pub use ghost::register_ghost;
pub use nio::register_nio;

/// Handler for one guest native method: the bridge plus the guest
/// arguments, receiver first for instance natives.
pub type NativeFn = Arc<dyn Fn(&Bridge, &[HostValue]) -> BridgeResult<HostValue> + Send + Sync>;

/// Guest native name → handler.
#[derive(Clone, Default)]
pub struct NativeFunctionRegistry {
    by_name: HashMap<String, NativeFn>,
}

impl NativeFunctionRegistry {
    /// A registry with no natives.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every native this crate implements.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        register_nio(&mut registry);
        register_ghost(&mut registry);
        registry
    }

    /// Install `handler` under the qualified guest name, replacing any
    /// earlier one.
    pub fn register(
        &mut self,
        name: &str,
        handler: impl Fn(&Bridge, &[HostValue]) -> BridgeResult<HostValue> + Send + Sync + 'static,
    ) {
        self.by_name.insert(name.to_string(), Arc::new(handler));
    }

    /// The handler installed for `name`.
    pub fn get(&self, name: &str) -> Option<NativeFn> {
        self.by_name.get(name).cloned()
    }

    /// Whether `name` has a handler.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Number of installed natives.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether no native is installed.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl std::fmt::Debug for NativeFunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("NativeFunctionRegistry")
            .field("natives", &names)
            .finish()
    }
}

fn unsatisfied(name: impl Into<String>) -> BridgeError {
    BridgeError::Library(LoadError::SymbolNotFound {
        symbol: name.into(),
        library: "native registry".to_string(),
    })
}

/// The natives one guest class declares, bound to handlers in declaration
/// order so the guest calls them by slot.
pub struct ResolvedNatives {
    names: Vec<String>,
    slots: Vec<NativeFn>,
}

impl std::fmt::Debug for ResolvedNatives {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedNatives")
            .field("names", &self.names)
            .finish()
    }
}

impl ResolvedNatives {
    /// Bind every declared native to its handler in `registry`.
    ///
    /// The first name without a handler fails the whole link with the
    /// guest's unsatisfied-link error.
    pub fn link(declared: &[String], registry: &NativeFunctionRegistry) -> BridgeResult<Self> {
        let slots = declared
            .iter()
            .map(|name| registry.get(name).ok_or_else(|| unsatisfied(name.as_str())))
            .collect::<BridgeResult<Vec<_>>>()?;
        tracing::debug!(count = slots.len(), "linked natives");
        Ok(Self {
            names: declared.to_vec(),
            slots,
        })
    }

    /// A class that declares no natives.
    pub fn empty() -> Self {
        Self {
            names: Vec::new(),
            slots: Vec::new(),
        }
    }

    /// Invoke the native bound at `slot`.
    pub fn call(&self, slot: u16, bridge: &Bridge, args: &[HostValue]) -> BridgeResult<HostValue> {
        match self.slots.get(usize::from(slot)) {
            Some(handler) => handler(bridge, args),
            None => Err(unsatisfied(format!("native #{}", slot))),
        }
    }

    /// Slot of a declared native.
    pub fn index_of(&self, name: &str) -> Option<u16> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| u16::try_from(i).ok())
    }

    /// Number of bound natives.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the class declared no natives.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn arg<'a>(args: &'a [HostValue], index: usize) -> BridgeResult<&'a HostValue> {
    args.get(index).ok_or_else(|| {
        BridgeError::wrong_kind(format!("argument {}", index), format!("{} arguments", args.len()))
    })
}

/// A non-null object argument.
pub(crate) fn arg_ref<'a>(args: &'a [HostValue], index: usize, what: &str) -> BridgeResult<&'a HostRef> {
    match arg(args, index)? {
        HostValue::Ref(obj) => Ok(obj),
        HostValue::Null => Err(BridgeError::NullReceiver(what.to_string())),
        other => Err(BridgeError::wrong_kind("reference", other.kind_name())),
    }
}

/// A possibly-null object argument.
pub(crate) fn arg_opt_ref(args: &[HostValue], index: usize) -> BridgeResult<Option<&HostRef>> {
    match arg(args, index)? {
        HostValue::Ref(obj) => Ok(Some(obj)),
        HostValue::Null => Ok(None),
        other => Err(BridgeError::wrong_kind("reference", other.kind_name())),
    }
}

pub(crate) fn arg_int(args: &[HostValue], index: usize) -> BridgeResult<i32> {
    let value = arg(args, index)?;
    value
        .as_int()
        .ok_or_else(|| BridgeError::wrong_kind("int", value.kind_name()))
}

pub(crate) fn arg_long(args: &[HostValue], index: usize) -> BridgeResult<i64> {
    let value = arg(args, index)?;
    value
        .as_long()
        .ok_or_else(|| BridgeError::wrong_kind("long", value.kind_name()))
}

pub(crate) fn arg_str<'a>(args: &'a [HostValue], index: usize, what: &str) -> BridgeResult<&'a str> {
    let value = arg(args, index)?;
    match value {
        HostValue::Null => Err(BridgeError::NullReceiver(what.to_string())),
        other => other
            .as_str()
            .ok_or_else(|| BridgeError::wrong_kind("java.lang.String", other.kind_name())),
    }
}
