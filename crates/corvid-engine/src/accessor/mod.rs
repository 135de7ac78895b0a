//! Lazy accessor cache
//!
//! Guest natives reach host members through accessors: resolved handles for a
//! field, a method or a constructor of a host type. Members are declared up
//! front into an [`AccessorTable`], an arena of [`AccessorSlot`]s addressed by
//! [`SlotId`]; each slot is resolved against the host type on first use and
//! then reused for the life of the table.

mod families;
mod slot;

use std::fmt;
use std::sync::Arc;

use corvid_sdk::{BridgeError, BridgeResult};

use crate::field::{CompiledField, FieldDescriptor};
use crate::host::{HostClass, HostConstructor, HostMethod, HostRef, HostValue, TypeRegistry};

pub use families::{
    BaseAccessors, EnumeratorIteratorAccessor, FileChannelImplAccessor, FileDescriptorAccessor,
    PropertiesAccessor, RandomAccessFileAccessor,
};
pub use slot::AccessorSlot;

/// Resolves guest-visible type names to host classes.
pub trait AccessorTypeResolver: Send + Sync {
    /// The host class registered under `name`.
    fn resolve_type(&self, name: &str) -> BridgeResult<Arc<HostClass>>;
}

impl AccessorTypeResolver for TypeRegistry {
    fn resolve_type(&self, name: &str) -> BridgeResult<Arc<HostClass>> {
        self.resolve(name)
    }
}

/// Kind of member an accessor resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Field get/set
    Field,
    /// Method invocation
    Method,
    /// Constructor invocation
    Constructor,
}

/// A member to resolve: declaring type, name, kind and guest signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberSpec {
    type_name: String,
    name: String,
    kind: MemberKind,
    signature: String,
}

impl MemberSpec {
    /// A field with type signature `signature`.
    pub fn field(type_name: impl Into<String>, name: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            kind: MemberKind::Field,
            signature: signature.into(),
        }
    }

    /// A method with method signature `signature`.
    pub fn method(type_name: impl Into<String>, name: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            kind: MemberKind::Method,
            signature: signature.into(),
        }
    }

    /// A constructor with method signature `signature`.
    pub fn constructor(type_name: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: "<init>".to_string(),
            kind: MemberKind::Constructor,
            signature: signature.into(),
        }
    }

    /// Declaring type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Member name (`<init>` for constructors).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member kind.
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Guest signature.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    fn not_found(&self) -> BridgeError {
        let signature = match self.kind {
            MemberKind::Field => format!(":{}", self.signature),
            _ => self.signature.clone(),
        };
        BridgeError::member_not_found(&self.type_name, &self.name, signature)
    }
}

/// Number of parameters in a method signature like `(ILjava.lang.String;[J)V`.
pub fn parameter_count(signature: &str) -> Option<usize> {
    let params = signature.strip_prefix('(')?;
    let end = params.find(')')?;
    let mut chars = params[..end].chars();
    let mut count = 0;
    while let Some(c) = chars.next() {
        match c {
            '[' => continue,
            'L' => {
                chars.by_ref().find(|&c| c == ';')?;
            }
            'Z' | 'B' | 'C' | 'S' | 'I' | 'J' | 'F' | 'D' => {}
            _ => return None,
        }
        count += 1;
    }
    Some(count)
}

fn check_arity(expected: usize, args: &[HostValue]) -> BridgeResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(BridgeError::wrong_kind(
            format!("{} arguments", expected),
            args.len().to_string(),
        ))
    }
}

/// Resolved method invoker.
#[derive(Debug, Clone)]
pub struct MethodAccessor {
    declaring: Arc<HostClass>,
    method: HostMethod,
    arity: usize,
}

impl MethodAccessor {
    /// Invoke on `receiver` (ignored for static methods).
    pub fn invoke(&self, receiver: Option<&HostRef>, args: &[HostValue]) -> BridgeResult<HostValue> {
        check_arity(self.arity, args)?;
        if self.method.is_static() {
            return (self.method.thunk())(None, args);
        }
        let receiver = receiver.ok_or_else(|| {
            BridgeError::NullReceiver(format!("{}.{}", self.declaring.name(), self.method.name()))
        })?;
        (self.method.thunk())(Some(receiver), args)
    }

    /// Declaring type.
    pub fn declaring(&self) -> &Arc<HostClass> {
        &self.declaring
    }
}

/// Resolved constructor invoker.
#[derive(Debug, Clone)]
pub struct ConstructorAccessor {
    class: Arc<HostClass>,
    constructor: HostConstructor,
    arity: usize,
}

impl ConstructorAccessor {
    /// Construct a new instance.
    pub fn invoke(&self, args: &[HostValue]) -> BridgeResult<HostRef> {
        check_arity(self.arity, args)?;
        (self.constructor.thunk())(&self.class, args)
    }
}

/// A resolved member handle.
#[derive(Debug)]
pub enum Accessor {
    /// Field accessor with every access strategy compiled
    Field(CompiledField),
    /// Method invoker
    Method(MethodAccessor),
    /// Constructor invoker
    Constructor(ConstructorAccessor),
}

impl Accessor {
    /// Resolve `spec` against the host.
    pub fn resolve(resolver: &dyn AccessorTypeResolver, spec: &MemberSpec) -> BridgeResult<Self> {
        let class = resolver.resolve_type(&spec.type_name)?;
        match spec.kind {
            MemberKind::Field => {
                let field = FieldDescriptor::resolve(&class, &spec.name, &spec.signature)?;
                Ok(Accessor::Field(CompiledField::compile(field)))
            }
            MemberKind::Method => {
                let method = class
                    .find_method(&spec.name, &spec.signature)
                    .cloned()
                    .ok_or_else(|| spec.not_found())?;
                let arity = parameter_count(&spec.signature).ok_or_else(|| spec.not_found())?;
                Ok(Accessor::Method(MethodAccessor {
                    declaring: class,
                    method,
                    arity,
                }))
            }
            MemberKind::Constructor => {
                let constructor = class
                    .find_constructor(&spec.signature)
                    .cloned()
                    .ok_or_else(|| spec.not_found())?;
                let arity = parameter_count(&spec.signature).ok_or_else(|| spec.not_found())?;
                Ok(Accessor::Constructor(ConstructorAccessor {
                    class,
                    constructor,
                    arity,
                }))
            }
        }
    }

    fn kind(&self) -> MemberKind {
        match self {
            Accessor::Field(_) => MemberKind::Field,
            Accessor::Method(_) => MemberKind::Method,
            Accessor::Constructor(_) => MemberKind::Constructor,
        }
    }
}

/// Index of a declared member in an [`AccessorTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

impl SlotId {
    /// Position in the table.
    pub fn index(self) -> usize {
        self.0
    }
}

struct Entry {
    spec: MemberSpec,
    slot: AccessorSlot<Accessor>,
}

/// Collects member declarations for an [`AccessorTable`].
#[derive(Debug, Default)]
pub struct AccessorTableBuilder {
    specs: Vec<MemberSpec>,
}

impl AccessorTableBuilder {
    /// Declare a member; the returned id addresses its slot.
    pub fn declare(&mut self, spec: MemberSpec) -> SlotId {
        self.specs.push(spec);
        SlotId(self.specs.len() - 1)
    }

    /// Freeze the declarations. No slot is resolved yet.
    pub fn build(self, resolver: Arc<dyn AccessorTypeResolver>) -> AccessorTable {
        AccessorTable {
            resolver,
            entries: self
                .specs
                .into_iter()
                .map(|spec| Entry {
                    spec,
                    slot: AccessorSlot::new(),
                })
                .collect(),
        }
    }
}

/// Arena of lazily resolved accessors.
pub struct AccessorTable {
    resolver: Arc<dyn AccessorTypeResolver>,
    entries: Box<[Entry]>,
}

impl AccessorTable {
    /// Start declaring members.
    pub fn builder() -> AccessorTableBuilder {
        AccessorTableBuilder::default()
    }

    fn entry(&self, id: SlotId) -> BridgeResult<&Entry> {
        self.entries.get(id.0).ok_or_else(|| {
            BridgeError::member_not_found("<accessor table>", format!("slot {}", id.0), "")
        })
    }

    /// The accessor for `id`, resolving it on first use.
    pub fn get(&self, id: SlotId) -> BridgeResult<&Accessor> {
        let entry = self.entry(id)?;
        entry.slot.get_or_try_init(|| {
            let accessor = Accessor::resolve(&*self.resolver, &entry.spec)?;
            tracing::debug!(
                type_name = %entry.spec.type_name,
                member = %entry.spec.name,
                signature = %entry.spec.signature,
                "resolved accessor"
            );
            Ok(accessor)
        })
    }

    fn wrong_member(&self, id: SlotId, accessor: &Accessor, wanted: MemberKind) -> BridgeError {
        let spec = &self.entries[id.0].spec;
        BridgeError::wrong_kind(
            format!("{:?} accessor", wanted),
            format!("{:?} accessor for {}.{}", accessor.kind(), spec.type_name, spec.name),
        )
    }

    /// Field accessor for `id`.
    pub fn field(&self, id: SlotId) -> BridgeResult<&CompiledField> {
        match self.get(id)? {
            Accessor::Field(field) => Ok(field),
            other => Err(self.wrong_member(id, other, MemberKind::Field)),
        }
    }

    /// Method accessor for `id`.
    pub fn method(&self, id: SlotId) -> BridgeResult<&MethodAccessor> {
        match self.get(id)? {
            Accessor::Method(method) => Ok(method),
            other => Err(self.wrong_member(id, other, MemberKind::Method)),
        }
    }

    /// Constructor accessor for `id`.
    pub fn constructor(&self, id: SlotId) -> BridgeResult<&ConstructorAccessor> {
        match self.get(id)? {
            Accessor::Constructor(ctor) => Ok(ctor),
            other => Err(self.wrong_member(id, other, MemberKind::Constructor)),
        }
    }

    /// Whether `id` has been resolved.
    pub fn is_resolved(&self, id: SlotId) -> bool {
        self.entries
            .get(id.0)
            .map_or(false, |entry| entry.slot.is_resolved())
    }

    /// The declaration behind `id`.
    pub fn spec(&self, id: SlotId) -> Option<&MemberSpec> {
        self.entries.get(id.0).map(|entry| &entry.spec)
    }

    /// Number of declared members.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no members are declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for AccessorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolved = self.entries.iter().filter(|e| e.slot.is_resolved()).count();
        f.debug_struct("AccessorTable")
            .field("members", &self.entries.len())
            .field("resolved", &resolved)
            .finish()
    }
}
