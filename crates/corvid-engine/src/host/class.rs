//! Host class descriptions
//!
//! A `HostClass` is the host-side shape the accessor cache resolves guest
//! members against: instance fields, static fields (stored on the class),
//! method thunks and constructor thunks.

use std::fmt;
use std::sync::Arc;

use corvid_sdk::{BridgeError, BridgeResult, FieldKind};

use super::cell::FieldCell;
use super::object::{HostObject, HostRef, HostValue, Payload};

/// Guest field modifiers relevant to access generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FieldModifiers {
    /// Stored on the class rather than the instance
    pub is_static: bool,
    /// Never reassigned after initialization
    pub is_final: bool,
    /// Guest `volatile`
    pub is_volatile: bool,
}

impl FieldModifiers {
    /// Instance, non-final, non-volatile.
    pub const INSTANCE: FieldModifiers = FieldModifiers {
        is_static: false,
        is_final: false,
        is_volatile: false,
    };

    /// Set the `static` flag.
    pub const fn with_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Set the `final` flag.
    pub const fn with_final(mut self) -> Self {
        self.is_final = true;
        self
    }

    /// Set the `volatile` flag.
    pub const fn with_volatile(mut self) -> Self {
        self.is_volatile = true;
        self
    }
}

/// Invocation thunk for a method: receiver (absent for statics), arguments.
pub type MethodThunk =
    Arc<dyn Fn(Option<&HostRef>, &[HostValue]) -> BridgeResult<HostValue> + Send + Sync>;

/// Invocation thunk for a constructor: the class being built, arguments.
pub type ConstructorThunk =
    Arc<dyn Fn(&Arc<HostClass>, &[HostValue]) -> BridgeResult<HostRef> + Send + Sync>;

/// A declared field.
#[derive(Debug, Clone)]
pub struct HostField {
    name: String,
    signature: String,
    kind: FieldKind,
    modifiers: FieldModifiers,
    slot: usize,
}

impl HostField {
    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Guest type signature (`I`, `Ljava.lang.Object;`, ...).
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Storage kind.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Modifiers.
    pub fn modifiers(&self) -> FieldModifiers {
        self.modifiers
    }

    /// Index into the instance cells, or into the class statics when static.
    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// A declared method.
#[derive(Clone)]
pub struct HostMethod {
    name: String,
    signature: String,
    is_static: bool,
    thunk: MethodThunk,
}

impl HostMethod {
    /// Method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Guest method signature (`(Ljava.lang.String;)Ljava.lang.String;`).
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Whether the method takes no receiver.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Invocation thunk.
    pub fn thunk(&self) -> &MethodThunk {
        &self.thunk
    }
}

impl fmt::Debug for HostMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostMethod({}{})", self.name, self.signature)
    }
}

/// A declared constructor.
#[derive(Clone)]
pub struct HostConstructor {
    signature: String,
    thunk: ConstructorThunk,
}

impl HostConstructor {
    /// Guest signature (`()V`, `(Ljava.lang.Object;)V`).
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Invocation thunk.
    pub fn thunk(&self) -> &ConstructorThunk {
        &self.thunk
    }
}

impl fmt::Debug for HostConstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostConstructor(<init>{})", self.signature)
    }
}

/// A host type.
pub struct HostClass {
    name: String,
    value_type: bool,
    fields: Vec<HostField>,
    statics: Box<[FieldCell]>,
    methods: Vec<HostMethod>,
    constructors: Vec<HostConstructor>,
}

impl HostClass {
    /// Start describing a class.
    pub fn builder(name: impl Into<String>) -> HostClassBuilder {
        HostClassBuilder {
            name: name.into(),
            value_type: false,
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            static_slots: 0,
        }
    }

    /// Host name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether instances are value-represented (boxed when seen as objects).
    pub fn is_value_type(&self) -> bool {
        self.value_type
    }

    /// All declared fields, instance and static.
    pub fn fields(&self) -> &[HostField] {
        &self.fields
    }

    /// Look up a field by name and signature.
    pub fn find_field(&self, name: &str, signature: &str) -> Option<&HostField> {
        self.fields
            .iter()
            .find(|f| f.name == name && f.signature == signature)
    }

    /// Look up a method by name and signature.
    pub fn find_method(&self, name: &str, signature: &str) -> Option<&HostMethod> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.signature == signature)
    }

    /// Look up a constructor by signature.
    pub fn find_constructor(&self, signature: &str) -> Option<&HostConstructor> {
        self.constructors.iter().find(|c| c.signature == signature)
    }

    /// Static field storage by slot.
    pub fn static_cell(&self, slot: usize) -> BridgeResult<&FieldCell> {
        self.statics
            .get(slot)
            .ok_or_else(|| BridgeError::member_not_found(&self.name, format!("static #{}", slot), ""))
    }

    /// A new zero-initialized instance.
    pub fn instantiate(self: &Arc<Self>) -> HostRef {
        HostObject::new(self.clone(), None)
    }

    /// A new zero-initialized instance carrying a native payload.
    pub fn instantiate_with(self: &Arc<Self>, payload: Payload) -> HostRef {
        HostObject::new(self.clone(), Some(payload))
    }
}

impl fmt::Debug for HostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostClass")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("fields", &self.fields)
            .field("methods", &self.methods)
            .field("constructors", &self.constructors)
            .finish()
    }
}

/// Builder for [`HostClass`].
pub struct HostClassBuilder {
    name: String,
    value_type: bool,
    fields: Vec<(String, String, FieldModifiers)>,
    methods: Vec<HostMethod>,
    constructors: Vec<HostConstructor>,
    static_slots: usize,
}

impl HostClassBuilder {
    /// Mark the class value-represented.
    pub fn value_type(mut self) -> Self {
        self.value_type = true;
        self
    }

    /// Declare a field.
    pub fn field(
        mut self,
        name: impl Into<String>,
        signature: impl Into<String>,
        modifiers: FieldModifiers,
    ) -> Self {
        if modifiers.is_static {
            self.static_slots += 1;
        }
        self.fields.push((name.into(), signature.into(), modifiers));
        self
    }

    /// Declare an instance method.
    pub fn method(
        mut self,
        name: impl Into<String>,
        signature: impl Into<String>,
        thunk: impl Fn(Option<&HostRef>, &[HostValue]) -> BridgeResult<HostValue> + Send + Sync + 'static,
    ) -> Self {
        self.methods.push(HostMethod {
            name: name.into(),
            signature: signature.into(),
            is_static: false,
            thunk: Arc::new(thunk),
        });
        self
    }

    /// Declare a static method.
    pub fn static_method(
        mut self,
        name: impl Into<String>,
        signature: impl Into<String>,
        thunk: impl Fn(Option<&HostRef>, &[HostValue]) -> BridgeResult<HostValue> + Send + Sync + 'static,
    ) -> Self {
        self.methods.push(HostMethod {
            name: name.into(),
            signature: signature.into(),
            is_static: true,
            thunk: Arc::new(thunk),
        });
        self
    }

    /// Declare a constructor.
    pub fn constructor(
        mut self,
        signature: impl Into<String>,
        thunk: impl Fn(&Arc<HostClass>, &[HostValue]) -> BridgeResult<HostRef> + Send + Sync + 'static,
    ) -> Self {
        self.constructors.push(HostConstructor {
            signature: signature.into(),
            thunk: Arc::new(thunk),
        });
        self
    }

    /// Finish the class. Fails if a field signature does not name a type.
    pub fn build(self) -> BridgeResult<Arc<HostClass>> {
        let mut fields = Vec::with_capacity(self.fields.len());
        let mut statics = Vec::with_capacity(self.static_slots);
        let mut instance_slot = 0;

        for (name, signature, modifiers) in self.fields {
            let kind = FieldKind::from_signature(&signature)
                .ok_or_else(|| BridgeError::wrong_kind("field signature", signature.clone()))?;
            let slot = if modifiers.is_static {
                statics.push(FieldCell::new(kind));
                statics.len() - 1
            } else {
                instance_slot += 1;
                instance_slot - 1
            };
            fields.push(HostField {
                name,
                signature,
                kind,
                modifiers,
                slot,
            });
        }

        Ok(Arc::new(HostClass {
            name: self.name,
            value_type: self.value_type,
            fields,
            statics: statics.into_boxed_slice(),
            methods: self.methods,
            constructors: self.constructors,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_sdk::PrimitiveKind;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_slots_split_instance_and_static() {
        let class = HostClass::builder("demo.Counter")
            .field("count", "I", FieldModifiers::INSTANCE)
            .field("total", "J", FieldModifiers::INSTANCE.with_static())
            .field("next", "Ldemo.Counter;", FieldModifiers::INSTANCE.with_volatile())
            .build()
            .unwrap();

        let count = class.find_field("count", "I").unwrap();
        let total = class.find_field("total", "J").unwrap();
        let next = class.find_field("next", "Ldemo.Counter;").unwrap();
        assert_eq!((count.slot(), total.slot(), next.slot()), (0, 0, 1));
        assert_eq!(total.kind(), FieldKind::Primitive(PrimitiveKind::Long));
        assert!(class.find_field("count", "J").is_none());

        let obj = class.instantiate();
        assert!(obj.field(1).is_ok());
        assert!(obj.field(2).is_err());
        assert_eq!(
            class.static_cell(0).unwrap().load(Ordering::Relaxed),
            HostValue::Long(0)
        );
    }

    #[test]
    fn test_bad_signature_rejected() {
        let result = HostClass::builder("demo.Broken")
            .field("x", "Q", FieldModifiers::INSTANCE)
            .build();
        assert!(matches!(result, Err(BridgeError::WrongValueKind { .. })));
    }

    #[test]
    fn test_method_and_constructor_lookup() {
        let class = HostClass::builder("demo.Greeter")
            .method("answer", "()I", |_, _| Ok(HostValue::Int(42)))
            .constructor("()V", |class, _| Ok(class.instantiate()))
            .build()
            .unwrap();

        let method = class.find_method("answer", "()I").unwrap();
        assert_eq!((method.thunk())(None, &[]).unwrap(), HostValue::Int(42));
        assert!(class.find_method("answer", "()J").is_none());
        let ctor = class.find_constructor("()V").unwrap();
        let obj = (ctor.thunk())(&class, &[]).unwrap();
        assert_eq!(obj.class_name(), "demo.Greeter");
    }
}
