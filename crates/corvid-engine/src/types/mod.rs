//! Guest type model
//!
//! Identity values for guest-runtime types. Ghost tags, cast checks and array
//! covariance are all answered from this model; the host never sees it.

use std::fmt;
use std::sync::Arc;

/// Root of every guest class hierarchy.
pub const OBJECT: &str = "java.lang.Object";
/// Interface implemented by every guest array.
pub const CLONEABLE: &str = "java.lang.Cloneable";
/// Interface implemented by every guest array.
pub const SERIALIZABLE: &str = "java.io.Serializable";

/// Shape of a guest type.
#[derive(Debug, Clone, PartialEq)]
pub enum GuestKind {
    /// Ordinary class
    Class,
    /// Interface with a real host representation
    Interface,
    /// Structural interface with no single host representation
    Ghost,
    /// Array of `element` with `rank` dimensions; `element` is never itself an array
    Array {
        /// Innermost element type
        element: GuestTypeTag,
        /// Number of dimensions, at least one
        rank: u32,
    },
}

/// A guest-runtime type.
#[derive(Debug)]
pub struct GuestType {
    name: String,
    kind: GuestKind,
    super_class: Option<GuestTypeTag>,
    interfaces: Vec<GuestTypeTag>,
}

/// Immutable, cheap-to-clone handle to a [`GuestType`].
#[derive(Clone)]
pub struct GuestTypeTag(Arc<GuestType>);

impl GuestTypeTag {
    fn new(
        name: String,
        kind: GuestKind,
        super_class: Option<GuestTypeTag>,
        interfaces: Vec<GuestTypeTag>,
    ) -> Self {
        GuestTypeTag(Arc::new(GuestType {
            name,
            kind,
            super_class,
            interfaces,
        }))
    }

    /// A class with an optional super class and implemented interfaces.
    pub fn class(
        name: impl Into<String>,
        super_class: Option<GuestTypeTag>,
        interfaces: Vec<GuestTypeTag>,
    ) -> Self {
        Self::new(name.into(), GuestKind::Class, super_class, interfaces)
    }

    /// An interface extending `interfaces`.
    pub fn interface(name: impl Into<String>, interfaces: Vec<GuestTypeTag>) -> Self {
        Self::new(name.into(), GuestKind::Interface, None, interfaces)
    }

    /// A ghost interface extending `interfaces`.
    pub fn ghost(name: impl Into<String>, interfaces: Vec<GuestTypeTag>) -> Self {
        Self::new(name.into(), GuestKind::Ghost, None, interfaces)
    }

    /// The array type of this type with `rank` more dimensions.
    ///
    /// `rank == 0` returns the type itself.
    pub fn make_array_type(&self, rank: u32) -> GuestTypeTag {
        if rank == 0 {
            return self.clone();
        }
        let (element, rank) = match &self.0.kind {
            GuestKind::Array { element, rank: inner } => (element.clone(), inner + rank),
            _ => (self.clone(), rank),
        };
        let name = array_descriptor(&element, rank);
        Self::new(name, GuestKind::Array { element, rank }, None, Vec::new())
    }

    /// Guest name; arrays use their descriptor (`[[Lpkg.Name;`).
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Shape of this type.
    pub fn kind(&self) -> &GuestKind {
        &self.0.kind
    }

    /// Array dimensions, zero for non-arrays.
    pub fn rank(&self) -> u32 {
        match &self.0.kind {
            GuestKind::Array { rank, .. } => *rank,
            _ => 0,
        }
    }

    /// Innermost element type of an array.
    pub fn element_type(&self) -> Option<&GuestTypeTag> {
        match &self.0.kind {
            GuestKind::Array { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Whether this is a ghost interface.
    pub fn is_ghost(&self) -> bool {
        matches!(self.0.kind, GuestKind::Ghost)
    }

    /// Whether this is an array type.
    pub fn is_array(&self) -> bool {
        matches!(self.0.kind, GuestKind::Array { .. })
    }

    /// Super class, if declared.
    pub fn super_class(&self) -> Option<&GuestTypeTag> {
        self.0.super_class.as_ref()
    }

    /// Directly implemented or extended interfaces.
    pub fn interfaces(&self) -> &[GuestTypeTag] {
        &self.0.interfaces
    }

    /// Field descriptor form: `Lpkg.Name;` or `[[Lpkg.Name;`.
    pub fn descriptor(&self) -> String {
        match &self.0.kind {
            GuestKind::Array { .. } => self.0.name.clone(),
            _ => format!("L{};", self.0.name),
        }
    }

    /// Guest assignment compatibility: can a value of `self` be stored where
    /// `target` is expected?
    pub fn is_assignable_to(&self, target: &GuestTypeTag) -> bool {
        if self == target || target.is_root(OBJECT) {
            return true;
        }
        match (&self.0.kind, &target.0.kind) {
            (
                GuestKind::Array { element, rank },
                GuestKind::Array {
                    element: target_element,
                    rank: target_rank,
                },
            ) => {
                if rank == target_rank {
                    element.is_assignable_to(target_element)
                } else if rank > target_rank {
                    // the surplus dimensions make the source an array of arrays
                    target_element.is_root(OBJECT)
                        || target_element.is_root(CLONEABLE)
                        || target_element.is_root(SERIALIZABLE)
                } else {
                    false
                }
            }
            (GuestKind::Array { .. }, _) => target.is_root(CLONEABLE) || target.is_root(SERIALIZABLE),
            (_, GuestKind::Array { .. }) => false,
            _ => self.inherits(target),
        }
    }

    fn inherits(&self, target: &GuestTypeTag) -> bool {
        self.0
            .super_class
            .iter()
            .chain(self.0.interfaces.iter())
            .any(|parent| parent == target || parent.inherits(target))
    }

    fn is_root(&self, name: &str) -> bool {
        !self.is_array() && self.0.name == name
    }
}

fn array_descriptor(element: &GuestTypeTag, rank: u32) -> String {
    let mut out = "[".repeat(rank as usize);
    out.push('L');
    out.push_str(element.name());
    out.push(';');
    out
}

impl PartialEq for GuestTypeTag {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        match (&self.0.kind, &other.0.kind) {
            (
                GuestKind::Array { element, rank },
                GuestKind::Array {
                    element: other_element,
                    rank: other_rank,
                },
            ) => rank == other_rank && element == other_element,
            (GuestKind::Array { .. }, _) | (_, GuestKind::Array { .. }) => false,
            _ => self.0.name == other.0.name,
        }
    }
}

impl Eq for GuestTypeTag {}

impl fmt::Debug for GuestTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GuestTypeTag({})", self.0.name)
    }
}

impl fmt::Display for GuestTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}
