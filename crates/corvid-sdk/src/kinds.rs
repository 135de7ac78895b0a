//! Field kinds, primitive widths and mapping modes

use std::fmt;

/// Guest primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// `boolean` (Z)
    Boolean,
    /// `byte` (B)
    Byte,
    /// `char` (C)
    Char,
    /// `short` (S)
    Short,
    /// `int` (I)
    Int,
    /// `long` (J)
    Long,
    /// `float` (F)
    Float,
    /// `double` (D)
    Double,
}

impl PrimitiveKind {
    /// Parse a one-character field descriptor.
    pub fn from_descriptor(c: char) -> Option<Self> {
        Some(match c {
            'Z' => PrimitiveKind::Boolean,
            'B' => PrimitiveKind::Byte,
            'C' => PrimitiveKind::Char,
            'S' => PrimitiveKind::Short,
            'I' => PrimitiveKind::Int,
            'J' => PrimitiveKind::Long,
            'F' => PrimitiveKind::Float,
            'D' => PrimitiveKind::Double,
            _ => return None,
        })
    }

    /// One-character field descriptor.
    pub fn descriptor(self) -> char {
        match self {
            PrimitiveKind::Boolean => 'Z',
            PrimitiveKind::Byte => 'B',
            PrimitiveKind::Char => 'C',
            PrimitiveKind::Short => 'S',
            PrimitiveKind::Int => 'I',
            PrimitiveKind::Long => 'J',
            PrimitiveKind::Float => 'F',
            PrimitiveKind::Double => 'D',
        }
    }

    /// Guest-language keyword.
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }

    /// 64-bit types, which plain loads/stores may tear on 32-bit targets.
    pub fn is_wide(self) -> bool {
        matches!(self, PrimitiveKind::Long | PrimitiveKind::Double)
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Storage kind of a field: a primitive width or an object reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Primitive-typed field
    Primitive(PrimitiveKind),
    /// Reference-typed field (class, interface or array)
    Reference,
}

impl FieldKind {
    /// Derive the kind from a guest type signature (`I`, `J`, `Ljava.lang.String;`, `[B`, ...).
    pub fn from_signature(sig: &str) -> Option<Self> {
        let mut chars = sig.chars();
        let first = chars.next()?;
        match first {
            'L' if sig.ends_with(';') && sig.len() > 2 => Some(FieldKind::Reference),
            '[' if sig.len() > 1 => Some(FieldKind::Reference),
            c if chars.next().is_none() => PrimitiveKind::from_descriptor(c).map(FieldKind::Primitive),
            _ => None,
        }
    }

    /// Whether this is a 64-bit primitive.
    pub fn is_wide(self) -> bool {
        matches!(self, FieldKind::Primitive(p) if p.is_wide())
    }

    /// The primitive width, if any.
    pub fn primitive(self) -> Option<PrimitiveKind> {
        match self {
            FieldKind::Primitive(p) => Some(p),
            FieldKind::Reference => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Primitive(p) => p.fmt(f),
            FieldKind::Reference => f.write_str("reference"),
        }
    }
}

/// Protection mode of a file mapping. Codes are the guest `MAP_RO`/`MAP_RW`/`MAP_PV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapMode {
    /// Shared, read-only
    ReadOnly,
    /// Shared, read-write; writes reach the file
    ReadWrite,
    /// Private copy-on-write; writes never reach the file
    Private,
}

impl MapMode {
    /// Decode a guest protection code.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(MapMode::ReadOnly),
            1 => Some(MapMode::ReadWrite),
            2 => Some(MapMode::Private),
            _ => None,
        }
    }

    /// Guest protection code.
    pub fn code(self) -> i32 {
        match self {
            MapMode::ReadOnly => 0,
            MapMode::ReadWrite => 1,
            MapMode::Private => 2,
        }
    }

    /// Whether the mapped view may be written through.
    pub fn is_writable(self) -> bool {
        !matches!(self, MapMode::ReadOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_kind_from_signature() {
        assert_eq!(
            FieldKind::from_signature("I"),
            Some(FieldKind::Primitive(PrimitiveKind::Int))
        );
        assert_eq!(
            FieldKind::from_signature("J"),
            Some(FieldKind::Primitive(PrimitiveKind::Long))
        );
        assert_eq!(
            FieldKind::from_signature("Ljava.lang.Object;"),
            Some(FieldKind::Reference)
        );
        assert_eq!(FieldKind::from_signature("[I"), Some(FieldKind::Reference));
        assert_eq!(FieldKind::from_signature("II"), None);
        assert_eq!(FieldKind::from_signature("L;"), None);
        assert_eq!(FieldKind::from_signature(""), None);
        assert_eq!(FieldKind::from_signature("Q"), None);
    }

    #[test]
    fn test_wide_kinds() {
        assert!(PrimitiveKind::Long.is_wide());
        assert!(PrimitiveKind::Double.is_wide());
        assert!(!PrimitiveKind::Int.is_wide());
        assert!(FieldKind::Primitive(PrimitiveKind::Double).is_wide());
        assert!(!FieldKind::Reference.is_wide());
    }

    #[test]
    fn test_descriptor_roundtrip_for_all_primitives() {
        for c in ['Z', 'B', 'C', 'S', 'I', 'J', 'F', 'D'] {
            assert_eq!(PrimitiveKind::from_descriptor(c).unwrap().descriptor(), c);
        }
    }

    #[test]
    fn test_map_mode_codes() {
        assert_eq!(MapMode::from_code(0), Some(MapMode::ReadOnly));
        assert_eq!(MapMode::from_code(1), Some(MapMode::ReadWrite));
        assert_eq!(MapMode::from_code(2), Some(MapMode::Private));
        assert_eq!(MapMode::from_code(3), None);
        assert_eq!(MapMode::Private.code(), 2);
        assert!(!MapMode::ReadOnly.is_writable());
        assert!(MapMode::Private.is_writable());
    }
}
