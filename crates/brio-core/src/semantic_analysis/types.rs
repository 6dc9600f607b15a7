// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Type descriptors and the primitive conversion tables.
//!
//! The resolver treats types as comparable, hashable identities
//! ([`TypeId`]); everything it needs to know about a type — name, base,
//! interfaces, members, value-type-ness — is read through the registry's
//! [`TypeDescriptor`]. The numeric conversion tables here are keyed by
//! primitive pairs and drive both expression conversion checks and
//! compile-time constant narrowing.

use ecow::EcoString;

use crate::ast::Modifiers;

use super::constants::ConstantValue;

/// A type identity. Cheap to copy, compare, and hash; the registry owns
/// the descriptor behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    pub(super) const fn new(index: u32) -> Self {
        Self(index)
    }

    pub(super) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A member identity within the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberId(u32);

impl MemberId {
    pub(super) const fn new(index: u32) -> Self {
        Self(index)
    }

    pub(super) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// The built-in primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    SByte,
    Short,
    UShort,
    Integer,
    UInteger,
    Long,
    ULong,
    Single,
    Double,
    Decimal,
    Char,
    Str,
    Date,
}

impl PrimitiveKind {
    /// Canonical source name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::Byte => "Byte",
            Self::SByte => "SByte",
            Self::Short => "Short",
            Self::UShort => "UShort",
            Self::Integer => "Integer",
            Self::UInteger => "UInteger",
            Self::Long => "Long",
            Self::ULong => "ULong",
            Self::Single => "Single",
            Self::Double => "Double",
            Self::Decimal => "Decimal",
            Self::Char => "Char",
            Self::Str => "String",
            Self::Date => "Date",
        }
    }

    /// The eight integer primitives — the only legal enum underlying
    /// types.
    #[must_use]
    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            Self::Byte
                | Self::SByte
                | Self::Short
                | Self::UShort
                | Self::Integer
                | Self::UInteger
                | Self::Long
                | Self::ULong
        )
    }

    /// Integral plus the three real types.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        self.is_integral() || matches!(self, Self::Single | Self::Double | Self::Decimal)
    }

    /// Every primitive except `String` has value semantics.
    #[must_use]
    pub const fn is_value_type(self) -> bool {
        !matches!(self, Self::Str)
    }

    /// The inclusive value range of an integral primitive.
    #[must_use]
    pub const fn integral_range(self) -> Option<(i128, i128)> {
        Some(match self {
            Self::Byte => (0, u8::MAX as i128),
            Self::SByte => (i8::MIN as i128, i8::MAX as i128),
            Self::Short => (i16::MIN as i128, i16::MAX as i128),
            Self::UShort => (0, u16::MAX as i128),
            Self::Integer => (i32::MIN as i128, i32::MAX as i128),
            Self::UInteger => (0, u32::MAX as i128),
            Self::Long => (i64::MIN as i128, i64::MAX as i128),
            Self::ULong => (0, u64::MAX as i128),
            _ => return None,
        })
    }
}

/// The kind of a registered type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// A built-in primitive.
    Primitive(PrimitiveKind),
    /// The universal root type.
    Object,
    /// The root of all value types.
    ValueRoot,
    /// The root of all enumerations.
    EnumRoot,
    /// The root of all delegates.
    DelegateRoot,
    /// The absent return type of a `Sub`.
    Void,
    /// A user-declared class.
    Class,
    /// A user-declared structure.
    Structure,
    /// A user-declared interface.
    Interface,
    /// A user-declared module (a sealed all-shared container).
    Module,
    /// An enumeration over one of the integral primitives.
    Enum { underlying: PrimitiveKind },
    /// A delegate type.
    Delegate,
    /// An array type.
    Array { element: TypeId },
}

/// How far a type has progressed through resolution.
///
/// The ordering invariant of the whole pipeline: a type's base and
/// interfaces reach [`TypeState::Defined`] before the type's own
/// member-definition pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeState {
    /// Registered by name only.
    Declared,
    /// Currently defining its bases/interfaces (cycle guard).
    Defining,
    /// Bases and interfaces resolved; members may still be pending.
    Defined,
}

/// Everything the resolver knows about a type.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    /// Namespace-qualified name.
    pub full_name: EcoString,
    /// The simple (unqualified) name.
    pub simple_name: EcoString,
    /// The kind-specific payload.
    pub kind: TypeKind,
    /// Base type; `None` only for the universal root and void.
    pub base: Option<TypeId>,
    /// Directly listed interfaces (not the transitive closure).
    pub interfaces: Vec<TypeId>,
    /// Members defined on this type, in declaration order.
    pub members: Vec<MemberId>,
    /// Declared modifiers.
    pub modifiers: Modifiers,
    /// Resolution progress.
    pub state: TypeState,
}

impl TypeDescriptor {
    /// Returns `true` for types with value semantics: primitives other
    /// than `String`, structures, and enums.
    #[must_use]
    pub const fn is_value_type(&self) -> bool {
        match &self.kind {
            TypeKind::Primitive(p) => p.is_value_type(),
            TypeKind::Structure | TypeKind::Enum { .. } | TypeKind::ValueRoot => true,
            _ => false,
        }
    }

    /// Returns `true` for enumerations.
    #[must_use]
    pub const fn is_enum(&self) -> bool {
        matches!(self.kind, TypeKind::Enum { .. })
    }

    /// Returns `true` for interfaces.
    #[must_use]
    pub const fn is_interface(&self) -> bool {
        matches!(self.kind, TypeKind::Interface)
    }

    /// Returns `true` for delegate types.
    #[must_use]
    pub const fn is_delegate(&self) -> bool {
        matches!(self.kind, TypeKind::Delegate)
    }

    /// The primitive kind, for primitives and enums (which take their
    /// underlying primitive's arithmetic).
    #[must_use]
    pub const fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self.kind {
            TypeKind::Primitive(p) | TypeKind::Enum { underlying: p } => Some(p),
            _ => None,
        }
    }
}

/// A method or constructor signature with resolved types.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature {
    /// Parameters in declaration order; a trailing `ParamArray`
    /// parameter is included as its declared array type.
    pub parameters: Vec<ParameterSig>,
    /// Return type; `None` for a `Sub`.
    pub return_type: Option<TypeId>,
}

impl MethodSignature {
    /// Signature equality for duplicate detection and pending-
    /// implementation matching: positional parameter types and the
    /// return type must match exactly.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.return_type == other.return_type
            && self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| a.ty == b.ty)
    }

    /// Parameter-types-only equality, used for duplicate-overload
    /// detection (two overloads may not differ only in return type).
    #[must_use]
    pub fn same_parameters(&self, other: &Self) -> bool {
        self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| a.ty == b.ty)
    }
}

/// One resolved parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSig {
    /// The declared name.
    pub name: EcoString,
    /// The resolved parameter type.
    pub ty: TypeId,
    /// `ByRef`/`Optional`/`ParamArray` flags.
    pub modifiers: Modifiers,
    /// Default value for `Optional` parameters.
    pub default: Option<ConstantValue>,
}

/// A member registered on a type.
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    /// The declared name.
    pub name: EcoString,
    /// The type that declares the member.
    pub declaring_type: TypeId,
    /// Declared modifiers.
    pub modifiers: Modifiers,
    /// The member payload.
    pub kind: MemberKind,
}

/// The closed set of member payloads.
#[derive(Debug, Clone)]
pub enum MemberKind {
    /// A field of the given type.
    Field { ty: TypeId },
    /// A constant; its value resolves on demand.
    Constant { ty: Option<TypeId> },
    /// A method.
    Method { signature: MethodSignature },
    /// A constructor.
    Constructor { signature: MethodSignature },
    /// A property.
    Property {
        ty: TypeId,
        parameters: Vec<ParameterSig>,
        readable: bool,
        writable: bool,
    },
    /// An enumeration member with its resolved value.
    EnumMember { value: i128 },
    /// An event.
    Event { parameters: Vec<ParameterSig> },
}

impl MemberDescriptor {
    /// Returns the method signature for methods and constructors.
    #[must_use]
    pub const fn signature(&self) -> Option<&MethodSignature> {
        match &self.kind {
            MemberKind::Method { signature } | MemberKind::Constructor { signature } => {
                Some(signature)
            }
            _ => None,
        }
    }
}

// ============================================================================
// Numeric conversion tables
// ============================================================================

/// Returns `true` if `from` widens implicitly to `to`.
///
/// This is the fixed widening table: identity, integral widening that
/// preserves every value, integral-to-real, `Single` to `Double`,
/// `Decimal` to the binary reals, and `Char` to `String`.
#[must_use]
pub fn widens_to(from: PrimitiveKind, to: PrimitiveKind) -> bool {
    use PrimitiveKind as P;
    if from == to {
        return true;
    }
    match from {
        P::Byte => matches!(
            to,
            P::Short
                | P::UShort
                | P::Integer
                | P::UInteger
                | P::Long
                | P::ULong
                | P::Single
                | P::Double
                | P::Decimal
        ),
        P::SByte => matches!(
            to,
            P::Short | P::Integer | P::Long | P::Single | P::Double | P::Decimal
        ),
        P::Short => matches!(to, P::Integer | P::Long | P::Single | P::Double | P::Decimal),
        P::UShort => matches!(
            to,
            P::Integer | P::UInteger | P::Long | P::ULong | P::Single | P::Double | P::Decimal
        ),
        P::Integer => matches!(to, P::Long | P::Single | P::Double | P::Decimal),
        P::UInteger => matches!(to, P::Long | P::ULong | P::Single | P::Double | P::Decimal),
        P::Long | P::ULong => matches!(to, P::Single | P::Double | P::Decimal),
        P::Single => matches!(to, P::Double),
        P::Decimal => matches!(to, P::Single | P::Double),
        P::Char => matches!(to, P::Str),
        P::Double | P::Str | P::Boolean | P::Date => false,
    }
}

/// Returns `true` if `from` converts explicitly (or implicitly) to
/// `to`: every numeric pair, `Boolean` with the numerics, and
/// `String` with `Char`.
#[must_use]
pub fn converts_to(from: PrimitiveKind, to: PrimitiveKind) -> bool {
    use PrimitiveKind as P;
    if widens_to(from, to) {
        return true;
    }
    if from.is_numeric() && to.is_numeric() {
        return true;
    }
    match (from, to) {
        (P::Boolean, t) if t.is_numeric() => true,
        (f, P::Boolean) if f.is_numeric() => true,
        (P::Str, P::Char) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PrimitiveKind as P;

    #[test]
    fn eight_integral_primitives() {
        let integral: Vec<_> = [
            P::Boolean,
            P::Byte,
            P::SByte,
            P::Short,
            P::UShort,
            P::Integer,
            P::UInteger,
            P::Long,
            P::ULong,
            P::Single,
            P::Double,
            P::Decimal,
            P::Char,
            P::Str,
            P::Date,
        ]
        .into_iter()
        .filter(|p| p.is_integral())
        .collect();
        assert_eq!(integral.len(), 8);
    }

    #[test]
    fn widening_preserves_every_value() {
        assert!(widens_to(P::Byte, P::Short));
        assert!(widens_to(P::Byte, P::ULong));
        assert!(widens_to(P::Integer, P::Long));
        assert!(widens_to(P::Integer, P::Double));
        assert!(widens_to(P::Single, P::Double));
        // Narrowing and sign-crossing are not widening.
        assert!(!widens_to(P::Long, P::Integer));
        assert!(!widens_to(P::SByte, P::Byte));
        assert!(!widens_to(P::Double, P::Single));
        assert!(!widens_to(P::Integer, P::UInteger));
    }

    #[test]
    fn identity_is_widening() {
        assert!(widens_to(P::Date, P::Date));
        assert!(widens_to(P::Str, P::Str));
    }

    #[test]
    fn explicit_conversions_cover_numeric_pairs() {
        assert!(converts_to(P::Double, P::Short));
        assert!(converts_to(P::Decimal, P::Byte));
        assert!(converts_to(P::Boolean, P::Integer));
        assert!(converts_to(P::Str, P::Char));
        assert!(!converts_to(P::Date, P::Integer));
        assert!(!converts_to(P::Str, P::Integer));
    }

    #[test]
    fn char_widens_to_string_only() {
        assert!(widens_to(P::Char, P::Str));
        assert!(!widens_to(P::Char, P::Integer));
        assert!(!converts_to(P::Char, P::Integer));
    }

    #[test]
    fn integral_ranges() {
        assert_eq!(P::Byte.integral_range(), Some((0, 255)));
        assert_eq!(P::SByte.integral_range(), Some((-128, 127)));
        assert_eq!(
            P::ULong.integral_range(),
            Some((0, i128::from(u64::MAX)))
        );
        assert_eq!(P::Double.integral_range(), None);
    }

    #[test]
    fn signature_matching() {
        let a = MethodSignature {
            parameters: vec![ParameterSig {
                name: "x".into(),
                ty: TypeId::new(1),
                modifiers: Modifiers::BY_VAL,
                default: None,
            }],
            return_type: Some(TypeId::new(2)),
        };
        let mut b = a.clone();
        // Parameter names are irrelevant to signature identity.
        b.parameters[0].name = "y".into();
        assert!(a.matches(&b));
        assert!(a.same_parameters(&b));

        b.return_type = None;
        assert!(!a.matches(&b));
        assert!(a.same_parameters(&b));

        b.parameters[0].ty = TypeId::new(3);
        assert!(!a.same_parameters(&b));
    }
}
