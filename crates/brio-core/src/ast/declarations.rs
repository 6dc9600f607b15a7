// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Declaration nodes: source units, namespaces, types, and members.
//!
//! A [`SourceUnit`] is the tree for one parsed file. Multi-file
//! compilations merge their units into the session's root before
//! resolution, so declaration order across files is irrelevant to name
//! lookup.

use ecow::EcoString;

use crate::source_analysis::Location;

use super::{Expression, QualifiedName, Statement, TypeName};

/// Everything parsed from one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUnit {
    /// The file index in the session's source map.
    pub file: u16,
    /// The file's `Imports` directives.
    pub imports: Vec<ImportDirective>,
    /// Top-level namespaces and types.
    pub members: Vec<NamespaceMember>,
}

/// An `Imports` directive, with optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDirective {
    /// The alias in `Imports X = Some.Namespace`, if any.
    pub alias: Option<EcoString>,
    /// The imported namespace or type.
    pub target: QualifiedName,
    /// Location of the directive.
    pub location: Location,
    /// The file the directive appeared in.
    pub file: u16,
}

/// A member of a namespace body (or of the file's implicit root).
#[derive(Debug, Clone, PartialEq)]
pub enum NamespaceMember {
    /// A nested `Namespace ... End Namespace`.
    Namespace(NamespaceDeclaration),
    /// A type declaration.
    Type(TypeDeclaration),
}

/// A `Namespace` block.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceDeclaration {
    /// The (possibly dotted) namespace name.
    pub name: QualifiedName,
    /// Nested namespaces and types.
    pub members: Vec<NamespaceMember>,
    /// Location of the `Namespace` keyword.
    pub location: Location,
}

/// A type declaration of any kind.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDeclaration {
    /// Attributes applied to the type.
    pub attributes: Vec<AttributeUsage>,
    /// The declared modifier set (validated against a per-kind allow-list).
    pub modifiers: Modifiers,
    /// The simple name.
    pub name: EcoString,
    /// The kind-specific payload.
    pub kind: TypeDeclKind,
    /// Location of the name token.
    pub location: Location,
}

/// Kind-specific parts of a type declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDeclKind {
    /// `Class ... End Class`.
    Class {
        inherits: Option<TypeName>,
        implements: Vec<TypeName>,
        members: Vec<MemberDeclaration>,
    },
    /// `Structure ... End Structure`.
    Structure {
        implements: Vec<TypeName>,
        members: Vec<MemberDeclaration>,
    },
    /// `Interface ... End Interface`.
    Interface {
        inherits: Vec<TypeName>,
        members: Vec<MemberDeclaration>,
    },
    /// `Module ... End Module`.
    Module { members: Vec<MemberDeclaration> },
    /// `Enum ... End Enum`, with optional underlying type.
    Enum {
        underlying: Option<TypeName>,
        members: Vec<EnumMemberDeclaration>,
    },
    /// `Delegate Sub/Function ...`.
    Delegate {
        parameters: Vec<ParameterDeclaration>,
        return_type: Option<TypeName>,
    },
}

/// A member of a type body.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDeclaration {
    /// Attributes applied to the member.
    pub attributes: Vec<AttributeUsage>,
    /// The declared modifier set.
    pub modifiers: Modifiers,
    /// The member itself.
    pub kind: MemberKind,
    /// Location of the member's name token.
    pub location: Location,
}

/// The closed set of member forms.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberKind {
    /// A field.
    Field {
        name: EcoString,
        type_name: Option<TypeName>,
        initializer: Option<Expression>,
    },

    /// A constant member.
    Constant {
        name: EcoString,
        type_name: Option<TypeName>,
        initializer: Expression,
    },

    /// A `Sub` or `Function`.
    Method(MethodDeclaration),

    /// A `Sub New` constructor.
    Constructor(MethodDeclaration),

    /// A property with optional indexer parameters.
    Property(PropertyDeclaration),

    /// An `Event` declaration.
    Event {
        name: EcoString,
        parameters: Vec<ParameterDeclaration>,
    },
}

impl MemberKind {
    /// The member's declared name, as used for declaration-space entry.
    #[must_use]
    pub fn name(&self) -> &EcoString {
        match self {
            Self::Field { name, .. }
            | Self::Constant { name, .. }
            | Self::Event { name, .. } => name,
            Self::Method(method) | Self::Constructor(method) => &method.name,
            Self::Property(property) => &property.name,
        }
    }
}

/// A `Sub`, `Function`, or constructor declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDeclaration {
    /// The method name (`New` for constructors).
    pub name: EcoString,
    /// The fixed parameter list, plus at most one trailing `ParamArray`.
    pub parameters: Vec<ParameterDeclaration>,
    /// The return type; `None` for a `Sub`.
    pub return_type: Option<TypeName>,
    /// `true` for `Function`, `false` for `Sub`.
    pub is_function: bool,
    /// `Implements Interface.Method` clauses.
    pub implements: Vec<(TypeName, EcoString)>,
    /// The body; `None` for `MustOverride` and interface methods.
    pub body: Option<Vec<Statement>>,
    /// Location of the name token.
    pub location: Location,
}

/// A parameter declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDeclaration {
    /// Parameter modifiers (`ByVal`/`ByRef`/`Optional`/`ParamArray`).
    pub modifiers: Modifiers,
    /// The parameter name.
    pub name: EcoString,
    /// The declared type.
    pub type_name: Option<TypeName>,
    /// Default value for `Optional` parameters.
    pub default: Option<Expression>,
    /// Location of the name token.
    pub location: Location,
}

/// A property declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDeclaration {
    /// The property name.
    pub name: EcoString,
    /// The property type.
    pub type_name: Option<TypeName>,
    /// Indexer parameters, empty for plain properties.
    pub parameters: Vec<ParameterDeclaration>,
    /// The `Get` accessor body.
    pub getter: Option<Vec<Statement>>,
    /// The `Set` accessor: value-parameter name and body.
    pub setter: Option<(EcoString, Vec<Statement>)>,
}

/// One member of an `Enum`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMemberDeclaration {
    /// The member name.
    pub name: EcoString,
    /// Explicit value; `None` auto-increments from the previous member.
    pub value: Option<Expression>,
    /// Location of the name token.
    pub location: Location,
}

/// An attribute applied to a declaration: `<Name(args, field:=value)>`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeUsage {
    /// The attribute type name.
    pub name: QualifiedName,
    /// Positional constructor arguments.
    pub positional: Vec<Expression>,
    /// Named field/property arguments.
    pub named: Vec<(EcoString, Expression)>,
    /// Location of the attribute name.
    pub location: Location,
}

/// A set of declaration modifiers, stored as bit flags.
///
/// The parser validates each declaration's set against a per-construct
/// allow-list; the resolver only reads the survivors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers(u32);

impl Modifiers {
    pub const NONE: Self = Self(0);
    pub const PUBLIC: Self = Self(1);
    pub const PRIVATE: Self = Self(1 << 1);
    pub const PROTECTED: Self = Self(1 << 2);
    pub const FRIEND: Self = Self(1 << 3);
    pub const SHARED: Self = Self(1 << 4);
    pub const SHADOWS: Self = Self(1 << 5);
    pub const OVERRIDABLE: Self = Self(1 << 6);
    pub const OVERRIDES: Self = Self(1 << 7);
    pub const MUST_OVERRIDE: Self = Self(1 << 8);
    pub const NOT_OVERRIDABLE: Self = Self(1 << 9);
    pub const MUST_INHERIT: Self = Self(1 << 10);
    pub const NOT_INHERITABLE: Self = Self(1 << 11);
    pub const READ_ONLY: Self = Self(1 << 12);
    pub const WRITE_ONLY: Self = Self(1 << 13);
    pub const BY_VAL: Self = Self(1 << 14);
    pub const BY_REF: Self = Self(1 << 15);
    pub const OPTIONAL: Self = Self(1 << 16);
    pub const PARAM_ARRAY: Self = Self(1 << 17);

    /// The access modifiers, which are mutually exclusive.
    pub const ACCESS_MASK: Self =
        Self(Self::PUBLIC.0 | Self::PRIVATE.0 | Self::PROTECTED.0 | Self::FRIEND.0);

    /// Returns `true` if every flag in `other` is present.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if any flag in `other` is present.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Adds a flag, returning `false` if it was already present
    /// (a repeated modifier is a parse-time diagnostic).
    pub fn insert(&mut self, flag: Self) -> bool {
        let fresh = self.0 & flag.0 == 0;
        self.0 |= flag.0;
        fresh
    }

    /// Returns the union of two sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns the flags present in `self` but not in `other`.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Returns `true` if no flags are set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the set declares `Shared`.
    #[must_use]
    pub const fn is_shared(self) -> bool {
        self.contains(Self::SHARED)
    }

    /// Returns `true` if the set declares `Private`.
    #[must_use]
    pub const fn is_private(self) -> bool {
        self.contains(Self::PRIVATE)
    }

    /// Iterates over the individual flags in the set.
    pub fn iter(self) -> impl Iterator<Item = Self> {
        (0..18u32)
            .map(|bit| Self(1 << bit))
            .filter(move |flag| self.contains(*flag))
    }

    /// Source spelling of a single flag, used in diagnostics.
    ///
    /// # Panics
    /// Panics if `self` is not a single flag.
    #[must_use]
    pub fn flag_name(self) -> &'static str {
        match self {
            Self::PUBLIC => "Public",
            Self::PRIVATE => "Private",
            Self::PROTECTED => "Protected",
            Self::FRIEND => "Friend",
            Self::SHARED => "Shared",
            Self::SHADOWS => "Shadows",
            Self::OVERRIDABLE => "Overridable",
            Self::OVERRIDES => "Overrides",
            Self::MUST_OVERRIDE => "MustOverride",
            Self::NOT_OVERRIDABLE => "NotOverridable",
            Self::MUST_INHERIT => "MustInherit",
            Self::NOT_INHERITABLE => "NotInheritable",
            Self::READ_ONLY => "ReadOnly",
            Self::WRITE_ONLY => "WriteOnly",
            Self::BY_VAL => "ByVal",
            Self::BY_REF => "ByRef",
            Self::OPTIONAL => "Optional",
            Self::PARAM_ARRAY => "ParamArray",
            _ => panic!("flag_name called on a modifier set"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_insert_reports_duplicates() {
        let mut mods = Modifiers::NONE;
        assert!(mods.insert(Modifiers::PUBLIC));
        assert!(!mods.insert(Modifiers::PUBLIC));
        assert!(mods.contains(Modifiers::PUBLIC));
    }

    #[test]
    fn modifier_set_operations() {
        let mods = Modifiers::PUBLIC.union(Modifiers::SHARED);
        assert!(mods.contains(Modifiers::PUBLIC));
        assert!(mods.contains(Modifiers::SHARED));
        assert!(!mods.contains(Modifiers::PRIVATE));
        assert!(mods.intersects(Modifiers::ACCESS_MASK));
        assert_eq!(mods.difference(Modifiers::SHARED), Modifiers::PUBLIC);
        assert!(mods.is_shared());
        assert!(!mods.is_private());
    }

    #[test]
    fn modifier_iteration_yields_single_flags() {
        let mods = Modifiers::PRIVATE.union(Modifiers::READ_ONLY);
        let names: Vec<_> = mods.iter().map(Modifiers::flag_name).collect();
        assert_eq!(names, vec!["Private", "ReadOnly"]);
    }

    #[test]
    fn member_kind_names() {
        let field = MemberKind::Field {
            name: "total".into(),
            type_name: None,
            initializer: None,
        };
        assert_eq!(field.name(), "total");
    }
}
