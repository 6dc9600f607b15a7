// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Expression nodes.
//!
//! Expressions form an owned tree. Each node carries a [`Location`] and a
//! [`NodeId`] assigned by the parser; the id is the key under which the
//! resolver caches its result, which is what makes resolution idempotent
//! (resolving the same node twice returns the cached outcome instead of
//! re-running side effects).

use ecow::EcoString;
use rust_decimal::Decimal;

use crate::source_analysis::{DateValue, FloatKind, IntegerKind, Location};

/// A stable, parser-assigned identity for an expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a node id from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// An expression with its identity and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// Parser-assigned identity, used as the resolution cache key.
    pub id: NodeId,
    /// Source location of the expression.
    pub location: Location,
    /// The expression itself.
    pub kind: ExprKind,
}

impl Expression {
    /// Creates a new expression node.
    #[must_use]
    pub const fn new(id: NodeId, location: Location, kind: ExprKind) -> Self {
        Self { id, location, kind }
    }

    /// Returns `true` if this is an error-recovery placeholder.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.kind, ExprKind::Error)
    }
}

/// The closed set of expression forms.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// An integer literal with its selected concrete type.
    Integer { value: i64, kind: IntegerKind },

    /// A floating-point literal.
    Float { value: f64, kind: FloatKind },

    /// A decimal literal.
    DecimalLiteral(Decimal),

    /// A string literal.
    Str(EcoString),

    /// A character literal.
    Char(char),

    /// A date literal.
    Date(DateValue),

    /// `True` or `False`.
    Bool(bool),

    /// The `Nothing` literal.
    Nothing,

    /// A bare name, bound during resolution.
    Name(EcoString),

    /// Member access: `target.name`.
    Member {
        target: Box<Expression>,
        name: EcoString,
    },

    /// Invocation or indexing: `target(args)`. Whether this is a call,
    /// an array index, or an indexer access is decided at resolution.
    Invocation {
        target: Box<Expression>,
        arguments: Vec<Argument>,
    },

    /// A binary operation.
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// A unary operation.
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },

    /// Object creation: `New T(args)`.
    New {
        type_name: TypeName,
        arguments: Vec<Argument>,
    },

    /// An explicit conversion: `CType(operand, T)`.
    Cast {
        operand: Box<Expression>,
        type_name: TypeName,
    },

    /// A type reference value: `GetType(T)`.
    GetType { type_name: TypeName },

    /// A method-group reference: `AddressOf target`.
    AddressOf { target: Box<Expression> },

    /// The current instance: `Me`.
    Me,

    /// The base-class view of the current instance: `MyBase`.
    MyBase,

    /// A parenthesized expression.
    Parenthesized(Box<Expression>),

    /// Placeholder produced by error recovery; never resolves.
    Error,
}

/// An argument in an invocation, optionally named (`name:=value`).
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    /// The name for `name:=value` arguments.
    pub name: Option<EcoString>,
    /// The argument value.
    pub value: Expression,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    IntDivide,
    Modulo,
    Power,
    Concatenate,
    Equals,
    NotEquals,
    Less,
    Greater,
    LessEquals,
    GreaterEquals,
    Is,
    ShiftLeft,
    ShiftRight,
    And,
    Or,
    Xor,
    AndAlso,
    OrElse,
}

impl BinaryOp {
    /// Source spelling, used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::IntDivide => "\\",
            Self::Modulo => "Mod",
            Self::Power => "^",
            Self::Concatenate => "&",
            Self::Equals => "=",
            Self::NotEquals => "<>",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEquals => "<=",
            Self::GreaterEquals => ">=",
            Self::Is => "Is",
            Self::ShiftLeft => "<<",
            Self::ShiftRight => ">>",
            Self::And => "And",
            Self::Or => "Or",
            Self::Xor => "Xor",
            Self::AndAlso => "AndAlso",
            Self::OrElse => "OrElse",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
}

impl UnaryOp {
    /// Source spelling, used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Not => "Not",
        }
    }
}

/// A dotted name as written in source: `Collections.Generic.List`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QualifiedName(pub Vec<EcoString>);

impl QualifiedName {
    /// Creates a single-segment name.
    #[must_use]
    pub fn simple(name: impl Into<EcoString>) -> Self {
        Self(vec![name.into()])
    }

    /// Returns the final segment.
    ///
    /// # Panics
    /// Panics if the name has no segments; the parser never builds one.
    #[must_use]
    pub fn last(&self) -> &EcoString {
        self.0.last().expect("qualified name has at least one segment")
    }

    /// Returns `true` if the name is a single segment.
    #[must_use]
    pub fn is_simple(&self) -> bool {
        self.0.len() == 1
    }

    /// Renders the dotted form.
    #[must_use]
    pub fn dotted(&self) -> EcoString {
        let mut out = EcoString::new();
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push_str(segment);
        }
        out
    }
}

impl std::fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dotted())
    }
}

/// A type as written in source.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeName {
    /// Source location of the type reference.
    pub location: Location,
    /// The type form.
    pub kind: TypeNameKind,
}

/// The form of a source-level type reference.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeNameKind {
    /// A (possibly dotted) named type.
    Named(QualifiedName),
    /// An array type: `T()`.
    Array { element: Box<TypeName> },
}

impl TypeName {
    /// Creates a named type reference.
    #[must_use]
    pub fn named(name: QualifiedName, location: Location) -> Self {
        Self {
            location,
            kind: TypeNameKind::Named(name),
        }
    }

    /// Renders the source form for diagnostics.
    #[must_use]
    pub fn describe(&self) -> EcoString {
        match &self.kind {
            TypeNameKind::Named(name) => name.dotted(),
            TypeNameKind::Array { element } => {
                let mut out = element.describe();
                out.push_str("()");
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_name_dotted_form() {
        let name = QualifiedName(vec!["Audio".into(), "Mixer".into()]);
        assert_eq!(name.dotted(), "Audio.Mixer");
        assert_eq!(name.last(), "Mixer");
        assert!(!name.is_simple());
        assert!(QualifiedName::simple("Mixer").is_simple());
    }

    #[test]
    fn type_name_describe_renders_arrays() {
        let inner = TypeName::named(QualifiedName::simple("Integer"), Location::NULL);
        let array = TypeName {
            location: Location::NULL,
            kind: TypeNameKind::Array {
                element: Box::new(inner),
            },
        };
        assert_eq!(array.describe(), "Integer()");
    }

    #[test]
    fn operator_spellings() {
        assert_eq!(BinaryOp::IntDivide.as_str(), "\\");
        assert_eq!(BinaryOp::Concatenate.as_str(), "&");
        assert_eq!(UnaryOp::Not.as_str(), "Not");
    }

    #[test]
    fn error_expression_is_flagged() {
        let expr = Expression::new(NodeId::new(0), Location::NULL, ExprKind::Error);
        assert!(expr.is_error());
        let expr = Expression::new(NodeId::new(1), Location::NULL, ExprKind::Nothing);
        assert!(!expr.is_error());
    }
}
