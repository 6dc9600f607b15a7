// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Abstract syntax tree definitions.
//!
//! Every node carries a [`Location`](crate::source_analysis::Location)
//! for diagnostics. Each syntactic category is a closed sum type —
//! [`ExprKind`], [`StmtKind`], [`MemberKind`] — so every resolution site
//! matches exhaustively and a new node form is a compile error until all
//! passes handle it.
//!
//! The parser can always produce a tree: unparseable regions become
//! [`ExprKind::Error`] / [`StmtKind::Error`] placeholders, which never
//! resolve and are excluded from emission.

mod declarations;
mod expressions;
mod statements;

pub use declarations::{
    AttributeUsage, EnumMemberDeclaration, ImportDirective, MemberDeclaration, MemberKind,
    MethodDeclaration, Modifiers, NamespaceDeclaration, NamespaceMember, ParameterDeclaration,
    PropertyDeclaration, SourceUnit, TypeDeclKind, TypeDeclaration,
};
pub use expressions::{
    Argument, BinaryOp, ExprKind, Expression, NodeId, QualifiedName, TypeName, TypeNameKind,
    UnaryOp,
};
pub use statements::{
    CaseSection, CatchClause, DoCondition, DoConditionKind, DoTestPosition, ExitKind, IfBranch,
    Statement, StmtKind, VariableDeclarator,
};
