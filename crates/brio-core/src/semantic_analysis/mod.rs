// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Semantic analysis: declaration spaces, the type registry, constant
//! evaluation, expression/statement resolution, definite-assignment
//! flow analysis, and pending-implementation tracking.
//!
//! The passes run in a fixed order over the merged source units:
//! declare every type by name, define bases and interfaces, define
//! members (signatures, fields, enum values), resolve constants and
//! method bodies, then close each type against its pending abstract and
//! interface requirements. A type's base and interfaces are always
//! *defined* before the type's own member-definition pass runs; that
//! ordering is what lets member lookup walk base chains mid-compile.

pub mod block;
pub mod constants;
pub mod declaration_space;
pub mod flow_analysis;
pub mod folding;
pub mod pending_implementation;
pub mod resolver;
pub mod type_registry;
pub mod types;

pub use block::{BlockId, BlockTree, LocalSymbol, LocalVariable};
pub use constants::{ConstantError, ConstantValue};
pub use declaration_space::{DeclarationSpace, DeclareResult};
pub use flow_analysis::{BranchingKind, FlowAnalysis, Reachability};
pub use pending_implementation::{PendingImplementations, ProxyMethod};
pub use resolver::{
    ConstantTable, ExprClass, Resolve, ResolveFailure, ResolvedCatch, ResolvedExpr,
    ResolvedExprKind, ResolvedStmt, Resolver,
};
pub use type_registry::{ImportTable, ResolveScope, TypeRegistry};
pub use types::{
    MemberDescriptor, MemberId, MemberKind, MethodSignature, ParameterSig, PrimitiveKind,
    TypeDescriptor, TypeId, TypeKind, TypeState,
};
