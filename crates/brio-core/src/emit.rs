// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The emitter interface.
//!
//! Code generation lives outside this crate. The core hands an
//! [`Emitter`] fully resolved declarations only: every member carries
//! resolved parameter and return types, every statement tree node a
//! resolved type and class tag. Anything that failed resolution has
//! been excluded from the program and the compilation marked failed —
//! an emitter never needs its own semantic checks.

use crate::semantic_analysis::{
    MemberId, ProxyMethod, ResolvedExpr, ResolvedStmt, TypeId, TypeRegistry,
};

/// A fully resolved program, ready for emission.
#[derive(Debug, Default)]
pub struct ResolvedProgram {
    /// Every successfully resolved type, in declaration order.
    pub types: Vec<ResolvedType>,
    /// `true` when no errors were reported; an emitter may still be
    /// handed a partial program for diagnostic tooling, but a failed
    /// compilation must not be treated as output.
    pub success: bool,
}

/// One resolved type and its emitted members.
#[derive(Debug)]
pub struct ResolvedType {
    /// The type's registry identity.
    pub ty: TypeId,
    /// Members with their resolved bodies (`None` for bodiless
    /// members: fields, interface methods, `MustOverride`).
    pub members: Vec<ResolvedMember>,
    /// Forwarding methods synthesized by pending-implementation
    /// tracking.
    pub proxies: Vec<ProxyMethod>,
}

/// One resolved member.
#[derive(Debug)]
pub struct ResolvedMember {
    /// The member's registry identity.
    pub member: MemberId,
    /// The resolved body: a method or constructor body, or a
    /// property's `Get` accessor.
    pub body: Option<Vec<ResolvedStmt>>,
    /// A property's resolved `Set` accessor.
    pub setter_body: Option<Vec<ResolvedStmt>>,
    /// Resolved field initializer, when the member is a field with one.
    pub initializer: Option<ResolvedExpr>,
}

/// Consumes resolved declarations and produces target output.
pub trait Emitter {
    /// Emits one resolved type with all of its members.
    fn emit_type(&mut self, registry: &TypeRegistry, ty: &ResolvedType);

    /// Called once after every type has been emitted.
    fn finish(&mut self, _registry: &TypeRegistry) {}
}

/// An [`Emitter`] that records what it was handed, for tests and
/// dry runs.
#[derive(Debug, Default)]
pub struct CollectingEmitter {
    /// Full names of emitted types, in emission order.
    pub type_names: Vec<String>,
    /// `(type, member)` name pairs for every emitted member.
    pub member_names: Vec<(String, String)>,
    /// Names of synthesized proxy methods.
    pub proxy_names: Vec<String>,
    /// Whether `finish` ran.
    pub finished: bool,
}

impl Emitter for CollectingEmitter {
    fn emit_type(&mut self, registry: &TypeRegistry, ty: &ResolvedType) {
        let type_name = registry.descriptor(ty.ty).full_name.to_string();
        for member in &ty.members {
            let member_name = registry.member(member.member).name.to_string();
            self.member_names.push((type_name.clone(), member_name));
        }
        for proxy in &ty.proxies {
            self.proxy_names.push(proxy.name.to_string());
        }
        self.type_names.push(type_name);
    }

    fn finish(&mut self, _registry: &TypeRegistry) {
        self.finished = true;
    }
}
