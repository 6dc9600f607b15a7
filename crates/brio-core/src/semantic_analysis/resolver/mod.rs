// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Expression and statement resolution.
//!
//! Resolution binds syntax nodes to semantic information — a type, a
//! resolution class, a target declaration — and validates them against
//! the language rules. It produces a *new* resolved tree instead of
//! mutating the syntax tree, keyed by each node's [`NodeId`]; resolving
//! a node a second time returns the cached outcome without re-running
//! side-effecting diagnostics.
//!
//! Failure is an explicit value: resolution functions return
//! [`Resolve`], and a failed node has already reported its diagnostic.
//! Callers propagate the failure with `?` and never report twice. A
//! node's `ty` being `Void` means "a `Sub` call"; it never means
//! "failed" — that distinction is carried by the `Result`, not by a
//! sentinel type.

use std::collections::HashMap;

use ecow::EcoString;

use crate::ast::{ExitKind, NodeId};
use crate::diagnostics::{Diagnostics, codes};
use crate::source_analysis::Location;

use super::block::BlockTree;
use super::constants::{ConstantError, ConstantValue};
use super::flow_analysis::FlowAnalysis;
use super::type_registry::{ImportTable, ResolveScope, TypeRegistry};
use super::types::{MemberId, PrimitiveKind, TypeId, TypeKind, widens_to};

mod constant_eval;
mod expressions;
mod statements;

pub use constant_eval::{ConstantSlot, ConstantTable};
pub use statements::{ResolvedCatch, ResolvedStmt};

/// Resolution failure marker. The diagnostic is already reported when a
/// failure is constructed; callers just propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveFailure;

/// The result of resolving a node.
pub type Resolve<T> = Result<T, ResolveFailure>;

/// The resolution class of an expression — what kind of thing the
/// expression denotes, beyond its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprClass {
    /// An ordinary value.
    Value,
    /// An assignable variable (local, parameter, field, array element).
    Variable,
    /// A type name.
    Type,
    /// A namespace prefix awaiting a member access.
    Namespace,
    /// An unapplied method group.
    MethodGroup,
    /// A property access, readable and/or writable.
    PropertyAccess,
}

/// A fully resolved expression node.
#[derive(Debug, Clone)]
pub struct ResolvedExpr {
    /// The inferred type. `Void` for `Sub` calls and non-value classes.
    pub ty: TypeId,
    /// The resolution class.
    pub class: ExprClass,
    /// Source location, carried over from the syntax node.
    pub location: Location,
    /// The resolved payload.
    pub kind: ResolvedExprKind,
}

/// The closed set of resolved expression forms handed to the emitter.
#[derive(Debug, Clone)]
pub enum ResolvedExprKind {
    /// A compile-time constant (literals, folded expressions, constant
    /// member references).
    Literal(ConstantValue),
    /// A local variable, by index into the method's block tree.
    Local { variable: usize },
    /// A parameter of the enclosing method, by index.
    Parameter { index: usize },
    /// A field access. `target` is `None` for implicit-`Me` or shared
    /// access.
    Field {
        member: MemberId,
        target: Option<Box<ResolvedExpr>>,
    },
    /// A property access. Indexer properties carry their resolved
    /// index arguments; plain properties have none.
    Property {
        member: MemberId,
        target: Option<Box<ResolvedExpr>>,
        arguments: Vec<ResolvedExpr>,
    },
    /// A method group awaiting invocation or delegate conversion.
    MethodGroup {
        members: Vec<MemberId>,
        target: Option<Box<ResolvedExpr>>,
    },
    /// A bound method call.
    Call {
        method: MemberId,
        target: Option<Box<ResolvedExpr>>,
        arguments: Vec<ResolvedExpr>,
    },
    /// An array element access.
    Index {
        target: Box<ResolvedExpr>,
        arguments: Vec<ResolvedExpr>,
    },
    /// A type reference.
    TypeRef(TypeId),
    /// A namespace prefix.
    NamespaceRef(EcoString),
    /// The current instance.
    Me,
    /// The base-class view of the current instance.
    MyBase,
    /// A binary operation.
    Binary {
        op: crate::ast::BinaryOp,
        left: Box<ResolvedExpr>,
        right: Box<ResolvedExpr>,
    },
    /// A unary operation.
    Unary {
        op: crate::ast::UnaryOp,
        operand: Box<ResolvedExpr>,
    },
    /// A conversion; `ty` is the target.
    Convert {
        kind: ConversionKind,
        operand: Box<ResolvedExpr>,
    },
    /// Object creation.
    New {
        constructor: Option<MemberId>,
        arguments: Vec<ResolvedExpr>,
    },
    /// A delegate built from a method group (`AddressOf`).
    DelegateCreate {
        method: MemberId,
        target: Option<Box<ResolvedExpr>>,
    },
    /// `GetType(T)`.
    GetTypeRef(TypeId),
    /// The typed `Nothing` value.
    Nothing,
}

/// How a conversion was justified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    /// A widening conversion, inserted implicitly.
    Implicit,
    /// A narrowing conversion, demanded by `CType` or the compound-
    /// assignment rule.
    Explicit,
}

/// The method whose body is being resolved.
#[derive(Debug, Clone)]
pub struct MethodContext {
    /// Return type; `None` for a `Sub`, a constructor, or a setter.
    pub return_type: Option<TypeId>,
    /// Resolved parameters.
    pub parameters: Vec<super::types::ParameterSig>,
    /// `True` inside `Shared` methods and module members.
    pub is_shared: bool,
    /// `True` inside a constructor.
    pub is_constructor: bool,
    /// The flow slot tracking `Me` in a structure constructor.
    pub me_slot: i32,
    /// Whether the body is a `Function` (affects `Exit` checking).
    pub is_function: bool,
    /// Whether the body is a property accessor.
    pub in_property: bool,
}

impl Default for MethodContext {
    fn default() -> Self {
        Self {
            return_type: None,
            parameters: Vec::new(),
            is_shared: true,
            is_constructor: false,
            me_slot: -1,
            is_function: false,
            in_property: false,
        }
    }
}

/// The resolver for one method body (or one standalone expression).
///
/// Borrows the session's shared state mutably for the duration of the
/// resolution — the single-owner replacement for global tables.
pub struct Resolver<'s> {
    pub registry: &'s mut TypeRegistry,
    pub diagnostics: &'s mut Diagnostics,
    pub imports: &'s mut ImportTable,
    pub constants: &'s mut ConstantTable,
    /// Dotted namespace of the enclosing type.
    pub namespace: EcoString,
    /// The enclosing type.
    pub containing_type: Option<TypeId>,
    /// The enclosing method.
    pub method: MethodContext,
    /// The method body's block tree.
    pub blocks: BlockTree,
    /// The block statements currently resolve into.
    pub current_block: super::block::BlockId,
    /// Definite-assignment state.
    pub flow: FlowAnalysis,
    /// Constructs an `Exit` statement may leave, innermost last.
    pub exits: Vec<ExitKind>,
    /// `GoTo` uses awaiting end-of-body label validation.
    pub goto_uses: Vec<(EcoString, Location)>,
    /// Nesting depth of `Catch` bodies (for bare `Throw`).
    pub catch_depth: u32,
    /// Warn when a `Function` can fall off its end.
    pub warn_missing_return: bool,
    /// Resolution cache, keyed by node identity. `None` records a
    /// failure so re-resolution does not re-report.
    cache: HashMap<NodeId, Option<ResolvedExpr>>,
}

impl<'s> Resolver<'s> {
    /// Creates a resolver over the session's shared state.
    pub fn new(
        registry: &'s mut TypeRegistry,
        diagnostics: &'s mut Diagnostics,
        imports: &'s mut ImportTable,
        constants: &'s mut ConstantTable,
        namespace: EcoString,
        containing_type: Option<TypeId>,
    ) -> Self {
        Self {
            registry,
            diagnostics,
            imports,
            constants,
            namespace,
            containing_type,
            method: MethodContext::default(),
            blocks: BlockTree::new(),
            current_block: super::block::BlockId::ROOT,
            flow: FlowAnalysis::new(true),
            exits: Vec::new(),
            goto_uses: Vec::new(),
            catch_depth: 0,
            warn_missing_return: false,
            cache: HashMap::new(),
        }
    }

    /// Resolves a source type reference in the current scope.
    pub fn resolve_type(
        &mut self,
        type_name: &crate::ast::TypeName,
        silent: bool,
    ) -> Option<TypeId> {
        let scope = ResolveScope {
            namespace: &self.namespace,
            containing_type: self.containing_type,
        };
        self.registry
            .resolve_type_name(scope, self.imports, type_name, silent, self.diagnostics)
    }

    /// Resolves a dotted name to a type in the current scope.
    pub fn resolve_qualified(
        &mut self,
        name: &crate::ast::QualifiedName,
        silent: bool,
        location: Location,
    ) -> Option<TypeId> {
        let scope = ResolveScope {
            namespace: &self.namespace,
            containing_type: self.containing_type,
        };
        self.registry
            .resolve(scope, self.imports, name, silent, location, self.diagnostics)
    }

    pub(super) fn cached(&self, id: NodeId) -> Option<Resolve<ResolvedExpr>> {
        self.cache
            .get(&id)
            .map(|entry| entry.clone().ok_or(ResolveFailure))
    }

    pub(super) fn remember(
        &mut self,
        id: NodeId,
        result: &Resolve<ResolvedExpr>,
    ) -> Resolve<ResolvedExpr> {
        self.cache.insert(id, result.clone().ok());
        result.clone()
    }

    pub(super) fn fail(
        &mut self,
        code: u16,
        location: Location,
        message: impl Into<EcoString>,
    ) -> ResolveFailure {
        self.diagnostics.error(code, location, message);
        ResolveFailure
    }

    /// Renders a type name for diagnostics.
    #[must_use]
    pub fn type_name(&self, ty: TypeId) -> EcoString {
        self.registry.descriptor(ty).full_name.clone()
    }

    // === Conversions ===

    /// Returns `true` if `from` converts to `to` without an operator:
    /// identity, primitive widening, derived-to-base, class-to-
    /// implemented-interface.
    #[must_use]
    pub fn converts_implicitly(&self, from: TypeId, to: TypeId) -> bool {
        if from == to {
            return true;
        }
        let from_desc = self.registry.descriptor(from);
        let to_desc = self.registry.descriptor(to);
        if let (Some(a), Some(b)) = (from_desc.primitive_kind(), to_desc.primitive_kind()) {
            // An enum does not implicitly become its underlying type,
            // but two distinct primitives may widen.
            if !from_desc.is_enum() && !to_desc.is_enum() && widens_to(a, b) {
                return true;
            }
        }
        if self.registry.is_or_inherits(from, to) {
            return true;
        }
        if to_desc.is_interface() && self.registry.implements(from, to) {
            return true;
        }
        false
    }

    /// Returns `true` if an explicit conversion from `from` to `to`
    /// exists: the implicit set, the full numeric table, enum-to-
    /// underlying traffic, and reference downcasts.
    #[must_use]
    pub fn converts_explicitly(&self, from: TypeId, to: TypeId) -> bool {
        if self.converts_implicitly(from, to) {
            return true;
        }
        let from_desc = self.registry.descriptor(from);
        let to_desc = self.registry.descriptor(to);
        if let (Some(a), Some(b)) = (from_desc.primitive_kind(), to_desc.primitive_kind()) {
            if super::types::converts_to(a, b) {
                return true;
            }
        }
        // Downcast: base to derived, or any interface to anything.
        if self.registry.is_or_inherits(to, from) {
            return true;
        }
        from_desc.is_interface() || to_desc.is_interface()
    }

    /// Wraps `expr` in an implicit conversion to `target`, or reports
    /// and fails. Constant expressions may narrow when the value is
    /// representable in the target type.
    pub fn implicit_conversion(
        &mut self,
        expr: ResolvedExpr,
        target: TypeId,
    ) -> Resolve<ResolvedExpr> {
        if expr.ty == target {
            return Ok(expr);
        }

        // `Nothing` adapts to any type as its default value.
        if matches!(expr.kind, ResolvedExprKind::Nothing) {
            return Ok(ResolvedExpr {
                ty: target,
                class: ExprClass::Value,
                location: expr.location,
                kind: ResolvedExprKind::Nothing,
            });
        }

        if self.converts_implicitly(expr.ty, target) {
            return Ok(self.wrap_conversion(expr, target, ConversionKind::Implicit));
        }

        // A constant expression narrows implicitly when its value is
        // representable in the target type.
        if let ResolvedExprKind::Literal(value) = &expr.kind {
            if let Some(kind) = self.registry.descriptor(target).primitive_kind() {
                if !self.registry.descriptor(target).is_enum() {
                    if let Ok(converted) = value.convert_to(kind) {
                        return Ok(ResolvedExpr {
                            ty: target,
                            class: ExprClass::Value,
                            location: expr.location,
                            kind: ResolvedExprKind::Literal(converted),
                        });
                    }
                    let message = format!(
                        "constant value '{}' cannot be converted to '{}'",
                        value.describe(),
                        self.type_name(target)
                    );
                    return Err(self.fail(
                        codes::CONSTANT_NOT_REPRESENTABLE,
                        expr.location,
                        message,
                    ));
                }
            }
        }

        let message = format!(
            "value of type '{}' cannot be implicitly converted to '{}'",
            self.type_name(expr.ty),
            self.type_name(target)
        );
        Err(self.fail(codes::NO_IMPLICIT_CONVERSION, expr.location, message))
    }

    /// Wraps `expr` in an explicit conversion to `target`, or reports
    /// and fails. Constants are narrowed at compile time.
    pub fn explicit_conversion(
        &mut self,
        expr: ResolvedExpr,
        target: TypeId,
    ) -> Resolve<ResolvedExpr> {
        if expr.ty == target {
            return Ok(expr);
        }
        if matches!(expr.kind, ResolvedExprKind::Nothing) {
            return Ok(ResolvedExpr {
                ty: target,
                class: ExprClass::Value,
                location: expr.location,
                kind: ResolvedExprKind::Nothing,
            });
        }
        if let ResolvedExprKind::Literal(value) = &expr.kind {
            if let Some(kind) = self.registry.descriptor(target).primitive_kind() {
                if !self.registry.descriptor(target).is_enum() {
                    return match value.convert_to(kind) {
                        Ok(converted) => Ok(ResolvedExpr {
                            ty: target,
                            class: ExprClass::Value,
                            location: expr.location,
                            kind: ResolvedExprKind::Literal(converted),
                        }),
                        Err(ConstantError::NotRepresentable) => {
                            let message = format!(
                                "constant value '{}' cannot be converted to '{}'",
                                value.describe(),
                                self.type_name(target)
                            );
                            Err(self.fail(
                                codes::CONSTANT_NOT_REPRESENTABLE,
                                expr.location,
                                message,
                            ))
                        }
                        Err(_) => {
                            let message = format!(
                                "value of type '{}' cannot be converted to '{}'",
                                self.type_name(expr.ty),
                                self.type_name(target)
                            );
                            Err(self.fail(codes::NO_EXPLICIT_CONVERSION, expr.location, message))
                        }
                    };
                }
            }
        }
        if self.converts_explicitly(expr.ty, target) {
            return Ok(self.wrap_conversion(expr, target, ConversionKind::Explicit));
        }
        let message = format!(
            "value of type '{}' cannot be converted to '{}'",
            self.type_name(expr.ty),
            self.type_name(target)
        );
        Err(self.fail(codes::NO_EXPLICIT_CONVERSION, expr.location, message))
    }

    fn wrap_conversion(
        &self,
        expr: ResolvedExpr,
        target: TypeId,
        kind: ConversionKind,
    ) -> ResolvedExpr {
        let location = expr.location;
        ResolvedExpr {
            ty: target,
            class: ExprClass::Value,
            location,
            kind: ResolvedExprKind::Convert {
                kind,
                operand: Box::new(expr),
            },
        }
    }

    /// The `Boolean` type id.
    #[must_use]
    pub fn boolean(&self) -> TypeId {
        self.registry.primitive(PrimitiveKind::Boolean)
    }

    /// Resolves an expression and converts it to `Boolean`.
    pub fn resolve_condition(&mut self, expr: &crate::ast::Expression) -> Resolve<ResolvedExpr> {
        let resolved = self.resolve_expression(expr)?;
        let boolean = self.boolean();
        self.implicit_conversion(resolved, boolean)
    }

    /// Checks a method group against a delegate's `Invoke` signature:
    /// parameter types must match positionally and the return type must
    /// match exactly, with no variance. The as-declared parameter array
    /// is compared, so a `ParamArray` method needs no special case.
    pub fn delegate_compatible_method(
        &mut self,
        delegate: TypeId,
        members: &[MemberId],
        location: Location,
    ) -> Resolve<MemberId> {
        let invoke = self
            .registry
            .own_members_named(delegate, "Invoke")
            .into_iter()
            .next();
        let Some(invoke) = invoke else {
            let message = format!(
                "'{}' does not define an invocation signature",
                self.type_name(delegate)
            );
            return Err(self.fail(codes::DELEGATE_SIGNATURE_MISMATCH, location, message));
        };
        let invoke_signature = self
            .registry
            .member(invoke)
            .signature()
            .cloned()
            .expect("delegate Invoke is a method");

        for &candidate in members {
            if let Some(signature) = self.registry.member(candidate).signature() {
                if signature.matches(&invoke_signature) {
                    return Ok(candidate);
                }
            }
        }
        let message = format!(
            "no compatible method for delegate '{}'",
            self.type_name(delegate)
        );
        Err(self.fail(codes::DELEGATE_SIGNATURE_MISMATCH, location, message))
    }

    /// The element type of an array, if `ty` is one.
    #[must_use]
    pub fn array_element(&self, ty: TypeId) -> Option<TypeId> {
        match self.registry.descriptor(ty).kind {
            TypeKind::Array { element } => Some(element),
            _ => None,
        }
    }

    /// Maps a constant-evaluation error onto the right diagnostic.
    pub(crate) fn report_constant_error(
        &mut self,
        error: ConstantError,
        location: Location,
    ) -> ResolveFailure {
        match error {
            ConstantError::NotRepresentable => self.fail(
                codes::CONSTANT_NOT_REPRESENTABLE,
                location,
                "constant value cannot be converted to the target type",
            ),
            ConstantError::NoConversion => self.fail(
                codes::NO_EXPLICIT_CONVERSION,
                location,
                "no conversion exists between the constant and the target type",
            ),
            ConstantError::OperatorNotDefined => self.fail(
                codes::OPERATOR_NOT_DEFINED,
                location,
                "operator is not defined for these operand types",
            ),
            ConstantError::DivisionByZero => self.fail(
                codes::CONSTANT_NOT_REPRESENTABLE,
                location,
                "division by zero in a constant expression",
            ),
        }
    }

    /// Declares the method's parameters are in scope. Parameter names
    /// must not collide (the parser guarantees the fixed/`ParamArray`
    /// split; the name check happens at signature definition).
    #[must_use]
    pub fn parameter_named(&self, name: &str) -> Option<usize> {
        self.method
            .parameters
            .iter()
            .position(|parameter| parameter.name.eq_ignore_ascii_case(name))
    }
}
