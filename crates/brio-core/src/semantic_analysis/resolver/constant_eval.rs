// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Constant evaluation with circular-reference detection.
//!
//! Constants resolve on demand: evaluating one initializer may request
//! another constant's value, recursively. Each constant's slot moves
//! through `Unresolved → InTransit → Resolved | Failed`; finding a slot
//! already in transit while evaluating it again is a circular
//! definition, reported once as a diagnostic (never a hang or an
//! overflow). A failed constant stays failed — expressions that consume
//! it propagate the failure without re-reporting.

use std::collections::HashMap;

use ecow::EcoString;

use crate::ast::{ExprKind, Expression, QualifiedName};
use crate::diagnostics::codes;
use crate::source_analysis::Location;

use super::super::constants::ConstantValue;
use super::super::types::{MemberId, MemberKind, TypeId, TypeKind};
use super::{Resolve, ResolveFailure, Resolver};

/// The lifecycle state of one constant.
#[derive(Debug, Clone)]
pub enum ConstantSlot {
    /// Not yet evaluated. Carries the initializer and the scope it must
    /// evaluate in.
    Unresolved {
        initializer: Expression,
        /// Declared type, when the declaration carried an `As` clause
        /// that resolved.
        declared: Option<TypeId>,
        namespace: EcoString,
        container: TypeId,
        location: Location,
    },
    /// Evaluation in progress; re-entry means a circular definition.
    InTransit { location: Location },
    /// Evaluated successfully; the value is cached.
    Resolved(ConstantValue),
    /// Evaluation failed; the diagnostic is already out.
    Failed,
}

/// All constant slots of a compilation, keyed by member.
#[derive(Debug, Default)]
pub struct ConstantTable {
    slots: HashMap<MemberId, ConstantSlot>,
}

impl ConstantTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constant's unresolved slot.
    pub fn insert(&mut self, member: MemberId, slot: ConstantSlot) {
        self.slots.insert(member, slot);
    }

    /// Every registered member id, for the force-resolution sweep.
    #[must_use]
    pub fn member_ids(&self) -> Vec<MemberId> {
        self.slots.keys().copied().collect()
    }

    fn take(&mut self, member: MemberId, location: Location) -> Option<ConstantSlot> {
        let slot = self.slots.get_mut(&member)?;
        Some(std::mem::replace(slot, ConstantSlot::InTransit { location }))
    }

    fn put(&mut self, member: MemberId, slot: ConstantSlot) {
        self.slots.insert(member, slot);
    }
}

impl Resolver<'_> {
    /// Returns a constant member's value, evaluating its initializer on
    /// first use.
    pub fn evaluate_constant(&mut self, member: MemberId) -> Resolve<ConstantValue> {
        let probe_location = Location::NULL;
        let Some(slot) = self.constants.take(member, probe_location) else {
            // A member without a slot is not a constant; the caller
            // checked the member kind, so this is unreachable on valid
            // input and conservative otherwise.
            return Err(ResolveFailure);
        };
        match slot {
            ConstantSlot::Resolved(value) => {
                self.constants.put(member, ConstantSlot::Resolved(value.clone()));
                Ok(value)
            }
            ConstantSlot::Failed => {
                self.constants.put(member, ConstantSlot::Failed);
                Err(ResolveFailure)
            }
            ConstantSlot::InTransit { location } => {
                // Leave the slot failed so every participant sees one
                // diagnostic and the recursion unwinds.
                self.constants.put(member, ConstantSlot::Failed);
                let name = self.registry.member(member).name.clone();
                Err(self.fail(
                    codes::CIRCULAR_CONSTANT,
                    location,
                    format!("constant '{name}' is defined in terms of itself"),
                ))
            }
            ConstantSlot::Unresolved {
                initializer,
                declared,
                namespace,
                container,
                location,
            } => {
                self.constants
                    .put(member, ConstantSlot::InTransit { location });

                // Evaluate in the constant's own scope, not the caller's.
                let saved_namespace = std::mem::replace(&mut self.namespace, namespace);
                let saved_container = self.containing_type.replace(container);
                let result = self
                    .resolve_constant_expr(&initializer)
                    .and_then(|value| self.apply_declared_type(value, declared, location));
                self.namespace = saved_namespace;
                self.containing_type = saved_container;

                match result {
                    Ok(value) => {
                        self.constants
                            .put(member, ConstantSlot::Resolved(value.clone()));
                        // Record the final type on the member.
                        if let MemberKind::Constant { ty } =
                            &mut self.registry.member_mut(member).kind
                        {
                            if ty.is_none() {
                                *ty = declared;
                            }
                        }
                        Ok(value)
                    }
                    Err(failure) => {
                        // A circular evaluation below already marked the
                        // slot failed; keep that state either way.
                        self.constants.put(member, ConstantSlot::Failed);
                        Err(failure)
                    }
                }
            }
        }
    }

    fn apply_declared_type(
        &mut self,
        value: ConstantValue,
        declared: Option<TypeId>,
        location: Location,
    ) -> Resolve<ConstantValue> {
        let Some(declared) = declared else {
            return Ok(value);
        };
        let descriptor = self.registry.descriptor(declared);
        if let TypeKind::Enum { underlying } = descriptor.kind {
            if let ConstantValue::EnumValue { ty, .. } = &value {
                if *ty == declared {
                    return Ok(value);
                }
            }
            return match value.convert_to(underlying) {
                Ok(ConstantValue::Int { value, .. }) => Ok(ConstantValue::EnumValue {
                    ty: declared,
                    underlying,
                    value,
                }),
                Ok(_) | Err(_) => {
                    let message = format!(
                        "constant value cannot be converted to '{}'",
                        self.type_name(declared)
                    );
                    Err(self.fail(codes::CONSTANT_NOT_REPRESENTABLE, location, message))
                }
            };
        }
        let Some(primitive) = descriptor.primitive_kind() else {
            // Only primitive- and enum-typed constants exist.
            let message = format!(
                "'{}' is not a valid constant type",
                self.type_name(declared)
            );
            return Err(self.fail(codes::EXPRESSION_NOT_CONSTANT, location, message));
        };
        value
            .convert_to(primitive)
            .map_err(|error| self.report_constant_error(error, location))
    }

    /// Evaluates an expression that must be constant: literals, other
    /// constants and enum members, the operators over them, `CType`
    /// between primitives, and `GetType` references.
    pub fn resolve_constant_expr(&mut self, expr: &Expression) -> Resolve<ConstantValue> {
        match &expr.kind {
            ExprKind::Integer { value, kind } => Ok(ConstantValue::Int {
                value: i128::from(*value),
                kind: integer_kind(*kind),
            }),
            ExprKind::Float { value, kind } => Ok(ConstantValue::Float {
                value: *value,
                kind: float_kind(*kind),
            }),
            ExprKind::DecimalLiteral(value) => Ok(ConstantValue::DecimalValue(*value)),
            ExprKind::Str(value) => Ok(ConstantValue::Str(value.clone())),
            ExprKind::Char(value) => Ok(ConstantValue::Char(*value)),
            ExprKind::Date(value) => Ok(ConstantValue::Date(*value)),
            ExprKind::Bool(value) => Ok(ConstantValue::Bool(*value)),
            ExprKind::Nothing => Ok(ConstantValue::Null),

            ExprKind::Parenthesized(inner) => self.resolve_constant_expr(inner),

            ExprKind::Unary { op, operand } => {
                let operand = self.resolve_constant_expr(operand)?;
                super::super::folding::fold_unary(*op, &operand)
                    .map_err(|error| self.report_constant_error(error, expr.location))
            }

            ExprKind::Binary { op, left, right } => {
                let left = self.resolve_constant_expr(left)?;
                let right = self.resolve_constant_expr(right)?;
                super::super::folding::fold_binary(*op, &left, &right)
                    .map_err(|error| self.report_constant_error(error, expr.location))
            }

            ExprKind::Cast { operand, type_name } => {
                let operand = self.resolve_constant_expr(operand)?;
                let target = self.resolve_type(type_name, false).ok_or(ResolveFailure)?;
                let Some(primitive) = self.registry.descriptor(target).primitive_kind() else {
                    let message = format!(
                        "'{}' is not a primitive type",
                        self.type_name(target)
                    );
                    return Err(self.fail(
                        codes::EXPRESSION_NOT_CONSTANT,
                        expr.location,
                        message,
                    ));
                };
                operand
                    .convert_to(primitive)
                    .map_err(|error| self.report_constant_error(error, expr.location))
            }

            ExprKind::GetType { type_name } => {
                let target = self.resolve_type(type_name, false).ok_or(ResolveFailure)?;
                Ok(ConstantValue::TypeRef(target))
            }

            ExprKind::Name(name) => {
                // Local constants shadow member constants.
                if let Some(super::super::block::LocalSymbol::Constant { value, .. }) =
                    self.blocks.lookup(self.current_block, name)
                {
                    return value.clone().ok_or(ResolveFailure);
                }
                self.constant_named(name, expr.location)
            }

            ExprKind::Member { .. } => {
                let Some(path) = flatten_to_path(expr) else {
                    return Err(self.not_constant(expr.location));
                };
                self.constant_at_path(&path, expr.location)
            }

            _ => Err(self.not_constant(expr.location)),
        }
    }

    fn not_constant(&mut self, location: Location) -> ResolveFailure {
        self.fail(
            codes::EXPRESSION_NOT_CONSTANT,
            location,
            "expression must be a constant",
        )
    }

    /// An unqualified name in a constant context: a constant or enum
    /// member of the containing type or its base chain.
    fn constant_named(&mut self, name: &str, location: Location) -> Resolve<ConstantValue> {
        if let Some(container) = self.containing_type {
            let members = self.registry.members_named(container, name);
            if let Some(value) = self.constant_member_value(&members)? {
                return Ok(value);
            }
        }
        Err(self.fail(
            codes::NAME_NOT_FOUND,
            location,
            format!("'{name}' is not declared or is not a constant"),
        ))
    }

    /// A dotted path in a constant context: the longest resolvable
    /// prefix names a type, the final segment one of its constants.
    fn constant_at_path(
        &mut self,
        path: &[EcoString],
        location: Location,
    ) -> Resolve<ConstantValue> {
        for split in (1..path.len()).rev() {
            let prefix = QualifiedName(path[..split].to_vec());
            let Some(ty) = self.resolve_qualified(&prefix, true, location) else {
                continue;
            };
            if split + 1 != path.len() {
                // Nested member paths would need nested types.
                break;
            }
            let members = self.registry.members_named(ty, &path[split]);
            if let Some(value) = self.constant_member_value(&members)? {
                return Ok(value);
            }
            break;
        }
        Err(self.fail(
            codes::NAME_NOT_FOUND,
            location,
            format!(
                "'{}' is not a constant",
                QualifiedName(path.to_vec()).dotted()
            ),
        ))
    }

    /// Extracts a constant value from a member list, evaluating
    /// constant slots on demand.
    fn constant_member_value(
        &mut self,
        members: &[MemberId],
    ) -> Result<Option<ConstantValue>, ResolveFailure> {
        for &member in members {
            match &self.registry.member(member).kind {
                MemberKind::Constant { .. } => {
                    return self.evaluate_constant(member).map(Some);
                }
                MemberKind::EnumMember { value } => {
                    let value = *value;
                    let declaring = self.registry.member(member).declaring_type;
                    let TypeKind::Enum { underlying } = self.registry.descriptor(declaring).kind
                    else {
                        return Err(ResolveFailure);
                    };
                    return Ok(Some(ConstantValue::EnumValue {
                        ty: declaring,
                        underlying,
                        value,
                    }));
                }
                _ => {}
            }
        }
        Ok(None)
    }
}

fn integer_kind(kind: crate::source_analysis::IntegerKind) -> super::super::types::PrimitiveKind {
    use crate::source_analysis::IntegerKind as I;
    use super::super::types::PrimitiveKind as P;
    match kind {
        I::Short => P::Short,
        I::Integer => P::Integer,
        I::Long => P::Long,
    }
}

fn float_kind(kind: crate::source_analysis::FloatKind) -> super::super::types::PrimitiveKind {
    use crate::source_analysis::FloatKind as F;
    use super::super::types::PrimitiveKind as P;
    match kind {
        F::Single => P::Single,
        F::Double => P::Double,
    }
}

/// Flattens `A.B.C` member chains into a path of names.
fn flatten_to_path(expr: &Expression) -> Option<Vec<EcoString>> {
    match &expr.kind {
        ExprKind::Name(name) => Some(vec![name.clone()]),
        ExprKind::Member { target, name } => {
            let mut path = flatten_to_path(target)?;
            path.push(name.clone());
            Some(path)
        }
        _ => None,
    }
}
