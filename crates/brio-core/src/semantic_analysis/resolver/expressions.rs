// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Expression resolution: name binding, member access, overload
//! resolution, and operator typing.
//!
//! A bare name binds in order: local variables and constants, the
//! enclosing method's parameters, members of the containing type and
//! its base chain, a type in scope, and finally a namespace prefix.
//! Member accesses then navigate from whatever the prefix resolved to.
//!
//! Both operands of an arithmetic operator are brought to the
//! operator's result type; when every operand is a constant the whole
//! node folds to a literal at compile time.

use ecow::EcoString;

use crate::ast::{Argument, BinaryOp, ExprKind, Expression, Modifiers, QualifiedName, UnaryOp};
use crate::diagnostics::codes;
use crate::source_analysis::Location;

use super::super::block::LocalSymbol;
use super::super::constants::ConstantValue;
use super::super::folding;
use super::super::types::{MemberId, MemberKind, ParameterSig, PrimitiveKind, TypeId};
use super::{ConversionKind, ExprClass, Resolve, ResolveFailure, ResolvedExpr, ResolvedExprKind, Resolver};

impl Resolver<'_> {
    /// Resolves an expression, consulting and filling the node cache so
    /// repeated resolution of the same node is side-effect free.
    pub fn resolve_expression(&mut self, expr: &Expression) -> Resolve<ResolvedExpr> {
        if let Some(cached) = self.cached(expr.id) {
            return cached;
        }
        let result = self.resolve_expression_uncached(expr);
        self.remember(expr.id, &result)
    }

    pub(super) fn resolve_expression_uncached(&mut self, expr: &Expression) -> Resolve<ResolvedExpr> {
        let location = expr.location;
        match &expr.kind {
            ExprKind::Integer { .. }
            | ExprKind::Float { .. }
            | ExprKind::DecimalLiteral(_)
            | ExprKind::Str(_)
            | ExprKind::Char(_)
            | ExprKind::Date(_)
            | ExprKind::Bool(_) => {
                let value = self.resolve_constant_expr(expr)?;
                Ok(self.literal(value, location))
            }
            ExprKind::Nothing => Ok(ResolvedExpr {
                ty: self.registry.object(),
                class: ExprClass::Value,
                location,
                kind: ResolvedExprKind::Nothing,
            }),

            ExprKind::Name(name) => self.resolve_name(name, location),
            ExprKind::Member { target, name } => self.resolve_member_access(target, name, location),
            ExprKind::Invocation { target, arguments } => {
                self.resolve_invocation(target, arguments, location)
            }
            ExprKind::Binary { op, left, right } => self.resolve_binary(*op, left, right, location),
            ExprKind::Unary { op, operand } => self.resolve_unary(*op, operand, location),
            ExprKind::Parenthesized(inner) => self.resolve_expression(inner),

            ExprKind::New {
                type_name,
                arguments,
            } => self.resolve_new(type_name, arguments, location),

            ExprKind::Cast {
                operand,
                type_name,
            } => {
                let operand = self.resolve_expression(operand)?;
                let target = self.resolve_type(type_name, false).ok_or(ResolveFailure)?;
                let operand = self.expect_value(operand)?;
                self.explicit_conversion(operand, target)
            }

            ExprKind::GetType { type_name } => {
                let target = self.resolve_type(type_name, false).ok_or(ResolveFailure)?;
                Ok(ResolvedExpr {
                    ty: self.registry.object(),
                    class: ExprClass::Value,
                    location,
                    kind: ResolvedExprKind::GetTypeRef(target),
                })
            }

            ExprKind::AddressOf { target } => {
                let group = self.resolve_expression(target)?;
                if !matches!(group.kind, ResolvedExprKind::MethodGroup { .. }) {
                    return Err(self.fail(
                        codes::INVOCATION_TARGET_INVALID,
                        location,
                        "'AddressOf' requires a method name",
                    ));
                }
                // Stays a method group until a delegate type claims it.
                Ok(group)
            }

            ExprKind::Me => self.resolve_me(location, false),
            ExprKind::MyBase => self.resolve_me(location, true),

            ExprKind::Error => Err(ResolveFailure),
        }
    }

    fn literal(&mut self, value: ConstantValue, location: Location) -> ResolvedExpr {
        let ty = match &value {
            ConstantValue::EnumValue { ty, .. } => *ty,
            ConstantValue::TypeRef(_) | ConstantValue::Null => self.registry.object(),
            other => {
                let kind = other.primitive_kind().expect("literal has a primitive kind");
                self.registry.primitive(kind)
            }
        };
        ResolvedExpr {
            ty,
            class: ExprClass::Value,
            location,
            kind: ResolvedExprKind::Literal(value),
        }
    }

    /// A resolved node used where a value is needed: method groups and
    /// bare type/namespace references are rejected, property accesses
    /// read through.
    pub fn expect_value(&mut self, expr: ResolvedExpr) -> Resolve<ResolvedExpr> {
        match expr.class {
            ExprClass::Value | ExprClass::Variable => Ok(expr),
            ExprClass::PropertyAccess => {
                let ResolvedExprKind::Property { member, .. } = &expr.kind else {
                    return Ok(expr);
                };
                let readable = matches!(
                    self.registry.member(*member).kind,
                    MemberKind::Property { readable: true, .. }
                );
                if readable {
                    Ok(ResolvedExpr {
                        class: ExprClass::Value,
                        ..expr
                    })
                } else {
                    let name = self.registry.member(*member).name.clone();
                    Err(self.fail(
                        codes::PROPERTY_NOT_WRITABLE,
                        expr.location,
                        format!("property '{name}' is write-only here"),
                    ))
                }
            }
            ExprClass::Type | ExprClass::Namespace | ExprClass::MethodGroup => {
                Err(self.fail(
                    codes::INVOCATION_TARGET_INVALID,
                    expr.location,
                    "expression does not produce a value",
                ))
            }
        }
    }

    // === Names ===

    fn resolve_name(&mut self, name: &EcoString, location: Location) -> Resolve<ResolvedExpr> {
        // Locals and local constants, innermost block first.
        if let Some(symbol) = self.blocks.lookup(self.current_block, name) {
            match symbol {
                LocalSymbol::Variable(index) => {
                    let index = *index;
                    let variable = &self.blocks.variables[index];
                    let slot = variable.slot;
                    let ty = variable.ty;
                    if !self.flow.is_assigned(slot) {
                        self.diagnostics.error(
                            codes::USE_OF_UNASSIGNED,
                            location,
                            format!("variable '{name}' is used before it has been assigned"),
                        );
                        // Keep resolving; one report per use site is
                        // enough and the type is still known.
                    }
                    let ty = ty.ok_or(ResolveFailure)?;
                    return Ok(ResolvedExpr {
                        ty,
                        class: ExprClass::Variable,
                        location,
                        kind: ResolvedExprKind::Local { variable: index },
                    });
                }
                LocalSymbol::Constant { ty: _, value } => {
                    let value = value.clone().ok_or(ResolveFailure)?;
                    return Ok(self.literal(value, location));
                }
            }
        }

        // Parameters.
        if let Some(index) = self.parameter_named(name) {
            let ty = self.method.parameters[index].ty;
            return Ok(ResolvedExpr {
                ty,
                class: ExprClass::Variable,
                location,
                kind: ResolvedExprKind::Parameter { index },
            });
        }

        // Members of the containing type.
        if let Some(container) = self.containing_type {
            let members = self.registry.members_named(container, name);
            if !members.is_empty() {
                return self.resolve_member_list(&members, None, location);
            }
        }

        // A type in scope.
        let qualified = QualifiedName::simple(name.clone());
        if let Some(ty) = self.resolve_qualified(&qualified, true, location) {
            return Ok(ResolvedExpr {
                ty,
                class: ExprClass::Type,
                location,
                kind: ResolvedExprKind::TypeRef(ty),
            });
        }

        // A namespace prefix.
        if self.registry.is_namespace(name) {
            return Ok(ResolvedExpr {
                ty: self.registry.void(),
                class: ExprClass::Namespace,
                location,
                kind: ResolvedExprKind::NamespaceRef(name.clone()),
            });
        }

        Err(self.fail(
            codes::NAME_NOT_FOUND,
            location,
            format!("'{name}' is not declared"),
        ))
    }

    fn resolve_me(&mut self, location: Location, base_view: bool) -> Resolve<ResolvedExpr> {
        let Some(container) = self.containing_type else {
            return Err(self.fail(
                codes::NAME_NOT_FOUND,
                location,
                "'Me' is only valid inside a type",
            ));
        };
        if self.method.is_shared {
            return Err(self.fail(
                codes::NAME_NOT_FOUND,
                location,
                "'Me' is not valid in a shared context",
            ));
        }
        let ty = if base_view {
            self.registry
                .descriptor(container)
                .base
                .unwrap_or(container)
        } else {
            container
        };
        Ok(ResolvedExpr {
            ty,
            class: ExprClass::Value,
            location,
            kind: if base_view {
                ResolvedExprKind::MyBase
            } else {
                ResolvedExprKind::Me
            },
        })
    }

    // === Member access ===

    fn resolve_member_access(
        &mut self,
        target: &Expression,
        name: &EcoString,
        location: Location,
    ) -> Resolve<ResolvedExpr> {
        let target = self.resolve_expression(target)?;
        match target.class {
            ExprClass::Namespace => {
                let ResolvedExprKind::NamespaceRef(prefix) = &target.kind else {
                    return Err(ResolveFailure);
                };
                let mut segments: Vec<EcoString> =
                    prefix.split('.').map(EcoString::from).collect();
                segments.push(name.clone());
                let qualified = QualifiedName(segments);
                if let Some(ty) = self.resolve_qualified(&qualified, true, location) {
                    return Ok(ResolvedExpr {
                        ty,
                        class: ExprClass::Type,
                        location,
                        kind: ResolvedExprKind::TypeRef(ty),
                    });
                }
                let dotted = qualified.dotted();
                if self.registry.is_namespace(&dotted) {
                    return Ok(ResolvedExpr {
                        ty: self.registry.void(),
                        class: ExprClass::Namespace,
                        location,
                        kind: ResolvedExprKind::NamespaceRef(dotted),
                    });
                }
                Err(self.fail(
                    codes::NAME_NOT_FOUND,
                    location,
                    format!("'{dotted}' is not defined"),
                ))
            }
            ExprClass::Type => {
                let ResolvedExprKind::TypeRef(ty) = target.kind else {
                    return Err(ResolveFailure);
                };
                let members = self.registry.members_named(ty, name);
                if members.is_empty() {
                    let type_name = self.type_name(ty);
                    return Err(self.fail(
                        codes::NAME_NOT_FOUND,
                        location,
                        format!("'{name}' is not a member of '{type_name}'"),
                    ));
                }
                self.resolve_member_list(&members, None, location)
            }
            _ => {
                let target = self.expect_value(target)?;
                let members = self.registry.members_named(target.ty, name);
                if members.is_empty() {
                    let type_name = self.type_name(target.ty);
                    return Err(self.fail(
                        codes::NAME_NOT_FOUND,
                        location,
                        format!("'{name}' is not a member of '{type_name}'"),
                    ));
                }
                self.resolve_member_list(&members, Some(Box::new(target)), location)
            }
        }
    }

    /// Builds the resolved node for a member lookup hit: a field
    /// variable, a property access, a constant literal, or a method
    /// group awaiting arguments.
    fn resolve_member_list(
        &mut self,
        members: &[MemberId],
        target: Option<Box<ResolvedExpr>>,
        location: Location,
    ) -> Resolve<ResolvedExpr> {
        let first = members[0];
        let kind = self.registry.member(first).kind.clone();
        match kind {
            MemberKind::Method { .. } | MemberKind::Constructor { .. } => Ok(ResolvedExpr {
                ty: self.registry.void(),
                class: ExprClass::MethodGroup,
                location,
                kind: ResolvedExprKind::MethodGroup {
                    members: members.to_vec(),
                    target,
                },
            }),
            MemberKind::Field { ty } => Ok(ResolvedExpr {
                ty,
                class: ExprClass::Variable,
                location,
                kind: ResolvedExprKind::Field {
                    member: first,
                    target,
                },
            }),
            MemberKind::Property { ty, .. } => Ok(ResolvedExpr {
                ty,
                class: ExprClass::PropertyAccess,
                location,
                kind: ResolvedExprKind::Property {
                    member: first,
                    target,
                    arguments: Vec::new(),
                },
            }),
            MemberKind::EnumMember { value } => {
                let declaring = self.registry.member(first).declaring_type;
                let underlying = self
                    .registry
                    .descriptor(declaring)
                    .primitive_kind()
                    .expect("enum has an underlying primitive");
                let value = ConstantValue::EnumValue {
                    ty: declaring,
                    underlying,
                    value,
                };
                Ok(self.literal(value, location))
            }
            MemberKind::Constant { .. } => {
                let value = self.evaluate_constant(first)?;
                Ok(self.literal(value, location))
            }
            MemberKind::Event { .. } => Err(self.fail(
                codes::INVOCATION_TARGET_INVALID,
                location,
                "an event cannot be used as a value",
            )),
        }
    }

    // === Invocation ===

    fn resolve_invocation(
        &mut self,
        target: &Expression,
        arguments: &[Argument],
        location: Location,
    ) -> Resolve<ResolvedExpr> {
        let target = self.resolve_expression(target)?;
        match &target.kind {
            ResolvedExprKind::MethodGroup { members, target } => {
                let members = members.clone();
                let target = target.clone();
                let (method, converted) = self.resolve_overload(&members, arguments, location)?;
                let return_type = self
                    .registry
                    .member(method)
                    .signature()
                    .and_then(|signature| signature.return_type);
                Ok(ResolvedExpr {
                    ty: return_type.unwrap_or_else(|| self.registry.void()),
                    class: ExprClass::Value,
                    location,
                    kind: ResolvedExprKind::Call {
                        method,
                        target,
                        arguments: converted,
                    },
                })
            }
            _ => {
                // Indexer access resolves against the property's own
                // parameter list; the emitter decides the access shape.
                if let ResolvedExprKind::Property {
                    member,
                    target: base,
                    arguments: existing,
                } = &target.kind
                {
                    if existing.is_empty() {
                        let member = *member;
                        if let MemberKind::Property { ty, parameters, .. } =
                            self.registry.member(member).kind.clone()
                        {
                            if !parameters.is_empty() {
                                let base = base.clone();
                                if arguments.len() != parameters.len() {
                                    return Err(self.fail(
                                        codes::NO_MATCHING_OVERLOAD,
                                        location,
                                        "wrong number of indexer arguments",
                                    ));
                                }
                                let mut converted = Vec::new();
                                for (argument, parameter) in arguments.iter().zip(&parameters) {
                                    if argument.name.is_some() {
                                        return Err(self.fail(
                                            codes::INVOCATION_TARGET_INVALID,
                                            location,
                                            "indexer arguments cannot be named",
                                        ));
                                    }
                                    let value = self.resolve_expression(&argument.value)?;
                                    let value = self.expect_value(value)?;
                                    converted.push(self.implicit_conversion(value, parameter.ty)?);
                                }
                                return Ok(ResolvedExpr {
                                    ty,
                                    class: ExprClass::PropertyAccess,
                                    location,
                                    kind: ResolvedExprKind::Property {
                                        member,
                                        target: base,
                                        arguments: converted,
                                    },
                                });
                            }
                        }
                    }
                }
                // Array indexing.
                if let Some(element) = self.array_element(target.ty) {
                    let target = self.expect_value(target)?;
                    let integer = self.registry.primitive(PrimitiveKind::Integer);
                    let mut converted = Vec::new();
                    for argument in arguments {
                        if argument.name.is_some() {
                            return Err(self.fail(
                                codes::INVOCATION_TARGET_INVALID,
                                location,
                                "array indices cannot be named",
                            ));
                        }
                        let index = self.resolve_expression(&argument.value)?;
                        let index = self.expect_value(index)?;
                        converted.push(self.implicit_conversion(index, integer)?);
                    }
                    return Ok(ResolvedExpr {
                        ty: element,
                        class: ExprClass::Variable,
                        location,
                        kind: ResolvedExprKind::Index {
                            target: Box::new(target),
                            arguments: converted,
                        },
                    });
                }
                // Delegate invocation goes through `Invoke`.
                if self.registry.descriptor(target.ty).is_delegate() {
                    let members = self.registry.own_members_named(target.ty, "Invoke");
                    let target = self.expect_value(target)?;
                    let (method, converted) =
                        self.resolve_overload(&members, arguments, location)?;
                    let return_type = self
                        .registry
                        .member(method)
                        .signature()
                        .and_then(|signature| signature.return_type);
                    return Ok(ResolvedExpr {
                        ty: return_type.unwrap_or_else(|| self.registry.void()),
                        class: ExprClass::Value,
                        location,
                        kind: ResolvedExprKind::Call {
                            method,
                            target: Some(Box::new(target)),
                            arguments: converted,
                        },
                    });
                }
                Err(self.fail(
                    codes::INVOCATION_TARGET_INVALID,
                    location,
                    "expression cannot be invoked",
                ))
            }
        }
    }

    /// Overload resolution: keep the applicable candidates, prefer the
    /// one needing the fewest conversions, and report an ambiguity when
    /// two distinct candidates tie.
    pub(super) fn resolve_overload(
        &mut self,
        members: &[MemberId],
        arguments: &[Argument],
        location: Location,
    ) -> Resolve<(MemberId, Vec<ResolvedExpr>)> {
        // Resolve argument expressions once, up front.
        let mut resolved_args = Vec::new();
        for argument in arguments {
            let value = self.resolve_expression(&argument.value)?;
            let value = self.expect_value(value)?;
            resolved_args.push((argument.name.clone(), value));
        }

        let mut best: Option<(MemberId, Vec<ArgSlot>, usize)> = None;
        let mut ambiguous = false;
        for &candidate in members {
            let Some(signature) = self.registry.member(candidate).signature().cloned() else {
                continue;
            };
            let Some((slots, score)) = self.match_arguments(&signature.parameters, &resolved_args)
            else {
                continue;
            };
            match &best {
                Some((_, _, best_score)) if score > *best_score => {}
                Some((existing, _, best_score)) if score == *best_score && *existing != candidate => {
                    ambiguous = true;
                }
                _ => {
                    ambiguous = false;
                    best = Some((candidate, slots, score));
                }
            }
        }

        if ambiguous {
            return Err(self.fail(
                codes::AMBIGUOUS_OVERLOAD,
                location,
                "call is ambiguous between multiple overloads",
            ));
        }
        let Some((method, slots, _)) = best else {
            return Err(self.fail(
                codes::NO_MATCHING_OVERLOAD,
                location,
                "no accessible overload accepts this argument list",
            ));
        };

        // Materialize the final argument list with conversions applied.
        let signature = self
            .registry
            .member(method)
            .signature()
            .cloned()
            .expect("candidate is a method");
        let mut converted = Vec::new();
        for (slot, parameter) in slots.into_iter().zip(&signature.parameters) {
            match slot {
                ArgSlot::Value(value) => {
                    converted.push(self.implicit_conversion(value, parameter.ty)?);
                }
                ArgSlot::Default => {
                    let value = parameter.default.clone().unwrap_or(ConstantValue::Null);
                    let literal = self.literal(value, location);
                    converted.push(ResolvedExpr {
                        ty: parameter.ty,
                        ..literal
                    });
                }
                ArgSlot::Expanded(values) => {
                    let element = self
                        .array_element(parameter.ty)
                        .expect("ParamArray parameter is an array");
                    for value in values {
                        converted.push(self.implicit_conversion(value, element)?);
                    }
                }
            }
        }
        Ok((method, converted))
    }

    /// Maps resolved arguments onto a parameter list. Returns the
    /// per-parameter slots and a conversion-count score, or `None` when
    /// the candidate is inapplicable.
    fn match_arguments(
        &self,
        parameters: &[ParameterSig],
        arguments: &[(Option<EcoString>, ResolvedExpr)],
    ) -> Option<(Vec<ArgSlot>, usize)> {
        let mut slots: Vec<Option<ArgSlot>> = vec![None; parameters.len()];
        let has_param_array = parameters
            .last()
            .is_some_and(|parameter| parameter.modifiers.contains(Modifiers::PARAM_ARRAY));
        let fixed_count = if has_param_array {
            parameters.len() - 1
        } else {
            parameters.len()
        };

        let mut overflow = Vec::new();
        let mut position = 0usize;
        for (name, value) in arguments {
            match name {
                Some(name) => {
                    let index = parameters
                        .iter()
                        .position(|parameter| parameter.name.eq_ignore_ascii_case(name))?;
                    if slots[index].is_some() {
                        return None;
                    }
                    slots[index] = Some(ArgSlot::Value(value.clone()));
                }
                None => {
                    if position < fixed_count {
                        slots[position] = Some(ArgSlot::Value(value.clone()));
                        position += 1;
                    } else if has_param_array {
                        overflow.push(value.clone());
                    } else {
                        return None;
                    }
                }
            }
        }

        let mut score = 0usize;
        for (index, parameter) in parameters.iter().enumerate() {
            let is_param_array = has_param_array && index == parameters.len() - 1;
            let filled = match slots[index].take() {
                Some(ArgSlot::Value(value)) => {
                    if !self.can_pass(&value, parameter.ty) {
                        return None;
                    }
                    if value.ty != parameter.ty {
                        score += 1;
                    }
                    ArgSlot::Value(value)
                }
                Some(other) => other,
                None if is_param_array => {
                    if overflow.len() == 1 && self.can_pass(&overflow[0], parameter.ty) {
                        // The whole array passed directly.
                        ArgSlot::Value(overflow.remove(0))
                    } else {
                        let element = self.array_element(parameter.ty)?;
                        if !overflow.iter().all(|value| self.can_pass(value, element)) {
                            return None;
                        }
                        score += 1 + overflow.len();
                        ArgSlot::Expanded(std::mem::take(&mut overflow))
                    }
                }
                None => {
                    if !parameter.modifiers.contains(Modifiers::OPTIONAL) {
                        return None;
                    }
                    ArgSlot::Default
                }
            };
            slots[index] = Some(filled);
        }
        if !overflow.is_empty() {
            return None;
        }

        let slots = slots.into_iter().collect::<Option<Vec<_>>>()?;
        Some((slots, score))
    }

    /// Applicability probe: would `value` pass to a parameter of type
    /// `to` without an explicit conversion? Never reports.
    fn can_pass(&self, value: &ResolvedExpr, to: TypeId) -> bool {
        if value.ty == to || self.converts_implicitly(value.ty, to) {
            return true;
        }
        if matches!(value.kind, ResolvedExprKind::Nothing) {
            return true;
        }
        if let ResolvedExprKind::Literal(constant) = &value.kind {
            if let Some(kind) = self.registry.descriptor(to).primitive_kind() {
                if !self.registry.descriptor(to).is_enum() {
                    return constant.convert_to(kind).is_ok();
                }
            }
        }
        false
    }

    // === Object creation ===

    fn resolve_new(
        &mut self,
        type_name: &crate::ast::TypeName,
        arguments: &[Argument],
        location: Location,
    ) -> Resolve<ResolvedExpr> {
        let ty = self.resolve_type(type_name, false).ok_or(ResolveFailure)?;
        let descriptor = self.registry.descriptor(ty);
        if descriptor.is_interface() || descriptor.modifiers.contains(Modifiers::MUST_INHERIT) {
            let name = self.type_name(ty);
            return Err(self.fail(
                codes::INVOCATION_TARGET_INVALID,
                location,
                format!("'{name}' cannot be instantiated"),
            ));
        }

        let constructors: Vec<MemberId> = self
            .registry
            .own_members_named(ty, "New")
            .into_iter()
            .filter(|&id| matches!(self.registry.member(id).kind, MemberKind::Constructor { .. }))
            .collect();

        if constructors.is_empty() {
            if arguments.is_empty() {
                // The implicit parameterless constructor.
                return Ok(ResolvedExpr {
                    ty,
                    class: ExprClass::Value,
                    location,
                    kind: ResolvedExprKind::New {
                        constructor: None,
                        arguments: Vec::new(),
                    },
                });
            }
            return Err(self.fail(
                codes::NO_MATCHING_OVERLOAD,
                location,
                "type has no constructor accepting arguments",
            ));
        }

        let (constructor, converted) =
            self.resolve_overload(&constructors, arguments, location)?;
        Ok(ResolvedExpr {
            ty,
            class: ExprClass::Value,
            location,
            kind: ResolvedExprKind::New {
                constructor: Some(constructor),
                arguments: converted,
            },
        })
    }

    // === Operators ===

    fn resolve_binary(
        &mut self,
        op: BinaryOp,
        left: &Expression,
        right: &Expression,
        location: Location,
    ) -> Resolve<ResolvedExpr> {
        let left = self.resolve_expression(left)?;
        let left = self.expect_value(left)?;
        let right = self.resolve_expression(right)?;
        let right = self.expect_value(right)?;
        self.combine_binary(op, left, right, location)
    }

    /// Types a binary operation over already resolved operands. Also
    /// used by compound assignment, which reads its target as the left
    /// operand.
    pub(super) fn combine_binary(
        &mut self,
        op: BinaryOp,
        left: ResolvedExpr,
        right: ResolvedExpr,
        location: Location,
    ) -> Resolve<ResolvedExpr> {
        // Constant operands fold at compile time.
        if let (ResolvedExprKind::Literal(a), ResolvedExprKind::Literal(b)) =
            (&left.kind, &right.kind)
        {
            let folded = folding::fold_binary(op, a, b)
                .map_err(|error| self.report_constant_error(error, location))?;
            return Ok(self.literal(folded, location));
        }

        match op {
            BinaryOp::Is => {
                let reference_ok = |resolver: &Self, ty: TypeId| {
                    !resolver.registry.descriptor(ty).is_value_type()
                };
                if !reference_ok(self, left.ty) || !reference_ok(self, right.ty) {
                    return Err(self.fail(
                        codes::OPERATOR_NOT_DEFINED,
                        location,
                        "'Is' requires reference operands",
                    ));
                }
                Ok(self.binary_node(op, left, right, self.boolean(), location))
            }

            BinaryOp::AndAlso | BinaryOp::OrElse => {
                let boolean = self.boolean();
                let left = self.implicit_conversion(left, boolean)?;
                let right = self.implicit_conversion(right, boolean)?;
                Ok(self.binary_node(op, left, right, boolean, location))
            }

            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
                let boolean = self.boolean();
                if left.ty == boolean && right.ty == boolean {
                    return Ok(self.binary_node(op, left, right, boolean, location));
                }
                let result = self.numeric_result_type(&left, &right, false, location)?;
                if !self
                    .registry
                    .descriptor(result)
                    .primitive_kind()
                    .is_some_and(PrimitiveKind::is_integral)
                {
                    return Err(self.fail(
                        codes::OPERATOR_NOT_DEFINED,
                        location,
                        format!("operator '{}' requires Boolean or integral operands", op.as_str()),
                    ));
                }
                let left = self.implicit_conversion(left, result)?;
                let right = self.implicit_conversion(right, result)?;
                Ok(self.binary_node(op, left, right, result, location))
            }

            BinaryOp::Concatenate => {
                let string = self.registry.primitive(PrimitiveKind::Str);
                let left = self.to_string_operand(left, location)?;
                let right = self.to_string_operand(right, location)?;
                Ok(self.binary_node(op, left, right, string, location))
            }

            BinaryOp::Equals
            | BinaryOp::NotEquals
            | BinaryOp::Less
            | BinaryOp::LessEquals
            | BinaryOp::Greater
            | BinaryOp::GreaterEquals => {
                let boolean = self.boolean();
                let string = self.registry.primitive(PrimitiveKind::Str);
                let date = self.registry.primitive(PrimitiveKind::Date);
                let comparable_directly = (left.ty == string && right.ty == string)
                    || (left.ty == date && right.ty == date)
                    || (left.ty == boolean
                        && right.ty == boolean
                        && matches!(op, BinaryOp::Equals | BinaryOp::NotEquals));
                if comparable_directly {
                    return Ok(self.binary_node(op, left, right, boolean, location));
                }
                let common = self.numeric_result_type(&left, &right, false, location)?;
                let left = self.implicit_conversion(left, common)?;
                let right = self.implicit_conversion(right, common)?;
                Ok(self.binary_node(op, left, right, boolean, location))
            }

            BinaryOp::ShiftLeft | BinaryOp::ShiftRight => {
                let left_kind = self.operand_primitive(&left, location)?;
                if !left_kind.is_integral() {
                    return Err(self.fail(
                        codes::OPERATOR_NOT_DEFINED,
                        location,
                        "shift operators require an integral left operand",
                    ));
                }
                let integer = self.registry.primitive(PrimitiveKind::Integer);
                let right = self.implicit_conversion(right, integer)?;
                let result = left.ty;
                Ok(self.binary_node(op, left, right, result, location))
            }

            BinaryOp::Divide | BinaryOp::Power => {
                let result = self.numeric_result_type(&left, &right, true, location)?;
                let left = self.implicit_conversion(left, result)?;
                let right = self.implicit_conversion(right, result)?;
                Ok(self.binary_node(op, left, right, result, location))
            }

            BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::IntDivide
            | BinaryOp::Modulo => {
                let result = self.numeric_result_type(&left, &right, false, location)?;
                if matches!(op, BinaryOp::IntDivide | BinaryOp::Modulo)
                    && !self
                        .registry
                        .descriptor(result)
                        .primitive_kind()
                        .is_some_and(PrimitiveKind::is_integral)
                {
                    return Err(self.fail(
                        codes::OPERATOR_NOT_DEFINED,
                        location,
                        format!("operator '{}' requires integral operands", op.as_str()),
                    ));
                }
                let left = self.implicit_conversion(left, result)?;
                let right = self.implicit_conversion(right, result)?;
                Ok(self.binary_node(op, left, right, result, location))
            }
        }
    }

    fn binary_node(
        &self,
        op: BinaryOp,
        left: ResolvedExpr,
        right: ResolvedExpr,
        ty: TypeId,
        location: Location,
    ) -> ResolvedExpr {
        ResolvedExpr {
            ty,
            class: ExprClass::Value,
            location,
            kind: ResolvedExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        }
    }

    fn operand_primitive(
        &mut self,
        operand: &ResolvedExpr,
        location: Location,
    ) -> Resolve<PrimitiveKind> {
        self.registry
            .descriptor(operand.ty)
            .primitive_kind()
            .ok_or_else(|| {
                let name = self.type_name(operand.ty);
                self.fail(
                    codes::OPERATOR_NOT_DEFINED,
                    location,
                    format!("operator is not defined for type '{name}'"),
                )
            })
    }

    /// The numeric type an arithmetic operator computes in: the wider
    /// of the operand kinds, `Double` for real division and
    /// exponentiation, `Decimal` when either side is decimal.
    fn numeric_result_type(
        &mut self,
        left: &ResolvedExpr,
        right: &ResolvedExpr,
        force_real: bool,
        location: Location,
    ) -> Resolve<TypeId> {
        use PrimitiveKind as P;
        let a = self.operand_primitive(left, location)?;
        let b = self.operand_primitive(right, location)?;
        if !a.is_numeric() || !b.is_numeric() {
            return Err(self.fail(
                codes::OPERATOR_NOT_DEFINED,
                location,
                "operator requires numeric operands",
            ));
        }
        let kind = if a == P::Decimal || b == P::Decimal {
            P::Decimal
        } else if force_real {
            P::Double
        } else if a == P::Double || b == P::Double {
            P::Double
        } else if a == P::Single || b == P::Single {
            P::Single
        } else {
            folding::common_integral(a, b).unwrap_or(P::Long)
        };
        Ok(self.registry.primitive(kind))
    }

    fn to_string_operand(
        &mut self,
        operand: ResolvedExpr,
        location: Location,
    ) -> Resolve<ResolvedExpr> {
        let string = self.registry.primitive(PrimitiveKind::Str);
        if operand.ty == string {
            return Ok(operand);
        }
        let kind = self.operand_primitive(&operand, location)?;
        if kind == PrimitiveKind::Char || kind.is_numeric() || kind == PrimitiveKind::Boolean {
            return Ok(self.wrap_to_string(operand, string));
        }
        Err(self.fail(
            codes::OPERATOR_NOT_DEFINED,
            location,
            "'&' requires string-convertible operands",
        ))
    }

    fn wrap_to_string(&self, operand: ResolvedExpr, string: TypeId) -> ResolvedExpr {
        let location = operand.location;
        ResolvedExpr {
            ty: string,
            class: ExprClass::Value,
            location,
            kind: ResolvedExprKind::Convert {
                kind: ConversionKind::Explicit,
                operand: Box::new(operand),
            },
        }
    }

    fn resolve_unary(
        &mut self,
        op: UnaryOp,
        operand: &Expression,
        location: Location,
    ) -> Resolve<ResolvedExpr> {
        let operand = self.resolve_expression(operand)?;
        let operand = self.expect_value(operand)?;

        if let ResolvedExprKind::Literal(value) = &operand.kind {
            let folded = folding::fold_unary(op, value)
                .map_err(|error| self.report_constant_error(error, location))?;
            return Ok(self.literal(folded, location));
        }

        let boolean = self.boolean();
        match op {
            UnaryOp::Not if operand.ty == boolean => Ok(ResolvedExpr {
                ty: boolean,
                class: ExprClass::Value,
                location,
                kind: ResolvedExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
            }),
            UnaryOp::Not => {
                let kind = self.operand_primitive(&operand, location)?;
                if !kind.is_integral() {
                    return Err(self.fail(
                        codes::OPERATOR_NOT_DEFINED,
                        location,
                        "'Not' requires a Boolean or integral operand",
                    ));
                }
                Ok(ResolvedExpr {
                    ty: operand.ty,
                    class: ExprClass::Value,
                    location,
                    kind: ResolvedExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                })
            }
            UnaryOp::Minus | UnaryOp::Plus => {
                let kind = self.operand_primitive(&operand, location)?;
                if !kind.is_numeric() {
                    return Err(self.fail(
                        codes::OPERATOR_NOT_DEFINED,
                        location,
                        format!("unary '{}' requires a numeric operand", op.as_str()),
                    ));
                }
                Ok(ResolvedExpr {
                    ty: operand.ty,
                    class: ExprClass::Value,
                    location,
                    kind: ResolvedExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                })
            }
        }
    }
}

/// How one parameter position is filled during overload matching.
#[derive(Debug, Clone)]
enum ArgSlot {
    /// An explicit argument.
    Value(ResolvedExpr),
    /// An omitted `Optional` parameter, filled from its default.
    Default,
    /// Trailing arguments packed into a `ParamArray`.
    Expanded(Vec<ResolvedExpr>),
}
