// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Statement resolution and lowering.
//!
//! Statements resolve in source order, driving the block tree and the
//! flow-analysis engine as they go. A statement that fails resolution
//! reports its diagnostic and is dropped from the resolved body; its
//! siblings continue, so one bad statement costs one diagnostic, not a
//! cascade.
//!
//! Statements sitting on a terminated path are dead code: one warning
//! per run of dead statements, and the run is pruned from the resolved
//! body. A label ends the run — its statement may be jumped to.
//!
//! Compound assignment lowers to a plain assignment here: the target is
//! read as the left operand, the operator applied, and the result
//! converted back. The conversion back must be *explicitly* legal and
//! the untransformed right-hand side must be *implicitly* convertible
//! to the target's type; both checks run, in that order.

use ecow::EcoString;

use crate::ast::{
    BinaryOp, DoConditionKind, DoTestPosition, ExitKind, Expression, Statement, StmtKind,
};
use crate::diagnostics::codes;
use crate::source_analysis::Location;

use super::super::block::{LabelOutcome, LocalSymbol};
use super::super::declaration_space::DeclareResult;
use super::super::flow_analysis::BranchingKind;
use super::super::types::{MemberKind, PrimitiveKind, TypeId};
use super::{ExprClass, Resolve, ResolveFailure, ResolvedExpr, ResolvedExprKind, Resolver};

/// A fully resolved statement, ready for emission.
#[derive(Debug, Clone)]
pub enum ResolvedStmt {
    /// A flat run of statements from one source statement (a
    /// multi-declarator `Dim`), or nothing at all (a local `Const`).
    Sequence(Vec<ResolvedStmt>),
    /// A local variable declaration with an optional initializer.
    Declare {
        variable: usize,
        initializer: Option<ResolvedExpr>,
    },
    /// An assignment.
    Assign {
        target: ResolvedExpr,
        value: ResolvedExpr,
    },
    /// An expression evaluated for effect.
    Expr(ResolvedExpr),
    /// An `If` chain.
    If {
        branches: Vec<(ResolvedExpr, Vec<ResolvedStmt>)>,
        else_body: Option<Vec<ResolvedStmt>>,
    },
    /// A pre-tested `While` loop.
    While {
        condition: ResolvedExpr,
        body: Vec<ResolvedStmt>,
    },
    /// A `Do` loop with an optional condition.
    DoLoop {
        condition: Option<ResolvedExpr>,
        test_is_until: bool,
        post_test: bool,
        body: Vec<ResolvedStmt>,
    },
    /// A counted `For` loop.
    For {
        target: Box<ResolvedExpr>,
        from: ResolvedExpr,
        to: ResolvedExpr,
        step: Option<ResolvedExpr>,
        body: Vec<ResolvedStmt>,
    },
    /// A `Select Case` statement.
    Select {
        subject: ResolvedExpr,
        sections: Vec<(Vec<ResolvedExpr>, Vec<ResolvedStmt>)>,
        else_body: Option<Vec<ResolvedStmt>>,
    },
    /// A `Try` statement.
    Try {
        body: Vec<ResolvedStmt>,
        catches: Vec<ResolvedCatch>,
        finally: Option<Vec<ResolvedStmt>>,
    },
    /// A `Throw`.
    Throw(Option<ResolvedExpr>),
    /// A `Return`.
    Return(Option<ResolvedExpr>),
    /// An `Exit`.
    Exit(ExitKind),
    /// A `GoTo`.
    GoTo(EcoString),
    /// A label.
    Label(EcoString),
}

/// A resolved `Catch` clause.
#[derive(Debug, Clone)]
pub struct ResolvedCatch {
    /// The exception variable's index, when named.
    pub variable: Option<usize>,
    /// The handler body.
    pub body: Vec<ResolvedStmt>,
}

/// What an assignment does to flow state.
#[derive(Debug, Clone, Copy)]
enum AssignEffect {
    /// Whole-variable assignment of a tracked local.
    Local { slot: i32 },
    /// Assignment of one structure field of a tracked local.
    StructMember { slot: i32, index: u32, count: u32 },
    /// No flow effect (fields, properties, array elements).
    None,
}

impl Resolver<'_> {
    /// Resolves a whole method body: the statements, the final
    /// structure-constructor check, `GoTo` target validation, and the
    /// end-of-body reachability accounting.
    pub fn resolve_method_body(&mut self, statements: &[Statement]) -> Vec<ResolvedStmt> {
        let resolved = self.resolve_statements(statements);

        // Every GoTo must name a label somewhere in the method.
        let uses = std::mem::take(&mut self.goto_uses);
        for (label, location) in uses {
            if !self.blocks.label_exists(&label) {
                self.diagnostics.error(
                    codes::UNDEFINED_LABEL,
                    location,
                    format!("label '{label}' is not defined"),
                );
            }
        }

        // A structure constructor must have fully assigned `Me` on
        // every falling-through path.
        if self.method.is_constructor && self.method.me_slot >= 0 {
            let reachable = !self.flow.current_reachability().is_terminated();
            if reachable && !self.flow.is_assigned(self.method.me_slot) {
                self.diagnostics.error(
                    codes::STRUCTURE_NOT_FULLY_ASSIGNED,
                    Location::NULL,
                    "constructor must assign every field of the structure",
                );
            }
        }

        // Falling off the end of a Function returns its default value;
        // that is legal, and only optionally worth a warning.
        if self.method.is_function
            && self.warn_missing_return
            && !self.flow.current_reachability().is_terminated()
        {
            self.diagnostics.warning(
                codes::FUNCTION_WITHOUT_RETURN_VALUE,
                Location::NULL,
                "function does not return a value on all paths",
            );
        }

        resolved
    }

    /// Resolves a statement list, pruning dead runs.
    fn resolve_statements(&mut self, statements: &[Statement]) -> Vec<ResolvedStmt> {
        let mut resolved = Vec::new();
        let mut dead_reported = false;
        for statement in statements {
            if let StmtKind::Label(name) = &statement.kind {
                self.declare_label(name, statement.location);
                self.flow.reset_reachability();
                dead_reported = false;
                resolved.push(ResolvedStmt::Label(name.clone()));
                continue;
            }
            if self.flow.current_reachability().is_terminated() {
                if !dead_reported {
                    self.diagnostics.warning(
                        codes::UNREACHABLE_CODE,
                        statement.location,
                        "unreachable code detected",
                    );
                    dead_reported = true;
                }
                continue;
            }
            if let Ok(stmt) = self.resolve_statement(statement) {
                resolved.push(stmt);
            }
        }
        resolved
    }

    /// Resolves statements inside a fresh child block.
    fn resolve_nested(&mut self, statements: &[Statement], explicit: bool) -> Vec<ResolvedStmt> {
        let parent = self.current_block;
        self.current_block = self.blocks.push_block(parent, explicit);
        let resolved = self.resolve_statements(statements);
        self.current_block = parent;
        resolved
    }

    fn declare_label(&mut self, name: &EcoString, location: Location) {
        match self.blocks.declare_label(self.current_block, name) {
            LabelOutcome::Ok => {}
            LabelOutcome::Duplicate => self.diagnostics.error(
                codes::DUPLICATE_LABEL,
                location,
                format!("label '{name}' is already defined in this scope"),
            ),
            LabelOutcome::Shadows => self.diagnostics.error(
                codes::LABEL_SHADOWS,
                location,
                format!("label '{name}' hides a label in an enclosing or nested block"),
            ),
        }
    }

    fn resolve_statement(&mut self, statement: &Statement) -> Resolve<ResolvedStmt> {
        let location = statement.location;
        match &statement.kind {
            StmtKind::Declare(declarators) => self.resolve_declare(declarators),
            StmtKind::LocalConst {
                name,
                type_name,
                initializer,
            } => self.resolve_local_const(name, type_name.as_ref(), initializer, location),
            StmtKind::Assign { target, value } => self.resolve_assign(target, value),
            StmtKind::Compound { target, op, value } => {
                self.resolve_compound(target, *op, value, location)
            }
            StmtKind::Expr(expr) => self.resolve_call_statement(expr, location),
            StmtKind::If {
                branches,
                else_body,
            } => self.resolve_if(branches, else_body.as_deref()),
            StmtKind::While { condition, body } => {
                let condition = self.resolve_condition(condition)?;
                self.flow.push_branching(BranchingKind::Loop);
                self.exits.push(ExitKind::While);
                let body = self.resolve_nested(body, false);
                self.exits.pop();
                self.flow.pop_branching(true);
                Ok(ResolvedStmt::While { condition, body })
            }
            StmtKind::DoLoop { condition, body } => self.resolve_do_loop(condition.as_ref(), body),
            StmtKind::For {
                variable,
                from,
                to,
                step,
                body,
            } => self.resolve_for(variable, from, to, step.as_ref(), body, location),
            StmtKind::Select {
                subject,
                sections,
                else_body,
            } => self.resolve_select(subject, sections, else_body.as_deref()),
            StmtKind::Try {
                body,
                catches,
                finally,
            } => self.resolve_try(body, catches, finally.as_deref()),
            StmtKind::Throw(value) => {
                let value = match value {
                    Some(expr) => {
                        let resolved = self.resolve_expression(expr)?;
                        Some(self.expect_value(resolved)?)
                    }
                    None => {
                        if self.catch_depth == 0 {
                            return Err(self.fail(
                                codes::SYNTAX_ERROR,
                                location,
                                "'Throw' without a value is only valid inside 'Catch'",
                            ));
                        }
                        None
                    }
                };
                self.flow.mark_throws();
                Ok(ResolvedStmt::Throw(value))
            }
            StmtKind::Return(value) => self.resolve_return(value.as_ref(), location),
            StmtKind::Exit(kind) => self.resolve_exit(*kind, location),
            StmtKind::GoTo(label) => {
                self.goto_uses.push((label.clone(), location));
                self.flow.mark_unreachable_after_jump();
                Ok(ResolvedStmt::GoTo(label.clone()))
            }
            StmtKind::Label(name) => {
                // Handled in resolve_statements; kept for completeness.
                self.declare_label(name, location);
                Ok(ResolvedStmt::Label(name.clone()))
            }
            StmtKind::Error => Err(ResolveFailure),
        }
    }

    // === Declarations ===

    fn resolve_declare(
        &mut self,
        declarators: &[crate::ast::VariableDeclarator],
    ) -> Resolve<ResolvedStmt> {
        let mut first: Option<ResolvedStmt> = None;
        let mut extra = Vec::new();
        for declarator in declarators {
            let ty = match &declarator.type_name {
                Some(type_name) => self.resolve_type(type_name, false),
                // Without an `As` clause the variable is an Object.
                None => Some(self.registry.object()),
            };
            let struct_members = ty.map_or(0, |ty| self.registry.structure_field_count(ty));
            let declared = self.blocks.declare_variable(
                self.current_block,
                &declarator.name,
                ty,
                struct_members,
                declarator.location,
            );
            let index = match declared {
                Ok(index) => index,
                Err(DeclareResult::NameExists) => {
                    self.diagnostics.error(
                        codes::NAME_EXISTS,
                        declarator.location,
                        format!("'{}' is already declared in this block", declarator.name),
                    );
                    continue;
                }
                Err(_) => {
                    self.diagnostics.error(
                        codes::NAME_USED_IN_CHILD_SCOPE,
                        declarator.location,
                        format!(
                            "'{}' is already used by a variable in an enclosed block",
                            declarator.name
                        ),
                    );
                    continue;
                }
            };

            let initializer = match (&declarator.initializer, ty) {
                (Some(expr), Some(ty)) => {
                    let value = self.resolve_expression(expr)?;
                    let value = self.coerce_assignment_value(value, ty)?;
                    self.flow.report_assignment(self.blocks.variables[index].slot);
                    Some(value)
                }
                (Some(expr), None) => {
                    // Type failed; still resolve the initializer for
                    // its own diagnostics, then drop it.
                    let _ = self.resolve_expression(expr);
                    None
                }
                (None, _) => None,
            };

            let stmt = ResolvedStmt::Declare {
                variable: index,
                initializer,
            };
            if first.is_none() {
                first = Some(stmt);
            } else {
                extra.push(stmt);
            }
        }
        match first {
            Some(stmt) if extra.is_empty() => Ok(stmt),
            Some(stmt) => {
                let mut body = vec![stmt];
                body.append(&mut extra);
                Ok(ResolvedStmt::Sequence(body))
            }
            None => Err(ResolveFailure),
        }
    }

    fn resolve_local_const(
        &mut self,
        name: &EcoString,
        type_name: Option<&crate::ast::TypeName>,
        initializer: &Expression,
        location: Location,
    ) -> Resolve<ResolvedStmt> {
        let declared_ty = type_name.and_then(|t| self.resolve_type(t, false));
        let value = self.resolve_constant_expr(initializer).ok();
        let value = match (value, declared_ty) {
            (Some(value), Some(ty)) => {
                let primitive = self.registry.descriptor(ty).primitive_kind();
                match primitive {
                    Some(primitive) => match value.convert_to(primitive) {
                        Ok(converted) => Some(converted),
                        Err(error) => {
                            let _ = self.report_constant_error(error, location);
                            None
                        }
                    },
                    None => Some(value),
                }
            }
            (value, _) => value,
        };
        let result = self
            .blocks
            .declare_constant(self.current_block, name, declared_ty, value);
        match result {
            // Constants produce no runtime statement.
            DeclareResult::Ok => Ok(ResolvedStmt::Sequence(Vec::new())),
            DeclareResult::NameExists => Err(self.fail(
                codes::NAME_EXISTS,
                location,
                format!("'{name}' is already declared in this block"),
            )),
            DeclareResult::UsedInChildScope => Err(self.fail(
                codes::NAME_USED_IN_CHILD_SCOPE,
                location,
                format!("'{name}' is already used by a variable in an enclosed block"),
            )),
        }
    }

    // === Assignment ===

    fn resolve_assign(&mut self, target: &Expression, value: &Expression) -> Resolve<ResolvedStmt> {
        // Source first, then the target as an lvalue.
        let value = self.resolve_expression(value)?;
        let (target, effect) = self.resolve_target(target)?;
        let value = self.coerce_assignment_value(value, target.ty)?;
        self.apply_assign_effect(effect);
        Ok(ResolvedStmt::Assign { target, value })
    }

    /// Adapts an assignment source to its target type. A method group
    /// assigned to a delegate-typed target becomes a delegate creation,
    /// checked for exact signature compatibility; everything else is an
    /// ordinary implicit conversion.
    fn coerce_assignment_value(
        &mut self,
        value: ResolvedExpr,
        target_ty: TypeId,
    ) -> Resolve<ResolvedExpr> {
        if self.registry.descriptor(target_ty).is_delegate() {
            if let ResolvedExprKind::MethodGroup { members, target } = &value.kind {
                let members = members.clone();
                let target = target.clone();
                let method =
                    self.delegate_compatible_method(target_ty, &members, value.location)?;
                return Ok(ResolvedExpr {
                    ty: target_ty,
                    class: ExprClass::Value,
                    location: value.location,
                    kind: ResolvedExprKind::DelegateCreate { method, target },
                });
            }
        }
        let value = self.expect_value(value)?;
        self.implicit_conversion(value, target_ty)
    }

    fn resolve_compound(
        &mut self,
        target: &Expression,
        op: BinaryOp,
        value: &Expression,
        location: Location,
    ) -> Resolve<ResolvedStmt> {
        let rhs = self.resolve_expression(value)?;
        let rhs = self.expect_value(rhs)?;
        let (target, effect) = self.resolve_target(target)?;
        let target_ty = target.ty;

        // Read the target as the left operand.
        let read = ResolvedExpr {
            class: ExprClass::Value,
            ..target.clone()
        };
        let combined = self.combine_binary(op, read, rhs.clone(), location)?;

        // Two-step rule: the combined result must convert back
        // explicitly, and the original right-hand side must convert
        // implicitly.
        if !self.converts_explicitly(combined.ty, target_ty) {
            let message = format!(
                "result type '{}' cannot be converted back to '{}'",
                self.type_name(combined.ty),
                self.type_name(target_ty)
            );
            return Err(self.fail(codes::NO_EXPLICIT_CONVERSION, location, message));
        }
        if !self.rhs_converts_implicitly(&rhs, target_ty) {
            let message = format!(
                "operand of type '{}' is not implicitly convertible to '{}'",
                self.type_name(rhs.ty),
                self.type_name(target_ty)
            );
            return Err(self.fail(codes::NO_IMPLICIT_CONVERSION, location, message));
        }

        let value = self.explicit_conversion(combined, target_ty)?;
        self.apply_assign_effect(effect);
        Ok(ResolvedStmt::Assign { target, value })
    }

    fn rhs_converts_implicitly(&self, rhs: &ResolvedExpr, target: TypeId) -> bool {
        if self.converts_implicitly(rhs.ty, target) {
            return true;
        }
        if let ResolvedExprKind::Literal(value) = &rhs.kind {
            if let Some(kind) = self.registry.descriptor(target).primitive_kind() {
                return value.convert_to(kind).is_ok();
            }
        }
        matches!(rhs.kind, ResolvedExprKind::Nothing)
    }

    fn apply_assign_effect(&mut self, effect: AssignEffect) {
        match effect {
            AssignEffect::Local { slot } => self.flow.report_assignment(slot),
            AssignEffect::StructMember { slot, index, count } => {
                self.flow.report_member_assignment(slot, index, count);
            }
            AssignEffect::None => {}
        }
    }

    /// Resolves a bare name in assignment-target position.
    fn resolve_target_name(
        &mut self,
        name: &EcoString,
        location: Location,
    ) -> Resolve<(ResolvedExpr, AssignEffect)> {
        if let Some(LocalSymbol::Variable(index)) = self.blocks.lookup(self.current_block, name) {
            let index = *index;
            let variable = &self.blocks.variables[index];
            let slot = variable.slot;
            let ty = variable.ty.ok_or(ResolveFailure)?;
            return Ok((
                ResolvedExpr {
                    ty,
                    class: ExprClass::Variable,
                    location,
                    kind: ResolvedExprKind::Local { variable: index },
                },
                AssignEffect::Local { slot },
            ));
        }
        // Parameters, fields, properties all resolve normally. The
        // cache is bypassed: target resolution must not recycle a
        // read-position result.
        let expr = Expression::new(
            crate::ast::NodeId::new(0),
            location,
            crate::ast::ExprKind::Name(name.clone()),
        );
        let resolved = self.resolve_expression_uncached(&expr)?;
        self.check_writable(resolved, location)
    }

    /// Resolves an expression in assignment-target position. Reading a
    /// not-yet-assigned local is fine here — the assignment is what
    /// makes it assigned.
    fn resolve_target(&mut self, expr: &Expression) -> Resolve<(ResolvedExpr, AssignEffect)> {
        use crate::ast::ExprKind;
        let location = expr.location;
        match &expr.kind {
            ExprKind::Name(name) => self.resolve_target_name(name, location),
            ExprKind::Member { target, name } => {
                // Assigning one field of a structure-typed local tracks
                // that field individually.
                if let ExprKind::Name(base) = &target.kind {
                    if let Some(LocalSymbol::Variable(index)) =
                        self.blocks.lookup(self.current_block, base)
                    {
                        let index = *index;
                        let variable = &self.blocks.variables[index];
                        let slot = variable.slot;
                        let count = variable.struct_member_count;
                        let var_ty = variable.ty;
                        if count > 0 {
                            let ty = var_ty.ok_or(ResolveFailure)?;
                            if let Some(field_index) =
                                self.registry.structure_field_index(ty, name)
                            {
                                let members = self.registry.members_named(ty, name);
                                let member = members[0];
                                let MemberKind::Field { ty: field_ty } =
                                    self.registry.member(member).kind.clone()
                                else {
                                    return Err(ResolveFailure);
                                };
                                let base_expr = ResolvedExpr {
                                    ty,
                                    class: ExprClass::Variable,
                                    location: target.location,
                                    kind: ResolvedExprKind::Local { variable: index },
                                };
                                return Ok((
                                    ResolvedExpr {
                                        ty: field_ty,
                                        class: ExprClass::Variable,
                                        location,
                                        kind: ResolvedExprKind::Field {
                                            member,
                                            target: Some(Box::new(base_expr)),
                                        },
                                    },
                                    AssignEffect::StructMember {
                                        slot,
                                        index: field_index,
                                        count,
                                    },
                                ));
                            }
                        }
                    }
                }
                let resolved = self.resolve_expression(expr)?;
                self.check_writable(resolved, location)
            }
            _ => {
                let resolved = self.resolve_expression(expr)?;
                self.check_writable(resolved, location)
            }
        }
    }

    fn check_writable(
        &mut self,
        resolved: ResolvedExpr,
        location: Location,
    ) -> Resolve<(ResolvedExpr, AssignEffect)> {
        match (&resolved.class, &resolved.kind) {
            (ExprClass::Variable, ResolvedExprKind::Local { variable }) => {
                let slot = self.blocks.variables[*variable].slot;
                Ok((resolved, AssignEffect::Local { slot }))
            }
            (ExprClass::Variable, ResolvedExprKind::Parameter { .. } | ResolvedExprKind::Index { .. }) => {
                Ok((resolved, AssignEffect::None))
            }
            (ExprClass::Variable, ResolvedExprKind::Field { member, target }) => {
                let descriptor = self.registry.member(*member);
                let read_only = descriptor
                    .modifiers
                    .contains(crate::ast::Modifiers::READ_ONLY);
                let declaring = descriptor.declaring_type;
                let field_name = descriptor.name.clone();
                if read_only
                    && !(self.method.is_constructor && self.containing_type == Some(declaring))
                {
                    return Err(self.fail(
                        codes::ASSIGNMENT_TARGET_INVALID,
                        location,
                        format!(
                            "'ReadOnly' field '{field_name}' can only be assigned in a constructor"
                        ),
                    ));
                }
                // Inside a structure constructor, assigning an own
                // field (through the implicit or explicit `Me`) marks
                // that field in the `Me` tracking slot.
                let me_field = self.method.me_slot >= 0
                    && self.containing_type == Some(declaring)
                    && matches!(
                        target.as_deref().map(|t| &t.kind),
                        None | Some(ResolvedExprKind::Me)
                    );
                let effect = if me_field {
                    match self.registry.structure_field_index(declaring, &field_name) {
                        Some(index) => AssignEffect::StructMember {
                            slot: self.method.me_slot,
                            index,
                            count: self.registry.structure_field_count(declaring),
                        },
                        None => AssignEffect::None,
                    }
                } else {
                    AssignEffect::None
                };
                Ok((resolved, effect))
            }
            (ExprClass::PropertyAccess, ResolvedExprKind::Property { member, .. }) => {
                let writable = matches!(
                    self.registry.member(*member).kind,
                    MemberKind::Property { writable: true, .. }
                );
                if writable {
                    Ok((resolved, AssignEffect::None))
                } else {
                    let name = self.registry.member(*member).name.clone();
                    Err(self.fail(
                        codes::PROPERTY_NOT_WRITABLE,
                        location,
                        format!("property '{name}' is read-only"),
                    ))
                }
            }
            _ => Err(self.fail(
                codes::ASSIGNMENT_TARGET_INVALID,
                location,
                "expression cannot be assigned to",
            )),
        }
    }

    // === Calls ===

    fn resolve_call_statement(
        &mut self,
        expr: &Expression,
        location: Location,
    ) -> Resolve<ResolvedStmt> {
        let resolved = self.resolve_expression(expr)?;
        match &resolved.kind {
            // A bare name that is a method group invokes with no
            // arguments.
            ResolvedExprKind::MethodGroup { members, target } => {
                let members = members.clone();
                let target = target.clone();
                let (method, arguments) = self.resolve_overload(&members, &[], location)?;
                let return_type = self
                    .registry
                    .member(method)
                    .signature()
                    .and_then(|signature| signature.return_type);
                Ok(ResolvedStmt::Expr(ResolvedExpr {
                    ty: return_type.unwrap_or_else(|| self.registry.void()),
                    class: ExprClass::Value,
                    location,
                    kind: ResolvedExprKind::Call {
                        method,
                        target,
                        arguments,
                    },
                }))
            }
            ResolvedExprKind::Call { .. } | ResolvedExprKind::New { .. } => {
                Ok(ResolvedStmt::Expr(resolved))
            }
            _ => Err(self.fail(
                codes::INVOCATION_TARGET_INVALID,
                location,
                "statement must be a call",
            )),
        }
    }

    // === Control flow ===

    fn resolve_if(
        &mut self,
        branches: &[crate::ast::IfBranch],
        else_body: Option<&[Statement]>,
    ) -> Resolve<ResolvedStmt> {
        let mut resolved_branches = Vec::new();
        self.flow.push_branching(BranchingKind::Block);
        for (index, branch) in branches.iter().enumerate() {
            if index > 0 {
                self.flow.branch();
            }
            let condition = self.resolve_condition(&branch.condition)?;
            let body = self.resolve_nested(&branch.body, false);
            resolved_branches.push((condition, body));
        }
        self.flow.branch();
        let else_resolved = else_body.map(|body| self.resolve_nested(body, false));
        self.flow.pop_branching(false);
        Ok(ResolvedStmt::If {
            branches: resolved_branches,
            else_body: else_resolved,
        })
    }

    fn resolve_do_loop(
        &mut self,
        condition: Option<&crate::ast::DoCondition>,
        body: &[Statement],
    ) -> Resolve<ResolvedStmt> {
        let post_test = condition.is_some_and(|c| c.position == DoTestPosition::Post);
        let pre_condition = match condition {
            Some(c) if c.position == DoTestPosition::Pre => Some(self.resolve_condition(&c.condition)?),
            _ => None,
        };
        self.flow.push_branching(BranchingKind::Loop);
        self.exits.push(ExitKind::Do);
        let body = self.resolve_nested(body, false);
        self.exits.pop();
        let post_condition = match condition {
            Some(c) if c.position == DoTestPosition::Post => Some(self.resolve_condition(&c.condition)?),
            _ => None,
        };
        // A post-tested loop always runs its body once.
        self.flow.pop_branching(!post_test);
        let test_is_until = condition.is_some_and(|c| c.kind == DoConditionKind::Until);
        Ok(ResolvedStmt::DoLoop {
            condition: pre_condition.or(post_condition),
            test_is_until,
            post_test,
            body,
        })
    }

    fn resolve_for(
        &mut self,
        variable: &EcoString,
        from: &Expression,
        to: &Expression,
        step: Option<&Expression>,
        body: &[Statement],
        location: Location,
    ) -> Resolve<ResolvedStmt> {
        let from = self.resolve_expression(from)?;
        let from = self.expect_value(from)?;
        let (target, effect) = self.resolve_target_name(variable, location)?;
        let from = self.implicit_conversion(from, target.ty)?;
        let to = self.resolve_expression(to)?;
        let to = self.expect_value(to)?;
        let to = self.implicit_conversion(to, target.ty)?;
        let step = match step {
            Some(expr) => {
                let resolved = self.resolve_expression(expr)?;
                let resolved = self.expect_value(resolved)?;
                Some(self.implicit_conversion(resolved, target.ty)?)
            }
            None => None,
        };
        if !self
            .registry
            .descriptor(target.ty)
            .primitive_kind()
            .is_some_and(PrimitiveKind::is_numeric)
        {
            return Err(self.fail(
                codes::OPERATOR_NOT_DEFINED,
                location,
                "'For' requires a numeric loop variable",
            ));
        }

        // The loop variable is assigned by the initial expression.
        self.apply_assign_effect(effect);
        self.flow.push_branching(BranchingKind::Loop);
        self.exits.push(ExitKind::For);
        let body = self.resolve_nested(body, false);
        self.exits.pop();
        self.flow.pop_branching(true);
        Ok(ResolvedStmt::For {
            target: Box::new(target),
            from,
            to,
            step,
            body,
        })
    }

    fn resolve_select(
        &mut self,
        subject: &Expression,
        sections: &[crate::ast::CaseSection],
        else_body: Option<&[Statement]>,
    ) -> Resolve<ResolvedStmt> {
        let subject = self.resolve_expression(subject)?;
        let subject = self.expect_value(subject)?;
        let subject_ty = subject.ty;

        self.flow.push_branching(BranchingKind::Switch);
        self.exits.push(ExitKind::Select);
        let mut resolved_sections = Vec::new();
        for (index, section) in sections.iter().enumerate() {
            if index > 0 {
                self.flow.branch();
            }
            let mut values = Vec::new();
            for value in &section.values {
                let resolved = self.resolve_expression(value)?;
                let resolved = self.expect_value(resolved)?;
                values.push(self.implicit_conversion(resolved, subject_ty)?);
            }
            let body = self.resolve_nested(&section.body, false);
            resolved_sections.push((values, body));
        }
        let else_resolved = match else_body {
            Some(body) => {
                if !sections.is_empty() {
                    self.flow.branch();
                }
                Some(self.resolve_nested(body, false))
            }
            None => None,
        };
        self.exits.pop();
        // Without Case Else the whole statement may be skipped.
        self.flow.pop_branching(else_resolved.is_none());
        Ok(ResolvedStmt::Select {
            subject,
            sections: resolved_sections,
            else_body: else_resolved,
        })
    }

    fn resolve_try(
        &mut self,
        body: &[Statement],
        catches: &[crate::ast::CatchClause],
        finally: Option<&[Statement]>,
    ) -> Resolve<ResolvedStmt> {
        self.flow.push_branching(BranchingKind::TryCatch);
        self.exits.push(ExitKind::Try);
        let body = self.resolve_nested(body, false);

        let mut resolved_catches = Vec::new();
        for clause in catches {
            self.flow.branch();
            self.catch_depth += 1;
            let parent = self.current_block;
            self.current_block = self.blocks.push_block(parent, false);

            let variable = match &clause.variable {
                Some(name) => {
                    let ty = match &clause.type_name {
                        Some(type_name) => self.resolve_type(type_name, false),
                        None => Some(self.registry.object()),
                    };
                    match self.blocks.declare_variable(
                        self.current_block,
                        name,
                        ty,
                        0,
                        clause.location,
                    ) {
                        Ok(index) => {
                            // The runtime assigns the exception value.
                            self.flow
                                .report_assignment(self.blocks.variables[index].slot);
                            Some(index)
                        }
                        Err(_) => {
                            self.diagnostics.error(
                                codes::NAME_EXISTS,
                                clause.location,
                                format!("'{name}' is already declared"),
                            );
                            None
                        }
                    }
                }
                None => None,
            };

            let catch_body = self.resolve_statements(&clause.body);
            self.current_block = parent;
            self.catch_depth -= 1;
            resolved_catches.push(ResolvedCatch {
                variable,
                body: catch_body,
            });
        }
        self.exits.pop();
        self.flow.pop_branching(false);

        // Finally always runs; its assignments apply to the merged
        // state.
        let finally_resolved = finally.map(|body| self.resolve_nested(body, false));
        Ok(ResolvedStmt::Try {
            body,
            catches: resolved_catches,
            finally: finally_resolved,
        })
    }

    fn resolve_return(
        &mut self,
        value: Option<&Expression>,
        location: Location,
    ) -> Resolve<ResolvedStmt> {
        let resolved = match (value, self.method.return_type) {
            (Some(expr), Some(return_type)) => {
                let resolved = self.resolve_expression(expr)?;
                let resolved = self.expect_value(resolved)?;
                Some(self.implicit_conversion(resolved, return_type)?)
            }
            (Some(expr), None) => {
                // Still resolve for diagnostics, then reject.
                let _ = self.resolve_expression(expr);
                return Err(self.fail(
                    codes::SYNTAX_ERROR,
                    location,
                    "'Return' cannot carry a value here",
                ));
            }
            // Returning without a value from a Function yields the
            // function's default value; a deliberate relaxation.
            (None, _) => None,
        };
        self.flow.mark_returns();
        Ok(ResolvedStmt::Return(resolved))
    }

    fn resolve_exit(&mut self, kind: ExitKind, location: Location) -> Resolve<ResolvedStmt> {
        let valid = match kind {
            ExitKind::Sub => {
                !self.method.is_function
                    && !self.method.is_constructor
                    && !self.method.in_property
            }
            ExitKind::Function => self.method.is_function && !self.method.in_property,
            ExitKind::Property => self.method.in_property,
            ExitKind::For | ExitKind::While | ExitKind::Do | ExitKind::Select | ExitKind::Try => {
                self.exits.iter().rev().any(|&active| active == kind)
            }
        };
        if !valid {
            return Err(self.fail(
                codes::SYNTAX_ERROR,
                location,
                format!("'Exit {}' is not valid here", kind.as_str()),
            ));
        }
        match kind {
            ExitKind::Sub | ExitKind::Function => self.flow.mark_returns(),
            _ => self.flow.mark_unreachable_after_jump(),
        }
        Ok(ResolvedStmt::Exit(kind))
    }
}
