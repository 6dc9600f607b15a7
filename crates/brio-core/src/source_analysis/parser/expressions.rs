// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Expression parsing.
//!
//! Binary operators use Pratt parsing against the binding-power table in
//! the parent module. Postfix forms (member access, invocation) bind
//! tightest; whether `target(args)` is a call, an array index, or an
//! indexer access is left to the resolver.

use crate::ast::{Argument, ExprKind, Expression, TypeName, TypeNameKind};
use crate::source_analysis::{Keyword, TokenKind};

use super::{NEGATE_BINDING_POWER, NOT_BINDING_POWER, Parser, binary_binding_power};

impl Parser<'_> {
    /// Parses a full expression.
    pub(super) fn parse_expression(&mut self) -> Expression {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, min_bp: u8) -> Expression {
        let mut left = self.parse_unary();
        loop {
            let Some((op, power)) = binary_binding_power(self.current_kind()) else {
                break;
            };
            if power.left < min_bp {
                break;
            }
            let location = self.here();
            self.advance();
            let right = self.parse_binary(power.right);
            left = Expression::new(
                self.next_id(),
                location,
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            );
        }
        left
    }

    fn parse_unary(&mut self) -> Expression {
        let location = self.here();
        let (op, power) = match self.current_kind() {
            TokenKind::Keyword(Keyword::Not) => (crate::ast::UnaryOp::Not, NOT_BINDING_POWER),
            TokenKind::Minus => (crate::ast::UnaryOp::Minus, NEGATE_BINDING_POWER),
            TokenKind::Plus => (crate::ast::UnaryOp::Plus, NEGATE_BINDING_POWER),
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_binary(power);
        Expression::new(
            self.next_id(),
            location,
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        )
    }

    /// Parses a primary expression and its postfix chain.
    pub(super) fn parse_postfix(&mut self) -> Expression {
        let mut expr = self.parse_primary();
        loop {
            match self.current_kind() {
                TokenKind::Dot => {
                    let location = self.here();
                    self.advance();
                    let name = self.expect_identifier("member name");
                    expr = Expression::new(
                        self.next_id(),
                        location,
                        ExprKind::Member {
                            target: Box::new(expr),
                            name,
                        },
                    );
                }
                TokenKind::LeftParen => {
                    let location = expr.location;
                    let arguments = self.parse_argument_list();
                    expr = Expression::new(
                        self.next_id(),
                        location,
                        ExprKind::Invocation {
                            target: Box::new(expr),
                            arguments,
                        },
                    );
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_primary(&mut self) -> Expression {
        let location = self.here();
        let kind = match self.current_kind().clone() {
            TokenKind::Integer { value, kind } => {
                self.advance();
                ExprKind::Integer { value, kind }
            }
            TokenKind::Float { value, kind } => {
                self.advance();
                ExprKind::Float { value, kind }
            }
            TokenKind::DecimalLiteral(value) => {
                self.advance();
                ExprKind::DecimalLiteral(value)
            }
            TokenKind::StringLiteral(value) => {
                self.advance();
                ExprKind::Str(value)
            }
            TokenKind::CharLiteral(value) => {
                self.advance();
                ExprKind::Char(value)
            }
            TokenKind::DateLiteral(value) => {
                self.advance();
                ExprKind::Date(value)
            }
            TokenKind::Identifier(name) => {
                self.advance();
                ExprKind::Name(name)
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                ExprKind::Bool(true)
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                ExprKind::Bool(false)
            }
            TokenKind::Keyword(Keyword::Nothing) => {
                self.advance();
                ExprKind::Nothing
            }
            TokenKind::Keyword(Keyword::Me) => {
                self.advance();
                ExprKind::Me
            }
            TokenKind::Keyword(Keyword::MyBase) => {
                self.advance();
                ExprKind::MyBase
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expression();
                self.expect_token(&TokenKind::RightParen);
                ExprKind::Parenthesized(Box::new(inner))
            }
            TokenKind::Keyword(Keyword::New) => {
                self.advance();
                let type_name = self.parse_type_name();
                let arguments = if self.current_kind() == &TokenKind::LeftParen {
                    self.parse_argument_list()
                } else {
                    Vec::new()
                };
                ExprKind::New {
                    type_name,
                    arguments,
                }
            }
            TokenKind::Keyword(Keyword::CType) => {
                self.advance();
                self.expect_token(&TokenKind::LeftParen);
                let operand = self.parse_expression();
                self.expect_token(&TokenKind::Comma);
                let type_name = self.parse_type_name();
                self.expect_token(&TokenKind::RightParen);
                ExprKind::Cast {
                    operand: Box::new(operand),
                    type_name,
                }
            }
            TokenKind::Keyword(Keyword::GetType) => {
                self.advance();
                self.expect_token(&TokenKind::LeftParen);
                let type_name = self.parse_type_name();
                self.expect_token(&TokenKind::RightParen);
                ExprKind::GetType { type_name }
            }
            TokenKind::Keyword(Keyword::AddressOf) => {
                self.advance();
                let target = self.parse_postfix();
                ExprKind::AddressOf {
                    target: Box::new(target),
                }
            }
            TokenKind::Error(_) => {
                // Already reported by the lexer.
                self.advance();
                ExprKind::Error
            }
            other => {
                self.error(format!("expression expected, found '{other}'"));
                ExprKind::Error
            }
        };
        Expression::new(self.next_id(), location, kind)
    }

    /// Parses a parenthesized argument list, including `name:=value`
    /// named arguments. The current token must be `(`.
    pub(super) fn parse_argument_list(&mut self) -> Vec<Argument> {
        self.expect_token(&TokenKind::LeftParen);
        let mut arguments = Vec::new();
        if self.match_token(&TokenKind::RightParen) {
            return arguments;
        }
        loop {
            let name = if let TokenKind::Identifier(name) = self.current_kind() {
                if self.peek_kind() == &TokenKind::ColonEquals {
                    let name = name.clone();
                    self.advance();
                    self.advance();
                    Some(name)
                } else {
                    None
                }
            } else {
                None
            };
            let value = self.parse_expression();
            arguments.push(Argument { name, value });
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_token(&TokenKind::RightParen);
        arguments
    }

    /// Parses a type reference: a dotted name with optional `()` array
    /// suffixes.
    pub(super) fn parse_type_name(&mut self) -> TypeName {
        let location = self.here();
        let name = self.parse_qualified_name();
        let mut type_name = TypeName::named(name, location);
        while self.current_kind() == &TokenKind::LeftParen
            && self.peek_kind() == &TokenKind::RightParen
        {
            self.advance();
            self.advance();
            type_name = TypeName {
                location,
                kind: TypeNameKind::Array {
                    element: Box::new(type_name),
                },
            };
        }
        type_name
    }

    /// Parses an `As` clause if present.
    pub(super) fn parse_optional_as_clause(&mut self) -> Option<TypeName> {
        if self.match_keyword(Keyword::As) {
            Some(self.parse_type_name())
        } else {
            None
        }
    }
}

/// Convenience used by tests in sibling modules.
#[cfg(test)]
pub(super) fn parse_test_expression(source: &str) -> (Expression, usize) {
    use crate::diagnostics::Diagnostics;
    use crate::source_analysis::lex;

    let (tokens, errors) = lex(source, 1);
    assert!(errors.is_empty(), "lex errors in test input: {errors:?}");
    let mut diagnostics = Diagnostics::new();
    let mut parser = Parser::new(tokens, &mut diagnostics);
    let expr = parser.parse_expression();
    (expr, diagnostics.error_count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;
    use super::parse_test_expression as parse_expr;

    fn binary_parts(expr: &Expression) -> (&Expression, BinaryOp, &Expression) {
        match &expr.kind {
            ExprKind::Binary { op, left, right } => (left, *op, right),
            other => panic!("expected binary expression, got {other:?}"),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let (expr, errors) = parse_expr("1 + 2 * 3");
        assert_eq!(errors, 0);
        let (_, op, right) = binary_parts(&expr);
        assert_eq!(op, BinaryOp::Add);
        let (_, inner_op, _) = binary_parts(right);
        assert_eq!(inner_op, BinaryOp::Multiply);
    }

    #[test]
    fn integer_division_sits_between_multiply_and_mod() {
        // a Mod b \ c  parses as  a Mod (b \ c)
        let (expr, _) = parse_expr("a Mod b \\ c");
        let (_, op, right) = binary_parts(&expr);
        assert_eq!(op, BinaryOp::Modulo);
        let (_, inner_op, _) = binary_parts(right);
        assert_eq!(inner_op, BinaryOp::IntDivide);
    }

    #[test]
    fn power_is_right_associative() {
        let (expr, _) = parse_expr("2 ^ 3 ^ 4");
        let (left, op, right) = binary_parts(&expr);
        assert_eq!(op, BinaryOp::Power);
        assert!(matches!(left.kind, ExprKind::Integer { value: 2, .. }));
        let (_, inner_op, _) = binary_parts(right);
        assert_eq!(inner_op, BinaryOp::Power);
    }

    #[test]
    fn comparison_binds_looser_than_concatenation() {
        let (expr, _) = parse_expr("a & b = c");
        let (left, op, _) = binary_parts(&expr);
        assert_eq!(op, BinaryOp::Equals);
        let (_, inner_op, _) = binary_parts(left);
        assert_eq!(inner_op, BinaryOp::Concatenate);
    }

    #[test]
    fn not_binds_looser_than_comparison() {
        let (expr, _) = parse_expr("Not a = b");
        match &expr.kind {
            ExprKind::Unary { operand, .. } => {
                let (_, op, _) = binary_parts(operand);
                assert_eq!(op, BinaryOp::Equals);
            }
            other => panic!("expected unary Not, got {other:?}"),
        }
    }

    #[test]
    fn unary_minus_binds_tighter_than_multiplication() {
        let (expr, _) = parse_expr("-a * b");
        let (left, op, _) = binary_parts(&expr);
        assert_eq!(op, BinaryOp::Multiply);
        assert!(matches!(left.kind, ExprKind::Unary { .. }));
    }

    #[test]
    fn member_and_invocation_chain() {
        let (expr, errors) = parse_expr("wallet.Balance(3).ToString()");
        assert_eq!(errors, 0);
        let ExprKind::Invocation { target, arguments } = &expr.kind else {
            panic!("expected invocation");
        };
        assert!(arguments.is_empty());
        assert!(matches!(target.kind, ExprKind::Member { .. }));
    }

    #[test]
    fn named_arguments_parse() {
        let (expr, errors) = parse_expr("Configure(1, retries:=5)");
        assert_eq!(errors, 0);
        let ExprKind::Invocation { arguments, .. } = &expr.kind else {
            panic!("expected invocation");
        };
        assert_eq!(arguments.len(), 2);
        assert!(arguments[0].name.is_none());
        assert_eq!(arguments[1].name.as_deref(), Some("retries"));
    }

    #[test]
    fn new_with_and_without_arguments() {
        let (expr, _) = parse_expr("New Wallet(100)");
        assert!(matches!(&expr.kind, ExprKind::New { arguments, .. } if arguments.len() == 1));
        let (expr, _) = parse_expr("New Wallet");
        assert!(matches!(&expr.kind, ExprKind::New { arguments, .. } if arguments.is_empty()));
    }

    #[test]
    fn ctype_and_gettype() {
        let (expr, errors) = parse_expr("CType(x, Integer)");
        assert_eq!(errors, 0);
        assert!(matches!(expr.kind, ExprKind::Cast { .. }));
        let (expr, errors) = parse_expr("GetType(Wallet)");
        assert_eq!(errors, 0);
        assert!(matches!(expr.kind, ExprKind::GetType { .. }));
    }

    #[test]
    fn addressof_captures_postfix_target() {
        let (expr, _) = parse_expr("AddressOf handler.Invoke");
        let ExprKind::AddressOf { target } = &expr.kind else {
            panic!("expected AddressOf");
        };
        assert!(matches!(target.kind, ExprKind::Member { .. }));
    }

    #[test]
    fn is_comparison_with_nothing() {
        let (expr, errors) = parse_expr("x Is Nothing");
        assert_eq!(errors, 0);
        let (_, op, right) = binary_parts(&expr);
        assert_eq!(op, BinaryOp::Is);
        assert!(matches!(right.kind, ExprKind::Nothing));
    }

    #[test]
    fn missing_operand_recovers_with_error_node() {
        let (expr, errors) = parse_expr("1 +");
        assert_eq!(errors, 1);
        let (_, _, right) = binary_parts(&expr);
        assert!(right.is_error());
    }

    #[test]
    fn node_ids_are_unique() {
        let (expr, _) = parse_expr("a + b * c");
        let mut ids = Vec::new();
        fn collect(expr: &Expression, ids: &mut Vec<u32>) {
            ids.push(expr.id.index());
            if let ExprKind::Binary { left, right, .. } = &expr.kind {
                collect(left, ids);
                collect(right, ids);
            }
        }
        collect(&expr, &mut ids);
        let mut deduped = ids.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(ids.len(), deduped.len());
    }
}
