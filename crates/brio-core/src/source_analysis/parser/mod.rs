// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Recursive descent parser for Brio source code.
//!
//! The parser consumes the token stream and builds one
//! [`SourceUnit`] per file. It is written for batch diagnostics:
//!
//! - **Error recovery is mandatory** — the parser always produces a
//!   tree; unparseable regions become error placeholders
//! - **Multiple errors** — report everything, synchronizing at
//!   statement boundaries (line ends) after each failure
//! - **Bounded failure** — a file that defeats recovery gets one
//!   unrecoverable-parse diagnostic and an empty remainder, leaving
//!   sibling files unaffected
//!
//! Declaration context (the namespace path and enclosing type name) is
//! threaded through parse functions as an explicit immutable
//! [`DeclContext`] parameter rather than kept as mutable parser state,
//! so each grammar rule is reentrant and testable in isolation.
//!
//! # Operator Precedence (Pratt Parsing)
//!
//! Binary operator precedence uses a binding-power table, lowest to
//! highest: `Or`/`OrElse`/`Xor`, `And`/`AndAlso`, comparisons,
//! shifts, `&`, `+ -`, `Mod`, `\`, `* /`, and right-associative `^`.
//! `Not` and unary `-`/`+` sit between their conventional neighbours.

use ecow::EcoString;

use crate::ast::{BinaryOp, NodeId, QualifiedName, SourceUnit};
use crate::diagnostics::{Diagnostics, codes};
use crate::source_analysis::{Keyword, LexErrorKind, Location, Token, TokenKind, lex};

mod declarations;
mod expressions;
mod statements;

/// How many syntax errors a single file may accumulate before the
/// parser declares the file unrecoverable and stops. Batch diagnostics
/// stay useful well below this; past it the stream is usually garbage.
const MAX_ERRORS_PER_FILE: usize = 100;

/// Parses one source file into a [`SourceUnit`].
///
/// Lexical errors are forwarded to the sink first; the parser then
/// consumes the (total) token stream. This function always returns a
/// unit — on unrecoverable failure the unit holds whatever was built
/// before the parser gave up, and the sink holds the explanation.
pub fn parse_source_unit(source: &str, file: u16, diagnostics: &mut Diagnostics) -> SourceUnit {
    let (tokens, lex_errors) = lex(source, file);
    for error in lex_errors {
        let code = match error.kind {
            LexErrorKind::UnexpectedCharacter(_) => codes::UNEXPECTED_CHARACTER,
            LexErrorKind::UnterminatedString => codes::UNTERMINATED_STRING,
            LexErrorKind::InvalidCharacterLiteral => codes::INVALID_CHAR_LITERAL,
            LexErrorKind::InvalidNumber => codes::INVALID_NUMBER,
            LexErrorKind::MalformedDate => codes::MALFORMED_DATE,
        };
        diagnostics.error(code, error.location, error.to_string());
    }

    let mut parser = Parser::new(tokens, diagnostics);
    parser.parse_unit(file)
}

/// The declaration context threaded through parse functions.
///
/// Immutable by construction: descending into a namespace or type
/// builds a child context, so no state needs restoring on block exit.
#[derive(Debug, Clone, Default)]
pub(super) struct DeclContext {
    /// The namespace path of the enclosing `Namespace` blocks.
    pub(super) namespace: Vec<EcoString>,
    /// The name of the enclosing type, when parsing members.
    pub(super) container: Option<EcoString>,
}

impl DeclContext {
    /// Context for the segments of a `Namespace` declaration appended
    /// to this one.
    pub(super) fn nested_namespace(&self, name: &QualifiedName) -> Self {
        let mut namespace = self.namespace.clone();
        namespace.extend(name.0.iter().cloned());
        Self {
            namespace,
            container: None,
        }
    }

    /// Context for the body of a type declaration.
    pub(super) fn inside_type(&self, name: &EcoString) -> Self {
        Self {
            namespace: self.namespace.clone(),
            container: Some(name.clone()),
        }
    }
}

/// The parser state.
pub(super) struct Parser<'d> {
    /// The tokens being parsed.
    tokens: Vec<Token>,
    /// Current token index.
    current: usize,
    /// The session's diagnostics sink.
    diagnostics: &'d mut Diagnostics,
    /// Errors charged against this file so far.
    error_count: usize,
    /// Set once the error budget is exhausted; parsing loops bail out.
    failed: bool,
    /// Counter for [`NodeId`] assignment.
    next_node_id: u32,
}

impl<'d> Parser<'d> {
    pub(super) fn new(tokens: Vec<Token>, diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            tokens,
            current: 0,
            diagnostics,
            error_count: 0,
            failed: false,
            next_node_id: 0,
        }
    }

    // === Token access ===

    pub(super) fn current_token(&self) -> &Token {
        self.tokens
            .get(self.current)
            .unwrap_or_else(|| self.tokens.last().expect("token stream ends with EOF"))
    }

    pub(super) fn current_kind(&self) -> &TokenKind {
        self.current_token().kind()
    }

    pub(super) fn here(&self) -> Location {
        self.current_token().location()
    }

    pub(super) fn peek_kind(&self) -> &TokenKind {
        self.tokens
            .get(self.current + 1)
            .map_or(self.current_kind(), Token::kind)
    }

    pub(super) fn advance(&mut self) -> Token {
        let token = self.current_token().clone();
        if self.current + 1 < self.tokens.len() {
            self.current += 1;
        }
        token
    }

    pub(super) fn is_at_end(&self) -> bool {
        self.current_kind().is_eof() || self.failed
    }

    /// Consumes the current token if it matches.
    pub(super) fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.current_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes the current token if it is the given keyword.
    pub(super) fn match_keyword(&mut self, keyword: Keyword) -> bool {
        if self.current_kind().is_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(super) fn at_keyword(&self, keyword: Keyword) -> bool {
        self.current_kind().is_keyword(keyword)
    }

    /// Consumes the expected token, or reports and leaves it.
    pub(super) fn expect_token(&mut self, kind: &TokenKind) -> bool {
        if self.match_token(kind) {
            true
        } else {
            self.error(format!("'{kind}' expected, found '{}'", self.current_kind()));
            false
        }
    }

    /// Consumes the expected keyword, or reports and leaves it.
    pub(super) fn expect_keyword(&mut self, keyword: Keyword) -> bool {
        if self.match_keyword(keyword) {
            true
        } else {
            self.error(format!(
                "'{}' expected, found '{}'",
                keyword.as_str(),
                self.current_kind()
            ));
            false
        }
    }

    /// Consumes an identifier, or reports and substitutes a placeholder.
    pub(super) fn expect_identifier(&mut self, what: &str) -> EcoString {
        if let TokenKind::Identifier(name) = self.current_kind() {
            let name = name.clone();
            self.advance();
            name
        } else {
            self.error(format!("{what} expected, found '{}'", self.current_kind()));
            EcoString::from("?")
        }
    }

    // === Statement boundaries ===

    /// Consumes the statement terminator (line end, `:`, or EOF). If the
    /// current token is something else, reports once and synchronizes.
    pub(super) fn expect_terminator(&mut self) {
        if self.current_kind().is_terminator() {
            if !self.current_kind().is_eof() {
                self.advance();
            }
            return;
        }
        self.error(format!(
            "end of statement expected, found '{}'",
            self.current_kind()
        ));
        self.synchronize();
    }

    /// Skips any blank separators between statements.
    pub(super) fn skip_terminators(&mut self) {
        while matches!(self.current_kind(), TokenKind::Eol | TokenKind::Colon) {
            self.advance();
        }
    }

    /// Error recovery: discard tokens through the next statement
    /// boundary so the next statement parses from a clean start.
    pub(super) fn synchronize(&mut self) {
        while !self.current_kind().is_eof() && !self.current_kind().is_terminator() {
            self.advance();
        }
        self.skip_terminators();
    }

    // === Diagnostics ===

    pub(super) fn error(&mut self, message: impl Into<EcoString>) {
        self.error_at(self.here(), message);
    }

    pub(super) fn error_at(&mut self, location: Location, message: impl Into<EcoString>) {
        if self.failed {
            return;
        }
        self.error_count += 1;
        if self.error_count > MAX_ERRORS_PER_FILE {
            self.failed = true;
            self.diagnostics.error(
                codes::UNRECOVERABLE_PARSE,
                location,
                "too many syntax errors; giving up on this file",
            );
            return;
        }
        self.diagnostics
            .error(codes::SYNTAX_ERROR, location, message);
    }

    pub(super) fn error_code(&mut self, code: u16, location: Location, message: impl Into<EcoString>) {
        self.diagnostics.error(code, location, message);
    }

    // === Node identity ===

    pub(super) fn next_id(&mut self) -> NodeId {
        let id = NodeId::new(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    // === Names ===

    /// Parses a dotted name: `A.B.C`.
    pub(super) fn parse_qualified_name(&mut self) -> QualifiedName {
        let mut segments = vec![self.expect_identifier("name")];
        while self.current_kind() == &TokenKind::Dot {
            self.advance();
            segments.push(self.expect_identifier("name"));
        }
        QualifiedName(segments)
    }
}

// ============================================================================
// Pratt binding powers for binary operators
// ============================================================================

/// Binding power for a binary operator.
///
/// Higher binds tighter. Left-associative operators use
/// `right = left + 1`; the right-associative `^` is the other way
/// around.
#[derive(Debug, Clone, Copy)]
pub(super) struct BindingPower {
    pub(super) left: u8,
    pub(super) right: u8,
}

impl BindingPower {
    const fn left_assoc(precedence: u8) -> Self {
        Self {
            left: precedence,
            right: precedence + 1,
        }
    }

    const fn right_assoc(precedence: u8) -> Self {
        Self {
            left: precedence + 1,
            right: precedence,
        }
    }
}

/// Binding power of the prefix `Not` operator. `Not a And b` parses as
/// `(Not a) And b`, while `Not a = b` parses as `Not (a = b)`.
pub(super) const NOT_BINDING_POWER: u8 = 30;

/// Binding power of prefix `-`/`+`. Binds tighter than every binary
/// operator except `^`: `-x ^ y` is `-(x ^ y)`.
pub(super) const NEGATE_BINDING_POWER: u8 = 110;

/// Maps a token to its binary operator and binding power, or `None`
/// when the token cannot continue a binary expression (which is also
/// how expression parsing stops cleanly at statement boundaries).
pub(super) fn binary_binding_power(kind: &TokenKind) -> Option<(BinaryOp, BindingPower)> {
    Some(match kind {
        TokenKind::Keyword(Keyword::Or) => (BinaryOp::Or, BindingPower::left_assoc(10)),
        TokenKind::Keyword(Keyword::OrElse) => (BinaryOp::OrElse, BindingPower::left_assoc(10)),
        TokenKind::Keyword(Keyword::Xor) => (BinaryOp::Xor, BindingPower::left_assoc(10)),
        TokenKind::Keyword(Keyword::And) => (BinaryOp::And, BindingPower::left_assoc(20)),
        TokenKind::Keyword(Keyword::AndAlso) => (BinaryOp::AndAlso, BindingPower::left_assoc(20)),

        TokenKind::Equals => (BinaryOp::Equals, BindingPower::left_assoc(40)),
        TokenKind::NotEquals => (BinaryOp::NotEquals, BindingPower::left_assoc(40)),
        TokenKind::Less => (BinaryOp::Less, BindingPower::left_assoc(40)),
        TokenKind::Greater => (BinaryOp::Greater, BindingPower::left_assoc(40)),
        TokenKind::LessEquals => (BinaryOp::LessEquals, BindingPower::left_assoc(40)),
        TokenKind::GreaterEquals => (BinaryOp::GreaterEquals, BindingPower::left_assoc(40)),
        TokenKind::Keyword(Keyword::Is) => (BinaryOp::Is, BindingPower::left_assoc(40)),

        TokenKind::ShiftLeft => (BinaryOp::ShiftLeft, BindingPower::left_assoc(50)),
        TokenKind::ShiftRight => (BinaryOp::ShiftRight, BindingPower::left_assoc(50)),

        TokenKind::Ampersand => (BinaryOp::Concatenate, BindingPower::left_assoc(60)),

        TokenKind::Plus => (BinaryOp::Add, BindingPower::left_assoc(70)),
        TokenKind::Minus => (BinaryOp::Subtract, BindingPower::left_assoc(70)),

        TokenKind::Keyword(Keyword::Mod) => (BinaryOp::Modulo, BindingPower::left_assoc(80)),
        TokenKind::Backslash => (BinaryOp::IntDivide, BindingPower::left_assoc(90)),

        TokenKind::Star => (BinaryOp::Multiply, BindingPower::left_assoc(100)),
        TokenKind::Slash => (BinaryOp::Divide, BindingPower::left_assoc(100)),

        TokenKind::Caret => (BinaryOp::Power, BindingPower::right_assoc(120)),

        _ => return None,
    })
}

/// Maps a compound-assignment token to the operator it applies.
pub(super) fn compound_operator(kind: &TokenKind) -> Option<BinaryOp> {
    Some(match kind {
        TokenKind::PlusEquals => BinaryOp::Add,
        TokenKind::MinusEquals => BinaryOp::Subtract,
        TokenKind::StarEquals => BinaryOp::Multiply,
        TokenKind::SlashEquals => BinaryOp::Divide,
        TokenKind::BackslashEquals => BinaryOp::IntDivide,
        TokenKind::AmpersandEquals => BinaryOp::Concatenate,
        TokenKind::CaretEquals => BinaryOp::Power,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_clean(source: &str) -> SourceUnit {
        let mut diagnostics = Diagnostics::new();
        let unit = parse_source_unit(source, 1, &mut diagnostics);
        assert!(
            !diagnostics.has_errors(),
            "unexpected diagnostics: {:?}",
            diagnostics.reported()
        );
        unit
    }

    #[test]
    fn empty_source_parses_to_empty_unit() {
        let unit = parse_clean("");
        assert!(unit.imports.is_empty());
        assert!(unit.members.is_empty());
    }

    #[test]
    fn blank_lines_and_comments_only() {
        let unit = parse_clean("\n' just a comment\n\nRem and another\n");
        assert!(unit.members.is_empty());
    }

    #[test]
    fn lexical_errors_are_forwarded_to_the_sink() {
        let mut diagnostics = Diagnostics::new();
        let _ = parse_source_unit("Dim § As Integer", 1, &mut diagnostics);
        assert!(diagnostics.has_code(codes::UNEXPECTED_CHARACTER));
    }

    #[test]
    fn power_is_right_associative() {
        let (_, power) = binary_binding_power(&TokenKind::Caret).unwrap();
        assert!(power.left > power.right);
        let (_, add) = binary_binding_power(&TokenKind::Plus).unwrap();
        assert!(add.left < add.right);
    }

    #[test]
    fn terminators_do_not_continue_expressions() {
        assert!(binary_binding_power(&TokenKind::Eol).is_none());
        assert!(binary_binding_power(&TokenKind::Comma).is_none());
        assert!(binary_binding_power(&TokenKind::RightParen).is_none());
    }
}
