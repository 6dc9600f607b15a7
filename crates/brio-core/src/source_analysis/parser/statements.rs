// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Statement parsing.
//!
//! Statements are separated by line ends (or `:`). A failed statement
//! reports once and synchronizes at the next separator, so one bad line
//! never cascades into the rest of the block.

use crate::ast::{
    CaseSection, CatchClause, DoCondition, DoConditionKind, DoTestPosition, ExitKind, IfBranch,
    Statement, StmtKind, VariableDeclarator,
};
use crate::source_analysis::{Keyword, TokenKind};

use super::{Parser, compound_operator};

impl Parser<'_> {
    /// Parses statements until a block-closing keyword (`End`, `Else`,
    /// `Case`, `Catch`, `Finally`, `Next`, `Loop`) or end of file.
    pub(super) fn parse_block(&mut self) -> Vec<Statement> {
        let mut statements = Vec::new();
        self.skip_terminators();
        while !self.is_at_end() && !self.at_block_end() {
            // `name:` declares a label and may share its line with the
            // labeled statement, so it has no separator of its own.
            if let Some(label) = self.match_label() {
                statements.push(label);
                self.skip_terminators();
                continue;
            }
            statements.push(self.parse_statement());
            self.expect_terminator();
            self.skip_terminators();
        }
        statements
    }

    fn at_block_end(&self) -> bool {
        matches!(
            self.current_kind(),
            TokenKind::Keyword(
                Keyword::End
                    | Keyword::Else
                    | Keyword::ElseIf
                    | Keyword::Case
                    | Keyword::Catch
                    | Keyword::Finally
                    | Keyword::Next
                    | Keyword::Loop
            )
        )
    }

    fn match_label(&mut self) -> Option<Statement> {
        if let TokenKind::Identifier(name) = self.current_kind() {
            if self.peek_kind() == &TokenKind::Colon {
                let location = self.here();
                let name = name.clone();
                self.advance();
                self.advance();
                return Some(Statement::new(location, StmtKind::Label(name)));
            }
        }
        None
    }

    /// Parses one statement, leaving its trailing separator in place.
    pub(super) fn parse_statement(&mut self) -> Statement {
        let location = self.here();
        match self.current_kind() {
            TokenKind::Keyword(Keyword::Dim) => self.parse_dim(),
            TokenKind::Keyword(Keyword::Const) => self.parse_local_const(),
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::While) => self.parse_while(),
            TokenKind::Keyword(Keyword::Do) => self.parse_do_loop(),
            TokenKind::Keyword(Keyword::For) => self.parse_for(),
            TokenKind::Keyword(Keyword::Select) => self.parse_select(),
            TokenKind::Keyword(Keyword::Try) => self.parse_try(),
            TokenKind::Keyword(Keyword::Throw) => {
                self.advance();
                let value = if self.current_kind().is_terminator() {
                    None
                } else {
                    Some(self.parse_expression())
                };
                Statement::new(location, StmtKind::Throw(value))
            }
            TokenKind::Keyword(Keyword::Return) => {
                self.advance();
                let value = if self.current_kind().is_terminator() {
                    None
                } else {
                    Some(self.parse_expression())
                };
                Statement::new(location, StmtKind::Return(value))
            }
            TokenKind::Keyword(Keyword::Exit) => self.parse_exit(),
            TokenKind::Keyword(Keyword::GoTo) => {
                self.advance();
                let label = self.expect_identifier("label name");
                Statement::new(location, StmtKind::GoTo(label))
            }
            _ => self.parse_assignment_or_call(),
        }
    }

    fn parse_dim(&mut self) -> Statement {
        let location = self.here();
        self.expect_keyword(Keyword::Dim);
        let mut declarators = Vec::new();
        loop {
            let name_location = self.here();
            let name = self.expect_identifier("variable name");
            let type_name = self.parse_optional_as_clause();
            let initializer = if self.match_token(&TokenKind::Equals) {
                Some(self.parse_expression())
            } else {
                None
            };
            declarators.push(VariableDeclarator {
                name,
                type_name,
                initializer,
                location: name_location,
            });
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        Statement::new(location, StmtKind::Declare(declarators))
    }

    fn parse_local_const(&mut self) -> Statement {
        let location = self.here();
        self.expect_keyword(Keyword::Const);
        let name = self.expect_identifier("constant name");
        let type_name = self.parse_optional_as_clause();
        self.expect_token(&TokenKind::Equals);
        let initializer = self.parse_expression();
        Statement::new(
            location,
            StmtKind::LocalConst {
                name,
                type_name,
                initializer,
            },
        )
    }

    fn parse_if(&mut self) -> Statement {
        let location = self.here();
        self.expect_keyword(Keyword::If);
        let condition = self.parse_expression();
        self.expect_keyword(Keyword::Then);

        // Single-line form: `If cond Then stmt [Else stmt]`.
        if !self.current_kind().is_terminator() && !self.at_keyword(Keyword::Else) {
            let body = vec![self.parse_statement()];
            let else_body = if self.match_keyword(Keyword::Else) {
                Some(vec![self.parse_statement()])
            } else {
                None
            };
            return Statement::new(
                location,
                StmtKind::If {
                    branches: vec![IfBranch { condition, body }],
                    else_body,
                },
            );
        }

        let mut branches = vec![IfBranch {
            condition,
            body: self.parse_block(),
        }];
        let mut else_body = None;
        loop {
            if self.match_keyword(Keyword::ElseIf) {
                let condition = self.parse_expression();
                self.expect_keyword(Keyword::Then);
                branches.push(IfBranch {
                    condition,
                    body: self.parse_block(),
                });
            } else if self.match_keyword(Keyword::Else) {
                else_body = Some(self.parse_block());
                break;
            } else {
                break;
            }
        }
        self.expect_keyword(Keyword::End);
        self.expect_keyword(Keyword::If);
        Statement::new(
            location,
            StmtKind::If {
                branches,
                else_body,
            },
        )
    }

    fn parse_while(&mut self) -> Statement {
        let location = self.here();
        self.expect_keyword(Keyword::While);
        let condition = self.parse_expression();
        let body = self.parse_block();
        self.expect_keyword(Keyword::End);
        self.expect_keyword(Keyword::While);
        Statement::new(location, StmtKind::While { condition, body })
    }

    fn parse_do_loop(&mut self) -> Statement {
        let location = self.here();
        self.expect_keyword(Keyword::Do);
        let pre_condition = self.match_do_condition(DoTestPosition::Pre);
        let body = self.parse_block();
        self.expect_keyword(Keyword::Loop);
        let post_condition = self.match_do_condition(DoTestPosition::Post);
        let condition = match (pre_condition, post_condition) {
            (Some(pre), Some(_)) => {
                self.error("'Loop' cannot have a condition when 'Do' already has one");
                Some(pre)
            }
            (pre, post) => pre.or(post),
        };
        Statement::new(location, StmtKind::DoLoop { condition, body })
    }

    fn match_do_condition(&mut self, position: DoTestPosition) -> Option<DoCondition> {
        let kind = if self.match_keyword(Keyword::While) {
            DoConditionKind::While
        } else if self.match_keyword(Keyword::Until) {
            DoConditionKind::Until
        } else {
            return None;
        };
        Some(DoCondition {
            condition: self.parse_expression(),
            kind,
            position,
        })
    }

    fn parse_for(&mut self) -> Statement {
        let location = self.here();
        self.expect_keyword(Keyword::For);
        let variable = self.expect_identifier("loop variable");
        self.expect_token(&TokenKind::Equals);
        let from = self.parse_expression();
        self.expect_keyword(Keyword::To);
        let to = self.parse_expression();
        let step = if self.match_keyword(Keyword::Step) {
            Some(self.parse_expression())
        } else {
            None
        };
        let body = self.parse_block();
        self.expect_keyword(Keyword::Next);
        // `Next i` may repeat the loop variable; it is not checked here.
        if matches!(self.current_kind(), TokenKind::Identifier(_)) {
            self.advance();
        }
        Statement::new(
            location,
            StmtKind::For {
                variable,
                from,
                to,
                step,
                body,
            },
        )
    }

    fn parse_select(&mut self) -> Statement {
        let location = self.here();
        self.expect_keyword(Keyword::Select);
        // The `Case` after `Select` is optional noise.
        self.match_keyword(Keyword::Case);
        let subject = self.parse_expression();
        self.skip_terminators();

        let mut sections = Vec::new();
        let mut else_body = None;
        while self.at_keyword(Keyword::Case) {
            let case_location = self.here();
            self.advance();
            if self.match_keyword(Keyword::Else) {
                else_body = Some(self.parse_block());
                break;
            }
            let mut values = vec![self.parse_expression()];
            while self.match_token(&TokenKind::Comma) {
                values.push(self.parse_expression());
            }
            sections.push(CaseSection {
                values,
                body: self.parse_block(),
                location: case_location,
            });
        }
        self.expect_keyword(Keyword::End);
        self.expect_keyword(Keyword::Select);
        Statement::new(
            location,
            StmtKind::Select {
                subject,
                sections,
                else_body,
            },
        )
    }

    fn parse_try(&mut self) -> Statement {
        let location = self.here();
        self.expect_keyword(Keyword::Try);
        let body = self.parse_block();
        let mut catches = Vec::new();
        while self.at_keyword(Keyword::Catch) {
            let catch_location = self.here();
            self.advance();
            let (variable, type_name) = if let TokenKind::Identifier(name) = self.current_kind() {
                let name = name.clone();
                self.advance();
                (Some(name), self.parse_optional_as_clause())
            } else {
                (None, None)
            };
            catches.push(CatchClause {
                variable,
                type_name,
                body: self.parse_block(),
                location: catch_location,
            });
        }
        let finally = if self.match_keyword(Keyword::Finally) {
            Some(self.parse_block())
        } else {
            None
        };
        self.expect_keyword(Keyword::End);
        self.expect_keyword(Keyword::Try);
        Statement::new(
            location,
            StmtKind::Try {
                body,
                catches,
                finally,
            },
        )
    }

    fn parse_exit(&mut self) -> Statement {
        let location = self.here();
        self.expect_keyword(Keyword::Exit);
        let kind = match self.current_kind() {
            TokenKind::Keyword(Keyword::Sub) => ExitKind::Sub,
            TokenKind::Keyword(Keyword::Function) => ExitKind::Function,
            TokenKind::Keyword(Keyword::Property) => ExitKind::Property,
            TokenKind::Keyword(Keyword::For) => ExitKind::For,
            TokenKind::Keyword(Keyword::While) => ExitKind::While,
            TokenKind::Keyword(Keyword::Do) => ExitKind::Do,
            TokenKind::Keyword(Keyword::Select) => ExitKind::Select,
            TokenKind::Keyword(Keyword::Try) => ExitKind::Try,
            other => {
                self.error(format!("'Exit' must name the construct to leave, found '{other}'"));
                return Statement::new(location, StmtKind::Error);
            }
        };
        self.advance();
        Statement::new(location, StmtKind::Exit(kind))
    }

    /// Parses a statement that begins with an expression: an
    /// assignment, a compound assignment, or a call statement.
    fn parse_assignment_or_call(&mut self) -> Statement {
        let location = self.here();
        let target = self.parse_postfix();
        if target.is_error() {
            self.synchronize();
            return Statement::new(location, StmtKind::Error);
        }

        if self.match_token(&TokenKind::Equals) {
            let value = self.parse_expression();
            return Statement::new(location, StmtKind::Assign { target, value });
        }
        if let Some(op) = compound_operator(self.current_kind()) {
            self.advance();
            let value = self.parse_expression();
            return Statement::new(location, StmtKind::Compound { target, op, value });
        }
        Statement::new(location, StmtKind::Expr(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExprKind, StmtKind};
    use crate::diagnostics::Diagnostics;
    use crate::source_analysis::lex;

    fn parse_body(source: &str) -> (Vec<Statement>, usize) {
        let (tokens, errors) = lex(source, 1);
        assert!(errors.is_empty(), "lex errors in test input: {errors:?}");
        let mut diagnostics = Diagnostics::new();
        let mut parser = Parser::new(tokens, &mut diagnostics);
        let block = parser.parse_block();
        (block, diagnostics.error_count())
    }

    fn parse_clean(source: &str) -> Vec<Statement> {
        let (block, errors) = parse_body(source);
        assert_eq!(errors, 0, "unexpected parse errors in {source:?}");
        block
    }

    #[test]
    fn dim_with_multiple_declarators() {
        let block = parse_clean("Dim a As Integer = 1, b, c As String");
        let StmtKind::Declare(declarators) = &block[0].kind else {
            panic!("expected Dim");
        };
        assert_eq!(declarators.len(), 3);
        assert_eq!(declarators[0].name, "a");
        assert!(declarators[0].initializer.is_some());
        assert!(declarators[1].type_name.is_none());
        assert_eq!(declarators[2].name, "c");
    }

    #[test]
    fn assignment_and_compound_assignment() {
        let block = parse_clean("x = 1\nx += 2");
        assert!(matches!(block[0].kind, StmtKind::Assign { .. }));
        let StmtKind::Compound { op, .. } = &block[1].kind else {
            panic!("expected compound assignment");
        };
        assert_eq!(*op, crate::ast::BinaryOp::Add);
    }

    #[test]
    fn equals_in_assignment_value_is_comparison() {
        let block = parse_clean("x = y = z");
        let StmtKind::Assign { value, .. } = &block[0].kind else {
            panic!("expected assignment");
        };
        assert!(matches!(
            value.kind,
            ExprKind::Binary {
                op: crate::ast::BinaryOp::Equals,
                ..
            }
        ));
    }

    #[test]
    fn block_if_with_elseif_and_else() {
        let block = parse_clean(
            "If a Then\n  x = 1\nElseIf b Then\n  x = 2\nElse\n  x = 3\nEnd If",
        );
        let StmtKind::If {
            branches,
            else_body,
        } = &block[0].kind
        else {
            panic!("expected If");
        };
        assert_eq!(branches.len(), 2);
        assert!(else_body.is_some());
    }

    #[test]
    fn single_line_if() {
        let block = parse_clean("If a Then x = 1 Else x = 2");
        let StmtKind::If {
            branches,
            else_body,
        } = &block[0].kind
        else {
            panic!("expected If");
        };
        assert_eq!(branches[0].body.len(), 1);
        assert_eq!(else_body.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn while_loop() {
        let block = parse_clean("While n > 0\n  n -= 1\nEnd While");
        assert!(matches!(block[0].kind, StmtKind::While { .. }));
    }

    #[test]
    fn do_loop_pre_and_post_conditions() {
        let block = parse_clean("Do While a\n  x = 1\nLoop");
        let StmtKind::DoLoop { condition, .. } = &block[0].kind else {
            panic!("expected Do");
        };
        let cond = condition.as_ref().unwrap();
        assert_eq!(cond.position, DoTestPosition::Pre);
        assert_eq!(cond.kind, DoConditionKind::While);

        let block = parse_clean("Do\n  x = 1\nLoop Until a");
        let StmtKind::DoLoop { condition, .. } = &block[0].kind else {
            panic!("expected Do");
        };
        let cond = condition.as_ref().unwrap();
        assert_eq!(cond.position, DoTestPosition::Post);
        assert_eq!(cond.kind, DoConditionKind::Until);
    }

    #[test]
    fn do_loop_with_two_conditions_reports() {
        let (_, errors) = parse_body("Do While a\n  x = 1\nLoop Until b");
        assert_eq!(errors, 1);
    }

    #[test]
    fn for_loop_with_step_and_next_variable() {
        let block = parse_clean("For i = 1 To 10 Step 2\n  total += i\nNext i");
        let StmtKind::For { variable, step, .. } = &block[0].kind else {
            panic!("expected For");
        };
        assert_eq!(variable, "i");
        assert!(step.is_some());
    }

    #[test]
    fn select_case_with_sections_and_else() {
        let block = parse_clean(
            "Select Case tag\nCase 1, 2\n  x = 1\nCase 3\n  x = 2\nCase Else\n  x = 3\nEnd Select",
        );
        let StmtKind::Select {
            sections,
            else_body,
            ..
        } = &block[0].kind
        else {
            panic!("expected Select");
        };
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].values.len(), 2);
        assert!(else_body.is_some());
    }

    #[test]
    fn try_catch_finally() {
        let block = parse_clean(
            "Try\n  risky()\nCatch ex As OverdraftError\n  handle(ex)\nCatch\n  cleanup()\nFinally\n  done()\nEnd Try",
        );
        let StmtKind::Try {
            catches, finally, ..
        } = &block[0].kind
        else {
            panic!("expected Try");
        };
        assert_eq!(catches.len(), 2);
        assert_eq!(catches[0].variable.as_deref(), Some("ex"));
        assert!(catches[0].type_name.is_some());
        assert!(catches[1].variable.is_none());
        assert!(finally.is_some());
    }

    #[test]
    fn exit_kinds() {
        let block = parse_clean("Exit Sub");
        assert!(matches!(block[0].kind, StmtKind::Exit(ExitKind::Sub)));
        let (_, errors) = parse_body("Exit Wallet");
        assert_eq!(errors, 1);
    }

    #[test]
    fn goto_and_label() {
        let block = parse_clean("again:\nx += 1\nGoTo again");
        assert!(matches!(&block[0].kind, StmtKind::Label(l) if l == "again"));
        assert!(matches!(&block[2].kind, StmtKind::GoTo(l) if l == "again"));
    }

    #[test]
    fn colon_separates_statements_on_one_line() {
        let block = parse_clean("x = 1 : y = 2");
        assert_eq!(block.len(), 2);
    }

    #[test]
    fn bad_statement_recovers_at_line_end() {
        let (block, errors) = parse_body("x = ,\ny = 2");
        assert!(errors >= 1);
        // The second statement still parsed.
        assert!(
            block
                .iter()
                .any(|s| matches!(&s.kind, StmtKind::Assign { target, .. }
            if matches!(&target.kind, ExprKind::Name(n) if n == "y")))
        );
    }

    #[test]
    fn local_const() {
        let block = parse_clean("Const limit As Integer = 100");
        assert!(matches!(block[0].kind, StmtKind::LocalConst { .. }));
    }
}
