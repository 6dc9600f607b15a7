// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Property-based tests for the Brio lexer.
//!
//! These tests use `proptest` to verify lexer invariants over generated
//! inputs:
//!
//! 1. **Lexer never panics** — arbitrary string input always tokenizes
//! 2. **EOF is always last** — every token stream ends with exactly one EOF
//! 3. **Lexer is deterministic** — same input, same tokens
//! 4. **Locations are monotonic** — token positions never move backwards
//! 5. **Valid fragments produce no errors** — known-valid inputs lex cleanly
//! 6. **No consecutive line ends** — EOL tokens always collapse

use proptest::prelude::*;

use super::lexer::lex;
use super::token::TokenKind;

// ============================================================================
// Generators
// ============================================================================

/// Known-valid single-token fragments that should lex without errors.
const VALID_SINGLE_TOKENS: &[&str] = &[
    "42",
    "3.14",
    "1.5F",
    "2D",
    "7L",
    "\"hello\"",
    "\"a\"c",
    "#8/5/2026#",
    "True",
    "False",
    "Nothing",
    "balance",
    "[End]",
    "+",
    "-",
    "*",
    "\\",
    "&",
    "<>",
    "<=",
    ">=",
    "<<",
    ">>",
    ":=",
    "(",
    ")",
];

/// Multi-token valid lines that should lex cleanly.
const VALID_LINES: &[&str] = &[
    "Dim x As Integer = 42",
    "x += 1",
    "If a Then b = 1",
    "total = price * count",
    "name = \"say \"\"hi\"\"\"",
    "For i = 1 To 10 Step 2",
    "value = CType(x, Double)",
    "Select Case tag",
    "result = a \\ b",
    "flag = Not done And ready",
];

fn valid_single_token() -> impl Strategy<Value = String> {
    prop::sample::select(VALID_SINGLE_TOKENS).prop_map(std::string::ToString::to_string)
}

fn valid_line() -> impl Strategy<Value = String> {
    prop::sample::select(VALID_LINES).prop_map(std::string::ToString::to_string)
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    /// Property 1: the lexer never panics on arbitrary input.
    #[test]
    fn lexer_never_panics(input in "\\PC{0,400}") {
        let _ = lex(&input, 1);
    }

    /// Property 2: the stream ends with exactly one EOF.
    #[test]
    fn eof_is_always_last(input in "\\PC{0,400}") {
        let (tokens, _) = lex(&input, 1);
        prop_assert!(!tokens.is_empty());
        prop_assert!(tokens.last().unwrap().kind().is_eof());
        let eof_count = tokens.iter().filter(|t| t.kind().is_eof()).count();
        prop_assert_eq!(eof_count, 1);
    }

    /// Property 3: lexing is deterministic.
    #[test]
    fn lexer_is_deterministic(input in "\\PC{0,400}") {
        let (first, _) = lex(&input, 1);
        let (second, _) = lex(&input, 1);
        prop_assert_eq!(first, second);
    }

    /// Property 4: token locations never move backwards.
    #[test]
    fn locations_are_monotonic(input in "\\PC{0,400}") {
        let (tokens, _) = lex(&input, 1);
        let mut previous = (0u32, 0u32);
        for token in &tokens {
            let location = token.location();
            let current = (location.row(), location.column());
            prop_assert!(
                current >= previous,
                "token {:?} at {:?} precedes {:?}",
                token.kind(),
                current,
                previous
            );
            previous = current;
        }
    }

    /// Property 5: known-valid fragments lex without errors.
    #[test]
    fn valid_single_tokens_lex_cleanly(fragment in valid_single_token()) {
        let (tokens, errors) = lex(&fragment, 1);
        prop_assert!(errors.is_empty(), "errors for {fragment:?}: {errors:?}");
        prop_assert!(tokens.iter().all(|t| !t.kind().is_error()));
    }

    /// Property 5b: known-valid lines lex without errors.
    #[test]
    fn valid_lines_lex_cleanly(line in valid_line()) {
        let (tokens, errors) = lex(&line, 1);
        prop_assert!(errors.is_empty(), "errors for {line:?}: {errors:?}");
        prop_assert!(tokens.iter().all(|t| !t.kind().is_error()));
    }

    /// Property 6: consecutive line ends always collapse to one token.
    #[test]
    fn line_ends_collapse(lines in prop::collection::vec(valid_line(), 1..5), blanks in 1usize..4) {
        let separator = "\n".repeat(blanks);
        let input = lines.join(&separator);
        let (tokens, _) = lex(&input, 1);
        let mut previous_was_eol = false;
        for token in &tokens {
            let is_eol = matches!(token.kind(), TokenKind::Eol);
            prop_assert!(!(is_eol && previous_was_eol), "consecutive EOL in {input:?}");
            previous_was_eol = is_eol;
        }
    }
}
