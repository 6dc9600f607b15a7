// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Lexical error types.
//!
//! The lexer recovers from every error: it emits an error token (or, for
//! malformed dates, a zero-date literal) and keeps scanning, so these
//! values describe problems without ever aborting tokenization. They
//! integrate with [`miette`] for rendered reports.

// Spurious warnings from miette derive macro expansion
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

use super::Location;

/// A lexical error encountered during tokenization.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("{kind}")]
#[diagnostic()]
pub struct LexError {
    /// The kind of lexical error.
    #[source]
    pub kind: LexErrorKind,
    /// Where the error was detected.
    pub location: Location,
}

impl LexError {
    /// Creates a new lexical error.
    #[must_use]
    pub const fn new(kind: LexErrorKind, location: Location) -> Self {
        Self { kind, location }
    }

    /// Creates an "unexpected character" error.
    #[must_use]
    pub const fn unexpected_char(c: char, location: Location) -> Self {
        Self::new(LexErrorKind::UnexpectedCharacter(c), location)
    }

    /// Creates an "unterminated string" error.
    #[must_use]
    pub const fn unterminated_string(location: Location) -> Self {
        Self::new(LexErrorKind::UnterminatedString, location)
    }
}

/// The kind of lexical error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    /// A character with no meaning in the language.
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),

    /// A string or character literal ran into the end of its line.
    #[error("unterminated string literal")]
    UnterminatedString,

    /// A character literal containing zero or several characters.
    #[error("character literal must contain exactly one character")]
    InvalidCharacterLiteral,

    /// An integer literal too large for the widest integer type, or an
    /// unparseable floating-point literal.
    #[error("number is not a valid literal of its type")]
    InvalidNumber,

    /// A date literal that does not match the `M/d/yyyy` pattern.
    #[error("date literal is not valid")]
    MalformedDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_error_display() {
        let err = LexError::unexpected_char('§', Location::new(1, 1, 1));
        assert_eq!(err.to_string(), "unexpected character '§'");

        let err = LexError::unterminated_string(Location::new(1, 2, 5));
        assert_eq!(err.to_string(), "unterminated string literal");
    }

    #[test]
    fn lex_error_location() {
        let err = LexError::new(LexErrorKind::MalformedDate, Location::new(2, 7, 9));
        assert_eq!(err.location.file(), 2);
        assert_eq!(err.location.row(), 7);
    }
}
