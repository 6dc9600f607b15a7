// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Lexing and parsing for Brio source code.
//!
//! # Lexical Analysis
//!
//! The [`Lexer`] converts source text into a stream of [`Token`]s. Brio
//! is line-oriented, so the end of a line is itself a token
//! ([`TokenKind::Eol`]) and acts as the statement separator. Every token
//! carries a packed [`Location`].
//!
//! ```
//! use brio_core::source_analysis::Lexer;
//!
//! let tokens: Vec<_> = Lexer::new("x + 1", 1).collect();
//! assert_eq!(tokens.len(), 3); // x, +, 1 (EOF excluded from iterator)
//! ```
//!
//! # Parsing
//!
//! The [`parse_source_unit`] function converts tokens into a
//! [`SourceUnit`](crate::ast::SourceUnit). The parser always produces a
//! tree; syntax errors are reported to the diagnostics sink and recovery
//! resumes at the next statement boundary.
//!
//! # Error Handling
//!
//! The lexer uses error recovery: invalid input becomes
//! [`TokenKind::Error`] tokens (plus a [`LexError`] record) rather than
//! stopping the scan. The parser forwards lexical errors to the
//! diagnostics sink before it starts consuming tokens.

mod error;
mod lexer;
mod location;
pub mod parser;
mod token;

#[cfg(test)]
mod lexer_property_tests;

pub use error::{LexError, LexErrorKind};
pub use lexer::{Lexer, lex};
pub use location::{Location, SourceMap};
pub use parser::parse_source_unit;
pub use token::{DateValue, FloatKind, IntegerKind, Keyword, Token, TokenKind};
