// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Brio compiler core.
//!
//! This crate contains the front end and semantic core of the Brio
//! compiler:
//! - Lexical analysis (tokenization)
//! - Parsing (AST construction)
//! - Declaration spaces and the type registry
//! - Expression/statement resolution
//! - Definite-assignment and reachability analysis
//! - Interface/abstract-member completion tracking
//!
//! The compiler is a batch compiler: it reports every error it can
//! ascertain in a single run rather than stopping at the first. Code
//! emission, option parsing, and file loading live outside this crate
//! and are reached through the [`emit::Emitter`] trait and
//! [`session::CompilationSession`].

pub mod ast;
pub mod diagnostics;
pub mod emit;
pub mod semantic_analysis;
pub mod session;
pub mod source_analysis;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::ast::{ExprKind, Expression, SourceUnit, Statement, StmtKind};
    pub use crate::diagnostics::{Diagnostics, Severity};
    pub use crate::session::{CompilationSession, CompilerOptions};
    pub use crate::source_analysis::{Location, SourceMap};
}
