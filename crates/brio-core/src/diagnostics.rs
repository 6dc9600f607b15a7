// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The diagnostics sink.
//!
//! Every pass reports through a [`Diagnostics`] value: `(severity, code,
//! location, message)` triples with running error/warning counts. The
//! compiler is a batch compiler — it keeps going after an error to report
//! everything it can ascertain — so the sink is mostly an accumulator,
//! with three behavioural switches:
//!
//! - **warnings as errors**: warnings count (and render) as errors
//! - **fatal errors**: the first error trips [`Diagnostics::is_fatal`],
//!   which the resolution driver checks at declaration boundaries to
//!   unwind instead of accumulating further
//! - **per-code suppression**: selected warning codes are dropped
//!
//! A test-harness hook, [`Diagnostics::expect_code`], latches when a
//! given code is reported so a driver can short-circuit cleanly.

use std::collections::HashSet;

use ecow::EcoString;

use crate::source_analysis::Location;

/// Numeric diagnostic codes, grouped by pass.
///
/// Codes are stable identifiers: tests and suppression configuration
/// refer to them, so renumbering is a breaking change.
pub mod codes {
    // Lexical (1000s)
    pub const UNEXPECTED_CHARACTER: u16 = 1001;
    pub const UNTERMINATED_STRING: u16 = 1002;
    pub const INVALID_CHAR_LITERAL: u16 = 1003;
    pub const INVALID_NUMBER: u16 = 1004;
    pub const MALFORMED_DATE: u16 = 1005;

    // Syntax (2000s)
    pub const SYNTAX_ERROR: u16 = 2001;
    pub const UNRECOVERABLE_PARSE: u16 = 2002;
    pub const INVALID_MODIFIER: u16 = 2003;
    pub const DUPLICATE_MODIFIER: u16 = 2004;
    pub const FUNCTION_WITHOUT_RETURN_TYPE: u16 = 2005;
    pub const MULTIPLE_ACCESS_MODIFIERS: u16 = 2006;
    pub const UNUSED_IMPORT: u16 = 2007;
    pub const DUPLICATE_IMPORT_ALIAS: u16 = 2008;

    // Declaration space (3000s)
    pub const NAME_EXISTS: u16 = 3001;
    pub const DUPLICATE_SIGNATURE: u16 = 3002;
    pub const CLASHES_WITH_ENCLOSING_TYPE: u16 = 3003;
    pub const NAME_USED_IN_CHILD_SCOPE: u16 = 3004;
    pub const DUPLICATE_LABEL: u16 = 3005;
    pub const LABEL_SHADOWS: u16 = 3006;
    pub const DUPLICATE_PARAMETER: u16 = 3007;

    // Type resolution (4000s)
    pub const TYPE_NOT_FOUND: u16 = 4001;
    pub const AMBIGUOUS_IMPORTED_TYPE: u16 = 4002;
    pub const ENUM_UNDERLYING_NOT_INTEGRAL: u16 = 4003;
    pub const NOT_A_TYPE: u16 = 4004;

    // Expression/statement resolution (5000s)
    pub const NAME_NOT_FOUND: u16 = 5001;
    pub const NO_IMPLICIT_CONVERSION: u16 = 5002;
    pub const NO_EXPLICIT_CONVERSION: u16 = 5003;
    pub const CONSTANT_NOT_REPRESENTABLE: u16 = 5004;
    pub const CIRCULAR_CONSTANT: u16 = 5005;
    pub const EXPRESSION_NOT_CONSTANT: u16 = 5006;
    pub const ASSIGNMENT_TARGET_INVALID: u16 = 5007;
    pub const PROPERTY_NOT_WRITABLE: u16 = 5008;
    pub const NO_MATCHING_OVERLOAD: u16 = 5009;
    pub const AMBIGUOUS_OVERLOAD: u16 = 5010;
    pub const DELEGATE_SIGNATURE_MISMATCH: u16 = 5011;
    pub const ATTRIBUTE_ARGUMENT_NOT_CONSTANT: u16 = 5012;
    pub const ATTRIBUTE_TARGET_INVALID: u16 = 5013;
    pub const ATTRIBUTE_USAGE_UNKNOWN: u16 = 5014;
    pub const OPERATOR_NOT_DEFINED: u16 = 5015;
    pub const INVOCATION_TARGET_INVALID: u16 = 5016;

    // Flow analysis (6000s)
    pub const USE_OF_UNASSIGNED: u16 = 6001;
    pub const UNREACHABLE_CODE: u16 = 6002;
    pub const STRUCTURE_NOT_FULLY_ASSIGNED: u16 = 6003;
    pub const FUNCTION_WITHOUT_RETURN_VALUE: u16 = 6004;
    pub const UNDEFINED_LABEL: u16 = 6005;

    // Pending implementations (7000s)
    pub const INTERFACE_MEMBER_NOT_IMPLEMENTED: u16 = 7001;
    pub const ABSTRACT_MEMBER_NOT_IMPLEMENTED: u16 = 7002;

    // Internal invariant violations (9000s)
    pub const INTERNAL_INCONSISTENCY: u16 = 9001;
}

/// The severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Prevents successful compilation.
    Error,
    /// Reported but never blocks emission on its own.
    Warning,
}

/// A reported diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// The severity after any warnings-as-errors upgrade.
    pub severity: Severity,
    /// The numeric code from [`codes`].
    pub code: u16,
    /// Where the problem was found.
    pub location: Location,
    /// The rendered message.
    pub message: EcoString,
}

/// The diagnostics sink for one compilation session.
#[derive(Debug, Default)]
pub struct Diagnostics {
    reported: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
    warnings_as_errors: bool,
    fatal_errors: bool,
    fatal_triggered: bool,
    suppressed: HashSet<u16>,
    expected_code: Option<u16>,
    expected_seen: bool,
}

impl Diagnostics {
    /// Creates an empty sink with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Treats all warnings as errors.
    pub fn set_warnings_as_errors(&mut self, enabled: bool) {
        self.warnings_as_errors = enabled;
    }

    /// Makes the first reported error trip [`Diagnostics::is_fatal`].
    pub fn set_fatal_errors(&mut self, enabled: bool) {
        self.fatal_errors = enabled;
    }

    /// Drops future warnings with the given code.
    pub fn suppress(&mut self, code: u16) {
        self.suppressed.insert(code);
    }

    /// Arms the test-harness hook: [`Diagnostics::expected_code_seen`]
    /// latches the moment `code` is reported.
    pub fn expect_code(&mut self, code: u16) {
        self.expected_code = Some(code);
    }

    /// Reports a diagnostic.
    ///
    /// Suppressed warning codes are dropped. With warnings-as-errors,
    /// warnings are recorded and counted as errors.
    pub fn report(
        &mut self,
        severity: Severity,
        code: u16,
        location: Location,
        message: impl Into<EcoString>,
    ) {
        if self.expected_code == Some(code) {
            self.expected_seen = true;
        }
        let severity = match severity {
            Severity::Warning if self.suppressed.contains(&code) => return,
            Severity::Warning if self.warnings_as_errors => Severity::Error,
            other => other,
        };
        let message = message.into();
        tracing::debug!(code, ?severity, %message, "diagnostic");
        match severity {
            Severity::Error => {
                self.error_count += 1;
                if self.fatal_errors {
                    self.fatal_triggered = true;
                }
            }
            Severity::Warning => self.warning_count += 1,
        }
        self.reported.push(Diagnostic {
            severity,
            code,
            location,
            message,
        });
    }

    /// Reports an error.
    pub fn error(&mut self, code: u16, location: Location, message: impl Into<EcoString>) {
        self.report(Severity::Error, code, location, message);
    }

    /// Reports a warning.
    pub fn warning(&mut self, code: u16, location: Location, message: impl Into<EcoString>) {
        self.report(Severity::Warning, code, location, message);
    }

    /// The number of errors reported (after any upgrade).
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.error_count
    }

    /// The number of warnings reported (after suppression/upgrade).
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warning_count
    }

    /// Returns `true` if any error has been reported.
    #[must_use]
    pub const fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Returns `true` once fatal-errors mode has seen an error. The
    /// resolution driver polls this at declaration boundaries and
    /// unwinds instead of accumulating further diagnostics.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        self.fatal_triggered
    }

    /// Returns `true` once the expected code armed by
    /// [`Diagnostics::expect_code`] has been reported.
    #[must_use]
    pub const fn expected_code_seen(&self) -> bool {
        self.expected_seen
    }

    /// All diagnostics reported so far, in report order.
    #[must_use]
    pub fn reported(&self) -> &[Diagnostic] {
        &self.reported
    }

    /// Returns `true` if any diagnostic carries the given code.
    #[must_use]
    pub fn has_code(&self, code: u16) -> bool {
        self.reported.iter().any(|d| d.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_errors_and_warnings_separately() {
        let mut sink = Diagnostics::new();
        sink.error(codes::SYNTAX_ERROR, Location::NULL, "bad");
        sink.warning(codes::UNREACHABLE_CODE, Location::NULL, "dead");
        sink.warning(codes::UNREACHABLE_CODE, Location::NULL, "dead");
        assert_eq!(sink.error_count(), 1);
        assert_eq!(sink.warning_count(), 2);
        assert!(sink.has_errors());
    }

    #[test]
    fn warnings_as_errors_upgrades_severity_and_count() {
        let mut sink = Diagnostics::new();
        sink.set_warnings_as_errors(true);
        sink.warning(codes::UNREACHABLE_CODE, Location::NULL, "dead");
        assert_eq!(sink.error_count(), 1);
        assert_eq!(sink.warning_count(), 0);
        assert_eq!(sink.reported()[0].severity, Severity::Error);
    }

    #[test]
    fn suppressed_warning_codes_are_dropped() {
        let mut sink = Diagnostics::new();
        sink.suppress(codes::UNREACHABLE_CODE);
        sink.warning(codes::UNREACHABLE_CODE, Location::NULL, "dead");
        assert_eq!(sink.warning_count(), 0);
        assert!(sink.reported().is_empty());

        // Errors with the code are still reported.
        sink.error(codes::UNREACHABLE_CODE, Location::NULL, "kept");
        assert_eq!(sink.error_count(), 1);
    }

    #[test]
    fn fatal_mode_trips_on_first_error() {
        let mut sink = Diagnostics::new();
        sink.set_fatal_errors(true);
        assert!(!sink.is_fatal());
        sink.warning(codes::UNREACHABLE_CODE, Location::NULL, "dead");
        assert!(!sink.is_fatal());
        sink.error(codes::SYNTAX_ERROR, Location::NULL, "bad");
        assert!(sink.is_fatal());
    }

    #[test]
    fn expected_code_hook_latches() {
        let mut sink = Diagnostics::new();
        sink.expect_code(codes::CIRCULAR_CONSTANT);
        sink.error(codes::SYNTAX_ERROR, Location::NULL, "other");
        assert!(!sink.expected_code_seen());
        sink.error(codes::CIRCULAR_CONSTANT, Location::NULL, "loop");
        assert!(sink.expected_code_seen());
    }

    #[test]
    fn has_code_inspects_report_history() {
        let mut sink = Diagnostics::new();
        sink.error(codes::NAME_EXISTS, Location::NULL, "dup");
        assert!(sink.has_code(codes::NAME_EXISTS));
        assert!(!sink.has_code(codes::TYPE_NOT_FOUND));
    }
}
