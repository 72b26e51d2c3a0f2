//! Shared diagnostic channel for the whole compilation pipeline.
//!
//! Every component (preprocessor, parser, loader, semantic analyzer, code
//! generator) appends to a single [`DiagnosticSink`] instead of failing
//! fast. This lets a single run surface as many problems as possible, and
//! lets the driver decide, at each stage boundary, whether it is safe to
//! continue (see `Diagnostic::hasErrors` semantics in spec, mirrored here
//! as [`DiagnosticSink::has_errors`]).
use std::fmt::Display;

use serde::Serialize;

/// Severity of a single diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        })
    }
}

/// A single diagnostic record.
///
/// `line` is 1-based, `column` is 0-based, matching the position convention
/// used throughout the AST (see [`crate::ast::Position`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub code: &'static str,
    pub file_path: Option<String>,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        code: &'static str,
        message: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            line,
            column,
            code,
            file_path: None,
        }
    }

    pub fn error(code: &'static str, message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::new(Severity::Error, code, message, line, column)
    }

    pub fn warning(code: &'static str, message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::new(Severity::Warning, code, message, line, column)
    }

    pub fn info(code: &'static str, message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::new(Severity::Info, code, message, line, column)
    }

    pub fn with_file(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = self.file_path.as_deref().unwrap_or("<unknown>");
        write!(
            f,
            "{path}:{line}:{col} [{code}] {message}",
            path = path,
            line = self.line,
            col = self.column,
            code = self.code,
            message = self.message
        )
    }
}

/// Append-only collector of [`Diagnostic`] records.
///
/// This is the sole piece of mutable state shared across pipeline stages
/// (spec §5). Every component only ever pushes; nothing is ever removed or
/// reordered, so diagnostic order always matches AST traversal order.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    file_path: Option<String>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that stamps every diagnostic pushed through it with `file_path`.
    pub fn for_file(file_path: impl Into<String>) -> Self {
        Self {
            diagnostics: vec![],
            file_path: Some(file_path.into()),
        }
    }

    pub fn push(&mut self, mut diagnostic: Diagnostic) {
        if diagnostic.file_path.is_none() {
            diagnostic.file_path = self.file_path.clone();
        }
        log::debug!("diagnostic: {diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    pub fn error(&mut self, code: &'static str, message: impl Into<String>, line: usize, column: usize) {
        self.push(Diagnostic::error(code, message, line, column));
    }

    pub fn warning(&mut self, code: &'static str, message: impl Into<String>, line: usize, column: usize) {
        self.push(Diagnostic::warning(code, message, line, column));
    }

    pub fn info(&mut self, code: &'static str, message: impl Into<String>, line: usize, column: usize) {
        self.push(Diagnostic::info(code, message, line, column));
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn extend(&mut self, other: DiagnosticSink) {
        for diagnostic in other.diagnostics {
            self.push(diagnostic);
        }
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Diagnostic codes used across the pipeline. Kept centralized so callers
/// can match on them without depending on string literals scattered
/// throughout the codebase.
pub mod codes {
    pub const LEX_ERROR: &str = "E000";
    pub const PARSE_ERROR: &str = "E001";
    pub const PREPROCESSOR_ERROR: &str = "E010";
    pub const DUPLICATE_DECLARATION: &str = "E100";
    pub const UNKNOWN_IMPORT: &str = "E101";
    pub const PRIVATE_IMPORT: &str = "E102";
    pub const CIRCULAR_IMPORT: &str = "E103";
    pub const UNKNOWN_VARIANT: &str = "E104";
    pub const MISSING_FIELD: &str = "E105";
    pub const UNKNOWN_FIELD: &str = "E106";
    pub const UNKNOWN_IDENTIFIER: &str = "E107";
    pub const UNDEFINED_FUNCTION: &str = "E108";
    pub const TYPE_MISMATCH: &str = "E200";
    pub const IMMUTABLE_ASSIGNMENT: &str = "E201";
    pub const INVALID_CAST: &str = "E202";
    pub const INVALID_PIPE: &str = "E203";
    pub const INVALID_DISPATCH: &str = "E204";
    pub const INVALID_MAIN_SIGNATURE: &str = "E205";
    pub const BREAK_CONTINUE_OUTSIDE_LOOP: &str = "E206";
    pub const PUBLIC_NON_CONST: &str = "E207";
    pub const UNSUPPORTED_CONSTRUCT: &str = "E300";
    pub const NULLABILITY_WARNING: &str = "W100";
    pub const CONDITION_NOT_BOOL: &str = "W101";
    pub const REDUNDANT_COALESCE: &str = "W102";
    pub const SUSPICIOUS_SH_INTERPOLATION: &str = "SuspiciousShInterpolation";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_errors_only_true_with_error_severity() {
        let mut sink = DiagnosticSink::new();
        sink.warning(codes::CONDITION_NOT_BOOL, "not bool", 1, 0);
        assert!(!sink.has_errors());
        sink.error(codes::TYPE_MISMATCH, "mismatch", 2, 0);
        assert!(sink.has_errors());
    }

    #[test]
    fn display_matches_filepath_line_col_code_message() {
        let diagnostic = Diagnostic::error(codes::TYPE_MISMATCH, "bad type", 4, 2).with_file("a.bsh");
        assert_eq!(diagnostic.to_string(), "a.bsh:4:2 [E200] bad type");
    }

    #[test]
    fn sink_stamps_file_path_when_missing() {
        let mut sink = DiagnosticSink::for_file("mod.bsh");
        sink.error(codes::PARSE_ERROR, "oops", 1, 1);
        assert_eq!(sink.diagnostics()[0].file_path.as_deref(), Some("mod.bsh"));
    }
}
