//! pyblocks Error Handling - Unified Diagnostic API
//!
//! Every failure in the crate is an [`EditorError`]: what went wrong
//! ([`ErrorKind`]), where it happened ([`SourceInfo`]) and how to help
//! ([`DiagnosticInfo`]). Errors render through miette with labelled spans.

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::syntax::Span;

// ============================================================================
// SOURCE CONTEXT - Error reporting infrastructure
// ============================================================================

/// Named source text that errors point into.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    /// Create a source context from real file or editor content
    pub fn from_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Create a fallback when real source is unavailable
    pub fn fallback(context: &str) -> Self {
        Self {
            name: "fallback".to_string(),
            content: format!("# {}", context),
        }
    }

    /// Convert to NamedSource for use with miette error reporting
    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }
}

impl Default for SourceContext {
    fn default() -> Self {
        Self::fallback("default context")
    }
}

// ============================================================================
// ERROR TYPES
// ============================================================================

/// The single error type
#[derive(Debug)]
pub struct EditorError {
    /// What went wrong
    pub kind: ErrorKind,
    /// Where it happened
    pub source_info: SourceInfo,
    /// How to help
    pub diagnostic_info: DiagnosticInfo,
}

/// All error kinds, grouped by [`ErrorCategory`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    // Parse errors - the source could not be turned into a syntax tree
    #[error("Parse error: invalid syntax in {construct}")]
    MalformedConstruct { construct: String },
    #[error("Parse error: '{bracket}' was never closed")]
    UnclosedBracket { bracket: char },
    #[error("Parse error: unmatched '{bracket}'")]
    UnmatchedBracket { bracket: char },
    #[error("Parse error: closing '{found}' does not match '{expected}'")]
    MismatchedBracket { expected: char, found: char },
    #[error("Parse error: unterminated string literal")]
    UnterminatedString,
    #[error("Parse error: unexpected indent")]
    UnexpectedIndent,
    #[error("Parse error: unindent does not match any outer indentation level")]
    InconsistentDedent,
    #[error("Parse error: expected an indented block after '{header}'")]
    ExpectedBlock { header: String },
    #[error("Parse error: '{clause}' without a preceding '{expected}'")]
    DanglingClause { clause: String, expected: String },
    #[error("Parse error: cannot assign to {target}")]
    InvalidTarget { target: String },
    #[error("Parse error: invalid {literal_type} '{value}'")]
    InvalidLiteral { literal_type: String, value: String },
    #[error("Parse error: too many nested brackets (limit is {limit})")]
    NestingTooDeep { limit: usize },

    // Runtime errors - the program failed while executing
    #[error("NameError: name '{name}' is not defined")]
    UndefinedName { name: String },
    #[error("TypeError: {message}")]
    TypeMismatch { message: String },
    #[error("ZeroDivisionError: {message}")]
    ZeroDivision { message: String },
    #[error("IndexError: {message}")]
    IndexOutOfRange { message: String },
    #[error("ValueError: {message}")]
    InvalidValue { message: String },
    #[error("OverflowError: integer result out of range")]
    Overflow,
    #[error("AssertionError: {message}")]
    AssertionFailed { message: String },
    #[error("SyntaxError: '{keyword}' outside loop")]
    OutsideLoop { keyword: String },
    #[error("Runtime error: '{construct}' is not supported by the interpreter")]
    Unsupported { construct: String },
    #[error("Runtime error: run cancelled")]
    Cancelled,

    // Session errors - editor state machine violations
    #[error("Session error: a run is already in progress")]
    RunInProgress,
    #[error("Session error: unknown block type '{kind}'")]
    UnknownBlockType { kind: String },
    #[error("Session error: block '{kind}' has no {slot_kind} named '{name}'")]
    UnknownSlot {
        kind: String,
        slot_kind: String,
        name: String,
    },
    #[error("Session error: invalid block document: {message}")]
    InvalidDocument { message: String },
    #[error("Session error: cannot read '{path}': {message}")]
    FileRead { path: String, message: String },
}

/// Context-specific source information
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Arc<NamedSource<String>>,
    pub primary_span: SourceSpan,
    pub phase: String,
}

/// Diagnostic enhancement data
#[derive(Debug, Clone)]
pub struct DiagnosticInfo {
    pub help: Option<String>,
    pub error_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Parse,
    Runtime,
    Session,
}

impl ErrorKind {
    /// Get the error category for test assertions
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedConstruct { .. }
            | Self::UnclosedBracket { .. }
            | Self::UnmatchedBracket { .. }
            | Self::MismatchedBracket { .. }
            | Self::UnterminatedString
            | Self::UnexpectedIndent
            | Self::InconsistentDedent
            | Self::ExpectedBlock { .. }
            | Self::DanglingClause { .. }
            | Self::InvalidTarget { .. }
            | Self::InvalidLiteral { .. }
            | Self::NestingTooDeep { .. } => ErrorCategory::Parse,

            Self::UndefinedName { .. }
            | Self::TypeMismatch { .. }
            | Self::ZeroDivision { .. }
            | Self::IndexOutOfRange { .. }
            | Self::InvalidValue { .. }
            | Self::Overflow
            | Self::AssertionFailed { .. }
            | Self::OutsideLoop { .. }
            | Self::Unsupported { .. }
            | Self::Cancelled => ErrorCategory::Runtime,

            Self::RunInProgress
            | Self::UnknownBlockType { .. }
            | Self::UnknownSlot { .. }
            | Self::InvalidDocument { .. }
            | Self::FileRead { .. } => ErrorCategory::Session,
        }
    }

    /// Get error code suffix for diagnostic codes
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::MalformedConstruct { .. } => "malformed_construct",
            Self::UnclosedBracket { .. } => "unclosed_bracket",
            Self::UnmatchedBracket { .. } => "unmatched_bracket",
            Self::MismatchedBracket { .. } => "mismatched_bracket",
            Self::UnterminatedString => "unterminated_string",
            Self::UnexpectedIndent => "unexpected_indent",
            Self::InconsistentDedent => "inconsistent_dedent",
            Self::ExpectedBlock { .. } => "expected_block",
            Self::DanglingClause { .. } => "dangling_clause",
            Self::InvalidTarget { .. } => "invalid_target",
            Self::InvalidLiteral { .. } => "invalid_literal",
            Self::NestingTooDeep { .. } => "nesting_too_deep",
            Self::UndefinedName { .. } => "undefined_name",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::ZeroDivision { .. } => "zero_division",
            Self::IndexOutOfRange { .. } => "index_out_of_range",
            Self::InvalidValue { .. } => "invalid_value",
            Self::Overflow => "overflow",
            Self::AssertionFailed { .. } => "assertion_failed",
            Self::OutsideLoop { .. } => "outside_loop",
            Self::Unsupported { .. } => "unsupported",
            Self::Cancelled => "cancelled",
            Self::RunInProgress => "run_in_progress",
            Self::UnknownBlockType { .. } => "unknown_block_type",
            Self::UnknownSlot { .. } => "unknown_slot",
            Self::InvalidDocument { .. } => "invalid_document",
            Self::FileRead { .. } => "file_read",
        }
    }
}

impl EditorError {
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Attach a help message to an already built error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.diagnostic_info.help = Some(help.into());
        self
    }

    fn primary_label(&self) -> String {
        match &self.kind {
            ErrorKind::MalformedConstruct { .. } => "invalid syntax".into(),
            ErrorKind::UnclosedBracket { .. } => "opened here".into(),
            ErrorKind::UnmatchedBracket { .. } => "no matching opener".into(),
            ErrorKind::MismatchedBracket { .. } => "mismatched bracket".into(),
            ErrorKind::UnterminatedString => "string starts here".into(),
            ErrorKind::UnexpectedIndent => "unexpected indent".into(),
            ErrorKind::InconsistentDedent => "inconsistent dedent".into(),
            ErrorKind::ExpectedBlock { .. } => "block expected after this".into(),
            ErrorKind::DanglingClause { .. } => "dangling clause".into(),
            ErrorKind::InvalidTarget { .. } => "invalid target".into(),
            ErrorKind::InvalidLiteral { .. } => "invalid literal".into(),
            ErrorKind::NestingTooDeep { .. } => "nested too deeply".into(),
            ErrorKind::UndefinedName { .. } => "undefined name".into(),
            ErrorKind::TypeMismatch { .. } => "type mismatch".into(),
            ErrorKind::ZeroDivision { .. } => "division by zero".into(),
            ErrorKind::IndexOutOfRange { .. } => "index out of range".into(),
            ErrorKind::InvalidValue { .. } => "invalid value".into(),
            ErrorKind::Overflow => "overflow".into(),
            ErrorKind::AssertionFailed { .. } => "assertion failed here".into(),
            ErrorKind::OutsideLoop { .. } => "not inside a loop".into(),
            ErrorKind::Unsupported { .. } => "unsupported here".into(),
            ErrorKind::Cancelled => "cancelled here".into(),
            ErrorKind::RunInProgress => "run in progress".into(),
            ErrorKind::UnknownBlockType { .. } => "unknown block".into(),
            ErrorKind::UnknownSlot { .. } => "unknown slot".into(),
            ErrorKind::InvalidDocument { .. } => "invalid document".into(),
            ErrorKind::FileRead { .. } => "unreadable".into(),
        }
    }
}

impl std::error::Error for EditorError {}

impl fmt::Display for EditorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl Diagnostic for EditorError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.diagnostic_info.error_code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diagnostic_info
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.primary_label()),
            self.source_info.primary_span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.source_info.source)
    }
}

// ============================================================================
// ERROR CONSTRUCTION
// ============================================================================

/// Context-aware error creation - each context knows how to create appropriate errors
pub trait ErrorReporting {
    /// Create an error with context-appropriate enhancements
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> EditorError;

    fn malformed(&self, construct: &str, span: SourceSpan) -> EditorError {
        self.report(
            ErrorKind::MalformedConstruct {
                construct: construct.into(),
            },
            span,
        )
    }

    fn type_mismatch(&self, message: impl Into<String>, span: SourceSpan) -> EditorError {
        self.report(
            ErrorKind::TypeMismatch {
                message: message.into(),
            },
            span,
        )
    }

    fn unsupported(&self, construct: &str, span: SourceSpan) -> EditorError {
        self.report(
            ErrorKind::Unsupported {
                construct: construct.into(),
            },
            span,
        )
    }

    /// Internal errors indicate bugs in the crate, not in the user's program.
    fn internal_error(&self, message: &str, span: SourceSpan) -> EditorError {
        self.malformed(&format!("INTERNAL ERROR: {}", message), span)
            .with_help("This is an internal pyblocks error. Please report this as a bug.")
    }
}

/// General-purpose error creation context: a source plus the phase name used
/// in error codes (`pyblocks::<phase>::<kind>`).
#[derive(Debug, Clone)]
pub struct DiagnosticContext {
    pub source: SourceContext,
    pub phase: String,
}

impl DiagnosticContext {
    pub fn new(source: SourceContext, phase: impl Into<String>) -> Self {
        Self {
            source,
            phase: phase.into(),
        }
    }
}

impl ErrorReporting for DiagnosticContext {
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> EditorError {
        let error_code = format!("pyblocks::{}::{}", self.phase, kind.code_suffix());

        EditorError {
            kind,
            source_info: SourceInfo {
                source: self.source.to_named_source(),
                primary_span: span,
                phase: self.phase.clone(),
            },
            diagnostic_info: DiagnosticInfo {
                help: None,
                error_code,
            },
        }
    }
}

/// Creates a placeholder span for errors not tied to a source location.
pub fn unspanned() -> SourceSpan {
    SourceSpan::from(0..0)
}

/// Converts a syntax tree span to a miette SourceSpan.
pub fn to_source_span(span: Span) -> SourceSpan {
    SourceSpan::from(span.start..span.end)
}

// ============================================================================
// ERROR FORMATTING UTILITIES
// ============================================================================

/// Prints an EditorError with full miette diagnostics to stderr.
pub fn print_error(error: EditorError) {
    use miette::Report;
    let report = Report::new(error);
    eprintln!("{report:?}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_builds_phase_scoped_code() {
        let ctx = DiagnosticContext::new(SourceContext::from_file("t.py", "x ="), "parse");
        let err = ctx.malformed("statement", SourceSpan::from(0..3));
        assert_eq!(err.diagnostic_info.error_code, "pyblocks::parse::malformed_construct");
        assert_eq!(err.category(), ErrorCategory::Parse);
        assert_eq!(err.to_string(), "Parse error: invalid syntax in statement");
    }

    #[test]
    fn runtime_and_session_categories() {
        assert_eq!(ErrorKind::Cancelled.category(), ErrorCategory::Runtime);
        assert_eq!(ErrorKind::RunInProgress.category(), ErrorCategory::Session);
    }
}
