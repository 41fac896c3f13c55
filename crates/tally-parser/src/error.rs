//! Parse error types.
//!
//! Errors never halt a parse; they accumulate on the builder in detection
//! order. Only [`Severity::Error`] records make a parse unsuccessful;
//! warnings and deprecation notices ride along.

use crate::span::{SourceLocation, Span};
use std::fmt;

/// How serious an error record is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// A real parse failure; the input could not be fully honored.
    Error,
    /// Suspicious but recoverable input, e.g. a duplicated cost component.
    Warning,
    /// Accepted legacy syntax that tools should flag.
    Deprecation,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Deprecation => write!(f, "deprecated"),
        }
    }
}

/// A parse error with location information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The kind of error.
    pub kind: ParseErrorKind,
    /// Severity class.
    pub severity: Severity,
    /// File and line where the error was detected.
    pub loc: SourceLocation,
    /// The byte span of the offending input.
    pub span: Span,
    /// The source line text, when available.
    pub excerpt: Option<String>,
    /// Optional context message (e.g. the accepted-token set).
    pub context: Option<String>,
}

impl ParseError {
    /// Create an error with the kind's default severity.
    #[must_use]
    pub fn new(kind: ParseErrorKind, loc: SourceLocation, span: Span) -> Self {
        let severity = kind.default_severity();
        Self {
            kind,
            severity,
            loc,
            span,
            excerpt: None,
            context: None,
        }
    }

    /// Override the severity.
    #[must_use]
    pub const fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Attach the offending source line.
    #[must_use]
    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }

    /// Attach a context message.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The rendered message, without location.
    #[must_use]
    pub fn message(&self) -> String {
        format!("{}", self.kind)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.loc, self.severity, self.kind)?;
        if let Some(ctx) = &self.context {
            write!(f, " ({ctx})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Kinds of parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Input the lexer could not recognize.
    InvalidToken(String),
    /// A string literal with no closing quote.
    UnterminatedString,
    /// A date lexeme whose components are out of range.
    InvalidDate(String),
    /// A number literal that does not fit a decimal.
    InvalidNumber(String),
    /// The grammar met a token it cannot shift; carries the token name.
    UnexpectedToken(String),
    /// Input ended inside a production.
    UnexpectedEof,
    /// Division by zero inside a number expression.
    DivisionByZero,
    /// A builder callback signaled failure; carries its message.
    BuildFailure(String),
    /// The same cost component kind was written twice; last one wins.
    DuplicateCostComponent(&'static str),
    /// Accepted legacy syntax.
    Deprecated(&'static str),
    /// `poptag`/`popmeta` without a matching push; carries the name.
    UnmatchedPop(String),
    /// An option name the core does not know.
    UnknownOption(String),
    /// A non-repeatable option set twice.
    DuplicateOption(String),
    /// An option value that does not parse.
    InvalidOptionValue {
        /// Option name.
        option: String,
        /// Offending value.
        value: String,
    },
}

impl ParseErrorKind {
    /// The severity this kind carries unless overridden.
    #[must_use]
    pub const fn default_severity(&self) -> Severity {
        match self {
            Self::InvalidToken(_)
            | Self::UnterminatedString
            | Self::InvalidDate(_)
            | Self::InvalidNumber(_)
            | Self::UnexpectedToken(_)
            | Self::UnexpectedEof
            | Self::DivisionByZero
            | Self::BuildFailure(_) => Severity::Error,
            Self::DuplicateCostComponent(_)
            | Self::UnmatchedPop(_)
            | Self::UnknownOption(_)
            | Self::DuplicateOption(_)
            | Self::InvalidOptionValue { .. } => Severity::Warning,
            Self::Deprecated(_) => Severity::Deprecation,
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidToken(s) => write!(f, "invalid token '{s}'"),
            Self::UnterminatedString => write!(f, "unterminated string literal"),
            Self::InvalidDate(s) => write!(f, "invalid date '{s}'"),
            Self::InvalidNumber(s) => write!(f, "invalid number '{s}'"),
            Self::UnexpectedToken(name) => write!(f, "unexpected token {name}"),
            Self::UnexpectedEof => write!(f, "unexpected end of file"),
            Self::DivisionByZero => write!(f, "division by zero in number expression"),
            Self::BuildFailure(msg) => write!(f, "{msg}"),
            Self::DuplicateCostComponent(kind) => {
                write!(f, "duplicate {kind} in cost specification; keeping the last")
            }
            Self::Deprecated(what) => write!(f, "deprecated syntax: {what}"),
            Self::UnmatchedPop(name) => write!(f, "'{name}' was never pushed"),
            Self::UnknownOption(name) => write!(f, "unknown option \"{name}\""),
            Self::DuplicateOption(name) => {
                write!(f, "option \"{name}\" can only be specified once")
            }
            Self::InvalidOptionValue { option, value } => {
                write!(f, "invalid value \"{value}\" for option \"{option}\"")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::new("ledger.bean", 7)
    }

    #[test]
    fn test_default_severities() {
        assert_eq!(
            ParseErrorKind::UnexpectedEof.default_severity(),
            Severity::Error
        );
        assert_eq!(
            ParseErrorKind::DuplicateCostComponent("date").default_severity(),
            Severity::Warning
        );
        assert_eq!(
            ParseErrorKind::Deprecated("'|' separator").default_severity(),
            Severity::Deprecation
        );
    }

    #[test]
    fn test_display_includes_location() {
        let err = ParseError::new(
            ParseErrorKind::UnexpectedToken("PIPE".into()),
            loc(),
            Span::new(3, 4),
        );
        let rendered = err.to_string();
        assert!(rendered.contains("ledger.bean:7"));
        assert!(rendered.contains("unexpected token PIPE"));
    }

    #[test]
    fn test_with_context_rendered() {
        let err = ParseError::new(
            ParseErrorKind::UnexpectedToken("EQUAL".into()),
            loc(),
            Span::new(0, 1),
        )
        .with_context("expected one of: DATE, OPTION");
        assert!(err.to_string().contains("expected one of: DATE, OPTION"));
    }

    #[test]
    fn test_error_trait_object() {
        let err = ParseError::new(ParseErrorKind::UnterminatedString, loc(), Span::new(0, 1));
        let _: &dyn std::error::Error = &err;
        assert_eq!(err.message(), "unterminated string literal");
    }
}
