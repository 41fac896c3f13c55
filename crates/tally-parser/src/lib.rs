//! Ledger-language parser with error recovery and a pluggable builder.
//!
//! This crate turns source text into a stream of [`Directive`]s plus the
//! file-level records (`option`, `include`, `plugin`) and a list of parse
//! errors. Malformed input never aborts the parse: the engine records an
//! error, skips to the next line, and keeps reducing the directives that
//! follow.
//!
//! # Example
//!
//! ```
//! use tally_parser::parse;
//!
//! let source = r#"
//! 2014-03-01 * "Cafe Mogador" "Lamb tagine"
//!   Liabilities:CreditCard:CapitalOne  -37.45 USD
//!   Expenses:Restaurant
//! "#;
//!
//! let result = parse(source);
//! assert!(result.is_success());
//! assert_eq!(result.directives.len(), 1);
//! ```
//!
//! The grammar drives a [`Builder`]: one callback per production, with
//! failures reported as values and captured without unwinding. [`parse`]
//! uses the tree-building [`LedgerBuilder`]; [`parse_with`] accepts any
//! builder implementation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod error;
pub mod lexer;
pub mod options;
mod parser;
pub mod span;

pub use builder::{BuildError, Builder, CompoundAmount, CostComponent, LedgerBuilder, TxnFields};
pub use error::{ParseError, ParseErrorKind, Severity};
pub use options::Options;
pub use span::{Located, LineIndex, SourceLocation, Span};

// Re-export the rounding strategies accepted by `ParseConfig`.
pub use rust_decimal::RoundingStrategy;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tally_core::Directive;
use thiserror::Error;

/// File name used when parsing in-memory text.
const STRING_SOURCE: &str = "<string>";

/// A `plugin` directive: module name plus optional configuration string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSpec {
    /// Plugin module name.
    pub name: String,
    /// Configuration string, when written.
    pub config: Option<String>,
}

/// Everything one parse produces.
#[derive(Debug)]
pub struct ParseResult {
    /// Directives, in source order.
    pub directives: Vec<Located<Directive>>,
    /// Errors, in detection order.
    pub errors: Vec<ParseError>,
    /// Values from `option` directives.
    pub options: Options,
    /// `include` file names, in source order. Resolution is the embedder's
    /// concern.
    pub includes: Vec<Located<String>>,
    /// `plugin` records, in source order.
    pub plugins: Vec<Located<PluginSpec>>,
    /// Whether the parse was cancelled before reaching end of input.
    pub incomplete: bool,
}

impl ParseResult {
    /// Whether the parse completed without error-severity records.
    ///
    /// Warnings and deprecation notices do not fail a parse.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.incomplete
            && self
                .errors
                .iter()
                .all(|e| e.severity != Severity::Error)
    }
}

/// Knobs for one parse.
#[derive(Debug, Clone)]
pub struct ParseConfig {
    /// Rounding applied to inexact division results. Defaults to half-even.
    pub rounding: RoundingStrategy,
    /// Fractional digits inexact division is carried to.
    pub div_scale: u32,
    /// Whether grammar errors list the token set that would have been
    /// accepted.
    pub verbose_errors: bool,
    /// Cooperative cancellation flag, checked at line boundaries.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            rounding: RoundingStrategy::MidpointNearestEven,
            div_scale: 28,
            verbose_errors: false,
            cancel: None,
        }
    }
}

impl ParseConfig {
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Failure to obtain source text. Unlike parse errors, this halts
/// everything: there is nothing to recover into.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The source file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Parse in-memory source text with default configuration.
#[must_use]
pub fn parse(source: &str) -> ParseResult {
    parse_named(source, STRING_SOURCE)
}

/// Parse in-memory source text, reporting locations under `file`.
#[must_use]
pub fn parse_named(source: &str, file: &str) -> ParseResult {
    let config = ParseConfig::default();
    let mut builder = LedgerBuilder::new();
    let incomplete = parse_with(source, file, &config, &mut builder);
    builder.finish(incomplete)
}

/// Read and parse a file.
///
/// I/O failure surfaces immediately as [`LoadError`]; everything after the
/// read goes through the normal error-recovery path.
pub fn parse_file(path: impl AsRef<Path>) -> Result<ParseResult, LoadError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_named(&source, &path.to_string_lossy()))
}

/// Parse with an explicit configuration and builder.
///
/// This is the pluggable entry point: the grammar drives `builder` through
/// the [`Builder`] interface and leaves result extraction to the caller.
/// Returns `true` when the parse was cancelled before end of input.
pub fn parse_with<B: Builder>(
    source: &str,
    file: &str,
    config: &ParseConfig,
    builder: &mut B,
) -> bool {
    let file = if file.is_empty() { STRING_SOURCE } else { file };
    parser::run(source, file, config, builder)
}

/// Parse with a non-default configuration using the tree builder.
#[must_use]
pub fn parse_with_config(source: &str, file: &str, config: &ParseConfig) -> ParseResult {
    let mut builder = LedgerBuilder::new();
    let incomplete = parse_with(source, file, config, &mut builder);
    builder.finish(incomplete)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        let result = parse("");
        assert!(result.directives.is_empty());
        assert!(result.errors.is_empty());
        assert!(result.is_success());
    }

    #[test]
    fn test_comments_and_blank_lines_only() {
        let result = parse("; a comment\n\n   \n; another\n");
        assert!(result.directives.is_empty());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_empty_file_name_replaced() {
        let result = parse_named("2014-01-01 open Assets:Cash:Box\n", "");
        assert_eq!(result.directives[0].loc.file.as_str(), "<string>");
    }

    #[test]
    fn test_cancellation_flags_incomplete() {
        let cancel = Arc::new(AtomicBool::new(true));
        let config = ParseConfig {
            cancel: Some(cancel),
            ..ParseConfig::default()
        };
        let result = parse_with_config("2014-01-01 open Assets:Cash:Box\n", "x.bean", &config);
        assert!(result.incomplete);
        assert!(result.directives.is_empty());
        assert!(!result.is_success());
    }

    #[test]
    fn test_parse_file_missing_path_is_io_error() {
        let err = parse_file("/definitely/not/here.bean").unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
