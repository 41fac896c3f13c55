//! Directive pretty-printer.
//!
//! Renders directives back to ledger syntax. The output re-parses to the
//! same tree, which is what the round-trip tests rely on.

use crate::{Directive, IncompleteAmount, MetaValue, Metadata, Posting, Transaction};
use std::fmt::Write;

/// Printer configuration.
#[derive(Debug, Clone)]
pub struct FormatConfig {
    /// Column the units number is right-aligned toward (default: 60).
    pub amount_column: usize,
    /// Indentation for postings and directive metadata.
    pub indent: String,
    /// Indentation for posting metadata.
    pub meta_indent: String,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            amount_column: 60,
            indent: "  ".to_string(),
            meta_indent: "    ".to_string(),
        }
    }
}

impl FormatConfig {
    /// Config with a custom alignment column.
    #[must_use]
    pub fn with_column(column: usize) -> Self {
        Self {
            amount_column: column,
            ..Default::default()
        }
    }
}

/// Render a directive, including its metadata and postings, with a trailing
/// newline after every line.
#[must_use]
pub fn format_directive(directive: &Directive, config: &FormatConfig) -> String {
    match directive {
        Directive::Transaction(txn) => format_transaction(txn, config),
        Directive::Balance(bal) => format_dated_line(&bal.to_string(), &bal.meta, config),
        Directive::Open(open) => format_dated_line(&open.to_string(), &open.meta, config),
        Directive::Close(close) => format_dated_line(&close.to_string(), &close.meta, config),
        Directive::Commodity(comm) => format_dated_line(&comm.to_string(), &comm.meta, config),
        Directive::Pad(pad) => format_dated_line(&pad.to_string(), &pad.meta, config),
        Directive::Price(price) => format_dated_line(&price.to_string(), &price.meta, config),
        Directive::Event(event) => format_dated_line(&event.to_string(), &event.meta, config),
        Directive::Note(note) => format_dated_line(&note.to_string(), &note.meta, config),
        Directive::Document(doc) => format_dated_line(&doc.to_string(), &doc.meta, config),
        Directive::Query(query) => format_dated_line(&query.to_string(), &query.meta, config),
        Directive::Custom(custom) => format_dated_line(&custom.to_string(), &custom.meta, config),
    }
}

fn format_dated_line(head: &str, meta: &Metadata, config: &FormatConfig) -> String {
    let mut out = String::new();
    out.push_str(head);
    out.push('\n');
    write_meta(&mut out, meta, &config.indent);
    out
}

fn format_transaction(txn: &Transaction, config: &FormatConfig) -> String {
    let mut out = String::new();
    write!(out, "{} {}", txn.date, txn.flag).unwrap();
    if let Some(payee) = &txn.payee {
        write!(out, " \"{}\"", escape_string(payee)).unwrap();
    }
    write!(out, " \"{}\"", escape_string(&txn.narration)).unwrap();
    for tag in &txn.tags {
        write!(out, " #{tag}").unwrap();
    }
    for link in &txn.links {
        write!(out, " ^{link}").unwrap();
    }
    out.push('\n');

    write_meta(&mut out, &txn.meta, &config.indent);

    for posting in &txn.postings {
        out.push_str(&format_posting(posting, config));
        out.push('\n');
        write_meta(&mut out, &posting.meta, &config.meta_indent);
    }
    out
}

/// Render one posting line, right-aligning the units number toward the
/// configured column.
fn format_posting(posting: &Posting, config: &FormatConfig) -> String {
    let mut line = String::new();
    line.push_str(&config.indent);
    if let Some(flag) = posting.flag {
        write!(line, "{flag} ").unwrap();
    }
    line.push_str(&posting.account);

    let mut tail = String::new();
    if let Some(units) = &posting.units {
        tail.push_str(&units.to_string());
    }
    if let Some(cost) = &posting.cost {
        if !tail.is_empty() {
            tail.push(' ');
        }
        write!(tail, "{cost}").unwrap();
    }
    if let Some(price) = &posting.price {
        if !tail.is_empty() {
            tail.push(' ');
        }
        write!(tail, "{price}").unwrap();
    }
    if tail.is_empty() {
        return line;
    }

    let number_width = posting
        .units
        .as_ref()
        .and_then(IncompleteAmount::number)
        .map_or(0, |n| n.to_string().len());
    let target = config.amount_column.saturating_sub(number_width);
    if line.len() + 2 < target {
        for _ in line.len()..target {
            line.push(' ');
        }
    } else {
        line.push_str("  ");
    }
    line.push_str(&tail);
    line
}

fn write_meta(out: &mut String, meta: &Metadata, indent: &str) {
    for (key, value) in meta {
        match value {
            MetaValue::None => writeln!(out, "{indent}{key}:").unwrap(),
            MetaValue::String(s) => {
                writeln!(out, "{indent}{key}: \"{}\"", escape_string(s)).unwrap();
            }
            other => writeln!(out, "{indent}{key}: {other}").unwrap(),
        }
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}
