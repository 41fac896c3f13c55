//! Core types for tally
//!
//! This crate provides the typed tree a ledger parse produces:
//!
//! - [`Amount`] / [`IncompleteAmount`] - a decimal quantity with a currency,
//!   possibly partial as written
//! - [`CostSpec`] - the `{...}` lot annotation on a posting
//! - [`Directive`] - all dated directive types (Transaction, Balance, Open,
//!   ...)
//! - [`MetaValue`] / [`Metadata`] - polymorphic key-value metadata
//! - [`format_directive`] - a printer whose output re-parses identically
//!
//! # Example
//!
//! ```
//! use tally_core::{Amount, Directive, Posting, Transaction};
//! use rust_decimal_macros::dec;
//! use chrono::NaiveDate;
//!
//! let date = NaiveDate::from_ymd_opt(2014, 3, 1).unwrap();
//! let txn = Transaction::new(date, "Lamb tagine")
//!     .with_payee("Cafe Mogador")
//!     .with_posting(Posting::new(
//!         "Liabilities:CreditCard:CapitalOne",
//!         Amount::new(dec!(-37.45), "USD"),
//!     ))
//!     .with_posting(Posting::auto("Expenses:Restaurant"));
//!
//! let directive = Directive::Transaction(txn);
//! assert_eq!(directive.kind_name(), "transaction");
//! assert_eq!(directive.date(), date);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod amount;
pub mod cost;
pub mod directive;
pub mod format;
pub mod intern;

pub use amount::{Amount, IncompleteAmount};
pub use cost::CostSpec;
pub use directive::{
    Balance, Close, Commodity, Custom, Directive, Document, Event, MetaValue, Metadata, Note,
    Open, Pad, Posting, Price, PriceAnnotation, Query, Transaction,
};
pub use format::{format_directive, FormatConfig};
pub use intern::InternedStr;

// Re-export commonly used external types
pub use chrono::NaiveDate;
pub use rust_decimal::Decimal;
