//! The directive tree produced by the parser.
//!
//! A ledger file is a sequence of dated directives:
//!
//! - [`Transaction`] - postings moving value between accounts
//! - [`Balance`] - assertion that an account holds a given amount
//! - [`Open`] / [`Close`] - account lifecycle
//! - [`Commodity`] - currency declaration
//! - [`Pad`] - automatic balancing entry against another account
//! - [`Price`] - observed price of one currency in another
//! - [`Event`] - dated name/value observation
//! - [`Note`] / [`Document`] - annotations attached to an account
//! - [`Query`] - named stored query
//! - [`Custom`] - extension directive with free-form values
//!
//! Undated records (`option`, `include`, `plugin`, `pushtag`, `poptag`) are
//! not part of this enum; the parser surfaces them on its result type.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::{Amount, CostSpec, IncompleteAmount};

/// A metadata value.
///
/// Metadata values inhabit a small closed set of kinds; `key:` with nothing
/// after it yields [`MetaValue::None`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaValue {
    /// Quoted string.
    String(String),
    /// Account name.
    Account(String),
    /// Currency code.
    Currency(String),
    /// `#tag` reference.
    Tag(String),
    /// `^link` reference.
    Link(String),
    /// Calendar date.
    Date(NaiveDate),
    /// Bare number.
    Number(Decimal),
    /// Boolean (`TRUE` / `FALSE`).
    Bool(bool),
    /// Number with a currency.
    Amount(Amount),
    /// Key written with no value.
    None,
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Account(a) => write!(f, "{a}"),
            Self::Currency(c) => write!(f, "{c}"),
            Self::Tag(t) => write!(f, "#{t}"),
            Self::Link(l) => write!(f, "^{l}"),
            Self::Date(d) => write!(f, "{d}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Self::Amount(a) => write!(f, "{a}"),
            Self::None => Ok(()),
        }
    }
}

/// Key-value metadata attached to directives and postings.
pub type Metadata = HashMap<String, MetaValue>;

/// One leg of a [`Transaction`].
///
/// Fields follow the order they are written on a posting line:
/// `[flag] account [units [cost] [price]]`, with metadata on the lines
/// after. When `units` is `None` the posting is an interpolation
/// placeholder: the ledger engine computes its amount from the rest of the
/// transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Per-posting flag.
    pub flag: Option<char>,
    /// The account receiving this leg.
    pub account: String,
    /// Units as written, possibly partial.
    pub units: Option<IncompleteAmount>,
    /// Lot attributes, from `{...}` or `{{...}}`.
    pub cost: Option<CostSpec>,
    /// Price annotation, from `@` or `@@`.
    pub price: Option<PriceAnnotation>,
    /// Posting metadata.
    pub meta: Metadata,
}

impl Posting {
    /// Create a posting with complete units.
    #[must_use]
    pub fn new(account: impl Into<String>, units: Amount) -> Self {
        Self {
            flag: None,
            account: account.into(),
            units: Some(IncompleteAmount::Complete(units)),
            cost: None,
            price: None,
            meta: Metadata::new(),
        }
    }

    /// Create an interpolation placeholder (no units written).
    #[must_use]
    pub fn auto(account: impl Into<String>) -> Self {
        Self {
            flag: None,
            account: account.into(),
            units: None,
            cost: None,
            price: None,
            meta: Metadata::new(),
        }
    }

    /// The complete amount, when both components were written.
    #[must_use]
    pub fn amount(&self) -> Option<&Amount> {
        self.units.as_ref().and_then(IncompleteAmount::as_amount)
    }

    /// Attach a cost spec.
    #[must_use]
    pub fn with_cost(mut self, cost: CostSpec) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Attach a price annotation.
    #[must_use]
    pub fn with_price(mut self, price: PriceAnnotation) -> Self {
        self.price = Some(price);
        self
    }

    /// Attach a flag.
    #[must_use]
    pub const fn with_flag(mut self, flag: char) -> Self {
        self.flag = Some(flag);
        self
    }
}

impl fmt::Display for Posting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  ")?;
        if let Some(flag) = self.flag {
            write!(f, "{flag} ")?;
        }
        write!(f, "{}", self.account)?;
        if let Some(units) = &self.units {
            write!(f, "  {units}")?;
        }
        if let Some(cost) = &self.cost {
            write!(f, " {cost}")?;
        }
        if let Some(price) = &self.price {
            write!(f, " {price}")?;
        }
        Ok(())
    }
}

/// `@` / `@@` price annotation on a posting.
///
/// Like units, the annotated amount may be partial or absent entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceAnnotation {
    /// Per-unit price (`@`).
    Unit(IncompleteAmount),
    /// Total price (`@@`).
    Total(IncompleteAmount),
    /// `@` with nothing after it.
    UnitEmpty,
    /// `@@` with nothing after it.
    TotalEmpty,
}

impl PriceAnnotation {
    /// Whether this is the per-unit (`@`) form.
    #[must_use]
    pub const fn is_unit(&self) -> bool {
        matches!(self, Self::Unit(_) | Self::UnitEmpty)
    }

    /// The complete amount, when one was written.
    #[must_use]
    pub const fn amount(&self) -> Option<&Amount> {
        match self {
            Self::Unit(ia) | Self::Total(ia) => ia.as_amount(),
            Self::UnitEmpty | Self::TotalEmpty => None,
        }
    }
}

impl fmt::Display for PriceAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit(ia) => write!(f, "@ {ia}"),
            Self::Total(ia) => write!(f, "@@ {ia}"),
            Self::UnitEmpty => write!(f, "@"),
            Self::TotalEmpty => write!(f, "@@"),
        }
    }
}

/// Any dated directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directive {
    /// Value movement between accounts.
    Transaction(Transaction),
    /// Balance assertion.
    Balance(Balance),
    /// Account opening.
    Open(Open),
    /// Account closing.
    Close(Close),
    /// Currency declaration.
    Commodity(Commodity),
    /// Automatic balancing entry.
    Pad(Pad),
    /// Price observation.
    Price(Price),
    /// Dated name/value observation.
    Event(Event),
    /// Account annotation.
    Note(Note),
    /// Document attachment.
    Document(Document),
    /// Named stored query.
    Query(Query),
    /// Extension directive.
    Custom(Custom),
}

impl Directive {
    /// The directive's date.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        match self {
            Self::Transaction(t) => t.date,
            Self::Balance(b) => b.date,
            Self::Open(o) => o.date,
            Self::Close(c) => c.date,
            Self::Commodity(c) => c.date,
            Self::Pad(p) => p.date,
            Self::Price(p) => p.date,
            Self::Event(e) => e.date,
            Self::Note(n) => n.date,
            Self::Document(d) => d.date,
            Self::Query(q) => q.date,
            Self::Custom(c) => c.date,
        }
    }

    /// Borrow the directive's metadata.
    #[must_use]
    pub const fn meta(&self) -> &Metadata {
        match self {
            Self::Transaction(t) => &t.meta,
            Self::Balance(b) => &b.meta,
            Self::Open(o) => &o.meta,
            Self::Close(c) => &c.meta,
            Self::Commodity(c) => &c.meta,
            Self::Pad(p) => &p.meta,
            Self::Price(p) => &p.meta,
            Self::Event(e) => &e.meta,
            Self::Note(n) => &n.meta,
            Self::Document(d) => &d.meta,
            Self::Query(q) => &q.meta,
            Self::Custom(c) => &c.meta,
        }
    }

    /// Mutably borrow the directive's metadata.
    pub fn meta_mut(&mut self) -> &mut Metadata {
        match self {
            Self::Transaction(t) => &mut t.meta,
            Self::Balance(b) => &mut b.meta,
            Self::Open(o) => &mut o.meta,
            Self::Close(c) => &mut c.meta,
            Self::Commodity(c) => &mut c.meta,
            Self::Pad(p) => &mut p.meta,
            Self::Price(p) => &mut p.meta,
            Self::Event(e) => &mut e.meta,
            Self::Note(n) => &mut n.meta,
            Self::Document(d) => &mut d.meta,
            Self::Query(q) => &mut q.meta,
            Self::Custom(c) => &mut c.meta,
        }
    }

    /// Borrow as a transaction, if this is one.
    #[must_use]
    pub const fn as_transaction(&self) -> Option<&Transaction> {
        match self {
            Self::Transaction(t) => Some(t),
            _ => None,
        }
    }

    /// A short name for the directive kind.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Transaction(_) => "transaction",
            Self::Balance(_) => "balance",
            Self::Open(_) => "open",
            Self::Close(_) => "close",
            Self::Commodity(_) => "commodity",
            Self::Pad(_) => "pad",
            Self::Price(_) => "price",
            Self::Event(_) => "event",
            Self::Note(_) => "note",
            Self::Document(_) => "document",
            Self::Query(_) => "query",
            Self::Custom(_) => "custom",
        }
    }
}

/// A transaction: flag, optional payee, narration, tags, links, postings.
///
/// `tags` and `links` behave as sets: each name appears at most once, in
/// first-written order, with pushed tags merged in behind the explicit
/// ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction date.
    pub date: NaiveDate,
    /// Status flag (`*`, `!`, ...).
    pub flag: char,
    /// Payee, when two header strings were written.
    pub payee: Option<String>,
    /// Narration.
    pub narration: String,
    /// Tags, explicit plus any pushed via the tag context.
    pub tags: Vec<String>,
    /// Links.
    pub links: Vec<String>,
    /// Postings, in source order. Empty is allowed at parse time.
    pub postings: Vec<Posting>,
    /// Transaction metadata.
    pub meta: Metadata,
}

impl Transaction {
    /// Create a transaction with flag `*` and no postings.
    #[must_use]
    pub fn new(date: NaiveDate, narration: impl Into<String>) -> Self {
        Self {
            date,
            flag: '*',
            payee: None,
            narration: narration.into(),
            tags: Vec::new(),
            links: Vec::new(),
            postings: Vec::new(),
            meta: Metadata::new(),
        }
    }

    /// Set the flag.
    #[must_use]
    pub const fn with_flag(mut self, flag: char) -> Self {
        self.flag = flag;
        self
    }

    /// Set the payee.
    #[must_use]
    pub fn with_payee(mut self, payee: impl Into<String>) -> Self {
        self.payee = Some(payee.into());
        self
    }

    /// Append a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Append a link.
    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.links.push(link.into());
        self
    }

    /// Append a posting.
    #[must_use]
    pub fn with_posting(mut self, posting: Posting) -> Self {
        self.postings.push(posting);
        self
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.flag)?;
        if let Some(payee) = &self.payee {
            write!(f, " \"{payee}\"")?;
        }
        write!(f, " \"{}\"", self.narration)?;
        for tag in &self.tags {
            write!(f, " #{tag}")?;
        }
        for link in &self.links {
            write!(f, " ^{link}")?;
        }
        for posting in &self.postings {
            write!(f, "\n{posting}")?;
        }
        Ok(())
    }
}

/// A balance assertion, with optional explicit tolerance (`~`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Assertion date.
    pub date: NaiveDate,
    /// Account asserted on.
    pub account: String,
    /// Expected amount.
    pub amount: Amount,
    /// Explicit tolerance, when written.
    pub tolerance: Option<Decimal>,
    /// Metadata.
    pub meta: Metadata,
}

impl Balance {
    /// Create a balance assertion without explicit tolerance.
    #[must_use]
    pub fn new(date: NaiveDate, account: impl Into<String>, amount: Amount) -> Self {
        Self {
            date,
            account: account.into(),
            amount,
            tolerance: None,
            meta: Metadata::new(),
        }
    }

    /// Set the explicit tolerance.
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: Decimal) -> Self {
        self.tolerance = Some(tolerance);
        self
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} balance {} ", self.date, self.account)?;
        write!(f, "{}", self.amount.number)?;
        if let Some(tol) = self.tolerance {
            write!(f, " ~ {tol}")?;
        }
        write!(f, " {}", self.amount.currency)
    }
}

/// An account opening, with optional currency constraint and booking method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Open {
    /// Opening date.
    pub date: NaiveDate,
    /// Account being opened.
    pub account: String,
    /// Currencies the account is constrained to; empty means unconstrained.
    pub currencies: Vec<String>,
    /// Booking method string, when written.
    pub booking: Option<String>,
    /// Metadata.
    pub meta: Metadata,
}

impl Open {
    /// Create an unconstrained open directive.
    #[must_use]
    pub fn new(date: NaiveDate, account: impl Into<String>) -> Self {
        Self {
            date,
            account: account.into(),
            currencies: Vec::new(),
            booking: None,
            meta: Metadata::new(),
        }
    }

    /// Set the currency constraint.
    #[must_use]
    pub fn with_currencies(mut self, currencies: Vec<String>) -> Self {
        self.currencies = currencies;
        self
    }

    /// Set the booking method.
    #[must_use]
    pub fn with_booking(mut self, booking: impl Into<String>) -> Self {
        self.booking = Some(booking.into());
        self
    }
}

impl fmt::Display for Open {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} open {}", self.date, self.account)?;
        if !self.currencies.is_empty() {
            write!(f, " {}", self.currencies.join(","))?;
        }
        if let Some(booking) = &self.booking {
            write!(f, " \"{booking}\"")?;
        }
        Ok(())
    }
}

/// An account closing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Close {
    /// Closing date.
    pub date: NaiveDate,
    /// Account being closed.
    pub account: String,
    /// Metadata.
    pub meta: Metadata,
}

impl Close {
    /// Create a close directive.
    #[must_use]
    pub fn new(date: NaiveDate, account: impl Into<String>) -> Self {
        Self {
            date,
            account: account.into(),
            meta: Metadata::new(),
        }
    }
}

impl fmt::Display for Close {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} close {}", self.date, self.account)
    }
}

/// A currency declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commodity {
    /// Declaration date.
    pub date: NaiveDate,
    /// Declared currency code.
    pub currency: String,
    /// Metadata.
    pub meta: Metadata,
}

impl Commodity {
    /// Create a commodity declaration.
    #[must_use]
    pub fn new(date: NaiveDate, currency: impl Into<String>) -> Self {
        Self {
            date,
            currency: currency.into(),
            meta: Metadata::new(),
        }
    }
}

impl fmt::Display for Commodity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} commodity {}", self.date, self.currency)
    }
}

/// An automatic balancing entry against a source account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pad {
    /// Pad date.
    pub date: NaiveDate,
    /// Account to pad.
    pub account: String,
    /// Account the padding amount is drawn from.
    pub source_account: String,
    /// Metadata.
    pub meta: Metadata,
}

impl Pad {
    /// Create a pad directive.
    #[must_use]
    pub fn new(
        date: NaiveDate,
        account: impl Into<String>,
        source_account: impl Into<String>,
    ) -> Self {
        Self {
            date,
            account: account.into(),
            source_account: source_account.into(),
            meta: Metadata::new(),
        }
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pad {} {}",
            self.date, self.account, self.source_account
        )
    }
}

/// A price observation: one unit of `currency` cost `amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Observation date.
    pub date: NaiveDate,
    /// Currency being priced.
    pub currency: String,
    /// Its price, in another currency.
    pub amount: Amount,
    /// Metadata.
    pub meta: Metadata,
}

impl Price {
    /// Create a price observation.
    #[must_use]
    pub fn new(date: NaiveDate, currency: impl Into<String>, amount: Amount) -> Self {
        Self {
            date,
            currency: currency.into(),
            amount,
            meta: Metadata::new(),
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} price {} {}", self.date, self.currency, self.amount)
    }
}

/// A dated name/value observation (e.g. "location", "Paris").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event date.
    pub date: NaiveDate,
    /// Event name.
    pub name: String,
    /// Event value.
    pub value: String,
    /// Metadata.
    pub meta: Metadata,
}

impl Event {
    /// Create an event directive.
    #[must_use]
    pub fn new(date: NaiveDate, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            date,
            name: name.into(),
            value: value.into(),
            meta: Metadata::new(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} event \"{}\" \"{}\"", self.date, self.name, self.value)
    }
}

/// A free-text note attached to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Note date.
    pub date: NaiveDate,
    /// Annotated account.
    pub account: String,
    /// Note text.
    pub comment: String,
    /// Metadata.
    pub meta: Metadata,
}

impl Note {
    /// Create a note directive.
    #[must_use]
    pub fn new(date: NaiveDate, account: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            date,
            account: account.into(),
            comment: comment.into(),
            meta: Metadata::new(),
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} note {} \"{}\"", self.date, self.account, self.comment)
    }
}

/// A document file attached to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Attachment date.
    pub date: NaiveDate,
    /// Annotated account.
    pub account: String,
    /// Path to the document file.
    pub path: String,
    /// Trailing tags.
    pub tags: Vec<String>,
    /// Trailing links.
    pub links: Vec<String>,
    /// Metadata.
    pub meta: Metadata,
}

impl Document {
    /// Create a document directive.
    #[must_use]
    pub fn new(date: NaiveDate, account: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            date,
            account: account.into(),
            path: path.into(),
            tags: Vec::new(),
            links: Vec::new(),
            meta: Metadata::new(),
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} document {} \"{}\"", self.date, self.account, self.path)?;
        for tag in &self.tags {
            write!(f, " #{tag}")?;
        }
        for link in &self.links {
            write!(f, " ^{link}")?;
        }
        Ok(())
    }
}

/// A named stored query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Query date.
    pub date: NaiveDate,
    /// Query name.
    pub name: String,
    /// Query text.
    pub query: String,
    /// Metadata.
    pub meta: Metadata,
}

impl Query {
    /// Create a query directive.
    #[must_use]
    pub fn new(date: NaiveDate, name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            date,
            name: name.into(),
            query: query.into(),
            meta: Metadata::new(),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} query \"{}\" \"{}\"", self.date, self.name, self.query)
    }
}

/// An extension directive: a type name plus free-form values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Custom {
    /// Directive date.
    pub date: NaiveDate,
    /// Extension type name.
    pub name: String,
    /// Positional values.
    pub values: Vec<MetaValue>,
    /// Metadata.
    pub meta: Metadata,
}

impl Custom {
    /// Create a custom directive with no values.
    #[must_use]
    pub fn new(date: NaiveDate, name: impl Into<String>) -> Self {
        Self {
            date,
            name: name.into(),
            values: Vec::new(),
            meta: Metadata::new(),
        }
    }

    /// Append a positional value.
    #[must_use]
    pub fn with_value(mut self, value: MetaValue) -> Self {
        self.values.push(value);
        self
    }
}

impl fmt::Display for Custom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} custom \"{}\"", self.date, self.name)?;
        for value in &self.values {
            write!(f, " {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_transaction_builders() {
        let txn = Transaction::new(date(2014, 3, 1), "Lamb tagine")
            .with_payee("Cafe Mogador")
            .with_tag("trip")
            .with_posting(Posting::new(
                "Liabilities:CreditCard:CapitalOne",
                Amount::new(dec!(-37.45), "USD"),
            ))
            .with_posting(Posting::auto("Expenses:Restaurant"));

        assert_eq!(txn.flag, '*');
        assert_eq!(txn.payee.as_deref(), Some("Cafe Mogador"));
        assert_eq!(txn.postings.len(), 2);
        assert!(txn.postings[1].units.is_none());
    }

    #[test]
    fn test_directive_date_and_kind() {
        let d = Directive::Close(Close::new(date(2014, 12, 31), "Assets:Old"));
        assert_eq!(d.date(), date(2014, 12, 31));
        assert_eq!(d.kind_name(), "close");
        assert!(d.as_transaction().is_none());
    }

    #[test]
    fn test_balance_display_with_tolerance() {
        let bal = Balance::new(
            date(2014, 8, 1),
            "Assets:Checking",
            Amount::new(dec!(1234.00), "USD"),
        )
        .with_tolerance(dec!(0.02));
        assert_eq!(
            bal.to_string(),
            "2014-08-01 balance Assets:Checking 1234.00 ~ 0.02 USD"
        );
    }

    #[test]
    fn test_posting_display() {
        let posting = Posting::new("Assets:Cash", Amount::new(dec!(100.00), "USD"))
            .with_price(PriceAnnotation::Unit(IncompleteAmount::complete(
                dec!(1.10),
                "CAD",
            )));
        let s = posting.to_string();
        assert!(s.contains("Assets:Cash"));
        assert!(s.contains("100.00 USD"));
        assert!(s.contains("@ 1.10 CAD"));
    }

    #[test]
    fn test_meta_value_display() {
        assert_eq!(MetaValue::Bool(true).to_string(), "TRUE");
        assert_eq!(MetaValue::Tag("travel".into()).to_string(), "#travel");
        assert_eq!(MetaValue::None.to_string(), "");
    }

    #[test]
    fn test_custom_display() {
        let custom = Custom::new(date(2014, 7, 9), "budget")
            .with_value(MetaValue::String("quarterly".into()))
            .with_value(MetaValue::Amount(Amount::new(dec!(45.00), "EUR")));
        assert_eq!(
            custom.to_string(),
            "2014-07-09 custom \"budget\" \"quarterly\" 45.00 EUR"
        );
    }
}
