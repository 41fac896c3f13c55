//! The builder interface between the grammar engine and the embedder.
//!
//! Every grammar reduction calls one method of [`Builder`]. Construction
//! methods return `Result`: a failing builder aborts the current reduction
//! and the engine records the failure and re-synchronizes at the next end
//! of line. Failures are ordinary values; nothing unwinds through the
//! engine.
//!
//! [`LedgerBuilder`] is the reference implementation: it constructs the
//! directive tree, owns the error accumulator, applies the tag and metadata
//! contexts, and hands everything over as a [`ParseResult`].

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;

use tally_core::{
    Amount, Balance, Close, Commodity, CostSpec, Custom, Directive, Document, Event,
    IncompleteAmount, InternedStr, MetaValue, Metadata, Note, Open, Pad, Posting, Price,
    PriceAnnotation, Query, Transaction,
};

use crate::error::{ParseError, ParseErrorKind};
use crate::options::Options;
use crate::span::{Located, SourceLocation, Span};
use crate::{ParseResult, PluginSpec};

/// A structured builder failure.
///
/// Carries a message for the error record; the reduction that produced it
/// is abandoned by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildError {
    /// Human-readable description of the failure.
    pub message: String,
}

impl BuildError {
    /// Create a failure with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BuildError {}

/// Accumulator for a transaction's header fields.
///
/// Strings, tags, and links may interleave freely on the header line; the
/// builder folds them in one at a time.
#[derive(Debug, Clone, Default)]
pub struct TxnFields {
    /// Header strings, in order; at most two are accepted.
    pub strings: Vec<String>,
    /// Explicit `#tag`s.
    pub tags: Vec<String>,
    /// Explicit `^link`s.
    pub links: Vec<String>,
}

impl TxnFields {
    /// Split the collected strings into `(payee, narration)`.
    ///
    /// Two strings are payee then narration; one is narration only; none is
    /// an empty narration.
    #[must_use]
    pub fn into_payee_narration(mut self) -> (Option<String>, String) {
        match self.strings.len() {
            0 => (None, String::new()),
            1 => (None, self.strings.pop().unwrap_or_default()),
            _ => {
                let narration = self.strings.swap_remove(1);
                let payee = self.strings.swap_remove(0);
                (Some(payee), narration)
            }
        }
    }
}

/// One component written between cost-spec braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CostComponent {
    /// A (possibly compound) amount.
    Amount(CompoundAmount),
    /// An acquisition date.
    Date(NaiveDate),
    /// A lot label.
    Label(String),
    /// The `*` merge marker.
    Merge,
}

/// A cost amount as written: per-unit and/or total, with optional currency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundAmount {
    /// Per-unit cost.
    pub number_per: Option<Decimal>,
    /// Total cost.
    pub number_total: Option<Decimal>,
    /// Cost currency.
    pub currency: Option<InternedStr>,
}

/// The currently pushed tags, in push order.
///
/// One context exists per parse; `pushtag`/`poptag` reductions mutate it
/// and transaction reductions read it.
#[derive(Debug, Clone, Default)]
pub struct TagContext {
    tags: Vec<String>,
}

impl TagContext {
    /// Push a tag.
    pub fn push(&mut self, tag: String) {
        self.tags.push(tag);
    }

    /// Remove the most recently pushed occurrence of `tag`.
    ///
    /// Returns `false` when the tag was never pushed.
    pub fn pop(&mut self, tag: &str) -> bool {
        match self.tags.iter().rposition(|t| t == tag) {
            Some(pos) => {
                self.tags.remove(pos);
                true
            }
            None => false,
        }
    }

    /// The active tags, oldest first.
    #[must_use]
    pub fn active(&self) -> &[String] {
        &self.tags
    }
}

/// The currently pushed metadata entries, in push order.
#[derive(Debug, Clone, Default)]
pub struct MetaContext {
    entries: Vec<(String, MetaValue)>,
}

impl MetaContext {
    /// Push an entry.
    pub fn push(&mut self, key: String, value: MetaValue) {
        self.entries.push((key, value));
    }

    /// Remove the most recently pushed occurrence of `key`.
    pub fn pop(&mut self, key: &str) -> bool {
        match self.entries.iter().rposition(|(k, _)| k == key) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Merge active entries into `meta`; keys already written win.
    pub fn apply(&self, meta: &mut Metadata) {
        for (key, value) in &self.entries {
            meta.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}

/// The capability set the grammar engine drives.
///
/// One method per grammar production; names and argument positions are the
/// stable boundary between the core and the embedder. All invocations are
/// strictly sequential within one parse.
#[allow(clippy::too_many_arguments)]
pub trait Builder {
    /// `number_expr CURRENCY` reduced to an amount.
    fn amount(&mut self, number: Decimal, currency: &str) -> Result<Amount, BuildError>;

    /// A cost amount: per-unit and/or total number with optional currency.
    fn compound_amount(
        &mut self,
        number_per: Option<Decimal>,
        number_total: Option<Decimal>,
        currency: Option<&str>,
    ) -> Result<CompoundAmount, BuildError>;

    /// Fold brace components into a cost spec. `is_total` distinguishes
    /// `{{...}}` from `{...}`.
    fn cost_spec(
        &mut self,
        loc: &SourceLocation,
        span: Span,
        components: Vec<CostComponent>,
        is_total: bool,
    ) -> Result<CostSpec, BuildError>;

    /// A `key: value` metadata entry.
    fn key_value(&mut self, key: &str, value: MetaValue) -> Result<(String, MetaValue), BuildError>;

    /// A fresh transaction-header accumulator.
    fn txn_fields_new(&mut self) -> TxnFields {
        TxnFields::default()
    }

    /// A header string (payee or narration).
    fn txn_field_string(&mut self, fields: &mut TxnFields, value: String)
        -> Result<(), BuildError>;

    /// A header `#tag`.
    fn txn_field_tag(&mut self, fields: &mut TxnFields, tag: String) -> Result<(), BuildError>;

    /// A header `^link`.
    fn txn_field_link(&mut self, fields: &mut TxnFields, link: String) -> Result<(), BuildError>;

    /// The deprecated `|` separator between payee and narration.
    fn txn_field_pipe(
        &mut self,
        loc: &SourceLocation,
        span: Span,
        fields: &mut TxnFields,
    ) -> Result<(), BuildError>;

    /// One posting line. Metadata lines following the posting are attached
    /// by the engine afterwards.
    fn posting(
        &mut self,
        loc: &SourceLocation,
        flag: Option<char>,
        account: String,
        units: Option<IncompleteAmount>,
        cost: Option<CostSpec>,
        price: Option<PriceAnnotation>,
    ) -> Result<Posting, BuildError>;

    /// A complete transaction.
    fn transaction(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        flag: char,
        fields: TxnFields,
        meta: Metadata,
        postings: Vec<Posting>,
    ) -> Result<(), BuildError>;

    /// A balance assertion.
    fn balance(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        account: String,
        amount: Amount,
        tolerance: Option<Decimal>,
        meta: Metadata,
    ) -> Result<(), BuildError>;

    /// An account opening.
    fn open(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        account: String,
        currencies: Vec<String>,
        booking: Option<String>,
        meta: Metadata,
    ) -> Result<(), BuildError>;

    /// An account closing.
    fn close(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        account: String,
        meta: Metadata,
    ) -> Result<(), BuildError>;

    /// A commodity declaration.
    fn commodity(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        currency: String,
        meta: Metadata,
    ) -> Result<(), BuildError>;

    /// A pad directive.
    fn pad(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        account: String,
        source_account: String,
        meta: Metadata,
    ) -> Result<(), BuildError>;

    /// A price observation.
    fn price(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        currency: String,
        amount: Amount,
        meta: Metadata,
    ) -> Result<(), BuildError>;

    /// An event directive.
    fn event(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        name: String,
        value: String,
        meta: Metadata,
    ) -> Result<(), BuildError>;

    /// A note directive.
    fn note(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        account: String,
        comment: String,
        meta: Metadata,
    ) -> Result<(), BuildError>;

    /// A document directive.
    fn document(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        account: String,
        path: String,
        tags: Vec<String>,
        links: Vec<String>,
        meta: Metadata,
    ) -> Result<(), BuildError>;

    /// A stored query.
    fn query(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        name: String,
        query: String,
        meta: Metadata,
    ) -> Result<(), BuildError>;

    /// A custom directive.
    fn custom(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        name: String,
        values: Vec<MetaValue>,
        meta: Metadata,
    ) -> Result<(), BuildError>;

    /// An `option` directive.
    fn option(
        &mut self,
        loc: SourceLocation,
        span: Span,
        name: &str,
        value: &str,
    ) -> Result<(), BuildError>;

    /// An `include` directive. Resolution is the embedder's concern.
    fn include(
        &mut self,
        loc: SourceLocation,
        span: Span,
        filename: String,
    ) -> Result<(), BuildError>;

    /// A `plugin` directive.
    fn plugin(
        &mut self,
        loc: SourceLocation,
        span: Span,
        name: String,
        config: Option<String>,
    ) -> Result<(), BuildError>;

    /// `pushtag`: activate a tag for subsequent transactions.
    fn pushtag(&mut self, tag: String);

    /// `poptag`: deactivate the most recent push of `tag`.
    fn poptag(&mut self, loc: &SourceLocation, span: Span, tag: &str);

    /// `pushmeta`: activate a metadata entry for subsequent directives.
    fn pushmeta(&mut self, key: String, value: MetaValue);

    /// `popmeta`: deactivate the most recent push of `key`.
    fn popmeta(&mut self, loc: &SourceLocation, span: Span, key: &str);

    /// Record an error. Insertion is append-only; errors never halt the
    /// parse.
    fn error(&mut self, error: ParseError);
}

/// The reference builder: constructs the directive tree.
#[derive(Debug)]
pub struct LedgerBuilder {
    directives: Vec<Located<Directive>>,
    errors: Vec<ParseError>,
    options: Options,
    includes: Vec<Located<String>>,
    plugins: Vec<Located<PluginSpec>>,
    tag_context: TagContext,
    meta_context: MetaContext,
}

impl LedgerBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            directives: Vec::new(),
            errors: Vec::new(),
            options: Options::new(),
            includes: Vec::new(),
            plugins: Vec::new(),
            tag_context: TagContext::default(),
            meta_context: MetaContext::default(),
        }
    }

    /// The tags currently pushed.
    #[must_use]
    pub fn active_tags(&self) -> &[String] {
        self.tag_context.active()
    }

    /// Hand the accumulated tree over as a [`ParseResult`].
    #[must_use]
    pub fn finish(self, incomplete: bool) -> ParseResult {
        ParseResult {
            directives: self.directives,
            errors: self.errors,
            options: self.options,
            includes: self.includes,
            plugins: self.plugins,
            incomplete,
        }
    }

    fn push_directive(&mut self, directive: Directive, span: Span, loc: SourceLocation) {
        let mut directive = directive;
        self.meta_context.apply(directive.meta_mut());
        self.directives.push(Located::new(directive, span, loc));
    }
}

impl Default for LedgerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::too_many_arguments)]
impl Builder for LedgerBuilder {
    fn amount(&mut self, number: Decimal, currency: &str) -> Result<Amount, BuildError> {
        Ok(Amount::new(number, currency))
    }

    fn compound_amount(
        &mut self,
        number_per: Option<Decimal>,
        number_total: Option<Decimal>,
        currency: Option<&str>,
    ) -> Result<CompoundAmount, BuildError> {
        Ok(CompoundAmount {
            number_per,
            number_total,
            currency: currency.map(InternedStr::from),
        })
    }

    fn cost_spec(
        &mut self,
        loc: &SourceLocation,
        span: Span,
        components: Vec<CostComponent>,
        is_total: bool,
    ) -> Result<CostSpec, BuildError> {
        let mut spec = CostSpec::default();
        let warn = |errors: &mut Vec<ParseError>, kind: &'static str| {
            errors.push(ParseError::new(
                ParseErrorKind::DuplicateCostComponent(kind),
                loc.clone(),
                span,
            ));
        };

        for component in components {
            match component {
                CostComponent::Amount(ca) => {
                    // Inside double braces a plain amount is a total.
                    let (per, total) = if is_total && ca.number_total.is_none() {
                        (None, ca.number_per)
                    } else {
                        (ca.number_per, ca.number_total)
                    };
                    if let Some(per) = per {
                        if spec.number_per.is_some() {
                            warn(&mut self.errors, "per-unit cost");
                        }
                        spec.number_per = Some(per);
                    }
                    if let Some(total) = total {
                        if spec.number_total.is_some() {
                            warn(&mut self.errors, "total cost");
                        }
                        spec.number_total = Some(total);
                    }
                    if let Some(currency) = ca.currency {
                        if spec.currency.is_some() {
                            warn(&mut self.errors, "currency");
                        }
                        spec.currency = Some(currency);
                    }
                }
                CostComponent::Date(date) => {
                    if spec.date.is_some() {
                        warn(&mut self.errors, "date");
                    }
                    spec.date = Some(date);
                }
                CostComponent::Label(label) => {
                    if spec.label.is_some() {
                        warn(&mut self.errors, "label");
                    }
                    spec.label = Some(label);
                }
                CostComponent::Merge => spec.merge = true,
            }
        }
        Ok(spec)
    }

    fn key_value(&mut self, key: &str, value: MetaValue) -> Result<(String, MetaValue), BuildError> {
        Ok((key.to_string(), value))
    }

    fn txn_field_string(
        &mut self,
        fields: &mut TxnFields,
        value: String,
    ) -> Result<(), BuildError> {
        if fields.strings.len() >= 2 {
            return Err(BuildError::new(
                "too many strings in transaction header; expected at most payee and narration",
            ));
        }
        fields.strings.push(value);
        Ok(())
    }

    fn txn_field_tag(&mut self, fields: &mut TxnFields, tag: String) -> Result<(), BuildError> {
        // Tags form a set: writing the same tag twice is a no-op.
        if !fields.tags.contains(&tag) {
            fields.tags.push(tag);
        }
        Ok(())
    }

    fn txn_field_link(&mut self, fields: &mut TxnFields, link: String) -> Result<(), BuildError> {
        if !fields.links.contains(&link) {
            fields.links.push(link);
        }
        Ok(())
    }

    fn txn_field_pipe(
        &mut self,
        loc: &SourceLocation,
        span: Span,
        _fields: &mut TxnFields,
    ) -> Result<(), BuildError> {
        self.errors.push(ParseError::new(
            ParseErrorKind::Deprecated("'|' between payee and narration"),
            loc.clone(),
            span,
        ));
        Ok(())
    }

    fn posting(
        &mut self,
        _loc: &SourceLocation,
        flag: Option<char>,
        account: String,
        units: Option<IncompleteAmount>,
        cost: Option<CostSpec>,
        price: Option<PriceAnnotation>,
    ) -> Result<Posting, BuildError> {
        Ok(Posting {
            flag,
            account,
            units,
            cost,
            price,
            meta: Metadata::new(),
        })
    }

    fn transaction(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        flag: char,
        fields: TxnFields,
        meta: Metadata,
        postings: Vec<Posting>,
    ) -> Result<(), BuildError> {
        let tags = fields.tags.clone();
        let links = fields.links.clone();
        let (payee, narration) = fields.into_payee_narration();

        let mut txn = Transaction {
            date,
            flag,
            payee,
            narration,
            tags,
            links,
            postings,
            meta,
        };
        for tag in self.tag_context.active() {
            if !txn.tags.contains(tag) {
                txn.tags.push(tag.clone());
            }
        }
        self.push_directive(Directive::Transaction(txn), span, loc);
        Ok(())
    }

    fn balance(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        account: String,
        amount: Amount,
        tolerance: Option<Decimal>,
        meta: Metadata,
    ) -> Result<(), BuildError> {
        let mut bal = Balance::new(date, account, amount);
        bal.tolerance = tolerance;
        bal.meta = meta;
        self.push_directive(Directive::Balance(bal), span, loc);
        Ok(())
    }

    fn open(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        account: String,
        currencies: Vec<String>,
        booking: Option<String>,
        meta: Metadata,
    ) -> Result<(), BuildError> {
        let mut open = Open::new(date, account).with_currencies(currencies);
        open.booking = booking;
        open.meta = meta;
        self.push_directive(Directive::Open(open), span, loc);
        Ok(())
    }

    fn close(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        account: String,
        meta: Metadata,
    ) -> Result<(), BuildError> {
        let mut close = Close::new(date, account);
        close.meta = meta;
        self.push_directive(Directive::Close(close), span, loc);
        Ok(())
    }

    fn commodity(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        currency: String,
        meta: Metadata,
    ) -> Result<(), BuildError> {
        let mut commodity = Commodity::new(date, currency);
        commodity.meta = meta;
        self.push_directive(Directive::Commodity(commodity), span, loc);
        Ok(())
    }

    fn pad(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        account: String,
        source_account: String,
        meta: Metadata,
    ) -> Result<(), BuildError> {
        let mut pad = Pad::new(date, account, source_account);
        pad.meta = meta;
        self.push_directive(Directive::Pad(pad), span, loc);
        Ok(())
    }

    fn price(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        currency: String,
        amount: Amount,
        meta: Metadata,
    ) -> Result<(), BuildError> {
        let mut price = Price::new(date, currency, amount);
        price.meta = meta;
        self.push_directive(Directive::Price(price), span, loc);
        Ok(())
    }

    fn event(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        name: String,
        value: String,
        meta: Metadata,
    ) -> Result<(), BuildError> {
        let mut event = Event::new(date, name, value);
        event.meta = meta;
        self.push_directive(Directive::Event(event), span, loc);
        Ok(())
    }

    fn note(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        account: String,
        comment: String,
        meta: Metadata,
    ) -> Result<(), BuildError> {
        let mut note = Note::new(date, account, comment);
        note.meta = meta;
        self.push_directive(Directive::Note(note), span, loc);
        Ok(())
    }

    fn document(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        account: String,
        path: String,
        tags: Vec<String>,
        links: Vec<String>,
        meta: Metadata,
    ) -> Result<(), BuildError> {
        let mut doc = Document::new(date, account, path);
        doc.tags = tags;
        doc.links = links;
        doc.meta = meta;
        self.push_directive(Directive::Document(doc), span, loc);
        Ok(())
    }

    fn query(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        name: String,
        query: String,
        meta: Metadata,
    ) -> Result<(), BuildError> {
        let mut q = Query::new(date, name, query);
        q.meta = meta;
        self.push_directive(Directive::Query(q), span, loc);
        Ok(())
    }

    fn custom(
        &mut self,
        loc: SourceLocation,
        span: Span,
        date: NaiveDate,
        name: String,
        values: Vec<MetaValue>,
        meta: Metadata,
    ) -> Result<(), BuildError> {
        let mut custom = Custom::new(date, name);
        custom.values = values;
        custom.meta = meta;
        self.push_directive(Directive::Custom(custom), span, loc);
        Ok(())
    }

    fn option(
        &mut self,
        loc: SourceLocation,
        span: Span,
        name: &str,
        value: &str,
    ) -> Result<(), BuildError> {
        for problem in self.options.set(name, value) {
            self.errors.push(ParseError::new(problem, loc.clone(), span));
        }
        Ok(())
    }

    fn include(
        &mut self,
        loc: SourceLocation,
        span: Span,
        filename: String,
    ) -> Result<(), BuildError> {
        self.includes.push(Located::new(filename, span, loc));
        Ok(())
    }

    fn plugin(
        &mut self,
        loc: SourceLocation,
        span: Span,
        name: String,
        config: Option<String>,
    ) -> Result<(), BuildError> {
        self.plugins
            .push(Located::new(PluginSpec { name, config }, span, loc));
        Ok(())
    }

    fn pushtag(&mut self, tag: String) {
        self.tag_context.push(tag);
    }

    fn poptag(&mut self, loc: &SourceLocation, span: Span, tag: &str) {
        if !self.tag_context.pop(tag) {
            self.errors.push(ParseError::new(
                ParseErrorKind::UnmatchedPop(format!("#{tag}")),
                loc.clone(),
                span,
            ));
        }
    }

    fn pushmeta(&mut self, key: String, value: MetaValue) {
        self.meta_context.push(key, value);
    }

    fn popmeta(&mut self, loc: &SourceLocation, span: Span, key: &str) {
        if !self.meta_context.pop(key) {
            self.errors.push(ParseError::new(
                ParseErrorKind::UnmatchedPop(key.to_string()),
                loc.clone(),
                span,
            ));
        }
    }

    fn error(&mut self, error: ParseError) {
        self.errors.push(error);
    }
}
