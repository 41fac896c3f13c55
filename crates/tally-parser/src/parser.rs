//! The grammar engine.
//!
//! A recursive-descent driver over the token stream, one function per
//! production. Every reduction routes through the [`Builder`]; a failed
//! reduction records an error and re-synchronizes at the next end of line,
//! so malformed input never swallows the directives that follow it.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use tally_core::{
    Amount, CostSpec, IncompleteAmount, InternedStr, MetaValue, Metadata, Posting, PriceAnnotation,
};

use crate::builder::{BuildError, Builder, CostComponent, TxnFields};
use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::{tokenize, unquote, Token};
use crate::span::{LineIndex, SourceLocation, Span};
use crate::ParseConfig;

/// Signals that the current reduction was abandoned. The error has already
/// been recorded; the catcher re-synchronizes at the next end of line.
struct Abort;

type Reduce<T> = Result<T, Abort>;

/// Token names offered in top-level error messages.
const TOP_LEVEL_EXPECTED: &[&str] = &[
    "DATE", "OPTION", "INCLUDE", "PLUGIN", "PUSHTAG", "POPTAG", "PUSHMETA", "POPMETA", "EOL",
];

/// Run the grammar over `source`, driving `builder`.
///
/// Returns `true` when the parse was cancelled before reaching end of
/// input.
pub(crate) fn run<B: Builder>(
    source: &str,
    file: &str,
    config: &ParseConfig,
    builder: &mut B,
) -> bool {
    let mut grammar = Grammar {
        source,
        tokens: tokenize(source),
        pos: 0,
        last_span: Span::new(0, 0),
        file: InternedStr::from(file),
        lines: LineIndex::new(source),
        config,
        builder,
    };
    grammar.parse_declarations()
}

struct Grammar<'src, 'b, B: Builder> {
    source: &'src str,
    tokens: Vec<(Token<'src>, Span)>,
    pos: usize,
    last_span: Span,
    file: InternedStr,
    lines: LineIndex,
    config: &'b ParseConfig,
    builder: &'b mut B,
}

impl<'src, B: Builder> Grammar<'src, '_, B> {
    // ===== Cursor =====

    fn peek(&self) -> Option<Token<'src>> {
        self.tokens.get(self.pos).map(|(t, _)| t.clone())
    }

    fn peek_nth(&self, n: usize) -> Option<Token<'src>> {
        self.tokens.get(self.pos + n).map(|(t, _)| t.clone())
    }

    fn peek_span(&self) -> Span {
        self.tokens.get(self.pos).map_or_else(
            || Span::new(self.source.len(), self.source.len()),
            |(_, span)| *span,
        )
    }

    fn bump(&mut self) -> Option<(Token<'src>, Span)> {
        let entry = self.tokens.get(self.pos).cloned();
        if let Some((_, span)) = &entry {
            self.last_span = *span;
            self.pos += 1;
        }
        entry
    }

    fn at_line_end(&self) -> bool {
        matches!(self.peek(), None | Some(Token::Eol))
    }

    fn at_number_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Number(_) | Token::LParen | Token::Minus | Token::Plus)
        )
    }

    fn nth_is_number_start(&self, n: usize) -> bool {
        matches!(
            self.peek_nth(n),
            Some(Token::Number(_) | Token::LParen | Token::Minus | Token::Plus)
        )
    }

    // ===== Errors and recovery =====

    fn loc_at(&self, span: Span) -> SourceLocation {
        SourceLocation {
            file: self.file.clone(),
            line: self.lines.line(span.start),
        }
    }

    fn report(&mut self, kind: ParseErrorKind, span: Span, expected: &[&str]) {
        let loc = self.loc_at(span);
        let mut error = ParseError::new(kind, loc, span);
        if let Some(text) = self.lines.line_text(self.source, error.loc.line) {
            error = error.with_excerpt(text);
        }
        if self.config.verbose_errors && !expected.is_empty() {
            error = error.with_context(format!("expected one of: {}", expected.join(", ")));
        }
        self.builder.error(error);
    }

    /// Record an error for the current token and abandon the reduction.
    /// Unrecognizable input is classified as a lexical error; everything
    /// else is a grammar error carrying the token's name.
    fn unexpected(&mut self, expected: &[&str]) -> Abort {
        let (kind, span) = match self.tokens.get(self.pos) {
            Some((Token::Error, span)) => {
                let slice = span.text(self.source);
                let kind = if slice.starts_with('"') {
                    ParseErrorKind::UnterminatedString
                } else {
                    ParseErrorKind::InvalidToken(slice.chars().take(24).collect())
                };
                (kind, *span)
            }
            Some((token, span)) => (ParseErrorKind::UnexpectedToken(token.name().into()), *span),
            None => (
                ParseErrorKind::UnexpectedEof,
                Span::new(self.source.len(), self.source.len()),
            ),
        };
        self.report(kind, span, expected);
        Abort
    }

    fn build_failed(&mut self, error: BuildError, span: Span) -> Abort {
        self.report(ParseErrorKind::BuildFailure(error.message), span, &[]);
        Abort
    }

    fn report_deprecated(&mut self, what: &'static str, span: Span) {
        self.report(ParseErrorKind::Deprecated(what), span, &[]);
    }

    /// Discard tokens through the next end of line, then resume.
    fn recover_to_eol(&mut self) {
        while let Some((token, _)) = self.bump() {
            if matches!(token, Token::Eol) {
                break;
            }
        }
    }

    fn expect_eol(&mut self) -> Reduce<()> {
        match self.peek() {
            None => Ok(()),
            Some(Token::Eol) => {
                self.bump();
                Ok(())
            }
            _ => Err(self.unexpected(&["EOL"])),
        }
    }

    // ===== Declarations =====

    /// The top-level loop. Returns `true` on cancellation.
    fn parse_declarations(&mut self) -> bool {
        loop {
            if self.config.is_cancelled() {
                return true;
            }
            let Some(token) = self.peek() else { break };
            match token {
                Token::Eol => {
                    self.bump();
                }
                // Stray indentation and section headers (org-mode `*` at
                // column zero) are skipped without comment.
                Token::Indent | Token::Asterisk => self.recover_to_eol(),
                Token::Date(_) => {
                    if self.parse_dated().is_err() {
                        self.recover_to_eol();
                    }
                }
                Token::Option_ => {
                    if self.parse_option().is_err() {
                        self.recover_to_eol();
                    }
                }
                Token::Include => {
                    if self.parse_include().is_err() {
                        self.recover_to_eol();
                    }
                }
                Token::Plugin => {
                    if self.parse_plugin().is_err() {
                        self.recover_to_eol();
                    }
                }
                Token::Pushtag | Token::Poptag => {
                    if self.parse_tag_directive().is_err() {
                        self.recover_to_eol();
                    }
                }
                Token::Pushmeta | Token::Popmeta => {
                    if self.parse_meta_directive().is_err() {
                        self.recover_to_eol();
                    }
                }
                _ => {
                    self.unexpected(TOP_LEVEL_EXPECTED);
                    self.recover_to_eol();
                }
            }
        }
        false
    }

    // ===== Dated directives =====

    fn parse_dated(&mut self) -> Reduce<()> {
        let Some((Token::Date(lexeme), date_span)) = self.bump() else {
            return Err(self.unexpected(&["DATE"]));
        };
        let date = self.date_from_lexeme(lexeme, date_span)?;
        let loc = self.loc_at(date_span);

        match self.peek() {
            Some(Token::Txn) => self.parse_transaction(date, loc, date_span),
            Some(token) if token.is_flag() => self.parse_transaction(date, loc, date_span),
            Some(Token::Balance) => self.parse_balance(date, loc, date_span),
            Some(Token::Open) => self.parse_open(date, loc, date_span),
            Some(Token::Close) => self.parse_close(date, loc, date_span),
            Some(Token::Commodity) => self.parse_commodity(date, loc, date_span),
            Some(Token::Pad) => self.parse_pad(date, loc, date_span),
            Some(Token::Price) => self.parse_price(date, loc, date_span),
            Some(Token::Event) => self.parse_event(date, loc, date_span),
            Some(Token::Note) => self.parse_note(date, loc, date_span),
            Some(Token::Document) => self.parse_document(date, loc, date_span),
            Some(Token::Query) => self.parse_query(date, loc, date_span),
            Some(Token::Custom) => self.parse_custom(date, loc, date_span),
            _ => Err(self.unexpected(&[
                "TXN", "FLAG", "BALANCE", "OPEN", "CLOSE", "COMMODITY", "PAD", "PRICE", "EVENT",
                "NOTE", "DOCUMENT", "QUERY", "CUSTOM",
            ])),
        }
    }

    fn parse_transaction(
        &mut self,
        date: NaiveDate,
        loc: SourceLocation,
        start: Span,
    ) -> Reduce<()> {
        let Some((flag_token, _)) = self.bump() else {
            return Err(self.unexpected(&["TXN", "FLAG"]));
        };
        // The `txn` keyword is the `*` flag spelled out.
        let flag = flag_token.flag_char().unwrap_or('*');

        let mut fields = self.builder.txn_fields_new();
        loop {
            match self.peek() {
                None | Some(Token::Eol) => break,
                Some(Token::String(lexeme)) => {
                    let Some((_, span)) = self.bump() else { break };
                    let value = unquote(lexeme);
                    if let Err(e) = self.builder.txn_field_string(&mut fields, value) {
                        return Err(self.build_failed(e, span));
                    }
                }
                Some(Token::Tag(lexeme)) => {
                    let Some((_, span)) = self.bump() else { break };
                    if let Err(e) = self
                        .builder
                        .txn_field_tag(&mut fields, lexeme[1..].to_string())
                    {
                        return Err(self.build_failed(e, span));
                    }
                }
                Some(Token::Link(lexeme)) => {
                    let Some((_, span)) = self.bump() else { break };
                    if let Err(e) = self
                        .builder
                        .txn_field_link(&mut fields, lexeme[1..].to_string())
                    {
                        return Err(self.build_failed(e, span));
                    }
                }
                Some(Token::Pipe) => {
                    let Some((_, span)) = self.bump() else { break };
                    let pipe_loc = self.loc_at(span);
                    if let Err(e) = self.builder.txn_field_pipe(&pipe_loc, span, &mut fields) {
                        return Err(self.build_failed(e, span));
                    }
                }
                _ => return Err(self.unexpected(&["STRING", "TAG", "LINK", "EOL"])),
            }
        }
        self.expect_eol()?;

        let (meta, postings) = self.parse_posting_block(&mut fields);

        let span = start.merge(&self.last_span);
        self.builder
            .transaction(loc, span, date, flag, fields, meta, postings)
            .map_err(|e| self.build_failed(e, span))
    }

    /// The indented block under a transaction: postings, metadata lines,
    /// tag/link continuations, and indented blank lines. A malformed line
    /// is reported and skipped without abandoning the block.
    fn parse_posting_block(&mut self, fields: &mut TxnFields) -> (Metadata, Vec<Posting>) {
        let mut meta = Metadata::new();
        let mut postings: Vec<Posting> = Vec::new();

        while matches!(self.peek(), Some(Token::Indent)) {
            if self.config.is_cancelled() {
                break;
            }
            self.bump();
            match self.peek() {
                None => break,
                Some(Token::Eol) => {
                    self.bump();
                }
                Some(Token::Key(_)) => match self.parse_key_value_line() {
                    Ok((key, value)) => {
                        // A metadata line after a posting belongs to that
                        // posting; before any posting it belongs to the
                        // transaction.
                        match postings.last_mut() {
                            Some(posting) => posting.meta.insert(key, value),
                            None => meta.insert(key, value),
                        };
                    }
                    Err(Abort) => self.recover_to_eol(),
                },
                Some(Token::Tag(_) | Token::Link(_)) => {
                    if self.parse_tags_links_line(fields).is_err() {
                        self.recover_to_eol();
                    }
                }
                _ => match self.parse_posting() {
                    Ok(posting) => postings.push(posting),
                    Err(Abort) => self.recover_to_eol(),
                },
            }
        }
        (meta, postings)
    }

    fn parse_tags_links_line(&mut self, fields: &mut TxnFields) -> Reduce<()> {
        loop {
            match self.peek() {
                Some(Token::Tag(lexeme)) => {
                    let Some((_, span)) = self.bump() else { break };
                    if let Err(e) = self
                        .builder
                        .txn_field_tag(fields, lexeme[1..].to_string())
                    {
                        return Err(self.build_failed(e, span));
                    }
                }
                Some(Token::Link(lexeme)) => {
                    let Some((_, span)) = self.bump() else { break };
                    if let Err(e) = self
                        .builder
                        .txn_field_link(fields, lexeme[1..].to_string())
                    {
                        return Err(self.build_failed(e, span));
                    }
                }
                _ => break,
            }
        }
        self.expect_eol()
    }

    fn parse_posting(&mut self) -> Reduce<Posting> {
        let start = self.peek_span();

        let flag = match self.peek() {
            Some(token @ (Token::Asterisk | Token::Hash | Token::Flag(_))) => {
                self.bump();
                token.flag_char()
            }
            // A bare uppercase letter is a letter flag only when an account
            // follows; otherwise it stays a currency.
            Some(Token::Currency(c))
                if c.len() == 1 && matches!(self.peek_nth(1), Some(Token::Account(_))) =>
            {
                self.bump();
                c.chars().next()
            }
            _ => None,
        };

        let account = self.expect_account()?;

        let units = match self.peek() {
            _ if self.at_number_start() => {
                let number = self.parse_number_expr()?;
                match self.peek() {
                    Some(Token::Currency(currency)) => {
                        let Some((_, span)) = self.bump() else {
                            return Err(self.unexpected(&["CURRENCY"]));
                        };
                        let amount = self
                            .builder
                            .amount(number, currency)
                            .map_err(|e| self.build_failed(e, span))?;
                        Some(IncompleteAmount::Complete(amount))
                    }
                    _ => Some(IncompleteAmount::NumberOnly(number)),
                }
            }
            Some(Token::Currency(currency)) => {
                self.bump();
                Some(IncompleteAmount::CurrencyOnly(currency.into()))
            }
            _ => None,
        };

        let cost = match self.peek() {
            Some(Token::LCurl | Token::LCurlCurl) => Some(self.parse_cost_spec()?),
            _ => None,
        };

        let price = match self.peek() {
            Some(Token::At | Token::AtAt) => Some(self.parse_price_annotation()?),
            _ => None,
        };

        self.expect_eol()?;

        let loc = self.loc_at(start);
        self.builder
            .posting(&loc, flag, account, units, cost, price)
            .map_err(|e| self.build_failed(e, start))
    }

    /// `{ lot_comp_list }` or `{{ lot_comp_list }}`. Components separate
    /// with commas; `/` is accepted as a separator with a deprecation
    /// notice.
    fn parse_cost_spec(&mut self) -> Reduce<CostSpec> {
        let Some((open, open_span)) = self.bump() else {
            return Err(self.unexpected(&["LCURL"]));
        };
        let is_total = matches!(open, Token::LCurlCurl);
        let close_name = if is_total { "RCURLCURL" } else { "RCURL" };

        let mut components = Vec::new();
        loop {
            match self.peek() {
                Some(Token::RCurl) if !is_total => {
                    self.bump();
                    break;
                }
                Some(Token::RCurlCurl) if is_total => {
                    self.bump();
                    break;
                }
                None | Some(Token::Eol) => return Err(self.unexpected(&[close_name])),
                Some(Token::Comma) => {
                    self.bump();
                }
                Some(Token::Slash) => {
                    let Some((_, span)) = self.bump() else { break };
                    self.report_deprecated("'/' as a cost component separator", span);
                }
                Some(Token::Date(lexeme)) => {
                    let Some((_, span)) = self.bump() else { break };
                    let date = self.date_from_lexeme(lexeme, span)?;
                    components.push(CostComponent::Date(date));
                }
                Some(Token::String(lexeme)) => {
                    self.bump();
                    components.push(CostComponent::Label(unquote(lexeme)));
                }
                Some(Token::Asterisk) => {
                    self.bump();
                    components.push(CostComponent::Merge);
                }
                Some(Token::Hash) => {
                    // Total-only compound: `{# 5 USD}`.
                    let Some((_, span)) = self.bump() else { break };
                    let total = if self.at_number_start() {
                        Some(self.parse_number_expr()?)
                    } else {
                        None
                    };
                    let currency = self.take_currency();
                    let compound = self
                        .builder
                        .compound_amount(None, total, currency.as_deref())
                        .map_err(|e| self.build_failed(e, span))?;
                    components.push(CostComponent::Amount(compound));
                }
                _ if self.at_number_start() => {
                    let number_span = self.peek_span();
                    let per = self.parse_number_expr()?;
                    let mut has_total = false;
                    match self.peek() {
                        Some(Token::Hash) => {
                            self.bump();
                            has_total = true;
                        }
                        Some(Token::Slash) if self.nth_is_number_start(1) => {
                            let Some((_, span)) = self.bump() else { break };
                            self.report_deprecated("'/' separating per-unit and total cost", span);
                            has_total = true;
                        }
                        _ => {}
                    }
                    let total = if has_total && self.at_number_start() {
                        Some(self.parse_number_expr()?)
                    } else {
                        None
                    };
                    let currency = self.take_currency();
                    let compound = self
                        .builder
                        .compound_amount(Some(per), total, currency.as_deref())
                        .map_err(|e| self.build_failed(e, number_span))?;
                    components.push(CostComponent::Amount(compound));
                }
                Some(Token::Currency(currency)) => {
                    let Some((_, span)) = self.bump() else { break };
                    let compound = self
                        .builder
                        .compound_amount(None, None, Some(currency))
                        .map_err(|e| self.build_failed(e, span))?;
                    components.push(CostComponent::Amount(compound));
                }
                _ => {
                    return Err(self.unexpected(&[
                        "NUMBER", "CURRENCY", "DATE", "STRING", "ASTERISK", close_name,
                    ]))
                }
            }
        }

        let span = open_span.merge(&self.last_span);
        let loc = self.loc_at(open_span);
        self.builder
            .cost_spec(&loc, span, components, is_total)
            .map_err(|e| self.build_failed(e, span))
    }

    fn parse_price_annotation(&mut self) -> Reduce<PriceAnnotation> {
        let Some((token, _)) = self.bump() else {
            return Err(self.unexpected(&["AT", "ATAT"]));
        };
        let is_total = matches!(token, Token::AtAt);

        let annotated = if self.at_number_start() {
            let number = self.parse_number_expr()?;
            match self.peek() {
                Some(Token::Currency(currency)) => {
                    let Some((_, span)) = self.bump() else {
                        return Err(self.unexpected(&["CURRENCY"]));
                    };
                    let amount = self
                        .builder
                        .amount(number, currency)
                        .map_err(|e| self.build_failed(e, span))?;
                    Some(IncompleteAmount::Complete(amount))
                }
                _ => Some(IncompleteAmount::NumberOnly(number)),
            }
        } else if let Some(Token::Currency(currency)) = self.peek() {
            self.bump();
            Some(IncompleteAmount::CurrencyOnly(currency.into()))
        } else {
            None
        };

        Ok(match (is_total, annotated) {
            (false, Some(ia)) => PriceAnnotation::Unit(ia),
            (true, Some(ia)) => PriceAnnotation::Total(ia),
            (false, None) => PriceAnnotation::UnitEmpty,
            (true, None) => PriceAnnotation::TotalEmpty,
        })
    }

    fn parse_balance(&mut self, date: NaiveDate, loc: SourceLocation, start: Span) -> Reduce<()> {
        self.bump();
        let account = self.expect_account()?;
        let number = self.parse_number_expr()?;
        let tolerance = match self.peek() {
            Some(Token::Tilde) => {
                self.bump();
                Some(self.parse_number_expr()?)
            }
            _ => None,
        };
        let currency_span = self.peek_span();
        let currency = self.expect_currency()?;
        let amount = self
            .builder
            .amount(number, &currency)
            .map_err(|e| self.build_failed(e, currency_span))?;
        self.expect_eol()?;
        let meta = self.parse_kv_list();

        let span = start.merge(&self.last_span);
        self.builder
            .balance(loc, span, date, account, amount, tolerance, meta)
            .map_err(|e| self.build_failed(e, span))
    }

    fn parse_open(&mut self, date: NaiveDate, loc: SourceLocation, start: Span) -> Reduce<()> {
        self.bump();
        let account = self.expect_account()?;

        let mut currencies = Vec::new();
        if let Some(Token::Currency(currency)) = self.peek() {
            self.bump();
            currencies.push(currency.to_string());
            while matches!(self.peek(), Some(Token::Comma)) {
                self.bump();
                currencies.push(self.expect_currency()?);
            }
        }

        let booking = match self.peek() {
            Some(Token::String(lexeme)) => {
                self.bump();
                Some(unquote(lexeme))
            }
            _ => None,
        };

        self.expect_eol()?;
        let meta = self.parse_kv_list();

        let span = start.merge(&self.last_span);
        self.builder
            .open(loc, span, date, account, currencies, booking, meta)
            .map_err(|e| self.build_failed(e, span))
    }

    fn parse_close(&mut self, date: NaiveDate, loc: SourceLocation, start: Span) -> Reduce<()> {
        self.bump();
        let account = self.expect_account()?;
        self.expect_eol()?;
        let meta = self.parse_kv_list();

        let span = start.merge(&self.last_span);
        self.builder
            .close(loc, span, date, account, meta)
            .map_err(|e| self.build_failed(e, span))
    }

    fn parse_commodity(&mut self, date: NaiveDate, loc: SourceLocation, start: Span) -> Reduce<()> {
        self.bump();
        let currency = self.expect_currency()?;
        self.expect_eol()?;
        let meta = self.parse_kv_list();

        let span = start.merge(&self.last_span);
        self.builder
            .commodity(loc, span, date, currency, meta)
            .map_err(|e| self.build_failed(e, span))
    }

    fn parse_pad(&mut self, date: NaiveDate, loc: SourceLocation, start: Span) -> Reduce<()> {
        self.bump();
        let account = self.expect_account()?;
        let source_account = self.expect_account()?;
        self.expect_eol()?;
        let meta = self.parse_kv_list();

        let span = start.merge(&self.last_span);
        self.builder
            .pad(loc, span, date, account, source_account, meta)
            .map_err(|e| self.build_failed(e, span))
    }

    fn parse_price(&mut self, date: NaiveDate, loc: SourceLocation, start: Span) -> Reduce<()> {
        self.bump();
        let currency = self.expect_currency()?;
        let amount = self.parse_amount()?;
        self.expect_eol()?;
        let meta = self.parse_kv_list();

        let span = start.merge(&self.last_span);
        self.builder
            .price(loc, span, date, currency, amount, meta)
            .map_err(|e| self.build_failed(e, span))
    }

    fn parse_event(&mut self, date: NaiveDate, loc: SourceLocation, start: Span) -> Reduce<()> {
        self.bump();
        let name = self.expect_string()?;
        let value = self.expect_string()?;
        self.expect_eol()?;
        let meta = self.parse_kv_list();

        let span = start.merge(&self.last_span);
        self.builder
            .event(loc, span, date, name, value, meta)
            .map_err(|e| self.build_failed(e, span))
    }

    fn parse_note(&mut self, date: NaiveDate, loc: SourceLocation, start: Span) -> Reduce<()> {
        self.bump();
        let account = self.expect_account()?;
        let comment = self.expect_string()?;
        self.expect_eol()?;
        let meta = self.parse_kv_list();

        let span = start.merge(&self.last_span);
        self.builder
            .note(loc, span, date, account, comment, meta)
            .map_err(|e| self.build_failed(e, span))
    }

    fn parse_document(&mut self, date: NaiveDate, loc: SourceLocation, start: Span) -> Reduce<()> {
        self.bump();
        let account = self.expect_account()?;
        let path = self.expect_string()?;

        let mut tags = Vec::new();
        let mut links = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Tag(lexeme)) => {
                    self.bump();
                    tags.push(lexeme[1..].to_string());
                }
                Some(Token::Link(lexeme)) => {
                    self.bump();
                    links.push(lexeme[1..].to_string());
                }
                _ => break,
            }
        }

        self.expect_eol()?;
        let meta = self.parse_kv_list();

        let span = start.merge(&self.last_span);
        self.builder
            .document(loc, span, date, account, path, tags, links, meta)
            .map_err(|e| self.build_failed(e, span))
    }

    fn parse_query(&mut self, date: NaiveDate, loc: SourceLocation, start: Span) -> Reduce<()> {
        self.bump();
        let name = self.expect_string()?;
        let query = self.expect_string()?;
        self.expect_eol()?;
        let meta = self.parse_kv_list();

        let span = start.merge(&self.last_span);
        self.builder
            .query(loc, span, date, name, query, meta)
            .map_err(|e| self.build_failed(e, span))
    }

    fn parse_custom(&mut self, date: NaiveDate, loc: SourceLocation, start: Span) -> Reduce<()> {
        self.bump();
        let name = self.expect_string()?;
        let mut values = Vec::new();
        while !self.at_line_end() {
            values.push(self.parse_meta_value()?);
        }
        self.expect_eol()?;
        let meta = self.parse_kv_list();

        let span = start.merge(&self.last_span);
        self.builder
            .custom(loc, span, date, name, values, meta)
            .map_err(|e| self.build_failed(e, span))
    }

    // ===== Undated directives =====

    fn parse_option(&mut self) -> Reduce<()> {
        let Some((_, kw_span)) = self.bump() else {
            return Err(self.unexpected(&["OPTION"]));
        };
        let name = self.expect_string()?;
        let value = self.expect_string()?;
        self.expect_eol()?;

        let span = kw_span.merge(&self.last_span);
        let loc = self.loc_at(kw_span);
        self.builder
            .option(loc, span, &name, &value)
            .map_err(|e| self.build_failed(e, span))
    }

    fn parse_include(&mut self) -> Reduce<()> {
        let Some((_, kw_span)) = self.bump() else {
            return Err(self.unexpected(&["INCLUDE"]));
        };
        let filename = self.expect_string()?;
        self.expect_eol()?;

        let span = kw_span.merge(&self.last_span);
        let loc = self.loc_at(kw_span);
        self.builder
            .include(loc, span, filename)
            .map_err(|e| self.build_failed(e, span))
    }

    fn parse_plugin(&mut self) -> Reduce<()> {
        let Some((_, kw_span)) = self.bump() else {
            return Err(self.unexpected(&["PLUGIN"]));
        };
        let name = self.expect_string()?;
        let config = match self.peek() {
            Some(Token::String(lexeme)) => {
                self.bump();
                Some(unquote(lexeme))
            }
            _ => None,
        };
        self.expect_eol()?;

        let span = kw_span.merge(&self.last_span);
        let loc = self.loc_at(kw_span);
        self.builder
            .plugin(loc, span, name, config)
            .map_err(|e| self.build_failed(e, span))
    }

    fn parse_tag_directive(&mut self) -> Reduce<()> {
        let Some((keyword, kw_span)) = self.bump() else {
            return Err(self.unexpected(&["PUSHTAG", "POPTAG"]));
        };
        let tag = match self.peek() {
            Some(Token::Tag(lexeme)) => {
                self.bump();
                lexeme[1..].to_string()
            }
            _ => return Err(self.unexpected(&["TAG"])),
        };
        self.expect_eol()?;

        let span = kw_span.merge(&self.last_span);
        let loc = self.loc_at(kw_span);
        if matches!(keyword, Token::Pushtag) {
            self.builder.pushtag(tag);
        } else {
            self.builder.poptag(&loc, span, &tag);
        }
        Ok(())
    }

    fn parse_meta_directive(&mut self) -> Reduce<()> {
        let Some((keyword, kw_span)) = self.bump() else {
            return Err(self.unexpected(&["PUSHMETA", "POPMETA"]));
        };
        let key = match self.peek() {
            Some(Token::Key(lexeme)) => {
                self.bump();
                lexeme[..lexeme.len() - 1].to_string()
            }
            _ => return Err(self.unexpected(&["KEY"])),
        };
        let is_push = matches!(keyword, Token::Pushmeta);
        let value = if is_push {
            self.parse_meta_value()?
        } else {
            MetaValue::None
        };
        self.expect_eol()?;

        let span = kw_span.merge(&self.last_span);
        let loc = self.loc_at(kw_span);
        if is_push {
            self.builder.pushmeta(key, value);
        } else {
            self.builder.popmeta(&loc, span, &key);
        }
        Ok(())
    }

    // ===== Shared pieces =====

    /// Trailing `key_value` lines attached to a directive.
    ///
    /// A malformed line is reported and skipped; the list keeps going.
    fn parse_kv_list(&mut self) -> Metadata {
        let mut meta = Metadata::new();
        while matches!(self.peek(), Some(Token::Indent)) {
            self.bump();
            match self.peek() {
                None => break,
                Some(Token::Eol) => {
                    self.bump();
                }
                Some(Token::Key(_)) => match self.parse_key_value_line() {
                    Ok((key, value)) => {
                        meta.insert(key, value);
                    }
                    Err(Abort) => self.recover_to_eol(),
                },
                _ => {
                    self.unexpected(&["KEY", "EOL"]);
                    self.recover_to_eol();
                }
            }
        }
        meta
    }

    fn parse_key_value_line(&mut self) -> Reduce<(String, MetaValue)> {
        let Some((Token::Key(lexeme), span)) = self.bump() else {
            return Err(self.unexpected(&["KEY"]));
        };
        let key = &lexeme[..lexeme.len() - 1];
        let value = self.parse_meta_value()?;
        self.expect_eol()?;
        self.builder
            .key_value(key, value)
            .map_err(|e| self.build_failed(e, span))
    }

    /// One polymorphic metadata value. End of line yields
    /// [`MetaValue::None`] without consuming.
    fn parse_meta_value(&mut self) -> Reduce<MetaValue> {
        match self.peek() {
            None | Some(Token::Eol) => Ok(MetaValue::None),
            Some(Token::String(lexeme)) => {
                self.bump();
                Ok(MetaValue::String(unquote(lexeme)))
            }
            Some(Token::Account(lexeme)) => {
                self.bump();
                Ok(MetaValue::Account(lexeme.to_string()))
            }
            Some(Token::Date(lexeme)) => {
                let Some((_, span)) = self.bump() else {
                    return Err(self.unexpected(&["DATE"]));
                };
                Ok(MetaValue::Date(self.date_from_lexeme(lexeme, span)?))
            }
            Some(Token::Tag(lexeme)) => {
                self.bump();
                Ok(MetaValue::Tag(lexeme[1..].to_string()))
            }
            Some(Token::Link(lexeme)) => {
                self.bump();
                Ok(MetaValue::Link(lexeme[1..].to_string()))
            }
            Some(Token::True) => {
                self.bump();
                Ok(MetaValue::Bool(true))
            }
            Some(Token::False) => {
                self.bump();
                Ok(MetaValue::Bool(false))
            }
            _ if self.at_number_start() => {
                let number = self.parse_number_expr()?;
                match self.peek() {
                    Some(Token::Currency(currency)) => {
                        let Some((_, span)) = self.bump() else {
                            return Err(self.unexpected(&["CURRENCY"]));
                        };
                        let amount = self
                            .builder
                            .amount(number, currency)
                            .map_err(|e| self.build_failed(e, span))?;
                        Ok(MetaValue::Amount(amount))
                    }
                    _ => Ok(MetaValue::Number(number)),
                }
            }
            Some(Token::Currency(lexeme)) => {
                self.bump();
                Ok(MetaValue::Currency(lexeme.to_string()))
            }
            _ => Err(self.unexpected(&[
                "STRING", "ACCOUNT", "DATE", "CURRENCY", "TAG", "LINK", "NUMBER", "BOOL", "EOL",
            ])),
        }
    }

    fn parse_amount(&mut self) -> Reduce<Amount> {
        let number = self.parse_number_expr()?;
        let span = self.peek_span();
        let currency = self.expect_currency()?;
        self.builder
            .amount(number, &currency)
            .map_err(|e| self.build_failed(e, span))
    }

    fn take_currency(&mut self) -> Option<String> {
        match self.peek() {
            Some(Token::Currency(lexeme)) => {
                self.bump();
                Some(lexeme.to_string())
            }
            _ => None,
        }
    }

    fn expect_account(&mut self) -> Reduce<String> {
        match self.peek() {
            Some(Token::Account(lexeme)) => {
                self.bump();
                Ok(lexeme.to_string())
            }
            _ => Err(self.unexpected(&["ACCOUNT"])),
        }
    }

    fn expect_currency(&mut self) -> Reduce<String> {
        match self.peek() {
            Some(Token::Currency(lexeme)) => {
                self.bump();
                Ok(lexeme.to_string())
            }
            _ => Err(self.unexpected(&["CURRENCY"])),
        }
    }

    fn expect_string(&mut self) -> Reduce<String> {
        match self.peek() {
            Some(Token::String(lexeme)) => {
                self.bump();
                Ok(unquote(lexeme))
            }
            _ => Err(self.unexpected(&["STRING"])),
        }
    }

    // ===== Literals and number expressions =====

    fn date_from_lexeme(&mut self, lexeme: &str, span: Span) -> Reduce<NaiveDate> {
        // The lexeme shape is fixed by the token regex: 4-2-2 digits.
        let (Ok(year), Ok(month), Ok(day)) = (
            lexeme[0..4].parse::<i32>(),
            lexeme[5..7].parse::<u32>(),
            lexeme[8..10].parse::<u32>(),
        ) else {
            self.report(ParseErrorKind::InvalidDate(lexeme.to_string()), span, &[]);
            return Err(Abort);
        };
        match NaiveDate::from_ymd_opt(year, month, day) {
            Some(date) => Ok(date),
            None => {
                self.report(ParseErrorKind::InvalidDate(lexeme.to_string()), span, &[]);
                Err(Abort)
            }
        }
    }

    fn decimal_from_literal(&mut self, lexeme: &str, span: Span) -> Reduce<Decimal> {
        let cleaned: String = lexeme.chars().filter(|c| *c != ',').collect();
        match Decimal::from_str(&cleaned) {
            Ok(number) => Ok(number),
            Err(_) => {
                self.report(
                    ParseErrorKind::InvalidNumber(lexeme.to_string()),
                    span,
                    &[],
                );
                Err(Abort)
            }
        }
    }

    /// Infix arithmetic over decimals. Precedence: `+ -` < `* /` < unary
    /// sign < parentheses; binaries are left-associative. Division rounds
    /// to the configured scale; everything else is exact.
    fn parse_number_expr(&mut self) -> Reduce<Decimal> {
        self.parse_additive()
    }

    fn parse_additive(&mut self) -> Reduce<Decimal> {
        let mut value = self.parse_multiplicative()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    let Some((_, span)) = self.bump() else { break };
                    let rhs = self.parse_multiplicative()?;
                    value = self.checked_arith(value.checked_add(rhs), span)?;
                }
                Some(Token::Minus) => {
                    let Some((_, span)) = self.bump() else { break };
                    let rhs = self.parse_multiplicative()?;
                    value = self.checked_arith(value.checked_sub(rhs), span)?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_multiplicative(&mut self) -> Reduce<Decimal> {
        let mut value = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(Token::Asterisk) => {
                    let Some((_, span)) = self.bump() else { break };
                    let rhs = self.parse_unary()?;
                    value = self.checked_arith(value.checked_mul(rhs), span)?;
                }
                // `/` is division only when a number follows; in cost specs
                // it doubles as a (deprecated) component separator.
                Some(Token::Slash) if self.nth_is_number_start(1) => {
                    let Some((_, span)) = self.bump() else { break };
                    let rhs = self.parse_unary()?;
                    if rhs.is_zero() {
                        self.report(ParseErrorKind::DivisionByZero, span, &[]);
                        return Err(Abort);
                    }
                    let quotient = self.checked_arith(value.checked_div(rhs), span)?;
                    value = if quotient.scale() > self.config.div_scale {
                        quotient
                            .round_dp_with_strategy(self.config.div_scale, self.config.rounding)
                    } else {
                        quotient
                    };
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_unary(&mut self) -> Reduce<Decimal> {
        match self.peek() {
            Some(Token::Minus) => {
                self.bump();
                Ok(-self.parse_unary()?)
            }
            Some(Token::Plus) => {
                self.bump();
                self.parse_unary()
            }
            Some(Token::LParen) => {
                self.bump();
                let value = self.parse_additive()?;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.bump();
                        Ok(value)
                    }
                    _ => Err(self.unexpected(&["RPAREN"])),
                }
            }
            Some(Token::Number(lexeme)) => {
                let Some((_, span)) = self.bump() else {
                    return Err(self.unexpected(&["NUMBER"]));
                };
                self.decimal_from_literal(lexeme, span)
            }
            _ => Err(self.unexpected(&["NUMBER", "LPAREN", "MINUS", "PLUS"])),
        }
    }

    fn checked_arith(&mut self, value: Option<Decimal>, span: Span) -> Reduce<Decimal> {
        match value {
            Some(v) => Ok(v),
            None => {
                self.report(
                    ParseErrorKind::InvalidNumber("arithmetic overflow".to_string()),
                    span,
                    &[],
                );
                Err(Abort)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{parse, ParseConfig};
    use rust_decimal_macros::dec;
    use tally_core::{Directive, IncompleteAmount};

    fn first_posting_number(source: &str) -> rust_decimal::Decimal {
        let result = parse(source);
        assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
        let Directive::Transaction(txn) = &result.directives[0].value else {
            panic!("expected a transaction");
        };
        match txn.postings[0].units.as_ref().unwrap() {
            IncompleteAmount::Complete(a) => a.number,
            other => panic!("expected complete units, got {other:?}"),
        }
    }

    fn amount_source(expr: &str) -> String {
        format!("2014-01-01 * \"x\"\n  Assets:Cash  {expr} USD\n  Equity:Plug\n")
    }

    #[test]
    fn test_expr_precedence() {
        assert_eq!(first_posting_number(&amount_source("1.5 + 2 * 3")), dec!(7.5));
        assert_eq!(
            first_posting_number(&amount_source("(1.5 + 2) * 3")),
            dec!(10.5)
        );
    }

    #[test]
    fn test_expr_unary_minus() {
        assert_eq!(first_posting_number(&amount_source("-1 - -2")), dec!(1));
        assert_eq!(first_posting_number(&amount_source("- -5")), dec!(5));
    }

    #[test]
    fn test_expr_division_rounds_to_configured_scale() {
        let n = first_posting_number(&amount_source("(100 + 50) / 3"));
        assert_eq!(n, dec!(50));

        let n = first_posting_number(&amount_source("100 / 3"));
        // Carried to at least 8 fractional digits, capped at the configured
        // scale.
        assert!(n.scale() >= 8);
        assert!(n.scale() <= ParseConfig::default().div_scale);
        assert!((n * dec!(3) - dec!(100)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_expr_division_by_zero_reported() {
        let result = parse(&amount_source("1 / 0"));
        assert!(!result.errors.is_empty());
        assert!(result.errors[0].message().contains("division by zero"));
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(first_posting_number(&amount_source("10 - 2 - 3")), dec!(5));
        assert_eq!(first_posting_number(&amount_source("24 / 2 / 3")), dec!(4));
    }

    #[test]
    fn test_thousands_commas_stripped() {
        assert_eq!(
            first_posting_number(&amount_source("1,234,567.89")),
            dec!(1234567.89)
        );
    }
}
