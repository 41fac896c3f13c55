//! Round-trip properties: printing a directive and re-parsing it must
//! reproduce the same tree, and number expressions must be invariant under
//! wrapping and double negation.

use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_core::{
    format_directive, Amount, Balance, Close, Commodity, CostSpec, Custom, Directive, Document,
    Event, FormatConfig, IncompleteAmount, MetaValue, Metadata, Note, Open, Pad, Posting, Price,
    PriceAnnotation, Query, Transaction,
};
use tally_parser::parse;

fn roundtrip(directive: &Directive) -> Directive {
    let printed = format_directive(directive, &FormatConfig::default());
    let result = parse(&printed);
    assert!(
        result.errors.is_empty(),
        "printed form failed to parse:\n{printed}\nerrors: {:?}",
        result.errors
    );
    assert_eq!(
        result.directives.len(),
        1,
        "printed form produced {} directives:\n{printed}",
        result.directives.len()
    );
    result.directives.into_iter().next().unwrap().value
}

// ===== Strategies =====

fn date_strategy() -> impl Strategy<Value = chrono::NaiveDate> {
    (1990i32..2100, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn decimal_strategy() -> impl Strategy<Value = Decimal> {
    (-1_000_000_000i64..1_000_000_000, 0u32..=4).prop_map(|(m, s)| Decimal::new(m, s))
}

fn positive_decimal_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000_000, 0u32..=4).prop_map(|(m, s)| Decimal::new(m, s))
}

fn currency_strategy() -> impl Strategy<Value = String> {
    // TRUE and FALSE lex as boolean literals, never as currencies.
    "[A-Z]{2,6}".prop_filter("boolean literals are not currencies", |s| {
        s != "TRUE" && s != "FALSE"
    })
}

fn account_strategy() -> impl Strategy<Value = String> {
    ("[A-Z][a-z]{1,8}", "[A-Z][a-z0-9]{1,8}")
        .prop_map(|(a, b)| format!("Assets:{a}:{b}"))
}

fn text_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,'-]{0,20}".prop_map(|s| s)
}

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,10}".prop_map(|s| s)
}

/// Tag and link names on a transaction form a set, so generate without
/// duplicates.
fn unique_names(max: usize) -> impl Strategy<Value = Vec<String>> {
    proptest::collection::btree_set(name_strategy(), 0..max)
        .prop_map(|names| names.into_iter().collect())
}

fn amount_strategy() -> impl Strategy<Value = Amount> {
    (decimal_strategy(), currency_strategy()).prop_map(|(n, c)| Amount::new(n, c))
}

fn meta_value_strategy() -> impl Strategy<Value = MetaValue> {
    prop_oneof![
        text_strategy().prop_map(MetaValue::String),
        decimal_strategy().prop_map(MetaValue::Number),
        any::<bool>().prop_map(MetaValue::Bool),
        date_strategy().prop_map(MetaValue::Date),
        amount_strategy().prop_map(MetaValue::Amount),
        account_strategy().prop_map(MetaValue::Account),
        name_strategy().prop_map(MetaValue::Tag),
        name_strategy().prop_map(MetaValue::Link),
        Just(MetaValue::None),
    ]
}

fn metadata_strategy() -> impl Strategy<Value = Metadata> {
    proptest::collection::hash_map(name_strategy(), meta_value_strategy(), 0..3)
}

fn cost_spec_strategy() -> impl Strategy<Value = CostSpec> {
    (
        proptest::option::of(positive_decimal_strategy()),
        any::<bool>(),
        proptest::option::of(currency_strategy()),
        proptest::option::of(date_strategy()),
        proptest::option::of(text_strategy()),
        any::<bool>(),
    )
        .prop_map(|(number, as_total, currency, date, label, merge)| {
            let mut spec = CostSpec::default();
            if as_total {
                spec.number_total = number;
            } else {
                spec.number_per = number;
            }
            spec.currency = currency.map(Into::into);
            spec.date = date;
            spec.label = label;
            spec.merge = merge;
            spec
        })
}

fn units_strategy() -> impl Strategy<Value = Option<IncompleteAmount>> {
    prop_oneof![
        Just(None),
        amount_strategy().prop_map(|a| Some(IncompleteAmount::Complete(a))),
        decimal_strategy().prop_map(|n| Some(IncompleteAmount::NumberOnly(n))),
        currency_strategy().prop_map(|c| Some(IncompleteAmount::CurrencyOnly(c.into()))),
    ]
}

fn price_strategy() -> impl Strategy<Value = PriceAnnotation> {
    prop_oneof![
        amount_strategy().prop_map(|a| PriceAnnotation::Unit(IncompleteAmount::Complete(a))),
        amount_strategy().prop_map(|a| PriceAnnotation::Total(IncompleteAmount::Complete(a))),
        Just(PriceAnnotation::UnitEmpty),
        Just(PriceAnnotation::TotalEmpty),
    ]
}

fn posting_strategy() -> impl Strategy<Value = Posting> {
    (
        account_strategy(),
        units_strategy(),
        proptest::option::of(cost_spec_strategy()),
        proptest::option::of(price_strategy()),
        proptest::option::of(Just('!')),
        metadata_strategy(),
    )
        .prop_map(|(account, units, cost, price, flag, meta)| {
            // Cost and price annotations only follow written units.
            let (cost, price) = if units.is_some() {
                (cost, price)
            } else {
                (None, None)
            };
            Posting {
                flag,
                account,
                units,
                cost,
                price,
                meta,
            }
        })
}

fn transaction_strategy() -> impl Strategy<Value = Transaction> {
    (
        date_strategy(),
        prop_oneof![Just('*'), Just('!')],
        proptest::option::of(text_strategy()),
        text_strategy(),
        unique_names(3),
        unique_names(2),
        metadata_strategy(),
        proptest::collection::vec(posting_strategy(), 0..4),
    )
        .prop_map(
            |(date, flag, payee, narration, tags, links, meta, postings)| Transaction {
                date,
                flag,
                payee,
                narration,
                tags,
                links,
                postings,
                meta,
            },
        )
}

fn directive_strategy() -> impl Strategy<Value = Directive> {
    prop_oneof![
        transaction_strategy().prop_map(Directive::Transaction),
        (date_strategy(), account_strategy(), amount_strategy(),
         proptest::option::of(positive_decimal_strategy()), metadata_strategy())
            .prop_map(|(date, account, amount, tolerance, meta)| {
                let mut bal = Balance::new(date, account, amount);
                bal.tolerance = tolerance;
                bal.meta = meta;
                Directive::Balance(bal)
            }),
        (date_strategy(), account_strategy(),
         proptest::collection::vec(currency_strategy(), 0..3),
         proptest::option::of("[A-Z]{4,8}".prop_map(|s| s)), metadata_strategy())
            .prop_map(|(date, account, currencies, booking, meta)| {
                let mut open = Open::new(date, account).with_currencies(currencies);
                open.booking = booking;
                open.meta = meta;
                Directive::Open(open)
            }),
        (date_strategy(), account_strategy(), metadata_strategy()).prop_map(
            |(date, account, meta)| {
                let mut close = Close::new(date, account);
                close.meta = meta;
                Directive::Close(close)
            }
        ),
        (date_strategy(), currency_strategy(), metadata_strategy()).prop_map(
            |(date, currency, meta)| {
                let mut commodity = Commodity::new(date, currency);
                commodity.meta = meta;
                Directive::Commodity(commodity)
            }
        ),
        (date_strategy(), account_strategy(), account_strategy(), metadata_strategy())
            .prop_map(|(date, account, source, meta)| {
                let mut pad = Pad::new(date, account, source);
                pad.meta = meta;
                Directive::Pad(pad)
            }),
        (date_strategy(), currency_strategy(), amount_strategy(), metadata_strategy())
            .prop_map(|(date, currency, amount, meta)| {
                let mut price = Price::new(date, currency, amount);
                price.meta = meta;
                Directive::Price(price)
            }),
        (date_strategy(), text_strategy(), text_strategy(), metadata_strategy())
            .prop_map(|(date, name, value, meta)| {
                let mut event = Event::new(date, name, value);
                event.meta = meta;
                Directive::Event(event)
            }),
        (date_strategy(), account_strategy(), text_strategy(), metadata_strategy())
            .prop_map(|(date, account, comment, meta)| {
                let mut note = Note::new(date, account, comment);
                note.meta = meta;
                Directive::Note(note)
            }),
        (date_strategy(), account_strategy(), text_strategy(),
         proptest::collection::vec(name_strategy(), 0..2), metadata_strategy())
            .prop_map(|(date, account, path, tags, meta)| {
                let mut doc = Document::new(date, account, path);
                doc.tags = tags;
                doc.meta = meta;
                Directive::Document(doc)
            }),
        (date_strategy(), text_strategy(), text_strategy(), metadata_strategy())
            .prop_map(|(date, name, query, meta)| {
                let mut q = Query::new(date, name, query);
                q.meta = meta;
                Directive::Query(q)
            }),
        (date_strategy(), text_strategy(),
         proptest::collection::vec(
             prop_oneof![
                 text_strategy().prop_map(MetaValue::String),
                 any::<bool>().prop_map(MetaValue::Bool),
                 date_strategy().prop_map(MetaValue::Date),
                 amount_strategy().prop_map(MetaValue::Amount),
                 account_strategy().prop_map(MetaValue::Account),
             ],
             0..3,
         ),
         metadata_strategy())
            .prop_map(|(date, name, values, meta)| {
                let mut custom = Custom::new(date, name);
                custom.values = values;
                custom.meta = meta;
                Directive::Custom(custom)
            }),
    ]
}

// ===== Properties =====

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn roundtrip_directive(directive in directive_strategy()) {
        let reparsed = roundtrip(&directive);
        prop_assert_eq!(reparsed, directive);
    }

    #[test]
    fn number_invariant_under_parens_and_double_negation(n in decimal_strategy()) {
        let plain = parse(&format!("2014-08-01 balance Assets:Cash {n} USD\n"));
        let wrapped = parse(&format!("2014-08-01 balance Assets:Cash ({n}) USD\n"));
        let negated = parse(&format!("2014-08-01 balance Assets:Cash - -{n} USD\n"));
        prop_assert!(plain.errors.is_empty());
        prop_assert!(wrapped.errors.is_empty());
        prop_assert!(negated.errors.is_empty());
        let value = |r: &tally_parser::ParseResult| match &r.directives[0].value {
            Directive::Balance(b) => b.amount.number,
            other => panic!("expected balance, got {other:?}"),
        };
        prop_assert_eq!(value(&plain), value(&wrapped));
        prop_assert_eq!(value(&plain), value(&negated));
    }

    #[test]
    fn directives_never_lose_source_order(count in 1usize..6) {
        let mut source = String::new();
        for i in 0..count {
            source.push_str(&format!("2014-01-{:02} open Assets:Cash:Box{i}\n", i + 1));
        }
        let result = parse(&source);
        prop_assert!(result.errors.is_empty());
        prop_assert_eq!(result.directives.len(), count);
        for (i, located) in result.directives.iter().enumerate() {
            prop_assert_eq!(located.loc.line as usize, i + 1);
        }
    }
}
