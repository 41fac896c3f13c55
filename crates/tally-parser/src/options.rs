//! Option directive storage and validation.
//!
//! The core parses `option` directives and records them; it never acts on
//! the values. Validation problems are returned to the caller as error
//! kinds so the builder can attach locations.

use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use crate::error::ParseErrorKind;

/// Option names the core knows about.
const KNOWN_OPTIONS: &[&str] = &[
    "title",
    "name_assets",
    "name_liabilities",
    "name_equity",
    "name_income",
    "name_expenses",
    "account_previous_balances",
    "account_current_earnings",
    "conversion_currency",
    "inferred_tolerance_default",
    "inferred_tolerance_multiplier",
    "infer_tolerance_from_cost",
    "insert_pythonpath",
    "render_commas",
    "plugin_processing_mode",
    "booking_method",
    "operating_currency",
];

/// Options that may be specified more than once.
const REPEATABLE_OPTIONS: &[&str] = &[
    "operating_currency",
    "insert_pythonpath",
    "inferred_tolerance_default",
];

/// Values recorded from `option` directives.
///
/// Defaults follow the ledger language conventions; every field is data the
/// embedder interprets.
#[derive(Debug, Clone)]
pub struct Options {
    /// Ledger title.
    pub title: Option<String>,
    /// Root name for asset accounts.
    pub name_assets: String,
    /// Root name for liability accounts.
    pub name_liabilities: String,
    /// Root name for equity accounts.
    pub name_equity: String,
    /// Root name for income accounts.
    pub name_income: String,
    /// Root name for expense accounts.
    pub name_expenses: String,
    /// Account receiving opening balances.
    pub account_previous_balances: String,
    /// Account receiving current earnings.
    pub account_current_earnings: String,
    /// Currency used for conversions.
    pub conversion_currency: Option<String>,
    /// Default tolerances per currency (`"USD:0.005"` or `"*:0.001"`).
    pub inferred_tolerance_default: HashMap<String, Decimal>,
    /// Multiplier applied to inferred tolerances.
    pub inferred_tolerance_multiplier: Decimal,
    /// Whether tolerance may be inferred from cost.
    pub infer_tolerance_from_cost: bool,
    /// Extra plugin search paths.
    pub insert_pythonpath: Vec<String>,
    /// Whether amounts render with thousands commas.
    pub render_commas: bool,
    /// Plugin processing mode.
    pub plugin_processing_mode: Option<String>,
    /// Default booking method.
    pub booking_method: String,
    /// Operating currencies, in order of declaration.
    pub operating_currency: Vec<String>,
    /// Options with names the core does not know.
    pub custom: HashMap<String, String>,
    /// Names already set, for duplicate detection.
    set_options: HashSet<String>,
}

impl Options {
    /// Options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            title: None,
            name_assets: "Assets".to_string(),
            name_liabilities: "Liabilities".to_string(),
            name_equity: "Equity".to_string(),
            name_income: "Income".to_string(),
            name_expenses: "Expenses".to_string(),
            account_previous_balances: "Equity:Opening-Balances".to_string(),
            account_current_earnings: "Equity:Earnings:Current".to_string(),
            conversion_currency: None,
            inferred_tolerance_default: HashMap::new(),
            inferred_tolerance_multiplier: Decimal::new(5, 1), // 0.5
            infer_tolerance_from_cost: false,
            insert_pythonpath: Vec::new(),
            render_commas: false,
            plugin_processing_mode: None,
            booking_method: "STRICT".to_string(),
            operating_currency: Vec::new(),
            custom: HashMap::new(),
            set_options: HashSet::new(),
        }
    }

    /// Record an option, returning any validation problems.
    pub fn set(&mut self, key: &str, value: &str) -> Vec<ParseErrorKind> {
        let mut problems = Vec::new();

        let is_known = KNOWN_OPTIONS.contains(&key);
        if !is_known {
            problems.push(ParseErrorKind::UnknownOption(key.to_string()));
        }
        if is_known
            && !REPEATABLE_OPTIONS.contains(&key)
            && self.set_options.contains(key)
        {
            problems.push(ParseErrorKind::DuplicateOption(key.to_string()));
        }
        self.set_options.insert(key.to_string());

        let invalid = |problems: &mut Vec<ParseErrorKind>| {
            problems.push(ParseErrorKind::InvalidOptionValue {
                option: key.to_string(),
                value: value.to_string(),
            });
        };

        match key {
            "title" => self.title = Some(value.to_string()),
            "name_assets" => self.name_assets = value.to_string(),
            "name_liabilities" => self.name_liabilities = value.to_string(),
            "name_equity" => self.name_equity = value.to_string(),
            "name_income" => self.name_income = value.to_string(),
            "name_expenses" => self.name_expenses = value.to_string(),
            "account_previous_balances" => {
                self.account_previous_balances = value.to_string();
            }
            "account_current_earnings" => {
                self.account_current_earnings = value.to_string();
            }
            "conversion_currency" => self.conversion_currency = Some(value.to_string()),
            "inferred_tolerance_default" => {
                // CURRENCY:TOLERANCE, with "*" as the wildcard currency.
                match value.split_once(':') {
                    Some((currency, tolerance)) => match Decimal::from_str(tolerance) {
                        Ok(d) => {
                            self.inferred_tolerance_default
                                .insert(currency.to_string(), d);
                        }
                        Err(_) => invalid(&mut problems),
                    },
                    None => invalid(&mut problems),
                }
            }
            "inferred_tolerance_multiplier" => match Decimal::from_str(value) {
                Ok(d) => self.inferred_tolerance_multiplier = d,
                Err(_) => invalid(&mut problems),
            },
            "infer_tolerance_from_cost" => match parse_bool(value) {
                Some(b) => self.infer_tolerance_from_cost = b,
                None => invalid(&mut problems),
            },
            "insert_pythonpath" => self.insert_pythonpath.push(value.to_string()),
            "render_commas" => match parse_bool(value) {
                Some(b) => self.render_commas = b,
                None => invalid(&mut problems),
            },
            "plugin_processing_mode" => {
                self.plugin_processing_mode = Some(value.to_string());
            }
            "booking_method" => {
                let valid = ["STRICT", "FIFO", "LIFO", "HIFO", "AVERAGE", "NONE"];
                if !valid.contains(&value.to_uppercase().as_str()) {
                    invalid(&mut problems);
                }
                self.booking_method = value.to_string();
            }
            "operating_currency" => self.operating_currency.push(value.to_string()),
            _ => {
                self.custom.insert(key.to_string(), value.to_string());
            }
        }

        problems
    }

    /// Look up an unknown-name option.
    #[must_use]
    pub fn get_custom(&self, key: &str) -> Option<&str> {
        self.custom.get(key).map(String::as_str)
    }

    /// The five root account names.
    #[must_use]
    pub fn account_roots(&self) -> [&str; 5] {
        [
            &self.name_assets,
            &self.name_liabilities,
            &self.name_equity,
            &self.name_income,
            &self.name_expenses,
        ]
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
