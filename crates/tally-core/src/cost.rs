//! Cost specifications: the `{...}` / `{{...}}` lot annotation on postings.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::intern::InternedStr;

/// The lot attributes written between braces on a posting.
///
/// Every field is optional; the parser records exactly what was written and
/// leaves resolution against actual lots to the ledger engine. Single braces
/// fill `number_per`, double braces fill `number_total`, and the compound
/// form `{per # total CURRENCY}` fills both.
///
/// # Examples
///
/// ```
/// use tally_core::CostSpec;
/// use rust_decimal_macros::dec;
/// use chrono::NaiveDate;
///
/// let spec = CostSpec::default()
///     .with_number_per(dec!(500.00))
///     .with_currency("USD")
///     .with_date(NaiveDate::from_ymd_opt(2014, 4, 1).unwrap())
///     .with_label("lot-A");
///
/// assert_eq!(spec.number_per, Some(dec!(500.00)));
/// assert!(!spec.merge);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CostSpec {
    /// Per-unit cost, from a single-brace spec.
    pub number_per: Option<Decimal>,
    /// Total cost, from a double-brace spec or the compound form.
    pub number_total: Option<Decimal>,
    /// Cost currency.
    pub currency: Option<InternedStr>,
    /// Acquisition date of the lot.
    pub date: Option<NaiveDate>,
    /// Explicit lot label.
    pub label: Option<String>,
    /// Whether the `*` merge marker was written.
    pub merge: bool,
}

impl CostSpec {
    /// Set the per-unit cost.
    #[must_use]
    pub const fn with_number_per(mut self, number: Decimal) -> Self {
        self.number_per = Some(number);
        self
    }

    /// Set the total cost.
    #[must_use]
    pub const fn with_number_total(mut self, number: Decimal) -> Self {
        self.number_total = Some(number);
        self
    }

    /// Set the currency.
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<InternedStr>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    /// Set the acquisition date.
    #[must_use]
    pub const fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Set the lot label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the merge marker.
    #[must_use]
    pub const fn with_merge(mut self) -> Self {
        self.merge = true;
        self
    }

    /// Check whether nothing was written between the braces.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.number_per.is_none()
            && self.number_total.is_none()
            && self.currency.is_none()
            && self.date.is_none()
            && self.label.is_none()
            && !self.merge
    }
}

impl fmt::Display for CostSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Total-only specs render with double braces so they re-parse the
        // same way.
        let total_form = self.number_per.is_none() && self.number_total.is_some();
        let (open, close) = if total_form { ("{{", "}}") } else { ("{", "}") };
        write!(f, "{open}")?;
        let mut sep = "";
        if let Some(per) = self.number_per {
            write!(f, "{per}")?;
            if let Some(total) = self.number_total {
                write!(f, " # {total}")?;
            }
            if let Some(currency) = &self.currency {
                write!(f, " {currency}")?;
            }
            sep = ", ";
        } else if let Some(total) = self.number_total {
            write!(f, "{total}")?;
            if let Some(currency) = &self.currency {
                write!(f, " {currency}")?;
            }
            sep = ", ";
        } else if let Some(currency) = &self.currency {
            write!(f, "{currency}")?;
            sep = ", ";
        }
        if let Some(date) = self.date {
            write!(f, "{sep}{date}")?;
            sep = ", ";
        }
        if let Some(label) = &self.label {
            write!(f, "{sep}\"{label}\"")?;
            sep = ", ";
        }
        if self.merge {
            write!(f, "{sep}*")?;
        }
        write!(f, "{close}")
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
    fn test_empty_spec() {
        assert!(CostSpec::default().is_empty());
        assert!(!CostSpec::default().with_merge().is_empty());
    }

    #[test]
    fn test_display_per_unit() {
        let spec = CostSpec::default()
            .with_number_per(dec!(500.00))
            .with_currency("USD")
            .with_date(date(2014, 4, 1))
            .with_label("lot-A");
        assert_eq!(spec.to_string(), "{500.00 USD, 2014-04-01, \"lot-A\"}");
    }

    #[test]
    fn test_display_total() {
        let spec = CostSpec::default()
            .with_number_total(dec!(5000))
            .with_currency("USD");
        assert_eq!(spec.to_string(), "{{5000 USD}}");
    }

    #[test]
    fn test_display_compound() {
        let spec = CostSpec::default()
            .with_number_per(dec!(100))
            .with_number_total(dec!(120))
            .with_currency("USD");
        assert_eq!(spec.to_string(), "{100 # 120 USD}");
    }
}
