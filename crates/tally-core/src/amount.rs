//! Amount types: a decimal quantity paired with a currency.
//!
//! [`Amount`] is the complete form produced wherever the grammar requires
//! both a number and a currency. [`IncompleteAmount`] is what a posting may
//! carry before interpolation: either component can be elided in the
//! source.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use crate::intern::InternedStr;

/// A quantity paired with a currency.
///
/// The decimal keeps the scale it was written with: `1.30 USD` carries two
/// fractional digits, `1.3 USD` one. Arithmetic between amounts is only
/// meaningful within a single currency; mixing currencies is a caller bug
/// and trips a debug assertion.
///
/// # Examples
///
/// ```
/// use tally_core::Amount;
/// use rust_decimal_macros::dec;
///
/// let paid = Amount::new(dec!(-37.45), "USD");
/// assert_eq!(paid.currency, "USD");
/// assert_eq!(paid.abs().number, dec!(37.45));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    /// The decimal quantity.
    pub number: Decimal,
    /// The currency code (e.g. "USD", "HOOL").
    pub currency: InternedStr,
}

impl Amount {
    /// Create a new amount.
    #[must_use]
    pub fn new(number: Decimal, currency: impl Into<InternedStr>) -> Self {
        Self {
            number,
            currency: currency.into(),
        }
    }

    /// The number of fractional digits as written.
    #[must_use]
    pub const fn scale(&self) -> u32 {
        self.number.scale()
    }

    /// Absolute value, same currency.
    #[must_use]
    pub fn abs(&self) -> Self {
        Self::new(self.number.abs(), self.currency.clone())
    }

    /// Compare with another amount under an explicit tolerance.
    ///
    /// Amounts in different currencies are never near each other.
    #[must_use]
    pub fn is_near(&self, other: &Self, tolerance: Decimal) -> bool {
        if self.currency != other.currency {
            return false;
        }
        (self.number - other.number).abs() <= tolerance
    }

    fn require_same_currency(&self, other: &Self) {
        debug_assert!(
            self.currency == other.currency,
            "currency mismatch: {} vs {}",
            self.currency,
            other.currency
        );
    }
}

// Arithmetic consumes the left operand and reuses its currency; the
// reference forms below delegate through clones.

impl Add for Amount {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self.require_same_currency(&rhs);
        self.number += rhs.number;
        self
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(mut self, rhs: Self) -> Self {
        self.require_same_currency(&rhs);
        self.number -= rhs.number;
        self
    }
}

impl Neg for Amount {
    type Output = Self;

    fn neg(mut self) -> Self {
        self.number = -self.number;
        self
    }
}

impl Add for &Amount {
    type Output = Amount;

    fn add(self, rhs: &Amount) -> Amount {
        self.clone() + rhs.clone()
    }
}

impl Sub for &Amount {
    type Output = Amount;

    fn sub(self, rhs: &Amount) -> Amount {
        self.clone() - rhs.clone()
    }
}

impl Neg for &Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        -self.clone()
    }
}

impl AddAssign<&Self> for Amount {
    fn add_assign(&mut self, rhs: &Self) {
        self.require_same_currency(rhs);
        self.number += rhs.number;
    }
}

impl SubAssign<&Self> for Amount {
    fn sub_assign(&mut self, rhs: &Self) {
        self.require_same_currency(rhs);
        self.number -= rhs.number;
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.currency)
    }
}

/// A posting amount as written, before interpolation.
///
/// The source may elide either component of a posting's units:
///
/// - `100.00 USD` — complete
/// - `100.00` — number only, currency inferred from context
/// - `USD` — currency only, number interpolated to balance
///
/// A posting with no units at all carries `None` instead of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncompleteAmount {
    /// Both number and currency present.
    Complete(Amount),
    /// Only the number was written.
    NumberOnly(Decimal),
    /// Only the currency was written.
    CurrencyOnly(InternedStr),
}

impl IncompleteAmount {
    /// Build the complete form.
    #[must_use]
    pub fn complete(number: Decimal, currency: impl Into<InternedStr>) -> Self {
        Self::Complete(Amount::new(number, currency))
    }

    /// The currency, if one was written.
    #[must_use]
    pub fn currency(&self) -> Option<&str> {
        match self {
            Self::Complete(a) => Some(&a.currency),
            Self::CurrencyOnly(c) => Some(c),
            Self::NumberOnly(_) => None,
        }
    }

    /// The number, if one was written.
    #[must_use]
    pub const fn number(&self) -> Option<Decimal> {
        match self {
            Self::Complete(a) => Some(a.number),
            Self::NumberOnly(n) => Some(*n),
            Self::CurrencyOnly(_) => None,
        }
    }

    /// Borrow the complete amount, if this is one.
    #[must_use]
    pub const fn as_amount(&self) -> Option<&Amount> {
        match self {
            Self::Complete(a) => Some(a),
            _ => None,
        }
    }
}

impl From<Amount> for IncompleteAmount {
    fn from(amount: Amount) -> Self {
        Self::Complete(amount)
    }
}

impl fmt::Display for IncompleteAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete(a) => write!(f, "{a}"),
            Self::NumberOnly(n) => write!(f, "{n}"),
            Self::CurrencyOnly(c) => write!(f, "{c}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_arithmetic() {
        let a = Amount::new(dec!(100.00), "USD");
        let b = Amount::new(dec!(37.45), "USD");
        assert_eq!((&a - &b).number, dec!(62.55));
        assert_eq!((&a + &b).number, dec!(137.45));
        assert_eq!((-&a).number, dec!(-100.00));

        let mut running = a.clone();
        running += &b;
        assert_eq!(running.number, dec!(137.45));
        running -= &b;
        assert_eq!(running.number, a.number);
    }

    #[test]
    fn test_amount_preserves_scale() {
        let a = Amount::new(dec!(1.30), "USD");
        assert_eq!(a.scale(), 2);
        assert_eq!(a.to_string(), "1.30 USD");
    }

    #[test]
    fn test_is_near() {
        let a = Amount::new(dec!(1234.00), "USD");
        let b = Amount::new(dec!(1234.015), "USD");
        assert!(a.is_near(&b, dec!(0.02)));
        assert!(!a.is_near(&b, dec!(0.01)));
        assert!(!a.is_near(&Amount::new(dec!(1234.00), "EUR"), dec!(1)));
    }

    #[test]
    fn test_incomplete_amount_components() {
        let complete = IncompleteAmount::complete(dec!(5), "CAD");
        assert_eq!(complete.number(), Some(dec!(5)));
        assert_eq!(complete.currency(), Some("CAD"));

        let number_only = IncompleteAmount::NumberOnly(dec!(5));
        assert_eq!(number_only.number(), Some(dec!(5)));
        assert_eq!(number_only.currency(), None);
        assert!(number_only.as_amount().is_none());

        let currency_only = IncompleteAmount::CurrencyOnly("CAD".into());
        assert_eq!(currency_only.number(), None);
        assert_eq!(currency_only.currency(), Some("CAD"));
    }
}
