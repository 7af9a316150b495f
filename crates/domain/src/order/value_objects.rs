//! Value objects for the order domain.

use serde::{Deserialize, Serialize};

use crate::error::MoneyError;

/// Money amount represented in cents to avoid floating point drift.
///
/// On the wire amounts travel as decimal numbers in major units (`10.5` is
/// ten and a half), which is what the pricing service and API clients speak.
/// Arithmetic is checked: amounts come from outside the service and an
/// overflow is reported as [`MoneyError::Overflow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Money {
    /// Amount in cents (e.g., 1000 = 10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a Money amount from a major-unit decimal, rounding to the
    /// nearest cent.
    ///
    /// NaN, infinities and values beyond the cent range are rejected.
    pub fn from_major(amount: f64) -> Result<Self, MoneyError> {
        if !amount.is_finite() {
            return Err(MoneyError::NotFinite(amount));
        }
        let cents = (amount * 100.0).round();
        // i64::MAX is not representable; as f64 it rounds up to 2^63.
        if cents < i64::MIN as f64 || cents >= i64::MAX as f64 {
            return Err(MoneyError::OutOfRange(amount));
        }
        Ok(Self {
            cents: cents as i64,
        })
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the amount as a major-unit decimal.
    pub fn as_major(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Result<Money, MoneyError> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
            .ok_or(MoneyError::Overflow)
    }

    /// Adds two amounts.
    pub fn checked_add(&self, rhs: Money) -> Result<Money, MoneyError> {
        self.cents
            .checked_add(rhs.cents)
            .map(Money::from_cents)
            .ok_or(MoneyError::Overflow)
    }

    /// Sums amounts, failing on the first overflow.
    pub fn try_sum<I>(amounts: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }

    /// Divides evenly by a quantity, returning `None` for a zero quantity.
    ///
    /// Used to recover per-unit amounts from stored line totals, which are
    /// always exact multiples of the quantity.
    pub fn per_unit(&self, quantity: u32) -> Option<Money> {
        (quantity > 0).then(|| Money {
            cents: self.cents / i64::from(quantity),
        })
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl TryFrom<f64> for Money {
    type Error = MoneyError;

    fn try_from(amount: f64) -> Result<Self, Self::Error> {
        Money::from_major(amount)
    }
}

impl From<Money> for f64 {
    fn from(money: Money) -> Self {
        money.as_major()
    }
}

/// Per-unit pricing for a product as reported by the pricing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitPricing {
    /// Price of one unit after markup and discount.
    pub final_price: Money,
    /// Markup applied to one unit.
    pub markup: Money,
    /// Discount applied to one unit.
    pub discount: Money,
}

impl UnitPricing {
    /// Creates unit pricing from its three components.
    pub fn new(final_price: Money, markup: Money, discount: Money) -> Self {
        Self {
            final_price,
            markup,
            discount,
        }
    }
}
