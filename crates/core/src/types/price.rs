//! Type-safe price representation using decimal arithmetic.
//!
//! Catalog prices are whole Vietnamese dong. Discounts are stored as a percent
//! on the product and the sale price is rounded to the nearest dong.

use core::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    /// Amount in the currency's standard unit (dong, not hào).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A price in dong.
    #[must_use]
    pub const fn vnd(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::VND)
    }

    /// Apply a percentage discount and round to whole units.
    ///
    /// Discounts outside `0..=100` are clamped.
    #[must_use]
    pub fn discounted(self, percent: Decimal) -> Self {
        let percent = percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
        let factor = Decimal::ONE - percent / Decimal::ONE_HUNDRED;
        Self {
            amount: round_whole(self.amount * factor),
            currency_code: self.currency_code,
        }
    }

    /// The amount rounded to whole units, as sent to payment providers.
    ///
    /// Saturates at `i64::MAX` for out-of-range amounts.
    #[must_use]
    pub fn whole_units(&self) -> i64 {
        whole_units(self.amount)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.currency_code {
            CurrencyCode::VND => write!(f, "{}₫", group_thousands(self.whole_units())),
            CurrencyCode::USD => write!(f, "${:.2}", self.amount),
        }
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    VND,
    USD,
}

impl CurrencyCode {
    /// The three-letter code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::VND => "VND",
            Self::USD => "USD",
        }
    }
}

/// Round half away from zero to whole units.
#[must_use]
pub fn round_whole(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Round to whole units and convert to `i64`, saturating on overflow.
#[must_use]
pub fn whole_units(amount: Decimal) -> i64 {
    let rounded = round_whole(amount);
    rounded.to_i64().unwrap_or(if rounded.is_sign_negative() {
        i64::MIN
    } else {
        i64::MAX
    })
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}
