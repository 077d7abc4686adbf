//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are kept at full precision and only rounded when displayed or when
//! a derived amount (such as a line subtotal) is presented to the shopper.
//! Rounding follows the currency's convention: Colombian pesos have no minor
//! unit on the storefront, so COP amounts render with zero decimal places.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., pesos, not centavos).
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

    /// Round the amount to the currency's display precision.
    ///
    /// Midpoints round away from zero, matching how the storefront formats
    /// prices.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            amount: self.amount.round_dp_with_strategy(
                self.currency_code.decimal_places(),
                RoundingStrategy::MidpointAwayFromZero,
            ),
            currency_code: self.currency_code,
        }
    }

    /// Format for display (e.g., `$20.000` for COP, `$1,234.50` for USD).
    #[must_use]
    pub fn display(&self) -> String {
        let places = self.currency_code.decimal_places() as usize;
        let rounded = self.rounded().amount;
        let (thousands, decimal) = self.currency_code.separators();

        let fixed = format!("{:.places$}", rounded.abs());
        let (integer, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));

        let mut out = String::with_capacity(fixed.len() + 4);
        if rounded.is_sign_negative() && !rounded.is_zero() {
            out.push('-');
        }
        out.push_str(self.currency_code.symbol());
        out.push_str(&group_digits(integer, thousands));
        if !fraction.is_empty() {
            out.push(decimal);
            out.push_str(fraction);
        }
        out
    }
}

/// Insert a thousands separator every three digits from the right.
fn group_digits(digits: &str, separator: char) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(ch);
    }
    out
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    COP,
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// Number of decimal places shown to shoppers.
    #[must_use]
    pub const fn decimal_places(self) -> u32 {
        match self {
            Self::COP => 0,
            Self::USD | Self::EUR | Self::GBP | Self::CAD | Self::AUD => 2,
        }
    }

    /// Currency symbol used as a display prefix.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::COP | Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// Thousands and decimal separators for the currency's locale.
    const fn separators(self) -> (char, char) {
        match self {
            Self::COP | Self::EUR => ('.', ','),
            Self::USD | Self::GBP | Self::CAD | Self::AUD => (',', '.'),
        }
    }
}
