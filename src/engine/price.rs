//! Quote normalization: Kalshi prices arrive as integer cents (82) or as a
//! decimal probability (0.82). Everything past this point works on `Price`.

use crate::error::EngineError;
use std::fmt;

const SCALE: u32 = 10_000;

/// A binary-contract price strictly inside (0, 1), stored in ten-thousandths
/// of a dollar so fee math stays in integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(u32);

impl Price {
    /// Accept either representation. Values <= 1 are decimal, values > 1 are cents.
    pub fn from_quote(quote: f64) -> Result<Self, EngineError> {
        if !quote.is_finite() || quote <= 0.0 {
            return Err(EngineError::InvalidPrice(quote));
        }
        let decimal = if quote > 1.0 { quote / 100.0 } else { quote };
        let scaled = (decimal * SCALE as f64).round();
        if scaled <= 0.0 || scaled >= SCALE as f64 {
            return Err(EngineError::InvalidPrice(quote));
        }
        Ok(Self(scaled as u32))
    }

    /// Venue-native integer cents (1-99).
    pub fn from_cents(cents: u32) -> Result<Self, EngineError> {
        if cents == 0 || cents >= 100 {
            return Err(EngineError::InvalidPrice(cents as f64));
        }
        Ok(Self(cents * 100))
    }

    pub fn as_decimal(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    /// Nearest whole cent.
    pub fn cents(self) -> u32 {
        (self.0 + 50) / 100
    }

    pub fn ten_thousandths(self) -> u32 {
        self.0
    }

    /// Whole contracts affordable with `dollars`, computed on integer cents.
    pub fn contracts_for(self, dollars: f64) -> u32 {
        if dollars.is_nan() || dollars <= 0.0 {
            return 0;
        }
        let budget_cents = (dollars * 100.0).round() as u64;
        u32::try_from(budget_cents.saturating_mul(100) / self.0 as u64).unwrap_or(u32::MAX)
    }

    /// Price of the complementary side (1 - P).
    pub fn complement(self) -> Self {
        Self(SCALE - self.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 100 == 0 {
            write!(f, "{}¢", self.0 / 100)
        } else {
            write!(f, "{:.2}¢", self.0 as f64 / 100.0)
        }
    }
}
