//! Exact decimal newtypes for money and shares.
//!
//! Binary floats never touch price, size, notional, or balance math. Scores
//! and confidences (always in `[0, 1]` after monetary math is finished) are
//! the one place `f64` is permitted.

use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price in `[0, 1]`, quoted in the market's outcome-share units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

/// A share size or USDC amount, always non-negative in practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Usdc(pub Decimal);

macro_rules! decimal_newtype_core {
    ($ty:ident) => {
        impl $ty {
            pub const ZERO: $ty = $ty(Decimal::ZERO);
            pub const ONE: $ty = $ty(Decimal::ONE);

            pub fn new(value: Decimal) -> Self {
                Self(value)
            }

            pub fn inner(self) -> Decimal {
                self.0
            }

            pub fn is_zero(self) -> bool {
                self.0.is_zero()
            }

            pub fn is_positive(self) -> bool {
                self.0.is_sign_positive() && !self.0.is_zero()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $ty {
            type Err = rust_decimal::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Decimal::from_str(s)?))
            }
        }

        impl From<Decimal> for $ty {
            fn from(value: Decimal) -> Self {
                Self(value)
            }
        }

        impl Add for $ty {
            type Output = $ty;
            fn add(self, rhs: $ty) -> $ty {
                $ty(self.0 + rhs.0)
            }
        }

        impl Sub for $ty {
            type Output = $ty;
            fn sub(self, rhs: $ty) -> $ty {
                $ty(self.0 - rhs.0)
            }
        }

        impl Mul<Decimal> for $ty {
            type Output = $ty;
            fn mul(self, rhs: Decimal) -> $ty {
                $ty(self.0 * rhs)
            }
        }

        impl Div<Decimal> for $ty {
            type Output = $ty;
            fn div(self, rhs: Decimal) -> $ty {
                $ty(self.0 / rhs)
            }
        }
    };
}

decimal_newtype_core!(Price);
decimal_newtype_core!(Usdc);

impl Price {
    /// Basis points above a reference price: `(self - other) / other * 10_000`.
    pub fn bps_from(self, other: Price) -> Decimal {
        if other.0.is_zero() {
            return Decimal::ZERO;
        }
        (self.0 - other.0) / other.0 * Decimal::from(10_000)
    }
}

impl Usdc {
    /// Notional value of `self` shares at `price`.
    pub fn notional(self, price: Price) -> Usdc {
        Usdc(self.0 * price.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn price_bps_from() {
        let a = Price(dec!(0.51));
        let b = Price(dec!(0.50));
        assert_eq!(a.bps_from(b), dec!(200.00));
    }

    #[test]
    fn usdc_notional() {
        let size = Usdc(dec!(200000));
        let price = Price(dec!(0.075));
        assert_eq!(size.notional(price), Usdc(dec!(15000.000)));
    }

    #[test]
    fn zero_and_positive() {
        assert!(Price::ZERO.is_zero());
        assert!(!Price::ZERO.is_positive());
        assert!(Price::ONE.is_positive());
    }

    #[test]
    fn display_and_parse_roundtrip() {
        let p: Price = "0.42".parse().unwrap();
        assert_eq!(p.to_string(), "0.42");
    }
}
