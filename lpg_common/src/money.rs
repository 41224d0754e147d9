use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

use crate::op;

//--------------------------------------       Money        ----------------------------------------------------------

/// A loyalty-point amount with two fixed fraction digits, backed by an `i64` holding hundredths of a point.
///
/// The textual form is `d.dd` (or a bare integer when parsing). On the wire, `Money` is a bare JSON number,
/// never a string: `{"sum": 250.39}`.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value is not a valid money amount: {0}")]
pub struct MoneyFormatError(pub String);

/// Raw hundredths. `Money::from(25039)` is `250.39` points.
impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Whole points, e.g. `Money::from_points(250)` is `250.00`.
    pub fn from_points(points: i64) -> Self {
        Self(points.saturating_mul(100))
    }

    /// The storage column is a plain `INT8`, so the storage layer clamps rather than wraps.
    pub fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", cents / 100, cents % 100)
    }
}

/// Accepts `^\d+(\.\d{2})?$`: a bare integer, or exactly two fraction digits.
impl FromStr for Money {
    type Err = MoneyFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || MoneyFormatError(s.to_string());
        let (whole, frac) = match s.split_once('.') {
            None => (s, "0"),
            Some((w, fr)) if fr.len() == 2 => (w, fr),
            Some(_) => return Err(malformed()),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let points: i64 = whole.parse().map_err(|_| malformed())?;
        let cents: i64 = frac.parse().map_err(|_| malformed())?;
        points.checked_mul(100).and_then(|v| v.checked_add(cents)).map(Self).ok_or_else(malformed)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // The exact `d.dd` token goes out as-is; cents above 2^53 do not survive an f64 round
        // trip, so no float is allowed anywhere on this path.
        let number = serde_json::Number::from_str(&self.to_string()).map_err(ser::Error::custom)?;
        number.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let number = serde_json::Number::deserialize(deserializer)?;
        if let Some(points) = number.as_u64() {
            return i64::try_from(points)
                .ok()
                .and_then(|p| p.checked_mul(100))
                .map(Money)
                .ok_or_else(|| de::Error::custom(format!("money amount out of range: {number}")));
        }
        // Decimals, negatives and exponent forms go through the strict text parser.
        number.to_string().parse::<Money>().map_err(de::Error::custom)
    }
}
