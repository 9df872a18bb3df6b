//! Decimal-safe resource quantities.
//!
//! Quantities are stored as signed milli-units so that CPU strings like
//! `"500m"` and memory strings like `"2Gi"` add and subtract without any
//! floating-point drift.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::QueueError;

/// Resource name such as `cpu`, `memory` or `nvidia.com/gpu`.
pub type ResourceName = String;

/// Quantities keyed by resource name, iterated in name order.
pub type ResourceList = BTreeMap<ResourceName, Quantity>;

const MILLI_PER_UNIT: i128 = 1000;

/// A fixed-point resource amount with milli-unit precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity {
    milli: i64,
}

impl Quantity {
    /// The zero quantity.
    pub const ZERO: Self = Self { milli: 0 };

    /// Build a quantity from whole units.
    pub const fn from_units(units: i64) -> Self {
        Self {
            milli: units.saturating_mul(1000),
        }
    }

    /// Build a quantity from milli-units.
    pub const fn from_milli(milli: i64) -> Self {
        Self { milli }
    }

    /// Raw milli-unit value.
    pub const fn milli(self) -> i64 {
        self.milli
    }

    /// True when the amount is exactly zero.
    pub const fn is_zero(self) -> bool {
        self.milli == 0
    }

    /// True when the amount is below zero.
    pub const fn is_negative(self) -> bool {
        self.milli < 0
    }

    /// Clamp negative amounts to zero.
    #[must_use]
    pub const fn clamp_non_negative(self) -> Self {
        if self.milli < 0 {
            Self::ZERO
        } else {
            self
        }
    }
}

fn suffix_multiplier(suffix: &str) -> Option<i128> {
    let m = match suffix {
        "m" => 1,
        "" => MILLI_PER_UNIT,
        "k" => 1_000 * MILLI_PER_UNIT,
        "M" => 1_000_000 * MILLI_PER_UNIT,
        "G" => 1_000_000_000 * MILLI_PER_UNIT,
        "T" => 1_000_000_000_000 * MILLI_PER_UNIT,
        "Ki" => (1 << 10) * MILLI_PER_UNIT,
        "Mi" => (1 << 20) * MILLI_PER_UNIT,
        "Gi" => (1 << 30) * MILLI_PER_UNIT,
        "Ti" => (1 << 40) * MILLI_PER_UNIT,
        _ => return None,
    };
    Some(m)
}

impl FromStr for Quantity {
    type Err = QueueError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let raw = input.trim();
        let invalid = || QueueError::Invalid(format!("malformed quantity `{input}`"));
        if raw.is_empty() {
            return Err(invalid());
        }

        let (negative, body) = match raw.as_bytes()[0] {
            b'-' => (true, &raw[1..]),
            b'+' => (false, &raw[1..]),
            _ => (false, raw),
        };
        let split = body
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(body.len());
        let (number, suffix) = body.split_at(split);
        let multiplier = suffix_multiplier(suffix).ok_or_else(invalid)?;

        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if frac.len() > 18 {
            return Err(invalid());
        }
        let digits = format!("{whole}{frac}");
        let mantissa: i128 = digits.parse().map_err(|_| invalid())?;
        let scale = 10_i128.pow(u32::try_from(frac.len()).map_err(|_| invalid())?);

        // Sub-milli remainders round up, as the cluster API does.
        let scaled = mantissa.checked_mul(multiplier).ok_or_else(invalid)?;
        let mut milli = scaled.checked_add(scale - 1).ok_or_else(invalid)? / scale;
        if negative {
            milli = -milli;
        }
        let milli = i64::try_from(milli).map_err(|_| invalid())?;
        Ok(Self { milli })
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.milli % 1000 == 0 {
            write!(f, "{}", self.milli / 1000)
        } else {
            write!(f, "{}m", self.milli)
        }
    }
}

impl Add for Quantity {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            milli: self.milli.saturating_add(rhs.milli),
        }
    }
}

impl Sub for Quantity {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            milli: self.milli.saturating_sub(rhs.milli),
        }
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Quantity {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl std::iter::Sum for Quantity {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Units(i64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Raw::Units(units) => Ok(Self::from_units(units)),
        }
    }
}

/// Reject resource lists carrying negative amounts.
pub fn validate_resources(resources: &ResourceList) -> Result<(), QueueError> {
    match resources.iter().find(|(_, q)| q.is_negative()) {
        Some((name, q)) => Err(QueueError::Invalid(format!(
            "negative quantity {q} for resource `{name}`"
        ))),
        None => Ok(()),
    }
}

/// Convenience constructor used by configuration code and tests.
///
/// Each pair is `(resource, quantity-string)`.
pub fn resource_list<'a, I>(pairs: I) -> Result<ResourceList, QueueError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(name, raw)| Ok((name.to_string(), raw.parse()?)))
        .collect()
}
