//! Work durations with second precision.
//!
//! Durations are parsed leniently from user input: an integer counts seconds,
//! a decimal counts hours and a colon string reads `H:M` or `H:M:S`.

use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign},
    str::FromStr,
};

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

use super::money::{parse_decimal, round_money};

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3_600;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkDuration {
    seconds: i64,
}

impl WorkDuration {
    pub const ZERO: WorkDuration = WorkDuration { seconds: 0 };

    pub fn from_seconds(seconds: i64) -> Self {
        Self { seconds }
    }

    pub fn from_hms(hours: i64, minutes: i64, seconds: i64) -> Self {
        Self::from_seconds(
            hours
                .saturating_mul(SECONDS_PER_HOUR)
                .saturating_add(minutes.saturating_mul(SECONDS_PER_MINUTE))
                .saturating_add(seconds),
        )
    }

    /// Builds a duration from decimal hours, rounded to whole seconds.
    pub fn from_hours(hours: Decimal) -> Self {
        Self::from_seconds(to_whole_seconds(
            hours.saturating_mul(Decimal::from(SECONDS_PER_HOUR)),
        ))
    }

    /// Strict parser; `None` when the input is not a duration.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if !trimmed.contains(':') {
            if let Ok(seconds) = trimmed.parse::<i64>() {
                return Some(Self::from_seconds(seconds));
            }
            return parse_decimal(trimmed).map(Self::from_hours);
        }

        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let fields = body
            .split(':')
            .map(|field| field.trim().parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()?;
        let parsed = match fields.as_slice() {
            [hours, minutes] => Self::from_hms(*hours as i64, *minutes as i64, 0),
            [hours, minutes, seconds] => {
                Self::from_hms(*hours as i64, *minutes as i64, *seconds as i64)
            }
            _ => return None,
        };
        Some(if negative { parsed.negate() } else { parsed })
    }

    /// Fail-soft parser: anything unparsable becomes a zero duration.
    pub fn parse_or_zero(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_default()
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn is_zero(&self) -> bool {
        self.seconds == 0
    }

    /// Decimal hours, always rounded to two places.
    pub fn hours(&self) -> Decimal {
        round_money(Decimal::from(self.seconds) / Decimal::from(SECONDS_PER_HOUR))
    }

    /// Scales the duration by a decimal factor, rounding to whole seconds.
    /// Results beyond the representable range saturate.
    pub fn scale(self, factor: Decimal) -> Self {
        Self::from_seconds(to_whole_seconds(
            Decimal::from(self.seconds).saturating_mul(factor),
        ))
    }

    fn negate(self) -> Self {
        Self::from_seconds(self.seconds.saturating_neg())
    }
}

// Out-of-range values clamp to the i64 bounds by sign.
fn to_whole_seconds(value: Decimal) -> i64 {
    let whole = value.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
    match whole.to_i64() {
        Some(seconds) => seconds,
        None if whole.is_sign_negative() => i64::MIN,
        None => i64::MAX,
    }
}

impl Add for WorkDuration {
    type Output = WorkDuration;

    fn add(self, rhs: WorkDuration) -> WorkDuration {
        WorkDuration::from_seconds(self.seconds.saturating_add(rhs.seconds))
    }
}

impl AddAssign for WorkDuration {
    fn add_assign(&mut self, rhs: WorkDuration) {
        *self = *self + rhs;
    }
}

impl Sum for WorkDuration {
    fn sum<I: Iterator<Item = WorkDuration>>(iter: I) -> Self {
        iter.fold(WorkDuration::ZERO, Add::add)
    }
}

impl fmt::Display for WorkDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.seconds < 0 { "-" } else { "" };
        let total = self.seconds.unsigned_abs();
        let hours = total / SECONDS_PER_HOUR as u64;
        let minutes = (total % SECONDS_PER_HOUR as u64) / SECONDS_PER_MINUTE as u64;
        let seconds = total % SECONDS_PER_MINUTE as u64;
        write!(f, "{sign}{hours}:{minutes:02}:{seconds:02}")
    }
}

impl FromStr for WorkDuration {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_or_zero(raw))
    }
}

impl Serialize for WorkDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WorkDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DurationVisitor)
    }
}

struct DurationVisitor;

impl<'de> Visitor<'de> for DurationVisitor {
    type Value = WorkDuration;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("seconds, decimal hours or an H:M:S string")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(WorkDuration::from_seconds(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(WorkDuration::from_seconds(
            i64::try_from(value).unwrap_or(i64::MAX),
        ))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
        Ok(Decimal::from_f64_retain(value)
            .map(WorkDuration::from_hours)
            .unwrap_or_default())
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(WorkDuration::parse_or_zero(value))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(WorkDuration::ZERO)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(WorkDuration::ZERO)
    }
}
