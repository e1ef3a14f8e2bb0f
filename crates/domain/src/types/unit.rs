//! Measurement units
//!
//! A unit is a named scale factor relative to the primary unit of its family
//! (nanoseconds for time, bytes for binary sizes, single items for unary
//! counts). Values can only be converted between units sharing a primary.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{Result, TracePulseError};

/// A named scale factor with the primary unit it derives from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Unit {
    name: Cow<'static, str>,
    primary: Cow<'static, str>,
    scale: u64,
}

const fn builtin(name: &'static str, primary: &'static str, scale: u64) -> Unit {
    Unit { name: Cow::Borrowed(name), primary: Cow::Borrowed(primary), scale }
}

impl Unit {
    // Time
    pub const NANOSECOND: Unit = builtin("ns", "ns", 1);
    pub const MICROSECOND: Unit = builtin("us", "ns", 1_000);
    pub const MILLISECOND: Unit = builtin("ms", "ns", 1_000_000);
    pub const SECOND: Unit = builtin("s", "ns", 1_000_000_000);
    pub const MINUTE: Unit = builtin("min", "ns", 60_000_000_000);
    pub const HOUR: Unit = builtin("h", "ns", 3_600_000_000_000);
    pub const DAY: Unit = builtin("day", "ns", 86_400_000_000_000);

    // Binary
    pub const BYTE: Unit = builtin("b", "b", 1);
    pub const KBYTE: Unit = builtin("Kb", "b", 1_024);
    pub const MBYTE: Unit = builtin("Mb", "b", 1_048_576);
    pub const GBYTE: Unit = builtin("Gb", "b", 1_073_741_824);

    // Unary (SI prefixes, "billion" is ambiguous across locales)
    pub const UNARY: Unit = builtin("u", "u", 1);
    pub const DECA: Unit = builtin("*10", "u", 10);
    pub const HECTO: Unit = builtin("*100", "u", 100);
    pub const KILO: Unit = builtin("*1000", "u", 1_000);
    pub const MEGA: Unit = builtin("*10^6", "u", 1_000_000);
    pub const GIGA: Unit = builtin("*10^9", "u", 1_000_000_000);
    pub const TERA: Unit = builtin("*10^12", "u", 1_000_000_000_000);

    const BUILTINS: [Unit; 18] = [
        Self::NANOSECOND,
        Self::MICROSECOND,
        Self::MILLISECOND,
        Self::SECOND,
        Self::MINUTE,
        Self::HOUR,
        Self::DAY,
        Self::BYTE,
        Self::KBYTE,
        Self::MBYTE,
        Self::GBYTE,
        Self::UNARY,
        Self::DECA,
        Self::HECTO,
        Self::KILO,
        Self::MEGA,
        Self::GIGA,
        Self::TERA,
    ];

    /// Create a new primary unit (its own family root).
    pub fn primary(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self { primary: Cow::Owned(name.clone()), name: Cow::Owned(name), scale: 1 }
    }

    /// Create a unit derived from `base`, `scale` times larger than it.
    pub fn derived(name: impl Into<String>, base: &Unit, scale: u64) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            primary: base.primary.clone(),
            scale: base.scale.saturating_mul(scale),
        }
    }

    /// Look up a built-in unit by name.
    ///
    /// # Errors
    /// Returns [`TracePulseError::UnknownUnit`] when no built-in unit carries
    /// this name.
    pub fn from_name(name: &str) -> Result<Self> {
        Self::BUILTINS
            .iter()
            .find(|unit| unit.name == name)
            .cloned()
            .ok_or_else(|| TracePulseError::UnknownUnit(name.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the primary unit of this unit's family.
    pub fn primary_name(&self) -> &str {
        &self.primary
    }

    /// Scale factor relative to the primary unit.
    pub fn scale(&self) -> u64 {
        self.scale
    }

    pub fn is_primary(&self) -> bool {
        self.name == self.primary
    }

    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.primary == other.primary
    }

    /// Convert `value` expressed in `from` into this unit.
    ///
    /// # Errors
    /// Returns [`TracePulseError::IncompatibleUnit`] when the two units do not
    /// share a primary unit.
    pub fn convert(&self, value: f64, from: &Unit) -> Result<f64> {
        if from == self {
            return Ok(value);
        }
        if !self.is_compatible(from) {
            return Err(TracePulseError::IncompatibleUnit {
                from: from.name.to_string(),
                to: self.name.to_string(),
            });
        }
        Ok(value * from.scale as f64 / self.scale as f64)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// Units order by scale, then name, for the derived `Ord` on roles and keys.
impl PartialOrd for Unit {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Unit {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.scale
            .cmp(&other.scale)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.primary.cmp(&other.primary))
    }
}

impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

impl<'de> Deserialize<'de> for Unit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Unit::from_name(&name).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_milliseconds_to_nanoseconds() {
        let converted = Unit::NANOSECOND.convert(3.0, &Unit::MILLISECOND).unwrap();
        assert_eq!(converted, 3_000_000.0);
    }

    #[test]
    fn test_convert_nanoseconds_to_seconds() {
        let converted = Unit::SECOND.convert(1_500_000_000.0, &Unit::NANOSECOND).unwrap();
        assert!((converted - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_convert_same_unit_is_identity() {
        assert_eq!(Unit::KBYTE.convert(42.0, &Unit::KBYTE).unwrap(), 42.0);
    }

    #[test]
    fn test_incompatible_units_fail() {
        let err = Unit::NANOSECOND.convert(1.0, &Unit::BYTE).unwrap_err();
        assert_eq!(
            err,
            TracePulseError::IncompatibleUnit { from: "b".into(), to: "ns".into() }
        );
    }

    #[test]
    fn test_derived_unit_shares_primary() {
        let quarter_hour = Unit::derived("quarter", &Unit::MINUTE, 15);
        assert!(quarter_hour.is_compatible(&Unit::SECOND));
        assert!(!quarter_hour.is_primary());
        assert_eq!(Unit::SECOND.convert(1.0, &quarter_hour).unwrap(), 900.0);
    }

    #[test]
    fn test_custom_primary_unit() {
        let request = Unit::primary("req");
        assert!(request.is_primary());
        assert!(!request.is_compatible(&Unit::UNARY));
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(Unit::from_name("Mb").unwrap(), Unit::MBYTE);
        assert!(matches!(Unit::from_name("parsec"), Err(TracePulseError::UnknownUnit(_))));
    }

    #[test]
    fn test_serde_uses_name() {
        let json = serde_json::to_string(&Unit::MILLISECOND).unwrap();
        assert_eq!(json, "\"ms\"");
        let back: Unit = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Unit::MILLISECOND);
        assert!(serde_json::from_str::<Unit>("\"furlong\"").is_err());
    }
}
