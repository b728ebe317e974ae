//! Kubernetes-style resource quantities
//!
//! Quantities such as `500m`, `2Gi`, `1.5`, or `1e3` are parsed into an
//! approximate `f64` so CPU and memory values can be summed and compared.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// Grammar accepted for quantity-typed manifest fields
pub const QUANTITY_PATTERN: &str =
    r"^\d+(?:\.\d+)?(?:[eE][-+]?\d+)?(?:[kKMGTP]i?|[mMGTPE])?$";

static QUANTITY_PARTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?\d+(?:\.\d+)?|[+-]?\.\d+)(?:[eE]([-+]?\d+))?([a-zA-Z]{0,2})$")
        .expect("quantity regex is valid")
});

/// A parsed resource quantity
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    raw: String,
    value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid quantity: '{0}'")]
pub struct QuantityError(pub String);

impl Quantity {
    /// Parse a quantity string
    pub fn parse(input: &str) -> Result<Self, QuantityError> {
        let trimmed = input.trim();
        let caps = QUANTITY_PARTS
            .captures(trimmed)
            .ok_or_else(|| QuantityError(input.to_string()))?;

        let number: f64 = caps[1]
            .parse()
            .map_err(|_| QuantityError(input.to_string()))?;

        let exponent = match caps.get(2) {
            Some(exp) => exp
                .as_str()
                .parse::<i32>()
                .map_err(|_| QuantityError(input.to_string()))?,
            None => 0,
        };

        let suffix = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        let multiplier = suffix_multiplier(suffix).ok_or_else(|| QuantityError(input.to_string()))?;

        Ok(Self {
            raw: trimmed.to_string(),
            value: number * 10f64.powi(exponent) * multiplier,
        })
    }

    /// Approximate numeric value in base units (cores or bytes)
    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.value == 0.0
    }

    /// The string the quantity was parsed from
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn suffix_multiplier(suffix: &str) -> Option<f64> {
    const KI: f64 = 1024.0;
    let m = match suffix {
        "" => 1.0,
        "n" => 1e-9,
        "u" => 1e-6,
        "m" => 1e-3,
        "k" | "K" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" | "ki" => KI,
        "Mi" => KI.powi(2),
        "Gi" => KI.powi(3),
        "Ti" => KI.powi(4),
        "Pi" => KI.powi(5),
        "Ei" => KI.powi(6),
        _ => return None,
    };
    Some(m)
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(s: &str) -> f64 {
        Quantity::parse(s).unwrap().value()
    }

    #[test]
    fn test_parse_cpu() {
        assert_eq!(value("500m"), 0.5);
        assert_eq!(value("1"), 1.0);
        assert_eq!(value("1.5"), 1.5);
        assert!(value("250m") < value("500m"));
    }

    #[test]
    fn test_parse_memory() {
        assert_eq!(value("1Ki"), 1024.0);
        assert_eq!(value("128Mi"), 134_217_728.0);
        assert_eq!(value("1Gi"), 1_073_741_824.0);
        assert_eq!(value("1G"), 1e9);
        assert_eq!(value("2k"), 2000.0);
    }

    #[test]
    fn test_parse_exponent() {
        assert_eq!(value("1e3"), 1000.0);
        assert!((value("5E-3") - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Quantity::parse("").is_err());
        assert!(Quantity::parse("abc").is_err());
        assert!(Quantity::parse("1Xi").is_err());
        assert!(Quantity::parse("1 Gi").is_err());
    }

    #[test]
    fn test_zero() {
        assert!(Quantity::parse("0").unwrap().is_zero());
        assert!(Quantity::parse("0Mi").unwrap().is_zero());
        assert!(!Quantity::parse("1m").unwrap().is_zero());
    }

    #[test]
    fn test_grammar_pattern() {
        let re = Regex::new(QUANTITY_PATTERN).unwrap();
        for ok in ["500m", "2Gi", "1", "1.5", "1e3", "128Mi", "1k"] {
            assert!(re.is_match(ok), "{ok} should match");
        }
        for bad in ["", "1.5.5", "-1", "1 Gi", "abc", "Ki", "m", "5i", "1ei"] {
            assert!(!re.is_match(bad), "{bad} should not match");
        }
    }

    #[test]
    fn test_pattern_matches_are_parseable() {
        let re = Regex::new(QUANTITY_PATTERN).unwrap();
        for s in ["1ki", "1Ki", "2K", "3k", "1Pi", "2E", "1.5e2M", "7m", "0"] {
            assert!(re.is_match(s), "{s} should match");
            assert!(Quantity::parse(s).is_ok(), "{s} should parse");
        }
        assert_eq!(value("1ki"), value("1Ki"));
    }
}
