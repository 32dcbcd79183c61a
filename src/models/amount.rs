//! Token amount helpers.
//!
//! Discount-token amounts are held as `U256` base units (18 decimals by
//! default). Persisted records carry them as decimal strings so that values
//! above `u64`/`f64` precision survive a round trip unchanged.

use ethers::types::U256;
use ethers::utils::{format_units, parse_units};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{ProgressionError, Result};

pub const DEFAULT_TOKEN_DECIMALS: u32 = 18;

/// Whole tokens to base units.
pub fn whole_tokens(tokens: u64, decimals: u32) -> U256 {
    U256::from(tokens).saturating_mul(U256::exp10(decimals as usize))
}

/// Decimal token quantity to base units, rounding any sub-unit remainder up.
pub fn decimal_to_units(tokens: Decimal, decimals: u32) -> Result<U256> {
    if tokens.is_sign_negative() {
        return Err(ProgressionError::InvalidAmount(format!(
            "negative token amount {}",
            tokens
        )));
    }

    let rounded = tokens.round_dp_with_strategy(decimals, RoundingStrategy::AwayFromZero);
    let parsed = parse_units(rounded.normalize().to_string(), decimals)
        .map_err(|e| ProgressionError::InvalidAmount(format!("{}: {}", rounded, e)))?;

    Ok(parsed.into())
}

/// Base units to a display string such as `1,234.5 LUB`, keeping at most
/// `max_fraction_digits` fractional digits.
pub fn format_token_amount(amount: U256, decimals: u32, symbol: &str, max_fraction_digits: usize) -> String {
    let raw = match format_units(amount, decimals) {
        Ok(raw) => raw,
        Err(_) => return format!("{} {}", amount, symbol),
    };

    let (whole, fraction) = match raw.split_once('.') {
        Some((w, f)) => (w.to_string(), f.to_string()),
        None => (raw.clone(), String::new()),
    };

    let fraction: String = fraction.chars().take(max_fraction_digits).collect();
    let fraction = fraction.trim_end_matches('0');

    let grouped = group_thousands(&whole);
    if fraction.is_empty() {
        format!("{} {}", grouped, symbol)
    } else {
        format!("{}.{} {}", grouped, fraction, symbol)
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Serde adapter storing a `U256` as a base-10 string.
pub mod u256_decimal {
    use ethers::types::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &U256, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        U256::from_dec_str(raw.trim())
            .map_err(|e| D::Error::custom(format!("invalid decimal amount '{}': {:?}", raw, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Holder {
        #[serde(with = "u256_decimal")]
        amount: U256,
    }

    #[test]
    fn test_u256_serialized_as_decimal_string() {
        let holder = Holder {
            amount: U256::from_dec_str("123456789012345678901").unwrap(),
        };
        let json = serde_json::to_string(&holder).unwrap();
        assert_eq!(json, r#"{"amount":"123456789012345678901"}"#);

        let back: Holder = serde_json::from_str(&json).unwrap();
        assert_eq!(back, holder);
    }

    #[test]
    fn test_rejects_hex_and_garbage() {
        assert!(serde_json::from_str::<Holder>(r#"{"amount":"0x10"}"#).is_err());
        assert!(serde_json::from_str::<Holder>(r#"{"amount":"twelve"}"#).is_err());
    }

    #[test]
    fn test_decimal_to_units_rounds_up() {
        let units = decimal_to_units(Decimal::new(15, 1), 18).unwrap();
        assert_eq!(units, U256::from_dec_str("1500000000000000000").unwrap());

        let tiny = decimal_to_units(Decimal::new(1, 20), 18).unwrap();
        assert_eq!(tiny, U256::one());

        assert!(decimal_to_units(Decimal::new(-1, 0), 18).is_err());
    }

    #[test]
    fn test_format_token_amount() {
        let amount = whole_tokens(1234, 18) + U256::exp10(17) * 5;
        assert_eq!(format_token_amount(amount, 18, "LUB", 2), "1,234.5 LUB");
        assert_eq!(format_token_amount(U256::zero(), 18, "LUB", 2), "0 LUB");
        assert_eq!(format_token_amount(whole_tokens(1_000_000, 18), 18, "LUB", 2), "1,000,000 LUB");
    }
}
