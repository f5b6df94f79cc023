//! Serde helpers for arbitrary-precision token amounts
//!
//! Amounts travel as decimal strings so no JSON client truncates them. Plain
//! integers are accepted on input for convenience.

use num_bigint::BigInt;
use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Text(String),
    Int(i64),
}

pub fn serialize<S>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<BigInt, D::Error>
where
    D: Deserializer<'de>,
{
    match RawAmount::deserialize(deserializer)? {
        RawAmount::Text(raw) => raw
            .trim()
            .parse::<BigInt>()
            .map_err(|e| serde::de::Error::custom(format!("invalid amount {:?}: {}", raw, e))),
        RawAmount::Int(value) => Ok(BigInt::from(value)),
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super")]
        amount: BigInt,
    }

    #[test]
    fn test_large_amount_as_string() {
        let parsed: Wrapper =
            serde_json::from_str(r#"{"amount":"123456789012345678901234567890"}"#).unwrap();
        assert_eq!(
            parsed.amount.to_string(),
            "123456789012345678901234567890"
        );

        let json = serde_json::to_string(&parsed).unwrap();
        assert_eq!(json, r#"{"amount":"123456789012345678901234567890"}"#);
    }

    #[test]
    fn test_integer_and_negative_input() {
        let parsed: Wrapper = serde_json::from_str(r#"{"amount":-5}"#).unwrap();
        assert_eq!(parsed.amount, BigInt::from(-5));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"amount":"12abc"}"#).is_err());
    }
}
