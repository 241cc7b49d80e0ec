//! Proto3 canonical JSON value helpers.
//!
//! Message-level JSON codecs (generated, or hand-written against the same
//! contract) build plain attribute maps; these helpers cover the value
//! transformations the mapping prescribes: 64-bit integers as decimal
//! strings, bytes as base64, and the `"NaN"` / `"Infinity"` / `"-Infinity"`
//! spellings for non-finite floats.

use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde_json::{Map, Value};

use crate::Error;

pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Lenient base64 decode: standard or URL-safe alphabet, with or without
/// padding.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, Error> {
    let config = GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true);
    let standard = GeneralPurpose::new(&base64::alphabet::STANDARD, config);
    if let Ok(bytes) = standard.decode(text) {
        return Ok(bytes);
    }
    let url_safe = GeneralPurpose::new(&base64::alphabet::URL_SAFE, config);
    url_safe.decode(text).map_err(|_| Error::InvalidBase64)
}

pub fn int64_value(value: i64) -> Value {
    Value::String(value.to_string())
}

pub fn uint64_value(value: u64) -> Value {
    Value::String(value.to_string())
}

/// Accepts a JSON number or a decimal string.
pub fn int64_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub fn uint64_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub fn float_value(value: f64) -> Value {
    if value.is_nan() {
        Value::String("NaN".to_string())
    } else if value == f64::INFINITY {
        Value::String("Infinity".to_string())
    } else if value == f64::NEG_INFINITY {
        Value::String("-Infinity".to_string())
    } else {
        serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

pub fn float_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            _ => s.parse().ok(),
        },
        _ => None,
    }
}

/// First value present under any of `keys`, in order. Message decoders pass
/// `[jsonName, attributeName, protoName]`.
pub fn field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn base64_roundtrip() {
        let bytes = [0u8, 1, 254, 255];
        assert_eq!(decode_base64(&encode_base64(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn base64_lenient_variants() {
        // URL-safe alphabet and stripped padding are both accepted.
        assert_eq!(decode_base64("-_8").unwrap(), [0xfb, 0xff]);
        assert_eq!(decode_base64("aGk=").unwrap(), b"hi");
        assert_eq!(decode_base64("aGk").unwrap(), b"hi");
        assert!(decode_base64("not base64!").is_err());
    }

    #[test]
    fn int64_decimal_strings() {
        assert_eq!(int64_value(1 << 62), json!("4611686018427387904"));
        assert_eq!(int64_from_value(&json!("4611686018427387904")), Some(1 << 62));
        assert_eq!(int64_from_value(&json!(-3)), Some(-3));
        assert_eq!(uint64_from_value(&json!(u64::MAX.to_string())), Some(u64::MAX));
        assert_eq!(int64_from_value(&json!(true)), None);
    }

    #[test]
    fn non_finite_floats() {
        assert_eq!(float_value(f64::NAN), json!("NaN"));
        assert_eq!(float_value(f64::INFINITY), json!("Infinity"));
        assert_eq!(float_value(f64::NEG_INFINITY), json!("-Infinity"));
        assert_eq!(float_value(1.5), json!(1.5));
        assert!(float_from_value(&json!("NaN")).unwrap().is_nan());
        assert_eq!(float_from_value(&json!("-Infinity")), Some(f64::NEG_INFINITY));
        assert_eq!(float_from_value(&json!(2)), Some(2.0));
    }

    #[test]
    fn key_fallback_order() {
        let object = json!({"foo_bar": 1, "fooBar": 2});
        let object = object.as_object().unwrap();
        assert_eq!(
            field(object, &["fooBar", "foo_bar"]),
            Some(&json!(2))
        );
        assert_eq!(field(object, &["missing", "foo_bar"]), Some(&json!(1)));
        assert_eq!(field(object, &["missing"]), None);
    }
}
