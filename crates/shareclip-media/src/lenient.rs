//! Lenient numeric decoding for FFprobe JSON.
//!
//! FFprobe prints many numeric fields as quoted strings (`"duration": "12.345"`),
//! some as bare numbers, frame rates as fractions (`"30000/1001"`), and
//! placeholders such as `"N/A"`. These helpers accept all of those shapes and
//! decode anything unusable to `None` instead of failing the whole document.
//!
//! Use with `#[serde(default, deserialize_with = "...")]`.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Decode a float that may be quoted.
pub fn f64_opt<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(as_f64))
}

/// Decode an unsigned integer that may be quoted.
pub fn u64_opt<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(as_u64))
}

/// Decode a frame rate given as `"num/den"`, a decimal string, or a number.
///
/// A zero denominator (`"0/0"`, used for streams without a fixed rate)
/// decodes to `None`.
pub fn frame_rate_opt<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_frame_rate_value))
}

fn parse_frame_rate_value(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => parse_frame_rate(s),
        other => as_f64(other),
    }
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    let s = s.trim();
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den > 0.0 && num.is_finite() {
            return Some(num / den);
        }
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "f64_opt")]
        duration: Option<f64>,
        #[serde(default, deserialize_with = "u64_opt")]
        size: Option<u64>,
        #[serde(default, deserialize_with = "frame_rate_opt")]
        rate: Option<f64>,
    }

    fn decode(json: &str) -> Sample {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_quoted_and_bare_numbers() {
        let s = decode(r#"{"duration": "12.5", "size": "1048576", "rate": "60/1"}"#);
        assert_eq!(s.duration, Some(12.5));
        assert_eq!(s.size, Some(1_048_576));
        assert_eq!(s.rate, Some(60.0));

        let s = decode(r#"{"duration": 12.5, "size": 1048576, "rate": 59.94}"#);
        assert_eq!(s.duration, Some(12.5));
        assert_eq!(s.size, Some(1_048_576));
        assert_eq!(s.rate, Some(59.94));
    }

    #[test]
    fn test_placeholders_decode_to_none() {
        let s = decode(r#"{"duration": "N/A", "size": "", "rate": "0/0"}"#);
        assert_eq!(s.duration, None);
        assert_eq!(s.size, None);
        assert_eq!(s.rate, None);

        let s = decode(r#"{"duration": null}"#);
        assert_eq!(s.duration, None);
        assert_eq!(s.size, None);
    }

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("1/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }
}
