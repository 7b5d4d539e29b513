//! Parsing for the Go-style duration strings carried by panel targets.
//!
//! `cacheDuration` arrives as free text from the panel editor: `""`, `"0s"`,
//! `"5m"`, `"1h30m"`, `"250ms"`, or a bare number of seconds.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

use crate::error::DurationError;

/// Parse a duration string. An empty string is zero.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let s = input.trim();
    if s.is_empty() {
        return Ok(Duration::ZERO);
    }

    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| DurationError::Invalid(input.to_string()))?;
        if num_end == 0 {
            return Err(DurationError::Invalid(input.to_string()));
        }
        let value: f64 = rest[..num_end]
            .parse()
            .map_err(|_| DurationError::Invalid(input.to_string()))?;
        rest = &rest[num_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        rest = &rest[unit_end..];

        let secs_per_unit = match unit {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => {
                return Err(DurationError::UnknownUnit {
                    input: input.to_string(),
                    unit: unit.to_string(),
                })
            }
        };
        total = Duration::try_from_secs_f64(value * secs_per_unit)
            .ok()
            .and_then(|part| total.checked_add(part))
            .ok_or_else(|| DurationError::Invalid(input.to_string()))?;
    }

    Ok(total)
}

/// Serde adapter: accepts a duration string (or number of seconds) and
/// serializes back to whole seconds with an `s` suffix.
pub mod serde_duration {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Seconds(u64),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(Duration::ZERO),
            Some(Raw::Seconds(s)) => Ok(Duration::from_secs(s)),
            Some(Raw::Text(t)) => parse_duration(&t).map_err(serde::de::Error::custom),
        }
    }

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", value.as_secs()))
    }
}
