use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IntervalError {
    #[error("Invalid interval '{0}': expected a number with a unit, like 30s, 1m or 500ms")]
    Malformed(String),
    #[error("Unknown unit '{unit}' in interval '{input}' (use ms, s, m or h)")]
    UnknownUnit { input: String, unit: String },
    #[error("Interval must be greater than zero")]
    Zero,
}

/// Parse a poll interval such as `500ms`, `30s`, `1m`, `1h` or a compound
/// `1m30s`. A bare number is read as seconds.
///
/// ```
/// use gator::util::parse_interval;
/// use std::time::Duration;
///
/// assert_eq!(parse_interval("1m30s").unwrap(), Duration::from_secs(90));
/// assert_eq!(parse_interval("250ms").unwrap(), Duration::from_millis(250));
/// ```
pub fn parse_interval(input: &str) -> Result<Duration, IntervalError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(IntervalError::Malformed(input.to_string()));
    }

    if let Ok(secs) = s.parse::<u64>() {
        return non_zero(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(IntervalError::Malformed(input.to_string()));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|_| IntervalError::Malformed(input.to_string()))?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let part = match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            "" => return Err(IntervalError::Malformed(input.to_string())),
            other => {
                return Err(IntervalError::UnknownUnit {
                    input: input.to_string(),
                    unit: other.to_string(),
                })
            }
        };
        total = total.saturating_add(part);
    }

    non_zero(total)
}

fn non_zero(d: Duration) -> Result<Duration, IntervalError> {
    if d.is_zero() {
        Err(IntervalError::Zero)
    } else {
        Ok(d)
    }
}
