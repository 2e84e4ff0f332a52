use std::time::Duration;

use crate::error::DurationError;

/// Parse a floating-point duration with an optional unit suffix.
///
/// Accepted forms: `20`, `0.5`, `1.5s`, `2m`, `1h`, `1d`. A bare number is seconds.
pub fn parse_fsd(s: &str) -> Result<Duration, DurationError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }

    let (num, mult) = match s.as_bytes()[s.len() - 1] {
        b's' => (&s[..s.len() - 1], 1.0),
        b'm' => (&s[..s.len() - 1], 60.0),
        b'h' => (&s[..s.len() - 1], 3600.0),
        b'd' => (&s[..s.len() - 1], 86400.0),
        _ => (s, 1.0),
    };

    let value: f64 = num
        .parse()
        .map_err(|_| DurationError::Invalid(s.to_string()))?;
    if !value.is_finite() {
        return Err(DurationError::Invalid(s.to_string()));
    }
    if value < 0.0 {
        return Err(DurationError::Negative);
    }
    Duration::try_from_secs_f64(value * mult).map_err(|_| DurationError::Invalid(s.to_string()))
}
