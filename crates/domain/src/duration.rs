use chrono::Duration;
use warden_core::{AppError, AppResult};

/// Parses an access duration such as `24h`, `1h30m` or `7d`.
///
/// Returns `None` for `0`, which means the access never expires.
pub fn parse_access_duration(value: &str) -> AppResult<Option<Duration>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(
            "duration must not be empty".to_owned(),
        ));
    }

    if trimmed == "0" {
        return Ok(None);
    }

    let mut total_seconds: i64 = 0;
    let mut digits = String::new();
    for character in trimmed.chars() {
        if character.is_ascii_digit() {
            digits.push(character);
            continue;
        }

        if digits.is_empty() {
            return Err(invalid_duration(trimmed));
        }

        let amount: i64 = digits.parse().map_err(|_| invalid_duration(trimmed))?;
        let unit_seconds = match character {
            's' => 1,
            'm' => 60,
            'h' => 3_600,
            'd' => 86_400,
            _ => return Err(invalid_duration(trimmed)),
        };
        total_seconds = amount
            .checked_mul(unit_seconds)
            .and_then(|seconds| total_seconds.checked_add(seconds))
            .ok_or_else(|| invalid_duration(trimmed))?;
        digits.clear();
    }

    if !digits.is_empty() {
        return Err(invalid_duration(trimmed));
    }

    if total_seconds == 0 {
        return Ok(None);
    }

    Duration::try_seconds(total_seconds)
        .map(Some)
        .ok_or_else(|| invalid_duration(trimmed))
}

fn invalid_duration(value: &str) -> AppError {
    AppError::Validation(format!(
        "invalid duration '{value}', expected a value such as '24h', '1h30m' or '0'"
    ))
}
