use std::sync::LazyLock;

use regex::Regex;

pub const MAX_EMAIL_LEN: usize = 254;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;
pub const MAX_TEXT_LEN: usize = 2000;

#[allow(clippy::unwrap_used)]
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@.]{2,}$").unwrap());

/// Trim and lowercase an email so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Syntactic email check: `local@domain.tld`, no whitespace.
///
/// # Errors
///
/// Returns a human-readable message when the address is malformed.
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.len() > MAX_EMAIL_LEN {
        return Err(format!("email must not exceed {MAX_EMAIL_LEN} characters"));
    }
    if !EMAIL_RE.is_match(email) {
        return Err("Enter a valid email".to_string());
    }
    Ok(())
}

/// # Errors
///
/// Returns a message when the password is blank or outside the allowed length.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.trim().is_empty() {
        return Err("Password cannot be blank".to_string());
    }
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(format!(
            "password must not exceed {MAX_PASSWORD_LEN} characters"
        ));
    }
    Ok(())
}

/// Students are enrolled in year 1 through 4.
///
/// # Errors
///
/// Returns a message when `year` is out of range.
pub fn validate_year(year: i16) -> Result<(), String> {
    if (1..=4).contains(&year) {
        Ok(())
    } else {
        Err("year must be between 1 and 4".to_string())
    }
}

/// # Errors
///
/// Returns a message when the SAP ID is not positive.
pub fn validate_sapid(sapid: i64) -> Result<(), String> {
    if sapid > 0 {
        Ok(())
    } else {
        Err("sapid must be a positive number".to_string())
    }
}

/// Trim `value` and reject it if empty or longer than [`MAX_TEXT_LEN`].
///
/// # Errors
///
/// The message names `field` so clients can point at the offending input.
pub fn require_non_blank(field: &str, value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{field} is required"));
    }
    if trimmed.chars().count() > MAX_TEXT_LEN {
        return Err(format!("{field} must not exceed {MAX_TEXT_LEN} characters"));
    }
    Ok(trimmed.to_string())
}
