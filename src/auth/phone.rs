//! Phone number validation for pairing-code logins.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10,15}$").expect("phone pattern is valid"));

/// Normalise and validate an international phone number.
///
/// Spaces, dashes, parentheses and a leading `+` are dropped; what remains
/// must be 10 to 15 digits. Returns the bare digits.
pub fn validate_phone(input: &str) -> Result<String> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);

    if PHONE.is_match(digits) {
        Ok(digits.to_string())
    } else {
        Err(Error::Validation(format!(
            "'{}' is not a phone number: expected 10-15 digits including country code",
            input.trim()
        )))
    }
}
