use std::fmt;

use serde::Serialize;

/// Country code a leading local trunk `0` is rewritten to.
pub const COUNTRY_CODE: &str = "62";

/// Keep ASCII digits only, then swap a leading `0` for the country code.
///
/// Idempotent: the output never starts with `0`.
pub fn normalize_digits(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.strip_prefix('0') {
        Some(rest) => format!("{COUNTRY_CODE}{rest}"),
        None => digits,
    }
}

/// Phone number in international format, ready for the chat channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn normalize(raw: &str) -> Result<Self, PhoneError> {
        let normalized = normalize_digits(raw);
        if normalized.is_empty() {
            return Err(PhoneError::NoDigits {
                raw: raw.to_string(),
            });
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Chat address used by the WhatsApp gateway.
    pub fn chat_id(&self) -> String {
        format!("{}@c.us", self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhoneError {
    #[error("phone number '{raw}' contains no digits")]
    NoDigits { raw: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_local_trunk_prefix() {
        assert_eq!(normalize_digits("081234567890"), "6281234567890");
    }

    #[test]
    fn leaves_international_numbers_alone() {
        assert_eq!(normalize_digits("6281234567890"), "6281234567890");
    }

    #[test]
    fn strips_formatting_characters() {
        assert_eq!(normalize_digits("+62 812-3456-7890"), "6281234567890");
        assert_eq!(normalize_digits("(0812) 3456 7890"), "6281234567890");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in [
            "081234567890",
            "6281234567890",
            "+62 812 3456",
            "00812",
            "0",
            "",
            "abc",
            "0 0 1",
        ] {
            let once = normalize_digits(raw);
            assert_eq!(normalize_digits(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn rejects_numbers_without_digits() {
        assert_eq!(
            PhoneNumber::normalize("n/a"),
            Err(PhoneError::NoDigits {
                raw: "n/a".to_string()
            })
        );
    }

    #[test]
    fn chat_id_uses_gateway_suffix() {
        let phone = PhoneNumber::normalize("081111111111").expect("valid number");
        assert_eq!(phone.as_str(), "6281111111111");
        assert_eq!(phone.chat_id(), "6281111111111@c.us");
    }
}
