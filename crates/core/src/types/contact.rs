//! Buyer contact types used at checkout.
//!
//! Guest buyers leave an email address and a messenger handle (the storefront
//! delivers digital goods over both). Both are validated once at the edge and
//! carried as plain strings afterwards.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors produced when parsing buyer contact details.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContactError {
    #[error("email cannot be empty")]
    EmptyEmail,
    #[error("email must be at most {0} characters")]
    EmailTooLong(usize),
    #[error("email must contain exactly one @ with text on both sides")]
    MalformedEmail,
    #[error("contact handle cannot be empty")]
    EmptyHandle,
    #[error("contact handle must be at most {0} characters")]
    HandleTooLong(usize),
    #[error("contact handle cannot contain whitespace")]
    HandleWhitespace,
}

/// A lower-cased email address.
///
/// Validation is structural only: one `@`, a non-empty local part and a
/// domain containing a dot that neither starts nor ends the domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// RFC 5321 path limit.
    pub const MAX_LENGTH: usize = 254;

    /// Parse and normalize an email address.
    ///
    /// # Errors
    ///
    /// Returns a [`ContactError`] describing the first failed check.
    pub fn parse(input: &str) -> Result<Self, ContactError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ContactError::EmptyEmail);
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(ContactError::EmailTooLong(Self::MAX_LENGTH));
        }

        let (local, domain) = trimmed
            .split_once('@')
            .ok_or(ContactError::MalformedEmail)?;
        let domain_ok = domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !domain.contains('@');
        if local.is_empty() || !domain_ok {
            return Err(ContactError::MalformedEmail);
        }

        Ok(Self(trimmed.to_lowercase()))
    }

    /// The normalized address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Email {
    type Err = ContactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Email {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

/// A messenger handle (e.g. a Telegram username) used for delivery.
///
/// A leading `@` is stripped so `@buyer` and `buyer` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContactHandle(String);

impl ContactHandle {
    /// Longest handle accepted.
    pub const MAX_LENGTH: usize = 64;

    /// Parse a contact handle.
    ///
    /// # Errors
    ///
    /// Returns a [`ContactError`] if the handle is empty, too long or
    /// contains whitespace.
    pub fn parse(input: &str) -> Result<Self, ContactError> {
        let handle = input.trim().trim_start_matches('@');
        if handle.is_empty() {
            return Err(ContactError::EmptyHandle);
        }
        if handle.chars().count() > Self::MAX_LENGTH {
            return Err(ContactError::HandleTooLong(Self::MAX_LENGTH));
        }
        if handle.chars().any(char::is_whitespace) {
            return Err(ContactError::HandleWhitespace);
        }
        Ok(Self(handle.to_owned()))
    }

    /// The handle without a leading `@`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContactHandle {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContactHandle> for String {
    fn from(handle: ContactHandle) -> Self {
        handle.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_trimmed_and_lowercased() {
        let email = Email::parse("  Demo@Buyer.COM ").expect("valid");
        assert_eq!(email.as_str(), "demo@buyer.com");
    }

    #[test]
    fn email_rejects_malformed_input() {
        assert_eq!(Email::parse(""), Err(ContactError::EmptyEmail));
        assert_eq!(Email::parse("no-at"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("@x.com"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("a@localhost"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("a@b@c.com"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("a@.com"), Err(ContactError::MalformedEmail));
    }

    #[test]
    fn email_length_limit() {
        let long = format!("{}@example.com", "a".repeat(250));
        assert_eq!(Email::parse(&long), Err(ContactError::EmailTooLong(254)));
    }

    #[test]
    fn handle_strips_at_sign() {
        let handle = ContactHandle::parse("@demo_user").expect("valid");
        assert_eq!(handle.as_str(), "demo_user");
        assert_eq!(handle, ContactHandle::parse("demo_user").expect("valid"));
    }

    #[test]
    fn handle_rejects_blank_and_spaces() {
        assert_eq!(ContactHandle::parse(" @ "), Err(ContactError::EmptyHandle));
        assert_eq!(
            ContactHandle::parse("two words"),
            Err(ContactError::HandleWhitespace)
        );
    }

    #[test]
    fn serde_validates_on_deserialize() {
        assert!(serde_json::from_str::<Email>("\"bad\"").is_err());
        let email: Email = serde_json::from_str("\"X@Y.io\"").expect("valid");
        assert_eq!(email.as_str(), "x@y.io");
    }
}
