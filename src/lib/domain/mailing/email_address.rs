//! Email Address

use std::{fmt, str::FromStr};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use EmailAddressError::*;

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s<>]*?@[^@\s<>]*?\.[^@\s<>]*$").unwrap();
}

/// An error that can occur when parsing an email address
#[derive(Debug, Error)]
pub enum EmailAddressError {
    /// The email address is empty
    #[error("email is empty")]
    EmptyEmailAddress,

    /// The email address is invalid
    #[error("email is invalid")]
    InvalidEmailAddress,
}

/// A display name paired with an email address.
///
/// Rendered as `"name" <address>` when the name is non-empty, otherwise as the
/// bare address. Duplicates are allowed and no normalisation takes place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EmailAddress {
    name: String,
    address: String,
}

impl EmailAddress {
    /// Create an address from a display name (which may be empty) and an address.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Parse `address`, `Name <address>` or `"Name" <address>`.
    pub fn parse(raw: &str) -> Result<Self, EmailAddressError> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(EmptyEmailAddress);
        }

        let (name, address) = match (trimmed.rfind('<'), trimmed.strip_suffix('>')) {
            (Some(open), Some(rest)) => (unquote(trimmed[..open].trim()), rest[open + 1..].trim()),
            _ => (String::new(), trimmed),
        };

        if address.is_empty() {
            return Err(EmptyEmailAddress);
        }

        if !EMAIL_REGEX.is_match(address) {
            return Err(InvalidEmailAddress);
        }

        Ok(Self::new(name, address))
    }

    /// The display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bare address, e.g. `john@example.com`
    pub fn address(&self) -> &str {
        &self.address
    }
}

fn unquote(name: &str) -> String {
    match name.strip_prefix('"').and_then(|n| n.strip_suffix('"')) {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => out.extend(chars.next()),
                    _ => out.push(c),
                }
            }
            out
        }
        None => name.to_string(),
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            return f.write_str(&self.address);
        }

        // RFC 2047 encoded-word for anything a quoted-string cannot carry
        if !self.name.is_ascii() {
            return write!(
                f,
                "=?UTF-8?B?{}?= <{}>",
                STANDARD.encode(self.name.as_bytes()),
                self.address
            );
        }

        f.write_str("\"")?;
        for c in self.name.chars() {
            if c == '"' || c == '\\' {
                f.write_str("\\")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, "\" <{}>", self.address)
    }
}

impl FromStr for EmailAddress {
    type Err = EmailAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<EmailAddress> for String {
    fn from(email: EmailAddress) -> Self {
        email.to_string()
    }
}
