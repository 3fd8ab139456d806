//! Recipient addressing.
//!
//! Callers pass phone numbers in whatever format a human typed them
//! (`"+1 (555) 123-4567"`).  The network expects a bare digit string followed
//! by an addressing suffix (`"15551234567@s.whatsapp.net"`).

use std::fmt;

use thiserror::Error;

/// Suffix appended to individual-user addresses on the messaging network.
pub const DEFAULT_ADDRESS_SUFFIX: &str = "s.whatsapp.net";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecipientError {
    #[error("recipient {0:?} contains no digits")]
    NoDigits(String),
}

/// A normalised network address for an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Recipient(String);

impl Recipient {
    /// Strips every non-digit character from `number` and appends `@suffix`.
    ///
    /// # Errors
    ///
    /// Returns [`RecipientError::NoDigits`] if nothing is left after stripping.
    ///
    /// # Example
    ///
    /// ```rust
    /// use relay_core::Recipient;
    ///
    /// let r = Recipient::from_number("+1 (555) 123-4567", "s.whatsapp.net").unwrap();
    /// assert_eq!(r.as_str(), "15551234567@s.whatsapp.net");
    /// ```
    pub fn from_number(number: &str, suffix: &str) -> Result<Self, RecipientError> {
        let digits: String = number.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(RecipientError::NoDigits(number.to_string()));
        }
        Ok(Self(format!("{digits}@{suffix}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
