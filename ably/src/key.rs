//! Ably API key handling.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A malformed API key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Key is empty
    #[error("API key is empty")]
    Empty,

    /// Key lacks the `name:secret` separator or one of its halves
    #[error("API key must have the form `<app>.<key>:<secret>`")]
    MissingSecret,
}

/// An Ably API key, `<app id>.<key id>:<secret>`.
///
/// The REST API takes it as HTTP basic credentials: the part before the colon
/// is the user name, the part after it the password.
///
/// ```
/// use clinic_ably::AblyKey;
///
/// let key: AblyKey = "app.key:s3cret".parse().unwrap();
/// assert_eq!(key.name(), "app.key");
/// assert!(!format!("{key:?}").contains("s3cret"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct AblyKey {
    name: String,
    secret: String,
}

impl AblyKey {
    /// The public key name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }
}

impl FromStr for AblyKey {
    type Err = KeyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(KeyError::Empty);
        }

        let (name, secret) = raw.split_once(':').ok_or(KeyError::MissingSecret)?;
        if name.is_empty() || secret.is_empty() {
            return Err(KeyError::MissingSecret);
        }

        Ok(Self {
            name: name.to_string(),
            secret: secret.to_string(),
        })
    }
}

// Never print the secret
impl fmt::Debug for AblyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AblyKey")
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .finish()
    }
}
