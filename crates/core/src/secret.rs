//! Role secrets.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of random bytes in a generated secret (128 bits).
pub const SECRET_BYTES: usize = 16;

/// A role password.
///
/// `Debug` and `Display` never print the value; use [`Secret::expose`] at the
/// few places that must hand it to the database or to a client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Generate a fresh secret from the thread-local CSPRNG.
    ///
    /// The result is 32 lowercase hex characters and has no relation to any
    /// tenant-supplied value.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Wrap an existing secret, e.g. one loaded from the metadata store.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}
