//! Identifier types for AetherLog.
//!
//! Contacts and users are keyed by normalized natural identifiers (phone number
//! and email), call records by a generated ULID.
//!
//! # Macro-based ID Types
//!
//! The `normalized_id_type!` macro reduces boilerplate for the string-backed
//! identifiers, ensuring every way of constructing one (parsing, serde,
//! `TryFrom<String>`) runs the same normalization.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Macro to define a normalized, string-backed identifier type.
///
/// This macro generates a newtype wrapper around `String` with implementations for:
/// - `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `Serialize`, `Deserialize` (as string, normalized on the way in)
/// - `FromStr`, `Display`, `Debug`
/// - `TryFrom<String>`, `Into<String>`
/// - `AsRef<str>`
///
/// # Example
///
/// ```ignore
/// normalized_id_type!(MyId, normalize_my_id, "A custom identifier type.");
/// let id: MyId = " Raw Input ".parse().unwrap();
/// ```
macro_rules! normalized_id_type {
    ($name:ident, $normalize:path, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Normalize raw input into an identifier.
            ///
            /// # Errors
            ///
            /// Returns an error if nothing is left after normalization.
            pub fn new(raw: &str) -> Result<Self, IdError> {
                $normalize(raw).map(Self)
            }

            /// Return the normalized identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Strip everything but ASCII digits from a phone number.
fn normalize_phone(raw: &str) -> Result<String, IdError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(IdError::EmptyPhone);
    }
    Ok(digits)
}

/// Lower-case and trim an email address.
fn normalize_email(raw: &str) -> Result<String, IdError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(IdError::EmptyEmail);
    }
    Ok(email)
}

normalized_id_type!(
    ContactId,
    normalize_phone,
    "A contact identifier: the contact's phone number reduced to its digits."
);
normalized_id_type!(
    UserId,
    normalize_email,
    "A user identifier: the user's email address, trimmed and lower-cased."
);

/// A call record identifier using ULID for time-ordering.
///
/// Call record IDs sort chronologically, so an index of them reads back in
/// the order the calls were logged.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CallRecordId(Ulid);

impl CallRecordId {
    /// Generate a new `CallRecordId` with the current timestamp.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Return the underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> &Ulid {
        &self.0
    }
}

impl FromStr for CallRecordId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = Ulid::from_string(s).map_err(|_| IdError::InvalidUlid)?;
        Ok(Self(ulid))
    }
}

impl fmt::Debug for CallRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallRecordId({})", self.0)
    }
}

impl fmt::Display for CallRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CallRecordId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CallRecordId> for String {
    fn from(id: CallRecordId) -> Self {
        id.0.to_string()
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The phone number contains no digits.
    #[error("phone number contains no digits")]
    EmptyPhone,

    /// The email address is blank.
    #[error("email address is empty")]
    EmptyEmail,

    /// The input is not a valid ULID.
    #[error("invalid ULID format")]
    InvalidUlid,
}
