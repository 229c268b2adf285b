//! Contact records.

use serde::{Deserialize, Serialize};

use crate::{ContactId, UserId};

/// A person the user has exchanged calls with.
///
/// Contacts are keyed by their normalized phone number, so two uploads with the
/// same number formatted differently resolve to the same contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// The normalized phone number.
    pub id: ContactId,

    /// Display name.
    pub name: String,

    /// Phone number as originally supplied.
    pub phone: String,

    /// Up to two upper-case initials derived from the name.
    pub initials: String,

    /// The owning user. `None` only for the unsaved default state.
    #[serde(default)]
    pub user_id: Option<UserId>,

    /// Optional avatar image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Contact {
    /// Create a contact owned by `user_id`, deriving its initials from `name`.
    #[must_use]
    pub fn new(id: ContactId, name: &str, phone: &str, user_id: UserId) -> Self {
        Self {
            id,
            name: name.to_string(),
            phone: phone.to_string(),
            initials: initials_for(name),
            user_id: Some(user_id),
            avatar_url: None,
        }
    }

    /// The empty contact returned for an id that has never been stored.
    #[must_use]
    pub fn empty(id: ContactId) -> Self {
        Self {
            id,
            name: String::new(),
            phone: String::new(),
            initials: String::new(),
            user_id: None,
            avatar_url: None,
        }
    }

    /// Check whether the contact belongs to `user_id`.
    #[must_use]
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        self.user_id.as_ref() == Some(user_id)
    }
}

/// First letter of each whitespace-separated word, at most two, upper-cased.
#[must_use]
pub fn initials_for(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect()
}
