//! Call records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{CallRecordId, ContactId, DomainError, UserId};

/// Direction of a logged call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    /// The contact called the user.
    Inbound,
    /// The user called the contact.
    #[default]
    Outbound,
}

impl FromStr for CallDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbound" => Ok(Self::Inbound),
            "outbound" => Ok(Self::Outbound),
            other => Err(DomainError::InvalidDirection(other.to_string())),
        }
    }
}

impl fmt::Display for CallDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound => f.write_str("inbound"),
            Self::Outbound => f.write_str("outbound"),
        }
    }
}

/// A single logged call between a user and one of their contacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    /// Unique, time-ordered record ID.
    pub id: CallRecordId,

    /// The contact the call was with.
    #[serde(default)]
    pub contact_id: Option<ContactId>,

    /// Call direction.
    #[serde(default)]
    pub direction: CallDirection,

    /// When the call happened (ISO 8601, as supplied by the uploader).
    #[serde(default)]
    pub timestamp: String,

    /// The user who logged the call.
    #[serde(default)]
    pub user_id: Option<UserId>,
}

impl CallRecord {
    /// Create a new call record with a freshly generated ID.
    #[must_use]
    pub fn new(
        contact_id: ContactId,
        direction: CallDirection,
        timestamp: String,
        user_id: UserId,
    ) -> Self {
        Self {
            id: CallRecordId::generate(),
            contact_id: Some(contact_id),
            direction,
            timestamp,
            user_id: Some(user_id),
        }
    }

    /// The empty record returned for an id that has never been stored.
    #[must_use]
    pub fn empty(id: CallRecordId) -> Self {
        Self {
            id,
            contact_id: None,
            direction: CallDirection::default(),
            timestamp: String::new(),
            user_id: None,
        }
    }

    /// Check whether this record is `user_id`'s call with `contact_id`.
    #[must_use]
    pub fn belongs_to(&self, user_id: &UserId, contact_id: &ContactId) -> bool {
        self.user_id.as_ref() == Some(user_id) && self.contact_id.as_ref() == Some(contact_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_parses_lowercase_names() {
        assert_eq!("inbound".parse::<CallDirection>().unwrap(), CallDirection::Inbound);
        assert_eq!("outbound".parse::<CallDirection>().unwrap(), CallDirection::Outbound);
        assert!(matches!(
            "sideways".parse::<CallDirection>(),
            Err(DomainError::InvalidDirection(_))
        ));
    }

    #[test]
    fn records_get_distinct_ids() {
        let contact = ContactId::new("5551234567").unwrap();
        let user = UserId::new("a@example.com").unwrap();
        let first = CallRecord::new(
            contact.clone(),
            CallDirection::Inbound,
            "2024-01-01T00:00:00Z".into(),
            user.clone(),
        );
        let second = CallRecord::new(
            contact.clone(),
            CallDirection::Inbound,
            "2024-01-01T00:00:00Z".into(),
            user.clone(),
        );
        assert_ne!(first.id, second.id);
        assert!(first.belongs_to(&user, &contact));
    }

    #[test]
    fn record_json_shape() {
        let record = CallRecord::new(
            ContactId::new("5551234567").unwrap(),
            CallDirection::Outbound,
            "2024-01-01T00:00:00Z".into(),
            UserId::new("a@example.com").unwrap(),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["contactId"], "5551234567");
        assert_eq!(json["direction"], "outbound");
        assert_eq!(json["userId"], "a@example.com");
    }
}
