//! Entity descriptors for the AetherLog domain types.

use aetherlog_core::{CallRecord, CallRecordId, Contact, ContactId, User, UserId};

use crate::entity::{Entity, IndexedEntity};

/// Contacts, one document per normalized phone number.
pub type ContactEntity = IndexedEntity<Contact>;

/// Call records, one document per generated record id.
pub type CallRecordEntity = IndexedEntity<CallRecord>;

/// Users, one document per normalized email address.
pub type UserEntity = IndexedEntity<User>;

impl Entity for Contact {
    type Id = ContactId;

    const NAME: &'static str = "contact";
    const INDEX_NAME: &'static str = "contacts";

    fn initial_state(id: &ContactId) -> Self {
        Self::empty(id.clone())
    }

    fn id(&self) -> &ContactId {
        &self.id
    }
}

impl Entity for CallRecord {
    type Id = CallRecordId;

    const NAME: &'static str = "callRecord";
    const INDEX_NAME: &'static str = "callRecords";

    fn initial_state(id: &CallRecordId) -> Self {
        Self::empty(*id)
    }

    fn id(&self) -> &CallRecordId {
        &self.id
    }
}

impl Entity for User {
    type Id = UserId;

    const NAME: &'static str = "user";
    const INDEX_NAME: &'static str = "users";

    fn initial_state(id: &UserId) -> Self {
        Self::empty(id.clone())
    }

    fn id(&self) -> &UserId {
        &self.id
    }
}
