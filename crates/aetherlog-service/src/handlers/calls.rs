//! Call log handlers: contacts, call history and call upload.

use serde::{Deserialize, Serialize};
use serde_json::json;

use aetherlog_core::{CallDirection, CallRecord, Contact, ContactId, UserId};
use aetherlog_store::{CallRecordEntity, ContactEntity, StoreError};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::non_blank;
use crate::state::AppState;

/// A call reported by a client device.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadCallRequest {
    /// Name of the other party.
    pub name: String,
    /// Phone number of the other party, in any formatting.
    pub phone: String,
    /// `inbound` or `outbound`.
    pub direction: String,
    /// When the call happened (ISO 8601).
    pub timestamp: String,
}

/// Result of an upload: the contact the call was filed under and the new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedCall {
    /// The contact, after any creation or re-assignment.
    pub contact: Contact,
    /// The stored call record.
    pub call_record: CallRecord,
}

/// List the caller's contacts.
pub async fn list_contacts(state: &AppState, actor: &AuthUser) -> Result<Vec<Contact>, ApiError> {
    let contacts = ContactEntity::list(&state.storage).await?;
    Ok(contacts
        .items
        .into_iter()
        .filter(|contact| contact.is_owned_by(&actor.user_id))
        .collect())
}

/// List the caller's calls with one contact.
pub async fn list_calls(
    state: &AppState,
    actor: &AuthUser,
    contact_id: &str,
) -> Result<Vec<CallRecord>, ApiError> {
    let contact_id =
        ContactId::new(contact_id).map_err(|_| ApiError::BadRequest("Invalid contactId".into()))?;

    let calls = CallRecordEntity::list(&state.storage).await?;
    Ok(calls
        .items
        .into_iter()
        .filter(|call| call.belongs_to(&actor.user_id, &contact_id))
        .collect())
}

/// File a call under its contact, creating or claiming the contact as needed.
///
/// The contact is keyed by the phone number's digits. A contact that does not
/// exist yet is created for the caller; one owned by another user is
/// re-assigned to the caller under the uploaded name.
pub async fn upload_call(
    state: &AppState,
    actor: &AuthUser,
    request: UploadCallRequest,
) -> Result<UploadedCall, ApiError> {
    let (Some(name), Some(phone), Some(direction), Some(timestamp)) = (
        non_blank(&request.name),
        non_blank(&request.phone),
        non_blank(&request.direction),
        non_blank(&request.timestamp),
    ) else {
        return Err(ApiError::BadRequest(
            "Invalid payload. name, phone, direction, and timestamp are required.".into(),
        ));
    };

    let direction: CallDirection = direction.parse()?;
    let contact_id = ContactId::new(phone)?;

    let contact = resolve_contact(state, &actor.user_id, contact_id, name, phone).await?;

    let record = CallRecord::new(
        contact.id.clone(),
        direction,
        timestamp.to_string(),
        actor.user_id.clone(),
    );
    let call_record = CallRecordEntity::create(&state.storage, record).await?;

    tracing::info!(
        user_id = %actor.user_id,
        contact_id = %contact.id,
        call_id = %call_record.id,
        "Call uploaded"
    );

    Ok(UploadedCall {
        contact,
        call_record,
    })
}

/// Find, create or claim the contact for `contact_id` on behalf of `owner`.
async fn resolve_contact(
    state: &AppState,
    owner: &UserId,
    contact_id: ContactId,
    name: &str,
    phone: &str,
) -> Result<Contact, ApiError> {
    let entity = ContactEntity::new(&state.storage, contact_id.clone());

    if entity.exists().await? {
        let existing = entity.get_state().await?;
        return claim(&entity, existing, owner, name).await;
    }

    let fresh = Contact::new(contact_id, name, phone, owner.clone());
    match ContactEntity::create(&state.storage, fresh).await {
        Ok(contact) => {
            tracing::debug!(contact_id = %contact.id, user_id = %owner, "Contact created");
            Ok(contact)
        }
        Err(StoreError::AlreadyExists { .. }) => {
            // Another upload created it first.
            let existing = entity.get_state().await?;
            claim(&entity, existing, owner, name).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Re-assign `contact` to `owner` unless it already belongs to them.
async fn claim(
    entity: &ContactEntity,
    contact: Contact,
    owner: &UserId,
    name: &str,
) -> Result<Contact, ApiError> {
    if contact.is_owned_by(owner) {
        return Ok(contact);
    }

    let claimed = entity.patch(json!({ "name": name, "userId": owner })).await?;
    tracing::info!(
        contact_id = %claimed.id,
        previous_owner = ?contact.user_id,
        user_id = %owner,
        "Contact re-assigned"
    );
    Ok(claimed)
}
