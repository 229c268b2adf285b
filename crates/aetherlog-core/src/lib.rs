//! Core types for AetherLog.
//!
//! This crate provides the domain records persisted by the storage layer:
//!
//! - **Identifiers**: `ContactId`, `CallRecordId`, `UserId`
//! - **Contacts**: `Contact`
//! - **Calls**: `CallRecord`, `CallDirection`
//! - **Users**: `User`, `PublicUser`, `Role`
//!
//! # Identity Rules
//!
//! Every record is stored under a key derived from its identifier:
//!
//! - A contact is identified by its phone number reduced to digits
//! - A call record gets a fresh, time-ordered ULID
//! - A user is identified by their lower-cased, trimmed email address

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod call;
pub mod contact;
pub mod error;
pub mod ids;
pub mod user;

pub use call::{CallDirection, CallRecord};
pub use contact::{initials_for, Contact};
pub use error::DomainError;
pub use ids::{CallRecordId, ContactId, IdError, UserId};
pub use user::{PublicUser, Role, User};
