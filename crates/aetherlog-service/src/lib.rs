//! AetherLog service operations.
//!
//! This crate provides the operations behind the AetherLog API:
//!
//! - Account sign-up and credential lookup (rate limited per client)
//! - User administration (listing, role changes, deletion)
//! - Contacts and call history, and call upload
//!
//! # Authentication
//!
//! Tokens are verified outside this crate. Handlers that need a caller take an
//! [`AuthUser`] built from the verified claims; admin-only handlers check its
//! role themselves.
//!
//! # Responses
//!
//! Handlers return `Result<T, ApiError>`. [`ApiResponse::from_result`] turns
//! that into a status code and the `{success, data | error}` envelope.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Handlers all return Result<_, ApiError>
#![allow(clippy::missing_errors_doc)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

pub use auth::AuthUser;
pub use config::ServiceConfig;
pub use error::{ApiError, ApiResponse};
pub use state::AppState;
