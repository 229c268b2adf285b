//! Operation handlers.
//!
//! Each handler takes the shared [`AppState`](crate::AppState), the caller's
//! identity where one is required, and a typed request; it returns the
//! response payload or an [`ApiError`](crate::ApiError).

pub mod accounts;
pub mod admin;
pub mod calls;

/// Trimmed `value`, or `None` when it is blank.
pub(crate) fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
