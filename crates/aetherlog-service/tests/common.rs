//! Common test utilities for AetherLog service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use aetherlog_core::{PublicUser, Role, UserId};
use aetherlog_service::handlers::accounts::{self, SignUpRequest};
use aetherlog_service::{AppState, AuthUser, ServiceConfig};
use aetherlog_store::{ManualClock, MemoryStore};

/// Email that becomes admin when it signs up first.
pub const ADMIN_EMAIL: &str = "admin@example.com";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// Application state over a fresh in-memory store.
    pub state: AppState,
    /// The store behind `state`, for inspecting raw documents.
    pub store: Arc<MemoryStore>,
    /// Clock driving the rate limiter.
    pub clock: Arc<ManualClock>,
    /// Counter for unique client addresses.
    next_client: std::sync::atomic::AtomicU32,
}

impl TestHarness {
    /// Create a new test harness with a fresh store.
    pub fn new() -> Self {
        Self::with_config(ServiceConfig {
            bootstrap_admin_email: Some(ADMIN_EMAIL.into()),
            ..ServiceConfig::default()
        })
    }

    /// Create a harness with a custom configuration.
    pub fn with_config(config: ServiceConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let state = AppState::with_clock(store.clone(), config, clock.clone());

        Self {
            state,
            store,
            clock,
            next_client: std::sync::atomic::AtomicU32::new(1),
        }
    }

    /// A client address nobody has used yet, so the rate limiter stays out of the way.
    pub fn fresh_client(&self) -> String {
        let n = self
            .next_client
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        format!("10.0.{}.{}", n / 256, n % 256)
    }

    /// Sign up a user and return it.
    pub async fn sign_up(&self, email: &str, name: &str) -> PublicUser {
        accounts::sign_up(
            &self.state,
            &self.fresh_client(),
            SignUpRequest {
                name: name.into(),
                email: email.into(),
                password_hash: "hashed-password".into(),
            },
        )
        .await
        .expect("sign up")
    }

    /// Sign up the bootstrap admin and return its identity.
    pub async fn admin(&self) -> AuthUser {
        let user = self.sign_up(ADMIN_EMAIL, "Admin").await;
        assert_eq!(user.role, Role::Admin);
        AuthUser::new(user.id, Role::Admin)
    }

    /// Sign up a regular user and return its identity.
    pub async fn user(&self, email: &str) -> AuthUser {
        let user = self.sign_up(email, "Regular User").await;
        AuthUser::new(user.id, Role::User)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity for a user that was never stored.
pub fn unknown_user(email: &str, role: Role) -> AuthUser {
    AuthUser::new(UserId::new(email).expect("valid email"), role)
}
