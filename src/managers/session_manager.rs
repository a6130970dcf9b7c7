//! Session Manager for promptshelf.
//!
//! Holds the identity handed over by the authentication collaborator and
//! exposes the `is_authenticated` gate every mutating operation checks before
//! touching the network.

use std::sync::RwLock;

use crate::types::session::UserIdentity;

/// Trait defining the authentication gate consumed by the services.
pub trait AuthGate: Send + Sync {
    fn current_user(&self) -> Option<UserIdentity>;

    fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }

    fn access_token(&self) -> Option<String> {
        self.current_user().and_then(|user| user.access_token)
    }
}

/// Session state for the signed-in user.
#[derive(Default)]
pub struct SessionManager {
    user: RwLock<Option<UserIdentity>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager that is already signed in.
    pub fn signed_in(user: UserIdentity) -> Self {
        Self {
            user: RwLock::new(Some(user)),
        }
    }

    /// Opens the gate for `user`, replacing any previous identity.
    pub fn login(&self, user: UserIdentity) {
        tracing::info!(user_id = %user.user_id, "session started");
        *self.user.write().unwrap_or_else(|p| p.into_inner()) = Some(user);
    }

    /// Closes the gate. Returns the identity that was signed in, if any.
    pub fn logout(&self) -> Option<UserIdentity> {
        let previous = self.user.write().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(user) = &previous {
            tracing::info!(user_id = %user.user_id, "session ended");
        }
        previous
    }
}

impl AuthGate for SessionManager {
    fn current_user(&self) -> Option<UserIdentity> {
        self.user.read().unwrap_or_else(|p| p.into_inner()).clone()
    }
}
