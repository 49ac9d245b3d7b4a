//! In-process session identity.

use std::sync::RwLock;

use domains::IdentityProvider;
use tracing::debug;

/// Holds the id of the currently signed-in user, if any.
///
/// Thread-safe so services on different tasks observe the same session.
/// Credential verification happens before [`SessionIdentity::sign_in`] is
/// called; this adapter only tracks who the session belongs to.
#[derive(Default)]
pub struct SessionIdentity {
    current: RwLock<Option<String>>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a session for `user_id`, replacing any existing one.
    pub fn sign_in(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        debug!(user_id, "session started");
        if let Ok(mut current) = self.current.write() {
            *current = Some(user_id);
        }
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.current.read().map(|c| c.clone()).unwrap_or(None)
    }

    fn sign_out(&self) {
        if let Ok(mut current) = self.current.write() {
            *current = None;
        }
        debug!("session ended");
    }
}
