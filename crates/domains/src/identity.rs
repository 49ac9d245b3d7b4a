//! # Identity Provider Port
//!
//! The core trusts the authenticated user id supplied by the surrounding
//! application as-is; credentials and session mechanics live outside.

#[cfg_attr(feature = "testing", mockall::automock)]
pub trait IdentityProvider: Send + Sync {
    /// The authenticated user, if any.
    fn current_user_id(&self) -> Option<String>;

    /// Ends the current session. Callers are expected to clear any
    /// user-derived caches alongside this.
    fn sign_out(&self);
}
