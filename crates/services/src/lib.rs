//! tutorlink/crates/services
//!
//! The four core components of the tutoring marketplace: user directory,
//! post lifecycle engine, scheduling negotiator, and moderation engine.
//! Every multi-step invariant (atomicity, authorization, state-transition
//! legality) is enforced here, against the `domains::DocumentStore` port.

pub mod moderation;
pub mod post_lifecycle;
pub mod scheduling;
pub mod user_directory;

pub use moderation::ModerationEngine;
pub use post_lifecycle::PostLifecycle;
pub use scheduling::SchedulingNegotiator;
pub use user_directory::UserDirectory;

/// Logical collection names in the document store.
pub mod collection {
    pub const USERS: &str = "users";
    pub const POSTS: &str = "posts";
    pub const COMMENTS: &str = "comments";
    pub const REPORTS: &str = "reports";
}
