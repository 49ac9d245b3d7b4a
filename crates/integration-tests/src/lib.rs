//! tutorlink/crates/integration-tests
//!
//! Shared fixtures for the integration suites: a fully wired core over the
//! in-memory store, pre-seeded with the cast the scenarios use.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use domains::{HelpRole, NewPost, User};
use services::{ModerationEngine, PostLifecycle, SchedulingNegotiator, UserDirectory};
use storage_adapters::MemoryStore;

/// Everything a scenario needs, sharing one store.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub directory: Arc<UserDirectory>,
    pub lifecycle: PostLifecycle,
    pub negotiator: SchedulingNegotiator,
    pub moderation: ModerationEngine,
}

/// Seeded users: `admin` (admin), plus regulars `dana`, `sam`, `riley`.
pub async fn app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let directory = Arc::new(UserDirectory::new(store.clone()));
    let lifecycle = PostLifecycle::new(store.clone(), directory.clone());
    let negotiator = SchedulingNegotiator::new(store.clone());
    let moderation = ModerationEngine::new(store.clone(), directory.clone());

    let mut admin = User::new("admin", "Alex");
    admin.is_admin = true;
    directory.save_user(&admin).await.unwrap();
    for (id, name) in [("dana", "Dana"), ("sam", "Sam"), ("riley", "Riley")] {
        directory.save_user(&User::new(id, name)).await.unwrap();
    }

    TestApp {
        store,
        directory,
        lifecycle,
        negotiator,
        moderation,
    }
}

/// A valid post request with the given title.
pub fn sample_post(title: &str) -> NewPost {
    NewPost {
        title: title.to_string(),
        course_subject: "MATH".to_string(),
        course_code: "137".to_string(),
        message: "epsilon-delta proofs".to_string(),
        role: HelpRole::Requesting,
    }
}

/// A slot `hours` from now; negative values produce past slots.
pub fn slot_in(hours: i64) -> DateTime<Utc> {
    Utc::now() + Duration::hours(hours)
}
