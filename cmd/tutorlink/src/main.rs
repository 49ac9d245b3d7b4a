//! # tutorlink
//!
//! Wires the core services to the in-memory document store and an
//! in-process session, then walks one full marketplace lifecycle so a
//! local run shows the moving parts end to end.

use std::sync::Arc;

use anyhow::Result;
use auth_adapters::SessionIdentity;
use chrono::{Duration, Utc};
use configs::Settings;
use domains::{HelpRole, IdentityProvider, NewPost, PostFilter, User};
use services::{ModerationEngine, PostLifecycle, SchedulingNegotiator, UserDirectory};
use storage_adapters::MemoryStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&settings.log.filter)?)
        .init();

    let store = Arc::new(MemoryStore::new());
    store.set_offline(settings.store.offline);
    let identity = Arc::new(SessionIdentity::new());
    let directory = Arc::new(UserDirectory::new(store.clone()));
    let lifecycle = PostLifecycle::new(store.clone(), directory.clone());
    let negotiator = SchedulingNegotiator::new(store.clone());
    let moderation = ModerationEngine::new(store.clone(), directory.clone());
    info!(project_id = %settings.store.project_id, "tutorlink core ready");

    let mut admin = User::new("admin", "Alex");
    admin.is_admin = true;
    directory.save_user(&admin).await?;
    directory.save_user(&User::new("dana", "Dana")).await?;
    directory.save_user(&User::new("sam", "Sam")).await?;

    identity.sign_in("dana");
    let poster = identity
        .current_user_id()
        .ok_or_else(|| anyhow::anyhow!("no signed-in user"))?;

    let post = lifecycle
        .create_post(
            &poster,
            NewPost {
                title: "Need a hand with limits".into(),
                course_subject: "math".into(),
                course_code: "137".into(),
                message: "Struggling with epsilon-delta proofs before midterm.".into(),
                role: HelpRole::Requesting,
            },
        )
        .await?;
    info!(post_id = %post.id, subject = %post.course_subject, "post created");

    lifecycle.add_comment(&post.id, "sam", "I took this last term, happy to help.").await?;
    lifecycle.match_with(&post.id, &poster, "sam").await?;
    info!(post_id = %post.id, "dana matched sam to the post");

    let slots = vec![Utc::now() + Duration::days(1), Utc::now() + Duration::days(2)];
    negotiator.propose_times(&post.id, &poster, slots.clone()).await?;
    let settled = negotiator.select_time(&post.id, "sam", Some(slots[0])).await?;
    info!(post_id = %settled.id, "meeting time agreed");

    let liked = directory.toggle_like("sam", &poster).await?;
    info!(liked, "dana thanked sam with a like");

    let visible = lifecycle.list_visible(&poster, &PostFilter::default()).await?;
    info!(count = visible.len(), "posts visible to dana");

    let report = moderation.file_report("sam", "dana", "No-show twice in a row.").await?;
    moderation.resolve_report_by_reject(&report.id, "admin").await?;
    info!("report reviewed and dismissed by admin");

    lifecycle.close(&post.id, &poster).await?;
    identity.sign_out();
    info!("lifecycle walkthrough complete");
    Ok(())
}
