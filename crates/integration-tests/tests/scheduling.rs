//! Negotiation against the full post lifecycle.

use domains::{CoreError, Negotiation, PostState};
use integration_tests::{app, sample_post, slot_in};

#[tokio::test]
async fn scheduling_needs_a_match_first() {
    let app = app().await;
    let post = app.lifecycle.create_post("dana", sample_post("Calc help")).await.unwrap();
    let err = app
        .negotiator
        .propose_times(&post.id, "dana", vec![slot_in(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidState(_)));
}

#[tokio::test]
async fn proposed_slots_survive_persistence_in_order() {
    let app = app().await;
    let post = app.lifecycle.create_post("dana", sample_post("Calc help")).await.unwrap();
    app.lifecycle.match_with(&post.id, "dana", "sam").await.unwrap();
    let slots = vec![slot_in(48), slot_in(2), slot_in(24)];
    app.negotiator.propose_times(&post.id, "dana", slots.clone()).await.unwrap();

    let reread = app.lifecycle.get_post(&post.id).await.unwrap();
    let PostState::Matched { negotiation, .. } = reread.state else {
        panic!("post should stay matched");
    };
    assert_eq!(negotiation, Negotiation::Proposed { slots });
}

#[tokio::test]
async fn closing_preserves_the_settled_negotiation() {
    let app = app().await;
    let post = app.lifecycle.create_post("dana", sample_post("Calc help")).await.unwrap();
    app.lifecycle.match_with(&post.id, "dana", "sam").await.unwrap();
    let slot = slot_in(24);
    app.negotiator.propose_times(&post.id, "dana", vec![slot]).await.unwrap();
    app.negotiator.select_time(&post.id, "sam", Some(slot)).await.unwrap();

    let closed = app.lifecycle.close(&post.id, "dana").await.unwrap();
    let PostState::Closed { matched_id, negotiation } = closed.state else {
        panic!("post should be closed");
    };
    assert_eq!(matched_id.as_deref(), Some("sam"));
    assert_eq!(
        negotiation,
        Negotiation::Finalized {
            slots: vec![slot],
            chosen: slot,
        }
    );
}

#[tokio::test]
async fn closed_posts_stop_accepting_negotiation_steps() {
    let app = app().await;
    let post = app.lifecycle.create_post("dana", sample_post("Calc help")).await.unwrap();
    app.lifecycle.match_with(&post.id, "dana", "sam").await.unwrap();
    app.negotiator.propose_times(&post.id, "dana", vec![slot_in(1)]).await.unwrap();
    app.lifecycle.close(&post.id, "dana").await.unwrap();

    let err = app
        .negotiator
        .select_time(&post.id, "sam", Some(slot_in(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidState(_)));
}

#[tokio::test]
async fn rejection_needs_a_fresh_post_to_reschedule() {
    let app = app().await;
    let post = app.lifecycle.create_post("dana", sample_post("Calc help")).await.unwrap();
    app.lifecycle.match_with(&post.id, "dana", "sam").await.unwrap();
    app.negotiator.propose_times(&post.id, "dana", vec![slot_in(1)]).await.unwrap();
    app.negotiator.select_time(&post.id, "sam", None).await.unwrap();

    // The round is spent on this post.
    let err = app
        .negotiator
        .propose_times(&post.id, "dana", vec![slot_in(2)])
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidState(_)));

    // A new post starts a new negotiation.
    let fresh = app.lifecycle.create_post("dana", sample_post("Second try")).await.unwrap();
    app.lifecycle.match_with(&fresh.id, "dana", "sam").await.unwrap();
    app.negotiator.propose_times(&fresh.id, "dana", vec![slot_in(3)]).await.unwrap();
}
