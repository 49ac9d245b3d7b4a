//! Post state machine under contention, plus cascade deletion.

use domains::{CoreError, DocumentStore, PostState, Predicate};
use integration_tests::{app, sample_post};
use services::collection;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn only_one_of_two_racing_matches_wins() {
    let app = app().await;
    let post = app.lifecycle.create_post("dana", sample_post("Calc help")).await.unwrap();
    let lifecycle = std::sync::Arc::new(app.lifecycle);
    let mut tasks = Vec::new();
    // Two instances of the same poster's session racing to match different
    // candidates; the conditional transition lets exactly one through.
    for candidate in ["sam", "riley"] {
        let lifecycle = lifecycle.clone();
        let post_id = post.id.clone();
        tasks.push(tokio::spawn(async move {
            lifecycle.match_with(&post_id, "dana", candidate).await
        }));
    }
    let mut wins = 0;
    let mut losses = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => wins += 1,
            Err(CoreError::InvalidState(_)) => losses += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!((wins, losses), (1, 1));
    let post = lifecycle.get_post(&post.id).await.unwrap();
    assert!(matches!(post.state, PostState::Matched { .. }));
}

#[tokio::test]
async fn admin_can_delete_another_users_post() {
    let app = app().await;
    let post = app.lifecycle.create_post("dana", sample_post("Calc help")).await.unwrap();
    let err = app.lifecycle.delete(&post.id, "sam").await.unwrap_err();
    assert!(matches!(err, CoreError::Authorization(_)));
    app.lifecycle.delete(&post.id, "admin").await.unwrap();
    assert!(app.lifecycle.get_post(&post.id).await.is_err());
}

#[tokio::test]
async fn failed_cascade_delete_leaves_thread_intact() {
    let app = app().await;
    let post = app.lifecycle.create_post("dana", sample_post("Calc help")).await.unwrap();
    app.lifecycle.add_comment(&post.id, "sam", "happy to help").await.unwrap();
    app.lifecycle.add_comment(&post.id, "riley", "same").await.unwrap();

    app.store.set_offline(true);
    let err = app.lifecycle.delete(&post.id, "dana").await.unwrap_err();
    assert!(err.is_retryable());
    app.store.set_offline(false);

    // Nothing was partially removed.
    assert!(app.lifecycle.get_post(&post.id).await.is_ok());
    let thread = app.lifecycle.comments_for(&post.id).await.unwrap();
    assert_eq!(thread.len(), 2);

    app.lifecycle.delete(&post.id, "dana").await.unwrap();
    let orphans = app
        .store
        .query(collection::COMMENTS, &[Predicate::eq("postId", post.id.as_str())], None)
        .await
        .unwrap();
    assert!(orphans.is_empty());
}

#[tokio::test]
async fn comment_threads_stay_in_chronological_order() {
    let app = app().await;
    let post = app.lifecycle.create_post("dana", sample_post("Calc help")).await.unwrap();
    for text in ["first", "second", "third"] {
        app.lifecycle.add_comment(&post.id, "sam", text).await.unwrap();
    }
    let thread = app.lifecycle.comments_for(&post.id).await.unwrap();
    let contents: Vec<_> = thread.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn commenting_on_a_missing_post_fails() {
    let app = app().await;
    let err = app.lifecycle.add_comment("ghost", "sam", "hello?").await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_, _)));
}

#[tokio::test]
async fn dropping_a_watch_handle_detaches_it() {
    let app = app().await;
    let post = app.lifecycle.create_post("dana", sample_post("Calc help")).await.unwrap();
    let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let sink = count.clone();
    {
        let _sub = app
            .lifecycle
            .watch_comments(
                &post.id,
                Box::new(move |_| {
                    sink.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                }),
            )
            .await
            .unwrap();
        app.lifecycle.add_comment(&post.id, "sam", "seen").await.unwrap();
    }
    let seen = count.load(std::sync::atomic::Ordering::SeqCst);
    app.lifecycle.add_comment(&post.id, "sam", "unseen").await.unwrap();
    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), seen);
}
