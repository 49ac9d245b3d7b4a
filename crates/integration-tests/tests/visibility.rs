//! Listing filters and per-state visibility rules.

use domains::{CoreError, HelpRole, NewPost, PostFilter};
use integration_tests::{app, sample_post, TestApp};

fn filter() -> PostFilter {
    PostFilter::default()
}

async fn titles_for(app: &TestApp, actor: &str, filter: &PostFilter) -> Vec<String> {
    app.lifecycle
        .list_visible(actor, filter)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.title)
        .collect()
}

#[tokio::test]
async fn active_posts_are_public_and_newest_first() {
    let app = app().await;
    app.lifecycle.create_post("dana", sample_post("older")).await.unwrap();
    app.lifecycle.create_post("sam", sample_post("newer")).await.unwrap();
    let titles = titles_for(&app, "riley", &filter()).await;
    assert_eq!(titles, vec!["newer", "older"]);
}

#[tokio::test]
async fn matched_and_closed_posts_narrow_their_audience() {
    let app = app().await;
    let matched = app.lifecycle.create_post("dana", sample_post("matched")).await.unwrap();
    app.lifecycle.match_with(&matched.id, "dana", "sam").await.unwrap();
    let abandoned = app.lifecycle.create_post("dana", sample_post("abandoned")).await.unwrap();
    app.lifecycle.close(&abandoned.id, "dana").await.unwrap();

    // Poster sees both, the partner sees their match, outsiders see neither.
    assert_eq!(titles_for(&app, "dana", &filter()).await.len(), 2);
    assert_eq!(titles_for(&app, "sam", &filter()).await, vec!["matched"]);
    assert!(titles_for(&app, "riley", &filter()).await.is_empty());

    // Closing the match keeps it visible to both parties, nobody else.
    app.lifecycle.close(&matched.id, "dana").await.unwrap();
    assert_eq!(titles_for(&app, "sam", &filter()).await, vec!["matched"]);
    assert!(titles_for(&app, "riley", &filter()).await.is_empty());
}

#[tokio::test]
async fn filters_combine_conjunctively() {
    let app = app().await;
    app.lifecycle.create_post("dana", sample_post("math request")).await.unwrap();
    app.lifecycle
        .create_post(
            "dana",
            NewPost {
                title: "math offer".into(),
                course_subject: "math".into(),
                course_code: "137".into(),
                message: "can tutor evenings".into(),
                role: HelpRole::Providing,
            },
        )
        .await
        .unwrap();
    app.lifecycle
        .create_post(
            "sam",
            NewPost {
                title: "chem offer".into(),
                course_subject: "CHEM".into(),
                course_code: "120".into(),
                message: "labs and stoichiometry".into(),
                role: HelpRole::Providing,
            },
        )
        .await
        .unwrap();

    let narrowed = PostFilter {
        course_subject: Some("math".into()),
        role: Some(HelpRole::Providing),
        ..PostFilter::default()
    };
    assert_eq!(titles_for(&app, "riley", &narrowed).await, vec!["math offer"]);

    // Subject matching ignores input casing on both sides.
    let lowercase = PostFilter {
        course_subject: Some("chem".into()),
        ..PostFilter::default()
    };
    assert_eq!(titles_for(&app, "riley", &lowercase).await, vec!["chem offer"]);

    let mine = PostFilter {
        mine_only: true,
        ..PostFilter::default()
    };
    assert_eq!(titles_for(&app, "sam", &mine).await, vec!["chem offer"]);
}

#[tokio::test]
async fn poster_filter_is_admin_only_and_sees_everything() {
    let app = app().await;
    let post = app.lifecycle.create_post("dana", sample_post("hidden later")).await.unwrap();
    app.lifecycle.match_with(&post.id, "dana", "sam").await.unwrap();
    app.lifecycle.close(&post.id, "dana").await.unwrap();

    let by_poster = PostFilter {
        poster_id: Some("dana".into()),
        ..PostFilter::default()
    };
    let err = app.lifecycle.list_visible("riley", &by_poster).await.unwrap_err();
    assert!(matches!(err, CoreError::Authorization(_)));
    // Admins inspect full history, including posts closed to the public.
    assert_eq!(titles_for(&app, "admin", &by_poster).await, vec!["hidden later"]);
}

#[tokio::test]
async fn match_list_shows_open_matches_before_closed_ones() {
    let app = app().await;
    let first = app.lifecycle.create_post("dana", sample_post("concluded")).await.unwrap();
    app.lifecycle.match_with(&first.id, "dana", "sam").await.unwrap();
    app.lifecycle.close(&first.id, "dana").await.unwrap();
    let second = app.lifecycle.create_post("riley", sample_post("in progress")).await.unwrap();
    app.lifecycle.match_with(&second.id, "riley", "sam").await.unwrap();

    let titles: Vec<_> = app
        .lifecycle
        .list_matches("sam")
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.title)
        .collect();
    assert_eq!(titles, vec!["in progress", "concluded"]);
    // Uninvolved users have no matches to show.
    assert!(app.lifecycle.list_matches("riley").await.unwrap().len() == 1);
    assert!(app.lifecycle.list_matches("admin").await.unwrap().is_empty());
}
