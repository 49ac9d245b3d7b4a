//! # PostLifecycle
//!
//! Creation, matching, closing, deletion, and listing of tutoring posts,
//! plus their comment threads. Status transitions run inside store
//! transactions so that two clients racing on the same post cannot both
//! win; visibility rules are applied here, after the store-side filters.

use std::sync::Arc;

use domains::{
    decode, encode, fields, Comment, CoreError, DocumentStore, HelpRole, Negotiation, NewPost,
    OrderBy, Post, PostFilter, PostState, Predicate, Result, Subscription,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{collection, UserDirectory};

/// Callback for live comment-thread updates, invoked with the full thread
/// in chronological order after every change.
pub type CommentsHandler = Box<dyn Fn(Vec<Comment>) + Send + Sync>;

pub struct PostLifecycle {
    store: Arc<dyn DocumentStore>,
    directory: Arc<UserDirectory>,
}

fn role_tag(role: HelpRole) -> &'static str {
    match role {
        HelpRole::Providing => "providing",
        HelpRole::Requesting => "requesting",
    }
}

impl PostLifecycle {
    pub fn new(store: Arc<dyn DocumentStore>, directory: Arc<UserDirectory>) -> Self {
        PostLifecycle { store, directory }
    }

    /// Creates an `Active` post owned by `actor`.
    ///
    /// Title, subject, code, and message must be non-blank; the subject is
    /// normalized to uppercase so filters match regardless of input casing.
    pub async fn create_post(&self, actor: &str, new_post: NewPost) -> Result<Post> {
        let title = new_post.title.trim();
        let subject = new_post.course_subject.trim();
        let code = new_post.course_code.trim();
        let message = new_post.message.trim();
        if title.is_empty() {
            return Err(CoreError::Validation("title must not be empty".into()));
        }
        if subject.is_empty() {
            return Err(CoreError::Validation(
                "course subject must not be empty".into(),
            ));
        }
        if code.is_empty() {
            return Err(CoreError::Validation("course code must not be empty".into()));
        }
        if message.is_empty() {
            return Err(CoreError::Validation("message must not be empty".into()));
        }
        let post = Post {
            id: Uuid::new_v4().to_string(),
            poster_id: actor.to_string(),
            title: title.to_string(),
            course_subject: subject.to_uppercase(),
            course_code: code.to_string(),
            message: message.to_string(),
            role: new_post.role,
            state: PostState::Active,
            created_at: chrono::Utc::now(),
        };
        self.store
            .set(collection::POSTS, &post.id, encode(&post)?)
            .await?;
        debug!(post_id = %post.id, "post created");
        Ok(post)
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Post> {
        let doc = self
            .store
            .get(collection::POSTS, post_id)
            .await?
            .ok_or_else(|| CoreError::not_found("post", post_id))?;
        decode(doc)
    }

    /// The poster picks `candidate` (typically a commenter) as the match.
    /// First transaction to commit wins; later attempts see a non-active
    /// post and fail. Matching opens a pending negotiation for the pair.
    pub async fn match_with(&self, post_id: &str, actor: &str, candidate: &str) -> Result<Post> {
        let mut matched: Option<Post> = None;
        self.store
            .run_transaction(Box::new(|tx| {
                let doc = tx
                    .get(collection::POSTS, post_id)?
                    .ok_or_else(|| CoreError::not_found("post", post_id))?;
                let mut post: Post = decode(doc)?;
                if post.poster_id != actor {
                    return Err(CoreError::Authorization(
                        "only the poster can match their post".into(),
                    ));
                }
                if post.state != PostState::Active {
                    return Err(CoreError::InvalidState(
                        "post is no longer open for matching".into(),
                    ));
                }
                if post.poster_id == candidate {
                    return Err(CoreError::SelfAction(
                        "you cannot match with yourself".into(),
                    ));
                }
                post.state = PostState::Matched {
                    matched_id: candidate.to_string(),
                    negotiation: Negotiation::Pending,
                };
                tx.set(collection::POSTS, post_id, encode(&post)?);
                matched = Some(post);
                Ok(())
            }))
            .await?;
        debug!(post_id, candidate, "post matched");
        // The transaction body stored the post before returning Ok.
        matched.ok_or_else(|| CoreError::InvalidState("match produced no post".into()))
    }

    /// The poster retires their post. Legal from `Active` (abandoned) and
    /// from `Matched` (concluded, negotiation state preserved); `Closed`
    /// is terminal.
    pub async fn close(&self, post_id: &str, actor: &str) -> Result<Post> {
        let mut closed: Option<Post> = None;
        self.store
            .run_transaction(Box::new(|tx| {
                let doc = tx
                    .get(collection::POSTS, post_id)?
                    .ok_or_else(|| CoreError::not_found("post", post_id))?;
                let mut post: Post = decode(doc)?;
                if post.poster_id != actor {
                    return Err(CoreError::Authorization(
                        "only the poster can close a post".into(),
                    ));
                }
                post.state = match post.state {
                    PostState::Active => PostState::Closed {
                        matched_id: None,
                        negotiation: Negotiation::Pending,
                    },
                    PostState::Matched {
                        matched_id,
                        negotiation,
                    } => PostState::Closed {
                        matched_id: Some(matched_id),
                        negotiation,
                    },
                    PostState::Closed { .. } => {
                        return Err(CoreError::InvalidState("post is already closed".into()))
                    }
                };
                tx.set(collection::POSTS, post_id, encode(&post)?);
                closed = Some(post);
                Ok(())
            }))
            .await?;
        debug!(post_id, "post closed");
        closed.ok_or_else(|| CoreError::InvalidState("close produced no post".into()))
    }

    /// Removes a post and its entire comment thread in one batch, so a
    /// mid-way failure never leaves orphaned comments behind. Allowed for
    /// the poster and for admins.
    pub async fn delete(&self, post_id: &str, actor: &str) -> Result<()> {
        let post = self.get_post(post_id).await?;
        if post.poster_id != actor && !self.directory.is_admin(actor).await {
            return Err(CoreError::Authorization(
                "only the poster or an admin can delete a post".into(),
            ));
        }
        let comments = self
            .store
            .query(
                collection::COMMENTS,
                &[Predicate::eq("postId", post_id)],
                None,
            )
            .await?;
        let mut ops: Vec<domains::WriteOp> = comments
            .iter()
            .filter_map(|doc| doc.get("id").and_then(|v| v.as_str()))
            .map(|id| domains::WriteOp::Delete {
                collection: collection::COMMENTS.to_string(),
                id: id.to_string(),
            })
            .collect();
        ops.push(domains::WriteOp::Delete {
            collection: collection::POSTS.to_string(),
            id: post_id.to_string(),
        });
        self.store.commit_batch(ops).await?;
        debug!(post_id, comments = comments.len(), "post deleted with thread");
        Ok(())
    }

    /// Lists posts `actor` is allowed to see, newest first.
    ///
    /// Filters combine conjunctively and run store-side; visibility is
    /// applied afterwards: active posts are public, matched and closed
    /// posts are visible only to the parties involved. The `poster_id`
    /// filter is admin-only and, for admins, bypasses visibility so
    /// moderation can inspect a user's full history.
    pub async fn list_visible(&self, actor: &str, filter: &PostFilter) -> Result<Vec<Post>> {
        let mut admin_view = false;
        if filter.poster_id.is_some() {
            if !self.directory.is_admin(actor).await {
                return Err(CoreError::Authorization(
                    "filtering by poster requires admin privileges".into(),
                ));
            }
            admin_view = true;
        }
        let mut predicates = Vec::new();
        if let Some(subject) = &filter.course_subject {
            predicates.push(Predicate::eq("courseSubject", subject.to_uppercase()));
        }
        if let Some(code) = &filter.course_code {
            predicates.push(Predicate::eq("courseCode", code.trim()));
        }
        if let Some(role) = filter.role {
            predicates.push(Predicate::eq("role", role_tag(role)));
        }
        if filter.mine_only {
            predicates.push(Predicate::eq("posterId", actor));
        }
        if let Some(poster) = &filter.poster_id {
            predicates.push(Predicate::eq("posterId", poster.as_str()));
        }
        let docs = self
            .store
            .query(
                collection::POSTS,
                &predicates,
                Some(&OrderBy::desc("createdAt")),
            )
            .await?;
        let mut posts = Vec::with_capacity(docs.len());
        for doc in docs {
            match decode::<Post>(doc) {
                Ok(post) => {
                    if admin_view || Self::visible_to(&post, actor) {
                        posts.push(post);
                    }
                }
                Err(e) => warn!(error = %e, "skipping malformed post document"),
            }
        }
        Ok(posts)
    }

    fn visible_to(post: &Post, actor: &str) -> bool {
        match &post.state {
            PostState::Active => true,
            PostState::Matched { matched_id, .. } => {
                post.poster_id == actor || matched_id == actor
            }
            PostState::Closed { matched_id, .. } => {
                post.poster_id == actor || matched_id.as_deref() == Some(actor)
            }
        }
    }

    /// Posts where `actor` is a party to a match, matched before closed,
    /// newest first within each group. Feeds the "my matches" screen.
    pub async fn list_matches(&self, actor: &str) -> Result<Vec<Post>> {
        let docs = self
            .store
            .query(
                collection::POSTS,
                &[Predicate::any_of("status", ["matched", "closed"])],
                Some(&OrderBy::desc("createdAt")),
            )
            .await?;
        let mut posts = Vec::new();
        for doc in docs {
            match decode::<Post>(doc) {
                Ok(post) => {
                    let involved = post.poster_id == actor
                        || post.state.matched_id() == Some(actor);
                    if involved {
                        posts.push(post);
                    }
                }
                Err(e) => warn!(error = %e, "skipping malformed post document"),
            }
        }
        // Stable partition keeps newest-first order inside each group.
        posts.sort_by_key(|p| p.state.is_closed());
        Ok(posts)
    }

    /// Appends a comment to an existing post's thread.
    pub async fn add_comment(&self, post_id: &str, actor: &str, content: &str) -> Result<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CoreError::Validation("comment must not be empty".into()));
        }
        // Existence check keeps threads from outliving their post.
        self.get_post(post_id).await?;
        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            post_id: post_id.to_string(),
            user_id: actor.to_string(),
            content: content.to_string(),
            created_at: chrono::Utc::now(),
        };
        self.store
            .set(collection::COMMENTS, &comment.id, encode(&comment)?)
            .await?;
        Ok(comment)
    }

    /// The post's comment thread, oldest first.
    pub async fn comments_for(&self, post_id: &str) -> Result<Vec<Comment>> {
        let docs = self
            .store
            .query(
                collection::COMMENTS,
                &[Predicate::eq("postId", post_id)],
                Some(&OrderBy::asc("createdAt")),
            )
            .await?;
        let mut comments = Vec::with_capacity(docs.len());
        for doc in docs {
            match decode::<Comment>(doc) {
                Ok(comment) => comments.push(comment),
                Err(e) => warn!(error = %e, "skipping malformed comment document"),
            }
        }
        Ok(comments)
    }

    /// Live view of a post's comment thread. The handler receives the full
    /// thread, oldest first, after every change until the subscription is
    /// dropped or unsubscribed.
    pub async fn watch_comments(
        &self,
        post_id: &str,
        handler: CommentsHandler,
    ) -> Result<Box<dyn Subscription>> {
        self.store
            .subscribe(
                collection::COMMENTS,
                vec![Predicate::eq("postId", post_id)],
                Box::new(move |docs| {
                    let mut comments: Vec<Comment> = docs
                        .iter()
                        .filter_map(|doc| decode(doc.clone()).ok())
                        .collect();
                    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                    handler(comments);
                }),
            )
            .await
    }
}
