//! # SchedulingNegotiator
//!
//! One-round meeting-time negotiation on a matched post. The owner proposes
//! up to [`MAX_PROPOSED_SLOTS`] future slots exactly once; the matched
//! counterpart either picks one of them or rejects them all. Both steps run
//! in store transactions against the post document, so the negotiation phase
//! can never be advanced twice.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domains::{
    decode, encode, CoreError, DocumentStore, Negotiation, Post, PostState, Result,
    MAX_PROPOSED_SLOTS,
};
use tracing::debug;

use crate::collection;

pub struct SchedulingNegotiator {
    store: Arc<dyn DocumentStore>,
}

impl SchedulingNegotiator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        SchedulingNegotiator { store }
    }

    /// The post owner proposes candidate meeting slots, in display order.
    ///
    /// Allowed once per match, only while the negotiation is still pending.
    /// Slots must be non-empty, at most [`MAX_PROPOSED_SLOTS`], and all in
    /// the future at the time of the call.
    pub async fn propose_times(
        &self,
        post_id: &str,
        actor: &str,
        slots: Vec<DateTime<Utc>>,
    ) -> Result<Post> {
        if slots.is_empty() {
            return Err(CoreError::Validation(
                "at least one time slot is required".into(),
            ));
        }
        if slots.len() > MAX_PROPOSED_SLOTS {
            return Err(CoreError::Validation(format!(
                "at most {MAX_PROPOSED_SLOTS} time slots may be proposed"
            )));
        }
        let now = Utc::now();
        if slots.iter().any(|slot| *slot <= now) {
            return Err(CoreError::Validation(
                "time slots must be in the future".into(),
            ));
        }
        let mut updated: Option<Post> = None;
        self.store
            .run_transaction(Box::new(|tx| {
                let doc = tx
                    .get(collection::POSTS, post_id)?
                    .ok_or_else(|| CoreError::not_found("post", post_id))?;
                let mut post: Post = decode(doc)?;
                let PostState::Matched {
                    matched_id,
                    negotiation,
                } = post.state.clone()
                else {
                    return Err(CoreError::InvalidState(
                        "scheduling requires a matched post".into(),
                    ));
                };
                if post.poster_id != actor {
                    return Err(CoreError::Authorization(
                        "only the poster can propose times".into(),
                    ));
                }
                match negotiation {
                    Negotiation::Pending => {}
                    Negotiation::Proposed { .. } => {
                        return Err(CoreError::InvalidState(
                            "times have already been proposed".into(),
                        ))
                    }
                    Negotiation::Finalized { .. } | Negotiation::Rejected { .. } => {
                        return Err(CoreError::InvalidState(
                            "the negotiation is already settled".into(),
                        ))
                    }
                }
                post.state = PostState::Matched {
                    matched_id,
                    negotiation: Negotiation::Proposed {
                        slots: slots.clone(),
                    },
                };
                tx.set(collection::POSTS, post_id, encode(&post)?);
                updated = Some(post);
                Ok(())
            }))
            .await?;
        debug!(post_id, count = slots.len(), "time slots proposed");
        updated.ok_or_else(|| CoreError::InvalidState("proposal produced no post".into()))
    }

    /// The matched counterpart settles the round: `Some(slot)` accepts one
    /// of the proposed slots, `None` rejects them all. Either way the
    /// negotiation becomes terminal.
    pub async fn select_time(
        &self,
        post_id: &str,
        actor: &str,
        choice: Option<DateTime<Utc>>,
    ) -> Result<Post> {
        let mut updated: Option<Post> = None;
        self.store
            .run_transaction(Box::new(|tx| {
                let doc = tx
                    .get(collection::POSTS, post_id)?
                    .ok_or_else(|| CoreError::not_found("post", post_id))?;
                let mut post: Post = decode(doc)?;
                let PostState::Matched {
                    matched_id,
                    negotiation,
                } = post.state.clone()
                else {
                    return Err(CoreError::InvalidState(
                        "scheduling requires a matched post".into(),
                    ));
                };
                if matched_id != actor {
                    return Err(CoreError::Authorization(
                        "only the matched partner can respond to proposed times".into(),
                    ));
                }
                let slots = match negotiation {
                    Negotiation::Proposed { slots } => slots,
                    Negotiation::Pending => {
                        return Err(CoreError::InvalidState(
                            "no times have been proposed yet".into(),
                        ))
                    }
                    Negotiation::Finalized { .. } | Negotiation::Rejected { .. } => {
                        return Err(CoreError::InvalidState(
                            "the negotiation is already settled".into(),
                        ))
                    }
                };
                let next = match choice {
                    Some(chosen) => {
                        if !slots.contains(&chosen) {
                            return Err(CoreError::Validation(
                                "chosen time is not one of the proposed slots".into(),
                            ));
                        }
                        Negotiation::Finalized { slots, chosen }
                    }
                    None => Negotiation::Rejected { slots },
                };
                post.state = PostState::Matched {
                    matched_id,
                    negotiation: next,
                };
                tx.set(collection::POSTS, post_id, encode(&post)?);
                updated = Some(post);
                Ok(())
            }))
            .await?;
        debug!(post_id, accepted = choice.is_some(), "negotiation settled");
        updated.ok_or_else(|| CoreError::InvalidState("selection produced no post".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PostLifecycle, UserDirectory};
    use chrono::Duration;
    use domains::{HelpRole, NewPost};
    use storage_adapters::MemoryStore;

    async fn matched_post() -> (SchedulingNegotiator, PostLifecycle, String) {
        let store = Arc::new(MemoryStore::new());
        let directory = Arc::new(UserDirectory::new(store.clone()));
        let lifecycle = PostLifecycle::new(store.clone(), directory);
        let post = lifecycle
            .create_post(
                "owner",
                NewPost {
                    title: "Stats study group".into(),
                    course_subject: "STAT".into(),
                    course_code: "230".into(),
                    message: "weekly sessions".into(),
                    role: HelpRole::Providing,
                },
            )
            .await
            .unwrap();
        lifecycle.match_with(&post.id, "owner", "partner").await.unwrap();
        (SchedulingNegotiator::new(store), lifecycle, post.id)
    }

    fn future(hours: i64) -> DateTime<Utc> {
        Utc::now() + Duration::hours(hours)
    }

    #[tokio::test]
    async fn rejects_too_many_slots() {
        let (negotiator, _, post_id) = matched_post().await;
        let slots: Vec<_> = (1..=6).map(future).collect();
        let err = negotiator.propose_times(&post_id, "owner", slots).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_past_and_empty_slots() {
        let (negotiator, _, post_id) = matched_post().await;
        let err = negotiator
            .propose_times(&post_id, "owner", vec![future(-1)])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        let err = negotiator
            .propose_times(&post_id, "owner", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn only_owner_proposes_once() {
        let (negotiator, _, post_id) = matched_post().await;
        let err = negotiator
            .propose_times(&post_id, "partner", vec![future(1)])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));
        negotiator
            .propose_times(&post_id, "owner", vec![future(1), future(2)])
            .await
            .unwrap();
        let err = negotiator
            .propose_times(&post_id, "owner", vec![future(3)])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[tokio::test]
    async fn proposal_order_is_preserved() {
        let (negotiator, _, post_id) = matched_post().await;
        let slots = vec![future(5), future(1), future(3)];
        let post = negotiator
            .propose_times(&post_id, "owner", slots.clone())
            .await
            .unwrap();
        let PostState::Matched { negotiation, .. } = post.state else {
            panic!("post should stay matched");
        };
        assert_eq!(negotiation, Negotiation::Proposed { slots });
    }

    #[tokio::test]
    async fn selection_requires_proposal_and_membership() {
        let (negotiator, _, post_id) = matched_post().await;
        let err = negotiator
            .select_time(&post_id, "partner", Some(future(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
        negotiator
            .propose_times(&post_id, "owner", vec![future(1)])
            .await
            .unwrap();
        let err = negotiator
            .select_time(&post_id, "stranger", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));
        let err = negotiator
            .select_time(&post_id, "owner", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));
    }

    #[tokio::test]
    async fn chosen_slot_must_be_proposed() {
        let (negotiator, _, post_id) = matched_post().await;
        let slot = future(2);
        negotiator
            .propose_times(&post_id, "owner", vec![slot])
            .await
            .unwrap();
        let err = negotiator
            .select_time(&post_id, "partner", Some(future(7)))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        let post = negotiator
            .select_time(&post_id, "partner", Some(slot))
            .await
            .unwrap();
        let PostState::Matched { negotiation, .. } = post.state else {
            panic!("post should stay matched");
        };
        assert_eq!(
            negotiation,
            Negotiation::Finalized {
                slots: vec![slot],
                chosen: slot,
            }
        );
    }

    #[tokio::test]
    async fn rejection_is_terminal() {
        let (negotiator, _, post_id) = matched_post().await;
        negotiator
            .propose_times(&post_id, "owner", vec![future(1)])
            .await
            .unwrap();
        let post = negotiator.select_time(&post_id, "partner", None).await.unwrap();
        let PostState::Matched { negotiation, .. } = &post.state else {
            panic!("post should stay matched");
        };
        assert!(negotiation.is_settled());
        let err = negotiator
            .select_time(&post_id, "partner", Some(future(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
        let err = negotiator
            .propose_times(&post_id, "owner", vec![future(2)])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }
}
