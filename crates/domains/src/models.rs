//! # Domain Models
//!
//! Core entities of the tutoring marketplace. Entity state machines are
//! expressed as sum types so that illegal field combinations (a matched post
//! without a partner, a finalized schedule without slots) are unrepresentable.
//! Field names follow the persisted camelCase document shape.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROFILE_COLOR: &str = "#4CAF50";

/// Maximum number of time slots a post owner may propose per negotiation round.
pub const MAX_PROPOSED_SLOTS: usize = 5;

/// Free-text weekly availability shown on a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    #[serde(default)]
    pub day: String,
    #[serde(default)]
    pub time: String,
}

/// A registered user profile.
///
/// Secret credentials are never part of this model; the identity provider
/// owns them. Invariant: `likes == liked_by.len()` at all times, and
/// `liked_by` never contains the user's own id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "userid")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub pronouns: String,
    #[serde(default)]
    pub program: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default)]
    pub tutored_courses: Vec<String>,
    #[serde(default = "default_profile_color")]
    pub profile_color: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_banned: bool,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub liked_by: BTreeSet<String>,
}

fn default_profile_color() -> String {
    DEFAULT_PROFILE_COLOR.to_string()
}

impl User {
    /// A fresh profile with defaults matching registration.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        User {
            id: id.into(),
            name: name.into(),
            pronouns: String::new(),
            program: String::new(),
            year: String::new(),
            email: String::new(),
            contact: String::new(),
            bio: String::new(),
            availability: Availability::default(),
            tutored_courses: Vec::new(),
            profile_color: default_profile_color(),
            is_admin: false,
            is_banned: false,
            likes: 0,
            liked_by: BTreeSet::new(),
        }
    }
}

/// Which side of the tutoring exchange a post represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HelpRole {
    /// The poster offers to tutor.
    Providing,
    /// The poster asks for help.
    Requesting,
}

/// The time-slot negotiation attached to a matched post.
///
/// One round: the owner proposes up to [`MAX_PROPOSED_SLOTS`] future slots
/// exactly once; the counterpart then either picks one of them or rejects
/// them all. `Finalized` and `Rejected` are terminal for the round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum Negotiation {
    #[default]
    Pending,
    /// Owner-authored slots, kept in display order and never re-sorted.
    Proposed { slots: Vec<DateTime<Utc>> },
    Finalized {
        slots: Vec<DateTime<Utc>>,
        chosen: DateTime<Utc>,
    },
    Rejected { slots: Vec<DateTime<Utc>> },
}

impl Negotiation {
    /// Terminal for this round: a time was agreed or all slots were refused.
    pub fn is_settled(&self) -> bool {
        matches!(self, Negotiation::Finalized { .. } | Negotiation::Rejected { .. })
    }
}

/// The post status state machine.
///
/// `active -> matched -> closed`, with `active -> closed` also allowed when
/// the poster abandons without matching. `Closed` is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PostState {
    Active,
    #[serde(rename_all = "camelCase")]
    Matched {
        matched_id: String,
        #[serde(default)]
        negotiation: Negotiation,
    },
    #[serde(rename_all = "camelCase")]
    Closed {
        /// `Some` iff the post went through `Matched` before closing.
        matched_id: Option<String>,
        #[serde(default)]
        negotiation: Negotiation,
    },
}

impl PostState {
    pub fn matched_id(&self) -> Option<&str> {
        match self {
            PostState::Active => None,
            PostState::Matched { matched_id, .. } => Some(matched_id),
            PostState::Closed { matched_id, .. } => matched_id.as_deref(),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, PostState::Closed { .. })
    }
}

/// A tutoring request/offer listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub poster_id: String,
    pub title: String,
    pub course_subject: String,
    pub course_code: String,
    pub message: String,
    pub role: HelpRole,
    #[serde(flatten)]
    pub state: PostState,
    pub created_at: DateTime<Utc>,
}

/// Poster-supplied fields for a new post; everything else is initialized
/// by the lifecycle engine.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub course_subject: String,
    pub course_code: String,
    pub message: String,
    pub role: HelpRole,
}

/// Conjunctive post-listing filters. `poster_id` is admin-only.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub course_subject: Option<String>,
    pub course_code: Option<String>,
    pub role: Option<HelpRole>,
    pub mine_only: bool,
    pub poster_id: Option<String>,
}

impl PostFilter {
    pub fn is_empty(&self) -> bool {
        self.course_subject.is_none()
            && self.course_code.is_none()
            && self.role.is_none()
            && !self.mine_only
            && self.poster_id.is_none()
    }
}

/// A comment on a post. Append-only; removed only when its post is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Resolution state of a report. Reports are never mutated in place; a
/// resolved report is deleted, so `Pending` is the only persisted value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[default]
    Pending,
}

/// A user-filed moderation complaint against another user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub reported_user_id: String,
    pub reporting_user_id: String,
    pub details: String,
    #[serde(default)]
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

/// A report joined with the display names an admin needs to act on it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportView {
    pub report: Report,
    pub reported_name: String,
    pub reporting_name: String,
}
