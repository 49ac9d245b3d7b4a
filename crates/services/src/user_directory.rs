//! # UserDirectory
//!
//! Read/write façade over user profile documents with a shared in-process
//! cache. Stale admin/ban flags are a security issue, not just a UX one, so
//! privilege-relevant reads bypass the cache and the cache is explicitly
//! invalidatable (`clear_cache` on login, `evict` after remote changes).

use std::sync::Arc;

use dashmap::DashMap;
use domains::{decode, encode, fields, CoreError, DocumentStore, Result, User};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::collection;

pub struct UserDirectory {
    store: Arc<dyn DocumentStore>,
    cache: DashMap<String, User>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        UserDirectory {
            store,
            cache: DashMap::new(),
        }
    }

    /// Fetches a profile, preferring the cache unless `force_remote`.
    pub async fn get_user(&self, id: &str, force_remote: bool) -> Result<User> {
        if !force_remote {
            if let Some(cached) = self.cache.get(id) {
                return Ok(cached.clone());
            }
        }
        let doc = self
            .store
            .get(collection::USERS, id)
            .await?
            .ok_or_else(|| CoreError::not_found("user", id))?;
        let user: User = decode(doc)?;
        self.cache.insert(id.to_string(), user.clone());
        Ok(user)
    }

    /// Writes the full profile document and refreshes the cache.
    /// Secret credentials are not part of [`User`], so none are persisted.
    pub async fn save_user(&self, user: &User) -> Result<()> {
        let doc = encode(user)?;
        self.store.set(collection::USERS, &user.id, doc).await?;
        self.cache.insert(user.id.clone(), user.clone());
        Ok(())
    }

    /// Toggles `actor`'s like on `target`; returns whether the target is
    /// liked afterwards.
    ///
    /// The count and the member set are updated in one transaction so that
    /// concurrent opposite toggles cannot break `likes == |liked_by|`.
    pub async fn toggle_like(&self, target: &str, actor: &str) -> Result<bool> {
        if target == actor {
            return Err(CoreError::SelfAction("you cannot like yourself".into()));
        }
        let mut liked = false;
        let mut updated: Option<User> = None;
        self.store
            .run_transaction(Box::new(|tx| {
                let doc = tx
                    .get(collection::USERS, target)?
                    .ok_or_else(|| CoreError::not_found("user", target))?;
                let mut user: User = decode(doc)?;
                if user.liked_by.remove(actor) {
                    liked = false;
                } else {
                    user.liked_by.insert(actor.to_string());
                    liked = true;
                }
                // The member set is authoritative; the counter is derived
                // from it, which also floors it at zero.
                user.likes = user.liked_by.len() as u32;
                tx.update(
                    collection::USERS,
                    target,
                    fields([
                        ("likes", Value::from(user.likes)),
                        ("likedBy", json!(user.liked_by)),
                    ]),
                );
                updated = Some(user);
                Ok(())
            }))
            .await?;
        if let Some(user) = updated {
            self.cache.insert(target.to_string(), user);
        }
        Ok(liked)
    }

    /// Bans or unbans `target`. The actor's admin flag is re-read from the
    /// store, never trusted from cache.
    pub async fn set_banned(&self, target: &str, actor: &str, banned: bool) -> Result<()> {
        if target == actor {
            return Err(CoreError::SelfAction(
                "you cannot change your own ban state".into(),
            ));
        }
        let admin = self.get_user(actor, true).await.map_err(|e| match e {
            CoreError::NotFound(_, _) => {
                CoreError::Authorization("admin privileges required".into())
            }
            other => other,
        })?;
        if !admin.is_admin {
            return Err(CoreError::Authorization("admin privileges required".into()));
        }
        let mut updated: Option<User> = None;
        self.store
            .run_transaction(Box::new(|tx| {
                let doc = tx
                    .get(collection::USERS, target)?
                    .ok_or_else(|| CoreError::not_found("user", target))?;
                let mut user: User = decode(doc)?;
                user.is_banned = banned;
                tx.update(
                    collection::USERS,
                    target,
                    fields([("isBanned", Value::Bool(banned))]),
                );
                updated = Some(user);
                Ok(())
            }))
            .await?;
        debug!(target, banned, "ban state changed");
        if let Some(user) = updated {
            self.cache.insert(target.to_string(), user);
        }
        Ok(())
    }

    /// Authoritative admin check. Fails closed: any lookup failure counts
    /// as non-admin, so a transient read error can never escalate privilege.
    pub async fn is_admin(&self, id: &str) -> bool {
        match self.get_user(id, true).await {
            Ok(user) => user.is_admin,
            Err(e) => {
                debug!(id, error = %e, "admin check failed, treating as non-admin");
                false
            }
        }
    }

    /// Partial update of the profile color, mirrored into the cache.
    pub async fn update_profile_color(&self, id: &str, color: &str) -> Result<()> {
        if color.trim().is_empty() {
            return Err(CoreError::Validation("profile color must not be empty".into()));
        }
        self.store
            .update(collection::USERS, id, fields([("profileColor", json!(color))]))
            .await?;
        if let Some(mut cached) = self.cache.get_mut(id) {
            cached.profile_color = color.to_string();
        }
        Ok(())
    }

    /// Admin-only listing of all profiles, feeding the moderation screen.
    /// Malformed documents are skipped, not fatal.
    pub async fn list_users(&self, actor: &str) -> Result<Vec<User>> {
        if !self.is_admin(actor).await {
            return Err(CoreError::Authorization("admin privileges required".into()));
        }
        let docs = self.store.query(collection::USERS, &[], None).await?;
        let mut users = Vec::with_capacity(docs.len());
        for doc in docs {
            match decode::<User>(doc) {
                Ok(user) => users.push(user),
                Err(e) => warn!(error = %e, "skipping malformed user document"),
            }
        }
        Ok(users)
    }

    /// Owner deletes their own profile document and its cache entry.
    /// Deleting the identity-provider account is the caller's concern.
    pub async fn delete_account(&self, actor: &str) -> Result<()> {
        self.store.delete(collection::USERS, actor).await?;
        self.cache.remove(actor);
        Ok(())
    }

    /// Drops every cached profile (e.g., on login switch).
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Drops one cached profile (e.g., after a ban-state change elsewhere).
    pub fn evict(&self, id: &str) {
        self.cache.remove(id);
    }
}
