use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::{ChannelProfile, NewUser, User, WatchHistoryEntry};
use crate::error::{AppError, DatabaseError};
use crate::store::{SessionStore, UserRepository};

/// Process-local store with the same contract as `PgStore`.
///
/// Every read-modify-write happens under one write lock, which gives the
/// per-record atomicity the session flows rely on.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    /// (subscriber, channel)
    subscriptions: HashSet<(Uuid, Uuid)>,
    watch_history: HashMap<Uuid, Vec<WatchHistoryEntry>>,
}

impl MemoryState {
    fn user_mut(&mut self, id: Uuid) -> Result<&mut User, AppError> {
        self.users.get_mut(&id).ok_or_else(user_not_found)
    }

    fn taken(&self, except: Option<Uuid>, username: Option<&str>, email: Option<&str>) -> bool {
        self.users.values().any(|u| {
            Some(u.id) != except
                && (username == Some(u.username.as_str()) || email == Some(u.email.as_str()))
        })
    }
}

fn user_not_found() -> AppError {
    AppError::Database(DatabaseError::NotFound("User does not exist".to_string()))
}

fn duplicate() -> AppError {
    AppError::Database(DatabaseError::UniqueConstraintViolation(
        "User with email or username already exists".to_string(),
    ))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, AppError> {
        self.state
            .read()
            .map_err(|_| AppError::Internal("user store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, AppError> {
        self.state
            .write()
            .map_err(|_| AppError::Internal("user store lock poisoned".to_string()))
    }

    /// Records that `subscriber_id` follows `channel_id`
    pub fn subscribe(&self, subscriber_id: Uuid, channel_id: Uuid) -> Result<(), AppError> {
        self.write()?.subscriptions.insert((subscriber_id, channel_id));
        Ok(())
    }

    pub fn record_watch(&self, user_id: Uuid, video_id: Uuid) -> Result<(), AppError> {
        self.write()?
            .watch_history
            .entry(user_id)
            .or_default()
            .push(WatchHistoryEntry {
                video_id,
                watched_at: Utc::now(),
            });
        Ok(())
    }

    fn update_user(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut User),
    ) -> Result<User, AppError> {
        let mut state = self.write()?;
        let user = state.user_mut(id)?;
        apply(user);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, AppError> {
        let state = self.read()?;
        let by_username =
            username.and_then(|name| state.users.values().find(|u| u.username == name));
        let user = by_username
            .or_else(|| email.and_then(|email| state.users.values().find(|u| u.email == email)))
            .cloned();
        Ok(user)
    }

    async fn insert(&self, new_user: NewUser) -> Result<User, AppError> {
        let mut state = self.write()?;
        if state.taken(None, Some(&new_user.username), Some(&new_user.email)) {
            return Err(duplicate());
        }

        let user = User::from_new(new_user);
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        self.update_user(id, |user| user.password_hash = password_hash.to_string())?;
        Ok(())
    }

    async fn update_account(&self, id: Uuid, full_name: &str, email: &str) -> Result<User, AppError> {
        let mut state = self.write()?;
        if state.taken(Some(id), None, Some(email)) {
            return Err(duplicate());
        }

        let user = state.user_mut(id)?;
        user.full_name = full_name.to_string();
        user.email = email.to_string();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_avatar(&self, id: Uuid, url: &str) -> Result<User, AppError> {
        self.update_user(id, |user| user.avatar = url.to_string())
    }

    async fn update_cover_image(&self, id: Uuid, url: &str) -> Result<User, AppError> {
        self.update_user(id, |user| user.cover_image = Some(url.to_string()))
    }

    async fn channel_profile(
        &self,
        username: &str,
        viewer_id: Uuid,
    ) -> Result<Option<ChannelProfile>, AppError> {
        let state = self.read()?;
        let channel = match state.users.values().find(|u| u.username == username) {
            Some(channel) => channel,
            None => return Ok(None),
        };

        let subscribers_count = state
            .subscriptions
            .iter()
            .filter(|(_, c)| *c == channel.id)
            .count() as i64;
        let channels_subscribed_to_count = state
            .subscriptions
            .iter()
            .filter(|(s, _)| *s == channel.id)
            .count() as i64;

        Ok(Some(ChannelProfile {
            username: channel.username.clone(),
            full_name: channel.full_name.clone(),
            email: channel.email.clone(),
            avatar: channel.avatar.clone(),
            cover_image: channel.cover_image.clone(),
            subscribers_count,
            channels_subscribed_to_count,
            is_subscribed: state.subscriptions.contains(&(viewer_id, channel.id)),
        }))
    }

    async fn watch_history(&self, user_id: Uuid) -> Result<Vec<WatchHistoryEntry>, AppError> {
        let mut entries = self
            .read()?
            .watch_history
            .get(&user_id)
            .cloned()
            .unwrap_or_default();
        entries.reverse();
        Ok(entries)
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn set_refresh_token(&self, user_id: Uuid, digest: &str) -> Result<(), AppError> {
        let mut state = self.write()?;
        state.user_mut(user_id)?.refresh_token = Some(digest.to_string());
        Ok(())
    }

    async fn clear_refresh_token(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut state = self.write()?;
        if let Some(user) = state.users.get_mut(&user_id) {
            user.refresh_token = None;
        }
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        user_id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> Result<bool, AppError> {
        let mut state = self.write()?;
        let user = match state.users.get_mut(&user_id) {
            Some(user) => user,
            None => return Ok(false),
        };

        if user.refresh_token.as_deref() != Some(expected) {
            return Ok(false);
        }

        user.refresh_token = Some(replacement.to_string());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            full_name: "Test User".to_string(),
            avatar: "http://localhost/uploads/a.png".to_string(),
            cover_image: None,
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryStore::new();
        let user = store.insert(new_user("alice", "alice@x.com")).await.unwrap();

        let by_id = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");

        let by_email = store
            .find_by_username_or_email(None, Some("alice@x.com"))
            .await
            .unwrap();
        assert!(by_email.is_some());

        let by_username = store
            .find_by_username_or_email(Some("alice"), None)
            .await
            .unwrap();
        assert!(by_username.is_some());

        let nobody = store.find_by_username_or_email(None, None).await.unwrap();
        assert!(nobody.is_none());
    }

    #[tokio::test]
    async fn test_username_match_wins_over_email_match() {
        let store = InMemoryStore::new();
        let alice = store.insert(new_user("alice", "alice@x.com")).await.unwrap();
        let bob = store.insert(new_user("bob", "bob@x.com")).await.unwrap();

        for _ in 0..20 {
            let found = store
                .find_by_username_or_email(Some("alice"), Some("bob@x.com"))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(found.id, alice.id);
        }

        // Falls back to the email when the username matches nobody
        let found = store
            .find_by_username_or_email(Some("carol"), Some("bob@x.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, bob.id);
    }

    #[tokio::test]
    async fn test_duplicate_username_or_email_rejected() {
        let store = InMemoryStore::new();
        store.insert(new_user("alice", "alice@x.com")).await.unwrap();

        let same_username = store.insert(new_user("alice", "other@x.com")).await;
        assert!(matches!(
            same_username,
            Err(AppError::Database(DatabaseError::UniqueConstraintViolation(_)))
        ));

        let same_email = store.insert(new_user("other", "alice@x.com")).await;
        assert!(same_email.is_err());
    }

    #[tokio::test]
    async fn test_rotate_is_compare_and_swap() {
        let store = InMemoryStore::new();
        let user = store.insert(new_user("alice", "alice@x.com")).await.unwrap();

        // Nothing stored yet
        assert!(!store.rotate_refresh_token(user.id, "a", "b").await.unwrap());

        store.set_refresh_token(user.id, "a").await.unwrap();
        assert!(store.rotate_refresh_token(user.id, "a", "b").await.unwrap());
        assert!(!store.rotate_refresh_token(user.id, "a", "c").await.unwrap());

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let store = InMemoryStore::new();
        let user = store.insert(new_user("alice", "alice@x.com")).await.unwrap();
        store.set_refresh_token(user.id, "a").await.unwrap();

        store.clear_refresh_token(user.id).await.unwrap();
        store.clear_refresh_token(user.id).await.unwrap();

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_update_account_email_conflict() {
        let store = InMemoryStore::new();
        let alice = store.insert(new_user("alice", "alice@x.com")).await.unwrap();
        store.insert(new_user("bob", "bob@x.com")).await.unwrap();

        assert!(store.update_account(alice.id, "Alice", "bob@x.com").await.is_err());

        // Keeping your own email is not a conflict
        let updated = store
            .update_account(alice.id, "Alice L.", "alice@x.com")
            .await
            .unwrap();
        assert_eq!(updated.full_name, "Alice L.");
    }

    #[tokio::test]
    async fn test_channel_profile_counts() {
        let store = InMemoryStore::new();
        let alice = store.insert(new_user("alice", "alice@x.com")).await.unwrap();
        let bob = store.insert(new_user("bob", "bob@x.com")).await.unwrap();
        store.subscribe(bob.id, alice.id).unwrap();

        let seen_by_bob = store.channel_profile("alice", bob.id).await.unwrap().unwrap();
        assert_eq!(seen_by_bob.subscribers_count, 1);
        assert_eq!(seen_by_bob.channels_subscribed_to_count, 0);
        assert!(seen_by_bob.is_subscribed);

        let seen_by_alice = store.channel_profile("alice", alice.id).await.unwrap().unwrap();
        assert!(!seen_by_alice.is_subscribed);

        assert!(store.channel_profile("nobody", bob.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_watch_history_most_recent_first() {
        let store = InMemoryStore::new();
        let alice = store.insert(new_user("alice", "alice@x.com")).await.unwrap();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        store.record_watch(alice.id, first).unwrap();
        store.record_watch(alice.id, second).unwrap();

        let history = store.watch_history(alice.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].video_id, second);
        assert_eq!(history[1].video_id, first);
    }
}
