//! State synchronization module.
//!
//! - `user` - Roster entries
//! - `event` - Event vocabulary and the synchronous bus
//! - `server` - The only writer of `Store`, plus the function registry
//! - `client` - Per-user read view and call path into the server
//! - `scoreboard` - Ranked view over roster and scores
//! - `config` - Session tunables
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             Server                               │
//! │                                                                  │
//! │  ┌───────────────────────┐      ┌────────────────────────────┐  │
//! │  │        Store          │      │          EventBus          │  │
//! │  │                       │      │                            │  │
//! │  │ public: key → value   │      │ Topic::Server  → listeners │  │
//! │  │ private: user →       │      │ Topic::User(a) → listeners │  │
//! │  │   key → value         │      │ Topic::User(b) → listeners │  │
//! │  │ users: user → User    │      │                            │  │
//! │  │ scores: user → i64    │      └────────────────────────────┘  │
//! │  └───────────────────────┘                                      │
//! │                                 functions: name → handler       │
//! └──────────────────────────────────────────────────────────────────┘
//!          ▲ call(name, data)               │ SetData / Message /
//!          │                                ▼ UsersUpdated / ...
//!   ┌─────────────┐                  ┌─────────────┐
//!   │ Client (a)  │                  │ listeners   │
//!   └─────────────┘                  └─────────────┘
//! ```

pub mod client;
pub mod config;
pub mod event;
pub mod scoreboard;
pub mod server;
pub mod user;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// Re-export commonly used types
pub use client::Client;
pub use config::{SyncConfig, UnknownUserPolicy, SCORES_KEY, USERS_KEY};
pub use event::{Event, EventBus, EventKind, Listener, SubscriptionId, Topic};
pub use scoreboard::{Scoreboard, ScoreboardEntry};
pub use server::{Result, Server, SyncError};
pub use user::{User, UserId, DEFAULT_AVATAR_SIZE};

/// The single source of truth for a session.
///
/// Only `Server` mutates it. Everything else reads through shared borrows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Store {
    /// Values visible to every user
    pub(crate) public: HashMap<String, Value>,

    /// Values visible to one user, shadowing public values of the same key
    pub(crate) private: HashMap<UserId, HashMap<String, Value>>,

    /// Every user that connected this session
    pub(crate) users: HashMap<UserId, User>,

    /// Absolute score per user
    pub(crate) scores: HashMap<UserId, i64>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn public(&self) -> &HashMap<String, Value> {
        &self.public
    }

    pub fn public_value(&self, key: &str) -> Option<&Value> {
        self.public.get(key)
    }

    /// Private values of one user, if any were ever set.
    pub fn private_for(&self, user_id: &str) -> Option<&HashMap<String, Value>> {
        self.private.get(user_id)
    }

    pub fn private_value(&self, user_id: &str, key: &str) -> Option<&Value> {
        self.private.get(user_id).and_then(|values| values.get(key))
    }

    /// Whether `user_id` has a private override for `key`.
    pub fn is_shadowed(&self, user_id: &str, key: &str) -> bool {
        self.private_value(user_id, key).is_some()
    }

    /// Value of `key` as `user_id` sees it: private first, then public.
    pub fn resolve(&self, user_id: &str, key: &str) -> Option<&Value> {
        self.private_value(user_id, key)
            .or_else(|| self.public.get(key))
    }

    pub fn users(&self) -> &HashMap<UserId, User> {
        &self.users
    }

    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.users.get(user_id)
    }

    pub fn scores(&self) -> &HashMap<UserId, i64> {
        &self.scores
    }

    /// Score of a user, 0 if never set.
    pub fn score(&self, user_id: &str) -> i64 {
        self.scores.get(user_id).copied().unwrap_or(0)
    }

    /// Count users with an open connection.
    pub fn connected_count(&self) -> usize {
        self.users.values().filter(|u| u.is_connected).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_resolve_prefers_private() {
        let mut store = Store::new();
        store.public.insert("color".to_string(), json!("red"));
        store
            .private
            .entry("u1".to_string())
            .or_default()
            .insert("color".to_string(), json!("blue"));

        assert_eq!(store.resolve("u1", "color"), Some(&json!("blue")));
        assert_eq!(store.resolve("u2", "color"), Some(&json!("red")));
        assert_eq!(store.public_value("color"), Some(&json!("red")));
        assert_eq!(store.resolve("u1", "missing"), None);
    }

    #[test]
    fn test_null_private_value_still_shadows() {
        let mut store = Store::new();
        store.public.insert("k".to_string(), json!(1));
        store
            .private
            .entry("u1".to_string())
            .or_default()
            .insert("k".to_string(), Value::Null);

        assert!(store.is_shadowed("u1", "k"));
        assert_eq!(store.resolve("u1", "k"), Some(&Value::Null));
    }

    #[test]
    fn test_score_default() {
        let store = Store::new();
        assert_eq!(store.score("nobody"), 0);
        assert_eq!(store.connected_count(), 0);
    }
}
