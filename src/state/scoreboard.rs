//! Ranked scoreboard.
//!
//! Built on demand from the store, typically from a `ScoresUpdated`
//! listener on the server topic.

use serde::Serialize;

use super::config::SyncConfig;
use super::user::UserId;
use super::Store;

/// One row of the scoreboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreboardEntry {
    /// 1-based position
    pub rank: usize,
    pub user_id: UserId,
    pub name: String,
    pub avatar_url: String,
    pub score: i64,
    /// Whether the user is currently connected
    pub online: bool,
}

/// Users ordered by score, highest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Scoreboard {
    entries: Vec<ScoreboardEntry>,
}

impl Scoreboard {
    /// Rank every scored user on the roster.
    ///
    /// Equal scores are ordered by user id. Scores belonging to ids that
    /// never connected are left out. Avatars use `config.avatar_size`.
    pub fn from_store(store: &Store, config: &SyncConfig) -> Self {
        let mut scored: Vec<(&UserId, i64)> = store
            .scores()
            .iter()
            .filter(|(id, _)| store.users().contains_key(*id))
            .map(|(id, score)| (id, *score))
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let entries = scored
            .into_iter()
            .enumerate()
            .filter_map(|(i, (id, score))| {
                let user = store.user(id)?;
                Some(ScoreboardEntry {
                    rank: i + 1,
                    user_id: id.clone(),
                    name: user.name.clone(),
                    avatar_url: user.avatar_url(config.avatar_size),
                    score,
                    online: user.is_connected,
                })
            })
            .collect();

        Self { entries }
    }

    pub fn entries(&self) -> &[ScoreboardEntry] {
        &self.entries
    }

    /// Highest scoring user.
    pub fn leader(&self) -> Option<&ScoreboardEntry> {
        self.entries.first()
    }

    /// Rank of a user, if they are on the board.
    pub fn rank_of(&self, user_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.user_id == user_id)
            .map(|e| e.rank)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert to JSON for sending to clients.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "entries": self.entries })
    }
}
