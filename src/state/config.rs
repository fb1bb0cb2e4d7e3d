//! Session configuration.

use serde::{Deserialize, Serialize};

use super::server::SyncError;
use super::user::DEFAULT_AVATAR_SIZE;

/// Public key the full roster is persisted under.
pub const USERS_KEY: &str = "_users";

/// Public key the full score table is persisted under.
pub const SCORES_KEY: &str = "_scores";

/// What to do when an operation names a user the roster has never seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownUserPolicy {
    /// Fail with `SyncError::UnknownUser`
    #[default]
    Reject,
    /// Log a warning and carry on as a no-op
    Ignore,
}

/// Tunables for a `Server`.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust
/// use minigame_sync::{SyncConfig, UnknownUserPolicy};
///
/// let config = SyncConfig::from_json(r#"{ "unknown_users": "ignore" }"#).unwrap();
/// assert_eq!(config.unknown_users, UnknownUserPolicy::Ignore);
/// assert_eq!(config.users_key, "_users");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Reserved public key for roster snapshots
    pub users_key: String,

    /// Reserved public key for score snapshots
    pub scores_key: String,

    /// Avatar size used when rendering the scoreboard
    pub avatar_size: u32,

    /// Policy for disconnects of unknown ids
    pub unknown_users: UnknownUserPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            users_key: USERS_KEY.to_string(),
            scores_key: SCORES_KEY.to_string(),
            avatar_size: DEFAULT_AVATAR_SIZE,
            unknown_users: UnknownUserPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Parse a configuration from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, SyncError> {
        serde_json::from_str(json).map_err(SyncError::InvalidConfig)
    }
}
