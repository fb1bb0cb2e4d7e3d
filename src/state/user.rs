//! Connected users.
//!
//! A `User` is created by whoever accepts the connection and handed to
//! `Server::user_connected`. The server keeps every user it has ever seen
//! for the rest of the session; disconnecting only flips `is_connected`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of a user for the lifetime of a session.
pub type UserId = String;

/// Default avatar edge length in pixels.
pub const DEFAULT_AVATAR_SIZE: u32 = 160;

/// A user as seen by the server roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique id, stable for the session
    pub id: UserId,

    /// Display name
    pub name: String,

    /// Avatar base reference (read through `avatar_url`)
    avatar: String,

    /// Whether the user currently has an open client
    pub is_connected: bool,

    /// When the user last connected
    pub connected_at: DateTime<Utc>,
}

impl User {
    /// Create a connected user.
    pub fn new(id: impl Into<UserId>, name: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar: avatar.into(),
            is_connected: true,
            connected_at: Utc::now(),
        }
    }

    /// Avatar URL sized to `size` pixels.
    pub fn avatar_url(&self, size: u32) -> String {
        format!("{}?size={}", self.avatar, size)
    }

    /// Mark the user as connected, refreshing the connection timestamp.
    pub(crate) fn mark_connected(&mut self) {
        self.is_connected = true;
        self.connected_at = Utc::now();
    }

    pub(crate) fn mark_disconnected(&mut self) {
        self.is_connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_avatar_url() {
        let user = User::new("u1", "Ada", "https://avatars.example/ada.svg");
        assert_eq!(
            user.avatar_url(DEFAULT_AVATAR_SIZE),
            "https://avatars.example/ada.svg?size=160"
        );
        assert_eq!(user.avatar_url(32), "https://avatars.example/ada.svg?size=32");
    }

    #[test]
    fn test_connection_flag() {
        let mut user = User::new("u1", "Ada", "a.svg");
        assert!(user.is_connected);

        user.mark_disconnected();
        assert!(!user.is_connected);

        let before = user.connected_at;
        user.mark_connected();
        assert!(user.is_connected);
        assert!(user.connected_at >= before);
    }

    #[test]
    fn test_serialized_shape() {
        let user = User::new("u1", "Ada", "a.svg");
        let json = serde_json::to_value(&user).unwrap();

        assert_eq!(json["id"], "u1");
        assert_eq!(json["name"], "Ada");
        assert_eq!(json["avatar"], "a.svg");
        assert_eq!(json["isConnected"], true);
        assert!(json.get("connectedAt").is_some());
    }
}
