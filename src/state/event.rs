//! Event vocabulary and the synchronous publish/subscribe bus.
//!
//! There is a single bus per server. Listeners subscribe to one event kind
//! on one topic: either the server-wide topic, or the scoped channel of a
//! single user. Publishing runs every matching listener before returning,
//! in the order they subscribed. Nothing is buffered, so a listener that
//! subscribes late never sees earlier events.
//!
//! A user's channel only delivers while it is open. The server opens it on
//! connect and closes it on disconnect, which also drops every listener
//! registered on it.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::user::{User, UserId};

/// Everything that can travel over the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// A public value changed
    SetPublic {
        key: String,
        data: serde_json::Value,
    },

    /// One user's private value changed
    SetPrivate {
        user_id: UserId,
        key: String,
        data: serde_json::Value,
    },

    /// The value a client sees for `key` changed
    SetData {
        key: String,
        data: serde_json::Value,
    },

    /// A user joined
    UserConnected(User),

    /// A user left
    UserDisconnected(User),

    /// The roster changed
    UsersUpdated(HashMap<UserId, User>),

    /// Any score changed
    ScoresUpdated(HashMap<UserId, i64>),

    /// Free-form message, broadcast or targeted at `user_id`
    Message {
        message: String,
        data: serde_json::Value,
        user_id: Option<UserId>,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SetPublic { .. } => EventKind::SetPublic,
            Self::SetPrivate { .. } => EventKind::SetPrivate,
            Self::SetData { .. } => EventKind::SetData,
            Self::UserConnected(_) => EventKind::UserConnected,
            Self::UserDisconnected(_) => EventKind::UserDisconnected,
            Self::UsersUpdated(_) => EventKind::UsersUpdated,
            Self::ScoresUpdated(_) => EventKind::ScoresUpdated,
            Self::Message { .. } => EventKind::Message,
        }
    }
}

/// Discriminant of `Event`, used to pick what to listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SetPublic,
    SetPrivate,
    SetData,
    UserConnected,
    UserDisconnected,
    UsersUpdated,
    ScoresUpdated,
    Message,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SetPublic => "setPublic",
            Self::SetPrivate => "setPrivate",
            Self::SetData => "setData",
            Self::UserConnected => "userConnected",
            Self::UserDisconnected => "userDisconnected",
            Self::UsersUpdated => "usersUpdated",
            Self::ScoresUpdated => "scoresUpdated",
            Self::Message => "message",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery scope of an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Server-wide listeners (harness, scoreboard, logging)
    Server,
    /// One client's channel
    User(UserId),
}

impl Topic {
    pub fn user(user_id: impl Into<UserId>) -> Self {
        Self::User(user_id.into())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::User(id) => write!(f, "user:{}", id),
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A listener callback.
pub type Listener = Box<dyn FnMut(&Event)>;

struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    listener: Listener,
}

/// Synchronous multi-topic event bus.
#[derive(Default)]
pub struct EventBus {
    /// Listeners by topic, in subscription order
    topics: HashMap<Topic, Vec<Subscription>>,

    /// Users whose channel currently delivers
    open_channels: HashSet<UserId>,

    next_id: u64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.topics.len())
            .field("listeners", &self.listener_count())
            .field("open_channels", &self.open_channels)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `kind` events on `topic`.
    ///
    /// Subscribing to a user topic whose channel is closed is allowed; the
    /// listener starts receiving once the channel opens.
    pub fn subscribe<F>(&mut self, topic: Topic, kind: EventKind, listener: F) -> SubscriptionId
    where
        F: FnMut(&Event) + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.topics.entry(topic).or_default().push(Subscription {
            id,
            kind,
            listener: Box::new(listener),
        });
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for subs in self.topics.values_mut() {
            if let Some(pos) = subs.iter().position(|s| s.id == id) {
                subs.remove(pos);
                return true;
            }
        }
        false
    }

    /// Deliver `event` to every matching listener on `topic`.
    ///
    /// Returns how many listeners ran. A closed user channel delivers nothing.
    pub fn publish(&mut self, topic: &Topic, event: &Event) -> usize {
        if !self.is_deliverable(topic) {
            return 0;
        }

        let kind = event.kind();
        let Some(subs) = self.topics.get_mut(topic) else {
            return 0;
        };

        let mut delivered = 0;
        for sub in subs.iter_mut().filter(|s| s.kind == kind) {
            (sub.listener)(event);
            delivered += 1;
        }
        delivered
    }

    /// Start delivering on a user's channel.
    pub fn open_channel(&mut self, user_id: &str) {
        self.open_channels.insert(user_id.to_string());
    }

    /// Stop delivering on a user's channel and drop its listeners.
    pub fn close_channel(&mut self, user_id: &str) {
        self.open_channels.remove(user_id);
        self.topics.remove(&Topic::user(user_id));
    }

    pub fn has_channel(&self, user_id: &str) -> bool {
        self.open_channels.contains(user_id)
    }

    /// Open user channels, in no particular order.
    pub fn open_channels(&self) -> impl Iterator<Item = &UserId> {
        self.open_channels.iter()
    }

    /// Total listeners across all topics.
    pub fn listener_count(&self) -> usize {
        self.topics.values().map(Vec::len).sum()
    }

    fn is_deliverable(&self, topic: &Topic) -> bool {
        match topic {
            Topic::Server => true,
            Topic::User(id) => self.open_channels.contains(id),
        }
    }
}
