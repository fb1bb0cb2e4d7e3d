//! The authoritative side of a session.
//!
//! `Server` owns the `Store`, the `EventBus` and the registry of callable
//! functions. Every mutation goes through one of its methods, and every
//! mutation is announced on the bus: server-wide listeners see everything,
//! while each open client channel only receives what affects that user.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::client::Client;
use super::config::{SyncConfig, UnknownUserPolicy};
use super::event::{Event, EventBus, EventKind, SubscriptionId, Topic};
use super::scoreboard::Scoreboard;
use super::user::{User, UserId};
use super::Store;

/// Errors surfaced by the server and its clients.
#[derive(Debug, Error)]
pub enum SyncError {
    /// `call` named a function nobody registered
    #[error("Function \"{name}\" not defined")]
    FunctionNotFound { name: String },

    /// The roster has no user with this id
    #[error("Unknown user \"{user_id}\"")]
    UnknownUser { user_id: UserId },

    /// Call data did not match what the function expects
    #[error("Invalid input for function \"{function}\": {source}")]
    InvalidInput {
        function: String,
        #[source]
        source: serde_json::Error,
    },

    /// Function result could not be converted
    #[error("Invalid output from function \"{function}\": {source}")]
    InvalidOutput {
        function: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Type-erased registered function.
type Handler = Rc<dyn Fn(&mut Server, &User, Value) -> Result<Value>>;

/// Sole owner and writer of session state.
pub struct Server {
    store: Store,
    bus: EventBus,
    functions: HashMap<String, Handler>,
    config: SyncConfig,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut functions: Vec<&String> = self.functions.keys().collect();
        functions.sort();
        f.debug_struct("Server")
            .field("store", &self.store)
            .field("bus", &self.bus)
            .field("functions", &functions)
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        Self {
            store: Store::new(),
            bus: EventBus::new(),
            functions: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    // ---------------------------------------------------------------
    // Function registry
    // ---------------------------------------------------------------

    /// Expose `handler` to clients under `name`.
    ///
    /// Input is decoded from the call data, and the return value is encoded
    /// back to JSON. Registering the same name twice replaces the previous
    /// handler.
    pub fn register<T, R, F>(&mut self, name: impl Into<String>, handler: F)
    where
        T: DeserializeOwned + 'static,
        R: Serialize + 'static,
        F: Fn(&mut Server, &User, T) -> R + 'static,
    {
        self.try_register(name, move |server: &mut Server, caller: &User, input: T| {
            Ok(handler(server, caller, input))
        });
    }

    /// Like `register`, for handlers that can fail.
    pub fn try_register<T, R, F>(&mut self, name: impl Into<String>, handler: F)
    where
        T: DeserializeOwned + 'static,
        R: Serialize + 'static,
        F: Fn(&mut Server, &User, T) -> Result<R> + 'static,
    {
        let name = name.into();
        let function = name.clone();

        let erased: Handler = Rc::new(
            move |server: &mut Server, caller: &User, input: Value| -> Result<Value> {
                let input: T =
                    serde_json::from_value(input).map_err(|source| SyncError::InvalidInput {
                        function: function.clone(),
                        source,
                    })?;
                let output = handler(server, caller, input)?;
                serde_json::to_value(output).map_err(|source| SyncError::InvalidOutput {
                    function: function.clone(),
                    source,
                })
            },
        );

        if self.functions.insert(name.clone(), erased).is_some() {
            warn!("function \"{}\" re-registered, previous handler replaced", name);
        } else {
            info!("function \"{}\" registered", name);
        }
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered function names, sorted.
    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run a registered function on behalf of `caller`.
    pub(crate) fn invoke(&mut self, name: &str, caller: &User, data: Value) -> Result<Value> {
        let handler = self
            .functions
            .get(name)
            .map(Rc::clone)
            .ok_or_else(|| SyncError::FunctionNotFound {
                name: name.to_string(),
            })?;

        debug!("user {} calls \"{}\"", caller.id, name);
        handler(self, caller, data)
    }

    // ---------------------------------------------------------------
    // Data
    // ---------------------------------------------------------------

    /// Set a value every user can see.
    ///
    /// Each open client channel receives `SetPublic`, then `SetData` unless
    /// that user shadows `key` with a private value.
    pub fn set_public_data(&mut self, key: impl Into<String>, data: impl Into<Value>) {
        let key = key.into();
        let data = data.into();
        debug!("set public \"{}\"", key);

        self.store.public.insert(key.clone(), data.clone());

        let event = Event::SetPublic {
            key: key.clone(),
            data: data.clone(),
        };
        self.bus.publish(&Topic::Server, &event);

        for user_id in self.open_channels() {
            let shadowed = self.store.is_shadowed(&user_id, &key);
            let topic = Topic::User(user_id);
            self.bus.publish(&topic, &event);

            if shadowed {
                debug!("public \"{}\" shadowed on {}", key, topic);
                continue;
            }
            self.bus.publish(
                &topic,
                &Event::SetData {
                    key: key.clone(),
                    data: data.clone(),
                },
            );
        }
    }

    pub fn public_data(&self, key: &str) -> Option<&Value> {
        self.store.public_value(key)
    }

    /// Set a value only `user_id` can see.
    ///
    /// Never fails: the user does not need to be on the roster yet. Events
    /// for a user without an open channel are dropped.
    pub fn set_private_data(
        &mut self,
        user_id: &str,
        key: impl Into<String>,
        data: impl Into<Value>,
    ) {
        let key = key.into();
        let data = data.into();
        debug!("set private \"{}\" for user {}", key, user_id);

        self.store
            .private
            .entry(user_id.to_string())
            .or_default()
            .insert(key.clone(), data.clone());

        let event = Event::SetPrivate {
            user_id: user_id.to_string(),
            key: key.clone(),
            data: data.clone(),
        };
        self.bus.publish(&Topic::Server, &event);

        if !self.bus.has_channel(user_id) {
            debug!("user {} has no open channel, private update not delivered", user_id);
            return;
        }

        let topic = Topic::user(user_id);
        self.bus.publish(&topic, &event);
        self.bus.publish(&topic, &Event::SetData { key, data });
    }

    pub fn private_data(&self, user_id: &str, key: &str) -> Option<&Value> {
        self.store.private_value(user_id, key)
    }

    /// Set public data, or private data when `user_id` is given.
    pub fn set_data(&mut self, key: impl Into<String>, data: impl Into<Value>, user_id: Option<&str>) {
        match user_id {
            Some(user_id) => self.set_private_data(user_id, key, data),
            None => self.set_public_data(key, data),
        }
    }

    /// Read public data, or private data when `user_id` is given.
    pub fn get_data(&self, key: &str, user_id: Option<&str>) -> Option<&Value> {
        match user_id {
            Some(user_id) => self.private_data(user_id, key),
            None => self.public_data(key),
        }
    }

    // ---------------------------------------------------------------
    // Scores
    // ---------------------------------------------------------------

    /// Overwrite a user's score. Lower values are accepted.
    pub fn set_score(&mut self, user_id: &str, score: i64) {
        debug!("score of user {} set to {}", user_id, score);
        self.store.scores.insert(user_id.to_string(), score);
        self.persist_scores();
    }

    /// Score of a user, 0 if never set.
    pub fn get_score(&self, user_id: &str) -> i64 {
        self.store.score(user_id)
    }

    pub fn scores(&self) -> &HashMap<UserId, i64> {
        self.store.scores()
    }

    /// Ranked scoreboard of every user with a score.
    pub fn scoreboard(&self) -> Scoreboard {
        Scoreboard::from_store(&self.store, &self.config)
    }

    // ---------------------------------------------------------------
    // Roster
    // ---------------------------------------------------------------

    pub fn users(&self) -> &HashMap<UserId, User> {
        self.store.users()
    }

    /// Add or replace a user on the roster and open their channel.
    ///
    /// A user seen for the first time starts with a score of 0.
    pub fn user_connected(&mut self, mut user: User) {
        info!("user {} ({}) connected", user.id, user.name);

        user.mark_connected();
        let user_id = user.id.clone();
        self.store.users.insert(user_id.clone(), user.clone());
        self.bus.open_channel(&user_id);

        self.bus.publish(&Topic::Server, &Event::UserConnected(user));
        self.persist_users();

        if !self.store.scores.contains_key(&user_id) {
            self.store.scores.insert(user_id, 0);
            self.persist_scores();
        }
    }

    /// Mark a user as disconnected and close their channel.
    ///
    /// The roster entry and score are kept. An id the roster has never seen
    /// is handled per `SyncConfig::unknown_users`.
    pub fn user_disconnected(&mut self, user_id: &str) -> Result<()> {
        let Some(user) = self.store.users.get_mut(user_id) else {
            return match self.config.unknown_users {
                UnknownUserPolicy::Reject => Err(SyncError::UnknownUser {
                    user_id: user_id.to_string(),
                }),
                UnknownUserPolicy::Ignore => {
                    warn!("disconnect for unknown user {} ignored", user_id);
                    Ok(())
                }
            };
        };

        user.mark_disconnected();
        let user = user.clone();
        info!("user {} ({}) disconnected", user.id, user.name);

        self.bus.close_channel(user_id);
        self.bus.publish(&Topic::Server, &Event::UserDisconnected(user));
        self.persist_users();
        Ok(())
    }

    /// Client view for a user on the roster.
    pub fn client(&mut self, user_id: &str) -> Result<Client<'_>> {
        if self.store.user(user_id).is_none() {
            return Err(SyncError::UnknownUser {
                user_id: user_id.to_string(),
            });
        }
        Ok(Client::new(self, user_id.to_string()))
    }

    // ---------------------------------------------------------------
    // Messages and subscriptions
    // ---------------------------------------------------------------

    /// Send a message to one user, or to everyone when `user_id` is `None`.
    pub fn send_message(
        &mut self,
        message: impl Into<String>,
        data: impl Into<Value>,
        user_id: Option<&str>,
    ) {
        let event = Event::Message {
            message: message.into(),
            data: data.into(),
            user_id: user_id.map(str::to_string),
        };
        self.bus.publish(&Topic::Server, &event);

        match user_id {
            Some(user_id) => {
                if self.bus.publish(&Topic::user(user_id), &event) == 0 {
                    debug!("message for user {} not delivered", user_id);
                }
            }
            None => self.broadcast(&event),
        }
    }

    /// Listen for `kind` events on `topic`.
    pub fn subscribe<F>(&mut self, topic: Topic, kind: EventKind, listener: F) -> SubscriptionId
    where
        F: FnMut(&Event) + 'static,
    {
        self.bus.subscribe(topic, kind, listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Whether a user currently has an open channel.
    pub fn is_channel_open(&self, user_id: &str) -> bool {
        self.bus.has_channel(user_id)
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    /// Open channels in a stable order, so delivery is deterministic.
    fn open_channels(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.bus.open_channels().cloned().collect();
        ids.sort();
        ids
    }

    /// Publish on the server topic and every open client channel.
    fn broadcast(&mut self, event: &Event) {
        for user_id in self.open_channels() {
            self.bus.publish(&Topic::User(user_id), event);
        }
    }

    fn persist_users(&mut self) {
        let key = self.config.users_key.clone();
        let roster = snapshot(&self.store.users);
        self.set_public_data(key, roster);

        let event = Event::UsersUpdated(self.store.users.clone());
        self.bus.publish(&Topic::Server, &event);
        self.broadcast(&event);
    }

    fn persist_scores(&mut self) {
        let key = self.config.scores_key.clone();
        let scores = snapshot(&self.store.scores);
        self.set_public_data(key, scores);

        let event = Event::ScoresUpdated(self.store.scores.clone());
        self.bus.publish(&Topic::Server, &event);
        self.broadcast(&event);
    }
}

/// JSON snapshot of a roster or score map for the reserved public keys.
fn snapshot<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|err| {
        warn!("snapshot serialization failed: {}", err);
        Value::Null
    })
}
