//! Per-user view of a session.
//!
//! A `Client` borrows the server for as long as it is used. Reads go through
//! the live `Store` with private values shadowing public ones, and the only
//! way to change anything is `call`, which runs a registered server function
//! with this client's user as the caller.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::event::{Event, EventKind, SubscriptionId, Topic};
use super::server::{Result, Server, SyncError};
use super::user::{User, UserId};

/// Restricted facade over a `Server` for one user.
///
/// Holds only the user id; the roster entry is looked up on every access.
#[derive(Debug)]
pub struct Client<'s> {
    server: &'s mut Server,
    user_id: UserId,
}

impl<'s> Client<'s> {
    pub(crate) fn new(server: &'s mut Server, user_id: UserId) -> Self {
        Self { server, user_id }
    }

    /// Current roster entry of the user this client acts as.
    pub fn user(&self) -> Option<&User> {
        self.server.store().user(&self.user_id)
    }

    pub fn id(&self) -> &str {
        &self.user_id
    }

    /// Call a registered server function.
    ///
    /// The caller handed to the function is the roster entry as it is at
    /// call time. Fails with `SyncError::FunctionNotFound` when `name` was
    /// never registered; nothing runs in that case.
    pub fn call<T: Serialize>(&mut self, name: &str, data: T) -> Result<Value> {
        let input = serde_json::to_value(data).map_err(|source| SyncError::InvalidInput {
            function: name.to_string(),
            source,
        })?;
        let caller = self
            .user()
            .cloned()
            .ok_or_else(|| SyncError::UnknownUser {
                user_id: self.user_id.clone(),
            })?;
        self.server.invoke(name, &caller, input)
    }

    /// Call a registered function and decode its result.
    pub fn call_as<R, T>(&mut self, name: &str, data: T) -> Result<R>
    where
        R: DeserializeOwned,
        T: Serialize,
    {
        let output = self.call(name, data)?;
        serde_json::from_value(output).map_err(|source| SyncError::InvalidOutput {
            function: name.to_string(),
            source,
        })
    }

    /// Value of `key` as this user sees it.
    pub fn get_data(&self, key: &str) -> Option<&Value> {
        self.server.store().resolve(&self.user_id, key)
    }

    pub fn scores(&self) -> &HashMap<UserId, i64> {
        self.server.scores()
    }

    pub fn users(&self) -> &HashMap<UserId, User> {
        self.server.users()
    }

    /// Listen for `kind` events on this user's channel.
    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> SubscriptionId
    where
        F: FnMut(&Event) + 'static,
    {
        self.server
            .subscribe(Topic::user(self.user_id.as_str()), kind, listener)
    }

    pub fn off(&mut self, id: SubscriptionId) -> bool {
        self.server.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn make_server() -> Server {
        let mut server = Server::new();
        for id in ["u1", "u2"] {
            server.user_connected(User::new(id, id.to_uppercase(), format!("{}.svg", id)));
        }
        server
    }

    #[test]
    fn test_shadowing() {
        let mut server = make_server();
        server.set_public_data("prompt", "draw a cat");
        server.set_private_data("u1", "prompt", "draw a dog");

        assert_eq!(
            server.client("u1").unwrap().get_data("prompt"),
            Some(&json!("draw a dog"))
        );
        assert_eq!(
            server.client("u2").unwrap().get_data("prompt"),
            Some(&json!("draw a cat"))
        );
        // Public value is untouched
        assert_eq!(server.public_data("prompt"), Some(&json!("draw a cat")));
    }

    #[test]
    fn test_add_scenario() {
        let mut server = make_server();
        server.register("add", |server: &mut Server, caller: &User, n: i64| {
            let score = server.get_score(&caller.id) + n;
            server.set_score(&caller.id, score);
        });

        let mut client = server.client("u1").unwrap();
        client.call("add", 5).unwrap();
        assert_eq!(client.scores()["u1"], 5);

        client.call("add", 3).unwrap();
        assert_eq!(server.get_score("u1"), 8);
        assert_eq!(server.get_score("u2"), 0);
    }

    #[test]
    fn test_unregistered_call_fails() {
        let mut server = make_server();
        let mut client = server.client("u1").unwrap();

        let err = client.call("doesNotExist", ()).unwrap_err();
        assert!(matches!(err, SyncError::FunctionNotFound { ref name } if name == "doesNotExist"));
        assert_eq!(err.to_string(), "Function \"doesNotExist\" not defined");
    }

    #[test]
    fn test_call_with_wrong_input() {
        let mut server = make_server();
        server.register("add", |_: &mut Server, _: &User, n: i64| n);

        let mut client = server.client("u1").unwrap();
        let result = client.call("add", "five");
        assert!(matches!(
            result,
            Err(SyncError::InvalidInput { ref function, .. }) if function == "add"
        ));
    }

    #[test]
    fn test_call_as_decodes_result() {
        #[derive(Debug, PartialEq, Deserialize, Serialize)]
        struct Guess {
            word: String,
        }

        let mut server = make_server();
        server.register("guess", |_: &mut Server, caller: &User, guess: Guess| {
            json!({ "by": caller.id, "correct": guess.word == "cat" })
        });

        let mut client = server.client("u2").unwrap();
        let outcome: Value = client
            .call_as(
                "guess",
                Guess {
                    word: "cat".to_string(),
                },
            )
            .unwrap();
        assert_eq!(outcome, json!({ "by": "u2", "correct": true }));

        let wrong: Result<bool> = client.call_as("guess", Guess { word: "dog".into() });
        assert!(matches!(wrong, Err(SyncError::InvalidOutput { .. })));
    }

    #[test]
    fn test_caller_identity() {
        let mut server = make_server();
        server.register("whoami", |_: &mut Server, caller: &User, _: ()| caller.id.clone());

        let mut client = server.client("u2").unwrap();
        assert_eq!(client.call("whoami", ()).unwrap(), json!("u2"));
        assert_eq!(client.id(), "u2");
        assert_eq!(client.user().map(|u| u.name.as_str()), Some("U2"));
    }

    #[test]
    fn test_reads_are_live() {
        let mut server = make_server();
        server.register("reveal", |server: &mut Server, caller: &User, word: String| {
            server.set_private_data(&caller.id, "secret", word);
        });

        let mut client = server.client("u1").unwrap();
        assert_eq!(client.get_data("secret"), None);

        client.call("reveal", "apple").unwrap();
        assert_eq!(client.get_data("secret"), Some(&json!("apple")));
        assert_eq!(client.users().len(), 2);
    }

    #[test]
    fn test_on_receives_own_channel_only() {
        let mut server = make_server();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        let id = server
            .client("u1")
            .unwrap()
            .on(EventKind::SetData, move |event| {
                if let Event::SetData { key, data } = event {
                    sink.borrow_mut().push((key.clone(), data.clone()));
                }
            });

        server.set_private_data("u2", "hand", json!([1, 2]));
        server.set_private_data("u1", "hand", json!([3]));
        server.set_public_data("hand", json!([]));
        server.set_public_data("round", 1);

        assert_eq!(
            *seen.borrow(),
            vec![
                ("hand".to_string(), json!([3])),
                ("round".to_string(), json!(1)),
            ]
        );

        assert!(server.client("u1").unwrap().off(id));
    }

    #[test]
    fn test_messages_to_client() {
        let mut server = make_server();
        let messages = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&messages);
        server
            .client("u1")
            .unwrap()
            .on(EventKind::Message, move |event| {
                if let Event::Message { message, .. } = event {
                    sink.borrow_mut().push(message.clone());
                }
            });

        server.send_message("everyone", Value::Null, None);
        server.send_message("only-u2", Value::Null, Some("u2"));
        server.send_message("only-u1", json!({ "bonus": 3 }), Some("u1"));

        assert_eq!(*messages.borrow(), vec!["everyone", "only-u1"]);
    }

    #[test]
    fn test_caller_reflects_live_roster() {
        let mut server = make_server();
        server.try_register("leave", |server: &mut Server, caller: &User, _: ()| {
            server.user_disconnected(&caller.id)
        });
        server.register("status", |_: &mut Server, caller: &User, _: ()| {
            caller.is_connected
        });

        let mut client = server.client("u1").unwrap();
        assert_eq!(client.call("status", ()).unwrap(), json!(true));

        client.call("leave", ()).unwrap();
        assert_eq!(client.call("status", ()).unwrap(), json!(false));
        assert_eq!(client.user().map(|u| u.is_connected), Some(false));
    }

    #[test]
    fn test_caller_sees_renamed_user() {
        let mut server = make_server();
        server.register("name", |server: &mut Server, caller: &User, _: ()| {
            server.user_connected(User::new(caller.id.clone(), "Renamed", "r.svg"));
            caller.name.clone()
        });

        let mut client = server.client("u1").unwrap();
        assert_eq!(client.call("name", ()).unwrap(), json!("U1"));
        assert_eq!(client.call("name", ()).unwrap(), json!("Renamed"));
    }

    #[test]
    fn test_listeners_dropped_across_reconnect() {
        let mut server = make_server();
        let seen = Rc::new(RefCell::new(0));

        let sink = Rc::clone(&seen);
        server
            .client("u1")
            .unwrap()
            .on(EventKind::SetData, move |_| *sink.borrow_mut() += 1);

        server.user_disconnected("u1").unwrap();
        server.user_connected(User::new("u1", "U1", "u1.svg"));
        assert!(server.is_channel_open("u1"));

        server.set_public_data("round", 2);
        server.set_private_data("u1", "hand", json!([1]));
        assert_eq!(*seen.borrow(), 0);
    }
}
