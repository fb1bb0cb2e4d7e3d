//! Mini-game state synchronization.
//!
//! This crate pairs one authoritative `Server` with a `Client` view per
//! connected user, so a mini-game can be exercised end to end inside a
//! single process.
//!
//! # Overview
//!
//! - **Public and private data** - The server holds values every user can
//!   see plus per-user private values. A private value shadows the public
//!   value of the same key, for that user only.
//!
//! - **Events** - Every mutation is published on a synchronous bus. Server
//!   listeners see everything; each client channel only gets the changes
//!   that alter what its user sees.
//!
//! - **Functions** - Server code registers typed functions; clients invoke
//!   them by name and the server runs them with the calling user.
//!
//! - **Roster and scores** - Users stay on the roster after disconnecting.
//!   Roster and scores are mirrored under the reserved public keys `_users`
//!   and `_scores`.
//!
//! # Example
//!
//! ```rust
//! use minigame_sync::{Event, EventKind, Server, User};
//! use serde_json::json;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let mut server = Server::new();
//! server.register("add", |server: &mut Server, caller: &User, n: i64| {
//!     let score = server.get_score(&caller.id) + n;
//!     server.set_score(&caller.id, score);
//! });
//!
//! server.user_connected(User::new("u1", "Ada", "https://avatars.example/ada.svg"));
//! server.user_connected(User::new("u2", "Grace", "https://avatars.example/grace.svg"));
//!
//! // Watch what u2 sees
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! server.client("u2").unwrap().on(EventKind::SetData, move |event| {
//!     if let Event::SetData { key, .. } = event {
//!         sink.borrow_mut().push(key.clone());
//!     }
//! });
//!
//! server.set_public_data("round", 1);
//! server.set_private_data("u1", "hand", json!(["A", "K"]));
//!
//! let mut client = server.client("u1").unwrap();
//! client.call("add", 5).unwrap();
//! assert_eq!(client.get_data("hand"), Some(&json!(["A", "K"])));
//! assert_eq!(client.get_data("round"), Some(&json!(1)));
//!
//! assert_eq!(server.get_score("u1"), 5);
//! assert!(seen.borrow().contains(&"round".to_string()));
//! assert!(!seen.borrow().contains(&"hand".to_string()));
//! ```

pub mod state;

// Re-export everything from state module at crate root
pub use state::*;
