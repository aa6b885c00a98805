//! Goban Reactive - Derived views over table mirrors.
//!
//! These views subscribe to mirror notifications and keep UI-facing state
//! current without re-deriving it from scratch on every event:
//!
//! - `NameResolver`: identity → display name, with the short-hex fallback
//! - `MessageFeed`: messages ordered by sent time, annotated with names
//! - `PresenceLog`: append-only "has connected." / "has disconnected." lines
//!
//! Every view deregisters from the mirrors it follows on `teardown()` or drop.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use goban_core::{Identity, Message, User};
//! use goban_mirror::TableMirror;
//! use goban_reactive::{MessageFeed, PresenceLog};
//!
//! let messages = Rc::new(TableMirror::<Message>::new());
//! let users = Rc::new(TableMirror::<User>::new());
//! let feed = MessageFeed::new(&messages, &users);
//! let presence = PresenceLog::new(&users);
//!
//! let alice = Identity::new([0xaa; 32]);
//! users.apply_insert(User::new(alice, None, true)).unwrap();
//! messages.apply_insert(Message::new(alice, "hi", 100u64)).unwrap();
//!
//! assert_eq!(presence.lines(), vec!["aaaaaaaa has connected."]);
//! let first = feed.ordered_messages().next().unwrap();
//! assert_eq!(first.sender_name, "aaaaaaaa");
//! ```

#![no_std]

extern crate alloc;

pub mod feed;
pub mod names;
pub mod presence;

pub use feed::{FeedChange, FeedEntry, MessageFeed, OrderedMessages};
pub use names::NameResolver;
pub use presence::{PresenceLine, PresenceLog, Transition};
