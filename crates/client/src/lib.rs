//! Goban Client - Session, subscription and reducer plumbing.
//!
//! This crate wires the table mirrors and derived views to a remote
//! service:
//!
//! - `ConnectionManager`: connect attempts and the session state machine
//! - `SubscriptionManager`: per-session queries and their applied/failed status
//! - `ReducerGateway`: fire-and-forget remote procedure calls
//! - `ClientContext`: the composition root that owns all of the above
//! - `protocol`: the JSON wire messages
//! - `Transport` / `TokenStore`: the seams to the embedding application
//! - `ReconnectSupervisor`: opt-in backoff for a caller-driven retry loop
//!
//! # Example
//!
//! ```rust
//! use goban_client::{ClientConfig, ClientContext, MemoryTokenStore, RecordingTransport};
//!
//! let transport = RecordingTransport::new();
//! let context = ClientContext::new(
//!     ClientConfig::default(),
//!     transport.clone(),
//!     MemoryTokenStore::new(),
//! )
//! .unwrap();
//!
//! context.connect().unwrap();
//! let hex = "aa".repeat(32);
//! context
//!     .handle_frame(&format!(
//!         r#"{{"type":"identity_token","identity":"{}","token":"t1"}}"#,
//!         hex
//!     ))
//!     .unwrap();
//! context
//!     .handle_frame(&format!(
//!         r#"{{"type":"table_update","table":"user","ops":[
//!             {{"op":"insert","row":{{"identity":"{}","online":true}}}}]}}"#,
//!         hex
//!     ))
//!     .unwrap();
//!
//! assert_eq!(context.presence().lines(), vec!["aaaaaaaa has connected."]);
//! assert_eq!(context.saved_token().as_deref(), Some("t1"));
//! context.teardown();
//! ```

pub mod config;
pub mod connection;
pub mod context;
pub mod protocol;
pub mod reconnect;
pub mod reducer;
pub mod subscription;
pub mod token;
pub mod transport;

pub use config::ClientConfig;
pub use connection::{ConnectionEvent, ConnectionManager, ConnectionState, Session, SessionId, StateTransition};
pub use context::ClientContext;
pub use protocol::{ClientMessage, QueryId, ReducerOutcome, RequestId, RowOp, ServerMessage};
pub use reconnect::{ReconnectDecision, ReconnectPolicy, ReconnectSupervisor};
pub use reducer::{ReducerEvent, ReducerGateway, ReducerKind};
pub use subscription::{QueryState, QueryStatus, SubscriptionEvent, SubscriptionManager};
pub use token::{MemoryTokenStore, TokenStore};
pub use transport::{ConnectRequest, RecordingTransport, Transport};

// Re-export commonly used types from dependencies
pub use goban_core::{Error, ErrorKind, Game, Identity, Message, Result, User};
pub use goban_mirror::{ListenerHandle, RowChange, Snapshot, TableMirror};
pub use goban_reactive::{FeedEntry, MessageFeed, NameResolver, PresenceLog};
