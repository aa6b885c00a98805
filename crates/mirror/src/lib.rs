//! Goban Mirror - Generic in-memory table mirror.
//!
//! This crate keeps a local copy of a remote relation consistent with a
//! stream of row events:
//!
//! - `TableRow`: binds a row type to its relation name and key
//! - `TableMirror`: applies insert/update/delete events and notifies listeners
//! - `Snapshot`: immutable, cheaply cloned view of the current rows
//! - `RowChange`: what a listener receives after each apply
//! - `ListenerSet` / `ListenerHandle`: registration with idempotent `cancel()`
//!
//! # Example
//!
//! ```rust
//! use goban_core::{Game, ErrorKind};
//! use goban_mirror::TableMirror;
//!
//! let games: TableMirror<Game> = TableMirror::new();
//! let handle = games.on_change(|change| {
//!     let _ = change.kind();
//! });
//!
//! games.apply_insert(Game::new(1, 9, None)).unwrap();
//! assert_eq!(games.snapshot().len(), 1);
//!
//! // Deleting an absent row is reported, not fatal.
//! let err = games.apply_delete(Game::new(7, 9, None)).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::MalformedEvent);
//! assert_eq!(games.len(), 1);
//!
//! handle.cancel();
//! ```

#![no_std]

extern crate alloc;

pub mod change;
pub mod listener;
pub mod mirror;
pub mod snapshot;
pub mod table;

pub use change::{ChangeKind, RowChange, RowPosition};
pub use listener::{ListenerHandle, ListenerId, ListenerSet};
pub use mirror::TableMirror;
pub use snapshot::Snapshot;
pub use table::{KeyPolicy, TableRow};
