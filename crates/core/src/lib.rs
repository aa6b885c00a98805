//! Goban Core - Identity, row types and error kinds for the goban table mirror.
//!
//! This crate provides the foundational types shared by every layer:
//!
//! - `Identity`: opaque principal key, rendered as lowercase hex
//! - `User`, `Message`, `Game`: typed rows of the three mirrored relations
//! - `Timestamp`: microsecond send time carried by messages
//! - `Error`: error kinds surfaced by the mirror and the client
//!
//! # Example
//!
//! ```rust
//! use goban_core::{display_name, Identity, User};
//!
//! let identity = Identity::new([0xab; 32]);
//! let user = User::new(identity, None, true);
//!
//! assert_eq!(user.display_name(), "abababab");
//! assert_eq!(display_name(&identity, Some("Alice")), "Alice");
//! ```

#![no_std]

extern crate alloc;

mod error;
mod game;
mod identity;
mod row;

pub use error::{Error, ErrorKind, Result};
pub use game::{Cell, Game, GameId, GameStatus, EMPTY_CELL};
pub use identity::{Identity, IDENTITY_LEN, SHORT_HEX_LEN};
pub use row::{display_name, Message, Timestamp, User};
