//! Row-type binding for mirrored relations.

use alloc::string::String;
use core::fmt::Debug;
use core::hash::Hash;
use goban_core::{Game, GameId, Identity, Message, Timestamp, User};

/// How rows of a relation are identified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyPolicy {
    /// The key is a primary key: at most one row per key, updates allowed.
    PrimaryKey,
    /// The key is the whole row tuple: duplicates are allowed, updates are
    /// not defined, and a delete removes one matching row.
    RowTuple,
}

/// A row type that can be held in a `TableMirror`.
pub trait TableRow: Clone + PartialEq + Debug + 'static {
    /// Key extracted from a row.
    type Key: Clone + Eq + Hash + Debug;

    /// Relation name as used in subscription queries.
    const TABLE: &'static str;

    /// How `key()` identifies rows.
    const KEY_POLICY: KeyPolicy;

    /// Extracts the key of this row.
    fn key(&self) -> Self::Key;
}

impl TableRow for User {
    type Key = Identity;
    const TABLE: &'static str = "user";
    const KEY_POLICY: KeyPolicy = KeyPolicy::PrimaryKey;

    fn key(&self) -> Identity {
        self.identity
    }
}

impl TableRow for Game {
    type Key = GameId;
    const TABLE: &'static str = "game";
    const KEY_POLICY: KeyPolicy = KeyPolicy::PrimaryKey;

    fn key(&self) -> GameId {
        self.id
    }
}

impl TableRow for Message {
    type Key = (Identity, String, Timestamp);
    const TABLE: &'static str = "message";
    const KEY_POLICY: KeyPolicy = KeyPolicy::RowTuple;

    fn key(&self) -> Self::Key {
        (self.sender, self.text.clone(), self.sent)
    }
}
